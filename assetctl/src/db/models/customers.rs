//! Database models for customers (tenants).

use crate::types::{CustomerId, UserId};
use chrono::{DateTime, Utc};

/// Database request for creating a new customer
#[derive(Debug, Clone)]
pub struct CustomerCreateDBRequest {
    pub owner_user_id: UserId,
    pub display_name: String,
    pub legal_name: String,
    pub contact_person: String,
}

/// Database request for updating a customer
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdateDBRequest {
    pub display_name: Option<String>,
    pub legal_name: Option<String>,
    pub contact_person: Option<String>,
}

/// Database response for a customer
#[derive(Debug, Clone)]
pub struct CustomerDBResponse {
    pub id: CustomerId,
    pub owner_user_id: UserId,
    pub display_name: String,
    pub legal_name: String,
    pub contact_person: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
