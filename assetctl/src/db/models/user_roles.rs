//! Database models for user roles and their assigned customers.

use crate::types::{CustomerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Privilege tier attached 1:1 to a user identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

/// Database request for creating a role record
#[derive(Debug, Clone)]
pub struct UserRoleCreateDBRequest {
    pub user_id: UserId,
    pub role: Role,
    pub customers: Vec<CustomerId>,
}

/// Database request for updating a role record
#[derive(Debug, Clone, Default)]
pub struct UserRoleUpdateDBRequest {
    pub role: Option<Role>,
    /// When present, replaces the assigned-customer set wholesale.
    pub customers: Option<Vec<CustomerId>>,
}

/// Database response for a role record
#[derive(Debug, Clone)]
pub struct UserRoleDBResponse {
    pub user_id: UserId,
    pub role: Role,
    pub customers: Vec<CustomerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
