//! Database models for user identities.
//!
//! Authentication itself happens outside this crate; the users table anchors
//! role records and customer ownership.

use crate::types::UserId;
use chrono::{DateTime, Utc};

/// Database request for creating a new user identity
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

/// Database response for a user identity
#[derive(Debug, Clone)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
