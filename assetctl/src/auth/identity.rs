//! The resolved caller identity.

use crate::db::errors::Result;
use crate::db::handlers::{Customers, UserRoles, Users};
use crate::db::models::user_roles::Role;
use crate::types::{CustomerId, UserId, abbrev_uuid};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;

/// A user's role tag plus the customers explicitly assigned to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: Role,
    pub customers: HashSet<CustomerId>,
}

/// Authenticated caller, resolved once at request entry and threaded
/// explicitly through every service call.
///
/// `role` is `None` when the user has no role record; the policy treats that
/// as deny-everything. `customer_id` is the customer this user owns (present
/// for self-service users, absent for staff).
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: Option<RoleGrant>,
    pub customer_id: Option<CustomerId>,
}

impl Identity {
    /// Load the identity for a user id: the user row, their optional role
    /// record with its assigned customers, and their own linked customer.
    #[instrument(skip(db), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn resolve(db: &mut SqliteConnection, user_id: UserId) -> Result<Option<Identity>> {
        let Some(user) = Users::new(&mut *db).get_by_id(user_id).await? else {
            return Ok(None);
        };

        let role = UserRoles::new(&mut *db).get_by_user(user_id).await?.map(|record| RoleGrant {
            role: record.role,
            customers: record.customers.into_iter().collect(),
        });

        let customer_id = Customers::new(&mut *db).get_by_owner(user_id).await?.map(|c| c.id);

        Ok(Some(Identity {
            user_id: user.id,
            username: user.username,
            role,
            customer_id,
        }))
    }

    /// Full-privilege identity used by operator tooling (CLI commands).
    pub fn system() -> Identity {
        Identity {
            user_id: Uuid::nil(),
            username: "system".to_string(),
            role: Some(RoleGrant {
                role: Role::Admin,
                customers: HashSet::new(),
            }),
            customer_id: None,
        }
    }

    /// The role tag, if any role record exists.
    pub fn role_tag(&self) -> Option<Role> {
        self.role.as_ref().map(|grant| grant.role)
    }
}
