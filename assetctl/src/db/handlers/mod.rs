//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection, provides strongly-typed CRUD
//! operations, and returns models from [`crate::db::models`]. Visibility
//! restrictions arrive as a [`CustomerScope`] inside the filter structs and
//! are rendered into the SQL here; deciding the scope is the authorization
//! policy's job, never the repository's.

pub mod assets;
pub mod customers;
pub mod repository;
pub mod user_roles;
pub mod users;

pub use assets::Assets;
pub use customers::Customers;
pub use repository::Repository;
pub use user_roles::UserRoles;
pub use users::Users;

use crate::auth::policy::CustomerScope;
use sqlx::{QueryBuilder, Sqlite};

/// Append `AND <column> IN (...)` (or a match-nothing clause) for a scope.
pub(crate) fn push_customer_scope(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, scope: &CustomerScope) {
    match scope {
        CustomerScope::All => {}
        CustomerScope::Assigned(customers) if customers.is_empty() => {
            qb.push(" AND 1 = 0");
        }
        CustomerScope::Assigned(customers) => {
            qb.push(format!(" AND {column} IN ("));
            let mut separated = qb.separated(", ");
            for customer_id in customers {
                separated.push_bind(*customer_id);
            }
            qb.push(")");
        }
        CustomerScope::None => {
            qb.push(" AND 1 = 0");
        }
    }
}
