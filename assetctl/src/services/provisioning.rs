//! User provisioning.
//!
//! Creating a user is never just an insert: every user gets a default role
//! record, and non-staff users get a customer of their own so the
//! self-service visibility rules have something to pin to. The whole
//! sequence runs in one transaction.

use crate::auth::{Identity, policy};
use crate::db::{
    errors::DbError,
    handlers::{Customers, Repository, UserRoles, Users},
    models::customers::{CustomerCreateDBRequest, CustomerDBResponse},
    models::user_roles::{Role, UserRoleCreateDBRequest},
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::errors::{Error, Result};
use crate::types::{Operation, Resource};
use sqlx::{Connection, SqliteConnection};
use tracing::{info, instrument};

/// A freshly provisioned user with the customer created alongside, if any.
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub user: UserDBResponse,
    pub customer: Option<CustomerDBResponse>,
}

#[instrument(skip(db, identity), fields(caller = %identity.username, username = %username))]
pub async fn provision_user(
    db: &mut SqliteConnection,
    identity: &Identity,
    username: &str,
    email: &str,
    is_staff: bool,
) -> Result<ProvisionedUser> {
    if !policy::can_create_users(identity) {
        return Err(Error::not_authorized(Operation::Create, Resource::Users));
    }

    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("Username is required"));
    }
    let email = email.trim();
    if !email.contains('@') {
        return Err(Error::validation("Enter a valid email address."));
    }

    let mut tx = db.begin().await.map_err(DbError::from)?;

    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: email.to_string(),
            is_staff,
        })
        .await
        .map_err(map_user_write_err)?;

    UserRoles::new(&mut tx)
        .create(&UserRoleCreateDBRequest {
            user_id: user.id,
            role: Role::User,
            customers: vec![],
        })
        .await?;

    // Staff accounts work across customers and get none of their own.
    let customer = if is_staff {
        None
    } else {
        Some(
            Customers::new(&mut tx)
                .create(&default_customer_request(&user))
                .await?,
        )
    };

    tx.commit().await.map_err(DbError::from)?;

    info!(username = %user.username, staff = is_staff, "provisioned user");
    Ok(ProvisionedUser { user, customer })
}

/// Backfills customers for non-staff users that have none, along with a
/// default role record where missing. Returns how many users were repaired.
#[instrument(skip(db, identity), fields(caller = %identity.username))]
pub async fn ensure_customers(db: &mut SqliteConnection, identity: &Identity) -> Result<usize> {
    if identity.role_tag() != Some(Role::Admin) {
        return Err(Error::not_authorized(Operation::Update, Resource::Users));
    }

    let orphans = Users::new(&mut *db).without_customer().await?;
    let mut repaired = 0;

    for user in orphans {
        let mut tx = db.begin().await.map_err(DbError::from)?;

        Customers::new(&mut tx).create(&default_customer_request(&user)).await?;

        if UserRoles::new(&mut tx).get_by_user(user.id).await?.is_none() {
            UserRoles::new(&mut tx)
                .create(&UserRoleCreateDBRequest {
                    user_id: user.id,
                    role: Role::User,
                    customers: vec![],
                })
                .await?;
        }

        tx.commit().await.map_err(DbError::from)?;
        info!(username = %user.username, "backfilled customer");
        repaired += 1;
    }

    Ok(repaired)
}

#[instrument(skip(db, identity), fields(caller = %identity.username, username = %username))]
pub async fn promote_admin(db: &mut SqliteConnection, identity: &Identity, username: &str) -> Result<()> {
    if identity.role_tag() != Some(Role::Admin) {
        return Err(Error::not_authorized(Operation::Update, Resource::UserRoles));
    }

    let user = Users::new(&mut *db)
        .get_by_username(username)
        .await?
        .ok_or_else(|| Error::not_found(Resource::Users, username))?;

    let mut roles = UserRoles::new(&mut *db);
    match roles.get_by_user(user.id).await? {
        Some(_) => {
            roles
                .update(user.id, &crate::db::models::user_roles::UserRoleUpdateDBRequest {
                    role: Some(Role::Admin),
                    customers: None,
                })
                .await?;
        }
        None => {
            roles
                .create(&UserRoleCreateDBRequest {
                    user_id: user.id,
                    role: Role::Admin,
                    customers: vec![],
                })
                .await?;
        }
    }

    info!(username = %user.username, "promoted to admin");
    Ok(())
}

fn default_customer_request(user: &UserDBResponse) -> CustomerCreateDBRequest {
    CustomerCreateDBRequest {
        owner_user_id: user.id,
        display_name: format!("Customer {}", user.username),
        legal_name: format!("Company {}", user.username),
        contact_person: user.username.clone(),
    }
}

fn map_user_write_err(err: DbError) -> Error {
    match err {
        DbError::UniqueViolation { .. } => Error::validation("This username is already taken"),
        other => Error::Database(other),
    }
}
