//! Customer record management.
//!
//! Creation is an admin/manager operation. When a manager creates a
//! customer, the new customer joins their assigned set in the same
//! transaction so they do not lose sight of what they just made.

use crate::auth::{Identity, policy};
use crate::db::{
    errors::DbError,
    handlers::{Customers, Repository, UserRoles, customers::CustomerFilter},
    models::customers::{CustomerCreateDBRequest, CustomerDBResponse, CustomerUpdateDBRequest},
    models::user_roles::{Role, UserRoleUpdateDBRequest},
};
use crate::errors::{Error, Result};
use crate::types::{CustomerId, Operation, Resource, UserId, abbrev_uuid};
use sqlx::{Connection, SqliteConnection};
use tracing::instrument;

/// Request payload for creating a customer. Every customer is owned by
/// exactly one user; the owner link is what pins a self-service user's
/// visibility.
#[derive(Debug, Clone)]
pub struct CustomerCreate {
    pub owner_user_id: UserId,
    pub display_name: String,
    pub legal_name: String,
    pub contact_person: String,
}

/// Partial update payload; the owner link is immutable.
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub display_name: Option<String>,
    pub legal_name: Option<String>,
    pub contact_person: Option<String>,
}

#[instrument(skip(db, identity), fields(username = %identity.username))]
pub async fn list_customers(db: &mut SqliteConnection, identity: &Identity) -> Result<Vec<CustomerDBResponse>> {
    let filter = CustomerFilter::new(policy::customer_visibility(identity));
    Ok(Customers::new(db).list(&filter).await?)
}

#[instrument(skip(db, identity), fields(username = %identity.username, customer_id = %abbrev_uuid(&id)))]
pub async fn get_customer(
    db: &mut SqliteConnection,
    identity: &Identity,
    id: CustomerId,
) -> Result<CustomerDBResponse> {
    let customer = Customers::new(db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::Customers, id))?;

    if !policy::customer_visibility(identity).permits(customer.id) {
        return Err(Error::not_authorized(Operation::Read, Resource::Customers));
    }

    Ok(customer)
}

#[instrument(skip(db, identity, payload), fields(username = %identity.username, display_name = %payload.display_name))]
pub async fn create_customer(
    db: &mut SqliteConnection,
    identity: &Identity,
    payload: &CustomerCreate,
) -> Result<CustomerDBResponse> {
    if !policy::can_mutate_customers(identity) {
        return Err(Error::not_authorized(Operation::Create, Resource::Customers));
    }

    let display_name = payload.display_name.trim();
    if display_name.is_empty() {
        return Err(Error::validation("Display name is required"));
    }

    let mut tx = db.begin().await.map_err(DbError::from)?;

    let customer = Customers::new(&mut tx)
        .create(&CustomerCreateDBRequest {
            owner_user_id: payload.owner_user_id,
            display_name: display_name.to_string(),
            legal_name: payload.legal_name.trim().to_string(),
            contact_person: payload.contact_person.trim().to_string(),
        })
        .await
        .map_err(map_customer_write_err)?;

    // Fold the new customer into a creating manager's assigned set.
    if identity.role_tag() == Some(Role::Manager) {
        if let Some(grant) = &identity.role {
            let mut customers: Vec<CustomerId> = grant.customers.iter().copied().collect();
            customers.push(customer.id);
            UserRoles::new(&mut tx)
                .update(identity.user_id, &UserRoleUpdateDBRequest {
                    role: None,
                    customers: Some(customers),
                })
                .await?;
        }
    }

    tx.commit().await.map_err(DbError::from)?;

    Ok(customer)
}

#[instrument(skip(db, identity, payload), fields(username = %identity.username, customer_id = %abbrev_uuid(&id)))]
pub async fn update_customer(
    db: &mut SqliteConnection,
    identity: &Identity,
    id: CustomerId,
    payload: &CustomerUpdate,
) -> Result<CustomerDBResponse> {
    if !policy::can_mutate_customers(identity) {
        return Err(Error::not_authorized(Operation::Update, Resource::Customers));
    }
    if !policy::customer_visibility(identity).permits(id) {
        return Err(Error::not_authorized(Operation::Update, Resource::Customers));
    }

    let customer = Customers::new(db)
        .update(id, &CustomerUpdateDBRequest {
            display_name: payload.display_name.clone(),
            legal_name: payload.legal_name.clone(),
            contact_person: payload.contact_person.clone(),
        })
        .await
        .map_err(|err| match err {
            DbError::NotFound => Error::not_found(Resource::Customers, id),
            other => Error::Database(other),
        })?;

    Ok(customer)
}

#[instrument(skip(db, identity), fields(username = %identity.username, customer_id = %abbrev_uuid(&id)))]
pub async fn delete_customer(db: &mut SqliteConnection, identity: &Identity, id: CustomerId) -> Result<()> {
    if !policy::can_mutate_customers(identity) {
        return Err(Error::not_authorized(Operation::Delete, Resource::Customers));
    }
    if !policy::customer_visibility(identity).permits(id) {
        return Err(Error::not_authorized(Operation::Delete, Resource::Customers));
    }

    let deleted = Customers::new(db).delete(id).await?;
    if !deleted {
        return Err(Error::not_found(Resource::Customers, id));
    }
    Ok(())
}

fn map_customer_write_err(err: DbError) -> Error {
    match err {
        DbError::UniqueViolation { ref message, .. } if message.contains("customers.owner_user_id") => {
            Error::validation("This user already owns a customer")
        }
        DbError::ForeignKeyViolation { .. } => Error::validation("Unknown owner user"),
        other => Error::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{grant_role, identity_for, seed_customer, seed_user};
    use sqlx::SqlitePool;

    fn payload(owner: UserId, name: &str) -> CustomerCreate {
        CustomerCreate {
            owner_user_id: owner,
            display_name: name.to_string(),
            legal_name: format!("{name} Ltd"),
            contact_person: "contact".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_manager_created_customer_joins_their_scope(pool: SqlitePool) {
        let manager = seed_user(&pool, "manager", true).await;
        grant_role(&pool, manager.id, Role::Manager, &[]).await;
        let owner = seed_user(&pool, "owner", false).await;
        let identity = identity_for(&pool, manager.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let customer = create_customer(&mut conn, &identity, &payload(owner.id, "Acme"))
            .await
            .unwrap();

        // The stale in-memory identity does not see it yet; a re-resolved one does
        assert!(!policy::customer_visibility(&identity).permits(customer.id));
        let refreshed = identity_for(&pool, manager.id).await;
        assert!(policy::customer_visibility(&refreshed).permits(customer.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_self_service_user_cannot_create_customers(pool: SqlitePool) {
        let user = seed_user(&pool, "plain", false).await;
        seed_customer(&pool, user.id, "Own").await;
        grant_role(&pool, user.id, Role::User, &[]).await;
        let other = seed_user(&pool, "other", false).await;
        let identity = identity_for(&pool, user.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = create_customer(&mut conn, &identity, &payload(other.id, "Rogue"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_owner_surfaces_as_validation(pool: SqlitePool) {
        let admin = seed_user(&pool, "admin", true).await;
        grant_role(&pool, admin.id, Role::Admin, &[]).await;
        let owner = seed_user(&pool, "owner", false).await;
        let identity = identity_for(&pool, admin.id).await;

        let mut conn = pool.acquire().await.unwrap();
        create_customer(&mut conn, &identity, &payload(owner.id, "First")).await.unwrap();
        let err = create_customer(&mut conn, &identity, &payload(owner.id, "Second"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "This user already owns a customer");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_visibility_and_updates(pool: SqlitePool) {
        let admin = seed_user(&pool, "admin", true).await;
        grant_role(&pool, admin.id, Role::Admin, &[]).await;
        let owner_a = seed_user(&pool, "owner-a", false).await;
        let owner_b = seed_user(&pool, "owner-b", false).await;
        let acme = seed_customer(&pool, owner_a.id, "Acme").await;
        seed_customer(&pool, owner_b.id, "Globex").await;
        grant_role(&pool, owner_a.id, Role::User, &[]).await;

        let admin_identity = identity_for(&pool, admin.id).await;
        let user_identity = identity_for(&pool, owner_a.id).await;

        let mut conn = pool.acquire().await.unwrap();

        assert_eq!(list_customers(&mut conn, &admin_identity).await.unwrap().len(), 2);
        let own = list_customers(&mut conn, &user_identity).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, acme.id);

        // A self-service user can read but not update their customer record
        get_customer(&mut conn, &user_identity, acme.id).await.unwrap();
        let err = update_customer(&mut conn, &user_identity, acme.id, &CustomerUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        let updated = update_customer(
            &mut conn,
            &admin_identity,
            acme.id,
            &CustomerUpdate {
                contact_person: Some("new contact".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.contact_person, "new contact");
        assert_eq!(updated.display_name, "Acme");
    }
}
