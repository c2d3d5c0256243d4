//! Role assignment management.
//!
//! Admins may assign anything. Managers may only hand out roles below
//! admin, only over customers inside their own assigned set, and may not
//! touch an existing admin's record at all.

use crate::auth::{CustomerScope, Identity, policy};
use crate::db::{
    errors::DbError,
    handlers::{Repository, UserRoles, user_roles::UserRoleFilter},
    models::user_roles::{Role, UserRoleCreateDBRequest, UserRoleDBResponse, UserRoleUpdateDBRequest},
};
use crate::errors::{Error, Result};
use crate::types::{CustomerId, Operation, Resource, UserId, abbrev_uuid};
use sqlx::SqliteConnection;
use tracing::instrument;

/// Desired state for a user's role record; applied as an upsert.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub role: Role,
    pub customers: Vec<CustomerId>,
}

#[instrument(skip(db, identity), fields(username = %identity.username))]
pub async fn list_user_roles(db: &mut SqliteConnection, identity: &Identity) -> Result<Vec<UserRoleDBResponse>> {
    let filter = UserRoleFilter::new(policy::user_role_visibility(identity));
    Ok(UserRoles::new(db).list(&filter).await?)
}

#[instrument(skip(db, identity), fields(username = %identity.username, user_id = %abbrev_uuid(&user_id)))]
pub async fn get_user_role(
    db: &mut SqliteConnection,
    identity: &Identity,
    user_id: UserId,
) -> Result<UserRoleDBResponse> {
    let scope = policy::user_role_visibility(identity);
    if scope == CustomerScope::None {
        return Err(Error::not_authorized(Operation::Read, Resource::UserRoles));
    }

    let record = UserRoles::new(db)
        .get_by_user(user_id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::UserRoles, user_id))?;

    if !record_in_scope(&record, &scope) {
        return Err(Error::not_authorized(Operation::Read, Resource::UserRoles));
    }

    Ok(record)
}

#[instrument(skip(db, identity, assignment), fields(username = %identity.username, user_id = %abbrev_uuid(&user_id)))]
pub async fn set_user_role(
    db: &mut SqliteConnection,
    identity: &Identity,
    user_id: UserId,
    assignment: &RoleAssignment,
) -> Result<UserRoleDBResponse> {
    if !policy::can_manage_user_roles(identity) {
        return Err(Error::not_authorized(Operation::Update, Resource::UserRoles));
    }

    let existing = UserRoles::new(&mut *db).get_by_user(user_id).await?;

    if identity.role_tag() == Some(Role::Manager) {
        check_manager_assignment(identity, assignment, existing.as_ref())?;
    }

    let record = match existing {
        Some(_) => {
            UserRoles::new(db)
                .update(user_id, &UserRoleUpdateDBRequest {
                    role: Some(assignment.role),
                    customers: Some(assignment.customers.clone()),
                })
                .await
        }
        None => {
            UserRoles::new(db)
                .create(&UserRoleCreateDBRequest {
                    user_id,
                    role: assignment.role,
                    customers: assignment.customers.clone(),
                })
                .await
        }
    }
    .map_err(|err| match err {
        DbError::ForeignKeyViolation { .. } => Error::validation("Unknown user or customer"),
        other => Error::Database(other),
    })?;

    Ok(record)
}

#[instrument(skip(db, identity), fields(username = %identity.username, user_id = %abbrev_uuid(&user_id)))]
pub async fn clear_user_role(db: &mut SqliteConnection, identity: &Identity, user_id: UserId) -> Result<()> {
    if !policy::can_manage_user_roles(identity) {
        return Err(Error::not_authorized(Operation::Delete, Resource::UserRoles));
    }

    let record = UserRoles::new(&mut *db)
        .get_by_user(user_id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::UserRoles, user_id))?;

    if identity.role_tag() == Some(Role::Manager) {
        if record.role == Role::Admin {
            return Err(Error::not_authorized(Operation::Delete, Resource::UserRoles));
        }
        if !record_in_scope(&record, &policy::user_role_visibility(identity)) {
            return Err(Error::not_authorized(Operation::Delete, Resource::UserRoles));
        }
    }

    UserRoles::new(db).delete(user_id).await?;
    Ok(())
}

/// A role record is in scope when any of its assigned customers is.
fn record_in_scope(record: &UserRoleDBResponse, scope: &CustomerScope) -> bool {
    match scope {
        CustomerScope::All => true,
        CustomerScope::None => false,
        CustomerScope::Assigned(_) => record.customers.iter().any(|id| scope.permits(*id)),
    }
}

fn check_manager_assignment(
    identity: &Identity,
    assignment: &RoleAssignment,
    existing: Option<&UserRoleDBResponse>,
) -> Result<()> {
    if assignment.role == Role::Admin {
        return Err(Error::not_authorized(Operation::Update, Resource::UserRoles));
    }
    if existing.is_some_and(|record| record.role == Role::Admin) {
        return Err(Error::not_authorized(Operation::Update, Resource::UserRoles));
    }
    let scope = policy::user_role_visibility(identity);
    // Rewriting an existing record requires it to be visible to the manager
    if existing.is_some_and(|record| !record_in_scope(record, &scope)) {
        return Err(Error::not_authorized(Operation::Update, Resource::UserRoles));
    }
    if let Some(outside) = assignment.customers.iter().find(|id| !scope.permits(**id)) {
        return Err(Error::validation(format!(
            "Customer {} is outside your assigned set",
            abbrev_uuid(outside)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{grant_role, identity_for, seed_customer, seed_user};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_manager_cannot_grant_admin(pool: SqlitePool) {
        let manager = seed_user(&pool, "manager", true).await;
        let owner = seed_user(&pool, "owner", false).await;
        let customer = seed_customer(&pool, owner.id, "Acme").await;
        grant_role(&pool, manager.id, Role::Manager, &[customer.id]).await;
        let target = seed_user(&pool, "target", true).await;
        let identity = identity_for(&pool, manager.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = set_user_role(&mut conn, &identity, target.id, &RoleAssignment {
            role: Role::Admin,
            customers: vec![],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        // Below admin, inside scope, is fine
        let record = set_user_role(&mut conn, &identity, target.id, &RoleAssignment {
            role: Role::Manager,
            customers: vec![customer.id],
        })
        .await
        .unwrap();
        assert_eq!(record.role, Role::Manager);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_manager_limited_to_assigned_customers(pool: SqlitePool) {
        let manager = seed_user(&pool, "manager", true).await;
        let owner_a = seed_user(&pool, "owner-a", false).await;
        let owner_b = seed_user(&pool, "owner-b", false).await;
        let assigned = seed_customer(&pool, owner_a.id, "Assigned").await;
        let foreign = seed_customer(&pool, owner_b.id, "Foreign").await;
        grant_role(&pool, manager.id, Role::Manager, &[assigned.id]).await;
        let target = seed_user(&pool, "target", true).await;
        let identity = identity_for(&pool, manager.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = set_user_role(&mut conn, &identity, target.id, &RoleAssignment {
            role: Role::Manager,
            customers: vec![assigned.id, foreign.id],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_manager_cannot_rewrite_out_of_scope_records(pool: SqlitePool) {
        let manager_a = seed_user(&pool, "manager-a", true).await;
        let manager_b = seed_user(&pool, "manager-b", true).await;
        let owner_a = seed_user(&pool, "owner-a", false).await;
        let owner_b = seed_user(&pool, "owner-b", false).await;
        let customer_a = seed_customer(&pool, owner_a.id, "A").await;
        let customer_b = seed_customer(&pool, owner_b.id, "B").await;
        grant_role(&pool, manager_a.id, Role::Manager, &[customer_a.id]).await;
        grant_role(&pool, manager_b.id, Role::Manager, &[customer_b.id]).await;
        let identity = identity_for(&pool, manager_a.id).await;

        let mut conn = pool.acquire().await.unwrap();

        // Not visible, so not rewritable either: no demoting a peer whose
        // record shares no assigned customer
        let err = set_user_role(&mut conn, &identity, manager_b.id, &RoleAssignment {
            role: Role::User,
            customers: vec![],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        let untouched = UserRoles::new(&mut conn).get_by_user(manager_b.id).await.unwrap().unwrap();
        assert_eq!(untouched.role, Role::Manager);
        assert_eq!(untouched.customers, vec![customer_b.id]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_manager_cannot_touch_admin_records(pool: SqlitePool) {
        let admin = seed_user(&pool, "admin", true).await;
        grant_role(&pool, admin.id, Role::Admin, &[]).await;
        let manager = seed_user(&pool, "manager", true).await;
        let owner = seed_user(&pool, "owner", false).await;
        let customer = seed_customer(&pool, owner.id, "Acme").await;
        grant_role(&pool, manager.id, Role::Manager, &[customer.id]).await;
        let identity = identity_for(&pool, manager.id).await;

        let mut conn = pool.acquire().await.unwrap();
        let err = set_user_role(&mut conn, &identity, admin.id, &RoleAssignment {
            role: Role::User,
            customers: vec![],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        let err = clear_user_role(&mut conn, &identity, admin.id).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_upserts_and_clears(pool: SqlitePool) {
        let admin = seed_user(&pool, "admin", true).await;
        grant_role(&pool, admin.id, Role::Admin, &[]).await;
        let owner = seed_user(&pool, "owner", false).await;
        let customer = seed_customer(&pool, owner.id, "Acme").await;
        let target = seed_user(&pool, "target", true).await;
        let identity = identity_for(&pool, admin.id).await;

        let mut conn = pool.acquire().await.unwrap();

        // First write creates
        let created = set_user_role(&mut conn, &identity, target.id, &RoleAssignment {
            role: Role::User,
            customers: vec![],
        })
        .await
        .unwrap();
        assert_eq!(created.role, Role::User);

        // Second write updates in place
        let updated = set_user_role(&mut conn, &identity, target.id, &RoleAssignment {
            role: Role::Manager,
            customers: vec![customer.id],
        })
        .await
        .unwrap();
        assert_eq!(updated.role, Role::Manager);
        assert_eq!(updated.customers, vec![customer.id]);

        clear_user_role(&mut conn, &identity, target.id).await.unwrap();
        let err = get_user_role(&mut conn, &identity, target.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_self_service_user_cannot_see_or_manage_roles(pool: SqlitePool) {
        let user = seed_user(&pool, "plain", false).await;
        seed_customer(&pool, user.id, "Own").await;
        grant_role(&pool, user.id, Role::User, &[]).await;
        let identity = identity_for(&pool, user.id).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(list_user_roles(&mut conn, &identity).await.unwrap().is_empty());

        let err = get_user_role(&mut conn, &identity, user.id).await.unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));

        let err = set_user_role(&mut conn, &identity, user.id, &RoleAssignment {
            role: Role::Admin,
            customers: vec![],
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotAuthorized { .. }));
    }
}
