//! Database repository for role records and their assigned-customer sets.

use crate::auth::policy::CustomerScope;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::user_roles::{Role, UserRoleCreateDBRequest, UserRoleDBResponse, UserRoleUpdateDBRequest},
};
use crate::types::{CustomerId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{Connection, FromRow, QueryBuilder, SqliteConnection};
use tracing::instrument;

/// Filter for listing role records
#[derive(Debug, Clone)]
pub struct UserRoleFilter {
    pub scope: CustomerScope,
}

impl UserRoleFilter {
    pub fn new(scope: CustomerScope) -> Self {
        Self { scope }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct UserRole {
    pub user_id: UserId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct UserRoles<'c> {
    db: &'c mut SqliteConnection,
}

impl UserRole {
    fn with_customers(self, customers: Vec<CustomerId>) -> UserRoleDBResponse {
        UserRoleDBResponse {
            user_id: self.user_id,
            role: self.role,
            customers,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for UserRoles<'c> {
    type CreateRequest = UserRoleCreateDBRequest;
    type UpdateRequest = UserRoleUpdateDBRequest;
    type Response = UserRoleDBResponse;
    type Id = UserId;
    type Filter = UserRoleFilter;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let record = sqlx::query_as::<_, UserRole>(
            r#"
            INSERT INTO user_roles (user_id, role, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.role)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for customer_id in &request.customers {
            sqlx::query("INSERT INTO user_role_customers (user_id, customer_id) VALUES (?, ?)")
                .bind(request.user_id)
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(record.with_customers(request.customers.clone()))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.get_by_user(id).await
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let records = match &filter.scope {
            CustomerScope::All => {
                sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles ORDER BY created_at")
                    .fetch_all(&mut *self.db)
                    .await?
            }
            CustomerScope::None => Vec::new(),
            CustomerScope::Assigned(_) => {
                let mut qb = QueryBuilder::new(
                    "SELECT DISTINCT ur.* FROM user_roles ur \
                     JOIN user_role_customers urc ON urc.user_id = ur.user_id \
                     WHERE 1 = 1",
                );
                super::push_customer_scope(&mut qb, "urc.customer_id", &filter.scope);
                qb.push(" ORDER BY ur.created_at");
                qb.build_query_as::<UserRole>().fetch_all(&mut *self.db).await?
            }
        };

        let mut responses = Vec::with_capacity(records.len());
        for record in records {
            let customers = self.assigned_customers(record.user_id).await?;
            responses.push(record.with_customers(customers));
        }
        Ok(responses)
    }

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let record;
        {
            let mut tx = self.db.begin().await?;

            record = sqlx::query_as::<_, UserRole>(
                r#"
                UPDATE user_roles SET
                    role = COALESCE(?, role),
                    updated_at = ?
                WHERE user_id = ?
                RETURNING *
                "#,
            )
            .bind(request.role)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

            // Replace the assigned set wholesale if provided
            if let Some(customers) = &request.customers {
                sqlx::query("DELETE FROM user_role_customers WHERE user_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;

                for customer_id in customers {
                    sqlx::query("INSERT INTO user_role_customers (user_id, customer_id) VALUES (?, ?)")
                        .bind(id)
                        .bind(customer_id)
                        .execute(&mut *tx)
                        .await?;
                }
            }

            tx.commit().await?;
        }

        let customers = self.assigned_customers(id).await?;
        Ok(record.with_customers(customers))
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> UserRoles<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// The role record for a user identity, if one exists.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn get_by_user(&mut self, user_id: UserId) -> Result<Option<UserRoleDBResponse>> {
        let record = sqlx::query_as::<_, UserRole>("SELECT * FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&mut *self.db)
            .await?;

        match record {
            Some(record) => {
                let customers = self.assigned_customers(user_id).await?;
                Ok(Some(record.with_customers(customers)))
            }
            None => Ok(None),
        }
    }

    async fn assigned_customers(&mut self, user_id: UserId) -> Result<Vec<CustomerId>> {
        let rows: Vec<(CustomerId,)> =
            sqlx::query_as("SELECT customer_id FROM user_role_customers WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&mut *self.db)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Customers, Users};
    use crate::db::models::customers::CustomerCreateDBRequest;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::SqlitePool;

    async fn seed_user(pool: &SqlitePool, username: &str) -> UserId {
        let mut conn = pool.acquire().await.unwrap();
        Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                is_staff: false,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_customer(pool: &SqlitePool, owner: UserId, name: &str) -> CustomerId {
        let mut conn = pool.acquire().await.unwrap();
        Customers::new(&mut conn)
            .create(&CustomerCreateDBRequest {
                owner_user_id: owner,
                display_name: name.to_string(),
                legal_name: format!("{name} Ltd"),
                contact_person: name.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_with_assigned_customers(pool: SqlitePool) {
        let manager = seed_user(&pool, "manager").await;
        let owner = seed_user(&pool, "owner").await;
        let customer = seed_customer(&pool, owner, "Tenant").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = UserRoles::new(&mut conn);

        let created = repo
            .create(&UserRoleCreateDBRequest {
                user_id: manager,
                role: Role::Manager,
                customers: vec![customer],
            })
            .await
            .unwrap();

        assert_eq!(created.role, Role::Manager);
        assert_eq!(created.customers, vec![customer]);

        let fetched = repo.get_by_user(manager).await.unwrap().unwrap();
        assert_eq!(fetched.customers, vec![customer]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_replaces_customer_set(pool: SqlitePool) {
        let manager = seed_user(&pool, "manager").await;
        let owner_a = seed_user(&pool, "owner-a").await;
        let owner_b = seed_user(&pool, "owner-b").await;
        let customer_a = seed_customer(&pool, owner_a, "A").await;
        let customer_b = seed_customer(&pool, owner_b, "B").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = UserRoles::new(&mut conn);

        repo.create(&UserRoleCreateDBRequest {
            user_id: manager,
            role: Role::Manager,
            customers: vec![customer_a],
        })
        .await
        .unwrap();

        let updated = repo
            .update(
                manager,
                &UserRoleUpdateDBRequest {
                    role: None,
                    customers: Some(vec![customer_b]),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Manager);
        assert_eq!(updated.customers, vec![customer_b]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_scoped_to_assigned_customers(pool: SqlitePool) {
        let manager_a = seed_user(&pool, "manager-a").await;
        let manager_b = seed_user(&pool, "manager-b").await;
        let owner_a = seed_user(&pool, "owner-a").await;
        let owner_b = seed_user(&pool, "owner-b").await;
        let customer_a = seed_customer(&pool, owner_a, "A").await;
        let customer_b = seed_customer(&pool, owner_b, "B").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = UserRoles::new(&mut conn);

        repo.create(&UserRoleCreateDBRequest {
            user_id: manager_a,
            role: Role::Manager,
            customers: vec![customer_a],
        })
        .await
        .unwrap();
        repo.create(&UserRoleCreateDBRequest {
            user_id: manager_b,
            role: Role::Manager,
            customers: vec![customer_b],
        })
        .await
        .unwrap();

        let all = repo.list(&UserRoleFilter::new(CustomerScope::All)).await.unwrap();
        assert_eq!(all.len(), 2);

        let scoped = repo
            .list(&UserRoleFilter::new(CustomerScope::Assigned([customer_a].into())))
            .await
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].user_id, manager_a);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_and_default_absent(pool: SqlitePool) {
        let user = seed_user(&pool, "plain").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = UserRoles::new(&mut conn);

        assert!(repo.get_by_user(user).await.unwrap().is_none());

        repo.create(&UserRoleCreateDBRequest {
            user_id: user,
            role: Role::User,
            customers: vec![],
        })
        .await
        .unwrap();

        assert!(repo.delete(user).await.unwrap());
        assert!(!repo.delete(user).await.unwrap());
        assert!(repo.get_by_user(user).await.unwrap().is_none());
    }
}
