//! Database repository for user identities.

use crate::auth::policy::CustomerScope;
use crate::db::{
    errors::Result,
    models::users::{UserCreateDBRequest, UserDBResponse},
};
use crate::types::{UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Users<'c> {
    db: &'c mut SqliteConnection,
}

impl From<User> for UserDBResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    pub async fn create(&mut self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, is_staff, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(request.is_staff)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user.into())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user.map(UserDBResponse::from))
    }

    /// List identities visible under a scope: all of them for admins, users
    /// whose role touches an assigned customer for managers.
    #[instrument(skip(self, scope), err)]
    pub async fn list(&mut self, scope: &CustomerScope) -> Result<Vec<UserDBResponse>> {
        let users = match scope {
            CustomerScope::All => {
                sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
                    .fetch_all(&mut *self.db)
                    .await?
            }
            CustomerScope::None => Vec::new(),
            CustomerScope::Assigned(_) => {
                let mut qb = QueryBuilder::new(
                    "SELECT DISTINCT u.* FROM users u \
                     JOIN user_role_customers urc ON urc.user_id = u.id \
                     WHERE 1 = 1",
                );
                super::push_customer_scope(&mut qb, "urc.customer_id", scope);
                qb.push(" ORDER BY u.username");
                qb.build_query_as::<User>().fetch_all(&mut *self.db).await?
            }
        };

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }

    /// Non-staff identities that have no owned customer yet.
    #[instrument(skip(self), err)]
    pub async fn without_customer(&mut self) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            LEFT JOIN customers c ON c.owner_user_id = u.id
            WHERE c.id IS NULL AND u.is_staff = 0
            ORDER BY u.username
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users.into_iter().map(UserDBResponse::from).collect())
    }
}
