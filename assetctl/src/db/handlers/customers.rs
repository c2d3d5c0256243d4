//! Database repository for customers.

use crate::auth::policy::CustomerScope;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::customers::{CustomerCreateDBRequest, CustomerDBResponse, CustomerUpdateDBRequest},
};
use crate::types::{CustomerId, UserId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, SqliteConnection};
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing customers
#[derive(Debug, Clone)]
pub struct CustomerFilter {
    pub scope: CustomerScope,
}

impl CustomerFilter {
    pub fn new(scope: CustomerScope) -> Self {
        Self { scope }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Customer {
    pub id: CustomerId,
    pub owner_user_id: UserId,
    pub display_name: String,
    pub legal_name: String,
    pub contact_person: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct Customers<'c> {
    db: &'c mut SqliteConnection,
}

impl From<Customer> for CustomerDBResponse {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            owner_user_id: customer.owner_user_id,
            display_name: customer.display_name,
            legal_name: customer.legal_name,
            contact_person: customer.contact_person,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Customers<'c> {
    type CreateRequest = CustomerCreateDBRequest;
    type UpdateRequest = CustomerUpdateDBRequest;
    type Response = CustomerDBResponse;
    type Id = CustomerId;
    type Filter = CustomerFilter;

    #[instrument(skip(self, request), fields(display_name = %request.display_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let now = Utc::now();
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, owner_user_id, display_name, legal_name, contact_person, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.owner_user_id)
        .bind(&request.display_name)
        .bind(&request.legal_name)
        .bind(&request.contact_person)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(customer.into())
    }

    #[instrument(skip(self), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(customer.map(CustomerDBResponse::from))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut qb = QueryBuilder::new("SELECT * FROM customers WHERE 1 = 1");
        super::push_customer_scope(&mut qb, "id", &filter.scope);
        qb.push(" ORDER BY display_name");

        let customers = qb.build_query_as::<Customer>().fetch_all(&mut *self.db).await?;
        Ok(customers.into_iter().map(CustomerDBResponse::from).collect())
    }

    #[instrument(skip(self, request), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers SET
                display_name = COALESCE(?, display_name),
                legal_name = COALESCE(?, legal_name),
                contact_person = COALESCE(?, contact_person),
                updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&request.display_name)
        .bind(&request.legal_name)
        .bind(&request.contact_person)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(customer.into())
    }

    #[instrument(skip(self), fields(customer_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Customers<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }

    /// The customer owned by a user identity, if any.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&owner)), err)]
    pub async fn get_by_owner(&mut self, owner: UserId) -> Result<Option<CustomerDBResponse>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE owner_user_id = ?")
            .bind(owner)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(customer.map(CustomerDBResponse::from))
    }
}
