//! Database repository for inventoried assets.
//!
//! Listing goes through a dynamically built query: visibility scope first,
//! then the caller's filters, then a whitelisted sort column. Sort input that
//! does not match the whitelist falls back to the default ordering rather
//! than erroring.

use crate::auth::policy::CustomerScope;
use crate::configtext::ConfigMapping;
use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::assets::{
        AssetCreateDBRequest, AssetDBResponse, AssetType, AssetUpdateDBRequest, Criticality,
    },
};
use crate::types::{AssetId, CustomerId, abbrev_uuid};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, types::Json};
use tracing::instrument;
use uuid::Uuid;

/// Columns an asset listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSortField {
    Name,
    AssetType,
    IpAddress,
    Status,
    BusinessCriticality,
    PatchCycle,
    LastChecked,
}

impl AssetSortField {
    fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::AssetType => "asset_type",
            Self::IpAddress => "ip_address",
            Self::Status => "status",
            Self::BusinessCriticality => "business_criticality",
            Self::PatchCycle => "patch_cycle",
            Self::LastChecked => "last_checked",
        }
    }
}

/// Sort order for asset listings. A leading `-` in the textual form means
/// descending, mirroring the query-string convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSort {
    pub field: AssetSortField,
    pub descending: bool,
}

impl Default for AssetSort {
    fn default() -> Self {
        Self {
            field: AssetSortField::LastChecked,
            descending: true,
        }
    }
}

impl AssetSort {
    /// Parses a sort key, falling back to the default ordering for anything
    /// outside the whitelist.
    pub fn parse(input: Option<&str>) -> Self {
        let Some(input) = input else {
            return Self::default();
        };
        let (descending, key) = match input.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, input),
        };
        let field = match key {
            "name" => AssetSortField::Name,
            "asset_type" => AssetSortField::AssetType,
            "ip_address" => AssetSortField::IpAddress,
            "status" => AssetSortField::Status,
            "business_criticality" => AssetSortField::BusinessCriticality,
            "patch_cycle" => AssetSortField::PatchCycle,
            "last_checked" => AssetSortField::LastChecked,
            _ => return Self::default(),
        };
        Self { field, descending }
    }
}

/// Filter for listing assets
#[derive(Debug, Clone)]
pub struct AssetFilter {
    pub scope: CustomerScope,
    pub search: Option<String>,
    pub asset_type: Option<AssetType>,
    pub business_criticality: Option<Criticality>,
    pub status: Option<bool>,
    pub customer_id: Option<CustomerId>,
    pub sort: AssetSort,
}

impl AssetFilter {
    pub fn new(scope: CustomerScope) -> Self {
        Self {
            scope,
            search: None,
            asset_type: None,
            business_criticality: None,
            status: None,
            customer_id: None,
            sort: AssetSort::default(),
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Asset {
    pub id: AssetId,
    pub customer_id: CustomerId,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    pub configuration: Json<ConfigMapping>,
    pub last_checked: DateTime<Utc>,
}

impl From<Asset> for AssetDBResponse {
    fn from(asset: Asset) -> Self {
        Self {
            id: asset.id,
            customer_id: asset.customer_id,
            name: asset.name,
            asset_type: asset.asset_type,
            ip_address: asset.ip_address,
            status: asset.status,
            business_criticality: asset.business_criticality,
            patch_cycle: asset.patch_cycle,
            configuration: asset.configuration.0,
            last_checked: asset.last_checked,
        }
    }
}

pub struct Assets<'c> {
    db: &'c mut SqliteConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Assets<'c> {
    type CreateRequest = AssetCreateDBRequest;
    type UpdateRequest = AssetUpdateDBRequest;
    type Response = AssetDBResponse;
    type Id = AssetId;
    type Filter = AssetFilter;

    #[instrument(skip(self, request), fields(customer_id = %abbrev_uuid(&request.customer_id), name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            INSERT INTO assets (
                id, customer_id, name, asset_type, ip_address, status,
                business_criticality, patch_cycle, configuration, last_checked
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.customer_id)
        .bind(&request.name)
        .bind(request.asset_type)
        .bind(&request.ip_address)
        .bind(request.status)
        .bind(request.business_criticality)
        .bind(request.patch_cycle)
        .bind(Json(&request.configuration))
        .bind(Utc::now())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(asset.into())
    }

    #[instrument(skip(self), fields(asset_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let asset = sqlx::query_as::<_, Asset>("SELECT * FROM assets WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(asset.map(Into::into))
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT * FROM assets WHERE 1 = 1");

        super::push_customer_scope(&mut qb, "customer_id", &filter.scope);

        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.trim().to_lowercase());
            qb.push(" AND (LOWER(name) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR LOWER(ip_address) LIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        if let Some(asset_type) = filter.asset_type {
            qb.push(" AND asset_type = ");
            qb.push_bind(asset_type);
        }
        if let Some(criticality) = filter.business_criticality {
            qb.push(" AND business_criticality = ");
            qb.push_bind(criticality);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(customer_id) = filter.customer_id {
            qb.push(" AND customer_id = ");
            qb.push_bind(customer_id);
        }

        qb.push(" ORDER BY ");
        qb.push(filter.sort.field.column());
        if filter.sort.descending {
            qb.push(" DESC");
        }

        let assets = qb.build_query_as::<Asset>().fetch_all(&mut *self.db).await?;

        Ok(assets.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request), fields(asset_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let asset = sqlx::query_as::<_, Asset>(
            r#"
            UPDATE assets SET
                customer_id = ?,
                name = ?,
                asset_type = ?,
                ip_address = ?,
                status = ?,
                business_criticality = ?,
                patch_cycle = ?,
                configuration = ?,
                last_checked = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(request.customer_id)
        .bind(&request.name)
        .bind(request.asset_type)
        .bind(&request.ip_address)
        .bind(request.status)
        .bind(request.business_criticality)
        .bind(request.patch_cycle)
        .bind(Json(&request.configuration))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(asset.into())
    }

    #[instrument(skip(self), fields(asset_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl<'c> Assets<'c> {
    pub fn new(db: &'c mut SqliteConnection) -> Self {
        Self { db }
    }
}
