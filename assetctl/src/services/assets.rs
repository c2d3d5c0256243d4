//! Asset queries and mutations.
//!
//! Reads are scoped through [`policy::asset_visibility`]; writes pass the
//! role gate first and then pin the target customer according to the
//! caller's role. A self-service user is always pinned to their own
//! customer, whatever the payload says.

use crate::auth::{Identity, policy};
use crate::configtext::{self, ConfigMapping};
use crate::db::{
    errors::DbError,
    handlers::{
        Assets, Repository,
        assets::{AssetFilter, AssetSort},
    },
    models::assets::{AssetCreateDBRequest, AssetDBResponse, AssetType, AssetUpdateDBRequest, Criticality},
    models::user_roles::Role,
};
use crate::errors::{Error, Result};
use crate::types::{AssetId, CustomerId, Operation, Resource, abbrev_uuid};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::net::IpAddr;
use tracing::instrument;

/// Request payload for creating an asset. `customer_id` is required for
/// admins and managers; self-service users may omit it.
#[derive(Debug, Clone)]
pub struct AssetCreate {
    pub customer_id: Option<CustomerId>,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    /// Configuration in `key=value` text form (or a JSON object).
    pub configuration: String,
}

/// Partial update payload; absent fields keep their current values.
#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    pub customer_id: Option<CustomerId>,
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    pub ip_address: Option<String>,
    pub status: Option<bool>,
    pub business_criticality: Option<Criticality>,
    pub patch_cycle: Option<i64>,
    pub configuration: Option<String>,
}

/// Listing parameters as they arrive from the caller, untrusted.
#[derive(Debug, Clone, Default)]
pub struct AssetQuery {
    pub search: Option<String>,
    pub asset_type: Option<AssetType>,
    pub business_criticality: Option<Criticality>,
    pub status: Option<bool>,
    pub customer_id: Option<CustomerId>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetResponse {
    pub id: AssetId,
    pub customer_id: CustomerId,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    pub configuration: ConfigMapping,
    /// Canonical `key=value, ...` rendering of `configuration`.
    pub configuration_text: String,
    pub last_checked: DateTime<Utc>,
}

impl From<AssetDBResponse> for AssetResponse {
    fn from(asset: AssetDBResponse) -> Self {
        let configuration_text = configtext::format(&asset.configuration);
        Self {
            id: asset.id,
            customer_id: asset.customer_id,
            name: asset.name,
            asset_type: asset.asset_type,
            ip_address: asset.ip_address,
            status: asset.status,
            business_criticality: asset.business_criticality,
            patch_cycle: asset.patch_cycle,
            configuration: asset.configuration,
            configuration_text,
            last_checked: asset.last_checked,
        }
    }
}

#[instrument(skip(db, identity, query), fields(username = %identity.username))]
pub async fn list_assets(
    db: &mut SqliteConnection,
    identity: &Identity,
    query: &AssetQuery,
) -> Result<Vec<AssetResponse>> {
    let mut filter = AssetFilter::new(policy::asset_visibility(identity));
    filter.search = query.search.clone();
    filter.asset_type = query.asset_type;
    filter.business_criticality = query.business_criticality;
    filter.status = query.status;
    // The explicit customer filter is an admin/manager affordance; a
    // self-service user's scope already pins them to one customer.
    if matches!(identity.role_tag(), Some(Role::Admin | Role::Manager)) {
        filter.customer_id = query.customer_id;
    }
    filter.sort = AssetSort::parse(query.sort.as_deref());

    let assets = Assets::new(db).list(&filter).await?;
    Ok(assets.into_iter().map(Into::into).collect())
}

#[instrument(skip(db, identity), fields(username = %identity.username, asset_id = %abbrev_uuid(&id)))]
pub async fn get_asset(db: &mut SqliteConnection, identity: &Identity, id: AssetId) -> Result<AssetResponse> {
    let asset = Assets::new(db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::Assets, id))?;

    if !policy::asset_visibility(identity).permits(asset.customer_id) {
        return Err(Error::not_authorized(Operation::Read, Resource::Assets));
    }

    Ok(asset.into())
}

#[instrument(skip(db, identity, payload), fields(username = %identity.username, name = %payload.name))]
pub async fn create_asset(
    db: &mut SqliteConnection,
    identity: &Identity,
    payload: &AssetCreate,
) -> Result<AssetResponse> {
    if !policy::can_mutate_assets(identity) {
        return Err(Error::not_authorized(Operation::Create, Resource::Assets));
    }

    let customer_id = resolve_target_customer(identity, payload.customer_id, Operation::Create)?;
    let name = validate_name(&payload.name)?;
    validate_ip(&payload.ip_address)?;
    validate_patch_cycle(payload.patch_cycle)?;
    let configuration = configtext::parse(&payload.configuration)?;

    let asset = Assets::new(db)
        .create(&AssetCreateDBRequest {
            customer_id,
            name,
            asset_type: payload.asset_type,
            ip_address: payload.ip_address.trim().to_string(),
            status: payload.status,
            business_criticality: payload.business_criticality,
            patch_cycle: payload.patch_cycle,
            configuration,
        })
        .await
        .map_err(map_asset_write_err)?;

    Ok(asset.into())
}

#[instrument(skip(db, identity, payload), fields(username = %identity.username, asset_id = %abbrev_uuid(&id)))]
pub async fn update_asset(
    db: &mut SqliteConnection,
    identity: &Identity,
    id: AssetId,
    payload: &AssetUpdate,
) -> Result<AssetResponse> {
    if !policy::can_mutate_assets(identity) {
        return Err(Error::not_authorized(Operation::Update, Resource::Assets));
    }

    let scope = policy::asset_visibility(identity);
    let existing = Assets::new(&mut *db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::Assets, id))?;
    if !scope.permits(existing.customer_id) {
        return Err(Error::not_authorized(Operation::Update, Resource::Assets));
    }

    // Moving an asset between customers re-runs the target pinning rules.
    let customer_id = match payload.customer_id {
        Some(target) if target != existing.customer_id => {
            resolve_target_customer(identity, Some(target), Operation::Update)?
        }
        _ => existing.customer_id,
    };

    let name = match &payload.name {
        Some(name) => validate_name(name)?,
        None => existing.name,
    };
    let ip_address = match &payload.ip_address {
        Some(ip) => {
            validate_ip(ip)?;
            ip.trim().to_string()
        }
        None => existing.ip_address,
    };
    let patch_cycle = payload.patch_cycle.unwrap_or(existing.patch_cycle);
    validate_patch_cycle(patch_cycle)?;
    let configuration = match &payload.configuration {
        Some(text) => configtext::parse(text)?,
        None => existing.configuration,
    };

    let asset = Assets::new(db)
        .update(id, &AssetUpdateDBRequest {
            customer_id,
            name,
            asset_type: payload.asset_type.unwrap_or(existing.asset_type),
            ip_address,
            status: payload.status.unwrap_or(existing.status),
            business_criticality: payload.business_criticality.unwrap_or(existing.business_criticality),
            patch_cycle,
            configuration,
        })
        .await
        .map_err(map_asset_write_err)?;

    Ok(asset.into())
}

#[instrument(skip(db, identity), fields(username = %identity.username, asset_id = %abbrev_uuid(&id)))]
pub async fn delete_asset(db: &mut SqliteConnection, identity: &Identity, id: AssetId) -> Result<()> {
    if !policy::can_mutate_assets(identity) {
        return Err(Error::not_authorized(Operation::Delete, Resource::Assets));
    }

    let existing = Assets::new(&mut *db)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found(Resource::Assets, id))?;
    if !policy::asset_visibility(identity).permits(existing.customer_id) {
        return Err(Error::not_authorized(Operation::Delete, Resource::Assets));
    }

    Assets::new(db).delete(id).await?;
    Ok(())
}

/// Which customer a write lands on. Self-service users are pinned to their
/// own customer; managers must stay inside their assigned set; admins must
/// name a customer explicitly.
fn resolve_target_customer(
    identity: &Identity,
    requested: Option<CustomerId>,
    action: Operation,
) -> Result<CustomerId> {
    match identity.role_tag() {
        // A self-service user's writes always land on their own customer;
        // any client-supplied customer id is overwritten, not rejected.
        Some(Role::User) => identity
            .customer_id
            .ok_or(Error::not_authorized(action, Resource::Assets)),
        Some(Role::Manager) => {
            let target = requested.ok_or_else(|| Error::validation("A customer must be specified"))?;
            if policy::asset_visibility(identity).permits(target) {
                Ok(target)
            } else {
                Err(Error::not_authorized(action, Resource::Assets))
            }
        }
        Some(Role::Admin) => requested.ok_or_else(|| Error::validation("A customer must be specified")),
        None => Err(Error::not_authorized(action, Resource::Assets)),
    }
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Name is required"));
    }
    Ok(name.to_string())
}

fn validate_ip(ip: &str) -> Result<()> {
    ip.trim()
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| Error::validation("Enter a valid IPv4 or IPv6 address."))
}

fn validate_patch_cycle(patch_cycle: i64) -> Result<()> {
    if patch_cycle < 1 {
        return Err(Error::validation("Patch cycle must be at least 1 day"));
    }
    Ok(())
}

fn map_asset_write_err(err: DbError) -> Error {
    match err {
        DbError::UniqueViolation { .. } => {
            Error::validation("An asset with this name already exists for this customer")
        }
        DbError::ForeignKeyViolation { .. } => Error::validation("Unknown customer"),
        other => Error::Database(other),
    }
}
