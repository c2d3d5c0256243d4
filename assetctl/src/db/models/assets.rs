//! Database models for assets.

use crate::configtext::ConfigMapping;
use crate::types::{AssetId, CustomerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of inventoried asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AssetType {
    Server,
    Network,
    Storage,
}

/// Business criticality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Criticality {
    Critical,
    High,
    Normal,
    Low,
    Test,
}

/// Database request for creating a new asset
#[derive(Debug, Clone)]
pub struct AssetCreateDBRequest {
    pub customer_id: CustomerId,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    pub configuration: ConfigMapping,
}

/// Database request for updating an asset. All fields are written; the
/// service layer merges partial payloads against the existing row first.
#[derive(Debug, Clone)]
pub struct AssetUpdateDBRequest {
    pub customer_id: CustomerId,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    pub configuration: ConfigMapping,
}

/// Database response for an asset
#[derive(Debug, Clone)]
pub struct AssetDBResponse {
    pub id: AssetId,
    pub customer_id: CustomerId,
    pub name: String,
    pub asset_type: AssetType,
    pub ip_address: String,
    pub status: bool,
    pub business_criticality: Criticality,
    pub patch_cycle: i64,
    pub configuration: ConfigMapping,
    pub last_checked: DateTime<Utc>,
}
