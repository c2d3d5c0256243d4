//! Multi-tenant IT asset inventory core.
//!
//! Customers own assets and users own at most one customer. A user's role
//! record decides what they may see and do. The crate is organized as:
//!
//! - [`auth`]: caller identity resolution and the authorization policy
//!   (visibility scopes, mutation gates)
//! - [`configtext`]: the `key=value` codec for asset configuration text
//! - [`db`]: SQLite pool, migrations, and the repository layer
//! - [`services`]: identity-aware operations over assets, customers, roles,
//!   and user provisioning
//!
//! Every service call takes the resolved [`auth::Identity`] explicitly;
//! nothing in here reads ambient authentication state.

pub mod auth;
pub mod config;
pub mod configtext;
pub mod db;
pub mod errors;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use errors::{Error, Result};
