//! Service layer: every operation takes the caller's [`Identity`] and runs
//! the role gate before any visibility check or database work.
//!
//! Repositories never see an identity; by the time a filter reaches them the
//! scope has already been decided here.
//!
//! [`Identity`]: crate::auth::Identity

pub mod assets;
pub mod customers;
pub mod provisioning;
pub mod user_roles;
