//! Database record structures matching table schemas.
//!
//! Each entity has `*CreateDBRequest` / `*UpdateDBRequest` structs consumed by
//! its repository and a `*DBResponse` struct returned from it. Conversions
//! from the service-layer payloads live next to those payloads.

pub mod assets;
pub mod customers;
pub mod user_roles;
pub mod users;
