//! Authorization system.
//!
//! The surrounding application authenticates callers; this module decides
//! what an authenticated caller may see and do.
//!
//! - [`identity`]: the resolved caller identity ([`identity::Identity`]),
//!   built once at request entry from the user, role, and assigned-customer
//!   tables. A caller without a role record is denied everywhere.
//! - [`policy`]: row-visibility scopes and role-level mutation gates. The
//!   role gate is always evaluated before any row-level ownership check, so
//!   an unprivileged caller learns nothing about which rows exist.
//!
//! Access follows a capability lattice admin ⊇ manager ⊇ user. Managers are
//! scoped by an explicit assigned-customer set, not an implicit hierarchy;
//! self-service users are pinned to their own linked customer.

pub mod identity;
pub mod policy;

pub use identity::{Identity, RoleGrant};
pub use policy::CustomerScope;
