//! Role-based visibility scopes and mutation gates.
//!
//! Visibility is expressed as a [`CustomerScope`] over owning-customer ids;
//! the query layer renders it into SQL and mutation paths test individual
//! rows against it. Mutation gates are pure role-tag checks and must be
//! evaluated before any row is loaded.

use crate::auth::identity::Identity;
use crate::db::models::user_roles::Role;
use crate::types::CustomerId;
use std::collections::HashSet;

/// Which customers' rows a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerScope {
    /// Every row (admin).
    All,
    /// Rows belonging to an explicit customer set; an empty set matches nothing.
    Assigned(HashSet<CustomerId>),
    /// No rows.
    None,
}

impl CustomerScope {
    /// Whether a row owned by `customer_id` is inside this scope.
    pub fn permits(&self, customer_id: CustomerId) -> bool {
        match self {
            CustomerScope::All => true,
            CustomerScope::Assigned(customers) => customers.contains(&customer_id),
            CustomerScope::None => false,
        }
    }
}

fn own_customer_scope(identity: &Identity) -> CustomerScope {
    match identity.customer_id {
        Some(customer_id) => CustomerScope::Assigned(HashSet::from([customer_id])),
        None => CustomerScope::None,
    }
}

/// Visible assets: admin sees all, managers their assigned customers' assets,
/// self-service users only their own customer's assets.
pub fn asset_visibility(identity: &Identity) -> CustomerScope {
    match &identity.role {
        Some(grant) => match grant.role {
            Role::Admin => CustomerScope::All,
            Role::Manager => CustomerScope::Assigned(grant.customers.clone()),
            Role::User => own_customer_scope(identity),
        },
        None => CustomerScope::None,
    }
}

/// Visible customers. For customers the scope is over the customer rows
/// themselves; a self-service user sees only the customer they own.
pub fn customer_visibility(identity: &Identity) -> CustomerScope {
    match &identity.role {
        Some(grant) => match grant.role {
            Role::Admin => CustomerScope::All,
            Role::Manager => CustomerScope::Assigned(grant.customers.clone()),
            Role::User => own_customer_scope(identity),
        },
        None => CustomerScope::None,
    }
}

/// Visible role records: admin all, managers those touching their assigned
/// customers, self-service users none.
pub fn user_role_visibility(identity: &Identity) -> CustomerScope {
    match &identity.role {
        Some(grant) => match grant.role {
            Role::Admin => CustomerScope::All,
            Role::Manager => CustomerScope::Assigned(grant.customers.clone()),
            Role::User => CustomerScope::None,
        },
        None => CustomerScope::None,
    }
}

/// Any role may attempt asset writes; row-level scope decides the rest.
pub fn can_mutate_assets(identity: &Identity) -> bool {
    identity.role.is_some()
}

pub fn can_mutate_customers(identity: &Identity) -> bool {
    matches!(identity.role_tag(), Some(Role::Admin | Role::Manager))
}

pub fn can_manage_user_roles(identity: &Identity) -> bool {
    matches!(identity.role_tag(), Some(Role::Admin | Role::Manager))
}

pub fn can_create_users(identity: &Identity) -> bool {
    matches!(identity.role_tag(), Some(Role::Admin | Role::Manager))
}
