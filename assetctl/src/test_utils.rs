//! Shared fixtures for the service-layer tests.

use crate::auth::Identity;
use crate::db::handlers::{Customers, Repository, UserRoles, Users};
use crate::db::models::customers::{CustomerCreateDBRequest, CustomerDBResponse};
use crate::db::models::user_roles::{Role, UserRoleCreateDBRequest};
use crate::db::models::users::{UserCreateDBRequest, UserDBResponse};
use crate::types::{CustomerId, UserId};
use sqlx::SqlitePool;

pub async fn seed_user(pool: &SqlitePool, username: &str, is_staff: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_staff,
        })
        .await
        .unwrap()
}

pub async fn seed_customer(pool: &SqlitePool, owner: UserId, name: &str) -> CustomerDBResponse {
    let mut conn = pool.acquire().await.unwrap();
    Customers::new(&mut conn)
        .create(&CustomerCreateDBRequest {
            owner_user_id: owner,
            display_name: name.to_string(),
            legal_name: format!("{name} Ltd"),
            contact_person: name.to_string(),
        })
        .await
        .unwrap()
}

pub async fn grant_role(pool: &SqlitePool, user_id: UserId, role: Role, customers: &[CustomerId]) {
    let mut conn = pool.acquire().await.unwrap();
    UserRoles::new(&mut conn)
        .create(&UserRoleCreateDBRequest {
            user_id,
            role,
            customers: customers.to_vec(),
        })
        .await
        .unwrap();
}

/// Resolves a full identity the way request entry would.
pub async fn identity_for(pool: &SqlitePool, user_id: UserId) -> Identity {
    let mut conn = pool.acquire().await.unwrap();
    Identity::resolve(&mut conn, user_id)
        .await
        .unwrap()
        .expect("user should exist")
}
