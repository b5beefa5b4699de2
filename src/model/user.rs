use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role_id: u8,
    pub organization_id: Option<u64>,
    pub is_active: bool,
}

/// Public projection of a user, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "email": "grace@example.org",
    "full_name": "Grace Hopper",
    "organization_id": 1,
    "is_active": true
}))]
pub struct UserSummary {
    pub id: u64,
    pub email: String,
    pub full_name: String,
    #[schema(nullable = true)]
    pub organization_id: Option<u64>,
    pub is_active: bool,
}
