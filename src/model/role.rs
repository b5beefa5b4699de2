use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin = 1,
    Leader = 2,
    Member = 3,
    Guest = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Leader),
            3 => Some(Role::Member),
            4 => Some(Role::Guest),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Admins and leaders may record attendance on behalf of other members.
    pub fn is_recorder(self) -> bool {
        matches!(self, Role::Admin | Role::Leader)
    }
}
