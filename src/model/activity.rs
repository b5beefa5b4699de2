use serde::{Deserialize, Serialize};

/// The two kinds of gathering an attendance record can hang off.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Event,
    Meeting,
}

impl ActivityKind {
    pub fn table(self) -> &'static str {
        match self {
            ActivityKind::Event => "events",
            ActivityKind::Meeting => "meetings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::Event => "Event",
            ActivityKind::Meeting => "Meeting",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: u64,
    pub organization_id: u64,
    pub title: String,
}
