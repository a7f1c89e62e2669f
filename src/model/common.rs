use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type Id = String;

/// NiFi optimistic-concurrency token. Every mutation of a component must
/// echo the revision it last read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Revision {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            client_id: None,
        }
    }

    /// The revision a successful write produces on the server.
    pub fn next(&self) -> Self {
        Self {
            version: self.version + 1,
            client_id: self.client_id.clone(),
        }
    }
}

/// Canvas coordinates for newly placed components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}
