//! Audit metadata attached to one write operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who performed a write and when. Created once per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    user_id: String,
    username: String,
    timestamp: DateTime<Utc>,
}

impl Metadata {
    /// Metadata stamped with the current time.
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self::at(user_id, username, Utc::now())
    }

    pub fn at(
        user_id: impl Into<String>,
        username: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            timestamp,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
