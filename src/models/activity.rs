use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit entry, stored under the acting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: String,
    pub actor_id: String,
    pub action: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}
