use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

/// Entry in the review queue. Documents are recorded by name only; the
/// upload itself happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycApplication {
    pub uid: String,
    pub name: String,
    pub role: Role,
    pub business_name: String,
    pub registration_number: String,
    #[serde(default)]
    pub document_names: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}
