use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{IntegrationId, UserId};

/// A connected external provider, scoped to a user.
///
/// Tokens are stored as opaque ciphertext; decryption is performed by the
/// credential assembler using an externally supplied key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub user_id: UserId,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_ciphertext: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_ciphertext: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub active: bool,
}
