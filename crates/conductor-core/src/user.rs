use serde::{Deserialize, Serialize};

use crate::ids::{UserId, UserRole};

/// Minimal identity record. Full auth/session handling lives outside this
/// crate — this is just the opaque owner key the rest of the system keys
/// conversations, tasks, integrations and notifications off of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub role: UserRole,
}
