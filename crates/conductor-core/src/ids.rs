use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro-free newtype boilerplate shared by every identifier below: a
/// time-sortable UUIDv7 wrapped so callers can't mix up which kind of id
/// they're holding.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

id_type!(UserId);
id_type!(ConversationId);
id_type!(MessageId);
id_type!(TaskId);
id_type!(IntegrationId);
id_type!(NotificationId);

/// User role hierarchy: admin > user > child.
///
/// Consulted only by the credential/tool assembler to gate which tools a
/// `QueryPlan` may expose — a `Child` never receives `Bash`/`Edit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
    Child,
}

impl UserRole {
    pub fn is_child(&self) -> bool {
        matches!(self, UserRole::Child)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
            UserRole::Child => write!(f, "child"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            "child" => Ok(UserRole::Child),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
