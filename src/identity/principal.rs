use serde::{Deserialize, Serialize};

/// Identity resolved from a validated bearer token. Owned by the identity provider;
/// the service only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    #[serde(rename = "id")]
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Principal {
    pub fn new<S: Into<String>>(user_id: S, email: Option<String>) -> Self {
        Self { user_id: user_id.into(), email }
    }
}
