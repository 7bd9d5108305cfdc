use serde::{Deserialize, Serialize};

/// Endpoints for the microblog API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub api_base: String,
    pub upload_base: String,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twitter.com".into(),
            upload_base: "https://upload.twitter.com".into(),
        }
    }
}
