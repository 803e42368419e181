use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::dataset::FileType;

fn default_max_file_size() -> String {
    "100MB".to_string()
}

fn default_supported_formats() -> Vec<String> {
    FileType::ALL
        .iter()
        .map(|file_type| file_type.extension().to_string())
        .collect()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Options published by the remote service. Read-only except through
/// `SessionStore::update_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub multi_user_mode: bool,
    /// Informational only; the client never enforces a size ceiling.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            multi_user_mode: false,
            max_file_size: default_max_file_size(),
            supported_formats: default_supported_formats(),
            version: default_version(),
            extra: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.supported_formats
            .iter()
            .any(|format| format.eq_ignore_ascii_case(ext))
    }
}
