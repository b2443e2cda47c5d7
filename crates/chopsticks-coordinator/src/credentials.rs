//! The credentials/endpoint YAML environment contract (`spec.md` §6):
//! "semantic keys: `endpoint`, `access_key`, `secret_key`, `bucket`,
//! `region`, `driver`, optional `driver_config`". This is the configuration
//! whose absence drives the "config invalid -> blocked" branch of
//! `status::project_status` and every action handler's guard 2.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub driver: String,
    #[serde(default)]
    pub driver_config: Option<String>,
}

/// Each field is listed with the name reported in the "missing required
/// configuration" message when absent.
const REQUIRED_FIELDS: &[&str] = &["endpoint", "access_key", "secret_key", "bucket", "region", "driver"];

impl Credentials {
    /// Load from the configured path, reporting the first empty required
    /// field by name (`status::project_status`'s `missing_config_field`).
    pub fn load(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path).map_err(|e| format!("{e}"))?;
        let credentials: Self = serde_yaml::from_str(&contents).map_err(|e| format!("{e}"))?;
        credentials.first_missing_field().map_or(Ok(credentials), |field| {
            Err(format!("missing required configuration: {field}"))
        })
    }

    /// The first required field (in declaration order) that is empty, or
    /// `None` if every required field is populated.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        let values: [(&'static str, &str); 6] = [
            ("endpoint", &self.endpoint),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("driver", &self.driver),
        ];
        values
            .into_iter()
            .find(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
    }

    pub fn is_valid(&self) -> bool {
        self.first_missing_field().is_none()
    }
}
