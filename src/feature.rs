// src/feature.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feature as served by the Laika API.
///
/// `status` maps an environment name to whether the feature is enabled there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub name: String,
    #[serde(default)]
    pub status: BTreeMap<String, bool>,
}

impl Feature {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            created_at: None,
            name: name.to_string(),
            status: BTreeMap::new(),
        }
    }

    /// Returns a copy of this feature with a single environment switched.
    /// The entry is inserted if the environment was not listed yet.
    pub fn with_status(&self, environment: &str, enabled: bool) -> Self {
        let mut updated = self.clone();
        updated.status.insert(environment.to_string(), enabled);
        updated
    }

    pub fn is_enabled_in(&self, environment: &str) -> bool {
        self.status.get(environment).copied().unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateFeature<'a> {
    pub name: &'a str,
}

/// Update body. The server writes every environment it knows from this map,
/// so it must carry the feature's full status.
#[derive(Debug, Serialize)]
pub(crate) struct StatusPatch<'a> {
    pub status: &'a BTreeMap<String, bool>,
}

impl<'a> StatusPatch<'a> {
    pub fn of(feature: &'a Feature) -> Self {
        Self {
            status: &feature.status,
        }
    }
}
