// src/route.rs
use std::collections::HashMap;

/// Route parameter naming the feature shown by the detail view.
pub const FEATURE_NAME_PARAM: &str = "feature-name";

/// Parameters of the active navigation location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    params: HashMap<String, String>,
}

impl RouteParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a location that only names a feature.
    pub fn for_feature(name: &str) -> Self {
        Self::new().with(FEATURE_NAME_PARAM, name)
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn feature_name(&self) -> Option<&str> {
        self.get(FEATURE_NAME_PARAM)
    }
}

impl From<HashMap<String, String>> for RouteParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self { params }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RouteParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
