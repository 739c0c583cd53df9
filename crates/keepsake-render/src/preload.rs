use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Pre-inlined images keyed by block site (`node_<id>_<contentId>`,
/// `standalone_<id>`, `avatar_<id>`).
///
/// Consulted when a live lookup fails, so the fallback chain is
/// user upload, then preloaded image, then placeholder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreloadManifest(BTreeMap<String, String>);

impl PreloadManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, literal: impl Into<String>) {
        self.0.insert(key.into(), literal.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PreloadManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
