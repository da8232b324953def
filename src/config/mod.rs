//! Template definition records
//!
//! A definition record is a schema-free `KEY=value` file describing one
//! buildable template. Records are discovered by the [`Registry`], resolved
//! into a [`ConfigMapping`] by the [`Resolver`], and validated into a typed
//! [`TemplateDefinition`] by the build pipeline.

pub mod definition;
pub mod parser;
pub mod registry;
pub mod resolver;

pub use definition::{ImageSource, TemplateDefinition};
pub use registry::{Registry, derive_identifier};
pub use resolver::{Resolver, load_constants};

use serde::Serialize;
use std::collections::BTreeMap;

/// Open key/value mapping recovered from one record
///
/// Keys are exactly the assignment names present in the source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigMapping(BTreeMap<String, String>);

impl ConfigMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a key, treating empty values as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First set value among `keys`, in order
    pub fn get_first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    /// Exact stored value, including empty strings
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}
