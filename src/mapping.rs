//! Route key → backend base URL table, built from `PROXY_*` variables.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::config::ConfigError;

pub const PREFIX: &str = "PROXY_";

/// Route key for a `PROXY_` suffix: lowercased, `_` replaced by `-`.
///
/// `TEST_API` → `test-api`.
pub fn route_key(suffix: &str) -> String {
    suffix.to_lowercase().replace('_', "-")
}

/// Immutable after construction. Share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProxyMapping {
    routes: HashMap<String, String>,
}

impl ProxyMapping {
    /// Builds the table from environment-style pairs, ignoring any name
    /// without the `PROXY_` prefix.
    ///
    /// Base URLs are stored exactly as given; the outbound URL is the base
    /// with the request remainder appended, so a trailing slash on the base
    /// produces a double slash.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut routes: HashMap<String, String> = HashMap::new();
        for (name, base) in vars {
            let Some(suffix) = name.as_ref().strip_prefix(PREFIX) else {
                continue;
            };
            let key = route_key(suffix);
            if key.is_empty() {
                return Err(ConfigError::EmptyRouteKey);
            }
            let base = base.into();
            if let Err(source) = url::Url::parse(&base) {
                return Err(ConfigError::InvalidBaseUrl { key, base, source });
            }
            match routes.entry(key) {
                Entry::Occupied(existing) => {
                    return Err(ConfigError::DuplicateRoute {
                        key: existing.key().clone(),
                        first: existing.get().clone(),
                        second: base,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(base);
                }
            }
        }
        Ok(Self { routes })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.routes.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
