use std::env;

/// Read access to process environment variables.
///
/// Configuration is loaded through this trait so tests can supply variables
/// without touching the real process environment.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;

    /// Every variable whose name and value are valid unicode.
    fn vars(&self) -> Vec<(String, String)>;
}

/// Zero-sized type, delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        env::var(key)
    }

    fn vars(&self) -> Vec<(String, String)> {
        env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

#[cfg(test)]
pub(crate) use in_memory::InMemoryEnv;

#[cfg(test)]
mod in_memory {
    use std::collections::BTreeMap;
    use std::env;

    use super::ReadEnv;

    #[derive(Default)]
    pub(crate) struct InMemoryEnv {
        vars: BTreeMap<String, String>,
    }

    impl InMemoryEnv {
        pub(crate) fn with(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.to_owned(), value.to_owned());
            self
        }
    }

    impl ReadEnv for InMemoryEnv {
        fn var(&self, key: &str) -> Result<String, env::VarError> {
            self.vars.get(key).cloned().ok_or(env::VarError::NotPresent)
        }

        fn vars(&self) -> Vec<(String, String)> {
            self.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        }
    }
}
