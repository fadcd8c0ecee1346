//! Startup configuration, read once from the environment.

use std::env::VarError;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::ReadEnv;
use crate::mapping::ProxyMapping;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_APP_NAME: &str = "authgate";
const DEFAULT_STS_URL: &str = "http://security-token-service.default/rest/v1/sts/token";
const DEFAULT_USERNAME_PATH: &str = "/secrets/serviceuser/username";
const DEFAULT_PASSWORD_PATH: &str = "/secrets/serviceuser/password";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("APPLICATION_PORT is not a port number: {0:?}")]
    InvalidPort(String),

    #[error("PROXY_ variable without a route name")]
    EmptyRouteKey,

    #[error("route {key}: invalid base url {base:?}: {source}")]
    InvalidBaseUrl {
        key: String,
        base: String,
        #[source]
        source: url::ParseError,
    },

    #[error("route {key} configured twice ({first} and {second})")]
    DuplicateRoute {
        key: String,
        first: String,
        second: String,
    },

    #[error("cannot read {}: {source}", .path.display())]
    ReadSecret {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct Config {
    pub(crate) port: u16,
    pub(crate) app_name: String,
    pub(crate) client_id: String,
    pub(crate) jwks_url: String,
    pub(crate) issuer: String,
    pub(crate) sts_url: String,
    pub(crate) username_path: PathBuf,
    pub(crate) password_path: PathBuf,
    pub(crate) mapping: ProxyMapping,
}

impl Config {
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let port = match optional(env, "APPLICATION_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            port,
            app_name: optional(env, "NAIS_APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_owned()),
            client_id: required(env, "AZURE_APP_CLIENT_ID")?,
            jwks_url: required(env, "AZURE_OPENID_CONFIG_JWKS_URI")?,
            issuer: required(env, "AZURE_OPENID_CONFIG_ISSUER")?,
            sts_url: optional(env, "SECURITY_TOKEN_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_STS_URL.to_owned()),
            username_path: optional(env, "SERVICEUSER_USERNAME_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_USERNAME_PATH), PathBuf::from),
            password_path: optional(env, "SERVICEUSER_PASSWORD_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_PASSWORD_PATH), PathBuf::from),
            mapping: ProxyMapping::from_vars(env.vars())?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn app_name(&self) -> &str { &self.app_name }
    pub fn client_id(&self) -> &str { &self.client_id }
    pub fn jwks_url(&self) -> &str { &self.jwks_url }
    pub fn issuer(&self) -> &str { &self.issuer }
    pub fn sts_url(&self) -> &str { &self.sts_url }
    pub fn mapping(&self) -> &ProxyMapping { &self.mapping }

    /// Reads the service-user credentials from their secret files.
    pub fn service_user(&self) -> Result<ServiceUser, ConfigError> {
        ServiceUser::from_files(&self.username_path, &self.password_path)
    }
}

fn optional<E: ReadEnv>(env: &E, key: &str) -> Option<String> {
    match env.var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        Ok(_) | Err(VarError::NotPresent) | Err(VarError::NotUnicode(_)) => None,
    }
}

fn required<E: ReadEnv>(env: &E, key: &'static str) -> Result<String, ConfigError> {
    optional(env, key).ok_or(ConfigError::Missing(key))
}

/// Credentials the proxy authenticates with against the token service.
#[derive(Clone)]
pub struct ServiceUser {
    pub username: String,
    pub password: String,
}

impl ServiceUser {
    pub fn from_files(username: &Path, password: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            username: read_secret(username)?,
            password: read_secret(password)?,
        })
    }
}

impl fmt::Debug for ServiceUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceUser")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn read_secret(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_owned())
        .map_err(|source| ConfigError::ReadSecret { path: path.to_owned(), source })
}
