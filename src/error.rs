//! Server-level error type.

use thiserror::Error;

/// The error type returned by the server's fallible operations.
///
/// Request-level failures (401, 502, 500, ...) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding to a port or reading the local address.
#[derive(Debug, Error)]
#[error("io: {0}")]
pub struct Error(#[from] std::io::Error);
