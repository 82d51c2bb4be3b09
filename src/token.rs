//! Client token derivation for named connections.

use crate::constants::{CLIENT_TOKEN_SUFFIX, DEFAULT_CONNECTION_NAME};

/// Get the token a connection's client is stored under.
///
/// `None` resolves to [`DEFAULT_CONNECTION_NAME`].
pub fn client_token(connection_name: Option<&str>) -> String {
    let name = connection_name.unwrap_or(DEFAULT_CONNECTION_NAME);
    format!("{name}{CLIENT_TOKEN_SUFFIX}")
}

/// Resolve an optional connection name to the effective name
pub fn resolve_connection_name(connection_name: Option<&str>) -> String {
    connection_name
        .unwrap_or(DEFAULT_CONNECTION_NAME)
        .to_string()
}
