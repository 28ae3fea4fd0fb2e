//! HTTP Basic authentication (RFC 7617).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Login and password carried by a Basic `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub login: String,
    pub password: String,
}

/// Decodes the parameter of `Authorization: Basic <param>`.
///
/// Returns `None` when the parameter is not valid base64, not UTF-8, or
/// carries no `:` separator. The password may itself contain `:`.
pub fn decode(param: &str) -> Option<BasicCredentials> {
    let bytes = STANDARD.decode(param.trim()).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    let (login, password) = decoded.split_once(':')?;

    Some(BasicCredentials {
        login: login.to_string(),
        password: password.to_string(),
    })
}

/// Builds the `WWW-Authenticate` value sent with a 401.
pub fn challenge(realm: &str) -> String {
    format!("Basic realm=\"{}\"", realm)
}
