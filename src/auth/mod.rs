//! Client authentication.
//!
//! The [`Authenticator`] never stores passwords. For every request carrying
//! an `Authorization` header it asks the application, through the
//! authentication callback in [`ServerEvents`], whether the login is accepted
//! and which password to verify against.

pub mod basic;
pub mod digest;

use std::fmt;

use chrono::Utc;
use serde::Deserialize;

use crate::events::ServerEvents;

pub use basic::BasicCredentials;
pub use digest::DigestAuthorization;

/// Authentication scheme required from clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationMethod {
    #[default]
    None,
    Basic,
    Digest,
}

impl AuthenticationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMethod::None => "None",
            AuthenticationMethod::Basic => "Basic",
            AuthenticationMethod::Digest => "Digest",
        }
    }
}

impl fmt::Display for AuthenticationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials handed to the authentication callback.
///
/// The callback receives the login sent by the client with an empty
/// `password` and `accept` set to `true`. It fills in the real password and
/// may clear `accept` to reject the user outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub method: AuthenticationMethod,
    pub accept: bool,
}

impl Credentials {
    pub fn new(login: impl Into<String>, method: AuthenticationMethod) -> Self {
        Self {
            login: login.into(),
            password: String::new(),
            method,
            accept: true,
        }
    }
}

/// Verifies `Authorization` headers against one configured method.
#[derive(Debug, Clone, Copy)]
pub struct Authenticator {
    method: AuthenticationMethod,
}

impl Authenticator {
    pub fn new(method: AuthenticationMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> AuthenticationMethod {
        self.method
    }

    /// Whether requests without an established login must be rejected.
    pub fn is_required(&self) -> bool {
        self.method != AuthenticationMethod::None
    }

    /// Returns the verified credentials, or `None` when the header is absent,
    /// malformed, uses another scheme, or fails verification.
    pub fn authenticate(
        &self,
        authorization: Option<&str>,
        http_method: &str,
        events: &ServerEvents,
    ) -> Option<Credentials> {
        if self.method == AuthenticationMethod::None {
            return None;
        }

        let (scheme, params) = authorization?.trim().split_once(' ')?;

        match (self.method, scheme) {
            (AuthenticationMethod::Basic, "Basic") => {
                let decoded = basic::decode(params)?;
                let mut creds = Credentials::new(decoded.login, AuthenticationMethod::Basic);
                events.authenticate(&mut creds);

                if creds.accept && creds.password == decoded.password {
                    Some(creds)
                } else {
                    tracing::debug!(login = %creds.login, "Basic authentication rejected");
                    None
                }
            }
            (AuthenticationMethod::Digest, "Digest") => {
                let digest = DigestAuthorization::parse(params);
                let mut creds =
                    Credentials::new(digest.username.clone(), AuthenticationMethod::Digest);
                events.authenticate(&mut creds);

                if creds.accept && digest.check_valid(http_method, &creds.password) {
                    Some(creds)
                } else {
                    tracing::debug!(login = %creds.login, "Digest authentication rejected");
                    None
                }
            }
            _ => None,
        }
    }

    /// `WWW-Authenticate` value for a 401 response, `None` when no
    /// authentication is configured.
    pub fn challenge(&self, remote_ip: &str, host: &str) -> Option<String> {
        match self.method {
            AuthenticationMethod::None => None,
            AuthenticationMethod::Basic => Some(basic::challenge(host)),
            AuthenticationMethod::Digest => {
                Some(digest::compose_challenge(remote_ip, host, Utc::now()))
            }
        }
    }
}
