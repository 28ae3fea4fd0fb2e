//! HTTP Digest authentication (RFC 2617, `qop=auth`, MD5).
//!
//! The server keeps no nonce state: nonces are derived from the client
//! address and the current time, and `nc`/`cnonce` are taken from the client
//! as sent. Replayed responses are therefore accepted for as long as the
//! callback keeps accepting the user.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

use crate::http::writer::format_http_date;

const OPAQUE_SEED: &str = "ember digest opaque";

/// Parameters of an `Authorization: Digest ...` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestAuthorization {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub opaque: String,
    pub cnonce: String,
    pub nc: String,
    pub qop: String,
}

impl DigestAuthorization {
    /// Parses the parameter list that follows the `Digest` scheme token.
    ///
    /// Parameters may be separated by commas, whitespace or both. Quoted
    /// values may contain either separator. Unknown keys are ignored.
    pub fn parse(params: &str) -> Self {
        let mut auth = Self::default();

        for token in split_params(params) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_end_matches(',').trim_matches('"').to_string();

            match key.trim() {
                "username" => auth.username = value,
                "realm" => auth.realm = value,
                "nonce" => auth.nonce = value,
                "uri" => auth.uri = value,
                "response" => auth.response = value,
                "opaque" => auth.opaque = value,
                "cnonce" => auth.cnonce = value,
                "nc" => auth.nc = value,
                "qop" => auth.qop = value,
                _ => {}
            }
        }

        auth
    }

    /// Computes the response a client knowing `password` would send.
    pub fn expected_response(&self, method: &str, password: &str) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", self.username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, self.uri));

        md5_hex(&format!(
            "{}:{}:{}:{}:{}:{}",
            ha1, self.nonce, self.nc, self.cnonce, self.qop, ha2
        ))
    }

    pub fn check_valid(&self, method: &str, password: &str) -> bool {
        self.expected_response(method, password)
            .eq_ignore_ascii_case(&self.response)
    }
}

/// Lowercase hex MD5 of the bytes of `input`.
pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Builds the `WWW-Authenticate` value sent with a 401.
pub fn compose_challenge(remote_ip: &str, realm: &str, now: DateTime<Utc>) -> String {
    let nonce = md5_hex(&format!("{}:{}", remote_ip, format_http_date(now)));
    let opaque = md5_hex(OPAQUE_SEED);

    format!(
        "Digest qop=auth, nonce=\"{}\", realm=\"{}\", opaque=\"{}\"",
        nonce, realm, opaque
    )
}

fn split_params(params: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in params.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' | ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_string() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn rfc2617_example() {
        let auth = DigestAuthorization {
            username: "Mufasa".into(),
            realm: "testrealm@host.com".into(),
            nonce: "dcd98b7102dd2f0e8b11d0f600bfb0c093".into(),
            uri: "/dir/index.html".into(),
            response: "6629fae49393a05397450978507c4ef1".into(),
            opaque: "5ccc069c403ebaf9f0171e9517f40e41".into(),
            cnonce: "0a4f113b".into(),
            nc: "00000001".into(),
            qop: "auth".into(),
        };

        assert!(auth.check_valid("GET", "Circle Of Life"));
        assert!(!auth.check_valid("GET", "circle of life"));
    }

    #[test]
    fn quoted_values_keep_separators() {
        let auth = DigestAuthorization::parse(r#"username="John Doe", uri="/a,b""#);
        assert_eq!(auth.username, "John Doe");
        assert_eq!(auth.uri, "/a,b");
    }
}
