//! Query string and form body decoding.
//!
//! Pairs are split on `&` and then on the first `=`. Values are passed
//! through exactly as sent, without percent-decoding.

use std::collections::HashMap;

use crate::http::request::Request;

const URLENCODED: &str = "application/x-www-form-urlencoded";

/// Splits `a=1&b=2` style input into a map. A key without `=` maps to an
/// empty value; empty segments are skipped; a repeated key keeps its last value.
pub fn parse_pairs(input: &str) -> HashMap<String, String> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Extracts the multipart boundary from a `Content-Type` value, with
/// surrounding quotes and dashes removed.
pub fn multipart_boundary(content_type: &str) -> Option<String> {
    let (_, rest) = content_type.split_once("boundary=")?;
    let boundary = rest.split(';').next().unwrap_or(rest).trim();
    Some(boundary.trim_matches('"').trim_matches('-').to_string())
}

/// Decoded POST body.
///
/// URL-encoded bodies populate `fields`. Any other body is kept as-is: raw
/// bytes in `binary` for multipart uploads (with `boundary`), text in `raw`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: HashMap<String, String>,
    raw: String,
    binary: Option<Vec<u8>>,
    boundary: Option<String>,
}

impl Form {
    pub fn from_request(request: &Request) -> Self {
        let content_type = request.content_type().unwrap_or_default();

        if content_type.starts_with(URLENCODED) {
            return Self {
                fields: parse_pairs(&request.body),
                raw: request.body.clone(),
                ..Self::default()
            };
        }

        Self {
            fields: HashMap::new(),
            raw: request.body.clone(),
            binary: request.binary.clone(),
            boundary: multipart_boundary(content_type),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    /// The body text as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn binary(&self) -> Option<&[u8]> {
        self.binary.as_deref()
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }
}
