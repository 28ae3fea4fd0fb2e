//! Request and response cookies.

use std::fmt;

use anyhow::Result;

use crate::http::response::ensure_single_line;

/// A cookie as sent in `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub key: String,
    pub value: String,
    pub path: Option<String>,
}

impl Cookie {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)?;
        match &self.path {
            Some(path) if !path.is_empty() => write!(f, ";path={}", path),
            _ => Ok(()),
        }
    }
}

/// Parses a `Cookie` header value into (name, value) pairs.
pub fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Cookies of one request/response cycle.
///
/// Cookies received from the client and cookies set by the handler are kept
/// apart; only the latter produce `Set-Cookie` lines. Lookups see handler-set
/// cookies first.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    incoming: Vec<Cookie>,
    outgoing: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_incoming(&mut self, key: String, value: String) {
        upsert(&mut self.incoming, Cookie::new(key, value));
    }

    pub fn get(&self, key: &str) -> Option<&Cookie> {
        self.outgoing
            .iter()
            .chain(self.incoming.iter())
            .find(|c| c.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets a cookie to be sent back to the client. Cookies with a CR or
    /// LF in any part are rejected.
    pub fn set(&mut self, cookie: Cookie) -> Result<()> {
        ensure_single_line("cookie name", &cookie.key)?;
        ensure_single_line("cookie value", &cookie.value)?;
        if let Some(path) = &cookie.path {
            ensure_single_line("cookie path", path)?;
        }
        upsert(&mut self.outgoing, cookie);
        Ok(())
    }

    /// Forgets a cookie for the rest of this cycle.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.incoming.len() + self.outgoing.len();
        self.incoming.retain(|c| c.key != key);
        self.outgoing.retain(|c| c.key != key);
        before != self.incoming.len() + self.outgoing.len()
    }

    /// Every distinct cookie visible to the handler.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.outgoing.iter().chain(
            self.incoming
                .iter()
                .filter(|c| !self.outgoing.iter().any(|o| o.key == c.key)),
        )
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cookies that become `Set-Cookie` lines.
    pub fn outgoing(&self) -> &[Cookie] {
        &self.outgoing
    }
}

fn upsert(cookies: &mut Vec<Cookie>, cookie: Cookie) {
    match cookies.iter_mut().find(|c| c.key == cookie.key) {
        Some(existing) => *existing = cookie,
        None => cookies.push(cookie),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_cookies_shadow_incoming_ones() {
        let mut jar = CookieJar::new();
        jar.add_incoming("theme".into(), "dark".into());
        jar.add_incoming("lang".into(), "en".into());

        jar.set(Cookie::new("theme", "light").with_path("/")).unwrap();

        assert_eq!(jar.get("theme").unwrap().value, "light");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.outgoing().len(), 1);
    }

    #[test]
    fn remove_drops_both_sides() {
        let mut jar = CookieJar::new();
        jar.add_incoming("a".into(), "1".into());
        jar.set(Cookie::new("a", "2")).unwrap();

        assert!(jar.remove("a"));
        assert!(!jar.contains("a"));
        assert!(jar.is_empty());
        assert!(!jar.remove("a"));
    }

    #[test]
    fn line_breaks_are_refused() {
        let mut jar = CookieJar::new();

        assert!(jar.set(Cookie::new("a", "1\r\nSet-Cookie: admin=1")).is_err());
        assert!(jar.set(Cookie::new("a\n", "1")).is_err());
        assert!(jar.set(Cookie::new("a", "1").with_path("/\r\nX: y")).is_err());
        assert!(jar.is_empty());
    }
}
