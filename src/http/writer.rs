use chrono::{DateTime, Utc};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::Response;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Value of the `Server` header and the `SERVER_SOFTWARE` variable.
pub const SERVER_SOFTWARE: &str = "ember";

const EXPIRES_IN_THE_PAST: &str = "Thu, 01 Jan 1970 00:00:01 GMT";

/// Formats a timestamp as an RFC 1123 date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Serializes `resp` for the wire.
///
/// `set_cookies` are complete `Set-Cookie` values. A text body is followed
/// by a CRLF that `Content-Length` does not count.
pub fn serialize_response(
    resp: &Response,
    set_cookies: &[String],
    keep_alive: bool,
    date: DateTime<Utc>,
) -> Vec<u8> {
    let mut head = String::with_capacity(256);

    // Status line
    head.push_str(&format!(
        "{} {} {}\r\n",
        HTTP_VERSION, resp.status.code, resp.status.description
    ));

    // Headers
    let mut header = |key: &str, value: &str| {
        head.push_str(key);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    };

    header("Date", &format_http_date(date));
    header("Expires", EXPIRES_IN_THE_PAST);
    header("Server", SERVER_SOFTWARE);
    header("Cache-Control", "no-cache, no-store, must-revalidate");
    header("Pragma", "no-cache");
    header("Content-Length", &resp.content_length().to_string());
    header("Connection", if keep_alive { "keep-alive" } else { "close" });
    header("Content-Type", &resp.content_type_header());
    for cookie in set_cookies {
        header("Set-Cookie", cookie);
    }
    for (key, value) in &resp.headers {
        header(key, value);
    }

    // Header/body separator
    head.push_str("\r\n");

    let mut buf = head.into_bytes();

    // Body
    if resp.is_binary() {
        buf.extend_from_slice(&resp.binary);
    } else {
        buf.extend_from_slice(resp.body.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    buf
}

pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response, set_cookies: &[String], keep_alive: bool) -> Self {
        Self {
            buffer: serialize_response(response, set_cookies, keep_alive, Utc::now()),
            written: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub async fn write_to_stream<S>(&mut self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
