use crate::http::request::{Method, Request, is_multipart_content_type};

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Default upper bound on a request body.
pub const DEFAULT_MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Request line without a method and target, or not UTF-8
    InvalidRequest,
    /// Unrecognised method token
    InvalidMethod,
    /// Header line without a `:`
    InvalidHeader,
    InvalidContentLength,
    HeadersTooLarge,
    /// `Content-Length` above the configured body limit
    BodyTooLarge,
    /// Blank line where the request line was expected
    Empty,
    /// More bytes are needed
    Incomplete,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request and the number of bytes it occupied. Lines may end
/// with CRLF or a bare LF. A body is only read for POST: `Content-Length`
/// bytes are kept raw for `multipart/form-data` and decoded as (lossy)
/// UTF-8 text otherwise. Bytes after the request are left for the next one.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse_http_request_limited(buf, DEFAULT_MAX_BODY_SIZE)
}

/// Like [`parse_http_request`], rejecting bodies longer than `max_body`
/// bytes as soon as the head is complete.
pub fn parse_http_request_limited(
    buf: &[u8],
    max_body: usize,
) -> Result<(Request, usize), ParseError> {
    let (head_len, body_start) = match find_head_end(buf) {
        Some(_) if buf.starts_with(b"\n") || buf.starts_with(b"\r\n") => {
            return Err(ParseError::Empty);
        }
        Some(found) => found,
        None if buf.len() > MAX_HEAD_SIZE => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };

    if head_len > MAX_HEAD_SIZE {
        return Err(ParseError::HeadersTooLarge);
    }

    let head = std::str::from_utf8(&buf[..head_len]).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = head
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty());

    // Request line
    let request_line = lines.next().ok_or(ParseError::Empty)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().unwrap_or("HTTP/1.1");

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    // Headers
    let mut headers = Vec::new();

    for line in lines {
        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    let mut request = Request {
        method,
        path: path.to_string(),
        query: query.to_string(),
        version: version.to_string(),
        headers,
        body: String::new(),
        binary: None,
    };

    if request.method != Method::POST {
        return Ok((request, body_start));
    }

    // Body
    let content_length = request
        .header("Content-Length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);
    if content_length > max_body {
        return Err(ParseError::BodyTooLarge);
    }

    let body_bytes = &buf[body_start..];
    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let body = &body_bytes[..content_length];
    if content_length > 0 {
        if request.content_type().is_some_and(is_multipart_content_type) {
            request.binary = Some(body.to_vec());
        } else {
            request.body = String::from_utf8_lossy(body).into_owned();
        }
    }

    Ok((request, body_start + content_length))
}

/// Finds the blank line ending the head. Returns the length of the head
/// (excluding the blank line) and the offset of the first body byte.
fn find_head_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;

    for (i, &b) in buf.iter().enumerate() {
        if b != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Some((line_start, i + 1));
        }
        line_start = i + 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.header("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn head_end_with_bare_newlines() {
        assert_eq!(find_head_end(b"GET / HTTP/1.1\nA: b\n\nrest"), Some((20, 21)));
        assert_eq!(find_head_end(b"GET / HTTP/1.1\r\n"), None);
    }

    #[test]
    fn oversized_body_rejected_before_it_arrives() {
        let req = b"POST /upload HTTP/1.1\r\nContent-Length: 4096\r\n\r\npartial";

        assert_eq!(
            parse_http_request_limited(req, 1024).unwrap_err(),
            ParseError::BodyTooLarge
        );
        assert_eq!(
            parse_http_request_limited(req, 4096).unwrap_err(),
            ParseError::Incomplete
        );
    }
}
