use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};

/// HTTP status codes the server itself produces.
///
/// - `Ok` (200): Request successful
/// - `MovedPermanently` (301) / `Found` (302): Redirects issued by handlers
/// - `BadRequest` (400): Malformed or empty request
/// - `Unauthorized` (401): Missing or invalid credentials
/// - `NotFound` (404): No route matches the path
/// - `MethodNotAllowed` (405): Method other than GET or POST
/// - `InternalServerError` (500): Handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::MovedPermanently => 301,
            StatusCode::Found => 302,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use ember::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    fn error_message(&self) -> &'static str {
        match self {
            StatusCode::BadRequest => "<h1>Bad request</h1>",
            StatusCode::Unauthorized => "<h1>Unauthorized</h1>",
            StatusCode::NotFound => "<h1>Resource not found</h1>",
            StatusCode::MethodNotAllowed => "<h1>Method not allowed</h1>",
            StatusCode::InternalServerError => {
                "<h1>Sorry, the server cannot process this request now, try later...</h1>"
            }
            _ => "",
        }
    }
}

/// Status line content: any code with any description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub description: String,
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Self {
            code: code.as_u16(),
            description: code.reason_phrase().to_string(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status string {:?}, expected \"CODE DESCRIPTION\"", self.0)
    }
}

impl std::error::Error for InvalidStatus {}

impl FromStr for Status {
    type Err = InvalidStatus;

    /// Parses `"404 Not Found"`. The description may contain spaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (code, description) = s
            .split_once(' ')
            .ok_or_else(|| InvalidStatus(s.to_string()))?;
        let code = code
            .parse::<u16>()
            .ok()
            .filter(|c| (100..1000).contains(c))
            .ok_or_else(|| InvalidStatus(s.to_string()))?;

        if description.contains(['\r', '\n']) {
            return Err(InvalidStatus(s.to_string()));
        }

        Ok(Self {
            code,
            description: description.to_string(),
        })
    }
}

/// Response being assembled for one request/response cycle.
///
/// Handlers write text with [`write`](Self::write) or bytes with
/// [`write_binary`](Self::write_binary). If any bytes were written the
/// binary buffer is sent and the text buffer is ignored.
#[derive(Debug)]
pub struct Response {
    pub status: Status,
    /// Text body
    pub body: String,
    /// Binary body, sent verbatim when non-empty
    pub binary: Vec<u8>,
    /// Extra headers in the order they were added
    pub headers: Vec<(String, String)>,
    pub content_type: String,
    pub encoding: String,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// 200 OK, `text/html`, `utf-8`, empty body.
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok.into(),
            body: String::new(),
            binary: Vec::new(),
            headers: Vec::new(),
            content_type: "text/html".to_string(),
            encoding: "utf-8".to_string(),
        }
    }

    /// Builds the minimal HTML error page for `status`.
    pub fn error(status: StatusCode) -> Self {
        let mut response = Self::new();
        response.set_error(status);
        response
    }

    /// Discards everything written so far and turns this into the error page
    /// for `status`.
    pub fn set_error(&mut self, status: StatusCode) {
        self.binary.clear();
        self.headers.clear();
        self.content_type = "text/html".to_string();
        self.encoding = "utf-8".to_string();
        self.status = status.into();
        self.body = format!(
            "<html><head><title>{} - {}</title></head><body>{}</body></html>",
            status.as_u16(),
            status.reason_phrase(),
            status.error_message()
        );
    }

    pub fn write(&mut self, text: &str) {
        self.body.push_str(text);
    }

    pub fn write_binary(&mut self, bytes: &[u8]) {
        self.binary.extend_from_slice(bytes);
    }

    /// Clears the text body.
    pub fn clear(&mut self) {
        self.body.clear();
    }

    /// Sets the status from a `"CODE DESCRIPTION"` string.
    pub fn set_status(&mut self, status: &str) -> Result<(), InvalidStatus> {
        self.status = status.parse()?;
        Ok(())
    }

    /// Adds an extra header. Names or values with a CR or LF are rejected.
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let (key, value) = (key.into(), value.into());
        ensure_single_line("header name", &key)?;
        ensure_single_line("header value", &value)?;
        self.headers.push((key, value));
        Ok(())
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.content_type = content_type.into();
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    /// 302 redirect to `url`.
    pub fn redirect(&mut self, url: &str) -> Result<()> {
        self.redirect_with(StatusCode::Found, url, "Object moved")
    }

    /// 301 redirect to `url`.
    pub fn redirect_permanent(&mut self, url: &str) -> Result<()> {
        self.redirect_with(StatusCode::MovedPermanently, url, "Object permanently moved")
    }

    fn redirect_with(&mut self, status: StatusCode, url: &str, title: &str) -> Result<()> {
        ensure_single_line("redirect URL", url)?;

        self.clear();
        self.status = status.into();
        self.add_header("Location", url)?;
        self.write(&format!("<html><head><title>{}</title></head><body>\r\n", title));
        self.write(&format!("<h2>{} to <a href=\"{}\">{}</a>.</h2>\r\n", title, url, url));
        self.write("</body></html>\r\n");
        Ok(())
    }

    pub fn is_binary(&self) -> bool {
        !self.binary.is_empty()
    }

    /// Bytes that will follow the header block.
    pub fn content_length(&self) -> usize {
        if self.is_binary() {
            self.binary.len()
        } else {
            self.body.len()
        }
    }

    /// `Content-Type` value, with a charset only for `text/*` types.
    pub fn content_type_header(&self) -> String {
        if self.content_type.starts_with("text/") {
            format!("{}; charset={}", self.content_type, self.encoding)
        } else {
            self.content_type.clone()
        }
    }
}

/// Fails if `value` could end the header line it is written into.
pub(crate) fn ensure_single_line(what: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        bail!("{} must not contain a line break", what);
    }
    Ok(())
}
