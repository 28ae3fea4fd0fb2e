//! Everything a handler can see and touch while serving one request.

use std::collections::HashMap;

use crate::application::ApplicationStore;
use crate::auth::{AuthenticationMethod, Credentials};
use crate::http::connection::ConnectionInfo;
use crate::http::cookie::CookieJar;
use crate::http::form::{Form, parse_pairs};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::writer::SERVER_SOFTWARE;
use crate::session::Session;

pub struct HttpContext<'a> {
    request: &'a Request,
    query: HashMap<String, String>,
    form: Form,
    server_variables: HashMap<String, String>,
    response: &'a mut Response,
    cookies: &'a mut CookieJar,
    session: &'a mut Session,
    application: &'a ApplicationStore,
}

impl<'a> HttpContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        request: &'a Request,
        info: &ConnectionInfo,
        credentials: Option<&Credentials>,
        auth_method: AuthenticationMethod,
        response: &'a mut Response,
        cookies: &'a mut CookieJar,
        session: &'a mut Session,
        application: &'a ApplicationStore,
    ) -> Self {
        Self {
            request,
            query: parse_pairs(&request.query),
            form: Form::from_request(request),
            server_variables: server_variables(request, info, credentials, auth_method),
            response,
            cookies,
            session,
            application,
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    /// Query string parameters.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    /// CGI-style variables describing the request and connection.
    pub fn server_variables(&self) -> &HashMap<String, String> {
        &self.server_variables
    }

    pub fn server_variable(&self, name: &str) -> Option<&str> {
        self.server_variables.get(name).map(String::as_str)
    }

    pub fn response(&mut self) -> &mut Response {
        self.response
    }

    pub fn cookies(&mut self) -> &mut CookieJar {
        self.cookies
    }

    pub fn session(&mut self) -> &mut Session {
        self.session
    }

    pub fn application(&self) -> &ApplicationStore {
        self.application
    }
}

/// Builds the CGI-style variable table for one request.
pub fn server_variables(
    request: &Request,
    info: &ConnectionInfo,
    credentials: Option<&Credentials>,
    auth_method: AuthenticationMethod,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let mut all_raw = String::new();
    let mut all_http = String::new();

    for (key, value) in &request.headers {
        let name = format!("HTTP_{}", key.to_ascii_uppercase().replace('-', "_"));
        all_raw.push_str(&format!("{}: {}\r\n", key, value));
        all_http.push_str(&format!("{}:{}\r\n", name, value));
        vars.entry(name).or_insert_with(|| value.clone());
    }

    let login = credentials.map(|c| c.login.clone()).unwrap_or_default();
    let password = credentials.map(|c| c.password.clone()).unwrap_or_default();
    let header = |name: &str| request.header(name).unwrap_or_default().to_string();

    let fixed = [
        ("ALL_RAW", all_raw),
        ("ALL_HTTP", all_http),
        ("AUTH_TYPE", auth_method.to_string()),
        ("AUTH_USER", login.clone()),
        ("AUTH_PASSWORD", password),
        ("CONTENT_LENGTH", header("Content-Length")),
        ("CONTENT_TYPE", header("Content-Type")),
        ("HTTPS", if info.secure { "on" } else { "off" }.to_string()),
        ("LOCAL_ADDR", info.local_addr.to_string()),
        ("LOGON_USER", login),
        ("PATH_INFO", request.path.clone()),
        ("QUERY_STRING", request.query.clone()),
        ("REMOTE_ADDR", info.remote_addr.to_string()),
        ("REMOTE_HOST", info.remote_name.clone()),
        ("REQUEST_METHOD", request.method.to_string()),
        ("SCRIPT_NAME", request.path.clone()),
        ("SERVER_NAME", info.local_name.clone()),
        ("SERVER_PORT", info.port.to_string()),
        ("SERVER_PROTOCOL", "HTTP/1.1".to_string()),
        ("SERVER_SOFTWARE", SERVER_SOFTWARE.to_string()),
        ("URL", request.path.clone()),
    ];

    for (name, value) in fixed {
        vars.insert(name.to_string(), value);
    }

    vars
}
