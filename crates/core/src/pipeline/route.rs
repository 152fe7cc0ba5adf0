use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// HTTP verbs a REST route can bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Connect,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            "CONNECT" => Ok(HttpMethod::Connect),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(format!("unknown HTTP method '{}'", other)),
        }
    }
}

/// Transport-specific key a pipeline is recorded against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum RouteKey {
    Rest { method: HttpMethod, path: String },
    Ws { subprotocol: String, event: String },
}

impl RouteKey {
    /// REST key with a normalized path
    pub fn rest(method: HttpMethod, path: &str) -> Self {
        RouteKey::Rest {
            method,
            path: to_endpoint(path),
        }
    }

    pub fn ws(subprotocol: impl Into<String>, event: impl Into<String>) -> Self {
        RouteKey::Ws {
            subprotocol: subprotocol.into(),
            event: event.into(),
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, RouteKey::Rest { .. })
    }

    pub fn is_ws(&self) -> bool {
        matches!(self, RouteKey::Ws { .. })
    }

    pub fn http_method(&self) -> Option<HttpMethod> {
        match self {
            RouteKey::Rest { method, .. } => Some(*method),
            RouteKey::Ws { .. } => None,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteKey::Rest { method, path } => write!(f, "{} {}", method, path),
            RouteKey::Ws { subprotocol, event } => write!(f, "WS {}:{}", subprotocol, event),
        }
    }
}

/// Normalize a route path: leading slash, no empty segments, no trailing slash
pub fn to_endpoint(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_endpoint_normalizes_slashes() {
        assert_eq!(to_endpoint(""), "/");
        assert_eq!(to_endpoint("/"), "/");
        assert_eq!(to_endpoint("users"), "/users");
        assert_eq!(to_endpoint("//v1//users/"), "/v1/users");
        assert_eq!(to_endpoint("/users/{id}/"), "/users/{id}");
    }

    #[test]
    fn test_route_key_display() {
        assert_eq!(RouteKey::rest(HttpMethod::Get, "users/").to_string(), "GET /users");
        assert_eq!(RouteKey::ws("chat", "join").to_string(), "WS chat:join");
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_route_key_serializes_with_transport_tag() {
        let json = serde_json::to_value(RouteKey::rest(HttpMethod::Delete, "/a")).unwrap();
        assert_eq!(json["transport"], "rest");
        assert_eq!(json["method"], "DELETE");
        assert_eq!(json["path"], "/a");
    }
}
