use std::str::FromStr;

use axum::http::{header, HeaderValue, Method};
use solocast_common::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Cross-origin callers permitted to reach the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedOrigins {
    #[default]
    Any,
    /// Normalized (lowercase, no trailing slash) origins.
    List(Vec<String>),
}

impl FromStr for AllowedOrigins {
    type Err = Error;

    /// `*` (or an empty value) allows everyone; otherwise a comma-separated
    /// origin list.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            return Ok(AllowedOrigins::Any);
        }

        let mut origins: Vec<String> = Vec::new();
        for origin in value.split(',').map(normalize_origin) {
            if origin == "*" {
                return Ok(AllowedOrigins::Any);
            }
            if !origin.is_empty() && !origins.contains(&origin) {
                origins.push(origin);
            }
        }

        if origins.is_empty() {
            return Err(Error::config(format!("no valid CORS origins in `{value}`")));
        }
        Ok(AllowedOrigins::List(origins))
    }
}

impl AllowedOrigins {
    /// Browsers always send `Origin` on a WebSocket upgrade; non-browser
    /// clients usually don't and are let through.
    pub fn ws_origin_allowed(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (AllowedOrigins::Any, _) | (_, None) => true,
            (AllowedOrigins::List(origins), Some(origin)) => {
                origins.contains(&normalize_origin(origin))
            }
        }
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let allow_origin = match self {
            AllowedOrigins::Any => AllowOrigin::any(),
            AllowedOrigins::List(origins) => AllowOrigin::list(
                origins
                    .iter()
                    .filter_map(|origin| HeaderValue::from_str(origin).ok()),
            ),
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard_and_empty() {
        assert_eq!("*".parse::<AllowedOrigins>().unwrap(), AllowedOrigins::Any);
        assert_eq!("".parse::<AllowedOrigins>().unwrap(), AllowedOrigins::Any);
        assert_eq!(
            "https://a.example, *".parse::<AllowedOrigins>().unwrap(),
            AllowedOrigins::Any
        );
    }

    #[test]
    fn test_parse_list_normalizes() {
        let parsed: AllowedOrigins = " https://Stream.Example/ ,http://localhost:5173,https://stream.example"
            .parse()
            .unwrap();
        assert_eq!(
            parsed,
            AllowedOrigins::List(vec![
                "https://stream.example".to_string(),
                "http://localhost:5173".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_rejects_only_separators() {
        assert!(matches!(
            " , ,".parse::<AllowedOrigins>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_ws_origin_check() {
        let any = AllowedOrigins::Any;
        assert!(any.ws_origin_allowed(Some("https://anywhere.example")));
        assert!(any.ws_origin_allowed(None));

        let list: AllowedOrigins = "https://stream.example".parse().unwrap();
        assert!(list.ws_origin_allowed(Some("https://stream.example")));
        assert!(list.ws_origin_allowed(Some("HTTPS://STREAM.EXAMPLE/")));
        assert!(list.ws_origin_allowed(None));
        assert!(!list.ws_origin_allowed(Some("https://evil.example")));
    }
}
