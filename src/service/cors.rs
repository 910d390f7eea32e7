use actix_web::http::header::{
    HeaderMap, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, ORIGIN, REFERER,
};
use actix_web::HttpRequest;

const ALLOW_METHODS: &str = "POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Exact match origin allow-list. An empty list allows every origin.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins }
    }

    /// Resolve the `Access-Control-Allow-Origin` value for `req`.
    pub fn allow_origin(&self, req: &HttpRequest) -> HeaderValue {
        if self.allowed_origins.is_empty() {
            return HeaderValue::from_static("*");
        }
        let headers = req.headers();
        let origin = headers
            .get(ORIGIN)
            .or_else(|| headers.get(REFERER))
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if self.allowed_origins.iter().any(|allowed| allowed == origin) {
            HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("null"))
        } else {
            HeaderValue::from_static("null")
        }
    }
}

/// Content type and CORS headers every `/contact` response carries, resolved once per request.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
}

impl CorsHeaders {
    pub fn for_request(policy: &CorsPolicy, req: &HttpRequest) -> Self {
        Self {
            allow_origin: policy.allow_origin(req),
        }
    }

    pub fn apply(&self, map: &mut HeaderMap) {
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        map.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        map.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        map.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
    }
}
