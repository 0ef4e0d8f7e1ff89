//! Gateway middleware: admission extractors and client identification.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderName, HeaderValue, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};

use crate::admission::Admitted;
use crate::error::ApiError;
use crate::server::AppState;

/// Client key used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Requests allowed per window.
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
/// Requests left in the current window.
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the rate-limit key for a request.
///
/// The peer IP from `ConnectInfo`, or the first `X-Forwarded-For` address
/// when `trust_forwarded_for` is set and the header holds a valid IP.
#[must_use]
pub fn client_key(parts: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(
            || UNKNOWN_CLIENT.to_string(),
            |ConnectInfo(addr)| addr.ip().to_string(),
        )
}

/// Extractor that admits a request against the client's write budget.
///
/// Place it before any body extractor so throttled requests are rejected
/// without reading the body.
#[derive(Debug, Clone, Copy)]
pub struct AdmitWrite(pub Admitted);

/// Extractor that admits a request against the client's read budget.
#[derive(Debug, Clone, Copy)]
pub struct AdmitRead(pub Admitted);

impl FromRequestParts<AppState> for AdmitWrite {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = client_key(parts, state.trust_forwarded_for);
        Ok(Self(state.admission.admit_write(&key)?))
    }
}

impl FromRequestParts<AppState> for AdmitRead {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let key = client_key(parts, state.trust_forwarded_for);
        Ok(Self(state.admission.admit_read(&key)?))
    }
}

impl IntoResponseParts for Admitted {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    fn with_peer(ip: [u8; 4]) -> axum::http::request::Builder {
        Request::builder().extension(ConnectInfo(SocketAddr::from((ip, 51000))))
    }

    #[test]
    fn test_peer_address_is_key() {
        let parts = parts(with_peer([192, 168, 1, 7]).body(()).unwrap());
        assert_eq!(client_key(&parts, false), "192.168.1.7");
    }

    #[test]
    fn test_missing_peer_is_unknown() {
        let parts = parts(Request::builder().body(()).unwrap());
        assert_eq!(client_key(&parts, false), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_forwarded_for_only_when_trusted() {
        let request = || {
            with_peer([10, 0, 0, 1])
                .header(X_FORWARDED_FOR, "203.0.113.9, 10.0.0.1")
                .body(())
                .unwrap()
        };

        assert_eq!(client_key(&parts(request()), false), "10.0.0.1");
        assert_eq!(client_key(&parts(request()), true), "203.0.113.9");
    }

    #[test]
    fn test_invalid_forwarded_for_falls_back() {
        let parts = parts(
            with_peer([10, 0, 0, 1])
                .header(X_FORWARDED_FOR, "not-an-ip")
                .body(())
                .unwrap(),
        );
        assert_eq!(client_key(&parts, true), "10.0.0.1");
    }
}
