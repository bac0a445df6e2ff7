use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use vista_core::OwnerId;

use crate::app::errors::json_error;
use crate::context::OwnerContext;

/// Header set by the gateway once the caller has been authenticated.
pub const OWNER_HEADER: &str = "x-owner-id";

pub async fn owner_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let owner_id = extract_owner(req.headers()).map_err(|message| {
        json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
    })?;

    req.extensions_mut().insert(OwnerContext::new(owner_id));

    Ok(next.run(req).await)
}

fn extract_owner(headers: &HeaderMap) -> Result<OwnerId, &'static str> {
    let header = headers
        .get(OWNER_HEADER)
        .ok_or("missing x-owner-id header")?;

    let value = header.to_str().map_err(|_| "invalid x-owner-id header")?;

    value
        .trim()
        .parse::<OwnerId>()
        .map_err(|_| "x-owner-id must be a UUID")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn parses_owner_header() {
        let owner = OwnerId::new();
        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_str(&owner.to_string()).unwrap());

        assert_eq!(extract_owner(&headers), Ok(owner));
    }

    #[test]
    fn rejects_missing_or_malformed_owner() {
        assert!(extract_owner(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(OWNER_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert!(extract_owner(&headers).is_err());
    }
}
