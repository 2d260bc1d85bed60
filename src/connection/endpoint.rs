use url::Url;

use crate::error::TransportError;

/// Path the telemetry source serves its channel on.
pub const TELEMETRY_PATH: &str = "/ws";

/// Derive the telemetry endpoint from the origin the presentation layer was
/// served from: same host and port, `/ws`, upgraded to `wss` for secure pages.
pub fn endpoint_from_origin(origin: &str) -> Result<String, TransportError> {
    let invalid = |reason: &str| TransportError::InvalidUrl {
        url: origin.to_string(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(origin).map_err(|err| invalid(&err.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid("expected an http(s) or ws(s) origin")),
    };
    if url.host_str().is_none() {
        return Err(invalid("origin has no host"));
    }

    url.set_scheme(scheme)
        .map_err(|_| invalid("cannot switch scheme"))?;
    url.set_path(TELEMETRY_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Check that a configured endpoint is a usable `ws`/`wss` URL.
pub fn validate_endpoint(endpoint: &str) -> Result<(), TransportError> {
    let url = Url::parse(endpoint).map_err(|err| TransportError::InvalidUrl {
        url: endpoint.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" if url.host_str().is_some() => Ok(()),
        _ => Err(TransportError::InvalidUrl {
            url: endpoint.to_string(),
            reason: "expected a ws:// or wss:// URL with a host".to_string(),
        }),
    }
}
