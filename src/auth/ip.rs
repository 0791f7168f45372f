//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::Extensions};

/// Client IP from the connection info axum attaches when the app is served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn extract_client_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip() {
        let mut extensions = Extensions::new();
        assert_eq!(extract_client_ip(&extensions), None);

        let addr: SocketAddr = "10.0.0.7:5000".parse().unwrap();
        extensions.insert(ConnectInfo(addr));
        assert_eq!(extract_client_ip(&extensions), Some(addr.ip()));
    }
}
