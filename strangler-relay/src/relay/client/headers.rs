//! 请求/响应头处理：剔除逐跳头，注入转发头和网关标识头。

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;
use strangler_core::{Endpoint, GATEWAY_ID, X_GATEWAY};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_BY: &str = "x-forwarded-by";
pub const X_SERVICE_NAME: &str = "x-service-name";
pub const X_SERVICE_ENDPOINT: &str = "x-service-endpoint";
pub const X_ERROR: &str = "x-error";

/// 不跨越代理转发的头（两个方向都剔除）
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "upgrade",
    "transfer-encoding",
    "te",
    "trailer",
    "trailers",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "host",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// 复制头部，去掉逐跳头以及 `Connection` 中点名的头
pub fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name) || listed.iter().any(|token| token == name.as_str()) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }
    filtered
}

/// 发往上游的请求头
pub fn prepare_upstream_headers(
    inbound: &HeaderMap,
    endpoint: &Endpoint,
    client_ip: Option<IpAddr>,
    preserve_host: bool,
) -> HeaderMap {
    let mut headers = filter_headers(inbound);

    let existing_for = inbound
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let forwarded_for = match (existing_for, client_ip) {
        (Some(chain), Some(ip)) => format!("{}, {}", chain, ip),
        (Some(chain), None) => chain.to_string(),
        (None, Some(ip)) => ip.to_string(),
        (None, None) => GATEWAY_ID.to_string(),
    };
    insert_header(&mut headers, X_FORWARDED_FOR, &forwarded_for);

    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }

    let inbound_host = inbound.get(header::HOST).cloned();
    match &inbound_host {
        Some(host) => {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
        None => insert_header(&mut headers, X_FORWARDED_HOST, &endpoint.address()),
    }
    insert_header(&mut headers, X_FORWARDED_BY, GATEWAY_ID);

    if preserve_host {
        if let Some(host) = inbound_host {
            headers.insert(header::HOST, host);
        }
    }

    headers
}

/// 返回给客户端的响应头
pub fn prepare_downstream_headers(upstream: &HeaderMap, endpoint: &Endpoint) -> HeaderMap {
    let mut headers = filter_headers(upstream);
    insert_header(&mut headers, X_SERVICE_NAME, endpoint.service_name());
    insert_header(&mut headers, X_SERVICE_ENDPOINT, &endpoint.address());
    insert_header(&mut headers, X_GATEWAY, GATEWAY_ID);
    headers
}

/// 写入头部，值不合法时跳过
pub fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!("Skipping invalid value for header {}: {:?}", name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use strangler_core::Protocol;

    fn create_test_endpoint() -> Endpoint {
        Endpoint::new("movies-service", "movies", 3281, Protocol::Http, "/api/movies", 50)
    }

    fn create_inbound_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-custom-hop"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::TE, HeaderValue::from_static("trailers"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(header::PROXY_AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        headers.insert("x-custom-hop", HeaderValue::from_static("1"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer token"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.append("x-multi", HeaderValue::from_static("a"));
        headers.append("x-multi", HeaderValue::from_static("b"));
        headers
    }

    #[test]
    fn test_upstream_headers_strip_hop_by_hop() {
        let endpoint = create_test_endpoint();
        let headers = prepare_upstream_headers(&create_inbound_headers(), &endpoint, None, false);

        for name in HOP_BY_HOP_HEADERS {
            assert!(!headers.contains_key(*name), "{} should be stripped", name);
        }
        assert!(!headers.contains_key("x-custom-hop"));
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer token");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get_all("x-multi").iter().count(), 2);
    }

    #[test]
    fn test_forwarding_headers_injected() {
        let endpoint = create_test_endpoint();
        let headers = prepare_upstream_headers(&create_inbound_headers(), &endpoint, None, false);

        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), GATEWAY_ID);
        assert_eq!(headers.get(X_FORWARDED_PROTO).unwrap(), "http");
        assert_eq!(headers.get(X_FORWARDED_HOST).unwrap(), "gateway.example.com");
        assert_eq!(headers.get(X_FORWARDED_BY).unwrap(), GATEWAY_ID);
    }

    #[test]
    fn test_forwarded_for_chain() {
        let endpoint = create_test_endpoint();
        let mut inbound = HeaderMap::new();
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        let client = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));

        let headers = prepare_upstream_headers(&inbound, &endpoint, client, false);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "203.0.113.7, 10.0.0.2");
        // 没有入站 Host 时使用端点地址
        assert_eq!(headers.get(X_FORWARDED_HOST).unwrap(), "movies:3281");

        let headers = prepare_upstream_headers(&HeaderMap::new(), &endpoint, client, false);
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "10.0.0.2");
    }

    #[test]
    fn test_preserve_host() {
        let endpoint = create_test_endpoint();
        let headers = prepare_upstream_headers(&create_inbound_headers(), &endpoint, None, true);
        assert_eq!(headers.get(header::HOST).unwrap(), "gateway.example.com");
    }

    #[test]
    fn test_downstream_headers() {
        let endpoint = create_test_endpoint();
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONNECTION, HeaderValue::from_static("close"));
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::TRAILER, HeaderValue::from_static("x-checksum"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        upstream.insert(header::SET_COOKIE, HeaderValue::from_static("session=1"));

        let headers = prepare_downstream_headers(&upstream, &endpoint);
        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert!(!headers.contains_key(header::TRAILER));
        assert_eq!(headers.get(header::SET_COOKIE).unwrap(), "session=1");
        assert_eq!(headers.get(X_SERVICE_NAME).unwrap(), "movies-service");
        assert_eq!(headers.get(X_SERVICE_ENDPOINT).unwrap(), "movies:3281");
        assert_eq!(headers.get(X_GATEWAY).unwrap(), GATEWAY_ID);
    }
}
