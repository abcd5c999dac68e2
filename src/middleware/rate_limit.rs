use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::cache::models::AdmissionDecision;
use crate::error::AppError;
use crate::gate::Gate;

/// 取调用方身份：X-Real-IP，其次 X-Forwarded-For 中第一个非空地址，再次连接地址
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let remote_ip = remote.map(|addr| addr.ip().to_string());
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .filter(|ip| !ip.trim().is_empty())
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// 未命中任何路由的请求共用的调用点
pub const UNMATCHED_CALL_SITE: &str = "unmatched";

/// 调用点标识：路由模板 + 小写方法，如 `/api/v1/health.get`
///
/// 用匹配到的路由模板而不是原始路径，`/users/1` 和 `/users/2` 共用一个窗口；
/// 没有匹配到路由的请求全部计入 `unmatched`。
pub fn call_site<B>(req: &Request<B>) -> String {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or(UNMATCHED_CALL_SITE);
    format!("{}.{}", route, req.method().as_str().to_ascii_lowercase())
}

fn apply_headers(response: &mut Response, decision: &AdmissionDecision, now: i64) {
    for (name, value) in decision.headers(now) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
}

/// 准入中间件：被拒绝时直接返回 429，不进入后续处理
pub async fn rate_limit(
    State(gate): State<Arc<Gate>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let subject = client_ip(req.headers(), remote);
    let site = call_site(&req);

    let decision = gate.admit(&site, &subject).await;
    let now = gate.now();

    if !decision.admitted {
        let mut response = AppError::RateLimited {
            retry_after: decision.retry_after(now),
        }
        .into_response();
        apply_headers(&mut response, &decision, now);
        return response;
    }

    let mut response = next.run(req).await;
    apply_headers(&mut response, &decision, now);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_real_ip_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.2.2.2"));
        let remote: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(remote)), "10.1.1.1");
    }

    #[test]
    fn test_client_ip_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let remote: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(remote)), "::1");
        assert_eq!(client_ip(&headers, None), "unknown");
    }

    #[test]
    fn test_call_site_without_matched_route() {
        let req = Request::post("/api/v1/admin/cache/invalidate")
            .body(())
            .unwrap();
        assert_eq!(call_site(&req), "unmatched.post");

        let req = Request::get("/api/v1/whatever/123").body(()).unwrap();
        assert_eq!(call_site(&req), "unmatched.get");
    }
}
