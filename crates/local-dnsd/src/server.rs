//! HTTP surface of the daemon
//!
//! Every request passes through [`reconcile_host`] before reaching the
//! fallback handler, which always answers `200 OK`. Pointed at by a reverse
//! proxy's forward-auth / `auth_request` hook, the daemon sees each proxied
//! host and keeps its DNS record current without ever blocking traffic.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::Response;
use local_dns_core::SiteRouter;

const FORWARDED_HOST: &str = "x-forwarded-host";

/// Build the daemon's router
pub fn router(sites: Arc<SiteRouter>) -> Router {
    Router::new()
        .fallback(allow)
        .layer(middleware::from_fn_with_state(sites, reconcile_host))
}

async fn allow() -> StatusCode {
    StatusCode::OK
}

/// Reconcile the request's target host, then continue unconditionally
async fn reconcile_host(
    State(sites): State<Arc<SiteRouter>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(host) = target_host(&req) {
        sites.handle(&host).await;
    }
    next.run(req).await
}

/// `X-Forwarded-Host` (first entry), else `Host`, else the URI authority
fn target_host(req: &Request) -> Option<String> {
    let headers = req.headers();
    headers
        .get(FORWARDED_HOST)
        .or_else(|| headers.get(header::HOST))
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| req.uri().authority().map(|a| a.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use local_dns_core::traits::DnsProvider;
    use local_dns_core::{MemoryProvider, ProviderConfig, ProviderRegistry, Reconciler, SiteConfig};
    use tower::ServiceExt;

    fn app(memory: &MemoryProvider, default_ip: Option<&str>) -> Router {
        let instance: Arc<dyn DnsProvider> = Arc::new(memory.clone());
        let registry = ProviderRegistry::from_instances([("lan", ProviderConfig::memory(), instance)]);
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(registry),
            default_ip.map(str::to_string),
            false,
        ));
        let sites = SiteRouter::provision(reconciler, &[SiteConfig::new("lan")]).unwrap();
        router(Arc::new(sites))
    }

    #[tokio::test]
    async fn test_host_header_is_reconciled() {
        let memory = MemoryProvider::new();
        let response = app(&memory, Some("192.168.1.50"))
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .header(header::HOST, "svc.local:443")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let record = memory.get("svc.local").await.expect("record created");
        assert_eq!(record.ip, "192.168.1.50");
    }

    #[tokio::test]
    async fn test_forwarded_host_takes_precedence() {
        let memory = MemoryProvider::new();
        let response = app(&memory, Some("192.168.1.50"))
            .oneshot(
                http::Request::builder()
                    .uri("/auth")
                    .header(header::HOST, "local-dnsd:8053")
                    .header(FORWARDED_HOST, "app.home.lan, proxy.lan")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(memory.get("app.home.lan").await.is_some());
        assert!(memory.get("local-dnsd").await.is_none());
    }

    #[tokio::test]
    async fn test_dns_failure_does_not_fail_request() {
        let memory = MemoryProvider::new();
        let response = app(&memory, None)
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .header(header::HOST, "svc.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(memory.is_empty().await);
    }
}
