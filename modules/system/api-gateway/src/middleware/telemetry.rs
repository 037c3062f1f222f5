//! Response telemetry.
//!
//! The tail buffers the inner response, hands it back to the client unchanged
//! and emits one `telemetry` event per request from a spawned task.
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use arc_security::{Category, RequestContext};
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sysinfo::{Disks, Process, ProcessesToUpdate, System};
use tracing::Instrument;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Billing identity attached to every record.
#[derive(Debug, Clone, Default)]
pub struct TelemetryIdentity {
    pub appbase_id: String,
    pub arc_id: String,
    pub cluster_id: String,
}

impl TelemetryIdentity {
    #[must_use]
    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self {
            appbase_id: cfg.appbase_id.clone().unwrap_or_default(),
            arc_id: cfg.arc_id.clone().unwrap_or_default(),
            cluster_id: cfg.cluster_id.clone().unwrap_or_default(),
        }
    }
}

/// One request as reported to telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub category: Option<Category>,
    pub acl: Option<String>,
    pub url: String,
    pub method: String,
    /// Client-chosen query identifier.
    pub query_id: Option<String>,
    /// IDs of the reactivesearch queries in the request body.
    pub rs_query_ids: Vec<String>,
    pub request_size: usize,
    pub status: u16,
    pub response_size: usize,
    /// Search time reported by the backend, in milliseconds.
    pub took: Option<u64>,
    pub response_time: Duration,
}

#[derive(Deserialize)]
struct Took {
    took: Option<u64>,
}

/// Backend search time for search and reactivesearch responses.
#[must_use]
pub fn search_took(category: Option<Category>, body: &[u8]) -> Option<u64> {
    match category {
        Some(Category::Search | Category::ReactiveSearch) => serde_json::from_slice::<Took>(body)
            .ok()
            .and_then(|t| t.took),
        _ => None,
    }
}

fn machine_id() -> &'static str {
    static MACHINE_ID: OnceLock<String> = OnceLock::new();
    MACHINE_ID.get_or_init(|| {
        machine_uid::get().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "machine id unavailable");
            String::new()
        })
    })
}

#[derive(Debug, Clone, Copy, Default)]
struct HostStats {
    memory: u64,
    available_disk: u64,
}

fn host_stats() -> HostStats {
    let memory = sysinfo::get_current_pid()
        .ok()
        .and_then(|pid| {
            let mut sys = System::new();
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            sys.process(pid).map(Process::memory)
        })
        .unwrap_or_default();
    let available_disk = Disks::new_with_refreshed_list()
        .list()
        .iter()
        .map(sysinfo::Disk::available_space)
        .sum();
    HostStats {
        memory,
        available_disk,
    }
}

async fn emit(identity: Arc<TelemetryIdentity>, record: TelemetryRecord) {
    let stats = tokio::task::spawn_blocking(host_stats)
        .await
        .unwrap_or_default();
    let machine_id = tokio::task::spawn_blocking(machine_id)
        .await
        .unwrap_or_default();

    tracing::info!(
        target: "telemetry",
        timestamp = %record.timestamp.to_rfc3339(),
        category = record.category.map(Category::as_str).unwrap_or_default(),
        acl = record.acl.as_deref().unwrap_or_default(),
        url = %record.url,
        method = %record.method,
        query_id = record.query_id.as_deref().unwrap_or_default(),
        rs_queries = %record.rs_query_ids.join(","),
        request_size = record.request_size,
        status = record.status,
        response_size = record.response_size,
        took = record.took,
        response_time_ms = u64::try_from(record.response_time.as_millis()).unwrap_or(u64::MAX),
        machine_id,
        memory = stats.memory,
        available_disk = stats.available_disk,
        appbase_id = %identity.appbase_id,
        arc_id = %identity.arc_id,
        cluster_id = %identity.cluster_id,
        "request served"
    );
}

#[derive(Default)]
struct Captured {
    category: Option<Category>,
    acl: Option<String>,
    start: Option<std::time::Instant>,
    query_id: Option<String>,
    rs_query_ids: Vec<String>,
    request_size: usize,
}

fn capture(ctx: Option<&RequestContext>) -> Captured {
    let Some(ctx) = ctx else {
        return Captured::default();
    };
    Captured {
        category: ctx.category().ok(),
        acl: ctx.acl().ok().map(|a| a.as_str().to_owned()),
        start: Some(ctx.start_time()),
        query_id: ctx.query_id().map(str::to_owned),
        rs_query_ids: ctx.rs_query().iter().map(|q| q.id.clone()).collect(),
        request_size: ctx.request_body().map_or(0, |b| b.len()),
    }
}

/// Buffer the response, return it and report it in the background.
pub async fn telemetry_tail(
    State(identity): State<Arc<TelemetryIdentity>>,
    req: Request,
    next: Next,
) -> Response {
    let captured = capture(req.extensions().get::<RequestContext>());
    let url = req.uri().to_string();
    let method = req.method().to_string();

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return super::reject(GatewayError::internal(format!(
                "failed to read response body: {err}"
            )));
        }
    };

    let record = TelemetryRecord {
        timestamp: Utc::now(),
        category: captured.category,
        acl: captured.acl,
        url,
        method,
        query_id: captured.query_id,
        rs_query_ids: captured.rs_query_ids,
        request_size: captured.request_size,
        status: parts.status.as_u16(),
        response_size: bytes.len(),
        took: search_took(captured.category, &bytes),
        response_time: captured.start.map(|s| s.elapsed()).unwrap_or_default(),
    };
    tokio::spawn(emit(identity, record).in_current_span());

    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Instant;

    use arc_security::{Acl, QueryType, RsQuery, TenantDomain};
    use axum::Router;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use tower::ServiceExt;

    #[test]
    fn took_is_read_for_search_categories_only() {
        let body = br#"{"took": 12, "hits": {}}"#;
        assert_eq!(search_took(Some(Category::Search), body), Some(12));
        assert_eq!(search_took(Some(Category::ReactiveSearch), body), Some(12));
        assert_eq!(search_took(Some(Category::Docs), body), None);
        assert_eq!(search_took(Some(Category::Search), b"not json"), None);
        assert_eq!(search_took(None, body), None);
    }

    #[test]
    fn capture_reads_reactivesearch_slots() {
        let mut ctx = RequestContext::new(Instant::now());
        ctx.set_category(Category::ReactiveSearch).unwrap();
        ctx.set_query_id("q-42".to_owned()).unwrap();
        ctx.set_request_body(axum::body::Bytes::from_static(br#"{"query":[]}"#))
            .unwrap();
        ctx.set_rs_query(vec![
            RsQuery {
                id: "search".to_owned(),
                query_type: QueryType::Search,
                sort_by: None,
            },
            RsQuery {
                id: "brands".to_owned(),
                query_type: QueryType::Term,
                sort_by: None,
            },
        ])
        .unwrap();

        let captured = capture(Some(&ctx));
        assert_eq!(captured.category, Some(Category::ReactiveSearch));
        assert_eq!(captured.query_id.as_deref(), Some("q-42"));
        assert_eq!(captured.rs_query_ids, ["search", "brands"]);
        assert_eq!(captured.request_size, 12);

        let empty = capture(None);
        assert!(empty.category.is_none());
        assert_eq!(empty.request_size, 0);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn tail_passes_response_through_and_reports_it() {
        let app = Router::new()
            .route("/movies/_search", get(|| async { r#"{"took":7}"# }))
            .layer(from_fn_with_state(
                Arc::new(TelemetryIdentity {
                    appbase_id: "app-1".to_owned(),
                    ..TelemetryIdentity::default()
                }),
                telemetry_tail,
            ));

        let mut ctx = RequestContext::new(Instant::now());
        ctx.set_domain(TenantDomain::new("t", None)).unwrap();
        ctx.set_category(Category::Search).unwrap();
        ctx.set_acl(Acl::SearchQuery).unwrap();
        let mut req = Request::builder()
            .uri("/movies/_search")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ctx);

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), axum::http::StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"took":7}"#);

        for _ in 0..50 {
            if logs_contain("request served") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(logs_contain("request served"));
        assert!(logs_contain("app-1"));
    }
}
