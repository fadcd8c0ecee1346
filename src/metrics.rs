//! Prometheus metrics.

use std::sync::Arc;

use http::HeaderValue;
use prometheus::{Encoder, HistogramOpts, HistogramTimer, HistogramVec, Registry, TextEncoder};
use regex::Regex;
use thiserror::Error;
use tracing::error;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),

    #[error(transparent)]
    Regex(#[from] regex::Error),

    #[error("exposition is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

pub struct Metrics {
    registry: Registry,
    request_duration: HistogramVec,
    ids: Regex,
    actor_ids: Regex,
}

impl Metrics {
    /// Registers `requests_duration_seconds` and, on Linux, the process
    /// collector (CPU, memory, file descriptors, threads).
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "requests_duration_seconds",
                "http requests durations for incoming requests in seconds",
            ),
            &["path"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;
        #[cfg(target_os = "linux")]
        registry.register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))?;

        Ok(Self {
            registry,
            request_duration,
            ids: Regex::new(
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
            )?,
            actor_ids: Regex::new(r"\b[0-9]{13}\b")?,
        })
    }

    /// Starts timing a request. The duration is recorded when the timer is
    /// observed or dropped.
    pub fn start_timer(&self, path: &str) -> HistogramTimer {
        let label = self.path_label(path);
        self.request_duration
            .with_label_values(&[label.as_str()])
            .start_timer()
    }

    /// Collapses identifiers in `path` so label cardinality stays bounded.
    pub fn path_label(&self, path: &str) -> String {
        let path = self.ids.replace_all(path, ":id");
        self.actor_ids.replace_all(&path, ":aktorId").into_owned()
    }

    /// Text exposition format of everything in the registry.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Handler serving the registry in Prometheus text format.
pub fn exposition(metrics: Arc<Metrics>) -> impl Handler {
    move |_req: Request| {
        let metrics = Arc::clone(&metrics);
        async move {
            match metrics.render() {
                Ok(text) => Response::builder()
                    .bytes(HeaderValue::from_static(EXPOSITION_CONTENT_TYPE), text),
                Err(err) => {
                    error!(error = %err, "failed to render metrics");
                    Response::status(http::StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_collapsed() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(
            metrics.path_label("/api/person/1234567890123/sykmeldinger"),
            "/api/person/:aktorId/sykmeldinger"
        );
        assert_eq!(
            metrics.path_label("/api/sykmelding/5b4b9f1e-3c0a-4a5e-9d1b-0e2f4a6b8c9d"),
            "/api/sykmelding/:id"
        );
        assert_eq!(metrics.path_label("/api/12345"), "/api/12345");
    }

    #[test]
    fn histogram_name_has_no_prefix() {
        let metrics = Metrics::new().unwrap();
        drop(metrics.start_timer("/x"));
        let rendered = metrics.render().unwrap();
        assert!(
            rendered.contains("\nrequests_duration_seconds_count{path=\"/x\"} 1"),
            "{rendered}"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn exports_process_metrics() {
        let rendered = Metrics::new().unwrap().render().unwrap();
        assert!(rendered.contains("process_cpu_seconds_total"), "{rendered}");
        assert!(rendered.contains("process_resident_memory_bytes"), "{rendered}");
    }

    #[tokio::test]
    async fn exposition_serves_text_format() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.start_timer("/test-api").observe_duration();

        let handler = exposition(Arc::clone(&metrics)).into_boxed_handler();
        let res = handler
            .call(Request::from(http::Request::get("/internal/prometheus").body(()).unwrap()))
            .await;

        assert_eq!(res.header("content-type"), Some(EXPOSITION_CONTENT_TYPE));
        let body = std::str::from_utf8(res.body()).unwrap();
        assert!(body.contains(r#"requests_duration_seconds_count{path="/test-api"} 1"#), "{body}");
    }
}
