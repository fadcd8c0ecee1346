use std::sync::Arc;

use super::{Middleware, Next};
use crate::handler::BoxFuture;
use crate::metrics::Metrics;
use crate::request::Request;

/// Observes every request's duration in the `requests_duration_seconds` histogram.
pub struct RecordDuration {
    metrics: Arc<Metrics>,
}

impl RecordDuration {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl Middleware for RecordDuration {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let timer = self.metrics.start_timer(req.path());
        Box::pin(async move {
            let res = next.run(req).await;
            timer.observe_duration();
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    #[tokio::test]
    async fn records_normalized_path() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let router = Router::new()
            .fallback(http::Method::GET, |_req: Request| async { "ok" })
            .layer(RecordDuration::new(Arc::clone(&metrics)));

        let req = http::Request::get("/test-api/person/1234567890123").body(()).unwrap();
        router.call(Request::from(req)).await;

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains(r#"path="/test-api/person/:aktorId""#), "{rendered}");
    }
}
