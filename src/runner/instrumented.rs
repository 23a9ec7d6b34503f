use async_trait::async_trait;
use std::sync::Arc;

use crate::driver::{HttpProbe, ProbeError, ProbeResponse};
use crate::metrics::{MetricsSink, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};

/// Wraps a probe so every request feeds the built-in request metrics,
/// independently of whatever the iteration records itself.
pub struct InstrumentedProbe {
    inner: Arc<dyn HttpProbe>,
    sink: Arc<dyn MetricsSink>,
}

impl InstrumentedProbe {
    pub fn new(inner: Arc<dyn HttpProbe>, sink: Arc<dyn MetricsSink>) -> Self {
        Self { inner, sink }
    }
}

#[async_trait]
impl HttpProbe for InstrumentedProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let result = self.inner.get(url).await;
        let (duration, failed) = match &result {
            Ok(response) => (response.duration, response.is_failed()),
            Err(err) => (err.duration, true),
        };
        self.sink.increment(HTTP_REQS, 1);
        self.sink.record_duration(HTTP_REQ_DURATION, duration);
        self.sink.record_rate(HTTP_REQ_FAILED, failed);
        result
    }
}
