//! HTTP POST reporter.

use std::sync::Arc;

use tokio::runtime::Handle;

use super::{NetworkReport, ReportSink};

/// POSTs each report as JSON on the current tokio runtime.
///
/// Requests are spawned and never awaited by the caller. Failures are logged
/// and not retried.
#[derive(Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: Arc<str>,
}

impl HttpReporter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: Arc::from(endpoint.into()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ReportSink for HttpReporter {
    fn report(&self, report: &NetworkReport) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(target: "report", "no runtime for HTTP report: {err}");
                return;
            }
        };

        let client = self.client.clone();
        let endpoint = Arc::clone(&self.endpoint);
        let report = *report;
        handle.spawn(async move {
            let result = client
                .post(endpoint.as_ref())
                .json(&report)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            if let Err(err) = result {
                tracing::warn!(target: "report", endpoint = %endpoint, "report POST failed: {err}");
            }
        });
    }
}
