//! Abortable `values` requests

use crate::{FetchConfig, FetchError};
use futures::channel::oneshot;
use futures::future::{select, Either};
use futures::pin_mut;
use gloo_net::http::Request;
use mondash_core::{EnsureOutcome, FetchRequest, RequestId, ValuesResponse};
use mondash_state::ChartState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wasm_bindgen_futures::spawn_local;
use web_sys::AbortController;

// ============================================================================
// VALUES CLIENT
// ============================================================================

/// HTTP client for the values endpoint.
///
/// Every request gets its own `AbortController`, which stays inside the task
/// running the request. The client only keeps a oneshot per request id, so it
/// stays `Send + Sync` and can be cloned into event handlers and effects.
#[derive(Clone, Default)]
pub struct ValuesClient {
    config: FetchConfig,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<()>>>>,
}

impl ValuesClient {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            pending: Arc::default(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Number of requests not yet settled
    pub fn in_flight(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<RequestId, oneshot::Sender<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel requests; unknown ids are ignored
    pub fn abort(&self, ids: &[RequestId]) {
        let mut pending = self.pending();
        for id in ids {
            if let Some(cancel) = pending.remove(id) {
                tracing::debug!(%id, "aborting values request");
                let _ = cancel.send(());
            }
        }
    }

    pub fn abort_all(&self) {
        let drained: Vec<_> = self.pending().drain().collect();
        for (id, cancel) in drained {
            tracing::debug!(%id, "aborting values request");
            let _ = cancel.send(());
        }
    }

    /// Register `id` so `abort` can reach it before its task is first polled
    fn register(&self, id: RequestId) -> oneshot::Receiver<()> {
        let (cancel, cancelled) = oneshot::channel();
        self.pending().insert(id, cancel);
        cancelled
    }

    /// Perform one request. Resolves to `FetchError::Aborted` when `abort` wins.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<ValuesResponse, FetchError> {
        let cancelled = self.register(request.id);
        self.fetch_registered(request, cancelled).await
    }

    async fn fetch_registered(
        &self,
        request: &FetchRequest,
        mut cancelled: oneshot::Receiver<()>,
    ) -> Result<ValuesResponse, FetchError> {
        // aborted between registration and the first poll: never send
        if let Ok(Some(())) = cancelled.try_recv() {
            return Err(FetchError::Aborted);
        }

        let controller =
            AbortController::new().map_err(|e| FetchError::Network(format!("{e:?}")))?;
        let signal = controller.signal();

        let url = self.config.values_url();
        let query = request.query();
        tracing::debug!(
            id = %request.id,
            level = %request.aggr_level,
            from = request.interval.from_ts,
            to = request.interval.to_ts,
            paths = request.paths.len(),
            "values request"
        );

        let send = async {
            let response = Request::get(&url)
                .query(query.iter().map(|(key, value)| (*key, value.as_str())))
                .abort_signal(Some(&signal))
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            if !response.ok() {
                return Err(FetchError::Status {
                    status: response.status(),
                    status_text: response.status_text(),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            Ok(ValuesResponse::from_json(&body)?)
        };
        pin_mut!(send);

        let result = match select(send, cancelled).await {
            Either::Left((result, _)) => result,
            Either::Right((Ok(()), _)) => {
                controller.abort();
                Err(FetchError::Aborted)
            }
            // sender dropped without a cancel: keep waiting
            Either::Right((Err(oneshot::Canceled), send)) => send.await,
        };

        self.pending().remove(&request.id);

        match result {
            Err(FetchError::Network(_)) if signal.aborted() => Err(FetchError::Aborted),
            other => other,
        }
    }

    // ========================================================================
    // Chart driver
    // ========================================================================

    /// Run one request and report the outcome to the chart
    pub fn spawn(&self, chart: ChartState, request: FetchRequest) {
        let cancelled = self.register(request.id);
        let client = self.clone();
        spawn_local(async move {
            match client.fetch_registered(&request, cancelled).await {
                Ok(response) => chart.apply_response(request.id, &response),
                Err(FetchError::Aborted) => {
                    tracing::debug!(id = %request.id, "values request aborted");
                }
                Err(e) => {
                    tracing::warn!(id = %request.id, error = %e, "values request failed");
                    chart.apply_failure(request.id, e.to_string());
                }
            }
        });
    }

    /// Carry out the work planned by `ChartState::ensure_visible_data`
    pub fn run(&self, chart: ChartState, outcome: EnsureOutcome) {
        self.abort(&outcome.abort);
        for request in outcome.fetch {
            self.spawn(chart, request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use mondash_core::{AggrLevel, TimeInterval};

    #[test]
    fn test_abort_signals_pending_request() {
        let client = ValuesClient::new(FetchConfig::default());
        let id = RequestId::new();
        let (cancel, mut cancelled) = oneshot::channel();
        client.pending().insert(id, cancel);
        assert_eq!(client.in_flight(), 1);

        client.abort(&[id]);
        assert_eq!(client.in_flight(), 0);
        assert_eq!(cancelled.try_recv(), Ok(Some(())));
    }

    fn request() -> FetchRequest {
        FetchRequest {
            id: RequestId::new(),
            interval: TimeInterval::new(3600.0, 7200.0),
            aggr_level: AggrLevel::RAW,
            paths: vec!["lab.cpu.load".to_string()],
        }
    }

    #[test]
    fn test_abort_before_first_poll_never_sends() {
        let client = ValuesClient::new(FetchConfig::default());
        let request = request();
        // what `spawn` does before handing the task to the executor
        let cancelled = client.register(request.id);
        assert_eq!(client.in_flight(), 1);

        client.abort(&[request.id]);
        assert_eq!(client.in_flight(), 0);

        let result = block_on(client.fetch_registered(&request, cancelled));
        assert!(matches!(result, Err(FetchError::Aborted)));
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_abort_all_before_first_poll() {
        let client = ValuesClient::new(FetchConfig::default());
        let requests: Vec<_> = (0..3).map(|_| request()).collect();
        let receivers: Vec<_> = requests.iter().map(|r| client.register(r.id)).collect();

        client.abort_all();
        assert_eq!(client.in_flight(), 0);
        for (request, cancelled) in requests.iter().zip(receivers) {
            let result = block_on(client.fetch_registered(request, cancelled));
            assert!(result.is_err_and(|e| e.is_aborted()));
        }
    }

    #[test]
    fn test_abort_unknown_id_is_ignored() {
        let client = ValuesClient::new(FetchConfig::default());
        let (cancel, mut cancelled) = oneshot::channel();
        client.pending().insert(RequestId::new(), cancel);

        client.abort(&[RequestId::new()]);
        assert_eq!(client.in_flight(), 1);
        assert_eq!(cancelled.try_recv(), Ok(None));
    }

    #[test]
    fn test_abort_all() {
        let client = ValuesClient::new(FetchConfig::default());
        let receivers: Vec<_> = (0..3)
            .map(|_| {
                let (cancel, cancelled) = oneshot::channel();
                client.pending().insert(RequestId::new(), cancel);
                cancelled
            })
            .collect();

        client.abort_all();
        assert_eq!(client.in_flight(), 0);
        for mut cancelled in receivers {
            assert_eq!(cancelled.try_recv(), Ok(Some(())));
        }
    }

    #[test]
    fn test_clones_share_pending_requests() {
        let client = ValuesClient::new(FetchConfig::new("http://localhost/api", "3"));
        let clone = client.clone();
        let (cancel, _cancelled) = oneshot::channel();
        clone.pending().insert(RequestId::new(), cancel);
        assert_eq!(client.in_flight(), 1);
        assert_eq!(clone.config().values_url(), "http://localhost/api/accounts/3/values/");
    }
}
