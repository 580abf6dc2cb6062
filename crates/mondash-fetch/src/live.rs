//! Live-update WebSocket client with auto-reconnection

use crate::{LiveConfig, ReconnectPolicy};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use gloo_net::websocket::{futures::WebSocket, Message};
use gloo_timers::future::TimeoutFuture;
use leptos::prelude::*;
use mondash_core::LiveUpdate;
use mondash_state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use wasm_bindgen_futures::spawn_local;

// ============================================================================
// LIVE CLIENT
// ============================================================================

/// Subscribes to value notifications and fans them out to charts
pub struct LiveClient {
    config: LiveConfig,
    state: AppState,
}

impl LiveClient {
    pub fn new(state: AppState) -> Self {
        Self {
            config: LiveConfig::default(),
            state,
        }
    }

    pub fn with_config(state: AppState, config: LiveConfig) -> Self {
        Self { config, state }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Start the connection loop (spawns async task)
    pub fn connect(self) -> LiveHandle {
        let handle = LiveHandle::new();
        let task_handle = handle.clone();

        spawn_local(async move {
            self.run_connection_loop(task_handle).await;
        });

        handle
    }

    async fn run_connection_loop(self, handle: LiveHandle) {
        let mut attempt = 0u32;
        let mut policy = self.config.reconnect_policy.clone();

        loop {
            if handle.is_stopped() {
                tracing::info!("live client stopped by handle");
                self.state.set_disconnected();
                break;
            }

            self.state.set_connecting();
            tracing::info!(url = %self.config.url, "connecting live updates");

            match WebSocket::open(&self.config.url) {
                Ok(ws) => {
                    self.state.set_connected();
                    policy.reset();
                    attempt = 0;
                    tracing::info!(topic = %self.config.topic, "live updates connected");

                    self.handle_connection(ws, &handle).await;

                    if handle.is_stopped() {
                        tracing::info!("live client stopped during connection");
                        self.state.set_disconnected();
                        break;
                    }

                    self.state.set_disconnected();
                    tracing::warn!("live updates disconnected");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "live connection failed");
                    self.state.set_error(format!("Live updates unavailable: {e:?}"));
                }
            }

            if !policy.should_reconnect(attempt) {
                tracing::error!(attempt, "max reconnection attempts reached");
                self.state.set_error("Live updates stopped: max reconnection attempts reached");
                break;
            }

            let delay = policy.delay_ms(attempt);
            self.state.set_reconnecting();
            tracing::info!(delay_ms = delay, attempt = attempt + 1, "reconnecting live updates");

            TimeoutFuture::new(delay).await;
            attempt += 1;
        }
    }

    async fn handle_connection(&self, ws: WebSocket, handle: &LiveHandle) {
        let (mut write, mut read) = ws.split();

        let subscribe = subscribe_message(&self.config.topic);
        if let Err(e) = write.send(Message::Text(subscribe)).await {
            tracing::error!(error = ?e, "failed to subscribe to live updates");
            return;
        }

        while let Some(msg) = read.next().await {
            if handle.is_stopped() {
                break;
            }

            match msg {
                Ok(Message::Text(text)) => self.process_message(&text, handle),
                Ok(Message::Bytes(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => self.process_message(&text, handle),
                    Err(_) => tracing::warn!("ignoring non-UTF-8 live message"),
                },
                Err(e) => {
                    tracing::error!(error = ?e, "live socket error");
                    break;
                }
            }
        }
    }

    fn process_message(&self, text: &str, handle: &LiveHandle) {
        match LiveUpdate::from_json(text) {
            Ok(update) => {
                tracing::trace!(topic = %update.topic, t = update.payload.t, "live update");
                self.state.record_update(update.payload.t);
                handle.publish(update);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse live update");
            }
        }
    }
}

/// Subscription request sent right after the socket opens
pub fn subscribe_message(topic: &str) -> String {
    serde_json::json!({ "action": "subscribe", "topic": topic }).to_string()
}

// ============================================================================
// LIVE HANDLE (Send + Sync)
// ============================================================================

/// Controls the live connection and hands out update streams
#[derive(Clone, Default)]
pub struct LiveHandle {
    stopped: Arc<AtomicBool>,
    subscribers: Arc<Mutex<Vec<UnboundedSender<LiveUpdate>>>>,
}

impl LiveHandle {
    fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stream of every update received from now on
    pub fn subscribe(&self) -> UnboundedReceiver<LiveUpdate> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver to every live subscriber, dropping those that went away
    pub fn publish(&self, update: LiveUpdate) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.unbounded_send(update.clone()).is_ok());
    }
}

// ============================================================================
// LEPTOS INTEGRATION
// ============================================================================

/// Start live updates and share the handle with the component tree
pub fn provide_live_updates(state: AppState, config: LiveConfig) -> LiveHandle {
    let handle = LiveClient::with_config(state, config).connect();
    provide_context(handle.clone());
    handle
}

pub fn use_live_updates() -> Option<LiveHandle> {
    use_context::<LiveHandle>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mondash_core::LivePayload;

    fn update(path: &str, t: f64) -> LiveUpdate {
        LiveUpdate {
            topic: format!("accounts/1/values/{path}"),
            payload: LivePayload { t },
        }
    }

    #[test]
    fn test_live_handle() {
        let handle = LiveHandle::new();
        assert!(!handle.is_stopped());

        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let handle = LiveHandle::new();
        let mut first = handle.subscribe();
        let mut second = handle.subscribe();

        handle.publish(update("lab.cpu", 1234.0));

        let got = first.try_next().ok().flatten().map(|u| u.payload.t);
        assert_eq!(got, Some(1234.0));
        let got = second.try_next().ok().flatten().map(|u| u.path().to_string());
        assert_eq!(got.as_deref(), Some("lab.cpu"));
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let handle = LiveHandle::new();
        let kept = handle.subscribe();
        drop(handle.subscribe());
        assert_eq!(handle.subscriber_count(), 2);

        handle.publish(update("lab.mem", 10.0));
        assert_eq!(handle.subscriber_count(), 1);
        drop(kept);
    }

    #[test]
    fn test_stop_closes_streams() {
        let handle = LiveHandle::new();
        let mut rx = handle.subscribe();
        handle.stop();
        assert_eq!(handle.subscriber_count(), 0);
        // closed and empty
        assert!(matches!(rx.try_next(), Ok(None)));
    }

    #[test]
    fn test_subscribe_message() {
        let msg = subscribe_message("accounts/1/values/+");
        let value: serde_json::Value = serde_json::from_str(&msg).expect("valid json");
        assert_eq!(value["action"], "subscribe");
        assert_eq!(value["topic"], "accounts/1/values/+");
    }
}
