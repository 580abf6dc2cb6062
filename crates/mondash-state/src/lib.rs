//! # mondash-state
//!
//! Reactive state for the monitoring dashboard.
//! Per-chart state wraps the interval cache; app state tracks the live-update link.

pub mod chart;

pub use chart::*;

use mondash_core::ConnectionState;
use leptos::prelude::*;

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Global application state with reactive signals
#[derive(Clone)]
pub struct AppState {
    /// Live-update connection state
    pub connection: RwSignal<ConnectionState>,
    /// Current error message
    pub error: RwSignal<Option<String>>,
    /// Timestamp of the last live update received
    pub last_update: RwSignal<Option<f64>>,
    /// Number of live updates received since start
    pub updates_received: RwSignal<u64>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            connection: RwSignal::new(ConnectionState::Disconnected),
            error: RwSignal::new(None),
            last_update: RwSignal::new(None),
            updates_received: RwSignal::new(0),
        }
    }

    // ========================================================================
    // Connection State
    // ========================================================================

    pub fn set_connected(&self) {
        self.connection.set(ConnectionState::Connected);
        self.error.set(None);
    }

    pub fn set_disconnected(&self) {
        self.connection.set(ConnectionState::Disconnected);
    }

    pub fn set_connecting(&self) {
        self.connection.set(ConnectionState::Connecting);
    }

    pub fn set_reconnecting(&self) {
        self.connection.set(ConnectionState::Reconnecting);
    }

    /// Record a live update
    pub fn record_update(&self, t: f64) {
        self.last_update.set(Some(t));
        self.updates_received.update(|n| *n += 1);
    }

    // ========================================================================
    // Error Handling
    // ========================================================================

    pub fn set_error(&self, msg: impl Into<String>) {
        self.error.set(Some(msg.into()));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// CONTEXT HELPERS
// ============================================================================

/// Provide app state context to component tree
pub fn provide_app_state() -> AppState {
    let state = AppState::new();
    provide_context(state.clone());
    state
}

/// Use app state from context
pub fn use_app_state() -> AppState {
    expect_context::<AppState>()
}
