//! Footer status bar: live-update link, update counter, last error

use chrono::{DateTime, Local, TimeZone};
use leptos::prelude::*;
use mondash_state::use_app_state;
use std::fmt::Display;

/// Wall-clock time of the last live update, "-" before the first one
pub fn format_last_update<Tz>(t: Option<f64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    t.and_then(|t| DateTime::from_timestamp_millis((t * 1000.0).round() as i64))
        .map(|dt| dt.with_timezone(tz).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[component]
pub fn StatusBar() -> impl IntoView {
    let state = use_app_state();
    let connection = state.connection;
    let error = state.error;
    let last_update = state.last_update;
    let updates_received = state.updates_received;

    view! {
        <div class="status-bar">
            <div class="sb-connection">
                <span class="sb-label">"Live:"</span>
                <span class=move || format!("sb-value {}", connection.get().css_class())>
                    {move || connection.get().label()}
                </span>
            </div>

            <div class="sb-updates">
                <span class="sb-label">"Updates:"</span>
                <span class="sb-value">{move || updates_received.get()}</span>
            </div>

            <div class="sb-last-update">
                <span class="sb-label">"Last:"</span>
                <span class="sb-value">
                    {move || format_last_update(last_update.get(), &Local)}
                </span>
            </div>

            {move || {
                error.get().map(|e| {
                    view! {
                        <div class="sb-error">
                            <span class="error-icon">"⚠"</span>
                            <span class="error-msg">{e}</span>
                        </div>
                    }
                })
            }}

            <div class="sb-version">
                <span>{concat!("v", env!("CARGO_PKG_VERSION"))}</span>
            </div>
        </div>
    }
}
