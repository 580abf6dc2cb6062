//! # mondash-components
//!
//! Leptos components composing the monitoring dashboard: one `ChartWidget`
//! per chart definition, the dashboard layout and the status bar.

pub mod chart_widget;
pub mod dashboard;
pub mod status_bar;

pub use chart_widget::*;
pub use dashboard::*;
pub use status_bar::*;
