//! # mondash-core
//!
//! Core of the monitoring dashboard's time-series charts.
//! Everything here is target independent: no DOM, no timers, no network.
//! The reactive and transport layers feed events in and read snapshots out.
//!
//! ## Modules
//!
//! - `types` - intervals, aggregation levels, points, series, blocks
//! - `interval` - missing-interval computation, bucket aggregation, level selection
//! - `ticks` - "nice" value ticks and calendar-aligned time ticks
//! - `coords` - time/value to pixel transforms, per-unit Y axes
//! - `cache` - per-level block cache with fetch planning and merging
//! - `hit` - nearest point lookup for tooltips
//! - `gesture` - touch/mouse/wheel to pan and zoom
//! - `expression` - per-series value expressions (`$1*8`)
//! - `wire` - JSON shapes exchanged with the values API and live updates

pub mod cache;
pub mod config;
pub mod coords;
pub mod expression;
pub mod gesture;
pub mod hit;
pub mod interval;
pub mod ticks;
pub mod types;
pub mod wire;

pub use cache::*;
pub use config::*;
pub use coords::*;
pub use expression::*;
pub use gesture::*;
pub use hit::*;
pub use interval::*;
pub use ticks::*;
pub use types::*;
pub use wire::*;

use serde::{Deserialize, Serialize};

// ============================================================================
// STRATEGY PATTERN: Value Formatters
// ============================================================================

/// Strategy trait for formatting series values in legends and tooltips
pub trait ValueFormatter: Send + Sync {
    fn format(&self, value: f64, unit: &str) -> String;
}

/// Fixed number of decimals, unit appended
#[derive(Debug, Clone)]
pub struct FixedValueFormatter {
    pub decimals: usize,
}

impl Default for FixedValueFormatter {
    fn default() -> Self {
        Self { decimals: 2 }
    }
}

impl ValueFormatter for FixedValueFormatter {
    fn format(&self, value: f64, unit: &str) -> String {
        with_unit(format!("{:.prec$}", value, prec = self.decimals), unit)
    }
}

/// Compact formatter with SI suffixes (k, M, G, T)
#[derive(Debug, Clone, Default)]
pub struct SiValueFormatter;

impl ValueFormatter for SiValueFormatter {
    fn format(&self, value: f64, unit: &str) -> String {
        let abs = value.abs();
        let sign = if value < 0.0 { "-" } else { "" };

        let compact = if abs >= 1_000_000_000_000.0 {
            format!("{}{:.2}T", sign, abs / 1_000_000_000_000.0)
        } else if abs >= 1_000_000_000.0 {
            format!("{}{:.2}G", sign, abs / 1_000_000_000.0)
        } else if abs >= 1_000_000.0 {
            format!("{}{:.2}M", sign, abs / 1_000_000.0)
        } else if abs >= 1_000.0 {
            format!("{}{:.2}k", sign, abs / 1_000.0)
        } else if abs >= 1.0 || abs == 0.0 {
            format!("{}{:.2}", sign, abs)
        } else {
            format!("{}{:.4}", sign, abs)
        };

        with_unit(compact, unit)
    }
}

fn with_unit(value: String, unit: &str) -> String {
    if unit.is_empty() {
        value
    } else {
        format!("{} {}", value, unit)
    }
}

// ============================================================================
// CORE VALUE TYPES
// ============================================================================

/// Unique identifier of a chart series (e.g., "0-lab.cpu.load")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChartSerieId(pub String);

impl ChartSerieId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChartSerieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChartSerieId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Live-update connection state FSM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Offline",
            Self::Connecting => "Connecting...",
            Self::Connected => "Live",
            Self::Reconnecting => "Reconnecting...",
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Disconnected => "conn-disconnected",
            Self::Connecting => "conn-connecting",
            Self::Connected => "conn-connected",
            Self::Reconnecting => "conn-reconnecting",
        }
    }
}

// ============================================================================
// COLOR CONSTANTS
// ============================================================================

pub mod colors {
    pub const BG_VOID: &str = "#0a0a0a";
    pub const BG_PANEL: &str = "#141414";
    pub const BG_ELEVATED: &str = "#1a1a1a";
    pub const BORDER: &str = "#2a2a2a";
    pub const TEXT_PRIMARY: &str = "#fafafa";
    pub const TEXT_MUTED: &str = "#888888";
    pub const GRID: &str = "#1f1f1f";
    pub const GRID_MAJOR: &str = "#333333";

    /// Series palette; a series keeps its color for as long as its index is stable
    pub const SERIES: [&str; 10] = [
        "#3b82f6", "#22c55e", "#f97316", "#a855f7", "#ef4444",
        "#14b8a6", "#eab308", "#ec4899", "#84cc16", "#06b6d4",
    ];

    pub fn serie_color(index: usize) -> &'static str {
        SERIES[index % SERIES.len()]
    }

    /// Translucent variant of a palette color, used for min/max bands
    pub fn serie_band(index: usize, alpha: f64) -> String {
        let hex = serie_color(index).trim_start_matches('#');
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        format!("rgba({}, {}, {}, {:.2})", channel(0), channel(2), channel(4), alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_formatter_strategy() {
        let formatter = SiValueFormatter;
        assert_eq!(formatter.format(1_500_000.0, "B"), "1.50M B");
        assert_eq!(formatter.format(2_500.0, ""), "2.50k");
        assert_eq!(formatter.format(-42.0, "°C"), "-42.00 °C");
        assert_eq!(formatter.format(0.01234, "%"), "0.0123 %");
    }

    #[test]
    fn test_fixed_formatter() {
        let formatter = FixedValueFormatter { decimals: 1 };
        assert_eq!(formatter.format(3.14159, "s"), "3.1 s");
    }

    #[test]
    fn test_serie_colors_wrap() {
        assert_eq!(colors::serie_color(0), colors::serie_color(10));
        assert_eq!(colors::serie_band(0, 0.25), "rgba(59, 130, 246, 0.25)");
    }
}
