//! # mondash-charts
//!
//! SVG rendering of time-series charts built with Leptos.
//! Everything here reads `ChartState` and draws; data planning and transforms
//! live in `mondash-core`.
//!
//! ## Modules
//!
//! - `chartkit` - SVG path primitives
//! - `timeseries` - chunked series renderer (polylines and min/max bands)
//! - `axis` - value axes per unit, calendar-aligned time axis, grid
//! - `tooltip` - nearest point tooltip
//! - `interaction` - mouse/touch/wheel glue for the gesture controller
//! - `surface` - the composed chart surface

pub mod axis;
pub mod chartkit;
pub mod interaction;
pub mod surface;
pub mod timeseries;
pub mod tooltip;

pub use axis::*;
pub use chartkit::*;
pub use interaction::*;
pub use surface::*;
pub use timeseries::*;
pub use tooltip::*;

// Re-export colors from mondash-core for convenience
pub use mondash_core::colors;

use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_SURFACE_ID: AtomicUsize = AtomicUsize::new(0);

/// Unique suffix for DOM ids (clip paths) of one chart surface
pub fn next_surface_id() -> usize {
    NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Chart margin configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl ChartMargin {
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self { top, right, bottom, left }
    }

    /// Room for `axes` value axes on the left and the time axis below
    pub fn for_axes(axes: usize) -> Self {
        Self::new(
            8.0,
            12.0,
            TIME_AXIS_HEIGHT_PX,
            axes.max(1) as f64 * Y_AXIS_WIDTH_PX,
        )
    }
}

impl Default for ChartMargin {
    fn default() -> Self {
        Self::for_axes(1)
    }
}

/// Outer surface size around a plot of `plot_width` x `plot_height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartDimensions {
    pub plot_width: f64,
    pub plot_height: f64,
    pub margin: ChartMargin,
}

impl ChartDimensions {
    pub fn new(plot_width: f64, plot_height: f64) -> Self {
        Self {
            plot_width,
            plot_height,
            margin: ChartMargin::default(),
        }
    }

    pub fn with_margin(mut self, margin: ChartMargin) -> Self {
        self.margin = margin;
        self
    }

    /// Plot width left inside an outer width
    pub fn plot_width_for(outer_width: f64, margin: &ChartMargin) -> f64 {
        (outer_width - margin.left - margin.right).max(0.0)
    }

    pub fn width(&self) -> f64 {
        self.plot_width + self.margin.left + self.margin.right
    }

    pub fn height(&self) -> f64 {
        self.plot_height + self.margin.top + self.margin.bottom
    }

    /// SVG transform for the plot area
    pub fn inner_transform(&self) -> String {
        format!("translate({}, {})", self.margin.left, self.margin.top)
    }

    /// ViewBox string for SVG
    pub fn viewbox(&self) -> String {
        format!("0 0 {} {}", self.width(), self.height())
    }
}

impl Default for ChartDimensions {
    fn default() -> Self {
        Self::new(800.0, 300.0)
    }
}
