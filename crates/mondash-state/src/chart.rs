//! Reactive per-chart state.
//!
//! The interval cache lives in a `StoredValue`; every mutation goes through a
//! method here which then runs `refresh`, the one step that republishes the
//! cache snapshot, axis ranges, error and loading signals.

use leptos::prelude::*;
use mondash_core::{
    get_suggested_aggr_level, AggrLevel, CacheSnapshot, ChartConfig, ChartSerie, ClosestPoint,
    CoordinateSystem, EnsureOutcome, FetchRequest, GestureState, HitTester, IntervalCache,
    RequestId, TimeInterval, ValuesResponse, YAxes,
};

/// Preset time ranges offered by the chart toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRange {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
}

impl ViewRange {
    pub fn span_secs(&self) -> f64 {
        match self {
            Self::LastHour => 3600.0,
            Self::LastDay => 86_400.0,
            Self::LastWeek => 7.0 * 86_400.0,
            Self::LastMonth => 30.0 * 86_400.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::LastHour => "1h",
            Self::LastDay => "24h",
            Self::LastWeek => "7d",
            Self::LastMonth => "30d",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::LastHour, Self::LastDay, Self::LastWeek, Self::LastMonth]
    }
}

/// Pan and zoom that show `[to_ts - span, to_ts)` on a surface `width` pixels wide
pub fn xy_scale_for_window(origin_ts: f64, to_ts: f64, span: f64, width: f64) -> (f64, f64, f64) {
    let scale = width.max(1.0) / span;
    let x = -(to_ts - span - origin_ts) * scale;
    (x, 0.0, scale)
}

/// Plot dimensions handed to the chart state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotSize {
    pub width: f64,
    pub height: f64,
}

impl Default for PlotSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 300.0,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ChartState {
    cache: StoredValue<IntervalCache>,
    config: StoredValue<ChartConfig>,
    pub series: RwSignal<Vec<ChartSerie>>,
    pub snapshot: RwSignal<CacheSnapshot>,
    pub axes: RwSignal<YAxes>,
    pub gesture: RwSignal<GestureState>,
    /// Timestamp at content x = 0
    pub origin_ts: RwSignal<f64>,
    pub size: RwSignal<PlotSize>,
    pub aggr_level: RwSignal<AggrLevel>,
    pub error: RwSignal<Option<String>>,
    pub loading: RwSignal<bool>,
    pub hover: RwSignal<Option<ClosestPoint>>,
}

impl ChartState {
    /// Chart showing `[to_ts - span, to_ts)` initially
    pub fn new(config: ChartConfig, series: Vec<ChartSerie>, to_ts: f64, span: f64, size: PlotSize) -> Self {
        let origin_ts = to_ts - span;
        let (x, y, scale) = xy_scale_for_window(origin_ts, to_ts, span, size.width);

        let mut axes = YAxes::new(size.height - config.top_padding_px, config.top_padding_px);
        axes.ensure_units(series.iter().map(|s| s.unit.as_str()));

        let cache = IntervalCache::with_series(config.clone(), series.clone());
        let snapshot = cache.snapshot(AggrLevel::RAW);

        Self {
            cache: StoredValue::new(cache),
            config: StoredValue::new(config),
            series: RwSignal::new(series),
            snapshot: RwSignal::new(snapshot),
            axes: RwSignal::new(axes),
            gesture: RwSignal::new(GestureState::new(x, y, scale)),
            origin_ts: RwSignal::new(origin_ts),
            size: RwSignal::new(size),
            aggr_level: RwSignal::new(AggrLevel::RAW),
            error: RwSignal::new(None),
            loading: RwSignal::new(false),
            hover: RwSignal::new(None),
        }
    }

    pub fn config(&self) -> ChartConfig {
        self.config.get_value()
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    /// Transforms for the current pan, zoom, size and axis ranges (tracked)
    pub fn coordinates(&self) -> CoordinateSystem {
        let gesture = self.gesture.get();
        let width = self.size.get().width;
        let origin_ts = self.origin_ts.get();
        self.axes
            .with(|axes| CoordinateSystem::new(&gesture, origin_ts, width, axes))
    }

    pub fn coordinates_untracked(&self) -> CoordinateSystem {
        let gesture = self.gesture.get_untracked();
        let width = self.size.get_untracked().width;
        let origin_ts = self.origin_ts.get_untracked();
        self.axes
            .with_untracked(|axes| CoordinateSystem::new(&gesture, origin_ts, width, axes))
    }

    pub fn visible_interval(&self) -> TimeInterval {
        self.coordinates_untracked().visible_interval()
    }

    // ========================================================================
    // Cache operations
    // ========================================================================

    /// Republish everything derived from the cache
    fn refresh(&self) {
        let level = self.aggr_level.get_untracked();
        let (snapshot, error, loading) = self
            .cache
            .with_value(|c| (c.snapshot(level), c.error().map(str::to_string), c.is_loading()));

        let units: Vec<String> = self
            .series
            .with_untracked(|s| s.iter().map(|s| s.unit.clone()).collect());
        self.axes.update(|axes| {
            axes.ensure_units(units.iter().map(String::as_str));
            axes.set_observed(&snapshot.value_ranges);
        });

        if self.snapshot.with_untracked(|s| s.revision != snapshot.revision || s.aggr_level != level) {
            self.snapshot.set(snapshot);
        }
        if self.error.with_untracked(|e| *e != error) {
            self.error.set(error);
        }
        if self.loading.get_untracked() != loading {
            self.loading.set(loading);
        }
    }

    /// Plan fetches for the visible window at the level its pixel budget allows
    pub fn ensure_visible_data(&self) -> EnsureOutcome {
        let visible = self.visible_interval();
        let width = self.size.get_untracked().width;
        let max_points = self.config.with_value(|c| c.max_points(width));
        let level = get_suggested_aggr_level(visible.from_ts, visible.to_ts, max_points, AggrLevel::RAW);

        let outcome = self
            .cache
            .try_update_value(|c| c.ensure_data(visible.from_ts, visible.to_ts, level))
            .unwrap_or_default();

        if self.aggr_level.get_untracked() != level {
            tracing::debug!(%level, "aggregation level changed");
            self.aggr_level.set(level);
        }
        self.refresh();
        outcome
    }

    pub fn apply_response(&self, id: RequestId, response: &ValuesResponse) {
        let stored = self
            .cache
            .try_update_value(|c| c.complete_fetch(id, response))
            .unwrap_or(false);
        if stored {
            self.refresh();
        }
    }

    pub fn apply_failure(&self, id: RequestId, message: impl Into<String>) {
        let message = message.into();
        let recorded = self
            .cache
            .try_update_value(|c| c.fail_fetch(id, message))
            .unwrap_or(false);
        if recorded {
            self.refresh();
        }
    }

    /// Refresh request for a relevant live update
    pub fn handle_live_update(&self, topic: &str, t: f64) -> Option<FetchRequest> {
        let request = self
            .cache
            .try_update_value(|c| c.on_live_update(topic, t))
            .flatten();
        if request.is_some() {
            self.refresh();
        }
        request
    }

    /// Replace the series; returns requests to abort
    pub fn set_series(&self, series: Vec<ChartSerie>) -> Vec<RequestId> {
        let aborted = self
            .cache
            .try_update_value(|c| c.set_series(series.clone()))
            .unwrap_or_default();
        self.series.set(series);
        self.refresh();
        aborted
    }

    /// Teardown; returns requests to abort
    pub fn abort_all(&self) -> Vec<RequestId> {
        self.cache
            .try_update_value(IntervalCache::abort_all)
            .unwrap_or_default()
    }

    pub fn expression_errors(&self) -> Vec<String> {
        self.cache.with_value(|c| c.expression_errors().to_vec())
    }

    // ========================================================================
    // View operations
    // ========================================================================

    pub fn resize(&self, size: PlotSize) {
        if self.size.get_untracked() == size {
            return;
        }
        let top_padding = self.config.with_value(|c| c.top_padding_px);
        self.size.set(size);
        self.axes.update(|axes| axes.resize(size.height - top_padding));
    }

    pub fn set_user_range(&self, unit: &str, min: Option<f64>, max: Option<f64>) {
        self.axes.update(|axes| axes.set_user_range(unit, min, max));
    }

    /// Nearest point to a surface position
    pub fn hit_test(&self, screen_x: f64, screen_y: f64) -> Option<ClosestPoint> {
        let coords = self.coordinates_untracked();
        let (_, content_y) = coords.to_content(screen_x, screen_y);
        let ts = coords.screen_x2t(screen_x);

        self.series.with_untracked(|series| {
            self.snapshot.with_untracked(|snapshot| {
                HitTester::new(&snapshot.blocks, series, &coords).get_closest_value(ts, content_y)
            })
        })
    }
}
