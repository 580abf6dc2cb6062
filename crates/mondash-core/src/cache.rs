//! Interval cache: fetched blocks per aggregation level, fetch planning and
//! merging of responses.
//!
//! The cache never performs I/O. `ensure_data` returns the requests to start and
//! the ones to abort; the transport reports back through `complete_fetch` or
//! `fail_fetch`. Completions for unknown ids (aborted, superseded, reset) are
//! ignored, so nothing mutates the cache after an abort.

use crate::{
    aggregate_interval_on_the_fly, align_down, align_up, get_missing_intervals, values_query,
    AggrLevel, ChartConfig, ChartSerie, ChartSerieId, CsData, DataPoint, Expression,
    FetchedBlock, TimeInterval, ValueRange, ValuesResponse,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifies one in-flight values request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub id: RequestId,
    pub interval: TimeInterval,
    pub aggr_level: AggrLevel,
    pub paths: Vec<String>,
}

impl FetchRequest {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        values_query(&self.paths, &self.interval, self.aggr_level)
    }
}

/// Work produced by `ensure_data`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnsureOutcome {
    pub fetch: Vec<FetchRequest>,
    pub abort: Vec<RequestId>,
}

impl EnsureOutcome {
    pub fn is_empty(&self) -> bool {
        self.fetch.is_empty() && self.abort.is_empty()
    }
}

/// Read-only view handed to renderers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub aggr_level: AggrLevel,
    pub blocks: Vec<FetchedBlock>,
    pub value_ranges: BTreeMap<String, ValueRange>,
    pub revision: u64,
}

pub struct IntervalCache {
    config: ChartConfig,
    series: Vec<ChartSerie>,
    expressions: BTreeMap<ChartSerieId, Expression>,
    expression_errors: Vec<String>,
    fetched: BTreeMap<AggrLevel, Vec<FetchedBlock>>,
    in_flight: BTreeMap<RequestId, FetchRequest>,
    value_ranges: BTreeMap<AggrLevel, BTreeMap<String, ValueRange>>,
    /// Aligned fetch window and level of the last `ensure_data`
    last_window: Option<(TimeInterval, AggrLevel)>,
    error: Option<String>,
    revision: u64,
}

impl IntervalCache {
    pub fn new(config: ChartConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
            expressions: BTreeMap::new(),
            expression_errors: Vec::new(),
            fetched: BTreeMap::new(),
            in_flight: BTreeMap::new(),
            value_ranges: BTreeMap::new(),
            last_window: None,
            error: None,
            revision: 0,
        }
    }

    pub fn with_series(config: ChartConfig, series: Vec<ChartSerie>) -> Self {
        let mut cache = Self::new(config);
        cache.set_series(series);
        cache
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn series(&self) -> &[ChartSerie] {
        &self.series
    }

    /// Replace the series set. Everything cached belongs to the old set and is
    /// dropped; returns the in-flight requests to abort.
    pub fn set_series(&mut self, series: Vec<ChartSerie>) -> Vec<RequestId> {
        self.expression_errors.clear();
        self.expressions = series
            .iter()
            .map(|serie| {
                let expression = match Expression::parse(&serie.expression) {
                    Ok(expression) => expression,
                    Err(e) => {
                        warn!(path = %serie.path, expression = %serie.expression, "invalid expression: {}", e);
                        self.expression_errors
                            .push(format!("{}: invalid expression '{}': {}", serie.path, serie.expression, e));
                        Expression::identity()
                    }
                };
                (serie.chart_serie_id.clone(), expression)
            })
            .collect();

        self.series = series;
        self.fetched.clear();
        self.value_ranges.clear();
        self.last_window = None;
        self.error = None;
        self.revision += 1;
        self.abort_all()
    }

    /// Expressions that failed to parse and fell back to `$1`
    pub fn expression_errors(&self) -> &[String] {
        &self.expression_errors
    }

    fn paths(&self) -> Vec<String> {
        let unique: BTreeSet<&str> = self.series.iter().map(|s| s.path.as_str()).collect();
        unique.into_iter().map(str::to_string).collect()
    }

    fn new_request(&mut self, interval: TimeInterval, aggr_level: AggrLevel) -> FetchRequest {
        let request = FetchRequest {
            id: RequestId::new(),
            interval,
            aggr_level,
            paths: self.paths(),
        };
        self.in_flight.insert(request.id, request.clone());
        request
    }

    // ========================================================================
    // FETCH PLANNING
    // ========================================================================

    /// Plan fetches so `[from_ts, to_ts)` plus a margin is cached at `aggr_level`.
    ///
    /// Nothing is fetched while the margin window is covered by blocks or
    /// in-flight requests. Otherwise the window is widened by one span per
    /// side, aligned to the level's bucket grid, and each missing piece becomes
    /// one request. In-flight requests at another level or outside the widened
    /// window are returned for abortion.
    pub fn ensure_data(&mut self, from_ts: f64, to_ts: f64, aggr_level: AggrLevel) -> EnsureOutcome {
        let span = to_ts - from_ts;
        if !(span.is_finite() && span > 0.0) {
            return EnsureOutcome::default();
        }

        let step = aggr_level.alignment_secs();
        let widen = span * self.config.fetch_widen_ratio;
        let fetch_window = TimeInterval::new(
            align_down(from_ts - widen, step),
            align_up(to_ts + widen, step),
        );
        self.last_window = Some((fetch_window, aggr_level));

        let abort: Vec<RequestId> = self
            .in_flight
            .values()
            .filter(|r| r.aggr_level != aggr_level || !r.interval.overlaps(&fetch_window))
            .map(|r| r.id)
            .collect();
        for id in &abort {
            self.in_flight.remove(id);
        }
        if !abort.is_empty() {
            debug!(count = abort.len(), "aborting superseded requests");
        }

        if self.series.is_empty() {
            return EnsureOutcome {
                fetch: Vec::new(),
                abort,
            };
        }

        let existing: Vec<TimeInterval> = self
            .blocks(aggr_level)
            .iter()
            .map(FetchedBlock::interval)
            .chain(
                self.in_flight
                    .values()
                    .filter(|r| r.aggr_level == aggr_level)
                    .map(|r| r.interval),
            )
            .collect();

        let margin = span * self.config.fetch_margin_ratio;
        let wanted = TimeInterval::new(from_ts - margin, to_ts + margin);
        if get_missing_intervals(&existing, wanted).is_empty() {
            return EnsureOutcome {
                fetch: Vec::new(),
                abort,
            };
        }

        let fetch = get_missing_intervals(&existing, fetch_window)
            .into_iter()
            .map(|interval| self.new_request(interval, aggr_level))
            .collect::<Vec<_>>();

        for request in &fetch {
            debug!(
                id = %request.id,
                level = %aggr_level,
                interval = %request.interval,
                "fetching"
            );
        }

        EnsureOutcome { fetch, abort }
    }

    /// A live update reported a new value for the path at `topic`'s tail.
    /// Returns one refresh request for the bucket around `t` when it falls inside
    /// data currently shown; otherwise the update is not relevant.
    pub fn on_live_update(&mut self, topic: &str, t: f64) -> Option<FetchRequest> {
        let path = crate::topic_path(topic);
        if !self.series.iter().any(|s| s.path == path) {
            return None;
        }

        let (window, aggr_level) = self.last_window?;
        if !window.contains(t) {
            return None;
        }
        if !self.blocks(aggr_level).iter().any(|b| b.interval().contains(t)) {
            return None;
        }

        let step = aggr_level.alignment_secs();
        let from_ts = align_down(t, step);
        let interval = TimeInterval::new(from_ts, from_ts + step);

        let pending = self
            .in_flight
            .values()
            .any(|r| r.aggr_level == aggr_level && r.interval.covers(&interval));
        if pending {
            return None;
        }

        debug!(path, t, interval = %interval, "live update refresh");
        Some(self.new_request(interval, aggr_level))
    }

    /// Forget every in-flight request (teardown); returns their ids for abortion
    pub fn abort_all(&mut self) -> Vec<RequestId> {
        std::mem::take(&mut self.in_flight).into_keys().collect()
    }

    pub fn in_flight(&self) -> impl Iterator<Item = &FetchRequest> {
        self.in_flight.values()
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    // ========================================================================
    // COMPLETION
    // ========================================================================

    /// Store a successful response. Returns false for unknown (aborted) ids.
    pub fn complete_fetch(&mut self, id: RequestId, response: &ValuesResponse) -> bool {
        let Some(request) = self.in_flight.remove(&id) else {
            warn!(%id, "dropping response for unknown request");
            return false;
        };

        let cs_data = self.decode(&request, response);
        self.error = None;
        self.save_response_data(request.interval, request.aggr_level, cs_data);
        true
    }

    /// Record a failed request; it is retried by the next `ensure_data`
    pub fn fail_fetch(&mut self, id: RequestId, message: impl Into<String>) -> bool {
        if self.in_flight.remove(&id).is_none() {
            return false;
        }
        let message = message.into();
        tracing::error!(%id, "fetch failed: {}", message);
        self.error = Some(message);
        self.revision += 1;
        true
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Per-series points of a response: expression applied, clipped to the
    /// request interval, raw-shaped points bucketed at aggregated levels
    fn decode(&self, request: &FetchRequest, response: &ValuesResponse) -> CsData {
        let interval = request.interval;
        let level = request.aggr_level;

        self.series
            .iter()
            .map(|serie| {
                let expression = self.expressions.get(&serie.chart_serie_id);
                let mut points: Vec<DataPoint> = response
                    .points(&serie.path, level)
                    .into_iter()
                    .filter(|p| interval.contains(p.t()))
                    .map(|p| match expression {
                        Some(e) if !e.is_identity() => p.map_values(|v| e.eval(v)),
                        _ => p,
                    })
                    .collect();

                if !level.is_raw() && points.iter().any(DataPoint::is_raw) {
                    let mut single = CsData::new();
                    single.insert(serie.chart_serie_id.clone(), points);
                    points = aggregate_interval_on_the_fly(interval.from_ts, interval.to_ts, &single, level)
                        .remove(&serie.chart_serie_id)
                        .unwrap_or_default();
                }

                (serie.chart_serie_id.clone(), points)
            })
            .collect()
    }

    // ========================================================================
    // MERGING
    // ========================================================================

    /// Insert data for `[interval)` at `aggr_level`.
    ///
    /// Stored data inside the interval is replaced; the new block is then joined
    /// with the block ending at `interval.from_ts` and the block starting at
    /// `interval.to_ts`, so adjacent blocks never coexist. Only block boundaries
    /// are inspected, which makes the result independent of arrival order.
    pub fn save_response_data(&mut self, interval: TimeInterval, aggr_level: AggrLevel, cs_data: CsData) {
        let blocks = self.fetched.entry(aggr_level).or_default();

        let mut kept = Vec::with_capacity(blocks.len() + 1);
        for block in blocks.drain(..) {
            if block.interval().overlaps(&interval) {
                let (before, after) = block.split_around(&interval);
                kept.extend(before);
                kept.extend(after);
            } else {
                kept.push(block);
            }
        }

        let predecessor = kept
            .iter()
            .position(|b| b.to_ts == interval.from_ts)
            .map(|i| kept.remove(i));
        let successor = kept
            .iter()
            .position(|b| b.from_ts == interval.to_ts)
            .map(|i| kept.remove(i));

        let ids: BTreeSet<ChartSerieId> = predecessor
            .iter()
            .chain(successor.iter())
            .flat_map(|b| b.cs_data.keys().cloned())
            .chain(cs_data.keys().cloned())
            .collect();

        let merged_data: CsData = ids
            .into_iter()
            .map(|id| {
                let mut points = Vec::new();
                if let Some(p) = &predecessor {
                    points.extend_from_slice(p.points(&id));
                }
                if let Some(new) = cs_data.get(&id) {
                    points.extend_from_slice(new);
                }
                if let Some(s) = &successor {
                    points.extend_from_slice(s.points(&id));
                }
                (id, points)
            })
            .collect();

        let merged = FetchedBlock::new(
            predecessor.as_ref().map_or(interval.from_ts, |b| b.from_ts),
            successor.as_ref().map_or(interval.to_ts, |b| b.to_ts),
            merged_data,
        );
        debug!(
            level = %aggr_level,
            from_ts = merged.from_ts,
            to_ts = merged.to_ts,
            points = merged.len(),
            "merged block"
        );

        let at = kept.partition_point(|b| b.from_ts < merged.from_ts);
        kept.insert(at, merged);
        *blocks = kept;

        self.recompute_value_ranges(aggr_level);
        self.revision += 1;
    }

    /// Observed min/max per unit over every block of the level
    fn recompute_value_ranges(&mut self, aggr_level: AggrLevel) {
        let units: BTreeMap<&ChartSerieId, &str> = self
            .series
            .iter()
            .map(|s| (&s.chart_serie_id, s.unit.as_str()))
            .collect();

        let mut ranges: BTreeMap<String, ValueRange> = BTreeMap::new();
        for block in self.fetched.get(&aggr_level).into_iter().flatten() {
            for (id, points) in &block.cs_data {
                let Some(unit) = units.get(id) else {
                    continue;
                };
                for (min, max) in points.iter().filter_map(DataPoint::value_range) {
                    if !(min.is_finite() && max.is_finite()) {
                        continue;
                    }
                    ranges
                        .entry(unit.to_string())
                        .and_modify(|r| r.include(min, max))
                        .or_insert(ValueRange::new(min, max));
                }
            }
        }

        self.value_ranges.insert(aggr_level, ranges);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn blocks(&self, aggr_level: AggrLevel) -> &[FetchedBlock] {
        self.fetched.get(&aggr_level).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn value_ranges(&self, aggr_level: AggrLevel) -> BTreeMap<String, ValueRange> {
        self.value_ranges.get(&aggr_level).cloned().unwrap_or_default()
    }

    /// Bumped on every change a renderer could observe
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self, aggr_level: AggrLevel) -> CacheSnapshot {
        CacheSnapshot {
            aggr_level,
            blocks: self.blocks(aggr_level).to_vec(),
            value_ranges: self.value_ranges(aggr_level),
            revision: self.revision,
        }
    }
}
