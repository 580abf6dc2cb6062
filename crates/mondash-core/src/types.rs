//! Chart data model: time intervals, aggregation levels, points, series, blocks

use crate::{colors, ChartSerieId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Highest aggregation level the values API knows about
pub const MAX_AGGR_LEVEL: i8 = 6;

/// Bucket width of aggregation level 0, in seconds
pub const BASE_BUCKET_SECS: f64 = 3600.0;

// ============================================================================
// TIME INTERVAL
// ============================================================================

/// Half-open `[from_ts, to_ts)` interval in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub from_ts: f64,
    pub to_ts: f64,
}

impl TimeInterval {
    pub fn new(from_ts: f64, to_ts: f64) -> Self {
        debug_assert!(from_ts < to_ts, "empty interval [{from_ts}, {to_ts})");
        Self { from_ts, to_ts }
    }

    /// Duration in seconds
    pub fn span(&self) -> f64 {
        self.to_ts - self.from_ts
    }

    pub fn contains(&self, ts: f64) -> bool {
        self.from_ts <= ts && ts < self.to_ts
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.from_ts < other.to_ts && other.from_ts < self.to_ts
    }

    pub fn covers(&self, other: &TimeInterval) -> bool {
        self.from_ts <= other.from_ts && other.to_ts <= self.to_ts
    }

    /// Grow by `margin` seconds on both sides
    pub fn widen(&self, margin: f64) -> Self {
        Self::new(self.from_ts - margin, self.to_ts + margin)
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.from_ts, self.to_ts)
    }
}

// ============================================================================
// AGGREGATION LEVEL
// ============================================================================

/// Aggregation level in `[-1, MAX_AGGR_LEVEL]`; `-1` is raw data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AggrLevel(i8);

impl AggrLevel {
    pub const RAW: AggrLevel = AggrLevel(-1);
    pub const MAX: AggrLevel = AggrLevel(MAX_AGGR_LEVEL);

    pub fn new(level: i8) -> Option<Self> {
        (-1..=MAX_AGGR_LEVEL).contains(&level).then_some(Self(level))
    }

    pub fn value(&self) -> i8 {
        self.0
    }

    pub fn is_raw(&self) -> bool {
        self.0 < 0
    }

    /// Bucket width `3600 * 3^L`; raw data has no buckets
    pub fn bucket_secs(&self) -> Option<f64> {
        if self.is_raw() {
            None
        } else {
            Some(BASE_BUCKET_SECS * 3f64.powi(self.0 as i32))
        }
    }

    /// Grid that fetch windows at this level snap to.
    /// Raw data snaps to the level-0 bucket so raw and aggregated blocks share one rule.
    pub fn alignment_secs(&self) -> f64 {
        self.bucket_secs().unwrap_or(BASE_BUCKET_SECS)
    }

    /// Value of the `a` query parameter
    pub fn query_param(&self) -> String {
        if self.is_raw() {
            "no".to_string()
        } else {
            self.0.to_string()
        }
    }

    /// All levels from raw up to `MAX`
    pub fn all() -> impl Iterator<Item = AggrLevel> {
        (-1..=MAX_AGGR_LEVEL).map(AggrLevel)
    }
}

impl Default for AggrLevel {
    fn default() -> Self {
        Self::RAW
    }
}

impl std::fmt::Display for AggrLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_raw() {
            write!(f, "raw")
        } else {
            write!(f, "L{}", self.0)
        }
    }
}

// ============================================================================
// DATA POINTS
// ============================================================================

/// Statistics of one non-empty aggregation bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Average
    pub v: f64,
    pub minv: f64,
    pub maxv: f64,
}

impl Bucket {
    pub fn new(v: f64, minv: f64, maxv: f64) -> Self {
        Self { v, minv, maxv }
    }
}

/// A sample: either a raw measurement or an aggregation bucket.
/// Empty buckets keep their slot with `bucket: None` so aggregated series stay aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataPoint {
    Raw { t: f64, v: f64 },
    Aggregated { t: f64, bucket: Option<Bucket> },
}

impl DataPoint {
    pub fn raw(t: f64, v: f64) -> Self {
        Self::Raw { t, v }
    }

    pub fn aggregated(t: f64, v: f64, minv: f64, maxv: f64) -> Self {
        Self::Aggregated {
            t,
            bucket: Some(Bucket::new(v, minv, maxv)),
        }
    }

    pub fn empty_bucket(t: f64) -> Self {
        Self::Aggregated { t, bucket: None }
    }

    pub fn t(&self) -> f64 {
        match self {
            Self::Raw { t, .. } | Self::Aggregated { t, .. } => *t,
        }
    }

    /// Value drawn on the line (raw value or bucket average)
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Raw { v, .. } => Some(*v),
            Self::Aggregated { bucket, .. } => bucket.map(|b| b.v),
        }
    }

    /// Extent this point occupies on the value axis
    pub fn value_range(&self) -> Option<(f64, f64)> {
        match self {
            Self::Raw { v, .. } => Some((*v, *v)),
            Self::Aggregated { bucket, .. } => bucket.map(|b| (b.minv, b.maxv)),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    /// Apply `f` to every value; min/max are re-ordered so decreasing maps keep `minv <= maxv`
    pub fn map_values(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            Self::Raw { t, v } => Self::Raw { t, v: f(v) },
            Self::Aggregated { t, bucket } => Self::Aggregated {
                t,
                bucket: bucket.map(|b| {
                    let (a, c) = (f(b.minv), f(b.maxv));
                    Bucket::new(f(b.v), a.min(c), a.max(c))
                }),
            },
        }
    }
}

/// Per-series points of one block or response
pub type CsData = BTreeMap<ChartSerieId, Vec<DataPoint>>;

// ============================================================================
// SERIES
// ============================================================================

/// One data stream shown on a chart, resolved from a path filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSerie {
    pub chart_serie_id: ChartSerieId,
    pub path: String,
    pub unit: String,
    pub expression: String,
    /// Stable display slot; determines color
    pub index: usize,
}

impl ChartSerie {
    pub fn new(path: impl Into<String>, unit: impl Into<String>, index: usize) -> Self {
        let path = path.into();
        Self {
            chart_serie_id: ChartSerieId::new(format!("{}-{}", index, path)),
            path,
            unit: unit.into(),
            expression: "$1".to_string(),
            index,
        }
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn color(&self) -> &'static str {
        colors::serie_color(self.index)
    }
}

// ============================================================================
// FETCHED BLOCK
// ============================================================================

/// Time-contiguous cached data for one aggregation level.
/// Each series' points are sorted by `t` and lie inside `[from_ts, to_ts)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedBlock {
    pub from_ts: f64,
    pub to_ts: f64,
    pub cs_data: CsData,
}

impl FetchedBlock {
    pub fn new(from_ts: f64, to_ts: f64, cs_data: CsData) -> Self {
        Self {
            from_ts,
            to_ts,
            cs_data,
        }
    }

    pub fn interval(&self) -> TimeInterval {
        TimeInterval::new(self.from_ts, self.to_ts)
    }

    pub fn points(&self, id: &ChartSerieId) -> &[DataPoint] {
        self.cs_data.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of points over all series
    pub fn len(&self) -> usize {
        self.cs_data.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split around `hole`, keeping the parts strictly before and after it
    pub fn split_around(self, hole: &TimeInterval) -> (Option<FetchedBlock>, Option<FetchedBlock>) {
        let before = (self.from_ts < hole.from_ts).then(|| {
            let cs_data = self
                .cs_data
                .iter()
                .map(|(id, points)| {
                    let kept = points.iter().copied().filter(|p| p.t() < hole.from_ts).collect();
                    (id.clone(), kept)
                })
                .collect();
            FetchedBlock::new(self.from_ts, hole.from_ts.min(self.to_ts), cs_data)
        });

        let after = (hole.to_ts < self.to_ts).then(|| {
            let cs_data = self
                .cs_data
                .iter()
                .map(|(id, points)| {
                    let kept = points.iter().copied().filter(|p| p.t() >= hole.to_ts).collect();
                    (id.clone(), kept)
                })
                .collect();
            FetchedBlock::new(hole.to_ts.max(self.from_ts), self.to_ts, cs_data)
        });

        (before, after)
    }
}

// ============================================================================
// VALUE RANGE
// ============================================================================

/// Observed min/max of values on one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn include(&mut self, min: f64, max: f64) {
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggr_level_bounds() {
        assert_eq!(AggrLevel::new(-1), Some(AggrLevel::RAW));
        assert_eq!(AggrLevel::new(6), Some(AggrLevel::MAX));
        assert_eq!(AggrLevel::new(7), None);
        assert_eq!(AggrLevel::new(-2), None);
        assert_eq!(AggrLevel::all().count(), 8);
    }

    #[test]
    fn test_bucket_widths() {
        assert_eq!(AggrLevel::RAW.bucket_secs(), None);
        assert_eq!(AggrLevel::new(0).and_then(|l| l.bucket_secs()), Some(3600.0));
        assert_eq!(AggrLevel::new(2).and_then(|l| l.bucket_secs()), Some(32400.0));
        assert_eq!(AggrLevel::RAW.alignment_secs(), 3600.0);
        assert_eq!(AggrLevel::RAW.query_param(), "no");
        assert_eq!(AggrLevel::MAX.query_param(), "6");
    }

    #[test]
    fn test_map_values_keeps_min_max_order() {
        let p = DataPoint::aggregated(10.0, 2.0, 1.0, 3.0).map_values(|v| -v);
        assert_eq!(p, DataPoint::aggregated(10.0, -2.0, -3.0, -1.0));

        let empty = DataPoint::empty_bucket(5.0).map_values(|v| v * 2.0);
        assert_eq!(empty.value(), None);
    }

    #[test]
    fn test_split_around() {
        let mut cs_data = CsData::new();
        cs_data.insert(
            ChartSerieId::from("a"),
            vec![DataPoint::raw(100.0, 1.0), DataPoint::raw(250.0, 2.0), DataPoint::raw(350.0, 3.0)],
        );
        let block = FetchedBlock::new(0.0, 400.0, cs_data);

        let (before, after) = block.split_around(&TimeInterval::new(200.0, 300.0));
        let before = before.expect("part before the hole");
        let after = after.expect("part after the hole");

        assert_eq!((before.from_ts, before.to_ts), (0.0, 200.0));
        assert_eq!((after.from_ts, after.to_ts), (300.0, 400.0));
        assert_eq!(before.points(&"a".into()), &[DataPoint::raw(100.0, 1.0)]);
        assert_eq!(after.points(&"a".into()), &[DataPoint::raw(350.0, 3.0)]);
    }

    #[test]
    fn test_serie_defaults() {
        let serie = ChartSerie::new("lab.cpu.load", "%", 3);
        assert_eq!(serie.chart_serie_id.as_str(), "3-lab.cpu.load");
        assert_eq!(serie.expression, "$1");
        assert_eq!(serie.color(), colors::serie_color(3));
    }
}
