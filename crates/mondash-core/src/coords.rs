//! Coordinate system: time <-> x and value <-> y, one value transform per unit.
//!
//! Transforms are plain `Copy` values rebuilt by an explicit `recompute` step
//! whenever an input changes; nothing caches them by identity.

use crate::{y_ticks, GestureState, TimeInterval, ValueRange};
use std::collections::BTreeMap;

// ============================================================================
// TIME AXIS
// ============================================================================

/// `t2x(t) = (t - origin_ts) * scale`, in content pixels (before panning)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeTransform {
    origin_ts: f64,
    scale: f64,
}

impl TimeTransform {
    pub fn new(origin_ts: f64, scale: f64) -> Self {
        Self { origin_ts, scale }
    }

    pub fn origin_ts(&self) -> f64 {
        self.origin_ts
    }

    /// Pixels per second
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn t2x(&self, t: f64) -> f64 {
        (t - self.origin_ts) * self.scale
    }

    pub fn x2t(&self, x: f64) -> f64 {
        self.origin_ts + x / self.scale
    }

    pub fn dt2dx(&self, dt: f64) -> f64 {
        dt * self.scale
    }

    pub fn dx2dt(&self, dx: f64) -> f64 {
        dx / self.scale
    }

    /// Time window shown by a surface `width` pixels wide when content is translated by `pan_x`
    pub fn visible_interval(&self, pan_x: f64, width: f64) -> TimeInterval {
        TimeInterval::new(self.x2t(-pan_x), self.x2t(-pan_x + width.max(1.0)))
    }
}

// ============================================================================
// VALUE AXIS
// ============================================================================

/// `v2y(v) = top_padding + pixel_height - (v - min_y) * pixel_height / (max_y - min_y)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueTransform {
    min_y: f64,
    max_y: f64,
    pixel_height: f64,
    top_padding: f64,
}

impl ValueTransform {
    pub fn new(min_y: f64, max_y: f64, pixel_height: f64, top_padding: f64) -> Self {
        Self {
            min_y,
            max_y,
            pixel_height: pixel_height.max(1.0),
            top_padding,
        }
    }

    fn range(&self) -> f64 {
        let range = self.max_y - self.min_y;
        if range == 0.0 { 1.0 } else { range }
    }

    pub fn min_y(&self) -> f64 {
        self.min_y
    }

    pub fn max_y(&self) -> f64 {
        self.max_y
    }

    pub fn v2y(&self, v: f64) -> f64 {
        self.top_padding + self.pixel_height - (v - self.min_y) * self.pixel_height / self.range()
    }

    pub fn y2v(&self, y: f64) -> f64 {
        self.min_y + (self.top_padding + self.pixel_height - y) * self.range() / self.pixel_height
    }

    pub fn dv2dy(&self, dv: f64) -> f64 {
        dv * self.pixel_height / self.range()
    }

    pub fn dy2dv(&self, dy: f64) -> f64 {
        dy * self.range() / self.pixel_height
    }
}

/// Values derived from the effective range and the pixel height
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedAxis {
    /// First tick value
    pub min_y: f64,
    /// Last tick value
    pub max_y: f64,
    pub ticks: Vec<String>,
    pub tick_values: Vec<f64>,
    pub transform: ValueTransform,
}

/// State of one Y axis; one axis per unit
#[derive(Debug, Clone, PartialEq)]
pub struct YAxisProperties {
    pub unit: String,
    /// Observed in data
    pub min_y_value: Option<f64>,
    pub max_y_value: Option<f64>,
    pub min_y_value_user_set: Option<f64>,
    pub max_y_value_user_set: Option<f64>,
    pub derived: DerivedAxis,
}

impl YAxisProperties {
    pub fn new(unit: impl Into<String>, pixel_height: f64, top_padding: f64) -> Self {
        let mut axis = Self {
            unit: unit.into(),
            min_y_value: None,
            max_y_value: None,
            min_y_value_user_set: None,
            max_y_value_user_set: None,
            derived: DerivedAxis {
                min_y: 0.0,
                max_y: 1.0,
                ticks: Vec::new(),
                tick_values: Vec::new(),
                transform: ValueTransform::new(0.0, 1.0, pixel_height, top_padding),
            },
        };
        axis.recompute(pixel_height, top_padding);
        axis
    }

    /// User overrides win over observed bounds
    pub fn effective_range(&self) -> (Option<f64>, Option<f64>) {
        (
            self.min_y_value_user_set.or(self.min_y_value),
            self.max_y_value_user_set.or(self.max_y_value),
        )
    }

    /// Rebuild `derived` from the effective range.
    /// Axes without data span `[0, 1]` with no ticks; flat data is padded by one unit.
    pub fn recompute(&mut self, pixel_height: f64, top_padding: f64) {
        let ticks = match self.effective_range() {
            (Some(min), Some(max)) if min == max => y_ticks(min - 1.0, max + 1.0),
            (Some(min), Some(max)) => y_ticks(min, max),
            _ => None,
        };

        self.derived = match ticks {
            Some(ticks) => {
                let min_y = ticks.first().unwrap_or(0.0);
                let max_y = ticks.last().unwrap_or(1.0);
                DerivedAxis {
                    min_y,
                    max_y,
                    ticks: ticks.labels(),
                    tick_values: ticks.values,
                    transform: ValueTransform::new(min_y, max_y, pixel_height, top_padding),
                }
            }
            None => DerivedAxis {
                min_y: 0.0,
                max_y: 1.0,
                ticks: Vec::new(),
                tick_values: Vec::new(),
                transform: ValueTransform::new(0.0, 1.0, pixel_height, top_padding),
            },
        };
    }
}

/// All Y axes of a chart keyed by unit.
///
/// Invalidation events, each of which recomputes the affected axes:
/// observed range change (`set_observed`), user override (`set_user_range`)
/// and plot resize (`resize`).
#[derive(Debug, Clone, PartialEq)]
pub struct YAxes {
    axes: BTreeMap<String, YAxisProperties>,
    pixel_height: f64,
    top_padding: f64,
}

impl YAxes {
    pub fn new(pixel_height: f64, top_padding: f64) -> Self {
        Self {
            axes: BTreeMap::new(),
            pixel_height,
            top_padding,
        }
    }

    pub fn pixel_height(&self) -> f64 {
        self.pixel_height
    }

    pub fn top_padding(&self) -> f64 {
        self.top_padding
    }

    /// Make sure an axis exists for every unit in `units`
    pub fn ensure_units<'a>(&mut self, units: impl IntoIterator<Item = &'a str>) {
        for unit in units {
            if !self.axes.contains_key(unit) {
                let axis = YAxisProperties::new(unit, self.pixel_height, self.top_padding);
                self.axes.insert(unit.to_string(), axis);
            }
        }
    }

    /// Replace observed bounds; units missing from `ranges` lose theirs
    pub fn set_observed(&mut self, ranges: &BTreeMap<String, ValueRange>) {
        self.ensure_units(ranges.keys().map(String::as_str));
        for (unit, axis) in self.axes.iter_mut() {
            let range = ranges.get(unit);
            let observed = (range.map(|r| r.min), range.map(|r| r.max));
            if (axis.min_y_value, axis.max_y_value) != observed {
                axis.min_y_value = observed.0;
                axis.max_y_value = observed.1;
                axis.recompute(self.pixel_height, self.top_padding);
            }
        }
    }

    pub fn set_user_range(&mut self, unit: &str, min: Option<f64>, max: Option<f64>) {
        self.ensure_units([unit]);
        if let Some(axis) = self.axes.get_mut(unit) {
            axis.min_y_value_user_set = min;
            axis.max_y_value_user_set = max;
            axis.recompute(self.pixel_height, self.top_padding);
        }
    }

    pub fn resize(&mut self, pixel_height: f64) {
        if pixel_height == self.pixel_height {
            return;
        }
        self.pixel_height = pixel_height;
        self.recompute();
    }

    pub fn recompute(&mut self) {
        for axis in self.axes.values_mut() {
            axis.recompute(self.pixel_height, self.top_padding);
        }
    }

    pub fn get(&self, unit: &str) -> Option<&YAxisProperties> {
        self.axes.get(unit)
    }

    pub fn transform(&self, unit: &str) -> Option<ValueTransform> {
        self.axes.get(unit).map(|a| a.derived.transform)
    }

    pub fn iter(&self) -> impl Iterator<Item = &YAxisProperties> {
        self.axes.values()
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

// ============================================================================
// COORDINATE SYSTEM
// ============================================================================

/// Per-render snapshot of every transform a chart needs.
/// Screen position = content position + pan.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystem {
    pub time: TimeTransform,
    pub pan_x: f64,
    pub pan_y: f64,
    pub width: f64,
    pub height: f64,
    values: BTreeMap<String, ValueTransform>,
}

impl CoordinateSystem {
    pub fn new(gesture: &GestureState, origin_ts: f64, width: f64, axes: &YAxes) -> Self {
        Self {
            time: TimeTransform::new(origin_ts, gesture.scale),
            pan_x: gesture.x,
            pan_y: gesture.y,
            width,
            height: axes.pixel_height() + axes.top_padding(),
            values: axes
                .iter()
                .map(|axis| (axis.unit.clone(), axis.derived.transform))
                .collect(),
        }
    }

    pub fn visible_interval(&self) -> TimeInterval {
        self.time.visible_interval(self.pan_x, self.width)
    }

    pub fn value(&self, unit: &str) -> Option<&ValueTransform> {
        self.values.get(unit)
    }

    /// Content coordinates of a surface point
    pub fn to_content(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (screen_x - self.pan_x, screen_y - self.pan_y)
    }

    /// Timestamp under a surface x
    pub fn screen_x2t(&self, screen_x: f64) -> f64 {
        self.time.x2t(screen_x - self.pan_x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};

    fn close(a: f64, b: f64, magnitude: f64) -> bool {
        (a - b).abs() <= 1e-9 * magnitude.abs().max(1.0)
    }

    #[test]
    fn test_time_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let origin = rng.gen_range(1.0e9..2.0e9);
            let scale = 10f64.powf(rng.gen_range(-8.0..3.0));
            let transform = TimeTransform::new(origin, scale);
            let t = origin + rng.gen_range(-1.0e7..1.0e7);
            assert!(close(transform.x2t(transform.t2x(t)), t, t));
            let dt = rng.gen_range(-1.0e5..1.0e5);
            assert!(close(transform.dx2dt(transform.dt2dx(dt)), dt, dt));
        }
    }

    #[test]
    fn test_value_round_trip() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(43);
        for _ in 0..1000 {
            let min = rng.gen_range(-1.0e6..1.0e6);
            let max = min + 10f64.powf(rng.gen_range(-3.0..6.0));
            let height = rng.gen_range(20.0..2000.0);
            let transform = ValueTransform::new(min, max, height, 10.0);
            let v = rng.gen_range(min..max);
            assert!(close(transform.y2v(transform.v2y(v)), v, max.abs().max(min.abs())));
            let dv = max - min;
            assert!(close(transform.dy2dv(transform.dv2dy(dv)), dv, dv));
        }
    }

    #[test]
    fn test_value_transform_maps_range_to_plot() {
        let transform = ValueTransform::new(0.0, 100.0, 200.0, 10.0);
        assert_eq!(transform.v2y(0.0), 210.0);
        assert_eq!(transform.v2y(100.0), 10.0);
        assert_eq!(transform.dv2dy(50.0), 100.0);
    }

    #[test]
    fn test_visible_interval_follows_pan() {
        let transform = TimeTransform::new(1000.0, 2.0);
        // content moved 200px left: window starts 100s after origin
        let visible = transform.visible_interval(-200.0, 400.0);
        assert_eq!(visible, TimeInterval::new(1100.0, 1300.0));
    }

    #[test]
    fn test_axis_derivation() {
        let mut axes = YAxes::new(200.0, 10.0);
        axes.ensure_units(["%"]);
        let empty = axes.get("%").expect("axis");
        assert!(empty.derived.ticks.is_empty());
        assert_eq!((empty.derived.min_y, empty.derived.max_y), (0.0, 1.0));

        let mut ranges = BTreeMap::new();
        ranges.insert("%".to_string(), ValueRange::new(3.0, 97.0));
        axes.set_observed(&ranges);
        let axis = axes.get("%").expect("axis");
        assert_eq!(axis.derived.min_y, 0.0);
        assert_eq!(axis.derived.max_y, 100.0);
        assert_eq!(axis.derived.ticks.first().map(String::as_str), Some("0"));

        // user override wins over observed data
        axes.set_user_range("%", Some(-100.0), None);
        assert_eq!(axes.get("%").map(|a| a.derived.min_y), Some(-100.0));

        // resize changes the transform but not the range
        let before = axes.transform("%").expect("transform");
        axes.resize(400.0);
        let after = axes.transform("%").expect("transform");
        assert_eq!(before.min_y(), after.min_y());
        assert_eq!(after.dv2dy(1.0), 2.0 * before.dv2dy(1.0));
    }

    #[test]
    fn test_flat_data_gets_padded_range() {
        let mut axes = YAxes::new(100.0, 0.0);
        let mut ranges = BTreeMap::new();
        ranges.insert("V".to_string(), ValueRange::new(5.0, 5.0));
        axes.set_observed(&ranges);
        let axis = axes.get("V").expect("axis");
        assert!(axis.derived.min_y <= 4.0 && axis.derived.max_y >= 5.999);
    }

    #[test]
    fn test_overflowing_user_range_falls_back() {
        let mut axes = YAxes::new(100.0, 0.0);
        axes.set_user_range("B", Some(-1e308), Some(1e308));
        let axis = axes.get("B").expect("axis");
        assert!(axis.derived.ticks.is_empty());
        assert_eq!((axis.derived.min_y, axis.derived.max_y), (0.0, 1.0));
    }
}
