//! Axis ticks.
//!
//! Value axes get "nice" round steps (2, 5 or 10 times a power of ten).
//! The time axis picks a rung from a fixed ladder based on pixels-per-second so a
//! similar number of labels is visible at every zoom level; ticks are aligned to
//! calendar boundaries in the display time zone, not to raw multiples of seconds.

use crate::{TimeInterval, TimeTransform};
use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike,
};
use std::collections::BTreeSet;
use std::fmt::Display;

// ============================================================================
// VALUE AXIS
// ============================================================================

/// Tick positions for a value axis together with their display precision
#[derive(Debug, Clone, PartialEq)]
pub struct YTicks {
    pub values: Vec<f64>,
    pub decimals: usize,
}

impl YTicks {
    pub fn labels(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| format!("{:.prec$}", v, prec = self.decimals))
            .collect()
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

const MAX_Y_TICKS: usize = 1000;

/// Nice ticks spanning `[min, max]`: first tick `<= min`, last tick `>= max`
pub fn y_ticks(min: f64, max: f64) -> Option<YTicks> {
    if !(min.is_finite() && max.is_finite()) {
        return None;
    }
    let (min, max) = if min <= max { (min, max) } else { (max, min) };

    let diff = max - min;
    if !diff.is_finite() {
        return None;
    }
    if diff == 0.0 {
        return Some(YTicks {
            values: vec![0.0, 1.0],
            decimals: 0,
        });
    }

    let power10 = diff.log10().floor() as i32 - 1;
    let magnitude = 10f64.powi(power10);
    let normalized = (diff / magnitude).floor();

    let multiplier = if normalized >= 50.0 {
        10.0
    } else if normalized >= 20.0 {
        5.0
    } else {
        2.0
    };
    let interval = multiplier * magnitude;
    let decimals = (-power10 - if multiplier == 10.0 { 1 } else { 0 }).max(0) as usize;

    let start = (min / interval).floor() * interval;
    // spans at the edge of f64 range (or below it) have no representable step
    if !(interval.is_finite() && interval > 0.0 && start.is_finite()) {
        return None;
    }
    let mut values = Vec::new();
    for i in 0..MAX_Y_TICKS {
        let tick = start + i as f64 * interval;
        // + 0.0 turns -0.0 into 0.0
        values.push(tick + 0.0);
        if tick >= max - interval * 1e-9 {
            break;
        }
    }
    if values.last().is_some_and(|v| !v.is_finite()) {
        return None;
    }

    Some(YTicks { values, decimals })
}

/// Tick labels for a value axis; `None` while either bound is unknown
pub fn get_y_ticks(min_y_value: Option<f64>, max_y_value: Option<f64>) -> Option<Vec<String>> {
    y_ticks(min_y_value?, max_y_value?).map(|ticks| ticks.labels())
}

// ============================================================================
// TIME AXIS: LADDER
// ============================================================================

/// Minimum horizontal distance between two labeled time ticks
pub const MIN_LABEL_SPACING_PX: f64 = 70.0;

/// Upper bound on generated ticks per axis, whatever the input
const MAX_TICKS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

/// `count` calendar units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep {
    pub unit: TimeUnit,
    pub count: u32,
}

impl TimeStep {
    pub const fn new(unit: TimeUnit, count: u32) -> Self {
        Self { unit, count }
    }

    /// Exact length for sub-day units
    fn fixed_millis(&self) -> Option<i64> {
        let unit_ms = match self.unit {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day | TimeUnit::Month | TimeUnit::Year => return None,
        };
        Some(unit_ms * self.count as i64)
    }

    /// Nominal length in seconds (months and years averaged)
    pub fn approx_secs(&self) -> f64 {
        let unit = match self.unit {
            TimeUnit::Millisecond => 0.001,
            TimeUnit::Second => 1.0,
            TimeUnit::Minute => 60.0,
            TimeUnit::Hour => 3600.0,
            TimeUnit::Day => 86_400.0,
            TimeUnit::Month => 2_629_746.0,
            TimeUnit::Year => 31_556_952.0,
        };
        unit * self.count as f64
    }

    /// Start of the step-aligned period containing `naive`
    fn align(&self, naive: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = naive.date();
        let n = self.count.max(1);

        match self.fixed_millis() {
            Some(step_ms) => {
                let time = naive.time();
                let ms_of_day = time.num_seconds_from_midnight() as i64 * 1000
                    + (time.nanosecond() / 1_000_000) as i64;
                let aligned = ms_of_day.div_euclid(step_ms) * step_ms;
                date.and_hms_opt(0, 0, 0)?
                    .checked_add_signed(TimeDelta::milliseconds(aligned))
            }
            None => match self.unit {
                TimeUnit::Day => date
                    .with_day(1 + ((date.day() - 1) / n) * n)?
                    .and_hms_opt(0, 0, 0),
                TimeUnit::Month => {
                    NaiveDate::from_ymd_opt(date.year(), (date.month0() / n) * n + 1, 1)?
                        .and_hms_opt(0, 0, 0)
                }
                _ => NaiveDate::from_ymd_opt(date.year().div_euclid(n as i32) * n as i32, 1, 1)?
                    .and_hms_opt(0, 0, 0),
            },
        }
    }

    /// Multi-day steps restart on the 1st of each month and skip a short last step
    fn accepts(&self, naive: &NaiveDateTime) -> bool {
        if self.unit != TimeUnit::Day || self.count <= 1 {
            return true;
        }
        let day = naive.day();
        (day - 1) % self.count == 0 && day + self.count <= 32
    }

    fn advance(&self, naive: NaiveDateTime) -> Option<NaiveDateTime> {
        if let Some(step_ms) = self.fixed_millis() {
            return naive.checked_add_signed(TimeDelta::milliseconds(step_ms));
        }
        match self.unit {
            TimeUnit::Day => {
                let mut date = naive.date();
                loop {
                    date = date.succ_opt()?;
                    let candidate = date.and_hms_opt(0, 0, 0)?;
                    if self.accepts(&candidate) {
                        return Some(candidate);
                    }
                }
            }
            TimeUnit::Month => naive.checked_add_months(Months::new(self.count)),
            _ => naive.checked_add_months(Months::new(12 * self.count)),
        }
    }
}

/// One zoom range of the time axis
#[derive(Debug, Clone, Copy)]
pub struct LadderRung {
    pub minor: TimeStep,
    pub major: TimeStep,
    /// chrono format of major tick labels
    pub label: &'static str,
    /// Coarser band shown under the ticks (e.g. the date under hour ticks)
    pub band: Option<(TimeStep, &'static str)>,
}

impl LadderRung {
    /// Smallest pixels-per-second at which this rung's labels do not collide
    pub fn scale_threshold(&self) -> f64 {
        MIN_LABEL_SPACING_PX / self.major.approx_secs()
    }
}

const fn rung(
    minor: (TimeUnit, u32),
    major: (TimeUnit, u32),
    label: &'static str,
    band: Option<(TimeStep, &'static str)>,
) -> LadderRung {
    LadderRung {
        minor: TimeStep::new(minor.0, minor.1),
        major: TimeStep::new(major.0, major.1),
        label,
        band,
    }
}

use TimeUnit::{Day, Hour, Millisecond as Ms, Minute as Min, Month, Second as Sec, Year};

const BAND_MINUTE: Option<(TimeStep, &str)> = Some((TimeStep::new(Min, 1), "%Y-%m-%d %H:%M"));
const BAND_HOUR: Option<(TimeStep, &str)> = Some((TimeStep::new(Hour, 1), "%Y-%m-%d %H:00"));
const BAND_DAY: Option<(TimeStep, &str)> = Some((TimeStep::new(Day, 1), "%a %Y-%m-%d"));
const BAND_MONTH: Option<(TimeStep, &str)> = Some((TimeStep::new(Month, 1), "%B %Y"));
const BAND_YEAR: Option<(TimeStep, &str)> = Some((TimeStep::new(Year, 1), "%Y"));

/// Rungs from most zoomed-in to most zoomed-out
pub static TIME_LADDER: [LadderRung; 30] = [
    rung((Ms, 10), (Ms, 100), "%M:%S%.3f", BAND_MINUTE),
    rung((Ms, 50), (Ms, 200), "%M:%S%.3f", BAND_MINUTE),
    rung((Ms, 100), (Ms, 500), "%M:%S%.3f", BAND_MINUTE),
    rung((Ms, 200), (Sec, 1), "%H:%M:%S", BAND_HOUR),
    rung((Ms, 500), (Sec, 2), "%H:%M:%S", BAND_HOUR),
    rung((Sec, 1), (Sec, 5), "%H:%M:%S", BAND_HOUR),
    rung((Sec, 2), (Sec, 10), "%H:%M:%S", BAND_HOUR),
    rung((Sec, 5), (Sec, 15), "%H:%M:%S", BAND_HOUR),
    rung((Sec, 5), (Sec, 30), "%H:%M:%S", BAND_HOUR),
    rung((Sec, 10), (Min, 1), "%H:%M", BAND_DAY),
    rung((Sec, 30), (Min, 2), "%H:%M", BAND_DAY),
    rung((Min, 1), (Min, 5), "%H:%M", BAND_DAY),
    rung((Min, 2), (Min, 10), "%H:%M", BAND_DAY),
    rung((Min, 5), (Min, 15), "%H:%M", BAND_DAY),
    rung((Min, 5), (Min, 30), "%H:%M", BAND_DAY),
    rung((Min, 10), (Hour, 1), "%H:%M", BAND_DAY),
    rung((Min, 30), (Hour, 2), "%H:%M", BAND_DAY),
    rung((Min, 30), (Hour, 3), "%H:%M", BAND_DAY),
    rung((Hour, 1), (Hour, 6), "%H:%M", BAND_DAY),
    rung((Hour, 2), (Hour, 12), "%H:%M", BAND_DAY),
    rung((Hour, 3), (Day, 1), "%b %d", BAND_MONTH),
    rung((Hour, 12), (Day, 2), "%b %d", BAND_MONTH),
    rung((Day, 1), (Day, 5), "%b %d", BAND_MONTH),
    rung((Day, 2), (Day, 10), "%b %d", BAND_MONTH),
    rung((Day, 5), (Month, 1), "%b", BAND_YEAR),
    rung((Month, 1), (Month, 3), "%b", BAND_YEAR),
    rung((Month, 1), (Month, 6), "%b", BAND_YEAR),
    rung((Month, 3), (Year, 1), "%Y", None),
    rung((Year, 1), (Year, 2), "%Y", None),
    rung((Year, 1), (Year, 5), "%Y", None),
];

/// Finest rung whose labels fit at `scale` pixels per second
pub fn rung_for_scale(scale: f64) -> &'static LadderRung {
    TIME_LADDER
        .iter()
        .find(|rung| scale >= rung.scale_threshold())
        .unwrap_or(&TIME_LADDER[TIME_LADDER.len() - 1])
}

// ============================================================================
// TIME AXIS: GENERATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TimeTick {
    pub ts: f64,
    pub x: f64,
    pub is_major: bool,
    pub label: Option<String>,
}

/// Label interval of the coarser band, clipped to the visible window
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBand {
    pub from_ts: f64,
    pub to_ts: f64,
    pub x_from: f64,
    pub x_to: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeAxisTicks {
    pub ticks: Vec<TimeTick>,
    pub bands: Vec<TimeBand>,
}

impl TimeAxisTicks {
    pub fn labeled(&self) -> impl Iterator<Item = &TimeTick> {
        self.ticks.iter().filter(|t| t.label.is_some())
    }
}

/// Step-aligned instants in `[from_ms, to_ms]`; with `leading` the aligned start
/// before `from_ms` is kept too.
fn aligned_instants<Tz: TimeZone>(
    from_ms: i64,
    to_ms: i64,
    step: TimeStep,
    tz: &Tz,
    leading: bool,
) -> Vec<i64> {
    let Some(start) = DateTime::from_timestamp_millis(from_ms) else {
        return Vec::new();
    };
    let Some(mut naive) = step.align(start.with_timezone(tz).naive_local()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for _ in 0..MAX_TICKS {
        // instants that do not exist locally (DST gap) are skipped
        if let Some(instant) = tz.from_local_datetime(&naive).earliest() {
            let ms = instant.timestamp_millis();
            if ms > to_ms {
                break;
            }
            if (ms >= from_ms || (leading && out.is_empty())) && step.accepts(&naive) {
                out.push(ms);
            }
        }
        match step.advance(naive) {
            Some(next) => naive = next,
            None => break,
        }
    }
    out
}

fn format_instant<Tz>(ms: i64, fmt: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(tz).format(fmt).to_string())
        .unwrap_or_default()
}

/// Ticks and bands for the visible window at the transform's zoom level
pub fn generate_time_ticks<Tz>(
    transform: &TimeTransform,
    visible: &TimeInterval,
    tz: &Tz,
) -> TimeAxisTicks
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let rung = rung_for_scale(transform.scale());
    let from_ms = (visible.from_ts * 1000.0).floor() as i64;
    let to_ms = (visible.to_ts * 1000.0).ceil() as i64;

    let majors: BTreeSet<i64> = aligned_instants(from_ms, to_ms, rung.major, tz, false)
        .into_iter()
        .collect();
    let mut all: BTreeSet<i64> = aligned_instants(from_ms, to_ms, rung.minor, tz, false)
        .into_iter()
        .collect();
    all.extend(majors.iter().copied());

    let ticks = all
        .into_iter()
        .map(|ms| {
            let ts = ms as f64 / 1000.0;
            let is_major = majors.contains(&ms);
            TimeTick {
                ts,
                x: transform.t2x(ts),
                is_major,
                label: is_major.then(|| format_instant(ms, rung.label, tz)),
            }
        })
        .collect();

    let bands = rung
        .band
        .map(|(step, fmt)| {
            let starts = aligned_instants(from_ms, to_ms, step, tz, true);
            starts
                .iter()
                .enumerate()
                .filter_map(|(i, &start_ms)| {
                    let end_ms = match starts.get(i + 1) {
                        Some(&next) => next,
                        None => to_ms,
                    };
                    let from_ts = (start_ms.max(from_ms)) as f64 / 1000.0;
                    let to_ts = (end_ms.min(to_ms)) as f64 / 1000.0;
                    (from_ts < to_ts).then(|| TimeBand {
                        from_ts,
                        to_ts,
                        x_from: transform.t2x(from_ts),
                        x_to: transform.t2x(to_ts),
                        label: format_instant(start_ms, fmt, tz),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    TimeAxisTicks { ticks, bands }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_y_ticks_hundreds() {
        assert_eq!(
            get_y_ticks(Some(0.0), Some(999.0)),
            Some(strs(&["0", "100", "200", "300", "400", "500", "600", "700", "800", "900", "1000"]))
        );
    }

    #[test]
    fn test_y_ticks_negative() {
        let ticks = get_y_ticks(Some(-50.0), Some(-9.0)).expect("ticks");
        assert_eq!(ticks.first().map(String::as_str), Some("-50"));
        assert_eq!(ticks.last().map(String::as_str), Some("-5"));
        assert_eq!(ticks.len(), 10);
    }

    #[test]
    fn test_y_ticks_decimals() {
        assert_eq!(
            get_y_ticks(Some(0.0), Some(0.99)),
            Some(strs(&["0.0", "0.1", "0.2", "0.3", "0.4", "0.5", "0.6", "0.7", "0.8", "0.9", "1.0"]))
        );
        // 0..0.3: power10 -2, normalized 30 -> step 0.05, two decimals
        let ticks = get_y_ticks(Some(0.0), Some(0.3)).expect("ticks");
        assert_eq!(ticks[1], "0.05");
        assert_eq!(ticks.last().map(String::as_str), Some("0.30"));
    }

    #[test]
    fn test_y_ticks_degenerate() {
        assert_eq!(get_y_ticks(None, Some(1.0)), None);
        assert_eq!(get_y_ticks(Some(1.0), None), None);
        assert_eq!(get_y_ticks(Some(5.0), Some(5.0)), Some(strs(&["0", "1"])));
    }

    #[test]
    fn test_y_ticks_unrepresentable_span() {
        // max - min overflows to infinity
        assert_eq!(y_ticks(-1e308, 1e308), None);
        assert_eq!(y_ticks(f64::MIN, f64::MAX), None);
        // step underflows to zero
        assert_eq!(y_ticks(0.0, 1e-320), None);
        assert_eq!(y_ticks(f64::NAN, 1.0), None);
        // still fine just below the edge
        assert!(y_ticks(-1e307, 1e307).is_some());
    }

    #[test]
    fn test_y_ticks_bracket_range() {
        for (min, max) in [(-3.2, 7.9), (0.001, 0.0042), (12.0, 13.5), (-1e6, 3e6), (17.0, 230.0)] {
            let ticks = y_ticks(min, max).expect("ticks");
            let step = ticks.values[1] - ticks.values[0];
            assert!(ticks.values[0] <= min);
            assert!(ticks.last().unwrap_or(f64::NAN) >= max - step * 1e-6);
            assert!(ticks.values.windows(2).all(|w| w[0] < w[1]));
            assert!(ticks.values.len() <= 52);
        }
    }

    #[test]
    fn test_ladder_thresholds_decrease() {
        for pair in TIME_LADDER.windows(2) {
            assert!(pair[0].scale_threshold() > pair[1].scale_threshold());
            assert!(pair[0].major.approx_secs() >= pair[0].minor.approx_secs());
        }
    }

    const JAN_1_2024: f64 = 1_704_067_200.0;

    #[test]
    fn test_hour_ticks_with_date_band() {
        // 0.025 px/s: 30 min labels would be 45px apart, 1h labels 90px
        let transform = TimeTransform::new(JAN_1_2024, 0.025);
        let visible = TimeInterval::new(JAN_1_2024, JAN_1_2024 + 4.0 * 3600.0);
        let axis = generate_time_ticks(&transform, &visible, &Utc);

        let labels: Vec<&str> = axis.labeled().filter_map(|t| t.label.as_deref()).collect();
        assert_eq!(labels, vec!["00:00", "01:00", "02:00", "03:00", "04:00"]);
        assert_eq!(axis.ticks.len(), 25);
        assert_eq!(axis.ticks[1].ts, JAN_1_2024 + 600.0);
        assert!(!axis.ticks[1].is_major);
        assert_eq!(axis.ticks[0].x, 0.0);

        assert_eq!(axis.bands.len(), 1);
        assert_eq!(axis.bands[0].label, "Mon 2024-01-01");
        assert_eq!(axis.bands[0].x_to, transform.t2x(visible.to_ts));
    }

    #[test]
    fn test_month_ticks_aligned_to_calendar() {
        let transform = TimeTransform::new(JAN_1_2024, 5e-5);
        // Jan 15 .. Jun 15 2024
        let visible = TimeInterval::new(1_705_276_800.0, 1_718_409_600.0);
        let axis = generate_time_ticks(&transform, &visible, &Utc);

        let labels: Vec<&str> = axis.labeled().filter_map(|t| t.label.as_deref()).collect();
        assert_eq!(labels, vec!["Feb", "Mar", "Apr", "May", "Jun"]);
        assert!(axis.ticks.iter().all(|t| visible.from_ts <= t.ts && t.ts <= visible.to_ts));
        assert_eq!(axis.bands.len(), 1);
        assert_eq!(axis.bands[0].label, "2024");
    }

    #[test]
    fn test_bands_split_at_day_boundary() {
        let transform = TimeTransform::new(JAN_1_2024, 0.01);
        let visible = TimeInterval::new(JAN_1_2024 - 6.0 * 3600.0, JAN_1_2024 + 6.0 * 3600.0);
        let axis = generate_time_ticks(&transform, &visible, &Utc);

        let bands: Vec<&str> = axis.bands.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(bands, vec!["Sun 2023-12-31", "Mon 2024-01-01"]);
        assert_eq!(axis.bands[0].to_ts, JAN_1_2024);
        assert_eq!(axis.bands[1].from_ts, JAN_1_2024);
    }

    #[test]
    fn test_label_count_stays_readable_across_zoom() {
        let width = 800.0;
        let mut scale = 5e-7;
        while scale < 2000.0 {
            let transform = TimeTransform::new(JAN_1_2024, scale);
            let visible = TimeInterval::new(JAN_1_2024, JAN_1_2024 + width / scale);
            let axis = generate_time_ticks(&transform, &visible, &Utc);
            let labeled = axis.labeled().count();
            assert!((3..=16).contains(&labeled), "scale {scale}: {labeled} labels");
            scale *= 1.37;
        }
    }
}
