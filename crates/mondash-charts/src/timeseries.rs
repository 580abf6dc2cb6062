//! Time-series renderer.
//!
//! Content is tiled along the time axis into chunks `CHUNK_WIDTH_PX` wide.
//! Each chunk is keyed by its index plus a stamp of everything that changes its
//! pixels: the frame (scale, level, axis ranges, height) and the points the
//! chunk draws. Panning only moves the outer transform, so existing chunks are
//! kept and only new ones are drawn. Data arriving for one part of the time
//! axis only redraws the chunks showing it.
//! While a zoom is in progress the last settled scale keeps being used for
//! drawing and the difference is applied as a transform.

use crate::chartkit::{band_path, line_path};
use crate::colors;
use leptos::prelude::*;
use mondash_core::{
    AggrLevel, ChartSerie, ChartSerieId, CoordinateSystem, DataPoint, FetchedBlock, TimeInterval,
    TimeTransform,
};
use mondash_state::ChartState;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::RangeInclusive;

pub const CHUNK_WIDTH_PX: f64 = 512.0;

/// Opacity of the min/max band of aggregated series
const BAND_ALPHA: f64 = 0.18;

// ============================================================================
// CHUNKING
// ============================================================================

/// Indexes of the chunks intersecting `[-pan_x, -pan_x + width]` in content space
pub fn visible_chunks(pan_x: f64, width: f64) -> RangeInclusive<i64> {
    let first = (-pan_x / CHUNK_WIDTH_PX).floor() as i64;
    let last = ((-pan_x + width.max(0.0)) / CHUNK_WIDTH_PX).floor() as i64;
    first..=last
}

pub fn chunk_interval(index: i64, time: &TimeTransform) -> TimeInterval {
    let x0 = index as f64 * CHUNK_WIDTH_PX;
    TimeInterval::new(time.x2t(x0), time.x2t(x0 + CHUNK_WIDTH_PX))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub index: i64,
    pub stamp: u64,
}

/// Fingerprint of the inputs shared by every chunk, pan excluded
pub fn render_stamp(coords: &CoordinateSystem, aggr_level: AggrLevel, series: &[ChartSerie]) -> u64 {
    let mut hasher = DefaultHasher::new();
    coords.time.scale().to_bits().hash(&mut hasher);
    coords.time.origin_ts().to_bits().hash(&mut hasher);
    coords.height.to_bits().hash(&mut hasher);
    aggr_level.value().hash(&mut hasher);
    for serie in series {
        serie.chart_serie_id.hash(&mut hasher);
        if let Some(values) = coords.value(&serie.unit) {
            values.min_y().to_bits().hash(&mut hasher);
            values.max_y().to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// `render_stamp` combined with the points chunk `interval` draws
pub fn chunk_stamp(
    frame: u64,
    interval: &TimeInterval,
    blocks: &[FetchedBlock],
    series: &[ChartSerie],
) -> u64 {
    let mut hasher = DefaultHasher::new();
    frame.hash(&mut hasher);
    for block in overlapping(blocks, interval) {
        block.from_ts.to_bits().hash(&mut hasher);
        block.to_ts.to_bits().hash(&mut hasher);
        for serie in series {
            let points = chunk_points(block.points(&serie.chart_serie_id), interval);
            points.len().hash(&mut hasher);
            for point in points {
                hash_point(point, &mut hasher);
            }
        }
    }
    hasher.finish()
}

fn hash_point(point: &DataPoint, hasher: &mut DefaultHasher) {
    point.t().to_bits().hash(hasher);
    match point {
        DataPoint::Raw { v, .. } => v.to_bits().hash(hasher),
        DataPoint::Aggregated { bucket: Some(b), .. } => {
            b.v.to_bits().hash(hasher);
            b.minv.to_bits().hash(hasher);
            b.maxv.to_bits().hash(hasher);
        }
        DataPoint::Aggregated { bucket: None, .. } => u64::MAX.hash(hasher),
    }
}

fn overlapping<'a>(
    blocks: &'a [FetchedBlock],
    interval: &'a TimeInterval,
) -> impl Iterator<Item = &'a FetchedBlock> + 'a {
    blocks
        .iter()
        .filter(move |b| b.from_ts <= interval.to_ts && b.to_ts >= interval.from_ts)
}

/// Points inside `interval` plus one neighbour on each side
fn chunk_points<'a>(points: &'a [DataPoint], interval: &TimeInterval) -> &'a [DataPoint] {
    let first = points
        .partition_point(|p| p.t() < interval.from_ts)
        .saturating_sub(1);
    let last = (points.partition_point(|p| p.t() <= interval.to_ts) + 1).min(points.len());
    &points[first..last.max(first)]
}

// ============================================================================
// PATHS
// ============================================================================

/// SVG paths of one series inside one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct SeriePaths {
    pub chart_serie_id: ChartSerieId,
    pub index: usize,
    /// One polyline per run of consecutive non-empty points
    pub lines: Vec<String>,
    /// Min/max envelopes of aggregated runs
    pub bands: Vec<String>,
}

#[derive(Default)]
struct Run {
    line: Vec<(f64, f64)>,
    upper: Vec<(f64, f64)>,
    lower: Vec<(f64, f64)>,
}

impl Run {
    fn flush(&mut self, out: &mut SeriePaths) {
        if !self.line.is_empty() {
            out.lines.push(line_path(&self.line));
        }
        if self.upper.len() > 1 {
            out.bands.push(band_path(&self.upper, &self.lower));
        }
        self.line.clear();
        self.upper.clear();
        self.lower.clear();
    }
}

/// Paths of every series for the blocks overlapping `interval`.
/// One point on each side of the interval is included so lines join across chunks.
/// Empty aggregation buckets and block boundaries break the line.
pub fn chunk_paths(
    interval: &TimeInterval,
    blocks: &[FetchedBlock],
    series: &[ChartSerie],
    coords: &CoordinateSystem,
) -> Vec<SeriePaths> {
    let time = &coords.time;
    let mut out = Vec::with_capacity(series.len());

    for serie in series {
        let Some(values) = coords.value(&serie.unit) else {
            continue;
        };
        let mut paths = SeriePaths {
            chart_serie_id: serie.chart_serie_id.clone(),
            index: serie.index,
            lines: Vec::new(),
            bands: Vec::new(),
        };
        let mut run = Run::default();

        for block in overlapping(blocks, interval) {
            for point in chunk_points(block.points(&serie.chart_serie_id), interval) {
                let x = time.t2x(point.t());
                match point {
                    DataPoint::Raw { v, .. } => run.line.push((x, values.v2y(*v))),
                    DataPoint::Aggregated { bucket: Some(b), .. } => {
                        run.line.push((x, values.v2y(b.v)));
                        run.upper.push((x, values.v2y(b.maxv)));
                        run.lower.push((x, values.v2y(b.minv)));
                    }
                    DataPoint::Aggregated { bucket: None, .. } => run.flush(&mut paths),
                }
            }
            run.flush(&mut paths);
        }

        if !paths.lines.is_empty() {
            out.push(paths);
        }
    }

    out
}

// ============================================================================
// COMPONENTS
// ============================================================================

/// Series layer of a chart; expects to sit inside the plot clip
#[component]
pub fn SeriesPlot(chart: ChartState) -> impl IntoView {
    // scale used for drawing; frozen while a zoom gesture is running
    let render_scale = Memo::new(move |prev: Option<&f64>| {
        let gesture = chart.gesture.get();
        match prev {
            Some(prev) if gesture.zoom_in_progress => *prev,
            _ => gesture.scale,
        }
    });

    let chunks = Memo::new(move |_| {
        let render_scale = render_scale.get();
        let mut coords = chart.coordinates();
        let stretch = render_scale / coords.time.scale();
        coords.time = TimeTransform::new(coords.time.origin_ts(), render_scale);

        chart.snapshot.with(|snapshot| {
            chart.series.with(|series| {
                let frame = render_stamp(&coords, snapshot.aggr_level, series);
                visible_chunks(coords.pan_x * stretch, coords.width * stretch)
                    .map(|index| {
                        let interval = chunk_interval(index, &coords.time);
                        ChunkKey {
                            index,
                            stamp: chunk_stamp(frame, &interval, &snapshot.blocks, series),
                        }
                    })
                    .collect::<Vec<_>>()
            })
        })
    });

    let transform = move || {
        let gesture = chart.gesture.get();
        format!(
            "translate({:.1}, {:.1}) scale({}, 1)",
            gesture.x,
            gesture.y,
            gesture.scale / render_scale.get()
        )
    };

    view! {
        <g class="series-plot" transform=transform>
            <For
                each=move || chunks.get()
                key=|chunk| *chunk
                children=move |chunk| {
                    view! { <SeriesChunk chart=chart index=chunk.index render_scale=render_scale.get_untracked() /> }
                }
            />
        </g>
    }
}

#[component]
fn SeriesChunk(chart: ChartState, index: i64, render_scale: f64) -> impl IntoView {
    let mut coords = chart.coordinates_untracked();
    coords.time = TimeTransform::new(coords.time.origin_ts(), render_scale);
    let interval = chunk_interval(index, &coords.time);

    let paths = chart.snapshot.with_untracked(|snapshot| {
        chart
            .series
            .with_untracked(|series| chunk_paths(&interval, &snapshot.blocks, series, &coords))
    });

    view! {
        <g class="series-chunk" data-chunk=index.to_string()>
            {paths
                .into_iter()
                .map(|serie| {
                    let stroke = colors::serie_color(serie.index);
                    let fill = colors::serie_band(serie.index, BAND_ALPHA);
                    view! {
                        <g class="serie" data-serie=serie.chart_serie_id.to_string()>
                            {serie
                                .bands
                                .into_iter()
                                .map(|d| view! { <path d=d fill=fill.clone() stroke="none" /> })
                                .collect_view()}
                            {serie
                                .lines
                                .into_iter()
                                .map(|d| {
                                    view! {
                                        <path
                                            d=d
                                            fill="none"
                                            stroke=stroke
                                            stroke-width="1.5"
                                            stroke-linejoin="round"
                                            vector-effect="non-scaling-stroke"
                                        />
                                    }
                                })
                                .collect_view()}
                        </g>
                    }
                })
                .collect_view()}
        </g>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mondash_core::{CsData, GestureState, ValueRange, YAxes};
    use std::collections::BTreeMap;

    fn coords_for(serie: &ChartSerie, pan_x: f64) -> CoordinateSystem {
        let mut axes = YAxes::new(200.0, 10.0);
        let mut ranges = BTreeMap::new();
        ranges.insert(serie.unit.clone(), ValueRange::new(0.0, 100.0));
        axes.set_observed(&ranges);
        CoordinateSystem::new(&GestureState::new(pan_x, 0.0, 10.0), 0.0, 600.0, &axes)
    }

    fn block(serie: &ChartSerie, from_ts: f64, to_ts: f64, points: Vec<DataPoint>) -> FetchedBlock {
        let mut cs_data = CsData::new();
        cs_data.insert(serie.chart_serie_id.clone(), points);
        FetchedBlock::new(from_ts, to_ts, cs_data)
    }

    #[test]
    fn test_visible_chunks() {
        assert_eq!(visible_chunks(0.0, 1000.0), 0..=1);
        assert_eq!(visible_chunks(-600.0, 100.0), 1..=1);
        assert_eq!(visible_chunks(100.0, 300.0), -1..=0);
    }

    #[test]
    fn test_chunk_interval() {
        let time = TimeTransform::new(1000.0, 2.0);
        let interval = chunk_interval(1, &time);
        assert_eq!(interval.from_ts, 1256.0);
        assert_eq!(interval.to_ts, 1512.0);
    }

    #[test]
    fn test_raw_block_is_one_line() {
        let serie = ChartSerie::new("lab.cpu", "%", 0);
        let points = (0..10).map(|i| DataPoint::raw(i as f64, i as f64 * 10.0)).collect();
        let blocks = [block(&serie, 0.0, 10.0, points)];
        let coords = coords_for(&serie, 0.0);

        let paths = chunk_paths(&chunk_interval(0, &coords.time), &blocks, &[serie], &coords);
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].lines.len(), 1);
        assert!(paths[0].bands.is_empty());
        assert_eq!(paths[0].lines[0].matches('L').count(), 9);
    }

    #[test]
    fn test_empty_bucket_breaks_line_and_band() {
        let serie = ChartSerie::new("lab.cpu", "%", 2);
        let points = vec![
            DataPoint::aggregated(1.0, 10.0, 5.0, 15.0),
            DataPoint::aggregated(3.0, 20.0, 10.0, 30.0),
            DataPoint::empty_bucket(5.0),
            DataPoint::aggregated(7.0, 30.0, 20.0, 40.0),
            DataPoint::aggregated(9.0, 40.0, 30.0, 50.0),
        ];
        let blocks = [block(&serie, 0.0, 10.0, points)];
        let coords = coords_for(&serie, 0.0);

        let paths = chunk_paths(&chunk_interval(0, &coords.time), &blocks, &[serie], &coords);
        assert_eq!(paths[0].index, 2);
        assert_eq!(paths[0].lines.len(), 2);
        assert_eq!(paths[0].bands.len(), 2);
        assert!(paths[0].bands.iter().all(|b| b.ends_with('Z')));
    }

    #[test]
    fn test_chunk_only_takes_nearby_points() {
        let serie = ChartSerie::new("lab.mem", "B", 0);
        // 10 px per second: chunk 1 spans t in [51.2, 102.4]
        let points = (0..200).map(|i| DataPoint::raw(i as f64, 50.0)).collect();
        let blocks = [block(&serie, 0.0, 200.0, points)];
        let coords = coords_for(&serie, -512.0);

        let paths = chunk_paths(&chunk_interval(1, &coords.time), &blocks, &[serie], &coords);
        // t = 51..=103: one point before and after the interval
        assert_eq!(paths[0].lines[0].matches('L').count(), 52);
    }

    #[test]
    fn test_series_without_data_are_skipped() {
        let serie = ChartSerie::new("lab.cpu", "%", 0);
        let other = ChartSerie::new("lab.disk", "%", 1);
        let blocks = [block(&serie, 0.0, 10.0, vec![DataPoint::raw(1.0, 1.0)])];
        let coords = coords_for(&serie, 0.0);

        let paths = chunk_paths(&chunk_interval(0, &coords.time), &blocks, &[serie, other], &coords);
        assert_eq!(paths.len(), 1);
    }

    #[test]
    fn test_render_stamp_ignores_pan() {
        let serie = ChartSerie::new("lab.cpu", "%", 0);
        let series = [serie.clone()];
        let a = render_stamp(&coords_for(&serie, 0.0), AggrLevel::RAW, &series);
        let b = render_stamp(&coords_for(&serie, -900.0), AggrLevel::RAW, &series);
        let c = render_stamp(&coords_for(&serie, 0.0), AggrLevel::MAX, &series);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_data_only_restamps_chunks_showing_it() {
        let serie = ChartSerie::new("lab.cpu", "%", 0);
        let series = [serie.clone()];
        let coords = coords_for(&serie, 0.0);
        let frame = render_stamp(&coords, AggrLevel::RAW, &series);
        // 10 px per second: chunk 0 is t in [0, 51.2], chunk 3 is [153.6, 204.8]
        let raw = |from: f64, n: usize| -> Vec<DataPoint> { (0..n).map(|i| DataPoint::raw(from + i as f64, 1.0)).collect() };
        let early = block(&serie, 0.0, 60.0, raw(0.0, 60));
        let late = |n: usize| block(&serie, 150.0, 210.0, raw(150.0, n));

        let before = [early.clone(), late(40)];
        let after = [early, late(50)];
        let stamps = |blocks: &[FetchedBlock]| {
            (0..4)
                .map(|index| chunk_stamp(frame, &chunk_interval(index, &coords.time), blocks, &series))
                .collect::<Vec<_>>()
        };
        let (a, b) = (stamps(&before), stamps(&after));

        assert_eq!(a[0], b[0]);
        assert_eq!(a[1], b[1]);
        assert_ne!(a[3], b[3]);
        // an unchanged chunk still changes with the frame
        let zoomed = render_stamp(&coords_for(&serie, 0.0), AggrLevel::MAX, &series);
        assert_ne!(a[0], chunk_stamp(zoomed, &chunk_interval(0, &coords.time), &before, &series));
    }
}
