//! Nearest-point lookup for tooltips and clicks

use crate::{ChartSerie, ChartSerieId, CoordinateSystem, DataPoint, FetchedBlock};

/// Search radius around the pointer, in pixels
pub const MAX_DIST_PX: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ClosestPoint {
    pub chart_serie_id: ChartSerieId,
    pub point: DataPoint,
    /// Distance to the pointer in pixels
    pub distance_px: f64,
}

/// Brute-force search over blocks pre-filtered by a pixel tolerance box
pub struct HitTester<'a> {
    blocks: &'a [FetchedBlock],
    series: &'a [ChartSerie],
    coords: &'a CoordinateSystem,
}

impl<'a> HitTester<'a> {
    pub fn new(
        blocks: &'a [FetchedBlock],
        series: &'a [ChartSerie],
        coords: &'a CoordinateSystem,
    ) -> Self {
        Self {
            blocks,
            series,
            coords,
        }
    }

    /// Point closest to (`ts`, `y`) where `y` is in content pixels.
    /// Distance is measured in pixels so time and value scales do not bias the pick.
    pub fn get_closest_value(&self, ts: f64, y: f64) -> Option<ClosestPoint> {
        let time = &self.coords.time;
        let dt_max = time.dx2dt(MAX_DIST_PX).abs();

        let mut best: Option<ClosestPoint> = None;

        let nearby_blocks = self
            .blocks
            .iter()
            .filter(|b| b.from_ts - dt_max <= ts && ts <= b.to_ts + dt_max);

        for block in nearby_blocks {
            for serie in self.series {
                let Some(values) = self.coords.value(&serie.unit) else {
                    continue;
                };
                let v = values.y2v(y);
                let dv_max = values.dy2dv(MAX_DIST_PX).abs();

                let points = block.points(&serie.chart_serie_id);
                let first = points.partition_point(|p| p.t() < ts - dt_max);

                for point in points[first..].iter().take_while(|p| p.t() <= ts + dt_max) {
                    let Some(pv) = point.value() else {
                        continue;
                    };
                    if (pv - v).abs() > dv_max {
                        continue;
                    }

                    let distance_px =
                        time.dt2dx(point.t() - ts).hypot(values.dv2dy(pv - v));
                    if best.as_ref().is_none_or(|b| distance_px < b.distance_px) {
                        best = Some(ClosestPoint {
                            chart_serie_id: serie.chart_serie_id.clone(),
                            point: *point,
                            distance_px,
                        });
                    }
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CsData, GestureState, ValueRange, YAxes};
    use std::collections::BTreeMap;

    fn fixture() -> (Vec<FetchedBlock>, Vec<ChartSerie>, CoordinateSystem) {
        let a = ChartSerie::new("a", "%", 0);
        let b = ChartSerie::new("b", "%", 1);

        let mut cs_data = CsData::new();
        cs_data.insert(
            a.chart_serie_id.clone(),
            vec![DataPoint::raw(100.0, 10.0), DataPoint::raw(110.0, 50.0), DataPoint::raw(120.0, 90.0)],
        );
        cs_data.insert(b.chart_serie_id.clone(), vec![DataPoint::raw(111.0, 52.0)]);
        let blocks = vec![FetchedBlock::new(0.0, 200.0, cs_data)];

        // 100 units over 100px, 1px per second
        let mut axes = YAxes::new(100.0, 0.0);
        let mut ranges = BTreeMap::new();
        ranges.insert("%".to_string(), ValueRange::new(0.0, 100.0));
        axes.set_observed(&ranges);

        let gesture = GestureState {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
            zoom_in_progress: false,
        };
        let coords = CoordinateSystem::new(&gesture, 0.0, 200.0, &axes);
        (blocks, vec![a, b], coords)
    }

    #[test]
    fn test_picks_pixel_closest_across_series() {
        let (blocks, series, coords) = fixture();
        let tester = HitTester::new(&blocks, &series, &coords);
        let y = coords.value("%").map(|v| v.v2y(51.0)).unwrap_or_default();

        let hit = tester.get_closest_value(110.8, y).expect("hit");
        assert_eq!(hit.chart_serie_id, series[1].chart_serie_id);
        assert_eq!(hit.point, DataPoint::raw(111.0, 52.0));
    }

    #[test]
    fn test_nothing_within_tolerance() {
        let (blocks, series, coords) = fixture();
        let tester = HitTester::new(&blocks, &series, &coords);
        let y = coords.value("%").map(|v| v.v2y(10.0)).unwrap_or_default();

        // right value, 15s (15px) away in time
        assert!(tester.get_closest_value(85.0, y).is_none());
        // right time, far off in value
        assert!(tester.get_closest_value(100.0, y - 20.0).is_none());
        assert!(tester.get_closest_value(101.0, y + 1.0).is_some());
    }

    #[test]
    fn test_empty_buckets_are_skipped() {
        let serie = ChartSerie::new("c", "%", 0);
        let mut cs_data = CsData::new();
        cs_data.insert(serie.chart_serie_id.clone(), vec![DataPoint::empty_bucket(100.0)]);
        let blocks = vec![FetchedBlock::new(0.0, 200.0, cs_data)];
        let (_, _, coords) = fixture();
        let series = vec![serie];

        let tester = HitTester::new(&blocks, &series, &coords);
        assert!(tester.get_closest_value(100.0, 50.0).is_none());
    }
}
