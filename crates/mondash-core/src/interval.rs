//! Interval algebra: which parts of a window are missing, which aggregation
//! level fits a pixel budget, and client-side bucketing of raw points.

use crate::{AggrLevel, Bucket, CsData, DataPoint, TimeInterval, BASE_BUCKET_SECS, MAX_AGGR_LEVEL};

/// Round `ts` down to a multiple of `step`
pub fn align_down(ts: f64, step: f64) -> f64 {
    (ts / step).floor() * step
}

/// Round `ts` up to a multiple of `step`
pub fn align_up(ts: f64, step: f64) -> f64 {
    (ts / step).ceil() * step
}

/// Remove `hole` from `piece`, leaving up to two remainders (before, after)
pub fn punch_hole(piece: TimeInterval, hole: &TimeInterval) -> [Option<TimeInterval>; 2] {
    if !piece.overlaps(hole) {
        return [Some(piece), None];
    }

    let before = (piece.from_ts < hole.from_ts).then(|| TimeInterval::new(piece.from_ts, hole.from_ts));
    let after = (hole.to_ts < piece.to_ts).then(|| TimeInterval::new(hole.to_ts, piece.to_ts));
    [before, after]
}

/// Sub-intervals of `wanted` not covered by any interval in `existing`
pub fn get_missing_intervals(existing: &[TimeInterval], wanted: TimeInterval) -> Vec<TimeInterval> {
    existing.iter().fold(vec![wanted], |missing, hole| {
        missing
            .into_iter()
            .flat_map(|piece| punch_hole(piece, hole))
            .flatten()
            .collect()
    })
}

/// Smallest level `>= min_level` whose bucket count over the span fits `max_points_allowed`.
/// Falls back to `AggrLevel::MAX` when even the coarsest level has too many buckets.
pub fn get_suggested_aggr_level(
    from_ts: f64,
    to_ts: f64,
    max_points_allowed: f64,
    min_level: AggrLevel,
) -> AggrLevel {
    let hours = ((to_ts - from_ts) / BASE_BUCKET_SECS).ceil();

    (min_level.value()..=MAX_AGGR_LEVEL)
        .filter_map(AggrLevel::new)
        .find(|level| hours / 3f64.powi(level.value() as i32) <= max_points_allowed)
        .unwrap_or(AggrLevel::MAX)
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    count: usize,
    min: f64,
    max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            sum: 0.0,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    fn push(&mut self, v: f64, min: f64, max: f64) {
        self.sum += v;
        self.count += 1;
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }

    fn finish(&self, t: f64) -> DataPoint {
        if self.count == 0 {
            return DataPoint::empty_bucket(t);
        }
        let avg = self.sum / self.count as f64;
        // keep min <= v <= max under rounding
        DataPoint::Aggregated {
            t,
            bucket: Some(Bucket::new(avg.clamp(self.min, self.max), self.min, self.max)),
        }
    }
}

/// Bucket every series into fixed, grid-aligned buckets of the level's width.
///
/// Bucket `i` covers `[start + i*W, start + (i+1)*W)` with `start = floor(from_ts/W)*W`
/// and is labeled at its midpoint. All series get the same number of buckets and the
/// same labels; buckets without samples are emitted empty. Raw level returns the input.
pub fn aggregate_interval_on_the_fly(
    from_ts: f64,
    to_ts: f64,
    cs_data: &CsData,
    aggr_level: AggrLevel,
) -> CsData {
    let Some(width) = aggr_level.bucket_secs() else {
        return cs_data.clone();
    };

    let start = align_down(from_ts, width);
    let end = align_up(to_ts, width);
    let count = ((end - start) / width).round().max(0.0) as usize;

    cs_data
        .iter()
        .map(|(id, points)| {
            let mut buckets = vec![Accumulator::default(); count];

            for point in points {
                let (Some(v), Some((min, max))) = (point.value(), point.value_range()) else {
                    continue;
                };
                if !(v.is_finite() && min.is_finite() && max.is_finite()) {
                    continue;
                }
                let offset = ((point.t() - start) / width).floor();
                if offset < 0.0 || offset as usize >= count {
                    continue;
                }
                buckets[offset as usize].push(v, min, max);
            }

            let aggregated = buckets
                .iter()
                .enumerate()
                .map(|(i, acc)| acc.finish(start + (i as f64 + 0.5) * width))
                .collect();

            (id.clone(), aggregated)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChartSerieId;

    fn iv(from: f64, to: f64) -> TimeInterval {
        TimeInterval::new(from, to)
    }

    fn level(l: i8) -> AggrLevel {
        AggrLevel::new(l).expect("valid level")
    }

    #[test]
    fn test_missing_intervals_basic() {
        assert_eq!(get_missing_intervals(&[], iv(0.0, 10.0)), vec![iv(0.0, 10.0)]);
        assert_eq!(get_missing_intervals(&[iv(0.0, 10.0)], iv(2.0, 8.0)), vec![]);
        assert_eq!(
            get_missing_intervals(&[iv(3.0, 5.0)], iv(0.0, 10.0)),
            vec![iv(0.0, 3.0), iv(5.0, 10.0)]
        );
        assert_eq!(
            get_missing_intervals(&[iv(-5.0, 4.0), iv(8.0, 20.0)], iv(0.0, 10.0)),
            vec![iv(4.0, 8.0)]
        );
        // touching but not overlapping
        assert_eq!(get_missing_intervals(&[iv(10.0, 20.0)], iv(0.0, 10.0)), vec![iv(0.0, 10.0)]);
    }

    #[test]
    fn test_missing_intervals_order_independent_coverage() {
        let existing = [iv(30.0, 40.0), iv(5.0, 12.0), iv(60.0, 95.0), iv(11.0, 20.0)];
        let mut reversed = existing;
        reversed.reverse();
        let wanted = iv(0.0, 100.0);

        let a = get_missing_intervals(&existing, wanted);
        let mut b = get_missing_intervals(&reversed, wanted);
        b.sort_by(|x, y| x.from_ts.total_cmp(&y.from_ts));
        let mut a_sorted = a.clone();
        a_sorted.sort_by(|x, y| x.from_ts.total_cmp(&y.from_ts));
        assert_eq!(a_sorted, b);
    }

    #[test]
    fn test_missing_intervals_properties() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        for _ in 0..200 {
            let existing: Vec<TimeInterval> = (0..rng.gen_range(0..6))
                .map(|_| {
                    let from = rng.gen_range(-50..150) as f64;
                    iv(from, from + rng.gen_range(1..40) as f64)
                })
                .collect();
            let wanted = iv(0.0, 100.0);
            let missing = get_missing_intervals(&existing, wanted);

            // pieces are disjoint, inside wanted, and never overlap existing
            for (i, piece) in missing.iter().enumerate() {
                assert!(wanted.covers(piece));
                assert!(existing.iter().all(|e| !e.overlaps(piece)));
                for other in &missing[i + 1..] {
                    assert!(!piece.overlaps(other));
                }
            }

            // every integer-centred sample is either missing or covered
            for k in 0..100 {
                let ts = k as f64 + 0.5;
                let is_missing = missing.iter().any(|m| m.contains(ts));
                let is_covered = existing.iter().any(|e| e.contains(ts));
                assert!(is_missing ^ is_covered, "ts {ts} missing={is_missing} covered={is_covered}");
            }

            // fetching what was missing leaves nothing missing
            let mut refetched = existing.clone();
            refetched.extend(missing.iter().copied());
            assert!(get_missing_intervals(&refetched, wanted).is_empty());
        }
    }

    #[test]
    fn test_suggested_aggr_level() {
        // 10 hours: raw needs 30 points, fits 100
        assert_eq!(get_suggested_aggr_level(0.0, 36000.0, 100.0, AggrLevel::RAW), AggrLevel::RAW);
        // 100 hours: raw 300 > 100, L0 100 fits
        assert_eq!(get_suggested_aggr_level(0.0, 360000.0, 100.0, AggrLevel::RAW), level(0));
        // 1000 hours: L0 1000, L1 333, L2 111, L3 37
        assert_eq!(get_suggested_aggr_level(0.0, 3_600_000.0, 100.0, AggrLevel::RAW), level(3));
        // min level wins even if lower would fit
        assert_eq!(get_suggested_aggr_level(0.0, 3600.0, 100.0, level(2)), level(2));
        // nothing fits
        assert_eq!(get_suggested_aggr_level(0.0, 1e12, 10.0, AggrLevel::RAW), AggrLevel::MAX);
    }

    #[test]
    fn test_suggested_aggr_level_is_monotonic_in_span() {
        let mut previous = AggrLevel::RAW;
        for hours in 1..5000 {
            let current = get_suggested_aggr_level(0.0, hours as f64 * 3600.0, 120.0, AggrLevel::RAW);
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn test_aggregate_on_the_fly() {
        let a = ChartSerieId::from("a");
        let b = ChartSerieId::from("b");
        let mut cs_data = CsData::new();
        cs_data.insert(
            a.clone(),
            vec![
                DataPoint::raw(100.0, 1.0),
                DataPoint::raw(200.0, 3.0),
                DataPoint::raw(3700.0, 10.0),
            ],
        );
        cs_data.insert(b.clone(), vec![DataPoint::raw(7300.0, -4.0)]);

        let out = aggregate_interval_on_the_fly(50.0, 7250.0, &cs_data, level(0));

        // [0, 10800) -> 3 buckets for every series
        assert_eq!(out[&a].len(), 3);
        assert_eq!(out[&b].len(), 3);
        assert_eq!(out[&a][0], DataPoint::aggregated(1800.0, 2.0, 1.0, 3.0));
        assert_eq!(out[&a][1], DataPoint::aggregated(5400.0, 10.0, 10.0, 10.0));
        assert_eq!(out[&a][2], DataPoint::empty_bucket(9000.0));
        assert_eq!(out[&b][2], DataPoint::aggregated(9000.0, -4.0, -4.0, -4.0));
        assert_eq!(out[&b][0].t(), out[&a][0].t());
    }

    #[test]
    fn test_aggregate_bucket_count_and_bounds() {
        let id = ChartSerieId::from("x");
        let points: Vec<DataPoint> = (0..500)
            .map(|i| DataPoint::raw(1000.0 + i as f64 * 97.0, ((i * 37) % 11) as f64))
            .collect();
        let mut cs_data = CsData::new();
        cs_data.insert(id.clone(), points.clone());

        let (from, to) = (1000.0, 1000.0 + 500.0 * 97.0);
        let out = aggregate_interval_on_the_fly(from, to, &cs_data, level(1));
        let w = 10800.0;
        let expected = ((to / w).ceil() - (from / w).floor()) as usize;
        assert_eq!(out[&id].len(), expected);

        let mut total = 0usize;
        for (i, p) in out[&id].iter().enumerate() {
            if let DataPoint::Aggregated { t, bucket: Some(bucket) } = p {
                assert!(bucket.minv <= bucket.v && bucket.v <= bucket.maxv);
                let lo = t - w / 2.0;
                total += points.iter().filter(|q| q.t() >= lo && q.t() < lo + w).count();
            }
            assert_eq!(p.t(), (from / w).floor() * w + (i as f64 + 0.5) * w);
        }
        assert_eq!(total, points.len());
    }

    #[test]
    fn test_aggregate_raw_level_is_identity() {
        let mut cs_data = CsData::new();
        cs_data.insert("x".into(), vec![DataPoint::raw(1.0, 2.0)]);
        assert_eq!(aggregate_interval_on_the_fly(0.0, 10.0, &cs_data, AggrLevel::RAW), cs_data);
    }
}
