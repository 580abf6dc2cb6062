//! JSON shapes exchanged with the values API and the live-update channel

use crate::{AggrLevel, DataPoint, TimeInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("live update topic '{0}' has no path segment")]
    EmptyTopic(String),
}

/// One point as sent by the server; aggregated points carry `minv`/`maxv`
/// and empty buckets send `null` values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WirePoint {
    pub t: f64,
    #[serde(default)]
    pub v: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxv: Option<f64>,
}

impl WirePoint {
    /// Interpret the point for a request at `level`.
    ///
    /// Raw requests drop null values. Aggregated requests keep empty buckets and
    /// pass raw-shaped points (no min/max) through as `Raw` for local bucketing.
    pub fn into_data_point(self, level: AggrLevel) -> Option<DataPoint> {
        if !self.t.is_finite() {
            return None;
        }

        if level.is_raw() {
            return self.v.map(|v| DataPoint::raw(self.t, v));
        }

        match (self.v, self.minv, self.maxv) {
            (Some(v), Some(minv), Some(maxv)) => Some(DataPoint::aggregated(
                self.t,
                v,
                minv.min(maxv),
                minv.max(maxv),
            )),
            (Some(v), _, _) => Some(DataPoint::raw(self.t, v)),
            (None, _, _) => Some(DataPoint::empty_bucket(self.t)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathValues {
    #[serde(default)]
    pub next_data_point: Option<f64>,
    #[serde(default)]
    pub data: Vec<WirePoint>,
}

/// Body of `GET .../values`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuesResponse {
    #[serde(default)]
    pub paths: BTreeMap<String, PathValues>,
}

impl ValuesResponse {
    pub fn from_json(body: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Decoded points of `path`, sorted by time; unknown paths yield nothing
    pub fn points(&self, path: &str, level: AggrLevel) -> Vec<DataPoint> {
        let mut points: Vec<DataPoint> = self
            .paths
            .get(path)
            .map(|values| {
                values
                    .data
                    .iter()
                    .filter_map(|p| p.into_data_point(level))
                    .collect()
            })
            .unwrap_or_default();
        points.sort_by(|a, b| a.t().total_cmp(&b.t()));
        points
    }
}

/// Query parameters of a values request: `p`, `t0`, `t1`, `a`
pub fn values_query(
    paths: &[String],
    interval: &TimeInterval,
    level: AggrLevel,
) -> Vec<(&'static str, String)> {
    vec![
        ("p", paths.join(",")),
        ("t0", interval.from_ts.to_string()),
        ("t1", interval.to_ts.to_string()),
        ("a", level.query_param()),
    ]
}

// ============================================================================
// LIVE UPDATES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePayload {
    pub t: f64,
}

/// Push notification that a path received a new value at `payload.t`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub topic: String,
    pub payload: LivePayload,
}

impl LiveUpdate {
    pub fn from_json(body: &str) -> Result<Self, WireError> {
        let update: LiveUpdate = serde_json::from_str(body)?;
        if update.path().is_empty() {
            return Err(WireError::EmptyTopic(update.topic));
        }
        Ok(update)
    }

    /// Trailing topic segment, i.e. the series path
    pub fn path(&self) -> &str {
        topic_path(&self.topic)
    }
}

pub fn topic_path(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or("")
}
