//! Monitoring dashboard - WASM entry point
//!
//! Reads the page location into an `AppConfig`, installs the panic hook and
//! the tracing subscriber, provides the shared state and transport clients,
//! then mounts the dashboard.
//!
//! Query parameters:
//! - `account` - account whose values are charted (default `1`)
//! - `paths` - charts separated by `;`, each `[name=]path[:unit[:expression]],...`
//! - `range` - initial preset (`1h`, `24h`, `7d`, `30d`)
//! - `y` - fixed value ranges, `unit:min:max,...` (either bound may be empty)
//! - `kiosk` - wall display: plain wheel zooms, live updates reconnect forever
//! - `dense` - larger point budget per pixel

use leptos::prelude::*;
use mondash_components::{ChartDefinition, Dashboard};
use mondash_core::{ChartConfig, ChartSerie, GestureConfig};
use mondash_fetch::{provide_live_updates, ExponentialBackoff, FetchConfig, LiveConfig, ValuesClient};
use mondash_state::{provide_app_state, ViewRange};

const DEFAULT_ACCOUNT: &str = "1";

#[derive(Debug, Clone, PartialEq)]
struct AppConfig {
    api_root: String,
    live_url: String,
    account_id: String,
    charts: Vec<ChartDefinition>,
    kiosk: bool,
    dense: bool,
}

/// Raw query parameters
#[derive(Debug, Clone, Default)]
struct QueryParams {
    account: Option<String>,
    paths: Option<String>,
    range: Option<String>,
    y: Option<String>,
    kiosk: Option<String>,
    dense: Option<String>,
}

/// Present and not explicitly switched off
fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| !matches!(v.trim(), "0" | "false" | "no"))
}

impl AppConfig {
    /// `origin` as in `location.origin`, e.g. `https://mon.example.com`
    fn new(origin: &str, query: QueryParams) -> Self {
        let origin = origin.trim_end_matches('/');
        let live_origin = if let Some(host) = origin.strip_prefix("https://") {
            format!("wss://{}", host)
        } else if let Some(host) = origin.strip_prefix("http://") {
            format!("ws://{}", host)
        } else {
            origin.to_string()
        };
        let range = query.range.as_deref().and_then(parse_range).unwrap_or(ViewRange::LastDay);
        let y_ranges = query.y.as_deref().map(parse_y_ranges).unwrap_or_default();

        Self {
            api_root: format!("{}/api", origin),
            live_url: format!("{}/ws", live_origin),
            account_id: query
                .account
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ACCOUNT.to_string()),
            charts: query
                .paths
                .as_deref()
                .map(|p| parse_charts(p, range))
                .unwrap_or_default()
                .into_iter()
                .map(|chart| {
                    y_ranges.iter().fold(chart, |chart, (unit, min, max)| {
                        chart.y_range(unit.as_str(), *min, *max)
                    })
                })
                .collect(),
            kiosk: flag(query.kiosk.as_deref()),
            dense: flag(query.dense.as_deref()),
        }
    }

    fn from_location() -> Self {
        let location = web_sys::window().map(|w| w.location());
        let origin = location
            .as_ref()
            .and_then(|l| l.origin().ok())
            .unwrap_or_default();
        let search = location
            .as_ref()
            .and_then(|l| l.search().ok())
            .unwrap_or_default();
        let params = web_sys::UrlSearchParams::new_with_str(&search).ok();
        let param = |name: &str| params.as_ref().and_then(|p| p.get(name));

        Self::new(
            &origin,
            QueryParams {
                account: param("account"),
                paths: param("paths"),
                range: param("range"),
                y: param("y"),
                kiosk: param("kiosk"),
                dense: param("dense"),
            },
        )
    }

    fn fetch_config(&self) -> FetchConfig {
        FetchConfig::new(&self.api_root, &self.account_id)
    }

    fn live_config(&self) -> LiveConfig {
        let policy = if self.kiosk {
            ExponentialBackoff::kiosk()
        } else {
            ExponentialBackoff::conservative()
        };
        LiveConfig::new(&self.live_url)
            .topic(self.fetch_config().live_topic())
            .with_policy(policy)
    }

    fn chart_config(&self) -> ChartConfig {
        if self.dense {
            ChartConfig::dense()
        } else {
            ChartConfig::default()
        }
    }

    fn gesture_config(&self) -> GestureConfig {
        if self.kiosk {
            GestureConfig::fullscreen()
        } else {
            GestureConfig::default()
        }
    }
}

fn parse_range(label: &str) -> Option<ViewRange> {
    ViewRange::all().iter().copied().find(|r| r.label() == label)
}

/// `unit:min:max` entries; units with neither bound are skipped
fn parse_y_ranges(entries: &str) -> Vec<(String, Option<f64>, Option<f64>)> {
    let bound = |b: Option<&str>| b.and_then(|b| b.trim().parse::<f64>().ok()).filter(|b| b.is_finite());
    entries
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let unit = parts.next()?.trim();
            let (min, max) = (bound(parts.next()), bound(parts.next()));
            (min.is_some() || max.is_some()).then(|| (unit.to_string(), min, max))
        })
        .collect()
}

/// One `ChartSerie` per `path[:unit[:expression]]` entry
fn parse_series(entries: &str) -> Vec<ChartSerie> {
    entries.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(index, entry)| {
            let mut parts = entry.splitn(3, ':');
            let path = parts.next().unwrap_or_default();
            let unit = parts.next().unwrap_or_default();
            let serie = ChartSerie::new(path, unit, index);
            match parts.next().filter(|e| !e.is_empty()) {
                Some(expression) => serie.with_expression(expression),
                None => serie,
            }
        })
        .collect()
}

fn parse_charts(paths: &str, range: ViewRange) -> Vec<ChartDefinition> {
    paths
        .split(';')
        .filter_map(|chart| {
            let (name, series) = match chart.split_once('=') {
                Some((name, series)) => (name.trim().to_string(), series),
                None => (String::new(), chart),
            };
            let series = parse_series(series);
            if series.is_empty() {
                return None;
            }
            let name = if name.is_empty() {
                series
                    .iter()
                    .map(|s| s.path.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                name
            };
            Some(ChartDefinition::new(name, series).initial_range(range))
        })
        .collect()
}

fn main() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();

    let config = AppConfig::from_location();
    tracing::info!(
        api_root = %config.api_root,
        live_url = %config.live_url,
        account = %config.account_id,
        charts = config.charts.len(),
        kiosk = config.kiosk,
        "starting monitoring dashboard"
    );

    leptos::mount::mount_to_body(move || {
        let state = provide_app_state();
        provide_context(ValuesClient::new(config.fetch_config()));
        provide_context(config.chart_config());
        provide_context(config.gesture_config());
        provide_live_updates(state, config.live_config());

        view! { <Dashboard charts=config.charts.clone() /> }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_from_origin() {
        let config = AppConfig::new("https://mon.example.com/", QueryParams::default());
        assert_eq!(config.api_root, "https://mon.example.com/api");
        assert_eq!(config.live_url, "wss://mon.example.com/ws");
        assert_eq!(config.account_id, DEFAULT_ACCOUNT);
        assert!(config.charts.is_empty());

        let config = AppConfig::new(
            "http://localhost:8080",
            QueryParams {
                account: Some("42".into()),
                ..QueryParams::default()
            },
        );
        assert_eq!(config.live_url, "ws://localhost:8080/ws");
        assert_eq!(config.live_config().topic, "accounts/42/values/+");
        assert_eq!(
            config.fetch_config().values_url(),
            "http://localhost:8080/api/accounts/42/values/"
        );
    }

    #[test]
    fn test_parse_series() {
        let series = parse_series("host.cpu.load:%, host.net.rx:B:$1*8,,host.up");
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].path, "host.cpu.load");
        assert_eq!(series[0].unit, "%");
        assert_eq!(series[0].expression, "$1");
        assert_eq!(series[1].unit, "B");
        assert_eq!(series[1].expression, "$1*8");
        assert_eq!(series[1].index, 1);
        assert_eq!(series[2].path, "host.up");
        assert_eq!(series[2].unit, "");
    }

    #[test]
    fn test_parse_charts() {
        let charts = parse_charts("CPU=host.cpu.load:%,host.cpu.idle:%;host.net.rx:B;  ", ViewRange::LastHour);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].name, "CPU");
        assert_eq!(charts[0].series.len(), 2);
        assert_eq!(charts[0].initial_range, ViewRange::LastHour);
        assert_eq!(charts[1].name, "host.net.rx");
    }

    #[test]
    fn test_range_param() {
        assert_eq!(parse_range("7d"), Some(ViewRange::LastWeek));
        assert_eq!(parse_range("2y"), None);

        let config = AppConfig::new(
            "http://h",
            QueryParams {
                paths: Some("a.b".into()),
                range: Some("1h".into()),
                ..QueryParams::default()
            },
        );
        assert_eq!(config.charts[0].initial_range, ViewRange::LastHour);
    }

    #[test]
    fn test_y_ranges_apply_to_every_chart() {
        assert_eq!(
            parse_y_ranges("%:0:100,B::1e9, C::,x:abc:"),
            vec![
                ("%".to_string(), Some(0.0), Some(100.0)),
                ("B".to_string(), None, Some(1e9)),
            ]
        );

        let config = AppConfig::new(
            "http://h",
            QueryParams {
                paths: Some("a.cpu:%;b.rx:B".into()),
                y: Some("%:0:100".into()),
                ..QueryParams::default()
            },
        );
        assert_eq!(config.charts.len(), 2);
        for chart in &config.charts {
            assert_eq!(chart.y_ranges.len(), 1);
            assert_eq!(chart.y_ranges[0].unit, "%");
            assert_eq!(chart.y_ranges[0].max, Some(100.0));
        }
    }

    #[test]
    fn test_kiosk_and_dense_flags() {
        let config = AppConfig::new("http://h", QueryParams::default());
        assert!(!config.gesture_config().kidnap_scroll);
        assert_eq!(config.live_config().reconnect_policy.max_attempts, 10);
        assert_eq!(config.chart_config().max_points_per_px, ChartConfig::default().max_points_per_px);

        let config = AppConfig::new(
            "http://h",
            QueryParams {
                kiosk: Some("".into()),
                dense: Some("1".into()),
                ..QueryParams::default()
            },
        );
        assert!(config.gesture_config().kidnap_scroll);
        assert_eq!(config.live_config().reconnect_policy.max_attempts, 0);
        assert_eq!(config.chart_config().max_points_per_px, 0.5);

        assert!(!flag(Some("false")));
        assert!(!flag(None));
    }
}
