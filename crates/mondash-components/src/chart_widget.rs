//! One chart panel: toolbar with preset ranges, chart surface, legend, errors.
//!
//! The widget owns the wiring between the chart state and the transport:
//! every settled pan/zoom, resize or series change runs `ensure_visible_data`
//! and hands the resulting fetches and aborts to the `ValuesClient`; relevant
//! live updates become one refresh fetch each.

use futures::StreamExt;
use leptos::ev;
use leptos::html::Div;
use leptos::prelude::*;
use mondash_charts::{use_chart_gestures, ChartDimensions, ChartMargin, ChartSurface};
use mondash_core::{colors, ChartConfig, ChartSerie, GestureConfig};
use mondash_fetch::{use_live_updates, ValuesClient};
use mondash_state::{xy_scale_for_window, ChartState, PlotSize, ViewRange};
use wasm_bindgen_futures::spawn_local;

pub const DEFAULT_PLOT_HEIGHT: f64 = 260.0;

/// User override of one unit's value range
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRange {
    pub unit: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// What one dashboard chart shows
#[derive(Debug, Clone, PartialEq)]
pub struct ChartDefinition {
    pub name: String,
    pub series: Vec<ChartSerie>,
    pub y_ranges: Vec<UnitRange>,
    pub initial_range: ViewRange,
}

impl ChartDefinition {
    pub fn new(name: impl Into<String>, series: Vec<ChartSerie>) -> Self {
        Self {
            name: name.into(),
            series,
            y_ranges: Vec::new(),
            initial_range: ViewRange::LastDay,
        }
    }

    pub fn y_range(mut self, unit: impl Into<String>, min: Option<f64>, max: Option<f64>) -> Self {
        self.y_ranges.push(UnitRange {
            unit: unit.into(),
            min,
            max,
        });
        self
    }

    pub fn initial_range(mut self, range: ViewRange) -> Self {
        self.initial_range = range;
        self
    }
}

fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Chart and gesture tuning come from context when the app provides them
#[component]
pub fn ChartWidget(definition: ChartDefinition) -> impl IntoView {
    let client = use_context::<ValuesClient>().unwrap_or_default();
    let chart_config = use_context::<ChartConfig>().unwrap_or_default();
    let gesture_config = use_context::<GestureConfig>().unwrap_or_default();
    let span = definition.initial_range.span_secs();

    let chart = ChartState::new(
        chart_config,
        definition.series.clone(),
        now_ts(),
        span,
        PlotSize {
            width: 800.0,
            height: DEFAULT_PLOT_HEIGHT,
        },
    );
    for range in &definition.y_ranges {
        chart.set_user_range(&range.unit, range.min, range.max);
    }

    let gestures = use_chart_gestures(chart, gesture_config);
    // preset together with the pan/zoom it produced
    let initial = chart.gesture.get_untracked();
    let active_range = RwSignal::new(Some((definition.initial_range, initial.x, initial.scale)));

    // ------------------------------------------------------------------------
    // Data planning
    // ------------------------------------------------------------------------

    let planner = client.clone();
    Effect::new(move |_| {
        let gesture = chart.gesture.get();
        chart.size.track();
        chart.series.track();
        if gesture.zoom_in_progress {
            return;
        }
        let outcome = untrack(|| chart.ensure_visible_data());
        if !outcome.is_empty() {
            tracing::debug!(
                fetch = outcome.fetch.len(),
                abort = outcome.abort.len(),
                "chart data planned"
            );
        }
        planner.run(chart, outcome);
    });

    if let Some(live) = use_live_updates() {
        let mut updates = live.subscribe();
        let client = client.clone();
        spawn_local(async move {
            while let Some(update) = updates.next().await {
                if chart.hover.try_get_untracked().is_none() {
                    break;
                }
                if let Some(request) = chart.handle_live_update(&update.topic, update.payload.t) {
                    client.spawn(chart, request);
                }
            }
        });
    }

    let teardown = client.clone();
    on_cleanup(move || {
        teardown.abort(&chart.abort_all());
    });

    // ------------------------------------------------------------------------
    // Sizing
    // ------------------------------------------------------------------------

    let container = NodeRef::<Div>::new();
    let measure = move || {
        let Some(el) = container.get_untracked() else {
            return;
        };
        let margin = ChartMargin::for_axes(chart.axes.with_untracked(|a| a.len()));
        let width = ChartDimensions::plot_width_for(el.client_width() as f64, &margin);
        if width > 0.0 {
            chart.resize(PlotSize {
                width,
                height: DEFAULT_PLOT_HEIGHT,
            });
        }
    };
    Effect::new(move |_| {
        if container.get().is_some() {
            measure();
        }
    });
    let resize_listener = window_event_listener(ev::resize, move |_| measure());
    on_cleanup(move || resize_listener.remove());

    // ------------------------------------------------------------------------
    // Toolbar
    // ------------------------------------------------------------------------

    let show_range = move |range: ViewRange| {
        let width = chart.size.get_untracked().width;
        let (x, y, scale) =
            xy_scale_for_window(chart.origin_ts.get_untracked(), now_ts(), range.span_secs(), width);
        gestures.set_xy_scale(x, y, scale);
        active_range.set(Some((range, x, scale)));
    };

    // a preset stays highlighted until the user pans or zooms away from it
    let is_active = move |range: ViewRange| {
        let gesture = chart.gesture.get();
        active_range.get().is_some_and(|(active, x, scale)| {
            active == range
                && (gesture.x - x).abs() < 0.5
                && (gesture.scale - scale).abs() <= scale * 1e-9
        })
    };

    let expression_errors = chart.expression_errors();
    let name = definition.name.clone();

    view! {
        <div class="panel chart-widget">
            <div class="panel-header">
                <span class="panel-title">{name}</span>
                <div class="chart-toolbar">
                    {ViewRange::all()
                        .iter()
                        .map(|&range| {
                            view! {
                                <button
                                    class="range-btn"
                                    class:active=move || is_active(range)
                                    on:click=move |_| show_range(range)
                                >
                                    {range.label()}
                                </button>
                            }
                        })
                        .collect_view()}
                    <span class="aggr-level" title="aggregation level">
                        {move || chart.aggr_level.get().to_string()}
                    </span>
                </div>
            </div>

            <div class="panel-content" node_ref=container>
                <ChartSurface chart=chart gestures=gestures />
            </div>

            <ChartLegend chart=chart />

            {move || {
                chart.error.get().map(|e| {
                    view! {
                        <div class="chart-error">
                            <span class="error-icon">"⚠"</span>
                            <span class="error-msg">{e}</span>
                        </div>
                    }
                })
            }}

            {(!expression_errors.is_empty()).then(|| {
                view! {
                    <ul class="chart-expression-errors">
                        {expression_errors
                            .into_iter()
                            .map(|e| view! { <li>{e}</li> })
                            .collect_view()}
                    </ul>
                }
            })}
        </div>
    }
}

#[component]
fn ChartLegend(chart: ChartState) -> impl IntoView {
    view! {
        <div class="chart-legend">
            {move || {
                chart
                    .series
                    .get()
                    .into_iter()
                    .map(|serie| {
                        let color = colors::serie_color(serie.index);
                        view! {
                            <span class="legend-item">
                                <span
                                    class="legend-swatch"
                                    style=format!("background-color: {};", color)
                                />
                                <span class="legend-path">{serie.path}</span>
                                <span class="legend-unit">{format!("[{}]", serie.unit)}</span>
                            </span>
                        }
                    })
                    .collect_view()
            }}
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_definition_builder() {
        let definition = ChartDefinition::new(
            "CPU",
            vec![ChartSerie::new("lab.cpu.load", "%", 0)],
        )
        .y_range("%", Some(0.0), Some(100.0))
        .initial_range(ViewRange::LastHour);

        assert_eq!(definition.name, "CPU");
        assert_eq!(definition.initial_range, ViewRange::LastHour);
        assert_eq!(
            definition.y_ranges,
            vec![UnitRange {
                unit: "%".to_string(),
                min: Some(0.0),
                max: Some(100.0),
            }]
        );
    }
}
