//! Axis components: one value axis per unit on the left, the time axis below.

use crate::colors;
use chrono::{Local, TimeZone};
use leptos::prelude::*;
use mondash_core::{generate_time_ticks, CoordinateSystem, TimeAxisTicks, YAxisProperties};
use mondash_state::ChartState;
use std::fmt::Display;

pub const Y_AXIS_WIDTH_PX: f64 = 56.0;
pub const TIME_AXIS_HEIGHT_PX: f64 = 38.0;

const FONT: &str = "JetBrains Mono, monospace";

/// A labeled position along an axis, in surface pixels
#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub pos: f64,
    pub label: String,
}

/// Value ticks of one axis that fall inside a plot of `height` pixels
pub fn value_axis_ticks(axis: &YAxisProperties, pan_y: f64, height: f64) -> Vec<AxisTick> {
    let transform = &axis.derived.transform;
    axis.derived
        .tick_values
        .iter()
        .zip(&axis.derived.ticks)
        .map(|(&value, label)| AxisTick {
            pos: transform.v2y(value) + pan_y,
            label: label.clone(),
        })
        .filter(|tick| (-0.5..=height + 0.5).contains(&tick.pos))
        .collect()
}

/// Time ticks and bands of the visible window, shifted to surface x
pub fn time_axis_ticks<Tz>(coords: &CoordinateSystem, tz: &Tz) -> TimeAxisTicks
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut axis = generate_time_ticks(&coords.time, &coords.visible_interval(), tz);
    for tick in &mut axis.ticks {
        tick.x += coords.pan_x;
    }
    for band in &mut axis.bands {
        band.x_from += coords.pan_x;
        band.x_to += coords.pan_x;
    }
    axis
}

// ============================================================================
// COMPONENTS
// ============================================================================

/// Value axes, drawn right-aligned into the left margin (x < 0)
#[component]
pub fn ValueAxes(chart: ChartState) -> impl IntoView {
    let axes = move || {
        let pan_y = chart.gesture.get().y;
        let height = chart.size.get().height;
        chart.axes.with(|axes| {
            axes.iter()
                .enumerate()
                .map(|(i, axis)| (i, axis.unit.clone(), value_axis_ticks(axis, pan_y, height)))
                .collect::<Vec<_>>()
        })
    };

    view! {
        <g class="value-axes">
            {move || {
                axes()
                    .into_iter()
                    .map(|(i, unit, ticks)| {
                        let right = -(i as f64) * Y_AXIS_WIDTH_PX;
                        let height = chart.size.get_untracked().height;
                        view! {
                            <g class="value-axis" transform=format!("translate({}, 0)", right)>
                                <line x1="0" y1="0" x2="0" y2=height stroke=colors::BORDER stroke-width="1" />
                                {ticks
                                    .into_iter()
                                    .map(|tick| {
                                        view! {
                                            <g transform=format!("translate(0, {:.1})", tick.pos)>
                                                <line x1="-4" x2="0" stroke=colors::BORDER />
                                                <text
                                                    x="-6"
                                                    dy="0.32em"
                                                    text-anchor="end"
                                                    fill=colors::TEXT_MUTED
                                                    font-size="10"
                                                    font-family=FONT
                                                >
                                                    {tick.label}
                                                </text>
                                            </g>
                                        }
                                    })
                                    .collect_view()}
                                <text
                                    x={-Y_AXIS_WIDTH_PX / 2.0}
                                    y={height + 12.0}
                                    text-anchor="middle"
                                    fill=colors::TEXT_MUTED
                                    font-size="10"
                                    font-family=FONT
                                >
                                    {unit}
                                </text>
                            </g>
                        }
                    })
                    .collect_view()
            }}
        </g>
    }
}

/// Horizontal lines at the first axis' ticks, vertical lines at major time ticks
#[component]
pub fn ChartGrid(chart: ChartState) -> impl IntoView {
    let lines = move || {
        let coords = chart.coordinates();
        let height = chart.size.get().height;
        let horizontal = chart.axes.with(|axes| {
            axes.iter()
                .next()
                .map(|axis| value_axis_ticks(axis, coords.pan_y, height))
                .unwrap_or_default()
        });
        let vertical: Vec<f64> = time_axis_ticks(&coords, &Local)
            .ticks
            .into_iter()
            .filter(|t| t.is_major)
            .map(|t| t.x)
            .collect();
        (horizontal, vertical, coords.width, height)
    };

    view! {
        <g class="chart-grid">
            {move || {
                let (horizontal, vertical, width, height) = lines();
                view! {
                    {horizontal
                        .into_iter()
                        .map(|tick| {
                            view! {
                                <line
                                    x1="0" y1=tick.pos
                                    x2=width y2=tick.pos
                                    stroke=colors::GRID
                                    stroke-width="1"
                                    stroke-dasharray="2,2"
                                />
                            }
                        })
                        .collect_view()}
                    {vertical
                        .into_iter()
                        .map(|x| {
                            view! {
                                <line
                                    x1=x y1="0"
                                    x2=x y2=height
                                    stroke=colors::GRID_MAJOR
                                    stroke-width="1"
                                    stroke-dasharray="2,2"
                                />
                            }
                        })
                        .collect_view()}
                }
            }}
        </g>
    }
}

/// Time axis drawn below the plot (y = plot height)
#[component]
pub fn TimeAxis(chart: ChartState) -> impl IntoView {
    let axis = move || {
        let coords = chart.coordinates();
        (time_axis_ticks(&coords, &Local), coords.width)
    };

    view! {
        <g class="time-axis" transform=move || format!("translate(0, {})", chart.size.get().height)>
            {move || {
                let (axis, width) = axis();
                view! {
                    <line x1="0" y1="0" x2=width y2="0" stroke=colors::BORDER stroke-width="1" />
                    {axis
                        .ticks
                        .into_iter()
                        .filter(|t| (0.0..=width).contains(&t.x))
                        .map(|tick| {
                            let length = if tick.is_major { 6.0 } else { 3.0 };
                            view! {
                                <g transform=format!("translate({:.1}, 0)", tick.x)>
                                    <line x1="0" y1="0" x2="0" y2=length stroke=colors::BORDER />
                                    {tick.label.map(|label| view! {
                                        <text
                                            y="16"
                                            text-anchor="middle"
                                            fill=colors::TEXT_MUTED
                                            font-size="10"
                                            font-family=FONT
                                        >
                                            {label}
                                        </text>
                                    })}
                                </g>
                            }
                        })
                        .collect_view()}
                    {axis
                        .bands
                        .into_iter()
                        .map(|band| {
                            let from = band.x_from.max(0.0);
                            let to = band.x_to.min(width);
                            view! {
                                <g class="time-band">
                                    <line x1=band.x_to y1="22" x2=band.x_to y2="34" stroke=colors::BORDER />
                                    <text
                                        x={(from + to) / 2.0}
                                        y="32"
                                        text-anchor="middle"
                                        fill=colors::TEXT_PRIMARY
                                        font-size="10"
                                        font-family=FONT
                                    >
                                        {band.label}
                                    </text>
                                </g>
                            }
                        })
                        .collect_view()}
                }
            }}
        </g>
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mondash_core::{GestureState, ValueRange, YAxes};
    use std::collections::BTreeMap;

    fn axes_with(min: f64, max: f64) -> YAxes {
        let mut axes = YAxes::new(190.0, 10.0);
        let mut ranges = BTreeMap::new();
        ranges.insert("%".to_string(), ValueRange::new(min, max));
        axes.set_observed(&ranges);
        axes
    }

    #[test]
    fn test_value_ticks_span_plot() {
        let axes = axes_with(0.0, 999.0);
        let axis = axes.get("%").expect("axis exists");
        let ticks = value_axis_ticks(axis, 0.0, 200.0);

        assert_eq!(ticks.first().map(|t| t.label.as_str()), Some("0"));
        assert_eq!(ticks.last().map(|t| t.label.as_str()), Some("1000"));
        // min at the bottom, max below the top padding
        assert!((ticks[0].pos - 200.0).abs() < 1e-9);
        assert!((ticks.last().map(|t| t.pos).unwrap_or_default() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_value_ticks_clipped_when_panned() {
        let axes = axes_with(0.0, 999.0);
        let axis = axes.get("%").expect("axis exists");
        let all = value_axis_ticks(axis, 0.0, 200.0).len();
        let panned = value_axis_ticks(axis, 100.0, 200.0);

        assert!(panned.len() < all);
        assert!(panned.iter().all(|t| t.pos <= 200.5));
    }

    #[test]
    fn test_axis_without_data_has_no_ticks() {
        let mut axes = YAxes::new(190.0, 10.0);
        axes.ensure_units(["B"]);
        let axis = axes.get("B").expect("axis exists");
        assert!(value_axis_ticks(axis, 0.0, 200.0).is_empty());
    }

    #[test]
    fn test_time_ticks_follow_pan() {
        let origin = 1_704_067_200.0; // 2024-01-01T00:00:00Z
        let axes = axes_with(0.0, 1.0);
        let still = CoordinateSystem::new(&GestureState::new(0.0, 0.0, 0.025), origin, 600.0, &axes);
        let panned = CoordinateSystem::new(&GestureState::new(-90.0, 0.0, 0.025), origin, 600.0, &axes);

        let a = time_axis_ticks(&still, &Utc);
        let b = time_axis_ticks(&panned, &Utc);

        // the 01:00 tick moves left by the pan amount
        let at = |axis: &TimeAxisTicks, ts: f64| {
            axis.ticks.iter().find(|t| t.ts == ts).map(|t| t.x).unwrap_or(f64::NAN)
        };
        let one_am = origin + 3600.0;
        assert!((at(&a, one_am) - 90.0).abs() < 1e-6);
        assert!(at(&b, one_am).abs() < 1e-6);
        assert!(b.ticks.iter().all(|t| t.x >= -1e-6));
    }
}
