//! Hover tooltip for the point nearest to the pointer

use crate::colors;
use chrono::{DateTime, Local, TimeZone};
use leptos::prelude::*;
use mondash_core::{
    ChartSerie, ClosestPoint, CoordinateSystem, DataPoint, SiValueFormatter, ValueFormatter,
};
use mondash_state::ChartState;
use std::fmt::Display;

const TOOLTIP_WIDTH_PX: f64 = 190.0;
const TOOLTIP_OFFSET_PX: f64 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TooltipContent {
    pub title: String,
    pub time: String,
    pub value: String,
    pub color: &'static str,
    /// Marker position on the surface
    pub x: f64,
    pub y: f64,
}

/// Everything the tooltip shows for `closest`; `None` when its series is gone
pub fn tooltip_content<Tz>(
    closest: &ClosestPoint,
    series: &[ChartSerie],
    coords: &CoordinateSystem,
    formatter: &dyn ValueFormatter,
    tz: &Tz,
) -> Option<TooltipContent>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let serie = series
        .iter()
        .find(|s| s.chart_serie_id == closest.chart_serie_id)?;
    let values = coords.value(&serie.unit)?;
    let v = closest.point.value()?;
    let t = closest.point.t();

    let value = match closest.point {
        DataPoint::Aggregated { bucket: Some(b), .. } => format!(
            "{} (min {}, max {})",
            formatter.format(b.v, &serie.unit),
            formatter.format(b.minv, &serie.unit),
            formatter.format(b.maxv, &serie.unit)
        ),
        _ => formatter.format(v, &serie.unit),
    };

    let time = DateTime::from_timestamp_millis((t * 1000.0).round() as i64)
        .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    Some(TooltipContent {
        title: serie.path.clone(),
        time,
        value,
        color: serie.color(),
        x: coords.time.t2x(t) + coords.pan_x,
        y: values.v2y(v) + coords.pan_y,
    })
}

/// Marker plus info box; flips to the left of the marker near the right edge
#[component]
pub fn ChartTooltip(chart: ChartState) -> impl IntoView {
    let content = move || {
        let closest = chart.hover.get()?;
        let coords = chart.coordinates();
        chart
            .series
            .with(|series| tooltip_content(&closest, series, &coords, &SiValueFormatter, &Local))
            .map(|content| (content, coords.width))
    };

    view! {
        {move || {
            content().map(|(content, width)| {
                let box_x = if content.x + TOOLTIP_OFFSET_PX + TOOLTIP_WIDTH_PX > width {
                    content.x - TOOLTIP_OFFSET_PX - TOOLTIP_WIDTH_PX
                } else {
                    content.x + TOOLTIP_OFFSET_PX
                };
                let box_y = (content.y - 30.0).max(0.0);

                view! {
                    <g class="chart-tooltip" pointer-events="none">
                        <circle
                            cx=content.x
                            cy=content.y
                            r="4"
                            fill=content.color
                            stroke=colors::TEXT_PRIMARY
                            stroke-width="1"
                        />
                        <g transform=format!("translate({:.1}, {:.1})", box_x, box_y)>
                            <rect
                                width=TOOLTIP_WIDTH_PX
                                height="52"
                                rx="4"
                                fill=colors::BG_ELEVATED
                                stroke=colors::BORDER
                            />
                            <text x="8" y="15" fill=content.color font-size="11" font-weight="600">
                                {content.title}
                            </text>
                            <text x="8" y="30" fill=colors::TEXT_PRIMARY font-size="11">
                                {content.value}
                            </text>
                            <text x="8" y="45" fill=colors::TEXT_MUTED font-size="10">
                                {content.time}
                            </text>
                        </g>
                    </g>
                }
            })
        }}
    }
}
