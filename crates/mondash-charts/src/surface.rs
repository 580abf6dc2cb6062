//! The composed chart surface: grid, series, axes, tooltip and the gesture overlay.

use crate::{
    colors, next_surface_id, ChartDimensions, ChartGrid, ChartMargin, ChartTooltip,
    GestureHandle, SeriesPlot, TimeAxis, ValueAxes,
};
use leptos::prelude::*;
use mondash_state::ChartState;
use web_sys::{MouseEvent, TouchEvent, WheelEvent};

/// Margins for the current number of value axes
pub fn chart_dimensions(chart: &ChartState) -> ChartDimensions {
    let size = chart.size.get();
    let axes = chart.axes.with(|a| a.len());
    ChartDimensions::new(size.width, size.height).with_margin(ChartMargin::for_axes(axes))
}

#[component]
pub fn ChartSurface(chart: ChartState, gestures: GestureHandle) -> impl IntoView {
    let clip_id = format!("plot-clip-{}", next_surface_id());
    let clip_url = format!("url(#{})", clip_id);
    let dims = Memo::new(move |_| chart_dimensions(&chart));

    let plot_width = move || chart.size.get().width;
    let plot_height = move || chart.size.get().height;

    view! {
        <svg
            class="chart-surface"
            width=move || dims.get().width()
            height=move || dims.get().height()
            viewBox=move || dims.get().viewbox()
            style="touch-action: none; user-select: none; display: block;"
        >
            <defs>
                <clipPath id=clip_id>
                    <rect width=plot_width height=plot_height />
                </clipPath>
            </defs>

            <rect
                width=move || dims.get().width()
                height=move || dims.get().height()
                fill=colors::BG_PANEL
                rx="4"
            />

            <g transform=move || dims.get().inner_transform()>
                <ChartGrid chart=chart />

                <g clip-path=clip_url>
                    <SeriesPlot chart=chart />
                </g>

                <ValueAxes chart=chart />
                <TimeAxis chart=chart />

                // captures all pointer input over the plot
                <rect
                    class="gesture-overlay"
                    width=plot_width
                    height=plot_height
                    fill="transparent"
                    on:mousedown=move |ev: MouseEvent| gestures.on_mouse_down(ev)
                    on:mousemove=move |ev: MouseEvent| gestures.on_mouse_move(ev)
                    on:mouseup=move |ev: MouseEvent| gestures.on_mouse_up(ev)
                    on:mouseleave=move |ev: MouseEvent| gestures.on_mouse_leave(ev)
                    on:wheel=move |ev: WheelEvent| gestures.on_wheel(ev)
                    on:touchstart=move |ev: TouchEvent| gestures.on_touch_start(ev)
                    on:touchmove=move |ev: TouchEvent| gestures.on_touch_move(ev)
                    on:touchend=move |ev: TouchEvent| gestures.on_touch_end(ev)
                    on:touchcancel=move |ev: TouchEvent| gestures.on_touch_end(ev)
                />

                <ChartTooltip chart=chart />

                <Show when=move || gestures.hint.get()>
                    <g class="gesture-hint" pointer-events="none">
                        <rect
                            width=plot_width
                            height=plot_height
                            fill=colors::BG_VOID
                            fill-opacity="0.6"
                        />
                        <text
                            x={move || plot_width() / 2.0}
                            y={move || plot_height() / 2.0}
                            text-anchor="middle"
                            fill=colors::TEXT_PRIMARY
                            font-size="13"
                        >
                            "Hold Shift and scroll to zoom, or use two fingers"
                        </text>
                    </g>
                </Show>

                <Show when=move || chart.loading.get()>
                    <text
                        class="chart-loading"
                        x={move || plot_width() - 6.0}
                        y="14"
                        text-anchor="end"
                        fill=colors::TEXT_MUTED
                        font-size="10"
                    >
                        "loading..."
                    </text>
                </Show>
            </g>
        </svg>
    }
}
