//! DOM glue for the gesture controller.
//!
//! Pointer, touch and wheel events are translated into plot coordinates and fed
//! to the `GestureController`. Its `InputEffect` tells us whether to prevent the
//! default action, schedule an animation frame (coalesced moves) or arm the wheel
//! settle timer. Controller events flow back through its observer channel into
//! the chart state.

use futures::StreamExt;
use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use mondash_core::{GestureConfig, GestureController, GestureEvent, InputEffect, Point};
use mondash_state::ChartState;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, Event, MouseEvent, TouchEvent, TouchList, WheelEvent};

/// How long the "hold Shift / use two fingers" hint stays visible
const HINT_MS: u32 = 1500;

/// Plot-relative position of an event on `current_target`
fn local_point(ev: &Event, client_x: f64, client_y: f64) -> Option<Point> {
    let target = ev.current_target()?.dyn_into::<Element>().ok()?;
    let rect = target.get_bounding_client_rect();
    Some(Point::new(client_x - rect.left(), client_y - rect.top()))
}

fn touch_points(ev: &TouchEvent, touches: &TouchList) -> Vec<Point> {
    (0..touches.length())
        .filter_map(|i| touches.item(i))
        .filter_map(|t| local_point(ev, t.client_x() as f64, t.client_y() as f64))
        .collect()
}

/// Event handlers of one chart surface
#[derive(Clone, Copy)]
pub struct GestureHandle {
    controller: StoredValue<GestureController>,
    chart: ChartState,
    /// Overlay hint visible
    pub hint: RwSignal<bool>,
}

impl GestureHandle {
    pub fn set_xy_scale(&self, x: f64, y: f64, scale: f64) {
        self.controller
            .try_update_value(|c| c.set_xy_scale(x, y, scale));
    }

    fn feed(&self, ev: &Event, input: impl FnOnce(&mut GestureController) -> InputEffect) {
        if let Some(effect) = self.controller.try_update_value(input) {
            self.apply(ev, effect);
        }
    }

    fn apply(&self, ev: &Event, effect: InputEffect) {
        if effect.prevent_default {
            ev.prevent_default();
        }
        if effect.request_frame {
            self.request_frame();
        }
        if let Some(token) = effect.settle_token {
            let controller = self.controller;
            let delay = controller.with_value(|c| c.config().zoom_settle_ms);
            Timeout::new(delay, move || {
                controller.try_update_value(|c| c.wheel_settled(token));
            })
            .forget();
        }
        if effect.show_hint {
            self.show_hint();
        }
    }

    fn request_frame(&self) {
        let controller = self.controller;
        let callback = Closure::once_into_js(move || {
            controller.try_update_value(GestureController::animation_frame);
        });
        let scheduled = web_sys::window()
            .map(|w| w.request_animation_frame(callback.unchecked_ref::<js_sys::Function>()).is_ok())
            .unwrap_or(false);
        if !scheduled {
            // no frame scheduler: apply right away
            controller.try_update_value(GestureController::animation_frame);
        }
    }

    fn show_hint(&self) {
        if self.hint.get_untracked() {
            return;
        }
        self.hint.set(true);
        let hint = self.hint;
        Timeout::new(HINT_MS, move || {
            hint.try_set(false);
        })
        .forget();
    }

    // ========================================================================
    // DOM handlers
    // ========================================================================

    pub fn on_mouse_down(&self, ev: MouseEvent) {
        if ev.button() != 0 {
            return;
        }
        if let Some(p) = local_point(&ev, ev.client_x() as f64, ev.client_y() as f64) {
            self.feed(&ev, |c| c.mouse_down(p));
        }
    }

    pub fn on_mouse_move(&self, ev: MouseEvent) {
        if let Some(p) = local_point(&ev, ev.client_x() as f64, ev.client_y() as f64) {
            self.feed(&ev, |c| c.mouse_move(p));
        }
    }

    pub fn on_mouse_up(&self, ev: MouseEvent) {
        if let Some(p) = local_point(&ev, ev.client_x() as f64, ev.client_y() as f64) {
            self.feed(&ev, |c| c.mouse_up(p));
        }
    }

    pub fn on_mouse_leave(&self, ev: MouseEvent) {
        self.feed(&ev, GestureController::mouse_leave);
    }

    pub fn on_wheel(&self, ev: WheelEvent) {
        if let Some(p) = local_point(&ev, ev.client_x() as f64, ev.client_y() as f64) {
            let (delta_y, shift) = (ev.delta_y(), ev.shift_key());
            self.feed(&ev, |c| c.wheel(p, delta_y, shift));
        }
    }

    pub fn on_touch_start(&self, ev: TouchEvent) {
        let touches = touch_points(&ev, &ev.touches());
        self.feed(&ev, |c| c.touch_start(&touches));
    }

    pub fn on_touch_move(&self, ev: TouchEvent) {
        let touches = touch_points(&ev, &ev.touches());
        self.feed(&ev, |c| c.touch_move(&touches));
    }

    pub fn on_touch_end(&self, ev: TouchEvent) {
        let remaining = touch_points(&ev, &ev.touches());
        self.feed(&ev, |c| c.touch_end(&remaining));
    }

    pub fn chart(&self) -> ChartState {
        self.chart
    }
}

/// Create the controller for `chart` and route its events into the chart state
pub fn use_chart_gestures(chart: ChartState, config: GestureConfig) -> GestureHandle {
    let mut controller = GestureController::new(config, chart.gesture.get_untracked());
    let mut events = controller.subscribe();

    spawn_local(async move {
        while let Some(event) = events.next().await {
            // chart disposed
            if chart.hover.try_get_untracked().is_none() {
                break;
            }
            match event {
                GestureEvent::StateChanged(state) => {
                    if chart.gesture.try_set(state).is_some() {
                        break;
                    }
                }
                GestureEvent::PointerMove(p) => {
                    let closest = chart.hit_test(p.x, p.y);
                    chart.hover.try_set(closest);
                }
                GestureEvent::Click(p) => {
                    if let Some(closest) = chart.hit_test(p.x, p.y) {
                        tracing::debug!(
                            serie = %closest.chart_serie_id,
                            t = closest.point.t(),
                            "point clicked"
                        );
                        chart.hover.try_set(Some(closest));
                    }
                }
                GestureEvent::PointerLeave => {
                    chart.hover.try_set(None);
                }
            }
        }
        tracing::trace!("gesture event stream closed");
    });

    GestureHandle {
        controller: StoredValue::new(controller),
        chart,
        hint: RwSignal::new(false),
    }
}
