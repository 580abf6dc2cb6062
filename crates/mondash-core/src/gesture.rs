//! Gesture controller: touch, mouse and wheel input to pan and zoom.
//!
//! The controller is target independent. The DOM glue feeds it surface-relative
//! pointer positions, schedules an animation frame when asked to, and calls
//! `wheel_settled` after the configured quiet period. State changes and pointer
//! events reach consumers through `subscribe` channels.

use crate::GestureConfig;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Pan (content translation, pixels) and zoom (pixels per second)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    pub zoom_in_progress: bool,
}

impl GestureState {
    pub fn new(x: f64, y: f64, scale: f64) -> Self {
        Self {
            x,
            y,
            scale,
            zoom_in_progress: false,
        }
    }
}

/// Surface-relative pointer position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    StateChanged(GestureState),
    PointerMove(Point),
    Click(Point),
    PointerLeave,
}

/// What the DOM glue should do after feeding an input event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEffect {
    pub prevent_default: bool,
    /// Call `animation_frame` on the next frame
    pub request_frame: bool,
    /// Call `wheel_settled(token)` after `zoom_settle_ms`
    pub settle_token: Option<u64>,
    /// Show the "use two fingers / hold Shift" overlay hint
    pub show_hint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TwinTouch {
    start_mid: Point,
    start_dist: f64,
    start: GestureState,
    scaling_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MouseDrag {
    start_pointer: Point,
    start: GestureState,
    moved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Session {
    #[default]
    Idle,
    SingleTouch,
    TwinTouch(TwinTouch),
    MouseDrag(MouseDrag),
}

pub struct GestureController {
    config: GestureConfig,
    state: GestureState,
    pending: Option<GestureState>,
    frame_requested: bool,
    session: Session,
    wheel_generation: u64,
    observers: Vec<UnboundedSender<GestureEvent>>,
}

impl GestureController {
    pub fn new(config: GestureConfig, initial: GestureState) -> Self {
        let scale = config.clamp_scale(initial.scale);
        Self {
            config,
            state: GestureState { scale, ..initial },
            pending: None,
            frame_requested: false,
            session: Session::Idle,
            wheel_generation: 0,
            observers: Vec::new(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Committed state (what was last announced)
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Latest state including a not yet committed frame update
    fn current(&self) -> GestureState {
        self.pending.unwrap_or(self.state)
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<GestureEvent> {
        let (tx, rx) = mpsc::unbounded();
        self.observers.push(tx);
        rx
    }

    fn emit(&mut self, event: GestureEvent) {
        self.observers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    fn commit(&mut self, state: GestureState) {
        if state != self.state {
            self.state = state;
            self.emit(GestureEvent::StateChanged(state));
        }
    }

    fn schedule(&mut self, state: GestureState) -> InputEffect {
        self.pending = Some(state);
        let request_frame = !self.frame_requested;
        self.frame_requested = true;
        InputEffect {
            prevent_default: true,
            request_frame,
            ..InputEffect::default()
        }
    }

    /// Apply the update coalesced since the last frame
    pub fn animation_frame(&mut self) -> bool {
        self.frame_requested = false;
        match self.pending.take() {
            Some(state) => {
                self.commit(state);
                true
            }
            None => false,
        }
    }

    /// Override pan and zoom from outside (e.g. preset ranges)
    pub fn set_xy_scale(&mut self, x: f64, y: f64, scale: f64) {
        self.pending = None;
        let state = GestureState {
            x,
            y,
            scale: self.config.clamp_scale(scale),
            zoom_in_progress: false,
        };
        self.commit(state);
    }

    // ========================================================================
    // TOUCH
    // ========================================================================

    /// `touches` holds every finger currently on the surface
    pub fn touch_start(&mut self, touches: &[Point]) -> InputEffect {
        match touches {
            [_] => {
                self.session = Session::SingleTouch;
                InputEffect {
                    show_hint: true,
                    ..InputEffect::default()
                }
            }
            [a, b] => {
                let start_dist = a.distance(b);
                if start_dist == 0.0 {
                    return InputEffect::default();
                }
                let start = GestureState {
                    zoom_in_progress: true,
                    ..self.current()
                };
                self.session = Session::TwinTouch(TwinTouch {
                    start_mid: a.midpoint(b),
                    start_dist,
                    start,
                    scaling_enabled: false,
                });
                self.commit(start);
                InputEffect {
                    prevent_default: true,
                    ..InputEffect::default()
                }
            }
            _ => InputEffect::default(),
        }
    }

    pub fn touch_move(&mut self, touches: &[Point]) -> InputEffect {
        let (Session::TwinTouch(twin), [a, b]) = (&mut self.session, touches) else {
            return InputEffect::default();
        };

        let mut factor = a.distance(b) / twin.start_dist;
        if !twin.scaling_enabled {
            let (low, high) = self.config.dead_zone;
            if factor < low || factor > high {
                twin.scaling_enabled = true;
            } else {
                factor = 1.0;
            }
        }

        let start = twin.start;
        let start_mid = twin.start_mid;
        let scale = self.config.clamp_scale(start.scale * factor);
        let factor = scale / start.scale;
        let mid = a.midpoint(b);

        self.schedule(GestureState {
            x: mid.x - (start_mid.x - start.x) * factor,
            y: mid.y - (start_mid.y - start.y),
            scale,
            zoom_in_progress: true,
        })
    }

    /// `remaining` holds the fingers still on the surface
    pub fn touch_end(&mut self, remaining: &[Point]) -> InputEffect {
        if let Session::TwinTouch(_) = self.session {
            if remaining.len() < 2 {
                self.session = if remaining.is_empty() {
                    Session::Idle
                } else {
                    Session::SingleTouch
                };
                self.frame_requested = false;
                let done = GestureState {
                    zoom_in_progress: false,
                    ..self.current()
                };
                self.pending = None;
                self.commit(done);
            }
        } else if remaining.is_empty() {
            self.session = Session::Idle;
        }
        InputEffect::default()
    }

    // ========================================================================
    // MOUSE
    // ========================================================================

    pub fn mouse_down(&mut self, pointer: Point) -> InputEffect {
        self.session = Session::MouseDrag(MouseDrag {
            start_pointer: pointer,
            start: self.current(),
            moved: false,
        });
        InputEffect {
            prevent_default: true,
            ..InputEffect::default()
        }
    }

    pub fn mouse_move(&mut self, pointer: Point) -> InputEffect {
        if !matches!(self.session, Session::MouseDrag(_)) {
            self.emit(GestureEvent::PointerMove(pointer));
            return InputEffect::default();
        }
        let Session::MouseDrag(drag) = &mut self.session else {
            return InputEffect::default();
        };

        let dx = pointer.x - drag.start_pointer.x;
        let dy = pointer.y - drag.start_pointer.y;
        if !drag.moved && dx.hypot(dy) < self.config.click_tolerance_px {
            return InputEffect::default();
        }
        drag.moved = true;

        let start = drag.start;
        // the settle timer owns zoom_in_progress, not the drag anchor
        let zoom_in_progress = self.current().zoom_in_progress;
        self.schedule(GestureState {
            x: start.x + dx,
            y: start.y + dy,
            zoom_in_progress,
            ..start
        })
    }

    pub fn mouse_up(&mut self, pointer: Point) -> InputEffect {
        if let Session::MouseDrag(drag) = self.session {
            self.session = Session::Idle;
            if !drag.moved {
                self.emit(GestureEvent::Click(pointer));
            }
        }
        InputEffect::default()
    }

    pub fn mouse_leave(&mut self) -> InputEffect {
        if let Session::MouseDrag(_) = self.session {
            self.session = Session::Idle;
        }
        self.emit(GestureEvent::PointerLeave);
        InputEffect::default()
    }

    // ========================================================================
    // WHEEL
    // ========================================================================

    /// `delta_y < 0` zooms in around `pointer`
    pub fn wheel(&mut self, pointer: Point, delta_y: f64, shift: bool) -> InputEffect {
        if !self.config.kidnap_scroll && !shift {
            return InputEffect {
                show_hint: true,
                ..InputEffect::default()
            };
        }
        if delta_y == 0.0 {
            return InputEffect::default();
        }

        let factor = if delta_y < 0.0 {
            self.config.wheel_scale_factor
        } else {
            1.0 / self.config.wheel_scale_factor
        };

        let current = self.current();
        let scale = current.scale * factor;
        if !self.config.scale_allowed(scale) {
            return InputEffect {
                prevent_default: true,
                ..InputEffect::default()
            };
        }

        self.pending = None;
        self.wheel_generation += 1;
        self.commit(GestureState {
            x: pointer.x - (pointer.x - current.x) * factor,
            y: current.y,
            scale,
            zoom_in_progress: true,
        });
        // a drag in progress continues from the zoomed state
        if let Session::MouseDrag(drag) = &mut self.session {
            drag.start = self.state;
            drag.start_pointer = pointer;
        }

        InputEffect {
            prevent_default: true,
            settle_token: Some(self.wheel_generation),
            ..InputEffect::default()
        }
    }

    /// Settle timer fired; stale tokens from earlier wheel events are ignored
    pub fn wheel_settled(&mut self, token: u64) -> bool {
        if token != self.wheel_generation || !self.state.zoom_in_progress {
            return false;
        }
        if matches!(self.session, Session::TwinTouch(_)) {
            return false;
        }
        self.commit(GestureState {
            zoom_in_progress: false,
            ..self.state
        });
        true
    }
}
