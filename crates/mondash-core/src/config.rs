//! Chart and gesture tuning knobs

/// Chart data/viewport configuration
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Pixel budget: at most this many points per horizontal pixel
    pub max_points_per_px: f64,
    /// Extra margin (fraction of the visible span) that must already be cached
    pub fetch_margin_ratio: f64,
    /// How far (fraction of the visible span) a fetch reaches beyond the viewport
    pub fetch_widen_ratio: f64,
    /// Space reserved above the plot area
    pub top_padding_px: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_points_per_px: 0.2,
            fetch_margin_ratio: 0.25,
            fetch_widen_ratio: 1.0,
            top_padding_px: 10.0,
        }
    }
}

impl ChartConfig {
    /// Dense preset for large screens
    pub fn dense() -> Self {
        Self {
            max_points_per_px: 0.5,
            ..Self::default()
        }
    }

    /// Max points for a chart of `width_px`
    pub fn max_points(&self, width_px: f64) -> f64 {
        (width_px * self.max_points_per_px).max(1.0)
    }
}

/// Gesture controller configuration
#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Zoom step per wheel notch (> 1)
    pub wheel_scale_factor: f64,
    /// Twin-touch scale factors inside this range are ignored until left once
    pub dead_zone: (f64, f64),
    /// Zoom on plain wheel events instead of requiring Shift
    pub kidnap_scroll: bool,
    /// Quiet period after the last wheel event before zooming counts as settled
    pub zoom_settle_ms: u32,
    /// Mouse press/release closer than this is a click, not a drag
    pub click_tolerance_px: f64,
    /// Zoom limits in pixels per second
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            wheel_scale_factor: 1.25,
            dead_zone: (0.7, 1.4),
            kidnap_scroll: false,
            zoom_settle_ms: 400,
            click_tolerance_px: 3.0,
            // one pixel per ~10 years .. 1000 pixels per second
            min_scale: 1.0 / (10.0 * 365.0 * 86400.0),
            max_scale: 1000.0,
        }
    }
}

impl GestureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale_limits(mut self, min: f64, max: f64) -> Self {
        self.min_scale = min;
        self.max_scale = max;
        self
    }

    /// Full-page charts own the wheel
    pub fn fullscreen() -> Self {
        Self {
            kidnap_scroll: true,
            ..Self::default()
        }
    }

    pub fn scale_allowed(&self, scale: f64) -> bool {
        scale.is_finite() && self.min_scale <= scale && scale <= self.max_scale
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_points_never_zero() {
        let config = ChartConfig::default();
        assert_eq!(config.max_points(1000.0), 200.0);
        assert_eq!(config.max_points(0.0), 1.0);
        assert_eq!(ChartConfig::dense().max_points(1000.0), 500.0);
    }

    #[test]
    fn test_gesture_scale_limits() {
        let config = GestureConfig::new().scale_limits(0.5, 2.0);
        assert!(config.scale_allowed(1.0));
        assert!(!config.scale_allowed(2.5));
        assert!(!config.scale_allowed(f64::NAN));
        assert_eq!(config.clamp_scale(0.1), 0.5);
        assert!(GestureConfig::fullscreen().kidnap_scroll);
    }
}
