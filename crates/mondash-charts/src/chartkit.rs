//! # chartkit
//!
//! SVG path primitives shared by the series renderer and the axes.

use std::fmt::Write;

// ============================================================================
// PATH BUILDER (fluent API)
// ============================================================================

/// SVG path builder with fluent API
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    commands: String,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self {
            commands: String::with_capacity(256),
        }
    }

    pub fn with_capacity(points: usize) -> Self {
        Self {
            commands: String::with_capacity(points * 16 + 2),
        }
    }

    pub fn move_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.commands, "M{:.1},{:.1}", x, y);
        self
    }

    pub fn line_to(mut self, x: f64, y: f64) -> Self {
        let _ = write!(self.commands, "L{:.1},{:.1}", x, y);
        self
    }

    pub fn close(mut self) -> Self {
        self.commands.push('Z');
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn build(self) -> String {
        self.commands
    }
}

// ============================================================================
// PATH GENERATORS
// ============================================================================

/// Open polyline through `points`
pub fn line_path(points: &[(f64, f64)]) -> String {
    let Some((&(x0, y0), rest)) = points.split_first() else {
        return String::new();
    };

    rest.iter()
        .fold(PathBuilder::with_capacity(points.len()).move_to(x0, y0), |b, &(x, y)| {
            b.line_to(x, y)
        })
        .build()
}

/// Closed polygon between an upper and a lower edge sharing the same x positions
pub fn band_path(upper: &[(f64, f64)], lower: &[(f64, f64)]) -> String {
    let Some((&(x0, y0), rest)) = upper.split_first() else {
        return String::new();
    };
    if lower.is_empty() {
        return String::new();
    }

    let mut builder = PathBuilder::with_capacity(upper.len() + lower.len()).move_to(x0, y0);
    for &(x, y) in rest {
        builder = builder.line_to(x, y);
    }
    for &(x, y) in lower.iter().rev() {
        builder = builder.line_to(x, y);
    }

    builder.close().build()
}
