//! Timeline expressions and escaping for the engine's filter syntax

use crate::domain::model::Timing;

/// Round seconds to millisecond precision
pub fn round_ms(seconds: f64) -> f64 {
    let rounded = (seconds * 1000.0).round() / 1000.0;
    // Avoid printing "-0.000"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Format seconds with exactly three decimals after millisecond rounding
pub fn seconds(value: f64) -> String {
    number(value)
}

/// Format a plain number the same way as timeline values
pub fn number(value: f64) -> String {
    format!("{:.3}", round_ms(value))
}

/// Wrap an expression in single quotes so its commas survive graph parsing
pub fn quoted(expr: &str) -> String {
    format!("'{}'", expr)
}

/// Boolean gate over `t` for a visibility window, `None` when always open.
///
/// Bounded windows are half-open: `[start, start + duration)`.
pub fn gate(timing: &Timing) -> Option<String> {
    if timing.is_always() {
        return None;
    }
    let start = seconds(timing.start);
    Some(match timing.end() {
        Some(end) => format!("gte(t,{})*lt(t,{})", start, seconds(end)),
        None => format!("gte(t,{})", start),
    })
}

/// Linear ramp `clamp((t - start) / duration, 0, 1)`
pub fn ramp(start: f64, duration: f64) -> String {
    format!("clip((t-{})/{},0,1)", seconds(start), seconds(duration))
}

/// Clip an animation window to the composition.
///
/// Returns the effective `(start, duration)` and whether clipping happened.
/// Windows starting at or after the end are left untouched; they are inert.
pub fn clip_window(start: f64, duration: f64, total: f64) -> (f64, f64, bool) {
    let available = total - start;
    if available > 0.0 && duration > available {
        (start, available, true)
    } else {
        (start, duration, false)
    }
}

/// Escape a value for the filter option level (`:` separates options)
pub fn escape_option(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

/// Escape a value for the filtergraph level
pub fn escape_graph(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

/// Escape literal text or a path used as a filter option value
pub fn literal(value: &str) -> String {
    escape_graph(&escape_option(value))
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
