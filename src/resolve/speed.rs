//! Speed mining from free-text comments.
//!
//! When the score of a status report is lost, the comment often still says how fast
//! traffic moves ("40 km/h", "٤٠ كم/س"). The first such speed is remapped onto the
//! congestion scale.

use crate::resolve::Congestion;
use regex::Regex;
use std::sync::OnceLock;

fn speed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)([0-9\x{0660}-\x{0669}\x{06F0}-\x{06F9}]+)\s*(?:km\s*/\s*hr?\b|kmh\b|kph\b|كم\s*/\s*س|كم\s*/\s*ساعة|كيلو\s*/\s*س)",
        )
        .expect("speed regex must compile")
    })
}

/// Folds Arabic-Indic and extended Arabic-Indic digits onto ASCII.
fn ascii_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            _ => c,
        })
        .collect()
}

/// Returns the first number directly followed by a km/h unit, in either script.
pub fn extract_speed(text: &str) -> Option<u32> {
    let caps = speed_re().captures(text)?;
    ascii_digits(caps.get(1)?.as_str()).parse().ok()
}

/// Speed breakpoints (exclusive lower bounds, descending) for codes 1 to 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedBreakpoints([u32; 4]);

impl SpeedBreakpoints {
    pub fn new(bounds: [u32; 4]) -> Self {
        Self(bounds)
    }

    /// Maps a speed to a congestion code: faster traffic gets a lower code.
    ///
    /// | Speed (default bounds) | Code |
    /// |------------------------|------|
    /// | > 79                   | 1    |
    /// | > 39                   | 2    |
    /// | > 19                   | 3    |
    /// | > 9                    | 4    |
    /// | otherwise              | 5    |
    pub fn congestion(&self, speed: u32) -> Congestion {
        // Four bounds: the first one exceeded gives level 1..=4, none gives 5.
        let level = self
            .0
            .iter()
            .position(|&bound| speed > bound)
            .map_or(Congestion::MAX, |i| i as u8 + Congestion::MIN);
        Congestion(level)
    }
}

impl Default for SpeedBreakpoints {
    fn default() -> Self {
        Self(crate::config::DEFAULT_SPEED_BREAKPOINTS)
    }
}
