//! Sequenced log entry formatting.
//!
//! Every line written to a client log file carries a per-session sequence
//! number and a millisecond-resolution local timestamp:
//!
//! ```text
//!     1. 2026-08-28 14:03:07.512 ---=== Client "alice" started ===---
//!     2. 2026-08-28 14:03:09.044 hello
//! ```

use chrono::Local;

/// Per-session monotonic entry counter.
///
/// Starts at 1 and is bumped exactly once per formatted entry, markers
/// included. Owned by a single session; never shared.
#[derive(Debug)]
pub struct Sequence(u64);

impl Sequence {
    pub fn new() -> Self {
        Sequence(1)
    }

    /// Current value, then advance.
    fn next(&mut self) -> u64 {
        let n = self.0;
        self.0 += 1;
        n
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Format one entry line: sequence number right-aligned in a 5-char field,
/// a literal ". ", the local timestamp, a space, the entry text, and the
/// line terminator. Consumes one sequence number per call.
pub fn format_entry(sequence: &mut Sequence, text: &str) -> String {
    let now = Local::now();
    format!(
        "{:>5}. {} {}\n",
        sequence.next(),
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        text
    )
}
