//! Timing-trace line formatting.
//!
//! Mirrors `writeTimingLine`/`writeTimingData` in
//! `original_source/parser/BKTKContext.c`: each time the currently
//! executing source line changes, one line is appended in the form
//! `l:<time>\n` (the new line immediately follows the previously
//! reported one) or `l:<time>:<lineno>\n` (anything else, including a
//! backward jump from a repeat mark).

use std::fmt::Write as _;

use crate::config::TimingMode;

/// Accumulates timing-trace text for one track, draining it on demand via
/// [`TimingWriter::take`].
#[derive(Debug)]
pub struct TimingWriter {
    mode: TimingMode,
    shift: u8,
    tick_rate_seconds: f64,
    buffer: String,
}

impl TimingWriter {
    pub(crate) fn new(mode: TimingMode, shift: u8, tick_rate_seconds: f64) -> Self {
        Self {
            mode,
            shift,
            tick_rate_seconds,
            buffer: String::new(),
        }
    }

    /// Updates the tick rate used to convert ticks to seconds in
    /// [`TimingMode::Seconds`], reflecting the most recent `tr` command.
    pub(crate) fn set_tick_rate(&mut self, seconds: f64) {
        self.tick_rate_seconds = seconds;
    }

    /// Records one line-change event, per `spec.md` §6.4's trace format.
    pub(crate) fn record(&mut self, line_time_ticks: i64, lineno: i32, sequential: bool) {
        if self.mode == TimingMode::Off {
            return;
        }
        let shifted_ticks = line_time_ticks >> self.shift;
        let time = match self.mode {
            TimingMode::Off => return,
            TimingMode::Ticks => shifted_ticks as f64,
            TimingMode::Seconds => shifted_ticks as f64 * self.tick_rate_seconds,
        };
        if sequential {
            let _ = writeln!(self.buffer, "l:{time:.5}");
        } else {
            let _ = writeln!(self.buffer, "l:{time:.5}:{lineno}");
        }
    }

    /// Returns and clears the accumulated trace text.
    #[must_use]
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Whether any trace mode is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.mode != TimingMode::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_lines_omit_the_line_number() {
        let mut writer = TimingWriter::new(TimingMode::Ticks, 0, 1.0 / 60.0);
        writer.record(0, 1, false);
        writer.record(24, 2, true);
        assert_eq!(writer.take(), "l:0:1\nl:24\n");
    }

    #[test]
    fn a_repeat_or_jump_always_reports_the_line_number() {
        let mut writer = TimingWriter::new(TimingMode::Ticks, 0, 1.0 / 60.0);
        writer.record(0, 5, false);
        assert_eq!(writer.take(), "l:0:5\n");
    }

    #[test]
    fn seconds_mode_scales_by_the_tick_rate() {
        let mut writer = TimingWriter::new(TimingMode::Seconds, 0, 0.5);
        writer.record(10, 3, false);
        assert_eq!(writer.take(), "l:5.00000:3\n");
    }

    #[test]
    fn off_mode_records_nothing() {
        let mut writer = TimingWriter::new(TimingMode::Off, 0, 1.0 / 60.0);
        writer.record(10, 3, false);
        assert_eq!(writer.take(), "");
    }
}
