//! Compile-time and playback configuration.
//!
//! The original implementation hardcodes these as C preprocessor constants;
//! this crate exposes them as an explicit, overridable [`Config`] instead
//! (see `SPEC_FULL.md` §10.3), constructed via [`Config::default`] and
//! threaded through [`crate::Score::compile_str_with_config`].

/// Maximum number of tracks a score may declare (track 0 is reserved for
/// the implicit global track).
pub const MAX_TRACKS: u32 = 256;

/// Maximum number of groups a single track may declare.
pub const MAX_GROUPS: u32 = 256;

/// Maximum call-stack depth of the interpreter.
pub const MAX_CALL_STACK: usize = 16;

/// Maximum number of tick events the interpreter tracks concurrently.
pub const MAX_EVENTS: usize = 8;

/// Maximum number of arpeggio delta-notes packed into one `Attack`.
pub const MAX_ARPEGGIO: usize = 5;

/// Default number of ticks in one step, absent a `st`/`stt` override.
pub const DEFAULT_STEP_TICKS: u32 = 24;

/// `value * MAX_VOLUME / 255` is the scale factor applied to raw `0..=255`
/// volume/panning arguments.
pub const MAX_VOLUME: i32 = 1 << 15;

/// Scale factor for volume/panning/effect-amplitude source values (`0..=255`).
pub const VOLUME_UNIT: i32 = MAX_VOLUME / 255;

/// Fixed-point unit for 20-bit fractional pitch values.
pub const FINT20_UNIT: i32 = 1 << 20;

/// Scale factor applied to raw cents values to produce fixed-point pitch.
pub const PITCH_UNIT: i32 = FINT20_UNIT / 100;

/// Lowest accepted note value (`semitone + octave*12`, pre-cents).
///
/// The original `BK_MIN_NOTE`/`BK_MAX_NOTE` constants live in a header the
/// retrieval pack did not include; these bounds are chosen as a generous
/// signed range covering every practical octave a score would use.
pub const MIN_NOTE: i32 = -128;

/// Highest accepted note value. See [`MIN_NOTE`].
pub const MAX_NOTE: i32 = 127;

/// Maximum accepted oscillator duty cycle value for the `dc` command.
pub const MAX_DUTY_CYCLE: i32 = 16;

/// Maximum sequence length (flat values or envelope phases) for an
/// instrument's `v`/`a`/`p`/`dc`/`vnv`/`anv`/`pnv`/`dcnv` sub-commands.
pub const MAX_SEQ_LENGTH: usize = 64;

/// Which timing-trace output the interpreter should produce for a
/// [`crate::Context`] (see `SPEC_FULL.md` §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimingMode {
    /// No timing trace is produced.
    #[default]
    Off,
    /// Trace lines report elapsed ticks.
    Ticks,
    /// Trace lines report elapsed seconds, derived from the clock period.
    Seconds,
}

/// Tunables for one compile-and-run pass of a score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Number of ticks per step, absent a `st`/`stt` override in the score.
    pub default_step_ticks: u32,
    /// Clock tick period in seconds (`factor / divisor` from a `tr`
    /// command, absent one in the score).
    pub default_tick_rate: f64,
    /// Which timing trace a [`crate::Context`] should produce.
    pub timing_mode: TimingMode,
    /// Shift applied to the reported timing-trace time, matching
    /// `BKTKContextOptionTimingShift` in the original implementation.
    pub timing_shift: u8,
    /// Upper bound (exclusive) on track indices; `>= max_tracks` is a
    /// [`crate::error::CompileError::TrackIndexOutOfRange`].
    pub max_tracks: u32,
    /// Upper bound (exclusive) on group indices per track; `>= max_groups`
    /// is a [`crate::error::CompileError::GroupIndexOutOfRange`].
    pub max_groups: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_step_ticks: DEFAULT_STEP_TICKS,
            default_tick_rate: 1.0 / 60.0,
            timing_mode: TimingMode::Off,
            timing_shift: 0,
            max_tracks: MAX_TRACKS,
            max_groups: MAX_GROUPS,
        }
    }
}
