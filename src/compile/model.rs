//! Compile-time data entities: instruments, waveforms, samples, tracks and
//! groups.
//!
//! Grounded on the `BKTKInstrument`/`BKTKWaveform`/`BKTKSample`/`BKTKTrack`/
//! `BKTKGroup` structs in `original_source/parser/BKTKCompiler.c`.

use super::instruction::ByteCode;
use super::slots::SparseSlots;

/// One envelope or flat-sequence table (volume, pitch, panning or duty
/// cycle) belonging to an [`Instrument`].
///
/// A `steps` entry of `None` at index `i` means `values[i]` is a flat
/// sequence step (`BKTKCompilerParseSequence`); `Some(n)` means it is a
/// phase (`n` steps, then `values[i]`) from an envelope (`BKTKCompilerParseEnvelope`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sequence {
    /// `Some(steps)` per entry for an envelope (`vnv`/`anv`/`pnv`/`dcnv`),
    /// `None` for a flat sequence (`v`/`a`/`p`/`dc`).
    pub steps: Vec<Option<i32>>,
    /// The (already domain-scaled) values.
    pub values: Vec<i32>,
    /// Index into `values` where the repeating region begins.
    pub repeat_begin: usize,
    /// Length of the repeating region.
    pub repeat_len: usize,
}

/// An ADSR envelope, ticks for attack/decay/release and a pre-scaled
/// sustain level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Adsr {
    /// Attack duration in ticks.
    pub attack: i32,
    /// Decay duration in ticks.
    pub decay: i32,
    /// Sustain level, pre-scaled to the volume domain.
    pub sustain: i32,
    /// Release duration in ticks.
    pub release: i32,
}

/// An instrument: named envelope/sequence tables plus an optional ADSR.
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    /// The instrument's resolved name (explicit or auto-generated).
    pub name: String,
    /// Pitch sequence/envelope, in cents (`FINT20_UNIT/100` scaled).
    pub pitch: Sequence,
    /// Volume sequence/envelope, `MAX_VOLUME/255` scaled.
    pub volume: Sequence,
    /// Panning sequence/envelope, `MAX_VOLUME/255` scaled.
    pub panning: Sequence,
    /// Duty-cycle sequence/envelope, unscaled.
    pub duty_cycle: Sequence,
    /// Optional ADSR envelope, set by `adsr`.
    pub adsr: Option<Adsr>,
}

/// A waveform: named, holding a small custom frame sequence.
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    /// The waveform's resolved name.
    pub name: String,
    /// Frame amplitudes, volume-unit scaled.
    pub frames: Vec<i32>,
}

/// How a [`Sample`] loops once it reaches its sample range's end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleRepeatMode {
    /// Play once and stop.
    #[default]
    None,
    /// Loop back to the range start.
    Repeat,
    /// Bounce back and forth (palindrome).
    PingPong,
}

/// Bit width/signedness/endianness of an inline `data` literal, from
/// `parseDataParams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataFormat {
    /// Bits per sample: 1, 2, 4, 8 or 16.
    pub bits: u8,
    /// Whether samples are signed (only meaningful for 8/16 bit).
    pub signed: bool,
    /// Whether multi-byte samples are big-endian.
    pub big_endian: bool,
}

impl Default for DataFormat {
    fn default() -> Self {
        Self {
            bits: 16,
            signed: true,
            big_endian: false,
        }
    }
}

/// A sample: named, either a deferred WAV file load or embedded PCM data.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// The sample's resolved name.
    pub name: String,
    /// Path passed to `load:wav`, resolved against the Context's load path
    /// at construction time.
    pub path: Option<String>,
    /// Raw bytes from a `data` literal, in `format`.
    pub inline_data: Option<Vec<u8>>,
    /// The inline data's bit format; meaningless if `inline_data` is `None`.
    pub format: DataFormat,
    /// Pitch offset in cents, `PITCH_UNIT` scaled.
    pub pitch: i32,
    /// Loop behavior.
    pub repeat: SampleRepeatMode,
    /// Playable `(from, to)` range, if narrowed by `dn`.
    pub range: Option<(i32, i32)>,
    /// Sustain `(from, to)` range, if narrowed by `ds`.
    pub sustain_range: Option<(i32, i32)>,
}

/// A compiled group: a callable subroutine, its byte code always ending in
/// `Return`.
#[derive(Debug, Clone, Default)]
pub struct CompiledGroup {
    /// The group's byte code.
    pub code: ByteCode,
}

/// A compiled track: its own byte code plus the groups declared inside it.
#[derive(Debug, Clone)]
pub struct CompiledTrack {
    /// The track's initial waveform operand (built-in enum value, or a
    /// custom waveform index with `CUSTOM_WAVEFORM_FLAG` set).
    pub waveform: i32,
    /// The track's top-level byte code, always ending in `End`.
    pub code: ByteCode,
    /// Groups declared with `grp` inside this track, sparse by index.
    pub groups: SparseSlots<CompiledGroup>,
}

impl CompiledTrack {
    pub(crate) fn new(waveform: i32, max_groups: u32) -> Self {
        Self {
            waveform,
            code: ByteCode::default(),
            groups: SparseSlots::new(max_groups),
        }
    }
}
