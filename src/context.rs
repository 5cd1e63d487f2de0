//! Owns resolved resource tables and wires tracks to a caller-supplied
//! synthesis engine.
//!
//! A [`Context`] is built from a [`crate::compile::CompileOutput`] that has
//! already passed [`crate::compile::link`]. It resolves pending `samp
//! load:wav` entries through a caller-supplied [`SampleSource`], then lets
//! the caller [`Context::attach`] one synthesis-engine sink per track it
//! wants to drive. From then on, [`Context::advance_track`] is the single
//! entry point a real-time audio callback calls once per track divider
//! tick, mirroring `BKTKContextAdvance` in
//! `original_source/parser/BKTKContext.c`.

use std::time::Duration;

use gametime::TimeSpan;

use crate::compile::model::{CompiledTrack, Instrument, Sample, SampleRepeatMode, Waveform};
use crate::compile::slots::SparseSlots;
use crate::compile::CompileOutput;
use crate::config::Config;
use crate::error::ContextError;
use crate::interpret::{AdvanceResult, Interpreter};
use crate::trace::TimingWriter;

/// What a `g`-free `a` command armed: an immediate note-on, or a release/
/// mute tied to the same attribute family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteCommand {
    /// Plays `note` (`semitone*100+cents`), with any pending arpeggio
    /// deltas already applied by the interpreter.
    On(i32),
    /// Releases the currently playing note with envelope release applied.
    Release,
    /// Mutes the currently playing note immediately.
    Mute,
}

/// The built-in oscillator shapes resolvable without a custom [`Waveform`]
/// table entry (`sqr`/`tri`/`sin`/`saw`/`noi`/`smp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinWaveform {
    /// `sqr`/`square`.
    Square,
    /// `tri`/`triangle`.
    Triangle,
    /// `sin`/`sine`.
    Sine,
    /// `saw`/`sawtooth`.
    Sawtooth,
    /// `noi`/`noise`.
    Noise,
    /// `smp`/`sample`: play back the track's currently selected [`Sample`].
    Sample,
}

impl BuiltinWaveform {
    fn from_id(id: i32) -> Option<Self> {
        Some(match id {
            1 => Self::Square,
            2 => Self::Triangle,
            3 => Self::Sine,
            4 => Self::Sawtooth,
            5 => Self::Noise,
            6 => Self::Sample,
            _ => return None,
        })
    }
}

/// The resolved argument of a `w` command, passed to [`SynthSink::set_waveform`].
#[derive(Debug, Clone, Copy)]
pub enum WaveformSetting<'a> {
    /// One of the fixed built-in shapes.
    Builtin(BuiltinWaveform),
    /// A user-declared `wave` table entry.
    Custom(&'a Waveform),
}

/// The contract a real-time synthesis backend must implement to be driven
/// by this crate's per-track [`Interpreter`] (`spec.md` §6.3).
///
/// One sink instance is [`Context::attach`]ed per track; it is mutated
/// only by that track's own interpreter, so no synchronization is
/// required (`spec.md` §5).
pub trait SynthSink {
    /// `a`/`r`/`m`, fired when their deferred tick event reaches zero.
    fn set_note(&mut self, note: NoteCommand);
    /// `v`.
    fn set_volume(&mut self, volume: i32);
    /// `vm`.
    fn set_master_volume(&mut self, volume: i32);
    /// `p`.
    fn set_panning(&mut self, panning: i32);
    /// `pt`.
    fn set_pitch(&mut self, pitch: i32);
    /// `dc`.
    fn set_duty_cycle(&mut self, duty_cycle: i32);
    /// `pw`.
    fn set_phase_wrap(&mut self, phase_wrap: i32);
    /// `as`.
    fn set_arpeggio_divider(&mut self, ticks: i32);
    /// `w`.
    fn set_waveform(&mut self, waveform: WaveformSetting<'_>);
    /// `i`.
    fn set_instrument(&mut self, instrument: Option<&Instrument>);
    /// `d`, together with whatever `dn`/`ds`/`dr` most recently narrowed.
    fn set_sample(&mut self, sample: Option<&Sample>);
    /// `dr`, or a sample's own declared repeat mode when `d` selects it.
    fn set_sample_repeat_mode(&mut self, mode: SampleRepeatMode);
    /// `dn`, or a sample's own declared range when `d` selects it.
    fn set_sample_range(&mut self, from: i32, to: i32);
    /// `ds`, or a sample's own declared sustain range when `d` selects it.
    fn set_sample_sustain_range(&mut self, from: i32, to: i32);
    /// `e`.
    fn set_effect(&mut self, id: i32, params: [i32; 3]);
    /// The arpeggio deltas armed by a chorded `a` command, delivered at
    /// the same instant as the base note in [`Self::set_note`].
    fn set_arpeggio(&mut self, deltas: &[i32]);
    /// `pk`.
    fn set_pulse_kernel(&mut self, id: i32);
}

/// The contract a render context must implement to receive the master
/// clock period (`spec.md` §6.3's `ClockPeriod`, set by `tr`).
pub trait ClockSink {
    /// Sets the master clock tick period.
    fn set_clock_period(&mut self, period: TimeSpan);
}

/// Resolves a `samp load:wav` path to its decoded frames, kept out of this
/// crate's scope per its sample-file-codec Non-goal (`spec.md` §1).
pub trait SampleSource {
    /// Loads `path` (as written in `load:wav:"path"`, resolved against
    /// whatever base directory the implementation chooses) into signed
    /// 16-bit frames.
    ///
    /// # Errors
    ///
    /// Returns a human-readable failure description; [`Context::new`]
    /// wraps it as [`ContextError::SampleLoad`].
    fn load(&self, path: &str) -> Result<Vec<i16>, String>;
}

/// A sample with its `load:wav` path (if any) resolved to frames.
#[derive(Debug, Clone, Default)]
pub struct LoadedSample {
    /// The compile-time sample definition.
    pub sample: Sample,
    /// Decoded frames, from either an inline `data` literal or a loaded
    /// WAV file. `None` for a sample that named neither.
    pub frames: Option<Vec<i16>>,
}

fn decode_inline(sample: &Sample) -> Option<Vec<i16>> {
    let bytes = sample.inline_data.as_ref()?;
    let fmt = sample.format;
    let mut out = Vec::new();
    match fmt.bits {
        16 => {
            for chunk in bytes.chunks_exact(2) {
                let raw = if fmt.big_endian {
                    u16::from_be_bytes([chunk[0], chunk[1]])
                } else {
                    u16::from_le_bytes([chunk[0], chunk[1]])
                };
                out.push(if fmt.signed {
                    raw as i16
                } else {
                    (i32::from(raw) - 0x8000) as i16
                });
            }
        }
        8 => {
            for &b in bytes {
                let centered = if fmt.signed {
                    i16::from(b as i8)
                } else {
                    i16::from(b) - 128
                };
                out.push(centered * 256);
            }
        }
        bits => {
            // 1/2/4-bit packed samples: unpack MSB-first within each byte.
            for &byte in bytes {
                let count = 8 / u32::from(bits);
                for i in 0..count {
                    let shift = 8 - (i + 1) * u32::from(bits);
                    let mask = (1u32 << bits) - 1;
                    let raw = (u32::from(byte) >> shift) & mask;
                    let max = mask as i32;
                    let centered = (raw as i32 * 2 - max) * (i16::MAX as i32 / max.max(1));
                    out.push(centered.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16);
                }
            }
        }
    }
    Some(out)
}

/// Owns every resolved resource table and the tracks attached to a
/// synthesis backend; the top of the runtime half of the pipeline (see
/// the crate root docs).
pub struct Context<S, C> {
    config: Config,
    instruments: Vec<Instrument>,
    waveforms: Vec<Waveform>,
    samples: Vec<LoadedSample>,
    tracks: SparseSlots<CompiledTrack>,
    attachments: Vec<Attachment<S>>,
    clock: C,
    trace: Option<TimingWriter>,
}

struct Attachment<S> {
    track: u32,
    interpreter: Interpreter,
    sink: S,
}

impl<S: SynthSink, C: ClockSink> Context<S, C> {
    /// Builds a `Context` from a completed (and already
    /// [`crate::compile::link`]ed) compilation, resolving every pending
    /// sample load through `sample_source`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SampleLoad`] at the first sample whose
    /// `load:wav` path `sample_source` cannot resolve.
    pub fn new(
        output: CompileOutput,
        config: Config,
        sample_source: &dyn SampleSource,
        clock: C,
    ) -> Result<Self, ContextError> {
        let CompileOutput {
            tracks,
            instruments,
            waveforms,
            samples,
            ..
        } = output;
        let mut loaded = Vec::with_capacity(samples.len());
        for sample in samples.into_objects() {
            let frames = if let Some(path) = &sample.path {
                let data = sample_source.load(path).map_err(|message| ContextError::SampleLoad {
                    name: sample.name.clone(),
                    path: path.clone(),
                    message,
                })?;
                Some(data)
            } else {
                decode_inline(&sample)
            };
            loaded.push(LoadedSample { sample, frames });
        }
        Ok(Self {
            config,
            instruments: instruments.into_objects(),
            waveforms: waveforms.into_objects(),
            samples: loaded,
            tracks,
            attachments: Vec::new(),
            clock,
            trace: None,
        })
    }

    /// Enables the timing trace (`spec.md` §6.4) at the given mode/shift.
    pub fn set_timing_mode(&mut self, mode: crate::config::TimingMode, shift: u8) {
        self.trace = match mode {
            crate::config::TimingMode::Off => None,
            other => Some(TimingWriter::new(other, shift, self.config.default_tick_rate)),
        };
    }

    /// Drains and returns any timing-trace lines produced since the last
    /// call, per `spec.md` §6.4.
    #[must_use]
    pub fn take_trace(&mut self) -> String {
        self.trace.as_mut().map(TimingWriter::take).unwrap_or_default()
    }

    /// Wires a synth-engine sink to drive `track`, creating a fresh
    /// [`Interpreter`] at its initial program counter.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::SampleLoad`]... actually never; reserved
    /// for future resource-binding failures. Returns `Err` only if
    /// `track` was never declared.
    pub fn attach(&mut self, track: u32, sink: S) -> Result<(), ()> {
        if !self.tracks.contains(track) {
            return Err(());
        }
        self.attachments.push(Attachment {
            track,
            interpreter: Interpreter::new(self.config.default_step_ticks as i32),
            sink,
        });
        Ok(())
    }

    /// Looks up a resolved instrument by index.
    #[must_use]
    pub fn instrument(&self, index: u32) -> Option<&Instrument> {
        self.instruments.get(index as usize)
    }

    /// Looks up a resolved waveform by index.
    #[must_use]
    pub fn waveform(&self, index: u32) -> Option<&Waveform> {
        self.waveforms.get(index as usize)
    }

    /// Looks up a resolved, load-completed sample by index.
    #[must_use]
    pub fn sample(&self, index: u32) -> Option<&LoadedSample> {
        self.samples.get(index as usize)
    }

    /// Number of distinct tracks attached to a sink.
    #[must_use]
    pub fn attached_track_count(&self) -> usize {
        self.attachments.len()
    }

    /// Advances the interpreter attached to `track` by one divider step,
    /// driving its sink and, if a `tr` command just executed, this
    /// `Context`'s [`ClockSink`].
    ///
    /// Returns the tick count until that track's interpreter next wants
    /// to run, matching the original's `BKTKInterpreterAdvance` divider
    /// contract (`spec.md` §4.4, §5): the caller is expected to wait that
    /// many ticks before calling again.
    ///
    /// # Panics
    ///
    /// Panics if `track` was never [`Self::attach`]ed.
    pub fn advance_track(&mut self, track: u32) -> i32 {
        let slot = self
            .attachments
            .iter()
            .position(|a| a.track == track)
            .expect("advance_track called on an unattached track");
        let Attachment {
            interpreter, sink, ..
        } = &mut self.attachments[slot];
        let AdvanceResult {
            ticks_until_next,
            clock_period,
            line_change,
            global_step_ticks,
            ..
        } = interpreter.advance(track, &self.tracks, &self.waveforms, &self.instruments, &self.samples, sink);
        if let Some((num, den)) = clock_period {
            let raw_seconds = f64::from(num) / f64::from(den.max(1));
            let seconds = strict_num_extended::NonNegativeF64::new(raw_seconds)
                .unwrap_or(strict_num_extended::NonNegativeF64::ZERO)
                .as_f64();
            let period = TimeSpan::from_duration(Duration::from_secs_f64(seconds));
            self.clock.set_clock_period(period);
            if let Some(writer) = &mut self.trace {
                writer.set_tick_rate(seconds);
            }
        }
        if let (Some(writer), Some((elapsed, lineno, is_sequential))) =
            (&mut self.trace, line_change)
        {
            writer.record(elapsed, lineno, is_sequential);
        }
        if let Some(ticks) = global_step_ticks {
            self.config.default_step_ticks = ticks.max(0) as u32;
            for other in &mut self.attachments {
                if other.track != track {
                    other.interpreter.force_step_tick_count(ticks);
                }
            }
        }
        ticks_until_next
    }

    /// Resets every attached interpreter to its initial program counter
    /// and clears its flags, matching `BKTKContextReset`.
    pub fn reset(&mut self) {
        for attachment in &mut self.attachments {
            attachment.interpreter.reset(self.config.default_step_ticks as i32);
        }
    }
}

/// How a [`LoadedSample`]'s playable range narrows its raw frames,
/// resolved at the point a `d`/`dn`/`ds`/`dr` sequence is applied.
#[must_use]
pub fn effective_repeat(sample: &Sample) -> SampleRepeatMode {
    sample.repeat
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{ClockSink, NoteCommand, SampleRepeatMode, SynthSink, WaveformSetting};
    use gametime::TimeSpan;

    /// A no-op [`SynthSink`]/[`ClockSink`] that records every call it
    /// received, for interpreter/context unit tests that don't need a
    /// real backend.
    #[derive(Debug, Default)]
    pub(crate) struct NullSink {
        pub notes: Vec<NoteCommand>,
        pub volumes: Vec<i32>,
        pub arpeggios: Vec<Vec<i32>>,
        pub clock_periods: Vec<TimeSpan>,
    }

    impl SynthSink for NullSink {
        fn set_note(&mut self, note: NoteCommand) {
            self.notes.push(note);
        }
        fn set_volume(&mut self, volume: i32) {
            self.volumes.push(volume);
        }
        fn set_master_volume(&mut self, _volume: i32) {}
        fn set_panning(&mut self, _panning: i32) {}
        fn set_pitch(&mut self, _pitch: i32) {}
        fn set_duty_cycle(&mut self, _duty_cycle: i32) {}
        fn set_phase_wrap(&mut self, _phase_wrap: i32) {}
        fn set_arpeggio_divider(&mut self, _ticks: i32) {}
        fn set_waveform(&mut self, _waveform: WaveformSetting<'_>) {}
        fn set_instrument(&mut self, _instrument: Option<&crate::compile::model::Instrument>) {}
        fn set_sample(&mut self, _sample: Option<&crate::compile::model::Sample>) {}
        fn set_sample_repeat_mode(&mut self, _mode: SampleRepeatMode) {}
        fn set_sample_range(&mut self, _from: i32, _to: i32) {}
        fn set_sample_sustain_range(&mut self, _from: i32, _to: i32) {}
        fn set_effect(&mut self, _id: i32, _params: [i32; 3]) {}
        fn set_arpeggio(&mut self, deltas: &[i32]) {
            self.arpeggios.push(deltas.to_vec());
        }
        fn set_pulse_kernel(&mut self, _id: i32) {}
    }

    impl ClockSink for NullSink {
        fn set_clock_period(&mut self, period: TimeSpan) {
            self.clock_periods.push(period);
        }
    }

    pub(crate) struct NullSampleSource;

    impl super::SampleSource for NullSampleSource {
        fn load(&self, _path: &str) -> Result<Vec<i16>, String> {
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{NullSampleSource, NullSink};
    use super::*;
    use crate::compile::Compiler;
    use crate::config::Config;
    use crate::lex::tokenize;
    use crate::parse::parse;

    fn build_context(source: &str) -> Context<NullSink, NullSink> {
        let tokens = tokenize(source).unwrap().tokens;
        let tree = parse(&tokens).unwrap().tree;
        let output = Compiler::new(Config::default()).compile(&tree).unwrap();
        crate::compile::link(&output.tracks, &output.jump_sites).unwrap();
        Context::new(output, Config::default(), &NullSampleSource, NullSink::default()).unwrap()
    }

    #[test]
    fn attach_and_advance_plays_note_then_releases() {
        let mut ctx = build_context("v:128;a:c4;s:4;r");
        ctx.attach(0, NullSink::default()).unwrap();
        // Drive enough divider steps to run past the Attack/Step/Release
        // sequence.
        for _ in 0..10 {
            ctx.advance_track(0);
        }
        let sink = &ctx.attachments[0].sink;
        assert!(sink.notes.iter().any(|n| matches!(n, NoteCommand::On(_))));
        assert!(sink.notes.contains(&NoteCommand::Release));
    }

    #[test]
    fn reset_returns_interpreter_to_start() {
        let mut ctx = build_context("v:128;a:c4;s:4;r");
        ctx.attach(0, NullSink::default()).unwrap();
        ctx.advance_track(0);
        ctx.reset();
        // After reset, a fresh run reproduces the same first event.
        ctx.advance_track(0);
        let sink = &ctx.attachments[0].sink;
        assert!(!sink.volumes.is_empty());
    }
}
