//! Per-track bytecode interpreter.
//!
//! [`Interpreter`] is a direct port of the fetch/decode/execute loop in
//! `original_source/parser/BKTKInterpreter.c`'s `BKTKInterpreterAdvance`:
//! a small set of deferred tick events (`Step`/`Attack`/`Release`/`Mute`)
//! drain first, then straight-line instruction execution resumes until a
//! `Step`/`Ticks` command re-arms the step event and yields control back
//! to the caller. Unlike the original, [`crate::compile::compiler::Instruction::Call`]
//! already carries a fully resolved target track (see `DESIGN.md`), so
//! this port needs no call-stack-relative scope bookkeeping: `Call` is a
//! direct `(track, group)` jump.

use crate::compile::instruction::Instruction;
use crate::compile::model::{CompiledTrack, Instrument, SampleRepeatMode};
use crate::compile::slots::SparseSlots;
use crate::config;
use crate::context::{BuiltinWaveform, LoadedSample, NoteCommand, SynthSink, WaveformSetting};

/// Which track/group the interpreter is currently executing code from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Location {
    track: u32,
    group: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Step,
    Attack,
    Release,
    Mute,
}

#[derive(Debug, Clone, Copy)]
struct TickEvent {
    kind: EventKind,
    ticks: i32,
}

/// What a completed [`Interpreter::advance`] call produced, besides the
/// number of ticks until it should be called again.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// Ticks to wait before calling [`Interpreter::advance`] again,
    /// matching the original's `outTicks` divider value.
    pub ticks_until_next: i32,
    /// Set when a `tr` command just executed: `(numerator, denominator)`
    /// seconds for the new master clock period.
    pub clock_period: Option<(i32, i32)>,
    /// Set when the currently executing source line changed since the
    /// last call: `(elapsed ticks at that line, line number, sequential)`,
    /// where `sequential` means the new line immediately follows the
    /// previously reported one.
    pub line_change: Option<(i64, i32, bool)>,
    /// Whether an `x` (`End`) instruction has been reached; once true,
    /// this interpreter is permanently idle.
    pub has_stopped: bool,
    /// Set when a global `st` command just executed, carrying the new
    /// default step-tick count every other attached track should also
    /// adopt (mirrors the original's loop over every track in
    /// `BKIntrStepTicks`).
    pub global_step_ticks: Option<i32>,
}

/// Executes one track's (or, while inside a `Call`, one group's) byte
/// code against a [`SynthSink`].
#[derive(Debug)]
pub struct Interpreter {
    home_track: u32,
    location: Location,
    pc: usize,
    call_stack: Vec<(Location, usize)>,
    repeat_start: Option<(Location, usize)>,
    events: Vec<TickEvent>,
    has_attack_event: bool,
    has_arpeggio: bool,
    has_stopped: bool,
    has_repeated: bool,
    next_notes: [i32; 2],
    next_note_index: usize,
    next_arpeggio: Vec<i32>,
    num_steps: i32,
    step_tick_count: i32,
    time: i64,
    line_time: i64,
    lineno: i32,
    last_reported_line: i32,
}

impl Interpreter {
    /// Creates an interpreter positioned at the start of its track's
    /// code, with `default_step_ticks` as the initial step length.
    #[must_use]
    pub fn new(default_step_ticks: i32) -> Self {
        Self {
            home_track: 0,
            location: Location {
                track: 0,
                group: None,
            },
            pc: 0,
            call_stack: Vec::new(),
            repeat_start: None,
            events: Vec::new(),
            has_attack_event: false,
            has_arpeggio: false,
            has_stopped: false,
            has_repeated: false,
            next_notes: [0; 2],
            next_note_index: 0,
            next_arpeggio: Vec::new(),
            num_steps: 0,
            step_tick_count: default_step_ticks,
            time: 0,
            line_time: 0,
            lineno: -1,
            last_reported_line: 0,
        }
    }

    /// Returns this interpreter to its initial program counter and
    /// clears every flag, matching `BKTKInterpreterReset`.
    pub fn reset(&mut self, default_step_ticks: i32) {
        *self = Self::new(default_step_ticks);
    }

    /// Overrides the step-tick count directly, without going through a
    /// `st`/`stt` instruction; used by [`crate::context::Context`] to
    /// propagate a global `st` command to every other attached track.
    pub(crate) fn force_step_tick_count(&mut self, ticks: i32) {
        self.step_tick_count = ticks;
    }

    fn unset(&mut self, kinds: &[EventKind]) {
        if kinds.contains(&EventKind::Attack) {
            self.has_attack_event = false;
            self.next_note_index = 0;
        }
        self.events.retain(|e| !kinds.contains(&e.kind));
    }

    fn arm(&mut self, kind: EventKind, ticks: i32) {
        if ticks <= 0 {
            self.unset(&[kind]);
            return;
        }
        if kind == EventKind::Attack {
            self.has_attack_event = true;
        }
        if kind == EventKind::Step {
            for event in &mut self.events {
                if event.ticks > ticks {
                    event.ticks = ticks;
                }
            }
        }
        if let Some(event) = self.events.iter_mut().find(|e| e.kind == kind) {
            event.ticks = ticks;
        } else if self.events.len() < config::MAX_EVENTS {
            self.events.push(TickEvent { kind, ticks });
        }
    }

    fn next_event(&self) -> Option<TickEvent> {
        self.events.iter().copied().min_by_key(|e| e.ticks)
    }

    fn advance_events(&mut self, ticks: i32) {
        for event in &mut self.events {
            if event.ticks > 0 {
                event.ticks -= ticks;
            }
        }
    }

    fn ticks_as_count(&self, num: i32, den: i32) -> i32 {
        if den == 0 {
            num
        } else {
            self.step_tick_count * num / den
        }
    }

    fn code_at<'a>(&self, location: Location, tracks: &'a SparseSlots<CompiledTrack>) -> &'a [u32] {
        let track = tracks
            .get(location.track)
            .expect("interpreter location always names a track that exists");
        match location.group {
            Some(group) => {
                &track
                    .groups
                    .get(group)
                    .expect("interpreter location always names a group that exists")
                    .code
                    .0
            }
            None => &track.code.0,
        }
    }

    fn fire_attack(&mut self, sink: &mut dyn SynthSink) {
        if self.next_note_index == 0 {
            self.unset(&[EventKind::Attack]);
            return;
        }
        for i in 0..self.next_note_index {
            sink.set_note(NoteCommand::On(self.next_notes[i]));
        }
        if self.has_arpeggio {
            sink.set_arpeggio(&self.next_arpeggio);
        }
        self.next_note_index = 0;
        self.unset(&[EventKind::Attack]);
    }

    /// Advances this interpreter, draining any due tick events and then
    /// executing straight-line code until a step-advancing command
    /// yields control back.
    ///
    /// `track` is this interpreter's home track index, used to resolve
    /// `Local`-scoped group calls' starting location.
    #[allow(clippy::too_many_arguments)]
    pub fn advance(
        &mut self,
        track: u32,
        tracks: &SparseSlots<CompiledTrack>,
        waveforms: &[crate::compile::model::Waveform],
        instruments: &[Instrument],
        samples: &[LoadedSample],
        sink: &mut dyn SynthSink,
    ) -> AdvanceResult {
        self.home_track = track;
        self.has_repeated = false;
        let mut result = AdvanceResult::default();

        if self.has_stopped {
            result.ticks_until_next = i32::MAX;
            result.has_stopped = true;
            return result;
        }

        let mut num_steps = self.num_steps;
        if num_steps != 0 {
            self.advance_events(num_steps);
            loop {
                let Some(next) = self.next_event() else {
                    num_steps = 0;
                    break;
                };
                if next.ticks > 0 {
                    num_steps = next.ticks;
                    break;
                }
                match next.kind {
                    EventKind::Step => {}
                    EventKind::Attack => self.fire_attack(sink),
                    EventKind::Release => sink.set_note(NoteCommand::Release),
                    EventKind::Mute => {
                        sink.set_note(NoteCommand::Mute);
                        sink.set_arpeggio(&[]);
                    }
                }
                self.unset(&[next.kind]);
            }
            if num_steps != 0 {
                self.num_steps = num_steps;
                self.time += i64::from(num_steps);
                result.ticks_until_next = num_steps;
                return result;
            }
        }

        let mut run = true;
        while run {
            let code = self.code_at(self.location, tracks);
            if self.pc >= code.len() {
                // Ran off the end of a group/track without an explicit
                // terminator; treat as an implicit Return/End.
                if self.call_stack.is_empty() {
                    self.execute_end(&mut result);
                    run = false;
                } else {
                    self.do_return();
                }
                continue;
            }
            let (instr, len) = Instruction::decode(&code[self.pc..]);
            self.pc += len;
            match instr {
                Instruction::Attack(note) => {
                    if self.has_attack_event {
                        self.next_note_index = self.next_note_index.min(1);
                        self.next_notes[self.next_note_index] = note;
                        self.next_note_index += 1;
                    } else {
                        sink.set_arpeggio(&[]);
                        sink.set_note(NoteCommand::On(note));
                    }
                    self.has_arpeggio = false;
                }
                Instruction::Arpeggio(deltas) => {
                    self.has_arpeggio = !deltas.is_empty();
                    if self.has_attack_event {
                        self.next_arpeggio = deltas;
                    } else {
                        sink.set_arpeggio(&deltas);
                    }
                }
                Instruction::ArpeggioSpeed(ticks) => {
                    let ticks = if ticks <= 0 { config::DEFAULT_STEP_TICKS as i32 } else { ticks };
                    sink.set_arpeggio_divider(ticks);
                }
                Instruction::Release => {
                    self.unset(&[EventKind::Release, EventKind::Mute]);
                    sink.set_note(NoteCommand::Release);
                    self.next_note_index = 0;
                }
                Instruction::Mute => {
                    self.unset(&[EventKind::Release, EventKind::Mute]);
                    sink.set_note(NoteCommand::Mute);
                    self.next_note_index = 0;
                }
                Instruction::Volume(v) => sink.set_volume(v),
                Instruction::MasterVolume(v) => sink.set_master_volume(v),
                Instruction::Panning(v) => sink.set_panning(v),
                Instruction::Pitch(v) => sink.set_pitch(v),
                Instruction::AttackTicks(num, den) => {
                    let ticks = self.ticks_as_count(num, den);
                    self.arm(EventKind::Attack, ticks);
                }
                Instruction::ReleaseTicks(num, den) => {
                    let ticks = self.ticks_as_count(num, den);
                    self.unset(&[EventKind::Mute]);
                    self.arm(EventKind::Release, ticks);
                }
                Instruction::MuteTicks(num, den) => {
                    let ticks = self.ticks_as_count(num, den);
                    self.unset(&[EventKind::Release]);
                    self.arm(EventKind::Mute, ticks);
                }
                Instruction::Ticks(n) => {
                    self.arm(EventKind::Step, n);
                    run = false;
                }
                Instruction::Step(n) => {
                    self.arm(EventKind::Step, n * self.step_tick_count);
                    run = false;
                }
                Instruction::StepTicks(n, _d) => {
                    self.step_tick_count = n;
                    result.global_step_ticks = Some(n);
                }
                Instruction::StepTicksTrack(n, _d) => {
                    self.step_tick_count = n;
                }
                Instruction::TickRate(num, den) => {
                    if den != 0 {
                        result.clock_period = Some((num, den));
                    }
                }
                Instruction::Effect(id, params) => sink.set_effect(id, params),
                Instruction::DutyCycle(v) => sink.set_duty_cycle(v),
                Instruction::PhaseWrap(v) => sink.set_phase_wrap(v),
                Instruction::Instrument(index) => {
                    sink.set_instrument(instruments.get(index as usize));
                }
                Instruction::Waveform { index, custom } => {
                    if custom {
                        if let Some(waveform) = waveforms.get(index as usize) {
                            sink.set_waveform(WaveformSetting::Custom(waveform));
                        } else {
                            sink.set_waveform(WaveformSetting::Builtin(BuiltinWaveform::from_id(1).unwrap()));
                        }
                    } else if let Some(builtin) = BuiltinWaveform::from_id(index) {
                        sink.set_waveform(WaveformSetting::Builtin(builtin));
                    }
                }
                Instruction::Sample(index) => {
                    let loaded = samples.get(index as usize);
                    sink.set_sample(loaded.map(|s| &s.sample));
                    if let Some(sample) = loaded.map(|l| &l.sample) {
                        sink.set_sample_repeat_mode(sample.repeat);
                        if let Some((from, to)) = sample.sustain_range {
                            if from != to {
                                sink.set_sample_sustain_range(from, to);
                            }
                        }
                    }
                }
                Instruction::SampleRepeat(mode) => {
                    let mode = match mode {
                        1 => SampleRepeatMode::Repeat,
                        2 => SampleRepeatMode::PingPong,
                        _ => SampleRepeatMode::None,
                    };
                    sink.set_sample_repeat_mode(mode);
                }
                Instruction::SampleRange(from, to) => sink.set_sample_range(from, to),
                Instruction::SampleSustainRange(from, to) => sink.set_sample_sustain_range(from, to),
                Instruction::PulseKernel(id) => sink.set_pulse_kernel(id),
                Instruction::Call { track: dest_track, group, .. } => {
                    if self.call_stack.len() < config::MAX_CALL_STACK {
                        self.call_stack.push((self.location, self.pc));
                        self.location = Location {
                            track: dest_track as u32,
                            group: Some(group as u32),
                        };
                        self.pc = 0;
                    }
                }
                Instruction::Return => self.do_return(),
                Instruction::RepeatStart => {
                    self.repeat_start = Some((self.location, self.pc));
                }
                Instruction::Jump(offset) => {
                    if offset == -1 {
                        if let Some((location, pc)) = self.repeat_start {
                            self.location = location;
                            self.pc = pc;
                            self.has_repeated = true;
                        }
                    }
                }
                Instruction::End => {
                    self.execute_end(&mut result);
                    run = false;
                }
                Instruction::LineNo(line) => {
                    self.lineno = line;
                    self.line_time = self.time;
                }
                Instruction::Noop => {}
            }
        }

        let next = self.next_event().map_or(1, |e| e.ticks.max(1));
        self.num_steps = next;
        self.time += i64::from(next);
        result.ticks_until_next = next;

        if !self.has_repeated && self.lineno != self.last_reported_line {
            let sequential = self.lineno == self.last_reported_line + 1;
            result.line_change = Some((self.line_time, self.lineno, sequential));
            self.last_reported_line = self.lineno;
        }

        result
    }

    fn do_return(&mut self) {
        if let Some((location, pc)) = self.call_stack.pop() {
            self.location = location;
            self.pc = pc;
        }
    }

    fn execute_end(&mut self, result: &mut AdvanceResult) {
        self.arm(EventKind::Step, i32::MAX);
        self.has_stopped = true;
        result.has_stopped = true;
        // Rewind so a repeated advance() call keeps landing on `End`.
        self.pc = self.pc.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::config::Config;
    use crate::context::test_support::NullSink;
    use crate::lex::tokenize;
    use crate::parse::parse;

    fn compiled(source: &str) -> crate::compile::CompileOutput {
        let tokens = tokenize(source).unwrap().tokens;
        let tree = parse(&tokens).unwrap().tree;
        let output = Compiler::new(Config::default()).compile(&tree).unwrap();
        crate::compile::link(&output.tracks, &output.jump_sites).unwrap();
        output
    }

    fn drive(interp: &mut Interpreter, output: &crate::compile::CompileOutput, sink: &mut NullSink, rounds: usize) {
        for _ in 0..rounds {
            let result = interp.advance(0, &output.tracks, &[], &[], &[], sink);
            if result.has_stopped {
                break;
            }
        }
    }

    #[test]
    fn immediate_attack_plays_note() {
        let output = compiled("a:c4");
        let mut interp = Interpreter::new(24);
        let mut sink = NullSink::default();
        let _ = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        assert_eq!(sink.notes[0], NoteCommand::On(48 * 100));
    }

    #[test]
    fn step_arms_event_and_pauses_execution() {
        let output = compiled("s:4;v:1");
        let mut interp = Interpreter::new(24);
        let mut sink = NullSink::default();
        let result = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        assert_eq!(result.ticks_until_next, 4 * 24);
        assert!(sink.volumes.is_empty());
        // After the step elapses, the next advance should run the `v:1`.
        let result2 = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        assert_eq!(sink.volumes, vec![1]);
        assert!(result2.ticks_until_next >= 1);
    }

    #[test]
    fn end_instruction_stops_the_interpreter() {
        let output = compiled("x");
        let mut interp = Interpreter::new(24);
        let mut sink = NullSink::default();
        let result = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        assert!(result.has_stopped);
        let result2 = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        assert!(result2.has_stopped);
        assert_eq!(result2.ticks_until_next, i32::MAX);
    }

    #[test]
    fn call_and_return_resume_the_caller() {
        let output = compiled("[grp:0; v:2; s:1]; g:0; v:3");
        let mut interp = Interpreter::new(24);
        let mut sink = NullSink::default();
        drive(&mut interp, &output, &mut sink, 8);
        assert_eq!(sink.volumes, vec![2, 3]);
    }

    #[test]
    fn jump_minus_one_repeats_from_the_mark() {
        let output = compiled("xb;v:5;s:1;x");
        let mut interp = Interpreter::new(24);
        let mut sink = NullSink::default();
        for _ in 0..3 {
            let _ = interp.advance(0, &output.tracks, &[], &[], &[], &mut sink);
        }
        assert!(sink.volumes.len() >= 2);
        assert!(sink.volumes.iter().all(|v| *v == 5));
    }
}
