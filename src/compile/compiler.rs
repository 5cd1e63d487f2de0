//! Walks a [`crate::parse::Node`] tree, resolving symbols and emitting
//! per-track/per-group 32-bit instruction buffers.
//!
//! Grounded on `BKTKCompilerCompile`/`BKTKCompilerCompileCommand` in
//! `original_source/parser/BKTKCompiler.c`: a definition keyword
//! (`track`/`instr`/`samp`/`wave`/`grp`) dispatches to its own
//! sub-compiler; any other command compiles directly into whichever
//! [`Scope`] is currently open.

use crate::config::{self, Config};
use crate::error::{CompileError, TextPosition, Warning};
use crate::parse::{Arg, ArgValue, Node, NodeKind};

use super::command::{
    builtin_waveform_id, effect_id, parse_data_format, parse_group_index, parse_note,
    parse_ticks_fraction, pulse_kernel_id, repeat_mode, EFFECT_PORTAMENTO, EFFECT_VIBRATO,
};
use super::instruction::{ByteCode, GroupScope, Instruction};
use super::model::{
    Adsr, CompiledGroup, CompiledTrack, Instrument, Sample, Waveform,
};
use super::sequence::{parse_sequence, SequenceShape};
use super::slots::{InsertError, SparseSlots};
use super::symbols::SymbolTable;

/// Explicit compile-time scope: which byte buffer a command currently
/// compiles into (Design Note "Global mutable state").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The implicit global track (track 0).
    Global,
    /// A user track's own byte code.
    Track(u32),
    /// A `grp` group's byte code, inside the named track.
    TrackGroup(u32, u32),
}

impl Scope {
    const fn owning_track(self) -> u32 {
        match self {
            Self::Global => 0,
            Self::Track(t) | Self::TrackGroup(t, _) => t,
        }
    }
}

/// One `g` (`GroupJump`) call site, recorded so [`super::link`] can report
/// an unresolved target with its original line/column (the original
/// implementation's "late error reporting" line/col follow-on word).
#[derive(Debug, Clone, Copy)]
pub struct JumpSite {
    /// The track whose byte code the `Call` instruction lives in.
    pub home_track: u32,
    /// The group whose byte code it lives in, if not the track's top level.
    pub home_group: Option<u32>,
    /// The word offset of the `Call` instruction within that byte code.
    pub offset: usize,
    /// Where the `g` command was written.
    pub position: TextPosition,
}

/// The result of a complete, but not yet linked, compilation pass.
pub struct CompileOutput {
    /// Every declared track, sparse by index; index 0 is always the
    /// implicit global track.
    pub tracks: SparseSlots<CompiledTrack>,
    /// Every declared instrument, by stable index.
    pub instruments: SymbolTable<Instrument>,
    /// Every declared waveform, by stable index.
    pub waveforms: SymbolTable<Waveform>,
    /// Every declared sample, by stable index.
    pub samples: SymbolTable<Sample>,
    /// Every `g` command's `Call` site, for [`super::link`] to validate.
    pub jump_sites: Vec<JumpSite>,
    /// Non-fatal diagnostics accumulated while compiling.
    pub warnings: Vec<Warning>,
}

/// Walks a parsed score into per-track/per-group bytecode.
///
/// A `Compiler` can be reused across multiple compile passes: [`Self::reset`]
/// clears every table but re-reserves track 0, matching
/// `BKTKCompilerReset`.
pub struct Compiler {
    config: Config,
    tracks: SparseSlots<CompiledTrack>,
    instruments: SymbolTable<Instrument>,
    waveforms: SymbolTable<Waveform>,
    samples: SymbolTable<Sample>,
    jump_sites: Vec<JumpSite>,
    warnings: Vec<Warning>,
    last_line: Option<usize>,
}

impl Compiler {
    /// Creates a compiler with track 0 (the global track) already
    /// reserved.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let mut tracks = SparseSlots::new(config.max_tracks);
        let global = CompiledTrack::new(0, config.max_groups);
        let _ = tracks.insert(Some(0), TextPosition { line: 1, col: 1 }, global);
        Self {
            config,
            tracks,
            instruments: SymbolTable::new(),
            waveforms: SymbolTable::new(),
            samples: SymbolTable::new(),
            jump_sites: Vec::new(),
            warnings: Vec::new(),
            last_line: None,
        }
    }

    /// Resets this compiler to a fresh state, re-reserving track 0.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Compiles a full parse tree, consuming `self`.
    ///
    /// # Errors
    ///
    /// Returns the first fatal [`CompileError`] encountered; non-fatal
    /// diagnostics are instead collected into the returned
    /// [`CompileOutput::warnings`] (see `spec.md` §7's accumulate-but-fail-fast
    /// policy).
    pub fn compile(mut self, root: &Node) -> Result<CompileOutput, CompileError> {
        for child in root.children() {
            self.compile_top_level(child)?;
        }
        Ok(CompileOutput {
            tracks: self.tracks,
            instruments: self.instruments,
            waveforms: self.waveforms,
            samples: self.samples,
            jump_sites: self.jump_sites,
            warnings: self.warnings,
        })
    }

    fn compile_top_level(&mut self, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::Comment(_) => Ok(()),
            NodeKind::Group { name, .. } => match name.as_str() {
                "track" => self.compile_track_def(node),
                "instr" => self.compile_instrument_def(node),
                "samp" => self.compile_sample_def(node),
                "wave" => self.compile_waveform_def(node),
                "grp" => self.compile_group_def(0, node),
                other => Err(CompileError::UnexpectedCommand {
                    name: other.to_owned(),
                    position: node.position,
                }),
            },
            NodeKind::Command { .. } => self.compile_command(Scope::Global, node),
        }
    }

    fn compile_track_def(&mut self, node: &Node) -> Result<(), CompileError> {
        let index = parse_optional_index(node.args().first(), node.position)?;
        let mut track = CompiledTrack::new(
            builtin_waveform_id("sqr").expect("sqr is a built-in"),
            self.config.max_groups,
        );
        track.code.emit(&Instruction::Waveform {
            index: track.waveform,
            custom: false,
        });
        track.code.emit(&Instruction::RepeatStart);

        let track_idx = self.insert_track(index, node.position, track)?;
        for child in node.children() {
            self.compile_track_child(track_idx, child)?;
        }
        self.tracks
            .get_mut(track_idx)
            .expect("just inserted")
            .code
            .emit(&Instruction::End);
        Ok(())
    }

    fn insert_track(
        &mut self,
        index: Option<i64>,
        position: TextPosition,
        track: CompiledTrack,
    ) -> Result<u32, CompileError> {
        match self.tracks.insert(index, position, track) {
            Ok(idx) => Ok(idx),
            Err(InsertError::OutOfRange) => Err(CompileError::TrackIndexOutOfRange {
                index: index.unwrap_or(-1),
                max: self.config.max_tracks,
                position,
            }),
            Err(InsertError::AlreadyDefined(prior)) => Err(CompileError::Redefined {
                name: format!("track {}", index.unwrap_or(-1)),
                first_position: prior,
                new_position: position,
                same_autoindex: false,
            }),
        }
    }

    fn compile_track_child(&mut self, track_idx: u32, node: &Node) -> Result<(), CompileError> {
        match &node.kind {
            NodeKind::Comment(_) => Ok(()),
            NodeKind::Group { name, .. } if name == "grp" => {
                self.compile_group_def(track_idx, node)
            }
            NodeKind::Group { name, .. } => Err(CompileError::UnexpectedCommand {
                name: name.clone(),
                position: node.position,
            }),
            NodeKind::Command { .. } => self.compile_command(Scope::Track(track_idx), node),
        }
    }

    fn compile_group_def(&mut self, track_idx: u32, node: &Node) -> Result<(), CompileError> {
        let index = parse_optional_index(node.args().first(), node.position)?;
        let max = self.config.max_groups;
        let track = self
            .tracks
            .get_mut(track_idx)
            .expect("owning track exists");
        let group_idx = match track.groups.insert(index, node.position, CompiledGroup::default())
        {
            Ok(idx) => idx,
            Err(InsertError::OutOfRange) => {
                return Err(CompileError::GroupIndexOutOfRange {
                    index: index.unwrap_or(-1),
                    max,
                    position: node.position,
                })
            }
            Err(InsertError::AlreadyDefined(prior)) => {
                return Err(CompileError::Redefined {
                    name: format!("group {}", index.unwrap_or(-1)),
                    first_position: prior,
                    new_position: node.position,
                    same_autoindex: false,
                })
            }
        };
        for child in node.children() {
            self.compile_command(Scope::TrackGroup(track_idx, group_idx), child)?;
        }
        self.tracks
            .get_mut(track_idx)
            .expect("owning track exists")
            .groups
            .get_mut(group_idx)
            .expect("just inserted")
            .code
            .emit(&Instruction::Return);
        Ok(())
    }

    fn compile_instrument_def(&mut self, node: &Node) -> Result<(), CompileError> {
        let explicit_name = node.args().first().and_then(Arg::as_text);
        let mut instrument = Instrument::default();
        for child in node.children() {
            if matches!(child.kind, NodeKind::Comment(_)) {
                continue;
            }
            let (name, args) = command_name_args(child)?;
            let position = child.position;
            match name {
                "v" => {
                    instrument.volume =
                        parse_sequence(args, SequenceShape::Flat, scale_volume, position)?;
                }
                "a" => {
                    instrument.pitch =
                        parse_sequence(args, SequenceShape::Flat, scale_pitch, position)?;
                }
                "p" => {
                    instrument.panning =
                        parse_sequence(args, SequenceShape::Flat, scale_volume, position)?;
                }
                "dc" => {
                    instrument.duty_cycle =
                        parse_sequence(args, SequenceShape::Flat, |v| v, position)?;
                }
                "vnv" => {
                    instrument.volume =
                        parse_sequence(args, SequenceShape::Envelope, scale_volume, position)?;
                }
                "anv" => {
                    instrument.pitch =
                        parse_sequence(args, SequenceShape::Envelope, scale_pitch, position)?;
                }
                "pnv" => {
                    instrument.panning =
                        parse_sequence(args, SequenceShape::Envelope, scale_volume, position)?;
                }
                "dcnv" => {
                    instrument.duty_cycle =
                        parse_sequence(args, SequenceShape::Envelope, |v| v, position)?;
                }
                "adsr" => {
                    let attack = arg_int(args, 0, "adsr", position)?;
                    let decay = arg_int(args, 1, "adsr", position)?;
                    let sustain = arg_int(args, 2, "adsr", position)?;
                    let release = arg_int(args, 3, "adsr", position)?;
                    instrument.adsr = Some(Adsr {
                        attack,
                        decay,
                        sustain: sustain * config::VOLUME_UNIT,
                        release,
                    });
                }
                other => {
                    return Err(CompileError::UnexpectedCommand {
                        name: other.to_owned(),
                        position,
                    })
                }
            }
        }
        let (name, idx) = self
            .instruments
            .define(explicit_name, node.position, instrument)?;
        self.instruments.get_mut(idx).expect("just inserted").name = name;
        Ok(())
    }

    fn compile_waveform_def(&mut self, node: &Node) -> Result<(), CompileError> {
        let explicit_name = node.args().first().and_then(Arg::as_text);
        let mut waveform = Waveform::default();
        for child in node.children() {
            if matches!(child.kind, NodeKind::Comment(_)) {
                continue;
            }
            let (name, args) = command_name_args(child)?;
            let position = child.position;
            match name {
                "frm" => {
                    let mut frames = Vec::with_capacity(args.len());
                    for (i, _) in args.iter().enumerate() {
                        frames.push(arg_int(args, i, "frm", position)? * config::VOLUME_UNIT);
                    }
                    waveform.frames = frames;
                }
                "data" => {
                    let Some(Arg {
                        value: ArgValue::Data(bytes),
                        ..
                    }) = args.first()
                    else {
                        return Err(CompileError::MalformedSequence { position });
                    };
                    waveform.frames = bytes
                        .iter()
                        .map(|b| i32::from(*b as i8) * config::VOLUME_UNIT / 128)
                        .collect();
                }
                other => {
                    return Err(CompileError::UnexpectedCommand {
                        name: other.to_owned(),
                        position,
                    })
                }
            }
        }
        if !(2..=config::MAX_SEQ_LENGTH).contains(&waveform.frames.len()) {
            return Err(CompileError::ValueOutOfRange {
                command: "wave",
                value: waveform.frames.len() as i64,
                expected: "2..=64 frames",
                position: node.position,
            });
        }
        let (name, idx) = self
            .waveforms
            .define(explicit_name, node.position, waveform)?;
        self.waveforms.get_mut(idx).expect("just inserted").name = name;
        Ok(())
    }

    fn compile_sample_def(&mut self, node: &Node) -> Result<(), CompileError> {
        let explicit_name = node.args().first().and_then(Arg::as_text);
        let mut sample = Sample::default();
        for child in node.children() {
            if matches!(child.kind, NodeKind::Comment(_)) {
                continue;
            }
            let (name, args) = command_name_args(child)?;
            let position = child.position;
            match name {
                "load" => {
                    let kind = arg_text(args, 0, "load", position)?;
                    if kind != "wav" {
                        return Err(CompileError::UnexpectedCommand {
                            name: format!("load:{kind}"),
                            position,
                        });
                    }
                    let path = arg_text(args, 1, "load", position)?;
                    sample.path = Some(path.to_owned());
                }
                "data" => {
                    let format_text = arg_text(args, 0, "data", position)?;
                    sample.format = parse_data_format(format_text).ok_or_else(|| {
                        CompileError::UndefinedSymbol {
                            kind: "data format",
                            name: format_text.to_owned(),
                            position,
                        }
                    })?;
                    let Some(Arg {
                        value: ArgValue::Data(bytes),
                        ..
                    }) = args.get(1)
                    else {
                        return Err(CompileError::MalformedSequence { position });
                    };
                    sample.inline_data = Some(bytes.clone());
                }
                "pt" => {
                    sample.pitch = arg_int(args, 0, "pt", position)? * config::PITCH_UNIT;
                }
                "dr" => {
                    let mode_text = arg_text(args, 0, "dr", position)?;
                    sample.repeat = repeat_mode(mode_text).ok_or_else(|| {
                        CompileError::InvalidSampleRepeat {
                            mode: mode_text.to_owned(),
                            position,
                        }
                    })?;
                }
                "dn" => {
                    let (from, to) = parse_range(args, "dn", position)?;
                    sample.range = Some((from, to));
                }
                "ds" => {
                    let (from, to) = parse_range(args, "ds", position)?;
                    sample.sustain_range = Some((from, to));
                }
                other => {
                    return Err(CompileError::UnexpectedCommand {
                        name: other.to_owned(),
                        position,
                    })
                }
            }
        }
        let (name, idx) = self.samples.define(explicit_name, node.position, sample)?;
        self.samples.get_mut(idx).expect("just inserted").name = name;
        Ok(())
    }

    fn compile_command(&mut self, scope: Scope, node: &Node) -> Result<(), CompileError> {
        let (name, args) = match &node.kind {
            NodeKind::Comment(_) => return Ok(()),
            NodeKind::Group { name, .. } => {
                return Err(CompileError::UnexpectedCommand {
                    name: name.clone(),
                    position: node.position,
                })
            }
            NodeKind::Command { name, args } => (name.as_str(), args.as_slice()),
        };
        let position = node.position;
        let current_track = scope.owning_track();
        let instrs = self.compile_instruction(name, args, current_track, position)?;
        self.emit(scope, &instrs, position);
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn compile_instruction(
        &mut self,
        name: &str,
        args: &[Arg],
        current_track: u32,
        position: TextPosition,
    ) -> Result<Vec<Instruction>, CompileError> {
        Ok(match name {
            "a" => {
                if args.is_empty() {
                    return Err(CompileError::MissingArgument {
                        command: "a".into(),
                        expected: 1,
                        position,
                    });
                }
                let mut notes = Vec::with_capacity(args.len());
                for arg in args {
                    let text = arg
                        .as_text()
                        .ok_or(CompileError::MalformedSequence { position })?;
                    let (note, cents) = parse_note(text).ok_or(CompileError::ValueOutOfRange {
                        command: "a",
                        value: 0,
                        expected: "a note like c4 or d#3+56",
                        position,
                    })?;
                    notes.push(note * 100 + cents);
                }
                let mut out = vec![Instruction::Attack(notes[0])];
                if notes.len() > 1 {
                    let base = notes[0];
                    let deltas = notes[1..].iter().map(|n| n - base).collect();
                    out.push(Instruction::Arpeggio(deltas));
                }
                out
            }
            "r" => vec![Instruction::Release],
            "m" => vec![Instruction::Mute],
            "at" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "at", position)?);
                vec![Instruction::AttackTicks(n, d)]
            }
            "rt" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "rt", position)?);
                vec![Instruction::ReleaseTicks(n, d)]
            }
            "mt" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "mt", position)?);
                vec![Instruction::MuteTicks(n, d)]
            }
            "v" => {
                let v = arg_int(args, 0, "v", position)?;
                check_range("v", i64::from(v), 0, 255, position)?;
                vec![Instruction::Volume(v * config::VOLUME_UNIT)]
            }
            "vm" => {
                let v = arg_int(args, 0, "vm", position)?;
                check_range("vm", i64::from(v), 0, 255, position)?;
                vec![Instruction::MasterVolume(v * config::VOLUME_UNIT)]
            }
            "p" => {
                let v = arg_int(args, 0, "p", position)?;
                check_range("p", i64::from(v), -255, 255, position)?;
                vec![Instruction::Panning(v * config::VOLUME_UNIT)]
            }
            "pt" => vec![Instruction::Pitch(
                arg_int(args, 0, "pt", position)? * config::PITCH_UNIT,
            )],
            "pw" => {
                let v = arg_int(args, 0, "pw", position)?;
                check_range("pw", i64::from(v), 0, 1 << 20, position)?;
                vec![Instruction::PhaseWrap(v)]
            }
            "dc" => {
                let v = arg_int(args, 0, "dc", position)?;
                check_range("dc", i64::from(v), 1, config::MAX_DUTY_CYCLE, position)?;
                vec![Instruction::DutyCycle(v)]
            }
            "pk" => {
                let text = arg_text(args, 0, "pk", position)?;
                let id = pulse_kernel_id(text).ok_or(CompileError::UndefinedSymbol {
                    kind: "pulse kernel",
                    name: text.to_owned(),
                    position,
                })?;
                vec![Instruction::PulseKernel(id)]
            }
            "as" => vec![Instruction::ArpeggioSpeed(arg_int(args, 0, "as", position)?)],
            "e" => {
                let name_text = arg_text(args, 0, "e", position)?;
                let id = effect_id(name_text).ok_or(CompileError::UndefinedSymbol {
                    kind: "effect",
                    name: name_text.to_owned(),
                    position,
                })?;
                let rate = arg_int(args, 1, "e", position)?;
                let amp_raw = arg_int(args, 2, "e", position)?;
                let amp_scale = if id == EFFECT_PORTAMENTO || id == EFFECT_VIBRATO {
                    config::PITCH_UNIT
                } else {
                    config::VOLUME_UNIT
                };
                let depth = arg_int(args, 3, "e", position)?;
                vec![Instruction::Effect(id, [rate, amp_raw * amp_scale, depth])]
            }
            "s" => vec![Instruction::Step(arg_int(args, 0, "s", position)?)],
            "t" => vec![Instruction::Ticks(arg_int(args, 0, "t", position)?)],
            "st" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "st", position)?);
                vec![Instruction::StepTicks(n, d)]
            }
            "stt" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "stt", position)?);
                vec![Instruction::StepTicksTrack(n, d)]
            }
            "tr" => {
                let (n, d) = parse_ticks_fraction(arg_text(args, 0, "tr", position)?);
                vec![Instruction::TickRate(n, d)]
            }
            "i" => {
                let text = arg_text(args, 0, "i", position)?;
                let idx = self
                    .instruments
                    .resolve(text)
                    .ok_or(CompileError::UndefinedSymbol {
                        kind: "instrument",
                        name: text.to_owned(),
                        position,
                    })?;
                vec![Instruction::Instrument(idx as i32)]
            }
            "w" => {
                let text = arg_text(args, 0, "w", position)?;
                if let Some(id) = builtin_waveform_id(text) {
                    vec![Instruction::Waveform {
                        index: id,
                        custom: false,
                    }]
                } else {
                    let idx = self
                        .waveforms
                        .resolve(text)
                        .ok_or(CompileError::UndefinedSymbol {
                            kind: "waveform",
                            name: text.to_owned(),
                            position,
                        })?;
                    vec![Instruction::Waveform {
                        index: idx as i32,
                        custom: true,
                    }]
                }
            }
            "d" => {
                let text = arg_text(args, 0, "d", position)?;
                let idx = self
                    .samples
                    .resolve(text)
                    .ok_or(CompileError::UndefinedSymbol {
                        kind: "sample",
                        name: text.to_owned(),
                        position,
                    })?;
                vec![Instruction::Sample(idx as i32)]
            }
            "dn" => {
                let (from, to) = parse_range(args, "dn", position)?;
                vec![Instruction::SampleRange(from as i32, to as i32)]
            }
            "ds" => {
                let (from, to) = parse_range(args, "ds", position)?;
                vec![Instruction::SampleSustainRange(from as i32, to as i32)]
            }
            "dr" => {
                let text = arg_text(args, 0, "dr", position)?;
                let mode = repeat_mode(text).ok_or(CompileError::InvalidSampleRepeat {
                    mode: text.to_owned(),
                    position,
                })?;
                vec![Instruction::SampleRepeat(mode as i32)]
            }
            "g" => {
                let text = arg_text(args, 0, "g", position)?;
                let (scope_kind, idx1, idx2) =
                    parse_group_index(text).ok_or(CompileError::MalformedSequence { position })?;
                let target_track = match scope_kind {
                    GroupScope::Local => current_track,
                    GroupScope::Global => 0,
                    GroupScope::Track => idx2 as u32,
                };
                vec![Instruction::Call {
                    scope: scope_kind,
                    track: target_track as i32,
                    group: idx1,
                }]
            }
            "x" => vec![Instruction::Jump(-1)],
            "xb" => vec![Instruction::RepeatStart],
            "z" => vec![Instruction::End],
            other => {
                return Err(CompileError::UnexpectedCommand {
                    name: other.to_owned(),
                    position,
                })
            }
        })
    }

    fn code_for(&mut self, scope: Scope) -> &mut ByteCode {
        match scope {
            Scope::Global => &mut self.tracks.get_mut(0).expect("global track exists").code,
            Scope::Track(t) => &mut self.tracks.get_mut(t).expect("track exists").code,
            Scope::TrackGroup(t, g) => {
                &mut self
                    .tracks
                    .get_mut(t)
                    .expect("track exists")
                    .groups
                    .get_mut(g)
                    .expect("group exists")
                    .code
            }
        }
    }

    fn emit(&mut self, scope: Scope, instrs: &[Instruction], position: TextPosition) {
        if self.last_line != Some(position.line) {
            self.last_line = Some(position.line);
            self.code_for(scope)
                .emit(&Instruction::LineNo(position.line as i32));
        }
        let (home_track, home_group) = match scope {
            Scope::Global => (0, None),
            Scope::Track(t) => (t, None),
            Scope::TrackGroup(t, g) => (t, Some(g)),
        };
        for instr in instrs {
            let offset = self.code_for(scope).next_offset();
            self.code_for(scope).emit(instr);
            if matches!(instr, Instruction::Call { .. }) {
                self.jump_sites.push(JumpSite {
                    home_track,
                    home_group,
                    offset,
                    position,
                });
            }
        }
    }
}

fn scale_volume(v: i32) -> i32 {
    v * config::VOLUME_UNIT
}

fn scale_pitch(v: i32) -> i32 {
    v * config::PITCH_UNIT
}

fn command_name_args(node: &Node) -> Result<(&str, &[Arg]), CompileError> {
    match &node.kind {
        NodeKind::Command { name, args } => Ok((name.as_str(), args.as_slice())),
        NodeKind::Group { name, .. } => Err(CompileError::UnexpectedCommand {
            name: name.clone(),
            position: node.position,
        }),
        NodeKind::Comment(_) => unreachable!("comments are filtered out by callers"),
    }
}

fn parse_optional_index(
    arg: Option<&Arg>,
    position: TextPosition,
) -> Result<Option<i64>, CompileError> {
    match arg.and_then(Arg::as_text) {
        None => Ok(None),
        Some(text) => text
            .parse::<i64>()
            .map(Some)
            .map_err(|_| CompileError::MalformedSequence { position }),
    }
}

fn arg_text<'a>(
    args: &'a [Arg],
    index: usize,
    command: &str,
    position: TextPosition,
) -> Result<&'a str, CompileError> {
    args.get(index)
        .and_then(Arg::as_text)
        .ok_or_else(|| CompileError::MissingArgument {
            command: command.to_owned(),
            expected: index + 1,
            position,
        })
}

fn arg_int(
    args: &[Arg],
    index: usize,
    command: &str,
    position: TextPosition,
) -> Result<i32, CompileError> {
    let text = arg_text(args, index, command, position)?;
    text.parse().map_err(|_| CompileError::MalformedSequence { position })
}

fn parse_range(
    args: &[Arg],
    command: &'static str,
    position: TextPosition,
) -> Result<(i32, i32), CompileError> {
    let from = arg_int(args, 0, command, position)?;
    let to = arg_int(args, 1, command, position)?;
    if to < from {
        return Err(CompileError::InvalidRange {
            from: i64::from(from),
            to: i64::from(to),
            position,
        });
    }
    Ok((from, to))
}

fn check_range(
    command: &'static str,
    value: i64,
    min: i64,
    max: i64,
    position: TextPosition,
) -> Result<(), CompileError> {
    if value < min || value > max {
        return Err(CompileError::ValueOutOfRange {
            command,
            value,
            expected: "within the command's documented domain",
            position,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;
    use crate::parse::parse;

    fn compile_source(source: &str) -> CompileOutput {
        let tokens = tokenize(source).expect("tokenize should succeed").tokens;
        let tree = parse(&tokens).expect("parse should succeed").tree;
        Compiler::new(Config::default())
            .compile(&tree)
            .expect("compile should succeed")
    }

    #[test]
    fn simple_global_track_sequence() {
        let out = compile_source("v:128;a:c4;s:4;r");
        let track0 = out.tracks.get(0).expect("global track");
        let decoded = decode_all(&track0.code.0);
        assert_eq!(decoded[0], Instruction::LineNo(1));
        assert!(decoded.contains(&Instruction::Volume(128 * config::VOLUME_UNIT)));
        assert!(decoded.contains(&Instruction::Release));
    }

    #[test]
    fn attack_with_chord_emits_arpeggio() {
        let out = compile_source("a:c4:e4:g4");
        let track0 = out.tracks.get(0).expect("global track");
        let decoded = decode_all(&track0.code.0);
        assert!(decoded
            .iter()
            .any(|i| matches!(i, Instruction::Arpeggio(deltas) if deltas.len() == 2)));
    }

    #[test]
    fn instrument_volume_sequence_scales_and_tracks_repeat() {
        let out = compile_source("[instr:vol; v:255:<:0:>:0]");
        let idx = out.instruments.resolve("vol").unwrap();
        let instrument = out.instruments.get(idx).unwrap();
        assert_eq!(
            instrument.volume.values,
            vec![255 * config::VOLUME_UNIT, 0, 0]
        );
        assert_eq!(instrument.volume.repeat_begin, 1);
        assert_eq!(instrument.volume.repeat_len, 1);
    }

    #[test]
    fn group_def_and_jump_resolve_to_same_track() {
        let out = compile_source("[track; [grp:0; a:c4;s:1;x]; g:0]");
        let track1 = out.tracks.get(1).expect("first user track gets index 1");
        let group0 = track1.groups.get(0).expect("group 0");
        let decoded = decode_all(&group0.code.0);
        assert!(matches!(decoded.last(), Some(Instruction::Return)));
        assert_eq!(out.jump_sites.len(), 1);
        assert_eq!(out.jump_sites[0].home_track, 1);
    }

    #[test]
    fn undefined_instrument_reference_errors() {
        let tokens = tokenize("i:lead").unwrap().tokens;
        let tree = parse(&tokens).unwrap().tree;
        let err = Compiler::new(Config::default()).compile(&tree).unwrap_err();
        assert!(matches!(err, CompileError::UndefinedSymbol { .. }));
    }

    #[test]
    fn out_of_range_volume_errors() {
        let tokens = tokenize("v:999").unwrap().tokens;
        let tree = parse(&tokens).unwrap().tree;
        let err = Compiler::new(Config::default()).compile(&tree).unwrap_err();
        assert!(matches!(err, CompileError::ValueOutOfRange { .. }));
    }

    fn decode_all(words: &[u32]) -> Vec<Instruction> {
        let mut out = Vec::new();
        let mut offset = 0;
        while offset < words.len() {
            let (instr, len) = Instruction::decode(&words[offset..]);
            out.push(instr);
            offset += len;
        }
        out
    }
}
