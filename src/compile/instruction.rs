//! The 32-bit packed instruction set emitted by the [compiler](crate::compile)
//! and executed by the [interpreter](crate::interpret).
//!
//! Opcode numbers match `BKInstruction` in the original implementation
//! exactly, so a compiled [`ByteCode`] buffer is byte-for-byte compatible
//! with the original wire format. Source-level dispatch keywords that never
//! reach a byte buffer (`instr`, `samp`, `wave`, `track`, `grp` definition
//! headers) are not represented here — see [`crate::compile::command`].

/// Which track a [`Instruction::Call`] resolves its target against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupScope {
    /// A group local to the calling track.
    Local,
    /// A group on the global track (track 0).
    Global,
    /// A group on an explicitly named track.
    Track,
}

impl GroupScope {
    const fn to_bits(self) -> u32 {
        match self {
            Self::Local => 0,
            Self::Global => 1,
            Self::Track => 2,
        }
    }

    const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Global,
            2 => Self::Track,
            _ => Self::Local,
        }
    }
}

/// One decoded 32-bit instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Instruction {
    /// No-op; never emitted by the compiler, only used as a decode
    /// fallback.
    Noop,
    /// Sets the pending arpeggio deltas for the next `Attack`. `deltas` are
    /// signed semitone*100+cents offsets from the base note.
    Arpeggio(Vec<i32>),
    /// Sets the arpeggio step rate, in ticks per note.
    ArpeggioSpeed(i32),
    /// Arms a deferred note-on event; `note` is `semitone*100+cents`.
    Attack(i32),
    /// Sets the delay, as a `num/den` fraction of a step (or absolute
    /// ticks when `den == 0`), before the next `Attack` fires.
    AttackTicks(i32, i32),
    /// Calls into a resolved group's byte code.
    Call {
        /// Which track the target group belongs to.
        scope: GroupScope,
        /// The calling/target track index (meaning depends on `scope`).
        track: i32,
        /// The target group index.
        group: i32,
    },
    /// Sets the oscillator duty cycle (`1..=16`).
    DutyCycle(i32),
    /// Applies a named effect; the 3 follow-on words are its parameters.
    Effect(i32, [i32; 3]),
    /// Terminates a track; stops the VM forever (see `advance` semantics).
    End,
    /// Selects an instrument by resolved index.
    Instrument(i32),
    /// Unconditional jump to a byte offset relative to the track's byte
    /// code start. Only `-1` (repeat-mark jump) is supported; see
    /// `DESIGN.md`.
    Jump(i32),
    /// Sets the master volume.
    MasterVolume(i32),
    /// Releases the currently playing note.
    Mute,
    /// Sets the delay before the next `Mute`.
    MuteTicks(i32, i32),
    /// Sets stereo panning (`-255..=255`, pre-scaled).
    Panning(i32),
    /// Sets the phase-wrap point.
    PhaseWrap(i32),
    /// Sets raw pitch offset in cents.
    Pitch(i32),
    /// Releases the currently playing note with envelope release applied.
    Release,
    /// Sets the delay before the next `Release`.
    ReleaseTicks(i32, i32),
    /// Marks the current byte offset as the repeat-start target.
    RepeatStart,
    /// Returns from a `Call`.
    Return,
    /// Selects a sample by resolved index.
    Sample(i32),
    /// Sets the playable range of the current sample; 2 follow-on words
    /// hold `from`/`to`.
    SampleRange(i32, i32),
    /// Sets the sample repeat mode (`0` = none, `1` = repeat, `2` = ping-pong).
    SampleRepeat(i32),
    /// Sets the sustain range of the current sample; 2 follow-on words
    /// hold `from`/`to`.
    SampleSustainRange(i32, i32),
    /// Advances by `n` steps (default step = `step_ticks` ticks).
    Step(i32),
    /// Sets the global default step length, as a `num/den` fraction of a
    /// second (or absolute ticks when `den == 0`).
    StepTicks(i32, i32),
    /// Sets the current track's step length, overriding the global default.
    StepTicksTrack(i32, i32),
    /// Sets the master clock period, as `num/den` seconds.
    TickRate(i32, i32),
    /// Advances by `n` raw ticks.
    Ticks(i32),
    /// Sets the playback volume.
    Volume(i32),
    /// Selects a waveform; `custom` distinguishes a user waveform index
    /// from the built-in enum (`sqr`/`tri`/`noi`/`saw`/`sin`).
    Waveform { index: i32, custom: bool },
    /// Records that the currently executing source line has changed, for
    /// timing-trace output and diagnostics.
    LineNo(i32),
    /// Selects an oscillator sampling kernel.
    PulseKernel(i32),
}

const OP_NOOP: u32 = 0;
const OP_ARPEGGIO: u32 = 1;
const OP_ARPEGGIO_SPEED: u32 = 2;
const OP_ATTACK: u32 = 3;
const OP_ATTACK_TICKS: u32 = 4;
const OP_CALL: u32 = 5;
const OP_DUTY_CYCLE: u32 = 6;
const OP_EFFECT: u32 = 7;
const OP_END: u32 = 8;
const OP_INSTRUMENT: u32 = 11;
const OP_JUMP: u32 = 13;
const OP_MASTER_VOLUME: u32 = 14;
const OP_MUTE: u32 = 15;
const OP_MUTE_TICKS: u32 = 16;
const OP_PANNING: u32 = 17;
const OP_PHASE_WRAP: u32 = 18;
const OP_PITCH: u32 = 19;
const OP_RELEASE: u32 = 20;
const OP_RELEASE_TICKS: u32 = 21;
const OP_REPEAT_START: u32 = 23;
const OP_RETURN: u32 = 24;
const OP_SAMPLE: u32 = 25;
const OP_SAMPLE_RANGE: u32 = 27;
const OP_SAMPLE_REPEAT: u32 = 28;
const OP_SAMPLE_SUSTAIN_RANGE: u32 = 29;
const OP_STEP: u32 = 30;
const OP_STEP_TICKS: u32 = 31;
const OP_STEP_TICKS_TRACK: u32 = 32;
const OP_TICK_RATE: u32 = 33;
const OP_TICKS: u32 = 34;
const OP_VOLUME: u32 = 36;
const OP_WAVEFORM: u32 = 37;
const OP_LINE_NO: u32 = 39;
const OP_PULSE_KERNEL: u32 = 40;

const CUSTOM_WAVEFORM_FLAG: i32 = 1 << 24;

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn pack_arg1(cmd: u32, arg1: i32) -> u32 {
    (cmd & 0x3F) | ((arg1 as u32 & 0x03FF_FFFF) << 6)
}

fn unpack_arg1(word: u32) -> i32 {
    sign_extend(word >> 6, 26)
}

fn pack_arg2(cmd: u32, arg1: i32, arg2: i32) -> u32 {
    (cmd & 0x3F) | ((arg1 as u32 & 0x1FFF) << 6) | ((arg2 as u32 & 0x1FFF) << 19)
}

fn unpack_arg2(word: u32) -> (i32, i32) {
    (sign_extend(word >> 6, 13), sign_extend(word >> 19, 13))
}

fn pack_grp(cmd: u32, scope: GroupScope, idx1: i32, idx2: i32) -> u32 {
    (cmd & 0x3F)
        | (scope.to_bits() << 6)
        | ((idx1 as u32 & 0x0FFF) << 8)
        | ((idx2 as u32 & 0x0FFF) << 20)
}

fn unpack_grp(word: u32) -> (GroupScope, i32, i32) {
    let scope = GroupScope::from_bits((word >> 6) & 0x3);
    (scope, sign_extend(word >> 8, 12), sign_extend(word >> 20, 12))
}

fn opcode_of(word: u32) -> u32 {
    word & 0x3F
}

impl Instruction {
    /// Encodes this instruction as its primary word followed by any
    /// follow-on operand words.
    #[must_use]
    pub fn encode(&self) -> Vec<u32> {
        match self {
            Self::Noop => vec![pack_arg1(OP_NOOP, 0)],
            Self::Arpeggio(deltas) => {
                let mut words = vec![pack_arg1(OP_ARPEGGIO, deltas.len() as i32)];
                words.extend(deltas.iter().map(|d| pack_arg1(0, *d)));
                words
            }
            Self::ArpeggioSpeed(v) => vec![pack_arg1(OP_ARPEGGIO_SPEED, *v)],
            Self::Attack(note) => vec![pack_arg1(OP_ATTACK, *note)],
            Self::AttackTicks(n, d) => vec![pack_arg2(OP_ATTACK_TICKS, *n, *d)],
            Self::Call {
                scope,
                track,
                group,
            } => vec![pack_grp(OP_CALL, *scope, *track, *group)],
            Self::DutyCycle(v) => vec![pack_arg1(OP_DUTY_CYCLE, *v)],
            Self::Effect(id, params) => {
                let mut words = vec![pack_arg1(OP_EFFECT, *id)];
                words.extend(params.iter().map(|p| pack_arg1(0, *p)));
                words
            }
            Self::End => vec![pack_arg1(OP_END, 0)],
            Self::Instrument(i) => vec![pack_arg1(OP_INSTRUMENT, *i)],
            Self::Jump(offset) => vec![pack_arg1(OP_JUMP, *offset)],
            Self::MasterVolume(v) => vec![pack_arg1(OP_MASTER_VOLUME, *v)],
            Self::Mute => vec![pack_arg1(OP_MUTE, 0)],
            Self::MuteTicks(n, d) => vec![pack_arg2(OP_MUTE_TICKS, *n, *d)],
            Self::Panning(v) => vec![pack_arg1(OP_PANNING, *v)],
            Self::PhaseWrap(v) => vec![pack_arg1(OP_PHASE_WRAP, *v)],
            Self::Pitch(v) => vec![pack_arg1(OP_PITCH, *v)],
            Self::Release => vec![pack_arg1(OP_RELEASE, 0)],
            Self::ReleaseTicks(n, d) => vec![pack_arg2(OP_RELEASE_TICKS, *n, *d)],
            Self::RepeatStart => vec![pack_arg1(OP_REPEAT_START, 0)],
            Self::Return => vec![pack_arg1(OP_RETURN, 0)],
            Self::Sample(i) => vec![pack_arg1(OP_SAMPLE, *i)],
            Self::SampleRange(from, to) => {
                vec![pack_arg1(OP_SAMPLE_RANGE, 0), pack_arg1(0, *from), pack_arg1(0, *to)]
            }
            Self::SampleRepeat(mode) => vec![pack_arg1(OP_SAMPLE_REPEAT, *mode)],
            Self::SampleSustainRange(from, to) => vec![
                pack_arg1(OP_SAMPLE_SUSTAIN_RANGE, 0),
                pack_arg1(0, *from),
                pack_arg1(0, *to),
            ],
            Self::Step(n) => vec![pack_arg1(OP_STEP, *n)],
            Self::StepTicks(n, d) => vec![pack_arg2(OP_STEP_TICKS, *n, *d)],
            Self::StepTicksTrack(n, d) => vec![pack_arg2(OP_STEP_TICKS_TRACK, *n, *d)],
            Self::TickRate(n, d) => vec![pack_arg2(OP_TICK_RATE, *n, *d)],
            Self::Ticks(n) => vec![pack_arg1(OP_TICKS, *n)],
            Self::Volume(v) => vec![pack_arg1(OP_VOLUME, *v)],
            Self::Waveform { index, custom } => {
                let encoded = if *custom {
                    index | CUSTOM_WAVEFORM_FLAG
                } else {
                    *index
                };
                vec![pack_arg1(OP_WAVEFORM, encoded)]
            }
            Self::LineNo(line) => vec![pack_arg1(OP_LINE_NO, *line)],
            Self::PulseKernel(id) => vec![pack_arg1(OP_PULSE_KERNEL, *id)],
        }
    }

    /// Decodes one instruction starting at `words[0]`, returning it and
    /// the number of 32-bit words it occupies.
    ///
    /// # Panics
    ///
    /// Panics if a multi-word instruction's follow-on words are missing;
    /// this indicates a corrupt byte buffer, which compile-time validation
    /// guarantees cannot happen for code this compiler produced (see
    /// `SPEC_FULL.md` §7).
    #[must_use]
    pub fn decode(words: &[u32]) -> (Self, usize) {
        let word = words[0];
        match opcode_of(word) {
            OP_NOOP => (Self::Noop, 1),
            OP_ARPEGGIO => {
                let count = unpack_arg1(word) as usize;
                let deltas = words[1..=count].iter().map(|w| unpack_arg1(*w)).collect();
                (Self::Arpeggio(deltas), 1 + count)
            }
            OP_ARPEGGIO_SPEED => (Self::ArpeggioSpeed(unpack_arg1(word)), 1),
            OP_ATTACK => (Self::Attack(unpack_arg1(word)), 1),
            OP_ATTACK_TICKS => {
                let (n, d) = unpack_arg2(word);
                (Self::AttackTicks(n, d), 1)
            }
            OP_CALL => {
                let (scope, track, group) = unpack_grp(word);
                (
                    Self::Call {
                        scope,
                        track,
                        group,
                    },
                    1,
                )
            }
            OP_DUTY_CYCLE => (Self::DutyCycle(unpack_arg1(word)), 1),
            OP_EFFECT => {
                let id = unpack_arg1(word);
                let params = [
                    unpack_arg1(words[1]),
                    unpack_arg1(words[2]),
                    unpack_arg1(words[3]),
                ];
                (Self::Effect(id, params), 4)
            }
            OP_END => (Self::End, 1),
            OP_INSTRUMENT => (Self::Instrument(unpack_arg1(word)), 1),
            OP_JUMP => (Self::Jump(unpack_arg1(word)), 1),
            OP_MASTER_VOLUME => (Self::MasterVolume(unpack_arg1(word)), 1),
            OP_MUTE => (Self::Mute, 1),
            OP_MUTE_TICKS => {
                let (n, d) = unpack_arg2(word);
                (Self::MuteTicks(n, d), 1)
            }
            OP_PANNING => (Self::Panning(unpack_arg1(word)), 1),
            OP_PHASE_WRAP => (Self::PhaseWrap(unpack_arg1(word)), 1),
            OP_PITCH => (Self::Pitch(unpack_arg1(word)), 1),
            OP_RELEASE => (Self::Release, 1),
            OP_RELEASE_TICKS => {
                let (n, d) = unpack_arg2(word);
                (Self::ReleaseTicks(n, d), 1)
            }
            OP_REPEAT_START => (Self::RepeatStart, 1),
            OP_RETURN => (Self::Return, 1),
            OP_SAMPLE => (Self::Sample(unpack_arg1(word)), 1),
            OP_SAMPLE_RANGE => (
                Self::SampleRange(unpack_arg1(words[1]), unpack_arg1(words[2])),
                3,
            ),
            OP_SAMPLE_REPEAT => (Self::SampleRepeat(unpack_arg1(word)), 1),
            OP_SAMPLE_SUSTAIN_RANGE => (
                Self::SampleSustainRange(unpack_arg1(words[1]), unpack_arg1(words[2])),
                3,
            ),
            OP_STEP => (Self::Step(unpack_arg1(word)), 1),
            OP_STEP_TICKS => {
                let (n, d) = unpack_arg2(word);
                (Self::StepTicks(n, d), 1)
            }
            OP_STEP_TICKS_TRACK => {
                let (n, d) = unpack_arg2(word);
                (Self::StepTicksTrack(n, d), 1)
            }
            OP_TICK_RATE => {
                let (n, d) = unpack_arg2(word);
                (Self::TickRate(n, d), 1)
            }
            OP_TICKS => (Self::Ticks(unpack_arg1(word)), 1),
            OP_VOLUME => (Self::Volume(unpack_arg1(word)), 1),
            OP_WAVEFORM => {
                let raw = unpack_arg1(word);
                let custom = raw & CUSTOM_WAVEFORM_FLAG != 0;
                (
                    Self::Waveform {
                        index: raw & !CUSTOM_WAVEFORM_FLAG,
                        custom,
                    },
                    1,
                )
            }
            OP_LINE_NO => (Self::LineNo(unpack_arg1(word)), 1),
            OP_PULSE_KERNEL => (Self::PulseKernel(unpack_arg1(word)), 1),
            _ => (Self::Noop, 1),
        }
    }
}

/// An append-only sequence of packed instruction words.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteCode(pub Vec<u32>);

impl ByteCode {
    /// Appends `instr`'s encoded words, returning the byte offset (in
    /// words) it was written at.
    pub fn emit(&mut self, instr: &Instruction) -> usize {
        let offset = self.0.len();
        self.0.extend(instr.encode());
        offset
    }

    /// The current length, used as the offset of the next emitted
    /// instruction.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg1_roundtrips() {
        let instr = Instruction::Attack(401_23);
        let words = instr.encode();
        let (decoded, len) = Instruction::decode(&words);
        assert_eq!(len, 1);
        assert_eq!(decoded, instr);
    }

    #[test]
    fn arg2_roundtrips_negative() {
        let instr = Instruction::AttackTicks(-3, 4);
        let words = instr.encode();
        let (decoded, _) = Instruction::decode(&words);
        assert_eq!(decoded, instr);
    }

    #[test]
    fn call_mask_roundtrips() {
        let instr = Instruction::Call {
            scope: GroupScope::Track,
            track: 3,
            group: -7,
        };
        let words = instr.encode();
        let (decoded, len) = Instruction::decode(&words);
        assert_eq!(len, 1);
        assert_eq!(decoded, instr);
    }

    #[test]
    fn multi_word_arpeggio_roundtrips() {
        let instr = Instruction::Arpeggio(vec![100, -50, 25]);
        let words = instr.encode();
        assert_eq!(words.len(), 4);
        let (decoded, len) = Instruction::decode(&words);
        assert_eq!(len, 4);
        assert_eq!(decoded, instr);
    }

    #[test]
    fn waveform_custom_flag_roundtrips() {
        let instr = Instruction::Waveform {
            index: 5,
            custom: true,
        };
        let words = instr.encode();
        let (decoded, _) = Instruction::decode(&words);
        assert_eq!(decoded, instr);
    }
}
