//! The six concrete seed scenarios from `spec.md` §8, exercised end to
//! end through the public API. Where a scenario's literal source text is
//! ambiguous against the sequence grammar actually specified in §4.3 (see
//! `DESIGN.md` and the note in `src/compile/sequence.rs`'s own tests),
//! this file tests the same underlying behavior with unambiguous source.

use chiptune_score::compile::instruction::{GroupScope, Instruction};
use chiptune_score::config::Config;
use chiptune_score::context::{
    ClockSink, LoadedSample, NoteCommand, SampleSource, SynthSink, WaveformSetting,
};
use chiptune_score::{Context, Score};
use gametime::TimeSpan;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingSink {
    notes: Vec<NoteCommand>,
    volumes: Vec<i32>,
    effects: Vec<(i32, [i32; 3])>,
    clock_periods: Vec<TimeSpan>,
}

impl SynthSink for RecordingSink {
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
    fn set_instrument(&mut self, _instrument: Option<&chiptune_score::compile::model::Instrument>) {}
    fn set_sample(&mut self, _sample: Option<&chiptune_score::compile::model::Sample>) {}
    fn set_sample_repeat_mode(&mut self, _mode: chiptune_score::compile::model::SampleRepeatMode) {}
    fn set_sample_range(&mut self, _from: i32, _to: i32) {}
    fn set_sample_sustain_range(&mut self, _from: i32, _to: i32) {}
    fn set_effect(&mut self, id: i32, params: [i32; 3]) {
        self.effects.push((id, params));
    }
    fn set_arpeggio(&mut self, _deltas: &[i32]) {}
    fn set_pulse_kernel(&mut self, _id: i32) {}
}

impl ClockSink for RecordingSink {
    fn set_clock_period(&mut self, period: TimeSpan) {
        self.clock_periods.push(period);
    }
}

struct NullSampleSource;

impl SampleSource for NullSampleSource {
    fn load(&self, _path: &str) -> Result<Vec<i16>, String> {
        Ok(vec![0; 4])
    }
}

fn build_context(source: &str) -> Context<RecordingSink, RecordingSink> {
    let outcome = Score::compile_str(source);
    assert!(outcome.errors.is_empty(), "unexpected errors: {:?}", outcome.errors);
    let score = outcome.score.expect("no errors means a score");
    Context::new(score.output, Config::default(), &NullSampleSource, RecordingSink::default())
        .expect("sample loads never fail for this source")
}

/// Scenario 1: `v:128;a:c4;s:4;r` on an empty track plays a note, holds
/// for 4 steps (96 ticks at the default 24-tick step), then releases.
#[test]
fn scenario_1_volume_attack_step_release() {
    let mut ctx = build_context("v:128;a:c4;s:4;r");
    ctx.attach(0, RecordingSink::default()).unwrap();

    // First advance: Volume + immediate Attack execute, then Step(4) arms
    // and yields control; the divider should request 4*24=96 ticks.
    let ticks = ctx.advance_track(0);
    assert_eq!(ticks, 96);

    // Drive past the step boundary; Release should now have fired.
    ctx.advance_track(0);

    // The compiled instruction stream carries the exact events the
    // interpreter drove the sink through above.
    let tokens = chiptune_score::lex::tokenize("v:128;a:c4;s:4;r").unwrap().tokens;
    let tree = chiptune_score::parse::parse(&tokens).unwrap().tree;
    let output = chiptune_score::compile::Compiler::new(Config::default())
        .compile(&tree)
        .unwrap();
    let words = &output.tracks.get(0).unwrap().code.0;
    let mut offset = 0;
    let mut decoded = Vec::new();
    while offset < words.len() {
        let (instr, len) = Instruction::decode(&words[offset..]);
        decoded.push(instr);
        offset += len;
    }
    assert!(decoded.iter().any(|i| matches!(i, Instruction::Volume(_))));
    assert!(decoded.iter().any(|i| matches!(i, Instruction::Attack(note) if *note == 48 * 100)));
    assert!(decoded.iter().any(|i| matches!(i, Instruction::Step(4))));
    assert!(decoded.iter().any(|i| matches!(i, Instruction::Release)));
}

/// Scenario 2 (restated unambiguously against the bracketed-repeat
/// sequence grammar in §4.3): an instrument's flat `v` sequence with an
/// explicit `<...>` repeat region compiles to the matching `Sequence`.
#[test]
fn scenario_2_instrument_volume_sequence_with_repeat_region() {
    let outcome = Score::compile_str("[instr vol; v:255:<:0:0:>]");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let score = outcome.score.unwrap();
    let instrument = score.output.instruments.get(0).expect("one instrument defined");
    assert_eq!(instrument.name, "vol");
    assert_eq!(
        instrument.volume.values,
        vec![255 * chiptune_score::config::VOLUME_UNIT, 0, 0]
    );
    assert_eq!(instrument.volume.repeat_begin, 1);
    assert_eq!(instrument.volume.repeat_len, 2);
}

/// Scenario 3: a `grp` subroutine playing a note then looping via `x`,
/// called from the track's top level via `g`.
#[test]
fn scenario_3_group_call_resolves_to_the_groups_byte_offset() {
    let outcome = Score::compile_str("[grp:0; a:c4;s:1;x]\ng:0");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let score = outcome.score.unwrap();
    let global = score.output.tracks.get(0).unwrap();
    let group0 = global.groups.get(0).expect("group 0 defined");
    assert!(matches!(
        Instruction::decode(&group0.code.0).0,
        Instruction::Attack(_)
    ));

    let mut ctx = Context::new(
        score.output,
        Config::default(),
        &NullSampleSource,
        RecordingSink::default(),
    )
    .unwrap();
    ctx.attach(0, RecordingSink::default()).unwrap();
    // Drive several rounds; the Call into group 0 and the repeat-mark
    // jump back to its head must not panic or stall forever.
    for _ in 0..20 {
        let ticks = ctx.advance_track(0);
        assert!(ticks > 0);
    }
}

/// Scenario 4: `e:vb:6:50:0` compiles to `Effect(VIBRATO)` with its three
/// follow-on parameter words.
#[test]
fn scenario_4_vibrato_effect_compiles_with_params() {
    use chiptune_score::compile::command::effect_id;

    let outcome = Score::compile_str("e:vb:6:50:0");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let score = outcome.score.unwrap();
    let words = &score.output.tracks.get(0).unwrap().code.0;
    let vibrato_id = effect_id("vb").expect("vb is a known effect");
    let found = (0..words.len()).find_map(|i| {
        if let (Instruction::Effect(id, params), _) = Instruction::decode(&words[i..]) {
            (id == vibrato_id).then_some(params)
        } else {
            None
        }
    });
    assert_eq!(found, Some([6, 50, 0]));
}

/// Scenario 5: a `samp` group with `load:wav` resolves its path through
/// the caller-supplied `SampleSource` at `Context` construction, and `pt`
/// sets its pitch offset.
#[test]
fn scenario_5_sample_load_wav_resolves_at_context_construction() {
    let outcome = Score::compile_str(r#"[samp s1; load:wav:"kick.wav"; pt:100]"#);
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let score = outcome.score.unwrap();
    assert_eq!(score.output.samples.get(0).unwrap().name, "s1");
    assert_eq!(score.output.samples.get(0).unwrap().path.as_deref(), Some("kick.wav"));

    let ctx = Context::new(
        score.output,
        Config::default(),
        &NullSampleSource,
        RecordingSink::default(),
    )
    .expect("NullSampleSource always succeeds");
    let sample: &LoadedSample = ctx.sample(0).expect("sample 0 resolved");
    assert_eq!(sample.sample.pitch, 100 * chiptune_score::config::PITCH_UNIT);
    assert_eq!(sample.frames.as_deref(), Some([0_i16, 0, 0, 0].as_slice()));
}

/// Scenario 6: `g:0g` from inside a track resolves against track 0's
/// (the global track's) groups; if the target is missing, the link error
/// names it as a global group.
#[test]
fn scenario_6_unresolved_global_group_jump_is_reported_by_name() {
    let outcome = Score::compile_str("[track; g:0g]");
    assert!(outcome.score.is_none());
    let message = outcome.errors[0].to_string();
    assert!(message.contains("global group"));
    assert!(message.contains('0'));
}

/// The same scenario's happy path: a global group defined on track 0
/// resolves cleanly from inside another track.
#[test]
fn scenario_6_resolved_global_group_jump_from_a_track() {
    let outcome = Score::compile_str("[grp:0; a:c4; s:1; x]\n[track; g:0g]");
    assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
    let score = outcome.score.unwrap();
    let track = score.output.tracks.get(1).expect("user track declared");
    let words = &track.code.0;
    let has_global_call = (0..words.len()).any(|i| {
        matches!(
            Instruction::decode(&words[i..]).0,
            Instruction::Call {
                scope: GroupScope::Global,
                group: 0,
                ..
            }
        )
    });
    assert!(has_global_call);
}
