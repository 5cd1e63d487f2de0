//! Name lookup tables and small textual sub-grammars used by the compiler.
//!
//! Grounded on the `keyval` tables and `parse*` helpers near the top of
//! `original_source/parser/BKTKCompiler.c` (`noteNames`, `effectNames`,
//! `waveformNames`, `repeatNames`, `pulseNames`, `parseNote`,
//! `parseTicksFormat`, `parseGroupIndex`, `parseDataParams`).

use crate::compile::instruction::GroupScope;
use crate::compile::model::{DataFormat, SampleRepeatMode};
use crate::config;

/// Resolves a note name's semitone offset (`c` = 0 .. `b`/`h` = 11).
fn note_semitone(letters: &str) -> Option<i32> {
    Some(match letters {
        "c" => 0,
        "c#" => 1,
        "d" => 2,
        "d#" => 3,
        "e" => 4,
        "f" => 5,
        "f#" => 6,
        "g" => 7,
        "g#" => 8,
        "a" => 9,
        "a#" => 10,
        "b" | "h" => 11,
        _ => return None,
    })
}

/// Parses a note in the `<letters><octave>[+-<cents>]` format (e.g. `c#3`,
/// `e2+56`, `a#2-26`), returning `semitone + octave*12` (clamped) and an
/// explicit cents offset.
///
/// Mirrors `parseNote`: the letter run is at most two ASCII characters
/// drawn from `a-z#`, followed by a signed octave, followed by an optional
/// signed cents offset.
#[must_use]
pub fn parse_note(text: &str) -> Option<(i32, i32)> {
    let letters_len = text
        .char_indices()
        .take(2)
        .take_while(|(_, c)| c.is_ascii_lowercase() || *c == '#')
        .count();
    if letters_len == 0 {
        return None;
    }
    let (letters, rest) = text.split_at(
        text.char_indices()
            .nth(letters_len)
            .map_or(text.len(), |(i, _)| i),
    );
    let semitone = note_semitone(letters)?;
    if rest.is_empty() {
        return None;
    }
    let split_at_sign = rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i);
    let (octave_text, cents_text) = match split_at_sign {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let octave: i32 = octave_text.parse().ok()?;
    let cents: i32 = if cents_text.is_empty() {
        0
    } else {
        cents_text.parse().ok()?
    };
    let value = (semitone + octave * 12).clamp(config::MIN_NOTE, config::MAX_NOTE);
    Some((value, cents))
}

/// Parses a `n[/d]` ticks/fraction argument, mirroring `parseTicksFormat`:
/// absent or unparsable input yields `(0, 0)` (meaning "use the default"),
/// otherwise both parts are clamped to `1..=4096`.
#[must_use]
pub fn parse_ticks_fraction(text: &str) -> (i32, i32) {
    let mut parts = text.splitn(2, '/');
    let Some(num_text) = parts.next() else {
        return (0, 0);
    };
    let Ok(num) = num_text.parse::<i32>() else {
        return (0, 0);
    };
    let den = parts
        .next()
        .and_then(|d| d.parse::<i32>().ok())
        .unwrap_or(1);
    if parts.next().is_some() {
        return (0, 0);
    }
    (num.clamp(1, 1 << 12), den.clamp(1, 1 << 12))
}

/// The group-jump target of a `g` command: `idx`, `idx` followed by `g`
/// (global) or `idx` followed by `t<idx2>` (explicit track), mirroring
/// `parseGroupIndex`.
#[must_use]
pub fn parse_group_index(text: &str) -> Option<(GroupScope, i32, i32)> {
    let digits_len = text.chars().take_while(char::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let (idx_text, rest) = text.split_at(digits_len);
    let idx: i32 = idx_text.parse().ok()?;
    if rest.is_empty() {
        return Some((GroupScope::Local, idx, 0));
    }
    let mut chars = rest.chars();
    let tag = chars.next()?;
    let remainder = chars.as_str();
    match tag {
        'g' => Some((GroupScope::Global, idx, 0)),
        't' => {
            let idx2: i32 = remainder.parse().ok()?;
            Some((GroupScope::Track, idx, idx2))
        }
        _ => None,
    }
}

/// Resolves an effect name (`pr`, `ps`, `tr`, `vb`, `vs`) to its numeric id.
#[must_use]
pub fn effect_id(name: &str) -> Option<i32> {
    Some(match name {
        "pr" => 0, // BK_EFFECT_PORTAMENTO
        "ps" => 1, // BK_EFFECT_PANNING_SLIDE
        "tr" => 2, // BK_EFFECT_TREMOLO
        "vb" => 3, // BK_EFFECT_VIBRATO
        "vs" => 4, // BK_EFFECT_VOLUME_SLIDE
        _ => return None,
    })
}

/// The effect ids whose middle (`amp`) argument is a pitch offset rather
/// than a volume, matching the `switch (args[0])` special cases in
/// `BKTKCompilerCompileCommand`.
pub const EFFECT_PORTAMENTO: i32 = 0;
/// See [`EFFECT_PORTAMENTO`].
pub const EFFECT_VIBRATO: i32 = 3;
/// An effect id whose middle argument is volume-scaled, like most others.
pub const EFFECT_TREMOLO: i32 = 2;

/// Resolves a built-in waveform name to its enum value (never 0, which is
/// reserved so a missing name can't be confused with a real waveform).
#[must_use]
pub fn builtin_waveform_id(name: &str) -> Option<i32> {
    Some(match name {
        "sqr" | "square" => 1,
        "tri" | "triangle" => 2,
        "sin" | "sine" => 3,
        "saw" | "sawtooth" => 4,
        "noi" | "noise" => 5,
        "smp" | "sample" => 6,
        _ => return None,
    })
}

/// Resolves a sample repeat mode name (`no`/`rep`/`pal`).
#[must_use]
pub fn repeat_mode(name: &str) -> Option<SampleRepeatMode> {
    Some(match name {
        "no" => SampleRepeatMode::None,
        "rep" => SampleRepeatMode::Repeat,
        "pal" => SampleRepeatMode::PingPong,
        _ => return None,
    })
}

/// Resolves a pulse kernel name (`harm`/`sinc`) to its numeric id.
#[must_use]
pub fn pulse_kernel_id(name: &str) -> Option<i32> {
    Some(match name {
        "harm" => 0,
        "sinc" => 1,
        _ => return None,
    })
}

/// Parses a `data` literal's format tag (`bits[s|u][b|l]`, e.g. `16sl`,
/// `8u`), mirroring `parseDataParams`. Returns `None` for an unsupported
/// bit width.
#[must_use]
pub fn parse_data_format(text: &str) -> Option<DataFormat> {
    let digits_len = text.chars().take_while(char::is_ascii_digit).count();
    let bits: u8 = text[..digits_len].parse().ok()?;
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return None;
    }
    let mut signed = true;
    let mut big_endian = false;
    for c in text[digits_len..].chars() {
        match c {
            's' => signed = true,
            'u' => signed = false,
            'b' => big_endian = true,
            'l' => big_endian = false,
            _ => return None,
        }
    }
    Some(DataFormat {
        bits,
        signed,
        big_endian,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_note() {
        assert_eq!(parse_note("c4"), Some((48, 0)));
    }

    #[test]
    fn parses_sharp_note_with_explicit_cents() {
        assert_eq!(parse_note("d#3+56"), Some((3 + 12 * 3, 56)));
        assert_eq!(parse_note("a#2-26"), Some((10 + 12 * 2, -26)));
    }

    #[test]
    fn parses_ticks_fraction() {
        assert_eq!(parse_ticks_fraction("4"), (4, 1));
        assert_eq!(parse_ticks_fraction("1/8"), (1, 8));
        assert_eq!(parse_ticks_fraction(""), (0, 0));
    }

    #[test]
    fn parses_group_index_variants() {
        assert_eq!(parse_group_index("12"), Some((GroupScope::Local, 12, 0)));
        assert_eq!(parse_group_index("3g"), Some((GroupScope::Global, 3, 0)));
        assert_eq!(parse_group_index("7t2"), Some((GroupScope::Track, 7, 2)));
    }

    #[test]
    fn parses_data_format() {
        assert_eq!(
            parse_data_format("16sl"),
            Some(DataFormat {
                bits: 16,
                signed: true,
                big_endian: false
            })
        );
        assert_eq!(
            parse_data_format("8u"),
            Some(DataFormat {
                bits: 8,
                signed: false,
                big_endian: false
            })
        );
    }
}
