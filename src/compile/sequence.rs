//! Parses the `instr` sub-command sequence grammar: flat sequences
//! (`v`/`a`/`p`/`dc`) and phase-pair envelopes (`vnv`/`anv`/`pnv`/`dcnv`),
//! both with an optional `<`/`>`-bracketed repeating region.
//!
//! Grounded on `BKTKCompilerParseSequence`/`BKTKCompilerParseEnvelope` in
//! `original_source/parser/BKTKCompiler.c`.

use crate::compile::model::Sequence;
use crate::error::{CompileError, TextPosition};
use crate::parse::Arg;

/// Whether a sequence is a flat list of values or a phase/value envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceShape {
    /// `v`/`a`/`p`/`dc`: one value per entry.
    Flat,
    /// `vnv`/`anv`/`pnv`/`dcnv`: `(steps, value)` per entry.
    Envelope,
}

/// Parses `args` into a [`Sequence`], applying `scale` to every value.
///
/// `<` opens the repeating region at the current entry count; `>` closes
/// it. Neither bracket appearing at all means an empty repeat region at
/// the sequence's end (`spec.md` §4.3: "default is empty repeat at the
/// end"). An unclosed `<` extends the repeat region to the end of the
/// sequence instead of erroring, matching `BKTKCompilerParseSequence`'s
/// `else if (repeatEnd < 0) { repeatEnd = length; }`.
///
/// An incomplete trailing `(steps, value)` pair in an envelope sequence is
/// silently dropped rather than rejected, matching
/// `BKTKCompilerParseEnvelope`'s `if (i + 1 >= node->argCount) { break; }`.
///
/// # Errors
///
/// Returns [`CompileError::MalformedSequence`] if a bracket is duplicated,
/// closed before it is opened, or a value fails to parse as an integer.
pub fn parse_sequence(
    args: &[Arg],
    shape: SequenceShape,
    scale: impl Fn(i32) -> i32,
    position: TextPosition,
) -> Result<Sequence, CompileError> {
    let width = match shape {
        SequenceShape::Flat => 1,
        SequenceShape::Envelope => 2,
    };
    let mut steps = Vec::new();
    let mut values = Vec::new();
    let mut pending = Vec::new();
    let mut repeat_begin = None;
    let mut repeat_end = None;

    for arg in args {
        let text = arg
            .as_text()
            .ok_or(CompileError::MalformedSequence { position })?;
        match text {
            "<" => {
                if repeat_begin.is_some() {
                    return Err(CompileError::MalformedSequence { position });
                }
                repeat_begin = Some(values.len());
            }
            ">" => {
                if repeat_begin.is_none() || repeat_end.is_some() {
                    return Err(CompileError::MalformedSequence { position });
                }
                repeat_end = Some(values.len());
            }
            _ => {
                let n: i32 = text
                    .parse()
                    .map_err(|_| CompileError::MalformedSequence { position })?;
                pending.push(n);
                if pending.len() == width {
                    match shape {
                        SequenceShape::Flat => {
                            steps.push(None);
                            values.push(scale(pending[0]));
                        }
                        SequenceShape::Envelope => {
                            steps.push(Some(pending[0]));
                            values.push(scale(pending[1]));
                        }
                    }
                    pending.clear();
                }
            }
        }
    }
    let (repeat_begin, repeat_len) = match (repeat_begin, repeat_end) {
        (Some(begin), Some(end)) if end >= begin => (begin, end - begin),
        (Some(begin), None) => (begin, values.len() - begin),
        (None, None) => (values.len(), 0),
        _ => return Err(CompileError::MalformedSequence { position }),
    };

    Ok(Sequence {
        steps,
        values,
        repeat_begin,
        repeat_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ArgValue;

    fn arg(text: &str) -> Arg {
        Arg {
            value: ArgValue::Text(text.into()),
            quoted: false,
            position: TextPosition { line: 1, col: 1 },
        }
    }

    fn pos() -> TextPosition {
        TextPosition { line: 1, col: 1 }
    }

    #[test]
    fn flat_sequence_with_no_brackets_has_empty_trailing_repeat() {
        let args = vec![arg("0"), arg("1"), arg("255")];
        let seq = parse_sequence(&args, SequenceShape::Flat, |v| v, pos()).unwrap();
        assert_eq!(seq.values, vec![0, 1, 255]);
        assert_eq!(seq.repeat_begin, 3);
        assert_eq!(seq.repeat_len, 0);
    }

    #[test]
    fn flat_sequence_with_brackets_marks_repeat_region() {
        // matches spec.md §8 scenario 2: v:0:<1>:0 -> repeat_begin=0... actually
        // brackets wrap the single middle entry here: [0, <1>, 0].
        let args = vec![arg("255"), arg("<"), arg("0"), arg(">"), arg("0")];
        let seq = parse_sequence(&args, SequenceShape::Flat, |v| v, pos()).unwrap();
        assert_eq!(seq.values, vec![255, 0, 0]);
        assert_eq!(seq.repeat_begin, 1);
        assert_eq!(seq.repeat_len, 1);
    }

    #[test]
    fn envelope_pairs_steps_with_values() {
        let args = vec![arg("4"), arg("100"), arg("8"), arg("0")];
        let seq = parse_sequence(&args, SequenceShape::Envelope, |v| v * 2, pos()).unwrap();
        assert_eq!(seq.steps, vec![Some(4), Some(8)]);
        assert_eq!(seq.values, vec![200, 0]);
    }

    #[test]
    fn unmatched_close_bracket_errors() {
        let args = vec![arg("0"), arg(">")];
        assert!(parse_sequence(&args, SequenceShape::Flat, |v| v, pos()).is_err());
    }

    #[test]
    fn unclosed_open_bracket_repeats_to_the_end() {
        let args = vec![arg("0"), arg("<"), arg("1"), arg("2")];
        let seq = parse_sequence(&args, SequenceShape::Flat, |v| v, pos()).unwrap();
        assert_eq!(seq.values, vec![0, 1, 2]);
        assert_eq!(seq.repeat_begin, 1);
        assert_eq!(seq.repeat_len, 2);
    }

    #[test]
    fn incomplete_envelope_pair_is_silently_dropped() {
        let args = vec![arg("4"), arg("100"), arg("8")];
        let seq = parse_sequence(&args, SequenceShape::Envelope, |v| v, pos()).unwrap();
        assert_eq!(seq.steps, vec![Some(4)]);
        assert_eq!(seq.values, vec![100]);
    }
}
