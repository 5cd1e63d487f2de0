//! Writes a node tree back to source text.
//!
//! Grounded on `BKTKWriter.c` in the original implementation, which the
//! round-trip testable property in `SPEC_FULL.md` §8 depends on: a tree
//! written by [`write_tree`], retokenized and reparsed, must produce an
//! isomorphic tree (same node kinds and arguments; comments preserved).

use std::fmt::{self, Write};

use super::model::{Arg, ArgValue, Node, NodeKind};

/// Writes `node` and its descendants as source text into `out`.
///
/// Strings are re-quoted and escaped whenever they contain characters that
/// would otherwise be misread by the tokenizer (whitespace, `:`, `;`, `[`,
/// `]`, `%`, `"`, or a backslash), and data arguments are re-emitted as
/// base64 literals. The synthetic, unnamed root group is written as a bare
/// sequence of its children with no enclosing brackets.
///
/// # Errors
///
/// Propagates any formatting error from `out`.
pub fn write_tree(node: &Node, out: &mut impl Write) -> fmt::Result {
    match &node.kind {
        NodeKind::Group { name, args, children } if name.is_empty() && args.is_empty() => {
            // The synthetic root: no brackets, just its children in order.
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                write_tree(child, out)?;
            }
            Ok(())
        }
        NodeKind::Group { name, args, children } => {
            write!(out, "[{name}")?;
            for arg in args {
                write!(out, ":")?;
                write_arg(arg, out)?;
            }
            for child in children {
                write!(out, "; ")?;
                write_tree(child, out)?;
            }
            write!(out, "]")
        }
        NodeKind::Command { name, args } => {
            write!(out, "{name}")?;
            for arg in args {
                write!(out, ":")?;
                write_arg(arg, out)?;
            }
            Ok(())
        }
        NodeKind::Comment(text) => write!(out, "%{text}"),
    }
}

fn write_arg(arg: &Arg, out: &mut impl Write) -> fmt::Result {
    match &arg.value {
        ArgValue::Text(text) => {
            if arg.quoted || needs_quoting(text) {
                write!(out, "\"")?;
                write_escaped(text, out)?;
                write!(out, "\"")
            } else {
                write!(out, "{text}")
            }
        }
        ArgValue::Data(bytes) => {
            write!(out, "!\"")?;
            write_base64(bytes, out)?;
            write!(out, "\"")
        }
    }
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ':' | ';' | '[' | ']' | '%' | '"' | '\\'))
}

fn write_escaped(text: &str, out: &mut impl Write) -> fmt::Result {
    for ch in text.chars() {
        match ch {
            '\u{07}' => out.write_str("\\a")?,
            '\u{08}' => out.write_str("\\b")?,
            '\u{0C}' => out.write_str("\\f")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            '\u{0B}' => out.write_str("\\v")?,
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn write_base64(bytes: &[u8], out: &mut impl Write) -> fmt::Result {
    let mut bits: u32 = 0;
    let mut nbits: u32 = 0;
    for &byte in bytes {
        bits = (bits << 8) | u32::from(byte);
        nbits += 8;
        while nbits >= 6 {
            nbits -= 6;
            let idx = (bits >> nbits) & 0x3F;
            out.write_char(BASE64_ALPHABET[idx as usize] as char)?;
        }
    }
    if nbits > 0 {
        let idx = (bits << (6 - nbits)) & 0x3F;
        out.write_char(BASE64_ALPHABET[idx as usize] as char)?;
    }
    Ok(())
}
