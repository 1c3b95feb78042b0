//! Label resolution and binary emission.
//!
//! Two passes over the scanned token sequence. Pass 1 walks the label
//! definitions: validates their names, binds `name:` to the token's
//! recorded address and `name=` to the converted value of the following
//! token, and strips the trailing marker. Pass 2 walks every remaining
//! token in source order and emits words into the output buffer:
//! instructions as their opcode, label references as their bound value,
//! string literals as one word per escaped character, and number literals
//! through the converter.
//!
//! The label table is pre-seeded with the channel and register names, so
//! programs address the machine symbolically. Lookups are first-match in
//! definition order; a duplicate definition is therefore inert and only
//! logged as a warning.

use crate::assembler::diagnostics::Diagnostics;
use crate::assembler::lexer::{Token, TokenKind};
use crate::assembler::literal::convert;
use crate::errors::AsmError;
use crate::machine::isa::Instruction;
use crate::warn;

/// Words reserved at a time when the output buffer fills up.
const OUTPUT_CHUNK: usize = 64;

/// Built-in names: the four channel ids and the fifteen register ids.
const BUILTIN_LABELS: [(&str, u64); 19] = [
    ("cst", 3),
    ("mem", 0),
    ("inp", 1),
    ("out", 2),
    ("mch", 0),
    ("mar", 1),
    ("mdr", 2),
    ("acc", 3),
    ("dat", 4),
    ("cea", 5),
    ("csp", 6),
    ("gp0", 7),
    ("gp1", 8),
    ("gp2", 9),
    ("gp3", 10),
    ("gp4", 11),
    ("gp5", 12),
    ("gp6", 13),
    ("gp7", 14),
];

/// One name binding: an address or an immediate value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelEntry {
    name: String,
    value: u64,
}

/// The label table, seeded with the built-in names.
#[derive(Debug)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    /// Creates a table holding only the built-in bindings.
    pub fn with_builtins() -> Self {
        Self {
            entries: BUILTIN_LABELS
                .iter()
                .map(|(name, value)| LabelEntry {
                    name: (*name).to_string(),
                    value: *value,
                })
                .collect(),
        }
    }

    /// Appends a binding. The first definition of a name wins every
    /// lookup, so a duplicate is inert; it is logged but not an error.
    pub fn define(&mut self, name: String, value: u64) {
        if self.resolve(&name).is_some() {
            warn!("label '{}' is already defined; the first definition wins", name);
        }
        self.entries.push(LabelEntry { name, value });
    }

    /// Resolves a name to its bound value, first match wins.
    pub fn resolve(&self, name: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value)
    }
}

/// Characters legal in a label name: ASCII letters, digits, underscore.
fn is_legal_label_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Converts a literal token's text: drops the closing bracket but keeps
/// the base specifier, which the converter reads itself.
fn literal_value(token: &Token, diagnostics: &mut Diagnostics) -> u64 {
    let chars: Vec<char> = token.text.chars().collect();
    let mut literal: String = chars[..chars.len().saturating_sub(2)].iter().collect();
    if let Some(specifier) = chars.last() {
        literal.push(*specifier);
    }
    convert(&literal, token.line, diagnostics)
}

/// Pass 1: builds the label table from the definition tokens.
///
/// Every definition is validated character by character (each illegal
/// character is reported individually) and inserted regardless, then its
/// trailing marker is stripped so pass 2 sees plain names.
pub fn build_label_table(
    tokens: &mut [Token],
    diagnostics: &mut Diagnostics,
) -> LabelTable {
    let mut table = LabelTable::with_builtins();

    for i in 0..tokens.len() {
        if tokens[i].kind != TokenKind::LabelDefinition {
            continue;
        }

        let text = tokens[i].text.clone();
        let line = tokens[i].line;
        let mut chars = text.chars().collect::<Vec<char>>();
        let marker = chars.pop().unwrap_or(':');

        for ch in &chars {
            if !is_legal_label_char(*ch) {
                diagnostics.report(
                    line,
                    format!(
                        "in label declaration for '{}', found illegal character '{}'",
                        text, ch
                    ),
                );
            }
        }

        let name: String = chars.into_iter().collect();
        match marker {
            ':' => table.define(name, tokens[i].address),
            '=' => match tokens.get(i + 1) {
                Some(next) if next.kind == TokenKind::Str => {
                    diagnostics.report(
                        line,
                        "a label cannot be assigned a string: labels only represent addresses or single values",
                    );
                }
                Some(next) => {
                    let value = literal_value(next, diagnostics);
                    table.define(name, value);
                }
                None => {
                    diagnostics.report(
                        line,
                        "expected a token after the value declaration using '=', but got nothing",
                    );
                }
            },
            _ => {}
        }

        // References never carry the marker, so drop it from the token.
        tokens[i].text.pop();
    }

    table
}

/// Applies the string escape pairs: `\/` is a backslash, `\n`, `\b`, `\r`
/// their control characters; a backslash is never emitted itself, and an
/// unrecognised escape yields the following character unchanged.
fn decode_string(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut escape = false;
    for ch in content.chars() {
        if ch == '\\' {
            escape = true;
            continue;
        }
        if escape {
            out.push(match ch {
                '/' => '\\',
                'n' => '\n',
                'b' => '\u{8}',
                'r' => '\r',
                other => other,
            });
            escape = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Appends one word, growing the output buffer in chunks so an allocation
/// failure is a typed error rather than an abort.
fn push_word(out: &mut Vec<u64>, word: u64) -> Result<(), AsmError> {
    if out.len() == out.capacity() {
        out.try_reserve(OUTPUT_CHUNK).map_err(|_| AsmError::OutOfMemory {
            what: "output buffer",
        })?;
    }
    out.push(word);
    Ok(())
}

/// Pass 2: resolves every remaining token and emits the output words.
pub fn emit(
    tokens: &[Token],
    table: &LabelTable,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<u64>, AsmError> {
    let mut out: Vec<u64> = Vec::new();

    for token in tokens {
        match token.kind {
            TokenKind::LabelDefinition => {}
            TokenKind::Instruction => match Instruction::from_mnemonic(&token.text) {
                Some(instr) => push_word(&mut out, instr.opcode())?,
                None => {
                    // The scanner only classifies table mnemonics as
                    // instructions, so this is unreachable in practice.
                    diagnostics.report(
                        token.line,
                        format!("unrecognised instruction '{}'", token.text),
                    );
                }
            },
            TokenKind::Label => match table.resolve(&token.text) {
                Some(value) => push_word(&mut out, value)?,
                None => {
                    diagnostics.report(
                        token.line,
                        format!("what is '{}'? unrecognised label", token.text),
                    );
                }
            },
            TokenKind::Str => {
                let chars: Vec<char> = token.text.chars().collect();
                let content: String = chars[..chars.len().saturating_sub(2)].iter().collect();
                for ch in decode_string(&content).chars() {
                    push_word(&mut out, ch as u64)?;
                }
            }
            TokenKind::Binary | TokenKind::Hexadecimal | TokenKind::Octal | TokenKind::Decimal => {
                push_word(&mut out, literal_value(token, diagnostics))?;
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::scan;

    fn assemble(source: &str) -> (Vec<u64>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let mut tokens = scan(source, &mut diagnostics);
        let table = build_label_table(&mut tokens, &mut diagnostics);
        let words = emit(&tokens, &table, &mut diagnostics).unwrap();
        (words, diagnostics)
    }

    fn assemble_clean(source: &str) -> Vec<u64> {
        let (words, diagnostics) = assemble(source);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        words
    }

    // ==================== Label table ====================

    #[test]
    fn builtins_are_preseeded() {
        let table = LabelTable::with_builtins();
        assert_eq!(table.resolve("mem"), Some(0));
        assert_eq!(table.resolve("inp"), Some(1));
        assert_eq!(table.resolve("out"), Some(2));
        assert_eq!(table.resolve("cst"), Some(3));
        assert_eq!(table.resolve("acc"), Some(3));
        assert_eq!(table.resolve("cea"), Some(5));
        assert_eq!(table.resolve("gp0"), Some(7));
        assert_eq!(table.resolve("gp7"), Some(14));
        assert_eq!(table.resolve("nope"), None);
    }

    #[test]
    fn first_definition_wins() {
        let mut table = LabelTable::with_builtins();
        table.define("x".to_string(), 1);
        table.define("x".to_string(), 2);
        assert_eq!(table.resolve("x"), Some(1));
    }

    #[test]
    fn address_label_binds_next_word() {
        let words = assemble_clean("ai loop: ad jm loop");
        assert_eq!(words, vec![10, 11, 4, 1]);
    }

    #[test]
    fn value_label_binds_converted_literal() {
        let words = assemble_clean("ten= [10]d pl ten gp0");
        // The literal is still emitted in place after binding the name.
        assert_eq!(words, vec![10, 0, 10, 7]);
    }

    #[test]
    fn value_label_of_string_is_reported() {
        let (_, diagnostics) = assemble("bad= [oops]s");
        assert!(!diagnostics.is_clean());
        assert!(diagnostics.entries()[0]
            .message
            .contains("cannot be assigned a string"));
    }

    #[test]
    fn value_label_without_value_is_reported() {
        let (_, diagnostics) = assemble("dangling=");
        assert!(!diagnostics.is_clean());
        assert!(diagnostics.entries()[0].message.contains("got nothing"));
    }

    #[test]
    fn illegal_identifier_characters_each_report() {
        let (_, diagnostics) = assemble("b@d-name: ai");
        let entries = diagnostics.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].message.contains("illegal character '@'"));
        assert!(entries[1].message.contains("illegal character '-'"));
    }

    // ==================== Emission ====================

    #[test]
    fn place_emits_three_words() {
        let words = assemble_clean("pl [5]d gp0");
        assert_eq!(words, vec![0, 5, 7]);
    }

    #[test]
    fn loop_jump_targets_recorded_address() {
        let words = assemble_clean("loop: ai ad ai ad ai jm loop");
        assert_eq!(words, vec![10, 11, 10, 11, 10, 4, 0]);
    }

    #[test]
    fn string_emits_one_word_per_character() {
        let words = assemble_clean("[hi]s");
        assert_eq!(words, vec!['h' as u64, 'i' as u64]);
    }

    #[test]
    fn string_escapes() {
        let words = assemble_clean(r"[a\nb\/c\rd\be\zf]s");
        let expected: Vec<u64> = "a\nb\\c\rd\u{8}ezf".chars().map(|c| c as u64).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn unresolved_label_reports_and_emits_nothing() {
        let (words, diagnostics) = assemble("jm nowhere");
        assert_eq!(words, vec![4]);
        assert!(!diagnostics.is_clean());
        assert!(diagnostics.entries()[0]
            .message
            .contains("unrecognised label"));
    }

    #[test]
    fn registers_resolve_symbolically() {
        let words = assemble_clean("mv acc dat");
        assert_eq!(words, vec![1, 3, 4]);
    }

    #[test]
    fn channel_names_resolve() {
        let words = assemble_clean("pl cst mch");
        assert_eq!(words, vec![0, 3, 0]);
    }

    #[test]
    fn halt_program() {
        assert_eq!(assemble_clean("fi"), vec![27]);
    }

    #[test]
    fn decode_string_pairs() {
        assert_eq!(decode_string(r"a\/b"), "a\\b");
        assert_eq!(decode_string(r"\n\r\b"), "\n\r\u{8}");
        assert_eq!(decode_string(r"\q"), "q");
        assert_eq!(decode_string(r"trailing\"), "trailing");
        assert_eq!(decode_string("plain"), "plain");
    }
}
