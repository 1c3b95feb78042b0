//! Source scanner.
//!
//! Walks the raw source text once, character by character, as an explicit
//! finite-state machine and produces classified [`Token`]s with their
//! assigned output addresses. `;` starts a line comment, `[`..`]`
//! delimits a raw literal span (a `]` preceded by a backslash does not
//! close the span), and any run of whitespace outside a literal separates
//! tokens.
//!
//! Classification happens as each token completes, in priority order:
//! literal (text ends with `]` plus a one-letter type specifier), label
//! definition (trailing `:` or `=`), instruction mnemonic (only when the
//! token is not filling an operand slot of the previous instruction), and
//! otherwise a label reference.
//!
//! Address bookkeeping runs alongside: every token advances the output
//! address by one word, except label definitions (which bind to the next
//! emitted word and occupy none) and string literals (which occupy one
//! word per raw character).

use crate::assembler::diagnostics::Diagnostics;
use crate::machine::isa::Instruction;

/// Classification of one source token.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TokenKind {
    /// An instruction mnemonic from the ISA table.
    Instruction,
    /// A name being bound, ending in `:` (address) or `=` (value).
    LabelDefinition,
    /// A reference to a built-in or user-defined label.
    Label,
    /// `[..]s` raw string literal.
    Str,
    /// `[..]b` binary number literal.
    Binary,
    /// `[..]x` hexadecimal number literal.
    Hexadecimal,
    /// `[..]o` octal number literal.
    Octal,
    /// `[..]d` decimal number literal.
    Decimal,
}

/// One scanned token.
///
/// Produced once by the scanner and consumed once by the parser.
/// `address` is the output-word offset the token will occupy; for a label
/// definition it is the offset of the next emitted word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw token text. Literals keep their `]` + specifier tail; label
    /// definitions keep their trailing marker until pass 1 strips it.
    pub text: String,
    pub address: u64,
    /// 1-based source line the token started on.
    pub line: usize,
}

/// Scanner states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ScanState {
    /// Between or inside ordinary tokens.
    Normal,
    /// Inside a `;` comment, until end of line.
    Comment,
    /// Inside a `[`..`]` raw literal span.
    RawLiteral,
}

/// Working state for one scan.
struct Scanner {
    tokens: Vec<Token>,
    buf: String,
    /// Raw characters collected by the current literal span(s).
    raw_len: u64,
    /// Line the current token started on.
    token_line: usize,
    /// Output address the next token will occupy.
    next_address: u64,
    /// Operand words still expected by the last instruction token.
    operands_pending: usize,
}

impl Scanner {
    fn new() -> Self {
        Self {
            tokens: Vec::new(),
            buf: String::new(),
            raw_len: 0,
            token_line: 1,
            next_address: 0,
            operands_pending: 0,
        }
    }

    /// Notes a character joining the current token.
    fn push(&mut self, ch: char, line: usize) {
        if self.buf.is_empty() {
            self.token_line = line;
        }
        self.buf.push(ch);
    }

    /// Completes the pending token, classifying it and assigning its address.
    fn flush(&mut self, diagnostics: &mut Diagnostics) {
        if self.buf.is_empty() {
            self.raw_len = 0;
            return;
        }

        let in_operand_slot = self.operands_pending > 0;
        if in_operand_slot {
            self.operands_pending -= 1;
        }

        let chars: Vec<char> = self.buf.chars().collect();
        let kind = if chars.len() > 2 && chars[chars.len() - 2] == ']' {
            match chars[chars.len() - 1] {
                's' => TokenKind::Str,
                'b' => TokenKind::Binary,
                'x' => TokenKind::Hexadecimal,
                'o' => TokenKind::Octal,
                'd' => TokenKind::Decimal,
                other => {
                    diagnostics.report(
                        self.token_line,
                        format!("unrecognised raw-data type specifier '{}'", other),
                    );
                    TokenKind::Decimal
                }
            }
        } else if matches!(chars.last(), Some(&':') | Some(&'=')) {
            TokenKind::LabelDefinition
        } else if !in_operand_slot {
            match Instruction::from_mnemonic(&self.buf) {
                Some(instr) => {
                    self.operands_pending = instr.operand_count();
                    TokenKind::Instruction
                }
                None => TokenKind::Label,
            }
        } else {
            TokenKind::Label
        };

        self.tokens.push(Token {
            kind,
            text: std::mem::take(&mut self.buf),
            address: self.next_address,
            line: self.token_line,
        });

        match kind {
            TokenKind::LabelDefinition => {}
            TokenKind::Str => self.next_address += self.raw_len,
            _ => self.next_address += 1,
        }
        self.raw_len = 0;
    }
}

/// Scans `source` into its token sequence.
///
/// Recoverable problems (unrecognised literal specifiers) are recorded in
/// `diagnostics`; scanning always continues to the end of the input.
pub fn scan(source: &str, diagnostics: &mut Diagnostics) -> Vec<Token> {
    let mut scanner = Scanner::new();
    let mut state = ScanState::Normal;
    let mut line = 1usize;
    let mut prev = '\0';

    for ch in source.chars() {
        match state {
            ScanState::Normal => match ch {
                ';' => {
                    scanner.flush(diagnostics);
                    state = ScanState::Comment;
                }
                '[' => {
                    if scanner.buf.is_empty() {
                        scanner.token_line = line;
                    }
                    state = ScanState::RawLiteral;
                }
                ' ' | '\t' | '\n' => scanner.flush(diagnostics),
                _ => scanner.push(ch, line),
            },
            ScanState::Comment => {
                if ch == '\n' {
                    scanner.flush(diagnostics);
                    state = ScanState::Normal;
                }
            }
            ScanState::RawLiteral => match ch {
                ']' if prev != '\\' => {
                    scanner.push(']', line);
                    state = ScanState::Normal;
                }
                // A second `[` inside a span is swallowed, like the opener.
                '[' => {}
                _ => {
                    scanner.push(ch, line);
                    scanner.raw_len += 1;
                }
            },
        }

        if ch == '\n' {
            line += 1;
        }
        prev = ch;
    }

    scanner.flush(diagnostics);
    scanner.tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_clean(source: &str) -> Vec<Token> {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(source, &mut diagnostics);
        assert!(diagnostics.is_clean(), "{:?}", diagnostics.entries());
        tokens
    }

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_source() {
        assert!(scan_clean("").is_empty());
        assert!(scan_clean("  \n\t\n").is_empty());
        assert!(scan_clean("; only a comment\n").is_empty());
    }

    #[test]
    fn classifies_instructions_and_labels() {
        let tokens = scan_clean("ai loop fi");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Instruction,
                TokenKind::Label,
                TokenKind::Instruction
            ]
        );
        assert_eq!(tokens[0].text, "ai");
        assert_eq!(tokens[1].text, "loop");
    }

    #[test]
    fn operand_slots_are_never_instructions() {
        // `gt` is a mnemonic, but here it fills pl's second operand slot.
        let tokens = scan_clean("pl [5]d gt");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Instruction, TokenKind::Decimal, TokenKind::Label]
        );

        // After the operands are consumed, mnemonics classify again.
        let tokens = scan_clean("mv acc dat ai");
        assert_eq!(tokens[3].kind, TokenKind::Instruction);
    }

    #[test]
    fn literal_kinds_by_suffix() {
        let tokens = scan_clean("[101]b [ff]x [17]o [42]d [hi]s");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Binary,
                TokenKind::Hexadecimal,
                TokenKind::Octal,
                TokenKind::Decimal,
                TokenKind::Str
            ]
        );
        assert_eq!(tokens[0].text, "101]b");
        assert_eq!(tokens[4].text, "hi]s");
    }

    #[test]
    fn unknown_literal_suffix_reports_and_continues() {
        let mut diagnostics = Diagnostics::new();
        let tokens = scan(" [5]q ai", &mut diagnostics);
        assert_eq!(diagnostics.entries().len(), 1);
        assert!(diagnostics.entries()[0]
            .message
            .contains("unrecognised raw-data type specifier 'q'"));
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].kind, TokenKind::Instruction);
    }

    #[test]
    fn comments_are_stripped() {
        let tokens = scan_clean("ai ; increment\nad;decrement\nfi");
        assert_eq!(
            tokens.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
            vec!["ai", "ad", "fi"]
        );
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }

    #[test]
    fn semicolon_inside_literal_is_raw() {
        let tokens = scan_clean("[a;b]s");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "a;b]s");
    }

    #[test]
    fn address_assignment() {
        let tokens = scan_clean("ai ad [9]d mv acc dat");
        let addresses: Vec<u64> = tokens.iter().map(|t| t.address).collect();
        assert_eq!(addresses, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn string_occupies_one_word_per_raw_character() {
        // Three plain tokens, then a 5-character string, then one more.
        let tokens = scan_clean("ai ad ai [hello]s fi");
        assert_eq!(tokens[3].kind, TokenKind::Str);
        assert_eq!(tokens[3].address, 3);
        assert_eq!(tokens[4].address, 8);
    }

    #[test]
    fn escape_characters_count_as_raw_length() {
        let tokens = scan_clean(r"[a\nb]s fi");
        assert_eq!(tokens[0].text, r"a\nb]s");
        assert_eq!(tokens[1].address, 4);
    }

    #[test]
    fn label_definition_occupies_no_address() {
        let tokens = scan_clean("loop: ai jm loop");
        assert_eq!(tokens[0].kind, TokenKind::LabelDefinition);
        assert_eq!(tokens[0].address, 0);
        assert_eq!(tokens[1].address, 0);
        assert_eq!(tokens[2].address, 1);
        assert_eq!(tokens[3].address, 2);
    }

    #[test]
    fn value_label_definition() {
        let tokens = scan_clean("ten= [10]d");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::LabelDefinition, TokenKind::Decimal]
        );
    }

    #[test]
    fn escaped_bracket_stays_in_literal() {
        let tokens = scan_clean(r"[a\]b]s");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text, r"a\]b]s");
    }

    #[test]
    fn newline_inside_literal_is_raw() {
        let tokens = scan_clean("[a\nb]s fi");
        assert_eq!(tokens[0].text, "a\nb]s");
        assert_eq!(tokens[1].address, 3);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn token_lines_are_where_tokens_start() {
        let tokens = scan_clean("ai\n  ad\n\nfi");
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
    }
}
