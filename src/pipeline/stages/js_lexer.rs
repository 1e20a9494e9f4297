// src/pipeline/stages/js_lexer.rs

//! A small JavaScript scanner shared by the minifier and the linter.
//!
//! It only knows enough to tell code from strings, template literals,
//! comments and regex literals. Regex literals are recognised by the usual
//! heuristic: a `/` starts a regex when the previous significant token cannot
//! end an expression (an operator, an opening bracket, or a keyword such as
//! `return`).

use crate::pipeline::stage::StageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// A single code character (identifier chars, punctuation, operators).
    Code(char),
    /// A run of whitespace and/or comments. `newline` is true if it spanned
    /// a line break.
    Space { newline: bool },
    /// A string, template or regex literal, verbatim.
    Literal(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    /// 1-based line where the token starts.
    pub line: usize,
}

const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";

// Keywords after which an operand is expected.
const REGEX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// Last significant token seen, for the regex heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Prev {
    Start,
    Punct(char),
    Word(String),
    Literal,
}

pub fn tokenize<'a>(src: &'a str, stage: &str) -> Result<Vec<Spanned<'a>>, StageError> {
    let bytes = src.as_bytes();
    let mut out: Vec<Spanned<'a>> = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut prev = Prev::Start;
    // False once whitespace separates the next char from `prev`.
    let mut adjacent = false;

    while i < bytes.len() {
        let start_line = line;
        let c = bytes[i];

        // Whitespace and comments collapse into one Space token.
        if c.is_ascii_whitespace() || starts_comment(bytes, i) {
            let mut newline = false;
            while i < bytes.len() {
                if bytes[i] == b'\n' {
                    newline = true;
                    line += 1;
                    i += 1;
                } else if bytes[i].is_ascii_whitespace() {
                    i += 1;
                } else if bytes[i..].starts_with(b"//") {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                } else if bytes[i..].starts_with(b"/*") {
                    let Some(end) = src[i + 2..].find("*/") else {
                        return Err(StageError::new(stage, "unterminated block comment")
                            .at_line(line));
                    };
                    let body = &src[i..i + 2 + end + 2];
                    let breaks = body.matches('\n').count();
                    if breaks > 0 {
                        newline = true;
                        line += breaks;
                    }
                    i += body.len();
                } else {
                    break;
                }
            }
            push_space(&mut out, newline, start_line);
            adjacent = false;
            continue;
        }

        match c {
            b'\'' | b'"' | b'`' => {
                let end = scan_quoted(src, i, c, &mut line).ok_or_else(|| {
                    StageError::new(stage, "unterminated string literal").at_line(start_line)
                })?;
                out.push(Spanned {
                    token: Token::Literal(&src[i..end]),
                    line: start_line,
                });
                prev = Prev::Literal;
                i = end;
            }
            b'/' if regex_allowed(&prev) => {
                let end = scan_regex(src, i).ok_or_else(|| {
                    StageError::new(stage, "unterminated regular expression").at_line(start_line)
                })?;
                out.push(Spanned {
                    token: Token::Literal(&src[i..end]),
                    line: start_line,
                });
                prev = Prev::Literal;
                i = end;
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('\u{FFFD}');
                out.push(Spanned {
                    token: Token::Code(ch),
                    line: start_line,
                });
                prev = match prev {
                    Prev::Word(mut word) if adjacent && is_word_char(ch) => {
                        word.push(ch);
                        Prev::Word(word)
                    }
                    _ if is_word_char(ch) => Prev::Word(ch.to_string()),
                    _ => Prev::Punct(ch),
                };
                i += ch.len_utf8().max(1);
            }
        }
        adjacent = true;
    }

    Ok(out)
}

fn starts_comment(bytes: &[u8], i: usize) -> bool {
    bytes[i..].starts_with(b"//") || bytes[i..].starts_with(b"/*")
}

fn push_space(out: &mut Vec<Spanned<'_>>, newline: bool, line: usize) {
    if let Some(Spanned {
        token: Token::Space { newline: prev },
        ..
    }) = out.last_mut()
    {
        *prev |= newline;
        return;
    }
    out.push(Spanned {
        token: Token::Space { newline },
        line,
    });
}

fn regex_allowed(prev: &Prev) -> bool {
    match prev {
        Prev::Start => true,
        Prev::Punct(c) => REGEX_PRECEDERS.contains(*c),
        Prev::Word(word) => REGEX_KEYWORDS.contains(&word.as_str()),
        Prev::Literal => false,
    }
}

/// Index one past the closing quote, or `None` if unterminated.
fn scan_quoted(src: &str, start: usize, quote: u8, line: &mut usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' if quote != b'`' => return None,
            b'\n' => {
                *line += 1;
                i += 1;
            }
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn scan_regex(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = start + 1;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return None,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}

/// Identifier characters, for deciding where a separating space is needed.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token<'_>> {
        tokenize(src, "test").unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn strings_and_comments_are_separated_from_code() {
        let toks = kinds("a = '/* no */'; // tail\nb");
        assert!(toks.contains(&Token::Literal("'/* no */'")));
        assert!(toks.contains(&Token::Space { newline: true }));
        assert_eq!(toks.last(), Some(&Token::Code('b')));
    }

    #[test]
    fn division_is_not_a_regex() {
        let toks = kinds("x = a / b / c");
        assert!(!toks.iter().any(|t| matches!(t, Token::Literal(_))));
    }

    #[test]
    fn regex_after_operator_is_a_literal() {
        let toks = kinds("x = /[/]+/g.test(s)");
        assert!(toks.contains(&Token::Literal("/[/]+/g")));
    }

    #[test]
    fn regex_after_keyword_is_a_literal() {
        assert!(kinds("return /'/.test(s)").contains(&Token::Literal("/'/")));
        assert!(kinds("return / +/.test(s)").contains(&Token::Literal("/ +/")));
        assert!(kinds("t = typeof /x/").contains(&Token::Literal("/x/")));
        assert!(kinds("switch (a) { case /a/: }").contains(&Token::Literal("/a/")));
        assert!(kinds("throw /e/").contains(&Token::Literal("/e/")));
    }

    #[test]
    fn identifiers_and_numbers_still_divide() {
        for src in ["returned / 2 / x", "x.value / 2 / y", "10 / 2 / 5", "a) / b / c"] {
            let toks = kinds(src);
            assert!(
                !toks.iter().any(|t| matches!(t, Token::Literal(_))),
                "{src} was scanned as a regex"
            );
        }
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = tokenize("a\nb = 'oops\n", "lint_js").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(err.stage, "lint_js");
    }

    #[test]
    fn template_literal_may_span_lines() {
        let spans = tokenize("t = `a\nb`;\nc", "test").unwrap();
        let c = spans.iter().find(|s| s.token == Token::Code('c')).unwrap();
        assert_eq!(c.line, 3);
    }
}
