// src/pipeline/stages/lint.rs

use crate::pipeline::stage::{FileAsset, Stage, StageContext, StageError};
use crate::pipeline::stages::js_lexer::{is_word_char, tokenize, Token};

/// A lint finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub line: usize,
    pub message: String,
}

/// Light JavaScript checks: balanced delimiters and leftover `debugger`
/// statements. Content passes through unchanged.
///
/// Only `strict` fails a file. Otherwise every finding, including source the
/// scanner cannot read, is reported as a warning.
#[derive(Debug, Clone, Default)]
pub struct LintJsStage {
    strict: bool,
}

impl LintJsStage {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl Stage for LintJsStage {
    fn name(&self) -> &str {
        "lint_js"
    }

    fn apply(&self, file: FileAsset, ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        let findings = match lint_js(file.text(self.name())?, self.name()) {
            Ok(findings) => findings,
            Err(err) if self.strict => return Err(err),
            Err(err) => {
                let line = err.line.unwrap_or(1);
                ctx.warn(self.name(), &format!("line {line}: {} (not linted)", err.message));
                return Ok(file);
            }
        };

        if self.strict {
            if let Some(first) = findings.first() {
                let message = if findings.len() > 1 {
                    format!("{} (and {} more)", first.message, findings.len() - 1)
                } else {
                    first.message.clone()
                };
                return Err(StageError::new(self.name(), message).at_line(first.line));
            }
        }

        for finding in &findings {
            ctx.warn(
                self.name(),
                &format!("line {}: {}", finding.line, finding.message),
            );
        }
        Ok(file)
    }
}

/// Scan `src` and return every finding, in source order.
///
/// Lexical errors (unterminated strings, comments) are returned as `Err`
/// since nothing after them can be checked reliably.
pub fn lint_js(src: &str, stage: &str) -> Result<Vec<Finding>, StageError> {
    let tokens = tokenize(src, stage)?;
    let mut findings = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();
    let mut word = String::new();
    let mut word_line = 0;

    for spanned in &tokens {
        let code = match spanned.token {
            Token::Code(c) => Some(c),
            _ => None,
        };

        match code {
            Some(c) if is_word_char(c) => {
                if word.is_empty() {
                    word_line = spanned.line;
                }
                word.push(c);
                continue;
            }
            _ => {
                check_word(&word, word_line, &mut findings);
                word.clear();
            }
        }

        let Some(c) = code else { continue };
        match c {
            '(' | '[' | '{' => open.push((c, spanned.line)),
            ')' | ']' | '}' => match open.pop() {
                Some((o, _)) if matching(o) == c => {}
                Some((o, line)) => findings.push(Finding {
                    line: spanned.line,
                    message: format!("'{c}' does not match '{o}' opened on line {line}"),
                }),
                None => findings.push(Finding {
                    line: spanned.line,
                    message: format!("unexpected '{c}'"),
                }),
            },
            _ => {}
        }
    }
    check_word(&word, word_line, &mut findings);

    for (o, line) in open {
        findings.push(Finding {
            line,
            message: format!("'{o}' is never closed"),
        });
    }
    findings.sort_by_key(|f| f.line);
    Ok(findings)
}

fn check_word(word: &str, line: usize, findings: &mut Vec<Finding>) {
    if word == "debugger" {
        findings.push(Finding {
            line,
            message: "unexpected 'debugger' statement".to_string(),
        });
    }
}

fn matching(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_has_no_findings() {
        let src = "function f(a) {\n  return [a, '}'];\n}\n";
        assert!(lint_js(src, "lint_js").unwrap().is_empty());
    }

    #[test]
    fn debugger_is_flagged_with_its_line() {
        let findings = lint_js("var a = 1;\ndebugger;\nvar debuggerish = 2;", "lint_js").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
    }

    #[test]
    fn unbalanced_delimiters_are_reported() {
        let findings = lint_js("if (a) {\n  b(];\n", "lint_js").unwrap();
        assert!(findings.iter().any(|f| f.message.contains("does not match")));
        assert!(findings.iter().any(|f| f.message.contains("never closed")));
    }

    #[test]
    fn stray_closer_is_unexpected() {
        let findings = lint_js("a();\n}", "lint_js").unwrap();
        assert_eq!(findings[0].message, "unexpected '}'");
        assert_eq!(findings[0].line, 2);
    }
}
