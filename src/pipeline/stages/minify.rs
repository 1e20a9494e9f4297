// src/pipeline/stages/minify.rs

use crate::pipeline::stage::{FileAsset, Stage, StageContext, StageError};
use crate::pipeline::stages::js_lexer::{is_word_char, tokenize, Token};

/// Strips comments and insignificant whitespace from JavaScript.
///
/// Line breaks are kept where they may matter for automatic semicolon
/// insertion; literals are copied verbatim.
#[derive(Debug, Clone, Default)]
pub struct MinifyJsStage;

// A line break after these is never significant.
const JS_OPEN: &str = "{;,([";
// Nor before these.
const JS_CLOSE: &str = ")]};,";

impl Stage for MinifyJsStage {
    fn name(&self) -> &str {
        "minify_js"
    }

    fn apply(&self, file: FileAsset, _ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        let text = file.text(self.name())?;
        let minified = minify_js(text, self.name())?;
        Ok(file.with_text(minified))
    }
}

pub fn minify_js(src: &str, stage: &str) -> Result<String, StageError> {
    let tokens = tokenize(src, stage)?;
    let mut out = String::with_capacity(src.len());
    let mut pending: Option<bool> = None;

    for spanned in tokens {
        let first = match spanned.token {
            Token::Space { newline } => {
                pending = Some(pending.unwrap_or(false) | newline);
                continue;
            }
            Token::Code(c) => c,
            Token::Literal(lit) => lit.chars().next().unwrap_or(' '),
        };

        if let (Some(newline), Some(prev)) = (pending.take(), out.chars().last()) {
            if newline && !JS_OPEN.contains(prev) && !JS_CLOSE.contains(first) {
                out.push('\n');
            } else if needs_space(prev, first) {
                out.push(' ');
            }
        }

        match spanned.token {
            Token::Code(c) => out.push(c),
            Token::Literal(lit) => out.push_str(lit),
            Token::Space { .. } => {}
        }
    }

    Ok(out)
}

fn needs_space(prev: char, next: char) -> bool {
    (is_word_char(prev) && is_word_char(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
}

/// Strips comments and whitespace from CSS and drops the last `;` of each
/// block. Quoted strings are copied verbatim.
#[derive(Debug, Clone, Default)]
pub struct MinifyCssStage;

// Whitespace before these can go.
const CSS_BEFORE: &str = "{};,>~)";
// Whitespace after these can go.
const CSS_AFTER: &str = "{};,>~(:";

impl Stage for MinifyCssStage {
    fn name(&self) -> &str {
        "minify_css"
    }

    fn apply(&self, file: FileAsset, _ctx: &StageContext<'_>) -> Result<FileAsset, StageError> {
        let text = file.text(self.name())?;
        let minified = minify_css(text, self.name())?;
        Ok(file.with_text(minified))
    }
}

pub fn minify_css(src: &str, stage: &str) -> Result<String, StageError> {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.char_indices().peekable();
    let mut pending_space = false;
    let mut line = 1;

    while let Some((i, c)) = chars.next() {
        if c == '\n' {
            line += 1;
        }

        if c.is_whitespace() {
            pending_space = true;
            continue;
        }

        if c == '/' && src[i..].starts_with("/*") {
            let Some(end) = src[i + 2..].find("*/") else {
                return Err(StageError::new(stage, "unterminated comment").at_line(line));
            };
            let comment_end = i + 2 + end + 2;
            line += src[i..comment_end].matches('\n').count();
            while chars.peek().is_some_and(|(j, _)| *j < comment_end) {
                chars.next();
            }
            pending_space = true;
            continue;
        }

        if pending_space {
            pending_space = false;
            if let Some(prev) = out.chars().last() {
                if !CSS_AFTER.contains(prev) && !CSS_BEFORE.contains(c) {
                    out.push(' ');
                }
            }
        }

        match c {
            '"' | '\'' => {
                out.push(c);
                let mut closed = false;
                while let Some((_, s)) = chars.next() {
                    out.push(s);
                    if s == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    } else if s == c {
                        closed = true;
                        break;
                    } else if s == '\n' {
                        break;
                    }
                }
                if !closed {
                    return Err(StageError::new(stage, "unterminated string").at_line(line));
                }
            }
            '}' => {
                if out.ends_with(';') {
                    out.pop();
                }
                out.push('}');
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_comments_and_indentation_are_removed() {
        let src = "// header\nfunction add(a, b) {\n    /* sum */\n    return a + b;\n}\n";
        assert_eq!(
            minify_js(src, "minify_js").unwrap(),
            "function add(a,b){return a+b;}"
        );
    }

    #[test]
    fn js_literals_survive_verbatim() {
        let src = "var s = 'a  //  b';\nvar t = `x ${ y }  z`;";
        let out = minify_js(src, "minify_js").unwrap();
        assert!(out.contains("'a  //  b'"));
        assert!(out.contains("`x ${ y }  z`"));
    }

    #[test]
    fn js_keeps_significant_line_breaks_and_spaces() {
        let out = minify_js("a = b\n++c\nvar x = y - -z", "minify_js").unwrap();
        assert_eq!(out, "a=b\n++c\nvar x=y- -z");
    }

    #[test]
    fn js_regex_after_return_is_kept_verbatim() {
        let src = "function q(s) {\n  return /'/.test(s);\n}\n";
        assert_eq!(
            minify_js(src, "minify_js").unwrap(),
            "function q(s){return/'/.test(s);}"
        );

        let out = minify_js("function w(s) {\n  return / +/.test(s);\n}\n", "minify_js").unwrap();
        assert!(out.contains("/ +/.test(s)"), "{out}");
    }

    #[test]
    fn css_is_collapsed_and_trailing_semicolons_dropped() {
        let src = "/* theme */\nbody {\n  color: red;\n  margin: 0 auto;\n}\na > b, i ~ u { x: 1 }\n";
        assert_eq!(
            minify_css(src, "minify_css").unwrap(),
            "body{color:red;margin:0 auto}a>b,i~u{x:1}"
        );
    }

    #[test]
    fn css_keeps_descendant_pseudo_selectors_and_strings() {
        let out = minify_css("div :hover { content: \"a  b\"; }", "minify_css").unwrap();
        assert_eq!(out, "div :hover{content:\"a  b\"}");
    }

    #[test]
    fn css_unterminated_comment_fails() {
        let err = minify_css("a{}\n/* open", "minify_css").unwrap_err();
        assert_eq!(err.line, Some(2));
    }
}
