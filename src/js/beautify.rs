use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeautifyError {
    #[error("unbalanced braces at byte {0}")]
    Unbalanced(usize),
    #[error("unterminated literal")]
    Unterminated,
}

/// Pretty-printer applied to script source before it is logged.
pub trait Beautifier {
    fn beautify(&self, source: &str) -> Result<String, BeautifyError>;
}

/// Re-indents code on braces and semicolons, leaving literals and comments intact.
#[derive(Debug, Clone)]
pub struct BraceBeautifier {
    indent: String,
}

impl Default for BraceBeautifier {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
        }
    }
}

impl BraceBeautifier {
    fn newline(&self, out: &mut String, depth: usize) {
        while out.ends_with(' ') {
            out.pop();
        }
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        for _ in 0..depth {
            out.push_str(&self.indent);
        }
    }
}

impl Beautifier for BraceBeautifier {
    fn beautify(&self, source: &str) -> Result<String, BeautifyError> {
        let chars: Vec<char> = source.chars().collect();
        let mut out = String::with_capacity(source.len() + source.len() / 4);
        let mut depth = 0usize;
        let mut parens = 0usize;
        let mut index = 0;

        while index < chars.len() {
            let c = chars[index];
            match c {
                '"' | '\'' | '`' => {
                    let end = literal_end(&chars, index, c)?;
                    out.extend(&chars[index..=end]);
                    index = end + 1;
                    continue;
                }
                '/' if chars.get(index + 1) == Some(&'/') => {
                    let end = chars[index..]
                        .iter()
                        .position(|c| *c == '\n')
                        .map(|offset| index + offset)
                        .unwrap_or(chars.len());
                    out.extend(&chars[index..end]);
                    self.newline(&mut out, depth);
                    index = end + 1;
                    continue;
                }
                '/' if chars.get(index + 1) == Some(&'*') => {
                    let end = (index + 2..chars.len().saturating_sub(1))
                        .find(|at| chars[*at] == '*' && chars[*at + 1] == '/')
                        .ok_or(BeautifyError::Unterminated)?;
                    out.extend(&chars[index..end + 2]);
                    index = end + 2;
                    continue;
                }
                '(' => {
                    parens += 1;
                    out.push(c);
                }
                ')' => {
                    parens = parens.saturating_sub(1);
                    out.push(c);
                }
                '{' => {
                    if !out.ends_with(' ') && !out.ends_with('\n') && !out.is_empty() {
                        out.push(' ');
                    }
                    out.push('{');
                    depth += 1;
                    self.newline(&mut out, depth);
                }
                '}' => {
                    depth = depth.checked_sub(1).ok_or(BeautifyError::Unbalanced(index))?;
                    self.newline(&mut out, depth);
                    out.push('}');
                    if !matches!(chars.get(index + 1), Some(';' | ',' | ')')) {
                        self.newline(&mut out, depth);
                    }
                }
                ';' if parens == 0 => {
                    out.push(';');
                    self.newline(&mut out, depth);
                }
                '\n' | '\r' => {
                    if !out.ends_with('\n') && !out.ends_with(' ') && !out.is_empty() {
                        self.newline(&mut out, depth);
                    }
                }
                c if c.is_whitespace() => {
                    if !out.ends_with(' ') && !out.ends_with('\n') && !out.is_empty() {
                        out.push(' ');
                    }
                }
                c => out.push(c),
            }
            index += 1;
        }

        if depth != 0 {
            return Err(BeautifyError::Unbalanced(chars.len()));
        }
        let trimmed: Vec<&str> = out.lines().filter(|line| !line.trim().is_empty()).collect();
        Ok(trimmed.join("\n"))
    }
}

fn literal_end(chars: &[char], start: usize, quote: char) -> Result<usize, BeautifyError> {
    let mut index = start + 1;
    while index < chars.len() {
        match chars[index] {
            '\\' => index += 2,
            c if c == quote => return Ok(index),
            _ => index += 1,
        }
    }
    Err(BeautifyError::Unterminated)
}

/// Beautify for logging, falling back to the raw source.
pub fn beautify_or_raw(beautifier: &dyn Beautifier, source: &str) -> String {
    beautifier
        .beautify(source)
        .unwrap_or_else(|_| source.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_blocks() {
        let pretty = BraceBeautifier::default()
            .beautify("function f(a){if(a){return 1;}for(var i=0;i<2;i++){a++;}}")
            .unwrap();
        assert_eq!(
            pretty,
            "function f(a) {\n    if(a) {\n        return 1;\n    }\n    for(var i=0;i<2;i++) {\n        a++;\n    }\n}"
        );
    }

    #[test]
    fn keeps_literals() {
        let pretty = BraceBeautifier::default()
            .beautify("document.write('<b>{;}</b>');")
            .unwrap();
        assert_eq!(pretty, "document.write('<b>{;}</b>');");
    }

    #[test]
    fn falls_back_on_unbalanced_source() {
        let beautifier = BraceBeautifier::default();
        assert!(beautifier.beautify("if (x) { y();").is_err());
        assert_eq!(beautify_or_raw(&beautifier, "}{"), "}{");
    }
}
