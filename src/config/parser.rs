//! Definition record grammar
//!
//! Records are line-oriented `KEY=value` files in shell assignment syntax.
//! Only a restricted subset of shell word expansion is understood:
//!
//! - `'single quotes'` are literal
//! - `"double quotes"` and bare text expand `$NAME`, `${NAME}`,
//!   `${NAME:-default}` and `${NAME-default}`
//! - a backslash escapes the next character
//! - unquoted whitespace ends the value; anything after it is ignored
//!
//! Command substitution (`$(...)` and backticks) is never evaluated. The
//! whole substitution, whitespace included, is kept verbatim.

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Syntax error inside a single assignment value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("unterminated ${{...}} expansion")]
    UnterminatedBrace,

    #[error("unterminated command substitution")]
    UnterminatedSubstitution,
}

/// One `KEY=value` line of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment<'a> {
    /// 1-based line number
    pub line: usize,
    pub key: &'a str,
    /// Raw value text after `=`, not yet expanded
    pub raw: &'a str,
}

/// Check whether a string is a valid variable name
pub fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a single line as an assignment, if it is one
pub fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        return None;
    }

    let trimmed = match trimmed.strip_prefix("export") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => trimmed,
    };

    let (key, raw) = trimmed.split_once('=')?;
    is_name(key).then_some((key, raw))
}

/// Iterate over every assignment line in a record
pub fn assignments(text: &str) -> impl Iterator<Item = Assignment<'_>> {
    text.lines().enumerate().filter_map(|(idx, line)| {
        parse_assignment(line).map(|(key, raw)| Assignment {
            line: idx + 1,
            key,
            raw,
        })
    })
}

/// Textual scan for the declared key names of a record
///
/// Keys are returned in order of first declaration, without duplicates.
/// Values are not inspected, so a key whose value is empty is still listed.
pub fn scan_declared_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for assignment in assignments(text) {
        if !keys.iter().any(|k| k == assignment.key) {
            keys.push(assignment.key.to_string());
        }
    }
    keys
}

/// Check whether a raw value contains command substitution syntax
pub fn has_command_substitution(raw: &str) -> bool {
    raw.contains("$(") || raw.contains('`')
}

/// Expand a raw assignment value into its final string
///
/// `lookup` resolves variable references; unknown names expand to an empty
/// string.
pub fn expand_word(
    raw: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, SyntaxError> {
    let mut chars = raw.chars().peekable();
    let mut out = String::new();
    expand_into(&mut chars, lookup, &mut out, true)?;
    Ok(out)
}

fn expand_into(
    chars: &mut Peekable<Chars<'_>>,
    lookup: &dyn Fn(&str) -> Option<String>,
    out: &mut String,
    stop_on_whitespace: bool,
) -> Result<(), SyntaxError> {
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        closed = true;
                        break;
                    }
                    out.push(inner);
                }
                if !closed {
                    return Err(SyntaxError::UnterminatedQuote('\''));
                }
            }
            '"' => expand_double_quoted(chars, lookup, out)?,
            '`' => copy_backticks(chars, out)?,
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '$' => expand_variable(chars, lookup, out)?,
            c if c.is_whitespace() && stop_on_whitespace => break,
            c => out.push(c),
        }
    }
    Ok(())
}

fn expand_double_quoted(
    chars: &mut Peekable<Chars<'_>>,
    lookup: &dyn Fn(&str) -> Option<String>,
    out: &mut String,
) -> Result<(), SyntaxError> {
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\' | '$' | '`')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            '$' => expand_variable(chars, lookup, out)?,
            '`' => copy_backticks(chars, out)?,
            c => out.push(c),
        }
    }
    Err(SyntaxError::UnterminatedQuote('"'))
}

fn expand_variable(
    chars: &mut Peekable<Chars<'_>>,
    lookup: &dyn Fn(&str) -> Option<String>,
    out: &mut String,
) -> Result<(), SyntaxError> {
    match chars.peek() {
        Some('{') => {
            chars.next();
            let body = read_braced(chars)?;
            expand_braced(&body, lookup, out)
        }
        Some(&c) if c.is_ascii_alphabetic() || c == '_' => {
            let mut name = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push_str(&lookup(&name).unwrap_or_default());
            Ok(())
        }
        Some('(') => {
            chars.next();
            copy_parenthesized(chars, out)
        }
        // `$1`, `$?` and a trailing `$` are kept literally
        _ => {
            out.push('$');
            Ok(())
        }
    }
}

/// Copy `$(...)` verbatim up to the matching close parenthesis
fn copy_parenthesized(
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> Result<(), SyntaxError> {
    let mut depth = 0usize;
    out.push_str("$(");
    for c in chars.by_ref() {
        out.push(c);
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok(()),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(SyntaxError::UnterminatedSubstitution)
}

/// Copy a backtick substitution verbatim, the opening backtick already read
fn copy_backticks(
    chars: &mut Peekable<Chars<'_>>,
    out: &mut String,
) -> Result<(), SyntaxError> {
    out.push('`');
    for c in chars.by_ref() {
        out.push(c);
        if c == '`' {
            return Ok(());
        }
    }
    Err(SyntaxError::UnterminatedSubstitution)
}

/// Read the body of `${...}` up to the matching close brace
fn read_braced(chars: &mut Peekable<Chars<'_>>) -> Result<String, SyntaxError> {
    let mut depth = 0usize;
    let mut body = String::new();
    for c in chars.by_ref() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Ok(body),
            '}' => depth -= 1,
            _ => {}
        }
        body.push(c);
    }
    Err(SyntaxError::UnterminatedBrace)
}

fn expand_braced(
    body: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    out: &mut String,
) -> Result<(), SyntaxError> {
    let name_len = body
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(body.len(), |(idx, _)| idx);
    let (name, rest) = body.split_at(name_len);

    if !is_name(name) {
        out.push_str("${");
        out.push_str(body);
        out.push('}');
        return Ok(());
    }

    let value = lookup(name);
    let (default, use_default) = if let Some(default) = rest.strip_prefix(":-") {
        (default, value.as_deref().is_none_or(str::is_empty))
    } else if let Some(default) = rest.strip_prefix('-') {
        (default, value.is_none())
    } else if rest.is_empty() {
        ("", false)
    } else {
        // Other parameter operators are not part of the grammar
        out.push_str("${");
        out.push_str(body);
        out.push('}');
        return Ok(());
    };

    if use_default {
        let mut chars = default.chars().peekable();
        expand_into(&mut chars, lookup, out, false)
    } else {
        out.push_str(&value.unwrap_or_default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn expand_with(raw: &str, vars: &[(&str, &str)]) -> Result<String, SyntaxError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        expand_word(raw, &|name| vars.get(name).cloned())
    }

    #[test]
    fn test_is_name() {
        assert!(is_name("VMID"));
        assert!(is_name("_private"));
        assert!(is_name("CPU_SOCKETS2"));
        assert!(!is_name(""));
        assert!(!is_name("2FAST"));
        assert!(!is_name("WITH-DASH"));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("VMID=100"), Some(("VMID", "100")));
        assert_eq!(parse_assignment("  STORAGE=pool0"), Some(("STORAGE", "pool0")));
        assert_eq!(parse_assignment("export TAGS=a,b"), Some(("TAGS", "a,b")));
        assert_eq!(parse_assignment("EMPTY="), Some(("EMPTY", "")));
        assert_eq!(parse_assignment("# VMID=100"), None);
        assert_eq!(parse_assignment("VMID = 100"), None);
        assert_eq!(parse_assignment("echo hello"), None);
        assert_eq!(parse_assignment("exporter=1"), Some(("exporter", "1")));
    }

    #[test]
    fn test_scan_declared_keys_keeps_first_order() {
        let text = "\
# comment
VMID=100
STORAGE=
export TAGS=\"a,b\"
VMID=200
not an assignment
";
        assert_eq!(scan_declared_keys(text), vec!["VMID", "STORAGE", "TAGS"]);
    }

    #[test]
    fn test_assignments_report_line_numbers() {
        let text = "\n# header\nA=1\n\nB=2\n";
        let lines: Vec<(usize, &str)> = assignments(text).map(|a| (a.line, a.key)).collect();
        assert_eq!(lines, vec![(3, "A"), (5, "B")]);
    }

    #[test]
    fn test_expand_plain_and_quoted() {
        assert_eq!(expand_with("pool0", &[]).unwrap(), "pool0");
        assert_eq!(expand_with("\"Ubuntu 24.04\"", &[]).unwrap(), "Ubuntu 24.04");
        assert_eq!(expand_with("'$NOT_EXPANDED'", &[]).unwrap(), "$NOT_EXPANDED");
        assert_eq!(expand_with("value # trailing", &[]).unwrap(), "value");
        assert_eq!(expand_with("a\\ b", &[]).unwrap(), "a b");
    }

    #[test]
    fn test_expand_variables() {
        let vars = [("BASE", "https://example.org"), ("REL", "noble")];
        assert_eq!(
            expand_with("${BASE}/$REL/img", &vars).unwrap(),
            "https://example.org/noble/img"
        );
        assert_eq!(
            expand_with("\"$REL-server\"", &vars).unwrap(),
            "noble-server"
        );
        assert_eq!(expand_with("$MISSING", &vars).unwrap(), "");
    }

    #[test]
    fn test_expand_defaults() {
        let vars = [("SET", "x"), ("EMPTY", "")];
        assert_eq!(expand_with("${SET:-d}", &vars).unwrap(), "x");
        assert_eq!(expand_with("${EMPTY:-d}", &vars).unwrap(), "d");
        assert_eq!(expand_with("${EMPTY-d}", &vars).unwrap(), "");
        assert_eq!(expand_with("${UNSET-d}", &vars).unwrap(), "d");
        assert_eq!(expand_with("${UNSET:-${SET}y}", &vars).unwrap(), "xy");
        assert_eq!(expand_with("\"${UNSET:-two words}\"", &vars).unwrap(), "two words");
    }

    #[test]
    fn test_command_substitution_is_literal() {
        assert_eq!(expand_with("$(hostname)", &[]).unwrap(), "$(hostname)");
        assert_eq!(expand_with("$(hostname -f)", &[]).unwrap(), "$(hostname -f)");
        assert_eq!(
            expand_with("img-$(date +%F)-$(echo $(id -u))", &[]).unwrap(),
            "img-$(date +%F)-$(echo $(id -u))"
        );
        assert_eq!(expand_with("`date +%F` rest", &[]).unwrap(), "`date +%F`");
        assert_eq!(
            expand_with("\"built $(date -u) on `hostname -s`\"", &[]).unwrap(),
            "built $(date -u) on `hostname -s`"
        );
        assert!(has_command_substitution("$(hostname)"));
        assert!(has_command_substitution("`date`"));
        assert!(!has_command_substitution("${HOST}"));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            expand_with("\"open", &[]),
            Err(SyntaxError::UnterminatedQuote('"'))
        );
        assert_eq!(
            expand_with("'open", &[]),
            Err(SyntaxError::UnterminatedQuote('\''))
        );
        assert_eq!(
            expand_with("${OPEN", &[]),
            Err(SyntaxError::UnterminatedBrace)
        );
        assert_eq!(
            expand_with("$(hostname -f", &[]),
            Err(SyntaxError::UnterminatedSubstitution)
        );
        assert_eq!(
            expand_with("`date", &[]),
            Err(SyntaxError::UnterminatedSubstitution)
        );
    }
}
