//! Line-oriented `key=value` text codec
//!
//! The format shared by scope files and export streams:
//! - one entry per logical line, `key=value`, `key:value` or `key value`
//! - `#` and `!` start comment lines
//! - a trailing odd backslash continues the logical line
//! - escapes `\t \n \r \f \\ \uXXXX`, any other escaped char stands for itself
//!
//! Writing sorts keys so files diff cleanly.

use crate::error::{PreferenceError, Result};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Reserved key holding the format version of a scope file
pub const VERSION_KEY: &str = "preferences.version";

/// Format version written to scope files
pub const VERSION_VALUE: &str = "1";

/// Reserved key holding the format version of an export stream
pub const EXPORT_VERSION_KEY: &str = "file_export_version";

/// Format version written to export streams
pub const EXPORT_VERSION_VALUE: &str = "3.0";

/// Ordered entries of a properties document
pub type Properties = BTreeMap<String, String>;

/// Problem found while reading leniently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line where the logical line started
    pub line: usize,
    /// Description of the problem
    pub message: String,
}

/// Result of a lenient read
#[derive(Debug, Clone, Default)]
pub struct ParsedProperties {
    /// Entries that parsed
    pub entries: Properties,
    /// Lines that were skipped
    pub issues: Vec<ParseIssue>,
}

/// Parse a document, failing on the first malformed line
///
/// # Errors
/// Returns [`PreferenceError::Malformed`] for a bad escape sequence
pub fn parse(input: &str) -> Result<Properties> {
    let parsed = parse_lenient(input);
    match parsed.issues.into_iter().next() {
        Some(issue) => Err(PreferenceError::malformed(issue.line, issue.message)),
        None => Ok(parsed.entries),
    }
}

/// Parse a document, collecting malformed lines instead of failing
#[must_use]
pub fn parse_lenient(input: &str) -> ParsedProperties {
    let mut out = ParsedProperties::default();
    let mut lines = input.lines().enumerate().peekable();

    while let Some((index, raw)) = lines.next() {
        let start_line = index + 1;
        let first = raw.trim_start_matches(is_blank);
        if first.is_empty() || first.starts_with('#') || first.starts_with('!') {
            continue;
        }

        let mut logical = String::from(first);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        match parse_entry(&logical) {
            Ok((key, value)) => {
                out.entries.insert(key, value);
            }
            Err(message) => out.issues.push(ParseIssue {
                line: start_line,
                message,
            }),
        }
    }
    out
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn parse_entry(line: &str) -> std::result::Result<(String, String), String> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    let mut value_start = key_end;
    while value_start < chars.len() && is_blank(chars[value_start]) {
        value_start += 1;
    }
    if value_start < chars.len() && matches!(chars[value_start], '=' | ':') {
        value_start += 1;
        while value_start < chars.len() && is_blank(chars[value_start]) {
            value_start += 1;
        }
    }

    let key = unescape(&chars[..key_end])?;
    let value = unescape(&chars[value_start.min(chars.len())..])?;
    Ok((key, value))
}

fn unescape(chars: &[char]) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(&escaped) = chars.get(i) else {
            break;
        };
        i += 1;
        match escaped {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0c'),
            'u' => {
                let hex: String = chars.iter().skip(i).take(4).collect();
                if hex.len() != 4 {
                    return Err(format!("truncated \\u escape: '\\u{hex}'"));
                }
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("invalid \\u escape: '\\u{hex}'"))?;
                i += 4;
                let decoded = if (0xD800..0xDC00).contains(&code) {
                    decode_surrogate_pair(code, chars, &mut i)
                } else {
                    char::from_u32(code)
                };
                out.push(decoded.unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn decode_surrogate_pair(high: u32, chars: &[char], i: &mut usize) -> Option<char> {
    if chars.get(*i) != Some(&'\\') || chars.get(*i + 1) != Some(&'u') {
        return None;
    }
    let hex: String = chars.iter().skip(*i + 2).take(4).collect();
    let low = u32::from_str_radix(&hex, 16).ok()?;
    if !(0xDC00..0xE000).contains(&low) {
        return None;
    }
    *i += 6;
    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}

/// Serialize entries with sorted keys, one per line
#[must_use]
pub fn write(entries: &Properties) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        escape_into(&mut out, key, true);
        out.push('=');
        escape_into(&mut out, value, false);
        out.push('\n');
    }
    out
}

fn escape_into(out: &mut String, s: &str, is_key: bool) {
    for (index, c) in s.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if index == 0 => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_separators() {
        let props = parse("a=1\nb:2\nc 3\nd = 4\n").unwrap();
        assert_eq!(props["a"], "1");
        assert_eq!(props["b"], "2");
        assert_eq!(props["c"], "3");
        assert_eq!(props["d"], "4");
    }

    #[test]
    fn skips_comments_and_blanks() {
        let props = parse("# header\n! also\n\n   \nkey=value\n").unwrap();
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn key_without_value() {
        let props = parse("flag\n").unwrap();
        assert_eq!(props["flag"], "");
    }

    #[test]
    fn continuation_lines() {
        let props = parse("list=a,\\\n    b,\\\n    c\n").unwrap();
        assert_eq!(props["list"], "a,b,c");
    }

    #[test]
    fn escaped_backslash_is_not_continuation() {
        let props = parse("path=c:\\\\\nnext=1\n").unwrap();
        assert_eq!(props["path"], "c:\\");
        assert_eq!(props["next"], "1");
    }

    #[test]
    fn unicode_escapes() {
        let props = parse("greek=\\u03b1\\u03b2\nemoji=\\ud83d\\ude00\n").unwrap();
        assert_eq!(props["greek"], "αβ");
        assert_eq!(props["emoji"], "😀");
    }

    #[test]
    fn malformed_unicode_escape_is_reported() {
        let err = parse("ok=1\nbad=\\uZZ\n").unwrap_err();
        assert!(matches!(err, PreferenceError::Malformed { line: 2, .. }));
    }

    #[test]
    fn lenient_parse_keeps_good_entries() {
        let parsed = parse_lenient("a=1\nb=\\u12\nc=3\n");
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.issues.len(), 1);
        assert_eq!(parsed.issues[0].line, 2);
    }

    #[test]
    fn writes_sorted_and_escaped() {
        let mut props = Properties::new();
        props.insert("b key".into(), "x=y".into());
        props.insert("a:b".into(), " lead".into());
        let text = write(&props);
        assert_eq!(text, "a\\:b=\\ lead\nb\\ key=x=y\n");
    }

    #[test]
    fn slashes_pass_through() {
        let mut props = Properties::new();
        props.insert("/instance/app//a/b".into(), "x".into());
        let text = write(&props);
        assert_eq!(text, "/instance/app//a/b=x\n");
        assert_eq!(parse(&text).unwrap(), props);
    }

    proptest! {
        #[test]
        fn prop_escaping_survives_parse(
            key in "[a-z#! =:\\\\/]{1,8}",
            value in "[ -~\t\n\u{e9}\u{4e2d}]{0,12}",
        ) {
            let mut props = Properties::new();
            props.insert(key, value);
            let parsed = parse(&write(&props)).unwrap();
            prop_assert_eq!(parsed, props);
        }
    }
}
