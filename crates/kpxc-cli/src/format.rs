//! Entry formatting for plain-text output.
//!
//! Placeholders: `%n` name, `%l` login, `%p` password, `%u` uuid,
//! `%F:<field>` custom string field (any `KPH: ` prefix dropped from the
//! field name), `%%` a literal percent. Anything else is copied as-is.

use anyhow::{bail, Result};
use kpxc_common::LoginEntry;

const FIELD_PREFIX: &str = "KPH: ";

/// Render every entry through `format`, concatenated in order.
pub fn format_entries(format: &str, entries: &[LoginEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        format_entry(format, entry, &mut out);
    }
    out
}

fn format_entry(format: &str, entry: &LoginEntry, out: &mut String) {
    let mut rest = format;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let (value, consumed) = match rest.as_bytes().get(1) {
            Some(b'%') => ("%", 2),
            Some(b'n') => (entry.name.as_str(), 2),
            Some(b'l') => (entry.login.as_str(), 2),
            Some(b'p') => (entry.password.as_str(), 2),
            Some(b'u') => (entry.uuid.as_str(), 2),
            Some(b'F') if rest[2..].starts_with(':') => match field(entry, &rest[3..]) {
                Some((name_len, value)) => (value, 3 + name_len),
                None => ("%", 1),
            },
            _ => ("%", 1),
        };
        out.push_str(value);
        rest = &rest[consumed..];
    }
    out.push_str(rest);
}

/// The longest custom field name that prefixes `input`, with its value.
fn field<'e>(entry: &'e LoginEntry, input: &str) -> Option<(usize, &'e str)> {
    entry
        .string_fields
        .iter()
        .flatten()
        .map(|(key, value)| (key.strip_prefix(FIELD_PREFIX).unwrap_or(key.as_str()), value))
        .filter(|(name, _)| !name.is_empty() && input.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(name, value)| (name.len(), value.as_str()))
}

/// One TOTP code as a line of output.
pub fn format_totp(code: &str) -> String {
    format!("{}\n", code)
}

/// Expand backslash escapes in a user-supplied format string.
///
/// Accepts the C-style single-character escapes, `\xhh`, three-digit octal
/// `\ooo`, `\uXXXX`, `\UXXXXXXXX` and `\u{...}`. Byte escapes must stay
/// within ASCII so the result is valid UTF-8.
pub fn unescape(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('a') => '\x07',
            Some('b') => '\x08',
            Some('f') => '\x0c',
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('v') => '\x0b',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('x') => ascii(hex_digits(&mut chars, 2, 'x')?)?,
            Some('u') if chars.peek() == Some(&'{') => {
                chars.next();
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(d) if d.is_ascii_hexdigit() && digits.len() < 6 => digits.push(d),
                        _ => bail!("malformed `\\u{{...}}` escape in format"),
                    }
                }
                if digits.is_empty() {
                    bail!("empty `\\u{{}}` escape in format");
                }
                scalar(u32::from_str_radix(&digits, 16)?)?
            }
            Some('u') => scalar(hex_digits(&mut chars, 4, 'u')?)?,
            Some('U') => scalar(hex_digits(&mut chars, 8, 'U')?)?,
            Some(first @ '0'..='7') => {
                let mut value = first.to_digit(8).unwrap_or(0);
                let mut len = 1;
                while len < 3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            len += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                match (first, len) {
                    ('0', 1) => '\0',
                    (_, 3) => ascii(value)?,
                    _ => bail!("octal escape needs three digits in format"),
                }
            }
            Some(other) => bail!("invalid escape sequence `\\{}` in format", other),
            None => bail!("format ends with a lone backslash"),
        };
        out.push(escaped);
    }
    Ok(out)
}

fn hex_digits(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    count: usize,
    escape: char,
) -> Result<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        match chars.next().and_then(|d| d.to_digit(16)) {
            Some(d) => value = value * 16 + d,
            None => bail!("`\\{}` escape needs {} hex digits in format", escape, count),
        }
    }
    Ok(value)
}

fn ascii(value: u32) -> Result<char> {
    match u8::try_from(value) {
        Ok(byte) if byte.is_ascii() => Ok(char::from(byte)),
        _ => bail!("byte escape {:#x} in format is not ASCII", value),
    }
}

fn scalar(value: u32) -> Result<char> {
    match char::from_u32(value) {
        Some(c) => Ok(c),
        None => bail!("escape {:#x} in format is not a unicode scalar value", value),
    }
}
