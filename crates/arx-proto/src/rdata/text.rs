//! TXT rdata.

use crate::error::{Error, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text rdata: one or more character-strings of at most 255 octets
/// each (RFC 1035).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Txt {
    strings: Vec<Vec<u8>>,
}

impl Txt {
    /// Creates TXT rdata from pre-split character-strings.
    ///
    /// Strings longer than 255 octets are split.
    pub fn new(strings: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        let mut out = Vec::new();
        for s in strings {
            let s = s.into();
            if s.is_empty() {
                out.push(s);
            } else {
                for chunk in s.chunks(255) {
                    out.push(chunk.to_vec());
                }
            }
        }
        Self { strings: out }
    }

    /// Creates TXT rdata from a single text value, splitting into
    /// 255-octet character-strings as needed.
    pub fn from_text(text: impl Into<Vec<u8>>) -> Self {
        Self::new([text.into()])
    }

    /// Returns the character-strings.
    pub fn strings(&self) -> &[Vec<u8>] {
        &self.strings
    }

    /// Joins all character-strings into one value.
    pub fn joined(&self) -> Vec<u8> {
        self.strings.concat()
    }

    /// Parses from exactly the rdata bytes.
    pub fn parse(rdata: &[u8]) -> Result<Self> {
        let mut strings = Vec::new();
        let mut pos = 0;
        while pos < rdata.len() {
            let len = rdata[pos] as usize;
            pos += 1;
            if pos + len > rdata.len() {
                return Err(Error::rdata("TXT", "character-string past rdata end"));
            }
            strings.push(rdata[pos..pos + len].to_vec());
            pos += len;
        }
        if strings.is_empty() {
            return Err(Error::rdata("TXT", "empty rdata"));
        }
        Ok(Self { strings })
    }

    /// Parses presentation form: a sequence of (possibly quoted)
    /// strings.
    pub fn parse_presentation(tokens: &[&str]) -> Result<Self> {
        let joined = tokens.join(" ");
        let strings = split_char_strings(&joined)?;
        if strings.is_empty() {
            return Err(Error::rdata("TXT", "no strings"));
        }
        Ok(Self::new(strings))
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.strings.iter().map(|s| 1 + s.len()).sum()
    }

    /// Appends the rdata in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        for s in &self.strings {
            buf.extend_from_slice(&[s.len() as u8]);
            buf.extend_from_slice(s);
        }
    }
}

/// Splits presentation text into character-strings, honoring quotes
/// and backslash escapes.
fn split_char_strings(input: &str) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    let mut in_quotes = false;
    let mut any = false;
    let mut chars = input.bytes();

    while let Some(c) = chars.next() {
        match c {
            b'"' => {
                if in_quotes {
                    out.push(std::mem::take(&mut current));
                    in_quotes = false;
                } else {
                    in_quotes = true;
                    any = true;
                }
            }
            b'\\' => {
                let next = chars
                    .next()
                    .ok_or_else(|| Error::rdata("TXT", "dangling escape"))?;
                current.push(next);
            }
            b' ' | b'\t' if !in_quotes => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            other => {
                current.push(other);
                any = true;
            }
        }
    }
    if in_quotes {
        return Err(Error::rdata("TXT", "unterminated quote"));
    }
    if !current.is_empty() || (any && out.is_empty()) {
        out.push(current);
    }
    Ok(out)
}

impl fmt::Display for Txt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for s in &self.strings {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str("\"")?;
            for &byte in s {
                match byte {
                    b'"' | b'\\' => write!(f, "\\{}", byte as char)?,
                    0x20..=0x7e => write!(f, "{}", byte as char)?,
                    _ => write!(f, "\\{byte:03}")?,
                }
            }
            f.write_str("\"")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_long_strings() {
        let txt = Txt::from_text(vec![b'x'; 600]);
        let lens: Vec<usize> = txt.strings().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![255, 255, 90]);
        assert_eq!(txt.joined().len(), 600);
    }

    #[test]
    fn presentation_roundtrip() {
        let txt = Txt::new(["hello world", "second"]);
        let text = txt.to_string();
        assert_eq!(text, "\"hello world\" \"second\"");
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let parsed = Txt::parse_presentation(&tokens).unwrap();
        assert_eq!(parsed, txt);
    }

    #[test]
    fn unquoted_presentation() {
        let parsed = Txt::parse_presentation(&["plain"]).unwrap();
        assert_eq!(parsed.strings(), &[b"plain".to_vec()]);
    }

    #[test]
    fn wire_roundtrip() {
        let txt = Txt::new(["a", "bc"]);
        let mut buf = BytesMut::new();
        txt.write_to(&mut buf);
        assert_eq!(Txt::parse(&buf).unwrap(), txt);
    }
}
