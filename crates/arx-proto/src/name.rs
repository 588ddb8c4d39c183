//! Domain names.
//!
//! A [`Name`] is stored in uncompressed wire form: a sequence of
//! length-prefixed labels terminated by the root label. Comparisons are
//! case-insensitive and ordering follows the canonical form of RFC 4034
//! section 6.1, which is also the order records appear in zone transfers.

use crate::error::{Error, Result};
use crate::MAX_LABEL_LENGTH;
use crate::MAX_NAME_LENGTH;
use bytes::{Bytes, BytesMut};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A fully-qualified domain name.
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire form, always ending with the root label.
    wire: Bytes,
}

impl Name {
    /// The root name ".".
    pub fn root() -> Self {
        Self {
            wire: Bytes::from_static(&[0]),
        }
    }

    /// Builds a name from uncompressed wire bytes.
    ///
    /// The bytes must be a well-formed sequence of labels ending with the
    /// root label and no compression pointers.
    pub fn from_wire(wire: impl Into<Bytes>) -> Result<Self> {
        let wire = wire.into();
        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong(wire.len()));
        }
        let mut pos = 0;
        loop {
            let len = *wire.get(pos).ok_or(Error::buffer_too_short(pos + 1, wire.len()))? as usize;
            if len == 0 {
                if pos + 1 != wire.len() {
                    return Err(Error::presentation("trailing bytes after root label"));
                }
                return Ok(Self { wire });
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong(len));
            }
            pos += 1 + len;
            if pos >= wire.len() {
                return Err(Error::buffer_too_short(pos + 1, wire.len()));
            }
        }
    }

    /// Returns the raw wire form.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the length of the wire form in octets.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns true if this is the root name.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// Returns the number of labels, excluding the root.
    pub fn label_count(&self) -> usize {
        self.labels().count()
    }

    /// Iterates over the labels from left to right.
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            wire: &self.wire,
            pos: 0,
        }
    }

    /// Returns the name with the leftmost label removed, or `None` for
    /// the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let skip = 1 + self.wire[0] as usize;
        Some(Self {
            wire: self.wire.slice(skip..),
        })
    }

    /// Returns a new name with `label` prepended.
    pub fn prepend_label(&self, label: &str) -> Result<Self> {
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(Error::LabelTooLong(label.len()));
        }
        let mut wire = BytesMut::with_capacity(1 + label.len() + self.wire.len());
        wire.extend_from_slice(&[label.len() as u8]);
        wire.extend_from_slice(label.as_bytes());
        wire.extend_from_slice(&self.wire);
        Self::from_wire(wire.freeze())
    }

    /// Returns true if `self` equals `other` or sits below it in the
    /// name hierarchy. Every name is a subdomain of the root.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        let mine: Vec<&[u8]> = self.labels().collect();
        let theirs: Vec<&[u8]> = other.labels().collect();
        if theirs.len() > mine.len() {
            return false;
        }
        mine.iter()
            .rev()
            .zip(theirs.iter().rev())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Appends this name to `buf` in wire form, uncompressed.
    pub fn write_wire(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }

    /// Appends this name in the canonical (lowercased) form used for
    /// TSIG and DNSSEC digests.
    pub fn write_canonical(&self, buf: &mut BytesMut) {
        for byte in self.wire.iter() {
            buf.extend_from_slice(&[byte.to_ascii_lowercase()]);
        }
        // Label lengths are below 0x41, so blanket lowercasing only
        // touches label content.
    }
}

/// Iterator over the labels of a name.
#[derive(Debug, Clone)]
pub struct Labels<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let len = *self.wire.get(self.pos)? as usize;
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        Some(&self.wire[start..start + len])
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses dotted presentation form. `\.` escapes a literal dot and
    /// `\DDD` a decimal octet. A missing trailing dot is accepted; the
    /// resulting name is always fully qualified.
    fn from_str(s: &str) -> Result<Self> {
        if s == "." || s.is_empty() {
            return Ok(Self::root());
        }
        let mut wire = BytesMut::with_capacity(s.len() + 2);
        let mut label: Vec<u8> = Vec::with_capacity(MAX_LABEL_LENGTH);
        let mut chars = s.bytes().peekable();

        let mut flush = |label: &mut Vec<u8>, wire: &mut BytesMut| -> Result<()> {
            if label.is_empty() {
                return Err(Error::presentation(format!("empty label in {s:?}")));
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong(label.len()));
            }
            wire.extend_from_slice(&[label.len() as u8]);
            wire.extend_from_slice(label);
            label.clear();
            Ok(())
        };

        while let Some(c) = chars.next() {
            match c {
                b'.' => flush(&mut label, &mut wire)?,
                b'\\' => {
                    let next = chars
                        .next()
                        .ok_or_else(|| Error::presentation("dangling escape"))?;
                    if next.is_ascii_digit() {
                        let d2 = chars.next().filter(u8::is_ascii_digit);
                        let d3 = chars.next().filter(u8::is_ascii_digit);
                        match (d2, d3) {
                            (Some(d2), Some(d3)) => {
                                let value = (next - b'0') as u16 * 100
                                    + (d2 - b'0') as u16 * 10
                                    + (d3 - b'0') as u16;
                                if value > 255 {
                                    return Err(Error::presentation("escape out of range"));
                                }
                                label.push(value as u8);
                            }
                            _ => return Err(Error::presentation("bad decimal escape")),
                        }
                    } else {
                        label.push(next);
                    }
                }
                other => label.push(other),
            }
        }
        if !label.is_empty() {
            flush(&mut label, &mut wire)?;
        }
        wire.extend_from_slice(&[0]);
        Self::from_wire(wire.freeze())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &byte in label {
                match byte {
                    b'.' | b'\\' => write!(f, "\\{}", byte as char)?,
                    0x21..=0x7e => write!(f, "{}", byte as char)?,
                    _ => write!(f, "\\{byte:03}")?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.wire.len() == other.wire.len()
            && self
                .wire
                .iter()
                .zip(other.wire.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.wire.iter() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    /// Canonical DNS ordering per RFC 4034: labels compared right to
    /// left, lowercased, as octet strings.
    fn cmp(&self, other: &Self) -> Ordering {
        let mine: Vec<&[u8]> = self.labels().collect();
        let theirs: Vec<&[u8]> = other.labels().collect();

        for (a, b) in mine.iter().rev().zip(theirs.iter().rev()) {
            let cmp = a
                .iter()
                .map(u8::to_ascii_lowercase)
                .cmp(b.iter().map(u8::to_ascii_lowercase));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        mine.len().cmp(&theirs.len())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Name::from_str(&s).map_err(D::Error::custom)
    }
}

/// Parses names out of a full DNS message, following compression
/// pointers (RFC 1035 section 4.1.4).
#[derive(Debug, Clone, Copy)]
pub struct NameParser<'a> {
    message: &'a [u8],
}

impl<'a> NameParser<'a> {
    /// Creates a parser over a complete message buffer.
    pub fn new(message: &'a [u8]) -> Self {
        Self { message }
    }

    /// Parses the name starting at `offset`.
    ///
    /// Returns the name and the number of bytes the name occupies at
    /// `offset` (pointers count as two bytes).
    pub fn parse_name(&self, offset: usize) -> Result<(Name, usize)> {
        let mut wire = BytesMut::with_capacity(32);
        let mut pos = offset;
        let mut consumed = None;
        let mut jumps = 0usize;

        loop {
            let len = *self
                .message
                .get(pos)
                .ok_or(Error::buffer_too_short(pos + 1, self.message.len()))?;
            match len {
                0 => {
                    wire.extend_from_slice(&[0]);
                    let used = consumed.unwrap_or(pos + 1 - offset);
                    return Ok((Name::from_wire(wire.freeze())?, used));
                }
                1..=63 => {
                    let end = pos + 1 + len as usize;
                    if end > self.message.len() {
                        return Err(Error::buffer_too_short(end, self.message.len()));
                    }
                    wire.extend_from_slice(&self.message[pos..end]);
                    if wire.len() > MAX_NAME_LENGTH {
                        return Err(Error::NameTooLong(wire.len()));
                    }
                    pos = end;
                }
                0xc0..=0xff => {
                    let low = *self
                        .message
                        .get(pos + 1)
                        .ok_or(Error::buffer_too_short(pos + 2, self.message.len()))?;
                    let target = (((len & 0x3f) as usize) << 8) | low as usize;
                    // Pointers must go backwards; anything else loops.
                    if target >= pos {
                        return Err(Error::BadPointer(pos));
                    }
                    jumps += 1;
                    if jumps > 64 {
                        return Err(Error::BadPointer(pos));
                    }
                    if consumed.is_none() {
                        consumed = Some(pos + 2 - offset);
                    }
                    pos = target;
                }
                other => return Err(Error::BadLabelType(other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let name = Name::from_str("www.Example.ORG.").unwrap();
        assert_eq!(name.to_string(), "www.Example.ORG.");
        assert_eq!(name.label_count(), 3);
        assert!(!name.is_root());
    }

    #[test]
    fn missing_trailing_dot_is_fqdn() {
        let a = Name::from_str("example.org").unwrap();
        let b = Name::from_str("example.org.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn case_insensitive_eq_and_hash() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Name::from_str("Example.Org.").unwrap(), 1);
        assert!(map.contains_key(&Name::from_str("example.org.").unwrap()));
    }

    #[test]
    fn parent_walk() {
        let name = Name::from_str("a.b.example.org.").unwrap();
        let parents: Vec<String> = std::iter::successors(Some(name), Name::parent)
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            parents,
            vec!["a.b.example.org.", "b.example.org.", "example.org.", "org.", "."]
        );
    }

    #[test]
    fn subdomain() {
        let apex = Name::from_str("example.org.").unwrap();
        assert!(Name::from_str("www.example.org.").unwrap().is_subdomain_of(&apex));
        assert!(apex.is_subdomain_of(&apex));
        assert!(!Name::from_str("example.com.").unwrap().is_subdomain_of(&apex));
        // Label boundaries matter: notexample.org is not under example.org.
        assert!(!Name::from_str("notexample.org.").unwrap().is_subdomain_of(&apex));
    }

    #[test]
    fn canonical_order() {
        let mut names: Vec<Name> = ["z.example.org.", "example.org.", "a.example.org.", "example.com."]
            .iter()
            .map(|s| Name::from_str(s).unwrap())
            .collect();
        names.sort();
        let sorted: Vec<String> = names.iter().map(Name::to_string).collect();
        assert_eq!(
            sorted,
            vec!["example.com.", "example.org.", "a.example.org.", "z.example.org."]
        );
    }

    #[test]
    fn compression_pointer() {
        // "www" + pointer to "example.org." at offset 0.
        let mut message = Vec::new();
        message.extend_from_slice(b"\x07example\x03org\x00");
        let start = message.len();
        message.extend_from_slice(b"\x03www\xc0\x00");

        let parser = NameParser::new(&message);
        let (name, used) = parser.parse_name(start).unwrap();
        assert_eq!(name.to_string(), "www.example.org.");
        assert_eq!(used, 6);
    }

    #[test]
    fn forward_pointer_rejected() {
        let message = b"\x03www\xc0\x20".to_vec();
        let parser = NameParser::new(&message);
        assert!(parser.parse_name(0).is_err());
    }

    #[test]
    fn escapes() {
        let name = Name::from_str(r"host\.a.example.org.").unwrap();
        assert_eq!(name.label_count(), 3);
        assert_eq!(name.to_string(), r"host\.a.example.org.");
    }
}
