//! The question section.

use crate::class::{Class, RecordClass};
use crate::error::Result;
use crate::name::{Name, NameParser};
use crate::rtype::{RecordType, Type};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single question (or, for UPDATE, the zone section entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The name being asked about.
    pub qname: Name,
    /// The type being asked for.
    pub qtype: Type,
    /// The class being asked for.
    pub qclass: Class,
}

impl Question {
    /// Creates a question with known type and class.
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype: Type::Known(qtype),
            qclass: Class::Known(qclass),
        }
    }

    /// Creates the zone-section entry of an UPDATE message: the zone
    /// origin with type SOA, class IN (RFC 2136 section 2.3).
    pub fn zone(origin: Name) -> Self {
        Self::new(origin, RecordType::SOA, RecordClass::IN)
    }

    /// Returns the known query type, if any.
    pub fn record_type(&self) -> Option<RecordType> {
        self.qtype.as_known()
    }

    /// Parses a question at `offset`, returning it and the bytes used.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (qname, name_len) = NameParser::new(message).parse_name(offset)?;
        let fixed = offset + name_len;
        if fixed + 4 > message.len() {
            return Err(crate::Error::buffer_too_short(fixed + 4, message.len()));
        }
        let qtype = Type::from_u16(u16::from_be_bytes([message[fixed], message[fixed + 1]]));
        let qclass = Class::from_u16(u16::from_be_bytes([message[fixed + 2], message[fixed + 3]]));
        Ok((
            Self {
                qname,
                qtype,
                qclass,
            },
            name_len + 4,
        ))
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        self.qname.wire_len() + 4
    }

    /// Appends the question in wire form.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.qname.write_wire(buf);
        buf.extend_from_slice(&self.qtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_u16().to_be_bytes());
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.qname, self.qclass, self.qtype)
    }
}

/// Cursor over the question section of a message.
#[derive(Debug)]
pub struct QuestionParser<'a> {
    message: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> QuestionParser<'a> {
    /// Creates a parser for `count` questions starting at `offset`.
    pub const fn new(message: &'a [u8], offset: usize, count: u16) -> Self {
        Self {
            message,
            offset,
            remaining: count,
        }
    }

    /// Returns the offset past the last parsed question.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Parses the next question.
    pub fn next(&mut self) -> Result<Option<Question>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let (question, used) = Question::parse(self.message, self.offset)?;
        self.offset += used;
        self.remaining -= 1;
        Ok(Some(question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roundtrip() {
        let q = Question::new(
            Name::from_str("example.org.").unwrap(),
            RecordType::AAAA,
            RecordClass::IN,
        );
        let mut buf = BytesMut::new();
        q.write_to(&mut buf);
        assert_eq!(buf.len(), q.wire_len());

        let (parsed, used) = Question::parse(&buf, 0).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(parsed, q);
    }

    #[test]
    fn zone_section_shape() {
        let z = Question::zone(Name::from_str("example.org.").unwrap());
        assert_eq!(z.record_type(), Some(RecordType::SOA));
        assert_eq!(z.qclass, Class::Known(RecordClass::IN));
    }
}
