//! DNS messages.
//!
//! One `Message` type serves both the query form (question / answer /
//! authority / additional) and the RFC 2136 update form (zone /
//! prerequisite / update / additional); the update accessors are
//! aliases over the same sections.

use crate::class::RecordClass;
use crate::edns::Edns;
use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::name::Name;
use crate::opcode::OpCode;
use crate::question::{Question, QuestionParser};
use crate::rcode::ResponseCode;
use crate::rdata::RData;
use crate::record::{RecordParser, ResourceRecord};
use crate::rtype::RecordType;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
    edns: Option<Edns>,
    /// TSIG record, if the message was signed. Always the last record
    /// of the additional section on the wire.
    tsig: Option<ResourceRecord>,
}

impl Message {
    /// Creates an empty message with the given header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
            edns: None,
            tsig: None,
        }
    }

    /// Creates a query for one question.
    pub fn query(id: u16, question: Question) -> Self {
        let mut msg = Self::new(Header::new(id));
        msg.add_question(question);
        msg
    }

    /// Creates an RFC 2136 update message for a zone.
    pub fn update(id: u16, origin: Name) -> Self {
        let mut msg = Self::new(Header::new(id));
        msg.header.opcode = OpCode::Update;
        msg.add_question(Question::zone(origin));
        msg
    }

    /// Creates a response echoing a query's id, question, and EDNS
    /// presence.
    pub fn response_from(query: &Message) -> Self {
        let mut msg = Self::new(Header::response_from(&query.header));
        msg.questions = query.questions.clone();
        msg.header.qd_count = msg.questions.len() as u16;
        if query.edns.is_some() {
            msg.edns = Some(Edns::new());
        }
        msg
    }

    // Header access ------------------------------------------------------

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a mutable header.
    #[inline]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the message id.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Returns the opcode.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Returns the response code.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    #[inline]
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// Sets the AA bit.
    #[inline]
    pub fn set_authoritative(&mut self, aa: bool) {
        self.header.set_authoritative(aa);
    }

    // Query-form sections ------------------------------------------------

    /// Returns the question section.
    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns the first question, if present.
    #[inline]
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the answer section.
    #[inline]
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Returns the additional section, excluding OPT and TSIG.
    #[inline]
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    // Update-form aliases (RFC 2136 section 2) ---------------------------

    /// Returns the zone section entry of an update message.
    #[inline]
    pub fn zone(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the prerequisite section of an update message.
    #[inline]
    pub fn prerequisites(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Returns the update section of an update message.
    #[inline]
    pub fn updates(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Appends a record to the update section.
    pub fn add_update(&mut self, record: ResourceRecord) {
        self.add_authority(record);
    }

    // EDNS and TSIG ------------------------------------------------------

    /// Returns the EDNS state, if the message carried an OPT record.
    #[inline]
    pub fn edns(&self) -> Option<&Edns> {
        self.edns.as_ref()
    }

    /// Attaches or removes EDNS state.
    #[inline]
    pub fn set_edns(&mut self, edns: Option<Edns>) {
        self.edns = edns;
    }

    /// Returns the maximum response payload implied by the EDNS state,
    /// for UDP responders.
    pub fn max_udp_payload(&self) -> usize {
        self.edns
            .as_ref()
            .map(|e| e.udp_size() as usize)
            .unwrap_or(crate::MAX_UDP_MESSAGE_SIZE)
    }

    /// Returns the TSIG record, if the message was signed.
    #[inline]
    pub fn tsig(&self) -> Option<&ResourceRecord> {
        self.tsig.as_ref()
    }

    /// Returns the TSIG key name, if the message was signed.
    pub fn tsig_key_name(&self) -> Option<&Name> {
        self.tsig.as_ref().map(ResourceRecord::name)
    }

    /// Attaches a TSIG record. The record is emitted last on the wire.
    pub fn set_tsig(&mut self, record: Option<ResourceRecord>) {
        self.tsig = record;
    }

    // Mutation -----------------------------------------------------------

    /// Appends a question.
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
        self.header.qd_count = self.questions.len() as u16;
    }

    /// Appends an answer record.
    pub fn add_answer(&mut self, record: ResourceRecord) {
        self.answers.push(record);
        self.header.an_count = self.answers.len() as u16;
    }

    /// Appends answer records.
    pub fn add_answers(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.answers.extend(records);
        self.header.an_count = self.answers.len() as u16;
    }

    /// Appends an authority record.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Appends authority records.
    pub fn add_authority_records(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.authority.extend(records);
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Appends an additional record.
    pub fn add_additional(&mut self, record: ResourceRecord) {
        self.additional.push(record);
    }

    // Wire format --------------------------------------------------------

    /// Parses a message from wire bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;
        let mut offset = HEADER_SIZE;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        let mut q_parser = QuestionParser::new(data, offset, header.qd_count);
        while let Some(q) = q_parser.next()? {
            questions.push(q);
        }
        offset = q_parser.offset();

        let mut sections: [Vec<ResourceRecord>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for (section, count) in sections
            .iter_mut()
            .zip([header.an_count, header.ns_count, header.ar_count])
        {
            let mut parser = RecordParser::new(data, offset, count);
            while let Some(r) = parser.next()? {
                section.push(r);
            }
            offset = parser.offset();
        }
        let [answers, authority, mut additional] = sections;

        // TSIG, when present, must be the last record of the message.
        let has_tsig = matches!(
            additional.last(),
            Some(rr) if rr.record_type() == Some(RecordType::TSIG)
        );
        let tsig = if has_tsig { additional.pop() } else { None };

        let mut edns = None;
        additional.retain(|rr| {
            if rr.record_type() == Some(RecordType::OPT) {
                if edns.is_none() {
                    let mut rdata = BytesMut::new();
                    rr.rdata().write_to(&mut rdata);
                    edns = Edns::from_opt(rr.rclass().to_u16(), rr.ttl(), &rdata).ok();
                }
                false
            } else {
                true
            }
        });

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
            edns,
            tsig,
        })
    }

    /// Returns the wire length.
    pub fn wire_len(&self) -> usize {
        let mut len = HEADER_SIZE;
        len += self.questions.iter().map(Question::wire_len).sum::<usize>();
        len += self.answers.iter().map(ResourceRecord::wire_len).sum::<usize>();
        len += self.authority.iter().map(ResourceRecord::wire_len).sum::<usize>();
        len += self.additional.iter().map(ResourceRecord::wire_len).sum::<usize>();
        if let Some(edns) = &self.edns {
            len += edns.wire_len();
        }
        if let Some(tsig) = &self.tsig {
            len += tsig.wire_len();
        }
        len
    }

    /// Serializes to wire bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());

        let mut header = self.header.clone();
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authority.len() as u16;
        header.ar_count = self.additional.len() as u16
            + self.edns.is_some() as u16
            + self.tsig.is_some() as u16;
        header.write_to(&mut buf);

        for q in &self.questions {
            q.write_to(&mut buf);
        }
        for r in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            r.write_to(&mut buf);
        }
        if let Some(edns) = &self.edns {
            edns.write_to(&mut buf);
        }
        if let Some(tsig) = &self.tsig {
            tsig.write_to(&mut buf);
        }
        buf.freeze()
    }

    /// Drops records until the message fits `max_size`, setting TC if
    /// anything was removed. The TSIG record, if any, is preserved.
    pub fn truncate_to(&mut self, max_size: usize) {
        let mut dropped = false;
        while self.wire_len() > max_size {
            let removed = self
                .additional
                .pop()
                .or_else(|| self.authority.pop())
                .or_else(|| self.answers.pop());
            match removed {
                Some(_) => dropped = true,
                None => break,
            }
        }
        if dropped {
            self.header.set_truncated(true);
        }
        self.header.an_count = self.answers.len() as u16;
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Builds a minimal error response for a raw query.
    pub fn error_response(query: &Message, rcode: ResponseCode) -> Self {
        let mut msg = Self::response_from(query);
        msg.set_rcode(rcode);
        msg
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Header::default())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; {}", self.header)?;
        for q in &self.questions {
            writeln!(f, ";{q}")?;
        }
        for r in &self.answers {
            writeln!(f, "{r}")?;
        }
        for r in &self.authority {
            writeln!(f, "{r}")?;
        }
        for r in &self.additional {
            writeln!(f, "{r}")?;
        }
        Ok(())
    }
}

/// Scans raw message bytes and returns the byte range of the final TSIG
/// record, if one is present.
///
/// TSIG MACs cover the wire form of a message, so verification needs the
/// untouched bytes rather than the parsed structure; this helper finds
/// where the signed portion ends.
pub fn tsig_boundary(data: &[u8]) -> Result<Option<(usize, ResourceRecord)>> {
    let header = Header::parse(data)?;
    if header.ar_count == 0 {
        return Ok(None);
    }

    let mut offset = HEADER_SIZE;
    let mut q_parser = QuestionParser::new(data, offset, header.qd_count);
    while q_parser.next()?.is_some() {}
    offset = q_parser.offset();

    let mut last_start = offset;
    let mut last = None;
    for count in [header.an_count, header.ns_count, header.ar_count] {
        let mut parser = RecordParser::new(data, offset, count);
        for _ in 0..count {
            last_start = parser.offset();
            last = parser.next()?;
            if last.is_none() {
                return Err(Error::buffer_too_short(last_start, data.len()));
            }
        }
        offset = parser.offset();
    }

    match last {
        Some(rr) if rr.record_type() == Some(RecordType::TSIG) => Ok(Some((last_start, rr))),
        _ => Ok(None),
    }
}

/// A record with empty rdata, as used in delete-rrset updates.
pub fn empty_rr(name: Name, rtype: RecordType, rclass: RecordClass) -> ResourceRecord {
    ResourceRecord::new(
        name,
        crate::rtype::Type::Known(rtype),
        crate::class::Class::Known(rclass),
        0,
        RData::Empty(rtype.to_u16()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdata::Tsig;
    use crate::rtype::RecordType;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn a_question() -> Question {
        Question::new(
            Name::from_str("example.org.").unwrap(),
            RecordType::A,
            RecordClass::IN,
        )
    }

    #[test]
    fn query_roundtrip() {
        let mut query = Message::query(0x1234, a_question());
        query.set_edns(Some(Edns::new()));
        let wire = query.to_wire();
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.id(), 0x1234);
        assert_eq!(parsed.questions().len(), 1);
        assert!(parsed.edns().is_some());
        assert_eq!(parsed.max_udp_payload(), crate::EDNS_UDP_SIZE as usize);
    }

    #[test]
    fn update_sections_alias() {
        let origin = Name::from_str("example.org.").unwrap();
        let mut update = Message::update(1, origin.clone());
        update.add_update(ResourceRecord::a(
            Name::from_str("new.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(127, 0, 0, 1),
        ));

        assert_eq!(update.opcode(), OpCode::Update);
        assert_eq!(update.zone().unwrap().qname, origin);
        assert_eq!(update.updates().len(), 1);
        assert!(update.prerequisites().is_empty());

        let parsed = Message::parse(&update.to_wire()).unwrap();
        assert_eq!(parsed.updates().len(), 1);
    }

    #[test]
    fn truncation_sets_tc() {
        let mut msg = Message::response_from(&Message::query(9, a_question()));
        for i in 0..200 {
            msg.add_answer(ResourceRecord::a(
                Name::from_str(&format!("h{i}.example.org.")).unwrap(),
                60,
                Ipv4Addr::new(192, 0, 2, (i % 256) as u8),
            ));
        }
        msg.truncate_to(512);
        assert!(msg.wire_len() <= 512);
        assert!(msg.header().is_truncated());
    }

    #[test]
    fn tsig_parsed_as_last_record() {
        let mut msg = Message::query(7, a_question());
        let tsig_rr = ResourceRecord::new(
            Name::from_str("key.example.").unwrap(),
            crate::rtype::Type::Known(RecordType::TSIG),
            crate::class::Class::Known(RecordClass::ANY),
            0,
            RData::Tsig(Tsig {
                algorithm: Name::from_str("hmac-sha256.").unwrap(),
                time_signed: 1_700_000_000,
                fudge: 300,
                mac: vec![0xab; 32],
                original_id: 7,
                error: 0,
                other: Vec::new(),
            }),
        );
        msg.set_tsig(Some(tsig_rr));

        let wire = msg.to_wire();
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(
            parsed.tsig_key_name().unwrap().to_string(),
            "key.example."
        );

        let boundary = tsig_boundary(&wire).unwrap();
        assert!(boundary.is_some());
    }
}
