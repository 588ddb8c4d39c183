//! Zone values: an ordered tree of nodes keyed by owner name.

use crate::{Result, ZoneError};
use arx_proto::{Name, RData, RecordType, ResourceRecord};
use std::collections::BTreeMap;

/// Outcome classification of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    /// The answer section holds matching records.
    Success,
    /// The name exists but has no records of the asked type.
    NoData,
    /// The name does not exist in the zone.
    NameError,
    /// The name is below a delegation point; the ns section holds the
    /// NS set.
    Delegation,
    /// The zone is unservable (no SOA).
    ServerFailure,
}

/// The three response sections a lookup fills, plus its result class.
#[derive(Debug, Clone)]
pub struct LookupAnswer {
    /// Answer records.
    pub answer: Vec<ResourceRecord>,
    /// Authority records (SOA for negative answers, NS for referrals).
    pub ns: Vec<ResourceRecord>,
    /// Additional records (delegation glue).
    pub extra: Vec<ResourceRecord>,
    /// The result class.
    pub result: LookupResult,
}

impl LookupAnswer {
    fn new(result: LookupResult) -> Self {
        Self {
            answer: Vec::new(),
            ns: Vec::new(),
            extra: Vec::new(),
            result,
        }
    }
}

/// All records sharing one owner name and type.
///
/// A set carries one TTL (RFC 2181 section 5.2): inserting a record
/// with a different TTL rewrites the whole set to the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrSet {
    name: Name,
    rtype: RecordType,
    ttl: u32,
    records: Vec<ResourceRecord>,
}

impl RrSet {
    fn from_record(record: ResourceRecord) -> Self {
        Self {
            name: record.name().clone(),
            rtype: record.record_type().unwrap_or(RecordType::A),
            ttl: record.ttl(),
            records: vec![record],
        }
    }

    /// Returns the owner name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the set TTL.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the records.
    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    /// Returns the record count.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when no records remain.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a record, replacing an existing one with identical
    /// rdata. A differing TTL re-times the whole set.
    fn insert(&mut self, record: ResourceRecord) {
        if record.ttl() != self.ttl {
            self.ttl = record.ttl();
            for existing in &mut self.records {
                *existing = existing.with_ttl(self.ttl);
            }
        }
        let record = record.with_ttl(self.ttl);
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.rdata() == record.rdata())
        {
            *existing = record;
        } else {
            self.records.push(record);
        }
    }

    /// Removes the record with matching rdata. Returns whether anything
    /// was removed.
    fn remove(&mut self, rdata: &RData) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.rdata() != rdata);
        self.records.len() < before
    }
}

/// The records at a single owner name, grouped by type.
#[derive(Debug, Clone, Default)]
pub struct Node {
    rrsets: BTreeMap<RecordType, RrSet>,
}

impl Node {
    /// Returns the rrset of a type, if present.
    pub fn rrset(&self, rtype: RecordType) -> Option<&RrSet> {
        self.rrsets.get(&rtype)
    }

    /// Iterates the rrsets in type order.
    pub fn rrsets(&self) -> impl Iterator<Item = &RrSet> {
        self.rrsets.values()
    }

    /// Returns true when the node holds no records.
    pub fn is_empty(&self) -> bool {
        self.rrsets.is_empty()
    }

    fn has_type_other_than(&self, rtype: RecordType) -> bool {
        self.rrsets.keys().any(|t| *t != rtype)
    }
}

/// A zone: an origin plus its records, ordered canonically by owner
/// name.
///
/// The zone value itself is plain data; [`crate::ZonePair`] wraps each
/// zone of a pair in a reader-writer lock and enforces the locking
/// discipline (writers for insert/delete, readers for lookup, transfer,
/// and the copy phase of snapshots).
#[derive(Debug, Clone)]
pub struct Zone {
    origin: Name,
    nodes: BTreeMap<Name, Node>,
}

impl Zone {
    /// Creates an empty zone for `origin`.
    pub fn new(origin: Name) -> Self {
        Self {
            origin,
            nodes: BTreeMap::new(),
        }
    }

    /// Returns the apex name.
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// Inserts a record.
    ///
    /// Insertion is idempotent on (name, type, rdata). An apex SOA
    /// replaces the previous SOA wholesale. Fails with `BadRr` for
    /// meta types, owners outside the zone, SOA off the apex, and
    /// CNAME conflicts.
    pub fn insert(&mut self, record: ResourceRecord) -> Result<()> {
        let rtype = match record.record_type() {
            Some(t) if !t.is_meta() => t,
            other => {
                return Err(ZoneError::BadRr(format!(
                    "type {:?} cannot be stored in a zone",
                    other
                )))
            }
        };
        if !record.name().is_subdomain_of(&self.origin) {
            return Err(ZoneError::BadRr(format!(
                "{} is outside zone {}",
                record.name(),
                self.origin
            )));
        }

        if rtype == RecordType::SOA {
            if record.name() != &self.origin {
                return Err(ZoneError::BadRr(format!(
                    "SOA owner {} is not the apex {}",
                    record.name(),
                    self.origin
                )));
            }
            // A fresh SOA supersedes the old one, serial bumps included.
            let node = self.nodes.entry(self.origin.clone()).or_default();
            node.rrsets
                .insert(RecordType::SOA, RrSet::from_record(record));
            return Ok(());
        }

        let node = self.nodes.entry(record.name().clone()).or_default();
        if rtype == RecordType::CNAME {
            if node.has_type_other_than(RecordType::CNAME) {
                return Err(ZoneError::BadRr(format!(
                    "CNAME at {} conflicts with existing data",
                    record.name()
                )));
            }
        } else if node.rrsets.contains_key(&RecordType::CNAME) {
            return Err(ZoneError::BadRr(format!(
                "{} at {} conflicts with CNAME",
                rtype,
                record.name()
            )));
        }

        match node.rrsets.get_mut(&rtype) {
            Some(set) => set.insert(record),
            None => {
                node.rrsets.insert(rtype, RrSet::from_record(record));
            }
        }
        Ok(())
    }

    /// Removes the record matching (name, type, rdata). A no-op if
    /// absent; empty rrsets and nodes are pruned.
    pub fn delete(&mut self, record: &ResourceRecord) {
        let Some(rtype) = record.record_type() else {
            return;
        };
        let Some(node) = self.nodes.get_mut(record.name()) else {
            return;
        };
        if let Some(set) = node.rrsets.get_mut(&rtype) {
            set.remove(record.rdata());
            if set.is_empty() {
                node.rrsets.remove(&rtype);
            }
        }
        if node.is_empty() {
            self.nodes.remove(record.name());
        }
    }

    /// Replaces the rrset of (name, type) with `set`, regardless of
    /// what was there. Used by snapshot merging, where dynamic sets win
    /// over static ones.
    pub fn adopt_rrset(&mut self, set: RrSet) {
        let node = self.nodes.entry(set.name.clone()).or_default();
        node.rrsets.insert(set.rtype, set);
    }

    /// Returns the node at a name.
    pub fn node(&self, name: &Name) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Returns the apex SOA record, or `NoSoa`.
    pub fn apex_soa(&self) -> Result<ResourceRecord> {
        self.nodes
            .get(&self.origin)
            .and_then(|node| node.rrset(RecordType::SOA))
            .and_then(|set| set.records().first().cloned())
            .ok_or_else(|| ZoneError::NoSoa(self.origin.clone()))
    }

    /// Returns the SOA serial, if the zone has an SOA.
    pub fn serial(&self) -> Option<u32> {
        self.apex_soa()
            .ok()
            .and_then(|rr| rr.rdata().as_soa().map(|soa| soa.serial))
    }

    /// Iterates every rrset in canonical name order.
    pub fn rrsets(&self) -> impl Iterator<Item = &RrSet> {
        self.nodes.values().flat_map(Node::rrsets)
    }

    /// Iterates every record in canonical name order.
    pub fn records(&self) -> impl Iterator<Item = &ResourceRecord> {
        self.rrsets().flat_map(RrSet::records)
    }

    /// Returns the total record count.
    pub fn record_count(&self) -> usize {
        self.rrsets().map(RrSet::len).sum()
    }

    /// Returns true when the zone holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns an independent copy sharing no mutable state.
    pub fn copy(&self) -> Zone {
        self.clone()
    }

    /// Answers one question against this zone value.
    pub fn lookup(&self, qname: &Name, qtype: RecordType) -> LookupAnswer {
        let Ok(soa) = self.apex_soa() else {
            return LookupAnswer::new(LookupResult::ServerFailure);
        };
        if !qname.is_subdomain_of(&self.origin) {
            let mut out = LookupAnswer::new(LookupResult::NameError);
            out.ns.push(soa);
            return out;
        }

        // Delegation: an NS set at or above qname, below the apex.
        if let Some(ns_set) = self.delegation_for(qname) {
            let mut out = LookupAnswer::new(LookupResult::Delegation);
            out.ns.extend(ns_set.records().iter().cloned());
            out.extra = self.glue_for(&ns_set);
            return out;
        }

        let Some(node) = self.nodes.get(qname) else {
            let mut out = LookupAnswer::new(LookupResult::NameError);
            out.ns.push(soa);
            return out;
        };

        // CNAME chase, unless the alias itself was asked for.
        if qtype != RecordType::CNAME && qtype != RecordType::ANY {
            if let Some(cname_set) = node.rrset(RecordType::CNAME) {
                let mut out = LookupAnswer::new(LookupResult::Success);
                out.answer.extend(cname_set.records().iter().cloned());
                self.chase_cname(cname_set, qtype, &mut out.answer);
                return out;
            }
        }

        if qtype == RecordType::ANY {
            let mut out = LookupAnswer::new(LookupResult::Success);
            for set in node.rrsets() {
                out.answer.extend(set.records().iter().cloned());
            }
            if out.answer.is_empty() {
                out.result = LookupResult::NoData;
                out.ns.push(soa);
            }
            return out;
        }

        match node.rrset(qtype) {
            Some(set) => {
                let mut out = LookupAnswer::new(LookupResult::Success);
                out.answer.extend(set.records().iter().cloned());
                out
            }
            None => {
                let mut out = LookupAnswer::new(LookupResult::NoData);
                out.ns.push(soa);
                out
            }
        }
    }

    fn delegation_for(&self, qname: &Name) -> Option<RrSet> {
        let mut current = Some(qname.clone());
        while let Some(name) = current {
            if name == self.origin {
                break;
            }
            if !name.is_subdomain_of(&self.origin) {
                break;
            }
            if let Some(set) = self.nodes.get(&name).and_then(|n| n.rrset(RecordType::NS)) {
                return Some(set.clone());
            }
            current = name.parent();
        }
        None
    }

    fn glue_for(&self, ns_set: &RrSet) -> Vec<ResourceRecord> {
        let mut glue = Vec::new();
        for ns in ns_set.records() {
            let RData::Ns(data) = ns.rdata() else { continue };
            if let Some(node) = self.nodes.get(&data.nsdname) {
                for rtype in [RecordType::A, RecordType::AAAA] {
                    if let Some(set) = node.rrset(rtype) {
                        glue.extend(set.records().iter().cloned());
                    }
                }
            }
        }
        glue
    }

    fn chase_cname(&self, start: &RrSet, qtype: RecordType, answer: &mut Vec<ResourceRecord>) {
        let mut target = start
            .records()
            .first()
            .and_then(|rr| rr.rdata().as_cname().cloned());
        for _ in 0..8 {
            let Some(name) = target.take() else { break };
            let Some(node) = self.nodes.get(&name) else { break };
            if let Some(next) = node.rrset(RecordType::CNAME) {
                answer.extend(next.records().iter().cloned());
                target = next
                    .records()
                    .first()
                    .and_then(|rr| rr.rdata().as_cname().cloned());
                continue;
            }
            if let Some(set) = node.rrset(qtype) {
                answer.extend(set.records().iter().cloned());
            }
            break;
        }
    }

    /// Produces a full-transfer sequence in RFC 5936 order: the apex
    /// SOA first, every other record in canonical order, and the SOA
    /// again to close. When `since_serial` matches the current serial
    /// the sequence is the single-SOA "up to date" form.
    ///
    /// Each call returns a fresh, restartable sequence.
    pub fn transfer(&self, since_serial: u32) -> Result<Transfer> {
        let soa = self.apex_soa()?;
        let serial = soa
            .rdata()
            .as_soa()
            .map(|s| s.serial)
            .unwrap_or_default();

        if since_serial != 0 && since_serial == serial {
            return Ok(Transfer::new(vec![soa]));
        }

        let mut records = Vec::with_capacity(self.record_count() + 1);
        records.push(soa.clone());
        for rr in self.records() {
            if rr.record_type() == Some(RecordType::SOA) && rr.name() == &self.origin {
                continue;
            }
            records.push(rr.clone());
        }
        records.push(soa);
        Ok(Transfer::new(records))
    }
}

/// A restartable AXFR record sequence, yielded in fixed-size batches.
#[derive(Debug)]
pub struct Transfer {
    records: std::vec::IntoIter<ResourceRecord>,
    batch: usize,
}

impl Transfer {
    const DEFAULT_BATCH: usize = 64;

    fn new(records: Vec<ResourceRecord>) -> Self {
        Self {
            records: records.into_iter(),
            batch: Self::DEFAULT_BATCH,
        }
    }
}

impl Iterator for Transfer {
    type Item = Vec<ResourceRecord>;

    fn next(&mut self) -> Option<Vec<ResourceRecord>> {
        let batch: Vec<ResourceRecord> = self.records.by_ref().take(self.batch).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_proto::rdata::{Soa, Srv};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn origin() -> Name {
        Name::from_str("example.org.").unwrap()
    }

    fn seeded_zone() -> Zone {
        let mut zone = Zone::new(origin());
        zone.insert(ResourceRecord::soa(
            origin(),
            30,
            Soa::new(
                Name::from_str("ns.dns.example.org.").unwrap(),
                Name::from_str("hostmaster.example.org.").unwrap(),
                100,
                7200,
                1800,
                86400,
                30,
            ),
        ))
        .unwrap();
        zone.insert(ResourceRecord::ns(
            origin(),
            3600,
            Name::from_str("ns1.example.org.").unwrap(),
        ))
        .unwrap();
        zone.insert(ResourceRecord::a(
            Name::from_str("mail.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(192, 0, 2, 5),
        ))
        .unwrap();
        zone.insert(ResourceRecord::cname(
            Name::from_str("www.example.org.").unwrap(),
            3600,
            Name::from_str("mail.example.org.").unwrap(),
        ))
        .unwrap();
        zone
    }

    #[test]
    fn insert_is_idempotent() {
        let mut zone = seeded_zone();
        let before = zone.record_count();
        zone.insert(ResourceRecord::a(
            Name::from_str("mail.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(192, 0, 2, 5),
        ))
        .unwrap();
        assert_eq!(zone.record_count(), before);
    }

    #[test]
    fn insert_rejects_out_of_zone() {
        let mut zone = seeded_zone();
        let err = zone
            .insert(ResourceRecord::a(
                Name::from_str("other.test.").unwrap(),
                60,
                Ipv4Addr::LOCALHOST,
            ))
            .unwrap_err();
        assert!(matches!(err, ZoneError::BadRr(_)));
    }

    #[test]
    fn soa_replaces_at_apex_only() {
        let mut zone = seeded_zone();
        assert_eq!(zone.serial(), Some(100));

        zone.insert(ResourceRecord::soa(
            origin(),
            30,
            Soa::new(
                Name::from_str("ns.dns.example.org.").unwrap(),
                Name::from_str("hostmaster.example.org.").unwrap(),
                101,
                7200,
                1800,
                86400,
                30,
            ),
        ))
        .unwrap();
        assert_eq!(zone.serial(), Some(101));

        let off_apex = ResourceRecord::soa(
            Name::from_str("sub.example.org.").unwrap(),
            30,
            Soa::for_origin(&origin()),
        );
        assert!(zone.insert(off_apex).is_err());
    }

    #[test]
    fn cname_conflicts_rejected() {
        let mut zone = seeded_zone();
        assert!(zone
            .insert(ResourceRecord::a(
                Name::from_str("www.example.org.").unwrap(),
                60,
                Ipv4Addr::LOCALHOST,
            ))
            .is_err());
        assert!(zone
            .insert(ResourceRecord::cname(
                Name::from_str("mail.example.org.").unwrap(),
                60,
                origin(),
            ))
            .is_err());
    }

    #[test]
    fn delete_prunes() {
        let mut zone = seeded_zone();
        let rr = ResourceRecord::a(
            Name::from_str("mail.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(192, 0, 2, 5),
        );
        zone.delete(&rr);
        assert!(zone.node(&Name::from_str("mail.example.org.").unwrap()).is_none());
        // Deleting again is a no-op.
        zone.delete(&rr);
    }

    #[test]
    fn lookup_classes() {
        let zone = seeded_zone();

        let hit = zone.lookup(&Name::from_str("mail.example.org.").unwrap(), RecordType::A);
        assert_eq!(hit.result, LookupResult::Success);
        assert_eq!(hit.answer.len(), 1);

        let nodata = zone.lookup(
            &Name::from_str("mail.example.org.").unwrap(),
            RecordType::AAAA,
        );
        assert_eq!(nodata.result, LookupResult::NoData);
        assert_eq!(nodata.ns.len(), 1);

        let nx = zone.lookup(&Name::from_str("gone.example.org.").unwrap(), RecordType::A);
        assert_eq!(nx.result, LookupResult::NameError);

        let no_soa = Zone::new(origin()).lookup(&origin(), RecordType::A);
        assert_eq!(no_soa.result, LookupResult::ServerFailure);
    }

    #[test]
    fn cname_is_chased() {
        let zone = seeded_zone();
        let out = zone.lookup(&Name::from_str("www.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.result, LookupResult::Success);
        assert_eq!(out.answer.len(), 2);
        assert_eq!(out.answer[0].record_type(), Some(RecordType::CNAME));
        assert_eq!(out.answer[1].record_type(), Some(RecordType::A));
    }

    #[test]
    fn delegation_with_glue() {
        let mut zone = seeded_zone();
        zone.insert(ResourceRecord::ns(
            Name::from_str("sub.example.org.").unwrap(),
            3600,
            Name::from_str("ns.sub.example.org.").unwrap(),
        ))
        .unwrap();
        zone.insert(ResourceRecord::a(
            Name::from_str("ns.sub.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(192, 0, 2, 53),
        ))
        .unwrap();

        let out = zone.lookup(
            &Name::from_str("deep.sub.example.org.").unwrap(),
            RecordType::A,
        );
        assert_eq!(out.result, LookupResult::Delegation);
        assert_eq!(out.ns.len(), 1);
        assert_eq!(out.extra.len(), 1);
    }

    #[test]
    fn transfer_is_bookended_and_restartable() {
        let mut zone = seeded_zone();
        zone.insert(ResourceRecord::srv(
            Name::from_str("_sip._tcp.example.org.").unwrap(),
            60,
            Srv::new(10, 0, 5060, Name::from_str("mail.example.org.").unwrap()),
        ))
        .unwrap();

        for _ in 0..2 {
            let records: Vec<ResourceRecord> =
                zone.transfer(0).unwrap().flatten().collect();
            assert_eq!(records.len(), zone.record_count() + 1);
            assert_eq!(records.first().unwrap().record_type(), Some(RecordType::SOA));
            assert_eq!(records.last().unwrap().record_type(), Some(RecordType::SOA));
        }

        let up_to_date: Vec<ResourceRecord> =
            zone.transfer(100).unwrap().flatten().collect();
        assert_eq!(up_to_date.len(), 1);
    }

    #[test]
    fn uniform_ttl_per_rrset() {
        let mut zone = seeded_zone();
        let name = Name::from_str("multi.example.org.").unwrap();
        zone.insert(ResourceRecord::a(name.clone(), 300, Ipv4Addr::new(10, 0, 0, 1)))
            .unwrap();
        zone.insert(ResourceRecord::a(name.clone(), 600, Ipv4Addr::new(10, 0, 0, 2)))
            .unwrap();

        let set = zone.node(&name).unwrap().rrset(RecordType::A).unwrap();
        assert_eq!(set.ttl(), 600);
        assert!(set.records().iter().all(|r| r.ttl() == 600));
    }
}
