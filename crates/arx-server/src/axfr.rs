//! Outbound full zone transfers (RFC 5936).

use arx_proto::tsig::{self, TsigKey};
use arx_proto::{Message, MAX_TCP_MESSAGE_SIZE};
use arx_zone::{Result, Zone};
use tracing::warn;

/// Headroom reserved per envelope for the TSIG record.
const TSIG_HEADROOM: usize = 160;

/// Packs a snapshot's transfer sequence into response envelopes.
///
/// The first envelope opens with the apex SOA and the last closes with
/// it; every envelope stays under the TCP message cap with room for a
/// signature. The snapshot is private to this transfer, so concurrent
/// updates cannot leak a mixed serial into the stream.
pub fn build_envelopes(query: &Message, snapshot: &Zone) -> Result<Vec<Message>> {
    let limit = MAX_TCP_MESSAGE_SIZE - TSIG_HEADROOM;
    let mut envelopes = Vec::new();
    let mut current = transfer_response(query);

    for batch in snapshot.transfer(0)? {
        for record in batch {
            if current.wire_len() + record.wire_len() > limit && !current.answers().is_empty() {
                envelopes.push(std::mem::replace(&mut current, transfer_response(query)));
            }
            current.add_answer(record);
        }
    }
    envelopes.push(current);
    Ok(envelopes)
}

/// Signs every envelope, chaining MACs: the first envelope chains the
/// request MAC, each later one the previous envelope's.
pub fn sign_envelopes(envelopes: &mut [Message], key: &TsigKey, request_mac: &[u8], now: u64) {
    let mut prior: Vec<u8> = request_mac.to_vec();
    for envelope in envelopes {
        match tsig::sign_message(envelope, key, Some(&prior), now) {
            Ok(mac) => prior = mac,
            Err(e) => {
                warn!(error = %e, "signing AXFR envelope");
                return;
            }
        }
    }
}

fn transfer_response(query: &Message) -> Message {
    let mut response = Message::response_from(query);
    response.set_authoritative(true);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_proto::rdata::Soa;
    use arx_proto::{Name, Question, RecordClass, RecordType, ResourceRecord, TsigAlgorithm};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn snapshot() -> Zone {
        let origin = Name::from_str("example.org.").unwrap();
        let mut zone = Zone::new(origin.clone());
        zone.insert(ResourceRecord::soa(
            origin.clone(),
            30,
            Soa::new(
                Name::from_str("ns.dns.example.org.").unwrap(),
                Name::from_str("hostmaster.example.org.").unwrap(),
                7,
                7200,
                1800,
                86400,
                30,
            ),
        ))
        .unwrap();
        zone.insert(ResourceRecord::ns(
            origin.clone(),
            3600,
            Name::from_str("ns1.example.org.").unwrap(),
        ))
        .unwrap();
        for i in 0..50u8 {
            zone.insert(ResourceRecord::a(
                Name::from_str(&format!("h{i}.example.org.")).unwrap(),
                60,
                Ipv4Addr::new(192, 0, 2, i),
            ))
            .unwrap();
        }
        zone
    }

    fn axfr_query() -> Message {
        Message::query(
            1,
            Question::new(
                Name::from_str("example.org.").unwrap(),
                RecordType::AXFR,
                RecordClass::IN,
            ),
        )
    }

    #[test]
    fn soa_bookends_and_counts() {
        let zone = snapshot();
        let envelopes = build_envelopes(&axfr_query(), &zone).unwrap();

        let all: Vec<_> = envelopes.iter().flat_map(Message::answers).collect();
        assert_eq!(all.len(), zone.record_count() + 1);
        assert_eq!(all.first().unwrap().record_type(), Some(RecordType::SOA));
        assert_eq!(all.last().unwrap().record_type(), Some(RecordType::SOA));
        assert!(envelopes
            .iter()
            .all(|e| e.wire_len() <= MAX_TCP_MESSAGE_SIZE));
    }

    #[test]
    fn signed_envelopes_chain() {
        let zone = snapshot();
        let mut envelopes = build_envelopes(&axfr_query(), &zone).unwrap();
        let key = TsigKey::new(
            Name::from_str("ksdns.tsigKey.").unwrap(),
            TsigAlgorithm::HmacSha256,
            vec![9; 32],
        );
        sign_envelopes(&mut envelopes, &key, &[0xaa; 32], 1_700_000_000);
        assert!(envelopes.iter().all(|e| e.tsig().is_some()));
    }
}
