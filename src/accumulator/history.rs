// src/accumulator/history.rs
//! Witness reconstruction from a type's membership log.
//!
//! A member added at digest version `k` starts with witness `D_(k-1)`, the
//! digest just before its own addition, or with a stored checkpoint of its
//! witness at some later version. Every later event moves the witness
//! forward: runs of additions by one exponentiation with the product of their
//! primes, removals by the Bezout update, which needs the digest that removal
//! produced. Only the events after the starting point are read; the full
//! member set never is.

use super::rsa::{AccumulatorError, Digest, RsaAccumulator, Witness};
use crate::models::{MembershipEvent, MembershipOp};

/// One log entry as replayed by [`witness_from_history`].
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub event: MembershipEvent,
    /// Digest produced by this event. Required for removals.
    pub digest_after: Option<Digest>,
}

/// Rebuilds `member`'s witness against the digest produced by the last entry
/// of `history` (or returns `start` unchanged if the slice is empty).
///
/// # Arguments
/// * `start` - witness of `member` at the version just before `history`
/// * `history` - subsequent events, in version order
pub fn witness_from_history(
    engine: &RsaAccumulator,
    member: &str,
    start: &Witness,
    history: &[HistoryEntry],
) -> Result<Witness, AccumulatorError> {
    let mut witness = start.clone();
    let mut pending: Vec<&str> = Vec::new();
    for entry in history {
        let other = entry.event.we_id.as_str();
        if other == member {
            return match entry.event.op {
                MembershipOp::Removed => Err(AccumulatorError::NotAMember(member.to_string())),
                MembershipOp::Added => Err(AccumulatorError::InconsistentHistory(format!(
                    "{} added twice without removal at version {}",
                    member, entry.event.version
                ))),
            };
        }
        match entry.event.op {
            MembershipOp::Added => pending.push(other),
            MembershipOp::Removed => {
                let digest = entry.digest_after.as_ref().ok_or_else(|| {
                    AccumulatorError::InconsistentHistory(format!(
                        "missing digest for removal at version {}",
                        entry.event.version
                    ))
                })?;
                if !pending.is_empty() {
                    witness = engine.update_on_adds(&witness, pending.drain(..));
                }
                witness = engine.update_on_remove(&witness, member, other, digest)?;
            }
        }
    }
    if !pending.is_empty() {
        witness = engine.update_on_adds(&witness, pending);
    }
    Ok(witness)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(version: u64, op: MembershipOp, we_id: &str) -> MembershipEvent {
        MembershipEvent {
            version,
            op,
            we_id: we_id.to_string(),
        }
    }

    #[test]
    fn test_replay_matches_direct_witness() {
        let e = RsaAccumulator::default();
        // v1: +a, v2: +b, v3: +c, v4: -a, v5: +d
        let d0 = e.empty_digest();
        let d1 = e.add(&d0, "did:weid:a");
        let d2 = e.add(&d1, "did:weid:b");
        let d3 = e.add(&d2, "did:weid:c");
        let w_a = e.witness(["did:weid:a", "did:weid:b", "did:weid:c"], "did:weid:a").unwrap();
        let d4 = e.remove(&d3, "did:weid:a", &w_a).unwrap();
        let d5 = e.add(&d4, "did:weid:d");

        // b was added at v2, so its base is d1.
        let entries = vec![
            HistoryEntry { event: event(3, MembershipOp::Added, "did:weid:c"), digest_after: None },
            HistoryEntry { event: event(4, MembershipOp::Removed, "did:weid:a"), digest_after: Some(d4) },
            HistoryEntry { event: event(5, MembershipOp::Added, "did:weid:d"), digest_after: None },
        ];
        let w_b = witness_from_history(&e, "did:weid:b", &d1.as_witness(), &entries).unwrap();
        assert!(e.verify(&d5, "did:weid:b", &w_b));
        assert_eq!(
            w_b,
            e.witness(["did:weid:b", "did:weid:c", "did:weid:d"], "did:weid:b").unwrap()
        );
    }

    #[test]
    fn test_replay_stops_at_own_removal() {
        let e = RsaAccumulator::default();
        let d0 = e.empty_digest();
        let entries = vec![HistoryEntry {
            event: event(2, MembershipOp::Removed, "did:weid:a"),
            digest_after: Some(d0.clone()),
        }];
        assert!(matches!(
            witness_from_history(&e, "did:weid:a", &d0.as_witness(), &entries),
            Err(AccumulatorError::NotAMember(_))
        ));
    }

    #[test]
    fn test_removal_without_digest_is_inconsistent() {
        let e = RsaAccumulator::default();
        let entries = vec![HistoryEntry {
            event: event(2, MembershipOp::Removed, "did:weid:x"),
            digest_after: None,
        }];
        assert!(matches!(
            witness_from_history(&e, "did:weid:a", &e.empty_digest().as_witness(), &entries),
            Err(AccumulatorError::InconsistentHistory(_))
        ));
    }
}
