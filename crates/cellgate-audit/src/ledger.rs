use std::sync::Arc;

use cellgate_types::{Clock, ObjectId, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::event::{AuditEvent, AuditRecord};

/// `prev_hash` of the first event.
pub const GENESIS: &str = "GENESIS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Stamped on every appended event.
    #[serde(default = "default_policy_version")]
    pub policy_version: u32,
}

fn default_policy_version() -> u32 {
    1
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            policy_version: default_policy_version(),
        }
    }
}

/// Check sequence numbers, links and hashes of `events` from genesis.
pub fn verify_events(events: &[AuditEvent]) -> Result<(), LedgerError> {
    let mut prev: &str = GENESIS;
    for (index, event) in events.iter().enumerate() {
        if event.sequence != index as u64 {
            return Err(LedgerError::SequenceGap {
                index,
                expected: index as u64,
                found: event.sequence,
            });
        }
        if event.prev_hash != prev {
            return Err(LedgerError::BrokenLink { index });
        }
        if event.compute_hash() != event.hash {
            return Err(LedgerError::HashMismatch { index });
        }
        prev = event.hash.as_str();
    }
    Ok(())
}

#[derive(Debug, Default)]
struct LedgerState {
    events: Vec<AuditEvent>,
}

impl LedgerState {
    fn head(&self) -> &str {
        self.events.last().map(|e| e.hash.as_str()).unwrap_or(GENESIS)
    }
}

/// Append-only, single-writer audit chain.
///
/// Appends are serialized by one lock so hashes always chain in append order.
/// No API mutates or removes a stored event.
pub struct AuditLedger {
    config: LedgerConfig,
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
}

impl AuditLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Rebuild a ledger from persisted events, refusing a chain that does not
    /// verify.
    pub fn restore(config: LedgerConfig, events: Vec<AuditEvent>) -> Result<Self, LedgerError> {
        if let Err(err) = verify_events(&events) {
            error!(error = %err, "refusing to restore audit chain");
            return Err(err);
        }
        Ok(Self {
            config,
            state: Mutex::new(LedgerState { events }),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy_version(&self) -> u32 {
        self.config.policy_version
    }

    /// Chain `record` onto the head and return the stored event.
    pub fn append(&self, record: AuditRecord) -> AuditEvent {
        let mut state = self.state.lock();
        let mut event = AuditEvent {
            event_id: Uuid::new_v4(),
            sequence: state.events.len() as u64,
            recorded_at: self.clock.now(),
            policy_version: self.config.policy_version,
            record,
            prev_hash: state.head().to_string(),
            hash: String::new(),
        };
        event.hash = event.compute_hash();
        debug!(
            sequence = event.sequence,
            actor = %event.record.actor,
            op = %event.record.op,
            decision = %event.record.decision,
            "audit event appended"
        );
        state.events.push(event.clone());
        event
    }

    pub fn verify_chain(&self) -> bool {
        self.first_broken_link().is_none()
    }

    /// Index of the first event that fails verification.
    pub fn first_broken_link(&self) -> Option<usize> {
        match verify_events(&self.state.lock().events) {
            Ok(()) => None,
            Err(err) => {
                error!(error = %err, "audit chain verification failed");
                Some(err.index())
            }
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.state.lock().events.clone()
    }

    pub fn events_for_object(&self, object: &ObjectId) -> Vec<AuditEvent> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.record.object_id == *object)
            .cloned()
            .collect()
    }

    pub fn head_hash(&self) -> String {
        self.state.lock().head().to_string()
    }

    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }
}

impl Default for AuditLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl std::fmt::Debug for AuditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLedger")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AuditDecision;
    use cellgate_types::{DataTier, GrantId, OpTier, Operation, Role, ShardId};
    use proptest::prelude::*;

    fn record(n: usize) -> AuditRecord {
        AuditRecord {
            actor: format!("user-{n}").into(),
            role: Role::Lender,
            op: Operation::ExportData,
            object_id: format!("doc-{n}").into(),
            data_tier: DataTier::Tier3,
            op_tier: OpTier::Tier2,
            residency: "eu".into(),
            serving_region: "eu".into(),
            home_region: "eu".into(),
            shard: Some(ShardId::from("shard-007")),
            placement_version: Some(1),
            purpose: "lending".to_string(),
            grant_id: Some(GrantId::from("g-1")),
            decision: if n % 2 == 0 {
                AuditDecision::Allow
            } else {
                AuditDecision::Deny
            },
            reason: format!("reason-{n}"),
        }
    }

    fn ledger_with(n: usize) -> AuditLedger {
        let ledger = AuditLedger::default();
        for i in 0..n {
            ledger.append(record(i));
        }
        ledger
    }

    #[test]
    fn empty_ledger_verifies_and_starts_at_genesis() {
        let ledger = AuditLedger::default();
        assert!(ledger.verify_chain());
        assert_eq!(ledger.head_hash(), GENESIS);
    }

    #[test]
    fn appends_chain_from_genesis() {
        let ledger = ledger_with(3);
        let events = ledger.events();
        assert_eq!(events[0].prev_hash, GENESIS);
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert_eq!(events[2].prev_hash, events[1].hash);
        assert_eq!(ledger.head_hash(), events[2].hash);
        assert!(events.iter().all(|e| e.policy_version == 1));
        assert!(ledger.verify_chain());
    }

    #[test]
    fn tampering_breaks_verification_at_that_event() {
        let ledger = ledger_with(5);
        ledger.state.lock().events[2].record.reason = "ALLOW".to_string();
        assert!(!ledger.verify_chain());
        assert_eq!(ledger.first_broken_link(), Some(2));
    }

    #[test]
    fn rehashing_a_tampered_event_breaks_the_next_link() {
        let mut events = ledger_with(4).events();
        events[1].record.decision = AuditDecision::Allow;
        events[1].hash = events[1].compute_hash();
        assert_eq!(
            verify_events(&events),
            Err(LedgerError::BrokenLink { index: 2 })
        );
    }

    #[test]
    fn dropping_an_event_is_a_sequence_gap() {
        let mut events = ledger_with(3).events();
        events.remove(1);
        assert!(matches!(
            verify_events(&events),
            Err(LedgerError::SequenceGap { index: 1, .. })
        ));
    }

    #[test]
    fn restore_accepts_valid_and_refuses_broken_chains() {
        let events = ledger_with(3).events();
        let restored = AuditLedger::restore(LedgerConfig::default(), events.clone()).unwrap();
        assert_eq!(restored.len(), 3);
        restored.append(record(3));
        assert!(restored.verify_chain());

        let mut broken = events;
        broken[0].record.purpose = "marketing".to_string();
        assert_eq!(
            AuditLedger::restore(LedgerConfig::default(), broken).unwrap_err(),
            LedgerError::HashMismatch { index: 0 }
        );
    }

    #[test]
    fn events_survive_a_serde_round_trip_with_valid_hashes() {
        let events = ledger_with(2).events();
        let json = serde_json::to_string(&events).unwrap();
        let decoded: Vec<AuditEvent> = serde_json::from_str(&json).unwrap();
        assert!(verify_events(&decoded).is_ok());
    }

    #[test]
    fn events_for_object_filters() {
        let ledger = ledger_with(3);
        let hits = ledger.events_for_object(&ObjectId::from("doc-1"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].sequence, 1);
    }

    #[derive(Clone, Debug)]
    enum Tamper {
        Actor,
        Reason,
        Purpose,
        Decision,
        Shard,
        PlacementVersion,
        PolicyVersion,
        PrevHash,
    }

    fn tamper_strategy() -> impl Strategy<Value = Tamper> {
        prop_oneof![
            Just(Tamper::Actor),
            Just(Tamper::Reason),
            Just(Tamper::Purpose),
            Just(Tamper::Decision),
            Just(Tamper::Shard),
            Just(Tamper::PlacementVersion),
            Just(Tamper::PolicyVersion),
            Just(Tamper::PrevHash),
        ]
    }

    fn apply(event: &mut AuditEvent, tamper: &Tamper) {
        match tamper {
            Tamper::Actor => event.record.actor = "mallory".into(),
            Tamper::Reason => event.record.reason.push('!'),
            Tamper::Purpose => event.record.purpose = "marketing".to_string(),
            Tamper::Decision => {
                event.record.decision = match event.record.decision {
                    AuditDecision::Allow => AuditDecision::Deny,
                    AuditDecision::Deny => AuditDecision::Allow,
                }
            }
            Tamper::Shard => event.record.shard = None,
            Tamper::PlacementVersion => event.record.placement_version = Some(99),
            Tamper::PolicyVersion => event.policy_version += 1,
            Tamper::PrevHash => event.prev_hash = "0".repeat(64),
        }
    }

    proptest! {
        #[test]
        fn any_single_field_tamper_is_detected(
            (n, k) in (1usize..12).prop_flat_map(|n| (Just(n), 0..n)),
            tamper in tamper_strategy(),
        ) {
            let ledger = ledger_with(n);
            prop_assert!(ledger.verify_chain());

            let mut events = ledger.events();
            apply(&mut events[k], &tamper);
            let err = verify_events(&events).unwrap_err();
            prop_assert_eq!(err.index(), k);
        }
    }
}
