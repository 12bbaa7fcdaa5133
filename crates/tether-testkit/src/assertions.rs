//! Envelope and store assertions

use std::collections::HashMap;

use tether_core::{Envelope, ErrorKind};
use tether_store::SimulatedStore;

/// Assert `success` ⇔ data present and no error.
pub fn assert_envelope_law(envelope: &Envelope) {
    assert!(
        envelope.is_well_formed(),
        "malformed envelope: {envelope:?}"
    );
    assert_eq!(envelope.is_success(), envelope.data().is_some());
    assert_eq!(envelope.is_success(), envelope.error().is_none());
}

/// Assert a failed envelope of the given kind.
pub fn assert_failed_with(envelope: &Envelope, kind: ErrorKind) {
    assert_envelope_law(envelope);
    assert_eq!(
        envelope.error().map(|e| e.kind),
        Some(kind),
        "expected {kind} failure, got {envelope:?}"
    );
}

/// Assert no orphans and counters equal to a recount.
pub fn assert_store_consistent(store: &SimulatedStore) {
    let violations = store.integrity_check();
    assert!(violations.is_empty(), "integrity violations: {violations:?}");

    let mut recount: HashMap<String, (u64, u64)> = HashMap::new();
    for file in store.list_dependents(None) {
        let entry = recount.entry(file.owner_id).or_default();
        entry.0 += 1;
        entry.1 += file.size;
    }
    for client in store.list_primary() {
        let (count, size) = recount.remove(&client.id).unwrap_or_default();
        assert_eq!(client.file_count, count, "file_count of {}", client.id);
        assert_eq!(client.total_size, size, "total_size of {}", client.id);
    }
    assert!(recount.is_empty(), "files without owners: {recount:?}");
}

/// Assert an envelope failed with the given kind.
#[macro_export]
macro_rules! assert_envelope_failed {
    ($envelope:expr, $kind:expr) => {
        $crate::assertions::assert_failed_with(&$envelope, $kind)
    };
}
