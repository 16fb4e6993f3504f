use std::collections::HashMap;

use crate::fragment::Fragment;

/// The single role an amount fragment may be consumed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRole {
    ItemTotal,
    UnitPrice,
    Subtotal,
    Tax,
    Fee,
    Total,
    /// Recognized as a non-item amount (membership, points) and retired.
    Skipped,
}

/// Dedup ledger: every amount-bearing fragment is claimed by at most one
/// consumer. Claiming twice is a programming error, not a data condition.
#[derive(Debug, Default)]
pub struct AmountUsageTracker {
    used: HashMap<usize, AmountRole>,
}

impl AmountUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `fragment` has been consumed as `role`.
    ///
    /// Panics in debug builds when the fragment was already claimed —
    /// callers must check `is_used` first.
    pub fn claim(&mut self, fragment: &Fragment, role: AmountRole) {
        self.claim_id(fragment.id, role);
    }

    /// Claim by fragment id, for callers that hold only the identity.
    pub fn claim_id(&mut self, fragment_id: usize, role: AmountRole) {
        let prior = self.used.insert(fragment_id, role);
        debug_assert!(
            prior.is_none(),
            "amount fragment {} claimed twice ({:?} then {:?})",
            fragment_id,
            prior.unwrap(),
            role
        );
    }

    pub fn is_used(&self, fragment: &Fragment) -> bool {
        self.is_used_id(fragment.id)
    }

    pub fn is_used_id(&self, fragment_id: usize) -> bool {
        self.used.contains_key(&fragment_id)
    }

    pub fn role(&self, fragment: &Fragment) -> Option<AmountRole> {
        self.used.get(&fragment.id).copied()
    }

    pub fn claimed_count(&self) -> usize {
        self.used.len()
    }
}
