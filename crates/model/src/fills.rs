//! Duplicate-fill suppression.

use std::collections::HashMap;

use crate::order::TradeUpdate;

/// Remembers which fills have already been applied so that a replayed trade
/// update does not move a position twice.
///
/// A fill is identified by its order id plus `(timestamp_ms, volume)`; two
/// genuine fills on one order always differ in at least one of the two.
#[derive(Debug, Default)]
pub struct FillLedger {
    seen: HashMap<String, Vec<(i64, u64)>>,
}

impl FillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trade update. Returns `true` the first time this fill is
    /// seen and `false` for duplicates.
    pub fn observe(&mut self, update: &TradeUpdate) -> bool {
        let key = (update.timestamp_ms, update.volume.to_bits());
        let fills = self.seen.entry(update.order_id.clone()).or_default();
        if fills.contains(&key) {
            return false;
        }
        fills.push(key);
        true
    }

    /// Forget an order once it reaches a terminal status.
    pub fn forget(&mut self, order_id: &str) {
        self.seen.remove(order_id);
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
