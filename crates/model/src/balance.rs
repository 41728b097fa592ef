//! Per-asset account balances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Account balances keyed by asset: free plus locked, with
/// `total = free + locked` maintained by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balance {
    free: HashMap<String, f64>,
    locked: HashMap<String, f64>,
}

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free and locked amounts for an asset.
    pub fn set(&mut self, asset: impl Into<String>, free: f64, locked: f64) {
        let asset = asset.into();
        self.free.insert(asset.clone(), free);
        self.locked.insert(asset, locked);
    }

    pub fn free(&self, asset: &str) -> f64 {
        self.free.get(asset).copied().unwrap_or(0.0)
    }

    pub fn locked(&self, asset: &str) -> f64 {
        self.locked.get(asset).copied().unwrap_or(0.0)
    }

    pub fn total(&self, asset: &str) -> f64 {
        self.free(asset) + self.locked(asset)
    }

    /// Assets with any recorded balance.
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.free.keys().map(String::as_str)
    }
}
