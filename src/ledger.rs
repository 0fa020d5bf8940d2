//! Deduplication ledger of previously seen stories.
//!
//! Keys are the first 10 hex characters (40 bits) of a SHA-256 digest. At a
//! few dozen stories per day a collision is negligible; at much larger volume
//! the truncation would need to grow. The ledger never evicts entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
pub const KEY_LEN: usize = 10;

/// Stable short key for a story identifier, URL, or any other text.
pub fn story_key(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(KEY_LEN);
    key
}

/// Append-only set of seen story keys, persisted as `{"seen": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "LedgerFile", into = "LedgerFile")]
pub struct Ledger {
    /// First-seen order, for a stable file layout.
    order: Vec<String>,
    index: HashSet<String>,
}

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    #[serde(default)]
    seen: Vec<String>,
}

impl From<LedgerFile> for Ledger {
    fn from(file: LedgerFile) -> Self {
        let mut ledger = Ledger::default();
        for key in file.seen {
            ledger.mark_seen(&key);
        }
        ledger
    }
}

impl From<Ledger> for LedgerFile {
    fn from(ledger: Ledger) -> Self {
        Self { seen: ledger.order }
    }
}

impl Ledger {
    pub fn is_seen(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Record `key`. Returns `false` if it was already present.
    pub fn mark_seen(&mut self, key: &str) -> bool {
        if !self.index.insert(key.to_string()) {
            return false;
        }
        self.order.push(key.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
