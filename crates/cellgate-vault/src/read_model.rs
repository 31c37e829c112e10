//! Replicated read-safe model backing tier-1 safe reads.
//!
//! Safe reads never reach the vault; they are answered from this projection,
//! which keeps serving while policy, risk, audit or KMS are down.

use std::collections::{BTreeMap, HashMap};

use cellgate_types::{Operation, UserId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadModel {
    /// Minor currency units.
    pub balance: i64,
    pub transactions: Vec<String>,
    pub profile: BTreeMap<String, String>,
}

/// What a safe read returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum SafeReadView {
    Balance(i64),
    Transactions(Vec<String>),
    Profile(BTreeMap<String, String>),
}

#[derive(Debug, Default)]
pub struct ReadModelStore {
    by_user: RwLock<HashMap<UserId, ReadModel>>,
}

impl ReadModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, user: &UserId) {
        self.by_user.write().entry(user.clone()).or_default();
    }

    pub fn set_balance(&self, user: &UserId, balance: i64) {
        self.by_user.write().entry(user.clone()).or_default().balance = balance;
    }

    pub fn add_transaction(&self, user: &UserId, transaction: impl Into<String>) {
        self.by_user
            .write()
            .entry(user.clone())
            .or_default()
            .transactions
            .push(transaction.into());
    }

    pub fn set_profile(&self, user: &UserId, profile: BTreeMap<String, String>) {
        self.by_user.write().entry(user.clone()).or_default().profile = profile;
    }

    /// Snapshot of `user`'s model; unknown users read as empty.
    pub fn get(&self, user: &UserId) -> ReadModel {
        self.by_user.read().get(user).cloned().unwrap_or_default()
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.by_user.read().contains_key(user)
    }

    /// The view `op` reads, or `None` when `op` is not a safe read.
    pub fn view(&self, op: Operation, user: &UserId) -> Option<SafeReadView> {
        let by_user = self.by_user.read();
        let model = by_user.get(user);
        let view = match op {
            Operation::ViewBalance => SafeReadView::Balance(model.map(|m| m.balance).unwrap_or(0)),
            Operation::ViewTransactionHistory => SafeReadView::Transactions(
                model.map(|m| m.transactions.clone()).unwrap_or_default(),
            ),
            Operation::ViewProfileBasic => {
                SafeReadView::Profile(model.map(|m| m.profile.clone()).unwrap_or_default())
            }
            _ => return None,
        };
        Some(view)
    }

    /// Remove everything held for `user`. Returns whether anything existed.
    pub fn delete_user(&self, user: &UserId) -> bool {
        self.by_user.write().remove(user).is_some()
    }
}
