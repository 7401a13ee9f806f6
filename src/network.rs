//! Address graph derived from the canonical transaction list.
//!
//! The builder only ever adds: a node per distinct address and an edge per
//! distinct `(sender, receiver)` pair. The first transaction seen for a pair
//! fixes the edge weight, later ones between the same pair are ignored.

use crate::types::{Address, Edge, NetworkSnapshot, NetworkStats, Node, Transaction};
use indexmap::{Equivalent, IndexMap};

pub const NODE_GROUP: u32 = 1;

/// Stable `#rrggbb` color for an address.
///
/// Rolling 32-bit string hash over the UTF-16 code units, the low three
/// bytes become the color channels.
pub fn address_color(address: &str) -> String {
    let hash = address.encode_utf16().fold(0i32, |hash, unit| {
        (unit as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    format!("#{:02x}{:02x}{:02x}", hash & 0xff, (hash >> 8) & 0xff, (hash >> 16) & 0xff)
}

fn edge_weight(transaction: &Transaction) -> f64 {
    match transaction.amount.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            log::warn!(
                "Transaction {} has non decimal amount {:?}, weight 0",
                transaction.id,
                transaction.amount
            );
            0.0
        }
    }
}

/// Borrowed edge key, hashes the same as `(Address, Address)`.
#[derive(Hash)]
struct Pair<'a>(&'a str, &'a str);

impl Equivalent<(Address, Address)> for Pair<'_> {
    fn equivalent(&self, key: &(Address, Address)) -> bool {
        self.0 == key.0 && self.1 == key.1
    }
}

#[derive(Debug)]
pub struct NetworkBuilder {
    nodes: IndexMap<Address, Node>,
    edges: IndexMap<(Address, Address), Edge>,
    building: bool,
    /// Set by a reset, the next fold has to start from the full list.
    stale: bool,
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self { nodes: IndexMap::new(), edges: IndexMap::new(), building: true, stale: false }
    }
}

impl NetworkBuilder {
    pub fn is_building(&self) -> bool {
        self.building
    }

    /// True once a reset dropped the graph. Only a `rebuild` from the whole
    /// canonical list brings it back in step.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Folds `transactions` into the graph. Does nothing while paused.
    pub fn update<'a>(&mut self, transactions: impl IntoIterator<Item = &'a Transaction>) {
        if !self.building {
            return;
        }
        for transaction in transactions {
            self.add_node(&transaction.sender);
            self.add_node(&transaction.receiver);
            if !self.edges.contains_key(&Pair(&transaction.sender, &transaction.receiver)) {
                self.edges.insert(
                    (transaction.sender.clone(), transaction.receiver.clone()),
                    Edge {
                        source: transaction.sender.clone(),
                        target: transaction.receiver.clone(),
                        value: edge_weight(transaction),
                    },
                );
            }
        }
    }

    /// Folds the full canonical list, in projection order.
    pub fn rebuild<'a>(&mut self, transactions: impl IntoIterator<Item = &'a Transaction>) {
        if !self.building {
            return;
        }
        self.update(transactions);
        self.stale = false;
    }

    fn add_node(&mut self, address: &Address) {
        if !self.nodes.contains_key(address) {
            self.nodes.insert(address.clone(), Node {
                id: address.clone(),
                group: NODE_GROUP,
                color: address_color(address),
            });
        }
    }

    pub fn pause(&mut self) {
        self.building = false;
    }

    /// Resumes building from `transactions`, the current canonical state.
    /// Anything that arrived while paused is picked up here.
    pub fn resume<'a>(&mut self, transactions: impl IntoIterator<Item = &'a Transaction>) {
        self.building = true;
        self.rebuild(transactions);
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.stale = true;
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            total_nodes: self.nodes.len(),
            total_links: self.edges.len(),
            total_value: self.edges.values().map(|edge| edge.value).sum(),
        }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self.nodes.values().cloned().collect(),
            links: self.edges.values().cloned().collect(),
            stats: self.stats(),
            building: self.building,
        }
    }
}
