use crate::ledger::{
    AddTransactionResult, Admission, GetAnalysisResult, GetBlockResult, GetBlocksResult,
    GetTransactionResult, GetTransactionsResult, Ledger, NetworkControl, NetworkResult,
    SummaryResult, TakeNotificationsResult, UnitResult,
};
use crate::network::NetworkBuilder;
use crate::types::{
    Block, BlockId, LedgerSummary, NetworkAnalysisData, Notification, Transaction, TransactionId,
};
use std::collections::{HashMap, VecDeque};

const MAX_NOTIFICATIONS: usize = 50;

/// Reads the numeric height out of a block identifier: optional `0x`, then
/// as many hex digits as there are.
pub fn parse_block_height(id: &str) -> Option<u64> {
    let trimmed = id.trim_start();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let end = digits.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(digits.len());
    u64::from_str_radix(&digits[..end], 16).ok()
}

/// The canonical transactions and blocks of a session.
///
/// Both are stored in arrival order and handed out most recent first, which
/// is the same as prepending on every arrival.
#[derive(Default, Debug)]
pub struct Canonical {
    transactions: Vec<Transaction>,
    transaction_index: HashMap<TransactionId, usize>,
    blocks: Vec<Block>,
    block_index: HashMap<BlockId, usize>,
}

impl Canonical {
    pub fn admit(&mut self, transaction: Transaction) -> Admission {
        if self.transaction_index.contains_key(&transaction.id) {
            return Admission::Duplicate;
        }
        self.transaction_index.insert(transaction.id.clone(), self.transactions.len());
        self.aggregate(&transaction);
        self.transactions.push(transaction);
        Admission::Admitted
    }

    fn aggregate(&mut self, transaction: &Transaction) {
        if let Some(&position) = self.block_index.get(&transaction.block_id) {
            self.blocks[position].transactions.push(transaction.clone());
            return;
        }
        let block = Block {
            id: transaction.block_id.clone(),
            height: parse_block_height(&transaction.block_id),
            transactions: Vec::from([transaction.clone()]),
            timestamp: transaction.timestamp,
        };
        self.block_index.insert(block.id.clone(), self.blocks.len());
        self.blocks.push(block);
    }

    /// Most recent arrival first.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().rev()
    }

    /// Most recent first by timestamp. Equal timestamps keep their canonical
    /// order.
    pub fn ordered(&self) -> Vec<&Transaction> {
        let mut ordered: Vec<&Transaction> = self.transactions().collect();
        ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        ordered
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transaction_index.get(id).map(|&index| &self.transactions[index])
    }

    /// Most recently created block first.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().rev()
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.block_index.get(id).map(|&index| &self.blocks[index])
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Session state owned by the ledger task.
#[derive(Default, Debug)]
pub struct Memory {
    canonical: Canonical,
    network: NetworkBuilder,
    analysis: Option<NetworkAnalysisData>,
    notifications: VecDeque<Notification>,
}

impl Memory {
    pub fn canonical(&self) -> &Canonical {
        &self.canonical
    }
}

impl Ledger for Memory {
    async fn add_transaction(&mut self, transaction: Transaction) -> AddTransactionResult {
        let id = transaction.id.clone();
        let admission = self.canonical.admit(transaction);
        match admission {
            Admission::Admitted => {
                log::debug!(
                    "Admitted {} Transactions: {} Blocks: {}",
                    id,
                    self.canonical.transaction_count(),
                    self.canonical.block_count()
                );
                // Outside of a reset every earlier admission is already folded
                // in, only the new arrival can add to the graph.
                if self.network.is_stale() {
                    self.network.rebuild(self.canonical.ordered());
                } else if let Some(transaction) = self.canonical.transaction(&id) {
                    self.network.update([transaction]);
                }
            }
            Admission::Duplicate => log::debug!("Duplicate {} rejected", id),
        }
        Ok(admission)
    }

    async fn get_transactions(&self, limit: Option<usize>) -> GetTransactionsResult {
        let ordered = self.canonical.ordered();
        let limit = limit.unwrap_or(ordered.len());
        Ok(ordered.into_iter().take(limit).cloned().collect())
    }

    async fn get_transaction(&self, id: &str) -> GetTransactionResult {
        Ok(self.canonical.transaction(id).cloned())
    }

    async fn get_blocks(&self) -> GetBlocksResult {
        Ok(self.canonical.blocks().cloned().collect())
    }

    async fn get_block(&self, id: &str) -> GetBlockResult {
        Ok(self.canonical.block(id).cloned())
    }

    async fn get_network(&self) -> NetworkResult {
        Ok(self.network.snapshot())
    }

    async fn control_network(&mut self, control: NetworkControl) -> NetworkResult {
        match control {
            NetworkControl::Pause => {
                log::debug!("Network building paused");
                self.network.pause();
            }
            NetworkControl::Resume => {
                log::debug!("Network building resumed");
                self.network.resume(self.canonical.ordered());
            }
            NetworkControl::Reset => {
                log::debug!("Network reset");
                self.network.reset();
            }
        }
        Ok(self.network.snapshot())
    }

    async fn set_analysis(&mut self, data: NetworkAnalysisData) -> UnitResult {
        self.analysis = Some(data);
        Ok(())
    }

    async fn get_analysis(&self) -> GetAnalysisResult {
        Ok(self.analysis.clone())
    }

    async fn notify(&mut self, notification: Notification) -> UnitResult {
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(notification);
        Ok(())
    }

    async fn take_notifications(&mut self) -> TakeNotificationsResult {
        Ok(self.notifications.drain(..).collect())
    }

    async fn get_summary(&self) -> SummaryResult {
        Ok(LedgerSummary {
            transactions: self.canonical.transaction_count(),
            blocks: self.canonical.block_count(),
            building: self.network.is_building(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn transaction(id: &str, block_id: &str, sender: &str, receiver: &str, timestamp: i64) -> Transaction {
        Transaction {
            id: id.to_string(),
            block_id: block_id.to_string(),
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount: "1.0".to_string(),
            timestamp,
        }
    }

    fn ids(transactions: &[Transaction]) -> Vec<&str> {
        transactions.iter().map(|transaction| transaction.id.as_str()).collect()
    }

    #[test]
    fn block_height_from_identifier() {
        assert_eq!(parse_block_height("0x1b4"), Some(0x1b4));
        assert_eq!(parse_block_height("0X10"), Some(16));
        assert_eq!(parse_block_height("123"), Some(0x123));
        assert_eq!(parse_block_height("ff-zz"), Some(0xff));
        assert_eq!(parse_block_height("zz"), None);
        assert_eq!(parse_block_height(""), None);
        assert_eq!(
            parse_block_height("0x88e96d4537bea4d9c05d12549907b32561d3bf31f45aae734cdc119f13406cb6"),
            None
        );
    }

    #[tokio::test]
    async fn scenario_with_duplicate() {
        let mut memory = Memory::default();
        let tx_1 = Transaction { amount: "1.0".to_string(), ..transaction("tx1", "b1", "0xA", "0xB", 100) };
        let tx_2 = Transaction { amount: "2.0".to_string(), ..transaction("tx2", "b1", "0xB", "0xC", 200) };

        assert_eq!(memory.add_transaction(tx_1.clone()).await.unwrap(), Admission::Admitted);
        assert_eq!(memory.add_transaction(tx_2.clone()).await.unwrap(), Admission::Admitted);
        assert_eq!(memory.add_transaction(tx_1.clone()).await.unwrap(), Admission::Duplicate);

        let transactions = memory.get_transactions(None).await.unwrap();
        assert_eq!(transactions, Vec::from([tx_2.clone(), tx_1.clone()]));

        let blocks = memory.get_blocks().await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].transactions, Vec::from([tx_1, tx_2]));
        assert_eq!(blocks[0].timestamp, 100);
        assert_eq!(blocks[0].height, Some(0xb1));

        let network = memory.get_network().await.unwrap();
        assert_eq!(network.nodes.len(), 3);
        assert_eq!(network.links.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_leaves_everything_unchanged() {
        let mut memory = Memory::default();
        let original = transaction("tx1", "b1", "0xA", "0xB", 100);
        memory.add_transaction(original.clone()).await.unwrap();
        // Same id, different content: still rejected, first version kept.
        let imposter = transaction("tx1", "b2", "0xC", "0xD", 500);
        assert_eq!(memory.add_transaction(imposter).await.unwrap(), Admission::Duplicate);
        assert_eq!(memory.get_transactions(None).await.unwrap(), Vec::from([original.clone()]));
        assert_eq!(memory.get_blocks().await.unwrap().len(), 1);
        assert_eq!(memory.get_transaction("tx1").await.unwrap(), Some(original));
        assert_eq!(memory.get_network().await.unwrap().nodes.len(), 2);
    }

    #[tokio::test]
    async fn ordered_by_timestamp_with_stable_ties() {
        let mut memory = Memory::default();
        for (id, timestamp) in [("a", 300), ("b", 100), ("c", 300), ("d", 200), ("e", 100)] {
            memory.add_transaction(transaction(id, "b1", "0xA", "0xB", timestamp)).await.unwrap();
        }
        // Ties keep canonical order, which is most recent arrival first.
        let transactions = memory.get_transactions(None).await.unwrap();
        assert_eq!(ids(&transactions), Vec::from(["c", "a", "d", "e", "b"]));
        let latest = memory.get_transactions(Some(2)).await.unwrap();
        assert_eq!(ids(&latest), Vec::from(["c", "a"]));
        assert_eq!(memory.get_transactions(Some(100)).await.unwrap().len(), 5);
        // The canonical view itself is untouched by ordering.
        let canonical: Vec<&str> = memory.canonical().transactions()
            .map(|transaction| transaction.id.as_str())
            .collect();
        assert_eq!(canonical, Vec::from(["e", "d", "c", "b", "a"]));
    }

    #[tokio::test]
    async fn blocks_group_interleaved_arrivals() {
        let mut memory = Memory::default();
        let arrivals = [
            ("t1", "0x1"), ("t2", "0x2"), ("t3", "0x1"), ("t4", "0x3"),
            ("t5", "0x2"), ("t6", "0x1"), ("t7", "0x3"),
        ];
        for (index, (id, block_id)) in arrivals.iter().enumerate() {
            memory.add_transaction(
                transaction(id, block_id, "0xA", "0xB", 1000 - index as i64)
            ).await.unwrap();
        }
        let blocks = memory.get_blocks().await.unwrap();
        let block_ids: Vec<&str> = blocks.iter().map(|block| block.id.as_str()).collect();
        assert_eq!(block_ids, Vec::from(["0x3", "0x2", "0x1"]));
        let distinct: HashSet<&str> = arrivals.iter().map(|(_, block_id)| *block_id).collect();
        assert_eq!(blocks.len(), distinct.len());

        let block_1 = memory.get_block("0x1").await.unwrap().unwrap();
        assert_eq!(ids(&block_1.transactions), Vec::from(["t1", "t3", "t6"]));
        assert_eq!(block_1.timestamp, 1000);
        assert_eq!(block_1.height, Some(1));
        let block_3 = memory.get_block("0x3").await.unwrap().unwrap();
        assert_eq!(ids(&block_3.transactions), Vec::from(["t4", "t7"]));
        assert!(memory.get_block("0x4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn network_pause_resume_reset() {
        let mut memory = Memory::default();
        memory.add_transaction(transaction("tx1", "b1", "0xA", "0xB", 100)).await.unwrap();

        let paused = memory.control_network(NetworkControl::Pause).await.unwrap();
        assert!(!paused.building);
        memory.add_transaction(transaction("tx2", "b1", "0xB", "0xC", 200)).await.unwrap();
        assert_eq!(memory.get_network().await.unwrap().nodes.len(), 2);

        let resumed = memory.control_network(NetworkControl::Resume).await.unwrap();
        assert_eq!(resumed.nodes.len(), 3);
        assert_eq!(resumed.links.len(), 2);

        let reset = memory.control_network(NetworkControl::Reset).await.unwrap();
        assert_eq!(reset.nodes.len(), 0);
        assert_eq!(memory.get_summary().await.unwrap(), LedgerSummary {
            transactions: 2,
            blocks: 1,
            building: true,
        });

        // The next arrival folds the whole canonical list back in.
        memory.add_transaction(transaction("tx3", "b2", "0xC", "0xD", 300)).await.unwrap();
        let rebuilt = memory.get_network().await.unwrap();
        assert_eq!(rebuilt.nodes.len(), 4);
        assert_eq!(rebuilt.links.len(), 3);
    }

    #[tokio::test]
    async fn incremental_fold_matches_full_fold() {
        let mut memory = Memory::default();
        let arrivals = [
            ("t1", "0xA", "0xB", "1.0", 300), ("t2", "0xB", "0xC", "2.0", 100),
            ("t3", "0xA", "0xB", "5.0", 500), ("t4", "0xC", "0xA", "3.0", 200),
            ("t5", "0xB", "0xC", "8.0", 50), ("t6", "0xD", "0xA", "4.0", 400),
        ];
        for (id, sender, receiver, amount, timestamp) in arrivals {
            let transaction = Transaction { amount: amount.to_string(), ..transaction(id, "b1", sender, receiver, timestamp) };
            memory.add_transaction(transaction).await.unwrap();
        }
        let incremental = memory.get_network().await.unwrap();
        let arrival_order: Vec<&Transaction> = memory.canonical().transactions().collect();
        let mut full = NetworkBuilder::default();
        full.update(arrival_order.into_iter().rev());
        // Same graph, first arrival of a pair fixes its weight.
        assert_eq!(incremental, full.snapshot());
        assert_eq!(incremental.links.iter().find(|edge| edge.source == "0xA").unwrap().value, 1.0);
        assert_eq!(incremental.stats.total_value, 10.0);
    }

    #[tokio::test]
    async fn paused_pairs_use_most_recent_on_resume() {
        let mut memory = Memory::default();
        memory.control_network(NetworkControl::Pause).await.unwrap();
        let older = Transaction { amount: "1.0".to_string(), ..transaction("tx1", "b1", "0xA", "0xB", 100) };
        let newer = Transaction { amount: "9.0".to_string(), ..transaction("tx2", "b1", "0xA", "0xB", 200) };
        memory.add_transaction(older).await.unwrap();
        memory.add_transaction(newer).await.unwrap();
        let resumed = memory.control_network(NetworkControl::Resume).await.unwrap();
        assert_eq!(resumed.links.len(), 1);
        assert_eq!(resumed.links[0].value, 9.0);
    }

    #[tokio::test]
    async fn notifications_are_drained_and_bounded() {
        let mut memory = Memory::default();
        for index in 0..(MAX_NOTIFICATIONS + 5) {
            memory.notify(Notification::error(format!("failure {}", index))).await.unwrap();
        }
        let notifications = memory.take_notifications().await.unwrap();
        assert_eq!(notifications.len(), MAX_NOTIFICATIONS);
        assert_eq!(notifications[0].message, "failure 5");
        assert!(memory.take_notifications().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn analysis_last_writer_wins() {
        let mut memory = Memory::default();
        assert!(memory.get_analysis().await.unwrap().is_none());
        let mut first = NetworkAnalysisData::default();
        first.top_coins_data.push(crate::types::CoinData { symbol: "BTC".to_string(), data: Vec::new() });
        memory.set_analysis(first).await.unwrap();
        let second = NetworkAnalysisData::default();
        memory.set_analysis(second.clone()).await.unwrap();
        assert_eq!(memory.get_analysis().await.unwrap(), Some(second));
    }
}
