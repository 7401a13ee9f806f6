use crate::error::{Error, Result};
use crate::source::{SourceEvent, SourceStream};
use crate::types::Transaction;
use std::fs;
use std::time::Instant;

/// Plays back a JSON array of transactions recorded earlier.
pub struct ReplayStream {
    current: usize,
    transactions: Vec<Transaction>,
    measure: Option<Instant>,
}

impl ReplayStream {
    pub fn new(path: &str) -> Result<Self> {
        let replay_data = fs::read_to_string(path)
            .map_err(|error| Error::ReplayFile(path.to_string(), error.to_string()))?;
        let transactions = serde_json::from_str(&replay_data)
            .map_err(|error| Error::ReplayFile(path.to_string(), error.to_string()))?;
        Ok(Self::from_transactions(transactions))
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self { current: 0, transactions, measure: None }
    }
}

impl SourceStream for ReplayStream {
    async fn next(&mut self) -> SourceEvent {
        if self.measure.is_none() {
            log::debug!("Replay start with {} transactions", self.transactions.len());
            self.measure = Some(Instant::now());
        }
        if self.current >= self.transactions.len() {
            if let Some(measure) = self.measure {
                log::debug!(
                    "Replay done with {} transactions in {:?}", self.transactions.len(), measure.elapsed()
                );
            }
            return SourceEvent::EndOfStream;
        }
        let transaction = self.transactions[self.current].clone();
        log::debug!("Transaction: {} Block: {}", transaction.id, transaction.block_id);
        self.current += 1;
        SourceEvent::Next(transaction)
    }
}
