use crate::error::{Error, Result};
use crate::types::Transaction;

pub mod live;
pub mod replay;

pub enum SourceEvent {
    Next(Transaction),
    Failure(Error),
    EndOfStream,
}

/// A lazy, non-restartable sequence of transactions.
pub trait SourceStream {
    fn next(&mut self) -> impl std::future::Future<Output = SourceEvent> + Send;
}

pub fn parse_transaction(payload: &str) -> Result<Transaction> {
    serde_json::from_str(payload).map_err(|error| Error::MalformedPayload(error.to_string()))
}
