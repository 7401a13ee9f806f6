use crate::error::{Error, Result};
use crate::ledger::{Admission, LedgerInterface};
use crate::source::{SourceEvent, SourceStream};
use crate::types::Transaction;

pub struct Aggregator<Source>
where
    Source: SourceStream,
{
    source: Source,
    ledger: LedgerInterface,
}

impl <Source> Aggregator<Source>
where
    Source: SourceStream,
{
    pub fn new(source: Source, ledger: LedgerInterface) -> Self {
        Self {source, ledger}
    }

    /// Feeds the source into the ledger until the source ends or fails.
    /// Returns the number of admitted transactions.
    pub async fn run(&mut self) -> usize {
        let mut admitted = 0;
        loop {
            let event = self.source.next().await;
            match event {
                SourceEvent::Next(transaction) => {
                    match self.process_transaction(transaction).await {
                        Ok(Admission::Admitted) => admitted += 1,
                        Ok(Admission::Duplicate) => continue,
                        Err(error) => {
                            log::error!("Failed to process transaction: {}", error);
                            return admitted
                        }
                    }
                }
                SourceEvent::Failure(Error::Shutdown) => {
                    log::info!("Stream stopped for shutdown");
                    return admitted
                }
                SourceEvent::Failure(error) => {
                    log::error!("Stream broken: {}", error);
                    return admitted
                }
                SourceEvent::EndOfStream => {
                    log::info!("End of stream");
                    return admitted
                }
            }
        }
    }

    async fn process_transaction(&mut self, transaction: Transaction) -> Result<Admission> {
        let id = transaction.id.clone();
        let admission = self.ledger.add_transaction(transaction).await?;
        if admission == Admission::Duplicate {
            log::debug!("Skipped duplicate {}", id);
        }
        Ok(admission)
    }
}
