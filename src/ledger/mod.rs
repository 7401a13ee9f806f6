pub mod memory;

use crate::error::{Error, Result};
use crate::types::{
    Block, LedgerSummary, NetworkAnalysisData, NetworkSnapshot, Notification, Transaction,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Admission {
    Admitted,
    Duplicate,
}

pub type AddTransactionResult = Result<Admission>;
pub type GetTransactionsResult = Result<Vec<Transaction>>;
pub type GetTransactionResult = Result<Option<Transaction>>;
pub type GetBlocksResult = Result<Vec<Block>>;
pub type GetBlockResult = Result<Option<Block>>;
pub type NetworkResult = Result<NetworkSnapshot>;
pub type GetAnalysisResult = Result<Option<NetworkAnalysisData>>;
pub type UnitResult = Result<()>;
pub type TakeNotificationsResult = Result<Vec<Notification>>;
pub type SummaryResult = Result<LedgerSummary>;

async fn receive<Type>(sender: &str, receiver: oneshot::Receiver<Type>) -> Result<Type> {
    receiver.await.map_err(|error| {
        Error::ChannelFailure(sender.to_string(), error.to_string())
    })
}

pub enum NetworkControl {
    Pause,
    Resume,
    Reset,
}

pub enum LedgerCommand {
    AddTransaction(Transaction, oneshot::Sender<AddTransactionResult>),
    GetTransactions(Option<usize>, oneshot::Sender<GetTransactionsResult>),
    GetTransaction(String, oneshot::Sender<GetTransactionResult>),
    GetBlocks(oneshot::Sender<GetBlocksResult>),
    GetBlock(String, oneshot::Sender<GetBlockResult>),
    GetNetwork(oneshot::Sender<NetworkResult>),
    ControlNetwork(NetworkControl, oneshot::Sender<NetworkResult>),
    SetAnalysis(NetworkAnalysisData, oneshot::Sender<UnitResult>),
    GetAnalysis(oneshot::Sender<GetAnalysisResult>),
    Notify(Notification, oneshot::Sender<UnitResult>),
    TakeNotifications(oneshot::Sender<TakeNotificationsResult>),
    GetSummary(oneshot::Sender<SummaryResult>),
}

impl LedgerCommand {
    pub async fn send(self, from: &str, sender: &mpsc::Sender<LedgerCommand>) -> Result<()> {
        sender.send(self).await.map_err(|error| {
            Error::ChannelFailure(from.to_string(), error.to_string())
        })?;
        Ok(())
    }
}

/// Cloneable handle to the ledger task. Every call is one command, commands
/// are applied in the order they arrive.
#[derive(Clone)]
pub struct LedgerInterface {
    pub command_tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerInterface {
    pub fn new(command_tx: mpsc::Sender<LedgerCommand>) -> Self {
        Self {command_tx}
    }

    async fn request<Type>(
        &self,
        name: &str,
        command: impl FnOnce(oneshot::Sender<Result<Type>>) -> LedgerCommand,
    ) -> Result<Type> {
        let (tx, rx) = oneshot::channel();
        command(tx).send(name, &self.command_tx).await?;
        receive(name, rx).await?
    }

    pub async fn add_transaction(&self, transaction: Transaction) -> AddTransactionResult {
        self.request("add_transaction", |tx| LedgerCommand::AddTransaction(transaction, tx)).await
    }
    pub async fn get_transactions(&self, limit: Option<usize>) -> GetTransactionsResult {
        self.request("get_transactions", |tx| LedgerCommand::GetTransactions(limit, tx)).await
    }
    pub async fn get_transaction(&self, id: String) -> GetTransactionResult {
        self.request("get_transaction", |tx| LedgerCommand::GetTransaction(id, tx)).await
    }
    pub async fn get_blocks(&self) -> GetBlocksResult {
        self.request("get_blocks", LedgerCommand::GetBlocks).await
    }
    pub async fn get_block(&self, id: String) -> GetBlockResult {
        self.request("get_block", |tx| LedgerCommand::GetBlock(id, tx)).await
    }
    pub async fn get_network(&self) -> NetworkResult {
        self.request("get_network", LedgerCommand::GetNetwork).await
    }
    pub async fn pause_network(&self) -> NetworkResult {
        self.request("pause_network", |tx| LedgerCommand::ControlNetwork(NetworkControl::Pause, tx)).await
    }
    pub async fn resume_network(&self) -> NetworkResult {
        self.request("resume_network", |tx| LedgerCommand::ControlNetwork(NetworkControl::Resume, tx)).await
    }
    pub async fn reset_network(&self) -> NetworkResult {
        self.request("reset_network", |tx| LedgerCommand::ControlNetwork(NetworkControl::Reset, tx)).await
    }
    pub async fn set_analysis(&self, data: NetworkAnalysisData) -> UnitResult {
        self.request("set_analysis", |tx| LedgerCommand::SetAnalysis(data, tx)).await
    }
    pub async fn get_analysis(&self) -> GetAnalysisResult {
        self.request("get_analysis", LedgerCommand::GetAnalysis).await
    }
    pub async fn notify(&self, notification: Notification) -> UnitResult {
        self.request("notify", |tx| LedgerCommand::Notify(notification, tx)).await
    }
    pub async fn take_notifications(&self) -> TakeNotificationsResult {
        self.request("take_notifications", LedgerCommand::TakeNotifications).await
    }
    pub async fn get_summary(&self) -> SummaryResult {
        self.request("get_summary", LedgerCommand::GetSummary).await
    }
}

fn reply<Type>(name: &str, sender: oneshot::Sender<Type>, value: Type) {
    // The requester may have gone away, that must not stop the ledger.
    if sender.send(value).is_err() {
        log::warn!("ledger_{}: requester dropped before reply", name);
    }
}

pub trait Ledger {
    async fn run(
        &mut self,
        mut receiver: mpsc::Receiver<LedgerCommand>,
        token: CancellationToken,
    ) -> Result<()> {
        loop {
            let command = tokio::select! {
                _ = token.cancelled() => {
                    log::debug!("Ledger shutdown");
                    return Ok(());
                }
                command = receiver.recv() => command,
            };
            let Some(command) = command else {
                log::debug!("All ledger handles dropped");
                return Ok(());
            };
            match command {
                LedgerCommand::AddTransaction(transaction, sender) => {
                    reply("add_transaction", sender, self.add_transaction(transaction).await)
                }
                LedgerCommand::GetTransactions(limit, sender) => {
                    reply("get_transactions", sender, self.get_transactions(limit).await)
                }
                LedgerCommand::GetTransaction(id, sender) => {
                    reply("get_transaction", sender, self.get_transaction(&id).await)
                }
                LedgerCommand::GetBlocks(sender) => {
                    reply("get_blocks", sender, self.get_blocks().await)
                }
                LedgerCommand::GetBlock(id, sender) => {
                    reply("get_block", sender, self.get_block(&id).await)
                }
                LedgerCommand::GetNetwork(sender) => {
                    reply("get_network", sender, self.get_network().await)
                }
                LedgerCommand::ControlNetwork(control, sender) => {
                    reply("control_network", sender, self.control_network(control).await)
                }
                LedgerCommand::SetAnalysis(data, sender) => {
                    reply("set_analysis", sender, self.set_analysis(data).await)
                }
                LedgerCommand::GetAnalysis(sender) => {
                    reply("get_analysis", sender, self.get_analysis().await)
                }
                LedgerCommand::Notify(notification, sender) => {
                    reply("notify", sender, self.notify(notification).await)
                }
                LedgerCommand::TakeNotifications(sender) => {
                    reply("take_notifications", sender, self.take_notifications().await)
                }
                LedgerCommand::GetSummary(sender) => {
                    reply("get_summary", sender, self.get_summary().await)
                }
            }
        }
    }
    async fn add_transaction(&mut self, transaction: Transaction) -> AddTransactionResult;
    async fn get_transactions(&self, limit: Option<usize>) -> GetTransactionsResult;
    async fn get_transaction(&self, id: &str) -> GetTransactionResult;
    async fn get_blocks(&self) -> GetBlocksResult;
    async fn get_block(&self, id: &str) -> GetBlockResult;
    async fn get_network(&self) -> NetworkResult;
    async fn control_network(&mut self, control: NetworkControl) -> NetworkResult;
    async fn set_analysis(&mut self, data: NetworkAnalysisData) -> UnitResult;
    async fn get_analysis(&self) -> GetAnalysisResult;
    async fn notify(&mut self, notification: Notification) -> UnitResult;
    async fn take_notifications(&mut self) -> TakeNotificationsResult;
    async fn get_summary(&self) -> SummaryResult;
}
