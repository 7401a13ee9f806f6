use serde::{Deserialize, Serialize};

pub type TransactionId = String;
pub type BlockId = String;
pub type Address = String;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub block_id: BlockId,
    #[serde(rename = "from")]
    pub sender: Address,
    #[serde(rename = "to")]
    pub receiver: Address,
    /// Decimal string as delivered by the backend.
    pub amount: String,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Block {
    pub id: BlockId,
    /// Parsed from `id`, `None` if it doesn't read as a hex number.
    pub height: Option<u64>,
    pub transactions: Vec<Transaction>,
    pub timestamp: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Node {
    pub id: Address,
    pub group: u32,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Edge {
    pub source: Address,
    pub target: Address,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub total_links: usize,
    pub total_value: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct NetworkSnapshot {
    pub nodes: Vec<Node>,
    pub links: Vec<Edge>,
    pub stats: NetworkStats,
    pub building: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TimeSeriesData {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct HashRateData {
    pub data: Vec<TimeSeriesData>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CoinData {
    pub symbol: String,
    pub data: Vec<TimeSeriesData>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAnalysisData {
    pub hash_rate_data: HashRateData,
    pub top_coins_data: Vec<CoinData>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FraudPrediction {
    #[serde(rename = "Prediction")]
    pub prediction: u8,
    #[serde(rename = "Fraud_Probability")]
    pub fraud_probability: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into() }
    }
    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, message: message.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    #[serde(rename = "_id")]
    pub id: u64,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub description: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: String,
    pub status: String,
    pub hash: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ReportStatus {
    Completed,
    #[serde(rename = "In Progress")]
    InProgress,
}

/// A report as stored by the backend, not to be confused with a report that
/// is currently being streamed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    #[serde(rename = "_id")]
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub created_date: String,
    pub status: ReportStatus,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RawContract {
    pub value: Option<String>,
    pub address: String,
    pub decimal: Option<u32>,
}

/// One search hit. Token metadata and logs are passed through untouched.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub block_num: String,
    pub unique_id: String,
    pub hash: String,
    #[serde(rename = "from")]
    pub sender: Address,
    #[serde(rename = "to")]
    pub receiver: Address,
    pub value: Option<String>,
    pub erc721_token_id: Option<String>,
    pub erc1155_metadata: Option<serde_json::Value>,
    pub token_id: Option<String>,
    pub asset: Option<String>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_contract: Option<RawContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AddressData {
    pub remarks: String,
    pub address: Address,
    pub severity: Severity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum DatabaseStatus {
    Active,
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    #[serde(rename = "_id")]
    pub id: u64,
    pub name: String,
    pub records: u64,
    pub last_updated: String,
    pub status: DatabaseStatus,
    /// Only filled in when a single database is viewed.
    #[serde(default)]
    pub data: Vec<AddressData>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct StatusUpdate<T> {
    pub status: T,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SearchQuery {
    pub query: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LedgerSummary {
    pub transactions: usize,
    pub blocks: usize,
    pub building: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Status {
    pub transactions: usize,
    pub blocks: usize,
    pub building: bool,
    pub loading: bool,
}
