pub mod aggregator;
pub mod analysis;
pub mod api;
pub mod backend;
pub mod error;
pub mod ledger;
pub mod network;
pub mod report;
pub mod source;
pub mod types;
