use crate::analysis::LoadingTracker;
use crate::backend::BackendClient;
use crate::error::{Error, Result};
use crate::ledger::LedgerInterface;
use crate::types::{DatabaseStatus, Notification, SearchQuery, Status, StatusUpdate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

#[derive(Clone)]
pub struct ApiContext {
    pub ledger: LedgerInterface,
    pub backend: BackendClient,
    pub loading: LoadingTracker,
}

#[derive(Deserialize)]
pub struct GetTransactions {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct GetReport {
    #[serde(rename = "type")]
    pub report_type: String,
}

#[derive(Serialize)]
struct ReportReply {
    content: String,
}

const MAX_BODY_BYTES: u64 = 16 * 1024;

fn error_status(error: &Error) -> StatusCode {
    match error {
        Error::Unauthorized => StatusCode::UNAUTHORIZED,
        Error::ChannelFailure(..) | Error::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
        Error::Request(..) | Error::UnexpectedStatus(..) | Error::ReportStream(_) | Error::InvalidUrl(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T: Serialize>(result: Result<T>) -> WithStatus<Json> {
    match result {
        Ok(value) => warp::reply::with_status(warp::reply::json(&value), StatusCode::OK),
        Err(error) => {
            log::warn!("Request failed: {}", error);
            warp::reply::with_status(warp::reply::json(&error.to_string()), error_status(&error))
        }
    }
}

fn found<T: Serialize>(result: Result<Option<T>>, what: &str) -> WithStatus<Json> {
    match result {
        Ok(None) => warp::reply::with_status(
            warp::reply::json(&format!("{} not found", what)),
            StatusCode::NOT_FOUND,
        ),
        other => reply(other),
    }
}

async fn get_transactions(
    params: GetTransactions,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(reply(context.ledger.get_transactions(params.limit).await))
}

async fn get_transaction(
    id: String,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(found(context.ledger.get_transaction(id).await, "transaction"))
}

async fn get_blocks(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(reply(context.ledger.get_blocks().await))
}

async fn get_block(
    id: String,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(found(context.ledger.get_block(id).await, "block"))
}

async fn get_network(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(reply(context.ledger.get_network().await))
}

async fn control_network(
    action: String,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let result = match action.as_str() {
        "pause" => context.ledger.pause_network().await,
        "resume" => context.ledger.resume_network().await,
        "reset" => context.ledger.reset_network().await,
        _ => return Err(warp::reject::not_found()),
    };
    Ok(reply(result))
}

async fn get_analysis(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(reply(context.ledger.get_analysis().await))
}

async fn get_status(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let status = context.ledger.get_summary().await.map(|summary| Status {
        transactions: summary.transactions,
        blocks: summary.blocks,
        building: summary.building,
        loading: context.loading.loading(),
    });
    Ok(reply(status))
}

async fn get_notifications(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    Ok(reply(context.ledger.take_notifications().await))
}

/// Queues the notification for the outcome of a backend call and hands the
/// result back. Reads only notify on failure.
async fn notify_outcome<T>(
    context: &ApiContext,
    result: Result<T>,
    failure: &str,
    success: Option<&str>,
) -> Result<T> {
    let notification = match (&result, success) {
        (Err(_), _) => Some(Notification::error(failure)),
        (Ok(_), Some(message)) => Some(Notification::success(message)),
        (Ok(_), None) => None,
    };
    if let Some(notification) = notification {
        if let Err(error) = context.ledger.notify(notification).await {
            log::error!("Failed to queue notification: {}", error);
        }
    }
    result
}

async fn get_prediction(
    address: String,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.predict_fraud(&address).await;
    Ok(reply(notify_outcome(&context, result, "Error fetching fraud prediction", None).await))
}

async fn get_report(
    alert_id: String,
    params: GetReport,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.generate_report(&alert_id, &params.report_type).await
        .map(|content| ReportReply { content });
    Ok(reply(notify_outcome(&context, result, "Error generating report", None).await))
}

async fn get_alerts(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.alerts().await;
    Ok(reply(notify_outcome(&context, result, "Error fetching alerts", None).await))
}

async fn update_alert_status(
    id: u64,
    update: StatusUpdate<String>,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.update_alert_status(id, &update.status).await;
    let result = notify_outcome(
        &context,
        result,
        "Error updating alert status",
        Some("Alert status updated successfully"),
    ).await;
    Ok(reply(result))
}

async fn get_stored_reports(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.reports().await;
    Ok(reply(notify_outcome(&context, result, "Error fetching reports", None).await))
}

async fn delete_report(
    id: u64,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.delete_report(id).await;
    let result = notify_outcome(
        &context,
        result,
        "Error deleting report",
        Some("Report deleted successfully"),
    ).await;
    Ok(reply(result))
}

async fn search(
    query: SearchQuery,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.search(&query.query).await;
    Ok(reply(notify_outcome(&context, result, "Error fetching search results", None).await))
}

async fn get_databases(context: ApiContext) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.databases().await;
    Ok(reply(notify_outcome(&context, result, "Error fetching databases", None).await))
}

async fn get_database(
    id: u64,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.database(id).await;
    Ok(reply(notify_outcome(&context, result, "Error viewing database", None).await))
}

async fn delete_database(
    id: u64,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.delete_database(id).await;
    let result = notify_outcome(
        &context,
        result,
        "Error deleting database",
        Some("Database deleted successfully"),
    ).await;
    Ok(reply(result))
}

async fn update_database_status(
    id: u64,
    update: StatusUpdate<DatabaseStatus>,
    context: ApiContext,
) -> std::result::Result<impl warp::Reply, warp::Rejection> {
    let _guard = context.loading.start();
    let result = context.backend.update_database_status(id, update.status).await;
    let result = notify_outcome(
        &context,
        result,
        "Error updating database status",
        Some("Database status updated successfully"),
    ).await;
    Ok(reply(result))
}

fn with_context(
    context: ApiContext,
) -> impl Filter<Extract = (ApiContext,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || context.clone())
}

fn json_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(
    context: ApiContext,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let transactions_route = warp::get()
        .and(warp::path!("transactions"))
        .and(warp::query::<GetTransactions>())
        .and(with_context(context.clone()))
        .and_then(get_transactions);
    let transaction_route = warp::get()
        .and(warp::path!("transactions" / String))
        .and(with_context(context.clone()))
        .and_then(get_transaction);
    let blocks_route = warp::get()
        .and(warp::path!("blocks"))
        .and(with_context(context.clone()))
        .and_then(get_blocks);
    let block_route = warp::get()
        .and(warp::path!("blocks" / String))
        .and(with_context(context.clone()))
        .and_then(get_block);
    let network_route = warp::get()
        .and(warp::path!("network"))
        .and(with_context(context.clone()))
        .and_then(get_network);
    let network_control_route = warp::post()
        .and(warp::path!("network" / String))
        .and(with_context(context.clone()))
        .and_then(control_network);
    let analysis_route = warp::get()
        .and(warp::path!("analysis"))
        .and(with_context(context.clone()))
        .and_then(get_analysis);
    let status_route = warp::get()
        .and(warp::path!("status"))
        .and(with_context(context.clone()))
        .and_then(get_status);
    let notifications_route = warp::get()
        .and(warp::path!("notifications"))
        .and(with_context(context.clone()))
        .and_then(get_notifications);
    let prediction_route = warp::get()
        .and(warp::path!("predict" / String))
        .and(with_context(context.clone()))
        .and_then(get_prediction);
    let report_route = warp::get()
        .and(warp::path!("reports" / String))
        .and(warp::query::<GetReport>())
        .and(with_context(context.clone()))
        .and_then(get_report);
    let alerts_route = warp::get()
        .and(warp::path!("alerts"))
        .and(with_context(context.clone()))
        .and_then(get_alerts);
    let alert_status_route = warp::patch()
        .and(warp::path!("alerts" / u64 / "status"))
        .and(json_body::<StatusUpdate<String>>())
        .and(with_context(context.clone()))
        .and_then(update_alert_status);
    let stored_reports_route = warp::get()
        .and(warp::path!("reports"))
        .and(with_context(context.clone()))
        .and_then(get_stored_reports);
    let delete_report_route = warp::delete()
        .and(warp::path!("reports" / u64))
        .and(with_context(context.clone()))
        .and_then(delete_report);
    let search_route = warp::post()
        .and(warp::path!("search"))
        .and(json_body::<SearchQuery>())
        .and(with_context(context.clone()))
        .and_then(search);
    let databases_route = warp::get()
        .and(warp::path!("databases"))
        .and(with_context(context.clone()))
        .and_then(get_databases);
    let database_route = warp::get()
        .and(warp::path!("databases" / u64))
        .and(with_context(context.clone()))
        .and_then(get_database);
    let delete_database_route = warp::delete()
        .and(warp::path!("databases" / u64))
        .and(with_context(context.clone()))
        .and_then(delete_database);
    let database_status_route = warp::patch()
        .and(warp::path!("databases" / u64 / "status"))
        .and(json_body::<StatusUpdate<DatabaseStatus>>())
        .and(with_context(context))
        .and_then(update_database_status);
    transactions_route
        .or(transaction_route)
        .or(blocks_route)
        .or(block_route)
        .or(network_route)
        .or(network_control_route)
        .or(analysis_route)
        .or(status_route)
        .or(notifications_route)
        .or(prediction_route)
        .or(report_route)
        .or(alerts_route)
        .or(alert_status_route)
        .or(stored_reports_route)
        .or(delete_report_route)
        .or(search_route)
        .or(databases_route)
        .or(database_route)
        .or(delete_database_route)
        .or(database_status_route)
}

pub async fn run_api(address: SocketAddr, context: ApiContext, token: CancellationToken) {
    let server = warp::serve(routes(context))
        .try_bind_with_graceful_shutdown(address, async move { token.cancelled().await });
    match server {
        Ok((bound, server)) => {
            log::info!("API listening on {}", bound);
            server.await;
            log::debug!("API stopped");
        }
        Err(error) => log::error!("Failed to bind API to {}: {}", address, error),
    }
}
