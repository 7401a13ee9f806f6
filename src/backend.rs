use crate::error::{Error, Result};
use crate::report::{Report, ReportProgress, SseParser};
use crate::types::{
    Alert, Database, DatabaseStatus, FraudPrediction, NetworkAnalysisData, SearchQuery,
    StatusUpdate, StoredReport, Transfer,
};
use futures_util::StreamExt;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

/// Bearer token shared by every backend request. Cleared when the backend
/// answers 401.
#[derive(Clone, Default, Debug)]
pub struct Credentials {
    token: Arc<RwLock<Option<String>>>,
}

impl Credentials {
    pub fn new(token: Option<String>) -> Self {
        Self { token: Arc::new(RwLock::new(token)) }
    }
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }
    pub async fn set(&self, token: String) {
        *self.token.write().await = Some(token);
    }
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
}

impl BackendClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|error| Error::InvalidUrl(format!("{} {}", base_url, error)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(base_url.to_string()));
        }
        // No overall timeout, report streams stay open for as long as the
        // backend keeps writing.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|error| Error::Request(base_url.to_string(), error))?;
        Ok(Self { client, base_url, credentials })
    }

    /// Appends `segments` to the base url, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<(String, RequestBuilder)> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let request = self.client.request(method, url);
        let request = match self.credentials.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        Ok((path, request))
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await
            .map_err(|error| Error::Request(path.to_string(), error))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            log::warn!("{} answered 401, clearing credentials", path);
            self.credentials.clear().await;
            return Err(Error::Unauthorized);
        }
        if !status.is_success() {
            return Err(Error::UnexpectedStatus(path.to_string(), status.as_u16()));
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(&self, path: String, request: RequestBuilder) -> Result<T> {
        let response = self.send(&path, request).await?;
        response.json().await.map_err(|error| Error::Request(path, error))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let (path, request) = self.request(Method::GET, segments).await?;
        self.fetch(path, request).await
    }

    pub async fn network_analysis(&self) -> Result<NetworkAnalysisData> {
        self.get(&["api", "network-analysis"]).await
    }

    pub async fn predict_fraud(&self, address: &str) -> Result<FraudPrediction> {
        self.get(&["api", "transactions", address, "predict"]).await
    }

    /// Streams a report for `alert_id` and returns the concatenated document.
    pub async fn generate_report(&self, alert_id: &str, report_type: &str) -> Result<String> {
        let (path, request) = self.request(Method::GET, &["api", "transactions", alert_id, "analyse"]).await?;
        let request = request
            .query(&[("type", report_type)])
            .header("accept", "text/event-stream");
        let response = self.send(&path, request).await?;
        let mut stream = response.bytes_stream();
        let mut parser = SseParser::default();
        let mut report = Report::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| Error::Request(path.clone(), error))?;
            for event in parser.feed(&chunk) {
                if report.apply(event)? == ReportProgress::Done {
                    return Ok(report.into_content());
                }
            }
        }
        Err(Error::ReportStream(format!(
            "stream closed before end after {} bytes",
            report.content().len()
        )))
    }

    pub async fn alerts(&self) -> Result<Vec<Alert>> {
        self.get(&["api", "alerts"]).await
    }

    /// Returns the alert as updated by the backend.
    pub async fn update_alert_status(&self, id: u64, status: &str) -> Result<Alert> {
        let id = id.to_string();
        let (path, request) = self.request(Method::PATCH, &["api", "alerts", &id, "status"]).await?;
        self.fetch(path, request.json(&StatusUpdate { status })).await
    }

    pub async fn reports(&self) -> Result<Vec<StoredReport>> {
        self.get(&["api", "reports"]).await
    }

    pub async fn delete_report(&self, id: u64) -> Result<()> {
        let id = id.to_string();
        let (path, request) = self.request(Method::DELETE, &["api", "reports", &id]).await?;
        self.send(&path, request).await.map(|_| ())
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Transfer>> {
        let (path, request) = self.request(Method::POST, &["api", "search"]).await?;
        let body = SearchQuery { query: query.to_string() };
        self.fetch(path, request.json(&body)).await
    }

    pub async fn databases(&self) -> Result<Vec<Database>> {
        self.get(&["api", "databases"]).await
    }

    pub async fn database(&self, id: u64) -> Result<Database> {
        self.get(&["api", "databases", &id.to_string()]).await
    }

    pub async fn delete_database(&self, id: u64) -> Result<()> {
        let id = id.to_string();
        let (path, request) = self.request(Method::DELETE, &["api", "databases", &id]).await?;
        self.send(&path, request).await.map(|_| ())
    }

    pub async fn update_database_status(&self, id: u64, status: DatabaseStatus) -> Result<Database> {
        let id = id.to_string();
        let (path, request) = self.request(Method::PATCH, &["api", "databases", &id, "status"]).await?;
        self.fetch(path, request.json(&StatusUpdate { status })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use warp::http::StatusCode as WarpStatus;
    use warp::Filter;

    async fn serve() -> SocketAddr {
        let analysis = warp::path!("api" / "network-analysis").map(|| {
            warp::reply::json(&serde_json::json!({
                "hashRateData": {"data": [{"timestamp": 1, "value": 2.5}]},
                "topCoinsData": [{"symbol": "ETH", "data": []}],
            }))
        });
        let predict = warp::path!("api" / "transactions" / String / "predict")
            .and(warp::header::optional::<String>("authorization"))
            .map(|_address: String, authorization: Option<String>| {
                if authorization.as_deref() == Some("Bearer secret") {
                    warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({"Prediction": 1, "Fraud_Probability": 0.75})),
                        WarpStatus::OK,
                    )
                } else {
                    warp::reply::with_status(warp::reply::json(&"denied"), WarpStatus::UNAUTHORIZED)
                }
            });
        let analyse = warp::path!("api" / "transactions" / String / "analyse")
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .map(|alert_id: String, query: std::collections::HashMap<String, String>| {
                let body = if alert_id == "broken" {
                    "data: {\"message\":\"partial\"}\n\nevent: error\ndata: model offline\n\n".to_string()
                } else {
                    format!(
                        "data: {{\"message\":\"{} report \"}}\n\ndata: {{\"message\":\"for {}\"}}\n\nevent: end\ndata: {{}}\n\n",
                        query.get("type").cloned().unwrap_or_default(),
                        alert_id
                    )
                };
                warp::reply::with_header(body, "content-type", "text/event-stream")
            });
        let (address, server) = warp::serve(analysis.or(predict).or(analyse))
            .bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        address
    }

    #[tokio::test]
    async fn fetch_network_analysis() {
        let address = serve().await;
        let client = BackendClient::new(&format!("http://{}/", address), Credentials::default()).unwrap();
        let analysis = client.network_analysis().await.unwrap();
        assert_eq!(analysis.hash_rate_data.data[0].value, 2.5);
        assert_eq!(analysis.top_coins_data[0].symbol, "ETH");
    }

    #[tokio::test]
    async fn unauthorized_clears_credentials() {
        let address = serve().await;
        let credentials = Credentials::new(Some("secret".to_string()));
        let client = BackendClient::new(&format!("http://{}", address), credentials.clone()).unwrap();

        let prediction = client.predict_fraud("0xA").await.unwrap();
        assert_eq!(prediction.prediction, 1);

        credentials.set("stale".to_string()).await;
        assert!(matches!(client.predict_fraud("0xA").await, Err(Error::Unauthorized)));
        assert_eq!(credentials.token().await, None);
    }

    #[tokio::test]
    async fn streamed_report() {
        let address = serve().await;
        let client = BackendClient::new(&format!("http://{}", address), Credentials::default()).unwrap();
        let report = client.generate_report("42", "summary").await.unwrap();
        assert_eq!(report, "summary report for 42");
        match client.generate_report("broken", "summary").await {
            Err(Error::ReportStream(reason)) => assert_eq!(reason, "model offline"),
            _ => panic!("error event test failed"),
        }
    }

    #[tokio::test]
    async fn unexpected_status() {
        let address = serve().await;
        let client = BackendClient::new(&format!("http://{}", address), Credentials::default()).unwrap();
        let (path, request) = client.request(Method::GET, &["api", "missing"]).await.unwrap();
        assert_eq!(path, "/api/missing");
        assert!(matches!(
            client.send(&path, request).await,
            Err(Error::UnexpectedStatus(_, 404))
        ));
    }

    #[test]
    fn path_segments_are_encoded() {
        let client = BackendClient::new("http://localhost:3000/backend/", Credentials::default()).unwrap();
        let url = client.endpoint(&["api", "transactions", "0x/A?b#c", "predict"]).unwrap();
        assert_eq!(url.path(), "/backend/api/transactions/0x%2FA%3Fb%23c/predict");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(matches!(
            BackendClient::new("mailto:someone", Credentials::default()),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn odd_address_reaches_prediction() {
        let address = serve().await;
        let credentials = Credentials::new(Some("secret".to_string()));
        let client = BackendClient::new(&format!("http://{}", address), credentials).unwrap();
        let prediction = client.predict_fraud("0x/A?b#c").await.unwrap();
        assert_eq!(prediction.fraud_probability, 0.75);
    }

    fn alert(id: u64, status: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id, "type": "High", "description": "mixer", "amount": 1.5,
            "currency": "ETH", "timestamp": "2024-05-01", "status": status, "hash": "0xabc",
        })
    }

    fn database(id: u64, status: &str) -> serde_json::Value {
        serde_json::json!({
            "_id": id, "name": "sanctions", "records": 1, "lastUpdated": "2024-05-03",
            "status": status, "data": [{"remarks": "listed", "address": "0xA", "severity": "Low"}],
        })
    }

    async fn serve_records() -> SocketAddr {
        let alerts = warp::get()
            .and(warp::path!("api" / "alerts"))
            .map(|| warp::reply::json(&Vec::from([alert(1, "open"), alert(2, "open")])));
        let alert_status = warp::patch()
            .and(warp::path!("api" / "alerts" / u64 / "status"))
            .and(warp::body::json())
            .map(|id: u64, update: StatusUpdate<String>| warp::reply::json(&alert(id, &update.status)));
        let reports = warp::get()
            .and(warp::path!("api" / "reports"))
            .map(|| {
                warp::reply::json(&serde_json::json!([{
                    "_id": 5, "title": "Weekly", "type": "summary",
                    "createdDate": "2024-05-02", "status": "Completed", "content": "all quiet",
                }]))
            });
        let delete_report = warp::delete()
            .and(warp::path!("api" / "reports" / u64))
            .map(|id: u64| {
                let status = if id == 5 { WarpStatus::OK } else { WarpStatus::NOT_FOUND };
                warp::reply::with_status(warp::reply(), status)
            });
        let search = warp::post()
            .and(warp::path!("api" / "search"))
            .and(warp::body::json())
            .map(|query: SearchQuery| {
                warp::reply::json(&serde_json::json!([{
                    "blockNum": "0x10", "uniqueId": "u1", "hash": "0x1", "from": query.query,
                    "to": "0xB", "value": "1.0", "erc721TokenId": null, "erc1155Metadata": null,
                    "tokenId": null, "asset": "ETH", "category": "external",
                }]))
            });
        let databases = warp::get()
            .and(warp::path!("api" / "databases"))
            .map(|| warp::reply::json(&Vec::from([database(9, "Active")])));
        let view_database = warp::get()
            .and(warp::path!("api" / "databases" / u64))
            .map(|id: u64| warp::reply::json(&database(id, "Active")));
        let delete_database = warp::delete()
            .and(warp::path!("api" / "databases" / u64))
            .map(|_id: u64| warp::reply());
        let database_status = warp::patch()
            .and(warp::path!("api" / "databases" / u64 / "status"))
            .and(warp::body::json())
            .map(|id: u64, update: StatusUpdate<DatabaseStatus>| {
                let status = if update.status == DatabaseStatus::Active { "Active" } else { "Inactive" };
                warp::reply::json(&database(id, status))
            });
        let routes = alerts
            .or(alert_status)
            .or(reports)
            .or(delete_report)
            .or(search)
            .or(databases)
            .or(view_database)
            .or(delete_database)
            .or(database_status);
        let (address, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        address
    }

    #[tokio::test]
    async fn alerts_and_reports() {
        let address = serve_records().await;
        let client = BackendClient::new(&format!("http://{}", address), Credentials::default()).unwrap();

        let alerts = client.alerts().await.unwrap();
        assert_eq!(alerts.len(), 2);
        let updated = client.update_alert_status(2, "resolved").await.unwrap();
        assert_eq!(updated.id, 2);
        assert_eq!(updated.status, "resolved");

        let reports = client.reports().await.unwrap();
        assert_eq!(reports[0].content, "all quiet");
        client.delete_report(5).await.unwrap();
        assert!(matches!(client.delete_report(6).await, Err(Error::UnexpectedStatus(_, 404))));
    }

    #[tokio::test]
    async fn search_and_databases() {
        let address = serve_records().await;
        let client = BackendClient::new(&format!("http://{}", address), Credentials::default()).unwrap();

        let transfers = client.search("0xfeed").await.unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].sender, "0xfeed");

        assert_eq!(client.databases().await.unwrap()[0].id, 9);
        let viewed = client.database(4).await.unwrap();
        assert_eq!(viewed.id, 4);
        assert_eq!(viewed.data[0].address, "0xA");
        client.delete_database(4).await.unwrap();
        let updated = client.update_database_status(4, DatabaseStatus::Inactive).await.unwrap();
        assert_eq!(updated.status, DatabaseStatus::Inactive);
    }
}
