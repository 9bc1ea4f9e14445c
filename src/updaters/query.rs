use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use url::Url;

use super::UpdateChecker;
use crate::models::{UpdateInfo, UpdateQueryRequest, BUILD_TIMESTAMP_FORMAT};
use crate::utils::http_client::{create_http_client, get_with_one_redirect};
use crate::utils::{Logger, QueryError};

/// Asks the update endpoint whether a newer build exists.
pub struct HttpUpdateChecker {
    client: reqwest::Client,
    logger: Arc<dyn Logger>,
}

impl HttpUpdateChecker {
    pub fn new(client: reqwest::Client, logger: Arc<dyn Logger>) -> Self {
        Self { client, logger }
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Result<Self, QueryError> {
        let client = create_http_client().map_err(QueryError::Client)?;
        Ok(Self::new(client, logger))
    }

    async fn fetch_body(&self, request: &UpdateQueryRequest) -> Result<String, QueryError> {
        let mut url = Url::parse(&request.endpoint).map_err(|e| QueryError::InvalidUrl {
            url: request.endpoint.clone(),
            reason: e.to_string(),
        })?;
        let pairs = request.query_pairs();
        url.query_pairs_mut().extend_pairs(pairs.iter());

        let response = get_with_one_redirect(&self.client, &url, &pairs, self.logger.as_ref()).await?;
        response
            .text()
            .await
            .map_err(|e| QueryError::ConnectionFailed(format!("failed to read response body: {}", e)))
    }
}

#[async_trait]
impl UpdateChecker for HttpUpdateChecker {
    async fn check_for_update(&self, request: &UpdateQueryRequest) -> Result<UpdateInfo, QueryError> {
        self.logger.info("Checking for updates...");
        self.logger.info(&format!(
            "Search criteria: programName={};versionString={};buildState={}",
            request.program_name,
            request.version_string,
            request.build_channel.as_str()
        ));

        let result = match self.fetch_body(request).await {
            Ok(body) => parse_update_response(&body),
            Err(e) => Err(e),
        };

        match &result {
            Ok(info) if info.available => {
                self.logger.info(&format!("Update found! Version: {}", info.version_string));
            }
            Ok(_) => self.logger.info("No updates found."),
            Err(e) => self.logger.error(&format!("Failed to check for updates: {}", e)),
        }
        result
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "updateAvailable")]
    update_available: Option<serde_json::Value>,
    #[serde(rename = "versionString")]
    version_string: Option<String>,
    #[serde(rename = "buildState")]
    build_state: Option<String>,
    #[serde(rename = "buildTimestamp")]
    build_timestamp: Option<String>,
    #[serde(rename = "downloadURL")]
    download_url: Option<String>,
    #[serde(rename = "updateInfo")]
    update_info: Option<String>,
}

/// Decode the endpoint's JSON object. Only the exact string `"true"` in
/// `updateAvailable` means an update exists; then every other field is required.
pub fn parse_update_response(body: &str) -> Result<UpdateInfo, QueryError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| QueryError::MalformedResponse(e.to_string()))?;

    let available = matches!(
        response.update_available,
        Some(serde_json::Value::String(ref s)) if s == "true"
    );
    if !available {
        return Ok(UpdateInfo::not_available());
    }

    let field = |value: Option<String>, name: &str| {
        value.ok_or_else(|| QueryError::MalformedResponse(format!("missing field `{}`", name)))
    };

    let timestamp = field(response.build_timestamp, "buildTimestamp")?;
    let build_timestamp = NaiveDateTime::parse_from_str(&timestamp, BUILD_TIMESTAMP_FORMAT)
        .map_err(|e| {
            QueryError::MalformedResponse(format!("bad buildTimestamp {:?}: {}", timestamp, e))
        })?;

    Ok(UpdateInfo {
        available: true,
        version_string: field(response.version_string, "versionString")?,
        build_state: field(response.build_state, "buildState")?,
        build_timestamp: Some(build_timestamp),
        download_url: field(response.download_url, "downloadURL")?,
        description: field(response.update_info, "updateInfo")?,
    })
}
