//! Project metadata extraction
//!
//! A [`MetadataExtractor`] turns a portal project URL into a structured
//! [`ProjectMetadata`] record. The shipped [`ApiMetadataExtractor`] reads the
//! portal's project-info JSON endpoint rather than rendering the page.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::transport::TransportClient;
use crate::utils::extract_upstream_id;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Path prefix of the project-info endpoint; the upstream id is appended
pub const PROJECT_INFO_PATH: &str = "/api/baseQuery/conclusionProjectInfo";

/// Structured project record produced by a [`MetadataExtractor`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProjectMetadata {
    /// 32-hex portal identifier
    pub nsfc_id: Option<String>,
    /// Project title
    pub title: Option<String>,
    /// Approval number (项目批准号)
    pub approval_number: Option<String>,
    /// Application code (申请代码)
    pub application_code: Option<String>,
    /// Principal investigator
    pub leader: Option<String>,
    /// Host institution
    pub unit: Option<String>,
    /// Start of the research period (YYYY-MM-DD)
    pub start_date: Option<String>,
    /// End of the research period (YYYY-MM-DD)
    pub end_date: Option<String>,
    /// Funding in units of 10k CNY
    pub funding: Option<f64>,
    /// Project abstract
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Closing-report abstract
    pub conclusion_abstract: Option<String>,
    /// Source page URL
    pub url: String,
}

/// Turns a project page URL into metadata
#[async_trait::async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract metadata for the project behind `url`
    async fn extract(&self, url: &str) -> Result<ProjectMetadata>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectInfo {
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default, alias = "ratifyNo", alias = "approvalNo")]
    approval_number: Option<String>,
    #[serde(default, alias = "code", alias = "subjectCode")]
    application_code: Option<String>,
    #[serde(default, alias = "projectAdmin", alias = "leaderName")]
    leader: Option<String>,
    #[serde(default, alias = "dependUnit", alias = "organization")]
    unit: Option<String>,
    #[serde(default, alias = "researchTimeScope")]
    research_period: Option<String>,
    #[serde(default, alias = "approvalMoney", alias = "supportNum")]
    funding: Option<serde_json::Value>,
    #[serde(default, alias = "projectAbstractC", alias = "abstractC")]
    project_abstract: Option<String>,
    #[serde(default, alias = "conclusionAbstractC")]
    conclusion_abstract: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfoResponse {
    #[serde(default)]
    data: Option<ProjectInfo>,
}

/// Metadata extractor backed by the portal's project-info API
pub struct ApiMetadataExtractor {
    transport: TransportConfig,
}

impl ApiMetadataExtractor {
    /// Extractor talking to `transport.origin`
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }

    fn check_host(&self, url: &str) -> Result<()> {
        let wanted = url::Url::parse(&self.transport.origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        let got = url::Url::parse(url)
            .map_err(|e| Error::Validation(format!("invalid URL: {}", e)))?
            .host_str()
            .map(str::to_string);
        if got.is_none() || got != wanted {
            return Err(Error::Validation(format!(
                "URL must point at {}",
                wanted.unwrap_or_else(|| self.transport.origin.clone())
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetadataExtractor for ApiMetadataExtractor {
    async fn extract(&self, url: &str) -> Result<ProjectMetadata> {
        self.check_host(url)?;
        let nsfc_id = extract_upstream_id(url).ok_or_else(|| {
            Error::Validation("URL does not carry a 32-character project id".to_string())
        })?;

        let client = TransportClient::new(&self.transport)?;
        client.init_session().await;
        let info = fetch_project_info(&client, &nsfc_id).await?;

        let (start_date, end_date) = info
            .research_period
            .as_deref()
            .map(split_period)
            .unwrap_or_default();

        Ok(ProjectMetadata {
            nsfc_id: Some(nsfc_id),
            title: non_empty(info.project_name),
            approval_number: non_empty(info.approval_number),
            application_code: non_empty(info.application_code),
            leader: non_empty(info.leader),
            unit: non_empty(info.unit),
            start_date,
            end_date,
            funding: info.funding.as_ref().and_then(parse_funding),
            abstract_text: non_empty(info.project_abstract),
            conclusion_abstract: non_empty(info.conclusion_abstract),
            url: url.to_string(),
        })
    }
}

async fn fetch_project_info(client: &TransportClient, nsfc_id: &str) -> Result<ProjectInfo> {
    let url = client.url(&format!("{}/{}", PROJECT_INFO_PATH, nsfc_id));
    let timeout = client.config().request_timeout;
    let response = client.send(Method::POST, &url, None, timeout).await?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(Error::HttpStatus { status, url });
    }
    let body: ProjectInfoResponse = response.json().await?;
    body.data
        .ok_or_else(|| Error::Upstream(format!("project info for {} has no data", nsfc_id)))
}

/// Project title from the portal, if any
///
/// Used as the report display name when the catalog has no title.
pub async fn fetch_project_name(client: &TransportClient, nsfc_id: &str) -> Option<String> {
    match fetch_project_info(client, nsfc_id).await {
        Ok(info) => non_empty(info.project_name),
        Err(e) => {
            tracing::warn!(nsfc_id, error = %e, "project name lookup failed");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// "2015-01-01 至 2018-12-31" → (start, end)
fn split_period(period: &str) -> (Option<String>, Option<String>) {
    match period.split_once('至') {
        Some((start, end)) => (
            non_empty(Some(start.to_string())),
            non_empty(Some(end.to_string())),
        ),
        None => (None, None),
    }
}

fn parse_funding(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s
            .replace("（万元）", "")
            .replace("万元", "")
            .trim()
            .parse()
            .ok(),
        _ => None,
    }
}
