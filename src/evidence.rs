//! Literature retrieval.
//!
//! Evidence is best-effort enrichment: every failure in here degrades to an
//! empty evidence list and is never surfaced to the pipeline caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::EvidenceConfig;
use crate::error::EvidenceError;
use crate::{log_debug, log_warn};

/// Default NCBI E-utilities endpoint
pub const PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";

/// Restricts searches to systematic reviews and meta-analyses
pub const DEFAULT_EVIDENCE_FILTER: &str = "systematic[sb] OR meta-analysis[pt]";

/// A retrieved literature record reduced to identifier and title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// External identifier (a PMID for PubMed)
    pub id: String,
    /// Empty when the record could not be resolved
    pub title: String,
}

impl EvidenceItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// External literature service: one search call, one batched fetch call
#[async_trait]
pub trait LiteratureSource: Send + Sync {
    /// Identifiers matching `term`, in the service's relevance order
    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, EvidenceError>;

    /// Resolve all `ids` in a single request, preserving their order
    async fn fetch(&self, ids: &[String]) -> Result<Vec<EvidenceItem>, EvidenceError>;
}

/// Applies the query filter and the degradation policy around a source
#[derive(Clone)]
pub struct EvidenceRetriever {
    source: Arc<dyn LiteratureSource>,
    filter: Option<String>,
}

impl EvidenceRetriever {
    pub fn new(source: Arc<dyn LiteratureSource>) -> Self {
        Self {
            source,
            filter: None,
        }
    }

    /// Restrict searches with a filter clause, e.g. [`DEFAULT_EVIDENCE_FILTER`]
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = (!filter.trim().is_empty()).then_some(filter);
        self
    }

    /// Build the retriever described by the evidence configuration
    pub fn from_config(config: &EvidenceConfig) -> Result<Self, EvidenceError> {
        let client = PubMedClient::from_config(config)?;
        let retriever = Self::new(Arc::new(client));
        Ok(if config.filter_enabled {
            retriever.with_filter(config.filter.clone())
        } else {
            retriever
        })
    }

    /// Search term sent to the service
    pub fn build_term(&self, query: &str) -> String {
        let query = query.trim();
        match &self.filter {
            Some(filter) => format!("{query} AND ({filter})"),
            None => query.to_string(),
        }
    }

    /// Retrieve at most `max_results` items for `query`.
    ///
    /// Never fails: any service error yields an empty list.
    pub async fn retrieve(&self, query: &str, max_results: usize) -> Vec<EvidenceItem> {
        if max_results == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let term = self.build_term(query);
        log_debug!("Searching literature for: {}", term);

        let ids = match self.source.search(&term, max_results).await {
            Ok(ids) => ids,
            Err(e) => {
                log_warn!("Literature search failed, continuing without evidence: {}", e);
                return Vec::new();
            }
        };

        if ids.is_empty() {
            log_debug!("Literature search returned no records");
            return Vec::new();
        }

        let ids: Vec<String> = ids.into_iter().take(max_results).collect();
        match self.source.fetch(&ids).await {
            Ok(items) => {
                log_debug!("Retrieved {} literature records", items.len());
                items
            }
            Err(e) => {
                log_warn!("Literature fetch failed, continuing without evidence: {}", e);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    result: serde_json::Map<String, Value>,
}

/// PubMed client for the NCBI E-utilities `esearch` and `esummary` endpoints
#[derive(Debug, Clone)]
pub struct PubMedClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    tool: Option<String>,
    email: Option<String>,
}

impl PubMedClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EvidenceError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };

        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: Url::parse(&normalized)?,
            api_key: None,
            tool: None,
            email: None,
        })
    }

    pub fn from_config(config: &EvidenceConfig) -> Result<Self, EvidenceError> {
        let mut client = Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
        client.api_key = (!config.api_key.is_empty()).then(|| config.api_key.clone());
        client.tool.clone_from(&config.tool);
        client.email.clone_from(&config.email);
        Ok(client)
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("retmode", "json".to_string())];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        if let Some(tool) = &self.tool {
            params.push(("tool", tool.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, EvidenceError> {
        let url = self.base_url.join(endpoint)?;
        let body = self
            .http
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|e| EvidenceError::Parse(format!("{endpoint}: {e}")))
    }
}

#[async_trait]
impl LiteratureSource for PubMedClient {
    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>, EvidenceError> {
        let mut params = self.common_params();
        params.push(("term", term.to_string()));
        params.push(("retmax", max_results.to_string()));
        params.push(("sort", "relevance".to_string()));

        let envelope: SearchEnvelope = self.get_json("esearch.fcgi", &params).await?;
        Ok(envelope.esearchresult.idlist)
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<EvidenceItem>, EvidenceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = self.common_params();
        params.push(("id", ids.join(",")));

        let envelope: SummaryEnvelope = self.get_json("esummary.fcgi", &params).await?;
        Ok(ids
            .iter()
            .map(|id| {
                let title = envelope
                    .result
                    .get(id)
                    .and_then(|record| record.get("title"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .unwrap_or_default();
                if title.is_empty() {
                    log_debug!("No title resolved for record {}", id);
                }
                EvidenceItem::new(id.clone(), title)
            })
            .collect())
    }
}
