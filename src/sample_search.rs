use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::SetApiError;
use crate::set_interface::parse_flag;
use crate::workspace::build_http_client;

pub const SAMPLE_INDEX: &str = "sample";
pub const DEFAULT_LIMIT: u64 = 10;

const NON_METADATA_FIELDS: [&str; 18] = [
    "node_id",
    "creator",
    "access_group",
    "obj_name",
    "shared_users",
    "timestamp",
    "creation_date",
    "is_public",
    "version",
    "obj_id",
    "copied",
    "tags",
    "obj_type_version",
    "obj_type_module",
    "obj_type_name",
    "sample_set_ids",
    "parent_id",
    "save_date",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortColumn(pub String, pub Value);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SamplesInfoParams {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub query: Option<Value>,
    #[serde(default)]
    pub sort_by: Option<Vec<SortColumn>>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchObjectsParams {
    pub query: Value,
    pub indexes: Vec<String>,
    pub from: u64,
    pub size: u64,
    pub sort: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub doc: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchObjectsResult {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub hits: Option<Vec<SearchHit>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplesInfo {
    pub num_found: u64,
    pub start: u64,
    pub samples: Vec<Map<String, Value>>,
}

pub trait SampleSearchClient: Send + Sync {
    fn search_objects(
        &self,
        params: &SearchObjectsParams,
    ) -> Result<SearchObjectsResult, SetApiError>;
}

impl<S: SampleSearchClient + ?Sized> SampleSearchClient for &S {
    fn search_objects(
        &self,
        params: &SearchObjectsParams,
    ) -> Result<SearchObjectsResult, SetApiError> {
        (**self).search_objects(params)
    }
}

impl<S: SampleSearchClient> SampleSearchClient for Option<S> {
    fn search_objects(
        &self,
        params: &SearchObjectsParams,
    ) -> Result<SearchObjectsResult, SetApiError> {
        match self {
            Some(search) => search.search_objects(params),
            None => Err(SetApiError::MissingSearchUrl),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

impl SampleSearchClient for NoSearch {
    fn search_objects(
        &self,
        _params: &SearchObjectsParams,
    ) -> Result<SearchObjectsResult, SetApiError> {
        Err(SetApiError::MissingSearchUrl)
    }
}

#[derive(Debug, Deserialize)]
struct SearchRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Clone)]
pub struct SearchHttpClient {
    client: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl SearchHttpClient {
    pub fn new(
        url: impl Into<String>,
        token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, SetApiError> {
        let client = build_http_client(token, timeout).map_err(SetApiError::SearchFailed)?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SampleSearchClient for SearchHttpClient {
    fn search_objects(
        &self,
        params: &SearchObjectsParams,
    ) -> Result<SearchObjectsResult, SetApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "method": "search_objects",
            "params": params,
            "jsonrpc": "2.0",
            "id": id.to_string(),
        });
        debug!(id, from = params.from, size = params.size, "search call");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| SetApiError::SearchFailed(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| SetApiError::SearchFailed(err.to_string()))?;
        if !status.is_success() {
            return Err(SetApiError::SearchFailed(format!(
                "status {}: {text}",
                status.as_u16()
            )));
        }

        let parsed: SearchRpcResponse = serde_json::from_str(&text)
            .map_err(|err| SetApiError::MalformedSearchResponse(err.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(SetApiError::SearchFailed(error.to_string()));
        }
        let result = parsed.result.ok_or_else(|| {
            SetApiError::MalformedSearchResponse("search_objects returned no result".to_string())
        })?;
        serde_json::from_value(result)
            .map_err(|err| SetApiError::MalformedSearchResponse(err.to_string()))
    }
}

pub fn sample_set_term(reference: &str) -> Result<String, SetApiError> {
    let parts: Vec<&str> = reference.split('/').collect();
    let numeric = parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()));
    if !numeric {
        return Err(SetApiError::InvalidReference(reference.to_string()));
    }
    Ok(format!("WSVER::{}:{}:{}", parts[0], parts[1], parts[2]))
}

fn query_text(query: &Value) -> Option<String> {
    match query {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub fn build_search_params(
    params: &SamplesInfoParams,
    term: String,
) -> Result<SearchObjectsParams, SetApiError> {
    let mut must = vec![json!({"term": {"sample_set_ids": term}})];
    if let Some(text) = params.query.as_ref().and_then(query_text) {
        must.push(json!({"match": {"all_sample_metadata_field": text}}));
    }

    let sort = match params.sort_by.as_deref() {
        Some(columns) if !columns.is_empty() => columns
            .iter()
            .map(|SortColumn(column, ascending)| -> Result<Value, SetApiError> {
                let order = if parse_flag("sort_by", Some(ascending))? {
                    "asc"
                } else {
                    "desc"
                };
                let mut entry = Map::new();
                entry.insert(column.clone(), json!({"order": order}));
                Ok(Value::Object(entry))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => vec![json!({"name": {"order": "asc"}})],
    };

    Ok(SearchObjectsParams {
        query: json!({"bool": {"must": must}}),
        indexes: vec![SAMPLE_INDEX.to_string()],
        from: params.start.unwrap_or(0),
        size: params.limit.unwrap_or(DEFAULT_LIMIT),
        sort,
    })
}

/// Drops index bookkeeping fields and adds `kbase_sample_id` parsed from a
/// hit id of the form `<namespace>::<sample id>:<version>`.
fn sample_metadata(
    mut doc: Map<String, Value>,
    hit_id: &str,
) -> Result<Map<String, Value>, SetApiError> {
    let sample_id = hit_id
        .split_once("::")
        .and_then(|(_, rest)| rest.split(':').next())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            SetApiError::MalformedSearchResponse(format!("unexpected sample hit id {hit_id}"))
        })?;
    for field in NON_METADATA_FIELDS {
        doc.remove(field);
    }
    doc.insert(
        "kbase_sample_id".to_string(),
        Value::String(sample_id.to_string()),
    );
    Ok(doc)
}

pub fn sample_set_to_samples_info<S: SampleSearchClient + ?Sized>(
    search: &S,
    params: &SamplesInfoParams,
) -> Result<SamplesInfo, SetApiError> {
    let reference = params
        .reference
        .as_deref()
        .filter(|reference| !reference.is_empty())
        .ok_or_else(|| SetApiError::MissingParameter("ref".to_string()))?;
    let request = build_search_params(params, sample_set_term(reference)?)?;

    let result = search.search_objects(&request)?;
    let hits = result.hits.ok_or_else(|| {
        SetApiError::MalformedSearchResponse(format!("no hits field for {reference}"))
    })?;
    debug!(reference, num_found = result.count, returned = hits.len(), "sample set samples");

    let samples = hits
        .into_iter()
        .map(|hit| sample_metadata(hit.doc, &hit.id))
        .collect::<Result<Vec<_>, SetApiError>>()?;
    Ok(SamplesInfo {
        num_found: result.count,
        start: request.from,
        samples,
    })
}
