use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{ProvenanceAction, SaveSetResult, SetEnvelope, SetKind};
use crate::error::SetApiError;
use crate::navigator::{self, GetSetItemsParams, ListSetsParams, ListSetsResult};
use crate::sample_search::{self, NoSearch, SampleSearchClient, SamplesInfo, SamplesInfoParams};
use crate::sample_set::{self, CreateSampleSetParams};
use crate::set_interface::{self, GetSetParams, SaveSetParams, SetRequest};
use crate::workspace::WorkspaceClient;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    pub provenance: Vec<ProvenanceAction>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: String,
    pub message: String,
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

pub struct SetApi<W: WorkspaceClient, S: SampleSearchClient = NoSearch> {
    ws: W,
    search: S,
    git_commit_hash: Option<String>,
}

impl<W: WorkspaceClient> SetApi<W> {
    pub fn new(ws: W) -> Self {
        Self {
            ws,
            search: NoSearch,
            git_commit_hash: None,
        }
    }
}

impl<W: WorkspaceClient, S: SampleSearchClient> SetApi<W, S> {
    pub fn with_search<T: SampleSearchClient>(self, search: T) -> SetApi<W, T> {
        SetApi {
            ws: self.ws,
            search,
            git_commit_hash: self.git_commit_hash,
        }
    }

    pub fn with_commit_hash(mut self, hash: Option<String>) -> Self {
        self.git_commit_hash = hash;
        self
    }

    pub fn save_set(
        &self,
        ctx: &CallContext,
        kind: SetKind,
        params: SaveSetParams,
    ) -> Result<SaveSetResult, SetApiError> {
        set_interface::save_typed_set(&self.ws, kind, &ctx.provenance, params)
    }

    pub fn get_set(&self, kind: SetKind, params: GetSetParams) -> Result<SetEnvelope, SetApiError> {
        let request = SetRequest::try_from(params)?;
        set_interface::get_typed_set(&self.ws, kind, &request)
    }

    pub fn create_sample_set(
        &self,
        ctx: &CallContext,
        params: CreateSampleSetParams,
    ) -> Result<SaveSetResult, SetApiError> {
        sample_set::create_sample_set(&self.ws, &ctx.provenance, params)
    }

    pub fn sample_set_to_samples_info(
        &self,
        params: &SamplesInfoParams,
    ) -> Result<SamplesInfo, SetApiError> {
        sample_search::sample_set_to_samples_info(&self.search, params)
    }

    pub fn list_sets(&self, params: &ListSetsParams) -> Result<ListSetsResult, SetApiError> {
        navigator::list_sets(&self.ws, params)
    }

    pub fn get_set_items(&self, params: &GetSetItemsParams) -> Result<ListSetsResult, SetApiError> {
        navigator::get_set_items(&self.ws, params)
    }

    pub fn status(&self) -> Status {
        let git_commit_hash = self
            .git_commit_hash
            .clone()
            .or_else(|| option_env!("GIT_COMMIT_HASH").map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        Status {
            state: "OK".to_string(),
            message: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_url: env!("CARGO_PKG_REPOSITORY").to_string(),
            git_commit_hash,
        }
    }

    pub fn call(&self, ctx: &CallContext, method: &str, params: Value) -> Result<Value, SetApiError> {
        let name = method.strip_prefix("SetAPI.").unwrap_or(method);
        info!(method = name, user = ctx.user_id.as_deref().unwrap_or("-"), "call");

        let result = match name {
            "status" => to_json(&self.status())?,
            "create_sample_set" => to_json(&self.create_sample_set(ctx, from_params(params)?)?)?,
            "list_sets" => to_json(&self.list_sets(&from_params(params)?)?)?,
            "get_set_items" => to_json(&self.get_set_items(&from_params(params)?)?)?,
            "sample_set_to_samples_info" => {
                to_json(&self.sample_set_to_samples_info(&from_params(params)?)?)?
            }
            _ => match parse_set_method(name) {
                Some((SetMethod::Save, kind)) => {
                    to_json(&self.save_set(ctx, kind, from_params(params)?)?)?
                }
                Some((SetMethod::Get, kind)) => to_json(&self.get_set(kind, from_params(params)?)?)?,
                None => return Err(SetApiError::UnknownMethod(method.to_string())),
            },
        };
        Ok(Value::Array(vec![result]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMethod {
    Save,
    Get,
}

pub fn parse_set_method(name: &str) -> Option<(SetMethod, SetKind)> {
    let (method, rest) = if let Some(rest) = name.strip_prefix("save_") {
        (SetMethod::Save, rest)
    } else if let Some(rest) = name.strip_prefix("get_") {
        (SetMethod::Get, rest)
    } else {
        return None;
    };
    let kind = rest.strip_suffix("_set_v1")?.parse().ok()?;
    debug!(?method, %kind, "dispatch");
    Some((method, kind))
}

fn from_params<T: DeserializeOwned>(params: Value) -> Result<T, SetApiError> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|err| SetApiError::InvalidParameter(err.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, SetApiError> {
    serde_json::to_value(value).map_err(|err| SetApiError::MalformedResponse(err.to_string()))
}
