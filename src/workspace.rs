use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{ObjectInfo, ProvenanceAction, WorkspaceInfo};
use crate::error::SetApiError;
use crate::selector::{ObjectSelector, WorkspaceIdentity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSaveData {
    #[serde(rename = "type")]
    pub type_string: String,
    pub name: String,
    pub data: Value,
    pub provenance: Vec<ProvenanceAction>,
    pub hidden: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveObjectsParams {
    #[serde(flatten)]
    pub workspace: WorkspaceIdentity,
    pub objects: Vec<ObjectSaveData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetObjects2Params {
    pub objects: Vec<ObjectSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    #[serde(default)]
    pub data: Value,
    pub info: ObjectInfo,
    #[serde(default)]
    pub refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetObjects2Result {
    pub data: Vec<ObjectData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetObjectInfo3Params {
    pub objects: Vec<ObjectSelector>,
    #[serde(
        rename = "includeMetadata",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub include_metadata: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetObjectInfo3Result {
    pub infos: Vec<ObjectInfo>,
    #[serde(default)]
    pub paths: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListObjectsParams {
    pub ids: Vec<u64>,
    #[serde(rename = "type")]
    pub type_string: String,
    #[serde(rename = "includeMetadata")]
    pub include_metadata: u8,
    #[serde(rename = "minObjectID")]
    pub min_object_id: u64,
    #[serde(rename = "maxObjectID")]
    pub max_object_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListWorkspaceInfoParams {
    pub perm: String,
    #[serde(rename = "excludeGlobal", default, skip_serializing_if = "Option::is_none")]
    pub exclude_global: Option<u8>,
}

pub trait WorkspaceClient: Send + Sync {
    fn save_objects(&self, params: &SaveObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError>;
    fn get_objects2(&self, params: &GetObjects2Params) -> Result<GetObjects2Result, SetApiError>;
    fn get_object_info3(
        &self,
        params: &GetObjectInfo3Params,
    ) -> Result<GetObjectInfo3Result, SetApiError>;
    fn get_workspace_info(
        &self,
        workspace: &WorkspaceIdentity,
    ) -> Result<WorkspaceInfo, SetApiError>;
    fn list_workspace_info(
        &self,
        params: &ListWorkspaceInfoParams,
    ) -> Result<Vec<WorkspaceInfo>, SetApiError>;
    fn list_objects(&self, params: &ListObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError>;
}

impl<W: WorkspaceClient + ?Sized> WorkspaceClient for &W {
    fn save_objects(&self, params: &SaveObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        (**self).save_objects(params)
    }

    fn get_objects2(&self, params: &GetObjects2Params) -> Result<GetObjects2Result, SetApiError> {
        (**self).get_objects2(params)
    }

    fn get_object_info3(
        &self,
        params: &GetObjectInfo3Params,
    ) -> Result<GetObjectInfo3Result, SetApiError> {
        (**self).get_object_info3(params)
    }

    fn get_workspace_info(
        &self,
        workspace: &WorkspaceIdentity,
    ) -> Result<WorkspaceInfo, SetApiError> {
        (**self).get_workspace_info(workspace)
    }

    fn list_workspace_info(
        &self,
        params: &ListWorkspaceInfoParams,
    ) -> Result<Vec<WorkspaceInfo>, SetApiError> {
        (**self).list_workspace_info(params)
    }

    fn list_objects(&self, params: &ListObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        (**self).list_objects(params)
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<RpcError>,
}

pub(crate) fn build_http_client(
    token: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Client, String> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!("setapi/{}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| err.to_string())?,
    );
    if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
        let mut value = HeaderValue::from_str(token).map_err(|err| err.to_string())?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    let mut builder = Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|err| err.to_string())
}

#[derive(Clone)]
pub struct WorkspaceHttpClient {
    client: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl WorkspaceHttpClient {
    pub fn new(
        url: impl Into<String>,
        token: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, SetApiError> {
        let client = build_http_client(token, timeout).map_err(SetApiError::WorkspaceHttp)?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn call<P, R>(&self, method: &str, params: &P) -> Result<R, SetApiError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "version": "1.1",
            "method": format!("Workspace.{method}"),
            "params": [params],
            "id": id.to_string(),
        });
        debug!(method, id, "workspace call");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|err| SetApiError::WorkspaceHttp(err.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| SetApiError::WorkspaceHttp(err.to_string()))?;

        let parsed: Option<RpcResponse> = serde_json::from_str(&text).ok();
        if let Some(RpcResponse {
            error: Some(error), ..
        }) = &parsed
        {
            return Err(SetApiError::WorkspaceRpc {
                name: error.name.clone(),
                message: error.message.clone(),
            });
        }
        if !status.is_success() {
            return Err(SetApiError::WorkspaceStatus {
                status: status.as_u16(),
                message: text,
            });
        }

        let first = parsed
            .and_then(|response| response.result)
            .and_then(|result| result.into_iter().next())
            .ok_or_else(|| {
                SetApiError::MalformedResponse(format!("{method} returned no result"))
            })?;
        serde_json::from_value(first)
            .map_err(|err| SetApiError::MalformedResponse(format!("{method}: {err}")))
    }
}

impl WorkspaceClient for WorkspaceHttpClient {
    fn save_objects(&self, params: &SaveObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        self.call("save_objects", params)
    }

    fn get_objects2(&self, params: &GetObjects2Params) -> Result<GetObjects2Result, SetApiError> {
        self.call("get_objects2", params)
    }

    fn get_object_info3(
        &self,
        params: &GetObjectInfo3Params,
    ) -> Result<GetObjectInfo3Result, SetApiError> {
        self.call("get_object_info3", params)
    }

    fn get_workspace_info(
        &self,
        workspace: &WorkspaceIdentity,
    ) -> Result<WorkspaceInfo, SetApiError> {
        self.call("get_workspace_info", workspace)
    }

    fn list_workspace_info(
        &self,
        params: &ListWorkspaceInfoParams,
    ) -> Result<Vec<WorkspaceInfo>, SetApiError> {
        self.call("list_workspace_info", params)
    }

    fn list_objects(&self, params: &ListObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        self.call("list_objects", params)
    }
}

pub fn save_object<W: WorkspaceClient + ?Sized>(
    ws: &W,
    workspace: WorkspaceIdentity,
    object: ObjectSaveData,
) -> Result<ObjectInfo, SetApiError> {
    let name = object.name.clone();
    let params = SaveObjectsParams {
        workspace,
        objects: vec![object],
    };
    ws.save_objects(&params)?
        .into_iter()
        .next()
        .ok_or_else(|| SetApiError::MalformedResponse(format!("no info returned for {name}")))
}

pub fn get_object<W: WorkspaceClient + ?Sized>(
    ws: &W,
    selector: &ObjectSelector,
) -> Result<ObjectData, SetApiError> {
    let params = GetObjects2Params {
        objects: vec![selector.clone()],
        no_data: None,
    };
    ws.get_objects2(&params)?
        .data
        .into_iter()
        .next()
        .ok_or_else(|| {
            SetApiError::MalformedResponse(format!("no data returned for {}", selector.reference))
        })
}

pub fn get_infos<W: WorkspaceClient + ?Sized>(
    ws: &W,
    selectors: Vec<ObjectSelector>,
    include_metadata: bool,
) -> Result<Vec<ObjectInfo>, SetApiError> {
    if selectors.is_empty() {
        return Ok(Vec::new());
    }
    let expected = selectors.len();
    let params = GetObjectInfo3Params {
        objects: selectors,
        include_metadata: include_metadata.then_some(1),
    };
    let infos = ws.get_object_info3(&params)?.infos;
    if infos.len() != expected {
        return Err(SetApiError::MalformedResponse(format!(
            "expected {expected} object infos, got {}",
            infos.len()
        )));
    }
    Ok(infos)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn save_params_flatten_workspace_identity() {
        let params = SaveObjectsParams {
            workspace: WorkspaceIdentity::Id { id: 5 },
            objects: vec![ObjectSaveData {
                type_string: "KBaseSets.ReadsSet".to_string(),
                name: "set".to_string(),
                data: json!({"items": []}),
                provenance: vec![],
                hidden: 0,
            }],
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["id"], json!(5));
        assert_eq!(value["objects"][0]["type"], json!("KBaseSets.ReadsSet"));
        assert_eq!(value["objects"][0]["hidden"], json!(0));
    }

    #[test]
    fn info_params_use_camel_case_flag() {
        let params = GetObjectInfo3Params {
            objects: vec![ObjectSelector::new("1/2/3")],
            include_metadata: Some(1),
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"objects": [{"ref": "1/2/3"}], "includeMetadata": 1})
        );
    }

    #[test]
    fn client_accepts_token_and_timeout() {
        let client = WorkspaceHttpClient::new(
            "https://kbase.us/services/ws",
            Some("TOKEN"),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.url(), "https://kbase.us/services/ws");
    }
}
