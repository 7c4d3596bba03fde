#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Value, json};

use setapi::domain::{ObjectInfo, ProvenanceAction, UserMeta, WorkspaceInfo};
use setapi::error::SetApiError;
use setapi::selector::WorkspaceIdentity;
use setapi::workspace::{
    GetObjectInfo3Params, GetObjectInfo3Result, GetObjects2Params, GetObjects2Result,
    ListObjectsParams, ListWorkspaceInfoParams, ObjectData, SaveObjectsParams, WorkspaceClient,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub info: ObjectInfo,
    pub data: Value,
    pub provenance: Vec<ProvenanceAction>,
}

#[derive(Default)]
struct State {
    workspaces: Vec<WorkspaceInfo>,
    objects: Vec<StoredObject>,
}

/// In-memory workspace that records how often each method is called.
#[derive(Default)]
pub struct MockWorkspace {
    state: Mutex<State>,
    calls: Mutex<BTreeMap<&'static str, usize>>,
    listed_ranges: Mutex<Vec<(u64, u64, u64)>>,
    short_fetch: Mutex<bool>,
}

pub const WS_NAME: &str = "test_ws";

impl MockWorkspace {
    /// One empty workspace `test_ws` with id 1.
    pub fn new() -> Self {
        let mock = Self::default();
        mock.add_workspace(WS_NAME);
        mock
    }

    pub fn add_workspace(&self, name: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = state.workspaces.len() as u64 + 1;
        state.workspaces.push(WorkspaceInfo {
            id,
            name: name.to_string(),
            owner: "tester".to_string(),
            modified: "2026-01-01T00:00:00+0000".to_string(),
            max_object_id: 0,
            user_permission: "a".to_string(),
            global_read: "n".to_string(),
            lock_status: "unlocked".to_string(),
            metadata: UserMeta::new(),
        });
        id
    }

    /// Pretends a workspace holds `count` more objects than it does.
    pub fn bump_max_object_id(&self, workspace_id: u64, count: u64) {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.workspaces.iter_mut().find(|ws| ws.id == workspace_id) {
            info.max_object_id += count;
        }
    }

    /// Stores an object directly and returns its `ws/obj/ver` reference.
    pub fn add_object(
        &self,
        workspace_id: u64,
        name: &str,
        type_string: &str,
        data: Value,
        meta: &[(&str, &str)],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let mut metadata: UserMeta = meta
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        metadata.extend(derived_metadata(&data));
        let info = state.insert(workspace_id, name, type_string, data, metadata, Vec::new());
        info.reference()
    }

    pub fn add_reads(&self, name: &str) -> String {
        self.add_object(
            1,
            name,
            "KBaseFile.PairedEndLibrary-2.1",
            json!({"lib1": {}}),
            &[],
        )
    }

    /// Makes every later `get_objects2` answer one object fewer than asked.
    pub fn drop_last_fetched(&self) {
        *self.short_fetch.lock().unwrap() = true;
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn listed_ranges(&self) -> Vec<(u64, u64, u64)> {
        self.listed_ranges.lock().unwrap().clone()
    }

    pub fn stored(&self, reference: &str) -> StoredObject {
        let state = self.state.lock().unwrap();
        state.resolve(reference).unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }
}

/// Metadata the real service extracts from `KBaseSets` payloads.
fn derived_metadata(data: &Value) -> UserMeta {
    let mut meta = UserMeta::new();
    if let Some(description) = data.get("description").and_then(Value::as_str) {
        meta.insert("description".to_string(), description.to_string());
    }
    if let Some(items) = data.get("items").and_then(Value::as_array) {
        meta.insert("item_count".to_string(), items.len().to_string());
    }
    meta
}

fn contained_refs(data: &Value) -> Vec<String> {
    let mut refs = Vec::new();
    if let Some(items) = data.get("items").and_then(Value::as_array) {
        refs.extend(
            items
                .iter()
                .filter_map(|item| item.get("ref").and_then(Value::as_str))
                .map(str::to_string),
        );
    }
    if let Some(samples) = data.get("sample_ids").and_then(Value::as_array) {
        refs.extend(samples.iter().filter_map(Value::as_str).map(str::to_string));
    }
    refs
}

fn not_found(reference: &str) -> SetApiError {
    SetApiError::WorkspaceRpc {
        name: "JSONRPCError".to_string(),
        message: format!("No object with reference {reference} exists"),
    }
}

impl State {
    fn workspace_index(&self, key: &str) -> Option<usize> {
        self.workspaces
            .iter()
            .position(|ws| ws.id.to_string() == key || ws.name == key)
    }

    fn insert(
        &mut self,
        workspace_id: u64,
        name: &str,
        type_string: &str,
        data: Value,
        metadata: UserMeta,
        provenance: Vec<ProvenanceAction>,
    ) -> ObjectInfo {
        let type_string = if type_string.contains('-') {
            type_string.to_string()
        } else {
            format!("{type_string}-1.0")
        };
        let ws_index = self
            .workspaces
            .iter()
            .position(|ws| ws.id == workspace_id)
            .expect("workspace exists");
        let workspace_name = self.workspaces[ws_index].name.clone();

        let existing = self
            .objects
            .iter()
            .position(|obj| obj.info.workspace_id == workspace_id && obj.info.name == name);
        let (object_id, version) = match existing {
            Some(index) => (
                self.objects[index].info.object_id,
                self.objects[index].info.version + 1,
            ),
            None => {
                self.workspaces[ws_index].max_object_id += 1;
                (self.workspaces[ws_index].max_object_id, 1)
            }
        };

        let info = ObjectInfo {
            object_id,
            name: name.to_string(),
            type_string,
            save_date: "2026-01-01T00:00:00+0000".to_string(),
            version,
            saved_by: "tester".to_string(),
            workspace_id,
            workspace_name,
            checksum: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            size: data.to_string().len() as u64,
            metadata: Some(metadata),
        };
        let stored = StoredObject {
            info: info.clone(),
            data,
            provenance,
        };
        match existing {
            Some(index) => self.objects[index] = stored,
            None => self.objects.push(stored),
        }
        info
    }

    /// Resolves `ws/obj[/ver]` by id or name; a `;` path resolves its last hop.
    fn resolve(&self, reference: &str) -> Result<&StoredObject, SetApiError> {
        let last = reference.rsplit(';').next().unwrap_or(reference);
        let parts: Vec<&str> = last.split('/').collect();
        let (ws_key, obj_key) = match parts.as_slice() {
            [ws, obj] | [ws, obj, _] => (*ws, *obj),
            _ => return Err(not_found(reference)),
        };
        let ws_index = self
            .workspace_index(ws_key)
            .ok_or_else(|| not_found(reference))?;
        let workspace_id = self.workspaces[ws_index].id;
        self.objects
            .iter()
            .find(|obj| {
                obj.info.workspace_id == workspace_id
                    && (obj.info.object_id.to_string() == obj_key || obj.info.name == obj_key)
            })
            .ok_or_else(|| not_found(reference))
    }
}

impl WorkspaceClient for MockWorkspace {
    fn save_objects(&self, params: &SaveObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        self.record("save_objects");
        let mut state = self.state.lock().unwrap();
        let key = match &params.workspace {
            WorkspaceIdentity::Id { id } => id.to_string(),
            WorkspaceIdentity::Name { workspace } => workspace.clone(),
        };
        let ws_index = state
            .workspace_index(&key)
            .ok_or_else(|| not_found(&key))?;
        let workspace_id = state.workspaces[ws_index].id;
        Ok(params
            .objects
            .iter()
            .map(|object| {
                state.insert(
                    workspace_id,
                    &object.name,
                    &object.type_string,
                    object.data.clone(),
                    derived_metadata(&object.data),
                    object.provenance.clone(),
                )
            })
            .collect())
    }

    fn get_objects2(&self, params: &GetObjects2Params) -> Result<GetObjects2Result, SetApiError> {
        self.record("get_objects2");
        let state = self.state.lock().unwrap();
        let no_data = params.no_data == Some(1);
        let mut data = params
            .objects
            .iter()
            .map(|selector| {
                let stored = state.resolve(&selector.reference)?;
                Ok(ObjectData {
                    data: if no_data {
                        Value::Null
                    } else {
                        stored.data.clone()
                    },
                    info: stored.info.clone(),
                    refs: contained_refs(&stored.data),
                })
            })
            .collect::<Result<Vec<_>, SetApiError>>()?;
        if *self.short_fetch.lock().unwrap() {
            data.pop();
        }
        Ok(GetObjects2Result { data })
    }

    fn get_object_info3(
        &self,
        params: &GetObjectInfo3Params,
    ) -> Result<GetObjectInfo3Result, SetApiError> {
        self.record("get_object_info3");
        let state = self.state.lock().unwrap();
        let with_meta = params.include_metadata == Some(1);
        let mut infos = Vec::new();
        let mut paths = Vec::new();
        for selector in &params.objects {
            let mut info = state.resolve(&selector.reference)?.info.clone();
            if !with_meta {
                info.metadata = None;
            }
            paths.push(vec![info.reference()]);
            infos.push(info);
        }
        Ok(GetObjectInfo3Result { infos, paths })
    }

    fn get_workspace_info(
        &self,
        workspace: &WorkspaceIdentity,
    ) -> Result<WorkspaceInfo, SetApiError> {
        self.record("get_workspace_info");
        let state = self.state.lock().unwrap();
        let key = match workspace {
            WorkspaceIdentity::Id { id } => id.to_string(),
            WorkspaceIdentity::Name { workspace } => workspace.clone(),
        };
        let index = state.workspace_index(&key).ok_or_else(|| not_found(&key))?;
        Ok(state.workspaces[index].clone())
    }

    fn list_workspace_info(
        &self,
        _params: &ListWorkspaceInfoParams,
    ) -> Result<Vec<WorkspaceInfo>, SetApiError> {
        self.record("list_workspace_info");
        Ok(self.state.lock().unwrap().workspaces.clone())
    }

    fn list_objects(&self, params: &ListObjectsParams) -> Result<Vec<ObjectInfo>, SetApiError> {
        self.record("list_objects");
        for id in &params.ids {
            self.listed_ranges.lock().unwrap().push((
                *id,
                params.min_object_id,
                params.max_object_id,
            ));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|obj| params.ids.contains(&obj.info.workspace_id))
            .filter(|obj| obj.info.type_name() == params.type_string)
            .filter(|obj| {
                (params.min_object_id..=params.max_object_id).contains(&obj.info.object_id)
            })
            .map(|obj| {
                let mut info = obj.info.clone();
                if params.include_metadata == 0 {
                    info.metadata = None;
                }
                info
            })
            .collect())
    }
}
