use std::collections::{BTreeSet, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{
    GENOME_SEARCH_SET, ObjectInfo, ProvenanceAction, SaveSetResult, SetData, SetEnvelope, SetKind,
    check_reference,
};
use crate::error::SetApiError;
use crate::legacy::LegacyShape;
use crate::selector::{
    ObjectSelector, WorkspaceIdentity, WorkspaceKeys, build_ws_obj_selector, convert_workspace_param,
    item_ref_path, populate_item_object_ref_paths,
};
use crate::workspace::{ObjectData, ObjectSaveData, WorkspaceClient, get_infos, get_object, save_object};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveSetParams {
    #[serde(flatten)]
    pub workspace: WorkspaceKeys,
    #[serde(default)]
    pub output_object_name: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub save_search_set: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GetSetParams {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub include_item_info: Option<Value>,
    #[serde(default)]
    pub include_set_item_ref_paths: Option<Value>,
    #[serde(default)]
    pub ref_path_to_set: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRequest {
    pub reference: String,
    pub ref_path_to_set: Vec<String>,
    pub include_item_info: bool,
    pub include_set_item_ref_paths: bool,
}

impl SetRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ref_path_to_set: Vec::new(),
            include_item_info: false,
            include_set_item_ref_paths: false,
        }
    }

    pub fn selector(&self) -> ObjectSelector {
        build_ws_obj_selector(&self.reference, &self.ref_path_to_set)
    }
}

impl TryFrom<GetSetParams> for SetRequest {
    type Error = SetApiError;

    fn try_from(params: GetSetParams) -> Result<Self, Self::Error> {
        let reference = params
            .reference
            .filter(|reference| !reference.is_empty())
            .ok_or_else(|| SetApiError::MissingParameter("ref".to_string()))?;
        if !check_reference(&reference) {
            return Err(SetApiError::InvalidReference(reference));
        }
        let ref_path_to_set = params.ref_path_to_set.unwrap_or_default();
        if let Some(bad) = ref_path_to_set.iter().find(|entry| !check_reference(entry)) {
            return Err(SetApiError::InvalidRefPath(bad.clone()));
        }
        Ok(Self {
            reference,
            ref_path_to_set,
            include_item_info: parse_flag("include_item_info", params.include_item_info.as_ref())?,
            include_set_item_ref_paths: parse_flag(
                "include_set_item_ref_paths",
                params.include_set_item_ref_paths.as_ref(),
            )?,
        })
    }
}

pub fn parse_flag(name: &str, value: Option<&Value>) -> Result<bool, SetApiError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::Number(number)) => match number.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(SetApiError::InvalidFlag(name.to_string())),
        },
        Some(_) => Err(SetApiError::InvalidFlag(name.to_string())),
    }
}

struct CheckedSave {
    workspace: WorkspaceIdentity,
    name: String,
    data: Value,
}

fn check_save_params(params: SaveSetParams) -> Result<CheckedSave, SetApiError> {
    let data = params
        .data
        .ok_or_else(|| SetApiError::MissingParameter("data".to_string()))?;
    let workspace =
        convert_workspace_param(&params.workspace).map_err(|_| SetApiError::MissingWorkspace)?;
    let name = params
        .output_object_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SetApiError::MissingParameter("output_object_name".to_string()))?;
    Ok(CheckedSave {
        workspace,
        name,
        data,
    })
}

pub fn save_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    set_type: &str,
    provenance: &[ProvenanceAction],
    params: SaveSetParams,
) -> Result<ObjectInfo, SetApiError> {
    let checked = check_save_params(params)?;
    write_set(ws, set_type, provenance, checked)
}

fn write_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    set_type: &str,
    provenance: &[ProvenanceAction],
    checked: CheckedSave,
) -> Result<ObjectInfo, SetApiError> {
    info!(set_type, name = %checked.name, "saving set");
    save_object(
        ws,
        checked.workspace,
        ObjectSaveData {
            type_string: set_type.to_string(),
            name: checked.name,
            data: checked.data,
            provenance: provenance.to_vec(),
            hidden: 0,
        },
    )
}

pub fn normalize_set_data(kind: SetKind, data: Value) -> Result<SetData, SetApiError> {
    if !data.get("items").is_some_and(Value::is_array) {
        return Err(SetApiError::ListRequired("items".to_string()));
    }
    let mut set: SetData = serde_json::from_value(data)
        .map_err(|err| SetApiError::InvalidParameter(format!("data: {err}")))?;
    let items = set.items.get_or_insert_with(Vec::new);

    if items.is_empty() && !kind.allows_empty() {
        return Err(SetApiError::NoItems {
            set_type: kind.set_type().to_string(),
            item_type: kind.item_type().to_string(),
        });
    }

    let mut seen = HashSet::new();
    for item in items.iter_mut() {
        if !seen.insert(item.reference.clone()) {
            return Err(SetApiError::DuplicateReferences(item.reference.clone()));
        }
        item.label.get_or_insert_with(String::new);
        item.info = None;
        item.ref_path = None;
    }
    Ok(set)
}

fn normalize_search_set(mut data: Value) -> Result<Value, SetApiError> {
    let Some(object) = data.as_object_mut() else {
        return Err(SetApiError::ListRequired("elements".to_string()));
    };
    if !object.get("elements").is_some_and(Value::is_object) {
        return Err(SetApiError::ListRequired("elements".to_string()));
    }
    object
        .entry("description")
        .or_insert_with(|| Value::String(String::new()));
    Ok(data)
}

pub fn check_same_genome<W: WorkspaceClient + ?Sized>(
    ws: &W,
    kind: SetKind,
    key: &str,
    set: &SetData,
) -> Result<(), SetApiError> {
    let selectors = set
        .items
        .iter()
        .flatten()
        .map(|item| ObjectSelector::new(item.reference.clone()))
        .collect();
    let infos = get_infos(ws, selectors, true)?;
    let genomes: BTreeSet<Option<&str>> = infos.iter().map(|info| info.metadata_value(key)).collect();
    debug!(set_type = kind.set_type(), distinct = genomes.len(), "genome check");

    match genomes.into_iter().collect::<Vec<_>>().as_slice() {
        [Some(_)] => Ok(()),
        _ => Err(SetApiError::MismatchedGenomes(kind.item_type().to_string())),
    }
}

pub fn save_typed_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    kind: SetKind,
    provenance: &[ProvenanceAction],
    params: SaveSetParams,
) -> Result<SaveSetResult, SetApiError> {
    let search_flag = params.save_search_set.clone();
    let mut checked = check_save_params(params)?;
    let search_set =
        kind == SetKind::Genome && parse_flag("save_search_set", search_flag.as_ref())?;

    let set_type = if search_set {
        checked.data = normalize_search_set(checked.data)?;
        GENOME_SEARCH_SET
    } else {
        let set = normalize_set_data(kind, checked.data)?;
        if let Some(key) = kind.genome_key() {
            check_same_genome(ws, kind, key, &set)?;
        }
        checked.data = serde_json::to_value(&set)
            .map_err(|err| SetApiError::InvalidParameter(format!("data: {err}")))?;
        kind.set_type()
    };

    write_set(ws, set_type, provenance, checked).map(SaveSetResult::from)
}

pub fn get_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    request: &SetRequest,
) -> Result<SetEnvelope, SetApiError> {
    let selector = request.selector();
    let object = get_object(ws, &selector)?;
    hydrate(ws, &selector, object, request)
}

pub fn get_typed_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    kind: SetKind,
    request: &SetRequest,
) -> Result<SetEnvelope, SetApiError> {
    let selector = request.selector();
    let object = get_object(ws, &selector)?;
    match LegacyShape::from_type(object.info.type_name()) {
        Some(shape) if shape.accepted_by(kind) => shape.translate(
            ws,
            &selector,
            object,
            request.include_item_info,
            request.include_set_item_ref_paths,
        ),
        _ => hydrate(ws, &selector, object, request),
    }
}

fn hydrate<W: WorkspaceClient + ?Sized>(
    ws: &W,
    selector: &ObjectSelector,
    object: ObjectData,
    request: &SetRequest,
) -> Result<SetEnvelope, SetApiError> {
    let ObjectData { data, info, .. } = object;
    let mut data: SetData = serde_json::from_value(data)
        .map_err(|err| SetApiError::MalformedResponse(format!("set data: {err}")))?;

    if let Some(items) = data.items.as_mut() {
        if request.include_item_info && !items.is_empty() {
            let selectors = items
                .iter()
                .map(|item| ObjectSelector::new(item_ref_path(selector, &item.reference)))
                .collect();
            let infos = get_infos(ws, selectors, true)?;
            for (item, item_info) in items.iter_mut().zip(infos) {
                item.info = Some(item_info);
            }
        }
        if request.include_set_item_ref_paths {
            populate_item_object_ref_paths(items, selector);
        }
    }

    Ok(SetEnvelope { data, info })
}
