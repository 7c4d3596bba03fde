use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{ObjectInfo, SetKind, check_reference};
use crate::error::SetApiError;
use crate::selector::{ObjectSelector, WorkspaceIdentity, build_ws_obj_selector, item_ref_path};
use crate::set_interface::parse_flag;
use crate::workspace::{
    GetObjects2Params, ListObjectsParams, ListWorkspaceInfoParams, WorkspaceClient, get_infos,
};

pub const PAGE_SIZE: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListSetsParams {
    #[serde(default)]
    pub workspace: Option<Value>,
    #[serde(default)]
    pub workspaces: Option<Value>,
    #[serde(default)]
    pub include_set_item_info: Option<Value>,
    #[serde(default)]
    pub include_metadata: Option<Value>,
    #[serde(default)]
    pub include_set_item_ref_paths: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetReference {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, alias = "ref_path_to_set")]
    pub path_to_set: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GetSetItemsParams {
    #[serde(default)]
    pub set_refs: Option<Vec<SetReference>>,
    #[serde(default)]
    pub include_set_item_ref_paths: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItemInfo {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ObjectInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetInfo {
    #[serde(rename = "ref")]
    pub reference: String,
    pub info: ObjectInfo,
    pub items: Vec<SetItemInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSetsResult {
    pub sets: Vec<SetInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceScope {
    pub id: u64,
    pub max_object_id: u64,
}

/// Each workspace is walked in windows of [`PAGE_SIZE`] IDs from 1 up to
/// its highest object ID. The iterator is finite and stops for good after
/// the first error.
pub struct ObjectInfoPages<'a, W: WorkspaceClient + ?Sized> {
    ws: &'a W,
    type_string: String,
    include_metadata: bool,
    scopes: VecDeque<WorkspaceScope>,
    next_min: u64,
    buffer: std::vec::IntoIter<ObjectInfo>,
    finished: bool,
}

impl<'a, W: WorkspaceClient + ?Sized> ObjectInfoPages<'a, W> {
    pub fn new(
        ws: &'a W,
        scopes: &[WorkspaceScope],
        type_string: impl Into<String>,
        include_metadata: bool,
    ) -> Self {
        Self {
            ws,
            type_string: type_string.into(),
            include_metadata,
            scopes: scopes.iter().copied().collect(),
            next_min: 1,
            buffer: Vec::new().into_iter(),
            finished: false,
        }
    }
}

impl<W: WorkspaceClient + ?Sized> Iterator for ObjectInfoPages<'_, W> {
    type Item = Result<ObjectInfo, SetApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(info) = self.buffer.next() {
                return Some(Ok(info));
            }
            if self.finished {
                return None;
            }
            let Some(scope) = self.scopes.front().copied() else {
                self.finished = true;
                return None;
            };
            if self.next_min > scope.max_object_id {
                self.scopes.pop_front();
                self.next_min = 1;
                continue;
            }

            let min_object_id = self.next_min;
            let max_object_id = min_object_id + PAGE_SIZE - 1;
            self.next_min = max_object_id + 1;
            let params = ListObjectsParams {
                ids: vec![scope.id],
                type_string: self.type_string.clone(),
                include_metadata: u8::from(self.include_metadata),
                min_object_id,
                max_object_id,
            };
            match self.ws.list_objects(&params) {
                Ok(page) => {
                    debug!(
                        workspace = scope.id,
                        type_string = %self.type_string,
                        min_object_id,
                        count = page.len(),
                        "listed page"
                    );
                    self.buffer = page.into_iter();
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn workspace_names(params: &ListSetsParams) -> Result<Vec<String>, SetApiError> {
    let from_list = match &params.workspaces {
        Some(Value::Array(values)) => values.iter().filter_map(value_text).collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => value_text(other).into_iter().collect(),
    };
    if !from_list.is_empty() {
        return Ok(from_list);
    }
    params
        .workspace
        .as_ref()
        .and_then(value_text)
        .map(|name| vec![name])
        .ok_or(SetApiError::MissingWorkspaceList)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.trim().to_string()),
        other => Some(other.to_string()),
    }
}

pub fn resolve_workspaces<W: WorkspaceClient + ?Sized>(
    ws: &W,
    workspaces: &[String],
) -> Result<Vec<WorkspaceScope>, SetApiError> {
    if let [single] = workspaces {
        let info = ws.get_workspace_info(&WorkspaceIdentity::parse(single))?;
        return Ok(vec![WorkspaceScope {
            id: info.id,
            max_object_id: info.max_object_id,
        }]);
    }

    let mut ids = HashSet::new();
    let mut names = HashSet::new();
    for workspace in workspaces {
        match WorkspaceIdentity::parse(workspace) {
            WorkspaceIdentity::Id { id } => ids.insert(id),
            WorkspaceIdentity::Name { workspace } => names.insert(workspace),
        };
    }
    let listing = ws.list_workspace_info(&ListWorkspaceInfoParams {
        perm: "r".to_string(),
        exclude_global: None,
    })?;
    let scopes: Vec<WorkspaceScope> = listing
        .into_iter()
        .filter(|info| ids.contains(&info.id) || names.contains(&info.name))
        .map(|info| WorkspaceScope {
            id: info.id,
            max_object_id: info.max_object_id,
        })
        .collect();
    debug!(requested = workspaces.len(), matched = scopes.len(), "resolved workspaces");
    Ok(scopes)
}

/// `contained[i]` holds the references found inside `candidates[i]`. Only one
/// level is inspected, so a set nested two levels down can still appear.
pub fn top_level_sets(candidates: &[ObjectInfo], contained: &[Vec<String>]) -> Vec<usize> {
    let candidate_refs: HashSet<String> = candidates.iter().map(ObjectInfo::reference).collect();
    let mut nested = HashSet::new();
    for (index, refs) in contained.iter().enumerate() {
        let own = candidates[index].reference();
        for reference in refs {
            if *reference != own && candidate_refs.contains(reference) {
                nested.insert(reference.clone());
            }
        }
    }
    (0..candidates.len())
        .filter(|&index| !nested.contains(&candidates[index].reference()))
        .collect()
}

pub fn list_sets<W: WorkspaceClient + ?Sized>(
    ws: &W,
    params: &ListSetsParams,
) -> Result<ListSetsResult, SetApiError> {
    let workspaces = workspace_names(params)?;
    let include_item_info =
        parse_flag("include_set_item_info", params.include_set_item_info.as_ref())?;
    let include_metadata = parse_flag("include_metadata", params.include_metadata.as_ref())?;
    let include_ref_paths = parse_flag(
        "include_set_item_ref_paths",
        params.include_set_item_ref_paths.as_ref(),
    )?;

    let scopes = resolve_workspaces(ws, &workspaces)?;
    let mut candidates = Vec::new();
    for kind in SetKind::ALL {
        for info in ObjectInfoPages::new(ws, &scopes, kind.set_type(), include_metadata) {
            candidates.push(info?);
        }
    }
    if candidates.is_empty() {
        return Ok(ListSetsResult::default());
    }

    let fetched = ws.get_objects2(&GetObjects2Params {
        objects: candidates
            .iter()
            .map(|info| ObjectSelector::new(info.reference()))
            .collect(),
        no_data: Some(1),
    })?;
    let contained: Vec<Vec<String>> = fetched.data.into_iter().map(|object| object.refs).collect();
    if contained.len() != candidates.len() {
        return Err(SetApiError::MalformedResponse(format!(
            "expected {} objects, got {}",
            candidates.len(),
            contained.len()
        )));
    }

    let top = top_level_sets(&candidates, &contained);
    debug!(candidates = candidates.len(), top_level = top.len(), "filtered sets");

    let mut sets: Vec<SetInfo> = top
        .into_iter()
        .map(|index| {
            let info = candidates[index].clone();
            let reference = info.reference();
            let items = contained[index]
                .iter()
                .map(|item_ref| SetItemInfo {
                    reference: item_ref.clone(),
                    ref_path: None,
                    info: None,
                })
                .collect();
            SetInfo {
                reference,
                info,
                items,
            }
        })
        .collect();

    let selectors: Vec<ObjectSelector> = sets
        .iter()
        .map(|set| ObjectSelector::new(set.reference.clone()))
        .collect();
    attach_items(
        ws,
        &mut sets,
        &selectors,
        include_item_info,
        include_metadata,
        include_ref_paths,
    )?;
    Ok(ListSetsResult { sets })
}

pub fn get_set_items<W: WorkspaceClient + ?Sized>(
    ws: &W,
    params: &GetSetItemsParams,
) -> Result<ListSetsResult, SetApiError> {
    let set_refs = params
        .set_refs
        .as_ref()
        .ok_or_else(|| SetApiError::MissingParameter("set_refs".to_string()))?;
    let include_ref_paths = parse_flag(
        "include_set_item_ref_paths",
        params.include_set_item_ref_paths.as_ref(),
    )?;
    for set_ref in set_refs {
        if !check_reference(&set_ref.reference) {
            return Err(SetApiError::InvalidReference(set_ref.reference.clone()));
        }
        if let Some(bad) = set_ref
            .path_to_set
            .iter()
            .flatten()
            .find(|entry| !check_reference(entry))
        {
            return Err(SetApiError::InvalidRefPath(bad.clone()));
        }
    }
    if set_refs.is_empty() {
        return Ok(ListSetsResult::default());
    }

    let selectors: Vec<ObjectSelector> = set_refs
        .iter()
        .map(|set_ref| {
            build_ws_obj_selector(
                &set_ref.reference,
                set_ref.path_to_set.as_deref().unwrap_or_default(),
            )
        })
        .collect();
    let fetched = ws.get_objects2(&GetObjects2Params {
        objects: selectors.clone(),
        no_data: Some(1),
    })?;

    if fetched.data.len() != selectors.len() {
        return Err(SetApiError::MalformedResponse(format!(
            "expected {} objects, got {}",
            selectors.len(),
            fetched.data.len()
        )));
    }

    let mut requested: Vec<(ObjectSelector, SetInfo)> = selectors
        .into_iter()
        .zip(fetched.data)
        .map(|(selector, object)| {
            let items = object
                .refs
                .into_iter()
                .map(|item_ref| SetItemInfo {
                    reference: item_ref,
                    ref_path: None,
                    info: None,
                })
                .collect();
            let set = SetInfo {
                reference: object.info.reference(),
                info: object.info,
                items,
            };
            (selector, set)
        })
        .collect();
    requested.sort_by(|(_, a), (_, b)| a.reference.cmp(&b.reference));

    let (selectors, mut sets): (Vec<ObjectSelector>, Vec<SetInfo>) = requested.into_iter().unzip();
    attach_items(ws, &mut sets, &selectors, true, true, include_ref_paths)?;
    Ok(ListSetsResult { sets })
}

fn attach_items<W: WorkspaceClient + ?Sized>(
    ws: &W,
    sets: &mut [SetInfo],
    selectors: &[ObjectSelector],
    include_item_info: bool,
    include_metadata: bool,
    include_ref_paths: bool,
) -> Result<(), SetApiError> {
    if include_item_info {
        let lookups: Vec<ObjectSelector> = sets
            .iter()
            .zip(selectors)
            .flat_map(|(set, selector)| {
                set.items
                    .iter()
                    .map(|item| ObjectSelector::new(item_ref_path(selector, &item.reference)))
            })
            .collect();
        let mut infos = get_infos(ws, lookups, include_metadata)?.into_iter();
        for item in sets.iter_mut().flat_map(|set| set.items.iter_mut()) {
            item.info = infos.next();
        }
    }
    if include_ref_paths {
        for (set, selector) in sets.iter_mut().zip(selectors) {
            for item in &mut set.items {
                item.ref_path = Some(item_ref_path(selector, &item.reference));
            }
        }
    }
    Ok(())
}
