use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::SetItem;
use crate::error::SetApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSelector {
    #[serde(rename = "ref")]
    pub reference: String,
}

impl ObjectSelector {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
        }
    }
}

/// A non-empty path wins outright and `reference` is dropped; callers that
/// reach a set through a path must append the set's own ref to the path.
pub fn build_ws_obj_selector(reference: &str, ref_path_to_set: &[String]) -> ObjectSelector {
    if ref_path_to_set.is_empty() {
        ObjectSelector::new(reference)
    } else {
        ObjectSelector::new(ref_path_to_set.join(";"))
    }
}

pub fn item_ref_path(selector: &ObjectSelector, item_ref: &str) -> String {
    format!("{};{}", selector.reference, item_ref)
}

pub fn populate_item_object_ref_paths(items: &mut [SetItem], selector: &ObjectSelector) {
    for item in items {
        item.ref_path = Some(item_ref_path(selector, &item.reference));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkspaceIdentity {
    Id { id: u64 },
    Name { workspace: String },
}

impl WorkspaceIdentity {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.parse::<u64>() {
            Ok(id) if trimmed.chars().all(|ch| ch.is_ascii_digit()) => Self::Id { id },
            _ => Self::Name {
                workspace: value.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_name: Option<Value>,
}

pub fn convert_workspace_param(keys: &WorkspaceKeys) -> Result<WorkspaceIdentity, SetApiError> {
    let id_keys = [&keys.workspace, &keys.workspace_id, &keys.ws_id];
    for value in id_keys.into_iter().flatten() {
        if let Some(identity) = identity_from_value(value) {
            return Ok(identity);
        }
    }
    let name_keys = [&keys.workspace_name, &keys.ws_name];
    for value in name_keys.into_iter().flatten() {
        if let Some(name) = value_text(value) {
            return Ok(WorkspaceIdentity::Name { workspace: name });
        }
    }
    Err(SetApiError::NoWorkspaceKey)
}

fn identity_from_value(value: &Value) -> Option<WorkspaceIdentity> {
    match value {
        Value::Number(number) => match number.as_u64() {
            Some(id) => Some(WorkspaceIdentity::Id { id }),
            None => Some(WorkspaceIdentity::Name {
                workspace: number.to_string(),
            }),
        },
        other => value_text(other).map(|text| WorkspaceIdentity::parse(&text)),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
