use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::domain::{ProvenanceAction, RNASEQ_SAMPLE_SET, SaveSetResult};
use crate::error::SetApiError;
use crate::selector::{ObjectSelector, WorkspaceIdentity, WorkspaceKeys, convert_workspace_param};
use crate::workspace::{ObjectSaveData, WorkspaceClient, get_infos, save_object};

const PAIRED_END_TYPES: [&str; 2] = ["KBaseAssembly.PairedEndLibrary", "KBaseFile.PairedEndLibrary"];
const SINGLE_END_TYPES: [&str; 2] = ["KBaseAssembly.SingleEndLibrary", "KBaseFile.SingleEndLibrary"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleCondition {
    pub sample_id: Vec<String>,
    pub condition: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateSampleSetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampleset_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampleset_desc: Option<String>,
    #[serde(rename = "Library_type", default, skip_serializing_if = "Option::is_none")]
    pub library_type: Option<String>,
    #[serde(default)]
    pub sample_n_conditions: Vec<SampleCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditionset_ref: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn allowed_library_types(library_type: &str) -> &'static [&'static str] {
    if library_type == "PairedEnd" {
        &PAIRED_END_TYPES
    } else {
        &SINGLE_END_TYPES
    }
}

pub fn normalize_condition(condition: &Value) -> Result<String, SetApiError> {
    match condition {
        Value::String(text) => Ok(text.clone()),
        Value::Array(values) => match values.as_slice() {
            [Value::String(text)] => Ok(text.clone()),
            _ => Err(SetApiError::InvalidCondition(condition.to_string())),
        },
        other => Err(SetApiError::InvalidCondition(other.to_string())),
    }
}

pub fn flatten_conditions(
    groups: &mut [SampleCondition],
) -> Result<(Vec<String>, Vec<String>), SetApiError> {
    let mut sample_ids = Vec::new();
    let mut conditions = Vec::new();
    for group in groups.iter_mut() {
        let condition = normalize_condition(&group.condition)?;
        group.condition = Value::String(condition.clone());
        for sample in &group.sample_id {
            sample_ids.push(sample.clone());
            conditions.push(condition.clone());
        }
    }
    Ok((sample_ids, conditions))
}

fn sample_selector(workspace: &WorkspaceIdentity, sample: &str) -> ObjectSelector {
    if sample.contains('/') {
        return ObjectSelector::new(sample);
    }
    match workspace {
        WorkspaceIdentity::Id { id } => ObjectSelector::new(format!("{id}/{sample}")),
        WorkspaceIdentity::Name { workspace } => ObjectSelector::new(format!("{workspace}/{sample}")),
    }
}

pub fn create_sample_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    provenance: &[ProvenanceAction],
    mut params: CreateSampleSetParams,
) -> Result<SaveSetResult, SetApiError> {
    let keys = WorkspaceKeys {
        ws_id: params.ws_id.clone(),
        ..WorkspaceKeys::default()
    };
    let workspace = convert_workspace_param(&keys)
        .map_err(|_| SetApiError::MissingParameter("ws_id".to_string()))?;
    let name = params
        .sampleset_id
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| SetApiError::MissingParameter("sampleset_id".to_string()))?;
    let library_type = params
        .library_type
        .clone()
        .ok_or_else(|| SetApiError::MissingParameter("Library_type".to_string()))?;

    let (sample_ids, conditions) = flatten_conditions(&mut params.sample_n_conditions)?;
    if sample_ids.len() < 2 {
        return Err(SetApiError::TooFewSamples(sample_ids.len()));
    }

    let selectors = sample_ids
        .iter()
        .map(|sample| sample_selector(&workspace, sample))
        .collect();
    let infos = get_infos(ws, selectors, false)?;
    let allowed = allowed_library_types(&library_type);
    let mismatched = infos
        .iter()
        .find(|info| !allowed.iter().any(|allowed| *allowed == info.type_name()));
    if let Some(bad) = mismatched {
        debug!(object = %bad.reference(), type_string = %bad.type_string, "library type mismatch");
        return Err(SetApiError::LibraryTypeMismatch(library_type));
    }

    let input_refs = sample_ids
        .iter()
        .zip(&infos)
        .map(|(sample, info)| {
            if sample.contains('/') {
                sample.clone()
            } else {
                info.reference()
            }
        })
        .collect();
    let mut provenance = provenance.to_vec();
    if provenance.is_empty() {
        provenance.push(ProvenanceAction::default());
    }
    provenance[0].input_ws_objects = Some(input_refs);

    params.ws_id = None;
    let mut data = serde_json::to_value(&params)
        .map_err(|err| SetApiError::InvalidParameter(format!("sample set: {err}")))?;
    if let Some(object) = data.as_object_mut() {
        object.insert("num_samples".to_string(), Value::from(sample_ids.len()));
        object.insert("sample_ids".to_string(), Value::from(sample_ids));
        object.insert("condition".to_string(), Value::from(conditions));
    }

    info!(name = %name, "saving RNASeq sample set");
    let info = save_object(
        ws,
        workspace,
        ObjectSaveData {
            type_string: RNASEQ_SAMPLE_SET.to_string(),
            name,
            data,
            provenance,
            hidden: 0,
        },
    )?;
    Ok(SaveSetResult::from(info))
}
