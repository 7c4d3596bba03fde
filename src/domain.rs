use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SetApiError;

pub const GENOME_SEARCH_SET: &str = "KBaseSearch.GenomeSet";
pub const RNASEQ_SAMPLE_SET: &str = "KBaseRNASeq.RNASeqSampleSet";

static UPA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+/\d+(/\d+)?$").expect("static UPA pattern"));
static NAME_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([A-Za-z0-9_.|-]+):)?([A-Za-z0-9_.|-]+)/([A-Za-z0-9_.|-]+)$")
        .expect("static name reference pattern")
});

/// `wsid/objid[/ver]` or `[owner:]wsname/objname` with no all-digit name segment.
pub fn check_reference(reference: &str) -> bool {
    if reference.is_empty() {
        return false;
    }
    if UPA_RE.is_match(reference) {
        return true;
    }
    let Some(captures) = NAME_REF_RE.captures(reference) else {
        return false;
    };
    captures
        .iter()
        .skip(1)
        .flatten()
        .all(|segment| !segment.as_str().chars().all(|ch| ch.is_ascii_digit()))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectRef {
    type Err = SetApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if check_reference(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(SetApiError::InvalidReference(value.to_string()))
        }
    }
}

pub type UserMeta = BTreeMap<String, String>;

type ObjectInfoTuple = (
    u64,
    String,
    String,
    String,
    u64,
    String,
    u64,
    String,
    String,
    u64,
    Option<UserMeta>,
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ObjectInfoTuple", into = "ObjectInfoTuple")]
pub struct ObjectInfo {
    pub object_id: u64,
    pub name: String,
    pub type_string: String,
    pub save_date: String,
    pub version: u64,
    pub saved_by: String,
    pub workspace_id: u64,
    pub workspace_name: String,
    pub checksum: String,
    pub size: u64,
    pub metadata: Option<UserMeta>,
}

impl ObjectInfo {
    pub fn reference(&self) -> String {
        format!("{}/{}/{}", self.workspace_id, self.object_id, self.version)
    }

    pub fn type_name(&self) -> &str {
        self.type_string
            .split_once('-')
            .map(|(name, _)| name)
            .unwrap_or(&self.type_string)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|meta| meta.get(key))
            .map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: &str, value: String) {
        self.metadata
            .get_or_insert_with(UserMeta::new)
            .insert(key.to_string(), value);
    }
}

impl From<ObjectInfoTuple> for ObjectInfo {
    fn from(tuple: ObjectInfoTuple) -> Self {
        let (
            object_id,
            name,
            type_string,
            save_date,
            version,
            saved_by,
            workspace_id,
            workspace_name,
            checksum,
            size,
            metadata,
        ) = tuple;
        Self {
            object_id,
            name,
            type_string,
            save_date,
            version,
            saved_by,
            workspace_id,
            workspace_name,
            checksum,
            size,
            metadata,
        }
    }
}

impl From<ObjectInfo> for ObjectInfoTuple {
    fn from(info: ObjectInfo) -> Self {
        (
            info.object_id,
            info.name,
            info.type_string,
            info.save_date,
            info.version,
            info.saved_by,
            info.workspace_id,
            info.workspace_name,
            info.checksum,
            info.size,
            info.metadata,
        )
    }
}

pub fn info_to_ref(info: &ObjectInfo) -> String {
    info.reference()
}

type WorkspaceInfoTuple = (
    u64,
    String,
    String,
    String,
    u64,
    String,
    String,
    String,
    UserMeta,
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WorkspaceInfoTuple", into = "WorkspaceInfoTuple")]
pub struct WorkspaceInfo {
    pub id: u64,
    pub name: String,
    pub owner: String,
    pub modified: String,
    pub max_object_id: u64,
    pub user_permission: String,
    pub global_read: String,
    pub lock_status: String,
    pub metadata: UserMeta,
}

impl From<WorkspaceInfoTuple> for WorkspaceInfo {
    fn from(tuple: WorkspaceInfoTuple) -> Self {
        let (
            id,
            name,
            owner,
            modified,
            max_object_id,
            user_permission,
            global_read,
            lock_status,
            metadata,
        ) = tuple;
        Self {
            id,
            name,
            owner,
            modified,
            max_object_id,
            user_permission,
            global_read,
            lock_status,
            metadata,
        }
    }
}

impl From<WorkspaceInfo> for WorkspaceInfoTuple {
    fn from(info: WorkspaceInfo) -> Self {
        (
            info.id,
            info.name,
            info.owner,
            info.modified,
            info.max_object_id,
            info.user_permission,
            info.global_read,
            info.lock_status,
            info.metadata,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetItem {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<ObjectInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SetItem {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            label: None,
            ref_path: None,
            info: None,
            extra: Map::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetData {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<SetItem>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetEnvelope {
    pub data: SetData,
    pub info: ObjectInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSetResult {
    pub set_ref: String,
    pub set_info: ObjectInfo,
}

impl From<ObjectInfo> for SaveSetResult {
    fn from(info: ObjectInfo) -> Self {
        Self {
            set_ref: info.reference(),
            set_info: info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProvenanceAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_ws_objects: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum SetKind {
    Reads,
    Assembly,
    Genome,
    Expression,
    FeatureSet,
    DifferentialExpressionMatrix,
    ReadsAlignment,
}

impl SetKind {
    pub const ALL: [SetKind; 7] = [
        SetKind::Reads,
        SetKind::Assembly,
        SetKind::Genome,
        SetKind::Expression,
        SetKind::FeatureSet,
        SetKind::DifferentialExpressionMatrix,
        SetKind::ReadsAlignment,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            SetKind::Reads => "reads",
            SetKind::Assembly => "assembly",
            SetKind::Genome => "genome",
            SetKind::Expression => "expression",
            SetKind::FeatureSet => "feature_set",
            SetKind::DifferentialExpressionMatrix => "differential_expression_matrix",
            SetKind::ReadsAlignment => "reads_alignment",
        }
    }

    pub fn set_type(self) -> &'static str {
        match self {
            SetKind::Reads => "KBaseSets.ReadsSet",
            SetKind::Assembly => "KBaseSets.AssemblySet",
            SetKind::Genome => "KBaseSets.GenomeSet",
            SetKind::Expression => "KBaseSets.ExpressionSet",
            SetKind::FeatureSet => "KBaseSets.FeatureSetSet",
            SetKind::DifferentialExpressionMatrix => "KBaseSets.DifferentialExpressionMatrixSet",
            SetKind::ReadsAlignment => "KBaseSets.ReadsAlignmentSet",
        }
    }

    pub fn item_type(self) -> &'static str {
        match self {
            SetKind::Reads => "Reads",
            SetKind::Assembly => "Assembly",
            SetKind::Genome => "Genome",
            SetKind::Expression => "Expression",
            SetKind::FeatureSet => "FeatureSet",
            SetKind::DifferentialExpressionMatrix => "DifferentialExpressionMatrix",
            SetKind::ReadsAlignment => "ReadsAlignment",
        }
    }

    pub fn allows_empty(self) -> bool {
        matches!(self, SetKind::Assembly | SetKind::FeatureSet)
    }

    pub fn genome_key(self) -> Option<&'static str> {
        match self {
            SetKind::Expression | SetKind::ReadsAlignment => Some("genome_id"),
            SetKind::DifferentialExpressionMatrix => Some("Genome"),
            _ => None,
        }
    }
}

impl fmt::Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method_name())
    }
}

impl FromStr for SetKind {
    type Err = SetApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SetKind::ALL
            .into_iter()
            .find(|kind| kind.method_name() == value.trim())
            .ok_or_else(|| SetApiError::InvalidParameter(format!("unknown set kind {value}")))
    }
}
