use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::domain::{RNASEQ_SAMPLE_SET, SetData, SetEnvelope, SetItem, SetKind};
use crate::error::SetApiError;
use crate::selector::{ObjectSelector, populate_item_object_ref_paths};
use crate::workspace::{ObjectData, WorkspaceClient, get_infos};

pub const RNASEQ_ALIGNMENT_SET: &str = "KBaseRNASeq.RNASeqAlignmentSet";
pub const RNASEQ_EXPRESSION_SET: &str = "KBaseRNASeq.RNASeqExpressionSet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyShape {
    AlignmentSet,
    ExpressionSet,
    SampleSet,
}

impl LegacyShape {
    pub fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            RNASEQ_ALIGNMENT_SET => Some(Self::AlignmentSet),
            RNASEQ_EXPRESSION_SET => Some(Self::ExpressionSet),
            RNASEQ_SAMPLE_SET => Some(Self::SampleSet),
            _ => None,
        }
    }

    pub fn accepted_by(self, kind: SetKind) -> bool {
        matches!(
            (self, kind),
            (Self::AlignmentSet, SetKind::ReadsAlignment)
                | (Self::ExpressionSet, SetKind::Expression)
                | (Self::SampleSet, SetKind::Reads)
        )
    }

    fn keys(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::AlignmentSet => Some(("sample_alignments", "mapped_alignments_ids")),
            Self::ExpressionSet => Some(("sample_expression_ids", "mapped_expression_ids")),
            Self::SampleSet => None,
        }
    }

    /// The flat list wins when present. Otherwise the values of every mapping
    /// are collected once each, in first-seen order.
    pub fn extract_refs(self, data: &Value) -> Result<Vec<String>, SetApiError> {
        let Some((list_key, map_key)) = self.keys() else {
            return sample_ids(data);
        };
        if let Some(list) = data.get(list_key) {
            return string_list(list, list_key);
        }
        let mappings = data
            .get(map_key)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SetApiError::MalformedResponse(format!("neither {list_key} nor {map_key} present"))
            })?;

        let mut seen = HashSet::new();
        let mut refs = Vec::new();
        for mapping in mappings {
            let Some(mapping) = mapping.as_object() else {
                return Err(SetApiError::MalformedResponse(format!(
                    "{map_key} entries must be objects"
                )));
            };
            for value in mapping.values() {
                let reference = value.as_str().ok_or_else(|| {
                    SetApiError::MalformedResponse(format!("{map_key} values must be strings"))
                })?;
                if seen.insert(reference.to_string()) {
                    refs.push(reference.to_string());
                }
            }
        }
        Ok(refs)
    }

    pub fn translate<W: WorkspaceClient + ?Sized>(
        self,
        ws: &W,
        selector: &ObjectSelector,
        object: ObjectData,
        include_item_info: bool,
        include_set_item_ref_paths: bool,
    ) -> Result<SetEnvelope, SetApiError> {
        debug!(shape = ?self, reference = %selector.reference, "translating legacy set");
        match self {
            Self::SampleSet => translate_sample_set(
                ws,
                selector,
                object,
                include_item_info,
                include_set_item_ref_paths,
            ),
            Self::AlignmentSet | Self::ExpressionSet => {
                let ObjectData { data, mut info, .. } = object;
                let refs = self.extract_refs(&data)?;
                let selectors = refs.iter().map(ObjectSelector::new).collect();
                let infos = get_infos(ws, selectors, true)?;

                let mut items: Vec<SetItem> = refs
                    .into_iter()
                    .zip(infos)
                    .map(|(reference, item_info)| {
                        let mut item = SetItem::new(reference);
                        item.label = Some(
                            item_info
                                .metadata_value("condition")
                                .unwrap_or_default()
                                .to_string(),
                        );
                        if include_item_info {
                            item.info = Some(item_info);
                        }
                        item
                    })
                    .collect();
                if include_set_item_ref_paths {
                    populate_item_object_ref_paths(&mut items, selector);
                }

                info.set_metadata("description", String::new());
                info.set_metadata("item_count", items.len().to_string());
                Ok(SetEnvelope {
                    data: SetData {
                        description: String::new(),
                        items: Some(items),
                        ..SetData::default()
                    },
                    info,
                })
            }
        }
    }
}

fn translate_sample_set<W: WorkspaceClient + ?Sized>(
    ws: &W,
    selector: &ObjectSelector,
    object: ObjectData,
    include_item_info: bool,
    include_set_item_ref_paths: bool,
) -> Result<SetEnvelope, SetApiError> {
    let ObjectData { data, mut info, .. } = object;
    let description = data
        .get("sampleset_desc")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let samples = sample_ids(&data)?;
    let conditions = match data.get("condition") {
        Some(Value::Array(values)) => values.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => {
            return Err(SetApiError::InvalidSampleSet(
                "condition must be a list".to_string(),
            ));
        }
    };

    info.set_metadata("description", description.clone());
    info.set_metadata("item_count", samples.len().to_string());

    if samples.len() != conditions.len() {
        return Err(SetApiError::InvalidSampleSet(
            "The number of conditions doesn't match the number of reads objects.".to_string(),
        ));
    }

    let mut items: Vec<SetItem> = samples
        .into_iter()
        .zip(conditions)
        .map(|(reference, condition)| {
            let label = match condition {
                Value::String(text) => text,
                other => other.to_string(),
            };
            SetItem::new(reference).with_label(label)
        })
        .collect();

    if include_item_info && !items.is_empty() {
        let selectors = items
            .iter()
            .map(|item| ObjectSelector::new(item.reference.clone()))
            .collect();
        for (item, item_info) in items.iter_mut().zip(get_infos(ws, selectors, true)?) {
            item.info = Some(item_info);
        }
    }
    if include_set_item_ref_paths {
        populate_item_object_ref_paths(&mut items, selector);
    }

    Ok(SetEnvelope {
        data: SetData {
            description,
            items: Some(items),
            ..SetData::default()
        },
        info,
    })
}

fn sample_ids(data: &Value) -> Result<Vec<String>, SetApiError> {
    match data.get("sample_ids") {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(list) => string_list(list, "sample_ids"),
    }
}

fn string_list(value: &Value, key: &str) -> Result<Vec<String>, SetApiError> {
    let values = value
        .as_array()
        .ok_or_else(|| SetApiError::MalformedResponse(format!("{key} must be a list")))?;
    values
        .iter()
        .map(|entry| {
            entry
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| SetApiError::MalformedResponse(format!("{key} must hold strings")))
        })
        .collect()
}
