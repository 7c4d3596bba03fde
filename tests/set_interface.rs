mod common;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use setapi::api::{CallContext, SetApi};
use setapi::domain::{GENOME_SEARCH_SET, SetKind};
use setapi::error::SetApiError;
use setapi::set_interface::{GetSetParams, SaveSetParams, SetRequest, get_set, save_set};

use common::{MockWorkspace, WS_NAME};

fn save_params(value: Value) -> SaveSetParams {
    serde_json::from_value(value).unwrap()
}

fn get_params(value: Value) -> GetSetParams {
    serde_json::from_value(value).unwrap()
}

#[test]
fn set_o_reads_round_trip() {
    let ws = MockWorkspace::new();
    let r1 = ws.add_reads("reads1");
    let r2 = ws.add_reads("reads2");
    let api = SetApi::new(&ws);

    let saved = api
        .save_set(
            &CallContext::default(),
            SetKind::Reads,
            save_params(json!({
                "workspace": WS_NAME,
                "output_object_name": "set_o_reads",
                "data": {
                    "description": "my reads set",
                    "items": [
                        {"ref": r1, "label": "reads1"},
                        {"ref": r2, "label": "reads2"}
                    ]
                }
            })),
        )
        .unwrap();

    assert_eq!(saved.set_info.name, "set_o_reads");
    assert_eq!(saved.set_info.metadata_value("item_count"), Some("2"));
    assert_eq!(saved.set_ref, saved.set_info.reference());

    let fetched = api
        .get_set(
            SetKind::Reads,
            get_params(json!({"ref": saved.set_ref, "include_item_info": 1})),
        )
        .unwrap();
    let items = fetched.data.items.unwrap();
    assert_eq!(fetched.data.description, "my reads set");
    assert_eq!(items[1].reference, r2);
    assert_eq!(items[1].label.as_deref(), Some("reads2"));
    let info = serde_json::to_value(items[1].info.as_ref().unwrap()).unwrap();
    assert_eq!(info.as_array().map(Vec::len), Some(11));
    assert_eq!(info[1], json!("reads2"));
}

#[test]
fn get_without_flags_returns_items_in_order() {
    let ws = MockWorkspace::new();
    let refs: Vec<String> = (0..4).map(|i| ws.add_reads(&format!("r{i}"))).collect();
    let api = SetApi::new(&ws);
    let items: Vec<Value> = refs.iter().rev().map(|r| json!({"ref": r})).collect();

    let saved = api
        .save_set(
            &CallContext::default(),
            SetKind::Reads,
            save_params(json!({
                "workspace_id": 1,
                "output_object_name": "ordered",
                "data": {"description": "D", "items": items}
            })),
        )
        .unwrap();

    let fetched = api
        .get_set(SetKind::Reads, get_params(json!({"ref": saved.set_ref})))
        .unwrap();
    let items = fetched.data.items.unwrap();
    let got: Vec<&str> = items.iter().map(|item| item.reference.as_str()).collect();
    let expected: Vec<&str> = refs.iter().rev().map(String::as_str).collect();
    assert_eq!(got, expected);
    assert_eq!(fetched.data.description, "D");
    assert!(items.iter().all(|item| item.info.is_none() && item.ref_path.is_none()));
    assert!(items.iter().all(|item| item.label.as_deref() == Some("")));
}

#[test]
fn ref_paths_follow_the_selector() {
    let ws = MockWorkspace::new();
    let r1 = ws.add_reads("reads1");
    let api = SetApi::new(&ws);
    let saved = api
        .save_set(
            &CallContext::default(),
            SetKind::Reads,
            save_params(json!({
                "workspace": "1",
                "output_object_name": "set",
                "data": {"items": [{"ref": r1}]}
            })),
        )
        .unwrap();

    let direct = api
        .get_set(
            SetKind::Reads,
            get_params(json!({"ref": saved.set_ref, "include_set_item_ref_paths": 1})),
        )
        .unwrap();
    let item = &direct.data.items.unwrap()[0];
    assert_eq!(item.ref_path, Some(format!("{};{}", saved.set_ref, r1)));

    let container = ws.add_object(
        1,
        "narrative",
        "KBaseNarrative.Narrative-4.0",
        json!({}),
        &[],
    );
    let through_path = api
        .get_set(
            SetKind::Reads,
            get_params(json!({
                "ref": saved.set_ref,
                "ref_path_to_set": [container, saved.set_ref],
                "include_set_item_ref_paths": 1,
                "include_item_info": 1
            })),
        )
        .unwrap();
    let item = &through_path.data.items.unwrap()[0];
    assert_eq!(
        item.ref_path,
        Some(format!("{};{};{}", container, saved.set_ref, r1))
    );
    assert_eq!(item.info.as_ref().map(|info| info.name.as_str()), Some("reads1"));
}

#[test]
fn repeated_gets_are_identical() {
    let ws = MockWorkspace::new();
    let r1 = ws.add_reads("reads1");
    let set_ref = ws.add_object(
        1,
        "set",
        "KBaseSets.ReadsSet-2.0",
        json!({"description": "", "items": [{"ref": r1, "label": "a"}]}),
        &[],
    );
    let request = SetRequest {
        include_item_info: true,
        include_set_item_ref_paths: true,
        ..SetRequest::new(set_ref)
    };
    let first = get_set(&ws, &request).unwrap();
    let second = get_set(&ws, &request).unwrap();
    assert_eq!(first, second);
    assert_eq!(ws.calls("get_objects2"), 2);
    assert_eq!(ws.calls("get_object_info3"), 2);
}

#[test]
fn duplicate_refs_are_rejected_regardless_of_label() {
    let ws = MockWorkspace::new();
    let r1 = ws.add_reads("reads1");
    let api = SetApi::new(&ws);
    let result = api.save_set(
        &CallContext::default(),
        SetKind::Reads,
        save_params(json!({
            "workspace": WS_NAME,
            "output_object_name": "dupes",
            "data": {"items": [{"ref": r1, "label": "a"}, {"ref": r1, "label": "b"}]}
        })),
    );
    assert_matches!(result, Err(SetApiError::DuplicateReferences(_)));
    assert_eq!(ws.calls("save_objects"), 0);
}

#[test]
fn genome_bound_sets_require_one_genome() {
    let ws = MockWorkspace::new();
    let e1 = ws.add_object(1, "e1", "KBaseRNASeq.RNASeqExpression-1.0", json!({}), &[("genome_id", "1/9/1")]);
    let e2 = ws.add_object(1, "e2", "KBaseRNASeq.RNASeqExpression-1.0", json!({}), &[("genome_id", "1/9/1")]);
    let e3 = ws.add_object(1, "e3", "KBaseRNASeq.RNASeqExpression-1.0", json!({}), &[("genome_id", "1/8/1")]);
    let api = SetApi::new(&ws);
    let ctx = CallContext::default();

    let mismatched = api.save_set(
        &ctx,
        SetKind::Expression,
        save_params(json!({
            "workspace": WS_NAME,
            "output_object_name": "bad",
            "data": {"items": [{"ref": e1}, {"ref": e3}]}
        })),
    );
    assert_matches!(
        mismatched,
        Err(SetApiError::MismatchedGenomes(item_type)) if item_type == "Expression"
    );

    let matched = api.save_set(
        &ctx,
        SetKind::Expression,
        save_params(json!({
            "workspace": WS_NAME,
            "output_object_name": "good",
            "data": {"items": [{"ref": e1}, {"ref": e2}]}
        })),
    );
    assert!(matched.is_ok());
    assert_eq!(ws.calls("save_objects"), 1);
}

#[test]
fn missing_genome_metadata_fails_the_check() {
    let ws = MockWorkspace::new();
    let a1 = ws.add_object(1, "a1", "KBaseRNASeq.RNASeqAlignment-1.0", json!({}), &[]);
    let api = SetApi::new(&ws);
    let result = api.save_set(
        &CallContext::default(),
        SetKind::ReadsAlignment,
        save_params(json!({
            "workspace": WS_NAME,
            "output_object_name": "alignments",
            "data": {"items": [{"ref": a1}]}
        })),
    );
    assert_matches!(result, Err(SetApiError::MismatchedGenomes(_)));
}

#[test]
fn differential_expression_sets_use_the_genome_key() {
    let ws = MockWorkspace::new();
    let m1 = ws.add_object(1, "m1", "KBaseFeatureValues.DifferentialExpressionMatrix-1.0", json!({}), &[("Genome", "1/9/1")]);
    let m2 = ws.add_object(1, "m2", "KBaseFeatureValues.DifferentialExpressionMatrix-1.0", json!({}), &[("Genome", "1/9/1")]);
    let api = SetApi::new(&ws);
    let saved = api
        .save_set(
            &CallContext::default(),
            SetKind::DifferentialExpressionMatrix,
            save_params(json!({
                "workspace": WS_NAME,
                "output_object_name": "dem",
                "data": {"items": [{"ref": m1}, {"ref": m2}]}
            })),
        )
        .unwrap();
    assert!(saved.set_info.type_string.starts_with("KBaseSets.DifferentialExpressionMatrixSet"));
}

#[test]
fn bad_get_input_makes_no_remote_calls() {
    let ws = MockWorkspace::new();
    let api = SetApi::new(&ws);

    assert_matches!(
        api.get_set(SetKind::Reads, get_params(json!({}))),
        Err(SetApiError::MissingParameter(name)) if name == "ref"
    );
    assert_matches!(
        api.get_set(SetKind::Reads, get_params(json!({"ref": "foo/2"}))),
        Err(SetApiError::InvalidReference(_))
    );
    assert_matches!(
        api.get_set(
            SetKind::Genome,
            get_params(json!({"ref": "1/2/3", "ref_path_to_set": ["1/2/3", "x/y/z"]}))
        ),
        Err(SetApiError::InvalidRefPath(_))
    );
    assert_matches!(
        api.get_set(
            SetKind::Assembly,
            get_params(json!({"ref": "1/2/3", "include_set_item_ref_paths": 2}))
        ),
        Err(SetApiError::InvalidFlag(name)) if name == "include_set_item_ref_paths"
    );
    assert_eq!(ws.total_calls(), 0);
}

#[test]
fn save_checks_parameters_in_order() {
    let ws = MockWorkspace::new();
    let ctx = CallContext::default();

    assert_matches!(
        save_set(&ws, "KBaseSets.ReadsSet", &ctx.provenance, save_params(json!({"workspace": 1}))),
        Err(SetApiError::MissingParameter(name)) if name == "data"
    );
    assert_matches!(
        save_set(&ws, "KBaseSets.ReadsSet", &ctx.provenance, save_params(json!({"data": {}}))),
        Err(SetApiError::MissingWorkspace)
    );
    assert_matches!(
        save_set(
            &ws,
            "KBaseSets.ReadsSet",
            &ctx.provenance,
            save_params(json!({"data": {}, "workspace_name": WS_NAME}))
        ),
        Err(SetApiError::MissingParameter(name)) if name == "output_object_name"
    );
    assert_eq!(ws.total_calls(), 0);

    let info = save_set(
        &ws,
        "KBaseSets.ReadsSet",
        &ctx.provenance,
        save_params(json!({"data": {"anything": true}, "workspace_name": WS_NAME, "output_object_name": "raw"})),
    )
    .unwrap();
    assert_eq!(ws.stored(&info.reference()).data, json!({"anything": true}));
}

#[test]
fn empty_sets_only_where_allowed() {
    let ws = MockWorkspace::new();
    let api = SetApi::new(&ws);
    let ctx = CallContext::default();
    let params = || {
        save_params(json!({
            "workspace": WS_NAME,
            "output_object_name": "empty",
            "data": {"items": []}
        }))
    };

    assert!(api.save_set(&ctx, SetKind::Assembly, params()).is_ok());
    assert!(api.save_set(&ctx, SetKind::FeatureSet, params()).is_ok());
    assert_matches!(
        api.save_set(&ctx, SetKind::Genome, params()),
        Err(SetApiError::NoItems { set_type, .. }) if set_type == "KBaseSets.GenomeSet"
    );
    assert_matches!(
        api.save_set(&ctx, SetKind::Reads, params()),
        Err(SetApiError::NoItems { .. })
    );
}

#[test]
fn unknown_item_fields_survive_and_read_only_fields_do_not() {
    let ws = MockWorkspace::new();
    let r1 = ws.add_reads("reads1");
    let api = SetApi::new(&ws);
    let saved = api
        .save_set(
            &CallContext::default(),
            SetKind::Reads,
            save_params(json!({
                "workspace": WS_NAME,
                "output_object_name": "attached",
                "data": {
                    "items": [{
                        "ref": r1,
                        "data_attachments": [{"name": "qc", "ref": "1/1/1"}],
                        "ref_path": "bogus",
                        "info": [1, "x", "T-1.0", "d", 1, "u", 1, "w", "c", 1, {}]
                    }]
                }
            })),
        )
        .unwrap();

    let stored = ws.stored(&saved.set_ref).data;
    let item = &stored["items"][0];
    assert_eq!(item["data_attachments"][0]["name"], json!("qc"));
    assert_eq!(item["label"], json!(""));
    assert!(item.get("ref_path").is_none());
    assert!(item.get("info").is_none());
    assert_eq!(stored["description"], json!(""));
}

#[test]
fn search_genome_sets_keep_elements() {
    let ws = MockWorkspace::new();
    let genome = ws.add_object(1, "g1", "KBaseGenomes.Genome-17.0", json!({}), &[]);
    let api = SetApi::new(&ws);
    let ctx = CallContext::default();

    let saved = api
        .save_set(
            &ctx,
            SetKind::Genome,
            save_params(json!({
                "workspace": WS_NAME,
                "output_object_name": "search_set",
                "save_search_set": 1,
                "data": {"elements": {"g1": {"ref": genome, "metadata": {}}}}
            })),
        )
        .unwrap();
    assert_eq!(saved.set_info.type_name(), GENOME_SEARCH_SET);
    let stored = ws.stored(&saved.set_ref).data;
    assert_eq!(stored["description"], json!(""));
    assert_eq!(stored["elements"]["g1"]["ref"], json!(genome));

    let fetched = api
        .get_set(SetKind::Genome, get_params(json!({"ref": saved.set_ref, "include_item_info": 1})))
        .unwrap();
    assert!(fetched.data.items.is_none());
    assert!(fetched.data.extra.contains_key("elements"));

    assert_matches!(
        api.save_set(
            &ctx,
            SetKind::Genome,
            save_params(json!({
                "workspace": WS_NAME,
                "output_object_name": "no_elements",
                "save_search_set": 1,
                "data": {"items": []}
            }))
        ),
        Err(SetApiError::ListRequired(key)) if key == "elements"
    );
}
