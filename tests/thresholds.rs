use std::fs;

use kira_fibroqc::error::ScoreError;
use kira_fibroqc::scores::{ClassFractions, SlideAggregate};
use kira_fibroqc::schema::v1::FinalStage;
use kira_fibroqc::thresholds::{
    RuleOrder, StageDecision, load_builtin, load_threshold_json, parse_threshold_json,
};
use tempfile::TempDir;

const SCENARIO_RULES: &str = r#"{
  "version": "scenario",
  "order": "most_severe_first",
  "fallback_stage": 0,
  "rules": [
    { "stage": 2, "when": "frac(>=2) >= 0.4" },
    { "stage": 3, "when": "frac(>=3) >= 0.4" }
  ]
}"#;

fn fracs(counts: [u64; 5]) -> ClassFractions {
    ClassFractions::from_counts(counts).unwrap()
}

fn config_message(err: ScoreError) -> String {
    match err {
        ScoreError::ThresholdConfig { message, .. } => message,
        other => panic!("expected threshold config error, got {other}"),
    }
}

#[test]
fn builtin_rules_load() {
    let set = load_builtin().unwrap();
    assert_eq!(set.score_name, "Fibrosis_score");
    assert_eq!(set.order, RuleOrder::MostSevereFirst);
    assert_eq!(set.fallback_stage, 0);
    let stages: Vec<u8> = set.rules().iter().map(|r| r.stage).collect();
    assert_eq!(stages, vec![4, 3, 2, 1]);
}

#[test]
fn rules_are_evaluated_most_severe_first() {
    let set = parse_threshold_json(SCENARIO_RULES, "test").unwrap();
    // Both predicates hold; the more severe stage wins regardless of file order.
    let decision = set.select(&fracs([0, 0, 1, 1, 0]));
    assert_eq!(decision, StageDecision::Matched { stage: 3, rule: 0 });
}

#[test]
fn least_severe_first_changes_tie_break() {
    let doc = SCENARIO_RULES.replace("most_severe_first", "least_severe_first");
    let set = parse_threshold_json(&doc, "test").unwrap();
    assert_eq!(set.select(&fracs([0, 0, 1, 1, 0])).stage(), 2);
}

#[test]
fn unmatched_vector_gets_fallback() {
    let set = parse_threshold_json(SCENARIO_RULES, "test").unwrap();
    let decision = set.select(&fracs([9, 1, 0, 0, 0]));
    assert_eq!(decision, StageDecision::Fallback { stage: 0 });
    assert_eq!(decision.rule(), None);
}

#[test]
fn selection_is_deterministic() {
    let set = load_builtin().unwrap();
    let f = fracs([3, 2, 2, 1, 1]);
    let first = set.select(&f);
    for _ in 0..10 {
        assert_eq!(set.select(&f), first);
    }
}

#[test]
fn empty_slide_is_unscored() {
    let set = load_builtin().unwrap();
    let slide = SlideAggregate {
        slide_id: "S2".to_string(),
        class_counts: [0; 5],
        n_tiles: 0,
        n_ignored: 4,
        average_uncertainty: None,
    };
    assert_eq!(set.score_slide(&slide), (FinalStage::Unscored, None));
}

#[test]
fn combined_predicates_are_supported() {
    let doc = r#"{
      "fallback_stage": 1,
      "rules": [
        { "stage": 4, "when": "frac(4) >= 30% && !(frac(0..1) > 0.5)" },
        { "stage": 2, "when": "frac(2+3) >= 0.5 || frac(4) > 0.6" }
      ]
    }"#;
    let set = parse_threshold_json(doc, "test").unwrap();
    assert_eq!(set.select(&fracs([0, 2, 0, 4, 4])).stage(), 4);
    assert_eq!(set.select(&fracs([6, 0, 0, 0, 4])).stage(), 1);
    assert_eq!(set.select(&fracs([2, 0, 3, 3, 2])).stage(), 2);
}

#[test]
fn missing_stage_is_rejected() {
    let doc = r#"{ "fallback_stage": 0, "rules": [ { "when": "true" } ] }"#;
    let msg = config_message(parse_threshold_json(doc, "test").unwrap_err());
    assert!(msg.contains("missing stage"));
}

#[test]
fn malformed_predicate_is_rejected() {
    let doc = r#"{ "fallback_stage": 0, "rules": [ { "stage": 2, "when": "frac(7) > 0.1" } ] }"#;
    let msg = config_message(parse_threshold_json(doc, "test").unwrap_err());
    assert!(msg.contains("rule 1"));
}

#[test]
fn duplicate_stage_is_rejected() {
    let doc = r#"{ "fallback_stage": 0, "rules": [
        { "stage": 2, "when": "true" }, { "stage": 2, "when": "false" } ] }"#;
    let msg = config_message(parse_threshold_json(doc, "test").unwrap_err());
    assert!(msg.contains("duplicate stage 2"));
}

#[test]
fn missing_fallback_is_rejected() {
    let doc = r#"{ "rules": [ { "stage": 2, "when": "true" } ] }"#;
    let msg = config_message(parse_threshold_json(doc, "test").unwrap_err());
    assert!(msg.contains("fallback_stage"));
}

#[test]
fn structural_defects_are_rejected() {
    for doc in [
        r#"{ "fallback_stage": 0, "rules": [] }"#,
        r#"{ "fallback_stage": 9, "rules": [ { "stage": 2, "when": "true" } ] }"#,
        r#"{ "fallback_stage": 0, "rules": [ { "stage": 5, "when": "true" } ] }"#,
        r#"{ "fallback_stage": 0, "order": "sideways", "rules": [ { "stage": 1, "when": "true" } ] }"#,
        r#"{ "fallback_stage": 0, "rules": [ { "stage": 1, "when": "true", "weight": 2 } ] }"#,
        r#"{ "fallback_stage": 0, "rules": [ { "stage": 1 } ] }"#,
        "not json",
    ] {
        assert!(parse_threshold_json(doc, "test").is_err(), "accepted: {doc}");
    }
}

#[test]
fn load_from_file_reports_path() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("rules.json");
    fs::write(&path, r#"{ "fallback_stage": 0 }"#).unwrap();
    let err = load_threshold_json(&path).unwrap_err();
    let score_err = err.downcast_ref::<ScoreError>().unwrap();
    assert!(score_err.to_string().contains("rules.json"));

    let missing = load_threshold_json(&tmp.path().join("absent.json"));
    assert!(missing.is_err());
}

#[test]
fn meta_lists_rules_in_evaluation_order() {
    let set = parse_threshold_json(SCENARIO_RULES, "test").unwrap();
    let meta = set.meta();
    assert_eq!(meta.rules[0].stage, 3);
    assert_eq!(meta.rules[0].when, "frac(>=3) >= 0.4");
    assert_eq!(meta.order, "most_severe_first");
}

#[test]
fn score_name_must_be_usable_in_file_names_and_headers() {
    for name in ["", "  ", "../elsewhere/pwn", "a/b", "a\\\\b", "Fibrosis;score"] {
        let doc = format!(
            r#"{{ "score_name": "{}", "fallback_stage": 0, "rules": [ {{ "stage": 1, "when": "true" }} ] }}"#,
            name
        );
        let err = parse_threshold_json(&doc, "test").unwrap_err();
        assert!(config_message(err).contains("score_name"), "accepted {name:?}");
    }
    let ok = r#"{ "score_name": "Kleiner_score", "fallback_stage": 0, "rules": [ { "stage": 1, "when": "true" } ] }"#;
    assert_eq!(parse_threshold_json(ok, "test").unwrap().score_name, "Kleiner_score");
}
