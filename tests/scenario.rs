use std::fs;
use std::path::PathBuf;

use kira_fibroqc::classifier::{InMemoryClassifier, TilePrediction, TileRef};
use kira_fibroqc::config::{InvalidTilePolicy, RunConfig};
use kira_fibroqc::ctx::Ctx;
use kira_fibroqc::error::ScoreError;
use kira_fibroqc::io::Delimiter;
use kira_fibroqc::pipeline::Pipeline;
use kira_fibroqc::schema::v1::{FinalStage, TileClass};
use tempfile::TempDir;

const SCENARIO_RULES: &str = r#"{
  "version": "scenario",
  "order": "most_severe_first",
  "fallback_stage": 0,
  "rules": [
    { "stage": 3, "when": "frac(>=3) >= 0.4" },
    { "stage": 2, "when": "frac(>=2) >= 0.4" }
  ]
}"#;

fn push(c: &mut InMemoryClassifier, tile_id: &str, slide_id: &str, label: &str, u: f64) {
    c.push(
        TileRef {
            tile_id: tile_id.to_string(),
            slide_id: slide_id.to_string(),
        },
        TilePrediction::new(tile_id, TileClass::parse(label).unwrap(), u).unwrap(),
    )
    .unwrap();
}

fn scenario_classifier() -> InMemoryClassifier {
    let mut c = InMemoryClassifier::new();
    push(&mut c, "S1_t1", "S1", "2", 0.1);
    push(&mut c, "S1_t2", "S1", "3", 0.2);
    push(&mut c, "S1_t3", "S1", "ignore", 0.9);
    push(&mut c, "S2_t1", "S2", "ignore", 0.3);
    push(&mut c, "S2_t2", "S2", "ignore", 0.6);
    c
}

fn make_ctx(tmp: &TempDir, classifier: InMemoryClassifier) -> Ctx {
    let rules = tmp.path().join("rules.json");
    fs::write(&rules, SCENARIO_RULES).unwrap();
    let config = RunConfig {
        predictions: PathBuf::from("in-memory"),
        delimiter: Delimiter::Semicolon,
        thresholds: Some(rules),
        results_path: tmp.path().join("out"),
        experiment_name: "scenario".to_string(),
        invalid_tiles: InvalidTilePolicy::Fail,
    };
    let mut ctx = Ctx::new(config, Box::new(classifier), "0.0.0-test");
    ctx.write_outputs = false;
    ctx.threads = 1;
    ctx
}

#[test]
fn mixed_slide_is_graded_at_most_severe_supported_stage() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    Pipeline::scoring().run(&mut ctx).unwrap();

    let summary = ctx.summary.as_ref().unwrap();
    let s1 = summary.get("S1").unwrap();
    assert_eq!(s1.n_tiles, 2);
    assert_eq!(s1.class_counts, [0, 0, 1, 1, 0]);
    assert_eq!(s1.final_stage, FinalStage::Stage(3));
    assert_eq!(s1.matched_rule, Some(0));
    assert!((s1.average_uncertainty.unwrap() - 0.15).abs() < 1e-12);
    assert!((s1.fractions.unwrap().frac_at_least(3) - 0.5).abs() < 1e-12);
}

#[test]
fn all_ignore_slide_is_reported_unscored() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    Pipeline::scoring().run(&mut ctx).unwrap();

    let summary = ctx.summary.as_ref().unwrap();
    assert_eq!(summary.rows.len(), 2);
    let s2 = summary.get("S2").unwrap();
    assert_eq!(s2.n_tiles, 0);
    assert_eq!(s2.final_stage, FinalStage::Unscored);
    assert_eq!(s2.average_uncertainty, None);
    assert!(s2.fractions.is_none());
    assert!(ctx.warnings.iter().any(|w| w.contains("slide S2")));

    let trimmed = summary.trimmed();
    assert_eq!(trimmed.len(), 2);
    assert_eq!(trimmed[1].final_stage.to_string(), "unscored");
}

#[test]
fn detailed_rows_pass_every_tile_through() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    Pipeline::scoring().run(&mut ctx).unwrap();

    assert_eq!(ctx.detailed.len(), 5);
    let ignored = ctx.detailed.iter().filter(|r| !r.included).count();
    assert_eq!(ignored, 3);
    assert_eq!(ctx.report.slides.len(), 2);
    assert_eq!(ctx.report.run.n_unscored, 1);
}

#[test]
fn invalid_label_fails_the_run_by_default() {
    let tmp = TempDir::new().unwrap();
    let mut classifier = scenario_classifier();
    classifier.push_raw_label(
        TileRef {
            tile_id: "S1_bad".to_string(),
            slide_id: "S1".to_string(),
        },
        "5",
    )
    .unwrap();
    let mut ctx = make_ctx(&tmp, classifier);
    let err = Pipeline::scoring().run(&mut ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScoreError>(),
        Some(ScoreError::InvalidClass { label, .. }) if label == "5"
    ));
    assert!(ctx.summary.is_none());
}

#[test]
fn invalid_label_is_excluded_and_counted_when_tolerated() {
    let tmp = TempDir::new().unwrap();
    let mut classifier = scenario_classifier();
    classifier.push_raw_label(
        TileRef {
            tile_id: "S1_bad".to_string(),
            slide_id: "S1".to_string(),
        },
        "fibrotic",
    )
    .unwrap();
    let mut ctx = make_ctx(&tmp, classifier);
    ctx.config.invalid_tiles = InvalidTilePolicy::Exclude;
    Pipeline::scoring().run(&mut ctx).unwrap();

    assert_eq!(ctx.excluded_tiles, vec!["S1_bad".to_string()]);
    assert_eq!(ctx.n_tiles_seen, 6);
    assert_eq!(ctx.report.run.n_tiles_excluded, 1);
    let s1 = ctx.summary.as_ref().unwrap().get("S1").unwrap();
    assert_eq!(s1.n_tiles, 2);
    assert!(ctx.warnings.iter().any(|w| w.contains("fibrotic")));
}

#[test]
fn bad_thresholds_abort_before_classification() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    let rules = tmp.path().join("broken.json");
    fs::write(&rules, r#"{ "fallback_stage": 0, "rules": [ { "stage": 3 } ] }"#).unwrap();
    ctx.config.thresholds = Some(rules);

    let err = Pipeline::scoring().run(&mut ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScoreError>(),
        Some(ScoreError::ThresholdConfig { .. })
    ));
    assert!(ctx.tiles.is_empty());
    assert!(ctx.summary.is_none());
}

#[test]
fn bad_score_name_aborts_before_classification() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    ctx.write_outputs = true;
    let rules = tmp.path().join("escape.json");
    fs::write(
        &rules,
        r#"{ "score_name": "../elsewhere/x", "fallback_stage": 0, "rules": [ { "stage": 3, "when": "frac(>=3) >= 0.4" } ] }"#,
    )
    .unwrap();
    ctx.config.thresholds = Some(rules);

    let err = Pipeline::scoring().run(&mut ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScoreError>(),
        Some(ScoreError::ThresholdConfig { .. })
    ));
    assert!(ctx.tiles.is_empty());
    assert!(ctx.summary.is_none());
}

#[test]
fn duplicate_or_unwritable_tiles_are_rejected_on_push() {
    let mut c = scenario_classifier();
    let dup = TileRef {
        tile_id: "S1_t1".to_string(),
        slide_id: "S1".to_string(),
    };
    let p = TilePrediction::new("S1_t1", TileClass::Stage4, 0.5).unwrap();
    assert!(c.push(dup.clone(), p).is_err());
    assert!(c.push_raw_label(dup, "7").is_err());

    let split = TileRef {
        tile_id: "S;1_t9".to_string(),
        slide_id: "S;1".to_string(),
    };
    assert!(c.push(split, p).is_err());

    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, c);
    Pipeline::scoring().run(&mut ctx).unwrap();
    assert_eq!(ctx.n_tiles_seen, 5);
    let s1 = ctx.summary.as_ref().unwrap().get("S1").unwrap();
    assert_eq!(s1.class_counts, [0, 0, 1, 1, 0]);
}

#[test]
fn cancelled_run_stops_between_slides() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = make_ctx(&tmp, scenario_classifier());
    ctx.cancel.cancel();
    let err = Pipeline::scoring().run(&mut ctx).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ScoreError>(),
        Some(ScoreError::Cancelled { total: 2, .. })
    ));
}
