use std::fs;
use std::path::PathBuf;

use kira_fibroqc::classifier::{InMemoryClassifier, TilePrediction, TileRef};
use kira_fibroqc::config::{InvalidTilePolicy, RunConfig};
use kira_fibroqc::ctx::Ctx;
use kira_fibroqc::io::Delimiter;
use kira_fibroqc::pipeline::Pipeline;
use kira_fibroqc::schema::v1::TileClass;
use serde_json::Value;
use tempfile::TempDir;

const RULES: &str = r#"{
  "version": "outputs",
  "fallback_stage": 0,
  "rules": [
    { "stage": 3, "when": "frac(>=3) >= 0.4" },
    { "stage": 2, "when": "frac(>=2) >= 0.4" }
  ]
}"#;

fn run(tmp: &TempDir) -> Ctx {
    let mut c = InMemoryClassifier::new();
    for (tile, slide, class, u) in [
        ("S2_t1", "S2", TileClass::Ignore, 0.3),
        ("S1_t1", "S1", TileClass::Stage2, 0.1),
        ("S1_t2", "S1", TileClass::Stage3, 0.2),
        ("S1_t3", "S1", TileClass::Ignore, 0.9),
        ("S2_t2", "S2", TileClass::Ignore, 0.6),
    ] {
        c.push(
            TileRef {
                tile_id: tile.to_string(),
                slide_id: slide.to_string(),
            },
            TilePrediction::new(tile, class, u).unwrap(),
        )
        .unwrap();
    }

    let rules = tmp.path().join("rules.json");
    fs::write(&rules, RULES).unwrap();
    let config = RunConfig {
        predictions: PathBuf::from("in-memory"),
        delimiter: Delimiter::Semicolon,
        thresholds: Some(rules),
        results_path: tmp.path().join("results"),
        experiment_name: "exp".to_string(),
        invalid_tiles: InvalidTilePolicy::Fail,
    };
    let mut ctx = Ctx::new(config, Box::new(c), "0.0.0-test");
    ctx.write_audit = true;
    ctx.write_json = true;
    Pipeline::scoring().run(&mut ctx).unwrap();
    ctx
}

fn read_lines(path: PathBuf) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn detailed_table_keeps_every_tile_in_input_order() {
    let tmp = TempDir::new().unwrap();
    run(&tmp);

    let lines = read_lines(tmp.path().join("results").join("exp_Fibrosis_score.csv"));
    assert_eq!(lines[0], "tile_id;slide_id;predicted_class;uncertainty;included");
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[1], "S2_t1;S2;ignore;0.30;false");
    assert_eq!(lines[2], "S1_t1;S1;2;0.10;true");
    assert_eq!(lines[4], "S1_t3;S1;ignore;0.90;false");
}

#[test]
fn summary_table_is_trimmed_and_sorted() {
    let tmp = TempDir::new().unwrap();
    run(&tmp);

    let lines = read_lines(tmp.path().join("results").join("exp_summary.csv"));
    assert_eq!(
        lines,
        vec![
            "slide_id;Fibrosis_score;frac_0;frac_1;frac_2;frac_3;frac_4",
            "S1;3;0.00;0.00;0.50;0.50;0.00",
            "S2;unscored;NA;NA;NA;NA;NA",
        ]
    );
    assert!(!lines[0].contains("n_tiles"));
    assert!(!lines[0].contains("average_uncertainty"));
}

#[test]
fn audit_table_keeps_diagnostics() {
    let tmp = TempDir::new().unwrap();
    run(&tmp);

    let lines = read_lines(tmp.path().join("results").join("exp_summary_audit.csv"));
    assert_eq!(
        lines[0],
        "slide_id;Fibrosis_score;n_tiles;average_uncertainty;frac_0;frac_1;frac_2;frac_3;frac_4"
    );
    assert_eq!(lines[1], "S1;3;2;0.15;0.00;0.00;0.50;0.50;0.00");
    assert_eq!(lines[2], "S2;unscored;0;NA;NA;NA;NA;NA;NA");
}

#[test]
fn json_report_mirrors_the_run() {
    let tmp = TempDir::new().unwrap();
    let ctx = run(&tmp);
    assert_eq!(ctx.report.slides.len(), 2);

    let path = tmp.path().join("results").join("exp_report.json");
    let v: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert_eq!(v["tool"], "kira-fibroqc");
    assert_eq!(v["schema_version"], "v1");
    assert_eq!(v["score_name"], "Fibrosis_score");
    assert_eq!(v["run"]["n_tiles_total"], 5);
    assert_eq!(v["run"]["n_unscored"], 1);
    assert_eq!(v["thresholds"]["version"], "outputs");
    assert_eq!(v["thresholds"]["order"], "most_severe_first");
    assert_eq!(v["slides"][0]["slide_id"], "S1");
    assert_eq!(v["slides"][0]["final_stage"], "3");
    assert_eq!(v["slides"][0]["matched_rule"], 0);
    assert_eq!(v["slides"][1]["final_stage"], "unscored");
    assert!(v["slides"][1]["fractions"].is_null());
    assert!(v["warnings"][0].as_str().unwrap().contains("S2"));
}
