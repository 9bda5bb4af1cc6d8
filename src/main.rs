use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kira_fibroqc::classifier::PredictionTable;
use kira_fibroqc::cli::{Cli, Commands, RunArgs, ThresholdsCommand, ValidateArgs};
use kira_fibroqc::config::{ConfigOverrides, RunConfig, RunConfigDoc};
use kira_fibroqc::ctx::Ctx;
use kira_fibroqc::io;
use kira_fibroqc::pipeline::Pipeline;
use kira_fibroqc::pipeline::stage1_thresholds::Stage1Thresholds;
use kira_fibroqc::pipeline::stage2_classify::Stage2Classify;
use kira_fibroqc::pipeline::stage3_aggregate::Stage3Aggregate;
use kira_fibroqc::pipeline::stage4_score::Stage4Score;
use kira_fibroqc::thresholds::{ThresholdSet, load_builtin, load_threshold_json};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args)?,
        Commands::Thresholds(args) => match args.command {
            ThresholdsCommand::Show(show) => {
                let set = load_thresholds(show.thresholds.as_deref())?;
                print_thresholds(&set);
            }
        },
        Commands::Validate(args) => handle_validate(args)?,
    }

    Ok(())
}

fn handle_run(args: RunArgs) -> Result<()> {
    let start = Instant::now();
    let doc = match &args.config {
        Some(path) => {
            let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
            RunConfigDoc::load(path)?.rebase(&base)
        }
        None => RunConfigDoc::default(),
    };
    let config = RunConfig::resolve(
        doc,
        ConfigOverrides {
            predictions: args.predictions,
            delimiter: args.delimiter,
            thresholds: args.thresholds,
            results_path: args.out,
            experiment_name: args.experiment,
            invalid_tiles: args.invalid_tiles,
        },
    )?;

    let classifier = PredictionTable::new(config.predictions.clone(), config.delimiter);
    let mut ctx = Ctx::new(config, Box::new(classifier), env!("CARGO_PKG_VERSION"));
    ctx.write_json = args.json;
    ctx.write_audit = args.audit;
    ctx.threads = args.threads;

    Pipeline::scoring().run(&mut ctx)?;

    print!("{}", io::summary::format_summary(&ctx)?);
    print_warnings(&ctx.warnings);
    println!("Time elapsed: {:.1} s", start.elapsed().as_secs_f64());
    Ok(())
}

fn handle_validate(args: ValidateArgs) -> Result<()> {
    let config = RunConfig::resolve(
        RunConfigDoc::default(),
        ConfigOverrides {
            predictions: Some(args.predictions),
            delimiter: args.delimiter,
            thresholds: args.thresholds,
            results_path: Some(PathBuf::from(".")),
            experiment_name: Some("validate".to_string()),
            invalid_tiles: args.invalid_tiles,
        },
    )?;
    let classifier = PredictionTable::new(config.predictions.clone(), config.delimiter);
    let mut ctx = Ctx::new(config, Box::new(classifier), env!("CARGO_PKG_VERSION"));
    ctx.write_outputs = false;

    let pipeline = Pipeline::new(vec![
        Box::new(Stage1Thresholds::new()),
        Box::new(Stage2Classify::new()),
        Box::new(Stage3Aggregate::new()),
        Box::new(Stage4Score::new()),
    ]);
    pipeline.run(&mut ctx)?;

    println!("kira-fibroqc validate ok");
    println!("tiles: {}", ctx.n_tiles_seen);
    println!("excluded: {}", ctx.excluded_tiles.len());
    println!("slides: {}", ctx.aggregates.len());
    print_warnings(&ctx.warnings);
    Ok(())
}

fn load_thresholds(path: Option<&Path>) -> Result<ThresholdSet> {
    match path {
        Some(p) => load_threshold_json(p),
        None => Ok(load_builtin()?),
    }
}

fn print_thresholds(set: &ThresholdSet) {
    println!("thresholds {} ({})", set.version, set.source);
    println!("score_name: {}", set.score_name);
    println!("order: {}", set.order.as_str());
    for rule in set.rules() {
        println!("{}\t{}", rule.stage, rule.predicate);
    }
    println!("fallback\t{}", set.fallback_stage);
}

fn print_warnings(warnings: &[String]) {
    if !warnings.is_empty() {
        println!("warnings:");
        for warning in warnings {
            println!("- {}", warning);
        }
    }
}
