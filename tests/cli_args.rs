use clap::Parser;
use kira_fibroqc::cli::{Cli, Commands, ThresholdsCommand};
use kira_fibroqc::config::InvalidTilePolicy;
use kira_fibroqc::io::Delimiter;

#[test]
fn run_flags_default_off() {
    let cli = Cli::parse_from(["kira-fibroqc", "run", "-c", "run.yaml"]);
    match cli.command {
        Commands::Run(args) => {
            assert!(!args.json);
            assert!(!args.audit);
            assert_eq!(args.threads, 0);
            assert_eq!(args.invalid_tiles, None);
            assert_eq!(args.delimiter, None);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn run_overrides_are_parsed() {
    let cli = Cli::parse_from([
        "kira-fibroqc",
        "run",
        "--predictions",
        "tiles.tsv",
        "--out",
        "out",
        "--experiment",
        "e1",
        "--delimiter",
        "tab",
        "--invalid-tiles",
        "exclude",
        "--threads",
        "1",
    ]);
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.experiment.as_deref(), Some("e1"));
            assert_eq!(args.delimiter, Some(Delimiter::Tab));
            assert_eq!(args.invalid_tiles, Some(InvalidTilePolicy::Exclude));
            assert_eq!(args.threads, 1);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn thresholds_show_accepts_a_file() {
    let cli = Cli::parse_from(["kira-fibroqc", "thresholds", "show", "--thresholds", "t.json"]);
    match cli.command {
        Commands::Thresholds(args) => match args.command {
            ThresholdsCommand::Show(show) => assert!(show.thresholds.is_some()),
        },
        _ => panic!("expected thresholds command"),
    }
}

#[test]
fn validate_requires_predictions() {
    assert!(Cli::try_parse_from(["kira-fibroqc", "validate"]).is_err());
}
