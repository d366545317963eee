use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use creditrisk_classifiers::data_handling::TARGET_COLUMN;
use creditrisk_cli::evaluate::run_evaluation;
use creditrisk_cli::train::input::TrainConfig;
use creditrisk_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("CREDITRISK_LOG", "error,creditrisk=info"))
        .init();

    let matches = Command::new("creditrisk")
        .version(clap::crate_version!())
        .about("Credit-card default classifier: training and evaluation")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Clean the data, grid-search the pipeline, save the best model and report metrics")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file. Defaults are used when omitted.")
                        .required(false)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("train_data")
                        .short('d')
                        .long("train_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to training data (.csv or .csv.zip). Overrides the training data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("test_data")
                        .short('t')
                        .long("test_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to test data (.csv or .csv.zip). Overrides the test data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_output")
                        .short('o')
                        .long("model_output")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File path that the compressed model will be written to.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("metrics_output")
                        .short('m')
                        .long("metrics_output")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("File path that the JSON-lines metrics report will be written to.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("cv")
                        .long("cv")
                        .value_parser(clap::value_parser!(usize))
                        .help("Number of stratified cross-validation folds."),
                )
                .arg(
                    Arg::new("n_jobs")
                        .long("n-jobs")
                        .value_parser(clap::value_parser!(usize))
                        .help("Worker threads for the grid search. Defaults to all cores."),
                )
                .arg(
                    Arg::new("no_tracking")
                        .long("no-tracking")
                        .action(ArgAction::SetTrue)
                        .help("Do not record the run in the local experiment store."),
                )
                .arg(
                    Arg::new("no_report")
                        .long("no-report")
                        .action(ArgAction::SetTrue)
                        .help("Do not write the HTML summary next to the metrics report."),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Score a saved model on a labelled data file and print JSON-lines metrics")
                .arg(
                    Arg::new("model")
                        .long("model")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Path to a model written by `creditrisk train`.")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("data")
                        .long("data")
                        .required(true)
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Path to labelled data (.csv or .csv.zip).")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("target_column")
                        .long("target_column")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .default_value(TARGET_COLUMN)
                        .help("Label column after cleaning."),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", train_matches)) => handle_train(train_matches),
        Some(("evaluate", evaluate_matches)) => handle_evaluate(evaluate_matches),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    match config_path {
        Some(path) => log::info!("[creditrisk::train] Training from config: {:?}", path),
        None => eprintln!("[creditrisk::train] No config file provided; using defaults."),
    }

    let params = TrainConfig::from_arguments(config_path.map(|p| p.as_path()), matches)?;
    if config_path.is_none() {
        let default_json = serde_json::to_string_pretty(&params).unwrap_or_default();
        eprintln!("[creditrisk::train] Default config:\n{}", default_json);
    }

    match trainer::run_training(&params) {
        Ok(summary) => {
            log::info!(
                "[creditrisk::train] Best cv balanced_accuracy {:.4}, composite score {:.4}",
                summary.best_score,
                summary.composite_score
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let model_path: &String = matches.get_one("model").expect("required by clap");
    let data_path: &String = matches.get_one("data").expect("required by clap");
    let target_column: &String = matches.get_one("target_column").expect("has a default");

    match run_evaluation(model_path, data_path, target_column) {
        Ok(records) => {
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
            Ok(())
        }
        Err(e) => {
            log::error!("Evaluation failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
