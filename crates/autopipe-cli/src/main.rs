//! autopipe command-line driver
//!
//! Creates a pipeline for a task, drives it on a background task, polls its
//! state for progress lines, and prints the final report.

mod config;

use anyhow::{Context, Result};
use autopipe_core::{PipelineConfig, PipelineEngine, PipelineStatus, Stage};
use autopipe_http::HttpTaskExecutor;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::CliConfig;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Path to a TOML config file with [engine] and [executor] tables");

    Command::new("autopipe")
        .version(autopipe_core::VERSION)
        .about("Staged pipeline engine for autonomous task completion")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("run")
                .about("Run a task through every stage")
                .arg(
                    Arg::new("task")
                        .long("task")
                        .required(true)
                        .help("High-level task description"),
                )
                .arg(
                    Arg::new("context")
                        .long("context")
                        .help("Extra context passed to every stage"),
                )
                .arg(config_arg.clone())
                .arg(
                    Arg::new("max-retries")
                        .long("max-retries")
                        .value_parser(value_parser!(u32))
                        .help("Retries per stage after the first attempt"),
                )
                .arg(
                    Arg::new("no-retry")
                        .long("no-retry")
                        .action(ArgAction::SetTrue)
                        .help("Give each stage a single attempt"),
                )
                .arg(
                    Arg::new("stage-timeout-secs")
                        .long("stage-timeout-secs")
                        .value_parser(value_parser!(u64).range(1..))
                        .help("Per-attempt timeout in seconds"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(config_arg),
        )
}

/// Per-run overrides taken from the command line
#[derive(Debug, Clone, Default, PartialEq)]
struct RunOptions {
    task: String,
    context: Option<String>,
    max_retries: Option<u32>,
    no_retry: bool,
    stage_timeout: Option<Duration>,
    json: bool,
}

impl RunOptions {
    fn from_matches(args: &ArgMatches) -> Self {
        Self {
            task: args.get_one::<String>("task").cloned().unwrap_or_default(),
            context: args.get_one::<String>("context").cloned(),
            max_retries: args.get_one::<u32>("max-retries").copied(),
            no_retry: args.get_flag("no-retry"),
            stage_timeout: args
                .get_one::<u64>("stage-timeout-secs")
                .map(|secs| Duration::from_secs(*secs)),
            json: args.get_flag("json"),
        }
    }

    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(context) = &self.context {
            config = config.with_context(context.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retries(max_retries);
        }
        if self.no_retry {
            config = config.with_auto_retry(false);
        }
        if let Some(timeout) = self.stage_timeout {
            config = config.with_stage_timeout(timeout);
        }
        config
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // logs go to stderr so stdout carries only the report
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn progress_line(progress: u8, status: PipelineStatus, stage: Option<Stage>) -> String {
    match stage {
        Some(stage) if status == PipelineStatus::Running => {
            format!("[{progress:>3}%] {status}: {stage} ({})", stage.role())
        }
        _ => format!("[{progress:>3}%] {status}"),
    }
}

async fn run(config: CliConfig, options: RunOptions) -> Result<bool> {
    let executor = HttpTaskExecutor::new(config.executor.clone())
        .context("failed to build HTTP executor")?;
    let engine = PipelineEngine::with_config(Arc::new(executor), config.engine.clone());

    let pipeline_config = options.apply(engine.pipeline_config(options.task.clone()));
    let id = engine.create(pipeline_config)?.id();
    eprintln!("Pipeline {} created", id);

    let mut driver = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.execute(id).await })
    };

    let mut ticker = tokio::time::interval(engine.engine_config().poll_interval());
    let mut last_line = String::new();
    let outcome = loop {
        tokio::select! {
            joined = &mut driver => break joined.context("pipeline task panicked")?,
            _ = ticker.tick() => {
                if let Some(snapshot) = engine.get_state(id) {
                    let line = progress_line(snapshot.progress(), snapshot.status(), snapshot.current_stage());
                    if line != last_line {
                        eprintln!("{}", line);
                        last_line = line;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(pipeline_id = %id, "Interrupted, cancelling pipeline");
                engine.cancel(id)?;
            }
        }
    };

    if let Err(e) = &outcome {
        tracing::error!(pipeline_id = %id, "Pipeline did not complete: {}", e);
    }

    let report = engine
        .generate_report(id)
        .context("pipeline disappeared before its report was generated")?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }

    Ok(report.status == PipelineStatus::Completed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = CliConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
            let completed = run(config, RunOptions::from_matches(args)).await?;

            std::process::exit(if completed { 0 } else { 1 });
        }
        Some(("config", args)) => {
            let config = CliConfig::load(args.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
            print!("{}", config.to_toml()?);
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_options(argv: &[&str]) -> RunOptions {
        let matches = cli().try_get_matches_from(argv).unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "run");
        RunOptions::from_matches(args)
    }

    #[test]
    fn run_flags_are_parsed() {
        let options = run_options(&[
            "autopipe",
            "run",
            "--task",
            "build a login form",
            "--context",
            "use rust",
            "--max-retries",
            "2",
            "--stage-timeout-secs",
            "30",
            "--json",
        ]);

        assert_eq!(
            options,
            RunOptions {
                task: "build a login form".to_string(),
                context: Some("use rust".to_string()),
                max_retries: Some(2),
                no_retry: false,
                stage_timeout: Some(Duration::from_secs(30)),
                json: true,
            }
        );
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let options = run_options(&["autopipe", "run", "--task", "t", "--no-retry", "--max-retries", "5"]);
        let config = options.apply(PipelineConfig::new("t"));

        assert_eq!(config.max_retries, 5);
        assert!(!config.auto_retry);
        assert_eq!(config.retry_budget(), 0);
        assert_eq!(config.stage_timeout, PipelineConfig::DEFAULT_STAGE_TIMEOUT);
        assert_eq!(config.context, None);
    }

    #[test]
    fn task_is_required_and_timeout_positive() {
        assert!(cli().try_get_matches_from(["autopipe", "run"]).is_err());
        assert!(cli()
            .try_get_matches_from(["autopipe", "run", "--task", "t", "--stage-timeout-secs", "0"])
            .is_err());
        assert!(cli().try_get_matches_from(["autopipe"]).is_err());
    }

    #[test]
    fn log_json_is_global() {
        let matches = cli()
            .try_get_matches_from(["autopipe", "config", "--log-json"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
    }

    #[test]
    fn progress_lines() {
        assert_eq!(
            progress_line(40, PipelineStatus::Running, Some(Stage::Coding)),
            "[ 40%] running: coding (Software Developer)"
        );
        assert_eq!(
            progress_line(100, PipelineStatus::Completed, None),
            "[100%] completed"
        );
        assert_eq!(
            progress_line(20, PipelineStatus::Failed, Some(Stage::Design)),
            "[ 20%] failed"
        );
    }
}
