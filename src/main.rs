//! snaplab CLI
//!
//! Command-line front end for sandbox lifecycle and time-travel recovery.

use std::path::PathBuf;
use std::process::ExitCode;

use snaplab::catalog::SnapshotCatalog;
use snaplab::sandbox::SandboxManager;
use snaplab::timetravel::{FileRestorer, TimeTravelBrowser};
use snaplab::zfs::CliZfs;
use snaplab::{Config, Error};

const DEFAULT_CONFIG_PATH: &str = "/etc/snaplab.toml";

fn usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  create <dataset> [name]                      Create a sandbox clone of a dataset");
    eprintln!("  list                                         List active sandboxes");
    eprintln!("  destroy <sandbox>                            Destroy a sandbox and its base snapshot");
    eprintln!("  versions <dataset>                           List a dataset's snapshots");
    eprintln!("  browse <snapshot> [path] [--ignore <pats>]   Browse files inside a snapshot");
    eprintln!("  restore <snapshot> <source> [dest] [--overwrite]");
    eprintln!("                                               Restore a single file from a snapshot");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  SNAPLAB_CONFIG   Config file path (default: {})", DEFAULT_CONFIG_PATH);
    eprintln!("  RUST_LOG         Log filter (default: info)");
}

fn load_config() -> Result<Config, Error> {
    let path = std::env::var("SNAPLAB_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    Config::load_or_default(&path)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to render output: {}", e),
    }
}

async fn run(args: &[String]) -> Result<(), Error> {
    let config = load_config()?;
    let engine = CliZfs::with_options(&config.zfs_path, config.command_timeout());

    match args[0].as_str() {
        "create" => {
            let dataset = args
                .get(1)
                .ok_or_else(|| Error::Validation("create requires a dataset".to_string()))?;
            let name = args.get(2).map(String::as_str);
            let created = SandboxManager::new(engine).create(dataset, name).await?;
            print_json(&created);
        }
        "list" => {
            let sandboxes = SandboxManager::new(engine).list().await?;
            print_json(&sandboxes);
        }
        "destroy" => {
            let sandbox = args
                .get(1)
                .ok_or_else(|| Error::Validation("destroy requires a sandbox id".to_string()))?;
            let outcome = SandboxManager::new(engine).destroy(sandbox).await?;
            print_json(&outcome);
        }
        "versions" => {
            let dataset = args
                .get(1)
                .ok_or_else(|| Error::Validation("versions requires a dataset".to_string()))?;
            let versions = SnapshotCatalog::new(engine).list(dataset).await?;
            print_json(&versions);
        }
        "browse" => {
            let snapshot = args
                .get(1)
                .ok_or_else(|| Error::Validation("browse requires a snapshot".to_string()))?;
            let mut path = "/";
            let mut ignore_patterns = Vec::new();
            let mut rest = args[2..].iter();
            while let Some(arg) = rest.next() {
                if arg == "--ignore" {
                    let pats = rest.next().ok_or_else(|| {
                        Error::Validation("--ignore requires a pattern list".to_string())
                    })?;
                    ignore_patterns = pats
                        .split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect();
                } else {
                    path = arg;
                }
            }
            let result = TimeTravelBrowser::new(engine)
                .browse(snapshot, path, &ignore_patterns)
                .await?;
            print_json(&result);
        }
        "restore" => {
            let snapshot = args
                .get(1)
                .ok_or_else(|| Error::Validation("restore requires a snapshot".to_string()))?;
            let mut positional = Vec::new();
            let mut overwrite = false;
            for arg in &args[2..] {
                if arg == "--overwrite" {
                    overwrite = true;
                } else {
                    positional.push(arg.as_str());
                }
            }
            let source = *positional
                .first()
                .ok_or_else(|| Error::Validation("restore requires a source path".to_string()))?;
            let dest = positional.get(1).copied();
            let outcome = FileRestorer::new(engine)
                .restore(snapshot, source, dest, overwrite)
                .await?;
            print_json(&outcome);
        }
        unknown => {
            return Err(Error::Validation(format!("unknown command '{}'", unknown)));
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        return ExitCode::FAILURE;
    }

    match run(&args[1..]).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
