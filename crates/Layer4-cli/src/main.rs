//! extrt CLI - Main entry point

mod inspect;
mod report;

use clap::{Parser, Subcommand};
use extrt_foundation::{ConfigLoader, RuntimeConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// extrt - inspect dynamic plugins and the extensions they contribute
#[derive(Parser, Debug)]
#[command(name = "extrt")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Additional settings file (.json or .toml), applied last
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Feature flag override, e.g. --flag ACME_ENABLED=true
    #[arg(short, long = "flag", value_parser = parse_flag, global = true)]
    flags: Vec<(String, bool)>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register plugins and print plugin status and the visible extensions
    Inspect {
        /// Plugin base URLs (serving plugin-manifest.json) or manifest files
        #[arg(required = true)]
        sources: Vec<String>,

        /// Only show extensions of this type (e.g. console.page/route)
        #[arg(short, long)]
        kind: Option<String>,

        /// Resolve code references and print the resolved properties
        #[arg(short, long)]
        resolve: bool,
    },

    /// Print the merged runtime configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging (stderr, so --json output stays clean)
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Command::Inspect {
            sources,
            kind,
            resolve,
        } => {
            let options = inspect::InspectOptions {
                sources,
                kind,
                resolve,
                json: args.json,
            };
            inspect::run(config, options).await
        }
        Command::Config => {
            report::print_config(&config, args.json)?;
            Ok(())
        }
    }
}

/// 설정 파일 + 명령행 flag 병합
fn load_config(args: &Args) -> anyhow::Result<RuntimeConfig> {
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut loader = ConfigLoader::new(&working_dir);
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }

    let mut config = loader.load()?;
    for (name, value) in &args.flags {
        config = config.with_flag(name.clone(), *value);
    }
    Ok(config)
}

/// `NAME=true|false` 파싱
fn parse_flag(s: &str) -> Result<(String, bool), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=true|false, got '{}'", s))?;

    let name = name.trim();
    if name.is_empty() {
        return Err("flag name is empty".to_string());
    }

    let value = match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => true,
        "false" | "0" | "off" | "no" => false,
        other => return Err(format!("invalid flag value '{}'", other)),
    };

    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("ACME=true").unwrap(), ("ACME".to_string(), true));
        assert_eq!(parse_flag(" B = off ").unwrap(), ("B".to_string(), false));
        assert!(parse_flag("ACME").is_err());
        assert!(parse_flag("=true").is_err());
        assert!(parse_flag("ACME=maybe").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "extrt",
            "inspect",
            "https://plugins.example.com/acme",
            "--flag",
            "A=true",
            "--resolve",
        ])
        .unwrap();

        assert_eq!(args.flags, vec![("A".to_string(), true)]);
        assert!(matches!(args.command, Command::Inspect { resolve: true, .. }));
    }
}
