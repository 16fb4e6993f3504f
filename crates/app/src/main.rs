use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tillscan_config::{find_chain_for_merchant, ConfigCache};
use tillscan_core::Fragment;
use tillscan_pipeline::parse_receipt;

const USAGE: &str = "\
Usage: tillscan <fragments.json> [options]

Reconstructs a structured receipt from OCR fragments and prints the
parse result as JSON on stdout.

Options:
  --config-dir <DIR>   Directory of per-chain store configs (*.toml)
  --chain <CHAIN_ID>   Chain id to load from the config directory
  --merchant <NAME>    Resolve the chain by merchant name instead
";

struct Args {
    fragments_path: PathBuf,
    config_dir: Option<PathBuf>,
    chain: Option<String>,
    merchant: Option<String>,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args> {
    let mut fragments_path = None;
    let mut config_dir = None;
    let mut chain = None;
    let mut merchant = None;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--config-dir" => {
                config_dir = Some(PathBuf::from(
                    argv.next().context("--config-dir requires a value")?,
                ));
            }
            "--chain" => chain = Some(argv.next().context("--chain requires a value")?),
            "--merchant" => merchant = Some(argv.next().context("--merchant requires a value")?),
            "--help" | "-h" => bail!("{USAGE}"),
            other if other.starts_with('-') => bail!("unknown option '{other}'\n\n{USAGE}"),
            other if fragments_path.is_none() => fragments_path = Some(PathBuf::from(other)),
            other => bail!("unexpected argument '{other}'\n\n{USAGE}"),
        }
    }

    Ok(Args {
        fragments_path: fragments_path.with_context(|| USAGE.to_string())?,
        config_dir,
        chain,
        merchant,
    })
}

fn run(args: Args) -> Result<()> {
    let raw = std::fs::read_to_string(&args.fragments_path)
        .with_context(|| format!("reading {}", args.fragments_path.display()))?;
    let fragments: Vec<Fragment> =
        serde_json::from_str(&raw).context("parsing fragments JSON")?;

    let config = match &args.config_dir {
        Some(dir) => {
            let cache = ConfigCache::new(dir);
            let chain = args.chain.clone().or_else(|| {
                args.merchant
                    .as_deref()
                    .and_then(|m| find_chain_for_merchant(dir, m))
            });
            match chain {
                Some(chain_id) => match cache.get(&chain_id) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        // Config trouble never blocks a parse; fall back
                        // to the universal rules.
                        tracing::warn!(error = %e, "store config unavailable; using defaults");
                        None
                    }
                },
                None => None,
            }
        }
        None => None,
    };

    let result = parse_receipt(fragments, config.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
