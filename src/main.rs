use anyhow::{Context, Result};
use clap::Parser;
use diskagg::aggregate::{self, validation_issues};
use diskagg::collectors::filesystem;
use diskagg::config::Config;
use diskagg::models::filesystem::{DiskUsageAggregate, FilesystemSample, MetricsRequest};
use diskagg::util::{logging, report};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "diskagg", about = "Aggregate per-filesystem disk usage into one host summary", version)]
struct Cli {
    /// Read samples from a JSON file ("-" for stdin) instead of the local host.
    /// Accepts an array of samples or a metrics request object.
    #[arg(short, long)]
    input: Option<String>,

    /// Print a full metrics request (samples + aggregate) instead of the aggregate alone
    #[arg(long)]
    request: bool,

    /// Validate an aggregate JSON file ("-" for stdin): exit 0=valid, 1=invalid
    #[arg(long, value_name = "FILE")]
    validate: Option<String>,

    /// Print a human-readable disk usage report and exit
    #[arg(long)]
    report: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    print_config: bool,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "FILE")]
    config_path: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// What `--input` may contain.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Input {
    Samples(Vec<FilesystemSample>),
    Request(MetricsRequest),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (cfg, config_note) = Config::load(cli.config_path.as_deref());
    logging::init(&cfg.general.log_level, cli.verbose);
    if let Some(note) = &config_note {
        warn!("{}", note);
    }

    if cli.print_config {
        return run_print_config(&cfg, cli.config_path.as_deref());
    }
    if let Some(src) = &cli.validate {
        return run_validate(src);
    }

    let request = load_request(cli.input.as_deref(), &cfg)?;
    let agg = aggregate::aggregate_disk_usage_from_request(Some(&request));
    info!(
        filesystems = agg.filesystem_count,
        used_pct = agg.used_percent,
        critical = agg.critical_mounts.len(),
        "aggregated disk usage"
    );

    if cli.report {
        let samples = request.filesystems.as_deref().unwrap_or_default();
        print!("{}", report::generate(samples, &agg));
        return Ok(());
    }
    if cli.request {
        let request = MetricsRequest { disk_usage: Some(agg), ..request };
        return print_json(&request, cfg.general.pretty);
    }
    print_json(&agg, cfg.general.pretty)
}

/// Build the request to aggregate, from `--input` or the local mounts table.
fn load_request(input: Option<&str>, cfg: &Config) -> Result<MetricsRequest> {
    let mut request = match input {
        Some(src) => match parse_input(&read_source(src)?)? {
            Input::Samples(s) => MetricsRequest { filesystems: Some(s), ..Default::default() },
            Input::Request(r) => r,
        },
        None => {
            let samples = filesystem::read_samples(
                &cfg.collector.mounts_path,
                cfg.collector.skip_loop_devices,
            )?;
            MetricsRequest { filesystems: Some(samples), ..Default::default() }
        }
    };
    if request.server_uuid.is_empty() {
        request.server_uuid = cfg.output.server_uuid.clone();
    }
    if request.collected_at.is_empty() {
        request.collected_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    }
    Ok(request)
}

fn parse_input(text: &str) -> Result<Input> {
    serde_json::from_str(text).context("input is neither a sample array nor a metrics request")
}

fn read_source(src: &str) -> Result<String> {
    if src == "-" {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).context("reading stdin")?;
        return Ok(s);
    }
    std::fs::read_to_string(src).with_context(|| format!("reading {}", src))
}

fn run_validate(src: &str) -> Result<()> {
    let agg: DiskUsageAggregate = serde_json::from_str(&read_source(src)?)
        .context("input is not a disk usage aggregate")?;
    let issues = validation_issues(&agg);
    if issues.is_empty() {
        println!("OK — aggregate of {} filesystem(s) is consistent", agg.filesystem_count);
        std::process::exit(0);
    }
    for issue in &issues {
        warn!("{}", issue.label());
        println!("[INVALID] {}", issue.label());
    }
    std::process::exit(1);
}

fn run_print_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(Config::config_path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    let uuid = if cfg.output.server_uuid.is_empty() { "(not set)" } else { cfg.output.server_uuid.as_str() };
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  log_level         = {}", cfg.general.log_level);
    println!("  pretty            = {}", cfg.general.pretty);
    println!();
    println!("[collector]");
    println!("  mounts_path       = {}", cfg.collector.mounts_path.display());
    println!("  skip_loop_devices = {}", cfg.collector.skip_loop_devices);
    println!();
    println!("[output]");
    println!("  server_uuid       = {}", uuid);
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_accepts_sample_array() {
        let text = r#"[{"filesystem":"ext4","mountpoint":"/","total_bytes":1000,
                        "used_bytes":600,"free_bytes":400,"usage_percent":60.0}]"#;
        match parse_input(text).unwrap() {
            Input::Samples(s) => assert_eq!(s[0].mountpoint, "/"),
            Input::Request(_) => panic!("expected samples"),
        }
    }

    #[test]
    fn input_accepts_request_object() {
        let text = r#"{"server_uuid":"srv-1","filesystems":[]}"#;
        match parse_input(text).unwrap() {
            Input::Request(r) => {
                assert_eq!(r.server_uuid, "srv-1");
                assert_eq!(r.filesystems, Some(vec![]));
            }
            Input::Samples(_) => panic!("expected request"),
        }
        assert!(parse_input("42").is_err());
    }

    #[test]
    fn load_request_fills_identity_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.json");
        std::fs::write(&path, r#"[{"filesystem":"tmpfs","mountpoint":"/run","total_bytes":5}]"#).unwrap();

        let mut cfg = Config::default();
        cfg.output.server_uuid = "srv-9".into();
        let req = load_request(path.to_str(), &cfg).unwrap();
        assert_eq!(req.server_uuid, "srv-9");
        assert!(!req.collected_at.is_empty());
        assert_eq!(req.filesystems.as_ref().map(Vec::len), Some(1));

        let agg = aggregate::aggregate_disk_usage_from_request(Some(&req));
        assert_eq!(agg.filesystem_count, 0);
    }
}
