use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level when RUST_LOG is unset: error, warn, info, debug, trace
    pub log_level: String,
    /// Pretty-print JSON output
    pub pretty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Mounts table to read when sampling the local host
    pub mounts_path: PathBuf,
    /// Ignore /dev/loop* devices (snaps, mounted images)
    pub skip_loop_devices: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Server UUID stamped into metrics submissions. Empty = unset.
    pub server_uuid: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_level: "info".into(), pretty: true }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { mounts_path: PathBuf::from("/proc/mounts"), skip_loop_devices: true }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    /// Load from `path`, or the default location when `None`.
    /// Falls back to defaults on any error; a missing default file is created.
    ///
    /// Runs before logging is set up, so problems come back as a message
    /// for the caller to log once it can.
    pub fn load(path: Option<&Path>) -> (Self, Option<String>) {
        let path = match path.map(Path::to_path_buf).or_else(Config::config_path) {
            Some(p) => p,
            None    => return (Config::default(), None),
        };
        match try_load(&path) {
            Ok(c)  => (c, None),
            Err(e) => {
                let note = if path.exists() {
                    Some(format!("config {} unreadable, using defaults: {:#}", path.display(), e))
                } else {
                    try_write_defaults(&path).err().map(|e| {
                        format!("could not write default config {}: {:#}", path.display(), e)
                    })
                };
                (Config::default(), note)
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("diskagg").join("diskagg.toml"))
    }
}

fn try_load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# diskagg configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}
