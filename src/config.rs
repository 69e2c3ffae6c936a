use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::capture::rate::BoundaryPolicy;

// ---------- Capture ----------
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Screen,
    TestPattern,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: SourceKind,
    pub display_index: usize,
    pub target_rate: u32,
    pub retention_seconds: u32,
    pub boundary: BoundaryPolicy,
    pub wait_pause_ms: u64,
    pub test_pattern_width: u32,
    pub test_pattern_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Screen,
            display_index: 0,
            target_rate: 60,
            retention_seconds: 30,
            boundary: BoundaryPolicy::FixedStep,
            wait_pause_ms: 1,
            test_pattern_width: 640,
            test_pattern_height: 360,
        }
    }
}

impl CaptureConfig {
    pub fn capacity(&self) -> usize {
        self.target_rate as usize * self.retention_seconds as usize
    }
}

// ---------- Compression ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CompressionConfig {
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 1 }
    }
}

// ---------- Export ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub ffmpeg_bin: String,
    pub notify: bool,
    pub notify_title: String,
    pub notify_body: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            workers: 2,
            ffmpeg_bin: "ffmpeg".to_string(),
            notify: true,
            notify_title: "replaycap".to_string(),
            notify_body: "Clip stored".to_string(),
        }
    }
}

// ---------- Trigger ----------
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Keyboard,
    Stdin,
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TriggerConfig {
    pub kind: TriggerKind,
    /// Key name for `keyboard`, trigger word for `stdin`.
    pub key: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            kind: TriggerKind::Keyboard,
            key: "F9".to_string(),
        }
    }
}

// ---------- Monitoring ----------
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:3010".to_string(),
        }
    }
}

// ---------- Root ----------
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub compression: CompressionConfig,
    pub export: ExportConfig,
    pub trigger: TriggerConfig,
    pub monitoring: MonitoringConfig,
}

impl Config {
    pub fn from_toml(txt: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(txt)?;
        cfg.validate().context("config validation failed")?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.capture;
        if c.target_rate == 0 {
            bail!("capture.target_rate must be > 0");
        }
        if c.retention_seconds == 0 {
            bail!("capture.retention_seconds must be > 0");
        }
        if c.source == SourceKind::TestPattern
            && (c.test_pattern_width == 0 || c.test_pattern_height == 0)
        {
            bail!("capture.test_pattern_width/height must be > 0");
        }

        if !(1..=22).contains(&self.compression.level) {
            bail!(
                "compression.level must be within 1..=22 (got {})",
                self.compression.level
            );
        }

        let e = &self.export;
        if e.workers == 0 {
            bail!("export.workers must be > 0");
        }
        if e.output_dir.as_os_str().is_empty() {
            bail!("export.output_dir must not be empty");
        }
        if e.ffmpeg_bin.trim().is_empty() {
            bail!("export.ffmpeg_bin must not be empty");
        }

        if self.trigger.kind != TriggerKind::None && self.trigger.key.trim().is_empty() {
            bail!("trigger.key must not be empty");
        }

        if self.monitoring.enabled && self.monitoring.bind.trim().is_empty() {
            bail!("monitoring.bind must not be empty");
        }

        Ok(())
    }
}

// ---------- Loader ----------
/// Loads `path`. When the file is absent and `required` is false the
/// built-in defaults are used.
pub fn load(path: &Path, required: bool) -> anyhow::Result<Config> {
    if !path.exists() && !required {
        log::info!("[config] {} not found, using defaults", path.display());
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }

    let txt = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Config::from_toml(&txt).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.capture.target_rate, 60);
        assert_eq!(cfg.capture.retention_seconds, 30);
        assert_eq!(cfg.capture.capacity(), 1800);
        assert_eq!(cfg.capture.boundary, BoundaryPolicy::FixedStep);
        assert_eq!(cfg.export.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.trigger.kind, TriggerKind::Keyboard);
        assert!(!cfg.monitoring.enabled);
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let cfg = Config::from_toml(
            r#"
            [capture]
            source = "test_pattern"
            target_rate = 30
            retention_seconds = 10
            boundary = "reset_to_now"

            [export]
            output_dir = "/tmp/clips"
            workers = 4

            [trigger]
            kind = "stdin"
            key = "save"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.capture.source, SourceKind::TestPattern);
        assert_eq!(cfg.capture.capacity(), 300);
        assert_eq!(cfg.capture.boundary, BoundaryPolicy::ResetToNow);
        assert_eq!(cfg.capture.wait_pause_ms, 1);
        assert_eq!(cfg.export.workers, 4);
        assert_eq!(cfg.export.ffmpeg_bin, "ffmpeg");
        assert_eq!(cfg.trigger.kind, TriggerKind::Stdin);
        assert_eq!(cfg.trigger.key, "save");
    }

    #[test]
    fn test_rejects_zero_values() {
        for txt in [
            "[capture]\ntarget_rate = 0",
            "[capture]\nretention_seconds = 0",
            "[export]\nworkers = 0",
            "[compression]\nlevel = 0",
            "[trigger]\nkey = \"  \"",
        ] {
            assert!(Config::from_toml(txt).is_err(), "accepted: {}", txt);
        }
    }

    #[test]
    fn test_unknown_enum_value_is_an_error() {
        assert!(Config::from_toml("[capture]\nsource = \"webcam\"").is_err());
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load(&dir.path().join("absent.toml"), false).unwrap();
        assert_eq!(cfg.capture.target_rate, 60);
        assert!(load(&dir.path().join("absent.toml"), true).is_err());
    }
}
