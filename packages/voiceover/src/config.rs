//! Run configuration: TOML file, then command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use voiceover_backend::BackendConfig;

use crate::controller::PipelineOptions;
use crate::error::{DubError, Result};
use crate::mixer::Volumes;
use crate::speed::{DEFAULT_MAX_SPEED, DEFAULT_MIN_SPEED, SpeedBounds};

/// Accepted range for speeds and volumes.
pub const OPTION_RANGE: (f64, f64) = (0.0, 4.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DubConfig {
    /// Subtitle file providing the cues (`.srt`, `.ass`, `.ssa`).
    pub subtitle: PathBuf,
    /// Synthesis server base URL; `text=<encoded>` is appended verbatim.
    pub server: String,
    pub min_speed: f64,
    pub max_speed: f64,
    /// Gain of the synthesized speech.
    pub sub_volume: f64,
    /// Gain of the primary audio.
    pub aud_volume: f64,
    pub request_timeout_secs: u64,
    /// Primary frame length in samples per channel.
    pub frame_size: usize,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            subtitle: PathBuf::new(),
            server: String::new(),
            min_speed: DEFAULT_MIN_SPEED,
            max_speed: DEFAULT_MAX_SPEED,
            sub_volume: 1.0,
            aud_volume: 1.0,
            request_timeout_secs: 30,
            frame_size: 1024,
        }
    }
}

impl DubConfig {
    /// Load a TOML config from disk; missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| DubError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if self.subtitle.as_os_str().is_empty() {
            return Err(DubError::Config("no subtitle file specified".into()));
        }
        if self.server.trim().is_empty() {
            return Err(DubError::Config("no synthesis server specified".into()));
        }

        let (lo, hi) = OPTION_RANGE;
        for (name, value) in [
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
            ("sub_volume", self.sub_volume),
            ("aud_volume", self.aud_volume),
        ] {
            if !(lo..=hi).contains(&value) {
                return Err(DubError::Config(format!(
                    "{name} = {value} is outside [{lo}, {hi}]"
                )));
            }
        }
        if self.min_speed > self.max_speed {
            return Err(DubError::Config(format!(
                "min_speed {} exceeds max_speed {}",
                self.min_speed, self.max_speed
            )));
        }
        if self.frame_size == 0 {
            return Err(DubError::Config("frame_size must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(DubError::Config("request_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn bounds(&self) -> SpeedBounds {
        SpeedBounds::new(self.min_speed, self.max_speed)
    }

    pub fn volumes(&self) -> Volumes {
        Volumes {
            aud_volume: self.aud_volume,
            sub_volume: self.sub_volume,
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            timeout: Duration::from_secs(self.request_timeout_secs),
            ..BackendConfig::default()
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            server: self.server.clone(),
            bounds: self.bounds(),
            volumes: self.volumes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> DubConfig {
        DubConfig {
            subtitle: "subs.srt".into(),
            server: "http://localhost:5002/api/tts?".into(),
            ..DubConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DubConfig::default();
        assert_eq!(config.min_speed, 1.0);
        assert_eq!(config.max_speed, 1.4);
        assert_eq!(config.sub_volume, 1.0);
        assert_eq!(config.aud_volume, 1.0);
        assert_eq!(config.frame_size, 1024);
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_subtitle_or_server_rejected() {
        let mut config = valid();
        config.subtitle = PathBuf::new();
        assert!(matches!(config.validate(), Err(DubError::Config(_))));

        let mut config = valid();
        config.server = "  ".into();
        assert!(matches!(config.validate(), Err(DubError::Config(_))));
    }

    #[test]
    fn test_ranges_enforced() {
        let mut config = valid();
        config.sub_volume = 4.5;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.min_speed = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.frame_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.aud_volume = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server = \"http://tts.local/?\"\nsub_volume = 0.5").unwrap();
        let config = DubConfig::load(file.path()).unwrap();
        assert_eq!(config.server, "http://tts.local/?");
        assert_eq!(config.sub_volume, 0.5);
        assert_eq!(config.max_speed, 1.4);
        assert!(config.subtitle.as_os_str().is_empty());
    }

    #[test]
    fn test_bad_toml_is_a_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_speed = \"fast\"").unwrap();
        assert!(matches!(
            DubConfig::load(file.path()),
            Err(DubError::Config(_))
        ));
    }
}
