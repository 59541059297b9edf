//! Command-line surface of the `voiceover` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DubConfig;

/// Dub a WAV file with synthesized speech for every subtitle cue.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Primary audio (WAV).
    pub input: PathBuf,

    /// Where to write the mixed audio (WAV).
    pub output: PathBuf,

    /// TOML file with defaults; flags below take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Subtitle file (.srt, .ass or .ssa).
    #[arg(short, long)]
    pub subtitle: Option<PathBuf>,

    /// Synthesis server base URL, e.g. `http://localhost:5002/api/tts?`.
    #[arg(long)]
    pub server: Option<String>,

    #[arg(long)]
    pub min_speed: Option<f64>,

    #[arg(long)]
    pub max_speed: Option<f64>,

    /// Gain applied to the synthesized speech.
    #[arg(long)]
    pub sub_volume: Option<f64>,

    /// Gain applied to the primary audio.
    #[arg(long)]
    pub aud_volume: Option<f64>,

    /// HTTP request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Primary frame length in samples per channel.
    #[arg(long)]
    pub frame_size: Option<usize>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut DubConfig) {
        if let Some(subtitle) = &self.subtitle {
            config.subtitle = subtitle.clone();
        }
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(v) = self.min_speed {
            config.min_speed = v;
        }
        if let Some(v) = self.max_speed {
            config.max_speed = v;
        }
        if let Some(v) = self.sub_volume {
            config.sub_volume = v;
        }
        if let Some(v) = self.aud_volume {
            config.aud_volume = v;
        }
        if let Some(v) = self.timeout {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.frame_size {
            config.frame_size = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "voiceover",
            "in.wav",
            "out.wav",
            "--subtitle",
            "subs.srt",
            "--server",
            "http://tts/?",
            "--max-speed",
            "2.0",
            "--sub-volume",
            "0.5",
        ]);
        let mut config = DubConfig {
            min_speed: 0.9,
            ..DubConfig::default()
        };
        cli.apply(&mut config);
        assert_eq!(config.subtitle, PathBuf::from("subs.srt"));
        assert_eq!(config.server, "http://tts/?");
        assert_eq!(config.min_speed, 0.9);
        assert_eq!(config.max_speed, 2.0);
        assert_eq!(config.sub_volume, 0.5);
        assert_eq!(config.aud_volume, 1.0);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
