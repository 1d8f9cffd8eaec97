//! Application configuration

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub ensemble: EnsembleConfig,
    pub video: VideoConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Base path of the chunked NudeNet artifact (`<base>.0`, `<base>.1`, ...).
    pub nudenet: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Raw (pre-normalization) weight of the NudeNet detector.
    pub nudenet_weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg binary used for frame extraction.
    pub ffmpeg: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            nudenet: PathBuf::from("models/nudenet/640m.onnx"),
        }
    }
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self { nudenet_weight: 1.0 }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "nsfwscan.toml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.ensemble.nudenet_weight, 1.0);
        assert_eq!(config.video.ffmpeg, PathBuf::from("ffmpeg"));
    }

    #[test]
    fn partial_toml_overrides_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [models]
            nudenet = "/opt/models/640m.onnx"
            "#,
        )
        .unwrap();

        assert_eq!(config.models.nudenet, PathBuf::from("/opt/models/640m.onnx"));
        assert_eq!(config.ensemble.nudenet_weight, 1.0);
    }
}
