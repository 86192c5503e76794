use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::detect::DetectorFamily;
use crate::identity::{Metric, DEFAULT_MATCH_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub hashing: HashingConfig,
}

/// Identity-resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_metric_kind")]
    pub metric: MetricKind,

    /// Cosine similarity floor for attaching to an existing identity.
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Euclidean distance ceiling, used when `metric = "euclidean"`.
    #[serde(default = "default_distance_ceiling")]
    pub distance_ceiling: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Cosine,
    Euclidean,
}

fn default_metric_kind() -> MetricKind {
    MetricKind::Cosine
}

fn default_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

fn default_distance_ceiling() -> f32 {
    1.0
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            metric: default_metric_kind(),
            match_threshold: default_match_threshold(),
            distance_ceiling: default_distance_ceiling(),
        }
    }
}

impl MatchingConfig {
    pub fn metric(&self) -> Metric {
        match self.metric {
            MetricKind::Cosine => Metric::Cosine {
                threshold: self.match_threshold,
            },
            MetricKind::Euclidean => Metric::Euclidean {
                ceiling: self.distance_ceiling,
            },
        }
    }
}

/// Detection post-processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Which detector family the configured backend belongs to.
    #[serde(default)]
    pub family: DetectorFamily,

    /// Overlap percentage above which the cascade variant drops a box.
    #[serde(default = "default_overlap_threshold_pct")]
    pub overlap_threshold_pct: f64,

    /// IoU above which the YOLO variant drops the lower-scored box.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
}

fn default_overlap_threshold_pct() -> f64 {
    90.0
}

fn default_iou_threshold() -> f32 {
    0.3
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            family: DetectorFamily::default(),
            overlap_threshold_pct: default_overlap_threshold_pct(),
            iou_threshold: default_iou_threshold(),
        }
    }
}

/// Perceptual-hash comparison settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashingConfig {
    /// Hamming distance at or below which two photos count as
    /// near-duplicates. Distances under 4 stay on the indexed
    /// slice-prefilter path.
    #[serde(default = "default_duplicate_distance")]
    pub duplicate_distance: u32,
}

fn default_duplicate_distance() -> u32 {
    3
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            duplicate_distance: default_duplicate_distance(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lumidex")
        .join("lumidex.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            matching: MatchingConfig::default(),
            detection: DetectionConfig::default(),
            hashing: HashingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lumidex")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.matching.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(parsed.detection.overlap_threshold_pct, 90.0);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.hashing.duplicate_distance, 3);
        assert_eq!(parsed.matching.metric, MetricKind::Cosine);
    }

    #[test]
    fn metric_kind_selects_contract() {
        let mut matching = MatchingConfig::default();
        assert!(matches!(matching.metric(), Metric::Cosine { threshold } if threshold == 0.5));
        matching.metric = MetricKind::Euclidean;
        assert!(matches!(matching.metric(), Metric::Euclidean { ceiling } if ceiling == 1.0));
    }
}
