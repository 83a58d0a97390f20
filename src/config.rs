//! Configuration for the chord feature pipelines and scoring

use crate::stages::ShiftMode;
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    /// Base seed for the stochastic stages; entropy-seeded when absent
    pub seed: Option<u64>,
    pub augment: AugmentConfig,
    pub labels: LabelConfig,
    pub contrastive: ContrastiveConfig,
    pub corruption: CorruptionConfig,
    pub window: WindowConfig,
    pub decode: DecodeConfig,
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            seed: None,
            augment: AugmentConfig::default(),
            labels: LabelConfig::default(),
            contrastive: ContrastiveConfig::default(),
            corruption: CorruptionConfig::default(),
            window: WindowConfig::default(),
            decode: DecodeConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Pitch-shift augmentation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    pub enabled: bool,
    pub mode: AugmentMode,
    /// Shifts are drawn from `[-max_pitch_shift, max_pitch_shift)`
    pub max_pitch_shift: i32,
    pub bins_per_pitch: usize,
    /// Value for vacated bins in `pad` mode
    pub fill_value: f32,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: AugmentMode::Circular,
            max_pitch_shift: 6,
            bins_per_pitch: 3,
            fill_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AugmentMode {
    Circular,
    Pad,
}

impl AugmentConfig {
    pub fn shift_mode(&self) -> ShiftMode {
        match self.mode {
            AugmentMode::Circular => ShiftMode::Circular,
            AugmentMode::Pad => ShiftMode::Pad {
                fill_value: self.fill_value,
            },
        }
    }
}

/// Training target derived from each chord label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    ChordIndex,
    QualityIndex,
    JointIndex,
    Chroma,
    Tonnetz,
    TonnetzDistance,
    Affinity,
    OneHot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Vocabulary size: 25, 61 or 157
    pub vocab_dim: usize,
    pub target: TargetKind,
    pub chroma_bins_per_pitch: usize,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            vocab_dim: 157,
            target: TargetKind::ChordIndex,
            chroma_bins_per_pitch: 1,
        }
    }
}

/// Contrastive pair unpacking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContrastiveConfig {
    /// Probability of rotating the negative onto the positive's root.
    /// Must be set explicitly before building a contrastive stream.
    pub rotate_prob: Option<f64>,
    pub min_val: f32,
    pub max_val: f32,
    pub bins_per_pitch: usize,
}

impl Default for ContrastiveConfig {
    fn default() -> Self {
        Self {
            rotate_prob: None,
            min_val: 0.0,
            max_val: 1.0,
            bins_per_pitch: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorruptionConfig {
    pub mask: MaskConfig,
    pub noise: NoiseConfig,
    pub frame_dropout: FrameDropoutConfig,
}

/// Elementwise binomial dropout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub enabled: bool,
    pub max_dropout: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_dropout: 0.25,
        }
    }
}

/// Additive Gaussian noise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub enabled: bool,
    pub mu: f64,
    pub sigma: f64,
    pub scale_sigma: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mu: 0.0,
            sigma: 0.1,
            scale_sigma: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameDropoutConfig {
    pub enabled: bool,
    pub max_dropout: f64,
}

impl Default for FrameDropoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_dropout: 0.1,
        }
    }
}

/// Contextual windowing of `[1, T, F]` features
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub enabled: bool,
    pub length: usize,
    pub stride: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            length: 40,
            stride: 36,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DecodeConfig {
    /// Log-scale off-diagonal transition penalty
    pub penalty: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub top_k: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    if !matches!(config.labels.vocab_dim, 25 | 61 | 157) {
        anyhow::bail!(
            "vocab_dim must be one of 25, 61, 157 (got {})",
            config.labels.vocab_dim
        );
    }
    if config.augment.max_pitch_shift < 0 {
        anyhow::bail!("max_pitch_shift must be >= 0");
    }
    if config.augment.bins_per_pitch == 0 || config.contrastive.bins_per_pitch == 0 {
        anyhow::bail!("bins_per_pitch must be positive");
    }
    if config.labels.chroma_bins_per_pitch == 0 {
        anyhow::bail!("chroma_bins_per_pitch must be positive");
    }

    if let Some(p) = config.contrastive.rotate_prob {
        if !(0.0..=1.0).contains(&p) {
            anyhow::bail!("rotate_prob must be within [0, 1] (got {})", p);
        }
    }
    if config.contrastive.min_val > config.contrastive.max_val {
        anyhow::bail!("contrastive min_val must be <= max_val");
    }

    let corruption = &config.corruption;
    for (name, rate) in [
        ("mask.max_dropout", corruption.mask.max_dropout),
        ("frame_dropout.max_dropout", corruption.frame_dropout.max_dropout),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("{} must be within [0, 1] (got {})", name, rate);
        }
    }
    if !(corruption.noise.sigma >= 0.0 && corruption.noise.scale_sigma >= 0.0) {
        anyhow::bail!("noise sigmas must be non-negative");
    }

    if config.window.enabled && (config.window.length == 0 || config.window.stride == 0) {
        anyhow::bail!("window length and stride must be positive");
    }
    if !config.decode.penalty.is_finite() {
        anyhow::bail!("decode penalty must be finite");
    }
    if config.scoring.top_k == 0 {
        anyhow::bail!("top_k must be positive");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
