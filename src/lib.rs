//! Chord Feature Pipelines
//!
//! Data augmentation and training-target derivation for chord recognition
//! from constant-Q features, plus Viterbi decoding, boundary pooling and
//! offline scoring of chord estimations.

pub mod config;
pub mod entity;
pub mod error;
pub mod labels;
pub mod pooling;
pub mod scoring;
pub mod stages;
pub mod util;
pub mod viterbi;

pub use config::{Config, TargetKind};
pub use entity::{Entity, Field, Sample};
pub use error::{ChordError, Result as ChordResult};
pub use labels::{ChordVocabulary, HarteVocabulary};
pub use pooling::{boundary_pool, PoolFunc};
pub use viterbi::viterbi;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

const SHIFT_STREAM: u64 = 0;
const MASK_STREAM: u64 = 1;
const NOISE_STREAM: u64 = 2;
const FRAME_STREAM: u64 = 3;
const CONTRASTIVE_STREAM: u64 = 4;

type SampleStream<'a> = Box<dyn Iterator<Item = Sample> + 'a>;

/// Pipelines configured from a [`Config`]
pub struct ChordPipeline {
    config: Config,
    vocab: HarteVocabulary,
}

impl ChordPipeline {
    /// Validate the configuration and build its vocabulary
    pub fn new(config: Config) -> ChordResult<Self> {
        config::validate_config(&config)?;
        let vocab = HarteVocabulary::new(config.labels.vocab_dim)?;
        Ok(Self { config, vocab })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vocabulary(&self) -> &HarteVocabulary {
        &self.vocab
    }

    /// Generator for one stochastic stage, reproducible when a seed is set
    fn stage_rng(&self, offset: u64) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(offset)),
            None => StdRng::from_entropy(),
        }
    }

    /// Compose augmentation, corruption, target derivation and windowing
    /// over a stream of labeled feature records.
    pub fn training_stream<'a, I>(&self, stream: I) -> ChordResult<SampleStream<'a>>
    where
        I: IntoIterator<Item = Sample>,
        I::IntoIter: 'a,
    {
        let mut stream: SampleStream<'a> = Box::new(stream.into_iter());

        let augment = &self.config.augment;
        if augment.enabled {
            let (max_shift, bins, mode) = (
                augment.max_pitch_shift,
                augment.bins_per_pitch,
                augment.shift_mode(),
            );
            stream = match mode {
                stages::ShiftMode::Circular => Box::new(stages::pitch_shift(
                    stream,
                    max_shift,
                    bins,
                    self.stage_rng(SHIFT_STREAM),
                )),
                stages::ShiftMode::Pad { fill_value } => Box::new(stages::pitch_shift_cqt(
                    stream,
                    max_shift,
                    bins,
                    fill_value,
                    self.stage_rng(SHIFT_STREAM),
                )),
            };
        }

        let corruption = &self.config.corruption;
        if corruption.mask.enabled {
            stream = Box::new(stages::binomial_mask(
                stream,
                corruption.mask.max_dropout,
                self.stage_rng(MASK_STREAM),
            )?);
        }
        if corruption.noise.enabled {
            let noise = &corruption.noise;
            stream = Box::new(stages::awgn(
                stream,
                noise.mu,
                noise.sigma,
                noise.scale_sigma,
                self.stage_rng(NOISE_STREAM),
            )?);
        }
        if corruption.frame_dropout.enabled {
            stream = Box::new(stages::drop_frames(
                stream,
                corruption.frame_dropout.max_dropout,
                self.stage_rng(FRAME_STREAM),
            )?);
        }

        stream = self.target_stream(stream);

        let window = &self.config.window;
        if window.enabled {
            stream = Box::new(stages::wrap_cqt(stream, window.length, window.stride));
        }

        log::info!(
            "Built training stream (target={:?}, vocab_dim={})",
            self.config.labels.target,
            self.vocab.vocab_dim()
        );
        Ok(stream)
    }

    fn target_stream<'a>(&self, stream: SampleStream<'a>) -> SampleStream<'a> {
        let vocab = self.vocab;
        match self.config.labels.target {
            TargetKind::ChordIndex => Box::new(stages::map_to_chord_index(stream, vocab)),
            TargetKind::QualityIndex => {
                Box::new(stages::map_to_chord_quality_index(stream, vocab))
            }
            TargetKind::JointIndex => Box::new(stages::map_to_joint_index(stream, vocab)),
            TargetKind::Chroma => Box::new(stages::map_to_chroma(
                stream,
                vocab,
                self.config.labels.chroma_bins_per_pitch,
            )),
            TargetKind::Tonnetz => Box::new(stages::chord_index_to_tonnetz(
                stages::map_to_chord_index(stream, vocab),
                vocab,
            )),
            TargetKind::TonnetzDistance => Box::new(stages::chord_index_to_tonnetz_distance(
                stages::map_to_chord_index(stream, vocab),
                vocab,
            )),
            TargetKind::Affinity => Box::new(stages::chord_index_to_affinity_vectors(
                stages::map_to_chord_index(stream, vocab),
                vocab,
            )),
            TargetKind::OneHot => Box::new(stages::chord_index_to_onehot_vectors(
                stages::map_to_chord_index(stream, vocab),
                vocab.vocab_dim(),
            )),
        }
    }

    /// Unpack (positive, negative) pairs with the configured rotation
    /// probability.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationFailed` if `contrastive.rotate_prob` is unset.
    pub fn contrastive_stream<'a, I>(&self, pairs: I) -> ChordResult<SampleStream<'a>>
    where
        I: IntoIterator<Item = Sample<(Entity, Entity)>>,
        I::IntoIter: 'a,
    {
        let settings = &self.config.contrastive;
        let rotate_prob = settings.rotate_prob.ok_or_else(|| {
            ChordError::ConfigValidationFailed(
                "contrastive.rotate_prob must be set to build a contrastive stream".to_string(),
            )
        })?;
        let pairs: Box<dyn Iterator<Item = Sample<(Entity, Entity)>> + 'a> =
            Box::new(pairs.into_iter());
        Ok(Box::new(stages::unpack_contrastive_pairs(
            pairs,
            self.vocab,
            rotate_prob,
            settings.min_val,
            settings.max_val,
            settings.bins_per_pitch,
            self.stage_rng(CONTRASTIVE_STREAM),
        )?))
    }

    /// Viterbi-decode a posteriorgram with the configured penalty
    pub fn decode(
        &self,
        posterior: &Array2<f64>,
        transition: &Array2<f64>,
        prior: Option<&Array1<f64>>,
    ) -> ChordResult<Vec<usize>> {
        viterbi::viterbi(posterior, transition, prior, self.config.decode.penalty)
    }

    /// Score an estimation file and write the statistics to `stats_path`.
    ///
    /// Returns `None` (after telling the user) when the estimation file does
    /// not exist.
    pub fn score_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        estimation_path: P,
        stats_path: Q,
    ) -> ChordResult<Option<String>> {
        let estimation_path = estimation_path.as_ref();
        if !estimation_path.exists() {
            println!("File does not exist: {}", estimation_path.display());
            return Ok(None);
        }

        let estimations = scoring::load_estimations(estimation_path)?;
        let (_, stats) =
            scoring::compute_scores(&estimations, &self.vocab, self.config.scoring.top_k)?;

        let stats_path = stats_path.as_ref();
        if let Some(parent) = stats_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(stats_path, &stats)?;
        log::info!("Wrote statistics to {}", stats_path.display());
        Ok(Some(stats))
    }
}
