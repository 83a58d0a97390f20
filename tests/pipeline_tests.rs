//! End-to-end tests for the configured pipelines

use chordfx::config::{load_config, save_config, AugmentMode};
use chordfx::entity::{CHORD_IDX, CHORD_LABEL, ROOT_IDX, TARGET};
use chordfx::{ChordError, ChordPipeline, ChordVocabulary, Config, Entity, Sample, TargetKind};
use ndarray::{array, Array3, ArrayD};

fn cqt(frames: usize, root: usize) -> ArrayD<f32> {
    Array3::from_shape_fn((1, frames, 36), |(_, _, f)| if f == root * 3 { 1.0 } else { 0.0 })
        .into_dyn()
}

fn labeled_stream() -> Vec<Sample> {
    let labels = [("C:maj", 0), ("E:min", 4), ("X", 0), ("G:7", 7), ("N", 0)];
    labels
        .iter()
        .map(|&(label, root)| {
            Sample::Record(Entity::new().with("cqt", cqt(12, root)).with(CHORD_LABEL, label))
        })
        .collect()
}

fn seeded_config(seed: u64) -> Config {
    Config {
        seed: Some(seed),
        ..Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_stream_preserves_alignment() {
        let pipeline = ChordPipeline::new(seeded_config(7)).unwrap();
        let outputs: Vec<Sample> = pipeline.training_stream(labeled_stream()).unwrap().collect();
        assert_eq!(outputs.len(), 5);
        assert!(outputs[2].is_skip());

        for sample in outputs.iter().filter(|s| !s.is_skip()) {
            let entity = sample.as_record().unwrap();
            let chord_idx = entity.int(CHORD_IDX).unwrap() as usize;
            let features = entity.array("cqt").unwrap();
            if chord_idx != 156 {
                let root = chord_idx % 12;
                assert_eq!(features[[0, 0, root * 3]], 1.0);
            }
        }
        assert_eq!(outputs[4].as_record().unwrap().int(CHORD_IDX), Some(156));
    }

    #[test]
    fn test_seeded_streams_are_reproducible() {
        let mut config = seeded_config(42);
        config.corruption.noise.enabled = true;
        config.corruption.mask.enabled = true;

        let first: Vec<Sample> = ChordPipeline::new(config.clone())
            .unwrap()
            .training_stream(labeled_stream())
            .unwrap()
            .collect();
        let second: Vec<Sample> = ChordPipeline::new(config)
            .unwrap()
            .training_stream(labeled_stream())
            .unwrap()
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_targets_and_windowing() {
        let mut config = seeded_config(1);
        config.augment.enabled = false;
        config.labels.target = TargetKind::JointIndex;
        config.window.enabled = true;
        config.window.length = 4;
        config.window.stride = 4;

        let outputs: Vec<Sample> = ChordPipeline::new(config)
            .unwrap()
            .training_stream(labeled_stream())
            .unwrap()
            .collect();
        let e_min = outputs[1].as_record().unwrap();
        assert_eq!(e_min.int(ROOT_IDX), Some(4));
        assert_eq!(e_min.array("cqt").unwrap().shape(), &[3, 4, 36]);
        assert_eq!(outputs[4].as_record().unwrap().int(ROOT_IDX), Some(13));
    }

    #[test]
    fn test_padded_augmentation_with_tonnetz_target() {
        let mut config = seeded_config(3);
        config.augment.mode = AugmentMode::Pad;
        config.labels.target = TargetKind::Tonnetz;

        let outputs: Vec<Sample> = ChordPipeline::new(config)
            .unwrap()
            .training_stream(labeled_stream())
            .unwrap()
            .collect();
        assert_eq!(outputs.len(), 5);
        assert!(outputs[2].is_skip());
        let target = outputs[0].as_record().unwrap().array(TARGET).unwrap();
        assert_eq!(target.len(), 6);
    }

    #[test]
    fn test_contrastive_stream_requires_rotate_prob() {
        let pipeline = ChordPipeline::new(Config::default()).unwrap();
        let pairs: Vec<Sample<(Entity, Entity)>> = Vec::new();
        assert!(matches!(
            pipeline.contrastive_stream(pairs),
            Err(ChordError::ConfigValidationFailed(_))
        ));

        let mut config = seeded_config(5);
        config.contrastive.rotate_prob = Some(0.75);
        let pipeline = ChordPipeline::new(config).unwrap();
        let pairs = vec![Sample::Record((
            Entity::new().with("cqt", cqt(2, 0)).with(CHORD_LABEL, "C:maj"),
            Entity::new().with("cqt", cqt(2, 5)).with(CHORD_LABEL, "F:maj"),
        ))];
        let outputs: Vec<Sample> = pipeline.contrastive_stream(pairs).unwrap().collect();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_decode_uses_configured_penalty() {
        let posterior = array![[0.8, 0.2], [0.3, 0.7], [0.8, 0.2]];
        let transition = array![[0.5, 0.5], [0.5, 0.5]];

        let pipeline = ChordPipeline::new(Config::default()).unwrap();
        assert_eq!(pipeline.decode(&posterior, &transition, None).unwrap(), vec![0, 1, 0]);

        let mut config = Config::default();
        config.decode.penalty = -10.0;
        let pipeline = ChordPipeline::new(config).unwrap();
        assert_eq!(pipeline.decode(&posterior, &transition, None).unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.labels.vocab_dim = 12;
        assert!(matches!(
            ChordPipeline::new(config),
            Err(ChordError::ConfigValidationFailed(_))
        ));

        let mut config = Config::default();
        config.contrastive.rotate_prob = Some(1.5);
        assert!(ChordPipeline::new(config).is_err());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = seeded_config(9);
        config.labels.vocab_dim = 61;
        config.contrastive.rotate_prob = Some(0.0);
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.seed, Some(9));
        assert_eq!(loaded.labels.vocab_dim, 61);
        assert_eq!(loaded.contrastive.rotate_prob, Some(0.0));
        assert_eq!(ChordPipeline::new(loaded).unwrap().vocabulary().vocab_dim(), 61);
    }
}
