//! Validation tests for the augmentation, target and reshaping stages

use chordfx::entity::{CHORD_IDX, CHORD_LABEL, CHROMA, CLASS_IDX, NOTE_NUMBERS, QUALITY_IDX, ROOT_IDX, TARGET};
use chordfx::labels::HarteVocabulary;
use chordfx::stages::{self, ShiftMode};
use chordfx::{Entity, Field, Sample};
use ndarray::{Array1, Array3, ArrayD, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// `[1, frames, 12 * bins_per_pitch]` features with a single active pitch
/// class at bin `root * bins_per_pitch` in every frame
fn one_hot_cqt(frames: usize, bins_per_pitch: usize, root: usize) -> ArrayD<f32> {
    Array3::from_shape_fn((1, frames, 12 * bins_per_pitch), |(_, _, f)| {
        if f == root * bins_per_pitch {
            1.0
        } else {
            0.0
        }
    })
    .into_dyn()
}

fn record(label: &str, cqt: ArrayD<f32>) -> Sample {
    Sample::Record(Entity::new().with("cqt", cqt).with(CHORD_LABEL, label))
}

fn vocab() -> HarteVocabulary {
    HarteVocabulary::new(157).unwrap()
}

/// Pitch bin holding the maximum of the first frame
fn active_bin(cqt: &ArrayD<f32>) -> usize {
    let frame = cqt.index_axis(Axis(0), 0);
    let frame = frame.index_axis(Axis(0), 0);
    frame
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shift_is_identity() {
        let cqt = one_hot_cqt(4, 3, 2);
        let input = Entity::new()
            .with("cqt", cqt.clone())
            .with(CHORD_LABEL, "D:min7")
            .with("track", "t01");
        for mode in [ShiftMode::Circular, ShiftMode::Pad { fill_value: 0.0 }] {
            let out = stages::shift_entity(input.clone(), 0, 3, mode).record().unwrap();
            assert_eq!(out, input);
        }

        let mut rng = StdRng::seed_from_u64(0);
        let out: Vec<Sample> =
            stages::pitch_shift(vec![Sample::Record(input.clone())], 0, 3, &mut rng).collect();
        assert_eq!(out, vec![Sample::Record(input)]);
    }

    #[test]
    fn test_shift_moves_label_and_features_together() {
        let out = stages::shift_entity(
            Entity::new().with("cqt", one_hot_cqt(2, 1, 0)).with(CHORD_LABEL, "C:maj"),
            2,
            1,
            ShiftMode::Circular,
        )
        .record()
        .unwrap();
        assert_eq!(out.text(CHORD_LABEL), Some("D:maj"));
        assert_eq!(active_bin(out.array("cqt").unwrap()), 2);

        let wrapped = stages::shift_entity(
            Entity::new().with("cqt", one_hot_cqt(2, 1, 11)).with(CHORD_LABEL, "B:min"),
            1,
            1,
            ShiftMode::Circular,
        )
        .record()
        .unwrap();
        assert_eq!(wrapped.text(CHORD_LABEL), Some("C:min"));
        assert_eq!(active_bin(wrapped.array("cqt").unwrap()), 0);
    }

    #[test]
    fn test_padded_shift_fills_vacated_bins() {
        let out = stages::shift_entity(
            Entity::new().with("cqt", one_hot_cqt(1, 1, 11)).with(CHORD_LABEL, "B:min"),
            1,
            1,
            ShiftMode::Pad { fill_value: -1.0 },
        )
        .record()
        .unwrap();
        let cqt = out.array("cqt").unwrap();
        assert_eq!(cqt[[0, 0, 0]], -1.0);
        assert!(cqt.iter().all(|&v| v != 1.0));
    }

    #[test]
    fn test_random_shift_keeps_root_aligned() {
        let inputs: Vec<Sample> = (0..50).map(|_| record("C:maj", one_hot_cqt(3, 3, 0))).collect();
        let vocab = vocab();
        let outputs: Vec<Sample> =
            stages::pitch_shift(inputs, 6, 3, StdRng::seed_from_u64(11)).collect();
        assert_eq!(outputs.len(), 50);
        for sample in outputs {
            let entity = sample.record().unwrap();
            let label = entity.text(CHORD_LABEL).unwrap().to_string();
            let root = chordfx::ChordVocabulary::class_index(&vocab, &label).unwrap() % 12;
            assert_eq!(active_bin(entity.array("cqt").unwrap()), root * 3);
        }
    }

    #[test]
    fn test_skips_pass_through_and_sentinels_keep_label() {
        let inputs = vec![
            Sample::Skip,
            record("N", one_hot_cqt(2, 1, 0)),
            Sample::Skip,
            record("X", one_hot_cqt(2, 1, 0)),
        ];
        let outputs: Vec<Sample> =
            stages::pitch_shift_chroma(inputs, 12, StdRng::seed_from_u64(5)).collect();
        assert_eq!(outputs.len(), 4);
        assert!(outputs[0].is_skip() && outputs[2].is_skip());
        assert_eq!(outputs[1].as_record().unwrap().text(CHORD_LABEL), Some("N"));
        assert_eq!(outputs[3].as_record().unwrap().text(CHORD_LABEL), Some("X"));
    }

    #[test]
    fn test_chord_index_skips_unlabeled() {
        let inputs = vec![
            record("A:min", one_hot_cqt(2, 1, 9)),
            record("X", one_hot_cqt(2, 1, 0)),
            Sample::Skip,
            record("N", one_hot_cqt(2, 1, 0)),
        ];
        let outputs: Vec<Sample> = stages::map_to_chord_index(inputs, vocab()).collect();
        assert_eq!(outputs.len(), 4);
        let first = outputs[0].as_record().unwrap();
        assert_eq!(first.int(CHORD_IDX), Some(21));
        assert!(first.array("cqt").is_some());
        assert!(first.get(CHORD_LABEL).is_none());
        assert!(outputs[1].is_skip());
        assert!(outputs[2].is_skip());
        assert_eq!(outputs[3].as_record().unwrap().int(CHORD_IDX), Some(156));
    }

    #[test]
    fn test_quality_and_joint_indices() {
        let inputs = vec![record("E:7", one_hot_cqt(1, 1, 4)), record("N", one_hot_cqt(1, 1, 0))];
        let quality: Vec<Sample> =
            stages::map_to_chord_quality_index(inputs.clone(), vocab()).collect();
        assert_eq!(quality[0].as_record().unwrap().int(QUALITY_IDX), Some(4));
        assert_eq!(quality[1].as_record().unwrap().int(QUALITY_IDX), Some(13));

        let joint: Vec<Sample> = stages::map_to_joint_index(inputs, vocab()).collect();
        let e7 = joint[0].as_record().unwrap();
        assert_eq!(e7.int(ROOT_IDX), Some(4));
        assert_eq!(e7.int(QUALITY_IDX), Some(4));
        let n = joint[1].as_record().unwrap();
        assert_eq!(n.int(ROOT_IDX), Some(13));
        assert_eq!(n.int(QUALITY_IDX), Some(13));
    }

    #[test]
    fn test_chroma_target_single_yield() {
        let inputs = vec![record("G:maj", one_hot_cqt(1, 1, 7)), record("X", one_hot_cqt(1, 1, 0))];
        let outputs: Vec<Sample> = stages::map_to_chroma(inputs, vocab(), 1).collect();
        assert_eq!(outputs.len(), 2);
        let target = outputs[0].as_record().unwrap().array(TARGET).unwrap();
        let active: Vec<usize> = (0..12).filter(|&i| target[[i]] == 1.0).collect();
        assert_eq!(active, vec![2, 7, 11]);
        assert!(outputs[1].is_skip());
    }

    #[test]
    fn test_index_lookup_targets() {
        let indexed: Vec<Sample> = stages::map_to_chord_index(
            vec![record("C:maj", one_hot_cqt(1, 1, 0)), record("N", one_hot_cqt(1, 1, 0))],
            vocab(),
        )
        .collect();

        let onehot: Vec<Sample> =
            stages::chord_index_to_onehot_vectors(indexed.clone(), 157).collect();
        let target = onehot[0].as_record().unwrap().array(TARGET).unwrap();
        assert_eq!(target.len(), 157);
        assert_eq!(target[[0]], 1.0);
        assert_eq!(target.sum(), 1.0);

        let tonnetz: Vec<Sample> = stages::chord_index_to_tonnetz(indexed.clone(), vocab()).collect();
        assert_eq!(tonnetz[0].as_record().unwrap().array(TARGET).unwrap().len(), 6);

        let distance: Vec<Sample> =
            stages::chord_index_to_tonnetz_distance(indexed.clone(), vocab()).collect();
        let similarity = distance[0].as_record().unwrap().array(TARGET).unwrap();
        assert_eq!(similarity.len(), 157);
        assert!((similarity[[0]] - 1.0).abs() < 1e-6);
        assert!(similarity.iter().all(|&v| (-1e-6..=1.0 + 1e-6).contains(&v)));

        let affinity: Vec<Sample> =
            stages::chord_index_to_affinity_vectors(indexed, vocab()).collect();
        let n_target = affinity[1].as_record().unwrap().array(TARGET).unwrap();
        assert_eq!(n_target[[156]], 1.0);
        assert_eq!(n_target.sum(), 1.0);
    }

    #[test]
    fn test_index_lookup_skips_missing_index() {
        let outputs: Vec<Sample> =
            stages::chord_index_to_onehot_vectors(vec![record("C:maj", one_hot_cqt(1, 1, 0))], 25)
                .collect();
        assert!(outputs[0].is_skip());

        let out_of_range = Sample::Record(
            Entity::new().with("cqt", one_hot_cqt(1, 1, 0)).with(CHORD_IDX, 30i64),
        );
        let outputs: Vec<Sample> =
            stages::chord_index_to_onehot_vectors(vec![out_of_range], 25).collect();
        assert!(outputs[0].is_skip());
    }

    #[test]
    fn test_class_index_mapper() {
        let inputs = vec![
            Sample::Record(Entity::new().with("data", one_hot_cqt(1, 1, 0)).with("artist", "a")),
            Sample::Record(Entity::new().with("data", one_hot_cqt(1, 1, 0)).with("artist", "b")),
        ];
        let outputs: Vec<Sample> = stages::map_to_class_index(inputs, |e: &Entity| {
            (e.text("artist") == Some("a")).then_some(7)
        })
        .collect();
        let first = outputs[0].as_record().unwrap();
        assert_eq!(first.int(CLASS_IDX), Some(7));
        assert!(first.array("data").is_some());
        assert!(first.get("artist").is_none());
        assert!(outputs[1].is_skip());
    }

    #[test]
    fn test_note_number_targets() {
        let inputs = vec![
            Sample::Record(
                Entity::new()
                    .with("cqt", one_hot_cqt(1, 1, 0))
                    .with(NOTE_NUMBERS, vec![60i64, 64, 67, 72]),
            ),
            Sample::Record(
                Entity::new()
                    .with("cqt", one_hot_cqt(1, 1, 0))
                    .with(NOTE_NUMBERS, "[0, 84, 90]"),
            ),
        ];

        let chroma: Vec<Sample> = stages::note_numbers_to_chroma(inputs.clone(), 1).collect();
        let c = chroma[0].as_record().unwrap().array(TARGET).unwrap();
        let active: Vec<usize> = (0..12).filter(|&i| c[[i]] == 1.0).collect();
        assert_eq!(active, vec![0, 4, 7]);

        let pitch: Vec<Sample> = stages::note_numbers_to_pitch(inputs, 84).collect();
        let p = pitch[1].as_record().unwrap().array(TARGET).unwrap();
        assert_eq!(p.len(), 85);
        assert_eq!(p[[0]], 1.0);
        assert_eq!(p[[84]], 1.0);
        assert_eq!(p.sum(), 2.0);
    }

    #[test]
    fn test_rotate_to_root() {
        let outputs: Vec<Sample> = stages::rotate_chord_to_root(
            vec![record("D:min", one_hot_cqt(1, 1, 2)), record("X", one_hot_cqt(1, 1, 0))],
            0,
            vocab(),
            1,
        )
        .collect();
        let rotated = outputs[0].as_record().unwrap();
        assert_eq!(rotated.text(CHORD_LABEL), Some("C:min"));
        assert_eq!(active_bin(rotated.array("cqt").unwrap()), 0);
        assert!(outputs[1].is_skip());

        let mut chroma = Array1::<f32>::zeros(12);
        chroma[9] = 1.0;
        let with_chroma = Sample::Record(
            Entity::new().with(CHORD_LABEL, "A:maj").with(CHROMA, chroma),
        );
        let rotated: Vec<Sample<Array1<f32>>> =
            stages::rotate_chroma_to_root(vec![with_chroma], 0, vocab()).collect();
        let rotated = rotated[0].as_record().unwrap();
        assert_eq!(rotated[0], 1.0);
    }

    #[test]
    fn test_corruption_keeps_shape() {
        let inputs: Vec<Sample> = (0..10).map(|_| record("C:maj", one_hot_cqt(9, 1, 0))).collect();

        let masked: Vec<Sample> =
            stages::binomial_mask(inputs.clone(), 0.0, StdRng::seed_from_u64(1))
                .unwrap()
                .collect();
        assert_eq!(masked, inputs);

        let dropped: Vec<Sample> =
            stages::drop_frames(inputs.clone(), 1.0, StdRng::seed_from_u64(2))
                .unwrap()
                .collect();
        for sample in &dropped {
            let cqt = sample.as_record().unwrap().array("cqt").unwrap();
            assert_eq!(cqt.shape(), &[1, 9, 12]);
            assert_eq!(cqt[[0, 4, 0]], 1.0);
        }

        let silent: Vec<Sample> = stages::awgn(inputs.clone(), 0.0, 0.0, 0.25, StdRng::seed_from_u64(3))
            .unwrap()
            .collect();
        assert_eq!(silent, inputs);

        let noisy: Vec<Sample> = stages::awgn(inputs.clone(), 0.0, 0.1, 0.25, StdRng::seed_from_u64(4))
            .unwrap()
            .collect();
        assert_ne!(noisy, inputs);
        assert!(stages::awgn(inputs.clone(), 0.0, -1.0, 0.25, StdRng::seed_from_u64(4)).is_err());
        assert!(stages::awgn(inputs, 0.0, 0.1, -0.25, StdRng::seed_from_u64(4)).is_err());
    }

    #[test]
    fn test_wrap_cqt_windows() {
        let cqt = Array3::from_shape_fn((1, 10, 4), |(_, t, f)| (t * 4 + f) as f32).into_dyn();
        let multi = Array3::<f32>::zeros((2, 10, 4)).into_dyn();
        let outputs: Vec<Sample> =
            stages::wrap_cqt(vec![record("C:maj", cqt), record("C:maj", multi)], 4, 3).collect();

        let windows = outputs[0].as_record().unwrap().array("cqt").unwrap();
        assert_eq!(windows.shape(), &[3, 4, 4]);
        assert_eq!(windows[[1, 0, 0]], 12.0);
        assert_eq!(outputs[0].as_record().unwrap().text(CHORD_LABEL), Some("C:maj"));
        assert!(outputs[1].is_skip());
    }

    #[test]
    fn test_array_field_stages() {
        let cqt = Array3::from_shape_fn((1, 2, 3), |(_, t, f)| (t * 3 + f) as f32).into_dyn();
        let input = vec![record("C:maj", cqt)];

        let doubled: Vec<Sample> = stages::concatenate(input.clone(), "cqt", -1).collect();
        assert_eq!(doubled[0].as_record().unwrap().array("cqt").unwrap().shape(), &[1, 2, 6]);

        let flat: Vec<Sample> = stages::reshape(input.clone(), "cqt", vec![6]).collect();
        let flat = flat[0].as_record().unwrap().array("cqt").unwrap();
        assert_eq!(flat.shape(), &[6]);
        assert_eq!(flat[[5]], 5.0);

        let swapped: Vec<Sample> = stages::transpose(input.clone(), "cqt", vec![0, 2, 1]).collect();
        let swapped = swapped[0].as_record().unwrap().array("cqt").unwrap();
        assert_eq!(swapped.shape(), &[1, 3, 2]);
        assert_eq!(swapped[[0, 2, 1]], 5.0);

        let bad: Vec<Sample> = stages::reshape(input.clone(), "cqt", vec![5]).collect();
        assert!(bad[0].is_skip());
        let bad: Vec<Sample> = stages::transpose(input, "cqt", vec![0, 0, 1]).collect();
        assert!(bad[0].is_skip());
    }

    #[test]
    fn test_field_conversions() {
        assert_eq!(Field::from(3usize), Field::Int(3));
        assert_eq!(Field::from("N"), Field::Text("N".to_string()));
    }
}
