//! Contrastive (positive, negative) pair unpacking

use crate::entity::{Entity, Sample, CHORD_IDX, CHORD_LABEL, TARGET};
use crate::error::Result as ChordResult;
use crate::labels::ChordVocabulary;
use crate::stages::shift::{shift_entity, ShiftMode};
use crate::util::check_probability;
use ndarray::Array1;
use rand::Rng;

/// Class index of a record's chord label.
fn label_index<V: ChordVocabulary>(vocab: &V, entity: &Entity) -> Option<usize> {
    vocab.class_index(entity.text(CHORD_LABEL)?)
}

/// Keep only the features, tagged with a class index and a scalar target.
fn tagged(mut entity: Entity, chord_idx: usize, value: f32) -> Sample {
    match entity.take_features() {
        Some((key, data)) => Sample::Record(
            Entity::new()
                .with(key, data)
                .with(CHORD_IDX, chord_idx)
                .with(TARGET, Array1::from_elem(1, value)),
        ),
        None => Sample::Skip,
    }
}

/// Unpack (positive, negative) pairs into two standalone records each.
///
/// With probability `rotate_prob`, the negative's features are circularly
/// shifted by the interval from the negative root up to the positive root.
/// No-chord records have no root and are never rotated.
/// Both emitted records carry the positive's `chord_idx`; the positive has
/// `target = [max_val]` and the negative `target = [min_val]`.
///
/// Skipped pairs produce a single skip. A pair whose positive label cannot be
/// resolved produces two skips, so output cardinality stays at 2 per pair.
///
/// # Errors
///
/// Returns `InputValidationError` unless `rotate_prob` is in `[0, 1]`.
pub fn unpack_contrastive_pairs<I, V, R>(
    stream: I,
    vocab: V,
    rotate_prob: f64,
    min_val: f32,
    max_val: f32,
    bins_per_pitch: usize,
    mut rng: R,
) -> ChordResult<impl Iterator<Item = Sample>>
where
    I: IntoIterator<Item = Sample<(Entity, Entity)>>,
    V: ChordVocabulary,
    R: Rng,
{
    let rotate_prob = check_probability("rotate_prob", rotate_prob)?;
    Ok(stream.into_iter().flat_map(move |pair| {
        let (positive, negative) = match pair {
            Sample::Record(pair) => pair,
            Sample::Skip => return vec![Sample::Skip],
        };

        let pos_idx = match label_index(&vocab, &positive) {
            Some(idx) => idx,
            None => {
                log::debug!("Skipping pair with unmapped positive label");
                return vec![Sample::Skip, Sample::Skip];
            }
        };

        let negative = if rng.gen_bool(rotate_prob) {
            match label_index(&vocab, &negative) {
                Some(neg_idx)
                    if neg_idx != vocab.no_chord_index() && pos_idx != vocab.no_chord_index() =>
                {
                    let shift = (pos_idx as i32 - neg_idx as i32).rem_euclid(12);
                    shift_entity(negative, shift, bins_per_pitch, ShiftMode::Circular)
                }
                _ => Sample::Record(negative),
            }
        } else {
            Sample::Record(negative)
        };

        vec![
            tagged(positive, pos_idx, max_val),
            negative.and_then(|entity| tagged(entity, pos_idx, min_val)),
        ]
    }))
}
