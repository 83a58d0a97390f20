//! Pitch-shift augmentation and root re-alignment

use crate::entity::{Entity, Sample, CHORD_LABEL, CHROMA};
use crate::labels::{rotate_label, ChordVocabulary};
use crate::util::{circshift, translate};
use ndarray::{Array1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How vacated pitch bins are handled when shifting features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftMode {
    /// Bins wrap around the pitch axis
    Circular,
    /// Bins shifted off the edge are dropped; vacated bins take `fill_value`
    Pad { fill_value: f32 },
}

/// Draw a shift uniformly from `[-max_pitch_shift, max_pitch_shift)`.
fn draw_shift<R: Rng>(rng: &mut R, max_pitch_shift: i32) -> i32 {
    if max_pitch_shift <= 0 {
        0
    } else {
        rng.gen_range(-max_pitch_shift..max_pitch_shift)
    }
}

/// Transpose a record by `pitch_shift` semitones.
///
/// The chord label's root is rotated (sentinel labels are left alone) and the
/// feature array is shifted along its last (pitch) axis by
/// `pitch_shift * bins_per_pitch` bins. Every other field is carried over.
/// Records without a parseable label or a feature array become skips.
pub fn shift_entity(
    mut entity: Entity,
    pitch_shift: i32,
    bins_per_pitch: usize,
    mode: ShiftMode,
) -> Sample {
    let label = match entity.text(CHORD_LABEL) {
        Some(label) => label.to_string(),
        None => {
            log::debug!("Skipping record without a chord label");
            return Sample::Skip;
        }
    };

    let new_label = match rotate_label(&label, pitch_shift) {
        Ok(new_label) => new_label,
        Err(e) => {
            log::debug!("Skipping '{}': {}", label, e);
            return Sample::Skip;
        }
    };

    let (key, data) = match entity.take_features() {
        Some(features) if features.1.ndim() > 0 => features,
        _ => {
            log::debug!("Skipping '{}': no feature array", label);
            return Sample::Skip;
        }
    };

    let pitch_axis = Axis(data.ndim() - 1);
    let bin_shift = pitch_shift as isize * bins_per_pitch as isize;
    let shifted = match mode {
        ShiftMode::Circular => circshift(&data, pitch_axis, bin_shift),
        ShiftMode::Pad { fill_value } => translate(&data, pitch_axis, bin_shift, fill_value),
    };

    entity.set(key, shifted);
    entity.set(CHORD_LABEL, new_label);
    Sample::Record(entity)
}

/// Apply a random circular shift to the CQT, and rotate the root.
pub fn pitch_shift<I, R>(
    stream: I,
    max_pitch_shift: i32,
    bins_per_pitch: usize,
    mut rng: R,
) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            let shift = draw_shift(&mut rng, max_pitch_shift);
            shift_entity(entity, shift, bins_per_pitch, ShiftMode::Circular)
        })
    })
}

/// Apply a random zero-padded shift to the CQT, and rotate the root.
pub fn pitch_shift_cqt<I, R>(
    stream: I,
    max_pitch_shift: i32,
    bins_per_pitch: usize,
    fill_value: f32,
    mut rng: R,
) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            let shift = draw_shift(&mut rng, max_pitch_shift);
            shift_entity(entity, shift, bins_per_pitch, ShiftMode::Pad { fill_value })
        })
    })
}

/// Apply a random circular shift to chroma features (one bin per pitch).
pub fn pitch_shift_chroma<I, R>(
    stream: I,
    max_pitch_shift: i32,
    mut rng: R,
) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            let shift = draw_shift(&mut rng, max_pitch_shift);
            shift_entity(entity, shift, 1, ShiftMode::Circular)
        })
    })
}

/// Semitones needed to move a label's root onto `target_root`.
fn shift_to_root<V: ChordVocabulary>(vocab: &V, label: &str, target_root: usize) -> Option<i32> {
    let chord_idx = vocab.class_index(label)?;
    Some(target_root as i32 - (chord_idx % 12) as i32)
}

/// Shift every record so its chord root lands on `target_root`.
pub fn rotate_chord_to_root<I, V>(
    stream: I,
    target_root: usize,
    vocab: V,
    bins_per_pitch: usize,
) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            let label = entity.text(CHORD_LABEL).unwrap_or_default().to_string();
            match shift_to_root(&vocab, &label, target_root) {
                Some(shift) => shift_entity(
                    entity,
                    shift,
                    bins_per_pitch,
                    ShiftMode::Pad { fill_value: 0.0 },
                ),
                None => {
                    log::debug!("Skipping unmapped label '{}'", label);
                    Sample::Skip
                }
            }
        })
    })
}

/// Rotate each record's 12-bin `chroma` field so its root lands on
/// `target_root`, yielding the rotated vectors.
pub fn rotate_chroma_to_root<I, V>(
    stream: I,
    target_root: usize,
    vocab: V,
) -> impl Iterator<Item = Sample<Array1<f32>>>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            let label = entity.text(CHORD_LABEL).unwrap_or_default();
            let shift = match shift_to_root(&vocab, label, target_root) {
                Some(shift) => shift,
                None => {
                    log::debug!("Skipping unmapped label '{}'", label);
                    return Sample::Skip;
                }
            };
            let chroma = entity
                .array(CHROMA)
                .filter(|c| c.len() == 12)
                .map(|c| c.iter().cloned().collect::<Array1<f32>>());
            match chroma {
                Some(chroma) => Sample::Record(circshift(&chroma, Axis(0), shift as isize)),
                None => {
                    log::warn!("Record has no 12-bin chroma field");
                    Sample::Skip
                }
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_draw_shift_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let s = draw_shift(&mut rng, 3);
            assert!((-3..3).contains(&s));
        }
        assert_eq!(draw_shift(&mut rng, 0), 0);
    }
}
