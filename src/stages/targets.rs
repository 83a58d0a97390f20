//! Training-target derivation from chord labels and note numbers

use crate::entity::{
    Entity, Field, Sample, CHORD_IDX, CHORD_LABEL, CLASS_IDX, NOTE_NUMBERS, QUALITY_IDX,
    ROOT_IDX, TARGET,
};
use crate::labels::ChordVocabulary;
use ndarray::{Array1, Array2, ArrayD};
use std::collections::BTreeSet;

/// Root index used for the no-chord class in joint root/quality targets
pub const NO_CHORD_ROOT: usize = 13;

/// Features and label of a record; everything else is dropped.
fn features_and_label(mut entity: Entity) -> Option<(&'static str, ArrayD<f32>, String)> {
    let label = entity.text(CHORD_LABEL)?.to_string();
    let (key, data) = entity.take_features()?;
    Some((key, data, label))
}

/// Build `{features, key: value}` from a labeled record, or skip when the
/// label does not resolve.
fn derive_from_label<F>(entity: Entity, derive: F) -> Sample
where
    F: FnOnce(&str) -> Option<Vec<(&'static str, Field)>>,
{
    let (key, data, label) = match features_and_label(entity) {
        Some(parts) => parts,
        None => {
            log::debug!("Skipping record without features or chord label");
            return Sample::Skip;
        }
    };
    match derive(&label) {
        Some(fields) => {
            let mut out = Entity::new().with(key, data);
            for (name, value) in fields {
                out.set(name, value);
            }
            Sample::Record(out)
        }
        None => {
            log::debug!("Skipping unmapped label '{}'", label);
            Sample::Skip
        }
    }
}

/// Map chord labels to class indices (`chord_idx`).
pub fn map_to_chord_index<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            derive_from_label(entity, |label| {
                let idx = vocab.class_index(label)?;
                Some(vec![(CHORD_IDX, Field::from(idx))])
            })
        })
    })
}

/// Map records to `class_idx` with a caller-supplied mapper.
///
/// The output keeps only the features and the class index.
pub fn map_to_class_index<I, F>(stream: I, mut index_mapper: F) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    F: FnMut(&Entity) -> Option<usize>,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            let class_idx = match index_mapper(&entity) {
                Some(idx) => idx,
                None => return Sample::Skip,
            };
            match entity.take_features() {
                Some((key, data)) => Sample::Record(
                    Entity::new()
                        .with(key, data)
                        .with(CLASS_IDX, class_idx),
                ),
                None => Sample::Skip,
            }
        })
    })
}

/// Map chord labels to chroma targets of `12 * bins_per_pitch` bins.
///
/// Labels whose chroma has any negative entry (unlabeled or malformed) are
/// skipped.
pub fn map_to_chroma<I, V>(stream: I, vocab: V, bins_per_pitch: usize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            derive_from_label(entity, |label| {
                let chroma = vocab.chroma(label, bins_per_pitch);
                if chroma.iter().any(|&v| v < 0.0) {
                    return None;
                }
                Some(vec![(TARGET, Field::from(chroma))])
            })
        })
    })
}

/// Map chord labels to quality indices (`quality_idx`).
pub fn map_to_chord_quality_index<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            derive_from_label(entity, |label| {
                let idx = vocab.quality_index(label)?;
                Some(vec![(QUALITY_IDX, Field::from(idx))])
            })
        })
    })
}

/// Map chord labels to a joint (`root_idx`, `quality_idx`) pair.
///
/// The no-chord class gets the dedicated root index [`NO_CHORD_ROOT`].
pub fn map_to_joint_index<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|entity| {
            derive_from_label(entity, |label| {
                let chord_idx = vocab.class_index(label)?;
                let root_idx = if chord_idx == vocab.vocab_dim() - 1 {
                    NO_CHORD_ROOT
                } else {
                    chord_idx % 12
                };
                Some(vec![
                    (ROOT_IDX, Field::from(root_idx)),
                    (QUALITY_IDX, Field::from(chord_idx / 12)),
                ])
            })
        })
    })
}

/// Replace `chord_idx` with the matching row of a lookup table.
fn index_to_target<I>(stream: I, table: Array2<f32>) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            let row = entity
                .int(CHORD_IDX)
                .filter(|&idx| idx >= 0 && (idx as usize) < table.nrows())
                .map(|idx| table.row(idx as usize).to_owned());
            match (row, entity.take_features()) {
                (Some(target), Some((key, data))) => {
                    Sample::Record(Entity::new().with(key, data).with(TARGET, target))
                }
                _ => {
                    log::debug!("Skipping record without a valid chord index");
                    Sample::Skip
                }
            }
        })
    })
}

fn tonnetz_table<V: ChordVocabulary>(vocab: &V) -> Array2<f32> {
    let dim = vocab.vocab_dim();
    let mut table = Array2::<f32>::zeros((dim, 6));
    for n in 0..dim {
        if let Some(t) = vocab.index_to_label(n).and_then(|l| vocab.tonnetz(&l)) {
            table.row_mut(n).assign(&t);
        }
    }
    table
}

/// Map chord indices to their 6-D tonnetz embedding.
pub fn chord_index_to_tonnetz<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    index_to_target(stream, tonnetz_table(&vocab))
}

/// Map chord indices to their tonnetz similarity against every class,
/// `1 - d / max(d)` over pairwise Euclidean distances.
pub fn chord_index_to_tonnetz_distance<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    let tonnetz = tonnetz_table(&vocab);
    let dim = tonnetz.nrows();
    let distances = Array2::from_shape_fn((dim, dim), |(i, j)| {
        let diff = &tonnetz.row(i) - &tonnetz.row(j);
        diff.mapv(|v| v * v).sum().sqrt()
    });
    let max_distance = distances.iter().cloned().fold(0.0f32, f32::max);
    let scale = if max_distance > 0.0 { max_distance } else { 1.0 };
    let similarity = distances.mapv(|d| 1.0 - d / scale);
    index_to_target(stream, similarity)
}

/// Map chord indices to their affinity vectors.
pub fn chord_index_to_affinity_vectors<I, V>(stream: I, vocab: V) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    V: ChordVocabulary,
{
    index_to_target(stream, vocab.affinity_vectors())
}

/// Map chord indices to one-hot vectors.
pub fn chord_index_to_onehot_vectors<I>(stream: I, vocab_dim: usize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    index_to_target(stream, Array2::eye(vocab_dim))
}

/// Note numbers of a record, stored as integers or as JSON text.
fn note_numbers(entity: &Entity) -> Option<Vec<i64>> {
    match entity.get(NOTE_NUMBERS)? {
        Field::Ints(values) => Some(values.clone()),
        Field::Text(text) => serde_json::from_str(text).ok(),
        _ => None,
    }
}

/// Map note numbers to a pitch-class chroma target.
pub fn note_numbers_to_chroma<I>(stream: I, bins_per_pitch: usize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    let bins_per_pitch = bins_per_pitch.max(1);
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            let pitches: BTreeSet<usize> = match note_numbers(&entity) {
                Some(notes) => notes.iter().map(|n| n.rem_euclid(12) as usize).collect(),
                None => return Sample::Skip,
            };
            let mut chroma = Array1::<f32>::zeros(12 * bins_per_pitch);
            for p in pitches {
                chroma[p * bins_per_pitch] = 1.0;
            }
            match entity.take_features() {
                Some((key, data)) => {
                    Sample::Record(Entity::new().with(key, data).with(TARGET, chroma))
                }
                None => Sample::Skip,
            }
        })
    })
}

/// Map note numbers to a binary pitch vector of `max_pitch + 1` entries.
///
/// Notes outside `0..=max_pitch` are ignored.
pub fn note_numbers_to_pitch<I>(stream: I, max_pitch: usize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            let notes = match note_numbers(&entity) {
                Some(notes) => notes,
                None => return Sample::Skip,
            };
            let mut pitch_vec = Array1::<f32>::zeros(max_pitch + 1);
            for n in notes {
                if n >= 0 && (n as usize) <= max_pitch {
                    pitch_vec[n as usize] = 1.0;
                } else {
                    log::debug!("Ignoring note {} outside 0..={}", n, max_pitch);
                }
            }
            match entity.take_features() {
                Some((key, data)) => {
                    Sample::Record(Entity::new().with(key, data).with(TARGET, pitch_vec))
                }
                None => Sample::Skip,
            }
        })
    })
}
