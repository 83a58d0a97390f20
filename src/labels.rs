//! Chord label ontology
//!
//! Labels follow Harte syntax: `root[:quality][(ext,...)][/bass]`, with the
//! reserved sentinels `N` (no chord) and `X` (unlabeled). Pure helpers here
//! split, join and transpose labels; the [`ChordVocabulary`] trait maps labels
//! onto class indices and target vectors for a fixed vocabulary size, so that
//! alternate vocabularies can be swapped without touching the pipeline stages.

use crate::error::{ChordError, Result as ChordResult};
use ndarray::{Array1, Array2};
use std::f32::consts::PI;

/// No-chord sentinel
pub const NO_CHORD: &str = "N";

/// Unlabeled / skip sentinel
pub const SKIP_CHORD: &str = "X";

/// Canonical pitch-class spelling, indexed by semitone
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Quality shorthands and their semitone intervals above the root
const QUALITY_INTERVALS: &[(&str, &[usize])] = &[
    ("maj", &[0, 4, 7]),
    ("min", &[0, 3, 7]),
    ("aug", &[0, 4, 8]),
    ("dim", &[0, 3, 6]),
    ("sus2", &[0, 2, 7]),
    ("sus4", &[0, 5, 7]),
    ("7", &[0, 4, 7, 10]),
    ("maj7", &[0, 4, 7, 11]),
    ("min7", &[0, 3, 7, 10]),
    ("minmaj7", &[0, 3, 7, 11]),
    ("maj6", &[0, 4, 7, 9]),
    ("min6", &[0, 3, 7, 9]),
    ("dim7", &[0, 3, 6, 9]),
    ("hdim7", &[0, 3, 6, 10]),
    ("9", &[0, 2, 4, 7, 10]),
    ("maj9", &[0, 2, 4, 7, 11]),
    ("min9", &[0, 2, 3, 7, 10]),
    ("1", &[0]),
    ("5", &[0, 7]),
];

const QUALITIES_25: &[&str] = &["maj", "min"];
const QUALITIES_61: &[&str] = &["maj", "min", "maj7", "min7", "7"];
const QUALITIES_157: &[&str] = &[
    "maj", "min", "maj7", "min7", "7", "maj6", "min6", "dim", "aug", "sus4", "sus2", "hdim7",
    "dim7",
];

/// Components of a chord label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordParts {
    pub root: String,
    pub quality: String,
    pub extensions: Vec<String>,
    pub bass: String,
}

/// A label resolved to pitch content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedChord {
    NoChord,
    Unlabeled,
    Chord {
        /// Root semitone (0 = C)
        root: usize,
        /// Active intervals relative to the root
        bitmap: [bool; 12],
        /// Bass interval relative to the root
        bass: usize,
    },
}

/// True for `N` and `X`, which carry no harmonic root.
pub fn is_sentinel(label: &str) -> bool {
    label == NO_CHORD || label == SKIP_CHORD
}

/// Convert a pitch-class name (e.g. `C#`, `Bb`, `Fbb`) to a semitone in `0..12`.
pub fn pitch_class_to_semitone(pitch_class: &str) -> ChordResult<usize> {
    let mut chars = pitch_class.chars();
    let base: i32 = match chars.next() {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => {
            return Err(ChordError::LabelParseError(format!(
                "invalid pitch class '{}'",
                pitch_class
            )))
        }
    };
    let mut offset = 0i32;
    for c in chars {
        match c {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => {
                return Err(ChordError::LabelParseError(format!(
                    "invalid accidental in pitch class '{}'",
                    pitch_class
                )))
            }
        }
    }
    Ok((base + offset).rem_euclid(12) as usize)
}

/// Canonical pitch-class name for a semitone (taken modulo 12).
pub fn semitone_to_pitch_class(semitone: i32) -> &'static str {
    PITCH_CLASSES[semitone.rem_euclid(12) as usize]
}

/// Convert a scale degree (`3`, `b7`, `#9`) to semitones above the root.
pub fn scale_degree_to_semitone(degree: &str) -> ChordResult<i32> {
    let digits_at = degree
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| ChordError::LabelParseError(format!("invalid scale degree '{}'", degree)))?;
    let (accidentals, number) = degree.split_at(digits_at);

    let mut offset = 0i32;
    for c in accidentals.chars() {
        match c {
            '#' => offset += 1,
            'b' => offset -= 1,
            _ => {
                return Err(ChordError::LabelParseError(format!(
                    "invalid scale degree '{}'",
                    degree
                )))
            }
        }
    }

    let number: i32 = number
        .parse()
        .map_err(|_| ChordError::LabelParseError(format!("invalid scale degree '{}'", degree)))?;
    if !(1..=13).contains(&number) {
        return Err(ChordError::LabelParseError(format!(
            "scale degree '{}' out of range",
            degree
        )));
    }

    const MAJOR_SCALE: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];
    let idx = (number - 1) as usize;
    Ok(MAJOR_SCALE[idx % 7] + 12 * (idx / 7) as i32 + offset)
}

/// Split a label into root, quality, extensions and bass.
///
/// Sentinels come back as the root with everything else empty. Text is kept
/// as written, so [`join`] reproduces the input.
pub fn split(label: &str) -> ChordResult<ChordParts> {
    if is_sentinel(label) {
        return Ok(ChordParts {
            root: label.to_string(),
            quality: String::new(),
            extensions: Vec::new(),
            bass: String::new(),
        });
    }

    let (main, bass) = match label.rsplit_once('/') {
        Some((main, bass)) => (main, bass.to_string()),
        None => (label, String::new()),
    };

    let (main, extensions) = match main.find('(') {
        Some(open) => {
            if !main.ends_with(')') {
                return Err(ChordError::LabelParseError(format!(
                    "unbalanced extensions in '{}'",
                    label
                )));
            }
            let inner = &main[open + 1..main.len() - 1];
            let exts = inner
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            (&main[..open], exts)
        }
        None => (main, Vec::new()),
    };

    let (root, quality) = match main.split_once(':') {
        Some((root, quality)) => (root.to_string(), quality.to_string()),
        None => (main.to_string(), String::new()),
    };

    pitch_class_to_semitone(&root)?;

    Ok(ChordParts {
        root,
        quality,
        extensions,
        bass,
    })
}

/// Join label components back into a label string.
pub fn join(root: &str, quality: &str, extensions: &[String], bass: &str) -> String {
    let mut label = root.to_string();
    if !quality.is_empty() {
        label.push(':');
        label.push_str(quality);
    }
    if !extensions.is_empty() {
        label.push('(');
        label.push_str(&extensions.join(","));
        label.push(')');
    }
    if !bass.is_empty() {
        label.push('/');
        label.push_str(bass);
    }
    label
}

/// Transpose the harmonic root of a label by `shift` semitones.
///
/// Sentinels, and shifts that are a multiple of an octave, return the label
/// unchanged; otherwise the new root takes its canonical spelling
/// (`C C# D Eb E F F# G Ab A Bb B`). Rotating there and back therefore
/// restores canonically spelled roots exactly, while other spellings come
/// back as their canonical enharmonic (`Db:maj` returns as `C#:maj`).
pub fn rotate_label(label: &str, shift: i32) -> ChordResult<String> {
    if is_sentinel(label) || shift.rem_euclid(12) == 0 {
        return Ok(label.to_string());
    }
    let parts = split(label)?;
    let root = pitch_class_to_semitone(&parts.root)? as i32 + shift;
    Ok(join(
        semitone_to_pitch_class(root),
        &parts.quality,
        &parts.extensions,
        &parts.bass,
    ))
}

/// Interval bitmap for a quality shorthand.
pub fn quality_to_bitmap(quality: &str) -> ChordResult<[bool; 12]> {
    let intervals = QUALITY_INTERVALS
        .iter()
        .find(|(name, _)| *name == quality)
        .map(|(_, intervals)| *intervals)
        .ok_or_else(|| ChordError::LabelParseError(format!("unknown quality '{}'", quality)))?;
    let mut bitmap = [false; 12];
    for &i in intervals {
        bitmap[i] = true;
    }
    Ok(bitmap)
}

/// Resolve a label to its root, interval bitmap and bass interval.
pub fn encode(label: &str) -> ChordResult<EncodedChord> {
    if label == NO_CHORD {
        return Ok(EncodedChord::NoChord);
    }
    if label == SKIP_CHORD {
        return Ok(EncodedChord::Unlabeled);
    }

    let parts = split(label)?;
    let root = pitch_class_to_semitone(&parts.root)?;

    let mut bitmap = match (parts.quality.as_str(), parts.extensions.is_empty()) {
        ("", true) => quality_to_bitmap("maj")?,
        ("", false) => quality_to_bitmap("1")?,
        (quality, _) => quality_to_bitmap(quality)?,
    };

    for ext in &parts.extensions {
        match ext.strip_prefix('*') {
            Some(omitted) => {
                let semitone = scale_degree_to_semitone(omitted)?.rem_euclid(12) as usize;
                bitmap[semitone] = false;
            }
            None => {
                let semitone = scale_degree_to_semitone(ext)?.rem_euclid(12) as usize;
                bitmap[semitone] = true;
            }
        }
    }

    let bass = if parts.bass.is_empty() {
        0
    } else {
        scale_degree_to_semitone(&parts.bass)?.rem_euclid(12) as usize
    };
    bitmap[bass] = true;

    Ok(EncodedChord::Chord { root, bitmap, bass })
}

/// Absolute pitch classes sounding in a label; `None` for unresolvable labels.
fn pitch_class_set(label: &str) -> Option<[bool; 12]> {
    match encode(label).ok()? {
        EncodedChord::NoChord => Some([false; 12]),
        EncodedChord::Unlabeled => None,
        EncodedChord::Chord { root, bitmap, .. } => {
            let mut pitches = [false; 12];
            for (interval, &on) in bitmap.iter().enumerate() {
                if on {
                    pitches[(root + interval) % 12] = true;
                }
            }
            Some(pitches)
        }
    }
}

/// Harte tonal-centroid projection of a 12-bin chroma vector.
pub fn chroma_to_tonnetz(chroma: &Array1<f32>) -> Array1<f32> {
    let total: f32 = chroma.iter().map(|v| v.abs()).sum();
    let mut tonnetz = Array1::<f32>::zeros(6);
    if total == 0.0 {
        return tonnetz;
    }

    // (radius, angle step) for fifths, minor thirds, major thirds
    let circles = [(1.0f32, 7.0 * PI / 6.0), (1.0, 3.0 * PI / 2.0), (0.5, 2.0 * PI / 3.0)];
    for (pitch, &energy) in chroma.iter().enumerate().take(12) {
        let l = pitch as f32;
        for (c, &(radius, step)) in circles.iter().enumerate() {
            tonnetz[2 * c] += radius * (l * step).sin() * energy;
            tonnetz[2 * c + 1] += radius * (l * step).cos() * energy;
        }
    }
    tonnetz / total
}

/// Mapping between chord labels and a fixed class vocabulary.
///
/// Only the vocabulary size and its ordered quality list are required; the
/// remaining mappings default to the root × quality enumeration with a final
/// no-chord class.
pub trait ChordVocabulary {
    /// Number of classes, including the trailing no-chord class
    fn vocab_dim(&self) -> usize;

    /// Ordered quality shorthands; class `q * 12 + root` uses quality `q`
    fn qualities(&self) -> &[&'static str];

    fn no_chord_index(&self) -> usize {
        self.vocab_dim() - 1
    }

    /// Class index of a label, or `None` for unlabeled/unknown chords.
    fn class_index(&self, label: &str) -> Option<usize> {
        match encode(label).ok()? {
            EncodedChord::NoChord => Some(self.no_chord_index()),
            EncodedChord::Unlabeled => None,
            EncodedChord::Chord { root, bitmap, .. } => self
                .qualities()
                .iter()
                .position(|q| quality_to_bitmap(q).map(|b| b == bitmap).unwrap_or(false))
                .map(|q| q * 12 + root),
        }
    }

    /// Quality index of a label; no-chord maps past the last quality.
    fn quality_index(&self, label: &str) -> Option<usize> {
        let idx = self.class_index(label)?;
        Some(idx / 12)
    }

    /// Label for a class index.
    fn index_to_label(&self, index: usize) -> Option<String> {
        if index == self.no_chord_index() {
            return Some(NO_CHORD.to_string());
        }
        let quality = self.qualities().get(index / 12)?;
        Some(format!("{}:{}", semitone_to_pitch_class((index % 12) as i32), quality))
    }

    /// Active pitch classes, `bins_per_pitch` bins per pitch with the first
    /// bin of each active pitch set to 1. Unlabeled or malformed labels come
    /// back filled with -1.
    fn chroma(&self, label: &str, bins_per_pitch: usize) -> Array1<f32> {
        let bins_per_pitch = bins_per_pitch.max(1);
        match pitch_class_set(label) {
            Some(pitches) => {
                let mut chroma = Array1::<f32>::zeros(12 * bins_per_pitch);
                for (pitch, &on) in pitches.iter().enumerate() {
                    if on {
                        chroma[pitch * bins_per_pitch] = 1.0;
                    }
                }
                chroma
            }
            None => Array1::from_elem(12 * bins_per_pitch, -1.0),
        }
    }

    /// 6-D tonal centroid of a label; `None` for unlabeled/malformed labels.
    fn tonnetz(&self, label: &str) -> Option<Array1<f32>> {
        let chroma = self.chroma(label, 1);
        if chroma.iter().any(|&v| v < 0.0) {
            return None;
        }
        Some(chroma_to_tonnetz(&chroma))
    }

    /// `(vocab_dim, vocab_dim)` Jaccard overlap between the pitch-class sets
    /// of every pair of classes. No-chord is affine only to itself.
    fn affinity_vectors(&self) -> Array2<f32> {
        let dim = self.vocab_dim();
        let sets: Vec<Option<[bool; 12]>> = (0..dim)
            .map(|i| self.index_to_label(i).and_then(|l| pitch_class_set(&l)))
            .collect();

        Array2::from_shape_fn((dim, dim), |(i, j)| match (&sets[i], &sets[j]) {
            (Some(a), Some(b)) => {
                let union = a.iter().zip(b).filter(|(x, y)| **x || **y).count();
                let inter = a.iter().zip(b).filter(|(x, y)| **x && **y).count();
                if union == 0 {
                    1.0
                } else {
                    inter as f32 / union as f32
                }
            }
            _ => 0.0,
        })
    }
}

impl<V: ChordVocabulary + ?Sized> ChordVocabulary for &V {
    fn vocab_dim(&self) -> usize {
        (**self).vocab_dim()
    }

    fn qualities(&self) -> &[&'static str] {
        (**self).qualities()
    }

    fn no_chord_index(&self) -> usize {
        (**self).no_chord_index()
    }

    fn class_index(&self, label: &str) -> Option<usize> {
        (**self).class_index(label)
    }

    fn quality_index(&self, label: &str) -> Option<usize> {
        (**self).quality_index(label)
    }

    fn index_to_label(&self, index: usize) -> Option<String> {
        (**self).index_to_label(index)
    }

    fn chroma(&self, label: &str, bins_per_pitch: usize) -> Array1<f32> {
        (**self).chroma(label, bins_per_pitch)
    }

    fn tonnetz(&self, label: &str) -> Option<Array1<f32>> {
        (**self).tonnetz(label)
    }

    fn affinity_vectors(&self) -> Array2<f32> {
        (**self).affinity_vectors()
    }
}

/// Root × quality vocabulary in Harte syntax (25, 61 or 157 classes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarteVocabulary {
    vocab_dim: usize,
    qualities: &'static [&'static str],
}

impl HarteVocabulary {
    pub fn new(vocab_dim: usize) -> ChordResult<Self> {
        let qualities = match vocab_dim {
            25 => QUALITIES_25,
            61 => QUALITIES_61,
            157 => QUALITIES_157,
            other => return Err(ChordError::UnsupportedVocabulary(other)),
        };
        Ok(Self {
            vocab_dim,
            qualities,
        })
    }
}

impl ChordVocabulary for HarteVocabulary {
    fn vocab_dim(&self) -> usize {
        self.vocab_dim
    }

    fn qualities(&self) -> &[&'static str] {
        self.qualities
    }
}
