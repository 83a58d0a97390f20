//! Lazy stream stages
//!
//! Every stage consumes an iterator of [`Sample`]s and yields another, one
//! record at a time. Skips pass through untouched and are never inspected;
//! a record whose label cannot be resolved becomes a skip rather than an
//! error, so streams zipped against this one stay in lockstep.
//!
//! Stochastic stages own their random number generator and draw fresh
//! values for every record.
//!
//! [`Sample`]: crate::entity::Sample

pub mod contrastive;
pub mod corrupt;
pub mod reshape;
pub mod shift;
pub mod targets;

pub use contrastive::unpack_contrastive_pairs;
pub use corrupt::{awgn, binomial_mask, drop_frames};
pub use reshape::{concatenate, reshape, transpose, wrap_cqt};
pub use shift::{
    pitch_shift, pitch_shift_chroma, pitch_shift_cqt, rotate_chord_to_root,
    rotate_chroma_to_root, shift_entity, ShiftMode,
};
pub use targets::{
    chord_index_to_affinity_vectors, chord_index_to_onehot_vectors, chord_index_to_tonnetz,
    chord_index_to_tonnetz_distance, map_to_chord_index, map_to_chord_quality_index,
    map_to_chroma, map_to_class_index, map_to_joint_index, note_numbers_to_chroma,
    note_numbers_to_pitch,
};
