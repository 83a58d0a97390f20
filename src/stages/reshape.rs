//! Windowing and array-field reshaping stages

use crate::entity::{Entity, Field, Sample};
use crate::util::fold_array;
use ndarray::{concatenate as nd_concatenate, ArrayD, Axis, Ix2, IxDyn};

/// Fold each record's single-channel `[1, T, F]` features into overlapping
/// `[n, length, F]` windows.
///
/// Arrays without exactly one leading channel are logged and skipped.
pub fn wrap_cqt<I>(stream: I, length: usize, stride: usize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            let (key, data) = match entity.take_features() {
                Some(features) => features,
                None => return Sample::Skip,
            };
            if data.ndim() != 3 || data.shape()[0] != 1 {
                log::warn!(
                    "wrap_cqt expects a [1, T, F] array, got {:?}",
                    data.shape()
                );
                return Sample::Skip;
            }
            let frames = match data.index_axis(Axis(0), 0).into_dimensionality::<Ix2>() {
                Ok(frames) => frames,
                Err(e) => {
                    log::warn!("wrap_cqt: {}", e);
                    return Sample::Skip;
                }
            };
            match fold_array(&frames, length, stride) {
                Ok(windows) => {
                    entity.set(key, windows.into_dyn());
                    Sample::Record(entity)
                }
                Err(e) => {
                    log::warn!("wrap_cqt: {}", e);
                    Sample::Skip
                }
            }
        })
    })
}

/// Resolve a possibly negative axis against `ndim`.
fn resolve_axis(axis: isize, ndim: usize) -> Option<Axis> {
    let resolved = if axis < 0 { ndim as isize + axis } else { axis };
    (0..ndim as isize)
        .contains(&resolved)
        .then(|| Axis(resolved as usize))
}

/// Apply `op` to the array field `key`, skipping records where it fails.
fn map_array_field<I, F>(stream: I, key: String, mut op: F) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
    F: FnMut(ArrayD<f32>) -> Result<ArrayD<f32>, String>,
{
    stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity: Entity| {
            let data = match entity.remove(&key) {
                Some(Field::Array(data)) => data,
                _ => {
                    log::warn!("Record has no array field '{}'", key);
                    return Sample::Skip;
                }
            };
            match op(data) {
                Ok(data) => {
                    entity.set(&key, data);
                    Sample::Record(entity)
                }
                Err(e) => {
                    log::warn!("Field '{}': {}", key, e);
                    Sample::Skip
                }
            }
        })
    })
}

/// Duplicate the array field `key` along `axis` (negative axes count from the end).
pub fn concatenate<I>(stream: I, key: &str, axis: isize) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    map_array_field(stream, key.to_string(), move |data| {
        let axis = resolve_axis(axis, data.ndim())
            .ok_or_else(|| format!("axis {} out of range for {} dims", axis, data.ndim()))?;
        nd_concatenate(axis, &[data.view(), data.view()]).map_err(|e| e.to_string())
    })
}

/// Reshape the array field `key` to `new_shape`.
pub fn reshape<I>(stream: I, key: &str, new_shape: Vec<usize>) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    map_array_field(stream, key.to_string(), move |data| {
        data.as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&new_shape))
            .map_err(|e| e.to_string())
    })
}

/// Permute the axes of the array field `key`.
pub fn transpose<I>(stream: I, key: &str, axes: Vec<usize>) -> impl Iterator<Item = Sample>
where
    I: IntoIterator<Item = Sample>,
{
    map_array_field(stream, key.to_string(), move |data| {
        let mut sorted = axes.clone();
        sorted.sort_unstable();
        if sorted != (0..data.ndim()).collect::<Vec<_>>() {
            return Err(format!(
                "axes {:?} are not a permutation of {} dims",
                axes,
                data.ndim()
            ));
        }
        Ok(data.permuted_axes(IxDyn(&axes)))
    })
}
