//! Small numeric utilities shared by pooling, decoding and the pipeline stages

use crate::error::{ChordError, Result as ChordResult};
use ndarray::{s, Array, Array2, Array3, ArrayBase, Axis, Data, Dimension, RemoveAxis};
use std::collections::BTreeMap;

/// Normalize an array to sum to 1, either along `axis` or over the whole array.
///
/// Zero sums are replaced by a divisor of 1, so all-zero lanes stay zero
/// instead of turning into NaN.
pub fn normalize<S, D>(x: &ArrayBase<S, D>, axis: Option<Axis>) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    match axis {
        Some(axis) => {
            let mut out = x.to_owned();
            for mut lane in out.lanes_mut(axis) {
                let total = lane.sum();
                let scalar = if total == 0.0 { 1.0 } else { total };
                lane.mapv_inplace(|v| v / scalar);
            }
            out
        }
        None => {
            let total = x.sum();
            let scalar = if total == 0.0 { 1.0 } else { total };
            x.mapv(|v| v / scalar)
        }
    }
}

/// Test whether each element of `ar1` is present in `ar2`.
///
/// Returns a boolean array with the shape of `ar1`.
pub fn inarray<A, S, D>(ar1: &ArrayBase<S, D>, ar2: &[A]) -> Array<bool, D>
where
    A: PartialEq,
    S: Data<Elem = A>,
    D: Dimension,
{
    ar1.map(|value| ar2.contains(value))
}

/// Label the partitions of `obj` with `mapper`, keeping the same keys.
pub fn partition<K, V, L, F>(obj: &BTreeMap<K, V>, mut mapper: F) -> BTreeMap<K, L>
where
    K: Ord + Clone,
    F: FnMut(&V) -> L,
{
    obj.iter()
        .map(|(key, value)| (key.clone(), mapper(value)))
        .collect()
}

/// Index a collection of partition label arrays, filtered by a set of labels.
///
/// Keys whose array contains none of `label_set` are left out.
pub fn index_partition_arrays<K, L, S>(
    partition_labels: &BTreeMap<K, ArrayBase<S, ndarray::Ix1>>,
    label_set: &[L],
) -> BTreeMap<K, Vec<usize>>
where
    K: Ord + Clone,
    L: PartialEq,
    S: Data<Elem = L>,
{
    let mut index = BTreeMap::new();
    for (key, labels) in partition_labels {
        let in_array = inarray(labels, label_set);
        let matches: Vec<usize> = in_array
            .iter()
            .enumerate()
            .filter(|(_, &hit)| hit)
            .map(|(i, _)| i)
            .collect();
        if !matches.is_empty() {
            index.insert(key.clone(), matches);
        }
    }
    index
}

/// Most frequent value; ties go to the smallest value.
pub fn mode<T>(values: &[T]) -> Option<T>
where
    T: PartialOrd + Copy,
{
    let counts = distinct_counts(values);
    counts
        .iter()
        .fold(None, |best: Option<(T, usize)>, &(value, count)| match best {
            None => Some((value, count)),
            Some((best_value, best_count)) => {
                if count > best_count || (count == best_count && value < best_value) {
                    Some((value, count))
                } else {
                    Some((best_value, best_count))
                }
            }
        })
        .map(|(value, _)| value)
}

/// Most frequent value; ties go to the value encountered first.
pub fn mode2<T>(values: &[T]) -> Option<T>
where
    T: PartialEq + Copy,
{
    let counts = distinct_counts(values);
    let mut best: Option<(T, usize)> = None;
    for &(value, count) in &counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

/// Distinct values in first-occurrence order, with their counts.
fn distinct_counts<T: PartialEq + Copy>(values: &[T]) -> Vec<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for &value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts
}

/// Circularly shift an array along `axis`.
///
/// A positive shift moves content toward higher indices.
pub fn circshift<A, S, D>(x: &ArrayBase<S, D>, axis: Axis, shift: isize) -> Array<A, D>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    let mut out = x.to_owned();
    let n = x.len_of(axis);
    if n == 0 {
        return out;
    }
    let shift = shift.rem_euclid(n as isize) as usize;
    if shift == 0 {
        return out;
    }
    for i in 0..n {
        out.index_axis_mut(axis, (i + shift) % n)
            .assign(&x.index_axis(axis, i));
    }
    out
}

/// Shift an array along `axis` without wrapping; vacated cells take `fill`.
pub fn translate<A, S, D>(x: &ArrayBase<S, D>, axis: Axis, shift: isize, fill: A) -> Array<A, D>
where
    A: Clone,
    S: Data<Elem = A>,
    D: Dimension + RemoveAxis,
{
    let mut out = Array::from_elem(x.raw_dim(), fill);
    let n = x.len_of(axis) as isize;
    for i in 0..n {
        let dst = i + shift;
        if (0..n).contains(&dst) {
            out.index_axis_mut(axis, dst as usize)
                .assign(&x.index_axis(axis, i as usize));
        }
    }
    out
}

/// Fold a `[T, F]` array into overlapping `[n, length, F]` windows.
pub fn fold_array<A, S>(
    x: &ArrayBase<S, ndarray::Ix2>,
    length: usize,
    stride: usize,
) -> ChordResult<Array3<A>>
where
    A: Clone,
    S: Data<Elem = A>,
{
    if length == 0 || stride == 0 {
        return Err(ChordError::InputValidationError(format!(
            "window length and stride must be positive (length={}, stride={})",
            length, stride
        )));
    }

    let (num_frames, num_bins) = x.dim();
    let num_windows = if num_frames >= length {
        (num_frames - length) / stride + 1
    } else {
        0
    };

    let mut data = Vec::with_capacity(num_windows * length * num_bins);
    for w in 0..num_windows {
        let start = w * stride;
        data.extend(x.slice(s![start..start + length, ..]).iter().cloned());
    }

    Ok(Array3::from_shape_vec((num_windows, length, num_bins), data)?)
}

/// Index of the first maximum value.
pub(crate) fn argmax(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Reject a probability that is non-finite or outside `[0, 1]`.
pub(crate) fn check_probability(name: &str, p: f64) -> ChordResult<f64> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(ChordError::InputValidationError(format!(
            "{} must be a probability in [0, 1], got {}",
            name, p
        )))
    }
}

/// Identity matrix as `f64`.
pub(crate) fn eye(n: usize) -> Array2<f64> {
    Array2::eye(n)
}
