//! Boundary pooling
//!
//! Aggregates a time-indexed array into segments bounded by a sequence of
//! edge indices, reducing each segment with a configurable reducer.
//!
//! # Example
//!
//! ```
//! use chordfx::pooling::{boundary_pool, PoolFunc};
//! use ndarray::array;
//!
//! let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn();
//! let z = boundary_pool(&x, &[0, 0, 3], 0, PoolFunc::Mean)?;
//! assert_eq!(z.shape(), &[2, 2]);
//! assert_eq!(z[[0, 0]], 1.0);
//! assert_eq!(z[[1, 0]], 3.0);
//! # Ok::<(), chordfx::ChordError>(())
//! ```

use crate::error::{ChordError, Result as ChordResult};
use crate::util::mode2;
use ndarray::{ArrayD, ArrayView1, ArrayViewD, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Segment reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolFunc {
    Mean,
    Median,
    Max,
    /// Most frequent value, ties broken by first occurrence
    Mode,
}

impl PoolFunc {
    pub fn name(&self) -> &'static str {
        match self {
            PoolFunc::Mean => "mean",
            PoolFunc::Median => "median",
            PoolFunc::Max => "max",
            PoolFunc::Mode => "mode",
        }
    }

    fn reduce(&self, lane: ArrayView1<f64>) -> f64 {
        match self {
            PoolFunc::Mean => lane.sum() / lane.len() as f64,
            PoolFunc::Median => {
                let mut values: Vec<f64> = lane.to_vec();
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
            PoolFunc::Max => lane.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            PoolFunc::Mode => mode2(&lane.to_vec()).unwrap_or(f64::NAN),
        }
    }
}

impl FromStr for PoolFunc {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(PoolFunc::Mean),
            "median" => Ok(PoolFunc::Median),
            "max" => Ok(PoolFunc::Max),
            "mode" => Ok(PoolFunc::Mode),
            other => Err(ChordError::UnsupportedReducer(other.to_string())),
        }
    }
}

/// Pool the values of an array, bounded by a set of edges.
///
/// # Arguments
///
/// * `x_in` - Array to pool, shape `(n_points, ...)` along `axis`
/// * `index_edges` - Non-decreasing boundary indices, each in `0..=n_points`
/// * `axis` - Axis to pool over
/// * `pool_func` - Reducer applied to each segment
///
/// # Returns
///
/// Array with `index_edges.len() - 1` entries along `axis`. A zero-width
/// segment takes the single slice at its start edge, unreduced.
///
/// # Errors
///
/// Returns `ChordError::InputValidationError` if the edges decrease, an edge
/// falls outside the array, or `axis` is out of range.
pub fn boundary_pool(
    x_in: &ArrayD<f64>,
    index_edges: &[usize],
    axis: usize,
    pool_func: PoolFunc,
) -> ChordResult<ArrayD<f64>> {
    let ndim = x_in.ndim();
    if axis >= ndim {
        return Err(ChordError::InputValidationError(format!(
            "axis {} out of range for array with {} dimensions",
            axis, ndim
        )));
    }

    // Bring the pooled axis to the front
    let mut axes_order: Vec<usize> = (0..ndim).collect();
    let pooled = axes_order.remove(axis);
    axes_order.insert(0, pooled);
    let mut axes_reorder = vec![0; ndim];
    for (position, &original) in axes_order.iter().enumerate() {
        axes_reorder[original] = position;
    }

    let x = x_in.view().permuted_axes(IxDyn(&axes_order));
    let num_points = x.len_of(Axis(0));
    let num_segments = index_edges.len().saturating_sub(1);

    let mut segments: Vec<ArrayD<f64>> = Vec::with_capacity(num_segments);
    for (idx, pair) in index_edges.windows(2).enumerate() {
        let (start, end) = (pair[0], pair[1]);
        if end < start {
            return Err(ChordError::InputValidationError(format!(
                "`index_edges` must be monotonically increasing (edge {} = {} > edge {} = {})",
                idx,
                start,
                idx + 1,
                end
            )));
        }
        if end > num_points || (start == end && start >= num_points) {
            return Err(ChordError::InputValidationError(format!(
                "edge {} out of range for {} points",
                end.max(start),
                num_points
            )));
        }

        let segment = if end > start {
            pool_segment(x.slice_axis(Axis(0), (start..end).into()), pool_func)
        } else {
            x.index_axis(Axis(0), start).to_owned()
        };
        segments.push(segment);
    }

    let mut out_shape = vec![num_segments];
    out_shape.extend_from_slice(&x.shape()[1..]);
    let pooled = if segments.is_empty() {
        ArrayD::zeros(IxDyn(&out_shape))
    } else {
        let views: Vec<ArrayViewD<f64>> = segments.iter().map(|s| s.view()).collect();
        ndarray::stack(Axis(0), &views)?
    };

    log::debug!(
        "Pooled {} points into {} segments with {}",
        num_points,
        num_segments,
        pool_func.name()
    );

    Ok(pooled
        .permuted_axes(IxDyn(&axes_reorder))
        .as_standard_layout()
        .to_owned())
}

fn pool_segment(segment: ArrayViewD<f64>, pool_func: PoolFunc) -> ArrayD<f64> {
    segment.map_axis(Axis(0), |lane| pool_func.reduce(lane))
}
