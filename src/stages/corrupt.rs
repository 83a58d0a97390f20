//! Stochastic corruption of feature arrays

use crate::entity::Sample;
use crate::error::{ChordError, Result as ChordResult};
use crate::util::check_probability;
use ndarray::{ArrayD, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Time (frame) axis of a feature array: second-to-last, or the only axis.
fn frame_axis(data: &ArrayD<f32>) -> Axis {
    Axis(data.ndim().saturating_sub(2))
}

/// Apply a random binomial mask to each record's features.
///
/// Per record a dropout rate `U(0, 1) * max_dropout` is drawn, and every
/// element survives with probability `1 - rate`.
///
/// # Errors
///
/// Returns `InputValidationError` unless `max_dropout` is in `[0, 1]`.
pub fn binomial_mask<I, R>(
    stream: I,
    max_dropout: f64,
    mut rng: R,
) -> ChordResult<impl Iterator<Item = Sample>>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    let max_dropout = check_probability("max_dropout", max_dropout)?;
    Ok(stream.into_iter().map(move |sample| {
        sample.map(|mut entity| {
            if let Some(data) = entity.features_mut() {
                let keep = 1.0 - rng.gen::<f64>() * max_dropout;
                data.mapv_inplace(|v| if rng.gen_bool(keep) { v } else { 0.0 });
            }
            entity
        })
    }))
}

/// Add scaled Gaussian noise to each record's features.
///
/// Noise is drawn elementwise from `N(mu, sigma)` and multiplied by a single
/// per-record factor drawn from `N(0, scale_sigma)`.
///
/// # Errors
///
/// Returns `InputValidationError` if either deviation is negative or not
/// finite, or if `mu` is not finite.
pub fn awgn<I, R>(
    stream: I,
    mu: f64,
    sigma: f64,
    scale_sigma: f64,
    mut rng: R,
) -> ChordResult<impl Iterator<Item = Sample>>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    if !mu.is_finite() {
        return Err(ChordError::InputValidationError(format!(
            "mu must be finite, got {}",
            mu
        )));
    }
    for (name, value) in [("sigma", sigma), ("scale_sigma", scale_sigma)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ChordError::InputValidationError(format!(
                "{} must be a finite non-negative deviation, got {}",
                name, value
            )));
        }
    }
    let noise = Normal::new(mu, sigma).map_err(|e| {
        ChordError::InputValidationError(format!("invalid noise distribution: {}", e))
    })?;
    let scale = Normal::new(0.0, scale_sigma).map_err(|e| {
        ChordError::InputValidationError(format!("invalid noise scale distribution: {}", e))
    })?;

    Ok(stream.into_iter().map(move |sample| {
        sample.map(|mut entity| {
            if let Some(data) = entity.features_mut() {
                let factor = scale.sample(&mut rng);
                data.mapv_inplace(|v| v + (noise.sample(&mut rng) * factor) as f32);
            }
            entity
        })
    }))
}

/// Zero out random frames of each record's features.
///
/// A per-record rate `U(0, 1) * max_dropout` is drawn and each frame along
/// the time axis is dropped with that probability; the center frame is
/// always kept. Records with scalar (0-d) features have no frames and
/// become skips.
///
/// # Errors
///
/// Returns `InputValidationError` unless `max_dropout` is in `[0, 1]`.
pub fn drop_frames<I, R>(
    stream: I,
    max_dropout: f64,
    mut rng: R,
) -> ChordResult<impl Iterator<Item = Sample>>
where
    I: IntoIterator<Item = Sample>,
    R: Rng,
{
    let max_dropout = check_probability("max_dropout", max_dropout)?;
    Ok(stream.into_iter().map(move |sample| {
        sample.and_then(|mut entity| {
            if let Some(data) = entity.features_mut() {
                if data.ndim() == 0 {
                    log::warn!("Cannot drop frames from 0-d features; skipping record");
                    return Sample::Skip;
                }
                let axis = frame_axis(data);
                let num_frames = data.len_of(axis);
                let rate = rng.gen::<f64>() * max_dropout;
                for frame in 0..num_frames {
                    if frame == num_frames / 2 {
                        continue;
                    }
                    if rng.gen_bool(rate) {
                        data.index_axis_mut(axis, frame).fill(0.0);
                    }
                }
            }
            Sample::Record(entity)
        })
    }))
}
