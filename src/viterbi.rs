//! Viterbi decoding over a posteriorgram
//!
//! Finds the maximum-likelihood state path through a sequence of per-frame
//! state posteriors, given a transition model and an optional prior. Deltas
//! are re-normalized at every step (scaled decoding), so long sequences never
//! underflow.
//!
//! # Example
//!
//! ```
//! use chordfx::viterbi::viterbi;
//! use ndarray::array;
//!
//! let posterior = array![[0.8, 0.2], [0.4, 0.6], [0.7, 0.3]];
//! let transition = array![[0.9, 0.1], [0.1, 0.9]];
//! let path = viterbi(&posterior, &transition, None, 0.0)?;
//! assert_eq!(path, vec![0, 0, 0]);
//! # Ok::<(), chordfx::ChordError>(())
//! ```

use crate::error::{ChordError, Result as ChordResult};
use crate::util::{argmax, eye, normalize};
use ndarray::{Array1, Array2, Axis};

/// Epsilon offset for logarithms (2^-10)
pub const LOG_EPSILON: f64 = 1.0 / 1024.0;

/// Logarithm with a built-in epsilon offset, finite for exact zeros.
pub fn safe_log(x: f64) -> f64 {
    (x + LOG_EPSILON).ln()
}

/// Scale every off-diagonal transition by `exp(penalty)`.
///
/// A penalty of 0 leaves the matrix unchanged; negative penalties favor
/// staying in the current state.
pub fn apply_penalty(transition: &Array2<f64>, penalty: f64) -> Array2<f64> {
    let num_states = transition.nrows();
    let identity = eye(num_states);
    let offset = Array2::<f64>::ones((num_states, num_states)) - &identity;
    let scaling = offset * penalty.exp() + &identity;
    scaling * transition
}

fn validate_inputs(
    posterior: &Array2<f64>,
    transition: &Array2<f64>,
    prior: Option<&Array1<f64>>,
) -> ChordResult<()> {
    let (num_obs, num_states) = posterior.dim();
    if num_obs == 0 || num_states == 0 {
        return Err(ChordError::InputValidationError(format!(
            "posterior must be non-empty, got shape ({}, {})",
            num_obs, num_states
        )));
    }
    if transition.dim() != (num_states, num_states) {
        return Err(ChordError::ShapeMismatch(format!(
            "transition matrix must be ({0}, {0}), got {1:?}",
            num_states,
            transition.dim()
        )));
    }
    if let Some(prior) = prior {
        if prior.len() != num_states {
            return Err(ChordError::ShapeMismatch(format!(
                "prior must have {} states, got {}",
                num_states,
                prior.len()
            )));
        }
    }
    if posterior.iter().any(|&p| p < 0.0 || p.is_nan()) {
        return Err(ChordError::InputValidationError(
            "posterior contains negative or NaN entries".to_string(),
        ));
    }
    Ok(())
}

/// Find the optimal Viterbi path through a posteriorgram.
///
/// # Arguments
///
/// * `posterior` - `(num_obs, num_states)` observation likelihoods,
///   `posterior[t, i] = Pr(y(t) | Q(t) = i)`; rows are normalized internally
/// * `transition` - `(num_states, num_states)` matrix,
///   `transition[i, j] = Pr(Q(t + 1) = j | Q(t) = i)`
/// * `prior` - Initial state distribution; uniform when `None`
/// * `penalty` - Log-scale factor applied to off-diagonal transitions
///
/// # Returns
///
/// State indices, one per observation.
///
/// # Errors
///
/// Returns `ChordError` if the posterior is empty or has negative entries,
/// or if the transition matrix or prior disagree with the number of states.
pub fn viterbi(
    posterior: &Array2<f64>,
    transition: &Array2<f64>,
    prior: Option<&Array1<f64>>,
    penalty: f64,
) -> ChordResult<Vec<usize>> {
    validate_inputs(posterior, transition, prior)?;
    let (num_obs, num_states) = posterior.dim();

    let posterior = normalize(posterior, Some(Axis(1)));
    let transition = apply_penalty(transition, penalty);
    let prior = match prior {
        Some(p) => p.to_owned(),
        None => Array1::from_elem(num_states, 1.0 / num_states as f64),
    };

    let mut delta = Array2::<f64>::zeros((num_obs, num_states));
    let mut psi = Array2::<usize>::zeros((num_obs, num_states));

    let initial = &prior * &posterior.row(0);
    delta.row_mut(0).assign(&normalize(&initial, None));

    for t in 1..num_obs {
        let mut step = Array1::<f64>::zeros(num_states);
        for next in 0..num_states {
            let incoming = (0..num_states).map(|prev| delta[[t - 1, prev]] * transition[[prev, next]]);
            let best_prev = argmax(incoming).unwrap_or(0);
            psi[[t, next]] = best_prev;
            step[next] = delta[[t - 1, best_prev]] * transition[[best_prev, next]] * posterior[[t, next]];
        }
        delta.row_mut(t).assign(&normalize(&step, None));
    }

    let mut path = vec![0usize; num_obs];
    path[num_obs - 1] = argmax(delta.row(num_obs - 1).iter().cloned()).unwrap_or(0);
    for t in (0..num_obs - 1).rev() {
        path[t] = psi[[t + 1, path[t + 1]]];
    }

    log::debug!(
        "Decoded {} observations over {} states (penalty={})",
        num_obs,
        num_states,
        penalty
    );

    Ok(path)
}

/// Log-likelihood of a state path under the (row-normalized) posterior,
/// penalized transitions and prior, using [`safe_log`] throughout.
pub fn path_log_likelihood(
    posterior: &Array2<f64>,
    transition: &Array2<f64>,
    prior: Option<&Array1<f64>>,
    penalty: f64,
    path: &[usize],
) -> ChordResult<f64> {
    validate_inputs(posterior, transition, prior)?;
    let (num_obs, num_states) = posterior.dim();
    if path.len() != num_obs {
        return Err(ChordError::ShapeMismatch(format!(
            "path length {} does not match {} observations",
            path.len(),
            num_obs
        )));
    }
    if let Some(&bad) = path.iter().find(|&&s| s >= num_states) {
        return Err(ChordError::InputValidationError(format!(
            "state {} out of range for {} states",
            bad, num_states
        )));
    }

    let posterior = normalize(posterior, Some(Axis(1)));
    let transition = apply_penalty(transition, penalty);
    let initial = match prior {
        Some(p) => p[path[0]],
        None => 1.0 / num_states as f64,
    };

    let mut score = safe_log(initial) + safe_log(posterior[[0, path[0]]]);
    for t in 1..num_obs {
        score += safe_log(transition[[path[t - 1], path[t]]]);
        score += safe_log(posterior[[t, path[t]]]);
    }
    Ok(score)
}
