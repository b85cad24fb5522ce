//! Limited-memory quasi-Newton minimization.

use std::collections::VecDeque;

use crate::errors::{Result, TagwiseError};
use crate::objective::{Objective, Point};

/// Parameters of [`Minimizer`].
#[derive(Clone, Debug, PartialEq)]
pub struct MinimizerConfig {
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,

    /// Convergence is not tested before this many iterations have run.
    pub min_iterations: usize,

    /// Relative improvement under which the search is considered converged. Also used as the
    /// sufficient-decrease constant of the line search.
    pub tolerance: f64,

    /// Smallest step the line search tries before giving up.
    pub epsilon: f64,

    /// Number of `(Δpoint, Δgradient)` pairs kept for the inverse Hessian approximation.
    pub history_size: usize,

    /// Step shrink factor during the first iteration, where the curvature is unknown.
    pub initial_step_multiplier: f64,

    /// Step shrink factor in subsequent iterations.
    pub step_multiplier: f64,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            min_iterations: 0,
            tolerance: 1e-4,
            epsilon: 1e-10,
            history_size: 10,
            initial_step_multiplier: 0.01,
            step_multiplier: 0.5,
        }
    }
}

/// L-BFGS minimizer with a backtracking line search.
///
/// # Examples
///
/// ```
/// use tagwise::{Minimizer, MinimizerConfig, Objective, Result, WeightedMap};
///
/// // f(x) = (x - 3)^2
/// struct Parabola;
///
/// impl Objective for Parabola {
///     type Point = WeightedMap<&'static str>;
///
///     fn value(&mut self, p: &Self::Point) -> Result<f64> {
///         Ok((p.get("x") - 3.0).powi(2))
///     }
///
///     fn value_and_gradient(&mut self, p: &Self::Point) -> Result<(f64, Self::Point)> {
///         let gradient = [("x", 2.0 * (p.get("x") - 3.0))].into_iter().collect();
///         Ok((self.value(p)?, gradient))
///     }
/// }
///
/// let minimizer = Minimizer::new(MinimizerConfig::default());
/// let minimum = minimizer.minimize(&mut Parabola, WeightedMap::new()).unwrap();
/// assert!((minimum.get("x") - 3.0).abs() < 1e-3);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Minimizer {
    config: MinimizerConfig,
}

impl Minimizer {
    pub const fn new(config: MinimizerConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &MinimizerConfig {
        &self.config
    }

    /// Searches a local minimum of `function` starting from `start`.
    ///
    /// # Errors
    ///
    /// Errors of `function` are propagated. [`TagwiseError::CurvatureViolation`] is returned if a
    /// stored history pair has zero curvature.
    pub fn minimize<F>(&self, function: &mut F, start: F::Point) -> Result<F::Point>
    where
        F: Objective,
    {
        let config = &self.config;
        let mut point = start;
        if config.max_iterations == 0 {
            return Ok(point);
        }
        let mut history: VecDeque<(F::Point, F::Point)> =
            VecDeque::with_capacity(config.history_size);
        let mut iteration = 0;
        loop {
            let (value, gradient) = function.value_and_gradient(&point)?;
            if gradient.dot(&gradient) == 0.0 {
                tracing::info!(iteration, value, "reached a stationary point");
                return Ok(point);
            }

            let hessian_scale = match history.back() {
                Some((point_delta, gradient_delta)) => {
                    let norm = gradient_delta.dot(gradient_delta);
                    if norm == 0.0 {
                        return Err(TagwiseError::curvature_violation(
                            "the last gradient change is zero",
                        ));
                    }
                    gradient_delta.dot(point_delta) / norm
                }
                None => 1.0,
            };
            let mut direction = implicit_multiply(hessian_scale, &gradient, &history)?;
            direction.scale(-1.0);

            let step_multiplier = if iteration == 0 {
                config.initial_step_multiplier
            } else {
                config.step_multiplier
            };
            let next_point =
                self.line_minimize(function, &point, value, &gradient, &direction, step_multiplier)?;

            let next_point = match next_point {
                Some(next_point) => next_point,
                None => {
                    iteration += 1;
                    if history.is_empty() || iteration >= config.max_iterations {
                        tracing::info!(
                            iteration,
                            value,
                            "line search stalled; returning the current point"
                        );
                        return Ok(point);
                    }
                    tracing::debug!(iteration, "line search stalled; clearing the history");
                    history.clear();
                    continue;
                }
            };

            let (next_value, next_gradient) = function.value_and_gradient(&next_point)?;
            let converged = iteration > config.min_iterations
                && converged(value, next_value, config.tolerance, config.epsilon);

            if config.history_size != 0 {
                if history.len() == config.history_size {
                    history.pop_front();
                }
                let mut point_delta = next_point.clone();
                point_delta.add_scaled(&point, -1.0);
                let mut gradient_delta = next_gradient;
                gradient_delta.add_scaled(&gradient, -1.0);
                history.push_back((point_delta, gradient_delta));
            }

            point = next_point;
            iteration += 1;
            tracing::debug!(iteration, value = next_value, "finished an iteration");

            if converged || iteration >= config.max_iterations {
                tracing::info!(iteration, value = next_value, converged, "minimization finished");
                return Ok(point);
            }
        }
    }

    /// Backtracks along `direction` until the sufficient-decrease condition holds.
    ///
    /// Returns `None` when the step falls under `epsilon`.
    fn line_minimize<F>(
        &self,
        function: &mut F,
        start: &F::Point,
        value: f64,
        gradient: &F::Point,
        direction: &F::Point,
        step_multiplier: f64,
    ) -> Result<Option<F::Point>>
    where
        F: Objective,
    {
        let derivative = direction.dot(gradient);
        let mut step_size = 1.0;
        loop {
            let mut guess = start.clone();
            guess.add_scaled(direction, step_size);
            let guess_value = function.value(&guess)?;
            if guess_value <= value + self.config.tolerance * derivative * step_size {
                return Ok(Some(guess));
            }
            step_size *= step_multiplier;
            if step_size < self.config.epsilon {
                tracing::debug!(value, "line search step underflowed");
                return Ok(None);
            }
        }
    }
}

fn converged(value: f64, next_value: f64, tolerance: f64, epsilon: f64) -> bool {
    let average = (value.abs() + next_value.abs()) / 2.0 + epsilon;
    (value - next_value).abs() / average < tolerance
}

/// Multiplies `gradient` by the implicit inverse Hessian approximation (two-loop recursion).
fn implicit_multiply<P>(hessian_scale: f64, gradient: &P, history: &VecDeque<(P, P)>) -> Result<P>
where
    P: Point,
{
    let mut rhos = Vec::with_capacity(history.len());
    let mut alphas = Vec::with_capacity(history.len());
    let mut right = gradient.clone();
    for (point_delta, gradient_delta) in history.iter().rev() {
        let rho = point_delta.dot(gradient_delta);
        if rho == 0.0 {
            return Err(TagwiseError::curvature_violation(
                "a history pair has zero curvature",
            ));
        }
        let alpha = point_delta.dot(&right) / rho;
        right.add_scaled(gradient_delta, -alpha);
        rhos.push(rho);
        alphas.push(alpha);
    }

    let mut left = right;
    left.scale(hessian_scale);
    for ((point_delta, gradient_delta), (alpha, rho)) in history
        .iter()
        .zip(alphas.into_iter().rev().zip(rhos.into_iter().rev()))
    {
        let beta = gradient_delta.dot(&left) / rho;
        left.add_scaled(point_delta, alpha - beta);
    }
    Ok(left)
}
