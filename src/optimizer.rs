//! Two-stage MAP search over the rating vector.
//!
//! BFGS runs first from the jittered, boundary-closed seeds. If it stops
//! without reaching the gradient tolerance (or the line search errors out),
//! Nelder-Mead restarts from the un-jittered seeds. A Nelder-Mead failure is
//! fatal for the tournament.

use std::fmt;

use argmin::core::observers::{Observe, ObserverMode};
use argmin::core::{
    CostFunction, Error as ArgminError, Executor, Gradient, KV, State, TerminationReason,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::BFGS;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collection::{Collection, PlayerIndex};
use crate::config::EngineConfig;
use crate::error::RatingError;
use crate::likelihood::Posterior;
use crate::rank::open_boundary;
use crate::uncertainty::estimate_sigmas;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub gradient_tolerance: f64,
    pub gradient_max_iters: u64,
    /// Upper bound of the uniform jitter added to the BFGS starting point.
    pub jitter: f64,
    pub simplex_step: f64,
    pub simplex_tolerance: f64,
    pub simplex_max_iters: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            gradient_tolerance: 1e-3,
            gradient_max_iters: 10_000,
            jitter: 0.1,
            simplex_step: 2.0,
            simplex_tolerance: 1e-5,
            simplex_max_iters: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gradient,
    Simplex,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Gradient => write!(f, "gradient"),
            Stage::Simplex => write!(f, "simplex"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub iterations: u64,
    pub converged: bool,
    /// Log-posterior at the final point.
    pub log_posterior: f64,
    pub gradient_norm: f64,
    #[serde(default)]
    pub failure: Option<String>,
}

/// Outcome of one successful rating pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRun {
    pub stage: Stage,
    pub gradient: StageReport,
    #[serde(default)]
    pub simplex: Option<StageReport>,
}

impl RatingRun {
    pub fn gradient_iterations(&self) -> u64 {
        self.gradient.iterations
    }

    pub fn simplex_iterations(&self) -> u64 {
        self.simplex.as_ref().map(|s| s.iterations).unwrap_or(0)
    }
}

#[derive(Clone)]
struct NegLogPosterior(Posterior);

impl CostFunction for NegLogPosterior {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(-self.0.log_posterior(param))
    }
}

impl Gradient for NegLogPosterior {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        Ok(self.0.gradient(param).into_iter().map(|g| -g).collect())
    }
}

struct IterationTrace {
    stage: Stage,
}

impl<I: State> Observe<I> for IterationTrace {
    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), ArgminError> {
        debug!(
            stage = %self.stage,
            iter = state.get_iter(),
            cost = ?state.get_cost(),
            "optimizer iteration"
        );
        Ok(())
    }
}

struct StageOutcome {
    point: Vec<f64>,
    report: StageReport,
}

/// Find the MAP ratings for `collection` and replace each player's rating and
/// sigma with the posterior estimate.
///
/// Seeds and priors must already be set (see [`crate::seeding::seed_players`]).
pub fn calc_ratings<R: Rng>(
    collection: &mut Collection,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<RatingRun, RatingError> {
    let index = PlayerIndex::build(collection);
    let posterior = Posterior::build(collection, &index, config.handicap_model)?;
    let opt = &config.optimizer;

    let closed = posterior.closed_seeds();
    store_closed(collection, &index, &closed);

    let start: Vec<f64> = closed
        .iter()
        .map(|s| {
            if opt.jitter > 0.0 {
                s + rng.gen_range(0.0..opt.jitter)
            } else {
                *s
            }
        })
        .collect();

    let gradient = run_gradient_stage(&posterior, start, opt);
    let (stage, point, simplex) = if gradient.report.converged {
        (Stage::Gradient, gradient.point.clone(), None)
    } else {
        warn!(
            tournament = %collection.code,
            iterations = gradient.report.iterations,
            gradient_norm = gradient.report.gradient_norm,
            failure = gradient.report.failure.as_deref().unwrap_or("not converged"),
            "gradient stage failed, falling back to simplex"
        );
        store_opened(collection, &index, &gradient.point);

        store_closed(collection, &index, &closed);
        let simplex = run_simplex_stage(&posterior, closed.clone(), opt);
        if !simplex.report.converged {
            store_opened(collection, &index, &simplex.point);
            return Err(RatingError::OptimizerFailed {
                tournament: collection.code.clone(),
                reason: simplex
                    .report
                    .failure
                    .unwrap_or_else(|| format!("no convergence after {} iterations", simplex.report.iterations)),
            });
        }
        (Stage::Simplex, simplex.point, Some(simplex.report))
    };

    let sigmas = estimate_sigmas(config.sigma_method, &posterior, &point);
    for (pos, id) in index.ids().iter().enumerate() {
        if let Some(player) = collection.players.get_mut(id) {
            player.rating = open_boundary(point[pos]);
            player.sigma = sigmas[pos];
        }
    }

    let winner = simplex.as_ref().unwrap_or(&gradient.report);
    info!(
        tournament = %collection.code,
        stage = %stage,
        iterations = winner.iterations,
        log_posterior = winner.log_posterior,
        gradient_norm = winner.gradient_norm,
        "ratings converged"
    );

    Ok(RatingRun {
        stage,
        gradient: gradient.report,
        simplex,
    })
}

fn run_gradient_stage(posterior: &Posterior, start: Vec<f64>, opt: &OptimizerConfig) -> StageOutcome {
    let n = start.len();
    let inv_hessian: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> = MoreThuenteLineSearch::new();

    let result = BFGS::new(linesearch)
        .with_tolerance_grad(opt.gradient_tolerance)
        .and_then(|solver| {
            Executor::new(NegLogPosterior(posterior.clone()), solver)
                .configure(|state| {
                    state
                        .param(start.clone())
                        .inv_hessian(inv_hessian)
                        .max_iters(opt.gradient_max_iters)
                })
                .add_observer(
                    IterationTrace {
                        stage: Stage::Gradient,
                    },
                    ObserverMode::Always,
                )
                .run()
        });

    match result {
        Ok(res) => {
            let state = res.state();
            let point = state.get_best_param().cloned().unwrap_or_else(|| start.clone());
            let solver_converged =
                matches!(state.get_termination_reason(), Some(TerminationReason::SolverConverged));
            finish_stage(posterior, Stage::Gradient, point, state.get_iter(), |norm| {
                solver_converged && norm < opt.gradient_tolerance
            })
        }
        Err(err) => failed_stage(posterior, Stage::Gradient, start, err),
    }
}

fn run_simplex_stage(posterior: &Posterior, start: Vec<f64>, opt: &OptimizerConfig) -> StageOutcome {
    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.clone());
    for i in 0..start.len() {
        let mut v = start.clone();
        v[i] += opt.simplex_step;
        vertices.push(v);
    }

    let result = NelderMead::new(vertices)
        .with_sd_tolerance(opt.simplex_tolerance)
        .and_then(|solver| {
            Executor::new(NegLogPosterior(posterior.clone()), solver)
                .configure(|state| state.max_iters(opt.simplex_max_iters))
                .add_observer(
                    IterationTrace {
                        stage: Stage::Simplex,
                    },
                    ObserverMode::Always,
                )
                .run()
        });

    match result {
        Ok(res) => {
            let state = res.state();
            let point = state.get_best_param().cloned().unwrap_or_else(|| start.clone());
            let solver_converged =
                matches!(state.get_termination_reason(), Some(TerminationReason::SolverConverged));
            finish_stage(posterior, Stage::Simplex, point, state.get_iter(), |_| solver_converged)
        }
        Err(err) => failed_stage(posterior, Stage::Simplex, start, err),
    }
}

fn finish_stage(
    posterior: &Posterior,
    stage: Stage,
    point: Vec<f64>,
    iterations: u64,
    converged: impl FnOnce(f64) -> bool,
) -> StageOutcome {
    let gradient_norm = l2_norm(&posterior.gradient(&point));
    let converged = converged(gradient_norm);
    StageOutcome {
        report: StageReport {
            stage,
            iterations,
            converged,
            log_posterior: posterior.log_posterior(&point),
            gradient_norm,
            failure: None,
        },
        point,
    }
}

fn failed_stage(posterior: &Posterior, stage: Stage, point: Vec<f64>, err: ArgminError) -> StageOutcome {
    StageOutcome {
        report: StageReport {
            stage,
            iterations: 0,
            converged: false,
            log_posterior: posterior.log_posterior(&point),
            gradient_norm: l2_norm(&posterior.gradient(&point)),
            failure: Some(err.to_string()),
        },
        point,
    }
}

fn store_closed(collection: &mut Collection, index: &PlayerIndex, closed: &[f64]) {
    for (pos, id) in index.ids().iter().enumerate() {
        if let Some(player) = collection.players.get_mut(id) {
            player.rating = closed[pos];
        }
    }
}

fn store_opened(collection: &mut Collection, index: &PlayerIndex, point: &[f64]) {
    for (pos, id) in index.ids().iter().enumerate() {
        if let Some(player) = collection.players.get_mut(id) {
            player.rating = open_boundary(point[pos]);
        }
    }
}

fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
