use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RatingError;
use crate::likelihood::Posterior;
use crate::normal;

const INTEGRATION_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigmaMethod {
    /// Direct integration of each player's local posterior.
    #[default]
    Integration,
    /// Laplace approximation from the inverted Hessian; falls back to
    /// integration when the Hessian is not positive definite, which happens
    /// when a prior precision underflows and the games do not pin the player.
    Analytic,
}

/// Posterior sigma per vector position, evaluated at the converged ratings.
pub fn estimate_sigmas(method: SigmaMethod, posterior: &Posterior, ratings: &[f64]) -> Vec<f64> {
    match method {
        SigmaMethod::Integration => integrated_sigmas(posterior, ratings),
        SigmaMethod::Analytic => match analytic_sigmas(posterior, ratings) {
            Ok(sigmas) => sigmas,
            Err(err) => {
                warn!(%err, "analytic sigma failed, integrating instead");
                integrated_sigmas(posterior, ratings)
            }
        },
    }
}

pub fn analytic_sigmas(posterior: &Posterior, ratings: &[f64]) -> Result<Vec<f64>, RatingError> {
    let n = posterior.dimension();
    let hessian = posterior.negative_hessian(ratings);
    let chol = hessian
        .cholesky()
        .ok_or(RatingError::NotPositiveDefinite { players: n })?;
    let covariance = chol.inverse();
    Ok((0..n).map(|i| covariance[(i, i)].sqrt()).collect())
}

/// Sample each player's rating on a grid of +-5 prior sigmas, holding the
/// other players at their converged ratings, and take the weighted RMS offset.
pub fn integrated_sigmas(posterior: &Posterior, ratings: &[f64]) -> Vec<f64> {
    let mut sigmas = Vec::with_capacity(posterior.dimension());
    let mut offsets = [0.0_f64; INTEGRATION_SAMPLES];
    let mut log_weights = [0.0_f64; INTEGRATION_SAMPLES];

    for (i, prior) in posterior.priors().iter().enumerate() {
        let sigma = prior.sigma;
        let mut trial = ratings.to_vec();
        for k in 0..INTEGRATION_SAMPLES {
            let x = -5.0 * sigma - sigma / 20.0 + k as f64 * sigma / 10.0;
            trial[i] = ratings[i] + x;
            let z = (trial[i] - prior.seed) / sigma;
            let mut lw = -z * z / 2.0;
            for g in posterior.games_of(i) {
                lw += normal::ln_win_probability(g.winner_advantage(&trial), g.conditions.sigma_px);
            }
            offsets[k] = x;
            log_weights[k] = lw;
        }

        let max_lw = log_weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum_w = 0.0;
        let mut sum_x2w = 0.0;
        for (x, lw) in offsets.iter().zip(&log_weights) {
            let w = (lw - max_lw).exp();
            sum_w += w;
            sum_x2w += x * x * w;
        }
        sigmas.push((sum_x2w / sum_w).sqrt());
    }
    sigmas
}
