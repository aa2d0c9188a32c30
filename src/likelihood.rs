//! Log-posterior of a rating vector.
//!
//! Ratings live in boundary-closed space here: seeds are shifted one unit
//! toward zero when the posterior is built and the caller reopens the result.

use std::f64::consts::PI;

use nalgebra::DMatrix;

use crate::collection::{Collection, PlayerIndex};
use crate::error::RatingError;
use crate::handicap::{GameConditions, HandicapModel};
use crate::normal;
use crate::rank::close_boundary;

#[derive(Debug, Clone, Copy)]
pub struct Prior {
    pub seed: f64,
    pub sigma: f64,
}

/// A game resolved to optimization-vector positions.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedGame {
    pub white: usize,
    pub black: usize,
    pub white_wins: bool,
    pub conditions: GameConditions,
}

impl ResolvedGame {
    /// +1 when white won, -1 when black won.
    pub fn sign(&self) -> f64 {
        if self.white_wins { 1.0 } else { -1.0 }
    }

    /// Rating advantage of the winner after the handicap offset.
    pub fn winner_advantage(&self, ratings: &[f64]) -> f64 {
        let rd = ratings[self.white] - ratings[self.black] - self.conditions.handicap_eqv;
        self.sign() * rd
    }
}

#[derive(Debug, Clone)]
pub struct Posterior {
    priors: Vec<Prior>,
    games: Vec<ResolvedGame>,
    // game indices touching each player
    incidence: Vec<Vec<usize>>,
}

impl Posterior {
    pub fn build(
        collection: &Collection,
        index: &PlayerIndex,
        model: HandicapModel,
    ) -> Result<Self, RatingError> {
        let priors = index
            .ids()
            .iter()
            .filter_map(|id| collection.players.get(id))
            .map(|p| Prior {
                seed: close_boundary(p.seed),
                sigma: p.sigma,
            })
            .collect::<Vec<_>>();

        let mut games = Vec::with_capacity(collection.games.len());
        let mut incidence = vec![Vec::new(); index.len()];
        for game in &collection.games {
            let (Some(white), Some(black)) = (index.position(game.white), index.position(game.black))
            else {
                return Err(RatingError::UnknownPlayer {
                    white: game.white,
                    black: game.black,
                });
            };
            incidence[white].push(games.len());
            incidence[black].push(games.len());
            games.push(ResolvedGame {
                white,
                black,
                white_wins: game.white_wins,
                conditions: model.for_game(game),
            });
        }

        Ok(Self {
            priors,
            games,
            incidence,
        })
    }

    pub fn dimension(&self) -> usize {
        self.priors.len()
    }

    pub fn priors(&self) -> &[Prior] {
        &self.priors
    }

    pub fn games(&self) -> &[ResolvedGame] {
        &self.games
    }

    pub fn games_of(&self, position: usize) -> impl Iterator<Item = &ResolvedGame> {
        self.incidence[position].iter().map(|g| &self.games[*g])
    }

    /// Boundary-closed seeds in vector order.
    pub fn closed_seeds(&self) -> Vec<f64> {
        self.priors.iter().map(|p| p.seed).collect()
    }

    pub fn log_posterior(&self, ratings: &[f64]) -> f64 {
        let half_ln_2pi = 0.5 * (2.0 * PI).ln();
        let prior: f64 = self
            .priors
            .iter()
            .zip(ratings)
            .map(|(p, r)| {
                let z = (r - p.seed) / p.sigma;
                -z * z / 2.0 - half_ln_2pi
            })
            .sum();
        let games: f64 = self
            .games
            .iter()
            .map(|g| normal::ln_win_probability(g.winner_advantage(ratings), g.conditions.sigma_px))
            .sum();
        prior + games
    }

    pub fn gradient(&self, ratings: &[f64]) -> Vec<f64> {
        let mut grad: Vec<f64> = self
            .priors
            .iter()
            .zip(ratings)
            .map(|(p, r)| -(r - p.seed) / (p.sigma * p.sigma))
            .collect();

        for g in &self.games {
            let dp = normal::win_gradient(g.winner_advantage(ratings), g.conditions.sigma_px);
            grad[g.white] += g.sign() * dp;
            grad[g.black] -= g.sign() * dp;
        }
        grad
    }

    /// Second derivatives of the negative log-posterior.
    pub fn negative_hessian(&self, ratings: &[f64]) -> DMatrix<f64> {
        let n = self.dimension();
        let mut h = DMatrix::<f64>::zeros(n, n);
        for (i, p) in self.priors.iter().enumerate() {
            h[(i, i)] = 1.0 / (p.sigma * p.sigma);
        }
        for g in &self.games {
            let c = normal::win_curvature(g.winner_advantage(ratings), g.conditions.sigma_px);
            h[(g.white, g.white)] += c;
            h[(g.black, g.black)] += c;
            h[(g.white, g.black)] -= c;
            h[(g.black, g.white)] -= c;
        }
        h
    }
}
