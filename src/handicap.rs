use serde::{Deserialize, Serialize};

use crate::collection::Game;

const FLAT_SIGMA_PX: f64 = 1.04;
const FLAT_KOMI_WEIGHT: f64 = 0.1;

const FITTED_KOMI_WEIGHT: f64 = 0.0757;
// sigma_px intercepts for handicap 2..=9
const FITTED_HANDICAP_SIGMA: [f64; 8] = [
    1.13672, 1.18795, 1.22841, 1.27457, 1.31978, 1.35881, 1.39782, 1.43614,
];

/// Rating offset and outcome spread implied by a game's handicap and komi.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameConditions {
    pub handicap_eqv: f64,
    pub sigma_px: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandicapModel {
    /// Constant outcome spread, one rank per handicap stone.
    #[default]
    Flat,
    /// Per-handicap spread fitted to historical results.
    Fitted,
}

impl HandicapModel {
    pub fn conditions(self, handicap: u32, komi: f64) -> GameConditions {
        match self {
            HandicapModel::Flat => {
                let handicap_eqv = if handicap >= 2 {
                    handicap as f64 - FLAT_KOMI_WEIGHT * komi
                } else {
                    0.5 - FLAT_KOMI_WEIGHT * komi
                };
                GameConditions {
                    handicap_eqv,
                    sigma_px: FLAT_SIGMA_PX,
                }
            }
            HandicapModel::Fitted => {
                if handicap < 2 {
                    GameConditions {
                        handicap_eqv: 0.580 - FITTED_KOMI_WEIGHT * komi,
                        sigma_px: 1.0649 - 0.0021976 * komi + 0.00014984 * komi * komi,
                    }
                } else {
                    let idx = (handicap.min(9) - 2) as usize;
                    GameConditions {
                        handicap_eqv: handicap as f64 - FITTED_KOMI_WEIGHT * komi,
                        sigma_px: FITTED_HANDICAP_SIGMA[idx] - 0.0035169 * komi,
                    }
                }
            }
        }
    }

    pub fn for_game(self, game: &Game) -> GameConditions {
        self.conditions(game.handicap, game.komi)
    }
}
