use serde::Serialize;

use crate::collection::{Collection, PlayerId};
use crate::error::RatingError;
use crate::handicap::HandicapModel;
use crate::normal::win_probability;
use crate::rank::close_boundary;
use crate::td_list::TdList;

/// A game whose winner was a long shot on the seeded ratings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImprobableGame {
    pub white: PlayerId,
    pub black: PlayerId,
    pub white_name: String,
    pub black_name: String,
    pub white_seed: f64,
    pub black_seed: f64,
    pub handicap: u32,
    pub komi: f64,
    pub white_wins: bool,
    /// Prior probability of the recorded result.
    pub probability: f64,
}

/// Flag games whose recorded winner had less than `threshold` chance of winning.
///
/// Uses the seeds, so call it after seeding and before rating. Usually points
/// at a data-entry error or a player who needs reseeding.
pub fn find_improbables(
    collection: &Collection,
    td_list: &TdList,
    model: HandicapModel,
    threshold: f64,
) -> Result<Vec<ImprobableGame>, RatingError> {
    let mut out = Vec::new();
    for game in &collection.games {
        let (Some(white), Some(black)) = (collection.player(game.white), collection.player(game.black))
        else {
            return Err(RatingError::UnknownPlayer {
                white: game.white,
                black: game.black,
            });
        };

        let conditions = model.for_game(game);
        let rd = close_boundary(white.seed) - close_boundary(black.seed) - conditions.handicap_eqv;
        let adv = if game.white_wins { rd } else { -rd };
        let probability = win_probability(adv, conditions.sigma_px);
        if probability >= threshold {
            continue;
        }

        out.push(ImprobableGame {
            white: game.white,
            black: game.black,
            white_name: td_list.name_of(game.white).to_string(),
            black_name: td_list.name_of(game.black).to_string(),
            white_seed: white.seed,
            black_seed: black.seed,
            handicap: game.handicap,
            komi: game.komi,
            white_wins: game.white_wins,
            probability,
        });
    }
    Ok(out)
}
