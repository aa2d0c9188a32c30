use chrono::NaiveDate;
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

use crate::collection::Collection;
use crate::rank::close_boundary;
use crate::spline::CubicSpline;
use crate::td_list::TdList;

// Sigma growth per day of inactivity.
const DAILY_SIGMA_DRIFT: f64 = 0.0005;

// Partial self-promotion fit: seed = old + a + b * dR, var += c * dR^d
const PROMOTION_OFFSET: f64 = 0.024746;
const PROMOTION_SLOPE: f64 = 0.32127;
const PROMOTION_VAR_SCALE: f64 = 0.256;
const PROMOTION_VAR_EXP: f64 = 1.9475;

const RESEED_THRESHOLD: f64 = 3.0;
const PROMOTION_THRESHOLD: f64 = 1.0;

// Calibration knots for new-player sigma, rank midpoints already shifted one
// unit toward zero (-5.5 -> -4.5, 4.5 -> 3.5).
const SIGMA_KNOTS: [f64; 59] = [
    -49.5, -48.5, -47.5, -46.5, -45.5, -44.5, -43.5, -42.5, -41.5, -40.5, -39.5, -38.5, -37.5,
    -36.5, -35.5, -34.5, -33.5, -32.5, -31.5, -30.5, -29.5, -28.5, -27.5, -26.5, -25.5, -24.5,
    -23.5, -22.5, -21.5, -20.5, -19.5, -18.5, -17.5, -16.5, -15.5, -14.5, -13.5, -12.5, -11.5,
    -10.5, -9.5, -8.5, -7.5, -6.5, -5.5, -4.5, -3.5, -2.5, -1.5, -0.5, 0.5, 1.5, 2.5, 3.5, 4.5,
    5.5, 6.5, 7.5, 8.5,
];
const SIGMA_VALUES: [f64; 59] = [
    5.73781, 5.63937, 5.54098, 5.44266, 5.34439, 5.24619, 5.14806, 5.05000, 4.95202, 4.85412,
    4.75631, 4.65859, 4.56098, 4.46346, 4.36606, 4.26878, 4.17163, 4.07462, 3.97775, 3.88104,
    3.78451, 3.68816, 3.59201, 3.49607, 3.40037, 3.30492, 3.20975, 3.11488, 3.02035, 2.92617,
    2.83240, 2.73907, 2.64622, 2.55392, 2.46221, 2.37118, 2.28090, 2.19146, 2.10297, 2.01556,
    1.92938, 1.84459, 1.76139, 1.68003, 1.60078, 1.52398, 1.45000, 1.37931, 1.31244, 1.25000,
    1.19269, 1.14127, 1.09659, 1.05948, 1.03078, 1.01119, 1.00125, 1.00000, 1.00000,
];

static INITIAL_SIGMA: Lazy<CubicSpline> = Lazy::new(|| {
    CubicSpline::natural(&SIGMA_KNOTS, &SIGMA_VALUES).expect("sigma calibration knots are sorted")
});

/// Prior sigma for a player with no usable rating history.
pub fn initial_sigma(seed: f64) -> f64 {
    if seed > 7.5 {
        1.0
    } else if seed < -50.5 {
        6.0
    } else {
        INITIAL_SIGMA.eval(close_boundary(seed))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedingSummary {
    pub new_players: usize,
    pub reseeded: usize,
    pub promoted: usize,
    pub held: usize,
    pub demotions_blocked: usize,
}

/// Set each player's prior (seed, sigma) from the TD list and the tournament's results.
///
/// Players cannot demote themselves, and self-promotion only counts when the
/// player won at least one game in this tournament.
pub fn seed_players(
    collection: &mut Collection,
    td_list: &TdList,
    tournament_date: NaiveDate,
) -> SeedingSummary {
    let wins = collection.win_counts();
    let mut summary = SeedingSummary::default();

    for player in collection.players.values_mut() {
        let Some(prior) = td_list.get(player.id).filter(|e| e.is_usable_prior()) else {
            player.sigma = initial_sigma(player.seed);
            summary.new_players += 1;
            continue;
        };

        let delta_r = if player.seed * prior.rating > 0.0 {
            player.seed - prior.rating
        } else {
            player.seed - prior.rating - 2.0
        };
        let won_any = wins.get(&player.id).copied().unwrap_or(0) > 0;
        let days = (tournament_date - prior.last_rating_date).num_days() as f64;
        let drifted_sigma =
            (prior.sigma * prior.sigma + DAILY_SIGMA_DRIFT * DAILY_SIGMA_DRIFT * days * days).sqrt();

        if delta_r < 0.0 {
            player.seed = prior.rating;
            player.sigma = drifted_sigma;
            summary.demotions_blocked += 1;
        } else if delta_r >= RESEED_THRESHOLD && won_any {
            player.sigma = initial_sigma(player.seed);
            summary.reseeded += 1;
        } else if delta_r >= PROMOTION_THRESHOLD && won_any {
            player.seed = prior.rating + PROMOTION_OFFSET + PROMOTION_SLOPE * delta_r;
            player.sigma = (prior.sigma * prior.sigma
                + PROMOTION_VAR_SCALE * delta_r.powf(PROMOTION_VAR_EXP))
            .sqrt();
            summary.promoted += 1;
        } else {
            player.seed = prior.rating;
            player.sigma = drifted_sigma;
            summary.held += 1;
        }
        debug!(
            player = player.id,
            seed = player.seed,
            sigma = player.sigma,
            delta_r,
            "seeded from td list"
        );
    }

    info!(
        tournament = %collection.code,
        new = summary.new_players,
        reseeded = summary.reseeded,
        promoted = summary.promoted,
        held = summary.held,
        demotions_blocked = summary.demotions_blocked,
        "seeding complete"
    );
    summary
}
