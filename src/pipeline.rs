use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::collection::Collection;
use crate::config::EngineConfig;
use crate::error::RatingError;
use crate::improbable::{ImprobableGame, find_improbables};
use crate::optimizer::{RatingRun, calc_ratings};
use crate::report::{RatingRow, collection_rows};
use crate::seeding::{SeedingSummary, seed_players};
use crate::store;
use crate::td_list::TdList;

/// Result of rating one tournament.
#[derive(Debug, Clone, Serialize)]
pub struct TournamentOutcome {
    pub code: String,
    pub players: usize,
    pub games: usize,
    pub seeding: SeedingSummary,
    pub run: RatingRun,
    /// New ratings beside the prior ones they replace.
    pub ratings: Vec<RatingRow>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeOptions {
    /// Write ratings back to the store after each tournament.
    pub commit: bool,
    /// Stop after the first tournament of the cascade.
    pub only_one: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CascadeSummary {
    pub cascade_date: Option<chrono::NaiveDate>,
    pub excluded_games: usize,
    pub rated: Vec<TournamentOutcome>,
    pub skipped: Vec<String>,
    pub committed: bool,
    /// TD list after every rated tournament was folded in.
    pub td_list: TdList,
}

impl CascadeSummary {
    pub fn is_empty(&self) -> bool {
        self.cascade_date.is_none()
    }
}

/// Seed and rate one tournament against `td_list`.
///
/// The jitter RNG is seeded from the config, so the same inputs always give the
/// same ratings.
pub fn rate_tournament(
    collection: &mut Collection,
    td_list: &TdList,
    config: &EngineConfig,
) -> Result<TournamentOutcome, RatingError> {
    let date = collection.date.ok_or_else(|| RatingError::MissingDate {
        tournament: collection.code.clone(),
    })?;
    let seeding = seed_players(collection, td_list, date);
    let mut rng = StdRng::seed_from_u64(config.jitter_seed);
    let run = calc_ratings(collection, config, &mut rng)?;
    Ok(TournamentOutcome {
        code: collection.code.clone(),
        players: collection.players.len(),
        games: collection.games.len(),
        seeding,
        run,
        ratings: collection_rows(collection, td_list),
    })
}

/// Games in `collection` whose result is improbable under the entered seeds.
pub fn check_tournament(
    collection: &Collection,
    td_list: &TdList,
    config: &EngineConfig,
) -> Result<Vec<ImprobableGame>, RatingError> {
    find_improbables(
        collection,
        td_list,
        config.handicap_model,
        config.improbable_threshold,
    )
}

/// Rerate every tournament from the earliest unrated game onward.
///
/// Ratings flow forward through an in-memory TD list, so a dry run produces
/// the same numbers as a committed one. Stops at the first tournament that
/// fails to rate.
pub fn run_cascade(
    conn: &mut Connection,
    config: &EngineConfig,
    options: CascadeOptions,
) -> Result<CascadeSummary> {
    let mut summary = CascadeSummary {
        committed: options.commit,
        ..CascadeSummary::default()
    };
    summary.excluded_games = store::exclude_bogus_game_data(conn)?;

    let Some(mut plan) = store::tournament_update_list(conn)? else {
        info!("no tournaments to update");
        return Ok(summary);
    };
    if options.only_one {
        plan.codes.truncate(1);
    }
    info!(
        cascade_date = %plan.cascade_date,
        tournaments = plan.codes.len(),
        commit = options.commit,
        "starting cascade"
    );
    summary.cascade_date = Some(plan.cascade_date);

    let mut td_list = store::load_td_list_prior(conn, plan.cascade_date)?;
    info!(players = td_list.len(), "loaded td list");

    for code in &plan.codes {
        let Some(mut collection) = store::load_tournament(conn, code)? else {
            warn!(tournament = %code, "tournament has no date, skipping");
            summary.skipped.push(code.clone());
            continue;
        };
        if collection.is_empty() {
            info!(tournament = %code, "no games, skipping");
            summary.skipped.push(code.clone());
            continue;
        }

        let outcome = rate_tournament(&mut collection, &td_list, config)
            .with_context(|| format!("rate tournament {code}"))?;
        td_list.apply_results(&collection)?;

        if options.commit {
            store::sync_new_ratings(conn, &collection)
                .with_context(|| format!("commit ratings for {code}"))?;
            info!(tournament = %code, "ratings committed");
        }
        summary.rated.push(outcome);
    }

    summary.td_list = td_list;
    Ok(summary)
}

/// Improbable games across every tournament the next cascade would rate.
///
/// Uses the ranks as entered, before any seeding from the TD list; the list
/// only supplies player names.
pub fn check_cascade(
    conn: &Connection,
    config: &EngineConfig,
) -> Result<Vec<(String, Vec<ImprobableGame>)>> {
    store::exclude_bogus_game_data(conn)?;
    let Some(plan) = store::tournament_update_list(conn)? else {
        return Ok(Vec::new());
    };
    let td_list = store::load_td_list_prior(conn, plan.cascade_date)?;

    let mut out = Vec::new();
    for code in &plan.codes {
        let Some(collection) = store::load_tournament(conn, code)? else {
            continue;
        };
        if collection.is_empty() {
            continue;
        }
        let found = check_tournament(&collection, &td_list, config)
            .with_context(|| format!("check tournament {code}"))?;
        out.push((code.clone(), found));
    }
    Ok(out)
}
