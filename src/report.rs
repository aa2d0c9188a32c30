//! Plain-text and JSON views of rating results.

use serde::Serialize;

use crate::collection::{Collection, PlayerId};
use crate::improbable::ImprobableGame;
use crate::optimizer::{RatingRun, StageReport};
use crate::td_list::{TdList, TdListEntry};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingRow {
    pub id: PlayerId,
    pub rating: f64,
    pub sigma: f64,
    pub rating_ante: f64,
    pub sigma_ante: f64,
    pub name: String,
    pub tournaments: Vec<String>,
}

impl From<&TdListEntry> for RatingRow {
    fn from(e: &TdListEntry) -> Self {
        Self {
            id: e.id,
            rating: e.rating,
            sigma: e.sigma,
            rating_ante: e.rating_ante,
            sigma_ante: e.sigma_ante,
            name: e.name.clone(),
            tournaments: e.tournaments.clone(),
        }
    }
}

/// Players whose rating changed, in id order.
pub fn updated_rows(td_list: &TdList) -> Vec<RatingRow> {
    td_list.updated().map(RatingRow::from).collect()
}

/// Ratings of a single rated tournament, with priors from `td_list` when known.
pub fn collection_rows(collection: &Collection, td_list: &TdList) -> Vec<RatingRow> {
    collection
        .players
        .values()
        .map(|p| {
            let prior = td_list.get(p.id);
            RatingRow {
                id: p.id,
                rating: p.rating,
                sigma: p.sigma,
                rating_ante: prior.map(|e| e.rating).unwrap_or(0.0),
                sigma_ante: prior.map(|e| e.sigma).unwrap_or(0.0),
                name: td_list.name_of(p.id).to_string(),
                tournaments: vec![collection.code.clone()],
            }
        })
        .collect()
}

pub fn table_header() -> String {
    format!(
        "{:>6} {:>10} {:>9}  ::  {:>10} {:>9} {:>20} {:>18}",
        "AGA ID", "New Rating", "New Sigma", "old rating", "old sigma", "Player Name", "Tournament Code"
    )
}

pub fn table_row(row: &RatingRow) -> String {
    format!(
        "{:>6} {:>10.5} {:>9.5}  ::  {:>10.5} {:>9.5} {:>20} {:>18}",
        row.id,
        row.rating,
        row.sigma,
        row.rating_ante,
        row.sigma_ante,
        row.name,
        row.tournaments.join(" ")
    )
}

pub fn render_table(rows: &[RatingRow]) -> String {
    let mut out = table_header();
    for row in rows {
        out.push('\n');
        out.push_str(&table_row(row));
    }
    out
}

pub fn render_improbable(game: &ImprobableGame) -> String {
    let result = if game.white_wins {
        "White wins"
    } else {
        "Black wins"
    };
    format!(
        "\tWhite: {} ({}), Rating = {}\n\tBlack: {} ({}), Rating = {}\n\tH/K: {}/{}\n\tResult: {}\n\tProb: {:.3e}\n",
        game.white_name,
        game.white,
        game.white_seed,
        game.black_name,
        game.black,
        game.black_seed,
        game.handicap,
        game.komi,
        result,
        game.probability
    )
}

pub fn stage_line(report: &StageReport) -> String {
    let status = match (&report.failure, report.converged) {
        (Some(reason), _) => format!("failed: {reason}"),
        (None, true) => "converged".to_string(),
        (None, false) => "not converged".to_string(),
    };
    format!(
        "{} stage: {} after {} iterations, log posterior {:.6}, gradient norm {:.3e}",
        report.stage, status, report.iterations, report.log_posterior, report.gradient_norm
    )
}

/// One line per stage that ran.
pub fn run_summary(run: &RatingRun) -> Vec<String> {
    let mut lines = vec![stage_line(&run.gradient)];
    if let Some(simplex) = &run.simplex {
        lines.push(stage_line(simplex));
    }
    lines
}
