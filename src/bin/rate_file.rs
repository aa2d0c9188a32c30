use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use bayrate::collection::Collection;
use bayrate::config::EngineConfig;
use bayrate::improbable::find_improbables;
use bayrate::pipeline::rate_tournament;
use bayrate::td_list::{TdList, TdListEntry};
use bayrate::{logging, report};

#[derive(Debug, Deserialize)]
struct RateFileCase {
    tournament: Collection,
    #[serde(default)]
    td_list: Vec<TdListEntry>,
    #[serde(default)]
    config: Option<EngineConfig>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init(std::env::var("BAYRATE_VERBOSE").is_ok());

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/sample_tournament.json"));

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let case: RateFileCase =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    // No database here: the file carries everything the rating needs.
    let config = case.config.unwrap_or_default().with_env_overrides();
    let td_list: TdList = case.td_list.into_iter().collect();
    let mut collection = case.tournament;

    let improbable = find_improbables(
        &collection,
        &td_list,
        config.handicap_model,
        config.improbable_threshold,
    )?;
    let outcome = rate_tournament(&mut collection, &td_list, &config)?;

    println!(
        "{}: {} players, {} games",
        outcome.code, outcome.players, outcome.games
    );
    for line in report::run_summary(&outcome.run) {
        println!("{line}");
    }
    if !improbable.is_empty() {
        println!("Improbable games:");
        for game in &improbable {
            println!("{}", report::render_improbable(game));
        }
    }
    println!("{}", report::render_table(&outcome.ratings));
    Ok(())
}
