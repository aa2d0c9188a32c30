use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use bayrate::config::{EngineConfig, default_db_path};
use bayrate::pipeline::rate_tournament;
use bayrate::{logging, report, store};

/// Rate one tournament against the ratings in force before its date.
/// Never writes ratings; only the bogus-game exclusion flags are updated.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Tournament code
    code: String,

    #[arg(long)]
    db: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, short)]
    verbose: bool,

    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose);

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?.with_env_overrides(),
        None => EngineConfig::from_env(),
    };
    let db_path = args
        .db
        .clone()
        .or_else(default_db_path)
        .ok_or_else(|| anyhow!("no database path: pass --db or set BAYRATE_DB"))?;
    let conn = store::open_db(&db_path)?;
    store::exclude_bogus_game_data(&conn)?;

    let mut collection = store::load_tournament(&conn, &args.code)?
        .ok_or_else(|| anyhow!("tournament {} not found or undated", args.code))?;
    let Some(date) = collection.date else {
        return Err(anyhow!("tournament {} has no date", args.code));
    };
    println!("{}\t{}\t{}", collection.code, date, collection.name);

    if collection.is_empty() {
        println!("No games to rate");
        return Ok(());
    }

    let td_list = store::load_td_list_prior(&conn, date)?;
    let outcome = rate_tournament(&mut collection, &td_list, &config)
        .with_context(|| format!("rate tournament {}", args.code))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    if args.verbose {
        for line in report::run_summary(&outcome.run) {
            println!("{line}");
        }
    }
    println!();
    println!("New ratings:");
    println!("{}", report::render_table(&outcome.ratings));
    Ok(())
}
