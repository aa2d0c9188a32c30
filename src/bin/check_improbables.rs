use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use bayrate::config::{EngineConfig, default_db_path};
use bayrate::pipeline::check_cascade;
use bayrate::{logging, report, store};

/// List games in the pending cascade whose results look like data-entry errors.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long)]
    db: Option<PathBuf>,

    /// Flag results with a prior probability below this
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose);

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?.with_env_overrides(),
        None => EngineConfig::from_env(),
    };
    if let Some(threshold) = args.threshold {
        config.improbable_threshold = threshold;
    }
    let db_path = args
        .db
        .clone()
        .or_else(default_db_path)
        .ok_or_else(|| anyhow!("no database path: pass --db or set BAYRATE_DB"))?;
    let conn = store::open_db(&db_path)?;

    let found = check_cascade(&conn, &config)?;
    if found.is_empty() {
        println!("No tournaments to update");
        return Ok(());
    }

    let mut flagged = 0usize;
    for (code, games) in &found {
        println!("Processing {code}");
        for game in games {
            println!("{}", report::render_improbable(game));
        }
        flagged += games.len();
    }
    println!(
        "{flagged} improbable games in {} tournaments (threshold {})",
        found.len(),
        config.improbable_threshold
    );
    Ok(())
}
