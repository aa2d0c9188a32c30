use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use bayrate::config::{EngineConfig, default_db_path};
use bayrate::pipeline::{CascadeOptions, run_cascade};
use bayrate::{logging, report, store};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Rerate every tournament from the earliest unrated game onward",
    long_about = None
)]
struct Args {
    /// SQLite ratings database (default: $BAYRATE_DB or the cache dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Write new ratings back to the database
    #[arg(long)]
    commit: bool,

    /// Rate only the first tournament of the cascade
    #[arg(long)]
    only_one: bool,

    /// Print every player's new and old rating after each tournament
    #[arg(long)]
    show_player_hash: bool,

    /// Per-stage convergence details and debug logging
    #[arg(long, short)]
    verbose: bool,

    /// JSON engine config; BAYRATE_* variables still override it
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit the final table as JSON
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
    let mut conn = store::open_db(&db_path)?;

    let options = CascadeOptions {
        commit: args.commit,
        only_one: args.only_one,
    };
    let summary = run_cascade(&mut conn, &config, options).context("cascade aborted")?;

    let Some(cascade_date) = summary.cascade_date else {
        println!("No tournaments to update.");
        return Ok(());
    };
    if args.only_one {
        println!("Updating one tournament only {cascade_date}");
    } else {
        println!("Updating all tournaments after {cascade_date}");
    }

    for outcome in &summary.rated {
        println!(
            "{}: {} players, {} games, {} gradient iterations and {} simplex iterations",
            outcome.code,
            outcome.players,
            outcome.games,
            outcome.run.gradient_iterations(),
            outcome.run.simplex_iterations()
        );
        if args.verbose {
            for line in report::run_summary(&outcome.run) {
                println!("\t{line}");
            }
        }
        if args.show_player_hash {
            for row in &outcome.ratings {
                println!(
                    "{}\t{:.5} {:.5}\t{:.5} {:.5}\t{}",
                    row.id, row.rating, row.sigma, row.rating_ante, row.sigma_ante, row.name
                );
            }
        }
    }
    for code in &summary.skipped {
        println!("{code}: no games, skipped");
    }
    if summary.committed {
        println!("Committed {} tournaments to {}", summary.rated.len(), db_path.display());
    }

    let rows = report::updated_rows(&summary.td_list);
    if args.json {
        let out = serde_json::json!({
            "cascade_date": cascade_date,
            "committed": summary.committed,
            "tournaments": summary.rated,
            "skipped": summary.skipped,
            "ratings": rows,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Done ratings");
        println!("{}", report::render_table(&rows));
    }
    Ok(())
}
