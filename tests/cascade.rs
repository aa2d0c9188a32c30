use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rusqlite::Connection;

use bayrate::collection::Collection;
use bayrate::config::EngineConfig;
use bayrate::error::RatingError;
use bayrate::pipeline::{CascadeOptions, check_cascade, rate_tournament, run_cascade};
use bayrate::store::{
    GameRecord, insert_game, insert_player, insert_tournament, open_in_memory,
    tournament_update_list, upsert_rating,
};
use bayrate::td_list::{TdList, TdListEntry};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[derive(serde::Deserialize)]
struct FixtureCase {
    tournament: Collection,
    td_list: Vec<TdListEntry>,
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn record(code: &str, date: NaiveDate, white: (u32, &str), black: (u32, &str), result: &str) -> GameRecord {
    GameRecord {
        tournament_code: code.to_string(),
        game_date: date,
        player_1: white.0,
        rank_1: white.1.to_string(),
        color_1: "W".to_string(),
        player_2: black.0,
        rank_2: black.1.to_string(),
        color_2: "B".to_string(),
        handicap: 0,
        komi: 7.5,
        result: result.to_string(),
        online: false,
    }
}

/// Two unrated tournaments, a month apart, over four club players.
fn club_db() -> Connection {
    let conn = open_in_memory().unwrap();
    for (id, name) in [(1, "Aoki"), (2, "Baek"), (3, "Chen"), (4, "Diaz")] {
        insert_player(&conn, id, name).unwrap();
    }
    upsert_rating(&conn, 1, 2.4, 0.5, day(2023, 10, 1)).unwrap();
    upsert_rating(&conn, 2, -1.8, 0.6, day(2023, 10, 1)).unwrap();

    let feb = day(2024, 2, 3);
    insert_tournament(&conn, "FEB", "February Club Night", feb).unwrap();
    insert_game(&conn, &record("FEB", feb, (1, "2d"), (2, "2k"), "W")).unwrap();
    insert_game(&conn, &record("FEB", feb, (3, "1d"), (4, "3k"), "W")).unwrap();
    insert_game(&conn, &record("FEB", feb, (1, "2d"), (3, "1d"), "B")).unwrap();
    let mut online = record("FEB", feb, (2, "2k"), (4, "3k"), "W");
    online.online = true;
    insert_game(&conn, &online).unwrap();
    insert_game(&conn, &record("FEB", feb, (2, "2k"), (4, "3p"), "W")).unwrap();

    let mar = day(2024, 3, 2);
    insert_tournament(&conn, "MAR", "March Club Night", mar).unwrap();
    insert_game(&conn, &record("MAR", mar, (1, "2d"), (4, "3k"), "W")).unwrap();
    insert_game(&conn, &record("MAR", mar, (2, "2k"), (3, "1d"), "B")).unwrap();
    insert_game(&conn, &record("MAR", mar, (3, "1d"), (1, "2d"), "B")).unwrap();
    conn
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn dry_run_rates_without_writing() {
    let mut conn = club_db();
    let summary = run_cascade(&mut conn, &EngineConfig::default(), CascadeOptions::default()).unwrap();

    assert_eq!(summary.cascade_date, Some(day(2024, 2, 3)));
    assert_eq!(summary.excluded_games, 1);
    let codes: Vec<&str> = summary.rated.iter().map(|o| o.code.as_str()).collect();
    assert_eq!(codes, vec!["FEB", "MAR"]);
    assert_eq!(summary.rated[0].games, 3);

    let aoki = summary.td_list.get(1).unwrap();
    assert_eq!(aoki.tournaments, vec!["FEB".to_string(), "MAR".to_string()]);
    assert_eq!(aoki.last_rating_date, day(2024, 3, 2));
    assert!(aoki.rating_updated);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM ratings"), 2);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM games WHERE rated = 1"), 0);
    assert!(tournament_update_list(&conn).unwrap().is_some());
}

#[test]
fn commit_matches_dry_run_and_clears_the_queue() {
    let cfg = EngineConfig::default();
    let mut dry = club_db();
    let dry_summary = run_cascade(&mut dry, &cfg, CascadeOptions::default()).unwrap();

    let mut live = club_db();
    let options = CascadeOptions {
        commit: true,
        only_one: false,
    };
    let live_summary = run_cascade(&mut live, &cfg, options).unwrap();

    for entry in dry_summary.td_list.iter() {
        let other = live_summary.td_list.get(entry.id).unwrap();
        assert!((entry.rating - other.rating).abs() < 1e-9, "player {}", entry.id);
        assert!((entry.sigma - other.sigma).abs() < 1e-9);
    }

    // FEB and MAR rows for all four players, plus the two priors
    assert_eq!(count(&live, "SELECT COUNT(*) FROM ratings"), 10);
    assert_eq!(count(&live, "SELECT COUNT(*) FROM games WHERE rated = 1 AND online = 0"), 7);
    assert!(tournament_update_list(&live).unwrap().is_none());

    let stored: f64 = live
        .query_row(
            "SELECT rating FROM players WHERE pin_player = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!((stored - live_summary.td_list.get(3).unwrap().rating).abs() < 1e-12);

    let rerun = run_cascade(&mut live, &cfg, options).unwrap();
    assert!(rerun.is_empty());
}

#[test]
fn only_one_stops_after_first_tournament() {
    let mut conn = club_db();
    let options = CascadeOptions {
        commit: true,
        only_one: true,
    };
    let summary = run_cascade(&mut conn, &EngineConfig::default(), options).unwrap();
    assert_eq!(summary.rated.len(), 1);
    assert_eq!(
        tournament_update_list(&conn).unwrap().unwrap().codes,
        vec!["MAR".to_string()]
    );
}

#[test]
fn fatal_tournament_stops_the_cascade() {
    let mut conn = club_db();
    let mar = day(2024, 3, 2);
    let mut broken = record("MAR", mar, (1, "2d"), (2, "2k"), "W");
    broken.color_1 = "R".to_string();
    insert_game(&conn, &broken).unwrap();

    let options = CascadeOptions {
        commit: true,
        only_one: false,
    };
    let err = run_cascade(&mut conn, &EngineConfig::default(), options).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RatingError>(),
        Some(RatingError::UnknownColor(_))
    ));

    // FEB was committed before MAR failed to load
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM ratings WHERE elab_date = '2024-02-03'"),
        4
    );
    assert_eq!(
        count(&conn, "SELECT COUNT(*) FROM ratings WHERE elab_date = '2024-03-02'"),
        0
    );
}

#[test]
fn rating_is_idempotent() {
    let case: FixtureCase = serde_json::from_str(&read_fixture("sample_tournament.json")).unwrap();
    let td_list: TdList = case.td_list.into_iter().collect();
    let cfg = EngineConfig::default();

    let mut first = case.tournament.clone();
    let mut second = case.tournament;
    let a = rate_tournament(&mut first, &td_list, &cfg).unwrap();
    let b = rate_tournament(&mut second, &td_list, &cfg).unwrap();

    assert_eq!(a.players, 6);
    assert_eq!(a.games, 10);
    assert_eq!(a.seeding.new_players, 2);
    for (pa, pb) in first.players.values().zip(second.players.values()) {
        assert!((pa.rating - pb.rating).abs() < 1e-6);
        assert!((pa.sigma - pb.sigma).abs() < 1e-6);
        assert!(pa.sigma > 0.0);
    }
    assert_eq!(a.ratings.len(), 6);
    assert_eq!(a.ratings[0].name, "Kim Sora");
    assert_eq!(b.run.stage, a.run.stage);
}

#[test]
fn check_cascade_reports_upsets_on_entered_ranks() {
    let conn = club_db();
    let mar = day(2024, 3, 2);
    let upset = record("MAR", mar, (5, "7d"), (6, "15k"), "B");
    insert_game(&conn, &upset).unwrap();

    let found = check_cascade(&conn, &EngineConfig::default()).unwrap();
    assert_eq!(found.len(), 2);
    let (code, games) = &found[1];
    assert_eq!(code, "MAR");
    assert_eq!(games.len(), 1);
    assert_eq!((games[0].white, games[0].black), (5, 6));
    assert!(games[0].probability < 0.01);
}

#[test]
fn undated_tournament_is_not_rated() {
    let mut raw: serde_json::Value = serde_json::from_str(&read_fixture("sample_tournament.json")).unwrap();
    raw["tournament"].as_object_mut().unwrap().remove("date");
    let case: FixtureCase = serde_json::from_value(raw).unwrap();
    let td_list: TdList = case.td_list.into_iter().collect();

    let mut collection = case.tournament;
    assert!(collection.date.is_none());
    let entered = collection.players.clone();
    let err = rate_tournament(&mut collection, &td_list, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, RatingError::MissingDate { ref tournament } if tournament == "SPRING24"));
    assert!(err.is_precondition());
    // seeding never ran
    assert_eq!(collection.players, entered);
}
