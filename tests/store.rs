use chrono::NaiveDate;
use rusqlite::{Connection, params};

use bayrate::error::RatingError;
use bayrate::store::{
    GameRecord, exclude_bogus_game_data, insert_game, insert_player, insert_tournament,
    load_td_list_prior, load_tournament, open_in_memory, rating_history, sync_new_ratings,
    tournament_update_list, upsert_rating,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn game(code: &str, date: NaiveDate, p1: (u32, &str), p2: (u32, &str)) -> GameRecord {
    GameRecord {
        tournament_code: code.to_string(),
        game_date: date,
        player_1: p1.0,
        rank_1: p1.1.to_string(),
        color_1: "W".to_string(),
        player_2: p2.0,
        rank_2: p2.1.to_string(),
        color_2: "B".to_string(),
        handicap: 0,
        komi: 7.5,
        result: "W".to_string(),
        online: false,
    }
}

fn excluded(conn: &Connection) -> Vec<i64> {
    let mut stmt = conn
        .prepare("SELECT game_id FROM games WHERE exclude = 1 ORDER BY game_id")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn bogus_games_are_excluded() {
    let conn = open_in_memory().unwrap();
    let d = day(2024, 1, 6);
    let good = insert_game(&conn, &game("T", d, (1, "3d"), (2, "2k"))).unwrap();

    let mut bad = Vec::new();
    bad.push(insert_game(&conn, &game("T", d, (1, "3p"), (2, "2k"))).unwrap());
    bad.push(insert_game(&conn, &game("T", d, (1, "3d"), (2, "0K"))).unwrap());
    bad.push(insert_game(&conn, &game("T", d, (0, "3d"), (2, "2k"))).unwrap());
    bad.push(insert_game(&conn, &game("T", day(1899, 5, 1), (1, "3d"), (2, "2k"))).unwrap());
    let mut g = game("T", d, (1, "3d"), (2, "2k"));
    g.handicap = 10;
    g.komi = 0.0;
    bad.push(insert_game(&conn, &g).unwrap());
    g.handicap = 3;
    g.komi = 12.0;
    bad.push(insert_game(&conn, &g).unwrap());
    g.handicap = 0;
    g.komi = -25.0;
    bad.push(insert_game(&conn, &g).unwrap());
    // reverse komi on an even game is fine
    g.komi = -7.5;
    let reverse = insert_game(&conn, &g).unwrap();

    assert_eq!(exclude_bogus_game_data(&conn).unwrap(), bad.len());
    assert_eq!(excluded(&conn), bad);
    assert!(!bad.contains(&good) && !bad.contains(&reverse));
    // already excluded rows are not counted again
    assert_eq!(exclude_bogus_game_data(&conn).unwrap(), 0);
}

#[test]
fn update_list_starts_at_earliest_unrated_game() {
    let conn = open_in_memory().unwrap();
    insert_tournament(&conn, "OLD", "Old", day(2023, 3, 1)).unwrap();
    insert_tournament(&conn, "MID", "Mid", day(2023, 8, 1)).unwrap();
    insert_tournament(&conn, "NEW", "New", day(2024, 1, 1)).unwrap();
    insert_game(&conn, &game("OLD", day(2023, 3, 1), (1, "1d"), (2, "1k"))).unwrap();
    insert_game(&conn, &game("MID", day(2023, 8, 1), (1, "1d"), (2, "1k"))).unwrap();
    insert_game(&conn, &game("NEW", day(2024, 1, 1), (1, "1d"), (2, "1k"))).unwrap();
    conn.execute("UPDATE games SET rated = 1 WHERE tournament_code = 'OLD'", [])
        .unwrap();
    let mut online = game("OLD", day(2023, 3, 1), (3, "5k"), (4, "6k"));
    online.online = true;
    insert_game(&conn, &online).unwrap();

    let plan = tournament_update_list(&conn).unwrap().unwrap();
    assert_eq!(plan.cascade_date, day(2023, 8, 1));
    assert_eq!(plan.codes, vec!["MID".to_string(), "NEW".to_string()]);

    conn.execute("UPDATE games SET rated = 1", []).unwrap();
    assert!(tournament_update_list(&conn).unwrap().is_none());
}

#[test]
fn td_list_takes_latest_rating_strictly_before_date() {
    let conn = open_in_memory().unwrap();
    insert_player(&conn, 1, "Cho Hun").unwrap();
    upsert_rating(&conn, 1, 2.1, 0.5, day(2022, 1, 1)).unwrap();
    upsert_rating(&conn, 1, 2.6, 0.4, day(2023, 1, 1)).unwrap();
    upsert_rating(&conn, 1, 3.4, 0.3, day(2024, 1, 1)).unwrap();
    upsert_rating(&conn, 2, -4.0, 0.9, day(2024, 1, 1)).unwrap();

    let list = load_td_list_prior(&conn, day(2024, 1, 1)).unwrap();
    assert_eq!(list.len(), 1);
    let e = list.get(1).unwrap();
    assert_eq!(e.rating, 2.6);
    assert_eq!(e.last_rating_date, day(2023, 1, 1));
    assert_eq!(e.name, "Cho Hun");
    assert!(!e.rating_updated);

    let later = load_td_list_prior(&conn, day(2024, 1, 2)).unwrap();
    assert_eq!(later.get(1).unwrap().rating, 3.4);
    assert_eq!(later.name_of(2), "");
}

#[test]
fn tournament_colours_and_first_rank_win() {
    let conn = open_in_memory().unwrap();
    let d = day(2024, 3, 2);
    insert_tournament(&conn, "CC", "Club Champs", d).unwrap();
    insert_game(&conn, &game("CC", d, (1, "2d"), (2, "4k"))).unwrap();
    let mut swapped = game("CC", d, (2, "3k"), (3, "1d"));
    swapped.color_1 = "B".to_string();
    swapped.color_2 = "W".to_string();
    swapped.result = "B".to_string();
    swapped.handicap = 3;
    swapped.komi = 0.5;
    insert_game(&conn, &swapped).unwrap();

    let c = load_tournament(&conn, "CC").unwrap().unwrap();
    assert_eq!(c.name, "Club Champs");
    assert_eq!(c.date, Some(d));
    assert_eq!(c.games.len(), 2);
    assert_eq!((c.games[1].white, c.games[1].black), (3, 2));
    assert!(!c.games[1].white_wins);
    assert_eq!(c.games[1].winner(), 2);
    // player 2 keeps the rank from their first game
    assert_eq!(c.player(2).unwrap().seed, -4.5);
    assert_eq!(c.player(3).unwrap().seed, 1.5);

    assert!(load_tournament(&conn, "NOPE").unwrap().is_none());
}

#[test]
fn unknown_colour_and_bad_rank_are_fatal() {
    let conn = open_in_memory().unwrap();
    let d = day(2024, 3, 2);
    insert_tournament(&conn, "X", "", d).unwrap();
    let mut g = game("X", d, (1, "2d"), (2, "4k"));
    g.color_1 = "?".to_string();
    insert_game(&conn, &g).unwrap();
    let err = load_tournament(&conn, "X").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RatingError>(),
        Some(RatingError::UnknownColor(c)) if c == "?"
    ));

    insert_tournament(&conn, "Y", "", d).unwrap();
    insert_game(&conn, &game("Y", d, (1, "dk"), (2, "4k"))).unwrap();
    let err = load_tournament(&conn, "Y").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RatingError>(),
        Some(RatingError::RankFormat { player: 1, .. })
    ));
}

#[test]
fn sync_writes_history_and_marks_games() {
    let mut conn = open_in_memory().unwrap();
    let d = day(2024, 5, 18);
    insert_player(&conn, 1, "A").unwrap();
    insert_player(&conn, 2, "B").unwrap();
    insert_tournament(&conn, "S", "", d).unwrap();
    insert_game(&conn, &game("S", d, (1, "1d"), (2, "2k"))).unwrap();

    let mut c = load_tournament(&conn, "S").unwrap().unwrap();
    for p in c.players.values_mut() {
        p.rating = p.seed + 0.3;
        p.sigma = 0.7;
    }
    sync_new_ratings(&mut conn, &c).unwrap();
    // rerating the same day replaces, not duplicates
    sync_new_ratings(&mut conn, &c).unwrap();

    let history = rating_history(&conn, 1).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].0, d);
    assert!((history[0].1 - 1.8).abs() < 1e-12);
    assert_eq!(history[0].2, 0.7);
    let (rating, elab): (f64, String) = conn
        .query_row(
            "SELECT rating, elab_date FROM players WHERE pin_player = ?1",
            params![2],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!((rating - -2.2).abs() < 1e-12);
    assert_eq!(elab, "2024-05-18");
    let rated: i64 = conn
        .query_row("SELECT COUNT(*) FROM games WHERE rated = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rated, 1);
}
