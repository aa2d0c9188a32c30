//! SQLite persistence for players, rating history, tournaments and games.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::collection::{Collection, Game, PlayerId};
use crate::error::RatingError;
use crate::rank::parse_rank;
use crate::td_list::{TdList, TdListEntry};

const DATE_FORMAT: &str = "%Y-%m-%d";
const EPOCH_DATE: &str = "1900-01-01";

/// Tournaments needing (re)rating, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadePlan {
    /// Date of the earliest unrated game.
    pub cascade_date: NaiveDate,
    pub codes: Vec<String>,
}

/// One row of the `games` table as entered by a tournament director.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct GameRecord {
    pub tournament_code: String,
    pub game_date: NaiveDate,
    pub player_1: PlayerId,
    pub rank_1: String,
    pub color_1: String,
    pub player_2: PlayerId,
    pub rank_2: String,
    pub color_2: String,
    pub handicap: u32,
    pub komi: f64,
    /// `W` or `B`.
    pub result: String,
    #[serde(default)]
    pub online: bool,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            pin_player INTEGER PRIMARY KEY,
            name TEXT NOT NULL DEFAULT '',
            rating REAL NULL,
            sigma REAL NULL,
            elab_date TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS ratings (
            pin_player INTEGER NOT NULL,
            rating REAL NOT NULL,
            sigma REAL NOT NULL,
            elab_date TEXT NOT NULL,
            PRIMARY KEY (pin_player, elab_date)
        );
        CREATE INDEX IF NOT EXISTS idx_ratings_elab_date ON ratings(elab_date);

        CREATE TABLE IF NOT EXISTS tournaments (
            tournament_code TEXT PRIMARY KEY,
            tournament_descr TEXT NOT NULL DEFAULT '',
            tournament_date TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tournaments_date ON tournaments(tournament_date);

        CREATE TABLE IF NOT EXISTS games (
            game_id INTEGER PRIMARY KEY AUTOINCREMENT,
            tournament_code TEXT NOT NULL,
            game_date TEXT NOT NULL,
            pin_player_1 INTEGER NOT NULL,
            rank_1 TEXT NOT NULL,
            color_1 TEXT NOT NULL,
            pin_player_2 INTEGER NOT NULL,
            rank_2 TEXT NOT NULL,
            color_2 TEXT NOT NULL,
            handicap INTEGER NOT NULL DEFAULT 0,
            komi REAL NOT NULL DEFAULT 0,
            result TEXT NOT NULL,
            online INTEGER NOT NULL DEFAULT 0,
            exclude INTEGER NOT NULL DEFAULT 0,
            rated INTEGER NOT NULL DEFAULT 0,
            elab_date TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_tournament ON games(tournament_code);
        CREATE INDEX IF NOT EXISTS idx_games_date ON games(game_date);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Mark games whose data cannot be rated. Returns the number newly excluded.
///
/// Ranks must be kyu or dan (and not `0k`/`0d`), handicaps at most 9, komi in a
/// plausible range for the handicap, dates after 1900 and both player ids set.
pub fn exclude_bogus_game_data(conn: &Connection) -> Result<usize> {
    let n = conn
        .execute(
            r#"
            UPDATE games SET exclude = 1
            WHERE exclude = 0 AND (
                NOT (rank_1 LIKE '%k%' OR rank_1 LIKE '%d%')
                OR NOT (rank_2 LIKE '%k%' OR rank_2 LIKE '%d%')
                OR lower(trim(rank_1)) IN ('0k', '0d')
                OR lower(trim(rank_2)) IN ('0k', '0d')
                OR handicap > 9
                OR (handicap >= 2 AND (komi >= 10 OR komi <= -10))
                OR (handicap < 2 AND komi <= -20)
                OR game_date < ?1
                OR pin_player_1 = 0
                OR pin_player_2 = 0
            )
            "#,
            params![EPOCH_DATE],
        )
        .context("exclude bogus games")?;
    if n > 0 {
        info!(excluded = n, "excluded unratable games");
    }
    Ok(n)
}

/// The earliest unrated game date and every tournament held on or after it.
/// `None` when nothing needs rating.
pub fn tournament_update_list(conn: &Connection) -> Result<Option<CascadePlan>> {
    let earliest = conn
        .query_row(
            "SELECT MIN(game_date) FROM games
             WHERE game_date > ?1 AND online = 0 AND exclude = 0 AND rated = 0",
            params![EPOCH_DATE],
            |row| row.get::<_, Option<String>>(0),
        )
        .context("query earliest unrated game")?;
    let Some(raw) = earliest else {
        return Ok(None);
    };
    let cascade_date = parse_date(&raw)?;

    let mut stmt = conn
        .prepare(
            "SELECT tournament_code FROM tournaments
             WHERE tournament_date >= ?1
             ORDER BY tournament_date ASC, tournament_code ASC",
        )
        .context("prepare tournament list query")?;
    let rows = stmt
        .query_map(params![format_date(cascade_date)], |row| row.get::<_, String>(0))
        .context("query tournament list")?;

    let mut codes = Vec::new();
    for row in rows {
        codes.push(row.context("decode tournament code")?);
    }
    Ok(Some(CascadePlan {
        cascade_date,
        codes,
    }))
}

/// Latest rating of every player strictly before `date`.
pub fn load_td_list_prior(conn: &Connection, date: NaiveDate) -> Result<TdList> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT x.pin_player, COALESCE(p.name, ''), x.rating, x.sigma, x.elab_date
            FROM ratings x
            JOIN (
                SELECT pin_player, MAX(elab_date) AS max_date
                FROM ratings
                WHERE elab_date < ?1
                GROUP BY pin_player
            ) latest ON x.pin_player = latest.pin_player AND x.elab_date = latest.max_date
            LEFT JOIN players p ON p.pin_player = x.pin_player
            WHERE x.pin_player != 0
            "#,
        )
        .context("prepare td list query")?;

    let rows = stmt
        .query_map(params![format_date(date)], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })
        .context("query td list")?;

    let mut list = TdList::new();
    for row in rows {
        let (id, name, rating, sigma, elab_date) = row.context("decode td list row")?;
        let last_rating_date = match elab_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_date(raw)?,
            _ => epoch(),
        };
        let mut entry = TdListEntry::new(id, rating, sigma, last_rating_date);
        entry.name = name;
        list.insert(entry);
    }
    debug!(date = %date, players = list.len(), "loaded td list");
    Ok(list)
}

/// Players and games of one tournament, skipping online and excluded games.
/// `None` when the tournament is unknown or undated.
pub fn load_tournament(conn: &Connection, code: &str) -> Result<Option<Collection>> {
    let header = conn
        .query_row(
            "SELECT tournament_descr, tournament_date FROM tournaments WHERE tournament_code = ?1",
            params![code],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()
        .with_context(|| format!("query tournament {code}"))?;
    let Some((name, Some(raw_date))) = header else {
        return Ok(None);
    };
    let date = parse_date(&raw_date)?;
    let mut collection = Collection::new(code, name, date);

    let mut stmt = conn
        .prepare(
            r#"
            SELECT pin_player_1, rank_1, color_1, pin_player_2, rank_2, handicap, komi, result
            FROM games
            WHERE tournament_code = ?1 AND online = 0 AND exclude = 0
            ORDER BY game_id ASC
            "#,
        )
        .context("prepare tournament games query")?;
    let rows = stmt
        .query_map(params![code], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, u32>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })
        .context("query tournament games")?;

    for row in rows {
        let (p1, rank_1, color_1, p2, rank_2, handicap, komi, result) =
            row.context("decode game row")?;
        let (white, black) = match color_1.trim() {
            "W" => (p1, p2),
            "B" => (p2, p1),
            other => return Err(RatingError::UnknownColor(other.to_string()).into()),
        };
        let white_wins = match result.trim() {
            "W" => true,
            "B" => false,
            other => return Err(RatingError::UnknownResult(other.to_string()).into()),
        };
        collection.add_game(Game {
            white,
            black,
            white_wins,
            handicap,
            komi,
        });

        if collection.player(p1).is_none() {
            collection.add_player(p1, parse_rank(p1, &rank_1)?);
        }
        if collection.player(p2).is_none() {
            collection.add_player(p2, parse_rank(p2, &rank_2)?);
        }
    }
    Ok(Some(collection))
}

/// Write a rated tournament back: rating history, current player ratings and
/// the rated flag on its games, all in one transaction.
pub fn sync_new_ratings(conn: &mut Connection, collection: &Collection) -> Result<()> {
    let Some(date) = collection.date else {
        return Ok(());
    };
    let date = format_date(date);
    let tx = conn.transaction().context("begin sync transaction")?;
    for player in collection.players.values() {
        tx.execute(
            r#"
            INSERT INTO ratings (pin_player, rating, sigma, elab_date)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(pin_player, elab_date) DO UPDATE SET
                rating = excluded.rating,
                sigma = excluded.sigma
            "#,
            params![player.id as i64, player.rating, player.sigma, date],
        )
        .with_context(|| format!("upsert rating for {}", player.id))?;
        tx.execute(
            "UPDATE players SET rating = ?1, sigma = ?2, elab_date = ?3 WHERE pin_player = ?4",
            params![player.rating, player.sigma, date, player.id as i64],
        )
        .with_context(|| format!("update player {}", player.id))?;
    }
    tx.execute(
        "UPDATE games SET elab_date = ?1, rated = 1 WHERE tournament_code = ?2 AND online = 0",
        params![date, collection.code],
    )
    .context("mark games rated")?;
    tx.commit().context("commit sync transaction")?;
    Ok(())
}

pub fn insert_player(conn: &Connection, id: PlayerId, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO players (pin_player, name) VALUES (?1, ?2)
         ON CONFLICT(pin_player) DO UPDATE SET name = excluded.name",
        params![id as i64, name],
    )
    .context("insert player")?;
    Ok(())
}

pub fn insert_tournament(conn: &Connection, code: &str, descr: &str, date: NaiveDate) -> Result<()> {
    conn.execute(
        "INSERT INTO tournaments (tournament_code, tournament_descr, tournament_date)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(tournament_code) DO UPDATE SET
            tournament_descr = excluded.tournament_descr,
            tournament_date = excluded.tournament_date",
        params![code, descr, format_date(date)],
    )
    .context("insert tournament")?;
    Ok(())
}

pub fn insert_game(conn: &Connection, g: &GameRecord) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO games (
            tournament_code, game_date,
            pin_player_1, rank_1, color_1,
            pin_player_2, rank_2, color_2,
            handicap, komi, result, online
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            g.tournament_code,
            format_date(g.game_date),
            g.player_1 as i64,
            g.rank_1,
            g.color_1,
            g.player_2 as i64,
            g.rank_2,
            g.color_2,
            g.handicap as i64,
            g.komi,
            g.result,
            bool_to_i64(g.online),
        ],
    )
    .context("insert game")?;
    Ok(conn.last_insert_rowid())
}

pub fn upsert_rating(
    conn: &Connection,
    id: PlayerId,
    rating: f64,
    sigma: f64,
    date: NaiveDate,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO ratings (pin_player, rating, sigma, elab_date)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(pin_player, elab_date) DO UPDATE SET
            rating = excluded.rating,
            sigma = excluded.sigma
        "#,
        params![id as i64, rating, sigma, format_date(date)],
    )
    .context("upsert rating")?;
    Ok(())
}

/// Every rating row of one player, oldest first.
pub fn rating_history(conn: &Connection, id: PlayerId) -> Result<Vec<(NaiveDate, f64, f64)>> {
    let mut stmt = conn
        .prepare(
            "SELECT elab_date, rating, sigma FROM ratings
             WHERE pin_player = ?1 ORDER BY elab_date ASC",
        )
        .context("prepare rating history query")?;
    let rows = stmt
        .query_map(params![id as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, row.get::<_, f64>(2)?))
        })
        .context("query rating history")?;

    let mut out = Vec::new();
    for row in rows {
        let (raw, rating, sigma) = row.context("decode rating row")?;
        out.push((parse_date(&raw)?, rating, sigma));
    }
    Ok(out)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, RatingError> {
    let trimmed = raw.trim();
    // DATETIME columns come back with a time part
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, DATE_FORMAT).map_err(|source| RatingError::Date {
        raw: raw.to_string(),
        source,
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
