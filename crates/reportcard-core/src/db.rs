// SQLite persistence for the player roster and scout notes.

use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::athlete::{normalize_name, Athlete, Handedness, Position};
use crate::notes::ScoutNote;

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite-backed store for players and scout notes.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS players (
                name_key    TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                dob         TEXT,
                class       TEXT NOT NULL DEFAULT '',
                school      TEXT NOT NULL DEFAULT '',
                height      INTEGER,
                weight      INTEGER,
                position    TEXT,
                bats        TEXT,
                throws      TEXT
            );

            CREATE TABLE IF NOT EXISTS scout_notes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                athlete     TEXT NOT NULL,
                note_date   TEXT NOT NULL,
                body        TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_scout_notes_athlete ON scout_notes(athlete);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Add a new player. Fails if a player with the same normalized name
    /// already exists.
    pub fn add_player(&self, athlete: &Athlete) -> Result<()> {
        if athlete.name.trim().is_empty() {
            bail!("player name must not be empty");
        }
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM players WHERE name_key = ?1)",
                params![athlete.key()],
                |row| row.get(0),
            )
            .context("failed to check for existing player")?;
        if exists {
            bail!("player '{}' already exists", athlete.name);
        }
        insert_player(&conn, athlete).context("failed to add player")?;
        Ok(())
    }

    /// Overwrite the player currently named `name` with `updated`. Renames
    /// carry the player's scout notes along. Returns `false` when no player
    /// named `name` exists.
    pub fn update_player(&self, name: &str, updated: &Athlete) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let old_key = normalize_name(name);
        let current: Option<String> = tx
            .query_row(
                "SELECT name FROM players WHERE name_key = ?1",
                params![old_key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up player")?;
        let Some(current_name) = current else {
            return Ok(false);
        };

        let new_key = updated.key();
        if new_key != old_key {
            let taken: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM players WHERE name_key = ?1)",
                    params![new_key],
                    |row| row.get(0),
                )
                .context("failed to check rename target")?;
            if taken {
                bail!("cannot rename '{}': '{}' already exists", current_name, updated.name);
            }
        }

        tx.execute("DELETE FROM players WHERE name_key = ?1", params![old_key])
            .context("failed to remove old player row")?;
        insert_player(&tx, updated).context("failed to write updated player")?;
        if updated.name != current_name {
            tx.execute(
                "UPDATE scout_notes SET athlete = ?1 WHERE athlete = ?2",
                params![updated.name, current_name],
            )
            .context("failed to move scout notes to renamed player")?;
        }
        tx.commit().context("failed to commit player update")?;
        Ok(true)
    }

    /// Delete a player by name. Returns `false` if no such player exists.
    pub fn delete_player(&self, name: &str) -> Result<bool> {
        let conn = self.conn();
        let n = conn
            .execute(
                "DELETE FROM players WHERE name_key = ?1",
                params![normalize_name(name)],
            )
            .context("failed to delete player")?;
        Ok(n > 0)
    }

    pub fn get_player(&self, name: &str) -> Result<Option<Athlete>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, dob, class, school, height, weight, position, bats, throws
             FROM players WHERE name_key = ?1",
            params![normalize_name(name)],
            player_from_row,
        )
        .optional()
        .context("failed to load player")
    }

    /// All players ordered by name.
    pub fn list_players(&self) -> Result<Vec<Athlete>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT name, dob, class, school, height, weight, position, bats, throws
                 FROM players ORDER BY name_key",
            )
            .context("failed to prepare list_players query")?;

        let players = stmt
            .query_map([], player_from_row)
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    /// Bulk import in a single transaction. Existing players with the same
    /// normalized name are overwritten. Returns the number of rows written.
    pub fn import_players(&self, athletes: &[Athlete]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for athlete in athletes {
            tx.execute("DELETE FROM players WHERE name_key = ?1", params![athlete.key()])
                .with_context(|| format!("failed to replace player '{}'", athlete.name))?;
            insert_player(&tx, athlete)
                .with_context(|| format!("failed to import player '{}'", athlete.name))?;
        }
        tx.commit().context("failed to commit player import")?;
        Ok(athletes.len())
    }

    /// Delete every player. Scout notes are kept.
    pub fn clear_players(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM players", [])
            .context("failed to clear players")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scout notes
    // ------------------------------------------------------------------

    /// Store a note and return its id.
    pub fn add_note(&self, athlete: &str, date: NaiveDate, text: &str) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scout_notes (athlete, note_date, body) VALUES (?1, ?2, ?3)",
            params![athlete.trim(), date.format(DATE_FMT).to_string(), text],
        )
        .context("failed to add scout note")?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete a note by id. Returns `false` if it did not exist.
    pub fn delete_note(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let n = conn
            .execute("DELETE FROM scout_notes WHERE id = ?1", params![id])
            .context("failed to delete scout note")?;
        Ok(n > 0)
    }

    /// Every stored note, in insertion order.
    pub fn list_notes(&self) -> Result<Vec<ScoutNote>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, athlete, note_date, body FROM scout_notes ORDER BY id")
            .context("failed to prepare list_notes query")?;
        let notes = stmt
            .query_map([], |row| {
                let date_str: String = row.get(2)?;
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, date_str, row.get::<_, String>(3)?))
            })
            .context("failed to query scout notes")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map scout note rows")?;

        notes
            .into_iter()
            .map(|(id, athlete, date_str, text)| {
                let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)
                    .with_context(|| format!("scout note {id} has invalid date '{date_str}'"))?;
                Ok(ScoutNote {
                    id,
                    athlete,
                    date,
                    text,
                })
            })
            .collect()
    }

    /// Delete every scout note.
    pub fn clear_notes(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM scout_notes", [])
            .context("failed to clear scout notes")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn insert_player(conn: &Connection, a: &Athlete) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO players (name_key, name, dob, class, school, height, weight, position, bats, throws)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            a.key(),
            a.name.trim(),
            a.dob.map(|d| d.format(DATE_FMT).to_string()),
            a.class,
            a.school,
            a.height,
            a.weight,
            a.position.map(|p| p.display_str()),
            a.bats.map(|h| h.display_str()),
            a.throws.map(|h| h.display_str()),
        ],
    )
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Athlete> {
    let dob: Option<String> = row.get(1)?;
    let position: Option<String> = row.get(6)?;
    let bats: Option<String> = row.get(7)?;
    let throws: Option<String> = row.get(8)?;
    Ok(Athlete {
        name: row.get(0)?,
        dob: dob.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()),
        class: row.get(2)?,
        school: row.get(3)?,
        height: row.get(4)?,
        weight: row.get(5)?,
        position: position.as_deref().and_then(Position::from_str_pos),
        bats: bats.as_deref().and_then(Handedness::from_str_hand),
        throws: throws.as_deref().and_then(Handedness::from_str_hand),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn jake() -> Athlete {
        let mut a = Athlete::new("Jake Diaz", Some(date(2009, 6, 1)));
        a.class = "2027".into();
        a.school = "Coral Gables".into();
        a.height = Some(70);
        a.weight = Some(165);
        a.position = Some(Position::FirstBase);
        a.bats = Some(Handedness::Left);
        a.throws = Some(Handedness::Right);
        a
    }

    #[test]
    fn add_and_get_player_roundtrip() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();

        let loaded = db.get_player(" JAKE DIAZ ").unwrap().expect("player should exist");
        assert_eq!(loaded, jake());
    }

    #[test]
    fn add_duplicate_player_fails() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();
        let err = db.add_player(&Athlete::new("jake diaz", None)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn add_player_rejects_empty_name() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.add_player(&Athlete::new("  ", None)).is_err());
    }

    #[test]
    fn update_overwrites_in_place() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();

        let mut edited = jake();
        edited.weight = Some(172);
        assert!(db.update_player("Jake Diaz", &edited).unwrap());
        assert_eq!(db.get_player("Jake Diaz").unwrap().unwrap().weight, Some(172));
        assert_eq!(db.list_players().unwrap().len(), 1);
    }

    #[test]
    fn rename_moves_notes() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();
        db.add_note("Jake Diaz", date(2024, 6, 1), "quick hands").unwrap();

        let mut renamed = jake();
        renamed.name = "Jacob Diaz".into();
        assert!(db.update_player("Jake Diaz", &renamed).unwrap());

        assert!(db.get_player("Jake Diaz").unwrap().is_none());
        let notes = db.list_notes().unwrap();
        assert_eq!(notes[0].athlete, "Jacob Diaz");
    }

    #[test]
    fn rename_onto_existing_player_fails_without_changes() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();
        db.add_player(&Athlete::new("Luis Ortega", None)).unwrap();

        let mut renamed = jake();
        renamed.name = "Luis Ortega".into();
        assert!(db.update_player("Jake Diaz", &renamed).is_err());
        assert!(db.get_player("Jake Diaz").unwrap().is_some());
    }

    #[test]
    fn update_missing_player_returns_false() {
        let db = Database::open(":memory:").unwrap();
        assert!(!db.update_player("Nobody", &jake()).unwrap());
    }

    #[test]
    fn delete_and_clear_players() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();
        db.add_player(&Athlete::new("Luis Ortega", None)).unwrap();

        assert!(db.delete_player("luis ortega").unwrap());
        assert!(!db.delete_player("luis ortega").unwrap());
        assert_eq!(db.list_players().unwrap().len(), 1);

        db.clear_players().unwrap();
        assert!(db.list_players().unwrap().is_empty());
    }

    #[test]
    fn import_overwrites_existing() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();

        let mut newer = jake();
        newer.class = "2026".into();
        let n = db
            .import_players(&[newer, Athlete::new("Luis Ortega", Some(date(2011, 2, 14)))])
            .unwrap();
        assert_eq!(n, 2);

        let players = db.list_players().unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].name, "Jake Diaz");
        assert_eq!(players[0].class, "2026");
    }

    #[test]
    fn notes_add_list_delete_clear() {
        let db = Database::open(":memory:").unwrap();
        let first = db.add_note("Jake Diaz", date(2024, 5, 1), "first").unwrap();
        let second = db.add_note("Jake Diaz", date(2024, 6, 1), "second").unwrap();
        assert!(second > first);

        let notes = db.list_notes().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].date, date(2024, 6, 1));

        assert!(db.delete_note(first).unwrap());
        assert!(!db.delete_note(first).unwrap());
        assert_eq!(db.list_notes().unwrap().len(), 1);

        db.clear_notes().unwrap();
        assert!(db.list_notes().unwrap().is_empty());
    }

    #[test]
    fn clearing_players_keeps_notes() {
        let db = Database::open(":memory:").unwrap();
        db.add_player(&jake()).unwrap();
        db.add_note("Jake Diaz", date(2024, 6, 1), "keep me").unwrap();
        db.clear_players().unwrap();
        assert_eq!(db.list_notes().unwrap().len(), 1);
    }
}
