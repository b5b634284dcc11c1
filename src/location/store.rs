//! Location Storage
//! Mission: Read-optimized SQLite access for caverns and links

use crate::location::models::{Cavern, Link, NewCavern, NewLink};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Query window for list endpoints
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Location storage with SQLite backend.
///
/// The HTTP surface is read-only; the insert methods exist for the
/// out-of-band seeder and for tests.
pub struct LocationStore {
    db_path: String,
}

impl LocationStore {
    /// Create the store and initialize the schema
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<()> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS caverns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                gimp_file_ref TEXT NOT NULL,
                layer INTEGER NOT NULL,
                found INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                travel_duration TEXT NOT NULL,
                found INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS link_caverns (
                link_id INTEGER NOT NULL,
                cavern_id INTEGER NOT NULL,
                PRIMARY KEY (link_id, cavern_id),
                FOREIGN KEY (link_id) REFERENCES links(id),
                FOREIGN KEY (cavern_id) REFERENCES caverns(id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Insert a cavern (out-of-band mutation path)
    pub fn insert_cavern(&self, new: &NewCavern) -> Result<Cavern> {
        let conn = Connection::open(&self.db_path)?;

        conn.execute(
            "INSERT INTO caverns (name, gimp_file_ref, layer, found) VALUES (?1, ?2, ?3, ?4)",
            params![new.name, new.gimp_file_ref, new.layer, new.found],
        )
        .context("Failed to insert cavern")?;

        let id = conn.last_insert_rowid();

        Ok(Cavern {
            id,
            name: new.name.clone(),
            gimp_file_ref: new.gimp_file_ref.clone(),
            layer: new.layer,
            found: new.found,
        })
    }

    /// Insert a link and its cavern set (out-of-band mutation path)
    pub fn insert_link(&self, new: &NewLink) -> Result<Link> {
        let conn = Connection::open(&self.db_path)?;

        // Referenced caverns must already exist
        for cavern_id in &new.caverns {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM caverns WHERE id = ?1",
                    params![cavern_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                bail!("Link '{}' references unknown cavern {}", new.name, cavern_id);
            }
        }

        conn.execute(
            "INSERT INTO links (name, travel_duration, found) VALUES (?1, ?2, ?3)",
            params![new.name, new.travel_duration, new.found],
        )
        .context("Failed to insert link")?;

        let id = conn.last_insert_rowid();

        for cavern_id in &new.caverns {
            conn.execute(
                "INSERT OR IGNORE INTO link_caverns (link_id, cavern_id) VALUES (?1, ?2)",
                params![id, cavern_id],
            )?;
        }

        self.get_link(id)?
            .context("Inserted link disappeared before readback")
    }

    /// List caverns ordered by id ascending; returns (total count, page)
    pub fn list_caverns(&self, found: Option<bool>, page: Page) -> Result<(i64, Vec<Cavern>)> {
        let conn = Connection::open(&self.db_path)?;

        let (count, rows) = match found {
            Some(flag) => {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM caverns WHERE found = ?1",
                    params![flag],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, gimp_file_ref, layer, found FROM caverns
                     WHERE found = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![flag, page.limit, page.offset], map_cavern_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                (count, rows)
            }
            None => {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM caverns", [], |row| row.get(0))?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, gimp_file_ref, layer, found FROM caverns
                     ORDER BY id ASC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![page.limit, page.offset], map_cavern_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                (count, rows)
            }
        };

        Ok((count, rows))
    }

    /// Single-cavern lookup; absence is Ok(None)
    pub fn get_cavern(&self, id: i64) -> Result<Option<Cavern>> {
        let conn = Connection::open(&self.db_path)?;

        let cavern = conn
            .query_row(
                "SELECT id, name, gimp_file_ref, layer, found FROM caverns WHERE id = ?1",
                params![id],
                map_cavern_row,
            )
            .optional()?;

        Ok(cavern)
    }

    /// List links ordered by id ascending; returns (total count, page)
    pub fn list_links(&self, found: Option<bool>, page: Page) -> Result<(i64, Vec<Link>)> {
        let conn = Connection::open(&self.db_path)?;

        let (count, bare_rows) = match found {
            Some(flag) => {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM links WHERE found = ?1",
                    params![flag],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, travel_duration, found FROM links
                     WHERE found = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt
                    .query_map(params![flag, page.limit, page.offset], map_link_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                (count, rows)
            }
            None => {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
                let mut stmt = conn.prepare(
                    "SELECT id, name, travel_duration, found FROM links
                     ORDER BY id ASC LIMIT ?1 OFFSET ?2",
                )?;
                let rows = stmt
                    .query_map(params![page.limit, page.offset], map_link_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                (count, rows)
            }
        };

        let links = bare_rows
            .into_iter()
            .map(|link| self.attach_caverns(&conn, link))
            .collect::<Result<Vec<_>>>()?;

        Ok((count, links))
    }

    /// Single-link lookup with its cavern set; absence is Ok(None)
    pub fn get_link(&self, id: i64) -> Result<Option<Link>> {
        let conn = Connection::open(&self.db_path)?;

        let link = conn
            .query_row(
                "SELECT id, name, travel_duration, found FROM links WHERE id = ?1",
                params![id],
                map_link_row,
            )
            .optional()?;

        match link {
            Some(link) => Ok(Some(self.attach_caverns(&conn, link)?)),
            None => Ok(None),
        }
    }

    fn attach_caverns(&self, conn: &Connection, mut link: Link) -> Result<Link> {
        let mut stmt = conn.prepare(
            "SELECT cavern_id FROM link_caverns WHERE link_id = ?1 ORDER BY cavern_id ASC",
        )?;
        link.caverns = stmt
            .query_map(params![link.id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(link)
    }
}

fn map_cavern_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cavern> {
    Ok(Cavern {
        id: row.get(0)?,
        name: row.get(1)?,
        gimp_file_ref: row.get(2)?,
        layer: row.get(3)?,
        found: row.get(4)?,
    })
}

fn map_link_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Link> {
    Ok(Link {
        id: row.get(0)?,
        name: row.get(1)?,
        travel_duration: row.get(2)?,
        caverns: Vec::new(),
        found: row.get(3)?,
    })
}
