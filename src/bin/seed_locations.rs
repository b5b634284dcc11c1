//! Location Seeder
//! Mission: Load cavern and link data into the location database
//!
//! The HTTP API is read-only; this binary is the out-of-band mutation path.
//! Seed files are JSON with caverns listed first and links referencing them
//! by name (see data/seed_locations.example.json).

use anyhow::{bail, Context, Result};
use cavemap_backend::location::{
    models::{NewCavern, NewLink},
    LocationStore,
};
use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "seed_locations", about = "Load caverns and links from a JSON seed file")]
struct Args {
    /// JSON seed file
    file: PathBuf,

    /// SQLite database path
    #[arg(long, env = "CAVEMAP_DB_PATH", default_value = "cavemap.db")]
    db_path: String,
}

#[derive(Deserialize)]
struct SeedFile {
    #[serde(default)]
    caverns: Vec<NewCavern>,
    #[serde(default)]
    links: Vec<SeedLink>,
}

/// Link entry in a seed file; caverns are referenced by name
#[derive(Deserialize)]
struct SeedLink {
    name: String,
    travel_duration: String,
    caverns: Vec<String>,
    #[serde(default)]
    found: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read seed file {}", args.file.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid seed file {}", args.file.display()))?;

    let store = LocationStore::new(&args.db_path)?;

    let mut cavern_ids: HashMap<String, i64> = HashMap::new();
    for new in &seed.caverns {
        let cavern = store.insert_cavern(new)?;
        cavern_ids.insert(cavern.name.clone(), cavern.id);
    }

    for link in &seed.links {
        let ids = link
            .caverns
            .iter()
            .map(|name| match cavern_ids.get(name) {
                Some(id) => Ok(*id),
                None => bail!("Link '{}' references unknown cavern '{}'", link.name, name),
            })
            .collect::<Result<Vec<i64>>>()?;

        store.insert_link(&NewLink {
            name: link.name.clone(),
            travel_duration: link.travel_duration.clone(),
            caverns: ids,
            found: link.found,
        })?;
    }

    info!(
        "Seeded {} caverns and {} links into {}",
        seed.caverns.len(),
        seed.links.len(),
        args.db_path
    );

    Ok(())
}
