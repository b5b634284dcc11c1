//! Location Models
//! Mission: Define the cavern and link entities served by the read API

use serde::{Deserialize, Serialize};

/// A cavern node on the map.
///
/// Fields serialized to clients are fixed here; nothing is derived
/// dynamically, so adding a column later never leaks by accident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cavern {
    pub id: i64,
    pub name: String,
    pub gimp_file_ref: String,
    pub layer: i64,
    pub found: bool,
}

/// A traversal edge connecting a set of caverns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub name: String,
    pub travel_duration: String,
    pub caverns: Vec<i64>,
    pub found: bool,
}

/// Cavern payload for out-of-band loading (seeder, tests)
#[derive(Debug, Clone, Deserialize)]
pub struct NewCavern {
    pub name: String,
    pub gimp_file_ref: String,
    pub layer: i64,
    #[serde(default)]
    pub found: bool,
}

/// Link payload for out-of-band loading; caverns are referenced by id
#[derive(Debug, Clone, Deserialize)]
pub struct NewLink {
    pub name: String,
    pub travel_duration: String,
    pub caverns: Vec<i64>,
    #[serde(default)]
    pub found: bool,
}
