//! Civilization V randomizer lookup tables
//!
//! Items and locations are declared once by the world and exported as JSON.
//! The client only reads them: to map received item ids to game ids, and game
//! location ids back to randomizer-global ids.
//!
//! The export is one JSON object. `id_offset` is optional and defaults to
//! [`ID_OFFSET`]. Ids are assigned in declaration order, items and locations
//! each counting from the offset, so the file must list them in the same
//! order as the world that generated the seed.
//!
//! ```json
//! {
//!     "id_offset": 140319,
//!     "items": [
//!         {"name": "Progressive", "type": "era", "classification": "progression", "game_ids": [1, 2, 3]},
//!         {"name": "Pottery", "type": "tech", "classification": "progression", "game_ids": [1]},
//!         {"name": "Minor Gold", "type": "bonus", "classification": "filler", "actions": {"change_gold": 100}}
//!     ],
//!     "locations": [
//!         {"name": "Pottery", "type": "tech", "game_id": 1, "region": "Ancient Era"},
//!         {"name": "Stonehenge", "type": "world_wonder", "game_id": 64}
//!     ]
//! }
//! ```
//!
//! Item names get a type prefix (`Tech - Pottery`) unless `prefix` overrides
//! it. `tables.example.json` next to this crate's manifest is a small complete
//! export.

mod catalog;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder};
pub use types::{
    Classification, FillerAction, ItemData, ItemDecl, ItemType,
    LocationData, LocationDecl, LocationType,
};

/// First randomizer-global id used by this world
pub const ID_OFFSET: i64 = 140319;

pub const GAME_NAME: &str = "Civilization V";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("duplicate {location_type} location with game id {game_id}")]
    DuplicateGameId { location_type: LocationType, game_id: u32 },

    #[error("unknown location type: {0}")]
    UnknownLocationType(String),

    #[error("invalid tables: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(String),
}
