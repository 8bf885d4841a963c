//! Id-indexed item and location registry
//!
//! Randomizer-global ids are not stored in the tables: they are assigned in
//! declaration order starting at the world's id offset, so the order of the
//! exported tables is part of their meaning.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::types::{to_title, ItemData, ItemDecl, LocationData, LocationDecl, LocationType};
use crate::{CatalogError, ID_OFFSET};

/// Read-only lookup tables for one world version
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    id_offset: i64,
    items: Vec<ItemData>,
    locations: Vec<LocationData>,
    item_ids_by_name: HashMap<String, i64>,
    location_ids_by_name: HashMap<String, i64>,
    locations_by_game_id: HashMap<(LocationType, u32), i64>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default = "default_offset")]
    id_offset: i64,
    #[serde(default)]
    items: Vec<ItemDecl>,
    #[serde(default)]
    locations: Vec<LocationDecl>,
}

fn default_offset() -> i64 {
    ID_OFFSET
}

impl Catalog {
    pub fn builder(id_offset: i64) -> CatalogBuilder {
        CatalogBuilder {
            catalog: Catalog {
                id_offset,
                ..Default::default()
            },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut builder = Self::builder(file.id_offset);
        for item in file.items {
            builder.add_item(item)?;
        }
        for location in file.locations {
            builder.add_location(location)?;
        }
        Ok(builder.build())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn id_offset(&self) -> i64 {
        self.id_offset
    }

    pub fn items(&self) -> &[ItemData] {
        &self.items
    }

    pub fn locations(&self) -> &[LocationData] {
        &self.locations
    }

    pub fn item(&self, ap_id: i64) -> Option<&ItemData> {
        let index = usize::try_from(ap_id.checked_sub(self.id_offset)?).ok()?;
        self.items.get(index)
    }

    pub fn location(&self, ap_id: i64) -> Option<&LocationData> {
        let index = usize::try_from(ap_id.checked_sub(self.id_offset)?).ok()?;
        self.locations.get(index)
    }

    pub fn location_by_game_id(&self, location_type: LocationType, game_id: u32) -> Option<&LocationData> {
        let ap_id = *self.locations_by_game_id.get(&(location_type, game_id))?;
        self.location(ap_id)
    }

    pub fn item_id(&self, name: &str) -> Option<i64> {
        self.item_ids_by_name.get(name).copied()
    }

    pub fn location_id(&self, name: &str) -> Option<i64> {
        self.location_ids_by_name.get(name).copied()
    }
}

/// Registers declarations and assigns their randomizer-global ids
pub struct CatalogBuilder {
    catalog: Catalog,
}

impl CatalogBuilder {
    pub fn add_item(&mut self, decl: ItemDecl) -> Result<i64, CatalogError> {
        let name = format!(
            "{} - {}",
            decl.prefix.unwrap_or_else(|| to_title(decl.item_type.as_str())),
            decl.name
        );
        if self.catalog.item_ids_by_name.contains_key(&name) {
            return Err(CatalogError::DuplicateName(name));
        }

        let ap_id = self.catalog.id_offset + self.catalog.items.len() as i64;
        let mut groups = decl.groups;
        groups.insert(decl.item_type.as_str().to_string());

        self.catalog.item_ids_by_name.insert(name.clone(), ap_id);
        self.catalog.items.push(ItemData {
            ap_id,
            name,
            item_type: decl.item_type,
            game_ids: decl.game_ids,
            classification: decl.classification,
            groups,
            weight: decl.weight,
            actions: decl.actions,
        });
        Ok(ap_id)
    }

    pub fn add_location(&mut self, decl: LocationDecl) -> Result<i64, CatalogError> {
        let name = format!("{} - {}", to_title(decl.location_type.as_str()), decl.name);
        if self.catalog.location_ids_by_name.contains_key(&name) {
            return Err(CatalogError::DuplicateName(name));
        }
        let key = (decl.location_type, decl.game_id);
        if self.catalog.locations_by_game_id.contains_key(&key) {
            return Err(CatalogError::DuplicateGameId {
                location_type: decl.location_type,
                game_id: decl.game_id,
            });
        }

        let ap_id = self.catalog.id_offset + self.catalog.locations.len() as i64;
        self.catalog.location_ids_by_name.insert(name.clone(), ap_id);
        self.catalog.locations_by_game_id.insert(key, ap_id);
        self.catalog.locations.push(LocationData {
            ap_id,
            name,
            location_type: decl.location_type,
            game_id: decl.game_id,
            region: decl.region,
        });
        Ok(ap_id)
    }

    /// Chaining form of [`add_item`](Self::add_item)
    pub fn item(mut self, decl: ItemDecl) -> Result<Self, CatalogError> {
        self.add_item(decl)?;
        Ok(self)
    }

    /// Chaining form of [`add_location`](Self::add_location)
    pub fn location(mut self, decl: LocationDecl) -> Result<Self, CatalogError> {
        self.add_location(decl)?;
        Ok(self)
    }

    pub fn build(self) -> Catalog {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Classification, FillerAction, ItemType};

    const TABLES: &str = r#"{
        "items": [
            {"name": "Progressive", "type": "era", "classification": "progression",
             "game_ids": [169, 170, 171]},
            {"name": "Pottery", "type": "tech", "classification": "progression", "game_ids": [1],
             "groups": ["ancient_era"]},
            {"name": "Liberty", "type": "policy_branch", "classification": "useful", "game_ids": [0],
             "prefix": "Policy Branch"},
            {"name": "Minor Gold", "type": "bonus", "classification": "filler", "weight": 10,
             "actions": {"change_gold": 100}}
        ],
        "locations": [
            {"name": "Pottery", "type": "tech", "game_id": 1, "region": "Ancient Era"},
            {"name": "Stonehenge", "type": "world_wonder", "game_id": 1}
        ]
    }"#;

    #[test]
    fn test_ids_follow_declaration_order() {
        let catalog = Catalog::from_json_str(TABLES).unwrap();
        assert_eq!(catalog.id_offset(), ID_OFFSET);

        let era = catalog.item(ID_OFFSET).unwrap();
        assert_eq!(era.name, "Era - Progressive");
        assert!(era.is_progressive());
        assert_eq!(era.game_id_for_tier(2), Some(171));
        assert_eq!(era.game_id_for_tier(3), None);

        assert_eq!(catalog.item_id("Tech - Pottery"), Some(ID_OFFSET + 1));
        assert_eq!(catalog.item_id("Policy Branch - Liberty"), Some(ID_OFFSET + 2));

        let gold = catalog.item(ID_OFFSET + 3).unwrap();
        assert_eq!(gold.actions.get(&FillerAction::ChangeGold), Some(&100));
        assert_eq!(gold.weight, 10);
        assert!(gold.groups.contains("bonus"));
    }

    #[test]
    fn test_location_lookup_by_game_id() {
        let catalog = Catalog::from_json_str(TABLES).unwrap();

        let tech = catalog.location_by_game_id(LocationType::Tech, 1).unwrap();
        assert_eq!(tech.ap_id, ID_OFFSET);
        assert_eq!(tech.name, "Tech - Pottery");
        assert_eq!(tech.region.as_deref(), Some("Ancient Era"));

        let wonder = catalog.location_by_game_id(LocationType::WorldWonder, 1).unwrap();
        assert_eq!(wonder.ap_id, ID_OFFSET + 1);
        assert!(catalog.location_by_game_id(LocationType::Policy, 1).is_none());
        assert!(catalog.location(ID_OFFSET - 1).is_none());
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut builder = Catalog::builder(0);
        builder
            .add_item(ItemDecl::new("Pottery", ItemType::Tech, Classification::Progression))
            .unwrap();
        let err = builder
            .add_item(ItemDecl::new("Pottery", ItemType::Tech, Classification::Progression))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName(_)));

        builder.add_location(LocationDecl::new("Pottery", LocationType::Tech, 1)).unwrap();
        let err = builder
            .add_location(LocationDecl::new("Also Pottery", LocationType::Tech, 1))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateGameId { game_id: 1, .. }));
    }

    #[test]
    fn test_example_export_loads() {
        let catalog = Catalog::from_json_str(include_str!("../tables.example.json")).unwrap();
        assert_eq!(catalog.items().len(), 8);
        assert_eq!(catalog.locations().len(), 7);

        let writing = catalog.item(catalog.item_id("Tech - Writing").unwrap()).unwrap();
        assert_eq!(writing.game_ids, vec![7]);
        let trap = catalog.item(catalog.item_id("Trap - Minor Gold Loss").unwrap()).unwrap();
        assert_eq!(trap.actions.get(&FillerAction::ChangeGold), Some(&-50));

        let wonder = catalog.location_by_game_id(LocationType::WorldWonder, 64).unwrap();
        assert_eq!(wonder.name, "World Wonder - Stonehenge");
        assert!(catalog.location_by_game_id(LocationType::Victory, 1).is_some());
    }
}
