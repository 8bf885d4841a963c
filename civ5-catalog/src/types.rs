//! Item and location declarations

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Tech,
    Era,
    Policy,
    PolicyBranch,
    Bonus,
    Trap,
}

impl ItemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tech => "tech",
            Self::Era => "era",
            Self::Policy => "policy",
            Self::PolicyBranch => "policy_branch",
            Self::Bonus => "bonus",
            Self::Trap => "trap",
        }
    }
}

/// Location types. Also the category keys of the mod's push table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Policy,
    PolicyBranch,
    Tech,
    NationalWonder,
    Victory,
    WorldWonder,
}

impl LocationType {
    pub const ALL: [LocationType; 6] = [
        Self::Policy,
        Self::PolicyBranch,
        Self::Tech,
        Self::NationalWonder,
        Self::Victory,
        Self::WorldWonder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::PolicyBranch => "policy_branch",
            Self::Tech => "tech",
            Self::NationalWonder => "national_wonder",
            Self::Victory => "victory",
            Self::WorldWonder => "world_wonder",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownLocationType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Progression,
    Useful,
    Filler,
    Trap,
}

/// Numeric effect applied by filler and trap items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillerAction {
    ChangeAllCityPopulation,
    ChangeCulture,
    ChangeCulturePerTurnForFree,
    ChangeExtraHappinessPerCity,
    ChangeFaith,
    ChangeFreeGreatPeople,
    ChangeFreePolicies,
    ChangeFreeTechs,
    ChangeGold,
    ChangeNewCityExtraPopulation,
    DeclareWarRandom,
    DenounceRandom,
    StartGoldenAge,
}

/// A registered item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemData {
    pub ap_id: i64,
    /// Display name, including the type prefix
    pub name: String,
    pub item_type: ItemType,
    /// Concrete game ids, in tier order for progressive items
    pub game_ids: Vec<u32>,
    pub classification: Classification,
    pub groups: BTreeSet<String>,
    pub weight: u32,
    pub actions: BTreeMap<FillerAction, i64>,
}

impl ItemData {
    pub fn is_progressive(&self) -> bool {
        self.game_ids.len() > 1
    }

    /// Game id granted on the `tier`-th receipt of this item (0-based)
    pub fn game_id_for_tier(&self, tier: usize) -> Option<u32> {
        self.game_ids.get(tier).copied()
    }
}

/// A registered location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationData {
    pub ap_id: i64,
    pub name: String,
    pub location_type: LocationType,
    pub game_id: u32,
    pub region: Option<String>,
}

/// Item declaration as written in the exported tables
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub game_ids: Vec<u32>,
    pub classification: Classification,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub groups: BTreeSet<String>,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub actions: BTreeMap<FillerAction, i64>,
}

fn default_weight() -> u32 {
    1
}

impl ItemDecl {
    pub fn new(name: impl Into<String>, item_type: ItemType, classification: Classification) -> Self {
        Self {
            name: name.into(),
            item_type,
            game_ids: Vec::new(),
            classification,
            prefix: None,
            groups: BTreeSet::new(),
            weight: 1,
            actions: BTreeMap::new(),
        }
    }

    pub fn with_game_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.game_ids.extend(ids);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    pub fn with_action(mut self, action: FillerAction, value: i64) -> Self {
        self.actions.insert(action, value);
        self
    }
}

/// Location declaration as written in the exported tables
#[derive(Debug, Clone, Deserialize)]
pub struct LocationDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub game_id: u32,
    #[serde(default)]
    pub region: Option<String>,
}

impl LocationDecl {
    pub fn new(name: impl Into<String>, location_type: LocationType, game_id: u32) -> Self {
        Self {
            name: name.into(),
            location_type,
            game_id,
            region: None,
        }
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// "policy_branch" -> "Policy Branch"
pub fn to_title(text: &str) -> String {
    text.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
