//! The mod's outbox, decoded once at the protocol boundary

use std::collections::BTreeSet;

use civ5_catalog::LocationType;
use serde_json::Value;

use crate::error::{Error, Result};

const SYNC_KEY: &str = "sync";
const VICTORY_KEY: &str = "victory";

/// One unit of work the mod asks the client to relay
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Directive {
    /// Mod lost its state; replay everything
    Sync,
    /// Game ids of checked locations of one category
    LocationBatch {
        category: LocationType,
        ids: BTreeSet<u32>,
    },
    /// Player reached the game's win condition
    Victory,
}

/// Decode a push table into directives
///
/// Output order is fixed: `Sync`, then location batches by category, then
/// `Victory`. Unknown or malformed categories are logged and dropped so
/// the rest of the table still gets through.
pub fn decode_push_table(payload: &Value) -> Result<Vec<Directive>> {
    let table = payload
        .as_object()
        .ok_or_else(|| Error::InvalidPayload(format!("push table is not an object: {}", payload)))?;

    let mut directives = Vec::with_capacity(table.len());
    for (key, value) in table {
        match key.as_str() {
            SYNC_KEY => directives.push(Directive::Sync),
            VICTORY_KEY => directives.push(Directive::Victory),
            other => {
                let category = match other.parse::<LocationType>() {
                    Ok(category) => category,
                    Err(_) => {
                        tracing::warn!(key = other, "ignoring unknown push table category");
                        continue;
                    }
                };
                let ids = match decode_ids(category, value) {
                    Ok(ids) => ids,
                    Err(e) => {
                        tracing::warn!(%category, error = %e, "ignoring malformed push table category");
                        continue;
                    }
                };
                if !ids.is_empty() {
                    directives.push(Directive::LocationBatch { category, ids });
                }
            }
        }
    }

    directives.sort();
    Ok(directives)
}

/// Accepts a JSON array, or an object (a serialized Lua table) whose values are the ids
fn decode_ids(category: LocationType, value: &Value) -> Result<BTreeSet<u32>> {
    let values: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(Error::InvalidPayload(format!(
                "{} entries are not a collection: {}",
                category, other
            )))
        }
    };

    values
        .into_iter()
        .map(|v| {
            as_game_id(v).ok_or_else(|| {
                Error::InvalidPayload(format!("{} entry is not a game id: {}", category, v))
            })
        })
        .collect()
}

/// Lua numbers may arrive as floats
fn as_game_id(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}
