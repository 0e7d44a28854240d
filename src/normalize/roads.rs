//! Canonical road identities.
//!
//! The feed names roads with a compound `major;minor` string. Each road id must map to
//! exactly one name pair and each name pair to exactly one road id; anything else means
//! the join key is unreliable and the run is aborted.

use crate::error::IntegrityError;
use crate::normalize::RoadId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

pub const NAME_DELIMITER: char = ';';
pub const NO_MINOR: &str = "NO_MINOR";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadName {
    pub major: String,
    pub minor: String,
}

impl RoadName {
    /// Splits a compound name on the first delimiter. A missing or empty minor part
    /// becomes [`NO_MINOR`].
    pub fn split(compound: &str) -> Self {
        match compound.split_once(NAME_DELIMITER) {
            Some((major, minor)) if !minor.trim().is_empty() => Self {
                major: major.trim().to_string(),
                minor: minor.trim().to_string(),
            },
            Some((major, _)) => Self {
                major: major.trim().to_string(),
                minor: NO_MINOR.to_string(),
            },
            None => Self {
                major: compound.trim().to_string(),
                minor: NO_MINOR.to_string(),
            },
        }
    }

    fn pair(&self) -> (String, String) {
        (self.major.clone(), self.minor.clone())
    }
}

/// Flat row form of a road identity, used for export and reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadRow {
    pub road_id: RoadId,
    pub major: String,
    pub minor: String,
}

/// Read-only `road_id → (major, minor)` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoadIdentity {
    names: BTreeMap<RoadId, RoadName>,
}

impl RoadIdentity {
    /// Builds the table from `(road_id, name)` observations, asserting the bijection.
    pub fn build<'a, I>(observations: I) -> Result<Self, IntegrityError>
    where
        I: IntoIterator<Item = (RoadId, &'a RoadName)>,
    {
        let mut names: BTreeMap<RoadId, RoadName> = BTreeMap::new();
        let mut owners: BTreeMap<&'a RoadName, RoadId> = BTreeMap::new();

        for (road_id, name) in observations {
            match names.entry(road_id) {
                Entry::Occupied(existing) if existing.get() != name => {
                    return Err(IntegrityError::ConflictingNames {
                        road_id,
                        first: existing.get().pair(),
                        second: name.pair(),
                    });
                }
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(name.clone());
                }
            }

            if let Some(&owner) = owners.get(name) {
                return Err(IntegrityError::SharedName {
                    name: name.pair(),
                    first: owner,
                    second: road_id,
                });
            }
            owners.insert(name, road_id);
        }

        Ok(Self { names })
    }

    pub fn from_rows(rows: Vec<RoadRow>) -> Result<Self, IntegrityError> {
        let pairs: Vec<(RoadId, RoadName)> = rows
            .into_iter()
            .map(|r| {
                (
                    r.road_id,
                    RoadName {
                        major: r.major,
                        minor: r.minor,
                    },
                )
            })
            .collect();
        Self::build(pairs.iter().map(|(id, name)| (*id, name)))
    }

    pub fn get(&self, road_id: RoadId) -> Option<&RoadName> {
        self.names.get(&road_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RoadId, &RoadName)> {
        self.names.iter().map(|(id, name)| (*id, name))
    }

    /// Minor names for `segments`, in the caller's order, for axis labels.
    /// Roads missing from the table are labelled with their id.
    pub fn minor_labels(&self, segments: &[RoadId]) -> Vec<String> {
        segments
            .iter()
            .map(|id| match self.names.get(id) {
                Some(name) => name.minor.clone(),
                None => id.to_string(),
            })
            .collect()
    }

    pub fn rows(&self) -> Vec<RoadRow> {
        self.iter()
            .map(|(road_id, name)| RoadRow {
                road_id,
                major: name.major.clone(),
                minor: name.minor.clone(),
            })
            .collect()
    }
}
