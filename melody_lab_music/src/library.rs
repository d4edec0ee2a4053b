// Melody library: the persistence contract for saved melodies.
//
// A stored melody is an opaque blob (`Melody::to_bytes`) plus a name and a
// favourite flag. Length, total duration and grid size are shown in listings
// but are always recomputed from the decoded blob, so there is no way to
// write them independently of the melody they describe.
//
// `MelodyLibrary` is the read side the `FromLibrary` operation needs. The
// in-memory implementation backs tests and the binary; a database-backed
// store only has to implement `load`.
//
// Presets live next to melodies: a name plus an opaque graph-state blob
// (see `snapshot.rs` for the format the graph layer writes).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::duration::QuarterLength;
use crate::error::Result;
use crate::melody::Melody;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MelodyId(pub u64);

impl fmt::Display for MelodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read access to stored melodies.
pub trait MelodyLibrary {
    /// Decode the melody stored under `id`, or `None` if there is none.
    fn load(&self, id: MelodyId) -> Result<Option<Melody>>;
}

/// A stored melody blob with its user-facing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelodyRecord {
    name: String,
    blob: Vec<u8>,
    favorite: bool,
}

impl MelodyRecord {
    pub fn new(name: impl Into<String>, melody: &Melody) -> Result<Self> {
        Ok(MelodyRecord {
            name: name.into(),
            blob: melody.to_bytes()?,
            favorite: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn restore(&self) -> Result<Melody> {
        Melody::from_bytes(&self.blob)
    }
}

/// One row of a library listing. The musical fields come from the decoded
/// melody, never from stored columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodySummary {
    pub id: MelodyId,
    pub name: String,
    pub length: usize,
    pub duration: QuarterLength,
    pub grid_size: Option<QuarterLength>,
    pub favorite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PresetId(pub u64);

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preset #{}", self.0)
    }
}

/// A saved graph state. The library never looks inside `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub name: String,
    pub state: Vec<u8>,
}

/// One row of a preset listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetSummary {
    pub id: PresetId,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLibrary {
    records: BTreeMap<MelodyId, MelodyRecord>,
    next_id: u64,
    presets: BTreeMap<PresetId, PresetRecord>,
    next_preset_id: u64,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, melody: &Melody) -> Result<MelodyId> {
        let record = MelodyRecord::new(name, melody)?;
        self.next_id += 1;
        let id = MelodyId(self.next_id);
        self.records.insert(id, record);
        Ok(id)
    }

    pub fn record(&self, id: MelodyId) -> Option<&MelodyRecord> {
        self.records.get(&id)
    }

    pub fn summaries(&self) -> Result<Vec<MelodySummary>> {
        self.records
            .iter()
            .map(|(&id, record)| {
                let melody = record.restore()?;
                Ok(MelodySummary {
                    id,
                    name: record.name.clone(),
                    length: melody.length(),
                    duration: melody.total_duration(),
                    grid_size: melody.grid_size(),
                    favorite: record.favorite,
                })
            })
            .collect()
    }

    /// Flip the favourite flag. Returns the new value, or `None` for an
    /// unknown id.
    pub fn toggle_favorite(&mut self, id: MelodyId) -> Option<bool> {
        let record = self.records.get_mut(&id)?;
        record.favorite = !record.favorite;
        Some(record.favorite)
    }

    pub fn remove(&mut self, id: MelodyId) -> Option<MelodyRecord> {
        self.records.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn insert_preset(&mut self, name: impl Into<String>, state: Vec<u8>) -> PresetId {
        self.next_preset_id += 1;
        let id = PresetId(self.next_preset_id);
        self.presets.insert(
            id,
            PresetRecord {
                name: name.into(),
                state,
            },
        );
        id
    }

    /// Ids and names of every saved preset, oldest first.
    pub fn preset_summaries(&self) -> Vec<PresetSummary> {
        self.presets
            .iter()
            .map(|(&id, preset)| PresetSummary {
                id,
                name: preset.name.clone(),
            })
            .collect()
    }

    pub fn preset(&self, id: PresetId) -> Option<&PresetRecord> {
        self.presets.get(&id)
    }

    pub fn remove_preset(&mut self, id: PresetId) -> Option<PresetRecord> {
        self.presets.remove(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MelodyLibrary for InMemoryLibrary {
    fn load(&self, id: MelodyId) -> Result<Option<Melody>> {
        self.records.get(&id).map(MelodyRecord::restore).transpose()
    }
}
