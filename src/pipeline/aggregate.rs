//! Ordered fan-in of hashing results.

use std::collections::HashMap;

use crate::chunk::{ChunkOffsets, ChunkRecord, ContentId};
use crate::error::{ChunkError, Result};
use crate::hash::ContentHasher;

/// Insertion-ordered map from hex content id to chunk offsets.
///
/// Inserting an id that is already present replaces its offsets but keeps
/// the id at its original position, so a chunk repeated within a stream maps
/// to its last occurrence. Use [`FileChunks::records`] to reconstruct a
/// stream; the index only answers "where is this content".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkIndex {
    entries: Vec<(String, ChunkOffsets)>,
    positions: HashMap<String, usize>,
}

impl ChunkIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `offsets` for `id`, returning the offsets it replaced.
    pub fn insert(&mut self, id: &ContentId, offsets: ChunkOffsets) -> Option<ChunkOffsets> {
        let key = id.to_hex();
        match self.positions.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, offsets)),
            None => {
                self.positions.insert(key.clone(), self.entries.len());
                self.entries.push((key, offsets));
                None
            }
        }
    }

    /// Looks up offsets by lower-case hex id.
    pub fn get(&self, key: &str) -> Option<&ChunkOffsets> {
        self.positions.get(key).map(|&pos| &self.entries[pos].1)
    }

    /// Looks up offsets by content id.
    pub fn get_id(&self, id: &ContentId) -> Option<&ChunkOffsets> {
        self.get(&id.to_hex())
    }

    /// Returns true if `id` is indexed.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.positions.contains_key(&id.to_hex())
    }

    /// Returns the number of distinct ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkOffsets)> {
        self.entries.iter().map(|(key, offsets)| (key.as_str(), offsets))
    }

    /// Iterates ids in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ChunkIndex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, offsets) in &self.entries {
            map.serialize_entry(key, offsets)?;
        }
        map.end()
    }
}

/// The result of chunking and hashing one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunks {
    /// Every chunk in stream order.
    pub records: Vec<ChunkRecord>,

    /// Offsets by content id.
    pub index: ChunkIndex,

    /// Hash over the concatenated content ids, in stream order.
    pub composite: ContentId,
}

impl FileChunks {
    /// Returns the composite hash as lower-case hex.
    pub fn composite_hex(&self) -> String {
        self.composite.to_hex()
    }

    /// Returns the number of bytes covered by the chunks.
    pub fn total_len(&self) -> u64 {
        self.records.iter().map(|r| r.length).sum()
    }

    /// Returns the number of chunks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the stream was empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates content ids in stream order.
    pub fn ids(&self) -> impl Iterator<Item = &ContentId> {
        self.records.iter().map(|r| &r.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AggState {
    Init,
    Streaming,
    Draining,
    Done,
    Failed,
}

/// Collects `(seq, record)` results in any order and folds them in `seq`
/// order once every worker has finished.
#[derive(Debug)]
pub(crate) struct Aggregator {
    state: AggState,
    slots: Vec<Option<ChunkRecord>>,
}

impl Aggregator {
    pub(crate) fn new() -> Self {
        Self {
            state: AggState::Init,
            slots: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> AggState {
        self.state
    }

    fn transition(&mut self, next: AggState) {
        tracing::trace!(from = ?self.state, to = ?next, "aggregator state");
        self.state = next;
    }

    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.state, AggState::Init);
        self.transition(AggState::Streaming);
    }

    /// Reserves the slot for the next dispatched chunk.
    pub(crate) fn reserve(&mut self) -> usize {
        debug_assert_eq!(self.state, AggState::Streaming);
        self.slots.push(None);
        self.slots.len() - 1
    }

    pub(crate) fn store(&mut self, seq: usize, record: ChunkRecord) {
        if let Some(slot) = self.slots.get_mut(seq) {
            *slot = Some(record);
        }
    }

    /// Marks the end of dispatch. Results may still arrive.
    pub(crate) fn drain(&mut self) {
        if self.state == AggState::Streaming {
            self.transition(AggState::Draining);
        }
    }

    pub(crate) fn fail(&mut self, err: &ChunkError) {
        tracing::warn!(error = %err, chunks = self.slots.len(), "chunk pipeline aborted");
        self.slots.clear();
        self.transition(AggState::Failed);
    }

    /// Builds the index and composite hash. Every reserved slot must be filled.
    pub(crate) fn finish<H: ContentHasher>(&mut self, hasher: &H) -> Result<FileChunks> {
        if self.state != AggState::Draining {
            return Err(ChunkError::HashTask {
                message: format!("aggregator finished in state {:?}", self.state),
            });
        }

        let mut records = Vec::with_capacity(self.slots.len());
        for (seq, slot) in self.slots.drain(..).enumerate() {
            match slot {
                Some(record) => records.push(record),
                None => {
                    return Err(ChunkError::HashTask {
                        message: format!("missing hash result for chunk {seq}"),
                    });
                }
            }
        }

        let mut index = ChunkIndex::new();
        for record in &records {
            index.insert(&record.id, record.offsets());
        }
        let composite = hasher.composite_id(records.iter().map(|r| &r.id));

        self.transition(AggState::Done);
        Ok(FileChunks {
            records,
            index,
            composite,
        })
    }
}
