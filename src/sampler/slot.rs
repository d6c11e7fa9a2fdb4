// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The fixed arena of sample slots.
//!
//! Slots are created empty at construction and live for the lifetime of the
//! engine; loading installs a decoded buffer into a slot and unloading
//! releases it. Each slot owns its buffer exclusively.

use tracing::{debug, info};

use super::error::SamplerError;
use crate::audio::DecodedSample;

/// Number of addressable sample slots.
pub const SLOT_CAPACITY: usize = 100;

/// Display name reported for a slot with no sample loaded.
pub const UNLOADED_NAME: &str = "Not Loaded";

/// Sample rate assumed for an empty slot.
const DEFAULT_ROOT_SAMPLE_RATE: f64 = 192_000.0;

/// One sample storage position. A slot retains its own saved playback cursor
/// so that switching the active slot away and back resumes where it left off.
#[derive(Debug, Clone)]
pub struct SampleSlot {
    /// The decoded audio, present only while loaded.
    pub(crate) buffer: Option<DecodedSample>,
    /// The pitch at which the sample plays at its native recorded speed.
    pub(crate) root_frequency: f64,
    /// Native sample rate of the decoded file.
    pub(crate) root_sample_rate: f64,
    /// Whether playback wraps at end-of-buffer.
    pub(crate) looping: bool,
    /// Set when non-looping playback has hit end-of-buffer. The slot stays
    /// silent until an explicit reset or a retriggering note-on.
    pub(crate) waiting_for_reset: bool,
    /// Set by a reset request; consumed at the next render pass.
    pub(crate) reset_requested: bool,
    /// Saved fractional playback cursor, persisted across slot switches.
    pub(crate) sample_time: f64,
    /// Display name of the loaded file.
    pub(crate) file_name: String,
    /// Full path of the loaded file, for reload on state restore.
    pub(crate) file_path: String,
}

impl Default for SampleSlot {
    fn default() -> Self {
        Self {
            buffer: None,
            root_frequency: 0.0,
            root_sample_rate: DEFAULT_ROOT_SAMPLE_RATE,
            looping: true,
            waiting_for_reset: true,
            reset_requested: false,
            sample_time: 0.0,
            file_name: UNLOADED_NAME.to_string(),
            file_path: String::new(),
        }
    }
}

impl SampleSlot {
    /// Returns true if a sample is loaded into this slot.
    pub fn loaded(&self) -> bool {
        self.buffer.is_some()
    }

    /// Returns the display name of the loaded file, or the unloaded sentinel.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the full path of the loaded file, empty if none.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Returns the reference pitch in Hz.
    pub fn root_frequency(&self) -> f64 {
        self.root_frequency
    }

    /// Returns whether playback wraps at end-of-buffer.
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Returns the number of frames in the loaded buffer, 0 if empty.
    pub fn frames(&self) -> usize {
        self.buffer.as_ref().map(|b| b.frames()).unwrap_or(0)
    }
}

/// The fixed-capacity store of sample slots.
pub struct SlotStore {
    slots: Vec<SampleSlot>,
    num_loaded: usize,
}

impl SlotStore {
    pub fn new() -> Self {
        Self {
            slots: (0..SLOT_CAPACITY).map(|_| SampleSlot::default()).collect(),
            num_loaded: 0,
        }
    }

    /// Returns true if the position addresses a slot.
    pub fn in_range(&self, position: usize) -> bool {
        position < SLOT_CAPACITY
    }

    pub fn get(&self, position: usize) -> Option<&SampleSlot> {
        self.slots.get(position)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut SampleSlot> {
        self.slots.get_mut(position)
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [SampleSlot] {
        &mut self.slots
    }

    /// Installs a decoded sample into an empty slot. The slot's saved cursor
    /// resets to zero and the end-of-buffer pin clears so the sample is ready
    /// to play.
    pub fn install(
        &mut self,
        position: usize,
        decoded: DecodedSample,
        root_frequency: f64,
        looping: bool,
        file_name: String,
        file_path: String,
    ) -> Result<usize, SamplerError> {
        if !self.in_range(position) {
            return Err(SamplerError::OutOfRange(position));
        }
        if self.slots[position].loaded() {
            return Err(SamplerError::SlotOccupied(position));
        }

        let slot = &mut self.slots[position];
        slot.root_sample_rate = decoded.sample_rate() as f64;
        slot.root_frequency = root_frequency;
        slot.looping = looping;
        slot.sample_time = 0.0;
        slot.waiting_for_reset = false;
        slot.reset_requested = false;
        slot.file_name = file_name;
        slot.file_path = file_path;

        info!(
            slot = position,
            path = %slot.file_path,
            frames = decoded.frames(),
            sample_rate = decoded.sample_rate(),
            memory_kb = decoded.memory_size() / 1024,
            "Sample loaded"
        );
        slot.buffer = Some(decoded);

        self.recalculate_num_loaded();
        Ok(position)
    }

    /// Releases the slot's buffer and restores its empty defaults.
    /// Returns true if a sample was actually unloaded.
    pub fn unload(&mut self, position: usize) -> bool {
        let Some(slot) = self.slots.get_mut(position) else {
            return false;
        };
        if !slot.loaded() {
            return false;
        }
        *slot = SampleSlot::default();
        self.recalculate_num_loaded();
        info!(slot = position, "Sample unloaded");
        true
    }

    /// Relocates a loaded slot record to another position. With `force`, an
    /// occupied destination is unloaded first; without it the move fails.
    /// Returns true if the sample moved.
    pub fn move_slot(&mut self, source: usize, dest: usize, force: bool) -> bool {
        if !self.in_range(source) || !self.in_range(dest) || source == dest {
            return false;
        }
        if !self.slots[source].loaded() {
            return false;
        }
        if self.slots[dest].loaded() {
            if !force {
                return false;
            }
            self.unload(dest);
        }

        self.slots[dest] = std::mem::take(&mut self.slots[source]);
        self.recalculate_num_loaded();
        debug!(source, dest, "Sample moved");
        true
    }

    /// Returns the first unloaded slot index, if any.
    pub fn open_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.loaded())
    }

    /// Returns the number of loaded slots.
    pub fn num_loaded(&self) -> usize {
        self.num_loaded
    }

    /// Returns the indices of all loaded slots in ascending order.
    pub fn loaded_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.loaded())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the display name for a slot, or "" when out of range.
    pub fn name(&self, position: usize) -> &str {
        self.slots.get(position).map(|s| s.file_name()).unwrap_or("")
    }

    fn recalculate_num_loaded(&mut self) {
        self.num_loaded = self.slots.iter().filter(|s| s.loaded()).count();
    }
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SlotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotStore")
            .field("capacity", &SLOT_CAPACITY)
            .field("loaded", &self.num_loaded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_sample(frames: usize) -> DecodedSample {
        DecodedSample::new(vec![0.5; frames], vec![-0.5; frames], 48000)
    }

    fn install(store: &mut SlotStore, position: usize) -> Result<usize, SamplerError> {
        store.install(
            position,
            test_sample(16),
            440.0,
            true,
            "test.wav".to_string(),
            "/tmp/test.wav".to_string(),
        )
    }

    #[test]
    fn test_install_and_unload_round_trip() {
        let mut store = SlotStore::new();
        assert_eq!(install(&mut store, 3).unwrap(), 3);

        let slot = store.get(3).unwrap();
        assert!(slot.loaded());
        assert_eq!(slot.file_name(), "test.wav");
        assert_eq!(slot.frames(), 16);
        assert_eq!(slot.root_sample_rate, 48000.0);
        assert!(!slot.waiting_for_reset);
        assert_eq!(store.num_loaded(), 1);

        assert!(store.unload(3));
        let slot = store.get(3).unwrap();
        assert!(!slot.loaded());
        assert_eq!(slot.file_name(), UNLOADED_NAME);
        assert_eq!(slot.file_path(), "");
        assert_eq!(store.num_loaded(), 0);

        // Unloading an already-empty slot reports nothing to do.
        assert!(!store.unload(3));
        assert!(!store.unload(SLOT_CAPACITY));
    }

    #[test]
    fn test_install_occupied_slot_fails_and_preserves_contents() {
        let mut store = SlotStore::new();
        install(&mut store, 0).unwrap();

        let result = store.install(
            0,
            test_sample(99),
            220.0,
            false,
            "other.wav".to_string(),
            "/tmp/other.wav".to_string(),
        );
        assert!(matches!(result, Err(SamplerError::SlotOccupied(0))));

        // The original sample is untouched.
        let slot = store.get(0).unwrap();
        assert_eq!(slot.frames(), 16);
        assert_eq!(slot.file_name(), "test.wav");
        assert_eq!(slot.root_frequency(), 440.0);
    }

    #[test]
    fn test_install_out_of_range_fails() {
        let mut store = SlotStore::new();
        let result = install(&mut store, SLOT_CAPACITY);
        assert!(matches!(
            result,
            Err(SamplerError::OutOfRange(SLOT_CAPACITY))
        ));
    }

    #[test]
    fn test_open_slot_finds_first_gap() {
        let mut store = SlotStore::new();
        assert_eq!(store.open_slot(), Some(0));
        install(&mut store, 0).unwrap();
        install(&mut store, 1).unwrap();
        install(&mut store, 3).unwrap();
        assert_eq!(store.open_slot(), Some(2));
        assert_eq!(store.loaded_indices(), vec![0, 1, 3]);
    }

    #[test]
    fn test_move_slot() {
        let mut store = SlotStore::new();
        install(&mut store, 2).unwrap();

        assert!(store.move_slot(2, 7, false));
        assert!(!store.get(2).unwrap().loaded());
        assert!(store.get(7).unwrap().loaded());
        assert_eq!(store.get(7).unwrap().file_name(), "test.wav");
        assert_eq!(store.num_loaded(), 1);

        // Occupied destination requires force.
        install(&mut store, 2).unwrap();
        assert!(!store.move_slot(2, 7, false));
        assert!(store.move_slot(2, 7, true));
        assert!(!store.get(2).unwrap().loaded());
        assert_eq!(store.num_loaded(), 1);

        // Degenerate moves are rejected.
        assert!(!store.move_slot(7, 7, true));
        assert!(!store.move_slot(50, 51, false));
        assert!(!store.move_slot(7, SLOT_CAPACITY, true));
    }

    #[test]
    fn test_name_reporting() {
        let mut store = SlotStore::new();
        assert_eq!(store.name(0), UNLOADED_NAME);
        assert_eq!(store.name(SLOT_CAPACITY), "");
        install(&mut store, 0).unwrap();
        assert_eq!(store.name(0), "test.wav");
    }
}
