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

//! The sampler playback engine.
//!
//! One engine instance owns the slot store, the active-slot selection, and
//! the fractional render cursor. Rendering is driven one sub-range at a time
//! by the event scheduler; everything on that path is allocation-free and
//! degrades to silence rather than failing.

use std::path::Path;

use tracing::debug;

use super::error::SamplerError;
use super::slot::{SampleSlot, SlotStore, SLOT_CAPACITY};
use crate::audio::{AudioFileReader, DecodedSample};

/// Sample rate assumed until the host calls [`Sampler::prepare`].
const DEFAULT_SAMPLE_RATE: f64 = 192_000.0;

/// Sentinel for "no frequency derived yet" (no note has been played).
const UNSET_FREQUENCY: f64 = -1.0;

/// Converts a MIDI note number to its equal-tempered frequency in Hz.
pub fn midi_note_to_frequency(note: u8) -> f64 {
    440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

#[inline]
fn lerp(start: f32, end: f32, t: f32) -> f32 {
    (end - start) * t + start
}

#[inline]
fn lerp_f64(start: f64, end: f64, t: f64) -> f64 {
    (end - start) * t + start
}

/// The sampler engine. One instance per plugin instance; a single audio
/// thread renders while a control thread manages slots (see the crate docs
/// for the consistency boundary).
pub struct Sampler {
    pub(crate) store: SlotStore,
    /// Index of the active slot, if any.
    pub(crate) current: Option<usize>,
    /// Fractional frame cursor into the active slot's buffer.
    pub(crate) time: f64,
    /// Last note that triggered note-on, used to match note-off.
    pub(crate) note: Option<u8>,
    pub(crate) playing: bool,
    /// Playback pitch in Hz (target frequency times the frequency factor).
    pub(crate) frequency: f64,
    pub(crate) source_frequency: f64,
    pub(crate) target_frequency: f64,
    /// User tuning value, a multiplicative playback-rate scalar.
    pub(crate) tuning: i32,
    pub(crate) frequency_factor: f64,
    /// Current pitch-bend ratio and the value it ended on last block.
    pub(crate) pitch_bend: f64,
    pub(crate) last_pb: f64,
    /// Forces the live cursor to zero at the next render pass.
    pub(crate) waiting_for_outer_reset: bool,
    pub(crate) reset_on_transport_start: bool,
    pub(crate) sample_rate: f64,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            store: SlotStore::new(),
            current: None,
            time: 0.0,
            note: None,
            playing: false,
            frequency: UNSET_FREQUENCY,
            source_frequency: UNSET_FREQUENCY,
            target_frequency: UNSET_FREQUENCY,
            tuning: 1,
            frequency_factor: 1.0,
            pitch_bend: 1.0,
            last_pb: 1.0,
            waiting_for_outer_reset: true,
            reset_on_transport_start: true,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Tells the engine the host's sample rate before rendering starts.
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    // ---- slot management -------------------------------------------------

    /// Decodes an audio file and loads it into the given slot. The slot must
    /// be empty; unload first to replace. Safe to call only from a
    /// non-real-time context (decoding blocks on file IO).
    pub fn load_sample(
        &mut self,
        path: &Path,
        root_frequency: f64,
        position: usize,
        looping: bool,
    ) -> Result<usize, SamplerError> {
        if !self.store.in_range(position) {
            return Err(SamplerError::OutOfRange(position));
        }
        if self.slot_loaded(position) {
            return Err(SamplerError::SlotOccupied(position));
        }
        let decoded = decode_for_load(path)?;
        self.install_decoded(
            position,
            decoded,
            root_frequency,
            looping,
            file_name_of(path),
            path.display().to_string(),
        )
    }

    /// As [`Sampler::load_sample`], with the reference pitch given as a MIDI
    /// note number.
    pub fn load_sample_with_root_note(
        &mut self,
        path: &Path,
        root_note: u8,
        position: usize,
        looping: bool,
    ) -> Result<usize, SamplerError> {
        self.load_sample(path, midi_note_to_frequency(root_note), position, looping)
    }

    /// Installs already-decoded audio into a slot. This is the load path for
    /// hosts that decode on another thread and ship buffers across.
    pub fn install_decoded(
        &mut self,
        position: usize,
        decoded: DecodedSample,
        root_frequency: f64,
        looping: bool,
        file_name: String,
        file_path: String,
    ) -> Result<usize, SamplerError> {
        self.store
            .install(position, decoded, root_frequency, looping, file_name, file_path)
    }

    /// Unloads the given slot, releasing its buffer.
    /// Returns false if there was nothing to unload.
    pub fn unload_sample(&mut self, position: usize) -> bool {
        self.store.unload(position)
    }

    /// Relocates a loaded slot to another position; see [`SlotStore::move_slot`].
    /// The active selection follows a moved slot.
    pub fn move_sample(&mut self, source: usize, dest: usize, force: bool) -> bool {
        let moved = self.store.move_slot(source, dest, force);
        if moved && self.current == Some(source) {
            self.current = Some(dest);
        }
        moved
    }

    /// Makes the given slot the active one, saving the outgoing slot's live
    /// cursor and restoring the incoming slot's. Selecting an unloaded slot
    /// is legal; it simply renders silence.
    pub fn choose_sample(&mut self, position: usize) -> Option<usize> {
        if !self.store.in_range(position) {
            return None;
        }
        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            if slot.loaded() {
                slot.sample_time = self.time;
            }
        }
        self.current = Some(position);
        self.time = self
            .store
            .get(position)
            .map(|s| s.sample_time)
            .unwrap_or(0.0);
        debug!(slot = position, "Active slot changed");
        Some(position)
    }

    /// Selects the nearest loaded slot after the current one, wrapping
    /// around. Returns None when nothing is loaded.
    pub fn choose_next_sample(&mut self) -> Option<usize> {
        match self.current {
            Some(current) => {
                for i in (current + 1)..SLOT_CAPACITY {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                for i in 0..=current.min(SLOT_CAPACITY - 1) {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                None
            }
            None => {
                for i in 0..SLOT_CAPACITY {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                None
            }
        }
    }

    /// Selects the nearest loaded slot before the current one, wrapping
    /// around. Returns None when nothing is loaded.
    pub fn choose_prev_sample(&mut self) -> Option<usize> {
        match self.current {
            Some(current) => {
                for i in (0..current).rev() {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                for i in (current..SLOT_CAPACITY).rev() {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                None
            }
            None => {
                for i in (0..SLOT_CAPACITY).rev() {
                    if self.slot_loaded(i) {
                        return self.choose_sample(i);
                    }
                }
                None
            }
        }
    }

    /// Returns the first unloaded slot index, if any.
    pub fn open_sample(&self) -> Option<usize> {
        self.store.open_slot()
    }

    /// Returns the active slot index, if any.
    pub fn current_sample(&self) -> Option<usize> {
        self.current
    }

    /// Returns the number of loaded slots.
    pub fn num_samples(&self) -> usize {
        self.store.num_loaded()
    }

    /// Returns the indices of all loaded slots in ascending order.
    pub fn loaded_samples(&self) -> Vec<usize> {
        self.store.loaded_indices()
    }

    /// Returns the display name for a slot, "" when out of range.
    pub fn sample_name(&self, position: usize) -> &str {
        self.store.name(position)
    }

    /// Returns the display name of the active slot, "" when there is none.
    pub fn current_sample_name(&self) -> &str {
        self.current.map(|c| self.store.name(c)).unwrap_or("")
    }

    /// Returns the slot record at the given position.
    pub fn slot(&self, position: usize) -> Option<&SampleSlot> {
        self.store.get(position)
    }

    /// Returns true if a note is currently held.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    // ---- note control ----------------------------------------------------

    /// Starts playback of the active slot at the pitch of the given MIDI
    /// note. Retriggering a slot that reached its end restarts it from frame
    /// zero immediately, unlike the deferred reset paths.
    pub fn note_on(&mut self, note: u8) {
        self.playing = true;
        self.note = Some(note);
        self.source_frequency = self.target_frequency;
        self.target_frequency = midi_note_to_frequency(note);
        self.frequency = self.target_frequency * self.frequency_factor;

        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            if slot.waiting_for_reset || slot.reset_requested {
                slot.waiting_for_reset = false;
                slot.reset_requested = false;
                self.time = 0.0;
            }
        }
    }

    /// Stops playback if the note matches the held one. Stale note-offs from
    /// overlapping legato input are ignored.
    pub fn note_off(&mut self, note: u8) {
        if self.note == Some(note) {
            self.playing = false;
        }
    }

    /// Unconditionally stops playback.
    pub fn all_notes_off(&mut self) {
        self.playing = false;
    }

    // ---- resets ----------------------------------------------------------

    /// Requests a reset of the given slot. Applied at the next render pass:
    /// the slot's cursor returns to zero and its end-of-buffer pin clears.
    pub fn reset_slot(&mut self, position: usize) {
        if let Some(slot) = self.store.get_mut(position) {
            slot.reset_requested = true;
        }
    }

    /// Requests a reset of the active slot plus the global cursor. This is
    /// what a host's "reset current" control invokes.
    pub fn reset_current(&mut self) {
        if let Some(current) = self.current {
            self.reset_slot(current);
        }
        self.waiting_for_outer_reset = true;
    }

    /// Requests a reset of every slot plus the global cursor.
    pub fn reset_all(&mut self) {
        for slot in self.store.slots_mut() {
            slot.reset_requested = true;
        }
        self.waiting_for_outer_reset = true;
    }

    // ---- parameters ------------------------------------------------------

    /// Sets the user tuning value, applied as a multiplicative playback-rate
    /// scalar (not semitones).
    pub fn set_tuning(&mut self, tuning: i32) {
        self.tuning = tuning;
    }

    /// Sets the frequency factor applied on top of the note pitch.
    pub fn set_frequency_factor(&mut self, factor: f64) {
        self.frequency_factor = factor;
        if self.target_frequency > 0.0 {
            self.frequency = self.target_frequency * factor;
        }
    }

    /// Sets the pitch-bend ratio. Rendering interpolates from the previous
    /// block's final value to this one across the block.
    pub fn set_pitch_bend(&mut self, ratio: f64) {
        self.pitch_bend = ratio;
    }

    /// Controls whether a transport start resets all slots.
    pub fn set_reset_on_transport_start(&mut self, enabled: bool) {
        self.reset_on_transport_start = enabled;
    }

    /// Sets whether the active slot loops at end-of-buffer.
    pub fn set_current_loop(&mut self, looping: bool) {
        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            slot.looping = looping;
        }
    }

    /// Sets the active slot's reference pitch directly.
    pub fn set_current_root_frequency(&mut self, frequency: f64) {
        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            slot.root_frequency = frequency;
        }
    }

    /// Sets the active slot's reference pitch from a MIDI note number.
    pub fn set_current_root_note(&mut self, note: u8) {
        self.set_current_root_frequency(midi_note_to_frequency(note));
    }

    /// Shifts the active slot's reference pitch by semitones and cents.
    pub fn transpose_semitones(&mut self, semitones: i32, cents: f64) {
        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            if slot.loaded() {
                slot.root_frequency *=
                    2.0_f64.powf((semitones as f64 + cents / 100.0) / 12.0);
            }
        }
    }

    /// Replaces the active slot's reference pitch, clamped away from zero.
    pub fn set_transpose_frequency(&mut self, frequency: f64) {
        if let Some(slot) = self.current.and_then(|c| self.store.get_mut(c)) {
            if slot.loaded() {
                slot.root_frequency = frequency.max(0.1);
            }
        }
    }

    // ---- rendering -------------------------------------------------------

    /// Renders the sub-range `[begin, end)` of the block under the current
    /// voice parameters. The scheduler calls this with non-overlapping,
    /// time-ordered sub-ranges covering the whole block.
    pub fn render_range(&mut self, out: &mut [Vec<f32>; 2], begin: usize, end: usize) {
        self.apply_pending_resets();

        let block_frames = out[0].len();
        debug_assert_eq!(out[1].len(), block_frames);
        let end = end.min(block_frames);
        if begin >= end {
            return;
        }

        // Invalid selection, empty slot, or no held note: fast silence.
        let Some(current) = self.current else {
            fill_silence(out, begin, end);
            return;
        };
        if !self.slot_loaded(current) || !self.playing {
            fill_silence(out, begin, end);
            return;
        }
        let Some(slot) = self.store.get(current) else {
            fill_silence(out, begin, end);
            return;
        };
        let Some(buffer) = slot.buffer.as_ref() else {
            fill_silence(out, begin, end);
            return;
        };

        let frames = buffer.frames();
        let pinned = slot.waiting_for_reset;
        // Pitch-bend ramps over the whole block, not per sub-range, so bends
        // arriving between blocks step smoothly.
        let ramp_frames = block_frames.max(1) as f64;

        let mut frame = begin;
        let mut reached_end = false;
        while frame < end {
            let index_f = self.time.floor();
            let active = !pinned && self.time >= 0.0 && (index_f as usize) < frames;
            for (channel, out_channel) in out.iter_mut().enumerate() {
                if active {
                    let index = index_f as usize;
                    let here = buffer.sample(channel, index);
                    let next = buffer.sample(channel, (index + 1) % frames);
                    out_channel[frame] = lerp(here, next, (self.time - index_f) as f32);
                } else {
                    out_channel[frame] = 0.0;
                }
            }

            let bend = lerp_f64(self.last_pb, self.pitch_bend, frame as f64 / ramp_frames);
            let increment = self.tuning as f64 * slot.root_sample_rate / slot.root_frequency
                * self.frequency
                / self.sample_rate
                * bend;
            self.time += increment;
            frame += 1;

            // End of the sample: wrap if looping, otherwise pin the slot and
            // silence everything left in this sub-range.
            if self.time >= frames as f64 {
                if slot.looping {
                    self.time -= frames as f64;
                } else {
                    reached_end = true;
                    while frame < end {
                        out[0][frame] = 0.0;
                        out[1][frame] = 0.0;
                        frame += 1;
                    }
                }
            }
        }

        if reached_end {
            if let Some(slot) = self.store.get_mut(current) {
                slot.waiting_for_reset = true;
            }
        }
    }

    /// Applies deferred resets: the global cursor zeroing first, then any
    /// per-slot reset requests. A request zeroes the slot's saved cursor
    /// (and the live cursor when the slot is active), clears the
    /// end-of-buffer pin, and refreshes the playback pitch from the current
    /// target.
    fn apply_pending_resets(&mut self) {
        if self.waiting_for_outer_reset {
            self.time = 0.0;
            self.waiting_for_outer_reset = false;
        }

        let current = self.current;
        let mut applied = false;
        let mut reset_live_cursor = false;
        for (i, slot) in self.store.slots_mut().iter_mut().enumerate() {
            if slot.reset_requested {
                slot.reset_requested = false;
                slot.waiting_for_reset = false;
                slot.sample_time = 0.0;
                if current == Some(i) {
                    reset_live_cursor = true;
                }
                applied = true;
            }
        }
        if reset_live_cursor {
            self.time = 0.0;
        }
        if applied {
            self.source_frequency = self.target_frequency;
            self.frequency = self.target_frequency * self.frequency_factor;
        }
    }

    fn slot_loaded(&self, position: usize) -> bool {
        self.store.get(position).map(|s| s.loaded()).unwrap_or(false)
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("loaded", &self.store.num_loaded())
            .field("current", &self.current)
            .field("playing", &self.playing)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// Decodes a file for loading, mapping open failures and decode failures to
/// their distinct error variants.
pub(crate) fn decode_for_load(path: &Path) -> Result<DecodedSample, SamplerError> {
    let reader = AudioFileReader::open(path).map_err(SamplerError::InvalidFile)?;
    reader.decode().map_err(SamplerError::DecodeFailure)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn fill_silence(out: &mut [Vec<f32>; 2], begin: usize, end: usize) {
    for channel in out.iter_mut() {
        for sample in &mut channel[begin..end] {
            *sample = 0.0;
        }
    }
}
