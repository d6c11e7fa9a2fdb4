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

//! A slot-based stereo sampler instrument engine.
//!
//! Samples are loaded into one of 100 fixed slots; the active slot is played
//! back under MIDI note control with pitch-shifting, tuning, pitch-bend,
//! looping, and transport-synchronized reset. Rendering is block-driven and
//! sample-accurate: MIDI events split each block into sub-ranges so that note
//! timing lands on the exact frame.

pub mod audio;
pub mod sampler;

#[cfg(test)]
mod testutil;

pub use sampler::{
    command_channel, BlockEvent, EventKind, SampleSlot, Sampler, SamplerCommand, SamplerController,
    SamplerError, StateNode, SLOT_CAPACITY,
};
