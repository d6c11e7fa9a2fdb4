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
pub mod control;
pub mod engine;
pub mod error;
pub mod events;
pub mod slot;
pub mod state;

// Re-exports for use by other modules
pub use control::{command_channel, SamplerCommand, SamplerController};
pub use engine::{midi_note_to_frequency, Sampler};
pub use error::SamplerError;
pub use events::{BlockEvent, EventKind};
pub use slot::{SampleSlot, SLOT_CAPACITY, UNLOADED_NAME};
pub use state::{AttrValue, StateNode};
