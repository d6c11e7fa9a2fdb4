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
use crate::audio::DecoderError;

/// Error types for slot management operations. All of these are recoverable:
/// a failed load leaves the target slot empty, never half-initialized.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Slot index {0} is outside the slot capacity")]
    OutOfRange(usize),

    #[error("Slot {0} already holds a sample; unload it first")]
    SlotOccupied(usize),

    #[error("Cannot open audio file: {0}")]
    InvalidFile(#[source] DecoderError),

    #[error("Audio file failed to decode: {0}")]
    DecodeFailure(#[source] DecoderError),
}
