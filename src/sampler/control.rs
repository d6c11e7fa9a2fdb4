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

//! Single-writer command queue from the control thread to the audio thread.
//!
//! Reading engine state from a control thread while the audio thread renders
//! is a relaxed-consistency boundary; this queue is the hardened alternative.
//! A [`SamplerController`] can be cloned into UI or automation callbacks, it
//! decodes files on the calling thread, and the engine owner drains the queue
//! at block boundaries with [`Sampler::apply_commands`]. Draining never
//! allocates and never touches the filesystem.

use std::path::Path;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::warn;

use super::engine::{decode_for_load, file_name_of, Sampler};
use super::error::SamplerError;
use super::slot::SLOT_CAPACITY;
use crate::audio::DecodedSample;

/// A control operation queued for the audio thread. Sample installs carry
/// the decoded buffer so the audio thread never decodes.
#[derive(Debug)]
pub enum SamplerCommand {
    InstallSample {
        position: usize,
        root_frequency: f64,
        looping: bool,
        decoded: DecodedSample,
        file_name: String,
        file_path: String,
    },
    UnloadSample(usize),
    ChooseSample(usize),
    ChooseNext,
    ChoosePrev,
    NoteOn(u8),
    NoteOff(u8),
    AllNotesOff,
    ResetSlot(usize),
    ResetCurrent,
    ResetAll,
    SetTuning(i32),
    SetFrequencyFactor(f64),
    SetPitchBend(f64),
    SetResetOnTransportStart(bool),
    SetCurrentLoop(bool),
    SetCurrentRootFrequency(f64),
}

/// Creates a command queue; hand the receiver to whoever owns the engine.
pub fn command_channel() -> (SamplerController, Receiver<SamplerCommand>) {
    let (commands, receiver) = unbounded();
    (SamplerController { commands }, receiver)
}

/// Cloneable control-thread handle that queues operations for the engine.
#[derive(Clone)]
pub struct SamplerController {
    commands: Sender<SamplerCommand>,
}

impl SamplerController {
    /// Decodes an audio file on this thread and queues it for installation.
    /// Range and decode failures surface here; whether the slot is still
    /// empty can only be judged when the install is applied, so an occupied
    /// slot is rejected (and logged) on the engine side.
    pub fn load_sample(
        &self,
        path: &Path,
        root_frequency: f64,
        position: usize,
        looping: bool,
    ) -> Result<(), SamplerError> {
        if position >= SLOT_CAPACITY {
            return Err(SamplerError::OutOfRange(position));
        }
        let decoded = decode_for_load(path)?;
        self.send(SamplerCommand::InstallSample {
            position,
            root_frequency,
            looping,
            decoded,
            file_name: file_name_of(path),
            file_path: path.display().to_string(),
        });
        Ok(())
    }

    pub fn unload_sample(&self, position: usize) {
        self.send(SamplerCommand::UnloadSample(position));
    }

    pub fn choose_sample(&self, position: usize) {
        self.send(SamplerCommand::ChooseSample(position));
    }

    pub fn choose_next_sample(&self) {
        self.send(SamplerCommand::ChooseNext);
    }

    pub fn choose_prev_sample(&self) {
        self.send(SamplerCommand::ChoosePrev);
    }

    pub fn note_on(&self, note: u8) {
        self.send(SamplerCommand::NoteOn(note));
    }

    pub fn note_off(&self, note: u8) {
        self.send(SamplerCommand::NoteOff(note));
    }

    pub fn all_notes_off(&self) {
        self.send(SamplerCommand::AllNotesOff);
    }

    pub fn reset_slot(&self, position: usize) {
        self.send(SamplerCommand::ResetSlot(position));
    }

    pub fn reset_current(&self) {
        self.send(SamplerCommand::ResetCurrent);
    }

    pub fn reset_all(&self) {
        self.send(SamplerCommand::ResetAll);
    }

    pub fn set_tuning(&self, tuning: i32) {
        self.send(SamplerCommand::SetTuning(tuning));
    }

    pub fn set_frequency_factor(&self, factor: f64) {
        self.send(SamplerCommand::SetFrequencyFactor(factor));
    }

    pub fn set_pitch_bend(&self, ratio: f64) {
        self.send(SamplerCommand::SetPitchBend(ratio));
    }

    pub fn set_reset_on_transport_start(&self, enabled: bool) {
        self.send(SamplerCommand::SetResetOnTransportStart(enabled));
    }

    pub fn set_current_loop(&self, looping: bool) {
        self.send(SamplerCommand::SetCurrentLoop(looping));
    }

    pub fn set_current_root_frequency(&self, frequency: f64) {
        self.send(SamplerCommand::SetCurrentRootFrequency(frequency));
    }

    fn send(&self, command: SamplerCommand) {
        if self.commands.send(command).is_err() {
            warn!("Sampler command dropped; engine receiver disconnected");
        }
    }
}

impl Sampler {
    /// Drains queued control commands. Call once per block, before
    /// [`Sampler::render_block`], on the thread that owns the engine.
    pub fn apply_commands(&mut self, commands: &Receiver<SamplerCommand>) {
        for command in commands.try_iter() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: SamplerCommand) {
        match command {
            SamplerCommand::InstallSample {
                position,
                root_frequency,
                looping,
                decoded,
                file_name,
                file_path,
            } => {
                if let Err(error) = self.install_decoded(
                    position,
                    decoded,
                    root_frequency,
                    looping,
                    file_name,
                    file_path,
                ) {
                    warn!(slot = position, error = %error, "Queued sample install rejected");
                }
            }
            SamplerCommand::UnloadSample(position) => {
                self.unload_sample(position);
            }
            SamplerCommand::ChooseSample(position) => {
                self.choose_sample(position);
            }
            SamplerCommand::ChooseNext => {
                self.choose_next_sample();
            }
            SamplerCommand::ChoosePrev => {
                self.choose_prev_sample();
            }
            SamplerCommand::NoteOn(note) => self.note_on(note),
            SamplerCommand::NoteOff(note) => self.note_off(note),
            SamplerCommand::AllNotesOff => self.all_notes_off(),
            SamplerCommand::ResetSlot(position) => self.reset_slot(position),
            SamplerCommand::ResetCurrent => self.reset_current(),
            SamplerCommand::ResetAll => self.reset_all(),
            SamplerCommand::SetTuning(tuning) => self.set_tuning(tuning),
            SamplerCommand::SetFrequencyFactor(factor) => self.set_frequency_factor(factor),
            SamplerCommand::SetPitchBend(ratio) => self.set_pitch_bend(ratio),
            SamplerCommand::SetResetOnTransportStart(enabled) => {
                self.set_reset_on_transport_start(enabled)
            }
            SamplerCommand::SetCurrentLoop(looping) => self.set_current_loop(looping),
            SamplerCommand::SetCurrentRootFrequency(frequency) => {
                self.set_current_root_frequency(frequency)
            }
        }
    }
}
