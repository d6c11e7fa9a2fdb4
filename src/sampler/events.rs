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

//! Block event scheduling.
//!
//! A render call receives the block plus the events that landed inside it.
//! Events are ordered by timestamp (arrival order breaks ties) and the block
//! is split into sub-ranges at event boundaries, so every sub-range renders
//! under constant voice parameters and note timing is sample-accurate.

use midly::{live::LiveEvent, MidiMessage};

use super::engine::Sampler;

/// Pitch-wheel range in semitones at full deflection.
const PITCH_BEND_RANGE_SEMITONES: f64 = 2.0;

/// Something that happened at a frame within the current render block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockEvent {
    /// Frame offset into the block.
    pub frame: usize,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    NoteOn(u8),
    NoteOff(u8),
    /// New pitch-bend ratio, 1.0 meaning no bend.
    PitchBend(f64),
    /// Host transport went from stopped to playing.
    TransportStart,
}

impl BlockEvent {
    pub fn note_on(frame: usize, note: u8) -> Self {
        Self {
            frame,
            kind: EventKind::NoteOn(note),
        }
    }

    pub fn note_off(frame: usize, note: u8) -> Self {
        Self {
            frame,
            kind: EventKind::NoteOff(note),
        }
    }

    pub fn pitch_bend(frame: usize, ratio: f64) -> Self {
        Self {
            frame,
            kind: EventKind::PitchBend(ratio),
        }
    }

    /// Transport-start events carry frame 0 by convention; the caller
    /// synthesizes one when host transport transitions stopped -> playing.
    pub fn transport_start() -> Self {
        Self {
            frame: 0,
            kind: EventKind::TransportStart,
        }
    }

    /// Maps a parsed MIDI channel message onto a block event. Messages the
    /// engine does not model return None. A note-on with velocity zero is a
    /// note-off, per MIDI convention.
    pub fn from_live_event(frame: usize, event: &LiveEvent) -> Option<Self> {
        let LiveEvent::Midi { message, .. } = event else {
            return None;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if u8::from(*vel) == 0 => {
                Some(Self::note_off(frame, u8::from(*key)))
            }
            MidiMessage::NoteOn { key, .. } => Some(Self::note_on(frame, u8::from(*key))),
            MidiMessage::NoteOff { key, .. } => Some(Self::note_off(frame, u8::from(*key))),
            MidiMessage::PitchBend { bend } => {
                let normalized = f64::from(bend.as_int()) / 8192.0;
                Some(Self::pitch_bend(frame, bend_ratio(normalized)))
            }
            _ => None,
        }
    }
}

/// Converts a normalized wheel deflection in [-1, 1) to a playback ratio.
fn bend_ratio(normalized: f64) -> f64 {
    2.0_f64.powf(normalized * PITCH_BEND_RANGE_SEMITONES / 12.0)
}

/// Orders events by frame, preserving arrival order for ties. Insertion
/// sort: stable and allocation-free, and per-block event lists are small.
pub(crate) fn sort_by_frame(events: &mut [BlockEvent]) {
    for i in 1..events.len() {
        let mut j = i;
        while j > 0 && events[j - 1].frame > events[j].frame {
            events.swap(j - 1, j);
            j -= 1;
        }
    }
}

impl Sampler {
    /// Renders one block of audio, splitting it at event boundaries. The
    /// event slice is reordered in place; same-frame events apply in their
    /// arrival order. Never fails: invalid state renders silence.
    pub fn render_block(&mut self, out: &mut [Vec<f32>; 2], events: &mut [BlockEvent]) {
        let frames = out[0].len();
        sort_by_frame(events);

        if events.is_empty() {
            self.render_range(out, 0, frames);
        } else {
            let mut time_now = 0;
            for event in events.iter() {
                let at = event.frame.min(frames);
                if at > time_now {
                    self.render_range(out, time_now, at);
                    time_now = at;
                }
                self.apply_event(event);
            }
            if time_now < frames {
                self.render_range(out, time_now, frames);
            }
        }

        self.last_pb = self.pitch_bend;
    }

    fn apply_event(&mut self, event: &BlockEvent) {
        match event.kind {
            EventKind::NoteOn(note) => self.note_on(note),
            EventKind::NoteOff(note) => self.note_off(note),
            EventKind::PitchBend(ratio) => self.set_pitch_bend(ratio),
            EventKind::TransportStart => {
                if self.reset_on_transport_start {
                    self.reset_all();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DecodedSample;

    const RATE: f64 = 48_000.0;

    fn ramp_sampler(frames: usize) -> Sampler {
        let left: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
        let right = left.clone();
        let mut sampler = Sampler::new();
        sampler.prepare(RATE);
        sampler
            .install_decoded(
                0,
                DecodedSample::new(left, right, RATE as u32),
                440.0,
                true,
                "ramp.wav".to_string(),
                String::new(),
            )
            .unwrap();
        sampler.choose_sample(0);
        sampler
    }

    fn block(frames: usize) -> [Vec<f32>; 2] {
        [vec![9.9; frames], vec![9.9; frames]]
    }

    #[test]
    fn test_no_events_renders_whole_block() {
        let mut sampler = ramp_sampler(64);
        sampler.note_on(69);
        let mut out = block(32);
        sampler.render_block(&mut out, &mut []);
        for i in 0..32 {
            assert!((out[0][i] - i as f32 / 64.0).abs() < 1e-4, "frame {}", i);
        }
    }

    #[test]
    fn test_note_on_splits_block_at_event_frame() {
        let mut sampler = ramp_sampler(64);
        let mut out = block(32);
        let mut events = [BlockEvent::note_on(10, 69)];
        sampler.render_block(&mut out, &mut events);

        assert!(out[0][..10].iter().all(|s| *s == 0.0));
        for i in 10..32 {
            let expected = (i - 10) as f32 / 64.0;
            assert!((out[0][i] - expected).abs() < 1e-4, "frame {}", i);
        }
    }

    #[test]
    fn test_note_off_mid_block_silences_tail() {
        let mut sampler = ramp_sampler(64);
        let mut out = block(32);
        let mut events = [BlockEvent::note_on(0, 69), BlockEvent::note_off(20, 69)];
        sampler.render_block(&mut out, &mut events);

        assert!(out[0][..20].iter().enumerate().all(|(i, s)| {
            (s - i as f32 / 64.0).abs() < 1e-4
        }));
        assert!(out[0][20..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_same_frame_events_apply_in_arrival_order() {
        // On then immediately off at frame 10: the note ends up released.
        let mut sampler = ramp_sampler(64);
        let mut out = block(32);
        let mut events = [BlockEvent::note_on(10, 60), BlockEvent::note_off(10, 60)];
        sampler.render_block(&mut out, &mut events);
        assert!(!sampler.is_playing());
        assert!(out[0].iter().all(|s| *s == 0.0));

        // Reversed arrival order leaves the note held.
        let mut events = [BlockEvent::note_off(10, 60), BlockEvent::note_on(10, 60)];
        let mut out = block(32);
        sampler.render_block(&mut out, &mut events);
        assert!(sampler.is_playing());
    }

    #[test]
    fn test_unsorted_events_are_ordered_by_frame() {
        let mut sampler = ramp_sampler(64);
        let mut out = block(32);
        // Arrives out of order; the off at 20 must still end the note.
        let mut events = [BlockEvent::note_off(20, 69), BlockEvent::note_on(4, 69)];
        sampler.render_block(&mut out, &mut events);
        assert!(!sampler.is_playing());
        assert!(out[0][..4].iter().all(|s| *s == 0.0));
        assert!((out[0][4] - 0.0).abs() < 1e-6);
        assert!(out[0][20..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_sort_is_stable_for_equal_frames() {
        let mut events = [
            BlockEvent::note_on(5, 1),
            BlockEvent::note_on(0, 2),
            BlockEvent::note_off(5, 3),
            BlockEvent::note_on(5, 4),
        ];
        sort_by_frame(&mut events);
        assert_eq!(events[0], BlockEvent::note_on(0, 2));
        assert_eq!(events[1], BlockEvent::note_on(5, 1));
        assert_eq!(events[2], BlockEvent::note_off(5, 3));
        assert_eq!(events[3], BlockEvent::note_on(5, 4));
    }

    #[test]
    fn test_transport_start_resets_when_enabled() {
        let mut sampler = ramp_sampler(64);
        sampler.note_on(69);

        // Get the cursor away from zero.
        let mut out = block(32);
        sampler.render_block(&mut out, &mut []);
        assert!(sampler.time > 0.0);

        let mut events = [BlockEvent::transport_start()];
        let mut out = block(8);
        sampler.render_block(&mut out, &mut events);
        assert!((out[0][0] - 0.0).abs() < 1e-6);
        assert!((out[0][4] - 4.0 / 64.0).abs() < 1e-4);
    }

    #[test]
    fn test_transport_start_ignored_when_disabled() {
        let mut sampler = ramp_sampler(64);
        sampler.set_reset_on_transport_start(false);
        sampler.note_on(69);

        let mut out = block(32);
        sampler.render_block(&mut out, &mut []);
        let cursor = sampler.time;

        let mut events = [BlockEvent::transport_start()];
        let mut out = block(8);
        sampler.render_block(&mut out, &mut events);
        assert!(sampler.time > cursor);
    }

    #[test]
    fn test_pitch_bend_event_updates_and_last_pb_latches() {
        let mut sampler = ramp_sampler(64);
        let mut events = [BlockEvent::pitch_bend(0, 1.5)];
        let mut out = block(8);
        sampler.render_block(&mut out, &mut events);
        assert_eq!(sampler.pitch_bend, 1.5);
        assert_eq!(sampler.last_pb, 1.5);
    }

    #[test]
    fn test_from_live_event_notes() {
        let on = LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: 60.into(),
                vel: 100.into(),
            },
        };
        assert_eq!(
            BlockEvent::from_live_event(7, &on),
            Some(BlockEvent::note_on(7, 60))
        );

        // Velocity zero is a note-off in disguise.
        let silent_on = LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::NoteOn {
                key: 60.into(),
                vel: 0.into(),
            },
        };
        assert_eq!(
            BlockEvent::from_live_event(7, &silent_on),
            Some(BlockEvent::note_off(7, 60))
        );

        let aftertouch = LiveEvent::Midi {
            channel: 0.into(),
            message: MidiMessage::ChannelAftertouch { vel: 64.into() },
        };
        assert_eq!(BlockEvent::from_live_event(7, &aftertouch), None);
    }

    #[test]
    fn test_from_live_event_pitch_bend() {
        // Center wheel position: no bend.
        let center = LiveEvent::parse(&[0xE0, 0x00, 0x40]).unwrap();
        match BlockEvent::from_live_event(0, &center) {
            Some(BlockEvent {
                kind: EventKind::PitchBend(ratio),
                ..
            }) => assert!((ratio - 1.0).abs() < 1e-9),
            other => panic!("unexpected event: {:?}", other),
        }

        // Full deflection up approaches two semitones.
        let up = LiveEvent::parse(&[0xE0, 0x7F, 0x7F]).unwrap();
        match BlockEvent::from_live_event(0, &up) {
            Some(BlockEvent {
                kind: EventKind::PitchBend(ratio),
                ..
            }) => {
                assert!(ratio > 1.1);
                assert!(ratio < 2.0_f64.powf(2.0 / 12.0) + 1e-9);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
