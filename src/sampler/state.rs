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

//! Engine state persistence.
//!
//! State is flattened into an attribute tree that the host serializes however
//! it likes (the tree itself carries serde derives). Only loaded slots are
//! written: an absent slot on reload is distinguishable from a slot with
//! default values. Loading re-drives the normal sample load path from the
//! persisted file paths; a path that no longer resolves degrades to an empty
//! slot rather than an error.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::engine::Sampler;
use super::slot::SLOT_CAPACITY;

/// One attribute value in the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// A named node with attributes and child nodes. This is the abstract shape
/// of the host's persistence container; reads default every absent attribute
/// so old state stays loadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    name: String,
    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,
    #[serde(default)]
    children: Vec<StateNode>,
}

impl StateNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_int(&mut self, key: impl Into<String>, value: i64) {
        self.attributes.insert(key.into(), AttrValue::Int(value));
    }

    pub fn set_float(&mut self, key: impl Into<String>, value: f64) {
        self.attributes.insert(key.into(), AttrValue::Float(value));
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.attributes.insert(key.into(), AttrValue::Bool(value));
    }

    pub fn set_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), AttrValue::Text(value.into()));
    }

    /// Returns the integer attribute, coercing a stored float, or the default.
    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        match self.attributes.get(key) {
            Some(AttrValue::Int(value)) => *value,
            Some(AttrValue::Float(value)) => *value as i64,
            _ => default,
        }
    }

    /// Returns the float attribute, coercing a stored integer, or the default.
    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        match self.attributes.get(key) {
            Some(AttrValue::Float(value)) => *value,
            Some(AttrValue::Int(value)) => *value as f64,
            _ => default,
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.attributes.get(key) {
            Some(AttrValue::Bool(value)) => *value,
            Some(AttrValue::Int(value)) => *value != 0,
            _ => default,
        }
    }

    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.attributes.get(key) {
            Some(AttrValue::Text(value)) => value,
            _ => default,
        }
    }

    pub fn add_child(&mut self, child: StateNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> impl Iterator<Item = &StateNode> {
        self.children.iter()
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StateNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

impl Sampler {
    /// Flattens the engine state into an attribute tree. Only loaded slots
    /// produce child nodes.
    pub fn save_state(&self) -> StateNode {
        let mut root = StateNode::new("Sampler");
        root.set_int(
            "currentSlot",
            self.current.map(|c| c as i64).unwrap_or(-1),
        );
        root.set_bool("outerResetPending", self.waiting_for_outer_reset);

        for index in self.store.loaded_indices() {
            let Some(slot) = self.store.get(index) else {
                continue;
            };
            let mut child = StateNode::new("Slot");
            child.set_int("slotIndex", index as i64);
            child.set_float("rootFrequency", slot.root_frequency);
            child.set_bool("loop", slot.looping);
            child.set_float("cursorTime", slot.sample_time);
            child.set_text("filePath", slot.file_path.clone());
            child.set_bool("resetPending", slot.waiting_for_reset);
            root.add_child(child);
        }

        debug!(slots = self.store.num_loaded(), "State saved");
        root
    }

    /// Reconstructs engine state from an attribute tree, re-invoking the
    /// sample load path for every persisted slot. Slots whose files no
    /// longer resolve stay empty; that is an accepted degradation, not an
    /// error.
    pub fn load_state(&mut self, state: &StateNode) {
        self.waiting_for_outer_reset = state.bool_or("outerResetPending", true);
        let current = state.int_or("currentSlot", 0);
        self.current = if (0..SLOT_CAPACITY as i64).contains(&current) {
            Some(current as usize)
        } else {
            None
        };

        for child in state.children_named("Slot") {
            let index = child.int_or("slotIndex", -1);
            if !(0..SLOT_CAPACITY as i64).contains(&index) {
                continue;
            }
            let index = index as usize;
            let path = child.text_or("filePath", "");
            // The root frequency is persisted directly (not the MIDI note)
            // so it survives tuning changes.
            let root_frequency = child.float_or("rootFrequency", 0.0);
            let looping = child.bool_or("loop", true);

            match self.load_sample(Path::new(path), root_frequency, index, looping) {
                Ok(_) => {
                    if let Some(slot) = self.store.get_mut(index) {
                        slot.sample_time = child.float_or("cursorTime", 0.0);
                        slot.waiting_for_reset = child.bool_or("resetPending", true);
                    }
                }
                Err(error) => {
                    warn!(
                        slot = index,
                        path,
                        error = %error,
                        "Skipping persisted sample; it did not load"
                    );
                }
            }
        }

        // The restored selection behaves like a fresh slot switch.
        if let Some(slot) = self.current.and_then(|c| self.store.get(c)) {
            self.time = slot.sample_time;
        }

        debug!(
            current = ?self.current,
            loaded = self.store.num_loaded(),
            "State restored"
        );
    }
}
