// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Program data passed between planning tasks
//!
//! The orchestration core treats these as opaque values stored under data
//! keys. The raster task is the only place that looks inside a composite:
//! it splits one into segments and transitions and splices the planned
//! results back together.

use serde::{Deserialize, Serialize};

/// Joint-space waypoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    /// Joint names, parallel to `positions`
    #[serde(default)]
    pub joint_names: Vec<String>,
    /// Joint positions
    pub positions: Vec<f64>,
}

impl Waypoint {
    /// Create a waypoint from positions only
    pub fn new(positions: impl Into<Vec<f64>>) -> Self {
        Self {
            joint_names: Vec::new(),
            positions: positions.into(),
        }
    }
}

/// How a move reaches its waypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveType {
    /// First state of a program
    Start,
    /// Straight-line Cartesian motion
    Linear,
    /// Unconstrained motion
    #[default]
    Freespace,
}

/// Single move to a waypoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveInstruction {
    pub waypoint: Waypoint,
    #[serde(default)]
    pub move_type: MoveType,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default)]
    pub description: String,
}

fn default_profile() -> String {
    "DEFAULT".to_string()
}

impl MoveInstruction {
    /// Create a move with the default profile
    pub fn new(waypoint: Waypoint, move_type: MoveType) -> Self {
        Self {
            waypoint,
            move_type,
            profile: default_profile(),
            description: String::new(),
        }
    }

    /// Set the profile name
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Copy of this move retagged as a start move
    pub fn as_start(&self) -> Self {
        Self {
            move_type: MoveType::Start,
            ..self.clone()
        }
    }
}

/// Entry of a composite program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Instruction {
    Move(MoveInstruction),
    Composite(CompositeInstruction),
}

impl Instruction {
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    pub fn as_composite(&self) -> Option<&CompositeInstruction> {
        match self {
            Self::Composite(c) => Some(c),
            Self::Move(_) => None,
        }
    }

    pub fn as_move(&self) -> Option<&MoveInstruction> {
        match self {
            Self::Move(m) => Some(m),
            Self::Composite(_) => None,
        }
    }
}

impl From<MoveInstruction> for Instruction {
    fn from(m: MoveInstruction) -> Self {
        Self::Move(m)
    }
}

impl From<CompositeInstruction> for Instruction {
    fn from(c: CompositeInstruction) -> Self {
        Self::Composite(c)
    }
}

/// Which manipulator a program moves and in which frames
///
/// Every field is optional. A child program inherits unset fields from its
/// parent through [`ManipulatorInfo::combined`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManipulatorInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manipulator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_frame: Option<String>,
}

impl ManipulatorInfo {
    pub fn new(manipulator: impl Into<String>) -> Self {
        Self {
            manipulator: Some(manipulator.into()),
            ..Self::default()
        }
    }

    pub fn with_working_frame(mut self, frame: impl Into<String>) -> Self {
        self.working_frame = Some(frame.into());
        self
    }

    pub fn with_tcp_frame(mut self, frame: impl Into<String>) -> Self {
        self.tcp_frame = Some(frame.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.manipulator.is_none() && self.working_frame.is_none() && self.tcp_frame.is_none()
    }

    /// Fields set here win; unset fields are taken from `parent`
    pub fn combined(&self, parent: &ManipulatorInfo) -> ManipulatorInfo {
        ManipulatorInfo {
            manipulator: self.manipulator.clone().or_else(|| parent.manipulator.clone()),
            working_frame: self.working_frame.clone().or_else(|| parent.working_frame.clone()),
            tcp_frame: self.tcp_frame.clone().or_else(|| parent.tcp_frame.clone()),
        }
    }
}

/// Ordered, possibly nested, list of instructions with an optional start state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompositeInstruction {
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default, skip_serializing_if = "ManipulatorInfo::is_empty")]
    pub manipulator: ManipulatorInfo,
    #[serde(default)]
    pub start: Option<MoveInstruction>,
    #[serde(default)]
    pub entries: Vec<Instruction>,
}

impl CompositeInstruction {
    /// Create an empty composite using `profile`
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            ..Self::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the manipulator info
    pub fn with_manipulator(mut self, manipulator: ManipulatorInfo) -> Self {
        self.manipulator = manipulator;
        self
    }

    /// Set the start instruction
    pub fn with_start(mut self, start: MoveInstruction) -> Self {
        self.start = Some(start);
        self
    }

    /// Append an entry, builder style
    pub fn with_entry(mut self, entry: impl Into<Instruction>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn has_start_instruction(&self) -> bool {
        self.start.is_some()
    }

    pub fn start_instruction(&self) -> Option<&MoveInstruction> {
        self.start.as_ref()
    }

    pub fn set_start_instruction(&mut self, start: MoveInstruction) {
        self.start = Some(start);
    }

    pub fn push(&mut self, entry: impl Into<Instruction>) {
        self.entries.push(entry.into());
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries, keeping the start instruction
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// First move in depth-first order, ignoring the start instruction
    pub fn first_move_instruction(&self) -> Option<&MoveInstruction> {
        self.entries.iter().find_map(|entry| match entry {
            Instruction::Move(m) => Some(m),
            Instruction::Composite(c) => c.first_move_instruction(),
        })
    }

    /// Last move in depth-first order, ignoring the start instruction
    pub fn last_move_instruction(&self) -> Option<&MoveInstruction> {
        self.entries.iter().rev().find_map(|entry| match entry {
            Instruction::Move(m) => Some(m),
            Instruction::Composite(c) => c.last_move_instruction(),
        })
    }

    /// All moves in depth-first order, ignoring start instructions
    pub fn flatten(&self) -> Vec<&MoveInstruction> {
        let mut moves = Vec::new();
        self.collect_moves(&mut moves);
        moves
    }

    fn collect_moves<'a>(&'a self, out: &mut Vec<&'a MoveInstruction>) {
        for entry in &self.entries {
            match entry {
                Instruction::Move(m) => out.push(m),
                Instruction::Composite(c) => c.collect_moves(out),
            }
        }
    }
}
