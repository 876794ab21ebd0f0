// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Signal and memory declarations.

use std::fmt;

use crate::PortDirection;

/// Handle to a signal of one netlist, handed out by the
/// [`crate::NetlistBuilder`] that declared it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub(crate) usize);

impl SignalId {
    /// The position of the signal in declaration order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal #{}", self.0)
    }
}

/// Handle to a memory array of one netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryId(pub(crate) usize);

impl MemoryId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A top-level port driven or observed by the testbench.
    Port(PortDirection),
    /// Driven by a continuous assignment.
    Wire,
    /// Driven by sequential blocks.
    Register,
}

impl SignalKind {
    pub fn direction(self) -> Option<PortDirection> {
        match self {
            SignalKind::Port(direction) => Some(direction),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalDecl {
    pub(crate) name: String,
    pub(crate) width: usize,
    pub(crate) kind: SignalKind,
    pub(crate) reset_value: u64,
}

impl SignalDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    /// The value the signal holds right after [`crate::Model::reset`].
    pub fn reset_value(&self) -> u64 {
        self.reset_value & mask(self.width)
    }

    pub fn mask(&self) -> u64 {
        mask(self.width)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryDecl {
    pub(crate) name: String,
    pub(crate) depth: usize,
    pub(crate) width: usize,
}

impl MemoryDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }
}

/// All-ones value of `width` bits.
pub fn mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
