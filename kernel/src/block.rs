// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Non-blocking writes staged by sequential blocks.

use std::ops::Index;

use crate::{MemoryId, SignalId, netlist::Netlist, signal::mask};

/// A write staged by a sequential block, applied when the `nba` pass commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingUpdate {
    Signal {
        target: SignalId,
        value: u64,
    },
    Memory {
        memory: MemoryId,
        index: u64,
        value: u64,
    },
}

/// What a sequential block sees while it runs: every read returns the value
/// from before the current `nba` pass, and every write is staged.
pub struct BlockContext<'a> {
    signals: &'a [u64],
    memories: &'a [Vec<u64>],
    staged: &'a mut Vec<PendingUpdate>,
}

impl<'a> BlockContext<'a> {
    pub(crate) fn new(
        signals: &'a [u64],
        memories: &'a [Vec<u64>],
        staged: &'a mut Vec<PendingUpdate>,
    ) -> Self {
        Self {
            signals,
            memories,
            staged,
        }
    }

    pub fn get(&self, signal: SignalId) -> u64 {
        self.signals[signal.0]
    }

    /// Reads word `index` of `memory`. Reads past the end return zero.
    pub fn get_mem(&self, memory: MemoryId, index: u64) -> u64 {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.memories[memory.0].get(index))
            .copied()
            .unwrap_or(0)
    }

    /// Stages `value` for `target`. A later write to the same target in the
    /// same pass wins.
    pub fn set(&mut self, target: SignalId, value: u64) {
        self.staged.push(PendingUpdate::Signal { target, value });
    }

    /// Stages a write of word `index` of `memory`. Writes past the end are
    /// dropped at commit.
    pub fn set_mem(&mut self, memory: MemoryId, index: u64, value: u64) {
        self.staged.push(PendingUpdate::Memory {
            memory,
            index,
            value,
        });
    }
}

impl Index<SignalId> for BlockContext<'_> {
    type Output = u64;

    fn index(&self, signal: SignalId) -> &Self::Output {
        &self.signals[signal.0]
    }
}

/// Applies and drains every staged write, masking each value to the width of
/// its target. Returns how many writes were dropped for indexing past the end
/// of a memory.
pub(crate) fn commit(
    netlist: &Netlist,
    staged: &mut Vec<PendingUpdate>,
    signals: &mut [u64],
    memories: &mut [Vec<u64>],
) -> usize {
    let mut dropped = 0;
    for update in staged.drain(..) {
        match update {
            PendingUpdate::Signal { target, value } => {
                signals[target.0] = value & mask(netlist.signals[target.0].width);
            }
            PendingUpdate::Memory {
                memory,
                index,
                value,
            } => {
                let width = netlist.memories[memory.0].width;
                match usize::try_from(index)
                    .ok()
                    .and_then(|index| memories[memory.0].get_mut(index))
                {
                    Some(word) => *word = value & mask(width),
                    None => dropped += 1,
                }
            }
        }
    }
    dropped
}
