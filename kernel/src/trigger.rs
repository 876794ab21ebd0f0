// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Trigger conditions and the bit vectors that record which of them fired.

use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::{Region, SignalId, netlist::Netlist};

/// The largest number of conditions one trigger table can hold.
pub const MAX_TRIGGERS: usize = 64;

/// Something a region can be woken by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerCondition {
    /// Set on the first pass of a region within a step.
    FirstIteration,
    /// Bit 0 of the signal went from 0 to 1.
    Posedge(SignalId),
    /// Bit 0 of the signal went from 1 to 0.
    Negedge(SignalId),
}

impl TriggerCondition {
    pub fn posedge(signal: SignalId) -> Self {
        Self::Posedge(signal)
    }

    pub fn negedge(signal: SignalId) -> Self {
        Self::Negedge(signal)
    }

    pub fn signal(&self) -> Option<SignalId> {
        match *self {
            TriggerCondition::FirstIteration => None,
            TriggerCondition::Posedge(signal)
            | TriggerCondition::Negedge(signal) => Some(signal),
        }
    }

    /// Formats the condition the way Verilator trigger dumps do, e.g.
    /// `@(posedge simple_dma.clk)`.
    pub fn describe(&self, region: Region, netlist: &Netlist) -> String {
        let signal_name = |signal: SignalId| {
            netlist
                .signal(signal)
                .map(|decl| decl.name().to_string())
                .unwrap_or_else(|| signal.to_string())
        };
        match *self {
            TriggerCondition::FirstIteration => format!(
                "Internal '{}' trigger - first iteration",
                region.short_name()
            ),
            TriggerCondition::Posedge(signal) => {
                format!("@(posedge {}.{})", netlist.name(), signal_name(signal))
            }
            TriggerCondition::Negedge(signal) => {
                format!("@(negedge {}.{})", netlist.name(), signal_name(signal))
            }
        }
    }
}

/// One bit per condition of a [`TriggerTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TriggerVector(u64);

impl TriggerVector {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn set(&mut self, position: usize) {
        debug_assert!(position < MAX_TRIGGERS);
        self.0 |= 1 << position;
    }

    pub fn is_set(self, position: usize) -> bool {
        position < MAX_TRIGGERS && self.0 & (1 << position) != 0
    }

    pub fn any(self) -> bool {
        self.0 != 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn intersects(self, other: TriggerVector) -> bool {
        self.0 & other.0 != 0
    }

    /// Positions of the set bits, lowest first.
    pub fn positions(self) -> impl Iterator<Item = usize> {
        (0..MAX_TRIGGERS).filter(move |&position| self.is_set(position))
    }
}

impl BitOr for TriggerVector {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TriggerVector {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TriggerVector {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

/// Assigns every distinct condition a bit position, in order of first use.
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    conditions: Vec<TriggerCondition>,
}

impl TriggerTable {
    /// The table of the `stl` and `ico` regions.
    pub fn first_iteration() -> Self {
        Self {
            conditions: vec![TriggerCondition::FirstIteration],
        }
    }

    /// Returns the position of `condition`, adding it if it is new, or `None`
    /// if the table is already full.
    pub(crate) fn intern(
        &mut self,
        condition: TriggerCondition,
    ) -> Option<usize> {
        if let Some(position) = self.position(condition) {
            return Some(position);
        }
        if self.conditions.len() == MAX_TRIGGERS {
            return None;
        }
        self.conditions.push(condition);
        Some(self.conditions.len() - 1)
    }

    pub fn position(&self, condition: TriggerCondition) -> Option<usize> {
        self.conditions
            .iter()
            .position(|existing| *existing == condition)
    }

    pub fn get(&self, position: usize) -> Option<TriggerCondition> {
        self.conditions.get(position).copied()
    }

    pub fn conditions(&self) -> &[TriggerCondition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The vector with exactly the positions of `conditions` set. Conditions
    /// missing from the table are skipped.
    pub fn mask_of<'a>(
        &self,
        conditions: impl IntoIterator<Item = &'a TriggerCondition>,
    ) -> TriggerVector {
        let mut vector = TriggerVector::empty();
        for condition in conditions {
            if let Some(position) = self.position(*condition) {
                vector.set(position);
            }
        }
        vector
    }

    /// One line per active trigger, or a single line saying none are.
    pub fn dump(
        &self,
        vector: TriggerVector,
        region: Region,
        netlist: &Netlist,
    ) -> Vec<String> {
        if !vector.any() {
            return vec![format!(
                "No '{}' region triggers active",
                region.short_name()
            )];
        }
        vector
            .positions()
            .map(|position| match self.get(position) {
                Some(condition) => format!(
                    "'{}' region trigger index {} is active: {}",
                    region.short_name(),
                    position,
                    condition.describe(region, netlist)
                ),
                None => format!(
                    "'{}' region trigger index {} is active",
                    region.short_name(),
                    position
                ),
            })
            .collect()
    }
}
