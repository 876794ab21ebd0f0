// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Evaluation regions and the loop that drives each of them to a fixed point.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// Propagates initial values once, before time starts.
    Settle,
    /// Propagates freshly driven inputs through combinational logic.
    InputCombinational,
    /// Samples edge triggers.
    Active,
    /// Runs triggered sequential blocks and commits their staged writes.
    PendingUpdate,
}

impl Region {
    /// The tag used in trigger dumps.
    pub fn short_name(self) -> &'static str {
        match self {
            Region::Settle => "stl",
            Region::InputCombinational => "ico",
            Region::Active => "act",
            Region::PendingUpdate => "nba",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Settle => "Settle",
            Region::InputCombinational => "Input combinational",
            Region::Active => "Active",
            Region::PendingUpdate => "NBA",
        }
        .fmt(f)
    }
}

/// Runs `pass` over `state` until it reports that nothing is left to do, and
/// returns how many passes ran.
///
/// Once more than `limit` passes have reported further work, `exceeded` builds
/// the error from the state as it stands. Up to `limit + 1` passes may run,
/// which is the budget Verilator gives each region.
pub fn converge<S, E>(
    region: Region,
    limit: usize,
    state: &mut S,
    mut pass: impl FnMut(&mut S) -> Result<bool, E>,
    exceeded: impl FnOnce(&S, Region) -> E,
) -> Result<usize, E> {
    let mut iterations = 0;
    loop {
        if iterations > limit {
            return Err(exceeded(state, region));
        }
        iterations += 1;
        if !pass(state)? {
            return Ok(iterations);
        }
    }
}
