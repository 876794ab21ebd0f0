// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Edge detection for the `act` region.

use crate::{
    SignalId, TriggerCondition, TriggerVector, trigger::TriggerTable,
};

#[derive(Debug, Clone)]
struct Watch {
    signal: SignalId,
    previous: u64,
    rising: Option<usize>,
    falling: Option<usize>,
}

/// Keeps the previous value of every signal that an edge trigger watches.
#[derive(Debug, Clone, Default)]
pub struct EdgeDetector {
    watches: Vec<Watch>,
}

impl EdgeDetector {
    /// Creates one shadow per distinct signal named in `table`.
    pub fn new(table: &TriggerTable) -> Self {
        let mut watches: Vec<Watch> = vec![];
        for (position, condition) in table.conditions().iter().enumerate() {
            let (signal, rising) = match *condition {
                TriggerCondition::Posedge(signal) => (signal, true),
                TriggerCondition::Negedge(signal) => (signal, false),
                TriggerCondition::FirstIteration => continue,
            };
            let index = match watches
                .iter()
                .position(|watch| watch.signal == signal)
            {
                Some(index) => index,
                None => {
                    watches.push(Watch {
                        signal,
                        previous: 0,
                        rising: None,
                        falling: None,
                    });
                    watches.len() - 1
                }
            };
            if rising {
                watches[index].rising = Some(position);
            } else {
                watches[index].falling = Some(position);
            }
        }
        Self { watches }
    }

    /// Makes the current values the previous ones without reporting any edge.
    pub fn snapshot(&mut self, values: &[u64]) {
        for watch in &mut self.watches {
            watch.previous = values[watch.signal.0] & 1;
        }
    }

    /// Compares the current values against the shadows, then updates the
    /// shadows.
    pub fn sample(&mut self, values: &[u64]) -> TriggerVector {
        let mut triggered = TriggerVector::empty();
        for watch in &mut self.watches {
            let current = values[watch.signal.0] & 1;
            if let Some(position) = watch.rising {
                if current & !watch.previous & 1 != 0 {
                    triggered.set(position);
                }
            }
            if let Some(position) = watch.falling {
                if !current & watch.previous & 1 != 0 {
                    triggered.set(position);
                }
            }
            watch.previous = current;
        }
        triggered
    }

    pub fn watched(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.watches.iter().map(|watch| watch.signal)
    }
}
