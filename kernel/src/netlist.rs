// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Circuit description: signals, memories, continuous assignments, and
//! edge-triggered sequential blocks.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    ops::Index,
};

use snafu::Snafu;

use crate::{
    BlockContext, MemoryId, PortDirection, SignalId, SignalKind,
    TriggerCondition, TriggerVector,
    signal::{MemoryDecl, SignalDecl},
    trigger::{MAX_TRIGGERS, TriggerTable},
};

type CombFn = dyn Fn(&Values<'_>) -> u64 + Send + Sync;
type BlockFn = dyn Fn(&mut BlockContext<'_>) + Send + Sync;

/// Read-only view of the current signal values, handed to continuous
/// assignments.
pub struct Values<'a> {
    signals: &'a [u64],
}

impl<'a> Values<'a> {
    pub(crate) fn new(signals: &'a [u64]) -> Self {
        Self { signals }
    }

    pub fn get(&self, signal: SignalId) -> u64 {
        self.signals[signal.0]
    }
}

impl Index<SignalId> for Values<'_> {
    type Output = u64;

    fn index(&self, signal: SignalId) -> &Self::Output {
        &self.signals[signal.0]
    }
}

/// Where a design was described, reported alongside convergence failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self::new("<unknown>", 0)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            self.file.fmt(f)
        } else {
            write!(f, "{}:{}", self.file, self.line)
        }
    }
}

pub(crate) struct Assign {
    pub(crate) target: SignalId,
    fan_in: Vec<SignalId>,
    pub(crate) eval: Box<CombFn>,
}

pub(crate) struct Block {
    pub(crate) name: String,
    triggers: Vec<TriggerCondition>,
    pub(crate) mask: TriggerVector,
    pub(crate) body: Box<BlockFn>,
}

/// Netlist construction error.
#[derive(Debug, Snafu)]
pub enum NetlistError {
    #[snafu(display("Design {design} declares `{name}` more than once"))]
    DuplicateName { design: String, name: String },
    #[snafu(display(
        "Signal {signal} on design {design} has width {width}, but widths must be between 1 and 64 bits"
    ))]
    InvalidWidth {
        design: String,
        signal: String,
        width: usize,
    },
    #[snafu(display(
        "Memory {memory} on design {design} must have a depth of at least 1 and a width between 1 and 64 bits"
    ))]
    EmptyMemory { design: String, memory: String },
    #[snafu(display(
        "{user} on design {design} refers to signal #{index}, which the design never declared"
    ))]
    UnknownSignal {
        design: String,
        user: String,
        index: usize,
    },
    #[snafu(display(
        "Signal {signal} on design {design} is driven by more than one continuous assignment"
    ))]
    MultipleDrivers { design: String, signal: String },
    #[snafu(display(
        "Input port {port} on design {design} cannot be the target of a continuous assignment"
    ))]
    InputDriven { design: String, port: String },
    #[snafu(display(
        "Block {block} on design {design} must be sensitive to at least one edge, and only to edges"
    ))]
    UnsupportedTrigger { design: String, block: String },
    #[snafu(display(
        "Design {design} uses more than {limit} distinct edge triggers"
    ))]
    TooManyTriggers { design: String, limit: usize },
}

/// Builds a [`Netlist`]. Declarations hand out ids immediately; every check
/// happens in [`NetlistBuilder::build`].
pub struct NetlistBuilder {
    name: String,
    location: SourceLocation,
    signals: Vec<SignalDecl>,
    memories: Vec<MemoryDecl>,
    assigns: Vec<Assign>,
    blocks: Vec<Block>,
}

impl NetlistBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: SourceLocation::unknown(),
            signals: vec![],
            memories: vec![],
            assigns: vec![],
            blocks: vec![],
        }
    }

    /// Records the file and line the design comes from.
    pub fn located_at(
        &mut self,
        file: impl Into<String>,
        line: u32,
    ) -> &mut Self {
        self.location = SourceLocation::new(file, line);
        self
    }

    fn declare(
        &mut self,
        name: impl Into<String>,
        width: usize,
        kind: SignalKind,
        reset_value: u64,
    ) -> SignalId {
        self.signals.push(SignalDecl {
            name: name.into(),
            width,
            kind,
            reset_value,
        });
        SignalId(self.signals.len() - 1)
    }

    pub fn input(&mut self, name: impl Into<String>, width: usize) -> SignalId {
        self.declare(name, width, SignalKind::Port(PortDirection::Input), 0)
    }

    /// An output port. It may be driven by either an assignment or a block.
    pub fn output(
        &mut self,
        name: impl Into<String>,
        width: usize,
    ) -> SignalId {
        self.declare(name, width, SignalKind::Port(PortDirection::Output), 0)
    }

    pub fn wire(&mut self, name: impl Into<String>, width: usize) -> SignalId {
        self.declare(name, width, SignalKind::Wire, 0)
    }

    pub fn reg(&mut self, name: impl Into<String>, width: usize) -> SignalId {
        self.declare(name, width, SignalKind::Register, 0)
    }

    /// A register that holds `reset_value` instead of zero after reset.
    pub fn reg_with_reset(
        &mut self,
        name: impl Into<String>,
        width: usize,
        reset_value: u64,
    ) -> SignalId {
        self.declare(name, width, SignalKind::Register, reset_value)
    }

    pub fn memory(
        &mut self,
        name: impl Into<String>,
        depth: usize,
        width: usize,
    ) -> MemoryId {
        self.memories.push(MemoryDecl {
            name: name.into(),
            depth,
            width,
        });
        MemoryId(self.memories.len() - 1)
    }

    /// Drives `target` with `eval`, which may only read the signals listed in
    /// `fan_in`. Input ports cannot be targets.
    pub fn assign<F>(
        &mut self,
        target: SignalId,
        fan_in: impl IntoIterator<Item = SignalId>,
        eval: F,
    ) -> &mut Self
    where
        F: Fn(&Values<'_>) -> u64 + Send + Sync + 'static,
    {
        self.assigns.push(Assign {
            target,
            fan_in: fan_in.into_iter().collect(),
            eval: Box::new(eval),
        });
        self
    }

    /// Runs `body` in the `nba` region of every step in which one of
    /// `triggers` fired.
    pub fn always<F>(
        &mut self,
        name: impl Into<String>,
        triggers: impl IntoIterator<Item = TriggerCondition>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&mut BlockContext<'_>) + Send + Sync + 'static,
    {
        self.blocks.push(Block {
            name: name.into(),
            triggers: triggers.into_iter().collect(),
            mask: TriggerVector::empty(),
            body: Box::new(body),
        });
        self
    }

    pub fn build(self) -> Result<Netlist, NetlistError> {
        let design = self.name;

        let mut signal_names = HashMap::new();
        let mut taken = HashSet::new();
        for (index, signal) in self.signals.iter().enumerate() {
            if !(1..=64).contains(&signal.width) {
                return InvalidWidthSnafu {
                    design,
                    signal: signal.name.clone(),
                    width: signal.width,
                }
                .fail();
            }
            if !taken.insert(signal.name.clone()) {
                return DuplicateNameSnafu {
                    design,
                    name: signal.name.clone(),
                }
                .fail();
            }
            signal_names.insert(signal.name.clone(), SignalId(index));
        }

        let mut memory_names = HashMap::new();
        for (index, memory) in self.memories.iter().enumerate() {
            if memory.depth == 0 || !(1..=64).contains(&memory.width) {
                return EmptyMemorySnafu {
                    design,
                    memory: memory.name.clone(),
                }
                .fail();
            }
            if !taken.insert(memory.name.clone()) {
                return DuplicateNameSnafu {
                    design,
                    name: memory.name.clone(),
                }
                .fail();
            }
            memory_names.insert(memory.name.clone(), MemoryId(index));
        }

        let signal_count = self.signals.len();
        let mut driven = HashSet::new();
        for assign in &self.assigns {
            let user = format!("Assignment to {}", assign.target);
            for signal in
                std::iter::once(&assign.target).chain(assign.fan_in.iter())
            {
                if signal.0 >= signal_count {
                    return UnknownSignalSnafu {
                        design,
                        user,
                        index: signal.0,
                    }
                    .fail();
                }
            }
            let target = &self.signals[assign.target.0];
            if target.kind() == SignalKind::Port(PortDirection::Input) {
                return InputDrivenSnafu {
                    design,
                    port: target.name.clone(),
                }
                .fail();
            }
            if !driven.insert(assign.target) {
                return MultipleDriversSnafu {
                    design,
                    signal: self.signals[assign.target.0].name.clone(),
                }
                .fail();
            }
        }

        let mut act_triggers = TriggerTable::default();
        for block in &self.blocks {
            if block.triggers.is_empty() {
                return UnsupportedTriggerSnafu {
                    design,
                    block: block.name.clone(),
                }
                .fail();
            }
            for trigger in &block.triggers {
                let Some(signal) = trigger.signal() else {
                    return UnsupportedTriggerSnafu {
                        design,
                        block: block.name.clone(),
                    }
                    .fail();
                };
                if signal.0 >= signal_count {
                    return UnknownSignalSnafu {
                        design,
                        user: format!("Block {}", block.name),
                        index: signal.0,
                    }
                    .fail();
                }
                if act_triggers.intern(*trigger).is_none() {
                    return TooManyTriggersSnafu {
                        design,
                        limit: MAX_TRIGGERS,
                    }
                    .fail();
                }
            }
        }

        let blocks = self
            .blocks
            .into_iter()
            .map(|block| Block {
                mask: act_triggers.mask_of(&block.triggers),
                ..block
            })
            .collect();

        let (order, cyclic) = schedule(&self.assigns);
        let cyclic_targets = cyclic
            .iter()
            .map(|&index| self.assigns[index].target)
            .collect();
        let mut slots: Vec<Option<Assign>> =
            self.assigns.into_iter().map(Some).collect();
        let assigns = order
            .into_iter()
            .chain(cyclic)
            .filter_map(|index| slots[index].take())
            .collect();

        Ok(Netlist {
            name: design,
            location: self.location,
            signals: self.signals,
            memories: self.memories,
            signal_names,
            memory_names,
            assigns,
            cyclic_targets,
            blocks,
            act_triggers,
        })
    }
}

/// Orders assignments so each one runs after the assignments driving its
/// fan-in. Returns the ordered indices and, separately, the indices that could
/// not be ordered because they sit on or behind a combinational cycle.
fn schedule(assigns: &[Assign]) -> (Vec<usize>, Vec<usize>) {
    let drivers: HashMap<SignalId, usize> = assigns
        .iter()
        .enumerate()
        .map(|(index, assign)| (assign.target, index))
        .collect();
    let dependencies: Vec<Vec<usize>> = assigns
        .iter()
        .map(|assign| {
            assign
                .fan_in
                .iter()
                .filter_map(|signal| drivers.get(signal).copied())
                .collect()
        })
        .collect();

    let mut levels: Vec<Option<usize>> = vec![None; assigns.len()];
    let mut progress = true;
    while progress {
        progress = false;
        for index in 0..assigns.len() {
            if levels[index].is_some() {
                continue;
            }
            let mut level = 0;
            let mut ready = true;
            for &dependency in &dependencies[index] {
                match levels[dependency] {
                    Some(dependency_level) => {
                        level = level.max(dependency_level + 1)
                    }
                    None => {
                        ready = false;
                        break;
                    }
                }
            }
            if ready {
                levels[index] = Some(level);
                progress = true;
            }
        }
    }

    let mut order: Vec<(usize, usize)> = levels
        .iter()
        .enumerate()
        .filter_map(|(index, level)| level.map(|level| (level, index)))
        .collect();
    order.sort();
    let cyclic = (0..assigns.len())
        .filter(|&index| levels[index].is_none())
        .collect();

    (order.into_iter().map(|(_, index)| index).collect(), cyclic)
}

/// A validated circuit, ready to be instantiated with [`crate::Model::new`].
pub struct Netlist {
    name: String,
    location: SourceLocation,
    pub(crate) signals: Vec<SignalDecl>,
    pub(crate) memories: Vec<MemoryDecl>,
    signal_names: HashMap<String, SignalId>,
    memory_names: HashMap<String, MemoryId>,
    /// In evaluation order.
    pub(crate) assigns: Vec<Assign>,
    cyclic_targets: Vec<SignalId>,
    pub(crate) blocks: Vec<Block>,
    act_triggers: TriggerTable,
}

impl fmt::Debug for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Netlist")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("signals", &self.signals)
            .field("memories", &self.memories)
            .field("assigns", &self.assigns.len())
            .field(
                "blocks",
                &self
                    .blocks
                    .iter()
                    .map(|block| &block.name)
                    .collect::<Vec<_>>(),
            )
            .field("act_triggers", &self.act_triggers)
            .finish_non_exhaustive()
    }
}

impl Netlist {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn signal(&self, signal: SignalId) -> Option<&SignalDecl> {
        self.signals.get(signal.0)
    }

    pub fn signals(&self) -> impl Iterator<Item = (SignalId, &SignalDecl)> {
        self.signals
            .iter()
            .enumerate()
            .map(|(index, decl)| (SignalId(index), decl))
    }

    pub fn find_signal(&self, name: &str) -> Option<SignalId> {
        self.signal_names.get(name).copied()
    }

    pub fn memory(&self, memory: MemoryId) -> Option<&MemoryDecl> {
        self.memories.get(memory.0)
    }

    pub fn memories(&self) -> impl Iterator<Item = (MemoryId, &MemoryDecl)> {
        self.memories
            .iter()
            .enumerate()
            .map(|(index, decl)| (MemoryId(index), decl))
    }

    pub fn find_memory(&self, name: &str) -> Option<MemoryId> {
        self.memory_names.get(name).copied()
    }

    /// The top-level ports in declaration order.
    pub fn ports(
        &self,
    ) -> impl Iterator<Item = (&str, usize, PortDirection)> + '_ {
        self.signals.iter().filter_map(|decl| {
            decl.kind
                .direction()
                .map(|direction| (decl.name.as_str(), decl.width, direction))
        })
    }

    /// The edge conditions sequential blocks are sensitive to, in the order
    /// their bit positions were assigned.
    pub fn act_triggers(&self) -> &TriggerTable {
        &self.act_triggers
    }

    /// Signals driven by assignments that could not be ordered because of a
    /// combinational cycle.
    pub fn combinational_cycles(&self) -> &[SignalId] {
        &self.cyclic_targets
    }

    pub fn block_names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|block| block.name.as_str())
    }
}
