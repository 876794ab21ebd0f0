// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! A running instance of a [`Netlist`].

use std::{fmt, mem};

use snafu::Snafu;

use crate::{
    KernelOptions, PortDirection, Region, SignalId, SignalKind,
    TriggerCondition, TriggerVector,
    block::{self, BlockContext, PendingUpdate},
    edge::EdgeDetector,
    netlist::{Netlist, SourceLocation, Values},
    region::converge,
    signal::mask,
    trigger::TriggerTable,
};

/// A value driven onto an input port that does not fit in the port. The port
/// receives the masked value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthViolation {
    pub port: String,
    pub width: usize,
    pub value: u64,
}

impl WidthViolation {
    /// What the port actually received.
    pub fn masked(&self) -> u64 {
        self.value & mask(self.width)
    }
}

impl fmt::Display for WidthViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Value {:#x} driven onto port {} does not fit in {} bits, using {:#x}",
            self.value,
            self.port,
            self.width,
            self.masked()
        )
    }
}

/// Runtime port read/write error.
#[derive(Debug, Snafu)]
pub enum PortError {
    #[snafu(display("Port {port} not found on design {design}"))]
    NoSuchPort { design: String, port: String },
    #[snafu(display(
        "Port {port} on design {design} is an {direction} port, but was used as an {attempted_direction} port"
    ))]
    InvalidPortDirection {
        design: String,
        port: String,
        direction: PortDirection,
        attempted_direction: PortDirection,
    },
    #[snafu(display("Signal {signal} not found on design {design}"))]
    NoSuchSignal { design: String, signal: String },
    #[snafu(display("Memory {memory} not found on design {design}"))]
    NoSuchMemory { design: String, memory: String },
    #[snafu(display(
        "Index {index} is out of range for memory {memory} of depth {depth} on design {design}"
    ))]
    MemoryIndexOutOfRange {
        design: String,
        memory: String,
        index: usize,
        depth: usize,
    },
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}

/// A step that could not finish. The model is left as it was when the step
/// gave up.
#[derive(Debug, Snafu)]
pub enum StepError {
    #[snafu(display(
        "{location}: {region} region did not converge after {limit} tries on design {design} (active triggers: {}; still changing: {})",
        list(triggers),
        list(unstable)
    ))]
    NonConvergence {
        design: String,
        region: Region,
        location: SourceLocation,
        limit: usize,
        /// The trigger dump of the region at the time it gave up.
        triggers: Vec<String>,
        /// Signals that changed during the last combinational pass.
        unstable: Vec<String>,
    },
}

impl StepError {
    pub fn region(&self) -> Region {
        match self {
            StepError::NonConvergence { region, .. } => *region,
        }
    }
}

/// Either kind of error a [`Model`] convenience method can run into.
#[derive(Debug, Snafu)]
pub enum ModelError {
    #[snafu(transparent)]
    Port { source: PortError },
    #[snafu(transparent)]
    Step { source: StepError },
}

/// What happened during one [`Model::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Zero unless this was the first step after a reset.
    pub settle_iterations: usize,
    pub ico_iterations: usize,
    /// Summed over every `nba` iteration.
    pub act_iterations: usize,
    pub nba_iterations: usize,
    /// How many sequential block invocations ran.
    pub blocks_run: usize,
    /// Every edge trigger that fired, in order.
    pub fired: Vec<TriggerCondition>,
    /// Memory writes dropped for indexing past the end of the memory.
    pub dropped_memory_writes: usize,
}

impl StepReport {
    pub fn has_fired(&self, condition: TriggerCondition) -> bool {
        self.fired.contains(&condition)
    }

    pub fn fire_count(&self, condition: TriggerCondition) -> usize {
        self.fired
            .iter()
            .filter(|fired| **fired == condition)
            .count()
    }
}

struct ModelState {
    signals: Vec<u64>,
    memories: Vec<Vec<u64>>,
    edges: EdgeDetector,
    stl_triggered: TriggerVector,
    ico_triggered: TriggerVector,
    act_triggered: TriggerVector,
    nba_triggered: TriggerVector,
    /// The last nonempty `nba` vector that ran blocks.
    last_nba: TriggerVector,
    needs_settle: bool,
    first_pass: bool,
    unstable: Vec<SignalId>,
    staged: Vec<PendingUpdate>,
    width_violations: Vec<WidthViolation>,
    report: StepReport,
}

impl ModelState {
    fn new(netlist: &Netlist) -> Self {
        Self {
            signals: vec![0; netlist.signals.len()],
            memories: netlist
                .memories
                .iter()
                .map(|memory| vec![0; memory.depth])
                .collect(),
            edges: EdgeDetector::new(netlist.act_triggers()),
            stl_triggered: TriggerVector::empty(),
            ico_triggered: TriggerVector::empty(),
            act_triggered: TriggerVector::empty(),
            nba_triggered: TriggerVector::empty(),
            last_nba: TriggerVector::empty(),
            needs_settle: true,
            first_pass: false,
            unstable: vec![],
            staged: vec![],
            width_violations: vec![],
            report: StepReport::default(),
        }
    }
}

/// A circuit instance. Drive inputs with [`Model::set_input`], evaluate with
/// [`Model::step`], and observe with [`Model::get_output`].
pub struct Model {
    netlist: Netlist,
    options: KernelOptions,
    state: ModelState,
}

impl Model {
    /// Instantiates `netlist` and resets it.
    pub fn new(netlist: Netlist, options: KernelOptions) -> Self {
        if options.log {
            log::info!(
                "Instantiating design {} with {} signals, {} assignments, and {} blocks",
                netlist.name(),
                netlist.signals.len(),
                netlist.assigns.len(),
                netlist.blocks.len()
            );
            if !netlist.combinational_cycles().is_empty() {
                log::warn!(
                    "Design {} has a combinational cycle through {}",
                    netlist.name(),
                    netlist
                        .combinational_cycles()
                        .iter()
                        .map(|signal| netlist.signals[signal.0].name())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }

        let state = ModelState::new(&netlist);
        let mut model = Self {
            netlist,
            options,
            state,
        };
        model.reset();
        model
    }

    pub fn name(&self) -> &str {
        self.netlist.name()
    }

    pub fn netlist(&self) -> &Netlist {
        &self.netlist
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    /// The top-level ports as `(name, width, direction)`.
    pub fn ports(
        &self,
    ) -> impl Iterator<Item = (&str, usize, PortDirection)> + '_ {
        self.netlist.ports()
    }

    /// Puts every signal at its reset value (zero unless declared otherwise),
    /// zeroes every memory, and takes the resulting values as the previous
    /// values for edge detection. The next step settles the design first.
    pub fn reset(&mut self) {
        if self.options.log {
            log::info!("Resetting design {}", self.netlist.name());
        }
        let state = &mut self.state;
        for (value, decl) in state.signals.iter_mut().zip(&self.netlist.signals)
        {
            *value = decl.reset_value();
        }
        for memory in &mut state.memories {
            memory.fill(0);
        }
        state.edges.snapshot(&state.signals);
        state.stl_triggered.clear();
        state.ico_triggered.clear();
        state.act_triggered.clear();
        state.nba_triggered.clear();
        state.last_nba.clear();
        state.needs_settle = true;
        state.unstable.clear();
        state.staged.clear();
        state.width_violations.clear();
    }

    fn port(
        &self,
        port: &str,
        attempted_direction: PortDirection,
    ) -> Result<SignalId, PortError> {
        let found = self.netlist.find_signal(port).and_then(|signal| {
            match self.netlist.signals[signal.0].kind() {
                SignalKind::Port(direction) => Some((signal, direction)),
                _ => None,
            }
        });
        let Some((signal, direction)) = found else {
            return Err(PortError::NoSuchPort {
                design: self.netlist.name().to_string(),
                port: port.to_string(),
            });
        };
        if direction != attempted_direction {
            return Err(PortError::InvalidPortDirection {
                design: self.netlist.name().to_string(),
                port: port.to_string(),
                direction,
                attempted_direction,
            });
        }
        Ok(signal)
    }

    /// Drives input `port` with `value` masked to the port's width. Takes
    /// effect at the next [`Model::step`].
    pub fn set_input(
        &mut self,
        port: impl Into<String>,
        value: u64,
    ) -> Result<(), PortError> {
        let port: String = port.into();
        let signal = self.port(&port, PortDirection::Input)?;
        let width = self.netlist.signals[signal.0].width();
        let masked = value & mask(width);
        if masked != value && self.options.report_width_violations {
            let violation = WidthViolation { port, width, value };
            if self.options.log {
                log::warn!("{}", violation);
            }
            self.state.width_violations.push(violation);
        }
        self.state.signals[signal.0] = masked;
        Ok(())
    }

    /// The current value of output `port`.
    pub fn get_output(&self, port: impl Into<String>) -> Result<u64, PortError> {
        let port: String = port.into();
        let signal = self.port(&port, PortDirection::Output)?;
        Ok(self.state.signals[signal.0])
    }

    /// The current value of any signal, port or internal.
    pub fn peek(&self, signal: &str) -> Result<u64, PortError> {
        self.netlist
            .find_signal(signal)
            .map(|id| self.state.signals[id.0])
            .ok_or_else(|| PortError::NoSuchSignal {
                design: self.netlist.name().to_string(),
                signal: signal.to_string(),
            })
    }

    pub fn peek_memory(
        &self,
        memory: &str,
        index: usize,
    ) -> Result<u64, PortError> {
        let Some(id) = self.netlist.find_memory(memory) else {
            return Err(PortError::NoSuchMemory {
                design: self.netlist.name().to_string(),
                memory: memory.to_string(),
            });
        };
        let words = &self.state.memories[id.0];
        words
            .get(index)
            .copied()
            .ok_or_else(|| PortError::MemoryIndexOutOfRange {
                design: self.netlist.name().to_string(),
                memory: memory.to_string(),
                index,
                depth: words.len(),
            })
    }

    /// The current value of `signal`, if it belongs to this model.
    pub fn value(&self, signal: SignalId) -> Option<u64> {
        self.state.signals.get(signal.0).copied()
    }

    pub fn width_violations(&self) -> &[WidthViolation] {
        &self.state.width_violations
    }

    pub fn take_width_violations(&mut self) -> Vec<WidthViolation> {
        mem::take(&mut self.state.width_violations)
    }

    /// Evaluates the design until every region has settled.
    pub fn step(&mut self) -> Result<StepReport, StepError> {
        let netlist = &self.netlist;
        let options = &self.options;
        let state = &mut self.state;
        state.report = StepReport::default();

        if state.needs_settle {
            state.report.settle_iterations =
                settle(netlist, options, state, Region::Settle)?;
            state.needs_settle = false;
        }

        state.report.ico_iterations =
            settle(netlist, options, state, Region::InputCombinational)?;

        state.report.nba_iterations = converge(
            Region::PendingUpdate,
            options.iteration_limit,
            state,
            |state| nba_pass(netlist, options, state),
            |state, region| non_convergence(netlist, options, state, region),
        )?;

        Ok(mem::take(&mut state.report))
    }

    /// Drives `clock` high and steps, then drives it low and steps. Returns
    /// the report of the rising half.
    pub fn tick(&mut self, clock: &str) -> Result<StepReport, ModelError> {
        self.set_input(clock, 1)?;
        let report = self.step()?;
        self.set_input(clock, 0)?;
        self.step()?;
        Ok(report)
    }
}

/// Recomputes every assignment once, in evaluation order, and records which
/// targets changed.
fn propagate(netlist: &Netlist, signals: &mut [u64], changed: &mut Vec<SignalId>) {
    changed.clear();
    for assign in &netlist.assigns {
        let target = assign.target.0;
        let value =
            (assign.eval)(&Values::new(signals)) & netlist.signals[target].mask();
        if signals[target] != value {
            signals[target] = value;
            changed.push(assign.target);
        }
    }
}

/// The `stl` and `ico` regions: the first pass is forced by the
/// first-iteration trigger, and passes repeat while any assignment changes its
/// target.
fn settle(
    netlist: &Netlist,
    options: &KernelOptions,
    state: &mut ModelState,
    region: Region,
) -> Result<usize, StepError> {
    state.first_pass = true;
    state.unstable.clear();
    converge(
        region,
        options.iteration_limit,
        state,
        |state| {
            let mut triggered = TriggerVector::empty();
            if mem::take(&mut state.first_pass) {
                triggered.set(0);
            }
            if region == Region::Settle {
                state.stl_triggered = triggered;
            } else {
                state.ico_triggered = triggered;
            }
            if options.log {
                for line in
                    TriggerTable::first_iteration().dump(triggered, region, netlist)
                {
                    log::debug!("{}", line);
                }
            }

            if !triggered.any() && state.unstable.is_empty() {
                return Ok(false);
            }
            propagate(netlist, &mut state.signals, &mut state.unstable);
            Ok(true)
        },
        |state, region| non_convergence(netlist, options, state, region),
    )
}

fn act_pass(
    netlist: &Netlist,
    options: &KernelOptions,
    state: &mut ModelState,
) -> Result<bool, StepError> {
    state.act_triggered = state.edges.sample(&state.signals);
    if options.log {
        for line in
            netlist
                .act_triggers()
                .dump(state.act_triggered, Region::Active, netlist)
        {
            log::debug!("{}", line);
        }
    }
    for position in state.act_triggered.positions() {
        if let Some(condition) = netlist.act_triggers().get(position) {
            state.report.fired.push(condition);
        }
    }
    state.nba_triggered |= state.act_triggered;

    // nothing in the active region can raise another edge
    Ok(false)
}

fn nba_pass(
    netlist: &Netlist,
    options: &KernelOptions,
    state: &mut ModelState,
) -> Result<bool, StepError> {
    state.report.act_iterations += converge(
        Region::Active,
        options.iteration_limit,
        state,
        |state| act_pass(netlist, options, state),
        |state, region| non_convergence(netlist, options, state, region),
    )?;

    if options.log {
        for line in netlist.act_triggers().dump(
            state.nba_triggered,
            Region::PendingUpdate,
            netlist,
        ) {
            log::debug!("{}", line);
        }
    }
    if !state.nba_triggered.any() {
        return Ok(false);
    }

    let fired = state.nba_triggered;
    for block in &netlist.blocks {
        if block.mask.intersects(fired) {
            let mut context = BlockContext::new(
                &state.signals,
                &state.memories,
                &mut state.staged,
            );
            (block.body)(&mut context);
            state.report.blocks_run += 1;
        }
    }
    let dropped = block::commit(
        netlist,
        &mut state.staged,
        &mut state.signals,
        &mut state.memories,
    );
    if dropped > 0 && options.log {
        log::warn!(
            "Dropped {} out-of-range memory write{} on design {}",
            dropped,
            if dropped == 1 { "" } else { "s" },
            netlist.name()
        );
    }
    state.report.dropped_memory_writes += dropped;
    state.last_nba = fired;
    state.nba_triggered.clear();

    converge(
        Region::PendingUpdate,
        options.iteration_limit,
        state,
        |state| {
            propagate(netlist, &mut state.signals, &mut state.unstable);
            Ok(!state.unstable.is_empty())
        },
        |state, region| non_convergence(netlist, options, state, region),
    )?;

    Ok(true)
}

fn non_convergence(
    netlist: &Netlist,
    options: &KernelOptions,
    state: &ModelState,
    region: Region,
) -> StepError {
    let first_iteration = TriggerTable::first_iteration();
    let triggers = match region {
        Region::Settle => {
            first_iteration.dump(state.stl_triggered, region, netlist)
        }
        Region::InputCombinational => {
            first_iteration.dump(state.ico_triggered, region, netlist)
        }
        Region::Active => {
            netlist
                .act_triggers()
                .dump(state.act_triggered, region, netlist)
        }
        Region::PendingUpdate => {
            netlist.act_triggers().dump(state.last_nba, region, netlist)
        }
    };
    let unstable = state
        .unstable
        .iter()
        .map(|signal| netlist.signals[signal.0].name().to_string())
        .collect();

    let error = StepError::NonConvergence {
        design: netlist.name().to_string(),
        region,
        location: netlist.location().clone(),
        limit: options.iteration_limit,
        triggers,
        unstable,
    };
    if options.log {
        log::error!("{}", error);
    }
    error
}

#[cfg(test)]
mod tests {
    use std::env;

    use crate::{NetlistBuilder, NetlistError};

    use super::*;

    fn init_logging() {
        if env::var("RUST_LOG").is_ok() {
            let _ = env_logger::builder().is_test(true).try_init();
        }
    }

    #[test]
    fn registers_swap_through_nonblocking_writes() -> Result<(), ModelError> {
        init_logging();
        let mut builder = NetlistBuilder::new("swap");
        let clk = builder.input("clk", 1);
        let a = builder.reg_with_reset("a", 4, 0xA);
        let b = builder.reg_with_reset("b", 4, 0x5);
        builder.always("swap_a", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(a, ctx[b]);
        });
        builder.always("swap_b", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(b, ctx[a]);
        });
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        let report = model.tick("clk")?;
        assert_eq!(model.peek("a")?, 0x5);
        assert_eq!(model.peek("b")?, 0xA);
        assert_eq!(report.blocks_run, 2);
        assert_eq!(report.fired, vec![TriggerCondition::posedge(clk)]);
        assert_eq!(report.nba_iterations, 2);

        model.tick("clk")?;
        assert_eq!(model.peek("a")?, 0xA);
        assert_eq!(model.peek("b")?, 0x5);
        Ok(())
    }

    #[test]
    fn both_edges_of_one_signal_fire_separately() -> Result<(), ModelError> {
        let mut builder = NetlistBuilder::new("edges");
        let clk = builder.input("clk", 1);
        let rises = builder.reg("rises", 8);
        let falls = builder.reg("falls", 8);
        builder.always("rise", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(rises, ctx[rises] + 1);
        });
        builder.always("fall", [TriggerCondition::negedge(clk)], move |ctx| {
            ctx.set(falls, ctx[falls] + 1);
        });
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());
        assert!(model.step()?.fired.is_empty());

        model.set_input("clk", 1)?;
        let up = model.step()?;
        assert_eq!(up.fired, vec![TriggerCondition::posedge(clk)]);
        assert_eq!(up.blocks_run, 1);
        assert_eq!((model.peek("rises")?, model.peek("falls")?), (1, 0));

        model.set_input("clk", 0)?;
        let down = model.step()?;
        assert_eq!(down.fired, vec![TriggerCondition::negedge(clk)]);
        assert_eq!(down.blocks_run, 1);
        assert_eq!((model.peek("rises")?, model.peek("falls")?), (1, 1));

        // holding the level is not an edge
        assert!(model.step()?.fired.is_empty());
        assert_eq!((model.peek("rises")?, model.peek("falls")?), (1, 1));
        Ok(())
    }

    #[test]
    fn staged_writes_are_masked_and_last_write_wins() -> Result<(), ModelError>
    {
        let mut builder = NetlistBuilder::new("mask");
        let clk = builder.input("clk", 1);
        let count = builder.output("count", 16);
        let mem = builder.memory("mem", 4, 8);
        builder.always("bump", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(count, 0);
            ctx.set(count, ctx[count] + 1);
            ctx.set_mem(mem, 1, 0x1FF);
            ctx.set_mem(mem, 4, 0x12);
        });
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        let mut last = StepReport::default();
        for _ in 0..0x10000 {
            last = model.tick("clk")?;
        }
        assert_eq!(model.get_output("count")?, 0);
        assert_eq!(model.peek_memory("mem", 1)?, 0xFF);
        assert_eq!(last.dropped_memory_writes, 1);
        assert!(matches!(
            model.peek_memory("mem", 4),
            Err(PortError::MemoryIndexOutOfRange { depth: 4, .. })
        ));
        Ok(())
    }

    #[test]
    fn combinational_logic_follows_inputs() -> Result<(), ModelError> {
        let mut builder = NetlistBuilder::new("mux");
        let sel = builder.input("sel", 1);
        let a = builder.input("a", 8);
        let b = builder.input("b", 8);
        let y = builder.output("y", 8);
        let inverted = builder.wire("inverted", 8);
        builder
            .assign(y, [sel, inverted, b], move |v| {
                if v[sel] != 0 { v[inverted] } else { v[b] }
            })
            .assign(inverted, [a], move |v| !v[a]);
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        model.set_input("a", 0x0F)?;
        model.set_input("b", 0x42)?;
        let first = model.step()?;
        assert!(first.settle_iterations > 0);
        assert_eq!(model.get_output("y")?, 0x42);

        model.set_input("sel", 1)?;
        let second = model.step()?;
        assert_eq!(second.settle_iterations, 0);
        assert_eq!(second.ico_iterations, 3);
        assert_eq!(model.get_output("y")?, 0xF0);

        let third = model.step()?;
        assert_eq!(third.ico_iterations, 2);
        assert_eq!(model.get_output("y")?, 0xF0);
        Ok(())
    }

    #[test]
    fn width_violations_are_recorded_and_masked() -> Result<(), PortError> {
        let mut builder = NetlistBuilder::new("narrow");
        builder.input("nibble", 4);
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        model.set_input("nibble", 0x1F)?;
        assert_eq!(model.peek("nibble")?, 0xF);
        assert_eq!(
            model.width_violations(),
            &[WidthViolation {
                port: "nibble".into(),
                width: 4,
                value: 0x1F
            }]
        );
        assert_eq!(model.take_width_violations().len(), 1);
        assert!(model.width_violations().is_empty());

        let mut builder = NetlistBuilder::new("narrow");
        builder.input("nibble", 4);
        let netlist = builder.build().expect("valid netlist");
        let mut quiet = Model::new(
            netlist,
            KernelOptions {
                report_width_violations: false,
                ..Default::default()
            },
        );
        quiet.set_input("nibble", 0x1F)?;
        assert_eq!(quiet.peek("nibble")?, 0xF);
        assert!(quiet.width_violations().is_empty());
        Ok(())
    }

    #[test]
    fn port_errors() -> Result<(), NetlistError> {
        let mut builder = NetlistBuilder::new("ports");
        builder.input("a", 1);
        builder.output("y", 1);
        builder.wire("w", 1);
        let mut model = Model::new(builder.build()?, KernelOptions::default());

        assert!(matches!(
            model.set_input("y", 1),
            Err(PortError::InvalidPortDirection {
                direction: PortDirection::Output,
                attempted_direction: PortDirection::Input,
                ..
            })
        ));
        assert!(matches!(
            model.get_output("a"),
            Err(PortError::InvalidPortDirection { .. })
        ));
        assert!(matches!(
            model.set_input("w", 1),
            Err(PortError::NoSuchPort { .. })
        ));
        assert!(matches!(
            model.peek("missing"),
            Err(PortError::NoSuchSignal { .. })
        ));
        assert!(matches!(
            model.peek_memory("missing", 0),
            Err(PortError::NoSuchMemory { .. })
        ));
        assert_eq!(
            model.ports().collect::<Vec<_>>(),
            vec![("a", 1, PortDirection::Input), ("y", 1, PortDirection::Output)]
        );
        Ok(())
    }

    #[test]
    fn gated_combinational_loop_fails_in_ico() -> Result<(), ModelError> {
        init_logging();
        let mut builder = NetlistBuilder::new("ring");
        builder.located_at("ring.v", 3);
        let enable = builder.input("enable", 1);
        let x = builder.wire("x", 1);
        builder.assign(x, [enable, x], move |v| v[enable] & !v[x]);
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default_logging());

        model.step()?;
        model.set_input("enable", 1)?;
        let error = model.step().expect_err("the ring oscillates");
        assert_eq!(error.region(), Region::InputCombinational);
        let StepError::NonConvergence {
            design,
            location,
            limit,
            unstable,
            ..
        } = &error;
        assert_eq!(design, "ring");
        assert_eq!(location, &SourceLocation::new("ring.v", 3));
        assert_eq!(*limit, 100);
        assert_eq!(unstable, &vec!["x".to_string()]);
        assert!(error.to_string().starts_with(
            "ring.v:3: Input combinational region did not converge after 100 tries"
        ));
        Ok(())
    }

    #[test]
    fn ungated_combinational_loop_fails_in_settle() {
        let mut builder = NetlistBuilder::new("ring");
        let x = builder.wire("x", 1);
        builder.assign(x, [x], move |v| !v[x]);
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(
            netlist,
            KernelOptions {
                iteration_limit: 5,
                ..Default::default()
            },
        );
        let error = model.step().expect_err("the ring oscillates");
        assert_eq!(error.region(), Region::Settle);
        assert!(error.to_string().contains("after 5 tries"));
    }

    #[test]
    fn self_triggering_register_fails_in_nba() -> Result<(), PortError> {
        let mut builder = NetlistBuilder::new("buzzer");
        let clk = builder.input("clk", 1);
        let q = builder.reg("q", 1);
        builder.always("start", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(q, 1);
        });
        builder.always(
            "buzz",
            [TriggerCondition::posedge(q), TriggerCondition::negedge(q)],
            move |ctx| ctx.set(q, !ctx[q]),
        );
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        model.step().expect("quiet before the clock rises");
        model.set_input("clk", 1)?;
        let error = model.step().expect_err("q keeps toggling");
        assert_eq!(error.region(), Region::PendingUpdate);
        let StepError::NonConvergence { triggers, .. } = &error;
        assert_eq!(triggers.len(), 1);
        assert!(triggers[0].starts_with("'nba' region trigger index"));
        assert!(triggers[0].contains("buzzer.q"));
        Ok(())
    }

    #[test]
    fn reset_restores_initial_state() -> Result<(), ModelError> {
        let mut builder = NetlistBuilder::new("count");
        let clk = builder.input("clk", 1);
        let q = builder.reg_with_reset("q", 8, 3);
        builder.always("inc", [TriggerCondition::posedge(clk)], move |ctx| {
            ctx.set(q, ctx[q] + 1);
        });
        let netlist = builder.build().expect("valid netlist");
        let mut model = Model::new(netlist, KernelOptions::default());

        model.tick("clk")?;
        model.tick("clk")?;
        assert_eq!(model.peek("q")?, 5);

        model.set_input("clk", 1)?;
        model.reset();
        assert_eq!(model.peek("q")?, 3);
        assert_eq!(model.peek("clk")?, 0);
        let report = model.step()?;
        assert!(report.fired.is_empty());
        assert!(report.settle_iterations > 0);
        Ok(())
    }
}
