// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! This crate implements an event-driven simulation kernel for
//! register-transfer netlists.
//!
//! A circuit is described once with a [`NetlistBuilder`] and instantiated as a
//! [`Model`]. Every call to [`Model::step`] evaluates the circuit to a fixed
//! point using the same staged regions a Verilator model uses: settle
//! (`stl`), input combinational (`ico`), active (`act`), and non-blocking
//! update (`nba`).
//!
//! ```
//! use strobe_kernel::{KernelOptions, Model, NetlistBuilder, TriggerCondition};
//!
//! let mut builder = NetlistBuilder::new("toggle");
//! let clk = builder.input("clk", 1);
//! let q = builder.output("q", 1);
//! builder.always("flip", [TriggerCondition::posedge(clk)], move |ctx| {
//!     ctx.set(q, !ctx[q]);
//! });
//! let netlist = builder.build().unwrap();
//!
//! let mut model = Model::new(netlist, KernelOptions::default());
//! model.tick("clk").unwrap();
//! assert_eq!(model.get_output("q").unwrap(), 1);
//! ```

use std::{fmt, fs};

use camino::Utf8Path;
use snafu::{ResultExt, Whatever, whatever};

mod block;
pub mod edge;
pub mod model;
pub mod netlist;
pub mod region;
pub mod signal;
pub mod trigger;
pub mod vcd;

pub use block::{BlockContext, PendingUpdate};
pub use model::{Model, ModelError, PortError, StepError, StepReport, WidthViolation};
pub use netlist::{Netlist, NetlistBuilder, NetlistError, SourceLocation, Values};
pub use region::Region;
pub use signal::{MemoryId, SignalId, SignalKind};
pub use trigger::{TriggerCondition, TriggerVector};
pub use vcd::Vcd;

/// The number of passes a region may make without settling before the step is
/// abandoned. Verilator models use the same cap.
pub const DEFAULT_ITERATION_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
        .fmt(f)
    }
}

/// Optional configuration for creating a [`Model`]. Usually, you can just use
/// [`KernelOptions::default()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOptions {
    /// How many passes each region may make before the step fails with
    /// [`StepError::NonConvergence`].
    pub iteration_limit: usize,

    /// Whether to use the log crate.
    pub log: bool,

    /// Whether over-wide values driven onto input ports are recorded as
    /// [`WidthViolation`]s. They are masked either way.
    pub report_width_violations: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            log: false,
            report_width_violations: true,
        }
    }
}

impl KernelOptions {
    /// The same as the [`Default`] implementation except that the log crate is
    /// used.
    pub fn default_logging() -> Self {
        Self {
            log: true,
            ..Default::default()
        }
    }

    /// Reads options from the `[kernel]` table of a TOML document. A document
    /// without that table yields the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, Whatever> {
        let document: toml::Value = toml::from_str(contents)
            .whatever_context("Failed to parse kernel options as TOML")?;
        let mut options = Self::default();
        if let Some(table) = document.get("kernel") {
            options.apply_toml(table)?;
        }
        Ok(options)
    }

    /// Reads options from the `[kernel]` table of the TOML file at `path`.
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self, Whatever> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).whatever_context(format!(
            "Failed to read kernel options from {}",
            path
        ))?;
        Self::from_toml_str(&contents)
            .whatever_context(format!("Invalid kernel options in {}", path))
    }

    /// Overrides the fields present in `table`. Unknown keys are ignored.
    pub fn apply_toml(&mut self, table: &toml::Value) -> Result<(), Whatever> {
        if !table.is_table() {
            whatever!("Expected `kernel` to be a table");
        }

        if let Some(limit) = table.get("iteration-limit") {
            let Some(limit) = limit.as_integer() else {
                whatever!("`iteration-limit` must be an integer");
            };
            if limit < 1 {
                whatever!("`iteration-limit` must be at least 1, got {}", limit);
            }
            self.iteration_limit = limit as usize;
        }

        if let Some(log) = table.get("log") {
            let Some(log) = log.as_bool() else {
                whatever!("`log` must be a boolean");
            };
            self.log = log;
        }

        if let Some(report) = table.get("report-width-violations") {
            let Some(report) = report.as_bool() else {
                whatever!("`report-width-violations` must be a boolean");
            };
            self.report_width_violations = report;
        }

        Ok(())
    }
}
