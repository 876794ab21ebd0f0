// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Netlists for a handful of small circuits: basic gates and registers, a DMA
//! engine, an AXI4-Lite slave, and a valid/ready interface.
//!
//! Every sequential design resets asynchronously on the falling edge of an
//! active-low `rst_n` and otherwise updates on the rising edge of `clk`.

use snafu::{ResultExt, Snafu};
use strobe_kernel::{Netlist, NetlistError};

pub mod axi4_lite;
pub mod basic;
pub mod dma;
pub mod interface;

pub use axi4_lite::axi4_lite_slave;
pub use basic::{adder, and_gate, counter, shift_register, simple_register};
pub use dma::simple_dma;
pub use interface::simple_interface;

type Constructor = fn() -> Result<Netlist, NetlistError>;

/// Every design by name.
pub const DESIGNS: &[(&str, Constructor)] = &[
    ("adder", adder),
    ("and_gate", and_gate),
    ("axi4_lite_slave", axi4_lite_slave),
    ("counter", counter),
    ("shift_register", shift_register),
    ("simple_dma", simple_dma),
    ("simple_interface", simple_interface),
    ("simple_register", simple_register),
];

#[derive(Debug, Snafu)]
pub enum DesignError {
    #[snafu(display("No design named {name}; known designs are {known}"))]
    NoSuchDesign { name: String, known: String },
    #[snafu(display("Failed to build design {name}"))]
    Build { name: String, source: NetlistError },
}

pub fn names() -> impl Iterator<Item = &'static str> {
    DESIGNS.iter().map(|(name, _)| *name)
}

/// Builds the design called `name`.
pub fn by_name(name: &str) -> Result<Netlist, DesignError> {
    let Some((_, constructor)) =
        DESIGNS.iter().find(|(candidate, _)| *candidate == name)
    else {
        return NoSuchDesignSnafu {
            name,
            known: names().collect::<Vec<_>>().join(", "),
        }
        .fail();
    };
    constructor().context(BuildSnafu { name })
}
