// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Gates, registers, and counters.

use strobe_kernel::{
    Netlist, NetlistBuilder, NetlistError, SignalId, TriggerCondition,
};

fn clock_and_reset(builder: &mut NetlistBuilder) -> (SignalId, SignalId) {
    (builder.input("clk", 1), builder.input("rst_n", 1))
}

fn edges(clk: SignalId, rst_n: SignalId) -> [TriggerCondition; 2] {
    [TriggerCondition::posedge(clk), TriggerCondition::negedge(rst_n)]
}

/// `y = a & b`.
pub fn and_gate() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("and_gate");
    builder.located_at("dut/basic/and_gate.v", 1);
    let a = builder.input("a", 1);
    let b = builder.input("b", 1);
    let y = builder.output("y", 1);
    builder.assign(y, [a, b], move |v| v[a] & v[b]);
    builder.build()
}

/// An 8-bit counter that advances while `enable` is high and wraps.
pub fn counter() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("counter");
    builder.located_at("dut/basic/counter.v", 1);
    let (clk, rst_n) = clock_and_reset(&mut builder);
    let enable = builder.input("enable", 1);
    let count = builder.output("count", 8);
    builder.always("count", edges(clk, rst_n), move |ctx| {
        if ctx[rst_n] == 0 {
            ctx.set(count, 0);
        } else if ctx[enable] != 0 {
            ctx.set(count, ctx[count] + 1);
        }
    });
    builder.build()
}

/// An 8-bit register that loads `d` while `enable` is high.
pub fn simple_register() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("simple_register");
    builder.located_at("dut/basic/simple_register.v", 1);
    let (clk, rst_n) = clock_and_reset(&mut builder);
    let enable = builder.input("enable", 1);
    let d = builder.input("d", 8);
    let q = builder.output("q", 8);
    builder.always("load", edges(clk, rst_n), move |ctx| {
        if ctx[rst_n] == 0 {
            ctx.set(q, 0);
        } else if ctx[enable] != 0 {
            ctx.set(q, ctx[d]);
        }
    });
    builder.build()
}

/// An 8-bit shift register. While `shift` is high, `data_in` enters at bit 0
/// and `data_out` shows bit 7.
pub fn shift_register() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("shift_register");
    builder.located_at("dut/basic/shift_register.v", 1);
    let (clk, rst_n) = clock_and_reset(&mut builder);
    let shift = builder.input("shift", 1);
    let data_in = builder.input("data_in", 1);
    let q = builder.output("q", 8);
    let data_out = builder.output("data_out", 1);
    builder.always("shift", edges(clk, rst_n), move |ctx| {
        if ctx[rst_n] == 0 {
            ctx.set(q, 0);
        } else if ctx[shift] != 0 {
            ctx.set(q, ((ctx[q] & 0x7F) << 1) | (ctx[data_in] & 1));
        }
    });
    builder.assign(data_out, [q], move |v| v[q] >> 7);
    builder.build()
}

/// Registers `a + b` as an 8-bit `sum` and a `carry` bit.
pub fn adder() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("adder");
    builder.located_at("dut/basic/adder.v", 1);
    let (clk, rst_n) = clock_and_reset(&mut builder);
    let a = builder.input("a", 8);
    let b = builder.input("b", 8);
    let sum = builder.output("sum", 8);
    let carry = builder.output("carry", 1);
    builder.always("add", edges(clk, rst_n), move |ctx| {
        if ctx[rst_n] == 0 {
            ctx.set(sum, 0);
            ctx.set(carry, 0);
        } else {
            let total = ctx[a] + ctx[b];
            ctx.set(sum, total);
            ctx.set(carry, total >> 8);
        }
    });
    builder.build()
}
