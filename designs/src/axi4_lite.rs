// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! An AXI4-Lite slave backed by 1024 32-bit words.
//!
//! Reads and writes run as independent one-bit state machines. An address
//! handshake (`ARVALID`/`AWVALID`) raises the matching `*READY` for one cycle
//! and arms the channel. An armed read returns `memory[(ARADDR >> 2) & 0x3FF]`
//! with `RVALID` held until `RREADY`. An armed write stores `WDATA` at
//! `(AWADDR >> 2) & 0x3FF` when `WVALID` arrives, and once `WVALID` meets
//! `WREADY` the response `BVALID` is held until `BREADY`. Every response is
//! OKAY. `WSTRB` and the protection inputs are accepted but ignored.

use strobe_kernel::{Netlist, NetlistBuilder, NetlistError, TriggerCondition};

pub const MEMORY_WORDS: usize = 1024;

fn word_index(address: u64) -> u64 {
    (address >> 2) & (MEMORY_WORDS as u64 - 1)
}

pub fn axi4_lite_slave() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("axi4_lite_slave");
    builder.located_at("dut/protocols/axi4_lite_slave.v", 40);

    let aclk = builder.input("ACLK", 1);
    let aresetn = builder.input("ARESETn", 1);

    // write address channel
    let awvalid = builder.input("AWVALID", 1);
    let awready = builder.output("AWREADY", 1);
    let awaddr = builder.input("AWADDR", 32);
    builder.input("AWPROT", 3);

    // write data channel
    let wvalid = builder.input("WVALID", 1);
    let wready = builder.output("WREADY", 1);
    let wdata = builder.input("WDATA", 32);
    builder.input("WSTRB", 4);

    // write response channel
    let bvalid = builder.output("BVALID", 1);
    let bready = builder.input("BREADY", 1);
    let bresp = builder.output("BRESP", 2);

    // read address channel
    let arvalid = builder.input("ARVALID", 1);
    let arready = builder.output("ARREADY", 1);
    let araddr = builder.input("ARADDR", 32);
    builder.input("ARPROT", 3);

    // read data channel
    let rvalid = builder.output("RVALID", 1);
    let rready = builder.input("RREADY", 1);
    let rdata = builder.output("RDATA", 32);
    let rresp = builder.output("RRESP", 2);

    let write_state = builder.reg("write_state", 1);
    let read_state = builder.reg("read_state", 1);
    let memory = builder.memory("memory", MEMORY_WORDS, 32);

    builder.always(
        "channels",
        [
            TriggerCondition::posedge(aclk),
            TriggerCondition::negedge(aresetn),
        ],
        move |ctx| {
            if ctx[aresetn] == 0 {
                for register in [
                    awready,
                    wready,
                    bvalid,
                    bresp,
                    arready,
                    rvalid,
                    rdata,
                    rresp,
                    write_state,
                    read_state,
                ] {
                    ctx.set(register, 0);
                }
                return;
            }

            if ctx[arvalid] != 0 && ctx[arready] == 0 {
                ctx.set(arready, 1);
                ctx.set(read_state, 1);
            } else {
                ctx.set(arready, 0);
            }

            if ctx[awvalid] != 0 && ctx[awready] == 0 {
                ctx.set(awready, 1);
                ctx.set(write_state, 1);
            } else {
                ctx.set(awready, 0);
            }

            if ctx[read_state] != 0 && ctx[rvalid] == 0 {
                ctx.set(rvalid, 1);
                ctx.set(rdata, ctx.get_mem(memory, word_index(ctx[araddr])));
                ctx.set(rresp, 0);
            } else if ctx[rready] != 0 && ctx[rvalid] != 0 {
                ctx.set(rvalid, 0);
                ctx.set(read_state, 0);
            }

            if ctx[write_state] != 0 && ctx[wvalid] != 0 && ctx[wready] == 0 {
                ctx.set(wready, 1);
                ctx.set_mem(memory, word_index(ctx[awaddr]), ctx[wdata]);
            } else {
                ctx.set(wready, 0);
            }

            if ctx[wready] != 0 && ctx[wvalid] != 0 {
                ctx.set(bvalid, 1);
                ctx.set(bresp, 0);
            } else if ctx[bready] != 0 && ctx[bvalid] != 0 {
                ctx.set(bvalid, 0);
                ctx.set(write_state, 0);
            }
        },
    );

    builder.build()
}
