// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! A single-transfer DMA engine.
//!
//! Raising `dma_start` while `dma_done` is low latches the source, destination,
//! length, and channel and restarts the word counter. The counter then advances
//! once per clock until it reaches the latched length, after which `dma_done`
//! pulses high for one cycle. Because the completion condition still holds
//! once the pulse clears, `dma_done` keeps pulsing every other cycle until the
//! next transfer starts.

use strobe_kernel::{Netlist, NetlistBuilder, NetlistError, TriggerCondition};

pub fn simple_dma() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("simple_dma");
    builder.located_at("dut/dma/simple_dma.v", 17);

    let clk = builder.input("clk", 1);
    let rst_n = builder.input("rst_n", 1);
    let dma_start = builder.input("dma_start", 1);
    let dma_src_addr = builder.input("dma_src_addr", 32);
    let dma_dst_addr = builder.input("dma_dst_addr", 32);
    let dma_length = builder.input("dma_length", 16);
    let dma_channel = builder.input("dma_channel", 3);
    let dma_done = builder.output("dma_done", 1);

    let src_addr_reg = builder.reg("src_addr_reg", 32);
    let dst_addr_reg = builder.reg("dst_addr_reg", 32);
    let length_reg = builder.reg("length_reg", 16);
    let channel_reg = builder.reg("channel_reg", 3);
    let count = builder.reg("count", 16);

    builder.always(
        "transfer",
        [
            TriggerCondition::posedge(clk),
            TriggerCondition::negedge(rst_n),
        ],
        move |ctx| {
            if ctx[rst_n] == 0 {
                for register in [
                    src_addr_reg,
                    dst_addr_reg,
                    length_reg,
                    channel_reg,
                    count,
                    dma_done,
                ] {
                    ctx.set(register, 0);
                }
                return;
            }

            if ctx[dma_start] != 0 && ctx[dma_done] == 0 {
                ctx.set(src_addr_reg, ctx[dma_src_addr]);
                ctx.set(dst_addr_reg, ctx[dma_dst_addr]);
                ctx.set(length_reg, ctx[dma_length]);
                ctx.set(channel_reg, ctx[dma_channel]);
                ctx.set(count, 0);
            } else if ctx[dma_done] != 0 {
                ctx.set(dma_done, 0);
            } else if ctx[count] < ctx[length_reg] {
                ctx.set(count, ctx[count] + 1);
            } else {
                ctx.set(dma_done, 1);
            }
        },
    );

    builder.build()
}
