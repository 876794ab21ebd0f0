// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use strobe_kernel::{Netlist, NetlistBuilder, NetlistError, TriggerCondition};

/// A valid/ready responder: one cycle after `valid`, `ready` rises and
/// `result` holds `data + 1`. `address` is accepted but not decoded.
pub fn simple_interface() -> Result<Netlist, NetlistError> {
    let mut builder = NetlistBuilder::new("simple_interface");
    builder.located_at("dut/interfaces/simple_interface.v", 15);

    let clk = builder.input("clk", 1);
    let rst_n = builder.input("rst_n", 1);
    let valid = builder.input("valid", 1);
    let data = builder.input("data", 8);
    builder.input("address", 16);
    let ready = builder.output("ready", 1);
    let result = builder.output("result", 8);

    builder.always(
        "respond",
        [
            TriggerCondition::posedge(clk),
            TriggerCondition::negedge(rst_n),
        ],
        move |ctx| {
            ctx.set(ready, ctx[rst_n] & ctx[valid]);
            if ctx[rst_n] == 0 {
                ctx.set(result, 0);
            } else if ctx[valid] != 0 {
                ctx.set(result, ctx[data] + 1);
            }
        },
    );

    builder.build()
}
