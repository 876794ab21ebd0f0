// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::env;

use snafu::{OptionExt, ResultExt, Whatever};
use strobe_designs::simple_dma;
use strobe_kernel::{KernelOptions, Model, TriggerCondition};

fn dma() -> Result<Model, Whatever> {
    if env::var("RUST_LOG").is_ok() {
        let _ = env_logger::builder().is_test(true).try_init();
    }
    let netlist = simple_dma().whatever_context("simple_dma should build")?;
    Ok(Model::new(netlist, KernelOptions::default_logging()))
}

/// Holds reset for one step, then releases it.
fn come_out_of_reset(model: &mut Model) -> Result<(), Whatever> {
    model.set_input("rst_n", 0).whatever_context("rst_n")?;
    model.step().whatever_context("reset step")?;
    model.set_input("rst_n", 1).whatever_context("rst_n")?;
    model.step().whatever_context("release step")?;
    Ok(())
}

fn tick(model: &mut Model) -> Result<(), Whatever> {
    model.tick("clk").whatever_context("tick")?;
    Ok(())
}

fn done(model: &Model) -> Result<u64, Whatever> {
    model.get_output("dma_done").whatever_context("dma_done")
}

fn count(model: &Model) -> Result<u64, Whatever> {
    model.peek("count").whatever_context("count")
}

#[test]
#[snafu::report]
fn length_five_transfer() -> Result<(), Whatever> {
    let mut model = dma()?;
    come_out_of_reset(&mut model)?;

    model.set_input("dma_start", 1).whatever_context("dma_start")?;
    model.set_input("dma_src_addr", 0x1000).whatever_context("src")?;
    model.set_input("dma_dst_addr", 0x2000).whatever_context("dst")?;
    model.set_input("dma_length", 5).whatever_context("length")?;
    model.set_input("dma_channel", 2).whatever_context("channel")?;
    tick(&mut model)?;
    model.set_input("dma_start", 0).whatever_context("dma_start")?;

    assert_eq!(count(&model)?, 0);
    assert_eq!(done(&model)?, 0);
    assert_eq!(model.peek("src_addr_reg").whatever_context("src")?, 0x1000);
    assert_eq!(model.peek("dst_addr_reg").whatever_context("dst")?, 0x2000);
    assert_eq!(model.peek("length_reg").whatever_context("length")?, 5);
    assert_eq!(model.peek("channel_reg").whatever_context("channel")?, 2);

    for expected in 1..=5 {
        tick(&mut model)?;
        assert_eq!(count(&model)?, expected);
        assert_eq!(done(&model)?, 0, "done too early at count {expected}");
    }

    tick(&mut model)?;
    assert_eq!(done(&model)?, 1);
    assert_eq!(count(&model)?, 5);

    tick(&mut model)?;
    assert_eq!(done(&model)?, 0);

    // the completion condition still holds, so done pulses again
    tick(&mut model)?;
    assert_eq!(done(&model)?, 1);

    Ok(())
}

#[test]
#[snafu::report]
fn start_is_ignored_while_done() -> Result<(), Whatever> {
    let mut model = dma()?;
    come_out_of_reset(&mut model)?;

    // an idle engine with a zero length completes immediately
    tick(&mut model)?;
    assert_eq!(done(&model)?, 1);

    model.set_input("dma_start", 1).whatever_context("dma_start")?;
    model.set_input("dma_length", 3).whatever_context("length")?;
    tick(&mut model)?;
    assert_eq!(done(&model)?, 0);
    assert_eq!(model.peek("length_reg").whatever_context("length")?, 0);

    tick(&mut model)?;
    assert_eq!(model.peek("length_reg").whatever_context("length")?, 3);
    Ok(())
}

#[test]
#[snafu::report]
fn reset_wins_mid_transfer() -> Result<(), Whatever> {
    let mut model = dma()?;
    come_out_of_reset(&mut model)?;

    model.set_input("dma_start", 1).whatever_context("dma_start")?;
    model.set_input("dma_length", 9).whatever_context("length")?;
    tick(&mut model)?;
    model.set_input("dma_start", 0).whatever_context("dma_start")?;
    tick(&mut model)?;
    tick(&mut model)?;
    assert_eq!(count(&model)?, 2);

    // no clock edge: the falling reset alone runs the block
    model.set_input("dma_start", 1).whatever_context("dma_start")?;
    model.set_input("rst_n", 0).whatever_context("rst_n")?;
    let report = model.step().whatever_context("reset step")?;
    let rst_n = model
        .netlist()
        .find_signal("rst_n")
        .whatever_context("rst_n exists")?;
    assert_eq!(report.fired, vec![TriggerCondition::negedge(rst_n)]);
    assert_eq!(report.blocks_run, 1);

    for register in [
        "src_addr_reg",
        "dst_addr_reg",
        "length_reg",
        "channel_reg",
        "count",
        "dma_done",
    ] {
        assert_eq!(model.peek(register).whatever_context("peek")?, 0);
    }

    // clock edges while reset is held keep everything cleared
    tick(&mut model)?;
    assert_eq!(count(&model)?, 0);
    assert_eq!(model.peek("length_reg").whatever_context("length")?, 0);
    Ok(())
}

#[test]
#[snafu::report]
fn trigger_table_matches_sensitivity_list() -> Result<(), Whatever> {
    let model = dma()?;
    let netlist = model.netlist();
    let descriptions: Vec<String> = netlist
        .act_triggers()
        .conditions()
        .iter()
        .map(|condition| {
            condition.describe(strobe_kernel::Region::Active, netlist)
        })
        .collect();
    assert_eq!(
        descriptions,
        vec!["@(posedge simple_dma.clk)", "@(negedge simple_dma.rst_n)"]
    );
    Ok(())
}
