// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::env;

use snafu::{ResultExt, Whatever};
use strobe_designs::axi4_lite_slave;
use strobe_kernel::{KernelOptions, Model};

struct Bus {
    model: Model,
}

impl Bus {
    fn new() -> Result<Self, Whatever> {
        if env::var("RUST_LOG").is_ok() {
            let _ = env_logger::builder().is_test(true).try_init();
        }
        let netlist =
            axi4_lite_slave().whatever_context("axi4_lite_slave should build")?;
        let mut model = Model::new(netlist, KernelOptions::default());
        model.set_input("ARESETn", 1).whatever_context("ARESETn")?;
        model.step().whatever_context("settle")?;
        Ok(Self { model })
    }

    fn set(&mut self, port: &str, value: u64) -> Result<(), Whatever> {
        self.model
            .set_input(port, value)
            .whatever_context(format!("set {port}"))
    }

    fn get(&self, port: &str) -> Result<u64, Whatever> {
        self.model
            .get_output(port)
            .whatever_context(format!("get {port}"))
    }

    fn tick(&mut self) -> Result<(), Whatever> {
        self.model.tick("ACLK").whatever_context("tick")?;
        Ok(())
    }

    fn write_state(&self) -> Result<u64, Whatever> {
        self.model.peek("write_state").whatever_context("write_state")
    }
}

#[test]
#[snafu::report]
fn write_handshake() -> Result<(), Whatever> {
    let mut bus = Bus::new()?;

    bus.set("AWVALID", 1)?;
    bus.set("AWADDR", 0x10)?;
    bus.set("WVALID", 1)?;
    bus.set("WDATA", 0xDEAD_BEEF)?;
    bus.set("WSTRB", 0xF)?;
    bus.tick()?;
    assert_eq!(bus.get("AWREADY")?, 1);
    assert_eq!(bus.write_state()?, 1);
    assert_eq!(bus.get("WREADY")?, 0);
    assert_eq!(bus.get("BVALID")?, 0);

    // address accepted on this edge, data is taken because the channel is
    // armed
    bus.tick()?;
    assert_eq!(bus.get("AWREADY")?, 0);
    assert_eq!(bus.get("WREADY")?, 1);
    assert_eq!(
        bus.model
            .peek_memory("memory", 4)
            .whatever_context("memory")?,
        0xDEAD_BEEF
    );

    bus.set("AWVALID", 0)?;
    bus.tick()?;
    assert_eq!(bus.get("WREADY")?, 0);
    assert_eq!(bus.get("BVALID")?, 1);
    assert_eq!(bus.get("BRESP")?, 0);

    // the response waits for BREADY
    bus.set("WVALID", 0)?;
    for _ in 0..3 {
        bus.tick()?;
        assert_eq!(bus.get("BVALID")?, 1);
        assert_eq!(bus.write_state()?, 1);
    }

    bus.set("BREADY", 1)?;
    bus.tick()?;
    assert_eq!(bus.get("BVALID")?, 0);
    assert_eq!(bus.write_state()?, 0);
    Ok(())
}

#[test]
#[snafu::report]
fn read_returns_written_word() -> Result<(), Whatever> {
    let mut bus = Bus::new()?;

    bus.set("AWVALID", 1)?;
    bus.set("AWADDR", 0x1008)?;
    bus.set("WVALID", 1)?;
    bus.set("WDATA", 0x1234_5678)?;
    bus.set("BREADY", 1)?;
    bus.tick()?;
    bus.tick()?;
    bus.set("AWVALID", 0)?;
    bus.tick()?;
    bus.set("WVALID", 0)?;
    bus.tick()?;
    assert_eq!(bus.write_state()?, 0);
    // 0x1008 wraps onto word 2
    assert_eq!(
        bus.model
            .peek_memory("memory", 2)
            .whatever_context("memory")?,
        0x1234_5678
    );

    bus.set("ARVALID", 1)?;
    bus.set("ARADDR", 0x8)?;
    bus.tick()?;
    assert_eq!(bus.get("ARREADY")?, 1);
    assert_eq!(bus.get("RVALID")?, 0);

    bus.set("ARVALID", 0)?;
    bus.tick()?;
    assert_eq!(bus.get("ARREADY")?, 0);
    assert_eq!(bus.get("RVALID")?, 1);
    assert_eq!(bus.get("RDATA")?, 0x1234_5678);
    assert_eq!(bus.get("RRESP")?, 0);

    // held until RREADY
    bus.tick()?;
    assert_eq!(bus.get("RVALID")?, 1);

    bus.set("RREADY", 1)?;
    bus.tick()?;
    assert_eq!(bus.get("RVALID")?, 0);
    assert_eq!(bus.model.peek("read_state").whatever_context("read_state")?, 0);
    Ok(())
}

#[test]
#[snafu::report]
fn reset_clears_channels_but_not_memory() -> Result<(), Whatever> {
    let mut bus = Bus::new()?;

    bus.set("AWVALID", 1)?;
    bus.set("WVALID", 1)?;
    bus.set("WDATA", 7)?;
    bus.tick()?;
    bus.tick()?;
    assert_eq!(bus.get("WREADY")?, 1);

    bus.set("ARESETn", 0)?;
    bus.model.step().whatever_context("reset step")?;
    for port in ["AWREADY", "WREADY", "BVALID", "ARREADY", "RVALID", "RDATA"] {
        assert_eq!(bus.get(port)?, 0, "{port} after reset");
    }
    assert_eq!(bus.write_state()?, 0);
    assert_eq!(
        bus.model
            .peek_memory("memory", 0)
            .whatever_context("memory")?,
        7
    );
    Ok(())
}

#[test]
fn address_ports_are_32_bits() {
    let netlist = axi4_lite_slave().expect("builds");
    let widths: Vec<_> = netlist
        .ports()
        .filter(|(name, _, _)| name.ends_with("ADDR"))
        .map(|(name, width, _)| (name, width))
        .collect();
    assert_eq!(widths, vec![("AWADDR", 32), ("ARADDR", 32)]);
}
