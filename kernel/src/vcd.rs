// Copyright (C) 2024 Ethan Uppal.
//
// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

use std::{
    fs,
    io::{self, BufWriter, Write},
};

use camino::Utf8Path;
use snafu::{ResultExt, Whatever};

use crate::Model;

struct VcdImpl {
    writer: Box<dyn Write + Send>,
    /// Identifier code of each signal, by signal index.
    codes: Vec<String>,
    widths: Vec<usize>,
    last: Option<Vec<u64>>,
}

/// A VCD dump of every signal of one model.
pub struct Vcd {
    inner: Option<VcdImpl>,
}

/// The printable identifier for the `index`th variable.
fn identifier_code(mut index: usize) -> String {
    const FIRST: u8 = b'!';
    const RANGE: usize = (b'~' - b'!' + 1) as usize;
    let mut code = String::new();
    loop {
        code.push((FIRST + (index % RANGE) as u8) as char);
        index /= RANGE;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    code
}

fn write_value(
    writer: &mut dyn Write,
    width: usize,
    value: u64,
    code: &str,
) -> io::Result<()> {
    if width == 1 {
        writeln!(writer, "{}{}", value & 1, code)
    } else {
        writeln!(writer, "b{:b} {}", value, code)
    }
}

impl Vcd {
    /// Creates a VCD file at `path` describing the signals of `model`.
    pub fn create(
        path: impl AsRef<Utf8Path>,
        model: &Model,
    ) -> Result<Self, Whatever> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent).whatever_context(format!(
                    "Failed to create directory for VCD {}",
                    path
                ))?;
            }
        }
        let file = fs::File::create(path)
            .whatever_context(format!("Failed to create VCD {}", path))?;
        Self::to_writer(BufWriter::new(file), model)
            .whatever_context(format!("Failed to write VCD header to {}", path))
    }

    /// Like [`Vcd::create`], but writes to any sink.
    pub fn to_writer(
        writer: impl Write + Send + 'static,
        model: &Model,
    ) -> Result<Self, Whatever> {
        let mut writer: Box<dyn Write + Send> = Box::new(writer);
        let netlist = model.netlist();
        let mut codes = vec![];
        let mut widths = vec![];

        writeln!(writer, "$version strobe-kernel $end")
            .and_then(|_| writeln!(writer, "$timescale 1ns $end"))
            .and_then(|_| {
                writeln!(writer, "$scope module {} $end", netlist.name())
            })
            .whatever_context("Failed to write VCD preamble")?;
        for (id, signal) in netlist.signals() {
            let code = identifier_code(id.index());
            writeln!(
                writer,
                "$var wire {} {} {} $end",
                signal.width(),
                code,
                signal.name()
            )
            .whatever_context("Failed to write VCD variable")?;
            codes.push(code);
            widths.push(signal.width());
        }
        writeln!(writer, "$upscope $end")
            .and_then(|_| writeln!(writer, "$enddefinitions $end"))
            .whatever_context("Failed to finish VCD header")?;

        Ok(Self {
            inner: Some(VcdImpl {
                writer,
                codes,
                widths,
                last: None,
            }),
        })
    }

    /// A VCD that ignores every call, for when tracing is off.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Records the values of `model` at `timestamp`. Only values that changed
    /// since the previous dump are written.
    pub fn dump(&mut self, model: &Model, timestamp: u64) -> Result<(), Whatever> {
        let Some(inner) = &mut self.inner else {
            return Ok(());
        };
        let current: Vec<u64> = model
            .netlist()
            .signals()
            .map(|(id, _)| model.value(id).unwrap_or(0))
            .collect();

        let changed: Vec<usize> = match &inner.last {
            Some(last) => (0..current.len())
                .filter(|&index| last[index] != current[index])
                .collect(),
            None => (0..current.len()).collect(),
        };
        if changed.is_empty() && inner.last.is_some() {
            return Ok(());
        }

        let writer = inner.writer.as_mut();
        writeln!(writer, "#{}", timestamp)
            .whatever_context("Failed to write VCD timestamp")?;
        let first = inner.last.is_none();
        if first {
            writeln!(writer, "$dumpvars")
                .whatever_context("Failed to write VCD value")?;
        }
        for index in changed {
            write_value(
                writer,
                inner.widths[index],
                current[index],
                &inner.codes[index],
            )
            .whatever_context("Failed to write VCD value")?;
        }
        if first {
            writeln!(writer, "$end")
                .whatever_context("Failed to write VCD value")?;
        }
        inner.last = Some(current);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Whatever> {
        if let Some(inner) = &mut self.inner {
            inner
                .writer
                .flush()
                .whatever_context("Failed to flush VCD")?;
        }
        Ok(())
    }

    /// The VCD is flushed when dropped, but calling this reports failures.
    pub fn close(mut self) -> Result<(), Whatever> {
        self.flush()?;
        self.inner = None;
        Ok(())
    }
}

impl Drop for Vcd {
    fn drop(&mut self) {
        if let Some(inner) = &mut self.inner {
            let _ = inner.writer.flush();
        }
    }
}
