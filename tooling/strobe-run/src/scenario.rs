// Copyright (C) 2024 Ethan Uppal.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3 of the License only.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use snafu::{OptionExt, ResultExt, Whatever, whatever};
use strobe_kernel::{KernelOptions, Model, Vcd, WidthViolation};

/// One `[[cycle]]` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub set: Vec<(String, u64)>,
    pub expect: Vec<(String, u64)>,
    pub repeat: usize,
    /// Pulse the scenario clock after driving inputs. When false, or when the
    /// scenario has no clock, the cycle is a single step.
    pub tick: bool,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub path: Utf8PathBuf,
    pub design: String,
    pub clock: Option<String>,
    pub kernel: Option<toml::Value>,
    pub cycles: Vec<Cycle>,
}

fn integer_table(
    value: Option<&toml::Value>,
    key: &str,
) -> Result<Vec<(String, u64)>, Whatever> {
    let Some(value) = value else {
        return Ok(vec![]);
    };
    let Some(table) = value.as_table() else {
        whatever!("`{}` must be a table of port names to integers", key);
    };
    let mut entries = vec![];
    for (name, value) in table {
        let Some(value) = value.as_integer() else {
            whatever!("`{}.{}` must be an integer", key, name);
        };
        if value < 0 {
            whatever!("`{}.{}` must not be negative", key, name);
        }
        entries.push((name.clone(), value as u64));
    }
    Ok(entries)
}

impl Scenario {
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self, Whatever> {
        let document: toml::Value = toml::from_str(contents)
            .whatever_context(format!("Failed to parse {} as TOML", path))?;

        let design = document
            .get("design")
            .and_then(|design| design.as_str())
            .whatever_context(format!(
                "Missing `design` string in scenario {}",
                path
            ))?
            .to_string();

        let clock = match document.get("clock") {
            Some(clock) => Some(
                clock
                    .as_str()
                    .whatever_context("`clock` must be a port name")?
                    .to_string(),
            ),
            None => None,
        };

        let kernel = document.get("kernel").cloned();
        if let Some(kernel) = &kernel {
            KernelOptions::default()
                .apply_toml(kernel)
                .whatever_context(format!("Invalid [kernel] table in {}", path))?;
        }

        let mut cycles = vec![];
        if let Some(entries) = document.get("cycle") {
            let Some(entries) = entries.as_array() else {
                whatever!("`cycle` in {} must be an array of tables", path);
            };
            for (index, entry) in entries.iter().enumerate() {
                let context = format!("cycle {} of {}", index, path);
                let set = integer_table(entry.get("set"), "set")
                    .whatever_context(context.clone())?;
                let expect = integer_table(entry.get("expect"), "expect")
                    .whatever_context(context.clone())?;
                let repeat = match entry.get("repeat") {
                    Some(repeat) => match repeat.as_integer() {
                        Some(repeat) if repeat >= 1 => repeat as usize,
                        _ => whatever!(
                            "`repeat` in {} must be a positive integer",
                            context
                        ),
                    },
                    None => 1,
                };
                let tick = match entry.get("tick") {
                    Some(tick) => tick.as_bool().whatever_context(format!(
                        "`tick` in {} must be a boolean",
                        context
                    ))?,
                    None => true,
                };
                cycles.push(Cycle {
                    set,
                    expect,
                    repeat,
                    tick,
                });
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            design,
            clock,
            kernel,
            cycles,
        })
    }

    pub fn load(path: &Utf8Path) -> Result<Self, Whatever> {
        let contents = fs::read_to_string(path)
            .whatever_context(format!("Failed to read scenario {}", path))?;
        Self::parse(path, &contents)
    }

    /// `base` with this scenario's `[kernel]` overrides applied.
    pub fn options(
        &self,
        base: &KernelOptions,
    ) -> Result<KernelOptions, Whatever> {
        let mut options = base.clone();
        if let Some(kernel) = &self.kernel {
            options.apply_toml(kernel)?;
        }
        Ok(options)
    }

    /// The VCD file name for this scenario when it is the `index`th one in a
    /// run. Scenarios from different directories may share a stem.
    pub fn vcd_file_name(&self, index: usize) -> String {
        format!("{}-{}.vcd", index, self.path.file_stem().unwrap_or("scenario"))
    }

    /// Runs every cycle, dumping each step to a VCD at `vcd_path` when one is
    /// given. Width violations are collected whether or not the run passes.
    pub fn run(
        &self,
        base: &KernelOptions,
        vcd_path: Option<&Utf8Path>,
    ) -> Outcome {
        let options = match self.options(base) {
            Ok(options) => options,
            Err(error) => return Outcome::failed(error),
        };
        let netlist = match strobe_designs::by_name(&self.design)
            .whatever_context(format!("Scenario {} is unusable", self.path))
        {
            Ok(netlist) => netlist,
            Err(error) => return Outcome::failed(error),
        };
        let log = options.log;
        let mut model = Model::new(netlist, options);
        if log {
            log::info!("Running scenario {} on {}", self.path, self.design);
        }

        let result = self.drive(&mut model, vcd_path);
        let width_violations = model.take_width_violations();
        if log {
            for violation in &width_violations {
                log::warn!("{}: {}", self.path, violation);
            }
        }
        Outcome {
            result,
            width_violations,
        }
    }

    fn drive(
        &self,
        model: &mut Model,
        vcd_path: Option<&Utf8Path>,
    ) -> Result<usize, Whatever> {
        let mut vcd = match vcd_path {
            Some(path) => Vcd::create(path, model)?,
            None => Vcd::disabled(),
        };

        let mut time = 0;
        for (index, cycle) in self.cycles.iter().enumerate() {
            for repetition in 0..cycle.repeat {
                let location = if cycle.repeat == 1 {
                    format!("cycle {}", index)
                } else {
                    format!("cycle {} (repetition {})", index, repetition)
                };

                for (port, value) in &cycle.set {
                    model
                        .set_input(port.as_str(), *value)
                        .whatever_context(format!("In {}", location))?;
                }

                match (&self.clock, cycle.tick) {
                    (Some(clock), true) => {
                        for level in [1, 0] {
                            model
                                .set_input(clock.as_str(), level)
                                .whatever_context(format!("In {}", location))?;
                            model
                                .step()
                                .whatever_context(format!("In {}", location))?;
                            vcd.dump(model, time)?;
                            time += 1;
                        }
                    }
                    _ => {
                        model
                            .step()
                            .whatever_context(format!("In {}", location))?;
                        vcd.dump(model, time)?;
                        time += 1;
                    }
                }

                for (signal, expected) in &cycle.expect {
                    let actual = model
                        .peek(signal)
                        .whatever_context(format!("In {}", location))?;
                    if actual != *expected {
                        whatever!(
                            "In {}: expected {} = {:#x}, got {:#x}",
                            location,
                            signal,
                            expected,
                            actual
                        );
                    }
                }
            }
        }

        vcd.close()?;
        Ok(time as usize)
    }
}

/// How a scenario run ended, with every width violation it caused.
#[derive(Debug)]
pub struct Outcome {
    /// The number of steps taken, or why the scenario failed.
    pub result: Result<usize, Whatever>,
    pub width_violations: Vec<WidthViolation>,
}

impl Outcome {
    fn failed(error: Whatever) -> Self {
        Self {
            result: Err(error),
            width_violations: vec![],
        }
    }

    /// `, N width violation(s)` followed by one indented line per violation,
    /// or nothing when the inputs all fit.
    pub fn violation_summary(&self) -> String {
        let count = self.width_violations.len();
        if count == 0 {
            return String::new();
        }
        let mut summary = format!(
            ", {} width violation{}",
            count,
            if count == 1 { "" } else { "s" }
        );
        for violation in &self.width_violations {
            summary.push_str(&format!("\n             {}", violation));
        }
        summary
    }
}
