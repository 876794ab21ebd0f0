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

use std::{env, sync::mpsc, thread::available_parallelism};

use argh::FromArgs;
use camino::Utf8PathBuf;
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use snafu::{ResultExt, Whatever, whatever};
use strobe_kernel::KernelOptions;
use threadpool::ThreadPool;

mod scenario;

use scenario::Scenario;

/// Run simulation scenarios against the built-in Strobe designs
#[derive(FromArgs)]
struct StrobeRunCommand {
    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Run(RunSubcommand),
    List(ListSubcommand),
    Check(CheckSubcommand),
}

/// run scenario files
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunSubcommand {
    /// scenario files or glob patterns
    #[argh(positional)]
    scenarios: Vec<String>,

    /// write one VCD per scenario into this directory
    #[argh(option)]
    vcd: Option<Utf8PathBuf>,

    /// number of worker threads
    #[argh(option, short = 'j')]
    jobs: Option<usize>,

    /// kernel options applied before each scenario's own [kernel] table
    #[argh(option)]
    config: Option<Utf8PathBuf>,
}

/// list the designs scenarios can name
#[derive(FromArgs)]
#[argh(subcommand, name = "list")]
struct ListSubcommand {}

/// parse scenario files without running them
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
struct CheckSubcommand {
    /// scenario files or glob patterns
    #[argh(positional)]
    scenarios: Vec<String>,
}

fn expand(patterns: &[String]) -> Result<Vec<Utf8PathBuf>, Whatever> {
    let mut paths = vec![];
    for pattern in patterns {
        let mut matched = false;
        for entry in glob::glob(pattern)
            .whatever_context(format!("Invalid glob pattern {}", pattern))?
        {
            let path = entry
                .whatever_context(format!("Failed to expand {}", pattern))?;
            let path = Utf8PathBuf::from_path_buf(path)
                .map_err(|_| "?")
                .whatever_context("Failed to parse scenario path as UTF-8")?;
            paths.push(path);
            matched = true;
        }
        if !matched {
            whatever!("No scenario matches {}", pattern);
        }
    }
    Ok(paths)
}

fn run(command: RunSubcommand) -> Result<(), Whatever> {
    let options = match &command.config {
        Some(config) => KernelOptions::load(config)?,
        None => KernelOptions::default(),
    };

    let mut scenarios = vec![];
    for path in expand(&command.scenarios)? {
        scenarios.push(Scenario::load(&path)?);
    }

    let worker_count = command.jobs.filter(|jobs| *jobs > 0).unwrap_or_else(|| {
        available_parallelism()
            .map(|value| value.get())
            .unwrap_or(1)
    });
    let pool = ThreadPool::new(worker_count);

    let scenario_count = scenarios.len();
    println!(
        "{} {} scenario{} across {} thread{}",
        "     STARTING".bold().bright_cyan(),
        scenario_count,
        if scenario_count == 1 { "" } else { "s" },
        worker_count,
        if worker_count == 1 { "" } else { "s" },
    );

    let progress = ProgressBar::new(scenario_count as u64);
    let (tx, rx) = mpsc::channel();

    for (index, scenario) in scenarios.into_iter().enumerate() {
        let tx = tx.clone();
        let options = options.clone();
        let vcd_path = command
            .vcd
            .as_ref()
            .map(|directory| directory.join(scenario.vcd_file_name(index)));
        pool.execute(move || {
            let outcome = scenario.run(&options, vcd_path.as_deref());
            let violations = outcome.violation_summary();
            let result = match outcome.result {
                Ok(steps) => Ok(format!(
                    "         {} [{}] {} step{}{}",
                    "PASS".bold().bright_green(),
                    scenario.path,
                    steps,
                    if steps == 1 { "" } else { "s" },
                    violations.yellow(),
                )),
                Err(error) => Err(format!(
                    "         {} [{}]{}\n{}",
                    "FAIL".bold().bright_red(),
                    scenario.path,
                    violations.yellow(),
                    snafu::Report::from_error(error)
                )),
            };
            let _ = tx.send(result);
        });
    }
    drop(tx);

    let mut failures = 0;
    for _ in 0..scenario_count {
        match rx.recv() {
            Ok(Ok(success)) => progress.println(success),
            Ok(Err(failure)) => {
                failures += 1;
                progress.println(failure);
            }
            Err(error) => {
                failures += 1;
                progress.println(format!(
                    "       {} [<unknown scenario>]: {}",
                    "CLOSED".bold().on_bright_yellow(),
                    error
                ));
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    println!(
        "{} with {} failure{}",
        "     FINISHED".bold().bright_cyan(),
        failures,
        if failures == 1 { "" } else { "s" },
    );

    if failures > 0 {
        whatever!("Exiting due to failure(s)");
    }

    Ok(())
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    if env::var("RUST_LOG").is_ok() {
        env_logger::init();
    }

    let command: StrobeRunCommand = argh::from_env();

    match command.subcommand {
        Subcommand::Run(run_subcommand) => run(run_subcommand),
        Subcommand::List(_list_subcommand) => {
            for name in strobe_designs::names() {
                let netlist = strobe_designs::by_name(name)
                    .whatever_context(format!("Failed to build {}", name))?;
                let ports = netlist
                    .ports()
                    .map(|(port, width, direction)| {
                        format!("{} {}[{}]", direction, port, width)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("{} ({})", name.bold(), ports);
            }
            Ok(())
        }
        Subcommand::Check(check_subcommand) => {
            for path in expand(&check_subcommand.scenarios)? {
                let scenario = Scenario::load(&path)?;
                strobe_designs::by_name(&scenario.design).whatever_context(
                    format!("Scenario {} names an unusable design", path),
                )?;
                println!(
                    "  {} [{}] {} cycle{}",
                    "OK".bold().bright_green(),
                    path,
                    scenario.cycles.len(),
                    if scenario.cycles.len() == 1 { "" } else { "s" },
                );
            }
            println!("Everything looks good!");
            Ok(())
        }
    }
}
