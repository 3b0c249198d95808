mod analyzer;
mod bytecode;
mod classfile;
mod config;
mod deps;
mod descriptor;
mod generator;
mod glob;
mod ir;
mod jar;
mod opcodes;
mod promote;
mod references;
mod rename;
mod replace;
mod scan;
mod signature;
mod stub;
#[cfg(test)]
mod testing;
mod type_refs;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};

use crate::analyzer::Analyzer;
use crate::config::CreateInfo;
use crate::deps::{dependency_report, write_json, write_text};
use crate::descriptor::binary_name;
use crate::generator::Generator;
use crate::jar::write_jar;
use crate::scan::scan_inputs;
use crate::stub::{stub_classes, stub_path};

/// CLI arguments for layoutlib-create.
#[derive(Parser, Debug)]
#[command(
    name = "layoutlib-create",
    about = "Builds a layoutlib JAR from Android framework JARs by keeping the classes reachable \
             from configured roots and rewriting them to run outside the device runtime.",
    version
)]
struct Cli {
    /// Log every decision at debug level.
    #[arg(short, long)]
    verbose: bool,
    /// TOML file replacing the built-in layoutlib configuration.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Also write `<output>-stubs.<ext>` with API-only copies of the classes.
    #[arg(long)]
    create_stub: bool,
    /// Report, per input JAR, the classes it uses but does not define.
    #[arg(long, conflicts_with_all = ["missing_deps", "create_stub"])]
    list_deps: bool,
    /// Like --list-deps, limited to classes no input defines.
    #[arg(long, conflicts_with = "create_stub")]
    missing_deps: bool,
    /// Print the dependency report as JSON.
    #[arg(long)]
    json: bool,
    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
    /// `<output.jar> <input.jar>...`, or only input JARs with --list-deps and
    /// --missing-deps.
    #[arg(value_name = "JAR")]
    paths: Vec<PathBuf>,
}

impl Cli {
    fn reports_dependencies(&self) -> bool {
        self.list_deps || self.missing_deps
    }

    fn check_usage(&self) -> std::result::Result<(), clap::Error> {
        let mut command = Cli::command();
        if self.print_config {
            return Ok(());
        }
        if self.json && !self.reports_dependencies() {
            return Err(command.error(
                ErrorKind::ArgumentConflict,
                "--json requires --list-deps or --missing-deps",
            ));
        }
        let required = if self.reports_dependencies() { 1 } else { 2 };
        if self.paths.len() < required {
            let message = if self.reports_dependencies() {
                "expected at least one <input.jar>"
            } else {
                "expected <output.jar> followed by at least one <input.jar>"
            };
            return Err(command.error(ErrorKind::MissingRequiredArgument, message));
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return usage_exit(err),
    };
    if let Err(err) = cli.check_usage() {
        return usage_exit(err);
    }
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `--help` and `--version` succeed; every other parse error fails with 1.
fn usage_exit(err: clap::Error) -> ExitCode {
    let _ = err.print();
    if err.use_stderr() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let info = CreateInfo::load(cli.config.as_deref())?;
    if cli.print_config {
        let text = toml::to_string_pretty(&info).context("failed to serialize configuration")?;
        io::stdout()
            .write_all(text.as_bytes())
            .context("failed to write configuration")?;
        return Ok(ExitCode::SUCCESS);
    }
    if cli.reports_dependencies() {
        return report_dependencies(&cli);
    }

    let (output, inputs) = cli
        .paths
        .split_first()
        .context("missing output path")?;
    check_inputs(inputs)?;
    let report = create_layoutlib(&info, output, inputs, cli.create_stub)?;
    Ok(report.log())
}

fn check_inputs(inputs: &[PathBuf]) -> Result<()> {
    for input in inputs {
        if !input.exists() {
            anyhow::bail!("input not found: {}", input.display());
        }
    }
    Ok(())
}

/// Findings of a layoutlib run, in binary class names.
#[derive(Debug, Default)]
struct RunReport {
    /// Reasons the run failed; nothing was written when non-empty.
    problems: Vec<String>,
    /// Referenced classes no input JAR defines, sorted.
    missing: Vec<String>,
}

impl RunReport {
    fn log(&self) -> ExitCode {
        for problem in &self.problems {
            error!("{problem}");
        }
        if !self.missing.is_empty() {
            warn!(
                "{} referenced classes were not found in any input JAR:",
                self.missing.len()
            );
            for name in &self.missing {
                info!("    {name}");
            }
        }
        if self.problems.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn create_layoutlib(
    info: &CreateInfo,
    output: &Path,
    inputs: &[PathBuf],
    create_stub: bool,
) -> Result<RunReport> {
    let started_at = Instant::now();
    let scan = scan_inputs(inputs)?;
    info!(
        "read {} classes from {} input JARs",
        scan.class_count,
        inputs.len()
    );
    let analysis = Analyzer::new(info)?.analyze(scan)?;
    for pattern in &analysis.unmatched_globs {
        warn!("include pattern {pattern} matched no class");
    }
    let generated = Generator::new(info)?.generate(&analysis)?;

    let mut report = RunReport {
        missing: analysis.missing.iter().map(|name| binary_name(name)).collect(),
        ..RunReport::default()
    };
    for root in &analysis.unresolved_roots {
        report.problems.push(format!(
            "derived-from class {} is not in any input JAR",
            binary_name(root)
        ));
    }
    for source in &generated.classes_not_renamed {
        report.problems.push(format!(
            "class {} was never renamed: it is not among the kept classes",
            binary_name(source)
        ));
    }
    if !report.problems.is_empty() {
        return Ok(report);
    }

    write_jar(output, &generated.entries())?;

    if create_stub {
        let stubs = stub_classes(&generated.classes, info.stub_prefix())?;
        let entries: BTreeMap<&str, &[u8]> = stubs
            .iter()
            .map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
            .collect();
        write_jar(&stub_path(output), &entries)?;
    }

    info!(
        "kept {} classes in {} ms",
        analysis.kept_count(),
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn report_dependencies(cli: &Cli) -> Result<ExitCode> {
    check_inputs(&cli.paths)?;
    let scan = scan_inputs(&cli.paths)?;
    let report = dependency_report(&scan, cli.missing_deps)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        write_json(&report, &mut out)?;
    } else {
        write_text(&report, &mut out)?;
    }
    Ok(ExitCode::SUCCESS)
}
