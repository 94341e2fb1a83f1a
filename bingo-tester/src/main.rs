mod logic;
mod scenario;
mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{CardTester, LogicTester, ScenarioResult, resolve_seed_inputs};
use scenario::{TestScenario, list_scenarios, resolve_scenarios};

#[derive(Debug, Parser)]
#[command(name = "bingo-tester", version = "0.1.0")]
#[command(about = "Deterministic scenario runner for the bingo card engine")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for the whole catalog)
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; decimal or 0x-prefixed hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Persist each run's records as JSON files under this directory
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let scenarios = select_scenarios(&args.scenarios);
    let tester = CardTester::new(args.verbose).with_state_dir(args.state_dir.clone());

    let results = run_scenarios(&args, &scenarios, &seeds, tester);
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎯 Bingo Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn select_scenarios(scenarios_arg: &str) -> Vec<TestScenario> {
    let (scenarios, unknown) = resolve_scenarios(&split_csv(scenarios_arg));
    for name in unknown {
        eprintln!("⚠️  Unknown scenario: {}", name.yellow());
    }
    scenarios
}

fn run_scenarios(
    args: &Args,
    scenarios: &[TestScenario],
    seeds: &[u64],
    tester: CardTester,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Card Scenarios".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(tester);
    scenarios
        .iter()
        .flat_map(|scenario| logic_tester.run_scenario(scenario, seeds, args.iterations))
        .collect()
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Bingo Engine Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        "csv" => logic::reports::generate_csv_report(&mut output_target, results)?,
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
