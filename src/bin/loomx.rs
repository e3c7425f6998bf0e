//! Command line front end over the loom module pipeline

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use const_format::formatcp;
use intern_all::{Tok, i};
use itertools::Itertools;
use loomlang::analysis::analyze;
use loomlang::error::Reporter;
use loomlang::facade::Compiler;
use loomlang::load::DEFAULT_SUFFIX;
use loomlang::load::fs::FsLocation;
use loomlang::load::load_path::LoadPath;
use loomlang::memory::spaces;
use loomlang::scope::graph::ScopeGraph;
use loomlang::scope::resolve::visible_symbols;

const ABOUT: &str =
  formatcp!("Compiler and inspector for loom modules ({DEFAULT_SUFFIX} files)");

#[derive(Parser, Debug)]
#[command(version, about = ABOUT, long_about = None)]
struct Args {
  /// Directory to serve modules from; repeat for more, highest priority
  /// first
  #[arg(short, long, default_value = ".")]
  dir: Vec<String>,
  /// Do not serve the embedded standard modules
  #[arg(long)]
  no_std: bool,
  /// Load with the concurrent loader
  #[arg(long)]
  parallel: bool,
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Run the entry modules through the whole pipeline and report errors
  Check {
    /// Entry module paths
    entries: Vec<String>,
    /// Substitute empty stand-ins for missing modules and report every
    /// error instead of stopping at the first
    #[arg(long)]
    recovery: bool,
  },
  /// Print the names visible in the body of each entry module
  Symbols {
    /// Entry module paths
    entries: Vec<String>,
  },
  /// Print what each entry module exports
  Exports {
    /// Entry module paths
    entries: Vec<String>,
  },
  /// Print per-module load and parse timings
  Timings {
    /// Entry module paths
    entries: Vec<String>,
  },
}

fn main() -> ExitCode {
  let args = Args::parse();
  let mut load_path = LoadPath::new();
  for dir in &args.dir {
    load_path = load_path.and(FsLocation::new(dir).build());
  }
  if !args.no_std {
    load_path = load_path.and_std();
  }
  let compiler = Compiler::new(load_path).parallel(args.parallel);
  match &args.command {
    Command::Check { entries, recovery } => check(&compiler, entries, *recovery),
    Command::Symbols { entries } => symbols(&compiler, entries),
    Command::Exports { entries } => exports(&compiler, entries),
    Command::Timings { entries } => timings(&compiler, entries),
  }
}

/// The canonical keys the entry paths resolve to, for printing
fn entry_keys(compiler: &Compiler, entries: &[String]) -> Vec<Tok<String>> {
  (entries.iter())
    .filter_map(|path| compiler.load_path().resolve_entry(path))
    .map(|resolved| i(&resolved.path))
    .collect()
}

fn as_strs(entries: &[String]) -> Vec<&str> { entries.iter().map(String::as_str).collect() }

fn check(compiler: &Compiler, entries: &[String], recovery: bool) -> ExitCode {
  if !recovery {
    return match compiler.compile(&as_strs(entries)) {
      Ok(rs) => {
        println!("ok: {} modules, {} cells", rs.analysis.units.len(), rs.cell_count());
        ExitCode::SUCCESS
      },
      Err(e) => {
        eprintln!("{e}");
        ExitCode::FAILURE
      },
    };
  }
  let (mut set, _, mut errors) = match compiler.load_recovery(&as_strs(entries)) {
    Ok(loaded) => loaded,
    Err(e) => {
      eprintln!("{e}");
      return ExitCode::FAILURE;
    },
  };
  let mut graph = ScopeGraph::new();
  let reporter = Reporter::new();
  analyze(&mut set, &mut graph, &reporter);
  errors.extend(reporter.into_errors());
  if errors.is_empty() {
    println!("ok: {} modules", set.units.len());
    return ExitCode::SUCCESS;
  }
  for err in &errors {
    eprintln!("{err}");
  }
  eprintln!("{} errors across {} modules", errors.len(), set.units.len());
  ExitCode::FAILURE
}

fn symbols(compiler: &Compiler, entries: &[String]) -> ExitCode {
  let rs = match compiler.compile(&as_strs(entries)) {
    Ok(rs) => rs,
    Err(e) => {
      eprintln!("{e}");
      return ExitCode::FAILURE;
    },
  };
  for key in entry_keys(compiler, entries) {
    println!("{key}:");
    let Some(scope) = rs.graph.module_scope_of_unit(&key) else { continue };
    let visible = (visible_symbols(&rs.graph, scope).into_iter())
      .sorted_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
    for (name, sym) in visible {
      println!("  {name}: {}", rs.graph.describe(sym));
    }
  }
  ExitCode::SUCCESS
}

fn exports(compiler: &Compiler, entries: &[String]) -> ExitCode {
  let rs = match compiler.compile(&as_strs(entries)) {
    Ok(rs) => rs,
    Err(e) => {
      eprintln!("{e}");
      return ExitCode::FAILURE;
    },
  };
  for key in entry_keys(compiler, entries) {
    println!("{key}:");
    for (name, cell) in spaces::exports(&rs, &key) {
      match rs.literal(cell) {
        Some(lit) => println!("  {name} = {lit}"),
        None => println!("  {name}: {}", rs.graph.describe(rs.cell(cell).symbol)),
      }
    }
  }
  ExitCode::SUCCESS
}

fn timings(compiler: &Compiler, entries: &[String]) -> ExitCode {
  let (set, _) = match compiler.load(&as_strs(entries)) {
    Ok(loaded) => loaded,
    Err(e) => {
      eprintln!("{e}");
      return ExitCode::FAILURE;
    },
  };
  for key in set.sorted_keys() {
    let unit = &set.units[&key];
    println!(
      "{key}: parse {:?}, load {:?}, with imports {:?}",
      unit.parse_duration, unit.load_duration, unit.total_load_duration
    );
  }
  ExitCode::SUCCESS
}
