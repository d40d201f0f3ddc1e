//! `awkvm`: assemble, list, verify and run AWK bytecode programs
//!
//! Program files are either assembly text or binary programs; binaries are
//! recognized by their magic number.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use awkvm_runtime::{VMConfig, Value, VM};
use awkvm_spec::Program;

#[derive(Parser, Debug)]
#[command(name = "awkvm", version, about = "AWK bytecode toolchain")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a text program into a binary program
    Asm {
        source: PathBuf,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the listing of a program
    Disasm { file: PathBuf },

    /// Check a program's streams without running it
    Verify { file: PathBuf },

    /// Run a program over input files (standard input when none are given)
    Run {
        file: PathBuf,

        inputs: Vec<PathBuf>,

        /// Assign a variable before the program starts
        #[arg(short = 'v', value_name = "NAME=VALUE")]
        assign: Vec<String>,

        /// Instruction budget
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Log every executed instruction
        #[arg(long)]
        trace: bool,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn load_program(path: &Path) -> Result<Program> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if Program::is_binary(&bytes) {
        return Program::from_bytes(&bytes).with_context(|| format!("Failed to load {}", path.display()));
    }
    let source = String::from_utf8(bytes).with_context(|| format!("{} is not UTF-8 text", path.display()))?;
    awkvm_assembler::assemble(&source).with_context(|| format!("Failed to assemble {}", path.display()))
}

fn open_input(path: &Path) -> Result<(String, Box<dyn BufRead>)> {
    let name = path.display().to_string();
    if name == "-" {
        return Ok((name, Box::new(io::stdin().lock())));
    }
    let file = File::open(path).with_context(|| format!("Failed to open input {}", name))?;
    Ok((name, Box::new(BufReader::new(file))))
}

fn run(file: &Path, inputs: &[PathBuf], assign: &[String], config: VMConfig) -> Result<i32> {
    let program = Arc::new(load_program(file)?);
    let mut vm = VM::new(program, config).context("Program rejected")?;

    for assignment in assign {
        let Some((name, value)) = assignment.split_once('=') else {
            bail!("Expected NAME=VALUE, got {:?}", assignment);
        };
        vm.assign_global(name, Value::StrNum(value.to_string()))
            .with_context(|| format!("Cannot assign {}", name))?;
    }

    let sources = if inputs.is_empty() {
        vec![open_input(Path::new("-"))?]
    } else {
        inputs.iter().map(|path| open_input(path)).collect::<Result<Vec<_>>>()?
    };

    let result = vm.run_inputs(sources)?;
    info!(cycles = result.cycles, records = result.records, status = result.exit_status, "finished");
    Ok(result.exit_status)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match cli.command {
        Command::Run { trace: true, .. } => cli.verbose.max(2),
        _ => cli.verbose,
    };
    init_logging(verbose);

    match cli.command {
        Command::Asm { source, output } => {
            let program = load_program(&source)?;
            let bytes = program.to_bytes().context("Failed to encode program")?;
            fs::write(&output, bytes).with_context(|| format!("Failed to write {}", output.display()))?;
            info!(output = %output.display(), "assembled");
        }
        Command::Disasm { file } => {
            let program = load_program(&file)?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            awkvm_disassembler::disassemble_to(&program, &mut out)?;
            out.flush()?;
        }
        Command::Verify { file } => {
            let program = load_program(&file)?;
            awkvm_disassembler::verify(&program).with_context(|| format!("{} failed verification", file.display()))?;
            print!("{}", program);
            println!("{}: ok", file.display());
        }
        Command::Run { file, inputs, assign, max_cycles, trace } => {
            let mut config = VMConfig { trace: trace || cli.verbose >= 2, ..VMConfig::default() };
            if let Some(max_cycles) = max_cycles {
                config.max_cycles = max_cycles;
            }
            let status = run(&file, &inputs, &assign, config)?;
            process::exit(status);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_and_assignments_are_separate_flags() {
        let cli = Cli::try_parse_from(["awkvm", "-vv", "run", "-v", "n=3", "prog.s", "a.txt"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run { file, inputs, assign, max_cycles, trace } => {
                assert_eq!(file, PathBuf::from("prog.s"));
                assert_eq!(inputs, vec![PathBuf::from("a.txt")]);
                assert_eq!(assign, vec!["n=3".to_string()]);
                assert_eq!(max_cycles, None);
                assert!(!trace);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_program_text_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("prog.s");
        fs::write(&text, "BEGIN:\n Str \"hi\"\n Print 1\n").unwrap();
        let program = load_program(&text).unwrap();

        let binary = dir.path().join("prog.awkb");
        fs::write(&binary, program.to_bytes().unwrap()).unwrap();
        assert_eq!(load_program(&binary).unwrap(), program);
    }

    #[test]
    fn test_load_program_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("bad.s");
        fs::write(&text, "BEGIN:\n Bogus 1\n").unwrap();
        let err = load_program(&text).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to assemble"), "{:#}", err);
    }

    #[test]
    fn test_run_rejects_malformed_assignment() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("prog.s");
        fs::write(&text, "BEGIN:\n Nop\n").unwrap();
        let err = run(&text, &[], &["novalue".to_string()], VMConfig::default()).unwrap_err();
        assert!(err.to_string().contains("NAME=VALUE"));
    }
}
