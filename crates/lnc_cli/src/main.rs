//! The lnc command-line front door.
//!
//! `lnc compile <input> [-o <output>]` routes the input through the stage
//! pipeline chosen by the two file extensions. Exit codes follow the
//! compiler contract: 0 success, 1 parse, 2 resolver, 3 emission, 4 I/O.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use lnc_compile::{compile_path, write_artifact};

#[derive(Parser)]
#[command(name = "lnc")]
#[command(about = "Compiler for the LN language", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file; the output extension picks the target stage
    Compile {
        /// Input file (.ln, .amm, or .aga)
        input: PathBuf,

        /// Output file; defaults to the input with the .agc extension
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, output } => match run_compile(&input, output) {
            Ok(path) => {
                println!("wrote {}", path.display());
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{}", err);
                ExitCode::from(err.exit_code() as u8)
            }
        },
    }
}

fn run_compile(
    input: &PathBuf,
    output: Option<PathBuf>,
) -> Result<PathBuf, lnc_base::CompileError> {
    let out_ext = output
        .as_deref()
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .unwrap_or("agc")
        .to_string();
    let (artifact, default_output) = compile_path(input, &out_ext)?;
    let target = output.unwrap_or(default_output);
    write_artifact(&artifact, &target)?;
    Ok(target)
}
