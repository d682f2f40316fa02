use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use loxi::ast_printer::AstPrinter;
use loxi::diagnostics::DiagnosticSink;
use loxi::error::LoxError;
use loxi::lox::Lox;
use loxi::parser::Parser;
use loxi::scanner::Scanner;
use loxi::token::Token;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Dump the token stream as JSON instead of one token per line
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },
}

/// Maps the script into memory and hands it back as owned text.
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    // Zero-length files cannot be mapped.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is read-only and dropped before this call returns.
    let mmap = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    let source = std::str::from_utf8(&mmap)
        .context(format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // Configure env_logger to write to file with module path and source line
    Builder::new()
        .format(|buf, record| {
            // Strip 'loxi::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("loxi::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Print collected diagnostics and pick the conventional exit code:
/// 70 when any is a runtime failure, 65 otherwise.
fn exit_with(diagnostics: Vec<LoxError>) -> ! {
    let runtime = diagnostics.iter().any(LoxError::is_runtime);

    for diagnostic in &diagnostics {
        eprintln!("{}", diagnostic);
    }

    std::process::exit(if runtime { 70 } else { 65 });
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");

            let source = read_file(&filename)?;
            let mut tokens: Vec<Token> = Vec::new();
            let mut tokenized = true;

            for result in Scanner::new(&source) {
                match result {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);

                        if !json {
                            println!("{}", token);
                        }

                        tokens.push(token);
                    }

                    Err(e) => {
                        tokenized = false;

                        eprintln!("{}", e);
                    }
                }
            }

            if json {
                let dump = serde_json::to_string_pretty(&tokens)
                    .context("Failed to serialize tokens")?;

                println!("{}", dump);
            }

            if !tokenized {
                debug!("Tokenization failed, exiting with code 65");

                std::process::exit(65);
            }

            info!("Tokenization completed successfully");
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");

            let source = read_file(&filename)?;
            let mut sink = DiagnosticSink::new();

            let mut tokens: Vec<Token> = Vec::new();

            for result in Scanner::new(&source) {
                match result {
                    Ok(token) => tokens.push(token),
                    Err(e) => sink.report(e),
                }
            }

            if sink.has_errors() {
                exit_with(sink.take());
            }

            match Parser::new(&tokens, &mut sink).parse_expression() {
                Some(expr) => {
                    info!("Expression parsed successfully");

                    println!("{}", AstPrinter::print(&expr));
                }

                None => exit_with(sink.take()),
            }
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");

            let source = read_file(&filename)?;

            if let Err(diagnostics) = Lox::run(&source) {
                exit_with(diagnostics);
            }

            info!("Program executed successfully");
        }
    }

    Ok(())
}
