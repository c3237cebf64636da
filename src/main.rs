use clap::{Parser, Subcommand};
use passrec::audit::{audit_lines, summarize};
use passrec::config::EngineOptions;
use passrec::record::Engine;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passrec", about = "Create and check password hash records")]
struct Cli {
    /// Engine options as JSON (default algorithm, salt size, lanes)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password and print the record
    Hash {
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Check a password against a record (exit 0 valid, 1 invalid)
    Verify {
        record: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Report whether a record should be regenerated
    NeedsRehash {
        record: String,
    },
    /// Show the fields of a record
    Info {
        record: String,
    },
    /// Rehash audit over a file with one record per line
    Audit {
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let options = match &cli.config {
        Some(path) => EngineOptions::load(path)?,
        None       => EngineOptions::default(),
    };
    let engine = Engine::from_options(options)?;

    match cli.command {

        // ── Hash ─────────────────────────────────────────────────────────────
        Commands::Hash { password } => {
            let password = read_password(password)?;
            println!("{}", engine.hash(password.as_bytes())?);
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { record, password } => {
            let password = read_password(password)?;
            if engine.verify_hash(&record, password.as_bytes())? {
                println!("valid");
            } else {
                println!("invalid");
                return Ok(ExitCode::from(1));
            }
        }

        // ── NeedsRehash ──────────────────────────────────────────────────────
        Commands::NeedsRehash { record } => {
            let stale = engine.needs_rehash(&record)?;
            println!("{}", if stale { "yes" } else { "no" });
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { record } => {
            let parsed = engine.parse(&record)?;
            let configured = parsed.algorithm.configure(
                parsed.params,
                passrec::record::PARAMETER_SEPARATOR,
                u32::from(parsed.hash_size),
            );
            println!("── Hash record ──────────────────────────────────────────");
            println!("  Algorithm      {}", parsed.algorithm_id());
            println!("  Parameters     {}", parsed.params);
            match configured {
                Ok(alg) => println!("  Configuration  {}", alg.describe()),
                Err(e)  => println!("  Configuration  invalid ({e})"),
            }
            println!("  Key length     {} B", parsed.hash_size);
            println!("  Salt           {} ({} B)", hex::encode(&parsed.salt), parsed.salt.len());
            println!("  Needs rehash   {}", engine.needs_rehash(&record)?);
        }

        // ── Audit ────────────────────────────────────────────────────────────
        Commands::Audit { input } => {
            let text = std::fs::read_to_string(&input)?;
            let entries = audit_lines(&engine, &text);
            for entry in &entries {
                match &entry.outcome {
                    Ok(true)  => println!("{:>6}  rehash", entry.line),
                    Ok(false) => {}
                    Err(e)    => println!("{:>6}  error: {e}", entry.line),
                }
            }
            let s = summarize(&entries);
            println!(
                "{} record(s): {} current, {} need rehash, {} unreadable",
                s.total, s.current, s.stale, s.malformed,
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "passrec=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Use the flag if given, otherwise the first line of stdin.
fn read_password(flag: Option<String>) -> io::Result<String> {
    if let Some(pwd) = flag {
        return Ok(pwd);
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
