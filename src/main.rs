//! nest-hl - highlight Nest and C sources from the command line
//!
//! Reads a file (or stdin), highlights it with a named grammar or by
//! auto-detection, and prints HTML, ANSI-colored text or a span dump.

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nest_hl::config::Config;
use nest_hl::error::{HighlightError, Result};
use nest_hl::syntax::{render, Format, Registry};

/// Parsed command line
#[derive(Debug, Default)]
struct Args {
    lang: Option<String>,
    format: Option<Format>,
    config: Option<PathBuf>,
    grammars: Vec<PathBuf>,
    input: Option<PathBuf>,
    list: bool,
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut raw = env::args().skip(1);
    let mut args = Args::default();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-V" => {
                print_version();
                return Ok(());
            }
            "--lang" | "-l" => args.lang = Some(value(&mut raw, &arg)?),
            "--format" | "-f" => {
                let name = value(&mut raw, &arg)?;
                let format = Format::from_name(&name)
                    .ok_or_else(|| HighlightError::Usage(format!("unknown format: {}", name)))?;
                args.format = Some(format);
            }
            "--config" | "-c" => args.config = Some(PathBuf::from(value(&mut raw, &arg)?)),
            "--grammar" | "-g" => args.grammars.push(PathBuf::from(value(&mut raw, &arg)?)),
            "--list" => args.list = true,
            "--verbose" | "-v" => args.verbose = true,
            "-" => args.input = None,
            other if other.starts_with('-') => {
                return Err(HighlightError::Usage(format!("unknown option: {}", other)));
            }
            path => args.input = Some(PathBuf::from(path)),
        }
    }

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    init_logging(if args.verbose { "debug" } else { &config.log_level });

    let registry = Registry::with_builtin()?.with_limits(config.limits());
    if let Some(dir) = &config.grammar_dir {
        let loaded = registry.load_dir(dir)?;
        debug!(dir = %dir.display(), loaded, "loaded grammar directory");
    }
    for path in &args.grammars {
        registry.load_file(path)?;
    }

    if args.list {
        for name in registry.names() {
            let aliases = registry.list_aliases(&name)?;
            if aliases.is_empty() {
                println!("{}", name);
            } else {
                println!("{} ({})", name, aliases.join(", "));
            }
        }
        return Ok(());
    }

    let text = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    let highlighted = match &args.lang {
        Some(lang) => registry.highlight(&text, Some(lang))?,
        None => {
            let detected = registry.highlight_auto(&text)?;
            debug!(
                language = %detected.language,
                second_best = ?detected.second_best,
                "auto-detected language"
            );
            detected.result
        }
    };

    let format = args.format.unwrap_or(config.format);
    let output = render(format, &text, &highlighted)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if format == Format::Spans {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    Ok(())
}

/// Take the value following an option
fn value(raw: &mut impl Iterator<Item = String>, option: &str) -> Result<String> {
    raw.next()
        .ok_or_else(|| HighlightError::Usage(format!("{} needs a value", option)))
}

/// Log to stderr; `RUST_LOG` overrides the configured level
fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

fn print_usage() {
    println!("nest-hl {} - syntax highlighting for Nest and C", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: nest-hl [OPTIONS] [FILE]");
    println!();
    println!("Reads FILE, or standard input when FILE is missing or '-'.");
    println!();
    println!("Options:");
    println!("  -l, --lang NAME      Grammar to use (default: auto-detect)");
    println!("  -f, --format FMT     Output format: html, ansi or spans");
    println!("  -c, --config FILE    Read settings from FILE instead of ~/.nest-hl.conf");
    println!("  -g, --grammar FILE   Load an extra TOML or JSON grammar (repeatable)");
    println!("      --list           List available grammars and exit");
    println!("  -v, --verbose        Log debug output to stderr");
    println!("  -h, --help           Show this help message");
    println!("  -V, --version        Show version information");
}

fn print_version() {
    println!("nest-hl {}", env!("CARGO_PKG_VERSION"));
}
