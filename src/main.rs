use std::path::PathBuf;
use std::process::exit;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use augscript::source::Augtool;
use augscript::{generate_script, Config, ScriptError};

/// Generate an augtool script of set-commands that rebuilds a file, with
/// positional selectors replaced by content-based path predicates.
#[derive(Parser)]
#[command(name = "augscript", version, about)]
struct Cli {
    /// Use this filename in the output set-commands; also selects the
    /// default lens (must be an absolute path)
    #[arg(long, value_name = "PATH")]
    target: Option<String>,

    /// Parse with this lens, overriding the default and --target
    #[arg(long, value_name = "MODULE")]
    lens: Option<String>,

    /// Additional module search path for the parser
    #[arg(long, value_name = "DIR")]
    loadpath: Option<String>,

    /// Pad predicate values into columns and separate blocks with blank
    /// lines
    #[arg(long)]
    pretty: bool,

    /// Match values with regexp() bodies of at least N characters instead
    /// of literals
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "8"
    )]
    regexp: Option<usize>,

    /// Emit /*/ instead of /seq::*/ (for parsers without seq support)
    #[arg(long)]
    noseq: bool,

    /// Echo the raw path/value pairs as # comments
    #[arg(short, long)]
    verbose: bool,

    /// File to analyse (absolute, or relative to the current directory)
    file: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    if let Err(err) = run(Cli::parse()) {
        eprintln!("{:#}", err);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(target) = &cli.target {
        if !target.starts_with('/') {
            bail!(ScriptError::TargetNotAbsolute(target.clone()));
        }
    }
    let input = if cli.file.is_absolute() {
        cli.file.clone()
    } else {
        std::env::current_dir()?.join(&cli.file)
    };

    let cfg = Config {
        pretty: cli.pretty,
        regexp: cli.regexp,
        noseq: cli.noseq,
        verbose: cli.verbose,
    };

    let mut tool = Augtool::new(cli.loadpath.clone(), cli.lens.is_none());

    let mut lens = cli.lens.clone();
    if lens.is_none() {
        if let Some(target) = &cli.target {
            let lenses = tool
                .infer_lens(target)
                .with_context(|| format!("inferring the lens for {}", target))?;
            match lenses.split_first() {
                None => bail!(ScriptError::NoLensApplies(target.clone())),
                Some((first, rest)) => {
                    if !rest.is_empty() {
                        tracing::warn!(
                            lens = %first,
                            "multiple lenses apply to {}; using the first",
                            target
                        );
                    }
                    lens = Some(first.clone());
                }
            }
        }
    }

    if let Some(lens) = &lens {
        // When a target was given the transform was only looked up, so the
        // header is informational; otherwise it is part of the script.
        match &cli.target {
            Some(target) => {
                if cli.verbose {
                    println!("transform {} incl {}", lens, target);
                }
            }
            None => println!("transform {} incl {}", lens, input.display()),
        }
        tool.transform(lens, &input);
    }
    tool.load_file(&input);
    if let Some(target) = &cli.target {
        tool.mv(
            &format!("/files{}", input.display()),
            &format!("/files{}", target),
        );
    }
    let pairs = tool.dump(&input)?;
    print!("{}", generate_script(pairs, &cfg));
    Ok(())
}
