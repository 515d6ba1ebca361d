//! Map input vectors read from stdin to random Fourier features.
//!
//! ```bash
//! echo "0.5 -1.0 2.0" | cargo run -p fourier --bin rff -- --config rff.json
//! ```
//!
//! One whitespace-separated vector per line in, one feature vector per line out.

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fourier::{params, MapperConfig, RandomFourierFeatures};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "rff")]
#[command(about = "Random Fourier feature map over stdin vectors")]
struct Args {
    /// JSON mapper config (input_dims, output_dims, sigma, ...).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load W and b from a parameter file instead of sampling them.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Write the parameters in use to this file.
    #[arg(long)]
    save_params: Option<PathBuf>,

    /// Seed overriding the config's.
    #[arg(long)]
    seed: Option<u64>,
}

fn build_mapper(args: &Args) -> Result<RandomFourierFeatures> {
    if let Some(path) = &args.params {
        let mapper = params::load(path).with_context(|| format!("loading {}", path.display()))?;
        if args.config.is_some() {
            warn!("--params given; config dimensions and initializers are ignored");
        }
        return Ok(mapper);
    }
    let Some(path) = &args.config else {
        bail!("either --config or --params is required");
    };
    let mut cfg = MapperConfig::load(path).with_context(|| format!("reading {}", path.display()))?;
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    if cfg.seed.is_none() {
        warn!("no seed configured; parameters will not be reproducible");
    }
    Ok(RandomFourierFeatures::from_config(&cfg)?)
}

fn parse_line(line: &str, lineno: usize) -> Result<Vec<f32>> {
    line.split_whitespace()
        .map(|tok| {
            tok.parse::<f32>()
                .with_context(|| format!("line {lineno}: cannot parse {tok:?} as a number"))
        })
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mapper = build_mapper(&args)?;
    info!(
        name = mapper.name(),
        input_dims = mapper.input_dims(),
        output_dims = mapper.output_dims(),
        "mapper ready"
    );

    if let Some(path) = &args.save_params {
        params::save(&mapper, path).with_context(|| format!("writing {}", path.display()))?;
    }

    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());
    let mut rows = 0usize;
    for (i, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let x = parse_line(&line, i + 1)?;
        let z = mapper.forward(&x).with_context(|| format!("line {}", i + 1))?;
        let text: Vec<String> = z.iter().map(|v| format!("{v:.6}")).collect();
        writeln!(out, "{}", text.join(" "))?;
        rows += 1;
    }
    out.flush()?;
    info!(rows, "done");
    Ok(())
}
