use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hasse::store::files;
use hasse::{
    Census, CensusConfig, ClassCount, ClassRepresentatives, CpuEvaluator, Curve,
    EquivalenceStore, FieldTable, ReductionTable,
};

#[derive(Parser, Debug)]
#[command(name = "hasse", about = "Hyperelliptic curve census over finite fields")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full census as described by a YAML configuration file.
    Run {
        /// Run configuration (prime, genus, package size, result dir, ...).
        config: PathBuf,
    },
    /// Count a single curve and print its invariants.
    Single {
        /// Field characteristic.
        #[arg(long)]
        prime: u64,
        /// Prime exponent of the field the curve is defined over.
        #[arg(long, default_value_t = 1)]
        prime_exponent: usize,
        /// Coefficients of f(x) as prime-subfield values, low to high.
        coefficients: Vec<u64>,
    },
    /// Fold the unmerged result files of a directory into one artifact.
    Merge {
        /// Directory holding per-block result files.
        result_dir: PathBuf,
        /// Output file for the merged store.
        output: PathBuf,
        /// Merge representative stores instead of count stores.
        #[arg(long)]
        representatives: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_census(config)?,
        Commands::Single {
            prime,
            prime_exponent,
            coefficients,
        } => run_single(prime, prime_exponent, &coefficients)?,
        Commands::Merge {
            result_dir,
            output,
            representatives,
        } => run_merge(result_dir, output, representatives)?,
    }

    Ok(())
}

fn run_census(config_path: PathBuf) -> Result<()> {
    let config = CensusConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration {}", config_path.display()))?;
    let report = Census::new(config)?.run().context("census failed")?;

    println!(
        "{} classes from {} curves ({} blocks assigned, {} skipped)",
        report.classes, report.curves, report.assigned_blocks, report.skipped_blocks
    );
    println!("master store: {}", report.master_file.display());
    Ok(())
}

fn run_single(prime: u64, prime_exponent: usize, coefficients: &[u64]) -> Result<()> {
    let field = Arc::new(
        FieldTable::new(prime, prime_exponent)
            .with_context(|| format!("cannot build GF({prime}^{prime_exponent})"))?,
    );
    let mut curve = Curve::from_subfield_values(Arc::clone(&field), coefficients)
        .context("invalid coefficient vector")?;
    println!("{curve}");

    let native = field.prime_exponent();
    let genus = curve.genus();
    let tables = (1..=genus.max(1))
        .map(|k| ReductionTable::new(&field, k * native))
        .collect::<Result<Vec<_>, _>>()
        .context("cannot build reduction tables")?;

    let counts = curve.count_tower(&tables, &CpuEvaluator)?;
    for (table, (unramified, ramified)) in tables.iter().zip(&counts) {
        println!(
            "GF({}^{}): {} unramified, {} ramified",
            prime,
            table.level(),
            unramified,
            ramified
        );
    }

    let offsets = curve.hasse_weil_offsets(genus.max(1) * native)?;
    println!(
        "hasse-weil offsets: {}",
        offsets
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    );

    if curve.is_squarefree(&tables[0])? {
        let ramification = curve.ramification_type(&tables[0])?;
        println!(
            "ramification type: {}",
            ramification
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
    } else {
        println!("right-hand side is not squarefree; the affine model is singular");
    }

    if genus == 2 {
        let (c3, c2) = curve.weil_coefficients()?;
        println!("weil polynomial: x^4 + {c3}*x^3 + {c2}*x^2 + ...");
    }
    Ok(())
}

fn run_merge(result_dir: PathBuf, output: PathBuf, representatives: bool) -> Result<()> {
    let (classes, curves, files_merged) = if representatives {
        let (store, files_merged): (EquivalenceStore<ClassRepresentatives>, _) =
            files::merge_directory(&result_dir)
                .with_context(|| format!("merge of {} failed", result_dir.display()))?;
        files::write_store(&output, &store)?;
        (store.len(), store.total_count(), files_merged)
    } else {
        let (store, files_merged): (EquivalenceStore<ClassCount>, _) =
            files::merge_directory(&result_dir)
                .with_context(|| format!("merge of {} failed", result_dir.display()))?;
        files::write_store(&output, &store)?;
        (store.len(), store.total_count(), files_merged)
    };

    println!(
        "merged {files_merged} result files: {classes} classes, {curves} curves -> {}",
        output.display()
    );
    Ok(())
}
