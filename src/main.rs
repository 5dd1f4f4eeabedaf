use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use form_schema_compiler::{
    build_schema_package, build_schema_packages, BatchOptions, BuildOptions, StorageLimits,
};

#[derive(Parser)]
#[command(name = "formc")]
#[command(author, version, about = "Compile XForm definitions into relational schema packages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Copy)]
struct LimitArgs {
    /// Maximum data columns per table
    #[arg(long, default_value_t = 1000)]
    max_columns: usize,

    /// Maximum table name length
    #[arg(long, default_value_t = 64)]
    max_table_name_len: usize,

    /// Maximum column name length
    #[arg(long, default_value_t = 64)]
    max_column_name_len: usize,
}

impl From<LimitArgs> for StorageLimits {
    fn from(args: LimitArgs) -> Self {
        StorageLimits {
            max_table_name_len: args.max_table_name_len,
            max_column_name_len: args.max_column_name_len,
            max_data_columns: args.max_columns,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one XForm file into a schema package
    Compile {
        /// Path to the XForm file
        #[arg(short, long)]
        form: PathBuf,

        /// Output path for the package (defaults to <form>.schema.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        limits: LimitArgs,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
    /// Compile every matching form under a directory
    Batch {
        /// Directory to search
        #[arg(short, long)]
        dir: PathBuf,

        /// File name pattern
        #[arg(short, long, default_value = "*.xml")]
        pattern: String,

        /// Directory for packages (defaults to next to each form)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        limits: LimitArgs,

        /// Enable verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("form_schema_compiler=debug,formc=debug")
    } else {
        EnvFilter::new("form_schema_compiler=warn,formc=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            form,
            output,
            limits,
            verbose,
        } => {
            init_logging(verbose);
            let options = BuildOptions {
                form_path: form,
                output_path: output,
                limits: limits.into(),
                verbose,
            };

            build_schema_package(options)?;
        }
        Commands::Batch {
            dir,
            pattern,
            output_dir,
            limits,
            verbose,
        } => {
            init_logging(verbose);
            run_batch(BatchOptions {
                dir,
                pattern,
                output_dir,
                limits: limits.into(),
            })?;
        }
    }

    Ok(())
}

fn run_batch(options: BatchOptions) -> Result<()> {
    let results = build_schema_packages(&options)?;

    let mut failures = 0;
    for (path, result) in &results {
        match result {
            Ok(entry) => println!(
                "ok    {}: {} -> {} ({} tables)",
                path.display(),
                entry.form_id,
                entry.package_path.display(),
                entry.tables
            ),
            Err(e) => {
                failures += 1;
                println!("error {}: {:#}", path.display(), e);
            }
        }
    }
    println!("{} compiled, {} failed", results.len() - failures, failures);

    if failures > 0 {
        bail!("{} form(s) failed to compile", failures);
    }
    Ok(())
}
