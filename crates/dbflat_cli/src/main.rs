//! DBFlat CLI
//!
//! Command-line tools for DBFlat record files.
//!
//! # Commands
//!
//! - `inspect` - Display headers, vtable slots and tag-walk tuples
//! - `decode` - Decode every field of every record
//! - `encode` - Build a record from a JSON field list
//! - `verify` - Check that every record decodes consistently

mod commands;

use clap::{Parser, Subcommand};
use dbflat_core::Strategy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DBFlat record-file tools.
#[derive(Parser)]
#[command(name = "dbflat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the layout of a record file
    Inspect {
        /// File holding records or a tag-walk stream
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode every field of a record file
    Decode {
        /// File holding records or a tag-walk stream
        file: PathBuf,

        /// JSON schema giving field names and fixed widths
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Encode a JSON field list into a record
    Encode {
        /// JSON array of `{tag, comp_flags, hex | text, hot}` entries
        #[arg(short, long)]
        input: PathBuf,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// Layout strategy (full, hot, tagwalk)
        #[arg(long, default_value = "full")]
        strategy: Strategy,

        /// Align fixed-width fields to 8 bytes
        #[arg(long)]
        align: bool,

        /// Schema id to write into the header
        #[arg(long)]
        schema_id: Option<u64>,

        /// Append to the output instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Verify that a record file decodes cleanly
    Verify {
        /// File holding records or a tag-walk stream
        file: PathBuf,

        /// JSON schema to check fixed-width fields against
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { file, format } => {
            commands::inspect::run(&file, &format)?;
        }
        Commands::Decode {
            file,
            schema,
            format,
        } => {
            commands::decode::run(&file, schema.as_deref(), &format)?;
        }
        Commands::Encode {
            input,
            output,
            strategy,
            align,
            schema_id,
            append,
        } => {
            let options = commands::encode::EncodeOptions {
                strategy,
                align,
                schema_id,
                append,
            };
            commands::encode::run(&input, &output, &options)?;
        }
        Commands::Verify { file, schema } => {
            commands::verify::run(&file, schema.as_deref())?;
        }
        Commands::Version => {
            println!("DBFlat CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Record format v{}", dbflat_core::VERSION);
        }
    }

    Ok(())
}
