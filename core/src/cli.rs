//! Command-line interface for synap-rs.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::input::InputSource;

/// Run compiled networks on the SyNAP NPU.
#[derive(Parser, Debug)]
#[command(name = "synap-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a network on the given inputs.
    #[command(after_help = "Input specifications:\n  \
        zero:<n>    -> n zero bytes\n  \
        random:<n>  -> n random bytes\n  \
        value:<n>   -> n as a 4-byte little-endian integer\n  \
        <file>      -> raw contents of file")]
    Infer {
        /// Path to the compiled model.
        #[arg(short, long)]
        model: PathBuf,

        /// Input data, one per network input, in order.
        #[arg(short, long = "input")]
        inputs: Vec<InputSource>,

        /// Byte size of each network output, in order.
        #[arg(short, long = "output-size")]
        output_sizes: Vec<usize>,

        /// Driver backend (native, simulated). Overrides the config file.
        #[arg(short, long)]
        backend: Option<String>,

        /// Number of inferences to run. Overrides the config file.
        #[arg(short, long)]
        repeat: Option<usize>,

        /// Hold the NPU inference lock while running.
        #[arg(long)]
        lock: bool,

        /// Save raw outputs to output_raw_<n>.dat.
        #[arg(long)]
        dump_raw: bool,

        /// Directory raw outputs are written to.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Output format (json, pretty).
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Path to optional YAML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check that the NPU driver can be opened.
    Check {
        /// Driver backend (native, simulated).
        #[arg(short, long)]
        backend: Option<String>,

        /// Also take and give back the NPU inference lock.
        #[arg(long)]
        lock: bool,
    },
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
