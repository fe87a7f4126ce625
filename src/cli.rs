use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start pdfvec as a service.
    Daemon {},

    /// Interactive menu client for a running daemon.
    Shell {},

    /// List indexed PDFs
    List {},

    /// Upload and index a PDF
    Upload {
        /// Path to the PDF
        path: PathBuf,
    },

    /// Delete an indexed PDF
    Delete {
        /// Document name (file name without .pdf)
        name: String,
    },

    /// Delete every PDF and embedding
    Reset {
        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Search indexed pages
    Search {
        /// Search query
        query: String,

        /// Number of results
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Only search this PDF
        #[clap(short, long)]
        pdf: Option<String>,
    },

    /// Write a document's page embeddings as CSV.
    /// Reads the store directly; the daemon does not need to run.
    Export {
        /// Document name
        name: String,

        /// Output file (stdout if omitted)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}
