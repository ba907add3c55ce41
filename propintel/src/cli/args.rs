//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Australian Property Intelligence - ask property questions, keep a
/// session history and export it as a report
#[derive(Parser, Debug)]
#[command(name = "propintel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to <config dir>/propintel/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the analysis API is up
    Health,

    /// List example questions
    Questions,

    /// Ask a property question and record the answer
    Ask {
        /// Question text
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,

        /// Request a detailed analysis
        #[arg(long)]
        details: bool,
    },

    /// Show the conversation history
    History,

    /// Manage the image gallery
    Images {
        #[command(subcommand)]
        action: ImageAction,
    },

    /// Save the session as a report
    Export {
        /// Produce the printable HTML report instead of a PDF
        #[arg(long)]
        html: bool,

        /// Directory to save into (defaults to the configured output dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Email a condensed report
    Email {
        /// Recipient address
        #[arg(long)]
        to: String,

        /// Subject line
        #[arg(long, default_value = "Australian Property Intelligence Report")]
        subject: String,

        /// Message body
        #[arg(long, default_value = "Please find the property intelligence report attached.")]
        message: String,

        /// Images to attach (defaults to the configured limit)
        #[arg(long)]
        max_images: Option<usize>,
    },

    /// Back up or restore session data
    Data {
        #[command(subcommand)]
        action: DataAction,
    },

    /// Delete all history and images
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ImageAction {
    /// Add an image file to the gallery
    Add {
        /// Image file (PNG, JPEG, GIF or WebP)
        file: PathBuf,

        /// Prompt the image was generated from
        #[arg(long)]
        prompt: String,

        /// Style label
        #[arg(long, default_value = "photorealistic")]
        style: String,

        /// Generation seed
        #[arg(long)]
        seed: Option<u64>,

        /// Mark as automatically generated
        #[arg(long)]
        auto: bool,
    },

    /// List gallery images
    List,

    /// Delete an image
    Delete {
        /// Image ID
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DataAction {
    /// Write the session to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Load a session JSON file
    Import {
        /// Source file
        file: PathBuf,

        /// Replace the current session instead of appending
        #[arg(long)]
        replace: bool,
    },
}
