pub use clap::Parser;

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pen")]
#[command(about = "Local markdown note vault with encrypted export")]
#[command(version)]
pub struct Args {
    /// Path to a JSON config file
    #[arg(long, global = true, default_value = "pen.json")]
    pub config: PathBuf,

    /// Vault database path (overrides the config file)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Password for `seal` and `open`
    #[arg(long, global = true, env = "PEN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List notes, most recently updated first
    List,
    /// Create a note
    New {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Print one note with wiki-links rendered
    Show { id: String },
    /// Change a note's title and/or content
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Delete a note and its attachments
    Rm { id: String },
    /// Attach an image file to a note
    AddImage { note: String, path: PathBuf },
    /// Attach an arbitrary file to a note
    AddFile {
        note: String,
        path: PathBuf,
        #[arg(long)]
        mime: Option<String>,
    },
    /// List a note's images and files
    Attachments { note: String },
    /// Search by `#tag` or text
    Search { query: String },
    /// Write a plain export document
    Export {
        out: PathBuf,
        #[arg(long)]
        note: Option<String>,
    },
    /// Merge a plain export document into the vault
    Import { input: PathBuf },
    /// Write a password-protected export document
    Seal {
        out: PathBuf,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        hint: Option<String>,
    },
    /// Merge a password-protected export document into the vault
    Open { input: PathBuf },
}
