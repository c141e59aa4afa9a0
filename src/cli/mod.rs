//! CLI command definitions for memo-tracker
//!
//! This module defines the CLI structure using clap's derive macros.
//! JSON inputs are read from a file path, or from stdin when the path is `-`.

pub mod template;

use crate::format::OutputFormat;
use crate::logging::LogTarget;
use crate::types::{Category, StatusFilter};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use template::TemplateCommand;

/// Memo tracker with ordered subtasks and derived completion
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: LogTarget,

    /// Output format: json or markdown
    #[arg(short, long, default_value = "json", value_parser = parse_format, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(s).ok_or_else(|| format!("unknown format '{}'", s))
}

/// Category filter accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Work,
    Life,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Work => Category::Work,
            CategoryArg::Life => Category::Life,
        }
    }
}

/// Status filter accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatusArg {
    #[default]
    All,
    Active,
    Completed,
}

impl From<StatusArg> for StatusFilter {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::All => StatusFilter::All,
            StatusArg::Active => StatusFilter::Active,
            StatusArg::Completed => StatusFilter::Completed,
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a memo from a JSON document
    Create {
        /// JSON file, or `-` for stdin
        input: PathBuf,
    },

    /// Show one memo with its subtasks
    Show { id: i64 },

    /// List memos, newest first
    List(ListArgs),

    /// Apply a partial update from a JSON document
    ///
    /// A `subtasks` array replaces the stored list: entries with an `id` update
    /// that subtask, entries without one are created, and stored subtasks not
    /// mentioned are deleted.
    Update {
        id: i64,
        /// JSON file, or `-` for stdin
        input: PathBuf,
    },

    /// Delete a memo, its subtasks and their attachment files
    Delete { id: i64 },

    /// Mark a memo complete (rejected while any subtask is open)
    Complete { id: i64 },

    /// Mark a memo active again
    Reopen { id: i64 },

    /// Mark a subtask complete, or incomplete with --undone
    Toggle(ToggleArgs),

    /// Reorder a memo's subtasks by listing their ids in the new order
    Reorder {
        memo_id: i64,
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },

    /// Show aggregate statistics
    Stats,

    /// Manage memo templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Copy a file into the attachments directory and attach it to a subtask
    Attach(AttachArgs),

    /// Remove an attachment and its stored file
    Detach { id: i64 },
}

/// Arguments for the list subcommand
#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,

    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    pub status: StatusArg,
}

/// Arguments for the toggle subcommand
#[derive(Args, Debug)]
pub struct ToggleArgs {
    pub subtask_id: i64,

    /// Mark the subtask incomplete instead
    #[arg(long)]
    pub undone: bool,

    /// Completion time to record instead of now (any offset, or naive civil time)
    #[arg(long, value_name = "TIMESTAMP", conflicts_with = "undone")]
    pub at: Option<String>,
}

/// Arguments for the attach subcommand
#[derive(Args, Debug)]
pub struct AttachArgs {
    pub subtask_id: i64,

    pub file: PathBuf,

    /// MIME type to record (default: application/octet-stream)
    #[arg(long, value_name = "MIME")]
    pub content_type: Option<String>,
}
