//! Template subcommands.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Create a template from a JSON document
    Create {
        /// JSON file, or `-` for stdin
        input: PathBuf,
    },

    /// List all templates
    List,

    /// Show one template
    Show { id: i64 },

    /// Delete a template
    Delete { id: i64 },

    /// Create a memo from a template
    Apply {
        id: i64,

        /// Title for the new memo (default: the template's title)
        #[arg(long)]
        title: Option<String>,

        /// Deadline for the new memo
        #[arg(long, value_name = "TIMESTAMP")]
        deadline: Option<String>,
    },

    /// Save an existing memo's structure as a new template
    Capture { memo_id: i64 },
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::Parser;

    use super::TemplateCommand;

    #[test]
    fn apply_takes_overrides() {
        let cli = Cli::try_parse_from([
            "memo-tracker",
            "template",
            "apply",
            "2",
            "--title",
            "Sprint 9",
        ])
        .unwrap();
        let Command::Template(TemplateCommand::Apply {
            id,
            title,
            deadline,
        }) = cli.command
        else {
            panic!("expected template apply");
        };
        assert_eq!(id, 2);
        assert_eq!(title.as_deref(), Some("Sprint 9"));
        assert_eq!(deadline, None);
    }
}
