//! Memo Tracker CLI
//!
//! Memos with ordered subtasks, completion derived from those subtasks, and
//! timestamps held in one canonical civil zone.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use memo_tracker::cli::template::TemplateCommand;
use memo_tracker::cli::{AttachArgs, Cli, Command, ListArgs, ToggleArgs};
use memo_tracker::config::Config;
use memo_tracker::db::Database;
use memo_tracker::error::{ErrorReport, MemoError};
use memo_tracker::format::{self, AttachmentView, MemoView, OutputFormat, SubTaskView, TemplateView};
use memo_tracker::logging;
use memo_tracker::time::TimeNormalizer;
use memo_tracker::types::{
    Memo, MemoFilter, MemoInput, MemoPatch, NewAttachment, Template, TemplateInput,
    TemplateOverrides,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log, cli.verbose) {
        eprintln!("Failed to initialize logging: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<MemoError>() {
                Some(memo_err) => {
                    let report = ErrorReport::from(memo_err);
                    match serde_json::to_string(&report) {
                        Ok(json) => eprintln!("{json}"),
                        Err(_) => eprintln!("Error: {memo_err}"),
                    }
                }
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Everything a command needs: the open database and where files go.
struct App {
    db: Database,
    attachments_dir: PathBuf,
    format: OutputFormat,
}

impl App {
    fn time(&self) -> &TimeNormalizer {
        self.db.time()
    }
}

fn open(cli: &Cli) -> Result<App> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(db_path) = &cli.database {
        config.server.db_path = db_path.clone();
    }
    config.ensure_db_dir()?;

    let time = config.time_normalizer()?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("Failed to open {}", config.server.db_path.display()))?
        .with_time_normalizer(time);
    debug!(
        db_path = %config.server.db_path.display(),
        zone = %time.zone(),
        "Database opened"
    );

    Ok(App {
        db,
        attachments_dir: config.server.attachments_dir,
        format: cli.format,
    })
}

fn run(cli: Cli) -> Result<()> {
    let ctx = open(&cli)?;

    match cli.command {
        Command::Create { input } => {
            let input: MemoInput = read_json(&input)?;
            let memo = ctx.db.create_memo(input)?;
            print_memo(&ctx, &memo)
        }
        Command::Show { id } => {
            let memo = ctx.db.get_memo(id)?.ok_or(MemoError::MemoNotFound(id))?;
            print_memo(&ctx, &memo)
        }
        Command::List(args) => run_list(&ctx, args),
        Command::Update { id, input } => {
            let patch: MemoPatch = read_json(&input)?;
            let update = ctx.db.update_memo(id, patch)?;
            remove_files(&update.orphaned_files);
            print_memo(&ctx, &update.memo)
        }
        Command::Delete { id } => {
            let paths = ctx.db.delete_memo(id)?;
            remove_files(&paths);
            print_value(&serde_json::json!({ "deleted": id }))
        }
        Command::Complete { id } => {
            let memo = ctx.db.set_memo_status(id, true)?;
            print_memo(&ctx, &memo)
        }
        Command::Reopen { id } => {
            let memo = ctx.db.set_memo_status(id, false)?;
            print_memo(&ctx, &memo)
        }
        Command::Toggle(args) => run_toggle(&ctx, args),
        Command::Reorder { memo_id, ids } => {
            let memo = ctx.db.reorder_subtasks(memo_id, &ids)?;
            print_memo(&ctx, &memo)
        }
        Command::Stats => {
            let stats = ctx.db.get_stats()?;
            match ctx.format {
                OutputFormat::Json => print_value(&stats),
                OutputFormat::Markdown => {
                    print!("{}", format::format_stats_markdown(&stats));
                    Ok(())
                }
            }
        }
        Command::Template(cmd) => run_template(&ctx, cmd),
        Command::Attach(args) => run_attach(&ctx, args),
        Command::Detach { id } => {
            let attachment = ctx.db.delete_attachment(id)?;
            remove_files(std::slice::from_ref(&attachment.file_path));
            print_value(&AttachmentView::new(&attachment, ctx.time()))
        }
    }
}

fn run_list(ctx: &App, args: ListArgs) -> Result<()> {
    let filter = MemoFilter {
        category: args.category.map(Into::into),
        status: args.status.into(),
    };
    let memos = ctx.db.list_memos(&filter)?;

    match ctx.format {
        OutputFormat::Json => {
            let views: Vec<MemoView> = memos.iter().map(|m| MemoView::new(m, ctx.time())).collect();
            print_value(&views)
        }
        OutputFormat::Markdown => {
            print!("{}", format::format_memos_markdown(&memos, ctx.time()));
            Ok(())
        }
    }
}

fn run_toggle(ctx: &App, args: ToggleArgs) -> Result<()> {
    let subtask = ctx
        .db
        .toggle_subtask(args.subtask_id, !args.undone, args.at.as_deref())?;
    print_value(&SubTaskView::new(&subtask, ctx.time()))
}

fn run_template(ctx: &App, cmd: TemplateCommand) -> Result<()> {
    match cmd {
        TemplateCommand::Create { input } => {
            let input: TemplateInput = read_json(&input)?;
            let template = ctx.db.create_template(input)?;
            print_template(ctx, &template)
        }
        TemplateCommand::List => {
            let templates = ctx.db.list_templates()?;
            match ctx.format {
                OutputFormat::Json => {
                    let views: Vec<TemplateView> = templates
                        .iter()
                        .map(|t| TemplateView::new(t, ctx.time()))
                        .collect();
                    print_value(&views)
                }
                OutputFormat::Markdown => {
                    for template in &templates {
                        println!("{}", format::format_template_markdown(template, ctx.time()));
                    }
                    Ok(())
                }
            }
        }
        TemplateCommand::Show { id } => {
            let template = ctx
                .db
                .get_template(id)?
                .ok_or(MemoError::TemplateNotFound(id))?;
            print_template(ctx, &template)
        }
        TemplateCommand::Delete { id } => {
            ctx.db.delete_template(id)?;
            print_value(&serde_json::json!({ "deleted": id }))
        }
        TemplateCommand::Apply {
            id,
            title,
            deadline,
        } => {
            let memo = ctx
                .db
                .instantiate_template(id, TemplateOverrides { title, deadline })?;
            print_memo(ctx, &memo)
        }
        TemplateCommand::Capture { memo_id } => {
            let template = ctx.db.save_memo_as_template(memo_id)?;
            print_template(ctx, &template)
        }
    }
}

/// Copy the file under `attachments_dir/<subtask-id>/` and record it.
/// The copy is removed again if the record cannot be written.
fn run_attach(ctx: &App, args: AttachArgs) -> Result<()> {
    let filename = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", args.file.display()))?
        .to_string();

    let dir = ctx.attachments_dir.join(args.subtask_id.to_string());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let stored = dir.join(format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        filename
    ));
    let file_size = std::fs::copy(&args.file, &stored)
        .with_context(|| format!("Failed to copy {}", args.file.display()))?;

    let record = NewAttachment {
        filename,
        file_path: stored.to_string_lossy().into_owned(),
        file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
        content_type: args
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
    };

    match ctx.db.add_attachment(args.subtask_id, record) {
        Ok(attachment) => {
            info!(path = %stored.display(), "Attachment stored");
            print_value(&AttachmentView::new(&attachment, ctx.time()))
        }
        Err(e) => {
            remove_files(&[stored.to_string_lossy().into_owned()]);
            Err(e.into())
        }
    }
}

/// Read a JSON document from `path`, or stdin when `path` is `-`.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Invalid JSON input")
}

/// Best-effort removal of stored attachment files.
fn remove_files(paths: &[String]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path, "Removed attachment file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path, error = %e, "Failed to remove attachment file"),
        }
    }
}

fn print_value<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_memo(ctx: &App, memo: &Memo) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_value(&MemoView::new(memo, ctx.time())),
        OutputFormat::Markdown => {
            print!("{}", format::format_memo_markdown(memo, ctx.time()));
            Ok(())
        }
    }
}

fn print_template(ctx: &App, template: &Template) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_value(&TemplateView::new(template, ctx.time())),
        OutputFormat::Markdown => {
            print!("{}", format::format_template_markdown(template, ctx.time()));
            Ok(())
        }
    }
}
