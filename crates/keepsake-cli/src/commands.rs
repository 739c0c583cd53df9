use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context};
use colored::Colorize;
use keepsake_sdk::{
    format_size, to_html, BlockBody, BlockField, BlockId, EditorSession, EndingField, KeepsakeConfig,
    MediaBlob, MediaKind, MoveOutcome, NodeField, Notice, NoticeLevel, UsageLevel,
};

use crate::cli::*;

/// Resolved configuration for one invocation.
struct Invocation {
    config_path: PathBuf,
    config: KeepsakeConfig,
    format: OutputFormat,
}

impl Invocation {
    /// Load the configuration file. A relative `data_dir` is taken relative
    /// to the file's directory; `--data-dir` wins over both.
    fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(KeepsakeConfig::FILE_NAME));
        let mut config = KeepsakeConfig::load(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        if let Some(base) = config_path.parent() {
            if config.data_dir.is_relative() && !base.as_os_str().is_empty() {
                config.data_dir = base.join(&config.data_dir);
            }
        }
        if let Some(dir) = &cli.data_dir {
            config.data_dir = dir.clone();
        }
        tracing::debug!(data_dir = %config.data_dir.display(), "configuration loaded");
        Ok(Self {
            config_path,
            config,
            format: cli.format,
        })
    }

    async fn session(&self) -> anyhow::Result<EditorSession> {
        EditorSession::open(self.config.clone())
            .await
            .with_context(|| format!("opening {}", self.config.data_dir.display()))
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let ctx = Invocation::load(&cli)?;
    let command = match cli.command {
        Command::Init(args) => {
            let target = match &args.path {
                Some(dir) => dir.join(KeepsakeConfig::FILE_NAME),
                None => ctx.config_path.clone(),
            };
            return cmd_init(&target, args.force, cli.data_dir).await;
        }
        other => other,
    };
    let mut session = ctx.session().await?;
    let result = dispatch(&ctx, &mut session, command).await;
    print_notices(session.take_notices());
    result
}

async fn dispatch(ctx: &Invocation, session: &mut EditorSession, command: Command) -> anyhow::Result<()> {
    match command {
        // Runs before a session exists.
        Command::Init(_) => Ok(()),
        Command::Status(_) => cmd_status(ctx, session).await,
        Command::Node(args) => cmd_node(session, args.action).await,
        Command::Block(args) => cmd_block(session, args.action).await,
        Command::Standalone(args) => cmd_standalone(session, args.action).await,
        Command::Ending(args) => match args.action {
            EndingAction::Set { field, value } => {
                session
                    .update_ending_field(EndingField::parse(&field, &value)?)
                    .await?;
                println!("{} Ending {} updated", "✓".green(), field.bold());
                Ok(())
            }
        },
        Command::Music(args) => cmd_music(session, args.action).await,
        Command::Render(args) => cmd_render(ctx, session, args).await,
        Command::Export(args) => cmd_export(session, args).await,
        Command::Backup(args) => cmd_backup(session, args).await,
        Command::Import(args) => {
            let text = tokio::fs::read_to_string(&args.file)
                .await
                .with_context(|| format!("reading {}", args.file.display()))?;
            let written = session.import_backup(&text)?;
            println!("{} Restored {} field(s) from {}", "✓".green().bold(), written, args.file.display());
            Ok(())
        }
        Command::Usage(_) => cmd_usage(session).await,
        Command::Clear(args) => {
            ensure!(args.yes, "refusing to clear the saved story without --yes");
            let removed = session.clear_all()?;
            println!("{} Removed {} stored key(s)", "✓".green(), removed);
            Ok(())
        }
        Command::Reset(_) => {
            session.reset_to_default().await?;
            println!("{} Story reset to the built-in timeline", "✓".green().bold());
            Ok(())
        }
        Command::Edit(args) => {
            match args.mode {
                Switch::On => session.enter_edit_mode()?,
                Switch::Off => session.exit_edit_mode().await?,
            }
            let label = if session.is_edit_mode() { "on".green() } else { "off".yellow() };
            println!("Edit mode {}", label.bold());
            Ok(())
        }
    }
}

async fn cmd_init(config_path: &Path, force: bool, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    if let Some(dir) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut config = KeepsakeConfig::default();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config.save(config_path)?;

    let mut opened = config.clone();
    if let Some(base) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if opened.data_dir.is_relative() {
            opened.data_dir = base.join(&opened.data_dir);
        }
    }
    let mut session = EditorSession::open(opened.clone()).await?;
    println!(
        "{} Initialized Keepsake in {}",
        "✓".green().bold(),
        opened.data_dir.display().to_string().bold()
    );
    println!("  Config: {}", config_path.display().to_string().cyan());
    println!("  Moments: {}", session.document().node_count());
    print_notices(session.take_notices());
    Ok(())
}

async fn cmd_status(ctx: &Invocation, session: &EditorSession) -> anyhow::Result<()> {
    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(session.document())?);
        return Ok(());
    }
    let doc = session.document();
    let edit = if session.is_edit_mode() { "on".green() } else { "off".dimmed() };
    println!("Data: {}  (edit mode {})", ctx.config.data_dir.display().to_string().bold(), edit);
    println!();
    for block in doc.standalone_at(-1) {
        println!("    {} {}", "+".dimmed(), describe_standalone(block.id.as_str(), &block.body));
    }
    for (index, node) in doc.nodes.iter().enumerate() {
        let star = if node.is_highlight { "★".yellow() } else { " ".normal() };
        println!(
            "{:>3} {} {}  {}  ({} block{})",
            index,
            star,
            node.date.cyan(),
            node.title.as_deref().unwrap_or("").bold(),
            node.contents.len(),
            if node.contents.len() == 1 { "" } else { "s" }
        );
        for (i, block) in node.contents.iter().enumerate() {
            println!("        {}. {}", i, summarize(&block.body));
        }
        for block in doc.standalone_at(index as i64) {
            println!("    {} {}", "+".dimmed(), describe_standalone(block.id.as_str(), &block.body));
        }
    }
    println!();
    println!("Ending: {} ({})", doc.ending.signature.italic(), doc.ending.name);
    println!("Music: {} [{}]", doc.music.name, doc.music.size_label);
    let usage = session.usage()?;
    println!(
        "Storage: {} of {} ({})",
        format_size(usage.used_bytes),
        format_size(usage.max_bytes),
        colored_percentage(usage.percentage, usage.level())
    );
    Ok(())
}

fn summarize(body: &BlockBody) -> String {
    match body {
        BlockBody::Text { content } => {
            let mut preview: String = content.chars().take(60).collect();
            if preview.len() < content.len() {
                preview.push('…');
            }
            format!("text   {preview}")
        }
        BlockBody::Image { media, caption, .. } => match caption {
            Some(caption) => format!("image  {media}  \"{caption}\""),
            None => format!("image  {media}"),
        },
        BlockBody::Video { media, .. } => format!("video  {media}"),
    }
}

fn describe_standalone(id: &str, body: &BlockBody) -> String {
    format!("[{}] {}", id.dimmed(), summarize(body))
}

fn colored_percentage(percentage: f64, level: UsageLevel) -> colored::ColoredString {
    let text = format!("{percentage:.1}%");
    match level {
        UsageLevel::Normal => text.green(),
        UsageLevel::Warning => text.yellow(),
        UsageLevel::Danger => text.red().bold(),
    }
}

/// Read a media file, checking it is of the kind the command expects.
async fn read_blob(path: &Path, expected: &[MediaKind]) -> anyhow::Result<MediaBlob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let blob = MediaBlob::from_named(bytes, name);
    ensure!(
        expected.contains(&blob.kind()),
        "{} is {} but {:?} was expected",
        path.display(),
        blob.mime,
        expected
    );
    tracing::debug!(path = %path.display(), mime = %blob.mime, bytes = blob.len(), "read media file");
    Ok(blob)
}

fn report_move(outcome: MoveOutcome) {
    if outcome.moved() {
        println!("{} Moved", "✓".green());
    }
}

async fn cmd_node(session: &mut EditorSession, action: NodeAction) -> anyhow::Result<()> {
    match action {
        NodeAction::Add => {
            let id = session.add_node().await?;
            let index = session.document().node_count() - 1;
            println!("{} Added moment {} at index {}", "✓".green().bold(), id.to_string().yellow(), index);
        }
        NodeAction::Rm { index } => {
            session.delete_node(index).await?;
            println!("{} Deleted moment {}", "✓".green(), index);
        }
        NodeAction::Mv { index, direction } => {
            report_move(session.move_node(index, direction.into()).await?);
        }
        NodeAction::Set { index, field, value } => {
            session
                .update_node_field(index, NodeField::parse(&field, &value)?)
                .await?;
            println!("{} Moment {} {} updated", "✓".green(), index, field.bold());
        }
    }
    Ok(())
}

async fn cmd_block(session: &mut EditorSession, action: BlockAction) -> anyhow::Result<()> {
    match action {
        BlockAction::AddText { node, text } => {
            let id = session.add_text_block(node, &text).await?;
            println!("{} Added text block {}", "✓".green(), id.to_string().yellow());
        }
        BlockAction::AddImage { node, file } => {
            let blob = read_blob(&file, &[MediaKind::Image]).await?;
            let id = session.add_media_block(node, &blob).await?;
            println!("{} Added image block {}", "✓".green(), id.to_string().yellow());
        }
        BlockAction::AddVideo { node, file } => {
            let blob = read_blob(&file, &[MediaKind::Video]).await?;
            let id = session.add_media_block(node, &blob).await?;
            println!("{} Added video block {}", "✓".green(), id.to_string().yellow());
        }
        BlockAction::Rm { node, index } => {
            session.delete_content_block(node, index).await?;
            println!("{} Deleted block {} of moment {}", "✓".green(), index, node);
        }
        BlockAction::Mv { node, index, direction } => {
            report_move(session.move_content_block(node, index, direction.into()).await?);
        }
        BlockAction::Set { node, index, field, value } => {
            session
                .update_content_block(node, index, BlockField::parse(&field, &value)?)
                .await?;
            println!("{} Block {} {} updated", "✓".green(), index, field.bold());
        }
        BlockAction::Replace { node, index, file } => {
            let blob = read_blob(&file, &[MediaKind::Image, MediaKind::Video]).await?;
            session.replace_block_media(node, index, &blob).await?;
            println!("{} Replaced media of block {}", "✓".green(), index);
        }
    }
    Ok(())
}

async fn cmd_standalone(session: &mut EditorSession, action: StandaloneAction) -> anyhow::Result<()> {
    match action {
        StandaloneAction::AddText { after, text } => {
            let id = session.add_standalone_text(after, &text).await?;
            println!("{} Added block {}", "✓".green(), id.to_string().yellow());
        }
        StandaloneAction::AddImage { after, file } => {
            let blob = read_blob(&file, &[MediaKind::Image]).await?;
            let id = session.add_standalone_media(after, &blob).await?;
            println!("{} Added block {}", "✓".green(), id.to_string().yellow());
        }
        StandaloneAction::Rm { id } => {
            session.delete_standalone_block(&BlockId::parse(&id)?).await?;
            println!("{} Deleted block {}", "✓".green(), id);
        }
        StandaloneAction::Mv { id, direction } => {
            report_move(
                session
                    .move_standalone_block(&BlockId::parse(&id)?, direction.into())
                    .await?,
            );
        }
        StandaloneAction::Set { id, field, value } => {
            session
                .update_standalone_block(&BlockId::parse(&id)?, BlockField::parse(&field, &value)?)
                .await?;
            println!("{} Block {} {} updated", "✓".green(), id, field.bold());
        }
        StandaloneAction::Replace { id, file } => {
            let blob = read_blob(&file, &[MediaKind::Image, MediaKind::Video]).await?;
            session
                .replace_standalone_media(&BlockId::parse(&id)?, &blob)
                .await?;
            println!("{} Replaced media of block {}", "✓".green(), id);
        }
    }
    Ok(())
}

async fn cmd_music(session: &mut EditorSession, action: MusicAction) -> anyhow::Result<()> {
    match action {
        MusicAction::Set { file } => {
            let blob = read_blob(&file, &[MediaKind::Audio]).await?;
            session.set_music(&blob).await?;
            let music = &session.document().music;
            println!("Music: {} [{}]", music.name.bold(), music.size_label);
        }
        MusicAction::Reset => {
            session.reset_music().await?;
            println!("{} Music reset to the default track", "✓".green());
        }
    }
    Ok(())
}

async fn cmd_render(ctx: &Invocation, session: &EditorSession, args: RenderArgs) -> anyhow::Result<()> {
    let (tree, report) = session.hydrated_tree().await;
    for (key, reason) in &report.failed {
        eprintln!("  {} {}: {}", "failed:".red(), key, reason);
    }
    let out = match ctx.format {
        OutputFormat::Json => serde_json::to_string_pretty(&tree)?,
        OutputFormat::Text => to_html(&tree),
    };
    match args.output {
        Some(path) => {
            tokio::fs::write(&path, out).await?;
            println!(
                "{} Rendered {} item(s) to {}",
                "✓".green(),
                tree.items.len(),
                path.display()
            );
        }
        None => println!("{out}"),
    }
    Ok(())
}

async fn cmd_export(session: &mut EditorSession, args: ExportArgs) -> anyhow::Result<()> {
    let artifact = session.export().await?;
    let path = artifact.write_to(&args.out_dir).await?;
    println!(
        "{} Exported {} ({})",
        "✓".green().bold(),
        path.display().to_string().bold(),
        format_size(artifact.len() as u64)
    );
    Ok(())
}

async fn cmd_backup(session: &EditorSession, args: BackupArgs) -> anyhow::Result<()> {
    let backup = session.backup();
    let path = args.output.unwrap_or_else(|| PathBuf::from(backup.file_name()));
    tokio::fs::write(&path, backup.to_json()?)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{} Backup written to {}", "✓".green().bold(), path.display());
    Ok(())
}

async fn cmd_usage(session: &EditorSession) -> anyhow::Result<()> {
    let docs = session.usage()?;
    let media = session.media_usage().await?;
    println!(
        "Documents: {} of {} ({})",
        format_size(docs.used_bytes),
        format_size(docs.max_bytes),
        colored_percentage(docs.percentage, docs.level())
    );
    println!(
        "Media:     {} in {} item(s)",
        format_size(media.used_bytes),
        media.count
    );
    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let marker = match notice.level {
            NoticeLevel::Info => "i".blue(),
            NoticeLevel::Success => "✓".green(),
            NoticeLevel::Warning => "!".yellow().bold(),
            NoticeLevel::Error => "✗".red().bold(),
        };
        eprintln!("{marker} {notice}");
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn cli(dir: &Path, args: &[&str]) -> Cli {
        let config = dir.join(KeepsakeConfig::FILE_NAME);
        let mut argv = vec!["keepsake", "--config"];
        let config = config.to_string_lossy().into_owned();
        argv.push(&config);
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn init_then_edit_then_export() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["init"])).await.unwrap();
        assert!(dir.path().join(KeepsakeConfig::FILE_NAME).exists());
        assert!(dir.path().join(".keepsake").is_dir());

        run_command(cli(dir.path(), &["node", "add"])).await.unwrap();
        run_command(cli(dir.path(), &["node", "set", "6", "title", "Today"]))
            .await
            .unwrap();

        let photo = dir.path().join("today.png");
        std::fs::write(&photo, b"png bytes").unwrap();
        let photo = photo.to_string_lossy().into_owned();
        run_command(cli(dir.path(), &["block", "add-image", "6", &photo]))
            .await
            .unwrap();

        let out = dir.path().join("out");
        let out_arg = out.to_string_lossy().into_owned();
        run_command(cli(dir.path(), &["export", "--out-dir", &out_arg]))
            .await
            .unwrap();
        let exported: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(exported.len(), 1);

        let ctx = Invocation::load(&cli(dir.path(), &["status"])).unwrap();
        let session = ctx.session().await.unwrap();
        assert_eq!(session.document().node_count(), 7);
        assert_eq!(session.document().nodes[6].title.as_deref(), Some("Today"));
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["init"])).await.unwrap();
        assert!(run_command(cli(dir.path(), &["init"])).await.is_err());
        run_command(cli(dir.path(), &["init", "--force"])).await.unwrap();
    }

    #[tokio::test]
    async fn wrong_media_kind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["init"])).await.unwrap();
        let song = dir.path().join("song.mp3");
        std::fs::write(&song, b"mp3").unwrap();
        let song = song.to_string_lossy().into_owned();
        assert!(run_command(cli(dir.path(), &["block", "add-image", "0", &song]))
            .await
            .is_err());
        run_command(cli(dir.path(), &["music", "set", &song])).await.unwrap();
    }

    #[tokio::test]
    async fn clear_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        run_command(cli(dir.path(), &["init"])).await.unwrap();
        assert!(run_command(cli(dir.path(), &["clear"])).await.is_err());
        run_command(cli(dir.path(), &["clear", "--yes"])).await.unwrap();
    }

    #[test]
    fn data_dir_is_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Invocation::load(&cli(dir.path(), &["status"])).unwrap();
        assert_eq!(ctx.config.data_dir, dir.path().join(".keepsake"));

        let ctx = Invocation::load(&cli(dir.path(), &["status", "--data-dir", "/srv/story"])).unwrap();
        assert_eq!(ctx.config.data_dir, PathBuf::from("/srv/story"));
    }
}
