mod cli;

use videoinsight::{
    config,
    extensions::BulkReport,
    host::{self, App},
};
use videoinsight_av::{check_tools, Prober, TagEdit, TagEditor, ThumbnailExtractor};
use videoinsight_common::expand_inputs;
use videoinsight_sdk::CommandArgs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ExtensionsAction, TagsAction};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "videoinsight=trace,videoinsight_av=debug,videoinsight_common=debug".to_string()
        } else {
            "videoinsight=info,videoinsight_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Analyze {
            paths,
            json,
            thumbnails,
            export,
        } => runtime()?.block_on(analyze(
            config_path,
            &paths,
            json,
            thumbnails.as_deref(),
            export.as_deref(),
        )),
        Commands::Probe { file, json } => runtime()?.block_on(probe_file(config_path, &file, json)),
        Commands::Thumbnail { file, output } => {
            runtime()?.block_on(thumbnail_file(config_path, &file, &output))
        }
        Commands::Extensions { action } => runtime()?.block_on(extensions(config_path, action)),
        Commands::Run {
            command,
            files,
            args,
        } => runtime()?.block_on(run_command(config_path, &command, &files, args)),
        Commands::Tags { action } => runtime()?.block_on(tags(config_path, action)),
        Commands::CheckTools => check_external_tools(config_path),
        Commands::Validate {
            file: validate_path,
        } => {
            let path = validate_path.or_else(|| config_path.map(Path::to_path_buf));
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("videoinsight {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

async fn analyze(
    config_path: Option<&Path>,
    paths: &[PathBuf],
    json: bool,
    thumbnails: Option<&Path>,
    export: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut app = App::from_config(config);
    app.start();

    let added = app.add_files(paths);
    if added == 0 {
        bail!("No video files found in the given paths");
    }
    tracing::info!("Analysing {} files", added);
    app.run_until_idle().await;

    if let Some(dir) = thumbnails {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create thumbnail directory: {:?}", dir))?;
        for entry in app.files() {
            if let Some(thumb) = &entry.thumbnail {
                let stem = entry
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "thumbnail".to_string());
                let target = dir.join(format!("{stem}.jpg"));
                thumb.save(&target)?;
                tracing::debug!("Saved thumbnail {}", target.display());
            }
        }
    }

    if json {
        println!("{}", host::to_json(app.files())?);
    } else {
        for entry in app.files() {
            println!("{}", entry.path.display());
            if let Some(report) = &entry.report {
                println!("  Size: {}", report.file.size_display());
                for (label, value) in report.media.rows() {
                    println!("  {}: {}", label, value);
                }
            }
            if let Some(thumb) = &entry.thumbnail {
                println!("  Thumbnail: {}x{}", thumb.width, thumb.height);
            }
            for error in &entry.errors {
                println!("  Error: {}", error);
            }
            println!();
        }
        let ok = app.files().iter().filter(|f| f.is_ok()).count();
        println!("Analysed {}/{} files", ok, app.files().len());
    }

    if let Some(path) = export {
        std::fs::write(path, app.export_report())
            .with_context(|| format!("Failed to write report: {:?}", path))?;
        println!("Report written to {}", path.display());
    }

    print_alerts(&app);
    app.shutdown().await;
    Ok(())
}

async fn probe_file(config_path: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        bail!("File does not exist: {:?}", file);
    }
    let config = config::load_config_or_default(config_path)?;
    let tools = config.tools.resolve();
    let prober = Prober::new(tools.ffprobe).with_options(config.jobs.probe_options());

    let report = prober.probe(file, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("File: {}", report.file.path.display());
        println!("Title: {}", report.file.title);
        if let Some(ref subtitle) = report.file.subtitle {
            println!("Subtitle: {}", subtitle);
        }
        println!("Size: {}", report.file.size_display());
        for (label, value) in report.media.rows() {
            println!("{}: {}", label, value);
        }
    }
    Ok(())
}

async fn thumbnail_file(config_path: Option<&Path>, file: &Path, output: &Path) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = config.tools.resolve();
    let extractor = ThumbnailExtractor::new(tools.ffmpeg)
        .with_options(config.thumbnails.options(config.jobs.thumbnail_timeout_secs));

    let thumb = extractor.extract(file, None).await?;
    thumb.save(output)?;
    println!(
        "Saved {}x{} thumbnail to {}",
        thumb.width,
        thumb.height,
        output.display()
    );
    Ok(())
}

async fn extensions(config_path: Option<&Path>, action: ExtensionsAction) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut app = App::from_config(config);
    app.start();

    match action {
        ExtensionsAction::List => {
            let rows = app.extensions().list();
            if rows.is_empty() {
                println!(
                    "No extensions found in {}",
                    app.extensions().registry().dir().display()
                );
            }
            for row in rows {
                let mark = if row.enabled { "x" } else { " " };
                let state = if row.loaded { "loaded" } else { "not loaded" };
                print!("[{}] {} ({}) - {}", mark, row.name, state, row.source_path.display());
                if let Some(description) = row.description {
                    print!(": {}", description);
                }
                println!();
            }
        }
        ExtensionsAction::Enable { names } => {
            print_bulk("Enabled", &app.set_extensions_enabled(&names, true));
        }
        ExtensionsAction::Disable { names } => {
            print_bulk("Disabled", &app.set_extensions_enabled(&names, false));
        }
        ExtensionsAction::Reload => {
            print_bulk("Reloaded", &app.reload_extensions());
        }
        ExtensionsAction::Install { files } => {
            print_bulk("Installed", &app.install_extensions(&files));
        }
        ExtensionsAction::Remove { names } => {
            print_bulk("Removed", &app.remove_extensions(&names));
        }
        ExtensionsAction::InstallBundled => {
            let written = app.install_bundled_extensions()?;
            if written.is_empty() {
                println!("Bundled extensions already installed");
            }
            for name in written {
                println!("Installed {}", name);
            }
        }
    }

    print_alerts(&app);
    app.shutdown().await;
    Ok(())
}

async fn run_command(
    config_path: Option<&Path>,
    command: &str,
    files: &[PathBuf],
    args: Vec<(String, String)>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let mut app = App::from_config(config);
    app.start();

    app.select(expand_inputs(files));
    let args: CommandArgs = args.into_iter().collect();
    let result = app.run_command(command, &args);

    print_alerts(&app);
    app.shutdown().await;

    println!("{}", result?);
    Ok(())
}

async fn tags(config_path: Option<&Path>, action: TagsAction) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let tools = config.tools.resolve();
    let editor = TagEditor::new(tools.ffmpeg).with_timeout(config.jobs.tag_timeout());

    let report = match action {
        TagsAction::Clear { files } => editor.clear_all(&expand_inputs(files)).await,
        TagsAction::Edit {
            files,
            title,
            comment,
            language,
            rename,
        } => {
            let edit = TagEdit {
                title,
                comment,
                language,
                rename,
            };
            if edit.is_empty() {
                bail!("Nothing to edit: pass --title, --comment, --language or --rename");
            }
            editor.edit_all(&expand_inputs(files), &edit).await
        }
    };

    for (path, error) in &report.failures {
        eprintln!("✗ {}: {}", path.display(), error);
    }
    println!("Updated {} files", report);
    if report.ok < report.total {
        bail!("{} of {} files failed", report.total - report.ok, report.total);
    }
    Ok(())
}

fn print_bulk(verb: &str, report: &BulkReport) {
    for (name, detail) in &report.failures {
        eprintln!("✗ {}: {}", name, detail);
    }
    println!("{} {} extensions", verb, report);
}

fn print_alerts(app: &App) {
    for alert in app.host().take_alerts() {
        eprintln!("✗ {}\n  {}", alert.title, alert.detail);
    }
}

fn check_external_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = check_tools(&config.tools.resolve());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Probing and thumbnails need ffprobe and ffmpeg.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Extensions dir: {}", config.extensions.dir.display());
    println!("  Settings file: {}", config.settings.path.display());
    println!("  Max concurrent jobs: {}", config.jobs.max_concurrent);
    println!(
        "  Timeouts: probe {}s, fallback {}s, thumbnail {}s, tags {}s",
        config.jobs.probe_timeout_secs,
        config.jobs.fallback_timeout_secs,
        config.jobs.thumbnail_timeout_secs,
        config.jobs.tag_timeout_secs
    );
    println!(
        "  Thumbnails: {}x{}",
        config.thumbnails.width, config.thumbnails.height
    );
    println!("  Status bar: {}", config.ui.status_bar);

    Ok(())
}
