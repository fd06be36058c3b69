use std::io::Write;

use anyhow::{bail, Context};
use colored::Colorize;
use ichnaea_sdk::{
    ChangeKind, CommitId, DatasetPath, DiffTarget, Ichnaea, IchnaeaConfig, IngestRequest,
    Repository, SyncStatus,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(&cli)?;
    if let Command::Ingest(args) = &cli.command {
        config.notarize.enabled |= args.notarize;
    }
    let client = Ichnaea::open(config).context("failed to open repository")?;
    let json = matches!(cli.format, OutputFormat::Json);

    match cli.command {
        Command::Ingest(args) => cmd_ingest(&client, args, json).await,
        Command::Log(args) => cmd_log(&client, args, json),
        Command::Show(args) => cmd_show(&client, args).await,
        Command::Diff(args) => cmd_diff(&client, args, json).await,
        Command::Sync(args) => cmd_sync(&client, args, json).await,
        Command::Verify(args) => cmd_verify(&client, args, json).await,
        Command::Paths(_) => cmd_paths(&client, json),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<IchnaeaConfig> {
    let mut config = match &cli.config {
        Some(path) => IchnaeaConfig::load(path)?,
        None => IchnaeaConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    Ok(config)
}

/// Token cancelled on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn dataset_path(raw: &str) -> anyhow::Result<DatasetPath> {
    DatasetPath::new(raw).with_context(|| format!("invalid dataset path {raw:?}"))
}

/// Accept a full commit id or a unique prefix of one on `path`.
fn resolve_commit(repo: &Repository, path: &DatasetPath, raw: &str) -> anyhow::Result<CommitId> {
    if let Ok(id) = CommitId::from_hex(raw) {
        return Ok(id);
    }
    let prefix = raw.to_ascii_lowercase();
    let matches: Vec<CommitId> = repo
        .log(path)?
        .into_iter()
        .map(|r| r.commit_id)
        .filter(|id| id.to_hex().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no commit matching {raw:?} on {path}"),
        _ => bail!("commit prefix {raw:?} is ambiguous on {path}"),
    }
}

async fn cmd_ingest(client: &Ichnaea, args: IngestArgs, json: bool) -> anyhow::Result<()> {
    let mut request = IngestRequest::new(args.name, args.locator);
    if let Some(message) = args.message {
        request = request.with_message(message);
    }
    let outcome = client.ingest(&request, &interrupt_token()).await?;

    let receipt = if client.config().notarize.enabled {
        match client.notarize(&outcome.record).await {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                eprintln!("{} notarization failed: {e}", "warning:".yellow().bold());
                None
            }
        }
    } else {
        None
    };

    if json {
        #[derive(Serialize)]
        struct Ingested<'a> {
            #[serde(flatten)]
            outcome: &'a ichnaea_sdk::IngestOutcome,
            notarization: Option<&'a ichnaea_sdk::AnchorReceipt>,
        }
        return print_json(&Ingested {
            outcome: &outcome,
            notarization: receipt.as_ref(),
        });
    }

    let record = &outcome.record;
    println!("{} Committed {}", "✓".green().bold(), record.path.to_string().bold());
    println!("  Commit:  {}", record.commit_id.to_hex().yellow());
    println!("  Hash:    {}", record.content_hash.to_hex().cyan());
    println!("  Size:    {} bytes", record.size);
    println!("  Seq:     {}", record.seq);
    println!("  Dataset: {}", outcome.dataset.id);
    match &outcome.sync {
        SyncStatus::Skipped => {}
        SyncStatus::Synced { report } => println!("  Sync:    {} ({} records)", "pushed".green(), report.records_pushed),
        SyncStatus::Failed { error } => println!("  Sync:    {} ({error})", "pending".yellow()),
    }
    if let Some(receipt) = receipt {
        println!("  Notary:  {}", receipt.receipt_id.to_string().blue());
    }
    Ok(())
}

fn cmd_log(client: &Ichnaea, args: LogArgs, json: bool) -> anyhow::Result<()> {
    let path = dataset_path(&args.path)?;
    let records: Vec<_> = client
        .repository()
        .log(&path)?
        .into_iter()
        .take(args.limit)
        .collect();

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No versions of {}.", path.to_string().bold());
        return Ok(());
    }
    for record in &records {
        println!(
            "{}  {}  {}",
            format!("#{}", record.seq).yellow().bold(),
            record.commit_id.short_hex().dimmed(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        println!("  {}", record.message);
        println!("  {} {} bytes", record.content_hash.short_hex().cyan(), record.size);
    }
    Ok(())
}

async fn cmd_show(client: &Ichnaea, args: ShowArgs) -> anyhow::Result<()> {
    let path = dataset_path(&args.path)?;
    let commit = resolve_commit(client.repository(), &path, &args.commit)?;
    let data = client.repository().resolve(&commit, &path).await?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(())
}

async fn cmd_diff(client: &Ichnaea, args: DiffArgs, json: bool) -> anyhow::Result<()> {
    let path = dataset_path(&args.path)?;
    let a = resolve_commit(client.repository(), &path, &args.commit_a)?;
    let b = resolve_commit(client.repository(), &path, &args.commit_b)?;

    if args.raw {
        let diff = client.raw_diff(DiffTarget::Path(path), a, b).await?;
        if json {
            return print_json(&diff);
        }
        if diff.is_empty() {
            println!("No changes.");
        } else {
            print!("{}", diff.render());
        }
        return Ok(());
    }

    let result = client.diff(DiffTarget::Path(path), a, b, args.as_format).await?;
    if json {
        return print_json(&result);
    }
    if result.diff.is_unchanged() {
        println!("No changes.");
        return Ok(());
    }
    println!(
        "{} {} ({}): {} {}",
        "diff".bold(),
        result.path,
        result.format,
        format!("+{}", result.diff.additions()).green(),
        format!("-{}", result.diff.removals()).red(),
    );
    for segment in result.diff.segments() {
        for line in &segment.lines {
            let rendered = format!("{}{line}", segment.kind.marker());
            match segment.kind {
                ChangeKind::Added => println!("{}", rendered.green()),
                ChangeKind::Removed => println!("{}", rendered.red()),
                ChangeKind::Equal => println!("{rendered}"),
            }
        }
    }
    Ok(())
}

async fn cmd_sync(client: &Ichnaea, args: SyncArgs, json: bool) -> anyhow::Result<()> {
    let path = dataset_path(&args.path)?;
    let report = client.sync(&path, &interrupt_token()).await?;
    if json {
        return print_json(&report);
    }
    if report.records_pushed == 0 {
        println!("{} is up to date.", path.to_string().bold());
    } else {
        println!(
            "{} Pushed {} records and {} objects for {}",
            "✓".green().bold(),
            report.records_pushed,
            report.objects_pushed,
            path.to_string().bold()
        );
    }
    Ok(())
}

async fn cmd_verify(client: &Ichnaea, args: VerifyArgs, json: bool) -> anyhow::Result<()> {
    let path = dataset_path(&args.path)?;
    let report = client.repository().verify(&path).await?;
    if json {
        print_json(&report)?;
    } else if report.is_ok() {
        println!(
            "{} {}: {} versions verified",
            "✓".green().bold(),
            path.to_string().bold(),
            report.records_checked
        );
    } else {
        println!("{} {}", "✗".red().bold(), path.to_string().bold());
        for problem in &report.problems {
            println!("  {}", serde_json::to_string(problem)?.red());
        }
    }
    if !report.is_ok() {
        bail!("{} integrity problems on {path}", report.problems.len());
    }
    Ok(())
}

fn cmd_paths(client: &Ichnaea, json: bool) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct PathSummary {
        path: DatasetPath,
        versions: u64,
        head: Option<CommitId>,
        unsynced: usize,
    }

    let repo = client.repository();
    let mut summaries = Vec::new();
    for path in repo.paths()? {
        summaries.push(PathSummary {
            versions: repo.commit_count(&path)?,
            head: repo.head(&path)?.map(|r| r.commit_id),
            unsynced: repo.unsynced(&path)?.len(),
            path,
        });
    }

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No datasets tracked.");
    }
    for summary in &summaries {
        let head = summary.head.map(|h| h.short_hex()).unwrap_or_default();
        let sync = if summary.unsynced == 0 {
            "synced".green()
        } else {
            format!("{} unsynced", summary.unsynced).yellow()
        };
        println!(
            "{}  {} versions  {}  {}",
            summary.path.to_string().bold(),
            summary.versions,
            head.dimmed(),
            sync
        );
    }
    Ok(())
}
