//! mlrepo: upload, list, download and delete ML models and datasets.
//!
//! Configuration comes from the environment (or a `.env` file): DATABASE_URL,
//! STORAGE_BACKEND and the matching S3_* / LOCAL_STORAGE_* variables.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mlrepo_cli::{download_target, init_tracing, render_table, HttpSaveAs};
use mlrepo_core::models::{FileCategory, ListQuery, SortKey, TypeFilter, UploadRecord};
use mlrepo_core::{AppError, Config, ErrorMetadata};
use mlrepo_db::{PgUploadRepository, UploadRepository};
use mlrepo_services::{
    CandidateFile, DeleteOutcome, FileOutcome, FileRegistryViewer, RefreshSignal,
    UploadCoordinator,
};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mlrepo", about = "Share ML models and datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files as models or datasets
    Upload {
        /// Category: model or dataset
        #[arg(long)]
        category: FileCategory,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List uploaded files
    List {
        /// Filter by type: all, model, dataset
        #[arg(long, default_value = "all")]
        r#type: TypeFilter,
        /// Sort order: newest, oldest, name, size
        #[arg(long, default_value = "newest")]
        sort: SortKey,
        /// Case-insensitive file name search
        #[arg(long, default_value = "")]
        search: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Download a file by ID
    Download {
        /// Upload UUID
        id: Uuid,
        /// Directory to write the file into
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Delete a file by ID (storage first, then its registry entry)
    Delete {
        /// Upload UUID
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Apply database migrations
    Migrate,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Turn an `AppError` into the user-facing message.
fn report(err: AppError) -> anyhow::Error {
    anyhow::anyhow!("{} [{}]", err.client_message(), err.error_code())
}

struct Backends {
    config: Config,
    storage: Arc<dyn mlrepo_storage::Storage>,
    uploads: Arc<dyn UploadRepository>,
}

async fn connect(config: Config) -> anyhow::Result<Backends> {
    let storage = mlrepo_storage::create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;
    let pool = mlrepo_db::connect(&config).await?;
    let uploads: Arc<dyn UploadRepository> = Arc::new(PgUploadRepository::new(pool));
    Ok(Backends {
        config,
        storage,
        uploads,
    })
}

async fn find_record(uploads: &dyn UploadRepository, id: Uuid) -> anyhow::Result<UploadRecord> {
    uploads
        .get(id)
        .await
        .map_err(report)?
        .ok_or_else(|| report(AppError::NotFound(format!("No upload with id {}", id))))
}

fn confirm_on_stdin(record: &UploadRecord) -> bool {
    print!(
        "Delete {} ({}) from {}? [y/N] ",
        record.file_name, record.id, record.bucket
    );
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

async fn upload(
    backends: Backends,
    category: FileCategory,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let signal = RefreshSignal::new();
    let mut coordinator = UploadCoordinator::from_config(
        backends.storage.clone(),
        backends.uploads.clone(),
        &backends.config,
    );
    coordinator.subscribe(Arc::new(signal.clone()));
    let mut viewer = FileRegistryViewer::new(backends.storage, backends.uploads)
        .with_refresh_signal(&signal)
        .with_query(ListQuery {
            filter: category.into(),
            ..ListQuery::default()
        });

    let mut candidates = Vec::with_capacity(files.len());
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", path.display()))?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        candidates.push(CandidateFile::new(name, data));
    }

    let staged = coordinator.stage(candidates, category);
    for rejection in &staged.rejected {
        eprintln!("Skipped: {}", rejection.error.client_message());
    }

    let summary = coordinator.commit().await.map_err(report)?;

    for outcome in &summary.outcomes {
        match outcome {
            FileOutcome::Persisted { record, .. } => {
                println!("Uploaded {} ({})", record.file_name, record.id);
            }
            FileOutcome::Failed {
                file_name, error, ..
            } => {
                eprintln!("Failed {}: {}", file_name, error.client_message());
            }
        }
    }
    println!("{}", summary);

    if viewer.poll_refresh().await {
        println!("\nAll {} files:", category);
        print!("{}", render_table(viewer.entries()));
    }

    if !summary.all_succeeded() {
        anyhow::bail!("{} of {} files failed", summary.failed(), summary.attempted);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Upload { category, files } => {
            let backends = connect(config).await?;
            upload(backends, category, files).await?;
        }
        Commands::List {
            r#type,
            sort,
            search,
            format,
        } => {
            let backends = connect(config).await?;
            let viewer = FileRegistryViewer::new(backends.storage, backends.uploads);
            let query = ListQuery {
                filter: r#type,
                sort,
                search,
            };
            let records = viewer.list(&query).await.map_err(report)?;
            match format {
                OutputFormat::Json => print_json(&records)?,
                OutputFormat::Table => print!("{}", render_table(&records)),
            }
        }
        Commands::Download { id, out } => {
            let backends = connect(config).await?;
            let record = find_record(backends.uploads.as_ref(), id).await?;
            let viewer = FileRegistryViewer::new(backends.storage, backends.uploads);
            let sink = HttpSaveAs::new(out.clone());
            let ticket = viewer.download(&record, &sink).await.map_err(report)?;
            let saved_as = download_target(&out, &ticket.suggested_name).map_err(report)?;
            print_json(&serde_json::json!({
                "url": ticket.url,
                "saved_as": saved_as.display().to_string(),
            }))?;
        }
        Commands::Delete { id, yes } => {
            let backends = connect(config).await?;
            let record = find_record(backends.uploads.as_ref(), id).await?;
            let mut viewer = FileRegistryViewer::new(backends.storage, backends.uploads);
            let confirm = |r: &UploadRecord| yes || confirm_on_stdin(r);
            match viewer.delete(&record, &confirm).await.map_err(report)? {
                DeleteOutcome::Declined => println!("Cancelled"),
                DeleteOutcome::Deleted => println!("Deleted {} ({})", record.file_name, id),
            }
        }
        Commands::Migrate => {
            let pool = mlrepo_db::connect(&config).await?;
            mlrepo_db::run_migrations(&pool).await?;
            println!("Migrations applied");
        }
    }

    Ok(())
}
