use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use snapfind::core::indexer::{IndexProgress, ProgressObserver};
use snapfind::{AppConfig, IndexError, Library, Match};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "snapfind", version, about = "Index folders of images and find look-alikes")]
struct Cli {
    /// Database file (default: <data dir>/snapfind/snapfind.db)
    #[arg(long, global = true, value_name = "FILE", env = "SNAPFIND_DB")]
    db: Option<PathBuf>,

    /// JSON config file (default: <config dir>/snapfind/config.json if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every image under a folder
    Index {
        /// Folder to index
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },

    /// Find the closest matches to an image
    Search {
        /// Query image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        /// Print matches as JSON
        #[arg(long)]
        json: bool,
    },

    /// Work with indexed folders
    Roots {
        #[command(subcommand)]
        command: RootsCmd,
    },

    /// Show store statistics
    Stats,
}

#[derive(Subcommand, Debug)]
enum RootsCmd {
    /// List indexed folders with their image counts
    List,

    /// Forget a folder and delete all of its records
    Remove {
        /// Folder to remove
        #[arg(value_name = "DIR")]
        path: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Drives an indicatif bar from indexer progress.
struct BarObserver {
    bar: ProgressBar,
}

impl ProgressObserver for BarObserver {
    fn on_progress(&self, progress: &IndexProgress) {
        self.bar.set_length(progress.total_files as u64);
        self.bar.set_position(progress.files_processed as u64);
        let eta = progress
            .estimated_time_remaining
            .map(|d| format!("~{}s left", d.as_secs()))
            .unwrap_or_default();
        self.bar
            .set_message(format!("{} {}", progress.current_file, eta));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    let library = Library::open(config).context("Failed to open the image database")?;

    match cli.command {
        Commands::Index { path } => index(&library, path)?,

        Commands::Search { image, json } => {
            let matches = benchmark("search", || library.search_file(&image))
                .with_context(|| format!("Search with {} failed", image.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_matches(&matches);
            }
        }

        Commands::Roots { command } => match command {
            RootsCmd::List => {
                let roots = library.roots()?;
                if roots.is_empty() {
                    println!("No folders indexed yet.");
                }
                for root in roots {
                    println!("📁 {} ({} images)", root.path, root.image_count);
                }
            }

            RootsCmd::Remove { path, yes } => {
                let count = library.count_under(&path)?;
                let confirmed = yes
                    || Confirm::new()
                        .with_prompt(format!(
                            "Remove {} and delete {} indexed record(s)?",
                            path.display(),
                            count
                        ))
                        .default(false)
                        .interact()?;
                if !confirmed {
                    println!("Nothing removed.");
                    return Ok(());
                }
                let deleted = library
                    .delete_root(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                println!("🗑️  Removed {} ({} records deleted)", path.display(), deleted);
            }
        },

        Commands::Stats => {
            let stats = library.stats()?;
            if let Some(db_path) = library.database().path() {
                println!("Database:      {}", db_path.display());
            }
            println!("Folders:       {}", stats.roots);
            println!("Images:        {}", stats.records);
            println!("Searchable:    {}", stats.hashed_records);
            println!("Size on disk:  {} KiB", stats.size_on_disk / 1024);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn index(library: &Library, path: PathBuf) -> Result<()> {
    println!("▶ Indexing: {}", path.display());

    let token = library.cancellation_token();
    ctrlc::set_handler(move || token.store(true, Ordering::Relaxed))
        .context("Failed to install Ctrl-C handler")?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    let observer: Arc<dyn ProgressObserver> = Arc::new(BarObserver { bar: bar.clone() });

    let result = benchmark("indexing", || library.index_folder(&path, Some(observer)));
    bar.finish_and_clear();

    match result {
        Ok(summary) => {
            println!(
                "✅ Indexed {} of {} new file(s) ({} skipped)",
                summary.indexed, summary.total, summary.failed
            );
            Ok(())
        }
        Err(IndexError::Cancelled { committed }) => {
            println!("⚠️  Cancelled; {} file(s) were indexed before stopping", committed);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Indexing {} failed", path.display())),
    }
}

fn print_matches(matches: &[Match]) {
    if matches.is_empty() {
        println!("No matches found.");
        return;
    }
    for (i, m) in matches.iter().enumerate() {
        println!(
            "{:>3}. [{:>4.1}] {}x{} {:>8} KiB  {}",
            i + 1,
            m.distance,
            m.width,
            m.height,
            m.file_size / 1024,
            m.path
        );
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
