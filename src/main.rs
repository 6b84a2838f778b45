mod archive;
mod config;
mod core;
mod decoder;
mod discord;
mod ui;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, SystemTime};

use crate::archive::{booth, unitypackage};
use crate::config::Config;
use crate::core::pipeline;
use crate::core::session::SessionName;

#[derive(Parser)]
#[command(author, version, about = "VRChat content toolkit: 360° frame extraction, face blur, perspective views, asset unpacking", long_about = None)]
struct Cli {
    /// TOML config file (defaults to ./vrckit.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Root holding input/ and output/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Keep existing outputs instead of overwriting them
    #[arg(long, global = true)]
    no_overwrite: bool,
    /// Yaw step in degrees for the dense preset
    #[arg(long, global = true)]
    ring_step: Option<u32>,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract frames from a 360° video into a new session folder
    Extract {
        /// Video file, relative to the input folder
        video: PathBuf,
        /// Keep every K-th frame
        #[arg(short, long, default_value_t = 1)]
        interval: u64,
    },
    /// Blur faces in a session's extracted frames
    Blur {
        /// Session folder name under the output folder
        folder: String,
        /// Blur kernel size (rounded up to odd)
        #[arg(short, long)]
        strength: Option<i32>,
    },
    /// Convert a session's frames into flat perspective views
    Convert {
        folder: String,
        /// Use the dense ring preset instead of rc14
        #[arg(long)]
        dense: bool,
    },
    /// extract, optional blur, then convert
    Pipeline {
        video: PathBuf,
        #[arg(long)]
        blur: bool,
        #[arg(long)]
        dense: bool,
    },
    /// Restore the files inside a .unitypackage
    Unpack {
        package: PathBuf,
        /// Destination (defaults to unipack_<name> next to the package)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract downloaded zips into folders named by the download index
    Booth {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = booth::DEFAULT_INDEX_NAME)]
        index: String,
    },
    /// Move downloaded files into folders named by the download index
    Sort {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[arg(long, default_value = booth::DEFAULT_INDEX_NAME)]
        index: String,
    },
    /// Post screenshots to a Discord webhook in size-limited batches
    Discord(DiscordArgs),
    /// Detect platform info
    Detect,
    /// Interactive Mode (Menu)
    Interactive,
}

#[derive(Args)]
struct DiscordArgs {
    #[arg(long, env = discord::WEBHOOK_ENV, hide_env_values = true)]
    webhook_url: Option<String>,
    /// Screenshot folder (auto-detected when omitted)
    #[arg(long)]
    screenshots_dir: Option<PathBuf>,
    /// Only images modified within the last N days
    #[arg(long)]
    since_days: Option<u64>,
    #[arg(long)]
    recursive: bool,
    #[arg(long, default_value_t = discord::batch::DEFAULT_MAX_BYTES)]
    max_bytes: u64,
    #[arg(long, default_value_t = discord::batch::DEFAULT_MAX_FILES)]
    max_files: usize,
    #[arg(long)]
    username: Option<String>,
    #[arg(long, default_value = "VRChat screenshots ")]
    message_prefix: String,
    /// Show the batches without sending
    #[arg(long)]
    dry_run: bool,
    #[arg(long, default_value_t = 1.0)]
    sleep_sec: f64,
}

/// Stage failure.
const EXIT_FAILURE: u8 = 1;
/// Discord invocation without a usable webhook or folder.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match utils::logging::init(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("❌ {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.no_overwrite {
        config.overwrite = false;
    }
    if let Some(step) = cli.ring_step {
        config.ring_step_deg = step;
    }
    Ok(config)
}

fn session_arg(raw: &str) -> Result<SessionName> {
    SessionName::parse_user_input(raw).with_context(|| format!("Rejected session folder {raw:?}"))
}

fn run(cli: Cli) -> Result<ExitCode> {
    // Session names are checked before the config file or any folder is read.
    if let Commands::Blur { folder, .. } | Commands::Convert { folder, .. } = &cli.command {
        session_arg(folder)?;
    }
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Extract { video, interval } => {
            let summary = pipeline::run_extract(&config, &video, interval)?;
            println!("📁 Session folder: {}", summary.session_dir.display());
        }
        Commands::Blur { folder, strength } => {
            let session = session_arg(&folder)?;
            let strength = strength.unwrap_or(config.blur_strength);
            let summary = pipeline::run_blur(&config, &session, strength)?;
            println!(
                "✅ Face blur finished: {} images, {} faces",
                summary.processed, summary.faces
            );
        }
        Commands::Convert { folder, dense } => {
            let session = session_arg(&folder)?;
            pipeline::run_convert(&config, &session, dense)?;
        }
        Commands::Pipeline { video, blur, dense } => {
            let report = pipeline::run_pipeline(&config, &video, blur, dense)?;
            println!(
                "🎉 Pipeline finished: {} frames -> {} views ({})",
                report.extracted, report.convert.written, report.session
            );
        }
        Commands::Unpack { package, output } => {
            if !package.is_file() {
                anyhow::bail!("Package not found: {}", package.display());
            }
            let output = output.unwrap_or_else(|| unitypackage::default_output_dir(&package));
            let summary = unitypackage::extract(&package, &output)?;
            println!(
                "✅ Unpacked {} assets into {} ({} skipped)",
                summary.restored,
                output.display(),
                summary.skipped
            );
        }
        Commands::Booth { dir, index } => {
            booth::process_folder(&dir, &index)?;
        }
        Commands::Sort { dir, index } => {
            let summary = booth::sort_by_index(&dir, &index)?;
            println!(
                "✅ Sorted {} files ({} missing)",
                summary.moved, summary.missing
            );
        }
        Commands::Discord(args) => return run_discord(args),
        Commands::Detect => {
            let info = utils::platform::PlatformInfo::detect(&config);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Interactive => {
            ui::menu::run_menu(&config)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn usage_error(message: &str) -> Result<ExitCode> {
    eprintln!("Error: {message}");
    Ok(ExitCode::from(EXIT_USAGE))
}

fn resolve_screenshots_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(dir) => Some(dir.to_path_buf()),
        None => discord::find_existing_dir(&discord::guess_screenshot_dirs()),
    }
}

fn run_discord(args: DiscordArgs) -> Result<ExitCode> {
    let Some(webhook_url) = args.webhook_url.filter(|u| !u.trim().is_empty()) else {
        return usage_error(&format!(
            "--webhook-url is required (or set {})",
            discord::WEBHOOK_ENV
        ));
    };
    let Some(dir) = resolve_screenshots_dir(args.screenshots_dir.as_deref()) else {
        return usage_error(&format!(
            "Could not auto-detect the screenshots folder. Pass --screenshots-dir or set {}",
            discord::SCREENSHOTS_ENV
        ));
    };
    if !dir.is_dir() {
        return usage_error(&format!("screenshots dir not found: {}", dir.display()));
    }

    let since = args
        .since_days
        .map(|days| discord::since_cutoff(SystemTime::now(), days));
    let images = discord::collect_images(&dir, args.recursive, since)?;
    if images.is_empty() {
        println!("No images matched.");
        return Ok(ExitCode::SUCCESS);
    }

    let options = discord::SendOptions {
        max_bytes: args.max_bytes,
        max_files: args.max_files,
        message_prefix: args.message_prefix,
        username: args.username,
        sleep: Duration::from_secs_f64(args.sleep_sec.max(0.0)),
        ..discord::SendOptions::default()
    };

    if args.dry_run {
        println!("[DRY RUN] screenshots_dir={}", dir.display());
        let chunks = discord::chunk_files_by_size(
            &images,
            options.max_bytes,
            options.max_files,
            options.overhead,
        );
        discord::batch::print_plan(&images, &chunks);
        return Ok(ExitCode::SUCCESS);
    }

    let client = discord::WebhookClient::new(&webhook_url)?;
    discord::send_batched(&client, &images, &options)?;
    Ok(ExitCode::SUCCESS)
}
