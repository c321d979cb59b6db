use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser, Subcommand};
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use snapship::Config;
use snapship::capture::Region;
use snapship::daemon::Daemon;
use snapship::notification::{DesktopNotifier, Notifier, SilentNotifier};
use snapship::transport::CancelToken;
use snapship::upload::{
    ProgressFn, UploadContext, UploadOutcome, UploadRequest, perform_upload, report_outcome,
};

#[derive(Parser, Debug)]
#[command(name = "snapship")]
#[command(
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SNAPSHIP_GIT_HASH"), ")"),
    about = "Capture a screen region, files or the clipboard and upload it over FTP(S)"
)]
struct Cli {
    /// Run as daemon (global shortcuts from stdin, SIGUSR1 region, SIGUSR2 clipboard)
    #[arg(long, short = 'd', action = ArgAction::SetTrue)]
    daemon: bool,

    /// Write a default config file and exit
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "daemon")]
    init_config: bool,

    /// Config file to use instead of the default location
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload files; several paths or a directory are zipped first.
    /// Without paths a file chooser opens.
    Files { paths: Vec<PathBuf> },
    /// Upload a screen region
    Region {
        /// Region as "x,y WxH"; selected interactively when omitted
        #[arg(long, short = 'g', value_name = "GEOMETRY")]
        geometry: Option<Region>,
    },
    /// Upload the entire screen
    Screen,
    /// Upload the clipboard contents
    Clipboard,
}

impl Command {
    fn into_request(self) -> UploadRequest {
        match self {
            Command::Files { paths } if paths.is_empty() => UploadRequest::ChooseFiles,
            Command::Files { paths } => UploadRequest::Files(paths),
            Command::Region { geometry } => UploadRequest::Region(geometry),
            Command::Screen => UploadRequest::Screen,
            Command::Clipboard => UploadRequest::Clipboard,
        }
    }
}

fn needs_wayland(request: &UploadRequest) -> bool {
    !matches!(request, UploadRequest::Files(_))
}

fn require_wayland() -> anyhow::Result<()> {
    if std::env::var("WAYLAND_DISPLAY").is_err() {
        log::error!("WAYLAND_DISPLAY not set - this command requires Wayland.");
        log::error!("Please run on a wlroots-based compositor (Hyprland, Sway, etc.).");
        return Err(anyhow!("WAYLAND_DISPLAY not set"));
    }
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.init_config {
        let path = Config::create_default_file()?;
        println!("Wrote default configuration to {}", path.display());
        println!("Edit [destination] before the first upload.");
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;

    if cli.daemon {
        require_wayland()?;
        log::info!("Starting in daemon mode");
        let mut daemon = Daemon::new(config, cli.config);
        return daemon.run();
    }

    let Some(command) = cli.command else {
        println!("snapship: capture and upload to an FTP(S) host");
        println!();
        println!("Usage:");
        println!("  snapship files [PATH]...     Upload files (zipped when several)");
        println!("  snapship region [-g GEOM]    Upload a screen region");
        println!("  snapship screen              Upload the entire screen");
        println!("  snapship clipboard           Upload the clipboard contents");
        println!("  snapship --daemon            Run in the background");
        println!("  snapship --init-config       Write a default config file");
        println!("  snapship --help              Show help");
        return Ok(());
    };

    let request = command.into_request();
    if needs_wayland(&request) {
        require_wayland()?;
    }
    upload_once(request, &config)
}

/// One capture-and-upload, with Ctrl-C stopping the transfer.
fn upload_once(request: UploadRequest, config: &Config) -> anyhow::Result<()> {
    let cancel = CancelToken::new();
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handler")?;
    let signal_cancel = cancel.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            log::info!("Received signal {} - stopping upload", sig);
            signal_cancel.cancel();
        }
    });

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let context = UploadContext::from_config(config);
    let notifier: Arc<dyn Notifier> = if config.general.notifications {
        Arc::new(DesktopNotifier)
    } else {
        Arc::new(SilentNotifier)
    };
    let progress: ProgressFn = Arc::new(|percent| log::info!("Sent: {}%", percent));

    let outcome = runtime.block_on(async {
        let outcome =
            UploadOutcome::from(perform_upload(request, &context, cancel, Some(progress)).await);
        report_outcome(notifier.as_ref(), &outcome).await;
        outcome
    });

    match outcome {
        UploadOutcome::Success(result) => {
            println!("{}", result.url);
            if let Some(copy) = result.saved_copy {
                log::info!("Local copy: {}", copy.display());
            }
            Ok(())
        }
        UploadOutcome::Cancelled(reason) => {
            println!("Upload cancelled: {}", reason);
            Ok(())
        }
        UploadOutcome::Failed { title, message } => Err(anyhow!("{}: {}", title, message)),
    }
}
