/// Daemon mode: global shortcuts and signals trigger uploads in the background
use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2};
use signal_hook::iterator::Signals;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::notification::{DesktopNotifier, Notifier, SilentNotifier};
use crate::shortcut::{Dispatch, KeyEvent, ShortcutListener, ShortcutMatcher};
use crate::upload::{UploadContext, UploadManager, UploadRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Work for the daemon loop, produced by the signal and shortcut threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Upload(UploadRequest),
    Reload,
    Quit,
}

/// What a delivered signal asks the daemon to do.
pub fn command_for_signal(signal: i32) -> Option<DaemonCommand> {
    match signal {
        SIGUSR1 => Some(DaemonCommand::Upload(UploadRequest::Region(None))),
        SIGUSR2 => Some(DaemonCommand::Upload(UploadRequest::Clipboard)),
        SIGHUP => Some(DaemonCommand::Reload),
        SIGINT | SIGTERM => Some(DaemonCommand::Quit),
        _ => None,
    }
}

/// Forward `down <code>` / `up <code>` lines to the shortcut listener.
///
/// Returns when the input ends or the listener is gone. Malformed lines are
/// skipped.
pub fn feed_key_events(input: impl BufRead, keys: Sender<KeyEvent>) -> usize {
    let mut forwarded = 0;
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read key events: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<KeyEvent>() {
            Ok(event) => {
                if keys.send(event).is_err() {
                    debug!("Shortcut listener stopped; no longer reading key events");
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!("{}", e),
        }
    }
    forwarded
}

pub struct Daemon {
    config: Config,
    config_path: Option<PathBuf>,
    should_quit: Arc<AtomicBool>,
}

impl Daemon {
    /// `config_path` is re-read on SIGHUP; `None` means the default location.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
            should_quit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run until SIGINT or SIGTERM.
    pub fn run(&mut self) -> Result<()> {
        info!("Starting snapship daemon");
        info!("Send SIGUSR1 for a region capture, SIGUSR2 to upload the clipboard");
        info!("Key events are read from stdin as 'down <code>' / 'up <code>' lines");

        let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
        let notifier: Arc<dyn Notifier> = if self.config.general.notifications {
            Arc::new(DesktopNotifier)
        } else {
            Arc::new(SilentNotifier)
        };
        let manager = UploadManager::new(runtime.handle(), notifier);

        let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>();

        let mut signals = Signals::new([SIGUSR1, SIGUSR2, SIGHUP, SIGTERM, SIGINT])
            .context("Failed to register signal handler")?;
        let signal_tx = command_tx.clone();
        // Lives until process exit; the iterator has no clean way to stop.
        thread::spawn(move || {
            for sig in signals.forever() {
                match command_for_signal(sig) {
                    Some(command) => {
                        info!("Received signal {} - {:?}", sig, command);
                        if signal_tx.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!("Received unexpected signal: {}", sig),
                }
            }
        });

        let listener = self.start_shortcuts(command_tx.clone())?;
        let keys = listener.sender();
        thread::Builder::new()
            .name("snapship-keys".to_string())
            .spawn(move || {
                let forwarded = feed_key_events(io::stdin().lock(), keys);
                debug!("Key event input closed after {} events", forwarded);
            })
            .context("Failed to start key event reader")?;
        drop(command_tx);

        info!("Daemon ready");

        loop {
            if self.should_quit.load(Ordering::Acquire) {
                break;
            }

            match command_rx.recv_timeout(POLL_INTERVAL) {
                Ok(DaemonCommand::Upload(request)) => {
                    let context = UploadContext::from_config(&self.config);
                    if let Err(e) = manager.request_upload(request, context) {
                        warn!("Could not queue upload: {}", e);
                    }
                }
                Ok(DaemonCommand::Reload) => {
                    if let Err(e) = self.reload(&listener) {
                        warn!("Keeping previous configuration: {:#}", e);
                    }
                }
                Ok(DaemonCommand::Quit) => {
                    info!("Quit signal received - exiting daemon");
                    self.should_quit.store(true, Ordering::Release);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(anyhow!("All daemon command sources stopped"));
                }
            }
        }

        info!("Daemon shutting down");
        manager.cancel();
        // The stdin reader may still hold a sender, so the listener is not joined.
        drop(listener);
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        Ok(())
    }

    fn start_shortcuts(&self, commands: Sender<DaemonCommand>) -> Result<ShortcutListener> {
        let chords = self
            .config
            .shortcuts
            .build_chords()
            .map_err(|e| anyhow!(e))
            .context("Invalid shortcut configuration")?;
        for chord in &chords {
            info!("Shortcut {} -> {:?}", chord, chord.action());
        }
        let matcher = ShortcutMatcher::new(chords).map_err(|e| anyhow!(e))?;

        let commands = std::sync::Mutex::new(commands);
        let dispatch: Dispatch = Arc::new(move |action| {
            let sent = match commands.lock() {
                Ok(tx) => tx.send(DaemonCommand::Upload(action.into())),
                Err(poisoned) => poisoned
                    .into_inner()
                    .send(DaemonCommand::Upload(action.into())),
            };
            if sent.is_err() {
                debug!("Daemon loop gone; dropping {:?}", action);
            }
        });

        ShortcutListener::spawn(matcher, dispatch).context("Failed to start shortcut listener")
    }

    fn reload(&mut self, listener: &ShortcutListener) -> Result<()> {
        let config = match &self.config_path {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        let chords = config
            .shortcuts
            .build_chords()
            .map_err(|e| anyhow!(e))
            .context("Invalid shortcut configuration")?;
        listener.reload(chords).map_err(|e| anyhow!(e))?;
        self.config = config;
        info!("Configuration reloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn signals_map_to_commands() {
        assert_eq!(
            command_for_signal(SIGUSR1),
            Some(DaemonCommand::Upload(UploadRequest::Region(None)))
        );
        assert_eq!(
            command_for_signal(SIGUSR2),
            Some(DaemonCommand::Upload(UploadRequest::Clipboard))
        );
        assert_eq!(command_for_signal(SIGHUP), Some(DaemonCommand::Reload));
        assert_eq!(command_for_signal(SIGTERM), Some(DaemonCommand::Quit));
        assert_eq!(command_for_signal(SIGINT), Some(DaemonCommand::Quit));
        assert_eq!(command_for_signal(0), None);
    }

    #[test]
    fn forwards_well_formed_key_events() {
        let input = Cursor::new("down 56\n\nbogus\nup 56\ndown nope\n");
        let (tx, rx) = mpsc::channel();

        assert_eq!(feed_key_events(input, tx), 2);
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events, vec![KeyEvent::Pressed(56), KeyEvent::Released(56)]);
    }

    #[test]
    fn stops_when_listener_is_gone() {
        let input = Cursor::new("down 1\ndown 2\n");
        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert_eq!(feed_key_events(input, tx), 0);
    }

    #[test]
    fn shortcut_dispatch_reaches_daemon_loop() {
        let daemon = Daemon::new(Config::default(), None);
        let (tx, rx) = mpsc::channel();
        let listener = daemon.start_shortcuts(tx).unwrap();

        let keys = listener.sender();
        keys.send(KeyEvent::Pressed(56)).unwrap();
        keys.send(KeyEvent::Pressed(3)).unwrap();
        drop(keys);

        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            DaemonCommand::Upload(UploadRequest::Screen)
        );
        listener.shutdown();
    }

    #[test]
    fn reload_reads_configured_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[destination]\nhost = \"files.example.org\"\n\n[shortcuts]\ncapture_screen = \"29+42\"\n",
        )
        .unwrap();

        let mut daemon = Daemon::new(Config::default(), Some(path));
        let (tx, rx) = mpsc::channel();
        let listener = daemon.start_shortcuts(tx).unwrap();
        daemon.reload(&listener).unwrap();
        assert_eq!(daemon.config.destination.host, "files.example.org");

        let keys = listener.sender();
        keys.send(KeyEvent::Pressed(29)).unwrap();
        keys.send(KeyEvent::Pressed(42)).unwrap();
        drop(keys);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            DaemonCommand::Upload(UploadRequest::Screen)
        );
        listener.shutdown();
    }
}
