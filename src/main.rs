use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;

use config::{CliLogging, CliOverrides, Config, LoggingConfig};
use events::Xid;
use services::{create_gateway, Dispatcher, HiddenRegistry, Interrupts, ShutdownHandler};

#[derive(Parser, Debug)]
#[command(name = "xhide", version)]
#[command(about = "Keeps every window of one X11 class unmapped and maps them back on exit")]
#[command(override_usage = "xhide [options] TARGET_CLASS")]
struct Args {
    /// WM_CLASS instance or class name of the windows to hide
    #[arg(value_name = "TARGET_CLASS")]
    target_class: String,

    /// Also hide matching windows that were mapped before start
    #[arg(short = 'p')]
    prescan: bool,

    /// X display to connect to (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Run against a simulated X server instead of a real display
    #[arg(long)]
    dry_run: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: full, compact
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        let logging = if self.log_level.is_some() || self.log_format.is_some() {
            Some(CliLogging {
                level: self.log_level.clone(),
                format: self.log_format.clone(),
            })
        } else {
            None
        };

        CliOverrides {
            target_class: Some(self.target_class.clone()),
            prescan: self.prescan,
            display: self.display.clone(),
            logging,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit before logging is set up
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => return ExitCode::from(usage_status(&err)),
    };

    // Defaults < XHIDE_* environment < command line
    let config = match Config::load(&args.overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("xhide: {}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_tracing(&config.logging) {
        eprintln!("xhide: cannot initialise logging: {:#}", err);
        return ExitCode::FAILURE;
    }

    match run(config, args.dry_run).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Help and version go to stdout with status 0; anything else is a usage
/// error reported on stderr with status 1.
fn usage_status(err: &clap::Error) -> u8 {
    // Printing can only fail if the stream is gone; the exit status still applies.
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

async fn run(config: Config, dry_run: bool) -> Result<()> {
    // Installed before anything is hidden so no interrupt is missed.
    let mut interrupts = Interrupts::install().context("Cannot install signal handlers")?;

    if dry_run {
        warn!("Dry-run mode: using a simulated X server");
    }

    // Connect and subscribe to map notifications on the root window
    let gateway = create_gateway(&config, dry_run).context("Cannot open the X connection")?;
    let root = gateway.root_window();
    gateway
        .select_structure_events(root)
        .with_context(|| format!("Cannot watch root window {}", Xid(root)))?;

    // Shared by the event loop and the interrupt path
    let registry = Arc::new(HiddenRegistry::new());
    let dispatcher = Dispatcher::new(
        gateway.clone(),
        registry.clone(),
        config.target_class.clone(),
    );
    let shutdown = ShutdownHandler::new(registry.clone(), gateway.clone());

    info!(
        target_class = %config.target_class,
        prescan = config.prescan,
        root = %Xid(root),
        "xhide v{} started",
        env!("CARGO_PKG_VERSION")
    );

    // Blocking X calls run off the async runtime; pre-scan completes before
    // the first live event is read
    let prescan = config.prescan;
    let event_loop = tokio::task::spawn_blocking(move || {
        if prescan {
            dispatcher.prescan(root);
        }
        dispatcher.run()
    });

    tokio::select! {
        // Stream ended: the loop already ran its restore pass
        finished = event_loop => {
            finished.context("Event loop task failed")?;
            gateway.close();
        }
        signal = interrupts.recv() => {
            info!(signal, "Interrupt received, restoring hidden windows");
            // Restore, then close the gateway, which wakes the event loop
            shutdown.shutdown();
            report_leftovers(&registry);
            info!("xhide stopped");
            // Exit without joining the blocking event loop thread
            std::process::exit(0);
        }
    }

    report_leftovers(&registry);
    info!("xhide stopped");
    Ok(())
}

fn report_leftovers(registry: &HiddenRegistry) {
    if registry.is_empty() {
        return;
    }

    let windows: Vec<String> = registry
        .snapshot()
        .into_iter()
        .map(|window| Xid(window).to_string())
        .collect();
    warn!(
        "{} window(s) are still unmapped: {}",
        windows.len(),
        windows.join(", ")
    );
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&logging.level))?;
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "compact" => registry.with(fmt.compact()).try_init()?,
        _ => registry.with(fmt).try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_single_positional_with_prescan() {
        let args = parse(&["xhide", "-p", "xterm"]).expect("valid arguments");
        assert_eq!(args.target_class, "xterm");
        assert!(args.prescan);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_missing_or_extra_positional_is_usage_error() {
        let missing = parse(&["xhide"]).unwrap_err();
        assert_eq!(usage_status(&missing), 1);

        let extra = parse(&["xhide", "xterm", "firefox"]).unwrap_err();
        assert_eq!(usage_status(&extra), 1);
    }

    #[test]
    fn test_short_and_long_help_exit_zero() {
        for flag in ["-h", "--help"] {
            let err = parse(&["xhide", flag]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
            assert_eq!(usage_status(&err), 0);
        }
    }

    #[test]
    fn test_overrides_only_carry_given_log_options() {
        let args = parse(&["xhide", "--log-level", "debug", "xterm"]).expect("valid arguments");
        let overrides = args.overrides();
        let logging = overrides.logging.expect("logging override");
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert!(logging.format.is_none());

        let args = parse(&["xhide", "xterm"]).expect("valid arguments");
        assert!(args.overrides().logging.is_none());
    }
}
