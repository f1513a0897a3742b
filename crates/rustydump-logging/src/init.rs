use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

use crate::config::{LoggingConfig, DEFAULT_LEVEL};
use crate::fs::log_dir;
use crate::targets::{SUBSYSTEMS, T_CAPTURE, T_CRYPTO, T_WIFI};

static RELOAD: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Keeps the non-blocking file writers alive. Dropping it flushes them.
pub struct LoggingGuards {
    log_dir: Option<PathBuf>,
    _file_guards: Vec<WorkerGuard>,
}

impl LoggingGuards {
    /// Directory the file appenders write to, if file logging came up.
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Console-only logging on stderr, for runs without a state directory.
pub fn init_console(cfg: &LoggingConfig) -> Result<LoggingGuards> {
    let (filter_layer, handle) = reload::Layer::new(build_filter(cfg));
    let _ = RELOAD.set(handle);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(ErrorLayer::default())
        .with(console_layer())
        .try_init()
        .ok();
    let _ = LogTracer::init();

    Ok(LoggingGuards {
        log_dir: None,
        _file_guards: Vec::new(),
    })
}

/// Console logging plus daily-rolling files under `<root>/logs`: one for
/// `component` and one per subsystem target.
pub fn init(component: &str, root: &Path, cfg: &LoggingConfig) -> Result<LoggingGuards> {
    let (filter_layer, handle) = reload::Layer::new(build_filter(cfg));
    let _ = RELOAD.set(handle);

    let log_dir = log_dir(root);
    let base = tracing_subscriber::registry()
        .with(filter_layer)
        .with(ErrorLayer::default())
        .with(console_layer());

    if let Err(err) = std::fs::create_dir_all(&log_dir) {
        base.try_init().ok();
        let _ = LogTracer::init();
        tracing::warn!(dir = %log_dir.display(), error = %err, "file_logging_disabled");
        return Ok(LoggingGuards {
            log_dir: None,
            _file_guards: Vec::new(),
        });
    }

    let mut warn_msg: Option<String> = None;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(err) = std::fs::set_permissions(&log_dir, std::fs::Permissions::from_mode(0o2770)) {
            warn_msg = Some(format!(
                "failed to set log directory permissions ({}): {}",
                log_dir.display(),
                err
            ));
        }
    }

    let component_appender = tracing_appender::rolling::daily(&log_dir, component_log_name(component));
    let (component_writer, component_guard) = tracing_appender::non_blocking(component_appender);
    let component_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_writer(component_writer)
        .with_filter(component_targets());

    let (wifi_layer, wifi_guard) = subsystem_layer(&log_dir, T_WIFI);
    let (crypto_layer, crypto_guard) = subsystem_layer(&log_dir, T_CRYPTO);
    let (capture_layer, capture_guard) = subsystem_layer(&log_dir, T_CAPTURE);

    base.with(component_layer)
        .with(wifi_layer)
        .with(crypto_layer)
        .with(capture_layer)
        .try_init()
        .ok();
    let _ = LogTracer::init();

    if let Some(message) = warn_msg {
        tracing::warn!("{message}");
    }

    Ok(LoggingGuards {
        log_dir: Some(log_dir),
        _file_guards: vec![component_guard, wifi_guard, crypto_guard, capture_guard],
    })
}

/// Swaps the active level filter.
pub fn apply(cfg: &LoggingConfig) -> Result<()> {
    let handle = RELOAD
        .get()
        .ok_or_else(|| anyhow::anyhow!("logging not initialized"))?;
    handle.reload(build_filter(cfg))?;
    Ok(())
}

pub(crate) fn build_filter(cfg: &LoggingConfig) -> EnvFilter {
    if !cfg.enabled {
        return EnvFilter::new("off");
    }
    EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

pub(crate) fn component_log_name(component: &str) -> String {
    let name = component.trim();
    if name.is_empty() {
        "rustydump.log".to_string()
    } else if name.ends_with(".log") {
        name.to_string()
    } else {
        format!("{name}.log")
    }
}

fn subsystem_file(target: &str) -> &'static str {
    SUBSYSTEMS
        .iter()
        .find(|(t, _)| *t == target)
        .map(|(_, file)| *file)
        .unwrap_or("rustydump.log")
}

fn console_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .compact()
}

fn component_targets() -> Targets {
    SUBSYSTEMS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, (target, _)| {
            targets.with_target(*target, LevelFilter::OFF)
        })
}

fn subsystem_layer<S>(log_dir: &Path, target: &'static str) -> (impl Layer<S> + Send + Sync, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let appender = tracing_appender::rolling::daily(log_dir, subsystem_file(target));
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_writer(writer)
        .with_filter(Targets::new().with_target(target, LevelFilter::TRACE));
    (layer, guard)
}
