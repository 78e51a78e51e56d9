//! `applin-client` command line.
//!
//! Runs a headless session: pages are logged instead of drawn, modals are
//! dismissed, and the state is saved on exit.

use std::sync::Arc;

use applin_core::spec::PageSpec;

use crate::config::{apply_env, expand_tilde, load_config, Config};
use crate::context::ContextBuilder;
use crate::logging::init_logging;
use crate::persistence::{JsonFileStore, SnapshotStore};
use crate::platform::HeadlessPlatform;
use crate::session::Session;
use crate::state_guard::Renderer;
use crate::transport::{ReqwestTransport, ReqwestTransportConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub config_file: String,
    pub base_url: String,
    pub page: String,
    pub state_file: String,
    pub log_level: String,
    pub help: bool,
}

/// Logs every render at info level.
#[derive(Debug, Default)]
pub struct LoggingRenderer;

impl Renderer for LoggingRenderer {
    fn render(&self, pages: Vec<(String, PageSpec)>) {
        let top = pages.last().map(|(key, spec)| (key.clone(), spec.title().map(str::to_string)));
        let keys: Vec<&str> = pages.iter().map(|(key, _)| key.as_str()).collect();
        match top {
            Some((key, title)) => tracing::info!(
                stack = ?keys,
                top = %key,
                title = title.as_deref().unwrap_or(""),
                "render"
            ),
            None => tracing::info!("render: empty stack"),
        }
    }
}

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    run_with_args(&args)
}

pub fn run_with_args(argv: &[String]) -> i32 {
    let parsed = match parse_args(argv) {
        Ok(args) => args,
        Err(err) => {
            eprint!("{err}");
            return 2;
        }
    };
    if parsed.help {
        print!("{}", usage(None));
        return 0;
    }

    let cfg = match resolve_config(&parsed) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("Error loading config: {err}");
            return 1;
        }
    };

    if let Err(err) = init_logging(&cfg.logging) {
        eprintln!("Warning: {err}");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return 1;
        }
    };
    runtime.block_on(run(cfg))
}

/// Defaults, then the config file, then the environment, then flags.
pub fn resolve_config(args: &Args) -> Result<Config, String> {
    let config_file = Some(args.config_file.as_str()).filter(|s| !s.trim().is_empty());
    let (mut cfg, used) = load_config(config_file).map_err(|e| e.to_string())?;
    if let Some(path) = used {
        tracing::debug!(path = %path.display(), "loaded config file");
    }
    apply_env(&mut cfg, |key| std::env::var(key).ok());

    if !args.base_url.trim().is_empty() {
        cfg.server.base_url = args.base_url.trim().to_string();
    }
    if !args.page.trim().is_empty() {
        cfg.pages.home = args.page.trim().to_string();
    }
    if !args.state_file.trim().is_empty() {
        let path = expand_tilde(args.state_file.trim()).map_err(|e| e.to_string())?;
        cfg.state.path = Some(path);
    }
    if !args.log_level.trim().is_empty() {
        cfg.logging.level = args.log_level.trim().to_ascii_lowercase();
    }
    cfg.validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

async fn run(cfg: Config) -> i32 {
    let transport = match ReqwestTransport::new(ReqwestTransportConfig {
        connect_timeout: cfg.connect_timeout(),
        request_timeout: cfg.request_timeout(),
    }) {
        Ok(transport) => Arc::new(transport),
        Err(err) => {
            eprintln!("failed to create HTTP client: {err}");
            return 1;
        }
    };

    let ctx = ContextBuilder::new(
        cfg.server.base_url.clone(),
        transport,
        Arc::new(HeadlessPlatform),
    )
    .home_page_key(cfg.pages.home.clone())
    .build();
    let session = Session::new(ctx);
    session.set_renderer(Arc::new(LoggingRenderer));

    let store: Option<Arc<dyn SnapshotStore>> = match &cfg.state.path {
        Some(path) => Some(Arc::new(JsonFileStore::new(path.clone()))),
        None => None,
    };
    let snapshot = match &store {
        Some(store) => match store.load() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring saved state");
                None
            }
        },
        None => None,
    };

    tracing::info!(base_url = %cfg.server.base_url, home = %cfg.pages.home, "starting session");
    if !session.start(snapshot).await {
        tracing::warn!("initial page load failed");
    }
    if let Some(store) = store {
        session.spawn_persistence(store, cfg.save_interval());
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "waiting for ctrl-c failed");
    }
    tracing::info!("shutting down");
    session.shutdown().await;
    0
}

pub fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut out = Args::default();
    let mut idx = 0usize;

    while idx < argv.len() {
        let token = &argv[idx];
        let (key, inline) = if let Some((k, v)) = token.split_once('=') {
            (k.to_string(), Some(v.to_string()))
        } else {
            (token.to_string(), None)
        };

        match key.as_str() {
            "--config" => out.config_file = take_value(argv, &mut idx, inline, "--config")?,
            "--base-url" => out.base_url = take_value(argv, &mut idx, inline, "--base-url")?,
            "--page" => out.page = take_value(argv, &mut idx, inline, "--page")?,
            "--state-file" => {
                out.state_file = take_value(argv, &mut idx, inline, "--state-file")?;
            }
            "--log-level" => {
                out.log_level = take_value(argv, &mut idx, inline, "--log-level")?;
            }
            "-h" | "--help" => out.help = true,
            other => return Err(usage(Some(&format!("unknown flag: {other}")))),
        }
        idx += 1;
    }

    Ok(out)
}

fn take_value(
    argv: &[String],
    idx: &mut usize,
    inline: Option<String>,
    flag: &str,
) -> Result<String, String> {
    if let Some(value) = inline {
        return Ok(value);
    }
    *idx += 1;
    argv.get(*idx)
        .cloned()
        .ok_or_else(|| usage(Some(&format!("missing value for {flag}"))))
}

fn usage(message: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(msg) = message {
        if !msg.trim().is_empty() {
            out.push_str(&format!("Error: {msg}\n\n"));
        }
    }
    out.push_str("Usage: applin-client [options]\n\n");
    out.push_str("Options:\n");
    out.push_str("  --config string       config file (default is $HOME/.config/applin/config.yaml)\n");
    out.push_str("  --base-url string     server base URL (env APPLIN_BASE_URL)\n");
    out.push_str("  --page string         home page key (default /)\n");
    out.push_str("  --state-file string   where to save client state\n");
    out.push_str("  --log-level string    trace|debug|info|warn|error (env APPLIN_LOG_LEVEL)\n");
    out.push_str("  -h, --help            show this help\n");
    out
}
