use alert_registry::AlertDto;
use anyhow::Context;
use clap::Parser;
use keep_server::{AppState, Instances};
use provider_core::ProviderConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Receives provider webhooks and serves provider scope, pull, notify and
/// query calls.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Address to listen on.
    #[clap(long, env = "KEEP_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
    /// JSON file holding a list of provider configurations.
    #[clap(long, env = "KEEP_PROVIDERS_FILE")]
    providers_file: Option<PathBuf>,
    /// Tenant the configured providers belong to.
    #[clap(long, env = "KEEP_TENANT", default_value = "keep")]
    tenant: String,
    /// Log filter directives, e.g. `info,providers=debug`.
    #[clap(long, env = "KEEP_LOG", default_value = "info")]
    log: String,
    #[clap(long, env = "KEEP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    let configs = load_providers(args.providers_file.as_deref())?;
    let instances = Instances::load(&args.tenant, &configs).map_err(|(id, err)| {
        anyhow::Error::new(err).context(format!("invalid configuration for provider `{id}`"))
    })?;
    let instances = Arc::new(instances);
    tracing::info!(count = instances.len(), tenant = %args.tenant, "providers loaded");

    let (collector_tx, collector_rx) = mpsc::channel::<AlertDto>();
    let collector = std::thread::spawn(move || {
        while let Ok(alert) = collector_rx.recv() {
            tracing::info!(
                id = %alert.id,
                name = %alert.name,
                status = %alert.status,
                severity = %alert.severity,
                fingerprint = alert.fingerprint.as_deref().unwrap_or_default(),
                provider_id = alert.provider_id.as_deref().unwrap_or_default(),
                "alert collected"
            );
        }
    });

    let consumers = start_consumers(&args.tenant, &configs, &collector_tx)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let state = AppState::new(args.tenant.clone(), instances.clone(), collector_tx);
    let result = runtime.block_on(serve(args.bind, state));
    runtime.shutdown_background();

    // Blocking clients must be released outside the runtime.
    consumers.stop();
    instances.dispose_all();
    drop(instances);
    if collector.join().is_err() {
        tracing::error!("alert collector thread panicked");
    }
    result
}

async fn serve(bind: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "keep-server listening");

    axum::serve(listener, keep_server::router(state))
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await
        .context("server failed")
}

fn init_tracing(args: &Args) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&args.log).context("invalid --log filter")?;
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);

    let installed = match args.log_format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_timer(UtcTime::rfc_3339())
            .with_current_span(true)
            .with_span_list(false)
            .try_init(),
        LogFormat::Human => builder.compact().with_target(false).try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))
}

fn load_providers(path: Option<&Path>) -> anyhow::Result<Vec<ProviderConfig>> {
    let Some(path) = path else {
        tracing::warn!("no --providers-file given; only webhooks are served");
        return Ok(Vec::new());
    };
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Consume loops running on their own threads.
struct Consumers {
    #[cfg(feature = "kafka")]
    handles: Vec<(provider_core::consumer::ConsumerHandle, std::thread::JoinHandle<()>)>,
}

impl Consumers {
    fn stop(self) {
        #[cfg(feature = "kafka")]
        for (handle, thread) in self.handles {
            handle.stop();
            if thread.join().is_err() {
                tracing::error!("consumer thread panicked");
            }
        }
    }
}

#[cfg(feature = "kafka")]
fn start_consumers(
    tenant: &str,
    configs: &[ProviderConfig],
    collector: &Sender<AlertDto>,
) -> anyhow::Result<Consumers> {
    use providers::kafka::{KafkaProvider, PROVIDER_TYPE};
    use provider_core::ProviderContext;

    let mut handles = Vec::new();
    for config in configs.iter().filter(|c| c.provider_type == PROVIDER_TYPE) {
        let context = ProviderContext::new(tenant, &config.id, PROVIDER_TYPE);
        let provider = KafkaProvider::from_raw(context, &config.authentication)
            .with_context(|| format!("invalid configuration for provider `{}`", config.id))?;
        let mut consumer = provider
            .consumer()
            .with_context(|| format!("failed to subscribe provider `{}`", config.id))?;
        let handle = consumer.handle();
        let sink = collector.clone();
        let thread = std::thread::spawn(move || {
            let stats = consumer.start_consume(&sink);
            tracing::info!(?stats, "consumer stopped");
        });
        handles.push((handle, thread));
    }
    Ok(Consumers { handles })
}

#[cfg(not(feature = "kafka"))]
fn start_consumers(
    _tenant: &str,
    _configs: &[ProviderConfig],
    _collector: &Sender<AlertDto>,
) -> anyhow::Result<Consumers> {
    Ok(Consumers {})
}
