mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sketchwire_client::{
    ClientEvent, ClientSyncAgent, HttpGateway, ReconnectPolicy, TracingRenderer, TransportEvent,
};
use sketchwire_core::cleanup::StrokeSet;
use sketchwire_core::config::Config;
use sketchwire_core::diagram::{DiagramStore, DiagramSummary};
use sketchwire_core::diagram_store::{JsonDiagramStore, MemoryDiagramStore};
use sketchwire_relay::RelayState;

#[derive(Parser)]
#[command(
    name = "sketchwire",
    about = "Shared whiteboard relay with stroke cleanup and saved diagrams",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Port to listen on (default: 8000)
        #[arg(long)]
        port: Option<u16>,

        /// Replay the current drawing to late joiners
        #[arg(long)]
        replay: bool,

        /// Keep diagrams in memory only
        #[arg(long)]
        ephemeral: bool,
    },

    /// Join a drawing session as a headless participant
    Join {
        /// Active username
        #[arg(short, long)]
        user: Option<String>,

        /// Relay WebSocket URL
        #[arg(long)]
        url: Option<String>,
    },

    /// Browse saved diagrams
    Diagrams {
        #[command(subcommand)]
        action: DiagramAction,
    },

    /// Run a stroke file through the cleanup endpoint
    Cleanup {
        /// JSON file of the form {"strokes": [{"points": [{"x":..,"y":..}]}]}
        file: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum DiagramAction {
    /// Diagrams owned by the active user
    Mine {
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Diagrams shared by anyone
    Shared,
    /// Print one diagram with its strokes
    Show { id: u64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Check the configuration for problems
    Validate,
    /// Get a specific config value (dotted path)
    Get { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    logging::init(&config.logging.clone().unwrap_or_default(), cli.verbose);

    match cli.command {
        Commands::Serve {
            port,
            replay,
            ephemeral,
        } => serve(&config, port, replay, ephemeral).await,
        Commands::Join { user, url } => join(&config, user, url).await,
        Commands::Diagrams { action } => diagrams(&config, action).await,
        Commands::Cleanup { file, output } => cleanup(&config, file, output).await,
        Commands::Config { action } => config_command(&config, &config_path, action),
    }
}

fn headless_agent(config: &Config) -> anyhow::Result<ClientSyncAgent<TracingRenderer>> {
    let gateway = Arc::new(HttpGateway::new(&config.api_base(), config.gateway_timeout())?);
    let mut agent = ClientSyncAgent::new(TracingRenderer, gateway.clone(), gateway);
    if let Some(user) = config.username() {
        agent.set_username(&user);
    }
    Ok(agent)
}

async fn serve(
    config: &Config,
    port: Option<u16>,
    replay: bool,
    ephemeral: bool,
) -> anyhow::Result<()> {
    let mut server = config.server();
    if let Some(port) = port {
        server.port = port;
    }
    if replay {
        server.replay_on_join = true;
    }

    let store: Arc<dyn DiagramStore> = if ephemeral || config.store_ephemeral() {
        info!("Diagrams are kept in memory only");
        Arc::new(MemoryDiagramStore::new())
    } else {
        let dir = config.store_dir();
        info!(dir = %dir.display(), "Diagram store");
        Arc::new(JsonDiagramStore::new(dir))
    };

    #[allow(unused_mut)]
    let mut state = RelayState::new(server, store);
    #[cfg(feature = "metrics")]
    {
        state.metrics = Some(sketchwire_relay::metrics::install_prometheus_recorder()?);
    }

    info!(
        port = state.config.port,
        replay = state.config.replay_on_join,
        "Starting sketchwire relay"
    );
    sketchwire_relay::start_relay(Arc::new(state)).await
}

async fn join(config: &Config, user: Option<String>, url: Option<String>) -> anyhow::Result<()> {
    let url = url.unwrap_or_else(|| config.relay_url());
    let policy = ReconnectPolicy::from(&config.reconnect());

    let mut agent = headless_agent(config)?;
    if let Some(user) = user {
        agent.set_username(&user);
    }
    let mut events = agent.subscribe();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        agent.set_connecting();
        let (transport, mut incoming) =
            match sketchwire_client::connect_with_backoff(&url, &policy).await {
                Ok(connected) => connected,
                Err(e) => {
                    agent.connect_failed(&e);
                    return Err(e.into());
                }
            };
        agent.attach(transport);

        loop {
            tokio::select! {
                event = incoming.recv() => {
                    let event = event.unwrap_or(TransportEvent::Closed);
                    let closed = event == TransportEvent::Closed;
                    agent.handle_transport_event(event);
                    while let Ok(change) = events.try_recv() {
                        log_client_event(&agent, &change);
                    }
                    if closed {
                        break;
                    }
                }
                _ = &mut shutdown => {
                    info!("Leaving session");
                    return Ok(());
                }
            }
        }
        warn!("Relay connection lost; reconnecting");
    }
}

fn log_client_event(agent: &ClientSyncAgent<TracingRenderer>, event: &ClientEvent) {
    let canvas = agent.canvas();
    match event {
        ClientEvent::RemoteApplied { kind } => info!(
            kind,
            completed = canvas.completed().len(),
            open = canvas.remote_open(),
            "Canvas updated"
        ),
        other => info!(event = ?other, "Client event"),
    }
}

async fn diagrams(config: &Config, action: DiagramAction) -> anyhow::Result<()> {
    let mut agent = headless_agent(config)?;

    match action {
        DiagramAction::Mine { user } => {
            if let Some(user) = user {
                agent.set_username(&user);
            }
            if agent.username().is_none() {
                warn!("No active user; set one with --user or client.username");
            }
            print_summaries(&agent.list_mine().await?);
        }
        DiagramAction::Shared => print_summaries(&agent.list_shared().await?),
        DiagramAction::Show { id } => {
            agent.open_diagram(id).await?;
            let strokes = StrokeSet {
                strokes: agent.canvas().completed().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&strokes)?);
        }
    }
    Ok(())
}

fn print_summaries(list: &[DiagramSummary]) {
    if list.is_empty() {
        println!("No diagrams.");
        return;
    }
    for d in list {
        let shared = if d.is_shared { "  [shared]" } else { "" };
        println!(
            "{:>5}  {}  {:<16} {}{shared}",
            d.id,
            d.created_at.format("%Y-%m-%d %H:%M"),
            d.owner,
            d.title
        );
    }
}

async fn cleanup(config: &Config, file: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let input: StrokeSet = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", file.display()))?;

    let mut agent = headless_agent(config)?;
    agent.load_diagram(input.strokes);
    agent.cleanup().await?;

    let result = StrokeSet {
        strokes: agent.canvas().completed().to_vec(),
    };
    let json = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            info!(
                path = %path.display(),
                strokes = result.strokes.len(),
                "Wrote cleaned strokes"
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn config_command(
    config: &Config,
    path: &std::path::Path,
    action: ConfigAction,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Get { key } => match config.get_path(&key) {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => anyhow::bail!("no config value at {key}"),
        },
        ConfigAction::Validate => {
            let (warnings, errors) = config.validate();
            println!("Config: {}", path.display());
            for w in &warnings {
                println!("  warning: {w}");
            }
            for e in &errors {
                println!("  error: {e}");
            }
            if !errors.is_empty() {
                anyhow::bail!("{} config error(s)", errors.len());
            }
            println!("OK");
        }
    }
    Ok(())
}
