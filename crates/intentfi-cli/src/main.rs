use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use intentfi_bus::EventBus;
use intentfi_core::{load_config, IntentfiConfig, PendingConversations, Responder};
use intentfi_gateway::Gateway;
use intentfi_schema::InboundMessage;
use intentfi_server::state::AppState;
use intentfi_server::{serve, spawn_delivery_listener, DeliveryClient};

const BUS_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "intentfi", version, about = "French football stats chat agent")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.intentfi",
        help = "Root directory (contains config/ and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the mailbox server and reply delivery")]
    Start {
        #[arg(long, help = "Override server.bind from main.yaml")]
        bind: Option<String>,
    },
    #[command(about = "Local REPL for testing")]
    Chat,
    #[command(about = "Answer a single message and exit")]
    Ask {
        #[arg(required = true, num_args = 1.., help = "Message text")]
        text: Vec<String>,
    },
    #[command(about = "Validate config files")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut cli = Cli::parse();

    // Expand ~ to home directory
    if cli.config_root.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            cli.config_root = PathBuf::from(home).join(
                cli.config_root
                    .strip_prefix("~")
                    .unwrap_or(&cli.config_root),
            );
        }
    }

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "intentfi.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.config_root.join("config"))?;
            println!(
                "Config valid. provider {:?}, model {}, stats provider {}.",
                config.llm.provider.provider_type, config.llm.model, config.stats.base_url
            );
        }
        Commands::Start { bind } => {
            start_agent(&cli.config_root, bind).await?;
        }
        Commands::Chat => {
            run_repl(&cli.config_root).await?;
        }
        Commands::Ask { text } => {
            let app = bootstrap(&cli.config_root, false)?;
            let reply = ask(&app.gateway, &text.join(" ")).await;
            println!("{reply}");
        }
    }

    Ok(())
}

struct App {
    bus: EventBus,
    gateway: Arc<Gateway>,
    config: IntentfiConfig,
}

/// Loads config and wires the gateway. The collaborator is only attached
/// when a mailbox is running to receive its answers.
fn bootstrap(root: &Path, with_collaborator: bool) -> Result<App> {
    let config = load_config(&root.join("config"))?;
    let responder = Responder::from_config(&config)?;

    let bus = EventBus::new(BUS_CAPACITY);
    let pending = Arc::new(PendingConversations::new(
        config.main.pending.capacity,
        Duration::from_secs(config.main.pending.ttl_secs),
    ));
    let collaborator = if with_collaborator {
        config.main.agent.collaborator.clone()
    } else {
        None
    };

    let gateway = Arc::new(Gateway::new(
        responder,
        bus.publisher(),
        pending,
        collaborator,
    ));

    Ok(App {
        bus,
        gateway,
        config,
    })
}

async fn ask(gateway: &Gateway, text: &str) -> String {
    let inbound = InboundMessage::new("cli", "user:local", text);
    gateway
        .handle_inbound(inbound)
        .await
        .reply_text()
        .unwrap_or_default()
        .to_string()
}

async fn start_agent(root: &Path, bind: Option<String>) -> Result<()> {
    let app = bootstrap(root, true)?;
    let address = app.config.main.agent.address.clone();
    let bind = bind.unwrap_or_else(|| app.config.main.server.bind.clone());

    let _delivery = spawn_delivery_listener(
        &app.bus,
        DeliveryClient::new(address.clone()),
        app.gateway.clone(),
    )
    .await;
    tracing::info!("reply delivery listener started");

    match app.gateway.collaborator() {
        Some(collaborator) => tracing::info!(collaborator, "unmatched messages go to collaborator"),
        None => tracing::info!(model = %app.config.llm.model, "unmatched messages use local completion"),
    }

    let state = AppState {
        gateway: app.gateway.clone(),
        address,
    };
    serve(state, &bind).await
}

async fn run_repl(root: &Path) -> Result<()> {
    let app = bootstrap(root, false)?;

    println!("intentfi REPL. Type 'quit' to exit.");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input == "quit" || input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        println!("{}", ask(&app.gateway, input).await);
    }

    Ok(())
}
