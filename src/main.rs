use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use tracing_subscriber::EnvFilter;

use relay::banner::{Mode, print_banner};
use relay::config::ConfigArgs;
use relay::events::Event;
use relay::remote::http::HttpAgent;
use relay::server;
use relay::service::Relay;
use relay::spinner::Spinner;

#[derive(Parser)]
#[command(
    name = "relay",
    version,
    about = "Send a task to a remote agent and watch it come back."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Submit a single task, wait for it to finish and exit (no server)
    #[arg(short, long)]
    run: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the agent's HTTP+JSON endpoint from its card and exit
    Resolve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config.into_config()?;
    let agent = Arc::new(HttpAgent::new(
        config.api_key.clone(),
        config.api_prefix.clone(),
    ));
    let relay = Arc::new(Relay::new(config, agent)?);

    if let Some(Command::Resolve) = cli.command {
        let endpoint = relay.resolve_endpoint().await?;
        println!("{endpoint}");
        return Ok(());
    }

    // Single task mode
    if let Some(text) = cli.run {
        print_banner(relay.config(), &Mode::SingleRun);
        return run_once(&relay, &text).await;
    }

    let addr = format!("{}:{}", cli.host, relay.config().port);
    print_banner(relay.config(), &Mode::Serve { addr: &addr });

    let listener = TcpListener::bind(&addr).await?;
    let reaper = relay.spawn_reaper();
    info!("relay listening on http://{}", addr);

    server::serve(Arc::clone(&relay), listener, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    relay.shutdown().await;
    let _ = reaper.await;
    Ok(())
}

async fn run_once(relay: &Relay, text: &str) -> anyhow::Result<()> {
    // Subscribe before submitting so the first poll can't slip past us.
    let mut events = relay.subscribe();
    let ticket = relay.create_run(None, text).await?;

    let spinner = Spinner::start(&format!("{} · {}", ticket.task_id, ticket.state));

    // Ctrl+C abandons the wait, not the process state
    let finished = tokio::select! {
        finished = wait_for_finish(relay, &mut events, &ticket.req_id, &spinner) => finished,
        _ = tokio::signal::ctrl_c() => false,
    };
    spinner.stop().await;

    if finished {
        let status = relay.get_status(&ticket.req_id, false).await?;
        let reply = if status.reply.is_empty() {
            &status.parts_text
        } else {
            &status.reply
        };
        println!("\n=> [{}] {}", status.state, reply);
    } else {
        println!("\n\ninterrupted");
    }

    relay.shutdown().await;
    Ok(())
}

async fn wait_for_finish(
    relay: &Relay,
    events: &mut broadcast::Receiver<Event>,
    req_id: &str,
    spinner: &Spinner,
) -> bool {
    loop {
        match events.recv().await {
            Ok(event) if event.request_id() != req_id => {}
            Ok(Event::RunPolled {
                poll_count,
                state,
                error,
                ..
            }) => {
                let label = match error {
                    Some(err) => format!("{state} · poll {poll_count} · {err}"),
                    None => format!("{state} · poll {poll_count}"),
                };
                spinner.set_label(label);
            }
            Ok(Event::RunFinished { .. }) => return true,
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => {
                // Missed events; ask the registry directly.
                if relay
                    .get_status(req_id, false)
                    .await
                    .is_ok_and(|s| s.completed_at.is_some())
                {
                    return true;
                }
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
