use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use flowline::engine::context::LogLevel;
use flowline::engine::executor::{FlowEngine, RunEvent, RunOutcome};
use flowline::engine::validator::ValidationResult;
use flowline::engine::{scheduler, EngineConfig};
use flowline::host::connectors::{parse_relay_url, RelayClient, RelayInvoker};
use flowline::host::loader::{FlowLoader, LoadedFlow};
use flowline::host::server::{self, AppState};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a flow file
    Run {
        /// Path to the flow file (YAML or JSON)
        #[arg(short, long)]
        file: String,

        /// Delay between nodes in milliseconds
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Base URL of the connector relay
        #[arg(long)]
        relay_url: Option<String>,
    },
    /// Check a flow file without running it
    Validate {
        /// Path to the flow file (YAML or JSON)
        #[arg(short, long)]
        file: String,
    },
    /// Start the HTTP server
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Directory holding stored flows
        #[arg(long, default_value = "flows")]
        flows_dir: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            file,
            pacing_ms,
            relay_url,
        } => {
            let mut config = EngineConfig::from_env()?;
            if let Some(ms) = pacing_ms {
                config = config.with_pacing(Duration::from_millis(ms));
            }
            let client = match relay_url {
                Some(raw) => RelayClient::new(parse_relay_url(&raw)?)?,
                None => RelayClient::from_env()?,
            };

            let flow = load_flow(&file)?;
            let engine = FlowEngine::new(Arc::new(RelayInvoker::new(client)), config);
            run_flow(&engine, &flow).await?;
        }
        Commands::Validate { file } => {
            let flow = load_flow(&file)?;
            match flowline::engine::validate(&flow.graph) {
                ValidationResult::Valid => {
                    let order = scheduler::order(&flow.graph)
                        .map_err(|cycle| anyhow::anyhow!("unexpected cycle: {:?}", cycle.nodes))?;
                    println!("Flow '{}' is valid. Execution order:", flow.name);
                    for (step, id) in order.iter().enumerate() {
                        println!("  {}. {}", step + 1, describe_node(&flow, *id));
                    }
                }
                ValidationResult::Invalid(problems) => {
                    println!("Flow '{}' has {} problem(s):", flow.name, problems.len());
                    for problem in &problems {
                        println!("  - {}", problem);
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve { port, flows_dir } => {
            let config = EngineConfig::from_env()?;
            let invoker = RelayInvoker::from_env()?;
            let engine = Arc::new(FlowEngine::new(Arc::new(invoker), config));
            server::serve(port, AppState::new(engine, flows_dir)).await?;
        }
    }

    Ok(())
}

fn load_flow(file: &str) -> anyhow::Result<LoadedFlow> {
    let doc = FlowLoader::new()
        .load(file)
        .with_context(|| format!("failed to load flow from {}", file))?;
    Ok(doc.into_graph()?)
}

fn describe_node(flow: &LoadedFlow, id: flowline::engine::NodeId) -> String {
    let label = flow
        .graph
        .node(id)
        .map(|node| node.label.as_str())
        .unwrap_or("?");
    match flow.key_of(id) {
        Some(key) => format!("{} ({})", label, key),
        None => label.to_string(),
    }
}

async fn run_flow(engine: &FlowEngine, flow: &LoadedFlow) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling after the current node...");
                cancel.cancel();
            }
        })
    };

    println!("Running flow: {}", flow.name);
    let (tx, mut rx) = mpsc::channel(100);
    let printer = async {
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::NodeStarted { node_id } => {
                    log::debug!("-> {}", describe_node(flow, node_id));
                }
                RunEvent::Log(entry) => match entry.level {
                    LogLevel::Info => println!("{}", entry.message),
                    LogLevel::Error => println!("ERROR: {}", entry.message),
                },
                _ => {}
            }
        }
    };

    let (report, _) = tokio::join!(engine.run_stream(&flow.graph, cancel, tx), printer);
    ctrl_c.abort();
    let report = report?;

    match &report.outcome {
        RunOutcome::Completed => println!("Flow execution completed."),
        RunOutcome::Aborted(_) if !report.outcome.problems().is_empty() => {
            println!("Flow is not runnable:");
            for problem in report.outcome.problems() {
                println!("  - {}", problem);
            }
            std::process::exit(1);
        }
        RunOutcome::Aborted(_) => println!("Flow execution cancelled."),
    }

    Ok(())
}
