use anyhow::Result;
use clap::{Parser, Subcommand};
use course::{
    cli::{self, ClientArgs},
    tracing_conf,
};
use course_client::{ClientError, GreetClient};
use course_config::CONFIG;
use dotenv::dotenv;
use tracing::{info, warn};

const DEFAULT_NAMES: [&str; 5] = ["Luis", "Jhon", "Lucy", "Mark", "Piper"];

/// Exercises each call shape of the greet service.
#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[arg(long, global = true, default_value = "Luis")]
    first_name: String,

    #[arg(long, global = true, default_value = "Villegas")]
    last_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Unary greeting
    Greet,
    /// Server streaming: ten greetings back
    ManyTimes,
    /// Client streaming: one greeting per name, a single reply
    Long {
        names: Vec<String>,
        /// Pause between sent greetings, in milliseconds
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// Bidirectional streaming: one reply per name
    Everyone {
        names: Vec<String>,
        /// Pause between sent greetings, in milliseconds
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// Unary with a deadline; runs once per given deadline
    Deadline {
        /// Deadlines in milliseconds
        #[arg(default_values_t = [5000, 1000])]
        timeouts_ms: Vec<u64>,
    },
}

fn names_or_default(names: &[String]) -> Vec<&str> {
    if names.is_empty() {
        return DEFAULT_NAMES.to_vec();
    }
    names.iter().map(String::as_str).collect()
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let mut client = GreetClient::connect(cli.client.apply(&CONFIG.client)).await?;
    let (first_name, last_name) = (cli.first_name.as_str(), cli.last_name.as_str());

    match cli.command {
        Command::Greet => {
            client.greet(first_name, last_name).await?;
        }
        Command::ManyTimes => {
            client.greet_many_times(first_name, last_name).await?;
        }
        Command::Long { names, pause_ms } => {
            client
                .long_greet(&names_or_default(&names), cli::millis(pause_ms))
                .await?;
        }
        Command::Everyone { names, pause_ms } => {
            client
                .greet_everyone(&names_or_default(&names), cli::millis(pause_ms))
                .await?;
        }
        Command::Deadline { timeouts_ms } => {
            for timeout_ms in timeouts_ms {
                info!(timeout_ms, "Starting to do a Unary with deadline RPC");
                match client
                    .greet_with_deadline(first_name, last_name, cli::millis(timeout_ms))
                    .await
                {
                    Ok(_) => {}
                    Err(ClientError::Timeout) => warn!("Timeout was hit: deadline was exceeded"),
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guard = tracing_conf::init_tracing()?;

    cli::finish(run(Cli::parse()).await)
}
