use anyhow::Result;
use clap::{Parser, Subcommand};
use course::{
    cli::{self, ClientArgs},
    tracing_conf,
};
use course_client::{CalculatorClient, ClientError};
use course_config::CONFIG;
use dotenv::dotenv;
use tracing::info;

/// Exercises each call shape of the calculator service.
#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Unary: add two numbers
    Sum {
        #[arg(default_value_t = 10, allow_negative_numbers = true)]
        num1: i32,
        #[arg(default_value_t = 3, allow_negative_numbers = true)]
        num2: i32,
    },
    /// Server streaming: prime factors of a number
    Decompose {
        #[arg(default_value_t = 12_390_392_840)]
        number: i64,
    },
    /// Client streaming: average of the numbers
    Average {
        #[arg(default_values_t = [3, 5, 9, 54, 23], allow_negative_numbers = true)]
        numbers: Vec<i64>,
        /// Pause between sent numbers, in milliseconds
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// Bidirectional streaming: running maximum of the numbers
    Maximum {
        #[arg(default_values_t = [4, 7, 2, 19, 4, 6, 32], allow_negative_numbers = true)]
        numbers: Vec<i32>,
        /// Pause between sent numbers, in milliseconds
        #[arg(long, default_value_t = 1000)]
        pause_ms: u64,
    },
    /// Unary with errors: square roots, negative numbers are rejected
    SquareRoot {
        #[arg(default_values_t = [10, -2], allow_negative_numbers = true)]
        numbers: Vec<i32>,
    },
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let mut client = CalculatorClient::connect(cli.client.apply(&CONFIG.client)).await?;

    match cli.command {
        Command::Sum { num1, num2 } => {
            let result = client.sum(num1, num2).await?;
            info!("Result: {result}");
        }
        Command::Decompose { number } => {
            let factors = client.decomposite_number(number).await?;
            info!("Prime factors of {number}: {factors:?}");
        }
        Command::Average { numbers, pause_ms } => {
            let average = client.compute_average(numbers, cli::millis(pause_ms)).await?;
            info!("Average: {average}");
        }
        Command::Maximum { numbers, pause_ms } => {
            let maximums = client.find_maximum(numbers, cli::millis(pause_ms)).await?;
            info!("Streaming complete, maximums: {maximums:?}");
        }
        Command::SquareRoot { numbers } => {
            for number in numbers {
                if let Some(root) = client.checked_square_root(number).await? {
                    info!("Result of SquareRoot of {number}: {root}");
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
