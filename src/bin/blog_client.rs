use anyhow::Result;
use clap::{Parser, Subcommand};
use course::{
    cli::{self, ClientArgs},
    tracing_conf,
};
use course_client::{BlogClient, ClientError};
use course_config::CONFIG;
use course_proto::blog::Blog;
use dotenv::dotenv;
use tracing::info;

/// Create, read, update, delete and list blog posts.
#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create {
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Read {
        id: u64,
    },
    /// Replace every field of an existing post
    Update {
        id: u64,
        #[arg(long)]
        author_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    Delete {
        id: u64,
    },
    /// Server streaming: every stored post
    List,
    /// Create a handful of sample posts
    Seed,
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let mut client = BlogClient::connect(cli.client.apply(&CONFIG.client)).await?;

    match cli.command {
        Command::Create {
            author_id,
            title,
            content,
        } => {
            client.create_blog(&author_id, &title, &content).await?;
        }
        Command::Read { id } => {
            client.read_blog(id).await?;
        }
        Command::Update {
            id,
            author_id,
            title,
            content,
        } => {
            client
                .update_blog(Blog {
                    id,
                    author_id,
                    title,
                    content,
                })
                .await?;
        }
        Command::Delete { id } => {
            client.delete_blog(id).await?;
        }
        Command::List => {
            let blogs = client.list_blog().await?;
            info!("Listed {} blogs", blogs.len());
        }
        Command::Seed => {
            let blogs = client.seed_blogs().await?;
            info!("Created {} blogs", blogs.len());
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
