use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cortex_mindmap::models::NodeId;
use cortex_mindmap::remote::NodeClient;
use cortex_mindmap::render::render_tree;
use cortex_mindmap::sync::{Intent, Outcome, SyncEngine};

#[derive(Parser)]
#[command(name = "cortex-mindmap")]
#[command(about = "Mind-map editor for the Cortex brain-training app")]
struct Cli {
    /// User identifier for the remote mind-map store
    #[arg(short, long, env = "CORTEX_UID")]
    uid: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print the current tree
    Show,
    /// Add a child node under a parent
    Add {
        /// Parent node id
        parent: String,
        /// Content of the new node
        content: String,
    },
    /// Replace a node's content
    Edit {
        /// Node id
        node: String,
        /// New content
        content: String,
    },
    /// Delete a node and its whole subtree
    Rm {
        /// Node id
        node: String,
    },
    /// Expand or collapse a node
    Toggle {
        /// Node id
        node: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "cortex_mindmap=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let client = NodeClient::from_env();
    let engine = SyncEngine::bootstrap(client, &cli.uid).await?;

    let intent = match cli.command {
        Commands::Show => {
            print!("{}", render_tree(&engine.snapshot()));
            return Ok(());
        }
        Commands::Add { parent, content } => Intent::AddChild {
            parent: NodeId::new(parent),
            content,
        },
        Commands::Edit { node, content } => Intent::EditContent {
            node: NodeId::new(node),
            content,
        },
        Commands::Rm { node } => Intent::Delete {
            node: NodeId::new(node),
        },
        Commands::Toggle { node } => Intent::Toggle {
            node: NodeId::new(node),
        },
    };

    match engine.execute(intent).await? {
        Outcome::Committed => {
            print!("{}", render_tree(&engine.snapshot()));
        }
        Outcome::Ignored => {
            anyhow::bail!("no such node in the current tree");
        }
        Outcome::RolledBack(err) => {
            anyhow::bail!("remote store refused the change, nothing saved: {err}");
        }
        Outcome::Detached => {}
    }

    Ok(())
}
