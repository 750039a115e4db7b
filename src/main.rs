use bytes::Bytes;
use chordfs::{
    chord::{
        routing,
        types::{File, IdSpace, NodeId},
        CHECK_PREDECESSOR_INTERVAL_MS, FIX_FINGERS_INTERVAL_MS, MAX_STEPS, STABILIZE_INTERVAL_MS,
        SUCCESSOR_LIST_SIZE,
    },
    config::NodeConfig,
    error::{ChordFsError, StorageError},
    logging,
    network::{client::PeerClient, grpc::GrpcTransport, node::ChordPeer},
};
use clap::{Args, Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(name = "chordfs")]
#[command(about = "A Chord ring node that stores files by hashed name")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct NodeArgs {
    /// Address to bind and advertise
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Local port (0 picks a free one)
    #[arg(short = 'p', long, default_value_t = 0)]
    port: u16,
    /// Successor list size
    #[arg(short = 'r', long = "successors", default_value_t = SUCCESSOR_LIST_SIZE)]
    successors: usize,
    #[arg(long = "stabilize-ms", default_value_t = STABILIZE_INTERVAL_MS)]
    stabilize_ms: u64,
    #[arg(long = "fix-fingers-ms", default_value_t = FIX_FINGERS_INTERVAL_MS)]
    fix_fingers_ms: u64,
    #[arg(long = "check-predecessor-ms", default_value_t = CHECK_PREDECESSOR_INTERVAL_MS)]
    check_predecessor_ms: u64,
    /// Operator label returned to peers
    #[arg(short = 'i', long, default_value = "")]
    label: String,
    /// Directory holding stored file contents
    #[arg(long = "data-dir", default_value = "data")]
    data_dir: PathBuf,
}

impl NodeArgs {
    fn into_config(self) -> NodeConfig {
        NodeConfig {
            host: self.host,
            port: self.port,
            successor_list_size: self.successors,
            stabilize_interval_ms: self.stabilize_ms,
            fix_fingers_interval_ms: self.fix_fingers_ms,
            check_predecessor_interval_ms: self.check_predecessor_ms,
            label: self.label,
            data_dir: self.data_dir,
            ..NodeConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new ring with this node as its first member
    #[command(name = "create")]
    Create {
        #[command(flatten)]
        node: NodeArgs,
        /// Identifier width M; the ring has 2^M positions
        #[arg(short = 'm', long = "ring-bits")]
        ring_bits: u32,
    },
    /// Join an existing ring through a member
    #[command(name = "join")]
    Join {
        #[command(flatten)]
        node: NodeArgs,
        /// Bootstrap member host
        #[arg(long = "bootstrap-host", default_value = "127.0.0.1")]
        bootstrap_host: String,
        /// Bootstrap member port
        #[arg(short = 'b', long = "bootstrap-port")]
        bootstrap_port: u16,
    },
    /// Start a node from a JSON config file
    #[command(name = "start")]
    Start {
        #[arg(short = 'c', long)]
        config: PathBuf,
    },
    /// Find the node owning a file name
    #[command(name = "lookup")]
    Lookup {
        /// Any ring member, as ip:port
        #[arg(short = 'n', long)]
        node: String,
        name: String,
    },
    /// Store a local file on the node owning its name
    #[command(name = "store")]
    Store {
        /// Any ring member, as ip:port
        #[arg(short = 'n', long)]
        node: String,
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Ok(level) = cli.log_level.parse::<LevelFilter>() else {
        eprintln!("unknown log level {:?}", cli.log_level);
        return ExitCode::FAILURE;
    };
    if let Err(e) = logging::init(level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), ChordFsError> {
    match command {
        Commands::Create { node, ring_bits } => {
            let config = NodeConfig {
                ring_bits: Some(ring_bits),
                ..node.into_config()
            };
            serve(config).await
        }
        Commands::Join {
            node,
            bootstrap_host,
            bootstrap_port,
        } => {
            let config = NodeConfig {
                bootstrap: Some(format!("{}:{}", bootstrap_host, bootstrap_port)),
                ..node.into_config()
            };
            serve(config).await
        }
        Commands::Start { config } => serve(NodeConfig::from_json_file(config)?).await,
        Commands::Lookup { node, name } => {
            let (id, owner) = remote_lookup(&node, &name).await?;
            println!("{} (id {}) -> {}", name, id, owner);
            Ok(())
        }
        Commands::Store { node, path } => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| StorageError::InvalidName(path.display().to_string()))?
                .to_string();
            let content = tokio::fs::read(&path)
                .await
                .map_err(|source| StorageError::Io { path: path.clone(), source })?;

            let (id, owner) = remote_lookup(&node, &name).await?;
            let client = PeerClient::new(Arc::new(GrpcTransport::new()));
            client
                .store_file(
                    &owner,
                    File {
                        id,
                        name: name.clone(),
                        content: Bytes::from(content),
                    },
                )
                .await?;
            println!("{} (id {}) stored at {}", name, id, owner);
            Ok(())
        }
    }
}

async fn serve(config: NodeConfig) -> Result<(), ChordFsError> {
    let mut peer = ChordPeer::start(config).await?;
    let report = peer.node().report().await?;
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Could not render node state: {}", e),
    }
    info!("Node is running on {}; press Ctrl-C to leave the ring", peer.local_addr());
    peer.run().await
}

/// Resolve the owner of `name` through the ring member at `node`.
async fn remote_lookup(node: &str, name: &str) -> Result<(NodeId, String), ChordFsError> {
    let client = PeerClient::new(Arc::new(GrpcTransport::new()));
    let space = IdSpace::new(client.ring_size(node).await?)?;
    let id = space.id_of(name);
    let owner = routing::find(&client, id, node, MAX_STEPS).await?;
    Ok((id, owner))
}
