use std::sync::Arc;
use std::time::Duration;
use tapestry_mesh::config::NodeConfig;
use tapestry_mesh::identifier::Id;
use tapestry_mesh::node::TapestryNode;
use tapestry_mesh::routing::types::Node;
use tapestry_mesh::rpc::handlers::router;
use tapestry_mesh::rpc::transport::Transport;
use tapestry_mesh::rpc::HttpTransport;
use tracing_subscriber::EnvFilter;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        let program = NodeConfig::program_name(&args);
        eprintln!("Usage: {} {}", program, NodeConfig::USAGE);
        eprintln!("Example: {} --bind 127.0.0.1:5000", program);
        eprintln!(
            "Example: {} --bind 127.0.0.1:5001 --seed 127.0.0.1:5000",
            program
        );

        std::process::exit(1);
    }

    let config = NodeConfig::from_args(&args[1..])?;

    tracing::info!("Starting node on {}", config.bind_addr);
    match config.seed {
        Some(seed) => tracing::info!("Seed node: {}", seed),
        None => tracing::info!("Starting as the first node of a new mesh"),
    }

    // 1. Node:
    let id = config
        .id
        .unwrap_or_else(|| Id::random(&mut rand::thread_rng()));
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        config.overlay.rpc_timeout,
        config.overlay.http_attempts,
    ));
    let node = TapestryNode::new(
        Node::new(id, config.bind_addr),
        config.overlay.clone(),
        transport,
    );
    tracing::info!("Node ID: {}", node.id());

    // 2. HTTP server (peer RPC + object API):
    let app = router(node.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("HTTP server listening on {}", config.bind_addr);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });

    // 3. Join the mesh:
    if let Some(seed) = config.seed {
        node.join_via(seed).await?;
    }

    // 4. Maintenance loops:
    node.clone().start_maintenance();

    // 5. Spawn stats reporter:
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);

        loop {
            interval.tick().await;
            if stats_node.is_stopped() {
                break;
            }
            let snapshot = stats_node.snapshot();
            tracing::info!(
                "Node stats: {} routing entries, {} backpointers, {} root records, {} local blobs",
                stats_node.table().len(),
                snapshot.backpointers.len(),
                snapshot.root_records,
                snapshot.local_blobs
            );
        }
    });

    tracing::info!("Press Ctrl+C to leave the mesh");
    tokio::signal::ctrl_c().await?;

    // 6. Graceful leave:
    node.leave().await?;
    server.abort();

    Ok(())
}
