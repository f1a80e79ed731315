use clap::Parser;
use grid_engine::config::EngineConfig;
use grid_engine::node::{LoggingLifecycle, NodeEngine};
use grid_engine::operation::types::MemberId;
use grid_engine::partition::PartitionTable;
use grid_engine::transport::HttpTransport;
use grid_engine::transport::handlers::router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "grid-node", about = "Runs one member of the data grid")]
struct Args {
    /// TOML engine configuration; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// This member's id; must match an entry of `members` to own partitions.
    #[arg(long)]
    member_id: Option<String>,

    /// HTTP listen address.
    #[arg(long, default_value = "127.0.0.1:5701")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // 1. Configuration:
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let member = args.member_id.map(MemberId).unwrap_or_else(MemberId::new);

    // 2. Transport with the static member directory:
    let transport = Arc::new(HttpTransport::new(config.invocation.call_timeout()));
    for peer in &config.members {
        transport.register(peer.id.clone(), peer.address);
    }
    if !config.members.iter().any(|peer| peer.id == member) {
        transport.register(member.clone(), args.bind);
    }

    // 3. Initial partition table, round robin over the configured members:
    let mut members: Vec<MemberId> = config.members.iter().map(|peer| peer.id.clone()).collect();
    if members.is_empty() {
        members.push(member.clone());
    }
    let table = PartitionTable::assign(
        1,
        config.partition_count,
        &members,
        config.max_total_backups(),
    )?;
    let anti_entropy_interval = Duration::from_millis(config.anti_entropy_interval_ms);

    let engine = NodeEngine::new(member.clone(), config, transport, Arc::new(LoggingLifecycle))?;
    engine.apply_table(table).await?;
    tracing::info!(
        "Member {} owns {} partition(s), backs up {}",
        member,
        engine.partitions().local_primary_partitions().len(),
        engine.partitions().local_backup_partitions().len()
    );

    // 4. Spawn anti-entropy loop:
    let sync_engine = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(anti_entropy_interval);

        loop {
            interval.tick().await;
            let repaired = sync_engine.sync_replicas().await;
            if repaired > 0 {
                tracing::info!("Anti-entropy repaired {} partition(s)", repaired);
            }
        }
    });

    // 5. Start HTTP server:
    let app = router(engine);

    tracing::info!("HTTP server listening on {}", args.bind);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
