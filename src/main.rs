use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use shapetun::config::{DEFAULT_BATCH_CAPACITY, DEFAULT_MAX_PACKET_SIZE, DEFAULT_SEND_INTERVAL};
use shapetun::device::{open_device, DeviceConfig};
use shapetun::transport::{TunnelListener, TunnelStream};
use shapetun::{Tunnel, TunnelConfig};

#[derive(Parser)]
#[command(name = "shapetun", version, about = "Traffic-shaping IP tunnel over TCP")]
struct Cli {
    /// Interface name to request (platform default when omitted)
    #[arg(long)]
    ifname: Option<String>,

    /// Address assigned to the tunnel interface
    #[arg(long)]
    addr: Ipv4Addr,

    /// Netmask of the tunnel subnet
    #[arg(long, default_value = "255.255.255.0")]
    netmask: Ipv4Addr,

    /// Point-to-point peer address on the tunnel subnet
    #[arg(long)]
    peer_addr: Option<Ipv4Addr>,

    /// Interface MTU; also the largest packet the tunnel accepts
    #[arg(long, default_value_t = DEFAULT_MAX_PACKET_SIZE as u16)]
    mtu: u16,

    /// Batch capacity in bytes; the wire frame size is this plus 64
    #[arg(long, default_value_t = DEFAULT_BATCH_CAPACITY)]
    capacity: usize,

    /// Milliseconds between outgoing frames
    #[arg(long, default_value_t = DEFAULT_SEND_INTERVAL.as_millis() as u64)]
    interval_ms: u64,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Wait for the peer to connect
    Listen {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:55555")]
        bind: SocketAddr,
    },
    /// Connect to a listening peer
    Connect {
        /// Peer endpoint address
        peer: SocketAddr,
    },
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shapetun={default_level}")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn run(cli: Cli) -> shapetun::Result<()> {
    let mut device_config = DeviceConfig::new(cli.addr, cli.netmask);
    device_config.name = cli.ifname;
    device_config.destination = cli.peer_addr;
    device_config.mtu = cli.mtu;

    let config = TunnelConfig {
        batch_capacity: cli.capacity,
        max_packet_size: cli.mtu as usize,
        send_interval: Duration::from_millis(cli.interval_ms),
        ..TunnelConfig::default()
    };

    let device = open_device(&device_config)?;

    let stream = match cli.role {
        Role::Listen { bind } => {
            let listener = TunnelListener::bind(bind).await?;
            info!("listening on {}", listener.local_addr()?);
            let stream = listener.accept().await?;
            info!("peer connected from {}", stream.peer_addr());
            stream
        }
        Role::Connect { peer } => {
            let stream = TunnelStream::connect(peer).await?;
            info!("connected to {}", stream.peer_addr());
            stream
        }
    };

    let tunnel = Tunnel::start(config, device, stream).await?;
    let stats = tunnel.stats_handle();
    let shutdown = tunnel.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            shutdown.shutdown();
        }
    });

    let result = tunnel.wait().await;

    let snapshot = stats.snapshot();
    info!(
        packets_captured = snapshot.packets_captured,
        packets_delivered = snapshot.packets_delivered,
        frames_sent = snapshot.frames_sent(),
        frames_received = snapshot.frames_received(),
        "session finished"
    );
    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("tunnel failed: {}", e);
        std::process::exit(1);
    }
}
