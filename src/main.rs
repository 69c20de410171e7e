use std::error::Error;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use btc_handshake::config::{Args, NodeConfig};
use btc_handshake::pool::{PeerId, PeerPool, PeerStatus};
use btc_handshake::telemetry;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    telemetry::init(&args.log_level);

    let config = NodeConfig::from(args);
    info!(
        network = %config.network,
        magic = %format!("{:#010x}", config.magic()),
        peers = config.peers.len(),
        "starting"
    );

    let peers = config.peers.clone();
    let pool = PeerPool::new(config);
    for peer in &peers {
        pool.connect(peer)?;
    }

    // Runs until every session has ended or a line is entered on stdin.
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            if matches!(io::stdin().read_line(&mut String::new()), Ok(n) if n > 0) {
                let _ = tx.send(());
            }
        })?;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(()) => {
                info!("shutdown requested");
                break;
            }
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            Err(RecvTimeoutError::Timeout) => {}
        }
        report(pool.prune());
        if pool.is_empty() {
            break;
        }
    }

    report(pool.shutdown());
    Ok(())
}

fn report(statuses: Vec<(PeerId, PeerStatus)>) {
    for (id, status) in statuses {
        if let PeerStatus::Failed(reason) = status {
            warn!(%id, %reason, "peer failed");
        }
    }
}
