//! Line-delimited JSON analyzer server.
//!
//! Each connection gets its own [`TrustLedger`]. Every inbound line is
//! answered with one reply line; a connection that sends nothing for a whole
//! idle window loses trust.

use crate::analyzer::{AnalyzerEngine, TrustLedger};
use crate::config::AnalyzerSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    pub settings: AnalyzerSettings,
}

impl ServerConfig {
    pub fn new(port: u16, settings: AnalyzerSettings) -> Self {
        Self { port, settings }
    }
}

/// Run the analyzer server until the returned sender fires.
pub async fn run(config: ServerConfig) -> anyhow::Result<(SocketAddr, oneshot::Sender<()>)> {
    let engine = Arc::new(AnalyzerEngine::new(config.settings));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Analyzer listening on {}", actual_addr);

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::info!("Analyzer shutdown signal received");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, engine).await {
                                tracing::warn!("Connection {} ended with error: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Accept failed: {}", e),
                },
            }
        }
    });

    Ok((actual_addr, shutdown_tx))
}

async fn serve_connection(stream: TcpStream, engine: Arc<AnalyzerEngine>) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    tracing::info!("Client connected: {}", peer);

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut ledger = TrustLedger::new(engine.settings());

    let window = engine
        .settings()
        .idle_decay_interval
        .max(Duration::from_millis(1));
    let mut idle = tokio::time::interval(window);
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);
    idle.tick().await;
    let mut heard_from_client = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                heard_from_client = true;

                let reply = engine.respond(&line, &mut ledger);
                let mut text = serde_json::to_string(&reply)?;
                text.push('\n');
                writer.write_all(text.as_bytes()).await?;
            }
            _ = idle.tick() => {
                if !heard_from_client {
                    let score = engine.decay_idle(&mut ledger);
                    tracing::debug!("Idle decay for {}: trust {}", peer, score);
                }
                heard_from_client = false;
            }
        }
    }

    tracing::info!("Client disconnected: {} (trust {})", peer, ledger.score());
    Ok(())
}
