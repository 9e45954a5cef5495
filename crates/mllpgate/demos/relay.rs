//! Relay: forwards every inbound message downstream and hands the
//! downstream acknowledgment back to the original sender.
//!
//! If the downstream exchange fails the inbound message is left to the
//! timeout acknowledgment.
//!
//! Run with:
//!   MLLPGATE_DOWNSTREAM=127.0.0.1:2575 cargo run --example relay
//!
//! and point senders at 127.0.0.1:2576.

use std::time::Duration;

use mllpgate::server::{AckOutcome, MllpServer, SendConfig, ServerConfig, ServerEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let downstream = std::env::var("MLLPGATE_DOWNSTREAM").unwrap_or_else(|_| "127.0.0.1:2575".into());
    let (host, port) = downstream
        .rsplit_once(':')
        .ok_or("MLLPGATE_DOWNSTREAM must be host:port")?;
    let (host, port) = (host.to_string(), port.parse::<u16>()?);

    let config = ServerConfig::new("127.0.0.1", 2576).with_ack_timeout(Duration::from_secs(5));
    let (server, mut events) = MllpServer::bind(config).await?;
    eprintln!("Relaying {} -> {host}:{port}", server.local_addr());

    let send_config = SendConfig {
        timeout: Some(Duration::from_secs(4)),
    };

    while let Some(event) = events.recv().await {
        let ServerEvent::Message(message) = event else {
            continue;
        };

        let server = server.clone();
        let host = host.clone();
        let send_config = send_config.clone();
        tokio::spawn(async move {
            match server
                .send_with_config(&host, port, &message.raw, &send_config)
                .await
            {
                Ok(ack_line) => {
                    // Address the downstream verdict back to our own sender.
                    let header = match message.message.response_header() {
                        Ok(header) => header,
                        Err(err) => {
                            eprintln!("{}: {err}", message.id);
                            return;
                        }
                    };
                    let reply = format!("{header}\r{ack_line}");
                    let resolution = server.respond(&message.id, AckOutcome::Literal(reply));
                    eprintln!("{} relayed: {ack_line} ({resolution:?})", message.id);
                }
                Err(err) => eprintln!("{} downstream failed: {err}", message.id),
            }
        });
    }

    Ok(())
}
