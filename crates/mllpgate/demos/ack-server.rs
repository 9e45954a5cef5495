//! Acknowledging server: accepts HL7 messages and answers each one.
//!
//! Messages with a PID segment get `AA`, anything else `AE`.
//!
//! Run with:
//!   cargo run --example ack-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1 2575 \
//!     --data $'MSH|^~\\&|SND|FAC|RCV|FAC|20240101||ADT^A01|M1|P|2.5\nPID|1'

use mllpgate::hl7::{ACK_ACCEPT, ACK_ERROR};
use mllpgate::server::{AckOutcome, MllpServer, ServerConfig, ServerEvent};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::var("MLLPGATE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(2575);

    let (server, mut events) = MllpServer::bind(ServerConfig::new("127.0.0.1", port)).await?;
    eprintln!("Listening on {}", server.local_addr());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(ServerEvent::Message(message)) => {
                    let code = if message.message.segment("PID").is_some() {
                        ACK_ACCEPT
                    } else {
                        ACK_ERROR
                    };
                    eprintln!("{} {} -> {code}", message.id, message.message.message_type());
                    server.respond(&message.id, AckOutcome::StatusCode(code.to_string()));
                }
                Some(ServerEvent::Connected(state)) => {
                    eprintln!("Connected: {}", state.remote_list().unwrap_or_default());
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    server.close().await;
    Ok(())
}
