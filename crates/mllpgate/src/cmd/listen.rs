use std::time::Duration;

use mllpgate_server::{AckOutcome, MllpServer, ServerConfig, ServerEvent};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{server_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

const PENDING_POLL: Duration = Duration::from_millis(10);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    super::runtime()?.block_on(serve(args, format))
}

async fn serve(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = server_config(&args);
    let ack_timeout = config.ack_timeout;
    let (server, mut events) = MllpServer::bind(config)
        .await
        .map_err(|err| server_error("bind failed", err))?;

    let reply = args.ack.as_deref().map(AckOutcome::from_reply);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut received = 0usize;
    loop {
        let event = tokio::select! {
            _ = &mut shutdown => {
                info!("interrupt received, closing");
                break;
            }
            event = events.recv() => event,
        };

        match event {
            Some(ServerEvent::Message(message)) => {
                print_message(&message, format);
                if let Some(outcome) = &reply {
                    let resolution = server.respond(&message.id, outcome.clone());
                    debug!(id = %message.id, ?resolution, "acknowledged");
                }

                received = received.saturating_add(1);
                if args.count.is_some_and(|count| received >= count) {
                    await_pending(&server, ack_timeout).await;
                    break;
                }
            }
            Some(ServerEvent::Ready(state)) => {
                info!(port = server.port(), host = %state.host, "ready");
            }
            Some(ServerEvent::Connected(state)) | Some(ServerEvent::Disconnected(state)) => {
                info!(
                    remote = state.remote_list().as_deref().unwrap_or("-"),
                    "connections changed"
                );
            }
            Some(ServerEvent::Error { remote, error }) => {
                warn!(%remote, error = %error, "connection dropped");
            }
            Some(ServerEvent::PeerEnded(_)) => debug!("peer ended its connection"),
            Some(ServerEvent::StateChanged(_)) | Some(ServerEvent::Closed(_)) => {}
            None => break,
        }
    }

    server.close().await;
    Ok(SUCCESS)
}

fn server_config(args: &ListenArgs) -> ServerConfig {
    let mut config = ServerConfig::new(args.host.clone(), args.port);
    if let Some(ms) = args.timeout_ms {
        config = config.with_ack_timeout(Duration::from_millis(ms));
    }
    if let Some(charset) = &args.charset {
        config = config.with_default_charset(charset.clone());
    }
    if let Some(code) = &args.timeout_ack {
        config = config.with_timeout_ack(code.clone());
    }
    config
}

/// Give timeout acknowledgments still in flight a chance to go out.
async fn await_pending(server: &MllpServer, ack_timeout: Duration) {
    let deadline = Instant::now() + ack_timeout + PENDING_POLL * 10;
    while server.pending_count() > 0 && Instant::now() < deadline {
        tokio::time::sleep(PENDING_POLL).await;
    }
}
