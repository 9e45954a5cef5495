use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mllpgate_server::IncomingMessage;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: &'a str,
    id: &'a str,
    message_type: &'a str,
    charset: &'a str,
    ack: &'a str,
    size: usize,
    text: String,
    timestamp: String,
}

#[derive(Serialize)]
struct AckOutput<'a> {
    schema_id: &'a str,
    host: &'a str,
    port: u16,
    status: &'a str,
    ack: &'a str,
    timestamp: String,
}

pub fn print_message(message: &IncomingMessage, format: OutputFormat) {
    let text = readable(&message.text);
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id: "https://schemas.3leaps.dev/mllpgate/cli/v1/message-received.schema.json",
                id: &message.id,
                message_type: message.message.message_type(),
                charset: message.message.charset(),
                ack: &message.ack,
                size: message.raw.len(),
                text,
                timestamp: now_rfc3339(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "TYPE", "SIZE", "ACK"])
                .add_row(vec![
                    message.id.clone(),
                    message.message.message_type().to_string(),
                    message.raw.len().to_string(),
                    message.ack.clone(),
                ]);
            println!("{table}");
            println!("{text}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} type={} size={} ack={}",
                message.id,
                message.message.message_type(),
                message.raw.len(),
                message.ack
            );
            println!("{text}");
        }
        OutputFormat::Raw => {
            print_raw(&message.raw);
            print_raw(b"\n");
        }
    }
}

pub fn print_ack(host: &str, port: u16, ack: &str, format: OutputFormat) {
    let status = ack_status(ack);
    match format {
        OutputFormat::Json => {
            let out = AckOutput {
                schema_id: "https://schemas.3leaps.dev/mllpgate/cli/v1/ack-received.schema.json",
                host,
                port,
                status,
                ack,
                timestamp: now_rfc3339(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REMOTE", "STATUS", "ACK"])
                .add_row(vec![format!("{host}:{port}"), status.to_string(), ack.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("remote={host}:{port} status={status} ack={ack}"),
        OutputFormat::Raw => {
            print_raw(ack.as_bytes());
            print_raw(b"\n");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// MSA-1 of an acknowledgment line, or `""` for anything else.
fn ack_status(ack: &str) -> &str {
    match ack.strip_prefix("MSA|") {
        Some(rest) => rest.split('|').next().unwrap_or(""),
        None => "",
    }
}

fn readable(text: &str) -> String {
    text.trim_end_matches('\r').replace('\r', "\n")
}

fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}
