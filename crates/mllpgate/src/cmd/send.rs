use std::fs;
use std::time::Duration;

use mllpgate_server::SendConfig;

use crate::cmd::SendArgs;
use crate::exit::{send_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ack, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let payload = segments_to_wire(&resolve_payload(&args)?);
    if payload.is_empty() {
        return Err(CliError::new(USAGE, "message must not be empty"));
    }

    let config = SendConfig {
        timeout: Some(timeout),
    };
    let ack = super::runtime()?
        .block_on(mllpgate_server::send_with_config(
            &args.host,
            args.port,
            payload,
            &config,
        ))
        .map_err(|err| send_error("send failed", err))?;

    print_ack(&args.host, args.port, &ack, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<String> {
    if let Some(data) = &args.data {
        return Ok(data.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(String::new())
}

/// Normalize line endings to HL7 segment separators.
fn segments_to_wire(text: &str) -> String {
    text.trim_end_matches(['\r', '\n'])
        .replace("\r\n", "\r")
        .replace('\n', "\r")
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_segment_separators() {
        assert_eq!(
            segments_to_wire("MSH|^~\\&|A\nPID|1\r\nPV1|1\n"),
            "MSH|^~\\&|A\rPID|1\rPV1|1"
        );
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn file_payload_is_read() {
        let path = std::env::temp_dir().join(format!("mllpgate-send-{}.hl7", std::process::id()));
        fs::write(&path, "MSH|^~\\&|A\nPID|1\n").unwrap();
        let args = SendArgs {
            host: "127.0.0.1".into(),
            port: 2575,
            data: None,
            file: Some(path.clone()),
            timeout: "5s".into(),
        };
        assert_eq!(segments_to_wire(&resolve_payload(&args).unwrap()), "MSH|^~\\&|A\rPID|1");
        let _ = fs::remove_file(path);
    }
}
