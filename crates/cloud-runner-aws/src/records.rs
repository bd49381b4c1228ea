use cloud_runner::{Error, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;

/// The log-delivery payload: a gzipped JSON batch of log events forwarded
/// from the task's log group.
#[derive(Debug, Deserialize)]
struct LogPayload {
  #[serde(rename = "messageType")]
  message_type: String,
  #[serde(rename = "logEvents", default)]
  log_events: Vec<LogEvent>,
}

#[derive(Debug, Deserialize)]
struct LogEvent {
  message: String,
}

/// Decompress and parse one raw record into its log lines. Control records
/// (anything but `DATA_MESSAGE`) decode to no lines.
pub(crate) fn decode_log_lines(payload: &[u8]) -> Result<Vec<String>> {
  let mut text = String::new();
  GzDecoder::new(payload)
    .read_to_string(&mut text)
    .map_err(|err| {
      Error::internal_runtime_error(format!("Failed to decompress log record: {}", err))
    })?;

  let payload: LogPayload = serde_json::from_str(&text)
    .map_err(|err| Error::internal_runtime_error(format!("Failed to parse log record: {}", err)))?;

  if payload.message_type != "DATA_MESSAGE" {
    return Ok(vec![]);
  }

  Ok(
    payload
      .log_events
      .into_iter()
      .map(|event| event.message)
      .collect(),
  )
}

#[cfg(test)]
pub(crate) fn encode_log_record(message_type: &str, lines: &[&str]) -> Vec<u8> {
  use flate2::{write::GzEncoder, Compression};
  use std::io::Write;

  let events: Vec<serde_json::Value> = lines
    .iter()
    .enumerate()
    .map(|(index, line)| {
      serde_json::json!({ "timestamp": 1_700_000_000_000u64 + index as u64, "message": line })
    })
    .collect();
  let payload = serde_json::json!({ "messageType": message_type, "logEvents": events });

  let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
  encoder
    .write_all(payload.to_string().as_bytes())
    .unwrap();

  encoder.finish().unwrap()
}
