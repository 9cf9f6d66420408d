//! Human-readable text record
//!
//! ```text
//! [2024-05-01T10:00:00.123Z|1714557600123] ERROR
//! > first message
//! > second message
//! #0 src/circles.rs:42:9
//! #1 src/main.rs:10:5
//! ```
//!
//! Messages and frames are escaped so a record never contains a blank line.
//! Buffer files separate records with one blank line.

use super::error::{DecodeError, Result};
use super::{LogEntry, Origin};

const MESSAGE_PREFIX: &str = "> ";
const FRAME_MARKER: char = '#';

/// Encode an entry as a text record (terminated by a newline)
pub fn encode_text(entry: &LogEntry) -> String {
    let human = entry
        .datetime()
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = format!("[{}|{}] {}\n", human, entry.timestamp(), entry.category());

    for message in entry.messages() {
        out.push_str(MESSAGE_PREFIX);
        out.push_str(&escape(message));
        out.push('\n');
    }

    if let Some(frames) = entry.stack_trace() {
        for (depth, frame) in frames.iter().enumerate() {
            out.push(FRAME_MARKER);
            out.push_str(&depth.to_string());
            out.push(' ');
            out.push_str(&escape(frame));
            out.push('\n');
        }
    }

    out
}

/// Encode a record followed by the blank separator line used in buffer files
pub fn frame_record(entry: &LogEntry) -> String {
    let mut record = encode_text(entry);
    record.push('\n');
    record
}

/// Split a buffer into its records
pub fn split_records(buffer: &str) -> impl Iterator<Item = &str> {
    buffer
        .split("\n\n")
        .map(|record| record.trim_matches('\n'))
        .filter(|record| !record.is_empty())
}

/// Decode one text record
pub fn decode_text(record: &str) -> Result<LogEntry> {
    let mut lines = record.lines().skip_while(|line| line.trim().is_empty());
    let header = lines.next().ok_or(DecodeError::Empty)?;
    let (timestamp, category) = parse_header(header)?;

    let mut messages = Vec::new();
    let mut frames = Vec::new();

    for line in lines {
        if let Some(message) = line.strip_prefix(MESSAGE_PREFIX) {
            if !frames.is_empty() {
                return Err(DecodeError::MalformedLine(line.to_string()));
            }
            messages.push(unescape(message)?);
        } else if let Some(rest) = line.strip_prefix(FRAME_MARKER) {
            let (depth, frame) = rest
                .split_once(' ')
                .ok_or_else(|| DecodeError::MalformedLine(line.to_string()))?;
            let depth: usize = depth
                .parse()
                .map_err(|_| DecodeError::MalformedLine(line.to_string()))?;
            if depth != frames.len() {
                return Err(DecodeError::MalformedLine(line.to_string()));
            }
            frames.push(unescape(frame)?);
        } else {
            return Err(DecodeError::MalformedLine(line.to_string()));
        }
    }

    let entry = LogEntry::builder()
        .category(category)
        .messages(messages)
        .stack_trace(frames)
        .timestamp(timestamp)
        .origin(Origin::Restored)
        .build();

    let violations = entry.validate();
    if !violations.is_empty() {
        return Err(DecodeError::Invalid(violations));
    }
    Ok(entry)
}

fn parse_header(header: &str) -> Result<(i64, super::Category)> {
    let malformed = || DecodeError::MalformedHeader(header.to_string());

    let rest = header.strip_prefix('[').ok_or_else(malformed)?;
    let (stamp, category) = rest.split_once("] ").ok_or_else(malformed)?;
    let (_, millis) = stamp.rsplit_once('|').ok_or_else(malformed)?;
    let timestamp = millis.parse::<i64>().map_err(|_| malformed())?;
    let category = category.parse()?;

    Ok((timestamp, category))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(escaped: &str) -> Result<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            _ => return Err(DecodeError::MalformedLine(escaped.to_string())),
        }
    }
    Ok(out)
}
