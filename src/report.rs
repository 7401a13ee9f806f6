//! Server-sent event decoding for streamed report generation.

use crate::error::{Error, Result};
use serde::Deserialize;

#[derive(Clone, Debug, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder. Bytes can be fed in arbitrary
/// chunks, events come out once their terminating blank line arrived.
#[derive(Default, Debug)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[derive(Deserialize)]
struct ReportChunk {
    message: String,
}

#[derive(Debug, PartialEq)]
pub enum ReportProgress {
    Continue,
    Done,
}

/// A report document growing one chunk at a time.
#[derive(Default, Debug)]
pub struct Report {
    content: String,
    chunks: usize,
}

impl Report {
    pub fn apply(&mut self, event: SseEvent) -> Result<ReportProgress> {
        match event.event.as_str() {
            "message" => {
                match serde_json::from_str::<ReportChunk>(&event.data) {
                    Ok(chunk) => {
                        self.content.push_str(&chunk.message);
                        self.chunks += 1;
                    }
                    Err(error) => log::warn!("Skip report chunk: {}", error),
                }
                Ok(ReportProgress::Continue)
            }
            "end" => {
                log::debug!("Report complete after {} chunks", self.chunks);
                Ok(ReportProgress::Done)
            }
            "error" => {
                let reason = if event.data.is_empty() {
                    "backend reported an error".to_string()
                } else {
                    event.data
                };
                Err(Error::ReportStream(reason))
            }
            other => {
                log::debug!("Ignore report event {}", other);
                Ok(ReportProgress::Continue)
            }
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}
