//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::feed`] buffers partial
//! lines (including partial UTF-8 sequences) and returns every frame completed
//! by the chunk.

/// Channel name used when a frame has no `event:` field.
pub const DEFAULT_CHANNEL: &str = "message";

/// One dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// Channel the frame was labelled with (`message` if unlabelled)
    pub event: String,
    /// Data lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream, if any
    pub id: Option<String>,
}

/// Stateful line parser for the event-stream format.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
    saw_cr: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body and collect the frames it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            match byte {
                b'\n' if self.saw_cr => {
                    // Second half of a CRLF; the line was already taken at CR.
                    self.saw_cr = false;
                }
                b'\n' | b'\r' => {
                    self.saw_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.buffer);
                    if let Some(frame) = self.process_line(&String::from_utf8_lossy(&line)) {
                        frames.push(frame);
                    }
                }
                _ => {
                    self.saw_cr = false;
                    self.buffer.push(byte);
                }
            }
        }

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
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
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            // retry and unknown fields are ignored
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}
