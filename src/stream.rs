//! Incremental decoder for `data: ` framed response bodies
//!
//! Network reads do not line up with frames: a chunk may end in the middle of
//! a line, or even in the middle of the `data: ` marker or a multi-byte
//! character. The decoder keeps the unterminated tail of each chunk and
//! prefixes it to the next one before splitting again.


const FRAME_MARKER: &str = "data: ";
const DONE_SENTINEL: &str = "done";
const ERROR_MARKER: &str = "error:";

/// Decoded protocol event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Next fragment of assistant text
    Delta(String),
    /// Normal end of the response
    Completed,
    /// The service reported a failure mid-stream
    Error(String),
}

impl StreamEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}

/// Split `remainder ++ chunk` into complete lines plus the new remainder.
///
/// Splitting happens on raw bytes, so a UTF-8 sequence cut by a read boundary
/// is reassembled before it is decoded. A trailing `\r` is treated as part of
/// the line terminator.
#[must_use]
pub fn split_frames(remainder: Vec<u8>, chunk: &[u8]) -> (Vec<String>, Vec<u8>) {
    let mut buffer = remainder;
    buffer.extend_from_slice(chunk);

    let mut lines = Vec::new();
    let mut start = 0;
    for (i, byte) in buffer.iter().enumerate() {
        if *byte == b'\n' {
            lines.push(decode_line(&buffer[start..i]));
            start = i + 1;
        }
    }

    let rest = buffer.split_off(start);
    (lines, rest)
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Interpret one complete line. Lines without the frame marker are noise.
#[must_use]
pub fn parse_frame(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(FRAME_MARKER)?;

    if payload == DONE_SENTINEL {
        Some(StreamEvent::Completed)
    } else if let Some(message) = payload.strip_prefix(ERROR_MARKER) {
        Some(StreamEvent::Error(message.to_string()))
    } else {
        Some(StreamEvent::Delta(payload.to_string()))
    }
}

/// Stateful decoder for a single response body. Not reused across sends.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    remainder: Vec<u8>,
    finished: bool,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the body
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let (lines, rest) = split_frames(std::mem::take(&mut self.remainder), chunk);
        self.remainder = rest;
        self.interpret(lines)
    }

    /// Signal end of body.
    ///
    /// A buffered line without its terminator is still interpreted, and the
    /// response completes implicitly if no sentinel was seen.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let residual = std::mem::take(&mut self.remainder);
        let mut events = if residual.is_empty() {
            Vec::new()
        } else {
            tracing::debug!(bytes = residual.len(), "Flushing unterminated line at end of body");
            self.interpret([decode_line(&residual)])
        };

        if !self.finished {
            tracing::debug!("Body ended without sentinel, completing implicitly");
            self.finished = true;
            events.push(StreamEvent::Completed);
        }

        events
    }

    fn interpret(&mut self, lines: impl IntoIterator<Item = String>) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        for line in lines {
            let Some(event) = parse_frame(&line) else {
                if !line.is_empty() {
                    tracing::trace!(line = %line, "Ignoring non-frame line");
                }
                continue;
            };

            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                self.finished = true;
                self.remainder.clear();
                break;
            }
        }

        events
    }
}
