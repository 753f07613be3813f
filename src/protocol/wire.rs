//! # Feed wire frames (§6.3)
//!
//! A line-framed text protocol over a bidirectional stream: each frame is a
//! keyword line, zero or more JSON-encoded payload lines, then a blank line
//! terminator.

use crate::error::{CoreError, CoreResult};
use crate::feed::FeedId;
use crate::storage::Bookmark;

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Sub { feed_id: FeedId, bookmark: Bookmark },
    Unsub { feed_id: FeedId },
    Book { feed_id: FeedId, bookmark: Bookmark },
    Err { feed_id: FeedId, message: String },
}

fn parse_line<T: serde::de::DeserializeOwned>(payload: &[String], index: usize) -> CoreResult<T> {
    let line = payload
        .get(index)
        .ok_or_else(|| CoreError::MalformedSpecification(format!("missing payload line {index}")))?;
    Ok(serde_json::from_str(line)?)
}

impl Frame {
    /// Encode as keyword line + JSON payload lines + blank terminator.
    pub fn encode(&self) -> CoreResult<String> {
        let mut out = String::new();
        match self {
            Frame::Sub { feed_id, bookmark } => {
                out.push_str("SUB\n");
                out.push_str(&serde_json::to_string(feed_id)?);
                out.push('\n');
                out.push_str(&serde_json::to_string(bookmark)?);
                out.push('\n');
            }
            Frame::Unsub { feed_id } => {
                out.push_str("UNSUB\n");
                out.push_str(&serde_json::to_string(feed_id)?);
                out.push('\n');
            }
            Frame::Book { feed_id, bookmark } => {
                out.push_str("BOOK\n");
                out.push_str(&serde_json::to_string(feed_id)?);
                out.push('\n');
                out.push_str(&serde_json::to_string(bookmark)?);
                out.push('\n');
            }
            Frame::Err { feed_id, message } => {
                out.push_str("ERR\n");
                out.push_str(&serde_json::to_string(feed_id)?);
                out.push('\n');
                out.push_str(&serde_json::to_string(message)?);
                out.push('\n');
            }
        }
        out.push('\n');
        Ok(out)
    }

    /// Decode one frame from its keyword line plus already-isolated payload
    /// lines (the caller's line reader splits frames on the blank
    /// terminator; see [`FrameReader`]).
    pub fn decode(keyword: &str, payload: &[String]) -> CoreResult<Frame> {
        match keyword {
            "SUB" => Ok(Frame::Sub {
                feed_id: parse_line(payload, 0)?,
                bookmark: parse_line(payload, 1)?,
            }),
            "UNSUB" => Ok(Frame::Unsub {
                feed_id: parse_line(payload, 0)?,
            }),
            "BOOK" => Ok(Frame::Book {
                feed_id: parse_line(payload, 0)?,
                bookmark: parse_line(payload, 1)?,
            }),
            "ERR" => Ok(Frame::Err {
                feed_id: parse_line(payload, 0)?,
                message: parse_line(payload, 1)?,
            }),
            other => Err(CoreError::MalformedSpecification(format!(
                "unknown frame keyword '{other}'"
            ))),
        }
    }
}

/// Assembles complete [`Frame`]s from a line-at-a-time feed (e.g. driven
/// from a `BufReader::read_line` loop over a socket).
#[derive(Default)]
pub struct FrameReader {
    keyword: Option<String>,
    payload: Vec<String>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line, without its trailing newline. Returns `Some(Frame)`
    /// once `line` is the blank terminator completing a frame.
    pub fn push_line(&mut self, line: &str) -> CoreResult<Option<Frame>> {
        if self.keyword.is_none() {
            if line.is_empty() {
                return Ok(None);
            }
            self.keyword = Some(line.to_string());
            return Ok(None);
        }
        if line.is_empty() {
            let keyword = self.keyword.take().expect("checked Some above");
            let payload = std::mem::take(&mut self.payload);
            return Frame::decode(&keyword, &payload).map(Some);
        }
        self.payload.push(line.to_string());
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_and_decodes_a_sub_frame() {
        let frame = Frame::Sub {
            feed_id: "feed-1".to_string(),
            bookmark: "7".to_string(),
        };
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded, "SUB\n\"feed-1\"\n\"7\"\n\n");

        let mut reader = FrameReader::new();
        let mut decoded = None;
        for line in encoded.lines() {
            if let Some(f) = reader.push_line(line).unwrap() {
                decoded = Some(f);
            }
        }
        assert_eq!(decoded, Some(frame));
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let err = Frame::decode("NOPE", &[]);
        assert!(err.is_err());
    }

    #[test]
    fn frame_reader_handles_multiple_frames_in_sequence() {
        let mut reader = FrameReader::new();
        let unsub = Frame::Unsub {
            feed_id: "feed-2".to_string(),
        };
        let book = Frame::Book {
            feed_id: "feed-2".to_string(),
            bookmark: "9".to_string(),
        };
        let mut stream = String::new();
        stream.push_str(&unsub.encode().unwrap());
        stream.push_str(&book.encode().unwrap());

        let mut frames = Vec::new();
        for line in stream.lines() {
            if let Some(f) = reader.push_line(line).unwrap() {
                frames.push(f);
            }
        }
        assert_eq!(frames, vec![unsub, book]);
    }
}
