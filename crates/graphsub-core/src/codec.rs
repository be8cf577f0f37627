//! Wire codec for published messages.
//!
//! Payloads are JSON. Backends that multiplex channels over one byte stream
//! frame each message as `channel NUL payload`.

use serde_json::Value;

use crate::error::{Error, Result};

/// Separator between channel name and payload in a framed message.
pub const CHANNEL_SEPARATOR: u8 = 0;

/// Check that `channel` can be used as a channel name.
pub fn validate_channel(channel: &str) -> Result<()> {
    if channel.is_empty() || channel.as_bytes().contains(&CHANNEL_SEPARATOR) {
        return Err(Error::InvalidChannel(channel.to_string()));
    }
    Ok(())
}

/// Serialize a message payload.
pub fn encode_message(message: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Deserialize a message payload.
pub fn decode_message(payload: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(payload)?)
}

/// Prefix a payload with its channel name.
pub fn encode_frame(channel: &str, payload: &[u8]) -> Result<Vec<u8>> {
    validate_channel(channel)?;
    let mut frame = Vec::with_capacity(channel.len() + 1 + payload.len());
    frame.extend_from_slice(channel.as_bytes());
    frame.push(CHANNEL_SEPARATOR);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Split a framed message into channel name and payload.
pub fn decode_frame(frame: &[u8]) -> Result<(&str, &[u8])> {
    let split = frame
        .iter()
        .position(|b| *b == CHANNEL_SEPARATOR)
        .ok_or_else(|| Error::Transport("frame is missing a channel separator".to_string()))?;
    let channel = std::str::from_utf8(&frame[..split])
        .map_err(|e| Error::Transport(format!("channel name is not utf-8: {}", e)))?;
    Ok((channel, &frame[split + 1..]))
}

/// Topic prefix a SUB socket filters on for `channel`.
///
/// Includes the separator so `comment` does not match `commentAdded`.
pub fn topic(channel: &str) -> Vec<u8> {
    let mut topic = Vec::with_capacity(channel.len() + 1);
    topic.extend_from_slice(channel.as_bytes());
    topic.push(CHANNEL_SEPARATOR);
    topic
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_split() {
        let frame = encode_frame("commentAdded", br#"{"text":"hi"}"#).unwrap();
        let (channel, payload) = decode_frame(&frame).unwrap();
        assert_eq!(channel, "commentAdded");
        assert_eq!(decode_message(payload).unwrap(), json!({ "text": "hi" }));
    }

    #[test]
    fn test_invalid_channels() {
        assert!(matches!(validate_channel(""), Err(Error::InvalidChannel(_))));
        assert!(matches!(
            validate_channel("a\0b"),
            Err(Error::InvalidChannel(_))
        ));
        assert!(validate_channel("repo:42/comments").is_ok());
    }

    #[test]
    fn test_frame_without_separator() {
        assert!(matches!(decode_frame(b"no-separator"), Err(Error::Transport(_))));
    }

    #[test]
    fn test_topic_does_not_prefix_match_longer_channel() {
        let frame = encode_frame("commentAdded", b"1").unwrap();
        assert!(!frame.starts_with(&topic("comment")));
        assert!(frame.starts_with(&topic("commentAdded")));
    }

    #[test]
    fn test_decode_garbage_is_codec_error() {
        assert!(matches!(decode_message(b"{not json"), Err(Error::Codec(_))));
    }
}
