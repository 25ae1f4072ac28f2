use serde::Serialize;
use serde_json::Value;

use crate::networking::FrameError;

pub const DELIMITER: char = ':';

/// A single instruction as it travels over the socket: `<tag>:<json>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub tag: String,
    /// `None` for both an empty body and an explicit JSON `null`.
    pub body: Option<Value>,
}

impl Frame {
    /// Splits at the first delimiter only, the JSON body may contain any number of them. A frame
    /// without delimiter is all tag.
    pub fn parse(text: &str) -> Result<Frame, FrameError> {
        let (tag, body) = text.split_once(DELIMITER).unwrap_or((text, ""));

        let body = if body.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(body) {
                Ok(Value::Null) => None,
                Ok(value) => Some(value),
                Err(source) => {
                    return Err(FrameError::InvalidJson {
                        tag: tag.to_string(),
                        source,
                    });
                }
            }
        };

        Ok(Frame {
            tag: tag.to_string(),
            body,
        })
    }

    pub fn encode<T: Serialize + ?Sized>(tag: &str, payload: Option<&T>) -> Result<String, FrameError> {
        if tag.contains(DELIMITER) {
            return Err(FrameError::InvalidTag(tag.to_string()));
        }

        let body = match payload {
            Some(payload) => serde_json::to_string(payload).map_err(|source| FrameError::InvalidJson {
                tag: tag.to_string(),
                source,
            })?,
            None => String::new(),
        };

        Ok(format!("{tag}{DELIMITER}{body}"))
    }
}
