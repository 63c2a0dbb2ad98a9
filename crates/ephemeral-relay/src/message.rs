//! Protocol frames.
//!
//! Every frame is a JSON array whose first element is the verb:
//! - Client to relay: EVENT, REQ, CLOSE
//! - Relay to client: EVENT, OK, EOSE, NOTICE

use crate::event::Event;
use crate::filter::Filter;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors that can occur when parsing client frames.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("unable to parse message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unable to read message: expected a JSON array")]
    NotArray,

    #[error("unable to read message: empty array")]
    Empty,

    #[error("unable to read message: verb must be a string")]
    InvalidVerb,

    #[error("unable to handle message: unknown verb {0}")]
    UnknownVerb(String),

    #[error("invalid {verb}: {reason}")]
    Invalid { verb: &'static str, reason: String },
}

impl MessageError {
    fn invalid(verb: &'static str, reason: impl Into<String>) -> Self {
        MessageError::Invalid {
            verb,
            reason: reason.into(),
        }
    }
}

/// Messages sent from client to relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Publish an event: ["EVENT", <event JSON>]
    Event(Box<Event>),

    /// Subscribe to events: ["REQ", <subscription_id>, <filter1>, <filter2>, ...]
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// Close a subscription: ["CLOSE", <subscription_id>]
    Close { subscription_id: String },
}

impl ClientMessage {
    /// Parse a raw text frame.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Parse an already decoded frame.
    pub fn from_value(value: Value) -> Result<Self, MessageError> {
        let Value::Array(mut arr) = value else {
            return Err(MessageError::NotArray);
        };
        if arr.is_empty() {
            return Err(MessageError::Empty);
        }

        let verb = match arr.remove(0) {
            Value::String(verb) => verb,
            _ => return Err(MessageError::InvalidVerb),
        };
        let mut payload = arr.into_iter();

        match verb.as_str() {
            "EVENT" => {
                let event = payload
                    .next()
                    .ok_or_else(|| MessageError::invalid("EVENT", "missing event"))?;
                let event: Event = serde_json::from_value(event)
                    .map_err(|e| MessageError::invalid("EVENT", e.to_string()))?;
                Ok(ClientMessage::Event(Box::new(event)))
            }
            "REQ" => {
                let subscription_id = subscription_id("REQ", payload.next())?;
                let filters = payload
                    .map(serde_json::from_value::<Filter>)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| MessageError::invalid("REQ", format!("bad filter: {e}")))?;
                Ok(ClientMessage::Req {
                    subscription_id,
                    filters,
                })
            }
            "CLOSE" => {
                let subscription_id = subscription_id("CLOSE", payload.next())?;
                Ok(ClientMessage::Close { subscription_id })
            }
            _ => Err(MessageError::UnknownVerb(verb)),
        }
    }
}

fn subscription_id(verb: &'static str, value: Option<Value>) -> Result<String, MessageError> {
    match value {
        Some(Value::String(id)) => Ok(id),
        Some(_) => Err(MessageError::invalid(verb, "subscription name must be a string")),
        None => Err(MessageError::invalid(verb, "missing subscription name")),
    }
}

/// Messages sent from relay to client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayMessage<'a> {
    /// Event matching a subscription: ["EVENT", <subscription_id>, <event JSON>]
    Event {
        subscription_id: &'a str,
        event: &'a Event,
    },

    /// Publish result: ["OK", <event_id>, <true|false>, <message>]
    Ok {
        event_id: &'a str,
        accepted: bool,
        message: &'a str,
    },

    /// End of stored events: ["EOSE", <subscription_id>]
    Eose { subscription_id: &'a str },

    /// Human-readable notice: ["NOTICE", "", <message>]
    Notice { message: &'a str },
}

impl RelayMessage<'_> {
    /// Verb of this frame
    pub fn verb(&self) -> &'static str {
        match self {
            RelayMessage::Event { .. } => "EVENT",
            RelayMessage::Ok { .. } => "OK",
            RelayMessage::Eose { .. } => "EOSE",
            RelayMessage::Notice { .. } => "NOTICE",
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Value {
        match *self {
            RelayMessage::Event {
                subscription_id,
                event,
            } => json!(["EVENT", subscription_id, event]),
            RelayMessage::Ok {
                event_id,
                accepted,
                message,
            } => json!(["OK", event_id, accepted, message]),
            RelayMessage::Eose { subscription_id } => json!(["EOSE", subscription_id]),
            RelayMessage::Notice { message } => json!(["NOTICE", "", message]),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}
