//! Event objects
//!
//! Plain data records passed to listeners: generic events, message events
//! and close events.

use serde_json::Value;

use super::close_code;
use crate::server::Server;
use crate::socket::ClientHandle;

/// The object an event was dispatched on
#[derive(Debug, Clone)]
pub enum EventTarget {
    /// A client socket (WebSocket or Socket.IO)
    Client(ClientHandle),
    /// A server
    Server(Server),
}

/// Type-specific event fields
#[derive(Debug, Clone, PartialEq)]
pub enum EventDetail {
    /// Generic event (`open`, `error`, `connection`, ...)
    Plain,
    /// Message event
    Message {
        /// Payload
        data: Value,
        /// URL the message originated from
        origin: String,
    },
    /// Close event
    Close {
        /// Close status code
        code: u16,
        /// Close reason
        reason: String,
        /// Whether the connection closed cleanly
        was_clean: bool,
    },
}

/// An event delivered to listeners
#[derive(Debug, Clone)]
pub struct Event {
    /// Event type, used as the listener key
    pub event_type: String,
    /// Object the event was dispatched on
    pub target: Option<EventTarget>,
    /// Creation time in milliseconds since the Unix epoch
    pub time_stamp: i64,
    /// Always false; listeners receive events by reference
    pub default_prevented: bool,
    /// Type-specific fields
    pub detail: EventDetail,
}

impl Event {
    /// Create a generic event
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            target: None,
            time_stamp: chrono::Utc::now().timestamp_millis(),
            default_prevented: false,
            detail: EventDetail::Plain,
        }
    }

    /// Create a message event
    pub fn message(event_type: impl Into<String>, data: Value, origin: impl Into<String>) -> Self {
        Self {
            detail: EventDetail::Message {
                data,
                origin: origin.into(),
            },
            ..Self::new(event_type)
        }
    }

    /// Create a close event
    ///
    /// `was_clean` is derived from the code: normal closure and "no status"
    /// count as clean. Use [`Event::with_was_clean`] to force it.
    pub fn close(event_type: impl Into<String>, code: u16, reason: impl Into<String>) -> Self {
        Self {
            detail: EventDetail::Close {
                code,
                reason: reason.into(),
                was_clean: close_code::is_clean(code),
            },
            ..Self::new(event_type)
        }
    }

    /// Set the target
    pub fn with_target(mut self, target: EventTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Mark a close event as clean regardless of its code
    pub fn with_was_clean(mut self, clean: bool) -> Self {
        if let EventDetail::Close { was_clean, code, .. } = &mut self.detail {
            *was_clean = clean || close_code::is_clean(*code);
        }
        self
    }

    /// Copy of this event under a different type
    pub fn retyped(&self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..self.clone()
        }
    }

    /// Message payload, if this is a message event
    pub fn data(&self) -> Option<&Value> {
        match &self.detail {
            EventDetail::Message { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Message origin, if this is a message event
    pub fn origin(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::Message { origin, .. } => Some(origin),
            _ => None,
        }
    }

    /// Close code, if this is a close event
    pub fn code(&self) -> Option<u16> {
        match &self.detail {
            EventDetail::Close { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Close reason, if this is a close event
    pub fn reason(&self) -> Option<&str> {
        match &self.detail {
            EventDetail::Close { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Clean-close flag, if this is a close event
    pub fn was_clean(&self) -> Option<bool> {
        match &self.detail {
            EventDetail::Close { was_clean, .. } => Some(*was_clean),
            _ => None,
        }
    }

    /// The client this event targets, if any
    pub fn target_client(&self) -> Option<&ClientHandle> {
        match &self.target {
            Some(EventTarget::Client(client)) => Some(client),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_event_fields() {
        let event = Event::message("greeting", json!("hi"), "ws://localhost/");
        assert_eq!(event.event_type, "greeting");
        assert_eq!(event.data(), Some(&json!("hi")));
        assert_eq!(event.origin(), Some("ws://localhost/"));
        assert_eq!(event.code(), None);
        assert!(!event.default_prevented);
    }

    #[test]
    fn test_close_event_clean_flag() {
        let event = Event::close("close", close_code::NORMAL, "");
        assert_eq!(event.code(), Some(1000));
        assert_eq!(event.was_clean(), Some(true));

        let event = Event::close("close", close_code::ABNORMAL, "dropped");
        assert_eq!(event.was_clean(), Some(false));
        assert_eq!(event.reason(), Some("dropped"));

        let event = Event::close("close", close_code::ABNORMAL, "").with_was_clean(true);
        assert_eq!(event.was_clean(), Some(true));
    }

    #[test]
    fn test_retyped_keeps_fields() {
        let event = Event::close("close", 4000, "bye");
        let disconnect = event.retyped("disconnect");
        assert_eq!(disconnect.event_type, "disconnect");
        assert_eq!(disconnect.code(), Some(4000));
        assert_eq!(disconnect.reason(), Some("bye"));
    }
}
