//! Host protocol surface.
//!
//! The host dispatcher stores nothing but an opaque [`SessionId`]; session
//! lifetimes are managed here in a registry, so no raw memory address ever
//! crosses the protocol boundary. Calls into this module are serialized by
//! the host — the registry is deliberately unsynchronized.

use std::collections::HashMap;
use std::fmt;

use tracing::info;

use hevcbridge_core::Error;

use crate::config::EncoderConfig;
use crate::decode::DecodeSession;
use crate::encode::EncodeSession;
use crate::negotiate::FormatNegotiator;

/// Result code returned across the host protocol boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation succeeded.
    Ok,
    /// The offered format cannot be used; the host may try another.
    BadFormat,
    /// The operation failed.
    Error,
    /// The request is outside this codec's capabilities.
    Unsupported,
}

impl From<&Error> for Status {
    fn from(err: &Error) -> Self {
        match err {
            Error::FormatRejected(_) | Error::MalformedBitstream(_) => Status::BadFormat,
            Error::Layout(_) => Status::Unsupported,
            _ => Status::Error,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::BadFormat => write!(f, "bad-format"),
            Self::Error => write!(f, "error"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Opaque session token handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

enum Session {
    Encode(EncodeSession),
    Decode(DecodeSession),
}

/// Owns all live sessions, keyed by opaque id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<u64, Session>,
    next_id: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, session: Session) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, session);
        SessionId(id)
    }

    /// Create an encode session in the Closed state.
    pub fn open_encode(&mut self, negotiator: FormatNegotiator, config: EncoderConfig) -> SessionId {
        let id = self.insert(Session::Encode(EncodeSession::new(negotiator, config)));
        info!(%id, "encode session registered");
        id
    }

    /// Create a decode session in the Closed state.
    pub fn open_decode(&mut self, negotiator: FormatNegotiator) -> SessionId {
        let id = self.insert(Session::Decode(DecodeSession::new(negotiator)));
        info!(%id, "decode session registered");
        id
    }

    /// Look up an encode session.
    pub fn encode_mut(&mut self, id: SessionId) -> Option<&mut EncodeSession> {
        match self.sessions.get_mut(&id.0) {
            Some(Session::Encode(sess)) => Some(sess),
            _ => None,
        }
    }

    /// Look up a decode session.
    pub fn decode_mut(&mut self, id: SessionId) -> Option<&mut DecodeSession> {
        match self.sessions.get_mut(&id.0) {
            Some(Session::Decode(sess)) => Some(sess),
            _ => None,
        }
    }

    /// End and remove a session. Unknown ids are fine — closing twice is a
    /// protocol reality, not an error.
    pub fn close(&mut self, id: SessionId) -> Status {
        match self.sessions.remove(&id.0) {
            Some(Session::Encode(mut sess)) => {
                sess.end();
                info!(%id, "encode session closed");
            }
            Some(Session::Decode(mut sess)) => {
                sess.end();
                info!(%id, "decode session closed");
            }
            None => {}
        }
        Status::Ok
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Status::from(&Error::format_rejected("odd")),
            Status::BadFormat
        );
        assert_eq!(
            Status::from(&Error::MalformedBitstream("x".into())),
            Status::BadFormat
        );
        assert_eq!(Status::from(&Error::Layout("x".into())), Status::Unsupported);
        assert_eq!(
            Status::from(&Error::EngineOpenFailed("x".into())),
            Status::Error
        );
        assert_eq!(
            Status::from(&Error::BufferTooSmall { needed: 2, available: 1 }),
            Status::Error
        );
    }

    #[test]
    fn test_registry_ids_unique() {
        let mut reg = SessionRegistry::new();
        let a = reg.open_encode(FormatNegotiator::default(), EncoderConfig::default());
        let b = reg.open_decode(FormatNegotiator::default());
        let c = reg.open_encode(FormatNegotiator::default(), EncoderConfig::default());
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(reg.count(), 3);
    }

    #[test]
    fn test_registry_type_checked_lookup() {
        let mut reg = SessionRegistry::new();
        let enc = reg.open_encode(FormatNegotiator::default(), EncoderConfig::default());
        let dec = reg.open_decode(FormatNegotiator::default());

        assert!(reg.encode_mut(enc).is_some());
        assert!(reg.decode_mut(enc).is_none());
        assert!(reg.decode_mut(dec).is_some());
        assert!(reg.encode_mut(dec).is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reg = SessionRegistry::new();
        let id = reg.open_decode(FormatNegotiator::default());
        assert_eq!(reg.close(id), Status::Ok);
        assert_eq!(reg.close(id), Status::Ok);
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn test_ids_not_reused_after_close() {
        let mut reg = SessionRegistry::new();
        let a = reg.open_decode(FormatNegotiator::default());
        reg.close(a);
        let b = reg.open_decode(FormatNegotiator::default());
        assert_ne!(a, b);
    }
}
