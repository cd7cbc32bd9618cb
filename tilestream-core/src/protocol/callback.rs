//! Editor state callbacks: `callback <view|all> <type> <payload…>`.

use std::fmt;

use crate::error::{Result, TileError};
use crate::protocol::parse_int;

/// Callback type numbers emitted by the rendering engine.
pub mod kind {
    pub const INVALIDATE_TILES: i32 = 0;
    pub const INVALIDATE_VISIBLE_CURSOR: i32 = 1;
    pub const CURSOR_VISIBLE: i32 = 5;
    pub const STATE_CHANGED: i32 = 8;
    pub const STATUS_INDICATOR_SET_VALUE: i32 = 10;
    pub const DOCUMENT_SIZE_CHANGED: i32 = 13;
    pub const CELL_CURSOR: i32 = 17;
    pub const INVALIDATE_VIEW_CURSOR: i32 = 24;
    pub const CELL_VIEW_CURSOR: i32 = 26;
    pub const VIEW_CURSOR_VISIBLE: i32 = 28;

    /// Types whose payload names another view in a JSON `viewId` field.
    pub fn is_view_callback(kind: i32) -> bool {
        matches!(
            kind,
            INVALIDATE_VIEW_CURSOR | CELL_VIEW_CURSOR | VIEW_CURSOR_VISIBLE
        )
    }
}

const MODIFIED_STATUS: &str = ".uno:ModifiedStatus";

// ── CallbackTarget ───────────────────────────────────────────────

/// Which view(s) a callback is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackTarget {
    All,
    View(i32),
}

impl CallbackTarget {
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "all" | "-1" => Ok(CallbackTarget::All),
            other => Ok(CallbackTarget::View(parse_int("view", other)?)),
        }
    }
}

impl fmt::Display for CallbackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackTarget::All => f.write_str("all"),
            CallbackTarget::View(id) => write!(f, "{id}"),
        }
    }
}

// ── CallbackIdentity ─────────────────────────────────────────────

/// Coalescing key of a callback. Two queued callbacks with equal
/// identities collapse into the newer one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackIdentity {
    pub target: CallbackTarget,
    pub kind: i32,
    /// `.uno:` command for state changes, JSON `viewId` for view callbacks.
    pub detail: Option<String>,
}

// ── CallbackEvent ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub target: CallbackTarget,
    pub kind: i32,
    pub payload: String,
}

impl CallbackEvent {
    pub fn new(target: CallbackTarget, kind: i32, payload: impl Into<String>) -> Self {
        Self {
            target,
            kind,
            payload: payload.into(),
        }
    }

    /// Parse a `callback` line. The payload is everything after the type
    /// token and may contain spaces.
    pub fn parse(line: &str) -> Result<Self> {
        let rest = line
            .trim_start()
            .strip_prefix("callback")
            .ok_or_else(|| TileError::InvalidMessage(line.to_string()))?
            .trim_start();
        let (target, rest) = rest
            .split_once(char::is_whitespace)
            .ok_or(TileError::MissingField("type"))?;
        let rest = rest.trim_start();
        let (kind, payload) = match rest.split_once(char::is_whitespace) {
            Some((kind, payload)) => (kind, payload),
            None => (rest, ""),
        };
        Ok(Self {
            target: CallbackTarget::parse(target)?,
            kind: parse_int("type", kind)?,
            payload: payload.to_string(),
        })
    }

    /// `None` when this callback must never be merged with another.
    pub fn identity(&self) -> Option<CallbackIdentity> {
        let detail = if self.kind == kind::STATE_CHANGED {
            Some(self.uno_command()?.to_string())
        } else if kind::is_view_callback(self.kind) {
            Some(self.payload_view_id()?)
        } else {
            None
        };
        Some(CallbackIdentity {
            target: self.target,
            kind: self.kind,
            detail,
        })
    }

    /// `.uno:Bold` for a `.uno:Bold=true` payload. Modified-status
    /// toggles and non-command payloads yield `None`.
    fn uno_command(&self) -> Option<&str> {
        let payload = self.payload.trim();
        if !payload.starts_with(".uno:") {
            return None;
        }
        let command = payload.split_once('=').map_or(payload, |(cmd, _)| cmd);
        (command != MODIFIED_STATUS).then_some(command)
    }

    fn payload_view_id(&self) -> Option<String> {
        let json: serde_json::Value = serde_json::from_str(&self.payload).ok()?;
        json.get("viewId").map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

impl fmt::Display for CallbackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback {} {} {}", self.target, self.kind, self.payload)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_payload_spaces() {
        let cb = CallbackEvent::parse("callback 3 13 12474, 188626").unwrap();
        assert_eq!(cb.target, CallbackTarget::View(3));
        assert_eq!(cb.kind, kind::DOCUMENT_SIZE_CHANGED);
        assert_eq!(cb.payload, "12474, 188626");
        assert_eq!(cb.to_string(), "callback 3 13 12474, 188626");
    }

    #[test]
    fn parse_rejects_bad_type() {
        assert!(CallbackEvent::parse("callback all x 1").is_err());
        assert!(CallbackEvent::parse("callback all").is_err());
        assert!(CallbackEvent::parse("notacallback all 1 1").is_err());
    }

    #[test]
    fn plain_identity_is_view_and_type() {
        let a = CallbackEvent::parse("callback all 10 25").unwrap();
        let b = CallbackEvent::parse("callback all 10 50").unwrap();
        assert_eq!(a.identity(), b.identity());
        let c = CallbackEvent::parse("callback 0 10 50").unwrap();
        assert_ne!(a.identity(), c.identity());
    }

    #[test]
    fn state_changed_keys_on_command() {
        let bold = CallbackEvent::parse("callback all 8 .uno:Bold=true").unwrap();
        let bold2 = CallbackEvent::parse("callback all 8 .uno:Bold=false").unwrap();
        let italic = CallbackEvent::parse("callback all 8 .uno:Italic=true").unwrap();
        assert_eq!(bold.identity(), bold2.identity());
        assert_ne!(bold.identity(), italic.identity());
    }

    #[test]
    fn modified_status_never_coalesces() {
        let cb = CallbackEvent::parse("callback all 8 .uno:ModifiedStatus=true").unwrap();
        assert!(cb.identity().is_none());
        let json = CallbackEvent::parse(r#"callback all 8 {"commandName":"x"}"#).unwrap();
        assert!(json.identity().is_none());
    }

    #[test]
    fn view_callbacks_key_on_payload_view() {
        let a = CallbackEvent::parse(r#"callback 0 24 {"viewId": "1", "rectangle": "1, 2"}"#).unwrap();
        let b = CallbackEvent::parse(r#"callback 0 24 {"viewId": "1", "rectangle": "3, 4"}"#).unwrap();
        let c = CallbackEvent::parse(r#"callback 0 24 {"viewId": "2", "rectangle": "3, 4"}"#).unwrap();
        assert_eq!(a.identity(), b.identity());
        assert_ne!(a.identity(), c.identity());
        assert_eq!(a.identity().unwrap().detail.as_deref(), Some("1"));
    }
}
