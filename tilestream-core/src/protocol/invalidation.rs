//! Tile invalidation events.
//!
//! Two spellings reach the queue:
//!
//! ```text
//! callback <view|all> 0 <x>, <y>, <w>, <h>, <part>[, <mode>]
//! callback <view|all> 0 EMPTY, <part>[, <mode>]
//! invalidatetiles: part=<n> x=<u> y=<u> width=<u> height=<u> [mode=<n>]
//! invalidatetiles: EMPTY, <part>[, <mode>]
//! ```
//!
//! Each event remembers which spelling it arrived in and serialises back
//! the same way.

use std::fmt;

use crate::error::{Result, TileError};
use crate::protocol::callback::{CallbackEvent, CallbackTarget, kind};
use crate::protocol::{pairs, parse_int};

// ── Rect ─────────────────────────────────────────────────────────

/// Axis-aligned rectangle in document units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Far x edge, saturating at `i32::MAX`.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Far y edge, saturating at `i32::MAX`.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Inclusive intersection: rectangles that merely touch count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.right() >= other.x
            && self.x <= other.right()
            && self.bottom() >= other.y
            && self.y <= other.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            span(x, self.right().max(other.right())),
            span(y, self.bottom().max(other.bottom())),
        )
    }

    /// Same row band with touching or overlapping x ranges.
    pub fn joins_horizontally(&self, other: &Rect) -> bool {
        self.y == other.y
            && self.height == other.height
            && self.x <= other.right()
            && other.x <= self.right()
    }
}

fn span(from: i32, to: i32) -> i32 {
    i32::try_from(i64::from(to) - i64::from(from)).unwrap_or(i32::MAX)
}

// ── InvalidationEvent ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    Callback,
    Wire,
}

/// A dirty area of one part; `rect == None` means the whole part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationEvent {
    pub target: CallbackTarget,
    pub part: i32,
    pub mode: i32,
    pub rect: Option<Rect>,
    form: Form,
}

impl InvalidationEvent {
    /// A rectangle invalidation in `callback` form.
    pub fn area(target: CallbackTarget, part: i32, rect: Rect) -> Self {
        Self {
            target,
            part,
            mode: 0,
            rect: Some(rect),
            form: Form::Callback,
        }
    }

    /// A whole-part invalidation in `callback` form.
    pub fn empty(target: CallbackTarget, part: i32) -> Self {
        Self {
            target,
            part,
            mode: 0,
            rect: None,
            form: Form::Callback,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rect.is_none()
    }

    /// Parse an `invalidatetiles:` line.
    pub fn parse(line: &str) -> Result<Self> {
        let body = line
            .trim_start()
            .strip_prefix("invalidatetiles:")
            .ok_or_else(|| TileError::InvalidMessage(line.to_string()))?
            .trim();

        if body.starts_with("EMPTY") {
            let (part, mode) = Self::parse_empty_tail(body)?;
            return Ok(Self {
                target: CallbackTarget::All,
                part,
                mode,
                rect: None,
                form: Form::Wire,
            });
        }

        let mut part = None;
        let mut mode = 0;
        let (mut x, mut y, mut w, mut h) = (None, None, None, None);
        for (key, value) in pairs(body) {
            match key {
                "part" => part = Some(parse_int("part", value)?),
                "mode" => mode = parse_int("mode", value)?,
                "x" => x = Some(parse_int("x", value)?),
                "y" => y = Some(parse_int("y", value)?),
                "width" => w = Some(parse_int("width", value)?),
                "height" => h = Some(parse_int("height", value)?),
                _ => {}
            }
        }
        let rect = Rect::new(
            x.ok_or(TileError::MissingField("x"))?,
            y.ok_or(TileError::MissingField("y"))?,
            w.ok_or(TileError::MissingField("width"))?,
            h.ok_or(TileError::MissingField("height"))?,
        );
        Ok(Self {
            target: CallbackTarget::All,
            part: part.ok_or(TileError::MissingField("part"))?,
            mode,
            rect: Some(rect),
            form: Form::Wire,
        })
    }

    /// Interpret an `INVALIDATE_TILES` callback payload.
    pub fn from_callback(event: &CallbackEvent) -> Result<Self> {
        if event.kind != kind::INVALIDATE_TILES {
            return Err(TileError::InvalidMessage(format!(
                "callback type {} is not an invalidation",
                event.kind
            )));
        }
        let payload = event.payload.trim();
        if payload.starts_with("EMPTY") {
            let (part, mode) = Self::parse_empty_tail(payload)?;
            return Ok(Self {
                target: event.target,
                part,
                mode,
                rect: None,
                form: Form::Callback,
            });
        }

        let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
        if fields.len() < 5 {
            return Err(TileError::InvalidMessage(format!(
                "invalidation needs x, y, w, h, part: {payload}"
            )));
        }
        let rect = Rect::new(
            parse_int("x", fields[0])?,
            parse_int("y", fields[1])?,
            parse_int("width", fields[2])?,
            parse_int("height", fields[3])?,
        );
        let part = parse_int("part", fields[4])?;
        let mode = match fields.get(5) {
            Some(m) => parse_int("mode", m)?,
            None => 0,
        };
        Ok(Self {
            target: event.target,
            part,
            mode,
            rect: Some(rect),
            form: Form::Callback,
        })
    }

    /// `EMPTY, <part>[, <mode>]`
    fn parse_empty_tail(body: &str) -> Result<(i32, i32)> {
        let mut fields = body.split(',').map(str::trim).skip(1);
        let part = match fields.next() {
            Some(p) => parse_int("part", p)?,
            None => 0,
        };
        let mode = match fields.next() {
            Some(m) => parse_int("mode", m)?,
            None => 0,
        };
        Ok((part, mode))
    }

    /// Whether this event and `other` land in the same coalescing bucket.
    pub fn same_scope(&self, other: &InvalidationEvent) -> bool {
        self.target == other.target && self.part == other.part && self.mode == other.mode
    }
}

impl fmt::Display for InvalidationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.form, self.rect) {
            (Form::Callback, Some(r)) => {
                write!(
                    f,
                    "callback {} {} {}, {}, {}, {}, {}",
                    self.target,
                    kind::INVALIDATE_TILES,
                    r.x,
                    r.y,
                    r.width,
                    r.height,
                    self.part
                )?;
                if self.mode != 0 {
                    write!(f, ", {}", self.mode)?;
                }
                Ok(())
            }
            (Form::Callback, None) => {
                write!(
                    f,
                    "callback {} {} EMPTY, {}",
                    self.target,
                    kind::INVALIDATE_TILES,
                    self.part
                )?;
                if self.mode != 0 {
                    write!(f, ", {}", self.mode)?;
                }
                Ok(())
            }
            (Form::Wire, Some(r)) => {
                write!(
                    f,
                    "invalidatetiles: part={} x={} y={} width={} height={}",
                    self.part, r.x, r.y, r.width, r.height
                )?;
                if self.mode != 0 {
                    write!(f, " mode={}", self.mode)?;
                }
                Ok(())
            }
            (Form::Wire, None) => {
                write!(f, "invalidatetiles: EMPTY, {}", self.part)?;
                if self.mode != 0 {
                    write!(f, ", {}", self.mode)?;
                }
                Ok(())
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn from_line(line: &str) -> InvalidationEvent {
        InvalidationEvent::from_callback(&CallbackEvent::parse(line).unwrap()).unwrap()
    }

    #[test]
    fn callback_form_roundtrips() {
        let line = "callback all 0 284, 1418, 11105, 275, 0";
        let ev = from_line(line);
        assert_eq!(ev.rect, Some(Rect::new(284, 1418, 11105, 275)));
        assert_eq!(ev.part, 0);
        assert_eq!(ev.to_string(), line);
    }

    #[test]
    fn callback_empty_with_mode() {
        let ev = from_line("callback 2 0 EMPTY, 1, 3");
        assert!(ev.is_empty());
        assert_eq!(ev.part, 1);
        assert_eq!(ev.mode, 3);
        assert_eq!(ev.target, CallbackTarget::View(2));
        assert_eq!(ev.to_string(), "callback 2 0 EMPTY, 1, 3");
    }

    #[test]
    fn wire_form_roundtrips() {
        let line = "invalidatetiles: part=2 x=0 y=10 width=100 height=20";
        let ev = InvalidationEvent::parse(line).unwrap();
        assert_eq!(ev.rect, Some(Rect::new(0, 10, 100, 20)));
        assert_eq!(ev.to_string(), line);

        let ev = InvalidationEvent::parse("invalidatetiles: EMPTY, 4").unwrap();
        assert!(ev.is_empty());
        assert_eq!(ev.part, 4);
        assert_eq!(ev.to_string(), "invalidatetiles: EMPTY, 4");
    }

    #[test]
    fn short_payload_is_rejected() {
        let cb = CallbackEvent::parse("callback all 0 1, 2, 3").unwrap();
        assert!(InvalidationEvent::from_callback(&cb).is_err());
        assert!(InvalidationEvent::parse("invalidatetiles: part=0 x=1").is_err());
    }

    #[test]
    fn rect_geometry() {
        let a = Rect::new(284, 1418, 11105, 275);
        let b = Rect::new(4299, 1418, 7090, 275);
        assert!(a.joins_horizontally(&b));
        assert_eq!(a.union(&b), a);

        let touching = Rect::new(a.right(), 1418, 10, 275);
        assert!(a.joins_horizontally(&touching));
        let other_row = Rect::new(0, 0, 10, 275);
        assert!(!a.joins_horizontally(&other_row));

        assert!(Rect::new(0, 0, 10, 10).intersects(&Rect::new(10, 10, 5, 5)));
        assert!(!Rect::new(0, 0, 10, 10).intersects(&Rect::new(11, 0, 5, 5)));
    }

    #[test]
    fn edges_saturate_near_i32_max() {
        let a = Rect::new(2_147_483_000, 0, 1000, 10);
        assert_eq!(a.right(), i32::MAX);
        assert!(a.joins_horizontally(&a));
        assert!(a.intersects(&Rect::new(2_147_480_000, 0, 3840, 3840)));

        let wide = Rect::new(-10, 0, 10, 10).union(&a);
        assert_eq!(wide.x, -10);
        assert_eq!(wide.width, i32::MAX);
    }
}
