//! Message-kind filter for [`RequestQueue`](crate::queue::RequestQueue).
//!
//! The same queue type sits on both sides of the renderer boundary; each
//! instance is told which wire-message variants it is allowed to hold.

use bitflags::bitflags;

bitflags! {
    /// Set of message variants a queue accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageKinds: u8 {
        /// `tile` and `tilecombine` requests.
        const TILES         = 0b0001;
        /// `callback <view> <type> …` events (type ≠ 0).
        const CALLBACKS     = 0b0010;
        /// Tile invalidations, in either callback or `invalidatetiles:` form.
        const INVALIDATIONS = 0b0100;
        /// Anything else, passed through untouched.
        const OTHER         = 0b1000;
        /// Everything.
        const ALL = Self::TILES.bits()
            | Self::CALLBACKS.bits()
            | Self::INVALIDATIONS.bits()
            | Self::OTHER.bits();
    }
}

impl Default for MessageKinds {
    fn default() -> Self {
        MessageKinds::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_kind() {
        let all = MessageKinds::default();
        assert!(all.contains(MessageKinds::TILES | MessageKinds::CALLBACKS));
        assert!(all.contains(MessageKinds::INVALIDATIONS | MessageKinds::OTHER));
    }

    #[test]
    fn renderer_side_excludes_other() {
        let kinds = MessageKinds::TILES | MessageKinds::CALLBACKS | MessageKinds::INVALIDATIONS;
        assert!(!kinds.contains(MessageKinds::OTHER));
    }
}
