use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

/// How much detail a card shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusLevel {
    #[default]
    Collapsed,
    /// Inline mini chart and stat grid.
    Expanded,
    /// Modal overlay with the full chart.
    FullScreen,
}

impl FocusLevel {
    pub fn shows_series(self) -> bool {
        self >= FocusLevel::Expanded
    }
}

/// Per-instrument focus levels, keyed by instrument id.
///
/// Entries outlive snapshots: an id missing from the latest snapshot keeps
/// its level and gets it back when it reappears. At most one id is
/// `FullScreen` at a time.
#[derive(Debug, Clone, Default)]
pub struct FocusState {
    levels: HashMap<String, FocusLevel>,
    full_screen: Option<String>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, id: &str) -> FocusLevel {
        self.levels.get(id).copied().unwrap_or_default()
    }

    pub fn full_screen(&self) -> Option<&str> {
        self.full_screen.as_deref()
    }

    /// `Collapsed` ↔ `Expanded`. No-op while full screen.
    pub fn toggle_expand(&mut self, id: &str) -> FocusLevel {
        let next = match self.level(id) {
            FocusLevel::Collapsed => FocusLevel::Expanded,
            FocusLevel::Expanded => FocusLevel::Collapsed,
            FocusLevel::FullScreen => return FocusLevel::FullScreen,
        };
        self.set(id, next);
        next
    }

    /// Any level → `FullScreen`. Whatever was full screen before drops back
    /// to `Expanded`.
    pub fn open_full_screen(&mut self, id: &str) -> FocusLevel {
        if let Some(previous) = self.full_screen.take() {
            if previous != id {
                debug!(%previous, next = %id, "replacing full-screen instrument");
                self.set(&previous, FocusLevel::Expanded);
            }
        }
        self.set(id, FocusLevel::FullScreen);
        self.full_screen = Some(id.to_string());
        FocusLevel::FullScreen
    }

    /// `FullScreen` → `Expanded`. No-op for any other level.
    pub fn close_full_screen(&mut self, id: &str) -> FocusLevel {
        if self.level(id) != FocusLevel::FullScreen {
            return self.level(id);
        }
        self.set(id, FocusLevel::Expanded);
        self.full_screen = None;
        FocusLevel::Expanded
    }

    fn set(&mut self, id: &str, level: FocusLevel) {
        match level {
            FocusLevel::Collapsed => {
                self.levels.remove(id);
            }
            _ => {
                self.levels.insert(id.to_string(), level);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_collapsed() {
        let focus = FocusState::new();
        assert_eq!(focus.level("bitcoin"), FocusLevel::Collapsed);
        assert_eq!(focus.full_screen(), None);
    }

    #[test]
    fn toggle_flips_between_collapsed_and_expanded() {
        let mut focus = FocusState::new();
        assert_eq!(focus.toggle_expand("bitcoin"), FocusLevel::Expanded);
        assert_eq!(focus.toggle_expand("bitcoin"), FocusLevel::Collapsed);
        assert_eq!(focus.level("bitcoin"), FocusLevel::Collapsed);
    }

    #[test]
    fn toggle_is_noop_while_full_screen() {
        let mut focus = FocusState::new();
        focus.open_full_screen("bitcoin");
        assert_eq!(focus.toggle_expand("bitcoin"), FocusLevel::FullScreen);
        assert_eq!(focus.full_screen(), Some("bitcoin"));
    }

    #[test]
    fn close_returns_to_expanded_even_from_collapsed() {
        let mut focus = FocusState::new();
        focus.open_full_screen("bitcoin");
        assert_eq!(focus.close_full_screen("bitcoin"), FocusLevel::Expanded);
        assert_eq!(focus.full_screen(), None);
    }

    #[test]
    fn close_on_non_full_screen_is_noop() {
        let mut focus = FocusState::new();
        focus.open_full_screen("bitcoin");
        assert_eq!(focus.close_full_screen("ethereum"), FocusLevel::Collapsed);
        assert_eq!(focus.full_screen(), Some("bitcoin"));
    }

    #[test]
    fn opening_another_closes_the_previous_full_screen() {
        let mut focus = FocusState::new();
        focus.open_full_screen("bitcoin");
        focus.open_full_screen("ethereum");

        assert_eq!(focus.level("bitcoin"), FocusLevel::Expanded);
        assert_eq!(focus.level("ethereum"), FocusLevel::FullScreen);
        assert_eq!(focus.full_screen(), Some("ethereum"));
    }

    #[test]
    fn reopening_same_instrument_is_stable() {
        let mut focus = FocusState::new();
        focus.open_full_screen("bitcoin");
        focus.open_full_screen("bitcoin");
        assert_eq!(focus.level("bitcoin"), FocusLevel::FullScreen);
        assert_eq!(focus.full_screen(), Some("bitcoin"));
    }

    #[test]
    fn only_expanded_and_above_show_series() {
        assert!(!FocusLevel::Collapsed.shows_series());
        assert!(FocusLevel::Expanded.shows_series());
        assert!(FocusLevel::FullScreen.shows_series());
    }
}
