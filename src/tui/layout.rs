/// Responsive breakpoint system for the chat layout.
///
/// Single source of truth for width thresholds - no magic numbers scattered in render code.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakpoint {
    /// < 60 cols: Split pane, minimal terminal
    Compact,
    /// 60-99 cols: Half-screen
    Normal,
    /// 100-139 cols: Full terminal
    Wide,
    /// 140+ cols: Ultrawide monitor
    UltraWide,
}

impl Breakpoint {
    pub fn from_width(width: u16) -> Self {
        match width {
            0..=59 => Breakpoint::Compact,
            60..=99 => Breakpoint::Normal,
            100..=139 => Breakpoint::Wide,
            _ => Breakpoint::UltraWide,
        }
    }

    /// Check if at least this breakpoint (inclusive)
    pub fn at_least(&self, min: Breakpoint) -> bool {
        self.ordinal() >= min.ordinal()
    }

    fn ordinal(&self) -> u8 {
        match self {
            Breakpoint::Compact => 0,
            Breakpoint::Normal => 1,
            Breakpoint::Wide => 2,
            Breakpoint::UltraWide => 3,
        }
    }

    /// Sidebar columns when it is docked
    pub fn sidebar_width(&self) -> u16 {
        match self {
            Breakpoint::UltraWide => 40,
            _ => 32,
        }
    }
}

/// Below `Wide` the sidebar floats over the thread and is toggled
pub fn sidebar_is_overlay(width: u16) -> bool {
    !Breakpoint::from_width(width).at_least(Breakpoint::Wide)
}

/// Widest a bubble may get, as a share of the thread width
pub fn bubble_width(thread_width: u16) -> u16 {
    let share = if Breakpoint::from_width(thread_width).at_least(Breakpoint::Normal) {
        thread_width * 3 / 4
    } else {
        thread_width.saturating_sub(4)
    };
    share.max(12).min(thread_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_thresholds() {
        assert_eq!(Breakpoint::from_width(40), Breakpoint::Compact);
        assert_eq!(Breakpoint::from_width(59), Breakpoint::Compact);
        assert_eq!(Breakpoint::from_width(60), Breakpoint::Normal);
        assert_eq!(Breakpoint::from_width(99), Breakpoint::Normal);
        assert_eq!(Breakpoint::from_width(100), Breakpoint::Wide);
        assert_eq!(Breakpoint::from_width(139), Breakpoint::Wide);
        assert_eq!(Breakpoint::from_width(140), Breakpoint::UltraWide);
    }

    #[test]
    fn at_least_comparisons() {
        let wide = Breakpoint::Wide;
        assert!(wide.at_least(Breakpoint::Compact));
        assert!(wide.at_least(Breakpoint::Normal));
        assert!(wide.at_least(Breakpoint::Wide));
        assert!(!wide.at_least(Breakpoint::UltraWide));
    }

    #[test]
    fn sidebar_overlays_below_wide() {
        assert!(sidebar_is_overlay(80));
        assert!(sidebar_is_overlay(99));
        assert!(!sidebar_is_overlay(100));
    }

    #[test]
    fn bubbles_stay_inside_the_thread() {
        assert_eq!(bubble_width(100), 75);
        assert_eq!(bubble_width(40), 36);
        assert_eq!(bubble_width(8), 8);
    }
}
