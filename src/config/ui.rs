//! Chat view settings

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct UiConfig {
    /// Smallest composer height in text lines
    pub composer_min_lines: u16,
    /// Largest composer height before it scrolls
    pub composer_max_lines: u16,
    /// How long toasts stay on screen
    pub toast_secs: u64,
    /// Redraw/animation tick
    pub tick_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            composer_min_lines: 1,
            composer_max_lines: 6,
            toast_secs: 3,
            tick_ms: 200,
        }
    }
}

/// UI settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileUi {
    pub composer_min_lines: Option<u16>,
    pub composer_max_lines: Option<u16>,
    pub toast_secs: Option<u64>,
    pub tick_ms: Option<u64>,
}

impl UiConfig {
    /// Create from file config with defaults
    ///
    /// Bounds are normalized so min >= 1 and max >= min.
    pub fn from_file(file: Option<FileUi>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        let min = file.composer_min_lines.unwrap_or(defaults.composer_min_lines).max(1);
        let max = file
            .composer_max_lines
            .unwrap_or(defaults.composer_max_lines)
            .max(min);

        Self {
            composer_min_lines: min,
            composer_max_lines: max,
            toast_secs: file.toast_secs.unwrap_or(defaults.toast_secs),
            tick_ms: file.tick_ms.unwrap_or(defaults.tick_ms).max(16),
        }
    }
}
