//! Rendering options and configuration.

/// Options for Markdown emission.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Apply Unicode NFKC normalization to emitted text (expands
    /// ligatures and compatibility forms)
    pub normalize_unicode: bool,

    /// Drop U+FFFD replacement characters
    pub remove_replacement_char: bool,

    /// Escape special Markdown characters in text
    pub escape_special_chars: bool,

    /// Character used for unordered list markers
    pub list_marker: char,

    /// Insert `-----` between pages of unchunked output
    pub page_separators: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable NFKC normalization.
    pub fn with_normalization(mut self, enabled: bool) -> Self {
        self.normalize_unicode = enabled;
        self
    }

    pub fn with_replacement_char_removal(mut self, enabled: bool) -> Self {
        self.remove_replacement_char = enabled;
        self
    }

    /// Enable or disable Markdown escaping.
    pub fn with_escaping(mut self, enabled: bool) -> Self {
        self.escape_special_chars = enabled;
        self
    }

    /// Set the list marker character.
    pub fn with_list_marker(mut self, marker: char) -> Self {
        self.list_marker = marker;
        self
    }

    /// Enable or disable page separators.
    pub fn with_page_separators(mut self, enabled: bool) -> Self {
        self.page_separators = enabled;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            normalize_unicode: true,
            remove_replacement_char: true,
            escape_special_chars: true,
            list_marker: '-',
            page_separators: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_options_builder() {
        let options = RenderOptions::new()
            .with_normalization(false)
            .with_list_marker('*')
            .with_page_separators(true);

        assert!(!options.normalize_unicode);
        assert_eq!(options.list_marker, '*');
        assert!(options.page_separators);
        assert!(options.escape_special_chars);
    }
}
