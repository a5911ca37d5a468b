/// Per-conversion settings
///
/// A `Settings` value is immutable once built and is passed explicitly into
/// each conversion call. It is cheap to clone (callbacks are reference
/// counted) and safe to share across concurrent conversions.
use std::fmt;
use std::sync::Arc;

/// Rewrites link/image destinations at render time. Returning `Err`
/// aborts the conversion with [`crate::Error::UrlResolver`].
pub type UrlResolver = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Resolves a `[token]` bracket that matched neither an inline link nor a
/// reference. `None` leaves the brackets as literal text.
pub type PlaceholderResolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Settings {
    /// Record original-input source positions on blocks and inlines.
    pub track_positions: bool,
    /// Render soft breaks as `<br />` instead of a newline.
    pub soft_break_as_br: bool,
    /// `~~text~~` becomes Strikethrough.
    pub strikethrough: bool,
    /// `~text~` / `^text^` become Subscript / Superscript.
    pub sub_superscript: bool,
    /// Reference labels match case-sensitively (no Unicode case fold).
    pub case_sensitive_refs: bool,
    /// Parse inline structure inside indented code blocks.
    pub emphasis_in_code: bool,
    /// GitHub-style heading `id` attributes, de-duplicated with `-n` suffixes.
    pub heading_ids: bool,
    /// YAML front matter block delimited by `---` at the start of input.
    pub front_matter: bool,
    /// GitHub-style pipe tables with an alignment row.
    pub pipe_tables: bool,
    pub url_resolver: Option<UrlResolver>,
    pub placeholder_resolver: Option<PlaceholderResolver>,
}

impl Settings {
    pub fn new() -> Self {
        Settings::default()
    }

    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// All additional feature flags enabled (the CLI's `--extended`).
    pub fn extended() -> Self {
        Settings {
            strikethrough: true,
            sub_superscript: true,
            emphasis_in_code: true,
            heading_ids: true,
            front_matter: true,
            pipe_tables: true,
            ..Settings::default()
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("track_positions", &self.track_positions)
            .field("soft_break_as_br", &self.soft_break_as_br)
            .field("strikethrough", &self.strikethrough)
            .field("sub_superscript", &self.sub_superscript)
            .field("case_sensitive_refs", &self.case_sensitive_refs)
            .field("emphasis_in_code", &self.emphasis_in_code)
            .field("heading_ids", &self.heading_ids)
            .field("front_matter", &self.front_matter)
            .field("pipe_tables", &self.pipe_tables)
            .field("url_resolver", &self.url_resolver.is_some())
            .field("placeholder_resolver", &self.placeholder_resolver.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn track_positions(mut self, on: bool) -> Self {
        self.settings.track_positions = on;
        self
    }

    pub fn soft_break_as_br(mut self, on: bool) -> Self {
        self.settings.soft_break_as_br = on;
        self
    }

    pub fn strikethrough(mut self, on: bool) -> Self {
        self.settings.strikethrough = on;
        self
    }

    pub fn sub_superscript(mut self, on: bool) -> Self {
        self.settings.sub_superscript = on;
        self
    }

    pub fn case_sensitive_refs(mut self, on: bool) -> Self {
        self.settings.case_sensitive_refs = on;
        self
    }

    pub fn emphasis_in_code(mut self, on: bool) -> Self {
        self.settings.emphasis_in_code = on;
        self
    }

    pub fn heading_ids(mut self, on: bool) -> Self {
        self.settings.heading_ids = on;
        self
    }

    pub fn front_matter(mut self, on: bool) -> Self {
        self.settings.front_matter = on;
        self
    }

    pub fn pipe_tables(mut self, on: bool) -> Self {
        self.settings.pipe_tables = on;
        self
    }

    pub fn url_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        self.settings.url_resolver = Some(Arc::new(f));
        self
    }

    pub fn placeholder_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.settings.placeholder_resolver = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_flags() {
        let settings = Settings::builder()
            .strikethrough(true)
            .track_positions(true)
            .build();
        assert!(settings.strikethrough);
        assert!(settings.track_positions);
        assert!(!settings.pipe_tables);
    }

    #[test]
    fn extended_enables_features_but_not_positions() {
        let settings = Settings::extended();
        assert!(settings.pipe_tables);
        assert!(settings.front_matter);
        assert!(!settings.track_positions);
    }
}
