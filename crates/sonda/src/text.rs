//! Text matching and whitespace normalization.
//!
//! Normalized comparison trims and collapses whitespace runs. Non-breaking
//! spaces are NOT whitespace here: `"My\u{a0}Button"` never equals
//! `"My Button"`, with or without normalization.

use crate::result::{ProbeError, ProbeResult};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// True for whitespace that normalization may trim and collapse
#[must_use]
pub fn is_collapsible_whitespace(c: char) -> bool {
    c.is_whitespace() && !matches!(c, '\u{00A0}' | '\u{2007}' | '\u{202F}')
}

/// Trim and collapse whitespace runs into single spaces
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if is_collapsible_whitespace(c) {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// How a [`TextPattern`] compares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextMode {
    /// Whole text equals the value
    Exact,
    /// Text contains the value
    Substring,
    /// Text matches a regular expression
    Regex,
}

/// A text predicate used by selectors and expectations
#[derive(Debug, Clone)]
pub struct TextPattern {
    value: String,
    mode: TextMode,
    normalize: bool,
    ignore_case: bool,
    regex: Option<Regex>,
}

impl PartialEq for TextPattern {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.mode == other.mode
            && self.normalize == other.normalize
            && self.ignore_case == other.ignore_case
    }
}

impl TextPattern {
    /// Whole-text equality, whitespace-normalized
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: TextMode::Exact,
            normalize: true,
            ignore_case: false,
            regex: None,
        }
    }

    /// Substring match, whitespace-normalized
    #[must_use]
    pub fn substring(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            mode: TextMode::Substring,
            normalize: true,
            ignore_case: false,
            regex: None,
        }
    }

    /// Regular expression match against the normalized text
    pub fn regex(pattern: impl Into<String>) -> ProbeResult<Self> {
        Self::compiled(pattern.into(), false)
    }

    /// Case-insensitive regular expression match against the normalized text
    pub fn regex_ignore_case(pattern: impl Into<String>) -> ProbeResult<Self> {
        Self::compiled(pattern.into(), true)
    }

    fn compiled(value: String, ignore_case: bool) -> ProbeResult<Self> {
        let regex = RegexBuilder::new(&value)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ProbeError::InvalidSelector {
                selector: format!("/{value}/"),
                message: e.to_string(),
            })?;
        Ok(Self {
            value,
            mode: TextMode::Regex,
            normalize: true,
            ignore_case,
            regex: Some(regex),
        })
    }

    /// Enable or disable whitespace normalization
    #[must_use]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Compare literal patterns case-insensitively.
    ///
    /// Regex patterns fix their case handling when compiled (see
    /// [`TextPattern::regex_ignore_case`]) and are returned unchanged.
    #[must_use]
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        if self.mode != TextMode::Regex {
            self.ignore_case = ignore_case;
        }
        self
    }

    /// Whether comparison ignores case
    #[must_use]
    pub const fn ignores_case(&self) -> bool {
        self.ignore_case
    }

    /// Pattern value (literal text or regex source)
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Comparison mode
    #[must_use]
    pub const fn mode(&self) -> TextMode {
        self.mode
    }

    /// Whether whitespace is normalized before comparing
    #[must_use]
    pub const fn normalizes(&self) -> bool {
        self.normalize
    }

    /// Test `text` against the pattern
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let prepare = |s: &str| {
            let s = if self.normalize {
                normalize_whitespace(s)
            } else {
                s.to_string()
            };
            if self.ignore_case {
                s.to_lowercase()
            } else {
                s
            }
        };
        match self.mode {
            TextMode::Exact => prepare(text) == prepare(&self.value),
            TextMode::Substring => prepare(text).contains(&prepare(&self.value)),
            TextMode::Regex => {
                let actual = if self.normalize {
                    normalize_whitespace(text)
                } else {
                    text.to_string()
                };
                self.regex.as_ref().is_some_and(|r| r.is_match(&actual))
            }
        }
    }
}

impl fmt::Display for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            TextMode::Exact => write!(f, "{:?}", self.value),
            TextMode::Substring => write!(f, "{}", self.value),
            TextMode::Regex => write!(f, "/{}/", self.value),
        }
    }
}
