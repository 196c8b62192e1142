//! Selectors and the locator resolver.
//!
//! A [`Selector`] is an immutable description of zero or more elements. It
//! is evaluated against a fresh [`DomSnapshot`] on every query; nothing here
//! caches nodes across time, because the document mutates underneath us.
//!
//! # Design Philosophy
//!
//! - **Whole-token classes**: `.btn` never matches `class="btn-primary"`
//! - **Deepest text match**: `text=Save` picks the element holding the text,
//!   not every ancestor whose text content happens to contain it
//! - **Shorthand parsing**: CSS compounds, `text=`/`id=` engines and a small
//!   XPath subset, so scripts read like the recorder output they came from

use crate::driver::{DomSnapshot, ElementHandle, PageContext};
use crate::result::{ProbeError, ProbeResult};
use crate::text::TextPattern;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

// =============================================================================
// SELECTOR MODEL
// =============================================================================

/// Predicate over one attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrPredicate {
    /// Attribute exists
    Present,
    /// Attribute equals the value
    Equals(String),
    /// Attribute contains the value as a raw substring
    Contains(String),
    /// Attribute, split on whitespace, contains the value as a whole token
    HasToken(String),
}

impl AttrPredicate {
    /// Test an attribute value (None when absent)
    #[must_use]
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (_, None) => false,
            (Self::Present, Some(_)) => true,
            (Self::Equals(expected), Some(v)) => v == expected,
            (Self::Contains(needle), Some(v)) => v.contains(needle.as_str()),
            (Self::HasToken(token), Some(v)) => v.split_whitespace().any(|t| t == token),
        }
    }
}

/// Structural relationship between consecutive path steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Direct child of the previous step
    Child,
    /// Any descendant of the previous step
    Descendant,
}

/// One step of a structural path
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    /// Relationship to the previous step (or to the scope root)
    pub axis: Axis,
    /// Node test for this step
    pub test: Selector,
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every element
    Universal,
    /// Deepest elements whose text matches
    Text(TextPattern),
    /// `id` attribute equals the value
    Id(String),
    /// Tag name equals the value (case-insensitive)
    Tag(String),
    /// Attribute predicate
    Attribute {
        /// Attribute name
        name: String,
        /// Predicate over the value
        predicate: AttrPredicate,
    },
    /// Structural path, evaluated from the scope root
    Path(Vec<PathStep>),
    /// Elements matching every selector
    All(Vec<Selector>),
    /// Elements matching any selector
    Any(Vec<Selector>),
    /// Elements of `base` whose text content matches at any depth
    HasText {
        /// Base selector
        base: Box<Selector>,
        /// Text filter
        pattern: TextPattern,
    },
    /// The `index`-th (0-based) match of `base`, in document order
    Nth {
        /// Base selector
        base: Box<Selector>,
        /// Match index
        index: usize,
    },
}

impl Selector {
    /// Text selector: normalized, case-insensitive substring
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextPattern::substring(text).with_ignore_case(true))
    }

    /// Text selector: normalized whole-text equality
    #[must_use]
    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::Text(TextPattern::exact(text))
    }

    /// Id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Tag selector
    #[must_use]
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::Tag(tag.into().to_ascii_lowercase())
    }

    /// Class-token selector (whole token, like CSS `.name`)
    #[must_use]
    pub fn class_token(name: impl Into<String>) -> Self {
        Self::Attribute {
            name: "class".into(),
            predicate: AttrPredicate::HasToken(name.into()),
        }
    }

    /// Attribute equality selector
    #[must_use]
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            predicate: AttrPredicate::Equals(value.into()),
        }
    }

    /// Require this selector and another
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::All(mut parts) => {
                parts.push(other);
                Self::All(parts)
            }
            first => Self::All(vec![first, other]),
        }
    }

    /// Keep elements whose text content contains `text` (normalized, any case)
    #[must_use]
    pub fn has_text(self, text: impl Into<String>) -> Self {
        Self::HasText {
            base: Box::new(self),
            pattern: TextPattern::substring(text).with_ignore_case(true),
        }
    }

    /// Keep elements whose text content matches `pattern`
    #[must_use]
    pub fn has_text_pattern(self, pattern: TextPattern) -> Self {
        Self::HasText {
            base: Box::new(self),
            pattern,
        }
    }

    /// Keep only the `index`-th match
    #[must_use]
    pub fn nth(self, index: usize) -> Self {
        Self::Nth {
            base: Box::new(self),
            index,
        }
    }

    /// Descendants of this selector's matches that satisfy `test`
    #[must_use]
    pub fn descendant(self, test: Self) -> Self {
        self.extend_path(Axis::Descendant, test)
    }

    /// Direct children of this selector's matches that satisfy `test`
    #[must_use]
    pub fn child(self, test: Self) -> Self {
        self.extend_path(Axis::Child, test)
    }

    fn extend_path(self, axis: Axis, test: Self) -> Self {
        let mut steps = match self {
            Self::Path(steps) => steps,
            first => vec![PathStep {
                axis: Axis::Descendant,
                test: first,
            }],
        };
        steps.push(PathStep { axis, test });
        Self::Path(steps)
    }

    /// Indices of matching snapshot nodes, in document order
    #[must_use]
    pub fn select(&self, snapshot: &DomSnapshot) -> Vec<usize> {
        self.mask(snapshot)
            .iter()
            .enumerate()
            .filter_map(|(i, hit)| hit.then_some(i))
            .collect()
    }

    fn mask(&self, snap: &DomSnapshot) -> Vec<bool> {
        let nodes = &snap.nodes;
        match self {
            Self::Universal => vec![true; nodes.len()],
            Self::Id(id) => nodes
                .iter()
                .map(|n| n.attribute("id") == Some(id.as_str()))
                .collect(),
            Self::Tag(tag) => nodes.iter().map(|n| n.tag.eq_ignore_ascii_case(tag)).collect(),
            Self::Attribute { name, predicate } => nodes
                .iter()
                .map(|n| predicate.matches(n.attribute(name)))
                .collect(),
            Self::Text(pattern) => {
                let direct: Vec<bool> = nodes.iter().map(|n| pattern.matches(&n.text)).collect();
                let mut has_matching_child = vec![false; nodes.len()];
                for (i, node) in nodes.iter().enumerate() {
                    if let (true, Some(parent)) = (direct[i], node.parent) {
                        has_matching_child[parent] = true;
                    }
                }
                direct
                    .iter()
                    .zip(&has_matching_child)
                    .map(|(hit, shadowed)| *hit && !shadowed)
                    .collect()
            }
            Self::HasText { base, pattern } => base
                .mask(snap)
                .into_iter()
                .zip(nodes)
                .map(|(hit, n)| hit && pattern.matches(&n.text))
                .collect(),
            Self::All(parts) => {
                let mut acc = vec![true; nodes.len()];
                for part in parts {
                    for (a, m) in acc.iter_mut().zip(part.mask(snap)) {
                        *a = *a && m;
                    }
                }
                acc
            }
            Self::Any(parts) => {
                let mut acc = vec![false; nodes.len()];
                for part in parts {
                    for (a, m) in acc.iter_mut().zip(part.mask(snap)) {
                        *a = *a || m;
                    }
                }
                acc
            }
            Self::Nth { base, index } => {
                let mut acc = vec![false; nodes.len()];
                if let Some(i) = base
                    .mask(snap)
                    .iter()
                    .enumerate()
                    .filter_map(|(i, hit)| hit.then_some(i))
                    .nth(*index)
                {
                    acc[i] = true;
                }
                acc
            }
            Self::Path(steps) => {
                let mut prev: Option<Vec<bool>> = None;
                for step in steps {
                    let test = step.test.mask(snap);
                    let related: Vec<bool> = match (&prev, step.axis) {
                        (None, Axis::Descendant) => vec![true; nodes.len()],
                        (None, Axis::Child) => nodes.iter().map(|n| n.parent.is_none()).collect(),
                        (Some(prev), Axis::Child) => nodes
                            .iter()
                            .map(|n| n.parent.is_some_and(|p| prev[p]))
                            .collect(),
                        (Some(prev), Axis::Descendant) => {
                            let mut below = vec![false; nodes.len()];
                            for (i, n) in nodes.iter().enumerate() {
                                if let Some(p) = n.parent {
                                    below[i] = prev[p] || below[p];
                                }
                            }
                            below
                        }
                    };
                    prev = Some(test.iter().zip(related).map(|(t, r)| *t && r).collect());
                }
                prev.unwrap_or_else(|| vec![false; nodes.len()])
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Universal => write!(f, "*"),
            Self::Text(pattern) => write!(f, "text={pattern}"),
            Self::Id(id) => write!(f, "#{id}"),
            Self::Tag(tag) => write!(f, "{tag}"),
            Self::Attribute { name, predicate } => match predicate {
                AttrPredicate::Present => write!(f, "[{name}]"),
                AttrPredicate::Equals(v) => write!(f, "[{name}={v:?}]"),
                AttrPredicate::Contains(v) => write!(f, "[{name}*={v:?}]"),
                AttrPredicate::HasToken(v) if name == "class" => write!(f, ".{v}"),
                AttrPredicate::HasToken(v) => write!(f, "[{name}~={v:?}]"),
            },
            Self::Path(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    match (i, step.axis) {
                        (0, Axis::Descendant) => {}
                        (0, Axis::Child) => write!(f, ":scope > ")?,
                        (_, Axis::Descendant) => write!(f, " ")?,
                        (_, Axis::Child) => write!(f, " > ")?,
                    }
                    write!(f, "{}", step.test)?;
                }
                Ok(())
            }
            Self::All(parts) => {
                for part in parts {
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Self::Any(parts) => {
                let rendered: Vec<String> = parts.iter().map(ToString::to_string).collect();
                write!(f, "{}", rendered.join(", "))
            }
            Self::HasText { base, pattern } => write!(f, "{base}:has-text({pattern})"),
            Self::Nth { base, index } => write!(f, "{base} >> nth={index}"),
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

impl Selector {
    /// Parse selector shorthand.
    ///
    /// Accepted forms: `text=foo`, `text="foo"`, `text=/re/`, `id=foo`,
    /// `css=...`, `xpath=...` or `//...`, and CSS such as
    /// `div.panel > button#go[name="x"]:has-text("Go")`.
    pub fn parse(source: &str) -> ProbeResult<Self> {
        let src = source.trim();
        let invalid = |message: &str| ProbeError::InvalidSelector {
            selector: source.to_string(),
            message: message.to_string(),
        };
        if src.is_empty() {
            return Err(invalid("empty selector"));
        }

        if let Some(rest) = src.strip_prefix("text=") {
            return parse_text_engine(rest).map_err(|m| invalid(&m));
        }
        if let Some(rest) = src.strip_prefix("id=") {
            if rest.is_empty() {
                return Err(invalid("empty id"));
            }
            return Ok(Self::id(rest));
        }
        if let Some(rest) = src.strip_prefix("xpath=") {
            return parse_xpath(rest).map_err(|m| invalid(&m));
        }
        if src.starts_with('/') {
            return parse_xpath(src).map_err(|m| invalid(&m));
        }
        let css = src.strip_prefix("css=").unwrap_or(src);
        parse_css(css).map_err(|m| invalid(&m))
    }
}

impl std::str::FromStr for Selector {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_text_engine(rest: &str) -> Result<Selector, String> {
    if rest.is_empty() {
        return Err("empty text".into());
    }
    if rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"') {
        return Ok(Selector::exact_text(&rest[1..rest.len() - 1]));
    }
    if let Some((body, ignore_case)) = regex_literal(rest) {
        return Ok(Selector::Text(regex_pattern(body, ignore_case)?));
    }
    Ok(Selector::text(rest))
}

/// `/body/` or `/body/i`
fn regex_literal(src: &str) -> Option<(&str, bool)> {
    if src.len() < 2 || !src.starts_with('/') {
        return None;
    }
    if let Some(body) = src.strip_suffix("/i").filter(|b| !b.is_empty()) {
        return Some((&body[1..], true));
    }
    src.strip_suffix('/')
        .filter(|b| !b.is_empty())
        .map(|body| (&body[1..], false))
}

fn regex_pattern(body: &str, ignore_case: bool) -> Result<TextPattern, String> {
    let pattern = if ignore_case {
        TextPattern::regex_ignore_case(body)
    } else {
        TextPattern::regex(body)
    };
    pattern.map_err(|e| e.to_string())
}

/// Byte offset of the `)` closing a pseudo-class argument.
///
/// Parentheses inside quotes or a `/regex/` argument do not count, and a
/// backslash escapes the next character.
fn closing_paren(src: &str) -> Option<usize> {
    let regex_start = src.len() - src.trim_start().len();
    let mut in_regex = src[regex_start..].starts_with('/');
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in src.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if in_regex {
            if c == '/' && i > regex_start {
                in_regex = false;
            }
            continue;
        }
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn parse_css(src: &str) -> Result<Selector, String> {
    let mut steps: Vec<PathStep> = Vec::new();
    let mut axis = Axis::Descendant;
    let mut rest = src.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('>') {
            if steps.is_empty() {
                return Err("combinator without a left-hand side".into());
            }
            axis = Axis::Child;
            rest = after.trim_start();
            continue;
        }
        let (compound, remaining) = parse_compound(rest)?;
        steps.push(PathStep {
            axis,
            test: compound,
        });
        axis = Axis::Descendant;
        rest = remaining.trim_start();
    }
    if axis == Axis::Child {
        return Err("dangling '>' combinator".into());
    }
    match steps.len() {
        0 => Err("empty selector".into()),
        1 => Ok(steps.remove(0).test),
        _ => Ok(Selector::Path(steps)),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

fn take_ident(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len());
    s.split_at(end)
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Parse one compound selector; returns it and the unparsed remainder
fn parse_compound(src: &str) -> Result<(Selector, &str), String> {
    let mut parts: Vec<Selector> = Vec::new();
    let mut rest = src;

    if let Some(after) = rest.strip_prefix('*') {
        parts.push(Selector::Universal);
        rest = after;
    } else {
        let (tag, after) = take_ident(rest);
        if !tag.is_empty() {
            parts.push(Selector::tag(tag));
            rest = after;
        }
    }

    loop {
        if let Some(after) = rest.strip_prefix('#') {
            let (id, after) = take_ident(after);
            if id.is_empty() {
                return Err("empty id after '#'".into());
            }
            parts.push(Selector::id(id));
            rest = after;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (class, after) = take_ident(after);
            if class.is_empty() {
                return Err("empty class after '.'".into());
            }
            parts.push(Selector::class_token(class));
            rest = after;
        } else if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or("unterminated '['")?;
            parts.push(parse_attribute(&after[..close])?);
            rest = &after[close + 1..];
        } else if let Some(after) = rest.strip_prefix(":has-text(") {
            let close = closing_paren(after).ok_or("unterminated ':has-text('")?;
            let base = match parts.len() {
                0 => Selector::Universal,
                1 => parts.remove(0),
                _ => Selector::All(std::mem::take(&mut parts)),
            };
            let arg = after[..close].trim();
            let filtered = match regex_literal(arg) {
                Some((body, ignore_case)) => base.has_text_pattern(regex_pattern(body, ignore_case)?),
                None => base.has_text(unquote(arg)),
            };
            parts.push(filtered);
            rest = &after[close + 1..];
        } else {
            break;
        }
    }

    let compound = match parts.len() {
        0 => {
            let found = rest.chars().next().map_or_else(String::new, String::from);
            return Err(format!("unexpected '{found}'"));
        }
        1 => parts.remove(0),
        _ => Selector::All(parts),
    };
    Ok((compound, rest))
}

fn parse_attribute(body: &str) -> Result<Selector, String> {
    let body = body.trim();
    for (op, make) in [
        ("~=", AttrPredicate::HasToken as fn(String) -> AttrPredicate),
        ("*=", AttrPredicate::Contains),
        ("=", AttrPredicate::Equals),
    ] {
        if let Some((name, value)) = body.split_once(op) {
            let name = name.trim();
            if name.is_empty() {
                return Err("attribute name missing".into());
            }
            return Ok(Selector::Attribute {
                name: name.to_string(),
                predicate: make(unquote(value).to_string()),
            });
        }
    }
    if body.is_empty() || !body.chars().all(is_ident_char) {
        return Err(format!("bad attribute '{body}'"));
    }
    Ok(Selector::Attribute {
        name: body.to_string(),
        predicate: AttrPredicate::Present,
    })
}

// =============================================================================
// XPATH SUBSET
// =============================================================================

struct XPathForms {
    class_token: Regex,
    normalized_text: Regex,
    raw_text: Regex,
    contains_text: Regex,
    attr_equals: Regex,
    attr_contains: Regex,
    attr_present: Regex,
}

fn xpath_forms() -> &'static XPathForms {
    static FORMS: OnceLock<XPathForms> = OnceLock::new();
    FORMS.get_or_init(|| {
        let lit = r#"(?:'([^']*)'|"([^"]*)")"#;
        let build = |re: String| Regex::new(&re).unwrap_or_else(|_| unreachable!("static pattern"));
        XPathForms {
            class_token: build(format!(
                r"^contains\(\s*concat\(\s*' '\s*,\s*normalize-space\(\s*@([\w-]+)\s*\)\s*,\s*' '\s*\)\s*,\s*{lit}\s*\)$"
            )),
            normalized_text: build(format!(
                r"^normalize-space\(\s*(?:\.|text\(\))?\s*\)\s*=\s*{lit}$"
            )),
            raw_text: build(format!(r"^(?:\.|text\(\))\s*=\s*{lit}$")),
            contains_text: build(format!(
                r"^contains\(\s*(?:\.|text\(\))\s*,\s*{lit}\s*\)$"
            )),
            attr_equals: build(format!(r"^@([\w-]+)\s*=\s*{lit}$")),
            attr_contains: build(format!(r"^contains\(\s*@([\w-]+)\s*,\s*{lit}\s*\)$")),
            attr_present: build(r"^@([\w-]+)$".to_string()),
        }
    })
}

fn literal(caps: &regex::Captures<'_>, first: usize) -> String {
    caps.get(first)
        .or_else(|| caps.get(first + 1))
        .map_or_else(String::new, |m| m.as_str().to_string())
}

fn parse_xpath_predicate(pred: &str) -> Result<Selector, String> {
    let pred = pred.trim();
    let forms = xpath_forms();
    if let Some(c) = forms.class_token.captures(pred) {
        let token = literal(&c, 2);
        let token = token.trim();
        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(format!("unsupported token test '{pred}'"));
        }
        return Ok(Selector::Attribute {
            name: c[1].to_string(),
            predicate: AttrPredicate::HasToken(token.to_string()),
        });
    }
    if let Some(c) = forms.normalized_text.captures(pred) {
        return Ok(Selector::Universal.has_text_pattern(TextPattern::exact(literal(&c, 1))));
    }
    if let Some(c) = forms.raw_text.captures(pred) {
        return Ok(Selector::Universal
            .has_text_pattern(TextPattern::exact(literal(&c, 1)).with_normalize(false)));
    }
    if let Some(c) = forms.contains_text.captures(pred) {
        return Ok(Selector::Universal
            .has_text_pattern(TextPattern::substring(literal(&c, 1)).with_normalize(false)));
    }
    if let Some(c) = forms.attr_equals.captures(pred) {
        return Ok(Selector::attribute(&c[1], literal(&c, 2)));
    }
    if let Some(c) = forms.attr_contains.captures(pred) {
        return Ok(Selector::Attribute {
            name: c[1].to_string(),
            predicate: AttrPredicate::Contains(literal(&c, 2)),
        });
    }
    if let Some(c) = forms.attr_present.captures(pred) {
        return Ok(Selector::Attribute {
            name: c[1].to_string(),
            predicate: AttrPredicate::Present,
        });
    }
    Err(format!("unsupported predicate '[{pred}]'"))
}

/// Split an XPath into (axis, step) pairs, honouring brackets and quotes
fn split_xpath_steps(src: &str) -> Result<Vec<(Axis, String)>, String> {
    let mut steps = Vec::new();
    let mut current = String::new();
    let mut axis = None;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                current.push(c);
            }
            (None, '/') if depth == 0 => {
                if let Some(a) = axis.take() {
                    if current.is_empty() {
                        return Err("empty step".into());
                    }
                    steps.push((a, std::mem::take(&mut current)));
                } else if !current.is_empty() {
                    return Err("relative paths are not supported".into());
                }
                if chars.peek() == Some(&'/') {
                    chars.next();
                    axis = Some(Axis::Descendant);
                } else {
                    axis = Some(Axis::Child);
                }
            }
            (None, c) => current.push(c),
        }
    }
    if quote.is_some() || depth != 0 {
        return Err("unterminated predicate".into());
    }
    match axis {
        Some(a) if !current.is_empty() => steps.push((a, current)),
        _ => return Err("path must end with a step".into()),
    }
    Ok(steps)
}

fn parse_xpath(src: &str) -> Result<Selector, String> {
    let mut path = Vec::new();
    for (axis, step) in split_xpath_steps(src.trim())? {
        let (name, mut rest) = match step.find('[') {
            Some(i) => step.split_at(i),
            None => (step.as_str(), ""),
        };
        let mut parts = Vec::new();
        match name.trim() {
            "*" => parts.push(Selector::Universal),
            n if !n.is_empty() && n.chars().all(is_ident_char) => parts.push(Selector::tag(n)),
            n => return Err(format!("unsupported node test '{n}'")),
        }
        while let Some(after) = rest.strip_prefix('[') {
            let close = matching_bracket(after).ok_or("unterminated predicate")?;
            parts.push(parse_xpath_predicate(&after[..close])?);
            rest = &after[close + 1..];
        }
        if !rest.trim().is_empty() {
            return Err(format!("unexpected '{rest}'"));
        }
        let test = if parts.len() == 1 {
            parts.remove(0)
        } else {
            Selector::All(parts)
        };
        path.push(PathStep { axis, test });
    }
    if path.len() == 1 && path[0].axis == Axis::Descendant {
        return Ok(path.remove(0).test);
    }
    Ok(Selector::Path(path))
}

fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') if depth == 0 => return Some(i),
            (None, ']') => depth -= 1,
            _ => {}
        }
    }
    None
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolve a selector against the live document (or a scope element).
///
/// Every call takes a fresh snapshot. A scope that has detached fails with
/// [`ProbeError::StaleElement`] instead of resolving to nothing.
pub async fn resolve(
    page: &dyn PageContext,
    selector: &Selector,
    scope: Option<&ElementHandle>,
) -> ProbeResult<Vec<ElementHandle>> {
    let snapshot = page
        .snapshot(scope.map(|s| s.node))
        .await
        .map_err(|e| match (e, scope) {
            (ProbeError::StaleElement { node, .. }, Some(scope)) => ProbeError::StaleElement {
                selector: format!("scope {} of {selector}", scope.tag),
                node,
            },
            (e, _) => e,
        })?;
    let handles: Vec<ElementHandle> = selector
        .select(&snapshot)
        .into_iter()
        .filter_map(|i| snapshot.handle(i))
        .collect();
    tracing::trace!(%selector, matches = handles.len(), "resolved selector");
    Ok(handles)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::{NodeId, SnapshotNode};
    use std::collections::BTreeMap;

    /// (tag, parent, attrs, text)
    fn snap(nodes: &[(&str, Option<usize>, &[(&str, &str)], &str)]) -> DomSnapshot {
        DomSnapshot {
            nodes: nodes
                .iter()
                .enumerate()
                .map(|(i, (tag, parent, attrs, text))| SnapshotNode {
                    node: NodeId(i as u64 + 100),
                    parent: *parent,
                    tag: (*tag).to_string(),
                    attributes: attrs
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect::<BTreeMap<_, _>>(),
                    text: (*text).to_string(),
                })
                .collect(),
        }
    }

    fn buttons() -> DomSnapshot {
        snap(&[
            ("body", None, &[], "Primary Success Warning"),
            ("div", Some(0), &[("class", "panel")], "Primary Success"),
            ("button", Some(1), &[("class", "btn btn-primary"), ("id", "a")], "Primary"),
            ("button", Some(1), &[("class", "btn-primary-outline btn")], "Success"),
            ("button", Some(0), &[("class", "btn btn-warning")], "Warning"),
        ])
    }

    mod match_tests {
        use super::*;

        #[test]
        fn test_class_token_is_whole_token() {
            let s = buttons();
            assert_eq!(Selector::class_token("btn-primary").select(&s), vec![2]);
            assert_eq!(Selector::class_token("btn").select(&s), vec![2, 3, 4]);
            let naive = Selector::Attribute {
                name: "class".into(),
                predicate: AttrPredicate::Contains("btn-primary".into()),
            };
            assert_eq!(naive.select(&s), vec![2, 3]);
        }

        #[test]
        fn test_text_picks_deepest() {
            let s = buttons();
            assert_eq!(Selector::text("primary").select(&s), vec![2]);
            assert_eq!(Selector::text("warning").select(&s), vec![4]);
        }

        #[test]
        fn test_has_text_matches_any_depth() {
            let s = buttons();
            let sel = Selector::tag("div").has_text("success");
            assert_eq!(sel.select(&s), vec![1]);
        }

        #[test]
        fn test_paths() {
            let s = buttons();
            let child = Selector::tag("div").child(Selector::tag("button"));
            assert_eq!(child.select(&s), vec![2, 3]);
            let desc = Selector::tag("body").descendant(Selector::tag("button"));
            assert_eq!(desc.select(&s), vec![2, 3, 4]);
            let body_child = Selector::tag("body").child(Selector::tag("button"));
            assert_eq!(body_child.select(&s), vec![4]);
        }

        #[test]
        fn test_nth_and_either() {
            let s = buttons();
            assert_eq!(Selector::tag("button").nth(1).select(&s), vec![3]);
            assert!(Selector::tag("button").nth(9).select(&s).is_empty());
            let either = Selector::Any(vec![Selector::id("a"), Selector::text("warning")]);
            assert_eq!(either.select(&s), vec![2, 4]);
        }

        #[test]
        fn test_attr_predicates() {
            assert!(AttrPredicate::Present.matches(Some("")));
            assert!(!AttrPredicate::Present.matches(None));
            assert!(AttrPredicate::Equals("x".into()).matches(Some("x")));
            assert!(!AttrPredicate::HasToken("bt".into()).matches(Some("btn")));
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_engines() {
            assert_eq!(Selector::parse("id=login").unwrap(), Selector::id("login"));
            assert_eq!(
                Selector::parse("text=Load Delay").unwrap(),
                Selector::text("Load Delay")
            );
            assert_eq!(
                Selector::parse("text=\"Click me\"").unwrap(),
                Selector::exact_text("Click me")
            );
            assert!(matches!(
                Selector::parse("text=/^Welcome/i").unwrap(),
                Selector::Text(p) if p.mode() == crate::text::TextMode::Regex
            ));
        }

        #[test]
        fn test_css_compound_and_combinators() {
            let sel = Selector::parse("div.panel > button.btn-primary#a").unwrap();
            assert_eq!(sel.select(&buttons()), vec![2]);
            let sel = Selector::parse("body button").unwrap();
            assert_eq!(sel.select(&buttons()), vec![2, 3, 4]);
            let sel = Selector::parse("[name=\"UserName\"]").unwrap();
            assert_eq!(sel, Selector::attribute("name", "UserName"));
            let sel = Selector::parse("button:has-text(\"Warn\")").unwrap();
            assert_eq!(sel.select(&buttons()), vec![4]);
        }

        #[test]
        fn test_has_text_regex_spans_non_breaking_space() {
            let s = snap(&[
                ("body", None, &[], "My\u{a0}Button"),
                ("button", Some(0), &[], "My\u{a0}Button"),
            ]);
            let plain = Selector::parse("button:has-text(\"My Button\")").unwrap();
            assert!(plain.select(&s).is_empty());
            let pattern = Selector::parse(r"button:has-text(/My\sButton/)").unwrap();
            assert_eq!(pattern.select(&s), vec![1]);
            let folded = Selector::parse(r"button:has-text(/my\sbutton/i)").unwrap();
            assert_eq!(folded.select(&s), vec![1]);
        }

        #[test]
        fn test_has_text_argument_may_contain_parens() {
            let s = snap(&[
                ("body", None, &[], "abc x)y"),
                ("button", Some(0), &[("class", "primary")], "abc"),
                ("button", Some(0), &[], "x)y"),
            ]);
            let grouped = Selector::parse("button:has-text(/a(b)c/).primary").unwrap();
            assert_eq!(grouped.select(&s), vec![1]);
            let quoted = Selector::parse("button:has-text(\"x)y\")").unwrap();
            assert_eq!(quoted.select(&s), vec![2]);
            let nested = Selector::parse("button:has-text(/^(a(b))c$/)").unwrap();
            assert_eq!(nested.select(&s), vec![1]);
            assert!(Selector::parse("button:has-text(/a(b/").is_err());
        }

        #[test]
        fn test_xpath_class_token() {
            let sel = Selector::parse(
                "//button[contains(concat(' ', normalize-space(@class), ' '), ' btn-primary ')]",
            )
            .unwrap();
            assert_eq!(sel.select(&buttons()), vec![2]);
        }

        #[test]
        fn test_xpath_text_forms() {
            let s = snap(&[
                ("body", None, &[], "\n Welcome  UserName! \n"),
                ("span", Some(0), &[], "\n Welcome  UserName! \n"),
            ]);
            let normalized =
                Selector::parse("//span[normalize-space(.)='Welcome UserName!']").unwrap();
            assert_eq!(normalized.select(&s), vec![1]);
            let raw = Selector::parse("//span[.='Welcome UserName!']").unwrap();
            assert!(raw.select(&s).is_empty());
        }

        #[test]
        fn test_xpath_paths_and_attrs() {
            let sel = Selector::parse("//div[@class='panel']/button[@id='a']").unwrap();
            assert_eq!(sel.select(&buttons()), vec![2]);
            let sel = Selector::parse("xpath=//body//button[contains(@class,'warn')]").unwrap();
            assert_eq!(sel.select(&buttons()), vec![4]);
        }

        #[test]
        fn test_invalid() {
            for bad in ["", "text=", "id=", "div >", "> div", "[", "#", "//", "//div[1]", "a b/c"]
            {
                assert!(
                    matches!(Selector::parse(bad), Err(ProbeError::InvalidSelector { .. })),
                    "expected {bad:?} to be rejected"
                );
            }
        }

        #[test]
        fn test_display_round_trips_simple_css() {
            let sel = Selector::parse("button.btn-primary").unwrap();
            assert_eq!(sel.to_string(), "button.btn-primary");
            assert_eq!(Selector::id("x").to_string(), "#x");
        }
    }
}
