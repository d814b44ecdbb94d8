//! A small CSS-like selector language over [`FeedNode`] trees.
//!
//! Supported syntax, which covers what the strategy tables need:
//!
//! - type selectors and `*`: `span`, `ytd-channel-name`
//! - `#id`, `.class`
//! - attributes: `[href]`, `[rel="x"]`, `[href*="/tags/"]`, `[href^="/"]`, `[href$=".mp3"]`
//! - negation of one compound: `span:not(.sc-visuallyhidden)`
//! - descendant (whitespace) and child (`>`) combinators
//! - comma-separated lists, matched as a union in document order

use thiserror::Error;

use crate::node::FeedNode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected {found:?} at byte {pos} in selector {selector:?}")]
    Unexpected {
        selector: String,
        pos: usize,
        found: char,
    },
    #[error("unterminated {what} in selector {selector:?}")]
    Unterminated { selector: String, what: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
}

impl AttrMatch {
    fn matches(&self, node: &FeedNode) -> bool {
        let Some(value) = node.attr(&self.name) else {
            return false;
        };
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Contains(v) => value.contains(v.as_str()),
            AttrOp::Prefix(v) => value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => value.ends_with(v.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// Written as `*`; matches any element on its own.
    universal: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    not: Vec<Compound>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
            && self.not.is_empty()
    }

    fn matches(&self, node: &FeedNode) -> bool {
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| node.has_class(c))
            && self.attrs.iter().all(|a| a.matches(node))
            && !self.not.iter().any(|n| n.matches(node))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector: compounds joined by combinators, left to right.
/// `parts[i].0` is the combinator linking `parts[i - 1]` to `parts[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, node: &FeedNode, ancestors: &[&FeedNode]) -> bool {
        self.match_at(self.parts.len() - 1, node, ancestors)
    }

    fn match_at(&self, idx: usize, node: &FeedNode, ancestors: &[&FeedNode]) -> bool {
        let (combinator, compound) = &self.parts[idx];
        if !compound.matches(node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => match ancestors.split_last() {
                Some((parent, rest)) => self.match_at(idx - 1, parent, rest),
                None => false,
            },
            Combinator::Descendant => (0..ancestors.len())
                .rev()
                .any(|k| self.match_at(idx - 1, ancestors[k], &ancestors[..k])),
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse_list()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when `node` matches, given its ancestors from outermost to parent.
    pub fn matches(&self, node: &FeedNode, ancestors: &[&FeedNode]) -> bool {
        self.alternatives.iter().any(|c| c.matches(node, ancestors))
    }

    /// Descendants of `root` (not `root` itself) that match, in document order.
    ///
    /// Ancestor context is limited to the subtree: `root` is the outermost
    /// ancestor a combinator can reach.
    pub fn select<'a>(&self, root: &'a FeedNode) -> Vec<&'a FeedNode> {
        let mut out = Vec::new();
        let mut ancestors = Vec::new();
        self.visit(root, &mut ancestors, &mut out);
        out
    }

    pub fn select_first<'a>(&self, root: &'a FeedNode) -> Option<&'a FeedNode> {
        self.select(root).into_iter().next()
    }

    fn visit<'a>(
        &self,
        node: &'a FeedNode,
        ancestors: &mut Vec<&'a FeedNode>,
        out: &mut Vec<&'a FeedNode>,
    ) {
        ancestors.push(node);
        for child in &node.children {
            if self.matches(child, ancestors) {
                out.push(child);
            }
            self.visit(child, ancestors, out);
        }
        ancestors.pop();
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
        self.pos > start
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.src.to_string(),
            pos: self.pos,
            found,
        }
    }

    fn unterminated(&self, what: &'static str) -> SelectorError {
        SelectorError::Unterminated {
            selector: self.src.to_string(),
            what,
        }
    }

    fn parse_list(mut self) -> Result<Selector, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            alternatives.push(self.parse_complex()?);
            self.skip_ws();
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(c) => return Err(self.unexpected(c)),
            }
        }
        Ok(Selector {
            source: self.src.trim().to_string(),
            alternatives,
        })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut parts = Vec::new();
        let mut combinator = Combinator::Descendant;
        loop {
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return match self.peek() {
                    Some(c) => Err(self.unexpected(c)),
                    None => Err(SelectorError::Empty),
                };
            }
            parts.push((combinator, compound));

            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    combinator = Combinator::Child;
                }
                Some(_) if had_ws => combinator = Combinator::Descendant,
                Some(c) => return Err(self.unexpected(c)),
            }
        }
        Ok(Complex { parts })
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.bump();
                compound.universal = true;
            }
            Some(c) if c.is_alphanumeric() => compound.tag = Some(self.parse_ident()),
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.expect_ident()?);
                }
                Some('.') => {
                    self.bump();
                    let class = self.expect_ident()?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => {
                    self.bump();
                    let pseudo = self.parse_ident();
                    if pseudo != "not" || self.bump() != Some('(') {
                        return Err(self.unexpected(':'));
                    }
                    self.skip_ws();
                    let inner = self.parse_compound()?;
                    self.skip_ws();
                    if inner.is_empty() || self.bump() != Some(')') {
                        return Err(self.unterminated(":not(...)"));
                    }
                    compound.not.push(inner);
                }
                _ => break,
            }
        }
        Ok(compound)
    }

    fn expect_ident(&mut self) -> Result<String, SelectorError> {
        let ident = self.parse_ident();
        if ident.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => self.unterminated("identifier"),
            });
        }
        Ok(ident)
    }

    fn parse_attr(&mut self) -> Result<AttrMatch, SelectorError> {
        self.skip_ws();
        let name = self.expect_ident()?;
        self.skip_ws();
        let op = match self.bump() {
            Some(']') => return Ok(AttrMatch { name, op: AttrOp::Exists }),
            Some('=') => "=",
            Some(c @ ('*' | '^' | '$')) => {
                if self.bump() != Some('=') {
                    return Err(self.unexpected(c));
                }
                match c {
                    '*' => "*=",
                    '^' => "^=",
                    _ => "$=",
                }
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(self.unterminated("attribute selector")),
        };
        self.skip_ws();
        let value = self.parse_attr_value()?;
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(self.unterminated("attribute selector"));
        }
        let op = match op {
            "=" => AttrOp::Equals(value),
            "*=" => AttrOp::Contains(value),
            "^=" => AttrOp::Prefix(value),
            _ => AttrOp::Suffix(value),
        };
        Ok(AttrMatch { name, op })
    }

    fn parse_attr_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == q => return Ok(self.src[start..self.pos - 1].to_string()),
                        Some(_) => {}
                        None => return Err(self.unterminated("quoted value")),
                    }
                }
            }
            _ => self.expect_ident(),
        }
    }
}
