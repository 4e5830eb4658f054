//! Selector parsing and matching.
//!
//! Supported grammar:
//!
//! ```text
//! selector  := complex ("," complex)*
//! complex   := compound (combinator compound)*
//! combinator:= ">" | whitespace
//! compound  := (name | "*")? pseudo*      (at least one part)
//! pseudo    := ":root" | ":not(" compound ")"
//! ```
//!
//! Type names match component names exactly. `:root` matches only the
//! root position of the tree being built.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected `{found}` at offset {offset} in selector `{selector}`")]
    Unexpected {
        selector: String,
        offset: usize,
        found: char,
    },

    #[error("unknown pseudo-class `:{0}`")]
    UnknownPseudo(String),

    #[error("unterminated selector `{0}`")]
    Unterminated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    Root,
    Not(Box<Compound>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// `None` for `*` or an omitted type.
    type_name: Option<String>,
    pseudos: Vec<Pseudo>,
}

impl Compound {
    fn matches(&self, name: &str, is_root: bool) -> bool {
        if let Some(type_name) = &self.type_name
            && type_name != name
        {
            return false;
        }
        self.pseudos.iter().all(|pseudo| match pseudo {
            Pseudo::Root => is_root,
            Pseudo::Not(inner) => !inner.matches(name, is_root),
        })
    }
}

/// Compound selectors right to left: `subject` is the rightmost compound,
/// each `ancestors` entry joins the previous compound to the next one out.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestors: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, name: &str, ancestors: &[&str]) -> bool {
        self.subject.matches(name, ancestors.is_empty())
            && match_ancestors(&self.ancestors, ancestors)
    }
}

/// `avail` are the ancestors still eligible, root first.
fn match_ancestors(parts: &[(Combinator, Compound)], avail: &[&str]) -> bool {
    let Some(((combinator, compound), rest)) = parts.split_first() else {
        return true;
    };
    match combinator {
        Combinator::Child => {
            let Some((parent, above)) = avail.split_last() else {
                return false;
            };
            compound.matches(parent, above.is_empty()) && match_ancestors(rest, above)
        }
        Combinator::Descendant => (0..avail.len()).rev().any(|i| {
            compound.matches(avail[i], i == 0) && match_ancestors(rest, &avail[..i])
        }),
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse()
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Match a node named `name` whose built ancestors are `ancestors`
    /// (root first). An empty `ancestors` slice is the root position.
    pub fn matches(&self, name: &str, ancestors: &[&str]) -> bool {
        self.alternatives.iter().any(|c| c.matches(name, ancestors))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            if self.peek().is_none() {
                return Err(SelectorError::Empty);
            }
            alternatives.push(self.complex()?);
            match self.peek() {
                Some(',') => self.pos += 1,
                None => break,
                Some(c) => return Err(self.unexpected(c)),
            }
        }
        Ok(Selector {
            source: self.source.trim().to_string(),
            alternatives,
        })
    }

    fn complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(c) => return Err(self.unexpected(c)),
            }
            compounds.push(self.compound()?);
        }

        let subject = compounds.pop().unwrap_or_default();
        let ancestors = combinators
            .into_iter()
            .rev()
            .zip(compounds.into_iter().rev())
            .collect();
        Ok(Complex { subject, ancestors })
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if is_name_start(c) => {
                compound.type_name = Some(self.name());
                any = true;
            }
            _ => {}
        }

        while self.peek() == Some(':') {
            self.pos += 1;
            let pseudo = self.name();
            match pseudo.as_str() {
                "root" => compound.pseudos.push(Pseudo::Root),
                "not" => {
                    self.expect('(')?;
                    self.skip_ws();
                    let inner = self.compound()?;
                    self.skip_ws();
                    self.expect(')')?;
                    compound.pseudos.push(Pseudo::Not(Box::new(inner)));
                }
                _ => return Err(SelectorError::UnknownPseudo(pseudo)),
            }
            any = true;
        }

        if !any {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(SelectorError::Unterminated(self.source.to_string())),
            };
        }
        Ok(compound)
    }

    fn name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if !is_name_char(c) {
                break;
            }
            name.push(c);
            self.pos += 1;
        }
        name
    }

    fn expect(&mut self, want: char) -> Result<(), SelectorError> {
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(SelectorError::Unterminated(self.source.to_string())),
        }
    }

    /// Returns true if any whitespace was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            offset: self.chars.get(self.pos).map_or(self.source.len(), |&(i, _)| i),
            found,
        }
    }
}

#[inline]
fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[inline]
fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn test_type_selector() {
        let s = sel("Empty");
        assert!(s.matches("Empty", &["Group"]));
        assert!(s.matches("Empty", &[]));
        assert!(!s.matches("Other", &["Group"]));
    }

    #[test]
    fn test_root_and_not() {
        assert!(sel(":root").matches("Group", &[]));
        assert!(!sel(":root").matches("Group", &["Group"]));
        assert!(sel("Group:root").matches("Group", &[]));
        assert!(!sel("Empty:root").matches("Group", &[]));

        let not_empty = sel(":not(Empty)");
        assert!(not_empty.matches("Group", &["Group"]));
        assert!(!not_empty.matches("Empty", &["Group"]));
        assert!(sel("Group:not(:root)").matches("Group", &["Group"]));
        assert!(!sel("Group:not(:root)").matches("Group", &[]));
    }

    #[test]
    fn test_universal() {
        assert!(sel("*").matches("Anything", &["Group"]));
        assert!(sel("*:root").matches("Anything", &[]));
    }

    #[test]
    fn test_child_combinator() {
        let s = sel("Group > Empty");
        assert!(s.matches("Empty", &["Group"]));
        assert!(s.matches("Empty", &["App", "Group"]));
        assert!(!s.matches("Empty", &["Group", "Stack"]));
        assert!(!s.matches("Empty", &[]));
        assert!(sel(":root>Empty").matches("Empty", &["Group"]));
        assert!(!sel(":root > Empty").matches("Empty", &["Group", "Group"]));
    }

    #[test]
    fn test_descendant_combinator() {
        let s = sel("Stack Empty");
        assert!(s.matches("Empty", &["Stack", "Group", "Group"]));
        assert!(s.matches("Empty", &["Stack"]));
        assert!(!s.matches("Empty", &["Group"]));

        // Needs backtracking past the nearest match
        let s = sel("Stack > Group Empty");
        assert!(s.matches("Empty", &["Stack", "Group", "Group"]));
        assert!(!s.matches("Empty", &["Group", "Group"]));
    }

    #[test]
    fn test_selector_list() {
        let s = sel("Empty, Other");
        assert!(s.matches("Empty", &[]));
        assert!(s.matches("Other", &[]));
        assert!(!s.matches("Group", &[]));
        assert_eq!(s.to_string(), "Empty, Other");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse(""), Err(SelectorError::Empty));
        assert_eq!(Selector::parse("A,"), Err(SelectorError::Empty));
        assert!(matches!(
            Selector::parse(":hover"),
            Err(SelectorError::UnknownPseudo(p)) if p == "hover"
        ));
        assert!(matches!(
            Selector::parse("A > > B"),
            Err(SelectorError::Unexpected { found: '>', .. })
        ));
        assert!(matches!(
            Selector::parse(":not(A"),
            Err(SelectorError::Unterminated(_))
        ));
        assert!(matches!(
            Selector::parse("A >"),
            Err(SelectorError::Unterminated(_))
        ));
    }
}
