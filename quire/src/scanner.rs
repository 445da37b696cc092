use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// The lexical form variable references take in a piece of literal text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Sigil introducing a reference to a locally scoped variable.
    pub local: char,
    /// Sigil introducing a reference into the root request dataset.
    pub global: char,
    /// When set, references are only recognized between these delimiters.
    pub delimiters: Option<(char, char)>,
}

impl Dialect {
    /// Bare references: `$name.path`, `@name.path`.
    pub const INLINE: Dialect = Dialect {
        local: '$',
        global: '@',
        delimiters: None,
    };

    /// Delimited references: `{$name.path}`, `{@name.path}`.
    pub const BRACED: Dialect = Dialect {
        local: '$',
        global: '@',
        delimiters: Some(('{', '}')),
    };

    fn scope_of(&self, c: char) -> Option<Scope> {
        if c == self.local {
            Some(Scope::Local)
        } else if c == self.global {
            Some(Scope::Global)
        } else {
            None
        }
    }

    fn sigil(&self, scope: Scope) -> char {
        match scope {
            Scope::Local => self.local,
            Scope::Global => self.global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    Global,
}

/// One variable reference found in literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarToken {
    pub scope: Scope,
    /// First path segment; the name that is provided or consumed.
    pub name: String,
    /// Remaining `.segment`s, walked into the value at run time.
    pub path: Vec<String>,
    /// Byte span of the whole reference (delimiters included) within the scanned text.
    pub span: Range<usize>,
}

impl VarToken {
    pub fn is_global(&self) -> bool {
        self.scope == Scope::Global
    }

    /// The reference written back in inline form, for messages.
    pub fn reference(&self) -> String {
        let mut s = String::new();
        s.push(Dialect::INLINE.sigil(self.scope));
        s.push_str(&self.name);
        for segment in &self.path {
            s.push('.');
            s.push_str(segment);
        }
        s
    }
}

impl fmt::Display for VarToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}

/// A piece of scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, with sigil escapes already collapsed.
    Literal(String),
    Var(VarToken),
}

/// Split `text` into literal runs and variable references.
pub fn scan(text: &str, dialect: Dialect) -> Vec<Segment> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        let (_, c) = chars[i];
        let matched = match dialect.delimiters {
            None => scan_inline(&chars, i, text.len(), dialect),
            Some((open, close)) if c == open => scan_braced(&chars, i, text.len(), dialect, close),
            Some(_) => None,
        };

        match matched {
            Some(Match::Token(token, next)) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Var(token));
                i = next;
            }
            Some(Match::Escape(sigil)) => {
                literal.push(sigil);
                i += 2;
            }
            None => {
                literal.push(c);
                i += 1;
            }
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Only the variable references of `text`.
pub fn tokens(text: &str, dialect: Dialect) -> Vec<VarToken> {
    scan(text, dialect)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Var(token) => Some(token),
            Segment::Literal(_) => None,
        })
        .collect()
}

pub fn has_tokens(text: &str, dialect: Dialect) -> bool {
    scan(text, dialect)
        .iter()
        .any(|segment| matches!(segment, Segment::Var(_)))
}

/// The single reference `text` consists of, ignoring surrounding whitespace.
/// Returns `None` if there is any other literal content or more than one reference.
pub fn sole_token(text: &str, dialect: Dialect) -> Option<VarToken> {
    let mut segments = scan(text, dialect)
        .into_iter()
        .filter(|segment| !matches!(segment, Segment::Literal(s) if s.trim().is_empty()));
    match (segments.next(), segments.next()) {
        (Some(Segment::Var(token)), None) => Some(token),
        _ => None,
    }
}

enum Match {
    /// A reference and the char index just past it.
    Token(VarToken, usize),
    /// A doubled sigil standing for itself.
    Escape(char),
}

fn scan_inline(chars: &[(usize, char)], i: usize, len: usize, dialect: Dialect) -> Option<Match> {
    let (start, c) = chars[i];
    let scope = dialect.scope_of(c)?;

    if let Some(&(_, next)) = chars.get(i + 1) {
        if next == c {
            return Some(Match::Escape(c));
        }
    }

    let at_boundary = i == 0 || !is_ident_char(chars[i - 1].1);
    if !at_boundary {
        return None;
    }

    let (name, path, next) = scan_path(chars, i + 1)?;
    let end = chars.get(next).map(|&(o, _)| o).unwrap_or(len);
    Some(Match::Token(
        VarToken {
            scope,
            name,
            path,
            span: start..end,
        },
        next,
    ))
}

fn scan_braced(
    chars: &[(usize, char)],
    i: usize,
    len: usize,
    dialect: Dialect,
    close: char,
) -> Option<Match> {
    let (start, _) = chars[i];
    let mut j = skip_spaces(chars, i + 1);
    let &(_, sigil) = chars.get(j)?;
    let scope = dialect.scope_of(sigil)?;
    let (name, path, next) = scan_path(chars, j + 1)?;
    j = skip_spaces(chars, next);
    let &(_, c) = chars.get(j)?;
    if c != close {
        return None;
    }
    let end = chars.get(j + 1).map(|&(o, _)| o).unwrap_or(len);
    Some(Match::Token(
        VarToken {
            scope,
            name,
            path,
            span: start..end,
        },
        j + 1,
    ))
}

/// `ident ('.' segment)*` starting at char index `i`.
fn scan_path(chars: &[(usize, char)], i: usize) -> Option<(String, Vec<String>, usize)> {
    let &(_, first) = chars.get(i)?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }

    let mut j = i;
    let name = take_ident(chars, &mut j);
    let mut path = Vec::new();

    // A trailing '.' (end of a sentence) is not part of the reference.
    while matches!(chars.get(j), Some(&(_, '.')))
        && chars.get(j + 1).is_some_and(|&(_, c)| is_ident_char(c))
    {
        j += 1;
        path.push(take_ident(chars, &mut j));
    }

    Some((name, path, j))
}

fn take_ident(chars: &[(usize, char)], j: &mut usize) -> String {
    let mut ident = String::new();
    while let Some(&(_, c)) = chars.get(*j) {
        if !is_ident_char(c) {
            break;
        }
        ident.push(c);
        *j += 1;
    }
    ident
}

fn skip_spaces(chars: &[(usize, char)], mut j: usize) -> usize {
    while chars.get(j).is_some_and(|&(_, c)| c == ' ') {
        j += 1;
    }
    j
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
