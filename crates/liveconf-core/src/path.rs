//! Path expressions and the tree walker
//!
//! A path is a dot-separated list of field names, each optionally followed
//! by a single sequence index: `servers[0].host`. Whitespace around names
//! and inside the brackets is ignored, so `servers [ 0 ] . host` names the
//! same value.
//!
//! Resolution decodes only the fragments along the path. Intermediate
//! segments must decode to mappings (or, when indexed, to sequences whose
//! selected element is a mapping); the final fragment is handed to a leaf
//! handler supplied by the caller.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::tree::{self, RawTree};

/// A single path segment: a field name with an optional sequence index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Field name, with surrounding whitespace removed
    pub name: String,
    /// Index into the sequence stored under `name`
    pub index: Option<usize>,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.name, index),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A parsed path expression
///
/// `Display` renders the canonical form used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    segments: Vec<PathSegment>,
}

impl PathExpression {
    /// Parse a path expression
    pub fn parse(path: &str) -> Result<Self> {
        let segments = path
            .split('.')
            .map(|raw| parse_segment(path, raw))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    /// The segments of this path, outermost first
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Whitespace-free form, e.g. `a.b[2].c`
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Index on the final segment, if any
    pub fn trailing_index(&self) -> Option<usize> {
        self.segments.last().and_then(|s| s.index)
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for PathExpression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_segment(path: &str, raw: &str) -> Result<PathSegment> {
    let segment = raw.trim();
    if segment.is_empty() {
        return Err(Error::invalid_key(path, "Empty path segment"));
    }

    let (name, index) = match segment.strip_suffix(']') {
        Some(head) => {
            // Only the last '[' opens the index; nested brackets stay in the name
            let open = head.rfind('[').ok_or_else(|| {
                Error::invalid_key(path, format!("Unmatched ']' in segment '{}'", segment))
            })?;
            let digits = head[open + 1..].trim();
            let index: i64 = digits.parse().map_err(|_| {
                Error::invalid_key(
                    path,
                    format!("Invalid index '{}' in segment '{}'", digits, segment),
                )
            })?;
            let index = usize::try_from(index).map_err(|_| {
                Error::invalid_slice_index(path, format!("Negative index {}", index))
            })?;
            (&head[..open], Some(index))
        }
        None => (segment, None),
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(Error::invalid_key(
            path,
            format!("Missing field name in segment '{}'", segment),
        ));
    }

    Ok(PathSegment {
        name: name.to_string(),
        index,
    })
}

/// Walks a `RawTree` along a path expression
pub struct PathResolver<'a> {
    root: &'a RawTree,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver over a tree
    pub fn new(root: &'a RawTree) -> Self {
        Self { root }
    }

    /// Resolve `path` and pass the leaf fragment to `on_leaf`
    ///
    /// The leaf handler receives the undecoded fragment found under the
    /// last segment's name together with that segment's index; its result
    /// is returned as-is.
    pub fn resolve<T, F>(&self, path: &PathExpression, on_leaf: F) -> Result<T>
    where
        F: FnOnce(&RawValue, Option<usize>) -> Result<T>,
    {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            return Err(Error::key_not_found(path.canonical()));
        };

        let mut level: Cow<'a, RawTree> = Cow::Borrowed(self.root);
        let mut walked = String::new();

        for segment in parents {
            push_segment(&mut walked, segment);
            let fragment = level
                .get(&segment.name)
                .ok_or_else(|| Error::key_not_found(&walked))?;

            let next = match segment.index {
                Some(index) => {
                    let element: Box<RawValue> =
                        tree::decode_element(fragment, index, &walked, "fragment")?;
                    RawTree::from_fragment(&element, &walked)?
                }
                None => RawTree::from_fragment(fragment, &walked)?,
            };
            level = Cow::Owned(next);
        }

        push_segment(&mut walked, last);
        let fragment = level
            .get(&last.name)
            .ok_or_else(|| Error::key_not_found(&walked))?;
        on_leaf(fragment, last.index)
    }
}

fn push_segment(walked: &mut String, segment: &PathSegment) {
    if !walked.is_empty() {
        walked.push('.');
    }
    walked.push_str(&segment.to_string());
}
