//! Key expressions: parsing, canonicalization, and intersection.
//!
//! A key expression is a `/`-separated sequence of chunks. A chunk is
//! either a literal, a single-chunk wildcard (`*`), a multi-chunk wildcard
//! (`**`), or a literal containing `*` as a within-chunk glob (e.g.
//! `sensor*temp`, matching any chunk starting with `sensor` and ending with
//! `temp`). `**` may only appear as a whole chunk, never mixed with other
//! characters.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyExprError {
    #[error("key expression is empty")]
    Empty,
    #[error("empty chunk in key expression (consecutive or leading/trailing '/')")]
    EmptyChunk,
    #[error("'**' must not be combined with other characters in the same chunk")]
    MalformedDoubleWild,
    #[error("chunk contains a reserved character: {0:?}")]
    ReservedChar(char),
}

const RESERVED: [char; 4] = ['?', '#', '[', ']'];

/// Canonical internal form of the root key expression `/`: zero chunks.
const ROOT: &str = "/";

/// Yields the chunks of a [`KeyExpr`]. The root has none; every other
/// form splits on `/` as usual. A dedicated enum rather than
/// `Box<dyn Iterator>` or `std::iter::empty().chain(...)`, since
/// `KeyExpr::chunks` is called in hot paths (`intersects`, `includes`).
enum ChunkIter<'a> {
    Root,
    Parts(std::str::Split<'a, char>),
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        match self {
            ChunkIter::Root => None,
            ChunkIter::Parts(it) => it.next(),
        }
    }
}

fn validate_chunk(chunk: &str) -> Result<(), KeyExprError> {
    if chunk.is_empty() {
        return Err(KeyExprError::EmptyChunk);
    }
    if chunk != "**" && chunk.contains("**") {
        return Err(KeyExprError::MalformedDoubleWild);
    }
    for c in chunk.chars() {
        if RESERVED.contains(&c) {
            return Err(KeyExprError::ReservedChar(c));
        }
    }
    Ok(())
}

/// A validated, owned key expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyExpr(String);

impl KeyExpr {
    /// Validate `s` as a key expression without canonicalizing it.
    pub fn new(s: impl Into<String>) -> Result<Self, KeyExprError> {
        let s = s.into();
        if s.is_empty() {
            return Err(KeyExprError::Empty);
        }
        for chunk in s.split('/') {
            validate_chunk(chunk)?;
        }
        Ok(KeyExpr(s))
    }

    /// Canonicalize `s`: strips leading/trailing slashes, collapses any
    /// run of consecutive slashes (empty chunks) down to the single
    /// separator they represent, and collapses runs of `**` chunks
    /// (`a/**/**/b` -> `a/**/b`). Only a chunk that survives this
    /// collapsing and still fails [`validate_chunk`] (a reserved
    /// character, a malformed `**`) is an error — a bare empty chunk from
    /// `/`, `//`, or a trailing `/` is never one. `s` consisting of
    /// nothing but slashes (`/`, `//`, ...) canonicalizes to the root —
    /// a key expression with zero chunks, its own canonical form, not an
    /// error — since the empty-string input itself is the only thing
    /// this rejects as [`KeyExprError::Empty`].
    pub fn canonicalize(s: &str) -> Result<Self, KeyExprError> {
        if s.is_empty() {
            return Err(KeyExprError::Empty);
        }
        let mut chunks: Vec<&str> = Vec::new();
        for chunk in s.split('/') {
            if chunk.is_empty() {
                continue;
            }
            validate_chunk(chunk)?;
            if chunk == "**" && chunks.last() == Some(&"**") {
                continue;
            }
            chunks.push(chunk);
        }
        if chunks.is_empty() {
            return Ok(KeyExpr(ROOT.to_string()));
        }
        Ok(KeyExpr(chunks.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root key expression (zero chunks) — the
    /// canonical form of `/`, matched only by itself and by `**`.
    pub fn is_root(&self) -> bool {
        self.0 == ROOT
    }

    pub fn chunks(&self) -> impl Iterator<Item = &str> {
        if self.is_root() {
            ChunkIter::Root
        } else {
            ChunkIter::Parts(self.0.split('/'))
        }
    }

    /// Whether this key expression contains no wildcards at all — such
    /// key expressions are used literally (e.g. as a `put`'s key) rather
    /// than as a subscription pattern.
    pub fn is_literal(&self) -> bool {
        self.chunks().all(|c| !c.contains('*'))
    }

    /// Symmetric intersection test: do the sets of concrete keys matched
    /// by `self` and `other` overlap?
    pub fn intersects(&self, other: &KeyExpr) -> bool {
        let a: Vec<&str> = self.chunks().collect();
        let b: Vec<&str> = other.chunks().collect();
        chunks_intersect(&a, &b)
    }

    /// Asymmetric "includes" test: does every concrete key matched by
    /// `other` also match `self`? Used for interest/declaration scoping
    /// where a broader expression must subsume a narrower one.
    pub fn includes(&self, other: &KeyExpr) -> bool {
        let a: Vec<&str> = self.chunks().collect();
        let b: Vec<&str> = other.chunks().collect();
        chunks_include(&a, &b)
    }
}

impl fmt::Display for KeyExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Glob-match a single chunk against a literal chunk. `pattern` may
/// contain `*` as "zero or more characters"; it is never `**` here (that
/// case is handled at the chunk-sequence level).
fn chunk_glob_matches(pattern: &str, literal: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == literal;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !literal[pos..].starts_with(part) {
                return false;
            }
            pos += part.len();
        } else if i == parts.len() - 1 {
            if !literal[pos..].ends_with(part) {
                return false;
            }
        } else {
            match literal[pos..].find(part) {
                Some(offset) => pos += offset + part.len(),
                None => return false,
            }
        }
    }
    true
}

/// Do two chunks (each possibly containing `*` but never `**`) intersect,
/// i.e. is there a literal chunk both would match?
fn chunk_intersects(a: &str, b: &str) -> bool {
    if !a.contains('*') && !b.contains('*') {
        return a == b;
    }
    if !a.contains('*') {
        return chunk_glob_matches(b, a);
    }
    if !b.contains('*') {
        return chunk_glob_matches(a, b);
    }
    glob_glob_intersects(a, b)
}

/// Do two glob chunks (each containing at least one `*`) intersect? There's
/// a shared literal iff the fixed text around the first `*` in each chunk
/// agrees as a prefix and the fixed text around the last `*` agrees as a
/// suffix — any characters `*` could still absorb in between don't
/// constrain anything further.
fn glob_glob_intersects(a: &str, b: &str) -> bool {
    let a_prefix = a.split('*').next().unwrap_or("");
    let b_prefix = b.split('*').next().unwrap_or("");
    if !prefix_compatible(a_prefix, b_prefix) {
        return false;
    }
    let a_suffix = a.rsplit('*').next().unwrap_or("");
    let b_suffix = b.rsplit('*').next().unwrap_or("");
    suffix_compatible(a_suffix, b_suffix)
}

fn prefix_compatible(a: &str, b: &str) -> bool {
    a.chars().zip(b.chars()).all(|(x, y)| x == y)
}

fn suffix_compatible(a: &str, b: &str) -> bool {
    a.chars().rev().zip(b.chars().rev()).all(|(x, y)| x == y)
}

fn chunks_intersect(a: &[&str], b: &[&str]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(&"**"), _) => {
            chunks_intersect(&a[1..], b) || (!b.is_empty() && chunks_intersect(a, &b[1..]))
        }
        (_, Some(&"**")) => chunks_intersect(b, a),
        (Some(ca), Some(cb)) => chunk_intersects(ca, cb) && chunks_intersect(&a[1..], &b[1..]),
    }
}

/// Does every key matched by `b` also match `a` (pattern `a` includes
/// pattern `b`)? `**` in `a` absorbs anything in `b`; `**` in `b` but not
/// in `a` means `b` is broader, so inclusion fails unless `a` is also
/// `**` at that point.
fn chunks_include(a: &[&str], b: &[&str]) -> bool {
    match (a.first(), b.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(&"**"), None) => true,
        (Some(&"**"), Some(_)) => {
            chunks_include(&a[1..], b) || chunks_include(a, &b[1..])
        }
        (Some(_), None) => false,
        (Some(_), Some(&"**")) => false,
        (Some(ca), Some(cb)) => {
            (!cb.contains('*') && chunk_glob_matches(ca, cb) || ca == cb)
                && chunks_include(&a[1..], &b[1..])
        }
    }
}
