use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::utf8;

/// Element type a [`Window`] can scan.
pub trait Element: Copy + PartialEq + Hash {
    fn is_whitespace(self) -> bool;
}

impl Element for u8 {
    #[inline]
    fn is_whitespace(self) -> bool {
        char::from(self).is_whitespace()
    }
}

impl Element for char {
    #[inline]
    fn is_whitespace(self) -> bool {
        char::is_whitespace(self)
    }
}

/// Bounded, mutable cursor over an immutable shared sequence.
///
/// `pos`, `limit` and `mark` are relative to the start of the window, and
/// `0 <= pos <= limit <= capacity` holds after every operation. Cloning and
/// [`slice`](Window::slice) duplicate the cursor state but share the backing.
///
/// A window has a single owner; nothing here synchronizes.
#[derive(Clone)]
pub struct Window<T> {
    backing: Arc<[T]>,
    /// Absolute index of element 0 of this window inside `backing`.
    base: usize,
    capacity: usize,
    pos: usize,
    limit: usize,
    mark: Option<usize>,
}

pub type ByteWindow = Window<u8>;
pub type CharWindow = Window<char>;

impl<T: Element> Window<T> {
    pub fn new(backing: impl Into<Arc<[T]>>) -> Self {
        let backing = backing.into();
        let capacity = backing.len();
        Self {
            backing,
            base: 0,
            capacity,
            pos: 0,
            limit: capacity,
            mark: None,
        }
    }

    /// Current read position.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The recorded mark, if any.
    #[inline]
    pub fn marked(&self) -> Option<usize> {
        self.mark
    }

    /// Immutable length of the window's backing range.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.limit - self.pos
    }

    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.pos < self.limit
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos == self.limit
    }

    /// Element at absolute window index `index`, ignoring pos and limit.
    #[inline]
    pub fn at(&self, index: usize) -> Option<T> {
        if index < self.capacity {
            Some(self.backing[self.base + index])
        } else {
            None
        }
    }

    /// Return the element at `pos` and advance.
    pub fn get(&mut self) -> Result<T> {
        if !self.has_remaining() {
            return Err(Error::OutOfRange {
                pos: self.pos,
                limit: self.limit,
            });
        }
        let c = self.backing[self.base + self.pos];
        self.pos += 1;
        Ok(c)
    }

    /// Element at `pos` without advancing.
    pub fn peek(&self) -> Option<T> {
        if self.has_remaining() {
            Some(self.backing[self.base + self.pos])
        } else {
            None
        }
    }

    pub fn set_position(&mut self, pos: usize) -> Result<&mut Self> {
        if pos > self.limit {
            return Err(Error::OutOfRange {
                pos,
                limit: self.limit,
            });
        }
        self.pos = pos;
        Ok(self)
    }

    /// Move the limit; `pos` and `mark` are pulled back if they now exceed it.
    pub fn set_limit(&mut self, limit: usize) -> Result<&mut Self> {
        if limit > self.capacity {
            return Err(Error::OutOfRange {
                pos: limit,
                limit: self.capacity,
            });
        }
        self.limit = limit;
        self.pos = self.pos.min(limit);
        if self.mark.is_some_and(|m| m > limit) {
            self.mark = None;
        }
        Ok(self)
    }

    pub fn mark(&mut self) -> &mut Self {
        self.mark = Some(self.pos);
        self
    }

    /// Restore `pos` to the mark; no-op when nothing is marked.
    pub fn reset(&mut self) -> &mut Self {
        if let Some(m) = self.mark {
            self.pos = m.min(self.limit);
        }
        self
    }

    /// Expose the scanned region `[0, pos)` for re-reading.
    pub fn flip(&mut self) -> &mut Self {
        self.limit = self.pos;
        self.pos = 0;
        self.mark = None;
        self
    }

    pub fn rewind(&mut self) -> &mut Self {
        self.pos = 0;
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.pos = 0;
        self.limit = self.capacity;
        self.mark = None;
        self
    }

    /// A fresh window over `[pos, limit)` sharing the same backing.
    pub fn slice(&self) -> Self {
        let capacity = self.remaining();
        Self {
            backing: Arc::clone(&self.backing),
            base: self.base + self.pos,
            capacity,
            pos: 0,
            limit: capacity,
            mark: None,
        }
    }

    /// The `[pos, limit)` elements, without copying.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.backing[self.base + self.pos..self.base + self.limit]
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }

    pub fn skip_whitespace(&mut self) -> &mut Self {
        while self.peek().is_some_and(Element::is_whitespace) {
            self.pos += 1;
        }
        self
    }

    pub fn rtrim(&mut self) -> &mut Self {
        while self.limit > self.pos && self.backing[self.base + self.limit - 1].is_whitespace() {
            self.limit -= 1;
        }
        self
    }

    /// Skip leading and drop trailing whitespace, without copying.
    pub fn trim(&mut self) -> &mut Self {
        self.confix_scope(Element::is_whitespace)
    }

    /// Shrink `[pos, limit)` from both ends while `pred` holds.
    pub fn confix_scope(&mut self, mut pred: impl FnMut(T) -> bool) -> &mut Self {
        let mut p = self.pos;
        let mut l = self.limit;
        while p < l && pred(self.backing[self.base + p]) {
            p += 1;
        }
        while l > p && pred(self.backing[self.base + l - 1]) {
            l -= 1;
        }
        self.limit = l;
        self.pos = p;
        if self.mark.is_some_and(|m| m > l) {
            self.mark = None;
        }
        self
    }

    /// Step back one element.
    pub fn decrement(&mut self) -> Result<&mut Self> {
        if self.pos == 0 {
            return Err(Error::Underflow);
        }
        self.pos -= 1;
        Ok(self)
    }

    /// Step forward one element.
    pub fn increment(&mut self) -> Result<&mut Self> {
        if !self.has_remaining() {
            return Err(Error::Overflow { pos: self.pos });
        }
        self.pos += 1;
        Ok(self)
    }

    /// Advance past the next `target`. On failure `pos` is left untouched.
    pub fn seek_to(&mut self, target: T) -> bool {
        match self.as_slice().iter().position(|&c| c == target) {
            Some(i) => {
                self.pos += i + 1;
                true
            }
            None => false,
        }
    }

    /// Like [`seek_to`](Window::seek_to), but a `target` directly after an
    /// unconsumed `escape` is literal.
    pub fn seek_to_escaped(&mut self, target: T, escape: T) -> bool {
        let mut escaped = false;
        for (i, &c) in self.as_slice().iter().enumerate() {
            if escaped {
                escaped = false;
            } else if c == target {
                self.pos += i + 1;
                return true;
            } else if c == escape {
                escaped = true;
            }
        }
        false
    }

    /// Naive forward search for `lit`, restarting at the next start offset on
    /// mismatch. `pos` lands just past the match.
    pub fn seek_to_seq(&mut self, lit: &[T]) -> bool {
        if lit.is_empty() {
            return true;
        }
        match self.as_slice().windows(lit.len()).position(|w| w == lit) {
            Some(start) => {
                self.pos += start + lit.len();
                true
            }
            None => false,
        }
    }

    /// Hash of the `[pos, limit)` content only.
    pub fn cache_code(&self) -> u64 {
        let mut h = std::collections::hash_map::DefaultHasher::new();
        self.as_slice().hash(&mut h);
        h.finish()
    }
}

impl<T: Element> PartialEq for Window<T> {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos
            && self.limit == other.limit
            && self.mark == other.mark
            && self.capacity == other.capacity
            && self.as_slice() == other.as_slice()
    }
}

impl<T: Element + Eq> Eq for Window<T> {}

impl<T: Element> Hash for Window<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pos.hash(state);
        self.limit.hash(state);
        self.mark.hash(state);
        self.capacity.hash(state);
        self.as_slice().hash(state);
    }
}

impl From<&str> for CharWindow {
    fn from(s: &str) -> Self {
        Window::new(s.chars().collect::<Vec<_>>())
    }
}

impl From<&[u8]> for ByteWindow {
    fn from(b: &[u8]) -> Self {
        Window::new(b)
    }
}

impl ByteWindow {
    pub fn decode_utf8(&self) -> Result<CharWindow> {
        Ok(Window::new(utf8::decode_utf8(self.as_slice())?))
    }
}

impl CharWindow {
    pub fn encode_utf8(&self) -> Result<ByteWindow> {
        Ok(Window::new(utf8::encode_utf8(self.as_slice())?))
    }

    pub fn as_string(&self) -> String {
        self.as_slice().iter().collect()
    }

    /// Strip a surrounding `"..."` pair (and outer spaces); true when found.
    pub fn unquote(&mut self) -> bool {
        self.confix_feature('"', '"')
    }

    pub fn unbrace(&mut self) -> bool {
        self.confix_feature('{', '}')
    }

    pub fn unbracket(&mut self) -> bool {
        self.confix_feature('[', ']')
    }

    fn confix_feature(&mut self, open: char, close: char) -> bool {
        let mut probe = self.clone();
        probe.trim();
        let s = probe.as_slice();
        if s.len() >= 2 && s[0] == open && s[s.len() - 1] == close {
            let (p, l) = (probe.pos + 1, probe.limit - 1);
            self.pos = p;
            self.limit = l;
            if self.mark.is_some_and(|m| m > l) {
                self.mark = None;
            }
            true
        } else {
            false
        }
    }
}

impl<T: Element> fmt::Debug for Window<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = &self.as_slice()[..self.remaining().min(4)];
        f.debug_struct("Window")
            .field("pos", &self.pos)
            .field("limit", &self.limit)
            .field("mark", &self.mark)
            .field("capacity", &self.capacity)
            .field("head", &head)
            .finish()
    }
}

impl fmt::Display for CharWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.as_slice() {
            fmt::Write::write_char(f, *c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> CharWindow {
        CharWindow::from(s)
    }

    #[test]
    fn get_mark_reset_flip() {
        let mut w = chars("abc");
        assert_eq!(w.get().unwrap(), 'a');
        w.mark();
        assert_eq!(w.get().unwrap(), 'b');
        w.reset();
        assert_eq!(w.position(), 1);
        w.get().unwrap();
        w.flip();
        assert_eq!((w.position(), w.limit(), w.marked()), (0, 2, None));
        assert_eq!(w.as_string(), "ab");

        w.set_position(2).unwrap();
        assert_eq!(w.get(), Err(Error::OutOfRange { pos: 2, limit: 2 }));
        assert!(matches!(w.increment(), Err(Error::Overflow { pos: 2 })));
        w.rewind();
        assert!(matches!(w.decrement(), Err(Error::Underflow)));
    }

    #[test]
    fn failed_seek_keeps_position() {
        let mut w = chars("abc");
        w.get().unwrap();
        assert!(!w.seek_to('z'));
        assert_eq!(w.position(), 1);
        assert!(w.seek_to('c'));
        assert_eq!(w.position(), 3);
    }

    #[test]
    fn escaped_target_is_literal() {
        let mut w = chars("x\\,y,\\,z,");
        assert!(w.seek_to_escaped(',', '\\'));
        assert_eq!(w.position(), 5);
        // The escape from the first call does not leak into the second.
        assert!(w.seek_to_escaped(',', '\\'));
        assert_eq!(w.position(), 9);
        assert!(!w.seek_to_escaped(',', '\\'));
        assert_eq!(w.position(), 9);

        let mut w = chars("a\\\\,b");
        assert!(w.seek_to_escaped(',', '\\'));
        assert_eq!(w.position(), 4);
    }

    #[test]
    fn sequence_search_restarts_after_mismatch() {
        let mut w = chars("aab");
        assert!(w.seek_to_seq(&['a', 'b']));
        assert_eq!(w.position(), 3);

        let mut w = chars("abababc");
        assert!(w.seek_to_seq(&['a', 'b', 'c']));
        assert_eq!(w.position(), 7);

        let mut w = chars("ababab");
        w.set_position(1).unwrap();
        assert!(!w.seek_to_seq(&['a', 'b', 'c']));
        assert_eq!(w.position(), 1);
        assert!(w.seek_to_seq(&[]));
        assert_eq!(w.position(), 1);
    }

    #[test]
    fn slice_shares_content_not_cursor() {
        let mut w = chars("hello world");
        w.set_position(6).unwrap();
        let mut tail = w.slice();
        assert_eq!((tail.position(), tail.limit(), tail.capacity()), (0, 5, 5));
        assert_eq!(tail.as_string(), "world");
        assert_eq!(tail.get().unwrap(), 'w');
        assert_eq!(w.position(), 6);
        assert_eq!(w.peek(), Some('w'));
        assert_eq!(tail.at(0), Some('w'));
        assert_eq!(tail.at(5), None);
    }

    #[test]
    fn equality_is_content_and_bounds() {
        let a = chars("xyz");
        let b = Window::new(vec!['x', 'y', 'z']);
        assert_eq!(a, b);
        assert_eq!(a.cache_code(), b.cache_code());

        let mut padded = chars("  xyz");
        padded.set_position(2).unwrap();
        assert_eq!(padded.cache_code(), a.cache_code());
        assert_ne!(padded, a);
        assert_eq!(padded.slice(), a);
    }

    #[test]
    fn trims_without_copying() {
        let mut w = chars("  ab  ");
        w.trim();
        assert_eq!((w.position(), w.limit()), (2, 4));
        assert_eq!(w.as_string(), "ab");

        let mut w = chars(" \tz ");
        w.skip_whitespace();
        assert_eq!(w.position(), 2);
        w.rtrim();
        assert_eq!(w.to_vec(), vec!['z']);
        w.clear();
        assert_eq!((w.position(), w.limit()), (0, 4));
    }

    #[test]
    fn confix_helpers() {
        let mut w = chars("  \"hi\" ");
        assert!(w.unquote());
        assert_eq!(w.as_string(), "hi");

        let mut w = chars("{a}");
        assert!(w.unbrace());
        assert_eq!(w.as_string(), "a");

        let mut w = chars("[1,2]");
        assert!(w.unbracket());
        assert_eq!(w.as_string(), "1,2");

        let mut w = chars("hi\"");
        assert!(!w.unquote());
        assert_eq!(w.as_string(), "hi\"");
    }

    #[test]
    fn utf8_views() {
        let bytes = "h\u{e9}llo \u{20ac}".as_bytes();
        let decoded = ByteWindow::from(bytes).decode_utf8().unwrap();
        assert_eq!(decoded.as_string(), "h\u{e9}llo \u{20ac}");
        assert_eq!(decoded.encode_utf8().unwrap().as_slice(), bytes);

        let mut w = ByteWindow::from(b"abc".as_slice());
        w.set_position(1).unwrap();
        assert_eq!(w.decode_utf8().unwrap().as_string(), "bc");
    }
}
