#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Span` records which bytes of the user's input a match, token, or node covers. It holds
/// no reference to the input itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span starting at byte `start` and ending at byte `end`.
    ///
    /// # Panics
    ///
    /// If `end` is less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            panic!("Span starts ({}) after it ends ({})!", start, end);
        }
        Span { start, end }
    }

    /// An empty span at byte `pos`.
    pub fn empty_at(pos: usize) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest span covering both `self` and `other`.
    pub fn cover(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// The text of `src` this span covers. Returns `None` if the span lies outside `src` or
    /// does not fall on character boundaries.
    pub fn slice<'a>(&self, src: &'a str) -> Option<&'a str> {
        src.get(self.start..self.end)
    }
}

#[cfg(test)]
mod test {
    use super::Span;

    #[test]
    fn cover_and_slice() {
        let a = Span::new(2, 4);
        let b = Span::new(6, 9);
        assert_eq!(a.cover(b), Span::new(2, 9));
        assert_eq!(b.cover(a), Span::new(2, 9));
        assert_eq!(Span::new(2, 9).slice("0123456789"), Some("2345678"));
        assert_eq!(Span::new(8, 12).slice("0123456789"), None);
        assert!(Span::empty_at(3).is_empty());
    }

    #[test]
    #[should_panic]
    fn inverted_span() {
        Span::new(4, 2);
    }
}
