use crate::Span;

/// Caches the byte offsets at which each line of an input starts, so that byte offsets can be
/// cheaply converted into (1-based) line and column numbers.
pub struct NewlineCache {
    /// The byte offset of the first byte of each line. Always contains at least `0`.
    line_starts: Vec<usize>,
    len: usize,
}

impl NewlineCache {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            src.char_indices()
                .filter(|&(_, c)| c == '\n')
                .map(|(off, _)| off + 1),
        );
        NewlineCache {
            line_starts,
            len: src.len(),
        }
    }

    /// The number of lines in the input. An input ending in a newline has an (empty) final line.
    pub fn lines_len(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset into a 1-based line number. Returns `None` if `byte` is beyond the
    /// end of the input.
    pub fn byte_to_line_num(&self, byte: usize) -> Option<usize> {
        if byte > self.len {
            return None;
        }
        // `line_starts` is sorted and starts with 0, so the partition point is at least 1.
        Some(self.line_starts.partition_point(|&off| off <= byte))
    }

    /// Convert a byte offset in `src` (which must be the string this cache was built from) into
    /// 1-based line and column numbers. Columns count characters, not bytes.
    pub fn byte_to_line_and_col(&self, src: &str, byte: usize) -> Option<(usize, usize)> {
        if src.len() != self.len {
            return None;
        }
        let line_num = self.byte_to_line_num(byte)?;
        let line_start = self.line_starts[line_num - 1];
        let col = src.get(line_start..byte)?.chars().count() + 1;
        Some((line_num, col))
    }

    /// The span of the line containing `byte`, excluding its terminating newline (and any
    /// carriage return preceding it).
    pub fn line_span(&self, src: &str, byte: usize) -> Option<Span> {
        let line_num = self.byte_to_line_num(byte)?;
        let start = self.line_starts[line_num - 1];
        let mut end = match self.line_starts.get(line_num) {
            Some(&next) => next - 1,
            None => self.len,
        };
        if end > start && src.as_bytes().get(end - 1) == Some(&b'\r') {
            end -= 1;
        }
        Some(Span::new(start, end))
    }
}
