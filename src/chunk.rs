//! Code-aware chunker.
//!
//! Splits a source file into size-bounded, overlapping byte windows. Cut
//! points prefer syntactic boundaries (top-level `def`/`class`/decorator
//! lines and the first line after a blank-line run) so a function or
//! class stays largely within one chunk. Oversized spans fall back to the
//! last line start that fits, then to a raw byte cut for a single line
//! longer than the budget.
//!
//! Invariants:
//! - every chunk's text is `file.text[start..end]` for some window, an
//!   exact contiguous substring of the source;
//! - no chunk exceeds `max_chunk_size` bytes;
//! - adjacent windows of one file overlap by at most `overlap` bytes and
//!   never leave a gap between them.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, SourceFile};

/// Split one source file into chunks. `max_chunk_size` and `overlap` are
/// byte budgets; `overlap` must be smaller than `max_chunk_size` (enforced
/// by config validation).
pub fn chunk_file(file: &SourceFile, max_chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let text = file.text.as_str();
    if text.is_empty() {
        return Vec::new();
    }

    let starts = line_starts(text);
    let boundaries = boundary_flags(text, &starts);

    let mut chunks = Vec::new();
    let mut begin = 0usize;
    let mut index: i64 = 0;

    loop {
        let end = pick_cut(text, &starts, &boundaries, begin, max_chunk_size);
        debug_assert!(end > begin && end - begin <= max_chunk_size);

        chunks.push(make_chunk(file, index, text, begin, end, &starts));
        index += 1;

        if end >= text.len() {
            break;
        }

        begin = pick_next_begin(&starts, begin, end, overlap);
    }

    chunks
}

/// Byte offset of each line start, in order. `starts[0] == 0`.
fn line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' && i + 1 < text.len() {
            starts.push(i + 1);
        }
    }
    starts
}

/// For each line, whether its start is a preferred (syntax-aware) cut
/// point: a top-level definition or the first code line after blank lines.
fn boundary_flags(text: &str, starts: &[usize]) -> Vec<bool> {
    let mut flags = vec![false; starts.len()];
    let mut prev_blank = false;

    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let line = &text[start..end];
        let blank = line.trim().is_empty();

        if !blank && (is_top_level_def(line) || (i > 0 && prev_blank)) {
            flags[i] = true;
        }
        prev_blank = blank;
    }
    flags
}

/// A column-0 definition, decorator, or `async def` line.
fn is_top_level_def(line: &str) -> bool {
    line.starts_with("def ")
        || line.starts_with("class ")
        || line.starts_with("async def ")
        || line.starts_with("@")
}

/// Choose the cut offset for the window starting at `begin`.
///
/// Preference order within `(begin, begin + max]`: the last preferred
/// boundary, then the last plain line start, then the file end if it fits,
/// then a raw cut at the byte budget (aligned to a char boundary).
fn pick_cut(
    text: &str,
    starts: &[usize],
    boundaries: &[bool],
    begin: usize,
    max: usize,
) -> usize {
    let limit = begin.saturating_add(max);
    if text.len() <= limit {
        return text.len();
    }

    let mut best_plain = None;
    let mut best_boundary = None;
    for (i, &s) in starts.iter().enumerate() {
        if s <= begin {
            continue;
        }
        if s > limit {
            break;
        }
        best_plain = Some(s);
        if boundaries[i] {
            best_boundary = Some(s);
        }
    }

    if let Some(cut) = best_boundary.or(best_plain) {
        return cut;
    }

    // Single line longer than the budget: raw cut on a char boundary.
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    cut.max(begin + 1)
}

/// Start of the next window: the earliest line start within `overlap`
/// bytes of the previous cut, falling back to the cut itself (no overlap)
/// when no line start lands inside the window.
fn pick_next_begin(starts: &[usize], prev_begin: usize, end: usize, overlap: usize) -> usize {
    let floor = end.saturating_sub(overlap);
    for &s in starts {
        if s >= end {
            break;
        }
        if s >= floor && s > prev_begin {
            return s;
        }
    }
    end
}

fn make_chunk(
    file: &SourceFile,
    index: i64,
    text: &str,
    begin: usize,
    end: usize,
    starts: &[usize],
) -> Chunk {
    let span = &text[begin..end];

    let mut hasher = Sha256::new();
    hasher.update(span.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        path: file.path.clone(),
        chunk_index: index,
        text: span.to_string(),
        start_line: line_of(starts, begin) as i64 + 1,
        end_line: line_of(starts, end.saturating_sub(1)) as i64 + 1,
        hash,
    }
}

/// Index of the line containing byte `offset`.
fn line_of(starts: &[usize], offset: usize) -> usize {
    match starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, text: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            text: text.to_string(),
        }
    }

    /// Byte offset of each chunk within the file, recovered by scanning
    /// forward; valid for fixtures without repeated chunk texts.
    fn offsets(src: &SourceFile, chunks: &[Chunk]) -> Vec<usize> {
        let mut from = 0;
        chunks
            .iter()
            .map(|c| {
                let at = src.text[from..].find(&c.text).expect("chunk not a substring") + from;
                from = at + 1;
                at
            })
            .collect()
    }

    #[test]
    fn test_small_file_single_chunk() {
        let f = file("a.py", "def add(a, b):\n    return a + b\n");
        let chunks = chunk_file(&f, 2000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, f.text);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
    }

    #[test]
    fn test_empty_file_yields_no_chunks() {
        let f = file("a.py", "");
        assert!(chunk_file(&f, 2000, 200).is_empty());
    }

    #[test]
    fn test_every_chunk_is_exact_substring_and_bounded() {
        let body = (0..40)
            .map(|i| format!("def fn_{i}(x):\n    y = x * {i}\n    return y\n\n"))
            .collect::<String>();
        let f = file("gen.py", &body);
        let max = 120;
        let chunks = chunk_file(&f, max, 40);

        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert!(c.text.len() <= max, "chunk {} exceeds max", i);
            assert!(f.text.contains(&c.text), "chunk {} not a substring", i);
        }
    }

    #[test]
    fn test_windows_cover_file_with_bounded_overlap() {
        let body = (0..30)
            .map(|i| format!("def f{i}():\n    return {i}\n\n"))
            .collect::<String>();
        let f = file("cov.py", &body);
        let max = 100;
        let overlap = 30;
        let chunks = chunk_file(&f, max, overlap);
        let starts = offsets(&f, &chunks);

        let mut covered_to = 0usize;
        for (i, (&start, c)) in starts.iter().zip(&chunks).enumerate() {
            assert!(start <= covered_to, "gap before chunk {}", i);
            if i > 0 {
                let ov = covered_to - start;
                assert!(ov <= overlap, "overlap {} exceeds bound at chunk {}", ov, i);
            }
            covered_to = start + c.text.len();
        }
        assert_eq!(covered_to, f.text.len(), "tail of file not covered");
    }

    #[test]
    fn test_prefers_definition_boundaries() {
        let body = "def first():\n    a = 1\n    b = 2\n    return a + b\n\ndef second():\n    return 0\n";
        let f = file("two.py", body);
        // Budget fits `first` but not both, so the cut should land on the
        // `def second` line, not mid-function.
        let chunks = chunk_file(&f, 60, 0);
        assert!(chunks.len() >= 2);
        assert!(chunks[1].text.starts_with("def second")
            || chunks[1].text.starts_with("\ndef second"));
    }

    #[test]
    fn test_oversized_single_line_raw_cut() {
        let body = "x = \"".to_string() + &"a".repeat(500) + "\"\n";
        let f = file("long.py", &body);
        let chunks = chunk_file(&f, 100, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 100);
            assert!(f.text.contains(&c.text));
        }
    }

    #[test]
    fn test_deterministic() {
        let body = "import os\n\nclass A:\n    def m(self):\n        return 1\n\n\ndef top():\n    pass\n";
        let f = file("det.py", body);
        let a = chunk_file(&f, 50, 10);
        let b = chunk_file(&f, 50, 10);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.start_line, y.start_line);
            assert_eq!(x.end_line, y.end_line);
        }
    }

    #[test]
    fn test_line_ranges_match_content() {
        let body = "a = 1\nb = 2\nc = 3\nd = 4\ne = 5\n";
        let f = file("lines.py", body);
        let chunks = chunk_file(&f, 12, 0);
        // 6-byte lines, two per chunk
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[1].start_line, 3);
        assert_eq!(chunks[1].end_line, 4);
    }

    #[test]
    fn test_decorator_counts_as_boundary() {
        let body = "def plain():\n    return 1\n@decorated\ndef fancy():\n    return 2\n";
        let f = file("dec.py", body);
        let chunks = chunk_file(&f, 30, 0);
        assert!(chunks.iter().any(|c| c.text.starts_with("@decorated")));
    }
}
