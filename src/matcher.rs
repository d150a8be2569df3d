//! Matching and highlighting of query text against display names.
//!
//! Both sides are brought to Unicode canonical composition (NFC) and then
//! case-folded, so "STRASSE" matches "straße". A query is split on whitespace into tokens; every token has
//! to appear somewhere in the candidate, in any order.

use caseless::Caseless;
use std::iter;
use std::ops::Range;
use unicode_normalization::UnicodeNormalization;

/// Returns true if every token of `query` is a substring of `candidate`.
///
/// A query without any token matches nothing, not even an empty candidate.
pub fn is_match(query: &str, candidate: &str) -> bool {
    let query = prepare(query);
    if query.split_whitespace().next().is_none() {
        return false;
    }
    let candidate = prepare(candidate);
    candidate == query || query.split_whitespace().all(|token| candidate.contains(token))
}

/// Which bytes of a (normalized) candidate matched a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    text: String,
    mask: Vec<bool>,
}

impl Highlight {
    /// The candidate in NFC form; the mask indexes the bytes of this string.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn is_highlighted(&self, byte: usize) -> bool {
        self.mask.get(byte).copied().unwrap_or(false)
    }

    /// Highlighted byte ranges, merged and in order.
    pub fn ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = None;
        for (i, &on) in self.mask.iter().enumerate() {
            match (on, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    ranges.push(s..i);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            ranges.push(s..self.mask.len());
        }
        ranges
    }
}

/// Marks the first occurrence of every query token in `candidate`.
///
/// Returns `None` as soon as one token cannot be found. If the whole
/// candidate equals the query after normalization, every byte is marked.
pub fn highlight(query: &str, candidate: &str) -> Option<Highlight> {
    let query = prepare(query);
    if query.split_whitespace().next().is_none() {
        return None;
    }

    let text: String = candidate.nfc().collect();
    let folded = Folded::new(&text);
    let mut mask = vec![false; text.len()];

    if folded.text == query {
        mask.fill(true);
        return Some(Highlight { text, mask });
    }

    for token in query.split_whitespace() {
        let start = folded.text.find(token)?;
        let source = folded.source_range(start..start + token.len());
        mask[source].fill(true);
    }
    Some(Highlight { text, mask })
}

/// Renders `candidate` with every highlighted run wrapped in `on`/`off`.
///
/// Text is markup-escaped; the markers are inserted as-is. A candidate that
/// does not match is returned escaped, without markers.
pub fn markup(query: &str, candidate: &str, on: &str, off: &str) -> String {
    let Some(highlight) = highlight(query, candidate) else {
        let text: String = candidate.nfc().collect();
        return escape(&text);
    };

    let mut out = String::with_capacity(highlight.text.len() * 2);
    let mut inside = false;
    for (i, c) in highlight.text.char_indices() {
        let on_now = highlight.mask[i];
        if on_now != inside {
            out.push_str(if on_now { on } else { off });
            inside = on_now;
        }
        push_escaped(&mut out, c);
    }
    if inside {
        out.push_str(off);
    }
    out
}

fn prepare(text: &str) -> String {
    text.nfc().default_case_fold().collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        push_escaped(&mut out, c);
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '\'' => out.push_str("&apos;"),
        '"' => out.push_str("&quot;"),
        _ => out.push(c),
    }
}

/// Case-folded copy of a string that remembers, for every byte, which
/// character of the original produced it. Folding may turn one character
/// into several ("ß" into "ss"), so offsets cannot be reused directly.
struct Folded {
    text: String,
    origins: Vec<Range<usize>>,
}

impl Folded {
    fn new(source: &str) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut origins = Vec::with_capacity(source.len());
        for (i, c) in source.char_indices() {
            let origin = i..i + c.len_utf8();
            for folded in iter::once(c).default_case_fold() {
                text.push(folded);
                origins.extend(iter::repeat_n(origin.clone(), folded.len_utf8()));
            }
        }
        Self { text, origins }
    }

    fn source_range(&self, folded: Range<usize>) -> Range<usize> {
        self.origins[folded.start].start..self.origins[folded.end - 1].end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CET_ETE: &str = "Cet \u{e9}t\u{e9}";
    const CET_ETE_UPPER: &str = "CET \u{c9}T\u{c9}";
    const ETE_DECOMPOSED: &str = "e\u{301}te\u{301}";
    const TI_EINAI_AYTO: &str = "\u{3a4}\u{3b9} \u{3b5}\u{3af}\u{3bd}\u{3b1}\u{3b9} \u{3b1}\u{3c5}\u{3c4}\u{3cc}";
    const TI_EINAI_AYTO_UPPER: &str = "\u{3a4}\u{399} \u{395}\u{38a}\u{39d}\u{391}\u{399} \u{391}\u{3a5}\u{3a4}\u{38c}";

    /// One digit per character of `candidate`, spaces kept as spaces.
    fn mask_of(query: &str, candidate: &str) -> Option<String> {
        let h = highlight(query, candidate)?;
        Some(
            h.text()
                .char_indices()
                .map(|(i, c)| match c {
                    ' ' => ' ',
                    _ if h.is_highlighted(i) => '1',
                    _ => '0',
                })
                .collect(),
        )
    }

    #[test]
    fn exact_match() {
        assert!(is_match("baaaa", "baaaa"));
        assert!(!is_match("bobo", "baaaa"));
        assert!(is_match("a b c", "a b c"));
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(!is_match("", "ba ba"));
        assert!(!is_match("", ""));
        assert!(!is_match("   ", "ba ba"));
    }

    #[test]
    fn substrings() {
        assert!(is_match("aa", "baaaa"));
        assert!(!is_match("baaaa", "aa"));
        assert!(is_match("ba", "baaaa"));
        assert!(is_match("aaax", "baaaax"));
    }

    #[test]
    fn tokens_in_any_order() {
        assert!(is_match("bo tom", "bottom"));
        assert!(is_match("tom bo", "bottom"));
        assert!(is_match("b t m", "bottom"));
        assert!(!is_match("b t m", "botto"));
        assert!(is_match("b t", "botto"));
        assert!(!is_match("b t", "bobo"));
        assert!(is_match("bo  tom", "bottom"));
    }

    #[test]
    fn case_insensitive() {
        assert!(is_match("heLLo", "HELLo"));
        assert!(is_match("HELLO", "hello"));
        assert!(is_match("hello", "HELLO"));
    }

    #[test]
    fn unicode_normalization_and_case() {
        assert!(is_match(CET_ETE, CET_ETE));
        assert!(is_match("\u{e9}t\u{e9}", CET_ETE));
        assert!(is_match(ETE_DECOMPOSED, CET_ETE));
        assert!(is_match(CET_ETE, CET_ETE_UPPER));
        assert!(is_match(TI_EINAI_AYTO, TI_EINAI_AYTO_UPPER));
        assert!(!is_match("ete", CET_ETE));
    }

    #[test]
    fn full_case_folding() {
        assert!(is_match("stra\u{df}e", "STRASSE"));
        assert!(is_match("STRASSE", "Stra\u{df}e"));
        assert!(is_match("\u{3c3}", "\u{3c2}"));
        assert!(is_match("\u{3a3}\u{39f}\u{3a6}\u{39f}\u{3a3}", "\u{3c3}\u{3bf}\u{3c6}\u{3bf}\u{3c2}"));
    }

    #[test]
    fn highlight_where_folding_grows_the_text() {
        let h = highlight("ss", "Stra\u{df}e").unwrap();
        assert_eq!(h.ranges(), vec![4..6]);
        assert_eq!(&h.text()[4..6], "\u{df}");
        assert_eq!(mask_of("strasse", "Stra\u{df}e").unwrap(), "111111");
        assert_eq!(markup("e", "Stra\u{df}e", "[", "]"), "Stra\u{df}[e]");
    }

    #[test]
    fn highlight_exact() {
        assert_eq!(mask_of("bottom", "bobo"), None);
        assert_eq!(mask_of("bottom", "bottom").as_deref(), Some("111111"));
        assert_eq!(mask_of("a b c", "A B C").unwrap(), "1 1 1");
        assert!(highlight("a b c", "a b c").unwrap().mask().iter().all(|&b| b));
    }

    #[test]
    fn highlight_substring() {
        assert_eq!(mask_of("bottom", "soggy bottom boys").unwrap(), "00000 111111 0000");
        assert_eq!(mask_of("sogg", "soggy bottom boys").unwrap(), "11110 000000 0000");
    }

    #[test]
    fn highlight_multiple_tokens() {
        assert_eq!(mask_of("bottom soggy", "soggy bottom boys").unwrap(), "11111 111111 0000");
        assert_eq!(mask_of("ogg boy", "soggy bottom boys").unwrap(), "01110 000000 1110");
        assert_eq!(mask_of("ogg boat", "soggy bottom boys"), None);
    }

    #[test]
    fn highlight_overlapping_tokens() {
        assert_eq!(mask_of("ogg sog", "soggy bottom boys").unwrap(), "11110 000000 0000");
    }

    #[test]
    fn highlight_case_insensitive() {
        assert_eq!(mask_of("soggy", "Soggy Bottom Boys").unwrap(), "11111 000000 0000");
        assert_eq!(mask_of("BOTTOM", "Soggy Bottom Boys").unwrap(), "00000 111111 0000");
    }

    #[test]
    fn highlight_multibyte() {
        assert_eq!(mask_of("t", CET_ETE_UPPER).unwrap(), "001 000");
        assert_eq!(mask_of("\u{e9}t\u{e9}", CET_ETE_UPPER).unwrap(), "000 111");
        assert_eq!(mask_of("\u{3b1}\u{3c5}\u{3c4}\u{3cc}", TI_EINAI_AYTO_UPPER).unwrap(), "00 00000 1111");

        let h = highlight("\u{e9}", "caf\u{e9}").unwrap();
        assert_eq!(h.ranges(), vec![3..5]);
    }

    #[test]
    fn highlight_of_decomposed_candidate_uses_composed_text() {
        let h = highlight("t\u{e9}", ETE_DECOMPOSED).unwrap();
        assert_eq!(h.text(), "\u{e9}t\u{e9}");
        assert_eq!(h.ranges(), vec![2..5]);
    }

    #[test]
    fn ranges_merge_adjacent_bytes() {
        let h = highlight("lo wor", "hello, world").unwrap();
        assert_eq!(h.ranges(), vec![3..5, 7..10]);
    }

    #[test]
    fn markup_wraps_runs() {
        assert_eq!(markup("hello", "hello", "<b>", "</b>"), "<b>hello</b>");
        assert_eq!(markup("ll", "hello", "<b>", "</b>"), "he<b>ll</b>o");
        assert_eq!(markup("lo wor", "hello, world", "[", "]"), "hel[lo], [wor]ld");
        assert_eq!(markup("low wor", "helloworld", "[", "]"), "hel[lowor]ld");
        assert_eq!(markup("<a>", "<he<a>toto>", "[", "]"), "&lt;he[&lt;a&gt;]toto&gt;");
        assert_eq!(markup("zz", "a&b", "[", "]"), "a&amp;b");
    }
}
