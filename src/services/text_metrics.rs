//! Text similarity metrics used to compare failure output.
//!
//! - Normalized Levenshtein ratio over Unicode scalar values
//! - TF-IDF cosine ratio over the two compared documents
//! - Ratcliff/Obershelp sequence-matcher ratio over characters
//! - Stack trace line normalisation and line splitting

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static LINE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":\d+").expect("valid regex"));
static PATH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-zA-Z]:)?\\|/").expect("valid regex"));
static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[0-9a-fA-F]+").expect("valid regex"));
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

/// Edit distance between `a` and `b` counted in characters.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `1 - distance / max(len)`; two empty strings are identical.
pub fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / longest as f64
}

fn term_counts(document: &str) -> HashMap<&str, f64> {
    let mut counts = HashMap::new();
    for token in TOKEN.find_iter(document) {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    counts
}

/// Cosine similarity of the TF-IDF vectors of two lower-cased documents.
///
/// Tokens are runs of two or more word characters. The idf is smoothed,
/// `ln((1 + n) / (1 + df)) + 1`, and vectors are L2-normalised.
pub fn tfidf_cosine_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let tf_a = term_counts(&a);
    let tf_b = term_counts(&b);

    if tf_a.is_empty() && tf_b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    if tf_a.is_empty() || tf_b.is_empty() {
        return 0.0;
    }

    let documents = 2.0_f64;
    let idf = |term: &str| {
        let df = f64::from(u8::from(tf_a.contains_key(term)) + u8::from(tf_b.contains_key(term)));
        ((1.0 + documents) / (1.0 + df)).ln() + 1.0
    };

    let weigh = |counts: &HashMap<&str, f64>| -> HashMap<String, f64> {
        let mut weights: HashMap<String, f64> = counts
            .iter()
            .map(|(term, tf)| ((*term).to_string(), tf * idf(*term)))
            .collect();
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in weights.values_mut() {
                *weight /= norm;
            }
        }
        weights
    };

    let weights_a = weigh(&tf_a);
    let weights_b = weigh(&tf_b);
    weights_a
        .iter()
        .filter_map(|(term, wa)| weights_b.get(term).map(|wb| wa * wb))
        .sum::<f64>()
        .clamp(-1.0, 1.0)
}

/// TF-IDF cosine similarity rescaled from `[-1, 1]` to `[0, 1]`.
pub fn cosine_ratio(a: &str, b: &str) -> f64 {
    (tfidf_cosine_similarity(a, b) + 1.0) / 2.0
}

/// Ratcliff/Obershelp matcher over two character sequences.
///
/// Finds the longest matching block, then recurses on the pieces to its left and
/// right. Characters that make up more than 1% of a second sequence of at least 200
/// characters are not used as match anchors.
struct SequenceMatcher {
    a: Vec<char>,
    b: Vec<char>,
    b2j: HashMap<char, Vec<usize>>,
}

impl SequenceMatcher {
    const AUTOJUNK_MIN_LEN: usize = 200;

    fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        if b.len() >= Self::AUTOJUNK_MIN_LEN {
            let popular = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= popular);
        }

        Self { a, b, b2j }
    }

    fn find_longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut new_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                    new_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = new_j2len;
        }

        // Extend over characters that were excluded as anchors.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    fn matched_characters(&self) -> usize {
        let mut matched = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.find_longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        matched
    }

    fn ratio(&self) -> f64 {
        let total = self.a.len() + self.b.len();
        if total == 0 {
            return 1.0;
        }
        2.0 * self.matched_characters() as f64 / total as f64
    }
}

/// Gestalt similarity `2 * matches / total_length` of two strings.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    SequenceMatcher::new(a, b).ratio()
}

/// Mask the parts of a stack trace line that drift between otherwise identical runs.
///
/// Line numbers become `:X`, path separators become `/` and hex addresses become
/// `0xADDR`.
pub fn normalize_stacktrace_line(line: &str) -> String {
    let line = LINE_NUMBER.replace_all(line, ":X");
    let line = PATH_SEPARATOR.replace_all(&line, "/");
    HEX_ADDRESS.replace_all(&line, "0xADDR").into_owned()
}

/// Split on `\n`, `\r\n` or `\r`. A trailing terminator does not yield an empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
        assert_eq!(levenshtein_distance("żółw", "zolw"), 3);
    }

    #[test]
    fn test_levenshtein_ratio() {
        assert!((levenshtein_ratio("kitten", "sitting") - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
        assert!((levenshtein_ratio("abc", "abc") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cosine_identical_documents() {
        let text = "java.lang.NullPointerException at MyClass";
        assert!((tfidf_cosine_similarity(text, text) - 1.0).abs() < 1e-9);
        assert!((cosine_ratio(text, &text.to_uppercase()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_disjoint_documents() {
        assert!(tfidf_cosine_similarity("alpha beta", "gamma delta").abs() < 1e-9);
        assert!((cosine_ratio("alpha beta", "gamma delta") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_partial_overlap() {
        // shared term idf 1, unique terms idf ln(1.5) + 1
        let unique = (1.5_f64).ln() + 1.0;
        let expected = 1.0 / (1.0 + unique * unique);
        let cos = tfidf_cosine_similarity("shared left", "shared right");
        assert!((cos - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_without_tokens() {
        // single characters are not tokens
        assert!((tfidf_cosine_similarity("a b", "a b") - 1.0).abs() < 1e-9);
        assert!(tfidf_cosine_similarity("a b", "c d").abs() < 1e-9);
        assert!(tfidf_cosine_similarity("a b", "word").abs() < 1e-9);
    }

    #[test]
    fn test_sequence_ratio() {
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert!((sequence_ratio("", "") - 1.0).abs() < f64::EPSILON);
        assert!(sequence_ratio("abc", "").abs() < f64::EPSILON);
        assert!((sequence_ratio("same text", "same text") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sequence_ratio_long_repetitive_input() {
        // popular characters are excluded as anchors but still matched by extension
        let a = "x".repeat(300);
        assert!((sequence_ratio(&a, &a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_stacktrace_line() {
        assert_eq!(
            normalize_stacktrace_line("at com.example.MyClass.methodA(MyClass.java:15)"),
            "at com.example.MyClass.methodA(MyClass.java:X)"
        );
        assert_eq!(
            normalize_stacktrace_line(r"C:\work\src\main.rs"),
            "/work/src/main.rs"
        );
        assert_eq!(
            normalize_stacktrace_line("segfault at 0x7ffd5e8c"),
            "segfault at 0xADDR"
        );
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("\nfoo\n"), vec!["", "foo"]);
        assert!(split_lines("").is_empty());
    }
}
