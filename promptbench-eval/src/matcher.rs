//! Label matching policies.
//!
//! Decides whether a model answer counts as the expected label. Both sides
//! are trimmed and lower-cased before any comparison.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Minimum similarity for a `fuzzy` match.
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// How a predicted label is compared to the expected one.
///
/// Parsing never fails: an unknown name becomes [`MatchMethod::Unrecognized`],
/// which matches nothing.
///
/// # Example
///
/// ```
/// use promptbench_eval::MatchMethod;
///
/// let method: MatchMethod = "contains".parse().unwrap();
/// assert!(method.matches("rock", "Classic Rock"));
///
/// let typo: MatchMethod = "containz".parse().unwrap();
/// assert!(!typo.matches("rock", "rock"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchMethod {
    /// Normalized strings are equal
    Exact,
    /// Either normalized string contains the other
    #[default]
    Contains,
    /// Character similarity of at least [`FUZZY_THRESHOLD`]
    Fuzzy,
    /// Any other name; never matches
    Unrecognized(String),
}

impl MatchMethod {
    pub fn as_str(&self) -> &str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Contains => "contains",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MatchMethod::Unrecognized(_))
    }

    /// Shorthand for [`matches`] with this method.
    pub fn matches(&self, expected: &str, predicted: &str) -> bool {
        matches(expected, predicted, self)
    }
}

impl FromStr for MatchMethod {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "exact" => MatchMethod::Exact,
            "contains" => MatchMethod::Contains,
            "fuzzy" => MatchMethod::Fuzzy,
            _ => MatchMethod::Unrecognized(s.to_string()),
        })
    }
}

impl From<String> for MatchMethod {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(method) => method,
            Err(never) => match never {},
        }
    }
}

impl From<MatchMethod> for String {
    fn from(method: MatchMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Whether `predicted` counts as `expected` under `method`.
///
/// Pure and total: an unrecognized method returns `false`.
pub fn matches(expected: &str, predicted: &str, method: &MatchMethod) -> bool {
    let expected = normalize(expected);
    let predicted = normalize(predicted);

    match method {
        MatchMethod::Exact => expected == predicted,
        MatchMethod::Contains => expected.contains(&predicted) || predicted.contains(&expected),
        MatchMethod::Fuzzy => char_ratio(&expected, &predicted) >= FUZZY_THRESHOLD,
        MatchMethod::Unrecognized(_) => false,
    }
}

/// Case-insensitive character similarity in `[0.0, 1.0]`.
///
/// `2 * M / T`, where `T` is the total character count and `M` the number of
/// characters in matching blocks. Blocks are found by taking the longest
/// common run (earliest on ties) and repeating on the text to either side of
/// it. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    char_ratio(&normalize(a), &normalize(b))
}

fn char_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matched = BlockMatcher::new(&a, &b).matched_len();
    2.0 * matched as f64 / total as f64
}

/// Second sequences at least this long drop their most frequent characters
/// from the candidate index.
const POPULAR_MIN_LEN: usize = 200;

/// Longest-common-block matcher over two character slices.
struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character in `b`, ascending.
    b_positions: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b_positions: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b_positions.entry(c).or_default().push(j);
        }

        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b_positions.retain(|_, positions| positions.len() <= limit);
        }

        Self { a, b, b_positions }
    }

    /// Longest block `(i, j, size)` with `a[i..i+size] == b[j..j+size]` inside
    /// the given ranges; the smallest `i`, then smallest `j`, wins a tie.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // Length of the run ending at (i - 1, j), keyed by j.
        let mut run_len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next_run_len = HashMap::new();
            if let Some(positions) = self.b_positions.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|prev| run_len.get(&prev))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next_run_len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            run_len = next_run_len;
        }

        // Popular characters are not indexed; grow the block over them.
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

    /// Total size of all matching blocks.
    fn matched_len(&self) -> usize {
        let mut matched = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];

        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, size) = self.longest_match(alo, ahi, blo, bhi);
            if size == 0 {
                continue;
            }
            matched += size;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + size < ahi && j + size < bhi {
                pending.push((i + size, ahi, j + size, bhi));
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::exact("exact", MatchMethod::Exact)]
    #[case::contains("contains", MatchMethod::Contains)]
    #[case::fuzzy("fuzzy", MatchMethod::Fuzzy)]
    #[case::uppercase(" Fuzzy ", MatchMethod::Fuzzy)]
    #[case::unknown("regex", MatchMethod::Unrecognized("regex".into()))]
    fn test_parse(#[case] input: &str, #[case] expected: MatchMethod) {
        assert_eq!(input.parse::<MatchMethod>().unwrap(), expected);
    }

    #[test]
    fn test_default_is_contains() {
        assert_eq!(MatchMethod::default(), MatchMethod::Contains);
    }

    #[rstest]
    #[case::same("rock", "rock", true)]
    #[case::case_and_space("Rock ", " rock", true)]
    #[case::different("rock", "pop", false)]
    #[case::substring("rock", "rock music", false)]
    fn test_exact(#[case] expected: &str, #[case] predicted: &str, #[case] result: bool) {
        assert_eq!(matches(expected, predicted, &MatchMethod::Exact), result);
    }

    #[rstest]
    #[case::predicted_contains_expected("rock", "Classic Rock", true)]
    #[case::expected_contains_predicted("hip hop", "Hop", true)]
    #[case::disjoint("rock", "country", false)]
    #[case::empty_prediction("rock", "", true)]
    fn test_contains(#[case] expected: &str, #[case] predicted: &str, #[case] result: bool) {
        assert_eq!(matches(expected, predicted, &MatchMethod::Contains), result);
    }

    #[rstest]
    #[case::identical("rock", "rock", true)]
    #[case::case_only("ROCK", "rock", true)]
    #[case::typo("country", "countyr", true)]
    #[case::unrelated("rock", "jazz", false)]
    #[case::longer_answer("pop", "pop music", false)]
    #[case::greedy_block_not_best_alignment("babaaa", "baaaa", false)]
    fn test_fuzzy(#[case] expected: &str, #[case] predicted: &str, #[case] result: bool) {
        assert_eq!(matches(expected, predicted, &MatchMethod::Fuzzy), result);
    }

    #[test]
    fn test_unrecognized_never_matches() {
        let method = MatchMethod::Unrecognized("regex".into());
        assert!(!matches("rock", "rock", &method));
        assert!(!method.is_recognized());
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("Rock", "rock"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("", "rock"), 0.0);

        let ab = similarity("hip hop", "hiphop");
        let ba = similarity("hiphop", "hip hop");
        assert!((ab - ba).abs() < 1e-6);
        assert!(ab > 0.9 && ab < 1.0);
    }

    #[rstest]
    // "baaa" is the longest block; nothing is left to its left in "baaaa".
    #[case::longest_block_first("babaaa", "baaaa", 8.0 / 11.0)]
    #[case::blocks_on_both_sides("country", "countyr", 12.0 / 14.0)]
    #[case::split_word("hip hop", "hiphop", 12.0 / 13.0)]
    #[case::earliest_tie("abxcd", "abcd", 8.0 / 9.0)]
    fn test_similarity_ratio(#[case] a: &str, #[case] b: &str, #[case] expected: f64) {
        assert!((similarity(a, b) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_popular_characters_still_extend_blocks() {
        let a = "a".repeat(250);
        let b = "a".repeat(250);
        assert_eq!(similarity(&a, &b), 1.0);

        let shorter = "a".repeat(200);
        assert!((similarity(&shorter, &b) - 400.0 / 450.0).abs() < 1e-9);
    }

    #[test]
    fn test_serde_uses_name() {
        let json = serde_json::to_string(&MatchMethod::Fuzzy).unwrap();
        assert_eq!(json, r#""fuzzy""#);

        let parsed: MatchMethod = serde_json::from_str(r#""EXACT""#).unwrap();
        assert_eq!(parsed, MatchMethod::Exact);

        let unknown: MatchMethod = serde_json::from_str(r#""nope""#).unwrap();
        assert_eq!(unknown.to_string(), "nope");
    }
}
