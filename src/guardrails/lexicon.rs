//! Lexical classifier used by the guardrails and the scorer.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

// The patterns are literals known to compile; a `None` only disables the
// matcher it belongs to.
static WORD_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\p{L}[\p{L}\p{N}_']*").ok());
static SYMBOL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[+\-*/=<>≤≥∑∫∏√∆∇∂^π%]").ok());
static NUMBER_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").ok());
static BRACE_SLOT_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\{\s*[a-z][a-z_]{2,}\s*\}").ok());
static MARKER_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)<[a-z][a-z_]{2,}>|\[\s*(?:insert|todo|tbd|placeholder)[^\]]*\]").ok()
});

fn words(text: &str) -> impl Iterator<Item = &str> {
    WORD_RE
        .as_ref()
        .into_iter()
        .flat_map(move |re| re.find_iter(text).map(|m| m.as_str()))
}

fn count_matches(re: &LazyLock<Option<Regex>>, text: &str) -> usize {
    re.as_ref().map_or(0, |re| re.find_iter(text).count())
}

/// Vocabulary matched as word prefixes.
const MATH_STEMS: &[&str] = &[
    "algebra", "angle", "arithmetic", "calcul", "circle", "circumference", "coefficient",
    "combination", "coordinate", "cylinder", "degree", "denominator", "deriv", "determinant",
    "diameter", "differentia", "dimension", "distance", "eigen", "ellipse", "equation",
    "exponent", "factor", "formula", "fraction", "function", "geometr", "gradient", "graph",
    "height", "hypotenuse", "inequalit", "integer", "integr", "length", "limit", "linear",
    "logarithm", "math", "matri", "median", "numerator", "optimi", "parabola", "percent",
    "perimeter", "permutation", "perpendicular", "plane", "polygon", "polynomial", "prime",
    "probabilit", "proof", "prove", "pyramid", "quadratic", "radian", "radius", "rectangle",
    "sector", "segment", "sequence", "series", "simplif", "slope", "solv", "sphere", "square",
    "statistic", "surface", "tangent", "theorem", "triangle", "trigonometr", "variable",
    "variance", "vector", "volume", "width",
];

/// Vocabulary matched as whole words only.
const MATH_WORDS: &[&str] = &[
    "arc", "area", "axis", "cone", "cos", "cube", "exp", "find", "line", "ln", "log", "mean",
    "mod", "pi", "point", "root", "shape", "sin", "solid", "sum", "tan",
];

/// Disallowed content categories.
const PROHIBITED: &[&str] = &[
    "illegal",
    "harmful",
    "violence",
    "hate",
    "discrimination",
    "personal information",
    "private data",
    "password",
    "credit card",
];

/// Terms ignored when comparing evidence snippets.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "has", "had", "her",
    "was", "one", "our", "out", "his", "how", "its", "who", "did", "get", "may", "use", "this",
    "that", "with", "from", "have", "they", "will", "what", "when", "where", "which", "there",
    "their", "then", "than", "them", "into", "also", "each", "such", "some", "these", "those",
    "been", "being", "were", "would", "could", "should", "about", "over", "only", "other",
];

fn is_math_word(word: &str) -> bool {
    MATH_WORDS.contains(&word) || MATH_STEMS.iter().any(|stem| word.starts_with(stem))
}

/// Lexical math relevance in `[0, 1]`.
///
/// Each distinct math word adds 0.2 (capped at 1.0), each operator or
/// symbol 0.1 (capped at 0.5), each number 0.05 (capped at 0.3).
pub fn math_relevance(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let keywords: BTreeSet<&str> = words(&lower).filter(|w| is_math_word(w)).collect();
    let symbols = count_matches(&SYMBOL_RE, text);
    let numbers = count_matches(&NUMBER_RE, text);

    let keyword_score = (count_f64(keywords.len()) * 0.2).min(1.0);
    let symbol_score = (count_f64(symbols) * 0.1).min(0.5);
    let number_score = (count_f64(numbers) * 0.05).min(0.3);

    (keyword_score + symbol_score + number_score).min(1.0)
}

/// The first disallowed term found in the text, if any.
///
/// Terms match whole words (a trailing plural `s` allowed), and multi-word
/// terms match consecutive words, so "whatever" does not contain "hate".
pub fn prohibited_term(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let joined = format!(" {} ", words(&lower).collect::<Vec<_>>().join(" "));
    PROHIBITED.iter().copied().find(|term| {
        joined.contains(&format!(" {term} ")) || joined.contains(&format!(" {term}s "))
    })
}

/// True if a `{...}` group starting right after `before` is a LaTeX
/// argument: it follows a `\command`, a sub/superscript or another group.
fn is_latex_argument(before: &str) -> bool {
    let before = before.trim_end();
    if before.ends_with(['}', ']', '^', '_']) {
        return true;
    }
    let stem = before.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '*');
    stem.len() < before.len() && stem.ends_with('\\')
}

fn has_brace_slot(text: &str) -> bool {
    BRACE_SLOT_RE
        .as_ref()
        .is_some_and(|re| re.find_iter(text).any(|m| !is_latex_argument(&text[..m.start()])))
}

/// Returns true if the text contains an unresolved template placeholder
/// or is one of the generator's filler phrases.
pub fn contains_placeholder(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    matches!(
        trimmed.as_str(),
        "n/a"
            | "tbd"
            | "todo"
            | "..."
            | "answer provided in solution."
            | "detailed explanation provided in steps."
    ) || has_brace_slot(text)
        || MARKER_RE.as_ref().is_some_and(|re| re.is_match(text))
}

/// Distinct lowercase content terms (three letters or more, no stopwords).
pub fn key_terms(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    words(&lower)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
const fn count_f64(n: usize) -> f64 {
    n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_relevance_components() {
        assert!(math_relevance("hello there").abs() < f64::EPSILON);
        // derivative + ^ + 2
        assert!((math_relevance("What is the derivative of x^2?") - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_math_relevance_caps() {
        let text = "+ + + + + + + + + +";
        assert!((math_relevance(text) - 0.5).abs() < 1e-9);
        let text = "1 2 3 4 5 6 7 8 9 10 11 12";
        assert!((math_relevance(text) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_whole_words_do_not_match_prefixes() {
        assert!(math_relevance("pizza").abs() < f64::EPSILON);
        assert!(math_relevance("pi").abs() > 0.0);
    }

    #[test]
    fn test_prohibited_term() {
        assert_eq!(prohibited_term("My PASSWORD is x"), Some("password"));
        assert_eq!(prohibited_term("integrate x"), None);
        assert_eq!(prohibited_term("Enter your credit\ncard"), Some("credit card"));
        assert_eq!(prohibited_term("Share all passwords"), Some("password"));
    }

    #[test]
    fn test_prohibited_terms_inside_other_words_are_ignored() {
        assert_eq!(prohibited_term("For whatever x, solve 2x + 4 = 10"), None);
        assert_eq!(prohibited_term("The chateau garden is a 20 m square"), None);
        assert_eq!(prohibited_term("A credited cardinal number"), None);
        assert_eq!(prohibited_term("I hate fractions"), Some("hate"));
    }

    #[test]
    fn test_key_terms_drop_stopwords_and_short_words() {
        let terms = key_terms("The power rule: d/dx of x^n is n x^(n-1) for all n");
        assert!(terms.contains("power"));
        assert!(terms.contains("rule"));
        assert!(!terms.contains("the"));
        assert!(!terms.contains("all"));
        assert!(!terms.contains("of"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(contains_placeholder("{final_answer}"));
        assert!(contains_placeholder("{{ explanation }}"));
        assert!(contains_placeholder("N/A"));
        assert!(!contains_placeholder("x in {1, 2}"));
        assert!(!contains_placeholder("when x < 4 and y > 3"));
        assert!(!contains_placeholder("since a<b and b>c"));
    }

    #[test]
    fn test_latex_arguments_are_not_placeholders() {
        assert!(!contains_placeholder(r"Here $\text{Area} = \pi r^2$ with $r = 4$."));
        assert!(!contains_placeholder(r"$\sqrt{abc}$ and $\text{and}$"));
        assert!(!contains_placeholder(r"$\frac{num}{den}$"));
        assert!(!contains_placeholder(r"$e^{rate}$ and $x_{max}$"));
        assert!(!contains_placeholder(r"$\operatorname*{argmax}$"));
        assert!(contains_placeholder(r"$\text{Area} = {area_value}$"));
        assert!(contains_placeholder("The answer is {{answer}}"));
    }
}
