//! On-page SEO scoring for posts and product copy.
//!
//! A report is a list of pass/fail checks; the score is the share of checks
//! passed and maps onto one of five grades.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("invalid tag regex"));
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("invalid word regex"));
static MD_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{2,6}\s+\S").expect("invalid heading regex"));
static HTML_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<h[2-6][\s>]").expect("invalid html heading regex"));
static MD_MARKS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+|[*_`>]").expect("invalid markdown regex"));

pub const TITLE_RANGE: (usize, usize) = (30, 60);
pub const META_RANGE: (usize, usize) = (120, 160);
pub const DENSITY_RANGE: (f64, f64) = (0.5, 2.5);
pub const MIN_WORDS: usize = 300;
const META_SUGGESTION_LEN: usize = 155;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SeoInput {
    pub title: String,
    #[serde(default)]
    pub meta_description: Option<String>,
    pub body: String,
    #[serde(default)]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl Grade {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Grade::Excellent,
            75..=89 => Grade::Good,
            50..=74 => Grade::Fair,
            25..=49 => Grade::Poor,
            _ => Grade::Critical,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SeoCheck {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SeoReport {
    pub word_count: usize,
    pub keyword_count: usize,
    pub keyword_density: f64,
    pub score: u8,
    pub grade: Grade,
    pub checks: Vec<SeoCheck>,
    pub suggested_slug: String,
    pub suggested_meta_description: String,
}

fn check(name: &'static str, passed: bool, message: impl Into<String>) -> SeoCheck {
    SeoCheck { name, passed, message: message.into() }
}

/// Remove HTML tags and markdown emphasis, collapsing whitespace.
pub fn strip_markup(text: &str) -> String {
    let no_tags = TAG_RE.replace_all(text, " ");
    let no_marks = MD_MARKS_RE.replace_all(&no_tags, " ");
    no_marks.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn words(text: &str) -> Vec<String> {
    WORD_RE.find_iter(text).map(|m| m.as_str().to_lowercase()).collect()
}

/// Whole-phrase, case-insensitive occurrences of `keyword` in `text`.
pub fn count_phrase(text: &str, keyword: &str) -> usize {
    let needle = words(keyword);
    if needle.is_empty() {
        return 0;
    }
    let hay = words(&strip_markup(text));
    hay.windows(needle.len()).filter(|w| *w == needle.as_slice()).count()
}

/// Lowercase ASCII slug: runs of non-alphanumerics collapse into one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Plain-text summary of `body` that fits a meta description, cut at a word boundary.
pub fn suggest_meta_description(body: &str) -> String {
    let plain = strip_markup(body);
    if plain.chars().count() <= META_SUGGESTION_LEN {
        return plain;
    }
    let mut out = String::new();
    for word in plain.split(' ') {
        let next_len = out.chars().count() + word.chars().count() + usize::from(!out.is_empty());
        if next_len > META_SUGGESTION_LEN - 1 {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out.push('…');
    out
}

fn first_paragraph(body: &str) -> &str {
    body.split("\n\n")
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.starts_with('#') && !p.to_ascii_lowercase().starts_with("<h"))
        .unwrap_or("")
}

fn length_check(name: &'static str, label: &str, len: usize, (min, max): (usize, usize)) -> SeoCheck {
    if len < min {
        check(name, false, format!("{label} is {len} characters; aim for at least {min}"))
    } else if len > max {
        check(name, false, format!("{label} is {len} characters; keep it under {max}"))
    } else {
        check(name, true, format!("{label} length is good ({len})"))
    }
}

pub fn analyze(input: &SeoInput) -> SeoReport {
    let title = input.title.trim();
    let meta = input.meta_description.as_deref().map(str::trim).unwrap_or("");
    let keyword = input.focus_keyword.as_deref().map(str::trim).filter(|k| !k.is_empty());

    let word_count = words(&strip_markup(&input.body)).len();
    let keyword_count = keyword.map_or(0, |k| count_phrase(&input.body, k));
    let keyword_density = match keyword {
        Some(k) if word_count > 0 => {
            let phrase_len = words(k).len().max(1);
            ((keyword_count * phrase_len) as f64 / word_count as f64 * 10_000.0).round() / 100.0
        }
        _ => 0.0,
    };

    let mut checks = vec![
        length_check("title_length", "Title", title.chars().count(), TITLE_RANGE),
        length_check("meta_description_length", "Meta description", meta.chars().count(), META_RANGE),
    ];

    match keyword {
        Some(k) => {
            let in_title = count_phrase(title, k) > 0;
            checks.push(check("keyword_in_title", in_title, if in_title { "Focus keyword appears in the title" } else { "Add the focus keyword to the title" }));
            let in_meta = count_phrase(meta, k) > 0;
            checks.push(check("keyword_in_meta_description", in_meta, if in_meta { "Focus keyword appears in the meta description" } else { "Add the focus keyword to the meta description" }));
            let in_intro = count_phrase(first_paragraph(&input.body), k) > 0;
            checks.push(check("keyword_in_introduction", in_intro, if in_intro { "Focus keyword appears in the first paragraph" } else { "Use the focus keyword in the first paragraph" }));
            let (lo, hi) = DENSITY_RANGE;
            let density_ok = (lo..=hi).contains(&keyword_density);
            checks.push(check(
                "keyword_density",
                density_ok,
                format!("Keyword density is {keyword_density}% (target {lo}%–{hi}%)"),
            ));
            let slug = input.slug.clone().unwrap_or_else(|| slugify(title));
            let keyword_slug = slugify(k);
            if keyword_slug.is_empty() {
                checks.push(check("keyword_in_slug", false, "Focus keyword has no letters or digits a slug can carry"));
            } else {
                let in_slug = slug.contains(&keyword_slug);
                checks.push(check("keyword_in_slug", in_slug, if in_slug { "Slug contains the focus keyword" } else { "Put the focus keyword in the slug" }));
            }
        }
        None => {
            for name in ["keyword_in_title", "keyword_in_meta_description", "keyword_in_introduction", "keyword_density", "keyword_in_slug"] {
                checks.push(check(name, false, "Set a focus keyword"));
            }
        }
    }

    let has_subheadings = MD_HEADING_RE.is_match(&input.body) || HTML_HEADING_RE.is_match(&input.body);
    checks.push(check(
        "subheadings",
        has_subheadings,
        if has_subheadings { "Content uses subheadings" } else { "Break the content up with subheadings" },
    ));
    checks.push(check(
        "word_count",
        word_count >= MIN_WORDS,
        format!("{word_count} words (minimum {MIN_WORDS})"),
    ));

    let passed = checks.iter().filter(|c| c.passed).count();
    let score = ((passed as f64 / checks.len() as f64) * 100.0).round() as u8;

    SeoReport {
        word_count,
        keyword_count,
        keyword_density,
        score,
        grade: Grade::from_score(score),
        checks,
        suggested_slug: slugify(title),
        suggested_meta_description: suggest_meta_description(&input.body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_body(keyword_every: usize) -> String {
        let mut body = String::from("Cold brew coffee is smooth and sweet.\n\n## Why it works\n\n");
        for i in 0..320 {
            if i % keyword_every == 0 {
                body.push_str("cold brew ");
            } else {
                body.push_str("water ");
            }
        }
        body
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Hello, World -- 2024! "), "hello-world-2024");
        assert_eq!(slugify("Crème brûlée"), "cr-me-br-l-e");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn phrase_counting_is_whole_word_and_case_insensitive() {
        assert_eq!(count_phrase("Cold Brew, cold brewing and <b>cold</b> brew", "cold brew"), 2);
        assert_eq!(count_phrase("anything", "  "), 0);
    }

    #[test]
    fn meta_suggestion_cuts_at_word_boundary() {
        let body = "word ".repeat(100);
        let meta = suggest_meta_description(&body);
        assert!(meta.chars().count() <= 155);
        assert!(meta.ends_with("word…"));
        assert_eq!(suggest_meta_description("<p>Short *text*</p>"), "Short text");
    }

    #[test]
    fn well_optimised_post_scores_excellent() {
        let report = analyze(&SeoInput {
            title: "Cold brew at home: a complete beginner guide".into(),
            meta_description: Some(
                "Learn how to make cold brew at home with simple tools, the right grind and a patient overnight steep for a smooth, sweet and low-acid coffee."
                    .into(),
            ),
            body: long_body(160),
            focus_keyword: Some("cold brew".into()),
            slug: None,
        });
        assert!(report.word_count >= 300);
        assert!(report.checks.iter().all(|c| c.passed), "{:?}", report.checks);
        assert_eq!(report.score, 100);
        assert_eq!(report.grade, Grade::Excellent);
        assert_eq!(report.suggested_slug, "cold-brew-at-home-a-complete-beginner-guide");
    }

    #[test]
    fn keyword_stuffing_fails_density() {
        let report = analyze(&SeoInput {
            title: "Cold brew".into(),
            body: long_body(2),
            focus_keyword: Some("cold brew".into()),
            ..Default::default()
        });
        let density = report.checks.iter().find(|c| c.name == "keyword_density").unwrap();
        assert!(!density.passed);
        assert!(report.keyword_density > 2.5);
    }

    #[test]
    fn missing_keyword_and_short_copy_is_critical() {
        let report = analyze(&SeoInput { title: "Hi".into(), body: "Too short.".into(), ..Default::default() });
        assert_eq!(report.score, 0);
        assert_eq!(report.grade, Grade::Critical);
        assert_eq!(report.checks.len(), 9);
    }

    #[test]
    fn grades_bucket_scores() {
        assert_eq!(Grade::from_score(100), Grade::Excellent);
        assert_eq!(Grade::from_score(80), Grade::Good);
        assert_eq!(Grade::from_score(50), Grade::Fair);
        assert_eq!(Grade::from_score(30), Grade::Poor);
        assert_eq!(Grade::from_score(10), Grade::Critical);
    }

    #[test]
    fn non_ascii_keyword_never_matches_slug() {
        let input = SeoInput {
            title: "日本茶 guide".into(),
            body: "日本茶 is lovely.".into(),
            focus_keyword: Some("日本茶".into()),
            slug: Some("guide".into()),
            ..Default::default()
        };
        let report = analyze(&input);
        let slug_check = report.checks.iter().find(|c| c.name == "keyword_in_slug").unwrap();
        assert!(!slug_check.passed);
        assert!(slug_check.message.contains("no letters or digits"));
    }
}
