//! Sheet-title sanitisation: the text grammar every bookmark title obeys.
//!
//! The vision model is *asked* to apply these rules, but models drift
//! (ALL-CAPS titles copied straight from the title block are the usual
//! offender), so the pipeline can re-apply them itself. The function is pure
//! and idempotent, which is what makes re-applying it to already-clean titles
//! safe.
//!
//! ## Rules
//!
//! 1. `-` is the only symbol kept.
//! 2. `/` and `\` become `-`; Unicode dashes are folded to `-`.
//! 3. `&` becomes the word `and`.
//! 4. `,` `.` `#`, brackets/parentheses/braces, quotes and every other
//!    symbol are deleted; enclosed text is kept.
//! 5. Whitespace is collapsed to single spaces.
//! 6. The result is always re-cased to Title Case, never left in ALL CAPS.
//!    Minor words (`and`, `of`, …) stay lower-case unless first or last,
//!    ordinals become `3rd`, and other tokens containing digits (`D8`, `T1`)
//!    are identifiers and keep their case.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(\d+)(st|nd|rd|th)$").unwrap());

/// Words kept lower-case inside a title.
const MINOR_WORDS: &[&str] = &[
    "and", "or", "nor", "of", "the", "an", "for", "to", "in", "on", "at", "by", "with", "per",
    "vs",
];

/// Normalise a raw sheet title.
///
/// ```
/// use sheetmark::sanitize::sanitize_title;
///
/// assert_eq!(
///     sanitize_title("Grading and SESC Plan (1 of 6)"),
///     "Grading and Sesc Plan 1 of 6"
/// );
/// ```
pub fn sanitize_title(raw: &str) -> String {
    let stripped = replace_symbols(raw);
    let collapsed = RE_WHITESPACE.replace_all(stripped.trim(), " ");
    // Case mapping can emit combining marks (`İ` lowercases to `i` + U+0307).
    let cased: String = title_case(&collapsed)
        .chars()
        .filter(|c| is_kept(*c))
        .collect();
    RE_WHITESPACE.replace_all(cased.trim(), " ").into_owned()
}

fn is_kept(c: char) -> bool {
    c == '-' || c.is_alphanumeric() || c.is_whitespace()
}

/// `true` if `title` is already in sanitised form.
pub fn is_sanitized(title: &str) -> bool {
    sanitize_title(title) == title
}

fn replace_symbols(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '-' | '/' | '\\' | '\u{2010}'..='\u{2015}' => out.push('-'),
            '&' => out.push_str(" and "),
            c if c.is_alphanumeric() || c.is_whitespace() => out.push(c),
            _ => {}
        }
    }
    out
}

fn title_case(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').filter(|w| !w.is_empty()).collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i != 0 && i != last && MINOR_WORDS.contains(&lower.as_str()) {
                lower
            } else {
                word.split('-').map(recase_segment).collect::<Vec<_>>().join("-")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn recase_segment(segment: &str) -> String {
    if segment.chars().any(|c| c.is_ascii_digit()) {
        if let Some(caps) = RE_ORDINAL.captures(segment) {
            return format!("{}{}", &caps[1], caps[2].to_lowercase());
        }
        return segment.to_string();
    }

    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    // Multi-char uppercase forms (`ß` → `SS`) would be re-cased on the next pass.
    let mut upper = first.to_uppercase();
    let head = match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => first,
    };
    std::iter::once(head)
        .chain(chars.flat_map(char::to_lowercase))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASES: &[(&str, &str)] = &[
        (
            "Detached Garage #2 & #3 Enlarged Electrical Plans",
            "Detached Garage 2 and 3 Enlarged Electrical Plans",
        ),
        ("3rd FLOOR BUILDING PLANS", "3rd Floor Building Plans"),
        ("Grading and SESC Plan (1 of 6)", "Grading and Sesc Plan 1 of 6"),
        (
            "1st, 2nd, & 3rd Floor Bldg. Plans / Notes",
            "1st 2nd and 3rd Floor Bldg Plans - Notes",
        ),
        (
            "1st Floor Partial Bldg. Plans - Units \"D8-H\" & \"T1-H\"",
            "1st Floor Partial Bldg Plans - Units D8-H and T1-H",
        ),
        ("COVER SHEET", "Cover Sheet"),
        ("2nd Floor Plan - Area A", "2nd Floor Plan - Area A"),
        ("Site [Utility] {Plan}", "Site Utility Plan"),
        ("Roof\\Canopy Details", "Roof-Canopy Details"),
    ];

    #[test]
    fn documented_examples() {
        for (raw, expected) in CASES {
            assert_eq!(sanitize_title(raw), *expected, "input: {raw:?}");
        }
    }

    #[test]
    fn idempotent() {
        for (raw, _) in CASES {
            let once = sanitize_title(raw);
            assert_eq!(sanitize_title(&once), once, "input: {raw:?}");
            assert!(is_sanitized(&once));
        }
    }

    #[test]
    fn non_ascii_case_mapping_is_stable() {
        assert_eq!(sanitize_title("KİT PLAN"), "Kit Plan");
        for raw in ["KİT PLAN", "ßTRAßE PLAN", "STRAßE Detail", "ÑANDÚ ÁREA", "İZMİR Site"] {
            let once = sanitize_title(raw);
            assert_eq!(sanitize_title(&once), once, "input: {raw:?}");
            assert!(once.chars().all(is_kept), "input: {raw:?} gave {once:?}");
        }
    }

    #[test]
    fn never_all_caps() {
        assert_eq!(sanitize_title("MECHANICAL SCHEDULES"), "Mechanical Schedules");
        assert_eq!(sanitize_title("HVAC"), "Hvac");
        assert!(!is_sanitized("MECHANICAL SCHEDULES"));
    }

    #[test]
    fn ordinals_are_lowercased() {
        assert_eq!(sanitize_title("1ST FLOOR RCP"), "1st Floor Rcp");
    }

    #[test]
    fn minor_word_first_or_last_is_capitalised() {
        assert_eq!(sanitize_title("the plan"), "The Plan");
        assert_eq!(sanitize_title("plan and"), "Plan And");
    }

    #[test]
    fn whitespace_and_symbols_collapse() {
        assert_eq!(sanitize_title("  Site   Plan\t\n"), "Site Plan");
        assert_eq!(sanitize_title("Owner's Notes: Phase #1"), "Owners Notes Phase 1");
        assert_eq!(sanitize_title(""), "");
        assert_eq!(sanitize_title("###"), "");
    }
}
