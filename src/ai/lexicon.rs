//! Keyword trigger matching: priority-ranked lexicon scan.
//!
//! Fast, allocation-light lookup used on every streamed chunk. A lexicon is an
//! ordered list of entries; the highest-priority entry with any keyword hit
//! wins, and equal priorities keep the entry registered first.
//!
//! Match rule per keyword:
//! - contains a CJK ideograph → plain substring (no word separators in CJK)
//! - 1–2 chars, non-CJK → must be delimited by non-word characters
//! - anything else → plain case-insensitive substring

use crate::ai::animation::{Expression, Gesture};
use serde::{Deserialize, Serialize};

/// One label with its keywords and conflict-resolution priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry<L> {
    pub label: L,
    pub priority: i32,
    pub keywords: Vec<String>,
}

impl<L> LexiconEntry<L> {
    pub fn new(label: L, priority: i32, keywords: &[&str]) -> Self {
        Self {
            label,
            priority,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Best lexicon hit for a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerMatch<L> {
    pub label: L,
    pub matched_keyword: String,
    pub priority: i32,
}

/// Scan `text` against `lexicon` and return the single best match.
pub fn match_trigger<L: Copy>(text: &str, lexicon: &[LexiconEntry<L>]) -> Option<TriggerMatch<L>> {
    if text.is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let mut best: Option<TriggerMatch<L>> = None;

    for entry in lexicon {
        if let Some(ref b) = best {
            if entry.priority <= b.priority {
                continue;
            }
        }
        if let Some(kw) = entry.keywords.iter().find(|kw| keyword_matches(&lower, kw)) {
            best = Some(TriggerMatch {
                label: entry.label,
                matched_keyword: kw.clone(),
                priority: entry.priority,
            });
        }
    }

    best
}

/// Apply the shape-dependent match rule. `lower_text` must already be lowercase.
pub fn keyword_matches(lower_text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    let kw = keyword.to_lowercase();

    if kw.chars().any(is_cjk) {
        return lower_text.contains(&kw);
    }
    if kw.chars().count() <= 2 {
        return contains_word(lower_text, &kw);
    }
    lower_text.contains(&kw)
}

/// True if `word` occurs with no word character directly on either side.
pub fn contains_word(haystack: &str, word: &str) -> bool {
    contains_bounded(haystack, word, true)
}

/// True if some word in `haystack` starts with `stem`.
pub fn contains_word_prefix(haystack: &str, stem: &str) -> bool {
    contains_bounded(haystack, stem, false)
}

fn contains_bounded(haystack: &str, needle: &str, bound_end: bool) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let after_ok = !bound_end
            || haystack[end..]
                .chars()
                .next()
                .map_or(true, |c| !is_word_char(c));
        before_ok && after_ok
    })
}

/// Letters, digits and underscore count as word characters; CJK does not,
/// since it is never space-separated from neighbouring Latin text.
pub fn is_word_char(c: char) -> bool {
    (c.is_alphanumeric() || c == '_') && !is_cjk(c)
}

/// CJK unified ideographs (base block, extension A/B, compatibility).
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2A6DF)
}

// ── Default lexicons ───────────────────────────────────────

const GESTURE_TABLE: &[(Gesture, i32, &[&str])] = &[
    (
        Gesture::ShakeHead,
        6,
        &[
            "incorrect",
            "not really",
            "not quite",
            "disagree",
            "don't think",
            "that's not",
            "wrong",
            "nope",
            "no",
            "不对",
            "不是",
            "错了",
            "不行",
        ],
    ),
    (
        Gesture::Nod,
        5,
        &[
            "correct",
            "absolutely",
            "certainly",
            "of course",
            "indeed",
            "exactly",
            "definitely",
            "i agree",
            "that's right",
            "yeah",
            "ok",
            "没错",
            "对的",
            "是的",
            "当然",
            "好的",
        ],
    ),
    (
        Gesture::Thinking,
        4,
        &[
            "hmm",
            "let me think",
            "perhaps",
            "maybe",
            "possibly",
            "i wonder",
            "interesting",
            "嗯",
            "让我想想",
            "也许",
            "或许",
        ],
    ),
];

const EXPRESSION_TABLE: &[(Expression, i32, &[&str])] = &[
    (
        Expression::Angry,
        8,
        &[
            "angry",
            "furious",
            "annoyed",
            "frustrat",
            "outrageous",
            "infuriat",
            "生气",
            "气死",
            "愤怒",
        ],
    ),
    (
        Expression::Surprised,
        7,
        &[
            "wow",
            "whoa",
            "incredible",
            "unbelievable",
            "unexpected",
            "omg",
            "astonish",
            "shock",
            "哇",
            "天哪",
            "竟然",
            "居然",
        ],
    ),
    (
        Expression::Sad,
        6,
        &[
            "sad",
            "sorry",
            "unfortunately",
            "regret",
            "disappoint",
            "heartbreak",
            "难过",
            "伤心",
            "遗憾",
            "抱歉",
        ],
    ),
    (
        Expression::Smile,
        5,
        &[
            "happy",
            "glad",
            "great",
            "wonderful",
            "awesome",
            "delighted",
            "enjoy",
            "haha",
            "开心",
            "高兴",
            "哈哈",
            "太好了",
        ],
    ),
];

pub fn default_gesture_lexicon() -> Vec<LexiconEntry<Gesture>> {
    GESTURE_TABLE
        .iter()
        .map(|(label, priority, kws)| LexiconEntry::new(*label, *priority, kws))
        .collect()
}

pub fn default_expression_lexicon() -> Vec<LexiconEntry<Expression>> {
    EXPRESSION_TABLE
        .iter()
        .map(|(label, priority, kws)| LexiconEntry::new(*label, *priority, kws))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tag {
        A,
        B,
    }

    #[test]
    fn higher_priority_wins_regardless_of_text_order() {
        let lexicon = vec![
            LexiconEntry::new(Expression::Smile, 5, &["happy"]),
            LexiconEntry::new(Expression::Surprised, 7, &["wow"]),
        ];
        let m = match_trigger("happy, wow!", &lexicon).unwrap();
        assert_eq!(m.label, Expression::Surprised);
        assert_eq!(m.matched_keyword, "wow");
        assert_eq!(m.priority, 7);
    }

    #[test]
    fn equal_priority_keeps_first_registered() {
        let lexicon = vec![
            LexiconEntry::new(Tag::A, 3, &["alpha"]),
            LexiconEntry::new(Tag::B, 3, &["beta"]),
        ];
        let m = match_trigger("beta then alpha", &lexicon).unwrap();
        assert_eq!(m.label, Tag::A);
    }

    #[test]
    fn short_keyword_needs_word_boundary() {
        let lexicon = vec![LexiconEntry::new(Tag::A, 1, &["no"])];
        assert!(match_trigger("noodle", &lexicon).is_none());
        assert!(match_trigger("I know", &lexicon).is_none());
        assert!(match_trigger("Oh no, not again", &lexicon).is_some());
        assert!(match_trigger("NO", &lexicon).is_some());
    }

    #[test]
    fn short_keyword_found_after_embedded_occurrence() {
        let lexicon = vec![LexiconEntry::new(Tag::A, 1, &["no"])];
        let m = match_trigger("nobody said no", &lexicon);
        assert!(m.is_some(), "second occurrence is delimited");
    }

    #[test]
    fn cjk_single_char_matches_anywhere() {
        let lexicon = vec![LexiconEntry::new(Tag::A, 1, &["哇"])];
        assert!(match_trigger("这也太哇塞了", &lexicon).is_some());
        assert!(match_trigger("abc哇def", &lexicon).is_some());
    }

    #[test]
    fn short_latin_keyword_next_to_cjk_counts_as_delimited() {
        let lexicon = vec![LexiconEntry::new(Tag::A, 1, &["ok"])];
        assert!(match_trigger("好ok好", &lexicon).is_some());
    }

    #[test]
    fn long_keyword_is_plain_substring() {
        let lexicon = vec![LexiconEntry::new(Tag::A, 1, &["frustrat"])];
        assert!(match_trigger("I'm so FRUSTRATED", &lexicon).is_some());
    }

    #[test]
    fn no_match_returns_none() {
        let lexicon = default_expression_lexicon();
        assert!(match_trigger("The meeting is at three.", &lexicon).is_none());
        assert!(match_trigger("", &lexicon).is_none());
    }

    #[test]
    fn default_gesture_lexicon_nods_on_agreement() {
        let m = match_trigger("That's correct.", &default_gesture_lexicon()).unwrap();
        assert_eq!(m.label, Gesture::Nod);
    }

    #[test]
    fn default_gesture_lexicon_prefers_disagreement() {
        let m = match_trigger("That is incorrect.", &default_gesture_lexicon()).unwrap();
        assert_eq!(m.label, Gesture::ShakeHead);
    }

    #[test]
    fn whole_word_and_prefix_matching() {
        assert!(contains_word("i disagree, sorry", "disagree"));
        assert!(!contains_word("i disagree", "agree"));
        assert!(!contains_word("that's incorrect", "correct"));
        assert!(contains_word_prefix("so frustrating!", "frustrat"));
        assert!(!contains_word_prefix("unfrustrated", "frustrat"));
    }

    #[test]
    fn cjk_range_checks() {
        assert!(is_cjk('中'));
        assert!(is_cjk('㐀'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('。'));
        assert!(!is_word_char('中'));
        assert!(is_word_char('é'));
    }
}
