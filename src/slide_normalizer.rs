//! Turns loosely structured generated text into a fixed-length deck of slides.
//!
//! Classification is line based and driven entirely by [`SlideRules`]:
//! a title line opens a new slide, a subheading line replaces the current
//! slide's subheading, a bullet line is appended to its bullets and every
//! other line is ignored. Titles are checked first.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fallback_content::fallback_slides;
use crate::models::SlideRecord;

/// Markers recognised as a subheading anywhere in a line.
pub const DEFAULT_SUBHEADING_MARKERS: [&str; 14] = [
    "SUBHEADING:", "🎯", "📝", "🌬️", "💪", "🧠", "🌟", "🚀", "⚠️", "📅", "👨‍🏫", "📚", "💼", "🎉",
];

pub const DEFAULT_FILLER_BULLET: &str = "• Additional detailed point for comprehensive coverage";

/// The classification table and the budgets a normalized deck obeys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideRules {
    /// Leading token that opens a slide, matched case-insensitively.
    pub title_token: String,
    /// An all upper-case line longer than this also opens a slide.
    pub caps_title_min_len: usize,
    pub subheading_markers: Vec<String>,
    pub bullet_markers: Vec<char>,
    pub filler_bullet: String,
    pub min_bullets: usize,
    pub max_bullets: usize,
    /// Upper bound on the characters of a rendered slide.
    pub char_budget: usize,
    pub deck_len: usize,
    /// Header titles longer than this are shown with an ellipsis.
    pub display_title_len: usize,
}

impl Default for SlideRules {
    fn default() -> Self {
        Self {
            title_token: "SLIDE".to_string(),
            caps_title_min_len: 10,
            subheading_markers: DEFAULT_SUBHEADING_MARKERS.iter().map(|m| m.to_string()).collect(),
            bullet_markers: vec!['•', '-'],
            filler_bullet: DEFAULT_FILLER_BULLET.to_string(),
            min_bullets: 5,
            max_bullets: 6,
            char_budget: 500,
            deck_len: 13,
            display_title_len: 45,
        }
    }
}

/// A classification table that cannot produce a well-formed deck.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("title_token must not be blank")]
    BlankTitleToken,

    #[error("subheading_markers must not contain a blank marker")]
    BlankSubheadingMarker,

    #[error("bullet_markers must not be empty")]
    NoBulletMarkers,

    #[error("min_bullets ({min}) exceeds max_bullets ({max})")]
    BulletBounds { min: usize, max: usize },

    #[error("char_budget must be greater than 3, got {0}")]
    CharBudget(usize),

    #[error("deck_len must be at least 1")]
    EmptyDeck,
}

/// What a single trimmed line contributes to the slide being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Title,
    Subheading,
    Bullet,
    Ignored,
}

impl SlideRules {
    /// Reject tables that would break the deck invariants.
    ///
    /// A blank title token or subheading marker matches every line.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.title_token.trim().is_empty() {
            return Err(RulesError::BlankTitleToken);
        }
        if self.subheading_markers.iter().any(|marker| marker.trim().is_empty()) {
            return Err(RulesError::BlankSubheadingMarker);
        }
        if self.bullet_markers.is_empty() {
            return Err(RulesError::NoBulletMarkers);
        }
        if self.min_bullets > self.max_bullets {
            return Err(RulesError::BulletBounds {
                min: self.min_bullets,
                max: self.max_bullets,
            });
        }
        if self.char_budget <= 3 {
            return Err(RulesError::CharBudget(self.char_budget));
        }
        if self.deck_len == 0 {
            return Err(RulesError::EmptyDeck);
        }
        Ok(())
    }

    pub fn is_title(&self, line: &str) -> bool {
        let token_match = line
            .get(..self.title_token.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.title_token));

        token_match || (is_all_caps(line) && line.chars().count() > self.caps_title_min_len)
    }

    pub fn is_subheading(&self, line: &str) -> bool {
        self.subheading_markers.iter().any(|marker| line.contains(marker.as_str()))
    }

    pub fn is_bullet(&self, line: &str) -> bool {
        line.chars().next().is_some_and(|c| self.bullet_markers.contains(&c))
    }

    pub fn classify(&self, line: &str) -> LineKind {
        if self.is_title(line) {
            LineKind::Title
        } else if self.is_subheading(line) {
            LineKind::Subheading
        } else if self.is_bullet(line) {
            LineKind::Bullet
        } else {
            LineKind::Ignored
        }
    }
}

// At least one cased character and none of them lower-case
fn is_all_caps(line: &str) -> bool {
    let mut cased = false;
    for c in line.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

// Accumulator for the slide currently being scanned
#[derive(Debug, Default)]
struct SlideDraft {
    title: String,
    subheading: String,
    bullets: Vec<String>,
}

impl SlideDraft {
    fn titled(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    fn finish(self, rules: &SlideRules) -> SlideRecord {
        SlideRecord::new(self.title, self.subheading, self.bullets, rules)
    }
}

/// Scan raw text into slides, without any deck-length adjustment.
pub fn parse_slides(raw: &str, rules: &SlideRules) -> Vec<SlideRecord> {
    let mut slides = Vec::new();
    let mut current = SlideDraft::default();

    for line in raw.split('\n').map(str::trim) {
        match rules.classify(line) {
            LineKind::Title => {
                let previous = std::mem::replace(&mut current, SlideDraft::titled(line));
                if !previous.title.is_empty() {
                    slides.push(previous.finish(rules));
                }
            }
            LineKind::Subheading => current.subheading = line.to_string(),
            LineKind::Bullet => current.bullets.push(line.to_string()),
            LineKind::Ignored => {}
        }
    }

    if !current.title.is_empty() {
        slides.push(current.finish(rules));
    }

    slides
}

/// Normalize raw generated text into exactly `rules.deck_len` slides.
///
/// Missing slides are taken from the fallback bank for `subject`, cycling by
/// the current deck length; surplus slides are dropped from the end.
pub fn normalize_deck(raw: &str, subject: &str, rules: &SlideRules) -> Vec<SlideRecord> {
    let mut slides = parse_slides(raw, rules);
    let parsed = slides.len();

    if slides.len() < rules.deck_len {
        let bank = fallback_slides(subject);
        while slides.len() < rules.deck_len {
            let body = &bank[slides.len() % bank.len()];
            slides.push(SlideRecord::from_body(body, rules));
        }
    }
    slides.truncate(rules.deck_len);

    debug!(
        "Normalized {} parsed slides into a deck of {} for {}",
        parsed,
        slides.len(),
        subject
    );
    slides
}

/// Cut `content` to at most `max_chars` characters, dropping whole lines from the end.
///
/// When not even the first line fits, the first `max_chars - 3` characters are
/// kept and an ellipsis appended.
pub fn fit_to_budget(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let mut kept = Vec::new();
    let mut total = 0;
    for line in content.split('\n') {
        let len = line.chars().count();
        if total + len < max_chars {
            kept.push(line);
            total += len + 1;
        } else {
            break;
        }
    }

    let result = kept.join("\n");
    if result.trim().is_empty() {
        let head: String = content.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        result
    }
}
