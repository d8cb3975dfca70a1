use std::sync::LazyLock;

use regex::Regex;

/// Confidence scoring for extracted report sections (0..=100).
pub mod section_thresholds {
    /// Starting score when the model states no explicit percentage.
    pub const BASE: u8 = 60;

    /// Added per assertive clinical verb found in the section.
    pub const ASSERTION_BONUS: u8 = 5;

    /// Heuristic scores never exceed this; only an explicit percentage can.
    pub const HEURISTIC_CAP: u8 = 95;
}

/// "NN%" immediately followed by a confidence/certainty word. The number is
/// read whole (no leading digits dropped) and clamped afterwards.
static EXPLICIT_CONFIDENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\d.,])(\d+(?:[.,]\d+)?)\s*%\s*(?:de\s+|of\s+)?(?:confiança|confianca|certeza|segurança|probabilidade|confidence|certainty)",
    )
    .unwrap()
});

/// Phrases a model uses when it commits to a finding.
const ASSERTIVE_VERBS: &[&str] = &[
    "observa-se",
    "observam-se",
    "sugere",
    "sugestivo",
    "compatível com",
    "evidencia",
    "indica",
    "caracteriza",
    "consistente com",
    "nota-se",
    "identifica-se",
];

/// Score a section's text.
///
/// An explicit "NN% de confiança" wins (clamped to 100). Otherwise the score
/// is `BASE` plus a bonus per assertive verb occurrence, capped at
/// `HEURISTIC_CAP`.
pub fn score_section_confidence(text: &str) -> u8 {
    if let Some(explicit) = explicit_confidence(text) {
        return explicit;
    }
    heuristic_confidence(&text.to_lowercase())
}

/// First explicit percentage in the text, clamped to 0..=100.
pub fn explicit_confidence(text: &str) -> Option<u8> {
    let caps = EXPLICIT_CONFIDENCE.captures(text)?;
    let number = caps.get(1)?.as_str().replace(',', ".");
    let value: f64 = number.parse().ok()?;
    Some(value.round().clamp(0.0, 100.0) as u8)
}

fn heuristic_confidence(lower: &str) -> u8 {
    let hits: usize = ASSERTIVE_VERBS
        .iter()
        .map(|verb| lower.matches(verb).count())
        .sum();
    let bonus = hits.saturating_mul(section_thresholds::ASSERTION_BONUS as usize);
    let score = (section_thresholds::BASE as usize).saturating_add(bonus);
    score.min(section_thresholds::HEURISTIC_CAP as usize) as u8
}
