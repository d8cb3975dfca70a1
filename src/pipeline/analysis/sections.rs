//! Report section extraction.
//!
//! Splits free-form report text at heading boundaries, maps each block onto
//! the canonical section table, then assigns urgency and confidence. Table
//! order is the tie-break: the first rule whose matcher appears wins.
//! Blocks that match no rule are dropped; no section id is ever taken from
//! the report text itself.

use std::sync::LazyLock;

use regex::Regex;

use super::confidence::score_section_confidence;
use super::types::{Priority, ReportSection, SectionKind, Urgency};

/// One row of the canonical section table.
#[derive(Debug, Clone, Copy)]
pub struct SectionRule {
    pub kind: SectionKind,
    pub title: &'static str,
    /// Lower-case substrings that identify the section.
    pub matchers: &'static [&'static str],
    pub priority: Priority,
    pub urgency: Urgency,
    /// Whether urgency keywords in the section can raise its urgency.
    pub escalates: bool,
}

/// Ordered canonical table. `Differential` precedes `Diagnosis` because
/// "diagnósticos diferenciais" also contains "diagnóstico". `Limitations`
/// holds disclaimers ("em caso de emergência...") and never escalates.
pub const CANONICAL_SECTIONS: &[SectionRule] = &[
    SectionRule {
        kind: SectionKind::Differential,
        title: "Diagnósticos Diferenciais",
        matchers: &["diagnósticos diferenciais", "diagnóstico diferencial", "diferenciais"],
        priority: Priority::Medium,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Diagnosis,
        title: "Impressão Diagnóstica",
        matchers: &["impressão diagnóstica", "hipótese diagnóstica", "diagnóstico"],
        priority: Priority::High,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Findings,
        title: "Achados Clínicos",
        matchers: &["achados", "descrição da lesão", "análise da imagem", "observações clínicas"],
        priority: Priority::High,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Severity,
        title: "Avaliação de Gravidade",
        matchers: &["gravidade", "severidade", "classificação de risco", "estadiamento"],
        priority: Priority::High,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::WarningSigns,
        title: "Sinais de Alerta",
        matchers: &["sinais de alerta", "sinais de alarme", "red flags"],
        priority: Priority::High,
        urgency: Urgency::Urgent,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Exams,
        title: "Exames Complementares",
        matchers: &["exames complementares", "exames", "investigação complementar"],
        priority: Priority::Medium,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Treatment,
        title: "Conduta Terapêutica",
        matchers: &["conduta", "tratamento", "manejo", "terapêutica"],
        priority: Priority::High,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Referral,
        title: "Encaminhamento",
        matchers: &["encaminhamento", "referenciamento"],
        priority: Priority::Medium,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Prognosis,
        title: "Prognóstico",
        matchers: &["prognóstico", "evolução esperada"],
        priority: Priority::Medium,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::FollowUp,
        title: "Acompanhamento",
        matchers: &["acompanhamento", "seguimento", "reavaliação", "monitoramento"],
        priority: Priority::Low,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::PatientGuidance,
        title: "Orientações ao Paciente",
        matchers: &["orientações", "recomendações ao paciente", "cuidados domiciliares"],
        priority: Priority::Low,
        urgency: Urgency::Normal,
        escalates: true,
    },
    SectionRule {
        kind: SectionKind::Limitations,
        title: "Limitações da Análise",
        matchers: &["limitações", "ressalvas", "aviso importante"],
        priority: Priority::Low,
        urgency: Urgency::Normal,
        escalates: false,
    },
];

/// Terms that make a section critical regardless of its table default.
const CRISIS_KEYWORDS: &[&str] = &[
    "emergência",
    "emergencia",
    "risco de vida",
    "risco iminente",
    "choque séptico",
    "sepse",
    "septicemia",
    "fasciíte necrosante",
    "fasceíte necrosante",
    "gangrena gasosa",
    "síndrome compartimental",
    "isquemia crítica",
    "isquemia aguda",
    "hemorragia ativa",
    "anafilaxia",
    "parada cardíaca",
    "atendimento imediato",
    "imediatamente",
    "life-threatening",
    "emergency",
];

/// Terms that raise a section to at least urgent.
const URGENT_KEYWORDS: &[&str] = &[
    "urgente",
    "urgência",
    "com prioridade",
    "prioritário",
    "em até 24",
    "em até 48",
    "infecção",
    "celulite",
    "abscesso",
    "necrose",
    "suspeita de malignidade",
    "melanoma",
    "carcinoma",
    "biópsia",
    "urgent",
];

/// Negated or conditional lead-ins: a keyword after one of these in the same
/// clause is not a finding ("sem sinais de infecção", "em caso de emergência").
static NEGATION_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^\p{L}])(?:sem|não há|não se observa|não se observam|não apresenta|ausência de|nega|descarta|afasta|em caso de|caso haja|caso surja|se houver|se surgir)(?:[^\p{L}]|$)",
    )
    .unwrap()
});

/// Contrast words that end the reach of an earlier negation in the clause.
static CONTRAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\p{L}])(?:mas|porém|entretanto|contudo|todavia)(?:[^\p{L}]|$)").unwrap()
});

/// Start of a heading line: optional `#`s and list number, then `**` or `#`,
/// then an upper-case letter.
static HEADING_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*(?:\*\*)?|(?:\d+[.)][ \t]*)?\*\*)[ \t]*\p{Lu}").unwrap()
});

/// `**Title**` heading with optional `#`/number prefix and trailing colon.
static BOLD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:#{1,6}[ \t]*)?(?:\d+[.)][ \t]*)?\*\*([^*\n]+?)\*\*[ \t]*:?[ \t]*(.*)$")
        .unwrap()
});

/// `## Title` heading without bold markup.
static HASH_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*#{1,6}[ \t]*(.+)$").unwrap());

/// A heading-delimited chunk of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Block<'a> {
    raw: &'a str,
    heading: Option<String>,
    body: String,
}

/// Segment a report into canonical sections.
///
/// Pure and deterministic. Blocks mapping onto the same canonical id are
/// merged in report order so every id appears at most once.
pub fn extract_sections(report: &str) -> Vec<ReportSection> {
    let mut drafts: Vec<(&'static SectionRule, Vec<Block<'_>>)> = Vec::new();

    for block in split_blocks(report) {
        let Some(rule) = match_rule(&block) else {
            tracing::trace!(len = block.raw.len(), "Report block matched no canonical section");
            continue;
        };
        if block.body.is_empty() {
            continue;
        }
        match drafts.iter_mut().find(|(r, _)| r.kind == rule.kind) {
            Some((_, blocks)) => blocks.push(block),
            None => drafts.push((rule, vec![block])),
        }
    }

    drafts
        .into_iter()
        .map(|(rule, blocks)| build_section(rule, &blocks))
        .collect()
}

fn build_section(rule: &SectionRule, blocks: &[Block<'_>]) -> ReportSection {
    let scan_text = blocks.iter().map(|b| b.raw).collect::<Vec<_>>().join("\n");
    let content = blocks
        .iter()
        .map(|b| b.body.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    ReportSection {
        id: rule.kind,
        title: rule.title.to_string(),
        content,
        priority: rule.priority,
        confidence: score_section_confidence(&scan_text),
        urgency: if rule.escalates {
            classify_urgency(rule.urgency, &scan_text.to_lowercase())
        } else {
            rule.urgency
        },
    }
}

/// Crisis terms force `Critical`; escalation terms raise to at least
/// `Urgent`; otherwise the table default stands. Negated or conditional
/// mentions are ignored.
pub fn classify_urgency(default: Urgency, lower: &str) -> Urgency {
    if has_affirmed_keyword(lower, CRISIS_KEYWORDS) {
        return Urgency::Critical;
    }
    if has_affirmed_keyword(lower, URGENT_KEYWORDS) {
        return default.max(Urgency::Urgent);
    }
    default
}

fn has_affirmed_keyword(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        lower.match_indices(k).any(|(idx, _)| {
            let clause_start = lower[..idx]
                .rfind(['.', ';', '!', '?', '\n'])
                .map_or(0, |p| p + 1);
            !is_negated(&lower[clause_start..idx])
        })
    })
}

/// True when the clause text before a keyword ends under a negation cue.
fn is_negated(prefix: &str) -> bool {
    let cue = NEGATION_CUE.find_iter(prefix).last().map(|m| m.end());
    let contrast = CONTRAST.find_iter(prefix).last().map(|m| m.end());
    match (cue, contrast) {
        (Some(cue), Some(contrast)) => cue > contrast,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Heading line first, then the whole block. First table row wins in each pass.
fn match_rule(block: &Block<'_>) -> Option<&'static SectionRule> {
    let find = |haystack: &str| {
        CANONICAL_SECTIONS
            .iter()
            .find(|rule| rule.matchers.iter().any(|m| haystack.contains(m)))
    };
    block
        .heading
        .as_deref()
        .map(str::to_lowercase)
        .and_then(|h| find(&h))
        .or_else(|| find(&block.raw.to_lowercase()))
}

fn split_blocks(report: &str) -> Vec<Block<'_>> {
    let mut starts: Vec<usize> = HEADING_BOUNDARY.find_iter(report).map(|m| m.start()).collect();
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }
    starts.push(report.len());

    starts
        .windows(2)
        .map(|w| &report[w[0]..w[1]])
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_block)
        .collect()
}

/// Separate the heading (if any) from the body, removing heading markup.
fn parse_block(raw: &str) -> Block<'_> {
    let trimmed = raw.trim_start_matches(['\n', '\r']);
    let (first_line, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));

    let parsed = BOLD_HEADING
        .captures(first_line)
        .map(|c| {
            let title = c.get(1).map_or("", |m| m.as_str());
            let tail = c.get(2).map_or("", |m| m.as_str());
            (title.to_string(), tail.to_string())
        })
        .or_else(|| {
            HASH_HEADING
                .captures(first_line)
                .and_then(|c| c.get(1))
                .map(|m| (m.as_str().to_string(), String::new()))
        });

    match parsed {
        Some((title, tail)) => {
            let heading = title.trim().trim_end_matches(':').trim().to_string();
            let body = format!("{}\n{}", tail.trim(), rest).trim().to_string();
            Block {
                raw,
                heading: Some(heading),
                body,
            }
        }
        None => Block {
            raw,
            heading: None,
            body: raw.trim().to_string(),
        },
    }
}
