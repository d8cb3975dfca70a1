use super::types::{AnalysisAggregate, ReportSection, Urgency};

/// Roll sections up into the stored aggregate.
///
/// Overall confidence is the rounded mean of section confidences (0 when
/// there are no sections). Overall urgency is the maximum section urgency,
/// `Normal` when empty.
pub fn aggregate_sections(sections: Vec<ReportSection>) -> AnalysisAggregate {
    AnalysisAggregate {
        overall_confidence: mean_confidence(&sections),
        overall_urgency: max_urgency(&sections),
        sections,
    }
}

fn mean_confidence(sections: &[ReportSection]) -> u8 {
    if sections.is_empty() {
        return 0;
    }
    let total: u32 = sections.iter().map(|s| u32::from(s.confidence)).sum();
    let mean = f64::from(total) / sections.len() as f64;
    mean.round().clamp(0.0, 100.0) as u8
}

fn max_urgency(sections: &[ReportSection]) -> Urgency {
    sections
        .iter()
        .map(|s| s.urgency)
        .max()
        .unwrap_or_default()
}
