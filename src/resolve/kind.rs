use crate::config::ResolverConfig;
use crate::resolve::Congestion;
use serde::Serialize;

/// What a report-type code says about a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportKind {
    /// A score on the 1–5 scale.
    Congestion(Congestion),
    Question,
    /// Hazard, accident, closure and similar.
    Incident,
    /// The score was lost; the comment may still carry a speed.
    FreeTextStatus,
    Unknown,
}

impl ReportKind {
    pub fn classify(code: u16, config: &ResolverConfig) -> Self {
        if let Ok(level) = Congestion::try_from(code) {
            return ReportKind::Congestion(level);
        }
        if config.question_codes.contains(&code) {
            ReportKind::Question
        } else if config.incident_codes.contains(&code) {
            ReportKind::Incident
        } else if config.free_text_codes.contains(&code) {
            ReportKind::FreeTextStatus
        } else {
            ReportKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_default_codes() {
        let config = ResolverConfig::default();
        for code in 1..=5u16 {
            assert!(matches!(
                ReportKind::classify(code, &config),
                ReportKind::Congestion(c) if u16::from(c.value()) == code
            ));
        }
        assert_eq!(ReportKind::classify(6, &config), ReportKind::Question);
        assert_eq!(ReportKind::classify(8, &config), ReportKind::Incident);
        assert_eq!(ReportKind::classify(10, &config), ReportKind::FreeTextStatus);
        assert_eq!(ReportKind::classify(0, &config), ReportKind::Unknown);
        assert_eq!(ReportKind::classify(42, &config), ReportKind::Unknown);
    }
}
