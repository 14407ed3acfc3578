//! Keyword pattern table and scoring

/// Intent used when nothing scores high enough
pub const FALLBACK_INTENT: &str = "chat";

/// Scores below this fall back to [`FALLBACK_INTENT`]
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 1.5;

/// Score that maps to full confidence
const FULL_CONFIDENCE_SCORE: f64 = 6.0;

#[derive(Debug, Clone, Copy)]
pub struct IntentPattern {
    pub intent: &'static str,
    pub action: &'static str,
    pub keywords: &'static [&'static str],
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
}

pub const PATTERNS: &[IntentPattern] = &[
    IntentPattern {
        intent: "start_audit",
        action: "run_audit",
        keywords: &["audit", "run an audit", "seo audit", "site audit", "check my website", "analyze my"],
        required_fields: &[],
        optional_fields: &["business_name", "website", "location", "industry"],
    },
    IntentPattern {
        intent: "find_leads",
        action: "search_leads",
        keywords: &["find leads", "leads", "prospects", "find businesses", "new clients"],
        required_fields: &["location"],
        optional_fields: &["industry"],
    },
    IntentPattern {
        intent: "generate_content",
        action: "create_content",
        keywords: &["write", "content", "social post", "blog", "caption", "social media"],
        required_fields: &["platforms"],
        optional_fields: &["industry", "timeframe"],
    },
    IntentPattern {
        intent: "generate_report",
        action: "build_report",
        keywords: &["report", "generate report", "monthly report", "summary report"],
        required_fields: &["audit_id"],
        optional_fields: &["timeframe"],
    },
    IntentPattern {
        intent: "send_report",
        action: "send_report",
        keywords: &["send", "send report", "share the report", "email the", "text the"],
        required_fields: &["channel", "target"],
        optional_fields: &["link"],
    },
    IntentPattern {
        intent: "capabilities",
        action: "describe_capabilities",
        keywords: &["what can you do", "capabilities", "what do you do", "help me understand", "features"],
        required_fields: &[],
        optional_fields: &[],
    },
    IntentPattern {
        intent: "schedule",
        action: "schedule_task",
        keywords: &["schedule", "remind", "recurring", "every week", "every month"],
        required_fields: &["timeframe"],
        optional_fields: &[],
    },
];

impl IntentPattern {
    /// Sum of `len / 10 + 1` per keyword found in `lowered`, times 1.5 when
    /// two or more keywords hit
    pub fn score(&self, lowered: &str) -> f64 {
        let mut total = 0.0;
        let mut matched = 0;
        for keyword in self.keywords {
            if lowered.contains(keyword) {
                total += keyword.len() as f64 / 10.0 + 1.0;
                matched += 1;
            }
        }
        if matched >= 2 {
            total * 1.5
        } else {
            total
        }
    }
}

/// Highest-scoring pattern; the first one wins ties
pub fn best_match(lowered: &str) -> Option<(&'static IntentPattern, f64)> {
    PATTERNS
        .iter()
        .map(|p| (p, p.score(lowered)))
        .fold(None, |best, (p, s)| match best {
            Some((_, best_score)) if best_score >= s => best,
            _ => Some((p, s)),
        })
}

pub fn confidence(score: f64) -> f64 {
    (score / FULL_CONFIDENCE_SCORE).min(1.0)
}
