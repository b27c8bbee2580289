//! Scam classification with a deterministic keyword fallback.
//!
//! `classify` never fails: when the model call errors out or returns
//! garbage, the keyword fallback answers instead. The fallback is
//! deliberately conservative toward positive — in this domain a missed scam
//! costs more than an extra engagement with a benign sender.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm::{LlmProvider, TextRequest};

/// High-signal terms for the keyword fallback.
const FALLBACK_KEYWORDS: &[&str] = &[
    "urgent", "otp", "blocked", "verify", "bank", "upi", "kyc", "aadhar", "lottery", "prize",
    "arrest", "refund",
];

/// Closed set of scam-type tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScamType {
    BankFraud,
    UpiFraud,
    Phishing,
    Lottery,
    JobScam,
    KycFraud,
    TechSupport,
    Impersonation,
    #[default]
    Unknown,
    NotScam,
}

impl ScamType {
    /// Lenient parse; anything unrecognized maps to `Unknown`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "bank_fraud" => Self::BankFraud,
            "upi_fraud" => Self::UpiFraud,
            "phishing" => Self::Phishing,
            "lottery" => Self::Lottery,
            "job_scam" => Self::JobScam,
            "kyc_fraud" => Self::KycFraud,
            "tech_support" => Self::TechSupport,
            "impersonation" => Self::Impersonation,
            "not_scam" | "none" => Self::NotScam,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label for notes.
    pub fn label(&self) -> &'static str {
        match self {
            Self::BankFraud => "Bank fraud",
            Self::UpiFraud => "UPI fraud",
            Self::Phishing => "Phishing",
            Self::Lottery => "Lottery scam",
            Self::JobScam => "Job scam",
            Self::KycFraud => "KYC fraud",
            Self::TechSupport => "Tech support scam",
            Self::Impersonation => "Impersonation scam",
            Self::Unknown => "Unclassified scam",
            Self::NotScam => "Not a scam",
        }
    }
}

impl std::fmt::Display for ScamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BankFraud => "bank_fraud",
            Self::UpiFraud => "upi_fraud",
            Self::Phishing => "phishing",
            Self::Lottery => "lottery",
            Self::JobScam => "job_scam",
            Self::KycFraud => "kyc_fraud",
            Self::TechSupport => "tech_support",
            Self::Impersonation => "impersonation",
            Self::Unknown => "unknown",
            Self::NotScam => "not_scam",
        };
        write!(f, "{s}")
    }
}

/// Result of one classification run.
#[derive(Debug, Clone)]
pub struct ScamAnalysis {
    pub is_scam: bool,
    /// Always within [0, 1].
    pub confidence: f32,
    pub scam_type: ScamType,
    pub indicators: Vec<String>,
}

/// Scam classifier backed by the structured-output capability.
pub struct ScamClassifier {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl ScamClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Classify the latest message in the context of the conversation.
    pub async fn classify(&self, message: &str, history_text: &str) -> ScamAnalysis {
        let request = TextRequest::new(detection_prompt(message, history_text))
            .with_temperature(0.1)
            .with_max_tokens(512);

        let outcome = tokio::time::timeout(self.timeout, self.llm.generate_json(request)).await;

        let analysis = match outcome {
            Ok(Ok(value)) => parse_analysis(&value),
            Ok(Err(e)) => {
                warn!(error = %e, "classifier model call failed, using keyword fallback");
                keyword_fallback(message)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "classifier timed out, using keyword fallback");
                keyword_fallback(message)
            }
        };

        debug!(
            is_scam = analysis.is_scam,
            confidence = analysis.confidence,
            scam_type = %analysis.scam_type,
            "classification complete"
        );
        analysis
    }
}

fn parse_analysis(value: &serde_json::Value) -> ScamAnalysis {
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0) as f32;

    ScamAnalysis {
        is_scam: value.get("is_scam").and_then(|v| v.as_bool()).unwrap_or(false),
        confidence: confidence.clamp(0.0, 1.0),
        scam_type: value
            .get("scam_type")
            .and_then(|v| v.as_str())
            .map(ScamType::parse)
            .unwrap_or_default(),
        indicators: value
            .get("indicators")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Deterministic fallback: any high-signal keyword marks the message as a
/// scam with moderate confidence.
fn keyword_fallback(message: &str) -> ScamAnalysis {
    let lower = message.to_lowercase();
    let hits: Vec<String> = FALLBACK_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(**kw))
        .map(|kw| kw.to_string())
        .collect();

    if hits.is_empty() {
        ScamAnalysis {
            is_scam: false,
            confidence: 0.3,
            scam_type: ScamType::Unknown,
            indicators: Vec::new(),
        }
    } else {
        ScamAnalysis {
            is_scam: true,
            confidence: 0.6,
            scam_type: fallback_type(&lower),
            indicators: hits,
        }
    }
}

fn fallback_type(lower: &str) -> ScamType {
    if lower.contains("upi") {
        ScamType::UpiFraud
    } else if lower.contains("kyc") {
        ScamType::KycFraud
    } else if lower.contains("lottery") || lower.contains("prize") {
        ScamType::Lottery
    } else if lower.contains("bank") || lower.contains("account") {
        ScamType::BankFraud
    } else {
        ScamType::Unknown
    }
}

fn detection_prompt(message: &str, history_text: &str) -> String {
    let history_context = if history_text.is_empty() {
        String::new()
    } else {
        format!("\nCONVERSATION CONTEXT:\n{history_text}")
    };

    format!(
        r#"You are a scam detection expert. Analyze the following message for scam/fraud indicators.

COMMON SCAM INDICATORS:
- Urgency tactics: "immediately", "urgent", "your account will be blocked"
- Financial requests: OTP, bank details, UPI transfers, card numbers
- Authority impersonation: claiming to be from bank, police, government
- Reward bait: "you won", "cashback", "lottery"
- Fear tactics: "legal action", "arrest warrant", "account suspended"
- Suspicious artifacts: odd links, app-download demands, requests for personal information

SCAM TYPES:
- bank_fraud: Fake bank calls, account verification scams
- upi_fraud: UPI/payment app scams
- phishing: Link-based credential theft
- lottery: Lottery/prize scams
- job_scam: Fake job offers
- kyc_fraud: Fake KYC update requests
- tech_support: Fake tech support
- impersonation: Pretending to be government or company officials
- unknown: Scam detected but type unclear
- not_scam: Not a scam

MESSAGE TO ANALYZE:
{message}
{history_context}

Respond with ONLY valid JSON (no markdown, no explanation):
{{"is_scam": true/false, "confidence": 0.0-1.0, "scam_type": "type", "indicators": ["list", "of", "indicators"]}}

Be conservative - if there are clear scam signals, mark as scam.
False negatives are worse than false positives for this use case."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_clamps_confidence() {
        let value = serde_json::json!({
            "is_scam": true, "confidence": 3.7, "scam_type": "bank_fraud", "indicators": ["urgency"]
        });
        let analysis = parse_analysis(&value);
        assert!(analysis.is_scam);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.scam_type, ScamType::BankFraud);
    }

    #[test]
    fn parse_tolerates_missing_fields() {
        let analysis = parse_analysis(&serde_json::json!({}));
        assert!(!analysis.is_scam);
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.scam_type, ScamType::Unknown);
    }

    #[test]
    fn unknown_tag_parses_to_unknown() {
        assert_eq!(ScamType::parse("romance_scam"), ScamType::Unknown);
        assert_eq!(ScamType::parse("none"), ScamType::NotScam);
    }

    #[test]
    fn fallback_is_positive_on_keyword_hit() {
        let analysis = keyword_fallback("Your bank account is blocked, share OTP to verify");
        assert!(analysis.is_scam);
        assert_eq!(analysis.confidence, 0.6);
        assert!(!analysis.indicators.is_empty());
    }

    #[test]
    fn fallback_is_negative_without_keywords() {
        let analysis = keyword_fallback("See you at dinner tonight");
        assert!(!analysis.is_scam);
        assert!(analysis.confidence < 0.5);
    }

    #[test]
    fn fallback_type_prefers_specific_tags() {
        assert_eq!(
            keyword_fallback("send money via upi right now").scam_type,
            ScamType::UpiFraud
        );
        assert_eq!(
            keyword_fallback("you won a lottery prize").scam_type,
            ScamType::Lottery
        );
    }
}
