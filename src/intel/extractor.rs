//! Intelligence extraction — deterministic regex pass plus optional LLM
//! enrichment.
//!
//! The deterministic layer is a pure function of the input text and is
//! authoritative: the enrichment pass can only add to it, and any enrichment
//! failure is logged and swallowed so a turn is never blocked on it.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::intel::record::IntelligenceRecord;
use crate::llm::{LlmProvider, TextRequest};

/// Captured digit runs are candidate account numbers at 9–18 digits; only
/// the 11–16 band is retained. Most domestic account numbers fall in that
/// band, and the narrower retention keeps ten-digit phone numbers and short
/// reference codes out of the account category.
const ACCOUNT_MIN_DIGITS: usize = 11;
const ACCOUNT_MAX_DIGITS: usize = 16;

/// Scam-indicator vocabulary. Presence is recorded, occurrences are not
/// counted.
const SCAM_KEYWORDS: &[&str] = &[
    // urgency
    "urgent", "immediately", "expire", "limited time", "act now", "warning", "alert",
    // account threats
    "block", "blocked", "suspend", "suspended", "freeze", "verify", "confirm", "update",
    // credentials and identifiers
    "otp", "cvv", "pin", "password", "kyc", "aadhar", "pan",
    // financial action
    "bank", "account", "transfer", "payment", "upi", "paytm", "refund", "cashback",
    // reward bait
    "prize", "lottery", "winner", "won", "claim", "reward", "bonus", "offer",
    // delivery vectors
    "link", "click", "download", "install", "app",
    // fear and authority
    "police", "legal", "arrest", "warrant", "court", "case",
    "rbi", "income tax", "tax", "gst", "customs", "cbi", "penalty", "fine",
];

/// UPI-style payment handle suffixes.
const UPI_SUFFIXES: &str = "upi|paytm|gpay|phonepe|ybl|axl|apl|ibl|okaxis|okhdfcbank|oksbi|okicici|sbi|icici|hdfc|axis|kotak|rbl|federal|indus|idbi|pnb|bob|canara|union|ubi|cub|kvb|tmb|iob|dcb|jkb|bandhan";

/// Compiled extraction patterns plus the link denylist.
pub struct IntelExtractor {
    account_run: Regex,
    account_grouped: Regex,
    upi: Regex,
    phone: Regex,
    url_scheme: Regex,
    url_www: Regex,
    url_domain: Regex,
    email: Regex,
    reference: Regex,
    link_denylist: Vec<String>,
    enrichment: Option<Arc<dyn LlmProvider>>,
    enrichment_timeout: Duration,
}

impl IntelExtractor {
    /// Build the deterministic-only extractor.
    pub fn new(link_denylist: Vec<String>) -> Self {
        Self {
            account_run: Regex::new(r"\b\d{9,18}\b").unwrap(),
            account_grouped: Regex::new(r"\b\d{4}[-\s]\d{4}[-\s]\d{4}(?:[-\s]\d{2,4})?\b")
                .unwrap(),
            upi: Regex::new(&format!(r"(?i)\b[a-z0-9._-]+@(?:{UPI_SUFFIXES})\b")).unwrap(),
            // Leading non-digit guard instead of \b so a ten-digit tail of a
            // longer run is never picked up as a phone number.
            phone: Regex::new(r"(?:\A|[^\d])((?:\+?91[\s-]?|0)?[6-9]\d{4}[\s-]?\d{5})\b")
                .unwrap(),
            url_scheme: Regex::new(r#"https?://[^\s<>"']+"#).unwrap(),
            url_www: Regex::new(r#"(?i)\bwww\.[^\s<>"']+"#).unwrap(),
            url_domain: Regex::new(
                r#"(?i)\b[a-z0-9][a-z0-9-]*\.(?:com|in|org|net|xyz|tk|ml|ga|cf|gq|top|buzz|click|link|info)(?:/[^\s<>"']*)?"#,
            )
            .unwrap(),
            email: Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap(),
            reference: Regex::new(
                // "number" before "no": alternation is preference-ordered and
                // "no" would otherwise swallow the first two letters.
                r"(?i)\b(case|policy|order)\s*(?:number|no\.?|id|#)?\s*[:#-]?\s*([a-z0-9][a-z0-9/-]{3,19})\b",
            )
            .unwrap(),
            link_denylist,
            enrichment: None,
            enrichment_timeout: Duration::from_secs(8),
        }
    }

    /// Enable the LLM enrichment pass.
    pub fn with_enrichment(mut self, llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        self.enrichment = Some(llm);
        self.enrichment_timeout = timeout;
        self
    }

    /// Extract intelligence from `text`, merging the enrichment pass into the
    /// deterministic result when enrichment is configured and succeeds.
    pub async fn extract(&self, text: &str) -> IntelligenceRecord {
        let mut record = self.extract_deterministic(text);

        if let Some(llm) = &self.enrichment {
            match self.enrich(llm.as_ref(), text).await {
                Ok(extra) => record.merge(extra),
                Err(reason) => {
                    warn!(%reason, "extraction enrichment failed, keeping deterministic result");
                }
            }
        }

        record
    }

    /// The pure regex pass.
    pub fn extract_deterministic(&self, text: &str) -> IntelligenceRecord {
        let mut record = IntelligenceRecord::default();
        let lower = text.to_lowercase();

        for m in self.account_run.find_iter(text) {
            let digits = m.as_str();
            if (ACCOUNT_MIN_DIGITS..=ACCOUNT_MAX_DIGITS).contains(&digits.len()) {
                record.bank_accounts.insert(digits.to_string());
            }
        }
        for m in self.account_grouped.find_iter(text) {
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            if (ACCOUNT_MIN_DIGITS..=ACCOUNT_MAX_DIGITS).contains(&digits.len()) {
                record.bank_accounts.insert(digits);
            }
        }

        for m in self.upi.find_iter(text) {
            record.upi_ids.insert(m.as_str().to_lowercase());
        }

        for caps in self.phone.captures_iter(text) {
            if let Some(normalized) = normalize_phone(&caps[1]) {
                record.phone_numbers.insert(normalized);
            }
        }

        for pattern in [&self.url_scheme, &self.url_www, &self.url_domain] {
            for m in pattern.find_iter(text) {
                let mut url = m.as_str().to_lowercase();
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    url = format!("http://{url}");
                }
                if !self.link_denylist.iter().any(|safe| url.contains(safe)) {
                    record.phishing_links.insert(url);
                }
            }
        }

        for keyword in SCAM_KEYWORDS {
            if lower.contains(keyword) {
                record.suspicious_keywords.insert(keyword.to_string());
            }
        }

        for m in self.email.find_iter(text) {
            record.email_addresses.insert(m.as_str().to_lowercase());
        }

        for caps in self.reference.captures_iter(text) {
            let code = caps[2].to_uppercase();
            // Plain words after "case"/"order" are noise; real reference
            // codes carry at least one digit.
            if !code.chars().any(|c| c.is_ascii_digit()) {
                continue;
            }
            match caps[1].to_lowercase().as_str() {
                "case" => record.case_ids.insert(code),
                "policy" => record.policy_numbers.insert(code),
                _ => record.order_numbers.insert(code),
            };
        }

        debug!(summary = %record.summary(), "deterministic extraction complete");
        record
    }

    async fn enrich(&self, llm: &dyn LlmProvider, text: &str) -> Result<IntelligenceRecord, String> {
        let request = TextRequest::new(enrichment_prompt(text))
            .with_temperature(0.1)
            .with_max_tokens(1024);

        let value = tokio::time::timeout(self.enrichment_timeout, llm.generate_json(request))
            .await
            .map_err(|_| "timed out".to_string())?
            .map_err(|e| e.to_string())?;

        let mut record = IntelligenceRecord::default();
        let mut read = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        record.bank_accounts.extend(read("bankAccounts"));
        record
            .upi_ids
            .extend(read("upiIds").into_iter().map(|s| s.to_lowercase()));
        record.phone_numbers.extend(read("phoneNumbers"));
        record
            .phishing_links
            .extend(read("phishingLinks").into_iter().map(|s| s.to_lowercase()));
        record.suspicious_keywords.extend(
            read("suspiciousKeywords")
                .into_iter()
                .map(|s| s.to_lowercase()),
        );
        record
            .email_addresses
            .extend(read("emailAddresses").into_iter().map(|s| s.to_lowercase()));
        record.case_ids.extend(read("caseIds"));
        record.policy_numbers.extend(read("policyNumbers"));
        record.order_numbers.extend(read("orderNumbers"));

        Ok(record)
    }
}

/// Strip separators and canonicalize to `+91` followed by ten digits.
fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('0') => digits[1..].to_string(),
        12 if digits.starts_with("91") => digits[2..].to_string(),
        _ => return None,
    };
    if matches!(national.bytes().next(), Some(b'6'..=b'9')) {
        Some(format!("+91{national}"))
    } else {
        None
    }
}

fn enrichment_prompt(text: &str) -> String {
    format!(
        r#"Extract ALL scam-related intelligence from this conversation.

CONVERSATION:
{text}

Look for:
1. Bank account numbers (long digit sequences that look like account numbers)
2. UPI IDs (format: user@bank like abc@ybl, xyz@paytm)
3. Phone numbers (Indian format: 10 digits starting with 6-9, with or without +91)
4. URLs/links (especially suspicious or shortened ones)
5. Suspicious keywords (urgency words, threats, financial terms)
6. Email addresses
7. Reference identifiers the sender quotes (case ids, policy numbers, order numbers)

Respond with ONLY valid JSON (no markdown):
{{"bankAccounts": [], "upiIds": [], "phoneNumbers": [], "phishingLinks": [], "suspiciousKeywords": [], "emailAddresses": [], "caseIds": [], "policyNumbers": [], "orderNumbers": []}}"#
    )
}
