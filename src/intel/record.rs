//! The accumulated intelligence record for a conversation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Deduplicated intelligence gathered from a conversation.
///
/// Each category is a set of unique strings. Records grow monotonically:
/// [`IntelligenceRecord::merge`] is a per-category set union, so merging is
/// commutative, associative, and idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntelligenceRecord {
    pub bank_accounts: BTreeSet<String>,
    pub upi_ids: BTreeSet<String>,
    pub phone_numbers: BTreeSet<String>,
    pub phishing_links: BTreeSet<String>,
    pub suspicious_keywords: BTreeSet<String>,
    pub email_addresses: BTreeSet<String>,
    pub case_ids: BTreeSet<String>,
    pub policy_numbers: BTreeSet<String>,
    pub order_numbers: BTreeSet<String>,
}

impl IntelligenceRecord {
    /// Union `other` into this record.
    pub fn merge(&mut self, other: IntelligenceRecord) {
        self.bank_accounts.extend(other.bank_accounts);
        self.upi_ids.extend(other.upi_ids);
        self.phone_numbers.extend(other.phone_numbers);
        self.phishing_links.extend(other.phishing_links);
        self.suspicious_keywords.extend(other.suspicious_keywords);
        self.email_addresses.extend(other.email_addresses);
        self.case_ids.extend(other.case_ids);
        self.policy_numbers.extend(other.policy_numbers);
        self.order_numbers.extend(other.order_numbers);
    }

    /// True only when every category is empty.
    pub fn is_empty(&self) -> bool {
        self.bank_accounts.is_empty()
            && self.upi_ids.is_empty()
            && self.phone_numbers.is_empty()
            && self.phishing_links.is_empty()
            && self.suspicious_keywords.is_empty()
            && self.email_addresses.is_empty()
            && self.case_ids.is_empty()
            && self.policy_numbers.is_empty()
            && self.order_numbers.is_empty()
    }

    /// Short count summary, e.g. `2 accounts, 1 UPI id, 3 keywords`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let mut add = |count: usize, singular: &str, plural: &str| {
            if count == 1 {
                parts.push(format!("1 {singular}"));
            } else if count > 1 {
                parts.push(format!("{count} {plural}"));
            }
        };
        add(self.bank_accounts.len(), "account", "accounts");
        add(self.upi_ids.len(), "UPI id", "UPI ids");
        add(self.phone_numbers.len(), "phone number", "phone numbers");
        add(self.phishing_links.len(), "link", "links");
        add(self.email_addresses.len(), "email", "emails");
        add(self.case_ids.len(), "case id", "case ids");
        add(self.policy_numbers.len(), "policy number", "policy numbers");
        add(self.order_numbers.len(), "order number", "order numbers");
        add(self.suspicious_keywords.len(), "keyword", "keywords");

        if parts.is_empty() {
            "no artifacts".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(accounts: &[&str], upis: &[&str]) -> IntelligenceRecord {
        IntelligenceRecord {
            bank_accounts: accounts.iter().map(|s| s.to_string()).collect(),
            upi_ids: upis.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn merge_is_commutative() {
        let a = record(&["12345678901"], &["a@upi"]);
        let b = record(&["98765432109"], &["b@paytm"]);

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = record(&["12345678901", "98765432109"], &["a@upi"]);
        let mut merged = a.clone();
        merged.merge(a.clone());
        assert_eq!(merged, a);
    }

    #[test]
    fn merge_deduplicates_within_category() {
        let mut a = record(&["12345678901"], &[]);
        a.merge(record(&["12345678901"], &[]));
        assert_eq!(a.bank_accounts.len(), 1);
    }

    #[test]
    fn empty_only_when_all_categories_empty() {
        let mut rec = IntelligenceRecord::default();
        assert!(rec.is_empty());

        rec.order_numbers.insert("ORD-99812".to_string());
        assert!(!rec.is_empty());
    }

    #[test]
    fn summary_lists_nonempty_categories() {
        let rec = record(&["12345678901", "98765432109"], &["a@upi"]);
        let summary = rec.summary();
        assert!(summary.contains("2 accounts"));
        assert!(summary.contains("1 UPI id"));
        assert!(!summary.contains("phone"));
    }

    #[test]
    fn serializes_with_wire_names() {
        let rec = record(&["12345678901"], &[]);
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("bankAccounts").is_some());
        assert!(json.get("suspiciousKeywords").is_some());
    }
}
