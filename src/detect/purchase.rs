//! Purchase detector: order confirmations, receipts and invoices.

use regex::Regex;

use crate::model::detection::Purchase;
use crate::model::email::EmailRecord;

use super::amount::AmountExtractor;
use super::catalog::{self, MerchantEntry};

/// Minimum confidence for a detection to be reported.
const CONFIDENCE_THRESHOLD: u32 = 70;

/// Distinct anti-pattern hits that disqualify a message as promotional.
const ANTI_PATTERN_LIMIT: usize = 3;

/// CSS-ish suffixes that disqualify an order-number token scraped from HTML.
const BOGUS_ORDER_SUFFIXES: &[&str] = &["-collapse", "-color", "-width", "-height", "-style"];

/// A single-email purchase detection with its confidence score.
#[derive(Debug, Clone)]
pub struct PurchaseDetection {
    pub merchant: String,
    pub amount: f64,
    pub currency: String,
    pub order_number: Option<String>,
    pub items: Vec<String>,
    pub category: String,
    pub confidence: u32,
}

/// Scores emails for purchase signals, guarded by a promotional
/// anti-pattern pass.
pub struct PurchaseDetector {
    anti_patterns: Vec<Regex>,
    subject_patterns: Vec<Regex>,
    body_patterns: Vec<Regex>,
    order_number_patterns: Vec<Regex>,
    item_line: Regex,
    amounts: AmountExtractor,
}

impl Default for PurchaseDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseDetector {
    pub fn new() -> Self {
        Self {
            anti_patterns: build_patterns(&[
                r"save \$?\d+",
                r"(?:up to )?\d+% off",
                r"free shipping",
                r"limited time",
                r"promo code",
                r"coupon",
                r"shop now",
                r"flash sale",
                r"deal of the day",
                r"exclusive offer",
                r"clearance",
                r"unsubscribe",
            ]),
            subject_patterns: build_patterns(&[
                r"^(?:your )?order (?:confirmation|receipt|#)",
                r"^receipt (?:for|from)",
                r"^invoice",
                r"^shipping confirmation",
                r"^your order has (?:been )?(?:shipped|dispatched)",
                r"^payment (?:confirmation|received)",
                r"^thank you for your (?:order|purchase)",
            ]),
            body_patterns: build_patterns(&[
                r"order total:?\s*[$€£¥]",
                r"payment of [$€£¥]",
                r"total charged",
                r"your order (?:number|#)",
                r"has been charged",
                r"billed to",
            ]),
            order_number_patterns: vec![
                Regex::new(r"(?i)order\s*(?:number|no\.?|id)?\s*[:#]\s*([A-Za-z0-9][A-Za-z0-9-]{3,29})")
                    .expect("valid order pattern"),
                Regex::new(
                    r"(?i)(?:confirmation|invoice|reference)\s*(?:number|no\.?)?\s*[:#]\s*([A-Za-z0-9][A-Za-z0-9-]{3,29})",
                )
                .expect("valid order pattern"),
                Regex::new(r"#\s?([A-Za-z0-9][A-Za-z0-9-]{3,29})").expect("valid order pattern"),
            ],
            item_line: Regex::new(r"(?m)^\s*\d+\s?x\s+(.{2,60}?)\s*$").expect("valid item pattern"),
            amounts: AmountExtractor::new(),
        }
    }

    /// Merchants the detector recognizes by sender domain.
    pub fn known_merchants(&self) -> &'static [MerchantEntry] {
        catalog::MERCHANT_CATALOG
    }

    /// Category for a merchant display name, when cataloged.
    pub fn category(&self, merchant: &str) -> Option<&'static str> {
        catalog::MERCHANT_CATALOG
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(merchant))
            .map(|m| m.category)
    }

    /// Score a single email.
    pub fn detect(&self, email: &EmailRecord) -> Option<PurchaseDetection> {
        let text = email.classification_text();

        // Promotional mail quotes prices everywhere; bail out before scoring.
        let anti_hits = self
            .anti_patterns
            .iter()
            .filter(|p| p.is_match(&text))
            .count();
        if anti_hits >= ANTI_PATTERN_LIMIT {
            return None;
        }

        let domain = email.sender_domain();
        let subject_lower = email.subject.to_lowercase();
        let catalog_hit = catalog::find_merchant(domain);

        let mut confidence = 0u32;
        if catalog_hit.is_some() {
            confidence += 30;
        }
        if self
            .subject_patterns
            .iter()
            .any(|p| p.is_match(&subject_lower))
        {
            confidence += 35;
        }
        if self.body_patterns.iter().any(|p| p.is_match(&text)) {
            confidence += 25;
        }

        if confidence < 30 {
            return None;
        }

        let money = self.amounts.extract(&text);
        if let Some(ref m) = money {
            confidence += if m.amount > 0.0 && m.amount < 10_000.0 {
                20
            } else {
                10
            };
        }

        let order_number = self.extract_order_number(&email.subject, &email.body);
        if order_number.is_some() {
            confidence += 15;
        }

        let confidence = confidence.min(100);
        let money = money?;
        if confidence < CONFIDENCE_THRESHOLD || money.amount <= 0.0 {
            return None;
        }

        let merchant = match catalog_hit {
            Some(entry) => entry.name.to_string(),
            None => email
                .sender_name
                .clone()
                .unwrap_or_else(|| catalog::humanize_domain(domain)),
        };
        if merchant.is_empty() {
            return None;
        }

        let category = catalog_hit
            .map(|m| m.category.to_string())
            .unwrap_or_else(|| "other".to_string());

        Some(PurchaseDetection {
            merchant,
            amount: money.amount,
            currency: money.currency,
            order_number,
            items: self.extract_items(&email.body),
            category,
            confidence,
        })
    }

    /// Detect across a whole archive. Purchases are per-email; no
    /// deduplication applies.
    pub fn detect_batch(&self, emails: &[EmailRecord]) -> Vec<Purchase> {
        emails
            .iter()
            .filter_map(|email| {
                self.detect(email).map(|d| Purchase {
                    merchant: d.merchant,
                    amount: d.amount,
                    currency: d.currency,
                    purchase_date: email.date,
                    order_number: d.order_number,
                    items: d.items,
                    category: d.category,
                })
            })
            .collect()
    }

    /// Ordered extraction of an order number from subject, then body.
    fn extract_order_number(&self, subject: &str, body: &str) -> Option<String> {
        for haystack in [subject, body] {
            for pattern in &self.order_number_patterns {
                for caps in pattern.captures_iter(haystack) {
                    let token = caps.get(1)?.as_str().to_uppercase();
                    if is_valid_order_number(&token) {
                        return Some(token);
                    }
                }
            }
        }
        None
    }

    /// Item descriptions from "2 x Widget" style lines.
    fn extract_items(&self, body: &str) -> Vec<String> {
        self.item_line
            .captures_iter(body)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .take(20)
            .collect()
    }
}

/// Order-number validity: 5–30 chars, leading alphanumeric, `[A-Z0-9-]`
/// alphabet, at least one digit, and no CSS-ish suffix.
fn is_valid_order_number(token: &str) -> bool {
    let len = token.len();
    if !(5..=30).contains(&len) {
        return false;
    }
    if !token.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    if !token
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return false;
    }
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let lower = token.to_lowercase();
    if BOGUS_ORDER_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return false;
    }
    true
}

fn build_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("valid detector pattern"))
        .collect()
}
