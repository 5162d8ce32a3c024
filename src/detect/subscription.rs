//! Subscription detector: recurring paid services.

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::model::detection::{BillingFrequency, Subscription};
use crate::model::email::EmailRecord;

use super::amount::AmountExtractor;
use super::catalog::{self, SubscriptionEntry};

/// A single-email subscription detection.
#[derive(Debug, Clone)]
pub struct SubscriptionDetection {
    pub service_name: String,
    pub amount: f64,
    pub currency: String,
    pub frequency: BillingFrequency,
    pub category: String,
}

/// Two-stage qualifier plus amount/frequency extraction.
pub struct SubscriptionDetector {
    subject_patterns: Vec<Regex>,
    body_patterns: Vec<Regex>,
    name_extractors: Vec<Regex>,
    yearly: Regex,
    weekly: Regex,
    amounts: AmountExtractor,
}

impl Default for SubscriptionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionDetector {
    pub fn new() -> Self {
        Self {
            subject_patterns: build_patterns(&[
                r"subscription (?:confirmed|renewed|receipt|renewal)",
                r"your (?:monthly|yearly|annual) (?:subscription|membership|plan)",
                r"auto.?renew",
                r"recurring (?:payment|charge)",
                r"subscription payment",
                r"membership renewal",
            ]),
            body_patterns: build_patterns(&[
                r"subscription plan:",
                r"billing period:",
                r"next billing date:",
                r"(?:monthly|annual|yearly) subscription",
                r"renews on",
                r"cancel anytime",
                r"manage your subscription",
            ]),
            name_extractors: vec![
                Regex::new(r"(?i)your ([A-Za-z][A-Za-z0-9 .+&'-]{1,29}?) (?:subscription|membership|plan)\b")
                    .expect("valid name extractor"),
                Regex::new(r"(?i)subscription to ([A-Za-z][A-Za-z0-9 .+&'-]{1,29}?)(?:[!.,]|$)")
                    .expect("valid name extractor"),
            ],
            yearly: Regex::new(r"yearly|annual|per year|/year").expect("valid frequency pattern"),
            weekly: Regex::new(r"weekly|per week|/week").expect("valid frequency pattern"),
            amounts: AmountExtractor::new(),
        }
    }

    /// Services the detector recognizes by sender domain.
    pub fn known_services(&self) -> &'static [SubscriptionEntry] {
        catalog::SUBSCRIPTION_CATALOG
    }

    /// Score a single email.
    pub fn detect(&self, email: &EmailRecord) -> Option<SubscriptionDetection> {
        let subject_lower = email.subject.to_lowercase();
        let text = email.classification_text();

        // Stage 1: one strong subject hit qualifies outright; otherwise two
        // distinct body hits are required.
        let subject_hit = self
            .subject_patterns
            .iter()
            .any(|p| p.is_match(&subject_lower));
        let body_hits = self
            .body_patterns
            .iter()
            .filter(|p| p.is_match(&text))
            .count();
        if !subject_hit && body_hits < 2 {
            return None;
        }

        let domain = email.sender_domain();
        let catalog_hit = catalog::find_subscription(domain);

        let money = self.amounts.extract(&text);
        let frequency = self.derive_frequency(&text);

        let (service_name, category) = match catalog_hit {
            Some(entry) => (entry.name.to_string(), entry.category.to_string()),
            None => {
                let name = self
                    .extract_service_name(&email.subject)
                    .or_else(|| self.extract_service_name(&email.body))
                    .or_else(|| email.sender_name.clone())
                    .unwrap_or_else(|| catalog::humanize_domain(domain));
                (name, "other".to_string())
            }
        };
        if service_name.is_empty() {
            return None;
        }

        Some(SubscriptionDetection {
            service_name,
            amount: money.as_ref().map(|m| m.amount).unwrap_or(0.0),
            currency: money
                .map(|m| m.currency)
                .unwrap_or_else(|| "USD".to_string()),
            frequency,
            category,
        })
    }

    /// Detect across a whole archive, grouped case-insensitively by service
    /// name. The most recent email in a group drives its fields.
    pub fn detect_batch(&self, emails: &[EmailRecord]) -> Vec<Subscription> {
        let newest_overall = emails.iter().map(|e| e.date).max();
        let mut subscriptions: Vec<Subscription> = Vec::new();

        for (index, email) in emails.iter().enumerate() {
            let Some(detection) = self.detect(email) else {
                continue;
            };
            let key = detection.service_name.to_lowercase();

            if let Some(pos) = subscriptions
                .iter()
                .position(|s| s.service_name.to_lowercase() == key)
            {
                let existing = &mut subscriptions[pos];
                existing.email_ids.push(index as u64);
                if email.date >= existing.last_renewal_date {
                    existing.last_renewal_date = email.date;
                    existing.frequency = detection.frequency;
                    if detection.amount > 0.0 {
                        existing.monthly_amount = detection.amount;
                        existing.currency = detection.currency;
                    }
                }
            } else {
                subscriptions.push(Subscription {
                    service_name: detection.service_name,
                    monthly_amount: detection.amount,
                    currency: detection.currency,
                    frequency: detection.frequency,
                    last_renewal_date: email.date,
                    email_ids: vec![index as u64],
                    is_active: true,
                    category: detection.category,
                });
            }
        }

        if let Some(newest) = newest_overall {
            for subscription in &mut subscriptions {
                subscription.is_active =
                    is_active(subscription.last_renewal_date, subscription.frequency, newest);
            }
        }

        subscriptions
    }

    /// Keyword scan: yearly and weekly markers, monthly as the default.
    fn derive_frequency(&self, text: &str) -> BillingFrequency {
        if self.yearly.is_match(text) {
            BillingFrequency::Yearly
        } else if self.weekly.is_match(text) {
            BillingFrequency::Weekly
        } else {
            BillingFrequency::Monthly
        }
    }

    fn extract_service_name(&self, haystack: &str) -> Option<String> {
        for pattern in &self.name_extractors {
            if let Some(caps) = pattern.captures(haystack) {
                let name = caps.get(1)?.as_str().trim();
                if name.len() >= 2 && name.chars().next().is_some_and(|c| c.is_alphabetic()) {
                    // Generic qualifiers are not service names
                    let lower = name.to_lowercase();
                    if !matches!(lower.as_str(), "monthly" | "yearly" | "annual" | "current") {
                        return Some(name.to_string());
                    }
                }
            }
        }
        None
    }
}

/// A subscription is considered active while the gap since its last renewal
/// stays under two billing periods, measured against the newest email in the
/// archive.
fn is_active(
    last_renewal: DateTime<Utc>,
    frequency: BillingFrequency,
    newest: DateTime<Utc>,
) -> bool {
    let period_days = match frequency {
        BillingFrequency::Weekly => 7,
        BillingFrequency::Monthly => 31,
        BillingFrequency::Yearly => 366,
    };
    newest - last_renewal <= Duration::days(2 * period_days)
}

fn build_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("valid detector pattern"))
        .collect()
}
