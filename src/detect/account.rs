//! Account detector: "the user just created an account at service X".

use regex::Regex;

use crate::model::detection::{AccountSignup, ServiceType};
use crate::model::email::EmailRecord;

use super::catalog::{self, ServiceEntry};

/// Minimum confidence for a detection to be reported.
const CONFIDENCE_THRESHOLD: u32 = 70;

/// A single-email detection with its confidence score.
#[derive(Debug, Clone)]
pub struct AccountDetection {
    pub service_name: String,
    pub service_type: ServiceType,
    pub domain: String,
    pub confidence: u32,
}

/// Scores emails for account-creation signals against the service catalog
/// and signup phrase patterns.
pub struct AccountDetector {
    subject_patterns: Vec<Regex>,
    body_patterns: Vec<Regex>,
    name_extractors: Vec<Regex>,
}

impl Default for AccountDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountDetector {
    pub fn new() -> Self {
        Self {
            subject_patterns: build_patterns(&[
                r"^welcome to\b",
                r"^verify your .*(email|account)",
                r"^activate your .*account",
                r"^confirm your (email|account|registration)",
                r"email verification",
                r"^your .*account (has been|was) created",
                r"^thanks for (signing up|joining|registering)",
                r"^complete your (registration|sign.?up)",
                r"^get started with\b",
                r"^account confirmation",
            ]),
            body_patterns: build_patterns(&[
                r"click .{0,40}to verify your email",
                r"your account has been created",
                r"verification code:?\s*\d{4,8}",
                r"confirm your email address",
                r"thanks for creating an account",
                r"activate your account",
                r"complete your registration",
                r"welcome aboard",
            ]),
            // Run against the original-case subject: service names are the
            // capitalized spans.
            name_extractors: vec![
                Regex::new(r"^Welcome to ([A-Za-z][A-Za-z0-9 .+&'-]{0,28}?)[!.,]?$")
                    .expect("valid name extractor"),
                Regex::new(
                    r"(?i)thanks for (?:signing up|joining|registering)(?: (?:for|with))? ([A-Za-z][A-Za-z0-9 .+&'-]{0,28}?)[!.,]?$",
                )
                .expect("valid name extractor"),
                Regex::new(r"^Get started with ([A-Za-z][A-Za-z0-9 .+&'-]{0,28}?)[!.,]?$")
                    .expect("valid name extractor"),
            ],
        }
    }

    /// Services the detector recognizes by sender domain.
    pub fn known_services(&self) -> &'static [ServiceEntry] {
        catalog::SERVICE_CATALOG
    }

    /// Score a single email. Returns a detection only when confidence
    /// reaches the threshold and a service name exists.
    pub fn detect(&self, email: &EmailRecord) -> Option<AccountDetection> {
        let domain = email.sender_domain().to_string();
        let subject_lower = email.subject.to_lowercase();
        let body_lower = email.body.to_lowercase();

        let catalog_hit = catalog::find_service(&domain);

        let mut confidence = 0u32;
        if catalog_hit.is_some() {
            confidence += 40;
        }
        if self.subject_patterns.iter().any(|p| p.is_match(&subject_lower)) {
            confidence += 40;
        }
        if self.body_patterns.iter().any(|p| p.is_match(&body_lower)) {
            confidence += 30;
        }

        let extracted_name = self.extract_service_name(&email.subject);
        if catalog_hit.is_none() && extracted_name.is_some() {
            confidence += 10;
        }

        let confidence = confidence.min(100);
        if confidence < CONFIDENCE_THRESHOLD {
            return None;
        }

        let (service_name, service_type) = match catalog_hit {
            Some(entry) => (entry.name.to_string(), entry.service_type),
            None => (extracted_name?, ServiceType::Other),
        };

        Some(AccountDetection {
            service_name,
            service_type,
            domain,
            confidence,
        })
    }

    /// Detect across a whole archive, deduplicating case-insensitively on
    /// service name. The earliest signup date wins; later hits only bump the
    /// email count.
    pub fn detect_batch(&self, emails: &[EmailRecord]) -> Vec<AccountSignup> {
        let mut accounts: Vec<AccountSignup> = Vec::new();

        for (index, email) in emails.iter().enumerate() {
            let Some(detection) = self.detect(email) else {
                continue;
            };
            let key = detection.service_name.to_lowercase();

            if let Some(pos) = accounts
                .iter()
                .position(|a| a.service_name.to_lowercase() == key)
            {
                let existing = &mut accounts[pos];
                existing.email_count += 1;
                if email.date < existing.signup_date {
                    existing.signup_date = email.date;
                    existing.signup_email_id = index as u64;
                }
            } else {
                accounts.push(AccountSignup {
                    service_name: detection.service_name,
                    signup_date: email.date,
                    service_type: detection.service_type,
                    domain: detection.domain,
                    email_count: 1,
                    signup_email_id: index as u64,
                });
            }
        }

        accounts
    }

    /// Ordered extraction attempts against the subject line.
    fn extract_service_name(&self, subject: &str) -> Option<String> {
        for pattern in &self.name_extractors {
            if let Some(caps) = pattern.captures(subject.trim()) {
                let name = caps.get(1)?.as_str().trim().trim_end_matches(['!', '.', ',']);
                if name.len() >= 2
                    && name.len() <= 30
                    && name.chars().next().is_some_and(|c| c.is_alphabetic())
                {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}

fn build_patterns(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|s| Regex::new(s).expect("valid detector pattern"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email(sender: &str, subject: &str, body: &str) -> EmailRecord {
        EmailRecord {
            subject: subject.into(),
            sender: sender.into(),
            sender_name: None,
            recipients: vec![],
            date: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap(),
            body: body.into(),
            html_body: None,
            size: body.len(),
            is_read: true,
            is_starred: false,
            folder_id: "inbox".into(),
            labels: None,
            thread_id: None,
            message_id: None,
            has_attachments: false,
            attachments: vec![],
        }
    }

    #[test]
    fn test_catalog_plus_subject_detects() {
        let detector = AccountDetector::new();
        let detection = detector
            .detect(&email(
                "welcome@netflix.com",
                "Welcome to Netflix!",
                "Start watching today.",
            ))
            .unwrap();
        assert_eq!(detection.service_name, "Netflix");
        assert_eq!(detection.service_type, ServiceType::Streaming);
        assert!(detection.confidence >= 80);
    }

    #[test]
    fn test_subdomain_sender_matches_catalog() {
        let detector = AccountDetector::new();
        let detection = detector
            .detect(&email(
                "no-reply@mail.spotify.com",
                "Verify your email address",
                "Click here to verify your email.",
            ))
            .unwrap();
        assert_eq!(detection.service_name, "Spotify");
    }

    #[test]
    fn test_unknown_service_extracted_from_subject() {
        let detector = AccountDetector::new();
        let detection = detector
            .detect(&email(
                "hello@fancyapp.io",
                "Welcome to FancyApp",
                "Your account has been created. Verification code: 482913",
            ))
            .unwrap();
        assert_eq!(detection.service_name, "FancyApp");
        assert_eq!(detection.service_type, ServiceType::Other);
        // subject 40 + body 30 + extraction 10
        assert_eq!(detection.confidence, 80);
    }

    #[test]
    fn test_plain_email_not_detected() {
        let detector = AccountDetector::new();
        assert!(detector
            .detect(&email(
                "friend@gmail.com",
                "Lunch tomorrow?",
                "Want to grab lunch?",
            ))
            .is_none());
    }

    #[test]
    fn test_catalog_hit_alone_is_below_threshold() {
        let detector = AccountDetector::new();
        assert!(detector
            .detect(&email(
                "news@netflix.com",
                "New shows this week",
                "Check out what's trending.",
            ))
            .is_none());
    }

    #[test]
    fn test_batch_dedupes_case_insensitively() {
        let detector = AccountDetector::new();
        let mut first = email(
            "welcome@netflix.com",
            "Welcome to Netflix!",
            "Your account has been created.",
        );
        first.date = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let mut second = email(
            "info@mail.netflix.com",
            "Verify your email address",
            "Click here to verify your email.",
        );
        second.date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let accounts = detector.detect_batch(&[first, second]);
        assert_eq!(accounts.len(), 1);
        let account = &accounts[0];
        assert_eq!(account.service_name, "Netflix");
        assert_eq!(account.email_count, 2);
        // Earliest date wins, from the second email
        assert_eq!(
            account.signup_date,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(account.signup_email_id, 1);
    }

    #[test]
    fn test_batch_distinct_names() {
        let detector = AccountDetector::new();
        let emails = vec![
            email(
                "welcome@netflix.com",
                "Welcome to Netflix!",
                "Your account has been created.",
            ),
            email(
                "team@github.com",
                "Verify your email address",
                "Click the link to verify your email.",
            ),
        ];
        let accounts = detector.detect_batch(&emails);
        assert_eq!(accounts.len(), 2);
        let mut names: Vec<String> = accounts
            .iter()
            .map(|a| a.service_name.to_lowercase())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_name_extraction_bounds() {
        let detector = AccountDetector::new();
        assert_eq!(
            detector.extract_service_name("Welcome to Figma!"),
            Some("Figma".to_string())
        );
        assert_eq!(
            detector.extract_service_name("Thanks for signing up for Morning Brew"),
            Some("Morning Brew".to_string())
        );
        // Too short
        assert_eq!(detector.extract_service_name("Welcome to X"), None);
        // Must start alphabetic
        assert_eq!(detector.extract_service_name("Welcome to 123go"), None);
    }
}
