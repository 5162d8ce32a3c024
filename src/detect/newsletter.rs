//! Newsletter detector: bulk senders, digests and promotional mail.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::model::detection::{DeliveryFrequency, Newsletter};
use crate::model::email::EmailRecord;

use super::catalog;

/// Score a sender axis must reach to classify.
const AXIS_THRESHOLD: u32 = 40;

/// How a single email classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailCategory {
    Newsletter,
    Promotional,
    Regular,
}

impl MailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newsletter => "newsletter",
            Self::Promotional => "promotional",
            Self::Regular => "regular",
        }
    }
}

/// A single-email detection across both scoring axes.
#[derive(Debug, Clone)]
pub struct NewsletterDetection {
    pub newsletter_score: u32,
    pub promotional_score: u32,
    pub is_newsletter: bool,
    pub is_promotional: bool,
    /// Max of the two axes, capped at 100.
    pub confidence: u32,
    pub unsubscribe_link: Option<String>,
}

/// Independent two-axis scorer (newsletter vs. promotional).
pub struct NewsletterDetector {
    newsletter_subject: Vec<Regex>,
    promo_subject: Vec<Regex>,
    marketing_body: Vec<Regex>,
    list_unsubscribe: Regex,
    anchor: Regex,
    href_keyword: Regex,
    plain_url: Regex,
}

impl Default for NewsletterDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsletterDetector {
    pub fn new() -> Self {
        Self {
            newsletter_subject: build_patterns(&[
                r"\bnewsletter\b",
                r"weekly digest",
                r"monthly roundup",
                r"\bdigest\b",
                r"issue #?\d+",
                r"\bvol\.? ?\d+\b",
            ]),
            promo_subject: build_patterns(&[
                r"save \d+%",
                r"\d+% off",
                r"flash sale",
                r"limited time",
                r"exclusive offer",
                r"use code",
                r"black friday",
                r"cyber monday",
                r"free shipping",
            ]),
            marketing_body: build_patterns(&[
                r"unsubscribe",
                r"manage (?:your )?preferences",
                r"view (?:this email )?in (?:your )?browser",
                r"copyright ©",
                r"all rights reserved",
                r"privacy policy",
                r"email preferences",
                r"you are receiving this",
            ]),
            list_unsubscribe: Regex::new(r"(?i)list-unsubscribe")
                .expect("valid list-unsubscribe pattern"),
            anchor: Regex::new(r#"(?is)<a\s[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
                .expect("valid anchor pattern"),
            href_keyword: Regex::new(
                r#"(?i)href\s*=\s*["']([^"']*(?:unsubscribe|opt-out|email-preferences|manage-preferences)[^"']*)["']"#,
            )
            .expect("valid href pattern"),
            plain_url: Regex::new(
                r"(?i)https?://[^\s\x22'<>]*(?:unsubscribe|opt-out|preferences)[^\s\x22'<>]*",
            )
            .expect("valid url pattern"),
        }
    }

    /// Score a single email on both axes.
    pub fn detect(&self, email: &EmailRecord) -> NewsletterDetection {
        let subject_lower = email.subject.to_lowercase();
        let text = email.classification_text();
        let html = email.html_body.as_deref().unwrap_or("");

        let marketing_hits = self
            .marketing_body
            .iter()
            .filter(|p| p.is_match(&text) || p.is_match(&html.to_lowercase()))
            .count();
        let marketing_newsletter_bonus = match marketing_hits {
            n if n >= 3 => 25,
            2 => 15,
            _ => 0,
        };
        let marketing_promo_bonus = match marketing_hits {
            n if n >= 3 => 20,
            2 => 10,
            _ => 0,
        };

        let promo_subdomain = catalog::has_promotional_subdomain(email.sender_domain());
        let unsubscribe_link = self
            .extract_unsubscribe_link(html)
            .or_else(|| self.extract_unsubscribe_link(&email.body));
        let mentions_list_unsubscribe =
            self.list_unsubscribe.is_match(&text) || self.list_unsubscribe.is_match(html);

        let mut newsletter_score = 0u32;
        if self
            .newsletter_subject
            .iter()
            .any(|p| p.is_match(&subject_lower))
        {
            newsletter_score += 30;
        }
        newsletter_score += marketing_newsletter_bonus;
        if promo_subdomain {
            newsletter_score += 20;
        }
        if unsubscribe_link.is_some() {
            newsletter_score += 15;
        }
        if mentions_list_unsubscribe {
            newsletter_score += 10;
        }

        let mut promotional_score = 0u32;
        if self.promo_subject.iter().any(|p| p.is_match(&subject_lower)) {
            promotional_score += 35;
        }
        promotional_score += marketing_promo_bonus;
        if promo_subdomain {
            promotional_score += 20;
        }
        if unsubscribe_link.is_some() {
            promotional_score += 10;
        }

        let is_promotional = promotional_score >= AXIS_THRESHOLD;
        let is_newsletter = newsletter_score >= AXIS_THRESHOLD && !is_promotional;

        NewsletterDetection {
            newsletter_score,
            promotional_score,
            is_newsletter,
            is_promotional,
            confidence: newsletter_score.max(promotional_score).min(100),
            unsubscribe_link,
        }
    }

    /// Coarse per-email label.
    pub fn categorize(&self, email: &EmailRecord) -> MailCategory {
        let detection = self.detect(email);
        if detection.is_promotional {
            MailCategory::Promotional
        } else if detection.is_newsletter {
            MailCategory::Newsletter
        } else {
            MailCategory::Regular
        }
    }

    /// Detect across a whole archive, grouped by sender address.
    pub fn detect_batch(&self, emails: &[EmailRecord]) -> Vec<Newsletter> {
        struct Group<'a> {
            sender: String,
            emails: Vec<(usize, &'a EmailRecord, NewsletterDetection)>,
            promotional_hits: usize,
        }

        let mut groups: Vec<Group<'_>> = Vec::new();
        for (index, email) in emails.iter().enumerate() {
            let detection = self.detect(email);
            if !detection.is_newsletter && !detection.is_promotional {
                continue;
            }
            let promotional = detection.is_promotional;
            if let Some(pos) = groups.iter().position(|g| g.sender == email.sender) {
                let group = &mut groups[pos];
                group.emails.push((index, email, detection));
                if promotional {
                    group.promotional_hits += 1;
                }
            } else {
                groups.push(Group {
                    sender: email.sender.clone(),
                    emails: vec![(index, email, detection)],
                    promotional_hits: usize::from(promotional),
                });
            }
        }

        groups
            .into_iter()
            .map(|mut group| {
                // Most recent first; the latest-emitted record wins date ties
                group
                    .emails
                    .sort_by(|(ia, a, _), (ib, b, _)| (b.date, ib).cmp(&(a.date, ia)));

                let (_, most_recent, _) = &group.emails[0];
                let dates: Vec<DateTime<Utc>> =
                    group.emails.iter().map(|(_, e, _)| e.date).collect();

                let sender_name = most_recent
                    .sender_name
                    .clone()
                    .or_else(|| {
                        catalog::canonical_sender_name(most_recent.sender_domain())
                            .map(String::from)
                    })
                    .unwrap_or_else(|| {
                        catalog::humanize_domain(most_recent.sender_domain())
                    });

                let unsubscribe_link = group
                    .emails
                    .iter()
                    .find_map(|(_, _, d)| d.unsubscribe_link.clone());

                Newsletter {
                    sender_email: group.sender,
                    sender_name,
                    email_count: group.emails.len() as u64,
                    last_email_date: dates[0],
                    frequency: derive_frequency(&dates),
                    unsubscribe_link,
                    is_promotional: group.promotional_hits * 2 > group.emails.len(),
                }
            })
            .collect()
    }

    /// Ordered unsubscribe-link extraction. Only `http(s)` URLs are accepted;
    /// `javascript:` and `mailto:` are rejected.
    pub fn extract_unsubscribe_link(&self, html: &str) -> Option<String> {
        if html.is_empty() {
            return None;
        }

        // 1. Anchors whose visible text mentions unsubscribing
        for caps in self.anchor.captures_iter(html) {
            let href = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let inner = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if inner.to_lowercase().contains("unsubscribe") && is_http_url(href) {
                return Some(href.to_string());
            }
        }

        // 2. Any href whose URL itself carries an opt-out keyword
        for caps in self.href_keyword.captures_iter(html) {
            let href = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if is_http_url(href) {
                return Some(href.to_string());
            }
        }

        // 3. Plain-URL fallback
        self.plain_url
            .find(html)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ')']).to_string())
            .filter(|url| is_http_url(url))
    }
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Average inter-arrival days over a date-descending list.
fn derive_frequency(dates: &[DateTime<Utc>]) -> DeliveryFrequency {
    if dates.len() < 2 {
        return DeliveryFrequency::Irregular;
    }
    let newest = dates.first().expect("non-empty");
    let oldest = dates.last().expect("non-empty");
    let span_days = (*newest - *oldest).num_days().max(0) as f64;
    let average = span_days / (dates.len() - 1) as f64;

    if average <= 2.0 {
        DeliveryFrequency::Daily
    } else if average <= 10.0 {
        DeliveryFrequency::Weekly
    } else if average <= 45.0 {
        DeliveryFrequency::Monthly
    } else {
        DeliveryFrequency::Irregular
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
    use chrono::TimeZone;

    fn email(
        sender: &str,
        subject: &str,
        body: &str,
        html: Option<&str>,
        date: DateTime<Utc>,
    ) -> EmailRecord {
        EmailRecord {
            subject: subject.into(),
            sender: sender.into(),
            sender_name: None,
            recipients: vec![],
            date,
            body: body.into(),
            html_body: html.map(String::from),
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

    fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    const NEWSLETTER_HTML: &str = r#"<p>This week's stories.</p>
        <a href="https://blog.com/unsubscribe?u=42">Unsubscribe</a>
        <p>Privacy policy | All rights reserved</p>"#;

    #[test]
    fn test_newsletter_detected() {
        let detector = NewsletterDetector::new();
        let detection = detector.detect(&email(
            "newsletter@blog.com",
            "The Weekly Newsletter",
            "unsubscribe privacy policy all rights reserved",
            Some(NEWSLETTER_HTML),
            date(2024, 1, 1),
        ));
        assert!(detection.is_newsletter);
        assert!(!detection.is_promotional);
        assert!(detection.confidence >= 40);
        assert_eq!(
            detection.unsubscribe_link.as_deref(),
            Some("https://blog.com/unsubscribe?u=42")
        );
    }

    #[test]
    fn test_promotional_beats_newsletter() {
        let detector = NewsletterDetector::new();
        let detection = detector.detect(&email(
            "promo.deals@promo.shop.com",
            "Flash sale: 40% off everything",
            "unsubscribe manage preferences view in browser",
            None,
            date(2024, 1, 1),
        ));
        assert!(detection.is_promotional);
        assert!(!detection.is_newsletter);
    }

    #[test]
    fn test_regular_mail() {
        let detector = NewsletterDetector::new();
        let detection = detector.detect(&email(
            "colleague@work.com",
            "Meeting notes",
            "Here are the notes from today.",
            None,
            date(2024, 1, 1),
        ));
        assert!(!detection.is_newsletter);
        assert!(!detection.is_promotional);
        assert_eq!(
            detector.categorize(&email(
                "colleague@work.com",
                "Meeting notes",
                "Here are the notes from today.",
                None,
                date(2024, 1, 1),
            )),
            MailCategory::Regular
        );
    }

    #[test]
    fn test_batch_weekly_frequency() {
        let detector = NewsletterDetector::new();
        let emails: Vec<EmailRecord> = [date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]
            .into_iter()
            .map(|d| {
                email(
                    "newsletter@blog.com",
                    "The Weekly Newsletter",
                    "unsubscribe link below",
                    Some(NEWSLETTER_HTML),
                    d,
                )
            })
            .collect();
        let batch = detector.detect_batch(&emails);
        assert_eq!(batch.len(), 1);
        let entry = &batch[0];
        assert_eq!(entry.sender_email, "newsletter@blog.com");
        assert_eq!(entry.email_count, 3);
        assert_eq!(entry.frequency, DeliveryFrequency::Weekly);
        assert_eq!(entry.last_email_date, date(2024, 1, 15));
        assert!(entry.unsubscribe_link.is_some());
        assert!(!entry.is_promotional);
    }

    #[test]
    fn test_batch_sender_name_from_canonical_map() {
        let detector = NewsletterDetector::new();
        let emails = vec![email(
            "newsletters@nytimes.com",
            "Your Morning Newsletter",
            "unsubscribe privacy policy all rights reserved",
            None,
            date(2024, 2, 1),
        )];
        let batch = detector.detect_batch(&emails);
        assert_eq!(batch[0].sender_name, "New York Times");
    }

    #[test]
    fn test_batch_sender_name_humanized() {
        let detector = NewsletterDetector::new();
        let emails = vec![email(
            "hello@morning-letters.com",
            "Issue #12 newsletter",
            "unsubscribe privacy policy all rights reserved",
            None,
            date(2024, 2, 1),
        )];
        let batch = detector.detect_batch(&emails);
        assert_eq!(batch[0].sender_name, "Morning Letters");
    }

    #[test]
    fn test_extract_link_rejects_bad_schemes() {
        let detector = NewsletterDetector::new();
        assert_eq!(
            detector.extract_unsubscribe_link(
                r#"<a href="javascript:void(0)">Unsubscribe</a>"#
            ),
            None
        );
        assert_eq!(
            detector.extract_unsubscribe_link(r#"<a href="mailto:x@y.com">Unsubscribe</a>"#),
            None
        );
    }

    #[test]
    fn test_extract_link_href_keyword() {
        let detector = NewsletterDetector::new();
        let link = detector.extract_unsubscribe_link(
            r#"<a href="https://news.example/email-preferences/123">click here</a>"#,
        );
        assert_eq!(
            link.as_deref(),
            Some("https://news.example/email-preferences/123")
        );
    }

    #[test]
    fn test_extract_link_plain_url_fallback() {
        let detector = NewsletterDetector::new();
        let link = detector
            .extract_unsubscribe_link("To stop: https://x.com/unsubscribe/abc123.");
        assert_eq!(link.as_deref(), Some("https://x.com/unsubscribe/abc123"));
    }

    #[test]
    fn test_frequency_boundaries() {
        let d = |days: i64| date(2024, 1, 1) + chrono::Duration::days(days);
        assert_eq!(
            derive_frequency(&[d(2), d(1), d(0)]),
            DeliveryFrequency::Daily
        );
        assert_eq!(
            derive_frequency(&[d(14), d(7), d(0)]),
            DeliveryFrequency::Weekly
        );
        assert_eq!(
            derive_frequency(&[d(60), d(30), d(0)]),
            DeliveryFrequency::Monthly
        );
        assert_eq!(
            derive_frequency(&[d(200), d(100), d(0)]),
            DeliveryFrequency::Irregular
        );
        assert_eq!(derive_frequency(&[d(0)]), DeliveryFrequency::Irregular);
    }
}
