//! Integration tests for the detector pipeline, driven through parsed MBOX
//! text.

use mailsift::detect::{
    AccountDetector, NewsletterDetector, PurchaseDetector, SubscriptionDetector,
};
use mailsift::model::detection::{BillingFrequency, DeliveryFrequency};
use mailsift::model::email::EmailRecord;
use mailsift::parser::MboxParser;
use mailsift::reader::ArchiveSource;

fn parse(mbox: &str) -> Vec<EmailRecord> {
    MboxParser::new()
        .parse(ArchiveSource::Buffer(mbox.as_bytes().to_vec()))
        .unwrap()
}

// ─── Purchases: order confirmation end to end ───────────────────────

#[test]
fn test_purchase_detection_from_mbox() {
    let mbox = "From orders@amazon.com Thu Jan 04 10:00:00 2024\n\
        From: orders@amazon.com\n\
        Subject: Your order confirmation #ABC-123456\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        Order total: $49.99\n\
        \n\
        From friend@gmail.com Fri Jan 05 11:00:00 2024\n\
        From: A Friend <friend@gmail.com>\n\
        Subject: Re: weekend plans\n\
        Date: Fri, 05 Jan 2024 11:00:00 +0000\n\
        \n\
        See you at the lake.\n";

    let emails = parse(mbox);
    assert_eq!(emails.len(), 2);

    let purchases = PurchaseDetector::new().detect_batch(&emails);
    assert_eq!(purchases.len(), 1);
    let purchase = &purchases[0];
    assert_eq!(purchase.merchant, "Amazon");
    assert_eq!(purchase.amount, 49.99);
    assert_eq!(purchase.currency, "USD");
    assert_eq!(purchase.order_number.as_deref(), Some("ABC-123456"));
    assert_eq!(purchase.category, "ecommerce");
    assert_eq!(
        purchase.purchase_date.format("%Y-%m-%d").to_string(),
        "2024-01-04"
    );
}

// ─── Newsletters: weekly sender aggregation ─────────────────────────

#[test]
fn test_newsletter_batch_from_mbox() {
    let make = |day: u32, dow: &str| {
        format!(
            "From newsletter@blog.com {dow} Jan {day:02} 08:00:00 2024\n\
             From: The Blog <newsletter@blog.com>\n\
             Subject: The Weekly Newsletter\n\
             Date: {dow}, {day:02} Jan 2024 08:00:00 +0000\n\
             Content-Type: text/html\n\
             \n\
             <p>Stories of the week.</p>\n\
             <a href=\"https://blog.com/unsubscribe?u=7\">Unsubscribe</a>\n\
             <p>Privacy policy. All rights reserved.</p>\n\n"
        )
    };
    let mbox = format!("{}{}{}", make(1, "Mon"), make(8, "Mon"), make(15, "Mon"));

    let emails = parse(&mbox);
    assert_eq!(emails.len(), 3);

    let newsletters = NewsletterDetector::new().detect_batch(&emails);
    assert_eq!(newsletters.len(), 1);
    let entry = &newsletters[0];
    assert_eq!(entry.sender_email, "newsletter@blog.com");
    assert_eq!(entry.email_count, 3);
    assert_eq!(entry.frequency, DeliveryFrequency::Weekly);
    assert_eq!(
        entry.unsubscribe_link.as_deref(),
        Some("https://blog.com/unsubscribe?u=7")
    );
    assert_eq!(
        entry.last_email_date.format("%Y-%m-%d").to_string(),
        "2024-01-15"
    );
    assert_eq!(entry.sender_name, "The Blog");
}

// ─── Accounts: batch dedup is case-insensitive ──────────────────────

#[test]
fn test_account_batch_distinct_service_names() {
    let mbox = "From welcome@netflix.com Thu Jan 04 10:00:00 2024\n\
        From: Netflix <welcome@netflix.com>\n\
        Subject: Welcome to Netflix!\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        Your account has been created.\n\
        \n\
        From info@mail.netflix.com Fri Jan 05 11:00:00 2024\n\
        From: Netflix <info@mail.netflix.com>\n\
        Subject: Verify your email address\n\
        Date: Fri, 05 Jan 2024 11:00:00 +0000\n\
        \n\
        Click here to verify your email.\n\
        \n\
        From noreply@github.com Sat Jan 06 12:00:00 2024\n\
        From: GitHub <noreply@github.com>\n\
        Subject: Welcome to GitHub\n\
        Date: Sat, 06 Jan 2024 12:00:00 +0000\n\
        \n\
        Please confirm your email address to activate your account.\n";

    let emails = parse(mbox);
    let accounts = AccountDetector::new().detect_batch(&emails);

    // Pairwise distinct lowercased service names
    let mut names: Vec<String> = accounts
        .iter()
        .map(|a| a.service_name.to_lowercase())
        .collect();
    let before = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), before);

    let netflix = accounts
        .iter()
        .find(|a| a.service_name == "Netflix")
        .unwrap();
    assert_eq!(netflix.email_count, 2);
    assert_eq!(
        netflix.signup_date.format("%Y-%m-%d").to_string(),
        "2024-01-04"
    );
}

// ─── Subscriptions: grouping and frequency ──────────────────────────

#[test]
fn test_subscription_batch_from_mbox() {
    let mbox = "From billing@spotify.com Thu Feb 01 10:00:00 2024\n\
        From: Spotify <billing@spotify.com>\n\
        Subject: Your subscription renewed\n\
        Date: Thu, 01 Feb 2024 10:00:00 +0000\n\
        \n\
        Amount charged: $9.99 for your monthly subscription. Cancel anytime.\n\
        \n\
        From billing@spotify.com Fri Mar 01 10:00:00 2024\n\
        From: Spotify <billing@spotify.com>\n\
        Subject: Your subscription renewed\n\
        Date: Fri, 01 Mar 2024 10:00:00 +0000\n\
        \n\
        Amount charged: $10.99 for your monthly subscription. Cancel anytime.\n";

    let emails = parse(mbox);
    let subs = SubscriptionDetector::new().detect_batch(&emails);
    assert_eq!(subs.len(), 1);
    let sub = &subs[0];
    assert_eq!(sub.service_name, "Spotify");
    assert_eq!(sub.monthly_amount, 10.99);
    assert_eq!(sub.frequency, BillingFrequency::Monthly);
    assert_eq!(sub.email_ids, vec![0, 1]);
    assert_eq!(sub.category, "streaming");
}

// ─── Amount round-trip: printed canonical forms are recovered ───────

#[test]
fn test_amount_round_trip() {
    let detector = PurchaseDetector::new();
    let cases: &[(&str, f64, &str)] = &[
        ("$12.34", 12.34, "USD"),
        ("$1,299.00", 1299.00, "USD"),
        ("€9,99", 9.99, "EUR"),
        ("€1.234,56", 1234.56, "EUR"),
        ("£75.00", 75.00, "GBP"),
    ];

    for (printed, amount, currency) in cases {
        let mbox = format!(
            "From orders@amazon.com Thu Jan 04 10:00:00 2024\n\
             From: orders@amazon.com\n\
             Subject: Your order confirmation #XY-10001\n\
             Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
             \n\
             Order total: {printed}\n"
        );
        let emails = parse(&mbox);
        let purchases = detector.detect_batch(&emails);
        assert_eq!(purchases.len(), 1, "no purchase for {printed}");
        assert_eq!(purchases[0].amount, *amount, "amount for {printed}");
        assert_eq!(purchases[0].currency, *currency, "currency for {printed}");
    }
}

// ─── Detectors never error on arbitrary mail ────────────────────────

#[test]
fn test_detectors_are_total() {
    let mbox = "From someone@nowhere.example Thu Jan 04 10:00:00 2024\n\
        From: someone@nowhere.example\n\
        Subject: (no signals here)\n\
        Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
        \n\
        Just an ordinary note with no commerce at all.\n";
    let emails = parse(mbox);

    assert!(AccountDetector::new().detect_batch(&emails).is_empty());
    assert!(PurchaseDetector::new().detect_batch(&emails).is_empty());
    assert!(SubscriptionDetector::new().detect_batch(&emails).is_empty());
    assert!(NewsletterDetector::new().detect_batch(&emails).is_empty());
}

// ─── Catalog accessors ──────────────────────────────────────────────

#[test]
fn test_known_catalogs_exposed() {
    assert!(AccountDetector::new().known_services().len() >= 100);
    assert!(PurchaseDetector::new().known_merchants().len() >= 25);
    assert!(SubscriptionDetector::new().known_services().len() >= 40);

    let detector = PurchaseDetector::new();
    assert_eq!(detector.category("Amazon"), Some("ecommerce"));
    assert_eq!(detector.category("amazon"), Some("ecommerce"));
    assert_eq!(detector.category("Unknown Shop"), None);
}
