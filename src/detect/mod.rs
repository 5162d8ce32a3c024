//! Rule-based detector pipeline.
//!
//! Four detectors score every email against pre-compiled pattern catalogs:
//! account sign-ups, purchases, subscriptions and newsletters. Detectors are
//! stateless between calls; batch mode owns temporary aggregation maps that
//! are released when the batch result returns.

pub mod account;
pub mod amount;
pub mod catalog;
pub mod newsletter;
pub mod purchase;
pub mod subscription;

pub use account::{AccountDetection, AccountDetector};
pub use amount::{AmountExtractor, Money};
pub use newsletter::{MailCategory, NewsletterDetection, NewsletterDetector};
pub use purchase::{PurchaseDetection, PurchaseDetector};
pub use subscription::{SubscriptionDetection, SubscriptionDetector};

use crate::model::detection::{AccountSignup, Newsletter, Purchase, Subscription};
use crate::model::email::EmailRecord;

/// Which detectors a pipeline run executes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorSelection {
    pub accounts: bool,
    pub purchases: bool,
    pub subscriptions: bool,
    pub newsletters: bool,
}

impl DetectorSelection {
    /// Run everything.
    pub fn all() -> Self {
        Self {
            accounts: true,
            purchases: true,
            subscriptions: true,
            newsletters: true,
        }
    }

    pub fn any(&self) -> bool {
        self.accounts || self.purchases || self.subscriptions || self.newsletters
    }
}

/// Aggregated output of one pipeline run.
#[derive(Debug, Default)]
pub struct DetectionResults {
    pub accounts: Vec<AccountSignup>,
    pub purchases: Vec<Purchase>,
    pub subscriptions: Vec<Subscription>,
    pub newsletters: Vec<Newsletter>,
}

/// The four detectors bundled for a single archive pass.
///
/// Construction compiles every pattern catalog once; the set is cheap to
/// reuse across batches.
pub struct DetectorPipeline {
    accounts: AccountDetector,
    purchases: PurchaseDetector,
    subscriptions: SubscriptionDetector,
    newsletters: NewsletterDetector,
}

impl Default for DetectorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorPipeline {
    pub fn new() -> Self {
        Self {
            accounts: AccountDetector::new(),
            purchases: PurchaseDetector::new(),
            subscriptions: SubscriptionDetector::new(),
            newsletters: NewsletterDetector::new(),
        }
    }

    pub fn accounts(&self) -> &AccountDetector {
        &self.accounts
    }

    pub fn purchases(&self) -> &PurchaseDetector {
        &self.purchases
    }

    pub fn subscriptions(&self) -> &SubscriptionDetector {
        &self.subscriptions
    }

    pub fn newsletters(&self) -> &NewsletterDetector {
        &self.newsletters
    }

    /// Run the selected detectors over an archive's emails, in emission
    /// order.
    pub fn run(&self, emails: &[EmailRecord], selection: DetectorSelection) -> DetectionResults {
        let mut results = DetectionResults::default();
        if selection.accounts {
            results.accounts = self.accounts.detect_batch(emails);
        }
        if selection.purchases {
            results.purchases = self.purchases.detect_batch(emails);
        }
        if selection.subscriptions {
            results.subscriptions = self.subscriptions.detect_batch(emails);
        }
        if selection.newsletters {
            results.newsletters = self.newsletters.detect_batch(emails);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_flags() {
        assert!(!DetectorSelection::default().any());
        assert!(DetectorSelection::all().any());
        let only_accounts = DetectorSelection {
            accounts: true,
            ..Default::default()
        };
        assert!(only_accounts.any());
    }

    #[test]
    fn test_empty_run() {
        let pipeline = DetectorPipeline::new();
        let results = pipeline.run(&[], DetectorSelection::all());
        assert!(results.accounts.is_empty());
        assert!(results.purchases.is_empty());
        assert!(results.subscriptions.is_empty());
        assert!(results.newsletters.is_empty());
    }
}
