//! Result records produced by the detector pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic category of a detected service account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Streaming,
    Ecommerce,
    Social,
    Banking,
    Communication,
    Development,
    Other,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Ecommerce => "ecommerce",
            Self::Social => "social",
            Self::Banking => "banking",
            Self::Communication => "communication",
            Self::Development => "development",
            Self::Other => "other",
        }
    }
}

/// Billing cadence of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingFrequency {
    Weekly,
    Monthly,
    Yearly,
}

impl BillingFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Observed delivery cadence of a newsletter sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryFrequency {
    Daily,
    Weekly,
    Monthly,
    Irregular,
}

impl DeliveryFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Irregular => "irregular",
        }
    }
}

/// "The user created an account at service X."
///
/// Batch results are keyed case-insensitively by `service_name`; the earliest
/// sighting wins `signup_date`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSignup {
    /// Canonical service name (catalog entry or extracted from the subject).
    pub service_name: String,
    /// Date of the earliest signup-looking email.
    pub signup_date: DateTime<Utc>,
    /// Semantic category of the service.
    pub service_type: ServiceType,
    /// Sender domain the detection was made from.
    pub domain: String,
    /// Number of matching emails folded into this record.
    pub email_count: u64,
    /// Index of the email that established the signup date.
    pub signup_email_id: u64,
}

/// A single detected purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    /// Merchant display name.
    pub merchant: String,
    /// Non-negative amount in `currency` units.
    pub amount: f64,
    /// ISO 4217 code (`USD`, `EUR`, `GBP`, `JPY`).
    pub currency: String,
    /// Date of the confirming email.
    pub purchase_date: DateTime<Utc>,
    /// Order/confirmation number, when one validated.
    pub order_number: Option<String>,
    /// Item descriptions, when extractable.
    pub items: Vec<String>,
    /// Merchant category (`ecommerce`, `food`, `travel`, …).
    pub category: String,
}

/// A recurring paid subscription.
///
/// Batch results are keyed case-insensitively by `service_name`; the most
/// recent email drives the mutable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Canonical service name.
    pub service_name: String,
    /// Amount charged per billing period.
    pub monthly_amount: f64,
    /// ISO 4217 code.
    pub currency: String,
    /// Billing cadence.
    pub frequency: BillingFrequency,
    /// Date of the latest renewal-looking email.
    pub last_renewal_date: DateTime<Utc>,
    /// Indices of every matching email, in emission order.
    pub email_ids: Vec<u64>,
    /// Whether the subscription still looks active.
    pub is_active: bool,
    /// Category (`streaming`, `software`, `news`, `fitness`, `other`).
    pub category: String,
}

/// An aggregated newsletter sender.
///
/// Batch results are keyed by `sender_email`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newsletter {
    /// Lowercased sender address.
    pub sender_email: String,
    /// Display name from the most recent message, canonical map, or
    /// humanized domain.
    pub sender_name: String,
    /// Number of emails from this sender that classified as newsletter or
    /// promotional.
    pub email_count: u64,
    /// Date of the most recent email.
    pub last_email_date: DateTime<Utc>,
    /// Average inter-arrival cadence.
    pub frequency: DeliveryFrequency,
    /// First extractable unsubscribe URL, `http(s)` only.
    pub unsubscribe_link: Option<String>,
    /// Whether the sender's mail is predominantly promotional.
    pub is_promotional: bool,
}
