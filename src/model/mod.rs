//! Data model: normalized email records, addresses, contacts and detection results.

pub mod address;
pub mod contact;
pub mod detection;
pub mod email;

pub use address::EmailAddress;
pub use contact::{CalendarEvent, Contact};
pub use detection::{
    AccountSignup, BillingFrequency, DeliveryFrequency, Newsletter, Purchase, ServiceType,
    Subscription,
};
pub use email::EmailRecord;
