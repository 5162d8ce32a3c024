//! Contacts and calendar events extracted alongside emails.

use chrono::{DateTime, Utc};

/// A contact derived from archive senders (and, for OLM, explicit
/// `Contacts.xml` entries).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Contact {
    /// Lowercased email address.
    pub email: String,
    /// Best-known display name (most recent non-empty wins).
    pub name: Option<String>,
    /// How many emails this address sent within the archive.
    pub email_count: u64,
    /// Date of the earliest email seen from this address.
    pub first_seen: DateTime<Utc>,
    /// Date of the latest email seen from this address.
    pub last_seen: DateTime<Utc>,
}

impl Contact {
    /// Start a tally from a single sighting.
    pub fn from_sighting(email: &str, name: Option<&str>, date: DateTime<Utc>) -> Self {
        Self {
            email: email.to_lowercase(),
            name: name.filter(|n| !n.is_empty()).map(String::from),
            email_count: 1,
            first_seen: date,
            last_seen: date,
        }
    }

    /// Fold another sighting of the same address into the tally.
    pub fn record_sighting(&mut self, name: Option<&str>, date: DateTime<Utc>) {
        self.email_count += 1;
        if date < self.first_seen {
            self.first_seen = date;
        }
        if date >= self.last_seen {
            self.last_seen = date;
            if let Some(n) = name.filter(|n| !n.is_empty()) {
                self.name = Some(n.to_string());
            }
        }
    }
}

/// A calendar event from an OLM archive's `Calendar*.xml` documents.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CalendarEvent {
    /// Event subject/title.
    pub subject: String,
    /// Start time, when parseable.
    pub start_time: Option<DateTime<Utc>>,
    /// End time, when parseable.
    pub end_time: Option<DateTime<Utc>>,
    /// Free-form location string.
    pub location: Option<String>,
    /// Organizer address or name.
    pub organizer: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_contact_tally() {
        let d1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        let mut c = Contact::from_sighting("News@Blog.com", None, d2);
        assert_eq!(c.email, "news@blog.com");
        c.record_sighting(Some("The Blog"), d1);
        assert_eq!(c.email_count, 2);
        assert_eq!(c.first_seen, d1);
        assert_eq!(c.last_seen, d2);
        // An earlier sighting must not override the latest name
        assert_eq!(c.name, None);

        c.record_sighting(Some("The Blog"), d2);
        assert_eq!(c.name.as_deref(), Some("The Blog"));
    }
}
