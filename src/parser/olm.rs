//! OLM (Outlook for Mac) archive decoder.
//!
//! OLM files are ZIP containers holding one XML document per message under
//! `com.microsoft.__Messages/`, plus address book and calendar documents.
//! Element names use the OPF-prefixed vocabulary
//! (`OPFMessageCopySubject`, `OPFContactCopyDisplayName`, …).
//!
//! Messages are decoded in ascending numeric order of `message_<n>.xml`.
//! A malformed XML document is skipped; entry iteration continues.

use std::fs::File;
use std::io::{Cursor, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::warn;

use crate::config::ParserConfig;
use crate::error::{ArchiveError, Result};
use crate::model::contact::{CalendarEvent, Contact};
use crate::model::email::{EmailRecord, NO_SUBJECT, SIZE_CAP};
use crate::parser::header::parse_date;
use crate::parser::mime::{html_to_text, looks_binary};
use crate::parser::thread::derive_thread_id;
use crate::reader::ArchiveSource;

/// Everything extracted from one OLM container.
#[derive(Debug, Default)]
pub struct OlmArchive {
    /// Messages in ascending `message_<n>.xml` order.
    pub emails: Vec<EmailRecord>,
    /// Contacts: explicit address-book entries merged over per-sender tallies.
    pub contacts: Vec<Contact>,
    /// Calendar events from `Calendar*.xml` documents.
    pub calendar_events: Vec<CalendarEvent>,
    /// Message documents dropped by hard checks or XML errors.
    pub dropped: u64,
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// OLM archive decoder.
pub struct OlmParser {
    config: ParserConfig,
}

impl Default for OlmParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OlmParser {
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Sniff whether a source is an OLM container: a readable ZIP with
    /// Outlook message entries.
    pub fn is_olm(source: &ArchiveSource) -> bool {
        match source.head(4) {
            Ok(head) if head.starts_with(b"PK\x03\x04") => {}
            _ => return false,
        }
        let Ok(mut archive) = open_zip(source) else {
            return false;
        };
        (0..archive.len()).any(|i| {
            archive
                .by_index(i)
                .map(|f| f.name().contains("com.microsoft"))
                .unwrap_or(false)
        })
    }

    /// Decode the whole container.
    ///
    /// Fatal only when the ZIP itself is unreadable; individual documents
    /// that fail to parse are skipped and counted.
    pub fn parse(&self, source: ArchiveSource) -> Result<OlmArchive> {
        self.parse_with_cancel(source, None)
    }

    /// Like [`OlmParser::parse`], checking a host cancellation flag between
    /// message documents.
    pub fn parse_with_cancel(
        &self,
        source: ArchiveSource,
        cancel: Option<&std::sync::atomic::AtomicBool>,
    ) -> Result<OlmArchive> {
        let mut archive = open_zip(&source)?;

        // First pass: classify entries by name.
        let mut message_entries: Vec<(u64, usize)> = Vec::new();
        let mut contact_entries: Vec<usize> = Vec::new();
        let mut calendar_entries: Vec<usize> = Vec::new();

        for i in 0..archive.len() {
            let entry = match archive.by_index(i) {
                Ok(e) => e,
                Err(e) => {
                    warn!(index = i, error = %e, "Unreadable ZIP entry, skipping");
                    continue;
                }
            };
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if let Some(n) = message_number(&name) {
                message_entries.push((n, i));
            } else if is_contacts_entry(&name) {
                contact_entries.push(i);
            } else if is_calendar_entry(&name) {
                calendar_entries.push(i);
            }
        }

        message_entries.sort_by_key(|(n, _)| *n);

        let mut result = OlmArchive::default();
        let mut sender_tallies: Vec<Contact> = Vec::new();

        for (_, index) in &message_entries {
            if cancel.is_some_and(|c| c.load(std::sync::atomic::Ordering::Relaxed)) {
                return Err(ArchiveError::Cancelled);
            }
            let Some(xml) = read_entry(&mut archive, *index) else {
                result.dropped += 1;
                continue;
            };
            match self.parse_message_xml(&xml) {
                Some(email) => {
                    tally_sender(&mut sender_tallies, &email);
                    result.emails.push(email);
                }
                None => result.dropped += 1,
            }
        }

        // Explicit address-book entries refine the derived tallies.
        let mut explicit: Vec<(String, String)> = Vec::new();
        for index in &contact_entries {
            if let Some(xml) = read_entry(&mut archive, *index) {
                explicit.extend(parse_contacts_xml(&xml));
            }
        }
        for (email, name) in explicit {
            let lowered = email.to_lowercase();
            if let Some(pos) = sender_tallies.iter().position(|c| c.email == lowered) {
                let contact = &mut sender_tallies[pos];
                if contact.name.is_none() && !name.is_empty() {
                    contact.name = Some(name);
                }
            } else {
                let mut contact = Contact::from_sighting(&lowered, Some(&name), chrono::Utc::now());
                contact.email_count = 0;
                sender_tallies.push(contact);
            }
        }
        result.contacts = sender_tallies;

        for index in &calendar_entries {
            if let Some(xml) = read_entry(&mut archive, *index) {
                result.calendar_events.extend(parse_calendar_xml(&xml));
            }
        }

        Ok(result)
    }

    /// Decode a single `message_<n>.xml` document into a record.
    fn parse_message_xml(&self, xml: &str) -> Option<EmailRecord> {
        let fields = match collect_opf_fields(xml) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Malformed message XML, skipping");
                return None;
            }
        };

        let subject = fields
            .text("OPFMessageCopySubject")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| NO_SUBJECT.to_string());

        let (sender, sender_name) = fields.sender.clone().unwrap_or_default();
        let sender = sender.to_lowercase();

        if sender.is_empty() && subject == NO_SUBJECT {
            return None;
        }
        if sender.matches('@').count() != 1 {
            warn!(sender = %sender, "Dropping OLM record with unusable sender");
            return None;
        }

        let date = fields
            .text("OPFMessageCopySentTime")
            .or_else(|| fields.text("OPFMessageCopyReceivedTime"))
            .and_then(|s| parse_date(&s))
            .unwrap_or_else(chrono::Utc::now);

        let mut body = fields.text("OPFMessageCopyBody").unwrap_or_default();
        let html_body = fields.text("OPFMessageCopyHTMLBody");

        if body.trim().is_empty() {
            if let Some(ref html) = html_body {
                body = html_to_text(html);
            }
        }

        if looks_binary(&body, self.config.binary_guard_threshold) {
            if subject == NO_SUBJECT {
                return None;
            }
            body = String::new();
        }

        if body.is_empty() && html_body.is_none() && subject == NO_SUBJECT {
            return None;
        }

        // OLM has no Gmail-label analog: every message lands in the inbox.
        let folder_id = "inbox".to_string();

        let mut synthetic_headers: Vec<(String, String)> = Vec::new();
        if let Some(topic) = fields.text("OPFMessageCopyThreadTopic") {
            synthetic_headers.push(("thread-topic".into(), topic));
        }
        let thread_id = derive_thread_id(&synthetic_headers, &subject);

        let message_id = fields
            .text("OPFMessageCopyMessageID")
            .filter(|s| !s.is_empty());

        Some(EmailRecord {
            subject,
            sender,
            sender_name: sender_name.filter(|n| !n.is_empty()),
            recipients: fields.recipients.clone(),
            date,
            size: xml.len().min(SIZE_CAP),
            is_read: fields
                .text("OPFMessageGetIsRead")
                .map(|v| v.trim() != "0")
                .unwrap_or(true),
            is_starred: fields
                .text("OPFMessageGetIsFlagged")
                .map(|v| v.trim() == "1")
                .unwrap_or(false),
            folder_id,
            labels: None,
            thread_id,
            message_id,
            has_attachments: fields
                .text("OPFMessageGetHasAttachment")
                .map(|v| v.trim() == "1")
                .unwrap_or(false),
            attachments: Vec::new(),
            body,
            html_body,
        })
    }
}

fn open_zip(source: &ArchiveSource) -> Result<zip::ZipArchive<Box<dyn ReadSeek>>> {
    let label = source.label();
    let reader: Box<dyn ReadSeek> = match source {
        ArchiveSource::Path(path) => Box::new(
            File::open(path).map_err(|e| ArchiveError::source_unavailable(path, e))?,
        ),
        ArchiveSource::Buffer(data) => Box::new(Cursor::new(data.clone())),
    };
    zip::ZipArchive::new(reader)
        .map_err(|e| ArchiveError::malformed_archive(label, e.to_string()))
}

fn read_entry(archive: &mut zip::ZipArchive<Box<dyn ReadSeek>>, index: usize) -> Option<String> {
    let mut entry = match archive.by_index(index) {
        Ok(e) => e,
        Err(e) => {
            warn!(index, error = %e, "Unreadable ZIP entry, skipping");
            return None;
        }
    };
    let mut raw = Vec::new();
    if let Err(e) = entry.read_to_end(&mut raw) {
        warn!(name = entry.name(), error = %e, "Failed to inflate entry, skipping");
        return None;
    }
    Some(String::from_utf8_lossy(&raw).into_owned())
}

/// Extract `<n>` from `com.microsoft.__Messages/.../message_<n>.xml`.
fn message_number(name: &str) -> Option<u64> {
    if !name.contains("com.microsoft.__Messages") {
        return None;
    }
    let file = name.rsplit('/').next()?;
    let digits = file.strip_prefix("message_")?.strip_suffix(".xml")?;
    digits.parse().ok()
}

fn is_contacts_entry(name: &str) -> bool {
    name == "Address Book/Contacts.xml"
        || (name.contains("/Contacts/") && name.ends_with(".xml"))
}

fn is_calendar_entry(name: &str) -> bool {
    let file = name.rsplit('/').next().unwrap_or(name);
    file.starts_with("Calendar") && file.ends_with(".xml")
}

/// OPF fields collected from one message document.
#[derive(Default)]
struct OpfFields {
    /// `(element_name, text)` for every leaf element.
    texts: Vec<(String, String)>,
    /// Sender `(address, name)` from the From/Sender address containers.
    sender: Option<(String, Option<String>)>,
    /// Recipient addresses from the To/CC/BCC containers.
    recipients: Vec<String>,
}

impl OpfFields {
    fn text(&self, name: &str) -> Option<String> {
        self.texts
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

/// Containers whose nested `emailAddress` elements name the sender.
const SENDER_CONTAINERS: &[&str] = &["OPFMessageCopyFromAddresses", "OPFMessageCopySenderAddress"];

/// Containers whose nested `emailAddress` elements name recipients.
const RECIPIENT_CONTAINERS: &[&str] = &[
    "OPFMessageCopyToAddresses",
    "OPFMessageCopyCCAddresses",
    "OPFMessageCopyBCCAddresses",
];

/// Event-driven walk over one message document.
fn collect_opf_fields(xml: &str) -> std::result::Result<OpfFields, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = OpfFields::default();
    let mut element_stack: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "emailAddress" {
                    record_email_address(&e, &element_stack, &mut fields);
                }
                element_stack.push(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "emailAddress" {
                    record_email_address(&e, &element_stack, &mut fields);
                }
            }
            Event::Text(t) => {
                if let Some(current) = element_stack.last() {
                    let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                    if !text.is_empty() {
                        fields.texts.push((current.clone(), text));
                    }
                }
            }
            Event::End(_) => {
                element_stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

/// Route one `emailAddress` element to sender or recipients by its container.
fn record_email_address(
    e: &quick_xml::events::BytesStart<'_>,
    element_stack: &[String],
    fields: &mut OpfFields,
) {
    let mut address = String::new();
    let mut name: Option<String> = None;
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match key.as_str() {
            "OPFContactEmailAddressAddress" => address = value,
            "OPFContactEmailAddressName" => name = Some(value),
            _ => {}
        }
    }
    if address.is_empty() {
        return;
    }

    let in_sender = element_stack
        .iter()
        .any(|el| SENDER_CONTAINERS.contains(&el.as_str()));
    let in_recipient = element_stack
        .iter()
        .any(|el| RECIPIENT_CONTAINERS.contains(&el.as_str()));

    if in_sender && fields.sender.is_none() {
        fields.sender = Some((address, name));
    } else if in_recipient {
        fields.recipients.push(address.to_lowercase());
    }
}

/// Fold an email's sender into the per-sender contact tallies.
fn tally_sender(tallies: &mut Vec<Contact>, email: &EmailRecord) {
    if let Some(pos) = tallies.iter().position(|c| c.email == email.sender) {
        tallies[pos].record_sighting(email.sender_name.as_deref(), email.date);
    } else {
        tallies.push(Contact::from_sighting(
            &email.sender,
            email.sender_name.as_deref(),
            email.date,
        ));
    }
}

/// Extract `(address, display_name)` pairs from a Contacts.xml document.
fn parse_contacts_xml(xml: &str) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut contacts = Vec::new();
    let mut current_name = String::new();
    let mut current_addresses: Vec<String> = Vec::new();
    let mut in_display_name = false;

    fn collect_address(e: &quick_xml::events::BytesStart<'_>, out: &mut Vec<String>) {
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"OPFContactEmailAddressAddress" {
                if let Ok(v) = attr.unescape_value() {
                    out.push(v.into_owned());
                }
            }
        }
    }

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"OPFContactCopyDisplayName" => in_display_name = true,
                b"contact" => {
                    current_name.clear();
                    current_addresses.clear();
                }
                b"emailAddress" => collect_address(&e, &mut current_addresses),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"emailAddress" {
                    collect_address(&e, &mut current_addresses);
                }
            }
            Ok(Event::Text(t)) => {
                if in_display_name {
                    current_name = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"OPFContactCopyDisplayName" {
                    in_display_name = false;
                } else if name.as_ref() == b"contact" {
                    for addr in current_addresses.drain(..) {
                        contacts.push((addr, current_name.clone()));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Malformed contacts XML, keeping partial results");
                break;
            }
            _ => {}
        }
    }

    contacts
}

/// Extract calendar events from a Calendar*.xml document.
fn parse_calendar_xml(xml: &str) -> Vec<CalendarEvent> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut events = Vec::new();
    let mut current: Option<CalendarEvent> = None;
    let mut capture: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"appointment" | b"calendarEvent" => {
                    current = Some(CalendarEvent {
                        subject: String::new(),
                        start_time: None,
                        end_time: None,
                        location: None,
                        organizer: None,
                    });
                }
                b"OPFCalendarEventCopySummary" => capture = Some("summary"),
                b"OPFCalendarEventCopyStartTime" => capture = Some("start"),
                b"OPFCalendarEventCopyEndTime" => capture = Some("end"),
                b"OPFCalendarEventCopyLocation" => capture = Some("location"),
                b"OPFCalendarEventCopyOrganizer" => capture = Some("organizer"),
                _ => capture = None,
            },
            Ok(Event::Text(t)) => {
                if let (Some(event), Some(field)) = (current.as_mut(), capture) {
                    let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                    match field {
                        "summary" => event.subject = text,
                        "start" => event.start_time = parse_date(&text),
                        "end" => event.end_time = parse_date(&text),
                        "location" => event.location = Some(text),
                        "organizer" => event.organizer = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"appointment" | b"calendarEvent" => {
                    if let Some(event) = current.take() {
                        if !event.subject.is_empty() || event.start_time.is_some() {
                            events.push(event);
                        }
                    }
                }
                _ => capture = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, "Malformed calendar XML, keeping partial results");
                break;
            }
            _ => {}
        }
    }

    events
}
