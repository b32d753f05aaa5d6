//! iCalendar synthesis for meeting requests and appointments.

use tracing::debug;

use super::recurrence::RecurrencePattern;
use super::{escape_text, ical_date, CRLF, PRODID};
use crate::model::address::{EmailAddress, MessageHeader};
use crate::parser::mapi::{PropId, PropertyList};
use crate::parser::numeric::to_hex;
use crate::parser::{rtf, tags};

/// Message-class prefixes that carry calendar data.
const CALENDAR_CLASS_PREFIXES: [&str; 3] =
    ["IPM.Appointment", "IPM.Schedule", "IPM.Microsoft Schedule"];

/// Whether a message class describes an appointment or meeting.
pub fn is_calendar_class(message_class: &str) -> bool {
    CALENDAR_CLASS_PREFIXES
        .iter()
        .any(|p| message_class.starts_with(p))
}

/// Whether a message class is a meeting cancellation.
pub fn is_cancellation(message_class: &str) -> bool {
    message_class.contains(".MtgCncl") || message_class.contains(".Meeting.Canceled")
}

/// Attendee role parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendeeRole {
    Required,
    Optional,
}

impl AttendeeRole {
    fn as_str(self) -> &'static str {
        match self {
            Self::Required => "REQ-PARTICIPANT",
            Self::Optional => "OPT-PARTICIPANT",
        }
    }
}

/// Builds one VCALENDAR document with a single VEVENT.
pub struct CalendarBuilder<'a> {
    props: &'a PropertyList,
    message_class: &'a str,
    header: Option<&'a MessageHeader>,
    lines: Vec<String>,
}

impl<'a> CalendarBuilder<'a> {
    pub fn new(
        props: &'a PropertyList,
        message_class: &'a str,
        header: Option<&'a MessageHeader>,
    ) -> Self {
        Self {
            props,
            message_class,
            header,
            lines: Vec::new(),
        }
    }

    pub fn build(mut self) -> String {
        let method = if is_cancellation(self.message_class) {
            "CANCEL"
        } else {
            "REQUEST"
        };
        self.push("BEGIN:VCALENDAR".into());
        self.push(format!("METHOD:{method}"));
        self.push(PRODID.into());
        self.push("VERSION:2.0".into());
        self.push("BEGIN:VEVENT".into());

        self.uid();
        if let Some(seq) = self.props.int(tags::APPOINTMENT_SEQUENCE) {
            self.push(format!("SEQUENCE:{seq}"));
        }
        self.organizer();
        self.attendees(
            &[tags::TO_ATTENDEES_STRING, tags::MEETING_REQUIRED_ATTENDEES],
            AttendeeRole::Required,
        );
        self.attendees(
            &[tags::CC_ATTENDEES_STRING, tags::MEETING_OPTIONAL_ATTENDEES],
            AttendeeRole::Optional,
        );

        if let Some(topic) = self.props.text(tags::CONVERSATION_TOPIC) {
            self.push(format!("SUMMARY:{}", escape_text(&topic)));
        }
        self.description();
        if let Some(location) = self.props.text(tags::LOCATION) {
            self.push(format!("LOCATION:{}", escape_text(&location)));
        }

        self.date_line(
            "DTSTART",
            &[
                tags::START_DATE,
                tags::APPOINTMENT_START_WHOLE,
                tags::COMMON_START,
            ],
        );
        self.date_line(
            "DTEND",
            &[tags::END_DATE, tags::APPOINTMENT_END_WHOLE, tags::COMMON_END],
        );
        self.date_line("CREATED", &[tags::CREATION_TIME]);
        self.rrule();

        self.push("END:VEVENT".into());
        self.push("END:VCALENDAR".into());

        let mut out = self.lines.join(CRLF);
        out.push_str(CRLF);
        out
    }

    fn push(&mut self, line: String) {
        self.lines.push(line);
    }

    fn uid(&mut self) {
        let id = [
            tags::CLEAN_GLOBAL_OBJECT_ID,
            tags::GLOBAL_OBJECT_ID,
            tags::MAPPING_SIGNATURE,
        ]
        .into_iter()
        .find_map(|id| self.props.bytes(id).filter(|b| !b.is_empty()));
        if let Some(bytes) = id {
            let line = format!("UID:{}", to_hex(bytes));
            self.push(line);
        }
    }

    fn organizer(&mut self) {
        let parts = self
            .send_account()
            .or_else(|| {
                let name = self.props.text(tags::SENDER_NAME)?;
                let email = self.props.text(tags::SENDER_EMAIL)?;
                Some(EmailAddress {
                    display_name: name,
                    address: email,
                })
            })
            .or_else(|| {
                let raw = [tags::ORGANIZER_ALIAS, tags::CREATOR_NAME, tags::TASK_CREATOR]
                    .into_iter()
                    .find_map(|id| self.props.text(id))?;
                self.resolve(&raw)
            });

        if let Some(addr) = parts {
            let line = format!(
                "ORGANIZER;PARTSTAT=ACCEPTED;ROLE=CHAIR{}",
                cal_address(&addr)
            );
            self.push(line);
        }
    }

    /// `PR_PRIMARY_SEND_ACCT` is `\x01`-separated: id, address, display name.
    fn send_account(&self) -> Option<EmailAddress> {
        let raw = self.props.text(tags::PRIMARY_SEND_ACCOUNT)?;
        let parts: Vec<&str> = raw.split('\u{1}').collect();
        let address = parts.get(1)?.trim();
        let name = parts.get(2).map(|s| s.trim()).unwrap_or_default();
        (!address.is_empty()).then(|| EmailAddress {
            display_name: name.to_string(),
            address: address.to_string(),
        })
    }

    fn attendees(&mut self, sources: &[PropId], role: AttendeeRole) {
        let Some(list) = sources.iter().find_map(|&id| self.props.text(id)) else {
            return;
        };
        for entry in list.split(';').filter(|e| !e.trim().is_empty()) {
            if !entry.chars().any(|c| c.is_ascii_graphic()) {
                continue;
            }
            let Some(addr) = self.resolve(entry) else {
                debug!(entry, "Skipping unparseable attendee");
                continue;
            };
            let line = format!(
                "ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE={};RSVP=TRUE{}",
                role.as_str(),
                cal_address(&addr)
            );
            self.push(line);
        }
    }

    /// Parse a name-addr entry, filling in a missing address from the
    /// enclosing message's headers.
    fn resolve(&self, entry: &str) -> Option<EmailAddress> {
        let mut addr = EmailAddress::parse_name_addr(entry)?;
        if addr.address.is_empty() {
            if let Some(found) = self
                .header
                .and_then(|h| h.lookup_address(&addr.display_name))
            {
                addr.address = found;
            }
        }
        Some(addr)
    }

    fn description(&mut self) {
        let props = self.props;
        let Some(data) = props.bytes(tags::RTF_COMPRESSED) else {
            return;
        };
        match rtf::decompress(data) {
            Ok(Some(rtf_bytes)) => {
                let text = rtf::rtf_to_escaped_text(&rtf_bytes);
                if !text.is_empty() {
                    self.push(format!("DESCRIPTION:{text}"));
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping meeting description"),
        }
    }

    fn date_line(&mut self, name: &str, sources: &[PropId]) {
        if let Some(date) = sources.iter().find_map(|&id| self.props.date(id)) {
            let line = format!("{name}:{}", ical_date(&date));
            self.push(line);
        }
    }

    fn rrule(&mut self) {
        let rule = self
            .props
            .bytes(tags::APPOINTMENT_RECUR)
            .and_then(RecurrencePattern::parse)
            .and_then(|p| p.to_rrule());
        if let Some(rule) = rule {
            self.push(format!("RRULE:{rule}"));
        }
    }
}

/// `;CN="name":mailto:addr`, `:mailto:addr` without a name, or `:name`
/// when there is no address.
fn cal_address(addr: &EmailAddress) -> String {
    if addr.address.is_empty() {
        format!(":{}", addr.display_name)
    } else if addr.display_name.is_empty() {
        format!(":mailto:{}", addr.address)
    } else {
        format!(
            ";CN=\"{}\":mailto:{}",
            addr.display_name.replace('"', ""),
            addr.address
        )
    }
}
