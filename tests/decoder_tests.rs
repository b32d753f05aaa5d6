//! End-to-end tests: synthetic TNEF streams through the full decoder.

use tnefshell::config::DecoderOptions;
use tnefshell::error::TnefError;
use tnefshell::listener::CollectingListener;
use tnefshell::model::address::MessageHeader;
use tnefshell::model::artifact::{Artifact, ArtifactKind};
use tnefshell::parser::attribute::*;
use tnefshell::parser::mapi::{decode_properties, MapiValue};
use tnefshell::parser::{decode_all, ParseState};

const LEVEL_MESSAGE: u8 = 1;
const LEVEL_ATTACHMENT: u8 = 2;

const TYPE_STRING: u16 = 0x0001;
const TYPE_TEXT: u16 = 0x0002;
const TYPE_BYTE: u16 = 0x0006;
const TYPE_LONG: u16 = 0x0003;

const MAPI_INT: u16 = 0x0003;
const MAPI_UNICODE: u16 = 0x001F;
const MAPI_SYSTIME: u16 = 0x0040;
const MAPI_BINARY: u16 = 0x0102;
const MULTI: u16 = 0x1000;

/// PSETID_Appointment, as stored on the wire (little-endian fields).
const PSETID_APPOINTMENT: [u8; 16] = [
    0x02, 0x20, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x46,
];

/// 2024-03-01T10:00:00Z as a FILETIME.
const MARCH_1_2024_10AM: u64 = 133_537_608_000_000_000;

/// Compressed RTF for `{\rtf1\ansi\ansicpg1252\pard hello world}\r\n`.
const RTF_SAMPLE: [u8; 49] = [
    0x2d, 0x00, 0x00, 0x00, 0x2b, 0x00, 0x00, 0x00, 0x4c, 0x5a, 0x46, 0x75, 0xf1, 0xc5, 0xc7,
    0xa7, 0x03, 0x00, 0x0a, 0x00, 0x72, 0x63, 0x70, 0x67, 0x31, 0x32, 0x35, 0x42, 0x32, 0x0a,
    0xf3, 0x20, 0x68, 0x65, 0x6c, 0x09, 0x00, 0x20, 0x62, 0x77, 0x05, 0xb0, 0x6c, 0x64, 0x7d,
    0x0a, 0x80, 0x0f, 0xa0,
];

// ─── Builders ───────────────────────────────────────────────────────

struct TnefBuilder {
    bytes: Vec<u8>,
}

impl TnefBuilder {
    fn new() -> Self {
        let mut bytes = TNEF_SIGNATURE.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x1234u16.to_le_bytes());
        Self { bytes }
    }

    fn attr(mut self, level: u8, name: u16, attr_type: u16, payload: &[u8]) -> Self {
        self.bytes.push(level);
        self.bytes.extend_from_slice(&name.to_le_bytes());
        self.bytes.extend_from_slice(&attr_type.to_le_bytes());
        self.bytes
            .extend_from_slice(&(payload.len() as u32).to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self.bytes.extend_from_slice(&checksum(payload).to_le_bytes());
        self
    }

    fn attachment(self, title: &str, data: &[u8]) -> Self {
        let mut title_bytes = title.as_bytes().to_vec();
        title_bytes.push(0);
        self.attr(LEVEL_ATTACHMENT, ATTR_ATTACH_REND_DATA, TYPE_BYTE, &[0; 14])
            .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_TITLE, TYPE_STRING, &title_bytes)
            .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_DATA, TYPE_BYTE, data)
    }

    fn message_class(self, class: &str) -> Self {
        let mut payload = class.as_bytes().to_vec();
        payload.push(0);
        self.attr(LEVEL_MESSAGE, ATTR_MESSAGE_CLASS, TYPE_STRING, &payload)
    }

    fn message_props(self, props: &MapiBuilder) -> Self {
        self.attr(LEVEL_MESSAGE, ATTR_MAPI_PROPS, TYPE_BYTE, &props.build())
    }

    fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[derive(Default)]
struct MapiBuilder {
    count: u32,
    body: Vec<u8>,
}

impl MapiBuilder {
    fn u16(&mut self, v: u16) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn padded(&mut self, data: &[u8]) {
        self.u32(data.len() as u32);
        self.body.extend_from_slice(data);
        while self.body.len() % 4 != 0 {
            self.body.push(0);
        }
    }

    fn tag(&mut self, mapi_type: u16, id: u16) {
        self.count += 1;
        self.u16(mapi_type);
        self.u16(id);
    }

    fn named_tag(&mut self, mapi_type: u16, lid: u32) {
        self.count += 1;
        self.u16(mapi_type);
        self.u16(0x8000 | self.count as u16);
        self.body.extend_from_slice(&PSETID_APPOINTMENT);
        self.u32(0);
        self.u32(lid);
    }

    fn unicode(mut self, id: u16, s: &str) -> Self {
        self.tag(MAPI_UNICODE, id);
        self.u32(1);
        self.padded(&utf16z(s));
        self
    }

    fn named_unicode(mut self, lid: u32, s: &str) -> Self {
        self.named_tag(MAPI_UNICODE, lid);
        self.u32(1);
        self.padded(&utf16z(s));
        self
    }

    fn named_systime(mut self, lid: u32, filetime: u64) -> Self {
        self.named_tag(MAPI_SYSTIME, lid);
        self.body.extend_from_slice(&filetime.to_le_bytes());
        self
    }

    fn int(mut self, id: u16, v: i32) -> Self {
        self.tag(MAPI_INT, id);
        self.body.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn binary(mut self, id: u16, values: &[&[u8]]) -> Self {
        let t = if values.len() > 1 {
            MAPI_BINARY | MULTI
        } else {
            MAPI_BINARY
        };
        self.tag(t, id);
        self.u32(values.len() as u32);
        for v in values {
            self.padded(v);
        }
        self
    }

    fn build(&self) -> Vec<u8> {
        let mut out = self.count.to_le_bytes().to_vec();
        out.extend_from_slice(&self.body);
        out
    }
}

fn utf16z(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|u| u.to_le_bytes())
        .collect()
}

fn decode(bytes: &[u8]) -> Vec<Artifact> {
    decode_all(bytes, &DecoderOptions::default()).unwrap()
}

fn decode_split(bytes: &[u8], at: usize) -> Vec<Artifact> {
    let opts = DecoderOptions::default();
    let mut state = ParseState::new();
    let mut out = CollectingListener::new();
    state.feed(&bytes[..at], &opts, &mut out).unwrap();
    state.feed(&bytes[at..], &opts, &mut out).unwrap();
    state.finish(&opts, &mut out).unwrap();
    out.into_artifacts()
}

fn meeting_stream() -> Vec<u8> {
    let props = MapiBuilder::default()
        .unicode(0x0070, "Quarterly review")
        .unicode(0x0C1A, "Jane Doe")
        .unicode(0x0C1F, "jane@example.com")
        .named_unicode(0x823B, "Bob <bob@example.com>; \"Lee, Ann\" <ann@example.com>")
        .named_unicode(0x823C, "Sam")
        .named_unicode(0x8208, "Room 4")
        .named_systime(0x820D, MARCH_1_2024_10AM)
        .named_systime(0x820E, MARCH_1_2024_10AM + 36_000_000_000)
        .binary(0x0FF8, &[&[0xAB, 0xCD, 0x01]]);
    TnefBuilder::new()
        .message_class("IPM.Schedule.Meeting.Request")
        .message_props(&props)
        .build()
}

// ─── Scenario A: one attachment ─────────────────────────────────────

#[test]
fn test_single_attachment() {
    let bytes = TnefBuilder::new()
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_TITLE, TYPE_STRING, b"report.txt\0")
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_DATA, TYPE_BYTE, b"hello")
        .build();
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 1);
    assert_eq!(arts[0].kind, ArtifactKind::File);
    assert_eq!(arts[0].name, "report.txt");
    assert_eq!(arts[0].length, 5);
    assert_eq!(arts[0].bytes, b"hello");
    assert_eq!(arts[0].mime_type, "application/octet-stream");
}

// ─── Scenario B: duplicate names ────────────────────────────────────

#[test]
fn test_duplicate_names_get_counter() {
    let bytes = TnefBuilder::new()
        .attachment("dup.txt", b"first")
        .attachment("dup.txt", b"second")
        .attachment("dup.txt", b"third")
        .build();
    let names: Vec<String> = decode(&bytes).into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["dup.txt", "dup.txt1", "dup.txt2"]);
}

#[test]
fn test_untitled_attachment_gets_default_name() {
    let bytes = TnefBuilder::new()
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_REND_DATA, TYPE_BYTE, &[0; 14])
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_DATA, TYPE_BYTE, b"anon")
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_REND_DATA, TYPE_BYTE, &[0; 14])
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_DATA, TYPE_BYTE, b"anon2")
        .build();
    let names: Vec<String> = decode(&bytes).into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["tnef-part-0", "tnef-part-1"]);
}

// ─── Scenario C: meeting request ────────────────────────────────────

#[test]
fn test_meeting_request_calendar() {
    let arts = decode(&meeting_stream());
    let cals: Vec<&Artifact> = arts
        .iter()
        .filter(|a| a.kind == ArtifactKind::Calendar)
        .collect();
    assert_eq!(cals.len(), 1);
    assert_eq!(cals[0].mime_type, "text/calendar");
    assert_eq!(cals[0].name, "body_part_0.ics");

    let ics = cals[0].text();
    let lines: Vec<&str> = ics.split("\r\n").collect();
    assert_eq!(lines[0], "BEGIN:VCALENDAR");
    assert!(lines.contains(&"METHOD:REQUEST"));
    assert!(lines.contains(&"UID:abcd01"));
    assert!(lines.contains(&"ORGANIZER;PARTSTAT=ACCEPTED;ROLE=CHAIR;CN=\"Jane Doe\":mailto:jane@example.com"));
    assert!(lines.contains(
        &"ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE=REQ-PARTICIPANT;RSVP=TRUE;CN=\"Bob\":mailto:bob@example.com"
    ));
    assert!(lines.contains(
        &"ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE=REQ-PARTICIPANT;RSVP=TRUE;CN=\"Lee, Ann\":mailto:ann@example.com"
    ));
    assert!(lines.contains(&"ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE=OPT-PARTICIPANT;RSVP=TRUE:Sam"));
    assert!(lines.contains(&"SUMMARY:Quarterly review"));
    assert!(lines.contains(&"LOCATION:Room 4"));
    assert!(lines.contains(&"DTSTART:20240301T100000Z"));
    assert!(lines.contains(&"DTEND:20240301T110000Z"));
    assert!(ics.ends_with("END:VEVENT\r\nEND:VCALENDAR\r\n"));
}

#[test]
fn test_attendee_address_from_message_header() {
    let props = MapiBuilder::default().named_unicode(0x823B, "Bob");
    let bytes = TnefBuilder::new()
        .message_class("IPM.Schedule.Meeting.Request")
        .message_props(&props)
        .build();
    let opts = DecoderOptions::default();
    let mut state = ParseState::with_header(MessageHeader {
        author: "Jane <jane@example.com>".into(),
        recipients: "\"Bob\" <bob@example.com>, carol@example.com".into(),
        cc_list: String::new(),
    });
    let mut out = CollectingListener::new();
    state.feed(&bytes, &opts, &mut out).unwrap();
    state.finish(&opts, &mut out).unwrap();

    let ics = out.artifacts[0].text().into_owned();
    assert!(ics.contains(
        "ATTENDEE;PARTSTAT=NEEDS-ACTION;ROLE=REQ-PARTICIPANT;RSVP=TRUE;CN=\"Bob\":mailto:bob@example.com\r\n"
    ));
}

#[test]
fn test_cancellation_method() {
    let props = MapiBuilder::default().unicode(0x0070, "Cancelled sync");
    let bytes = TnefBuilder::new()
        .message_class("IPM.Schedule.Meeting.Canceled")
        .message_props(&props)
        .build();
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 1);
    assert!(arts[0].text().contains("METHOD:CANCEL\r\n"));
}

#[test]
fn test_calendar_can_be_disabled() {
    let opts = DecoderOptions {
        direct_to_calendar: Some(false),
        ..DecoderOptions::default()
    };
    let arts = decode_all(&meeting_stream(), &opts).unwrap();
    assert!(arts.iter().all(|a| a.kind != ArtifactKind::Calendar));
}

#[test]
fn test_note_class_has_no_calendar() {
    let props = MapiBuilder::default().unicode(0x0070, "Hello");
    let bytes = TnefBuilder::new()
        .message_class("IPM.Note")
        .message_props(&props)
        .build();
    assert!(decode(&bytes).is_empty());
}

// ─── Bad signature ──────────────────────────────────────────────────

#[test]
fn test_bad_signature_yields_nothing() {
    let mut bytes = TnefBuilder::new()
        .attachment("a.txt", b"data")
        .build();
    bytes[0] ^= 0xFF;
    let opts = DecoderOptions::default();
    let mut state = ParseState::new();
    let mut out = CollectingListener::new();
    let err = state.feed(&bytes, &opts, &mut out).unwrap_err();
    assert!(matches!(err, TnefError::NotTnefFormat { .. }));
    assert!(err.is_fatal_structural());
    assert!(out.artifacts.is_empty());
}

// ─── Resumability ───────────────────────────────────────────────────

#[test]
fn test_every_split_point_matches_whole() {
    let bytes = TnefBuilder::new()
        .attr(LEVEL_MESSAGE, ATTR_BODY, TYPE_TEXT, b"Body text\0")
        .attachment("a.bin", &[9, 8, 7, 6, 5, 4, 3])
        .message_class("IPM.Schedule.Meeting.Request")
        .message_props(
            &MapiBuilder::default()
                .unicode(0x0070, "Split test")
                .named_unicode(0x823B, "Bob <bob@example.com>"),
        )
        .build();
    let whole = decode(&bytes);
    assert_eq!(whole.len(), 3);
    for at in 0..=bytes.len() {
        assert_eq!(decode_split(&bytes, at), whole, "split at {at}");
    }
}

// ─── Checksums ──────────────────────────────────────────────────────

#[test]
fn test_checksum_mismatch_is_not_fatal() {
    let mut bytes = TnefBuilder::new()
        .attachment("a.txt", b"abc")
        .attachment("b.txt", b"xyz")
        .build();
    // flip the first payload byte of the first ATTACH_DATA ("abc")
    let pos = bytes
        .windows(3)
        .position(|w| w == b"abc")
        .unwrap();
    bytes[pos] = b'A';
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 2);
    assert_eq!(arts[0].bytes, b"Abc");
    assert_eq!(arts[1].bytes, b"xyz");
}

#[test]
fn test_checksum_function() {
    assert_eq!(checksum(b""), 0);
    assert_eq!(checksum(&[0xFF; 300]), ((0xFFu32 * 300) % 65536) as u16);
}

// ─── MAPI ───────────────────────────────────────────────────────────

#[test]
fn test_multi_value_binary_alignment() {
    let table = MapiBuilder::default()
        .binary(0x3701, &[b"abc", b"defgh"])
        .int(0x0E08, 42)
        .build();
    let props = decode_properties(&table);
    assert_eq!(props.len(), 2);
    let first = &props.props[0];
    assert!(first.multi_valued);
    assert_eq!(
        first.values,
        vec![
            MapiValue::Bytes(b"abc".to_vec()),
            MapiValue::Bytes(b"defgh".to_vec())
        ]
    );
    assert_eq!(props.props[1].values, vec![MapiValue::Int(42)]);
}

#[test]
fn test_attachment_mapi_overrides() {
    let props = MapiBuilder::default()
        .unicode(0x3707, "Long file name.docx")
        .unicode(0x370E, "application/msword")
        .binary(0x3701, &[b"DOCX"]);
    let bytes = TnefBuilder::new()
        .attachment("LONGFI~1.DOC", b"short")
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACHMENT, TYPE_BYTE, &props.build())
        .build();
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 1);
    assert_eq!(arts[0].name, "Long file name.docx");
    assert_eq!(arts[0].mime_type, "application/msword");
    assert_eq!(arts[0].bytes, b"DOCX");
}

#[test]
fn test_attachment_dates() {
    // 2023-06-15 08:30:00, weekday 4
    let date: Vec<u8> = [2023u16, 6, 15, 8, 30, 0, 4]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let bytes = TnefBuilder::new()
        .attachment("d.txt", b"x")
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_MODIFY_DATE, 0x0003, &date)
        .build();
    let arts = decode(&bytes);
    let when = arts[0].created_at.unwrap();
    assert_eq!(when.to_rfc3339(), "2023-06-15T08:30:00+00:00");
}

// ─── Bodies ─────────────────────────────────────────────────────────

#[test]
fn test_html_and_rtf_bodies() {
    let props = MapiBuilder::default()
        .binary(0x1013, &[b"<p>Hi</p>"])
        .binary(0x1009, &[&RTF_SAMPLE]);
    let bytes = TnefBuilder::new()
        .attr(LEVEL_MESSAGE, ATTR_BODY, TYPE_TEXT, b"Plain\0")
        .message_props(&props)
        .build();
    let arts = decode(&bytes);
    let summary: Vec<(&str, &str)> = arts
        .iter()
        .map(|a| (a.name.as_str(), a.mime_type.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("body_part_0.txt", "text/plain"),
            ("body_part_1.html", "text/html"),
            ("body_part_2.rtf", "application/rtf"),
        ]
    );
    assert_eq!(arts[1].bytes, b"<p>Hi</p>");
    assert_eq!(
        arts[2].bytes,
        b"{\\rtf1\\ansi\\ansicpg1252\\pard hello world}\r\n"
    );
}

#[test]
fn test_rtf_size_mismatch_skips_only_rtf() {
    let mut bad = RTF_SAMPLE.to_vec();
    bad[0] = 0x30;
    let props = MapiBuilder::default()
        .binary(0x1009, &[&bad])
        .binary(0x1013, &[b"<b>ok</b>"]);
    let bytes = TnefBuilder::new().message_props(&props).build();
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 1);
    assert_eq!(arts[0].mime_type, "text/html");
    assert_eq!(arts[0].name, "body_part_0.html");
}

#[test]
fn test_custom_body_prefix() {
    let opts = DecoderOptions {
        body_part_prefix: "part-".into(),
        ..DecoderOptions::default()
    };
    let bytes = TnefBuilder::new()
        .attr(LEVEL_MESSAGE, ATTR_BODY, TYPE_TEXT, b"x\0")
        .build();
    let arts = decode_all(&bytes, &opts).unwrap();
    assert_eq!(arts[0].name, "part-0.txt");
}

// ─── Contacts ───────────────────────────────────────────────────────

#[test]
fn test_contact_vcard() {
    let props = MapiBuilder::default()
        .unicode(0x3A16, "Acme")
        .unicode(0x3A17, "Engineer")
        .unicode(0x3A08, "+1 555 0101");
    let bytes = TnefBuilder::new()
        .message_class("IPM.Contact")
        .message_props(&props)
        .build();
    let arts = decode(&bytes);
    assert_eq!(arts.len(), 1);
    assert_eq!(arts[0].kind, ArtifactKind::Contact);
    assert_eq!(arts[0].name, "body_part_0.vcf");
    let card = arts[0].text();
    assert!(card.starts_with("BEGIN:VCARD\r\n"));
    assert!(card.contains("ORG:Acme\r\n"));
    assert!(card.contains("TITLE:Engineer\r\n"));
    assert!(card.contains("TEL;TYPE=work,voice:+1 555 0101\r\n"));
}

// ─── Options ────────────────────────────────────────────────────────

#[test]
fn test_raw_mapi_dump() {
    let opts = DecoderOptions {
        attach_raw_mapi: true,
        ..DecoderOptions::default()
    };
    let props = MapiBuilder::default()
        .unicode(0x0070, "Topic")
        .int(0x1234, 7);
    let bytes = TnefBuilder::new().message_props(&props).build();
    let arts = decode_all(&bytes, &opts).unwrap();
    assert_eq!(arts.len(), 1);
    assert_eq!(
        arts[0].text(),
        "PR_CONVERSATION_TOPIC: type=UNICODE_STRING; value='Topic'\n0x1234: type=INT; value='7'\n"
    );
}

#[test]
fn test_code_page_file_name() {
    // "テスト.txt" in Shift_JIS
    let mut title = vec![0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
    title.extend_from_slice(b".txt\0");
    let bytes = TnefBuilder::new()
        .attr(LEVEL_MESSAGE, ATTR_OEM_CODEPAGE, TYPE_LONG, &[0xA4, 0x03, 0, 0, 0, 0, 0, 0])
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_REND_DATA, TYPE_BYTE, &[0; 14])
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_TITLE, TYPE_STRING, &title)
        .attr(LEVEL_ATTACHMENT, ATTR_ATTACH_DATA, TYPE_BYTE, b"j")
        .build();
    assert_eq!(decode(&bytes)[0].name, "テスト.txt");

    let opts = DecoderOptions {
        disable_filename_character_set: true,
        ..DecoderOptions::default()
    };
    let raw_name = &decode_all(&bytes, &opts).unwrap()[0].name;
    assert_ne!(raw_name, "テスト.txt");
}
