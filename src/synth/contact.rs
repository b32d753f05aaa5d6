//! vCard synthesis from contact properties.

use crate::parser::attribute::{decode_8bit, trim_nuls};
use crate::parser::mapi::PropertyList;
use crate::parser::tags;
use crate::synth::{escape_text, CRLF};

/// Phone properties in output order, with their vCard TYPE parameter.
const PHONES: [(crate::parser::mapi::PropId, &str); 7] = [
    (tags::BUSINESS_PHONE, "work,voice"),
    (tags::HOME_PHONE, "home,voice"),
    (tags::PRIMARY_PHONE, "pref,voice"),
    (tags::BUSINESS2_PHONE, "work,voice"),
    (tags::OTHER_PHONE, "voice"),
    (tags::MOBILE_PHONE, "cell,voice"),
    (tags::BUSINESS_FAX, "work,fax"),
];

/// Build a vCard 2.1 document, or `None` if no field has content.
pub fn build_vcard(props: &PropertyList) -> Option<String> {
    let mut lines = Vec::new();

    if let Some(name) = full_name(props) {
        lines.push(format!("FN:{}", escape_text(&name)));
    }
    if let Some(org) = props.text(tags::COMPANY_NAME) {
        lines.push(format!("ORG:{}", escape_text(&org)));
    }
    if let Some(title) = props.text(tags::TITLE) {
        lines.push(format!("TITLE:{}", escape_text(&title)));
    }
    for (id, kind) in PHONES {
        if let Some(number) = props.text(id) {
            lines.push(format!("TEL;TYPE={kind}:{number}"));
        }
    }

    if lines.is_empty() {
        return None;
    }

    let mut out = String::new();
    for line in ["BEGIN:VCARD", super::PRODID, "VERSION:2.1"]
        .into_iter()
        .map(str::to_string)
        .chain(lines)
        .chain(std::iter::once("END:VCARD".to_string()))
    {
        out.push_str(&line);
        out.push_str(CRLF);
    }
    Some(out)
}

/// Sender search key (`SMTP:USER@HOST`, prefix dropped), else organizer alias.
fn full_name(props: &PropertyList) -> Option<String> {
    let from_key = props
        .text(tags::SENDER_SEARCH_KEY)
        .or_else(|| {
            props
                .bytes(tags::SENDER_SEARCH_KEY)
                .map(|b| decode_8bit(trim_nuls(b)))
        })
        .map(|key| match key.split_once(':') {
            Some((_, rest)) => rest.trim().to_string(),
            None => key.trim().to_string(),
        })
        .filter(|s| !s.is_empty());

    from_key.or_else(|| props.text(tags::ORGANIZER_ALIAS))
}
