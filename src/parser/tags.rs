//! MAPI property identifiers used by the artifact synthesizer.
//!
//! Tagged ids are the upper 16 bits of a `PR_*` property tag. Named ids are
//! the numeric LIDs of properties in a GUID property set, and only match
//! properties that carried a GUID in the stream.

use super::mapi::PropId;

// ── Attachment ──────────────────────────────────────────────────

pub const ATTACH_DATA_OBJ: PropId = PropId::Tagged(0x3701);
pub const ATTACH_LONG_FILENAME: PropId = PropId::Tagged(0x3707);
pub const ATTACH_MIME_TAG: PropId = PropId::Tagged(0x370E);

// ── Message ─────────────────────────────────────────────────────

pub const CONVERSATION_TOPIC: PropId = PropId::Tagged(0x0070);
pub const START_DATE: PropId = PropId::Tagged(0x0060);
pub const END_DATE: PropId = PropId::Tagged(0x0061);
pub const SENDER_NAME: PropId = PropId::Tagged(0x0C1A);
pub const SENDER_SEARCH_KEY: PropId = PropId::Tagged(0x0C1D);
pub const SENDER_EMAIL: PropId = PropId::Tagged(0x0C1F);
pub const PRIMARY_SEND_ACCOUNT: PropId = PropId::Tagged(0x0E28);
pub const MAPPING_SIGNATURE: PropId = PropId::Tagged(0x0FF8);
pub const RTF_COMPRESSED: PropId = PropId::Tagged(0x1009);
pub const BODY_HTML: PropId = PropId::Tagged(0x1013);
pub const CREATION_TIME: PropId = PropId::Tagged(0x3007);
pub const CREATOR_NAME: PropId = PropId::Tagged(0x3FF8);

// ── Contact ─────────────────────────────────────────────────────

pub const BUSINESS_PHONE: PropId = PropId::Tagged(0x3A08);
pub const HOME_PHONE: PropId = PropId::Tagged(0x3A09);
pub const COMPANY_NAME: PropId = PropId::Tagged(0x3A16);
pub const TITLE: PropId = PropId::Tagged(0x3A17);
pub const PRIMARY_PHONE: PropId = PropId::Tagged(0x3A1A);
pub const BUSINESS2_PHONE: PropId = PropId::Tagged(0x3A1B);
pub const MOBILE_PHONE: PropId = PropId::Tagged(0x3A1C);
pub const OTHER_PHONE: PropId = PropId::Tagged(0x3A1F);
pub const BUSINESS_FAX: PropId = PropId::Tagged(0x3A24);

/// Tagged ids in `(CONTACT_RANGE_START, CONTACT_RANGE_END]` mark contact data.
pub const CONTACT_RANGE_START: u32 = 0x3A00;
pub const CONTACT_RANGE_END: u32 = 0x3AFF;

// ── Meeting (PSETID_Meeting) ────────────────────────────────────

pub const GLOBAL_OBJECT_ID: PropId = PropId::Named(0x0003);
pub const MEETING_REQUIRED_ATTENDEES: PropId = PropId::Named(0x0006);
pub const MEETING_OPTIONAL_ATTENDEES: PropId = PropId::Named(0x0007);
pub const CLEAN_GLOBAL_OBJECT_ID: PropId = PropId::Named(0x0023);

// ── Appointment (PSETID_Appointment) ────────────────────────────

pub const APPOINTMENT_SEQUENCE: PropId = PropId::Named(0x8201);
pub const LOCATION: PropId = PropId::Named(0x8208);
pub const APPOINTMENT_START_WHOLE: PropId = PropId::Named(0x820D);
pub const APPOINTMENT_END_WHOLE: PropId = PropId::Named(0x820E);
pub const APPOINTMENT_RECUR: PropId = PropId::Named(0x8216);
pub const TO_ATTENDEES_STRING: PropId = PropId::Named(0x823B);
pub const CC_ATTENDEES_STRING: PropId = PropId::Named(0x823C);
pub const ORGANIZER_ALIAS: PropId = PropId::Named(0x8243);

// ── Common / task ───────────────────────────────────────────────

pub const TASK_CREATOR: PropId = PropId::Named(0x811E);
pub const COMMON_START: PropId = PropId::Named(0x8516);
pub const COMMON_END: PropId = PropId::Named(0x8517);

/// Symbolic name for a property, or `None` if it is not one we know.
pub fn prop_name(id: PropId) -> Option<&'static str> {
    let name = match id {
        ATTACH_DATA_OBJ => "PR_ATTACH_DATA_OBJ",
        ATTACH_LONG_FILENAME => "PR_ATTACH_LONG_FILENAME",
        ATTACH_MIME_TAG => "PR_ATTACH_MIME_TAG",
        CONVERSATION_TOPIC => "PR_CONVERSATION_TOPIC",
        START_DATE => "PR_START_DATE",
        END_DATE => "PR_END_DATE",
        SENDER_NAME => "PR_SENDER_NAME",
        SENDER_SEARCH_KEY => "PR_SENDER_SEARCH_KEY",
        SENDER_EMAIL => "PR_SENDER_EMAIL_ADDRESS",
        PRIMARY_SEND_ACCOUNT => "PR_PRIMARY_SEND_ACCT",
        MAPPING_SIGNATURE => "PR_MAPPING_SIGNATURE",
        RTF_COMPRESSED => "PR_RTF_COMPRESSED",
        BODY_HTML => "PR_BODY_HTML",
        CREATION_TIME => "PR_CREATION_TIME",
        CREATOR_NAME => "PR_CREATOR_NAME",
        BUSINESS_PHONE => "PR_BUSINESS_TELEPHONE_NUMBER",
        HOME_PHONE => "PR_HOME_TELEPHONE_NUMBER",
        COMPANY_NAME => "PR_COMPANY_NAME",
        TITLE => "PR_TITLE",
        PRIMARY_PHONE => "PR_PRIMARY_TELEPHONE_NUMBER",
        BUSINESS2_PHONE => "PR_BUSINESS2_TELEPHONE_NUMBER",
        MOBILE_PHONE => "PR_MOBILE_TELEPHONE_NUMBER",
        OTHER_PHONE => "PR_OTHER_TELEPHONE_NUMBER",
        BUSINESS_FAX => "PR_BUSINESS_FAX_NUMBER",
        GLOBAL_OBJECT_ID => "PidLidGlobalObjectId",
        MEETING_REQUIRED_ATTENDEES => "PidLidRequiredAttendees",
        MEETING_OPTIONAL_ATTENDEES => "PidLidOptionalAttendees",
        CLEAN_GLOBAL_OBJECT_ID => "PidLidCleanGlobalObjectId",
        APPOINTMENT_SEQUENCE => "PidLidAppointmentSequence",
        LOCATION => "PidLidLocation",
        APPOINTMENT_START_WHOLE => "PidLidAppointmentStartWhole",
        APPOINTMENT_END_WHOLE => "PidLidAppointmentEndWhole",
        APPOINTMENT_RECUR => "PidLidAppointmentRecur",
        TO_ATTENDEES_STRING => "PidLidToAttendeesString",
        CC_ATTENDEES_STRING => "PidLidCcAttendeesString",
        ORGANIZER_ALIAS => "PidLidOrganizerAlias",
        TASK_CREATOR => "PidLidTaskFCreator",
        COMMON_START => "PidLidCommonStart",
        COMMON_END => "PidLidCommonEnd",
        _ => return None,
    };
    Some(name)
}

/// Whether a tagged id falls in the contact-property range.
pub fn is_contact_prop(id: PropId) -> bool {
    matches!(id, PropId::Tagged(t) if (t as u32) > CONTACT_RANGE_START && (t as u32) <= CONTACT_RANGE_END)
}
