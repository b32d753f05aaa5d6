//! Binary appointment recurrence blob (`PidLidAppointmentRecur`) to RRULE.
//!
//! Only the fields needed for the rule are read. Offsets after the
//! pattern-specific block shift with the pattern type.

use byteorder::{ByteOrder, LittleEndian};

use crate::parser::numeric::minutes_1601_to_datetime;
use crate::synth::ical_date;

pub const FREQ_DAILY: u16 = 0x200A;
pub const FREQ_WEEKLY: u16 = 0x200B;
pub const FREQ_MONTHLY: u16 = 0x200C;
pub const FREQ_YEARLY: u16 = 0x200D;

pub const PATT_DAY: u16 = 0x0000;
pub const PATT_WEEK: u16 = 0x0001;
pub const PATT_MONTH: u16 = 0x0002;
pub const PATT_MONTH_NTH: u16 = 0x0003;
pub const PATT_MONTH_END: u16 = 0x0004;
pub const PATT_HJ_MONTH: u16 = 0x000A;
pub const PATT_HJ_MONTH_NTH: u16 = 0x000B;
pub const PATT_HJ_MONTH_END: u16 = 0x000C;

pub const END_AFTER_DATE: u32 = 0x0000_2021;
pub const END_AFTER_OCCURRENCES: u32 = 0x0000_2022;
pub const END_NEVER: u32 = 0x0000_2023;
pub const END_NEVER_EVER: u32 = 0xFFFF_FFFF;

const DAY_NAMES: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// The fields of a recurrence blob that drive the RRULE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrencePattern {
    pub frequency: u16,
    pub pattern_type: u16,
    pub calendar_type: u16,
    pub first_date_time: u32,
    pub period: u32,
    pub sliding_flag: u32,
    /// Day bitset for weekly/nth patterns, day of month otherwise.
    pub pattern_spec: u32,
    /// Week ordinal for nth patterns (5 means last).
    pub pattern_spec_nth: u32,
    pub end_type: u32,
    pub occurrence_count: u32,
    pub first_dow: u32,
    pub deleted_instances: Vec<u32>,
    pub modified_instances: Vec<u32>,
    /// Range start, minutes since 1601-01-01.
    pub start_date: u32,
    /// Range end, minutes since 1601-01-01.
    pub end_date: u32,
}

struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn u16_at(&self, at: usize) -> Option<u16> {
        self.0.get(at..at + 2).map(LittleEndian::read_u16)
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        self.0.get(at..at + 4).map(LittleEndian::read_u32)
    }

    fn u32_list(&self, at: usize, count: u32) -> Option<Vec<u32>> {
        let len = (count as usize).checked_mul(4)?;
        let bytes = self.0.get(at..at.checked_add(len)?)?;
        Some(bytes.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }
}

impl RecurrencePattern {
    /// Decode a recurrence blob. Returns `None` if it is too short.
    pub fn parse(blob: &[u8]) -> Option<Self> {
        let r = Reader(blob);
        let pattern_type = r.u16_at(6)?;
        let pts_off = match pattern_type {
            PATT_DAY => 0,
            PATT_MONTH_NTH | PATT_HJ_MONTH_NTH => 8,
            _ => 4,
        };

        let deleted_count = r.u32_at(34 + pts_off)?;
        let deleted_start = 38 + pts_off;
        let deleted_instances = r.u32_list(deleted_start, deleted_count)?;
        let modified_at = deleted_start + deleted_instances.len() * 4;
        let modified_count = r.u32_at(modified_at)?;
        let modified_instances = r.u32_list(modified_at + 4, modified_count)?;
        let range_at = modified_at + 4 + modified_instances.len() * 4;

        Some(Self {
            frequency: r.u16_at(4)?,
            pattern_type,
            calendar_type: r.u16_at(8)?,
            first_date_time: r.u32_at(10)?,
            period: r.u32_at(14)?,
            sliding_flag: r.u32_at(18)?,
            pattern_spec: if pts_off == 0 { 0 } else { r.u32_at(22)? },
            pattern_spec_nth: if pts_off == 8 { r.u32_at(26)? } else { 0 },
            end_type: r.u32_at(22 + pts_off)?,
            occurrence_count: r.u32_at(26 + pts_off)?,
            first_dow: r.u32_at(30 + pts_off)?,
            deleted_instances,
            modified_instances,
            start_date: r.u32_at(range_at)?,
            end_date: r.u32_at(range_at + 4)?,
        })
    }

    /// Render the rule value (without the `RRULE:` prefix).
    ///
    /// Returns `None` for an unknown frequency.
    pub fn to_rrule(&self) -> Option<String> {
        let freq = match self.frequency {
            FREQ_DAILY => "DAILY",
            FREQ_WEEKLY => "WEEKLY",
            FREQ_MONTHLY => "MONTHLY",
            FREQ_YEARLY => "YEARLY",
            _ => return None,
        };
        let interval = if self.frequency == FREQ_DAILY {
            self.period / 1440
        } else {
            self.period
        };

        let mut parts = vec![format!("FREQ={freq}"), format!("INTERVAL={interval}")];

        match self.end_type {
            END_AFTER_DATE => {
                if let Some(until) = minutes_1601_to_datetime(self.end_date) {
                    parts.push(format!("UNTIL={}", ical_date(&until)));
                }
            }
            END_AFTER_OCCURRENCES => parts.push(format!("COUNT={}", self.occurrence_count)),
            END_NEVER | END_NEVER_EVER => {}
            _ => {}
        }

        match self.pattern_type {
            PATT_WEEK => parts.push(format!("BYDAY={}", day_list(self.pattern_spec))),
            PATT_MONTH | PATT_MONTH_END | PATT_HJ_MONTH | PATT_HJ_MONTH_END => {
                parts.push(format!("BYMONTHDAY={}", self.pattern_spec));
            }
            PATT_MONTH_NTH | PATT_HJ_MONTH_NTH => {
                parts.push(format!("BYDAY={}", day_list(self.pattern_spec)));
                let pos = if self.pattern_spec_nth == 5 {
                    -1
                } else {
                    self.pattern_spec_nth as i64
                };
                parts.push(format!("BYSETPOS={pos}"));
            }
            _ => {}
        }

        Some(parts.join(";"))
    }
}

/// `SU,MO,...` for the bits set in `bits` (bit 0 = Sunday).
fn day_list(bits: u32) -> String {
    DAY_NAMES
        .iter()
        .enumerate()
        .filter(|(i, _)| bits & (1 << i) != 0)
        .map(|(_, d)| *d)
        .collect::<Vec<_>>()
        .join(",")
}
