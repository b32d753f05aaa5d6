//! Address parsing for organizer and attendee strings.
//!
//! Meeting properties carry attendees as `;`-separated name-addr entries.
//! Their display names routinely contain commas and other characters that a
//! strict RFC 5322 parser rejects, so entries are matched with a permissive
//! grammar instead.

use std::sync::LazyLock;

use regex::Regex;

// Both patterns are literals; the unit tests below compile them.
static NAME_ADDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*((?:[^()<>@:;\[\\\]]+|"[^"]*")*)[<(]([A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,})[)>]\s*$"#,
    )
    .expect("NAME_ADDR_RE is a valid constant pattern")
});

static BARE_ADDR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,})\s*$")
        .expect("BARE_ADDR_RE is a valid constant pattern")
});

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
/// - `"Jane Doe"` → `display_name = "Jane Doe"`, `address = ""`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (may be empty when only a phrase was given).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single entry with the permissive name-addr grammar.
    ///
    /// Accepted shapes:
    /// - `Phrase, with commas <user@domain.com>`
    /// - `"Quoted Phrase" (user@domain.com)`
    /// - `user@domain.com`
    /// - `Just A Phrase` (no `@` anywhere)
    ///
    /// Returns `None` when the entry contains an `@` but matches neither
    /// address form.
    pub fn parse_name_addr(raw: &str) -> Option<Self> {
        if !raw.contains('@') {
            return Some(Self {
                display_name: strip_quotes(raw),
                address: String::new(),
            });
        }
        if let Some(caps) = NAME_ADDR_RE.captures(raw) {
            return Some(Self {
                display_name: caps.get(1).map(|m| strip_quotes(m.as_str())).unwrap_or_default(),
                address: caps[2].to_string(),
            });
        }
        BARE_ADDR_RE.captures(raw).map(|caps| Self {
            display_name: String::new(),
            address: caps[1].to_string(),
        })
    }

    /// Parse a single address from an RFC 5322 header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    return Self {
                        display_name: strip_quotes(&trimmed[..angle_start]),
                        address: trimmed[angle_start + 1..angle_end].trim().to_string(),
                    };
                }
            }
        }

        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Parse a comma-separated header list.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    results.push(Self::parse(&current));
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        results.push(Self::parse(&current));

        results.retain(|a| !a.address.is_empty());
        results
    }
}

/// Strip surrounding single or double quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
    if quoted {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Address headers of the mail that carried the TNEF stream.
///
/// Used to fill in addresses for attendees that appear by name only.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MessageHeader {
    /// Raw `From` value.
    pub author: String,
    /// Raw `To` value.
    pub recipients: String,
    /// Raw `Cc` value.
    pub cc_list: String,
}

impl MessageHeader {
    /// Address of the first From/To/Cc entry whose display name equals `name`.
    pub fn lookup_address(&self, name: &str) -> Option<String> {
        [&self.author, &self.recipients, &self.cc_list]
            .into_iter()
            .flat_map(|h| EmailAddress::parse_list(h))
            .find(|a| a.display_name == name)
            .map(|a| a.address)
    }
}
