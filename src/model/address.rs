//! Mailbox parsing for `From:`/`To:` header values.

/// One mailbox from an address header.
///
/// The bare address is always lowercased with angle brackets stripped;
/// display names keep their case. Malformed tokens land in `address`
/// untouched so nothing from the source is silently lost.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmailAddress {
    /// Display name, unquoted (may be empty).
    pub display_name: String,
    /// `user@domain`, lowercased.
    pub address: String,
}

impl EmailAddress {
    /// Parse one mailbox token.
    ///
    /// Accepted shapes: `user@host`, `<user@host>`, `Name <user@host>` and
    /// `"Quoted, Name" <user@host>`. Anything else is kept verbatim as the
    /// address with no display name.
    pub fn parse(raw: &str) -> Self {
        let token = raw.trim();

        if let Some((name_part, addr_part)) = split_mailbox(token) {
            return Self {
                display_name: unquote(name_part),
                address: addr_part.trim().to_lowercase(),
            };
        }

        Self {
            display_name: String::new(),
            address: token.to_lowercase(),
        }
    }

    /// Parse a comma-or-semicolon delimited address list, preserving order
    /// and duplicates. Delimiters inside double quotes or angle brackets do
    /// not split.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_address_list(raw)
            .into_iter()
            .map(Self::parse)
            .filter(|mailbox| !mailbox.address.is_empty())
            .collect()
    }

    /// The domain part of the address (everything after `@`), or `""`.
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("")
    }

    /// Whether the address looks structurally valid (exactly one `@`).
    pub fn is_valid(&self) -> bool {
        !self.address.is_empty() && self.address.matches('@').count() == 1
    }
}

/// Split `Name <addr>` into its halves. `None` for bare tokens, which lets
/// the caller treat the whole input as the address.
fn split_mailbox(token: &str) -> Option<(&str, &str)> {
    let inner = token.strip_suffix('>')?;
    let (name, addr) = inner.rsplit_once('<')?;
    Some((name.trim(), addr))
}

/// Remove one layer of surrounding double quotes.
fn unquote(name: &str) -> String {
    name.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(name)
        .to_string()
}

/// Cut an address list at top-level `,`/`;` boundaries.
///
/// Tracks quote state and angle-bracket depth by byte position so quoted
/// display names (`"Last, First" <a@b>`) survive intact.
fn split_address_list(raw: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut quoted = false;
    let mut bracket_depth = 0usize;

    for (pos, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '<' if !quoted => bracket_depth += 1,
            '>' if !quoted => bracket_depth = bracket_depth.saturating_sub(1),
            ',' | ';' if !quoted && bracket_depth == 0 => {
                segments.push(&raw[segment_start..pos]);
                segment_start = pos + 1;
            }
            _ => {}
        }
    }
    segments.push(&raw[segment_start..]);

    segments
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.display_name, self.address)
        }
    }
}
