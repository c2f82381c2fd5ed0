//! Helpers for picking apart Source log message text
//!
//! Log messages are byte strings, not guaranteed to be valid UTF-8, so
//! everything here works on byte slices.

/// Player identity parsed from a `NAME<ID><USERID><TEAM>` blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInfo<'a> {
    /// Screen name
    pub name: &'a [u8],
    /// Integer id the server assigned to the player
    pub player_id: &'a [u8],
    /// `[U:...:...]` for a Steam user, or `BOT`
    pub user_id: &'a [u8],
    /// Empty, `Unassigned`, `TERRORIST` or `CT`
    pub team: &'a [u8],
}

/// Parse a player blob of the form `NAME<ID><USERID><TEAM>`
pub fn parse_player_info(blob: &[u8]) -> Option<PlayerInfo<'_>> {
    let blob = blob.strip_suffix(b">").unwrap_or(blob);

    let mut pieces = Vec::with_capacity(3);
    let mut rest = blob;
    while let Some(pos) = find(rest, b"><") {
        pieces.push(&rest[..pos]);
        rest = &rest[pos + 2..];
    }
    pieces.push(rest);

    let [name_with_id, user_id, team] = pieces.as_slice() else {
        return None;
    };

    let split = name_with_id.iter().position(|&b| b == b'<')?;
    Some(PlayerInfo {
        name: &name_with_id[..split],
        player_id: &name_with_id[split + 1..],
        user_id,
        team,
    })
}

/// All non-empty double-quoted substrings of `message`, in order
pub fn quoted_strings(message: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut start = None;
    for (idx, &byte) in message.iter().enumerate() {
        if byte == b'"' {
            match start.take() {
                None => start = Some(idx + 1),
                Some(s) if idx > s => out.push(&message[s..idx]),
                Some(_) => {}
            }
        }
    }
    out
}

/// Byte-slice substring search
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
