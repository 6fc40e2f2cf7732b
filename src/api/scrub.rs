use std::borrow::Cow;

const MAX_API_ERROR_CHARS: usize = 200;
const REDACTED: &str = "[REDACTED]";

/// Markers after which the backend may echo a credential.
const CREDENTIAL_MARKERS: [&str; 12] = [
    "Authorization: Bearer ",
    "authorization: bearer ",
    "\"authorization\":\"Bearer ",
    "Bearer ",
    "\"token\":\"",
    "\"accessToken\":\"",
    "\"refreshToken\":\"",
    "\"password\":\"",
    "\"sessionToken\":\"",
    "next-auth.session-token=",
    "access_token=",
    "api_key=",
];

fn is_credential_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '+' | '/' | '=' | '%')
}

fn credential_end(input: &str, from: usize) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_credential_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

fn redact_after(scrubbed: &mut String, marker: &str) {
    let mut search_from = 0;
    while let Some(rel) = scrubbed[search_from..].find(marker) {
        let value_start = search_from + rel + marker.len();
        let value_end = credential_end(scrubbed, value_start);

        if value_end == value_start || scrubbed[value_start..value_end] == *REDACTED {
            search_from = value_start;
            continue;
        }

        scrubbed.replace_range(value_start..value_end, REDACTED);
        search_from = value_start + REDACTED.len();
    }
}

/// Replace echoed bearer tokens, session cookies and passwords with `[REDACTED]`.
pub fn scrub_credentials(input: &str) -> Cow<'_, str> {
    if !CREDENTIAL_MARKERS.iter().any(|marker| input.contains(marker)) {
        return Cow::Borrowed(input);
    }

    let mut scrubbed = input.to_string();
    for marker in CREDENTIAL_MARKERS {
        redact_after(&mut scrubbed, marker);
    }
    Cow::Owned(scrubbed)
}

/// Scrub and truncate an error body before it reaches logs or errors.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_credentials(input.trim());

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed.into_owned();
    }

    let truncated: String = scrubbed.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}
