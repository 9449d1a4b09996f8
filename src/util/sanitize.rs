//! Canonical form of conference names.

/// Normalize `room@domain` into the form stored in the registry.
///
/// Only the last `@` separates the domain, so the room part may itself
/// contain `@`. The room part is lower-cased and query-escaped the same way
/// Jitsi escapes room names; the domain is kept verbatim. Input without any
/// `@` is taken as a bare domain with an empty room.
pub fn sanitize_conference_name(raw: &str) -> String {
    let (room, domain) = raw.rsplit_once('@').unwrap_or(("", raw));
    format!("{}@{}", query_escape(&lowercase(room)), domain)
}

/// Lower-case one `char` at a time, without context-sensitive rules, so a
/// word-final `Σ` becomes `σ` rather than `ς`.
pub fn lowercase(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

// Query-component escaping: space becomes '+', unreserved bytes pass.
fn query_escape(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}
