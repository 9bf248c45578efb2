use scribe_core::JobId;
use sha2::{Digest, Sha256};

/// Turns a server-provided name into a safe local file name.
///
/// Directory components are dropped, forbidden characters become `_`, and an
/// empty result falls back to `fallback`.
pub fn sanitize_filename(input: &str, fallback: &str) -> String {
    let base = input.rsplit(&['/', '\\'][..]).next().unwrap_or(input);
    let mut cleaned: String = base
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if cleaned.is_empty() {
        cleaned = fallback.to_string();
    }

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut final_name = truncate_chars(&compacted, 120);
    let stem = final_name.split('.').next().unwrap_or_default();
    if is_reserved_windows_name(stem) {
        let stem_len = stem.len();
        final_name.insert(stem_len, '_');
    }
    final_name
}

/// Local name for a finished transcript: `{saved_as stem}--{short_hash(job_id)}.txt`.
pub fn transcript_filename(saved_as: Option<&str>, job_id: &JobId) -> String {
    let stem = saved_as
        .map(|name| name.strip_suffix(".txt").unwrap_or(name))
        .unwrap_or("transcript");
    let stem = sanitize_filename(stem, "transcript");
    format!("{stem}--{}.txt", short_hash(job_id.as_str()))
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    input.chars().take(max_chars).collect()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
