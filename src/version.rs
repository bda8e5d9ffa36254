//! Loose semantic-version parsing for upstream release channels.
//!
//! Upstream version strings are semver-ish at best (`16.1.0`, `v6.8.24-rc1`,
//! sometimes just `18.7`). Parsing is total and deterministic: anything with
//! a numeric first segment yields a tuple, everything else is `None`.

/// `(major, minor, patch)` ordering key. Never persisted; used only to pick
/// the best release during major-version matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionTuple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Parse a loosely-formed version string.
///
/// Strips a leading `v`/`V`, splits on `.`, and takes up to three segments.
/// The patch segment is truncated at the first `-` or `+` so pre-release and
/// build annotations don't affect ordering. Missing or unparseable minor and
/// patch segments default to 0; an unparseable major segment means `None`.
pub fn parse(s: &str) -> Option<VersionTuple> {
    let trimmed = s.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let mut segments = trimmed.split('.');

    let major: u64 = segments.next()?.parse().ok()?;
    let minor: u64 = segments
        .next()
        .and_then(|seg| seg.parse().ok())
        .unwrap_or(0);
    let patch: u64 = segments
        .next()
        .map(|seg| {
            let numeric = seg
                .split_once(['-', '+'])
                .map(|(head, _)| head)
                .unwrap_or(seg);
            numeric.parse().unwrap_or(0)
        })
        .unwrap_or(0);

    Some(VersionTuple {
        major,
        minor,
        patch,
    })
}

/// Among `versions`, the highest one whose major component equals
/// `target_major`, or `None` when nothing matches (including when no
/// version parses at all).
pub fn best_match<'a, S: AsRef<str>>(versions: &'a [S], target_major: u64) -> Option<&'a str> {
    versions
        .iter()
        .filter_map(|v| {
            let tuple = parse(v.as_ref())?;
            (tuple.major == target_major).then_some((tuple, v.as_ref()))
        })
        .max_by_key(|(tuple, _)| *tuple)
        .map(|(_, v)| v)
}
