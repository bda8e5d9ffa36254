//! Retryable-error classification for external command output.
//!
//! Downloads shell out to curl, so transport failures surface as text:
//! curl exit-code tokens like `(56)`, phrases like "connection reset by
//! peer", or an HTTP status echoed by `--fail`. The verdict here decides
//! whether the retry loop sleeps and tries again or gives up immediately.

/// Transient transport signatures worth retrying. Curl exit codes:
/// 7 connect failure, 18 partial file, 28 timeout, 35 TLS connect error,
/// 52 empty reply, 55 send failure, 56 recv failure, 92 HTTP/2 stream error.
const RETRYABLE_SIGNATURES: &[&str] = &[
    "(7)",
    "(18)",
    "(28)",
    "(35)",
    "(52)",
    "(55)",
    "(56)",
    "(92)",
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "could not resolve host",
    "partial file",
    "empty reply from server",
    "transfer closed",
    "http/2 stream",
    "ssl_error_syscall",
];

/// Client-error status tokens that can never succeed on retry. Checked
/// before the retryable signatures so a 404 page mentioning a timeout
/// still aborts.
const CLIENT_ERROR_TOKENS: &[&str] = &["400", "401", "403", "404"];

/// Signatures meaning the current transport structurally cannot carry this
/// download (HTTP/2 stream resets, TLS negotiation faults). The downloader
/// escalates to its next strategy instead of burning retries on these.
const PROTOCOL_FAULT_SIGNATURES: &[&str] = &[
    "(92)",
    "(35)",
    "(16)",
    "http/2 stream",
    "http2",
    "ssl_error_syscall",
];

/// Whether the combined output of a failed command indicates a transient
/// failure worth retrying.
///
/// Precedence: client-error tokens (400/401/403/404) win over any retryable
/// signature. Unknown errors are not retried; an unrecognized failure that
/// loops forever is worse than one that surfaces immediately.
pub fn is_retryable_output(stderr: &str, stdout: &str) -> bool {
    let text = combined(stderr, stdout);
    if CLIENT_ERROR_TOKENS.iter().any(|t| text.contains(t)) {
        return false;
    }
    if RETRYABLE_SIGNATURES.iter().any(|s| text.contains(s)) {
        return true;
    }
    has_5xx_token(&text)
}

/// Whether the output indicates a protocol-level fault that no amount of
/// retrying on the same transport will fix.
pub fn is_protocol_fault(stderr: &str, stdout: &str) -> bool {
    let text = combined(stderr, stdout);
    PROTOCOL_FAULT_SIGNATURES.iter().any(|s| text.contains(s))
}

fn combined(stderr: &str, stdout: &str) -> String {
    let mut text = String::with_capacity(stderr.len() + stdout.len() + 1);
    text.push_str(stderr);
    text.push('\n');
    text.push_str(stdout);
    text.make_ascii_lowercase();
    text
}

/// True if the text contains a standalone 5xx status token (500-599).
fn has_5xx_token(text: &str) -> bool {
    let bytes = text.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] != b'5' {
            continue;
        }
        if i + 2 >= bytes.len() {
            break;
        }
        if !bytes[i + 1].is_ascii_digit() || !bytes[i + 2].is_ascii_digit() {
            continue;
        }
        let prev_is_digit = i > 0 && bytes[i - 1].is_ascii_digit();
        let next_is_digit = i + 3 < bytes.len() && bytes[i + 3].is_ascii_digit();
        if !prev_is_digit && !next_is_digit {
            return true;
        }
    }
    false
}
