//! Branch-name codec.
//!
//! Branch names carry `/` and arbitrary bytes; grove needs them as single
//! path components (stash metadata filenames) and single ref components
//! (`refs/wt/stashes/<token>`). The encoding is reversible:
//!
//! - a literal `--` pair becomes `%2D%2D` (escaped before the slash
//!   substitution so decoding is unambiguous),
//! - `/` becomes `--`,
//! - `[A-Za-z0-9._-]` pass through,
//! - any other byte becomes uppercase `%HH`.
//!
//! After the pass, any remaining `..` becomes `.%2E` and a leading `.`
//! becomes `%2E`, keeping the token valid as a ref component.

use anyhow::{bail, Result};

fn is_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-')
}

/// Encode a branch name as a filename- and ref-safe token.
pub fn encode(branch: &str) -> String {
    let bytes = branch.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'-') {
            out.push_str("%2D%2D");
            i += 2;
        } else if bytes[i] == b'/' {
            out.push_str("--");
            i += 1;
        } else if is_safe(bytes[i]) {
            out.push(bytes[i] as char);
            i += 1;
        } else {
            out.push_str(&format!("%{:02X}", bytes[i]));
            i += 1;
        }
    }

    let mut out = out.replace("..", ".%2E");
    if out.starts_with('.') {
        out.replace_range(0..1, "%2E");
    }
    out
}

/// Decode a token produced by [`encode`].
///
/// Reverses the encoding strictly in the opposite order: `--` back to `/`
/// first (unambiguous because literal `--` was escaped), then `%HH` back to
/// raw bytes.
pub fn decode(token: &str) -> Result<String> {
    let unslashed = token.replace("--", "/");

    let bytes = unslashed.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = unslashed
                .get(i + 1..i + 3)
                .ok_or_else(|| anyhow::anyhow!("truncated escape in token {token:?}"))?;
            match u8::from_str_radix(hex, 16) {
                Ok(byte) => out.push(byte),
                Err(_) => bail!("invalid escape %{hex} in token {token:?}"),
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(out).map_err(|_| anyhow::anyhow!("token {token:?} does not decode to UTF-8"))
}
