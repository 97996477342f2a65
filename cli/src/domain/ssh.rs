use anyhow::Result;

const KEY_TYPES: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
];

/// Validates one `authorized_keys` line: `<type> <base64-material> [comment]`.
///
/// # Errors
///
/// Returns an error if the key type is unsupported, the key material is
/// missing, or the line contains characters outside the safe set.
pub fn validate_pubkey(key: &str) -> Result<()> {
    let mut parts = key.split_whitespace();
    let kind = parts.next().unwrap_or_default();
    anyhow::ensure!(KEY_TYPES.contains(&kind), "unsupported public key type {kind:?}");
    let material = parts.next().unwrap_or_default();
    anyhow::ensure!(!material.is_empty(), "public key has no key material");
    anyhow::ensure!(
        material
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "+/=".contains(c)),
        "public key material contains invalid characters"
    );
    anyhow::ensure!(
        !key.contains(['\'', '"', '`', '$', '\\']),
        "public key contains invalid characters"
    );
    Ok(())
}

/// Keeps the valid lines of an `authorized_keys` document, joined by newlines.
#[must_use]
pub fn filter_authorized_keys(document: &str) -> String {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && validate_pubkey(line).is_ok())
        .collect::<Vec<_>>()
        .join("\n")
}
