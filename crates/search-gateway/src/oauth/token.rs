use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Default access-token lifetime when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Unguessable token for the OAuth `state` parameter and the PKCE verifier: 32 bytes from
/// the thread-local CSPRNG, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex_lower(&bytes)
}

/// PKCE `S256` challenge: base64url (no padding) of the SHA-256 of the verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Token endpoint answer. Providers add more fields; only these are read.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_in: Option<u64>,
}

impl TokenResponse {
    pub fn lifetime_secs(&self) -> u64 {
        self.expires_in
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }
}
