//! Opaque external identifiers.
//!
//! Every numeric primary key leaves the process as a 16-character URL-safe
//! token. The id is run through a salted 4-round Feistel permutation (so
//! consecutive ids do not produce related tokens) and a 4-byte salted tag is
//! appended so that truncated, mutated, or foreign tokens are rejected instead
//! of decoding to some other row. This hides sequence numbers; it is not an
//! access-control mechanism.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

const ROUNDS: u8 = 4;
const TAG_LEN: usize = 4;
const BODY_LEN: usize = 8;
const TOKEN_BYTES: usize = BODY_LEN + TAG_LEN;
/// Encoded token length; 12 bytes encode to 16 base64 characters exactly.
pub const TOKEN_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid identifier")]
pub struct InvalidId;

/// Salted, reversible mapping between sequential ids and opaque tokens.
///
/// Built once at startup from the configured salt and shared read-only.
#[derive(Clone)]
pub struct IdMasker {
    keyed: Sha256,
}

impl std::fmt::Debug for IdMasker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdMasker").finish_non_exhaustive()
    }
}

impl IdMasker {
    pub fn new(salt: &str) -> Self {
        let mut keyed = Sha256::new();
        keyed.update((salt.len() as u64).to_be_bytes());
        keyed.update(salt.as_bytes());
        Self { keyed }
    }

    pub fn mask(&self, id: u64) -> String {
        let body = self.permute(id).to_be_bytes();
        let mut raw = [0u8; TOKEN_BYTES];
        raw[..BODY_LEN].copy_from_slice(&body);
        raw[BODY_LEN..].copy_from_slice(&self.tag(&body));
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Reverses [`IdMasker::mask`]. Any token this masker did not produce is
    /// rejected with [`InvalidId`].
    pub fn unmask(&self, token: &str) -> Result<u64, InvalidId> {
        if token.len() != TOKEN_LEN {
            return Err(InvalidId);
        }
        let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| InvalidId)?;
        let raw: [u8; TOKEN_BYTES] = raw.try_into().map_err(|_| InvalidId)?;
        let (body, tag) = raw.split_at(BODY_LEN);
        let body: [u8; BODY_LEN] = body.try_into().map_err(|_| InvalidId)?;
        if self.tag(&body) != tag {
            return Err(InvalidId);
        }
        Ok(self.unpermute(u64::from_be_bytes(body)))
    }

    fn permute(&self, id: u64) -> u64 {
        let (mut left, mut right) = split(id);
        for round in 0..ROUNDS {
            let next = left ^ self.round(round, right);
            left = right;
            right = next;
        }
        join(left, right)
    }

    fn unpermute(&self, value: u64) -> u64 {
        let (mut left, mut right) = split(value);
        for round in (0..ROUNDS).rev() {
            let prev = right ^ self.round(round, left);
            right = left;
            left = prev;
        }
        join(left, right)
    }

    fn round(&self, round: u8, half: u32) -> u32 {
        let digest = self
            .keyed
            .clone()
            .chain_update([b'r', round])
            .chain_update(half.to_be_bytes())
            .finalize();
        u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    fn tag(&self, body: &[u8; BODY_LEN]) -> [u8; TAG_LEN] {
        let digest = self.keyed.clone().chain_update(b"t").chain_update(body).finalize();
        [digest[0], digest[1], digest[2], digest[3]]
    }
}

fn split(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

fn join(high: u32, low: u32) -> u64 {
    (u64::from(high) << 32) | u64::from(low)
}
