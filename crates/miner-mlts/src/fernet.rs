//! A from-scratch implementation of the Fernet symmetric construction
//! (AES-128-CBC encryption + HMAC-SHA256 authentication, base64url tokens
//! with an embedded timestamp) since no crate in the dependency graph
//! provides it. Wire-compatible with the reference `cryptography.fernet`
//! implementation this scheme was ported from.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
/// Clock-skew tolerance for a token claiming to be from the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum FernetError {
    #[error("invalid token encoding")]
    InvalidToken,
    #[error("invalid token version")]
    InvalidVersion,
    #[error("token signature does not match")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token timestamp is too far in the future")]
    ClockSkew,
}

/// A 32-byte composite key: bytes `[0..16)` sign, bytes `[16..32)` encrypt —
/// identical layout to the reference Fernet key.
#[derive(Clone)]
pub struct FernetKey {
    signing_key: [u8; 16],
    encryption_key: [u8; 16],
}

impl FernetKey {
    pub fn from_bytes(key: &[u8; 32]) -> Self {
        let mut signing_key = [0u8; 16];
        let mut encryption_key = [0u8; 16];
        signing_key.copy_from_slice(&key[0..16]);
        encryption_key.copy_from_slice(&key[16..32]);
        Self {
            signing_key,
            encryption_key,
        }
    }

    pub fn generate() -> ([u8; 32], Self) {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        (key, Self::from_bytes(&key))
    }

    pub fn encrypt(&self, plaintext: &[u8], now_unix: i64) -> String {
        use rand::RngCore;
        let mut iv = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes128CbcEnc::new(&self.encryption_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut frame = Vec::with_capacity(1 + 8 + 16 + ciphertext.len());
        frame.push(VERSION);
        frame.extend_from_slice(&now_unix.to_be_bytes());
        frame.extend_from_slice(&iv);
        frame.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(&self.signing_key).expect("valid hmac key size");
        mac.update(&frame);
        let tag = mac.finalize().into_bytes();
        frame.extend_from_slice(&tag);

        URL_SAFE.encode(frame)
    }

    pub fn decrypt(&self, token: &str, ttl_secs: i64, now_unix: i64) -> Result<Vec<u8>, FernetError> {
        let frame = URL_SAFE
            .decode(token)
            .map_err(|_| FernetError::InvalidToken)?;

        if frame.len() < 1 + 8 + 16 + 32 {
            return Err(FernetError::InvalidToken);
        }

        let (signed_part, tag) = frame.split_at(frame.len() - 32);
        if signed_part[0] != VERSION {
            return Err(FernetError::InvalidVersion);
        }

        let mut mac = HmacSha256::new_from_slice(&self.signing_key).expect("valid hmac key size");
        mac.update(signed_part);
        mac.verify_slice(tag).map_err(|_| FernetError::BadSignature)?;

        let timestamp = i64::from_be_bytes(signed_part[1..9].try_into().unwrap());
        if now_unix > timestamp + ttl_secs {
            return Err(FernetError::Expired);
        }
        if timestamp > now_unix + MAX_CLOCK_SKEW_SECS {
            return Err(FernetError::ClockSkew);
        }

        let iv: [u8; 16] = signed_part[9..25].try_into().unwrap();
        let ciphertext = &signed_part[25..];

        Aes128CbcDec::new(&self.encryption_key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| FernetError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let (_raw, key) = FernetKey::generate();
        let token = key.encrypt(b"hello world", 1_000_000);
        let plain = key.decrypt(&token, 300, 1_000_100).unwrap();
        assert_eq!(plain, b"hello world");
    }

    #[test]
    fn rejects_expired_token() {
        let (_raw, key) = FernetKey::generate();
        let token = key.encrypt(b"hello", 1_000_000);
        let err = key.decrypt(&token, 300, 1_000_301).unwrap_err();
        assert!(matches!(err, FernetError::Expired));
    }

    #[test]
    fn rejects_tampered_token() {
        let (_raw, key) = FernetKey::generate();
        let mut token = key.encrypt(b"hello", 1_000_000);
        token.push('A');
        assert!(key.decrypt(&token, 300, 1_000_001).is_err());
    }

    #[test]
    fn rejects_wrong_key() {
        let (_raw1, key1) = FernetKey::generate();
        let (_raw2, key2) = FernetKey::generate();
        let token = key1.encrypt(b"hello", 1_000_000);
        assert!(key2.decrypt(&token, 300, 1_000_001).is_err());
    }
}
