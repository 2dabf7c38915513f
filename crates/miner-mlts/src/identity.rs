use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

const RSA_KEY_BITS: usize = 2048;

/// The node's process-wide RSA identity, generated once at boot and never
/// persisted (§3). Used only to unwrap peer-generated session keys.
pub struct RsaIdentity {
    private_key: RsaPrivateKey,
    public_key_pem: String,
}

impl RsaIdentity {
    pub fn generate() -> miner_core::Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
            .map_err(|e| miner_core::MinerError::Internal(format!("RSA keygen failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| miner_core::MinerError::Internal(format!("PEM encode failed: {e}")))?;

        Ok(Self {
            private_key,
            public_key_pem,
        })
    }

    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// Unwrap a peer-generated session key from its RSA-OAEP(SHA-256,
    /// MGF1-SHA-256) envelope.
    pub fn unwrap_session_key(&self, enc_key: &[u8]) -> miner_core::Result<[u8; 32]> {
        let padding = Oaep::new::<Sha256>();
        let decrypted = self
            .private_key
            .decrypt(padding, enc_key)
            .map_err(|e| miner_core::MinerError::HandshakeRejected(format!("RSA decrypt failed: {e}")))?;

        decrypted
            .try_into()
            .map_err(|_| miner_core::MinerError::HandshakeRejected("unwrapped key is not 32 bytes".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPublicKey;

    #[test]
    fn generate_produces_valid_pem() {
        let identity = RsaIdentity::generate().unwrap();
        assert!(identity.public_key_pem().starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn unwrap_round_trips_a_wrapped_session_key() {
        let identity = RsaIdentity::generate().unwrap();
        let public_key = RsaPublicKey::from(&identity.private_key);
        let mut rng = rand::rngs::OsRng;
        let mut session_key = [0u8; 32];
        use rand::RngCore;
        rng.fill_bytes(&mut session_key);

        let wrapped = public_key
            .encrypt(&mut rng, Oaep::new::<Sha256>(), &session_key)
            .unwrap();
        let unwrapped = identity.unwrap_session_key(&wrapped).unwrap();
        assert_eq!(unwrapped, session_key);
    }
}
