//! Field-level encryption for sensitive display fields.
//!
//! [`FieldCodec`] turns a plaintext string into `base64(iv || ciphertext)`
//! using AES-256-CBC with a fresh random IV per call. The key is derived
//! once, at construction, from an externally supplied secret via
//! PBKDF2-HMAC-SHA256. The codec is a display-layer convenience, not a
//! tamper-detection mechanism: [`FieldCodec::decrypt`] degrades every
//! failure to an empty string, and callers must treat `""` as "field
//! unavailable", falling back to a placeholder. [`FieldCodec::decrypt_checked`]
//! preserves the failure reason for logging and auditing.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;
use sha2::Sha256;

use crate::error::CoreError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Environment variable holding the out-of-band codec secret.
pub const SECRET_ENV_VAR: &str = "STRIDE_FIELD_KEY";

/// PBKDF2 iteration count for key derivation.
const KDF_ITERATIONS: u32 = 65_536;

/// Fixed, non-sensitive KDF salt. The secret itself is the confidential
/// input; the salt only separates this deployment's key space from others
/// using the same passphrase elsewhere.
const KDF_SALT: &[u8] = b"stride_field_salt";

/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
const IV_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Symmetric codec for opaque string fields.
///
/// Stateless after construction; share one instance (e.g. behind an `Arc`)
/// across tasks.
#[derive(Clone)]
pub struct FieldCodec {
    key: Option<[u8; KEY_LEN]>,
}

impl FieldCodec {
    /// Derive the field key from `secret`.
    ///
    /// An empty secret produces a disabled codec rather than an error:
    /// absence of the deployment secret must never crash the process, only
    /// degrade field values to `""`.
    pub fn new(secret: &str) -> Self {
        if secret.is_empty() {
            tracing::warn!("field codec constructed without a secret; all fields will degrade");
            return Self { key: None };
        }
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), KDF_SALT, KDF_ITERATIONS, &mut key);
        Self { key: Some(key) }
    }

    /// Build a codec from the [`SECRET_ENV_VAR`] environment variable.
    ///
    /// A missing variable yields a disabled codec, same as an empty secret.
    pub fn from_env() -> Self {
        Self::new(&std::env::var(SECRET_ENV_VAR).unwrap_or_default())
    }

    /// A codec with no key. Every call degrades to `""`.
    pub fn disabled() -> Self {
        Self { key: None }
    }

    /// Whether a key is loaded.
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt `plaintext` into `base64(iv || ciphertext)`.
    ///
    /// Empty plaintext and a disabled codec both yield `""` — never an
    /// error.
    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }
        let Some(key) = &self.key else {
            tracing::warn!("encrypt called on disabled codec; emitting empty field");
            return String::new();
        };

        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        BASE64.encode(combined)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    ///
    /// Any failure degrades to `""` after logging. Callers must not use the
    /// result to distinguish "empty field" from "undecryptable field"; use
    /// [`decrypt_checked`](Self::decrypt_checked) where that distinction
    /// matters.
    pub fn decrypt(&self, blob: &str) -> String {
        match self.decrypt_checked(blob) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!("field decryption degraded: {e}");
                String::new()
            }
        }
    }

    /// Decrypt, preserving the failure reason.
    ///
    /// Empty or whitespace-only input is a truly empty field and returns
    /// `Ok("")`; everything else that fails to decrypt is
    /// [`CoreError::CryptoDegraded`].
    pub fn decrypt_checked(&self, blob: &str) -> Result<String, CoreError> {
        if blob.trim().is_empty() {
            return Ok(String::new());
        }
        let Some(key) = &self.key else {
            return Err(CoreError::CryptoDegraded("codec has no key".into()));
        };

        let combined = BASE64
            .decode(blob.trim())
            .map_err(|e| CoreError::CryptoDegraded(format!("invalid base64: {e}")))?;
        if combined.len() <= IV_LEN {
            return Err(CoreError::CryptoDegraded(format!(
                "blob too short: {} bytes",
                combined.len()
            )));
        }

        let (iv, ciphertext) = combined.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().expect("split_at yields IV_LEN bytes");

        let plaintext = Aes256CbcDec::new(key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CoreError::CryptoDegraded("cipher error or wrong key".into()))?;

        String::from_utf8(plaintext)
            .map_err(|e| CoreError::CryptoDegraded(format!("invalid utf-8: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn codec() -> FieldCodec {
        FieldCodec::new("unit-test-secret")
    }

    #[test]
    fn round_trip_preserves_plaintext() {
        let c = codec();
        for s in ["a", "Amara", "N/A", "emoji 🌟 and unicode ñ", &"x".repeat(500)] {
            assert_eq!(c.decrypt(&c.encrypt(s)), s);
        }
    }

    #[test]
    fn fresh_iv_per_call() {
        let c = codec();
        let a = c.encrypt("same input");
        let b = c.encrypt("same input");
        assert_ne!(a, b, "two encryptions of one value must differ");
        assert_eq!(c.decrypt(&a), c.decrypt(&b));
    }

    #[test]
    fn empty_plaintext_yields_empty_blob() {
        assert_eq!(codec().encrypt(""), "");
    }

    #[test]
    fn ciphertext_is_not_plaintext() {
        let c = codec();
        let blob = c.encrypt("Amara");
        assert!(!blob.contains("Amara"));
        assert!(BASE64.decode(&blob).is_ok());
    }

    #[test]
    fn decrypt_degrades_to_empty_never_panics() {
        let c = codec();
        assert_eq!(c.decrypt(""), "");
        assert_eq!(c.decrypt("   "), "");
        assert_eq!(c.decrypt("not-base64!!!"), "");
        assert_eq!(c.decrypt("QQ=="), ""); // valid base64, shorter than one IV
    }

    #[test]
    fn wrong_key_degrades_to_empty() {
        let blob = FieldCodec::new("key-one").encrypt("secret value");
        assert_eq!(FieldCodec::new("key-two").decrypt(&blob), "");
    }

    #[test]
    fn disabled_codec_degrades_both_directions() {
        let c = FieldCodec::disabled();
        assert_eq!(c.encrypt("anything"), "");
        assert_eq!(c.decrypt("anything"), "");
        assert!(!c.is_enabled());
    }

    #[test]
    fn decrypt_checked_reports_reason() {
        let c = codec();
        assert_matches!(c.decrypt_checked("***"), Err(CoreError::CryptoDegraded(_)));
        assert_matches!(
            FieldCodec::disabled().decrypt_checked("QQ=="),
            Err(CoreError::CryptoDegraded(_))
        );
        assert_matches!(c.decrypt_checked(""), Ok(s) if s.is_empty());
    }

    #[test]
    fn same_secret_derives_same_key() {
        let blob = FieldCodec::new("shared").encrypt("portable");
        assert_eq!(FieldCodec::new("shared").decrypt(&blob), "portable");
    }
}
