//! Ed25519 key types and their SPKI / PKCS#8 container codec.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use ed25519_dalek::pkcs8::spki::SubjectPublicKeyInfoRef;
use ed25519_dalek::pkcs8::{
    ALGORITHM_OID, EncodePrivateKey, EncodePublicKey, KeypairBytes, PrivateKeyInfo,
};
use ed25519_dalek::{SigningKey as DalekSigningKey, VerifyingKey as DalekVerifyingKey};

use crate::error::{Error, Result};

/// An agent's Ed25519 private key.
///
/// # Example
///
/// ```
/// use openleash::SigningKey;
///
/// let signing_key = SigningKey::generate();
/// let pkcs8_b64 = signing_key.to_pkcs8_base64().unwrap();
///
/// let recovered = SigningKey::from_pkcs8_base64(&pkcs8_b64).unwrap();
/// assert_eq!(recovered.verifying_key(), signing_key.verifying_key());
/// ```
#[derive(Clone)]
pub struct SigningKey {
    inner: DalekSigningKey,
}

impl SigningKey {
    /// Creates a new random signing key from the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            inner: DalekSigningKey::generate(&mut rng),
        }
    }

    /// Creates a signing key from a raw 32-byte seed.
    #[must_use]
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            inner: DalekSigningKey::from_bytes(seed),
        }
    }

    /// Returns the raw 32-byte seed.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Decodes a PKCS#8 DER private key container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDecode`] with
    /// [`InvalidKeyEncoding`](crate::KeyDecodeKind::InvalidKeyEncoding) if the
    /// container is malformed, or
    /// [`UnsupportedKeyAlgorithm`](crate::KeyDecodeKind::UnsupportedKeyAlgorithm)
    /// if it holds a non-Ed25519 key.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)
            .map_err(|e| Error::key_encoding(format!("malformed PKCS#8 container: {e}")))?;

        if info.algorithm.oid != ALGORITHM_OID {
            return Err(Error::key_algorithm(format!(
                "private key algorithm {} is not Ed25519",
                info.algorithm.oid
            )));
        }

        DalekSigningKey::try_from(info)
            .map(|inner| Self { inner })
            .map_err(|e| Error::key_encoding(format!("malformed Ed25519 private key: {e}")))
    }

    /// Decodes a base64-standard PKCS#8 DER transport string.
    ///
    /// # Errors
    ///
    /// See [`SigningKey::from_pkcs8_der`]; invalid base64 is reported as
    /// [`InvalidKeyEncoding`](crate::KeyDecodeKind::InvalidKeyEncoding).
    pub fn from_pkcs8_base64(b64: &str) -> Result<Self> {
        let der = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::key_encoding(format!("private key is not base64: {e}")))?;
        Self::from_pkcs8_der(&der)
    }

    /// Encodes the key as a PKCS#8 v1 `PrivateKeyInfo` (48 bytes, no
    /// embedded public key).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        KeypairBytes {
            secret_key: self.inner.to_bytes(),
            public_key: None,
        }
        .to_pkcs8_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| Error::Encoding {
            reason: format!("PKCS#8 encoding failed: {e}"),
        })
    }

    /// Encodes the key as a base64-standard PKCS#8 DER transport string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_pkcs8_base64(&self) -> Result<String> {
        Ok(BASE64_STANDARD.encode(self.to_pkcs8_der()?))
    }

    /// Returns the corresponding verifying (public) key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub(crate) fn as_dalek(&self) -> &DalekSigningKey {
        &self.inner
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// An Ed25519 public key, used to verify request signatures and proof tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: DalekVerifyingKey,
}

impl VerifyingKey {
    /// Creates a verifying key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDecode`] if the bytes are not a valid curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(|inner| Self { inner })
            .map_err(|e| Error::key_encoding(e.to_string()))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Decodes an SPKI DER public key container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyDecode`] with
    /// [`InvalidKeyEncoding`](crate::KeyDecodeKind::InvalidKeyEncoding) if the
    /// container is malformed, or
    /// [`UnsupportedKeyAlgorithm`](crate::KeyDecodeKind::UnsupportedKeyAlgorithm)
    /// if it holds a non-Ed25519 key.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        let info = SubjectPublicKeyInfoRef::try_from(der)
            .map_err(|e| Error::key_encoding(format!("malformed SPKI container: {e}")))?;

        if info.algorithm.oid != ALGORITHM_OID {
            return Err(Error::key_algorithm(format!(
                "public key algorithm {} is not Ed25519",
                info.algorithm.oid
            )));
        }

        DalekVerifyingKey::try_from(info)
            .map(|inner| Self { inner })
            .map_err(|e| Error::key_encoding(format!("malformed Ed25519 public key: {e}")))
    }

    /// Decodes a base64-standard SPKI DER transport string.
    ///
    /// # Errors
    ///
    /// See [`VerifyingKey::from_spki_der`].
    pub fn from_spki_base64(b64: &str) -> Result<Self> {
        let der = BASE64_STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::key_encoding(format!("public key is not base64: {e}")))?;
        Self::from_spki_der(&der)
    }

    /// Encodes the key as an SPKI DER container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| Error::Encoding {
                reason: format!("SPKI encoding failed: {e}"),
            })
    }

    /// Encodes the key as a base64-standard SPKI DER transport string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_spki_base64(&self) -> Result<String> {
        Ok(BASE64_STANDARD.encode(self.to_spki_der()?))
    }

    pub(crate) fn as_dalek(&self) -> &DalekVerifyingKey {
        &self.inner
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.to_bytes();
        write!(
            f,
            "VerifyingKey({:02x}{:02x}{:02x}{:02x}...)",
            bytes[0], bytes[1], bytes[2], bytes[3]
        )
    }
}

/// Decodes an SPKI DER public key. Free-function form of
/// [`VerifyingKey::from_spki_der`].
///
/// # Errors
///
/// Returns [`Error::KeyDecode`] on malformed or non-Ed25519 input.
pub fn decode_public_key(der: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_spki_der(der)
}

/// Decodes a PKCS#8 DER private key. Free-function form of
/// [`SigningKey::from_pkcs8_der`].
///
/// # Errors
///
/// Returns [`Error::KeyDecode`] on malformed or non-Ed25519 input.
pub fn decode_private_key(der: &[u8]) -> Result<SigningKey> {
    SigningKey::from_pkcs8_der(der)
}

/// A freshly generated agent keypair with its transport encodings.
///
/// ```
/// use openleash::AgentKeypair;
///
/// let keypair = AgentKeypair::generate().unwrap();
/// assert!(keypair.public_key_b64.starts_with("MCowBQYDK2Vw"));
/// ```
#[derive(Debug, Clone)]
pub struct AgentKeypair {
    /// The private half
    pub signing_key: SigningKey,
    /// Base64 SPKI DER of the public half
    pub public_key_b64: String,
    /// Base64 PKCS#8 DER of the private half
    pub private_key_b64: String,
}

impl AgentKeypair {
    /// Generates a new keypair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the key containers cannot be serialized.
    pub fn generate() -> Result<Self> {
        Self::from_signing_key(SigningKey::generate())
    }

    /// Wraps an existing signing key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the key containers cannot be serialized.
    pub fn from_signing_key(signing_key: SigningKey) -> Result<Self> {
        let public_key_b64 = signing_key.verifying_key().to_spki_base64()?;
        let private_key_b64 = signing_key.to_pkcs8_base64()?;
        Ok(Self {
            signing_key,
            public_key_b64,
            private_key_b64,
        })
    }

    /// Returns the public half.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}
