//! Signed notes: the text envelope wrapped around checkpoints.
//!
//! A note is a UTF-8 text body (ending in a newline) followed by a blank
//! line and one or more signature lines of the form:
//!
//! ```text
//! — <key-name> <base64(4-byte key hash || 64-byte Ed25519 signature)>
//! ```
//!
//! Key strings use the sumdb conventions so existing tooling and witnesses
//! can interoperate:
//!
//! - verifier: `<name>+<8 hex digits>+<base64(0x01 || public key)>`
//! - signer:   `PRIVATE+KEY+<name>+<8 hex digits>+<base64(0x01 || seed)>`
//!
//! The 8 hex digits are the key hash: the first four bytes of
//! `SHA-256(<name> || '\n' || 0x01 || <public key>)`.

use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Algorithm byte for Ed25519 note keys.
const ALG_ED25519: u8 = 0x01;

/// Prefix of a signature line (em dash, space).
const SIG_PREFIX: &str = "\u{2014} ";

/// Prefix of a signer key string.
const SIGNER_PREFIX: &str = "PRIVATE+KEY+";

fn b64() -> base64::engine::general_purpose::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// First four bytes of `SHA-256(name || '\n' || alg || key)`.
fn key_hash(name: &str, alg_key: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\n");
    hasher.update(alg_key);
    let digest = hasher.finalize();
    [digest[0], digest[1], digest[2], digest[3]]
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(|c| c == '+' || c.is_whitespace())
}

/// Splits `<name>+<hash>+<base64>` into its parts and decodes them.
fn parse_key_string(key: &str) -> Result<(String, [u8; 4], Vec<u8>)> {
    let mut parts = key.rsplitn(3, '+');
    let b64_part = parts
        .next()
        .ok_or_else(|| Error::malformed("empty key string"))?;
    let hash_part = parts
        .next()
        .ok_or_else(|| Error::malformed("key string missing hash"))?;
    let name = parts
        .next()
        .ok_or_else(|| Error::malformed("key string missing name"))?;
    if !valid_name(name) {
        return Err(Error::malformed(format!("invalid key name {name:?}")));
    }
    let hash_bytes =
        hex::decode(hash_part).map_err(|e| Error::malformed(format!("invalid key hash: {e}")))?;
    let hash: [u8; 4] = hash_bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::malformed("key hash must be 8 hex digits"))?;
    let key_bytes = b64()
        .decode(b64_part)
        .map_err(|e| Error::malformed(format!("invalid key material: {e}")))?;
    Ok((name.to_string(), hash, key_bytes))
}

/// Signs notes with an Ed25519 key.
pub struct Signer {
    name: String,
    key: SigningKey,
    key_hash: [u8; 4],
}

impl Signer {
    /// Parse a signer from its `PRIVATE+KEY+...` key string.
    pub fn new(skey: &str) -> Result<Self> {
        let rest = skey
            .strip_prefix(SIGNER_PREFIX)
            .ok_or_else(|| Error::malformed("signer key must start with PRIVATE+KEY+"))?;
        let (name, hash, key_bytes) = parse_key_string(rest)?;
        let (alg, seed) = key_bytes
            .split_first()
            .ok_or_else(|| Error::malformed("empty signer key material"))?;
        if *alg != ALG_ED25519 {
            return Err(Error::malformed(format!("unknown signer algorithm {alg}")));
        }
        let seed: [u8; 32] = seed
            .try_into()
            .map_err(|_| Error::malformed("signer seed must be 32 bytes"))?;
        let key = SigningKey::from_bytes(&seed);

        let mut alg_pub = vec![ALG_ED25519];
        alg_pub.extend_from_slice(key.verifying_key().as_bytes());
        let computed = key_hash(&name, &alg_pub);
        if computed != hash {
            return Err(Error::malformed("signer key hash mismatch"));
        }

        Ok(Self {
            name,
            key,
            key_hash: hash,
        })
    }

    /// The key name, as it appears on signature lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sign a note body, returning the full note.
    ///
    /// The body must be newline-terminated; the signature covers the body
    /// exactly as passed.
    pub fn sign_note(&self, text: &str) -> Result<String> {
        if text.is_empty() || !text.ends_with('\n') {
            return Err(Error::malformed("note text must end with a newline"));
        }
        let sig = self.key.sign(text.as_bytes());
        let mut blob = Vec::with_capacity(4 + 64);
        blob.extend_from_slice(&self.key_hash);
        blob.extend_from_slice(&sig.to_bytes());
        Ok(format!(
            "{text}\n{SIG_PREFIX}{name} {sig}\n",
            name = self.name,
            sig = b64().encode(blob)
        ))
    }

    /// The verifier key string for this signer's public key.
    pub fn verifier_key(&self) -> String {
        let mut alg_pub = vec![ALG_ED25519];
        alg_pub.extend_from_slice(self.key.verifying_key().as_bytes());
        format!(
            "{}+{}+{}",
            self.name,
            hex::encode(self.key_hash),
            b64().encode(alg_pub)
        )
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signer({}, [redacted])", self.name)
    }
}

/// Verifies note signatures for one bound key.
#[derive(Debug, Clone)]
pub struct Verifier {
    name: String,
    key: VerifyingKey,
    key_hash: [u8; 4],
}

impl Verifier {
    /// Parse a verifier from its `name+hash+key` key string.
    pub fn new(vkey: &str) -> Result<Self> {
        let (name, hash, key_bytes) = parse_key_string(vkey)?;
        let (alg, public) = key_bytes
            .split_first()
            .ok_or_else(|| Error::malformed("empty verifier key material"))?;
        if *alg != ALG_ED25519 {
            return Err(Error::malformed(format!("unknown verifier algorithm {alg}")));
        }
        let public: [u8; 32] = public
            .try_into()
            .map_err(|_| Error::malformed("verifier public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&public).map_err(|_| Error::Signature)?;

        if key_hash(&name, &key_bytes) != hash {
            return Err(Error::malformed("verifier key hash mismatch"));
        }

        Ok(Self {
            name,
            key,
            key_hash: hash,
        })
    }

    /// The key name this verifier is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verify a note and return its body text.
    ///
    /// At least one signature line must match this verifier's name and key
    /// hash and carry a valid signature over the body. Signature lines for
    /// other keys are ignored.
    pub fn open(&self, raw: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| Error::malformed("note is not valid UTF-8"))?;
        if !text.ends_with('\n') {
            return Err(Error::malformed("note must end with a newline"));
        }
        let split = text
            .rfind("\n\n")
            .ok_or_else(|| Error::malformed("note has no signature section"))?;
        let body = &text[..split + 1];
        let sigs = &text[split + 2..];

        let mut verified = false;
        for line in sigs.lines() {
            let rest = match line.strip_prefix(SIG_PREFIX) {
                Some(rest) => rest,
                None => return Err(Error::malformed("invalid signature line")),
            };
            let (name, sig_b64) = rest
                .split_once(' ')
                .ok_or_else(|| Error::malformed("invalid signature line"))?;
            if name != self.name {
                continue;
            }
            let blob = b64()
                .decode(sig_b64)
                .map_err(|e| Error::malformed(format!("invalid signature encoding: {e}")))?;
            if blob.len() != 4 + 64 {
                return Err(Error::malformed("signature blob has wrong length"));
            }
            if blob[..4] != self.key_hash {
                continue;
            }
            let sig_bytes: [u8; 64] = blob[4..]
                .try_into()
                .map_err(|_| Error::malformed("signature must be 64 bytes"))?;
            let sig = Signature::from_bytes(&sig_bytes);
            self.key
                .verify(body.as_bytes(), &sig)
                .map_err(|_| Error::Signature)?;
            verified = true;
        }

        if !verified {
            return Err(Error::Signature);
        }
        Ok(body.to_string())
    }
}

/// Generate a fresh Ed25519 key pair for the given key name.
///
/// Returns the `(signer, verifier)` key strings.
pub fn generate_key(name: &str) -> (String, String) {
    let key = SigningKey::generate(&mut rand::rngs::OsRng);

    let mut alg_pub = vec![ALG_ED25519];
    alg_pub.extend_from_slice(key.verifying_key().as_bytes());
    let hash = hex::encode(key_hash(name, &alg_pub));

    let mut alg_seed = vec![ALG_ED25519];
    alg_seed.extend_from_slice(&key.to_bytes());

    let skey = format!("{SIGNER_PREFIX}{name}+{hash}+{}", b64().encode(alg_seed));
    let vkey = format!("{name}+{hash}+{}", b64().encode(alg_pub));
    (skey, vkey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_parse() {
        let (skey, vkey) = generate_key("example.com/log");
        let signer = Signer::new(&skey).unwrap();
        let verifier = Verifier::new(&vkey).unwrap();
        assert_eq!(signer.name(), "example.com/log");
        assert_eq!(verifier.name(), "example.com/log");
        assert_eq!(signer.verifier_key(), vkey);
    }

    #[test]
    fn test_sign_open_roundtrip() {
        let (skey, vkey) = generate_key("astra");
        let signer = Signer::new(&skey).unwrap();
        let verifier = Verifier::new(&vkey).unwrap();

        let body = "Test Log\n42\nc29tZSByb290IGhhc2ggYnl0ZXMgZm9yIHRlc3Q=\n";
        let note = signer.sign_note(body).unwrap();
        assert!(note.starts_with(body));
        assert!(note.contains("\u{2014} astra "));

        assert_eq!(verifier.open(note.as_bytes()).unwrap(), body);
    }

    #[test]
    fn test_open_rejects_tampered_body() {
        let (skey, vkey) = generate_key("astra");
        let signer = Signer::new(&skey).unwrap();
        let verifier = Verifier::new(&vkey).unwrap();

        let note = signer.sign_note("original body\n").unwrap();
        let tampered = note.replace("original", "attacker");
        assert!(matches!(
            verifier.open(tampered.as_bytes()),
            Err(Error::Signature)
        ));
    }

    #[test]
    fn test_open_rejects_wrong_key() {
        let (skey, _) = generate_key("astra");
        let (_, other_vkey) = generate_key("astra");
        let signer = Signer::new(&skey).unwrap();
        let other = Verifier::new(&other_vkey).unwrap();

        let note = signer.sign_note("body\n").unwrap();
        // Same name, different key: the key hash will not match.
        assert!(matches!(
            other.open(note.as_bytes()),
            Err(Error::Signature)
        ));
    }

    #[test]
    fn test_open_ignores_foreign_signatures() {
        let (skey_a, vkey_a) = generate_key("alpha");
        let (skey_b, _) = generate_key("beta");
        let signer_a = Signer::new(&skey_a).unwrap();
        let signer_b = Signer::new(&skey_b).unwrap();
        let verifier = Verifier::new(&vkey_a).unwrap();

        let body = "multi-signed body\n";
        let note_a = signer_a.sign_note(body).unwrap();
        let note_b = signer_b.sign_note(body).unwrap();
        // Concatenate both signature lines onto one note.
        let sig_b = note_b.strip_prefix(&format!("{body}\n")).unwrap();
        let combined = format!("{note_a}{sig_b}");

        assert_eq!(verifier.open(combined.as_bytes()).unwrap(), body);
    }

    #[test]
    fn test_signer_rejects_bad_strings() {
        assert!(Signer::new("not a key").is_err());
        assert!(Signer::new("PRIVATE+KEY+name+zzzz+AAAA").is_err());

        // Renaming the key invalidates the embedded key hash.
        let (skey, _) = generate_key("astra");
        assert!(Signer::new(&skey.replace("astra", "other")).is_err());
    }

    #[test]
    fn test_sign_requires_trailing_newline() {
        let (skey, _) = generate_key("astra");
        let signer = Signer::new(&skey).unwrap();
        assert!(signer.sign_note("no newline").is_err());
        assert!(signer.sign_note("").is_err());
    }
}
