//! Cryptographic primitives for the Redsys protocol: per-order key
//! derivation, HMAC-SHA256 and constant-time comparison.

use base64::prelude::*;
use hmac::{Hmac, Mac};
use openssl::symm::{Cipher, Crypter, Mode};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

const DES_BLOCK: usize = 8;
const TDES_KEY_LEN: usize = 24;

/// Decode the base64 merchant secret, rejecting anything that is not valid
/// triple-DES keying material.
pub fn decode_secret(secret_b64: &str) -> Result<Vec<u8>, GatewayError> {
    let key = BASE64_STANDARD
        .decode(secret_b64)
        .map_err(|_| GatewayError::InvalidSecret)?;
    if key.len() != TDES_KEY_LEN {
        return Err(GatewayError::InvalidSecret);
    }
    Ok(key)
}

/// Derive the per-order key: 3DES-EDE3-CBC over the order id's UTF-8 bytes
/// with an all-zero IV.
///
/// The gateway's reference implementation zero-pads the plaintext to the
/// block size instead of using PKCS#7, with the cipher's own padding
/// disabled; an empty order id still encrypts one full zero block. The
/// ciphertext is returned whole (`ceil(len/8)*8` bytes) and fed to HMAC
/// as-is. Deterministic: identical inputs always yield identical output.
pub fn derive_key(order_id: &str, secret_b64: &str) -> Result<Vec<u8>, GatewayError> {
    let key = decode_secret(secret_b64)?;

    let data = order_id.as_bytes();
    let padded_len = if data.is_empty() {
        DES_BLOCK
    } else {
        data.len().div_ceil(DES_BLOCK) * DES_BLOCK
    };
    let mut padded = vec![0u8; padded_len];
    padded[..data.len()].copy_from_slice(data);

    let cipher = Cipher::des_ede3_cbc();
    let iv = [0u8; DES_BLOCK];
    let mut crypter = Crypter::new(cipher, Mode::Encrypt, &key, Some(&iv))
        .map_err(|_| GatewayError::InvalidSecret)?;
    crypter.pad(false);

    let mut out = vec![0u8; padded_len + cipher.block_size()];
    let mut written = crypter
        .update(&padded, &mut out)
        .map_err(|_| GatewayError::InvalidSecret)?;
    written += crypter
        .finalize(&mut out[written..])
        .map_err(|_| GatewayError::InvalidSecret)?;
    out.truncate(written);
    Ok(out)
}

/// HMAC-SHA256 raw output bytes. The derived key varies in length with the
/// order id; HMAC accepts any key length.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

/// Compare two byte slices in constant time.
///
/// A length mismatch returns early; the compare itself leaks no position
/// information. Callers normalize both signatures to one base64 alphabet
/// first so equal signatures always reach the constant-time path.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::GatewayError;

    const SECRET: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";

    #[test]
    fn decode_secret_accepts_triple_des_key() {
        let key = decode_secret(SECRET).unwrap();
        assert_eq!(key.len(), 24);
    }

    #[test]
    fn decode_secret_rejects_bad_base64() {
        assert!(matches!(
            decode_secret("not-base64!!"),
            Err(GatewayError::InvalidSecret)
        ));
    }

    #[test]
    fn decode_secret_rejects_wrong_length() {
        // 16 bytes of key material is not a valid EDE3 key
        let short = base64::prelude::BASE64_STANDARD.encode([0u8; 16]);
        assert!(matches!(
            decode_secret(&short),
            Err(GatewayError::InvalidSecret)
        ));
    }

    #[test]
    fn derive_key_is_deterministic() {
        let a = derive_key("240101123456", SECRET).unwrap();
        let b = derive_key("240101123456", SECRET).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_key_depends_on_order() {
        let a = derive_key("240101123456", SECRET).unwrap();
        let b = derive_key("240101123457", SECRET).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn derive_key_length_tracks_padded_order() {
        // 12 chars pad to 16; 8 and 4 chars both land on one block
        assert_eq!(derive_key("240101123456", SECRET).unwrap().len(), 16);
        assert_eq!(derive_key("12345678", SECRET).unwrap().len(), 8);
        assert_eq!(derive_key("1234", SECRET).unwrap().len(), 8);
    }

    #[test]
    fn derive_key_empty_order_encrypts_full_block() {
        assert_eq!(derive_key("", SECRET).unwrap().len(), 8);
    }

    #[test]
    fn hmac_output_is_32_bytes() {
        let key = derive_key("1234", SECRET).unwrap();
        assert_eq!(hmac_sha256(&key, b"payload").len(), 32);
    }

    #[test]
    fn constant_time_compare_basics() {
        assert!(constant_time_compare(b"abc", b"abc"));
        assert!(!constant_time_compare(b"abc", b"abd"));
        assert!(!constant_time_compare(b"abc", b"ab"));
        assert!(constant_time_compare(b"", b""));
    }
}
