//! Signing and verification of gateway envelopes.
//!
//! The HMAC covers the base64 *text* of the parameter JSON, never the
//! decoded bytes, keyed by the per-order key from [`crate::crypto`]. The
//! gateway delivers signatures in either standard base64 or base64url;
//! both sides are normalized to the standard alphabet before the
//! constant-time compare.

use base64::prelude::*;

use crate::crypto::{constant_time_compare, derive_key, hmac_sha256};
use crate::error::GatewayError;
use crate::params::{self, ParameterMap};

pub const SIGNATURE_VERSION: &str = "HMAC_SHA256_V1";

/// Outcome of a successful verification. Response code stays optional at
/// this layer: outbound request payloads carry none, and the notification
/// handler is the one that insists on it before checking authorization.
#[derive(Debug)]
pub struct VerificationOutcome {
    pub order: String,
    pub response_code: Option<String>,
    pub fields: ParameterMap,
}

impl VerificationOutcome {
    pub fn authorized(&self) -> bool {
        self.response_code.as_deref().is_some_and(is_approved)
    }
}

/// Gateway approval policy: numeric response codes 0-99 inclusive, plus
/// the literal `"0000"` some message variants emit.
pub fn is_approved(code: &str) -> bool {
    if code == "0000" {
        return true;
    }
    matches!(code.parse::<i64>(), Ok(n) if (0..=99).contains(&n))
}

/// Convert a possibly base64url string to the standard alphabet, restoring
/// `=` padding to a multiple of four characters.
pub fn b64url_to_b64(s: &str) -> String {
    let mut t = s.replace('-', "+").replace('_', "/");
    let rem = t.len() % 4;
    if rem != 0 {
        t.push_str(&"=".repeat(4 - rem));
    }
    t
}

/// Sign the base64 parameter text with the key derived for `order_id`.
/// Standard-base64 output; byte-identical across independent runs.
pub fn sign(params_b64: &str, order_id: &str, secret_b64: &str) -> Result<String, GatewayError> {
    let key = derive_key(order_id, secret_b64)?;
    Ok(BASE64_STANDARD.encode(hmac_sha256(&key, params_b64.as_bytes())))
}

/// Verify a received envelope.
///
/// The parameter text is decoded (tolerating the url-safe alphabet) only
/// to extract the order id and fields; the signature is recomputed over
/// the text exactly as delivered. Any mismatch yields
/// [`GatewayError::SignatureMismatch`] with no partial trust in the
/// payload.
pub fn verify(
    params_b64: &str,
    signature: &str,
    secret_b64: &str,
) -> Result<VerificationOutcome, GatewayError> {
    let decoded = BASE64_STANDARD
        .decode(b64url_to_b64(params_b64))
        .map_err(|_| GatewayError::MalformedPayload)?;
    let fields: ParameterMap =
        serde_json::from_slice(&decoded).map_err(|_| GatewayError::MalformedPayload)?;

    let order = params::field_string(&fields, params::ORDER_ALIASES)
        .ok_or(GatewayError::MissingField("Ds_Order"))?;

    let expected = sign(params_b64, &order, secret_b64)?;
    let received = canonicalize_signature(signature);

    if !constant_time_compare(expected.as_bytes(), received.as_bytes()) {
        return Err(GatewayError::SignatureMismatch { order });
    }

    let response_code = params::field_string(&fields, params::RESPONSE_ALIASES);
    Ok(VerificationOutcome {
        order,
        response_code,
        fields,
    })
}

/// Normalize a received signature to canonical standard base64 by decoding
/// and re-encoding. A signature that does not decode keeps its padded text;
/// the compare still runs over whatever was received, and a mismatch there
/// is decided by the length check rather than content (a known, documented
/// weakening that only malformed buffers can reach).
fn canonicalize_signature(raw: &str) -> String {
    let padded = b64url_to_b64(raw);
    match BASE64_STANDARD.decode(&padded) {
        Ok(bytes) => BASE64_STANDARD.encode(bytes),
        Err(_) => padded,
    }
}
