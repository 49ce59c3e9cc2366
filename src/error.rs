use thiserror::Error;

/// Failure modes of the signing/verification core.
///
/// `InvalidSecret` is fatal misconfiguration and surfaces at startup; the
/// rest map to a 400-equivalent rejection of a single notification. Error
/// text never carries the secret or any derived key material.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Merchant secret is not valid base64 or does not decode to a
    /// triple-DES key.
    #[error("merchant secret is not valid base64 or not 24 bytes")]
    InvalidSecret,

    /// `Ds_MerchantParameters` is not valid base64 or not valid JSON.
    #[error("merchant parameters are not valid base64 JSON")]
    MalformedPayload,

    /// Recomputed signature does not match the one received.
    #[error("signature mismatch for order {order}")]
    SignatureMismatch { order: String },

    /// A required field is absent from the decoded parameter set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A required environment variable is absent at startup.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),
}
