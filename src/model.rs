use base64::prelude::*;
use serde::Serialize;

use crate::error::GatewayError;
use crate::params::MerchantParams;
use crate::signature::{self, VerificationOutcome};

/// The signed triple delivered to the gateway. Field names are the form
/// field names of the auto-submit POST.
#[derive(Debug, Serialize)]
pub struct SignedEnvelope {
    #[serde(rename = "Ds_SignatureVersion")]
    pub signature_version: String,
    #[serde(rename = "Ds_MerchantParameters")]
    pub merchant_parameters: String,
    #[serde(rename = "Ds_Signature")]
    pub signature: String,
}

impl SignedEnvelope {
    /// Serialize the parameters once, base64 the JSON text and sign it.
    /// The base64 text in the envelope is the exact text that was signed;
    /// callers must not re-encode it.
    pub fn seal(
        params: &MerchantParams,
        order: &str,
        secret_b64: &str,
    ) -> Result<Self, GatewayError> {
        let json = serde_json::to_vec(params).map_err(|_| GatewayError::MalformedPayload)?;
        let merchant_parameters = BASE64_STANDARD.encode(json);
        let signature = signature::sign(&merchant_parameters, order, secret_b64)?;
        Ok(Self {
            signature_version: signature::SIGNATURE_VERSION.to_string(),
            merchant_parameters,
            signature,
        })
    }
}

/// One verified notification, flattened into the ordered row the record
/// sink expects.
#[derive(Debug)]
pub struct PaymentRecord {
    pub date: String,
    pub order: String,
    pub amount: String,
    pub response_code: String,
    pub authorized: bool,
    pub card_brand: String,
    pub card_country: String,
    pub payment_method: String,
    pub merchant_data: String,
    pub customer_name: String,
    pub customer_email: String,
}

impl PaymentRecord {
    pub fn into_row(self) -> Vec<String> {
        vec![
            self.date,
            self.order,
            self.amount,
            self.response_code,
            if self.authorized { "yes" } else { "no" }.to_string(),
            self.card_brand,
            self.card_country,
            self.payment_method,
            self.merchant_data,
            self.customer_name,
            self.customer_email,
        ]
    }
}

/// Pull the response code out of a verified outcome, rejecting
/// notifications that omit it.
pub fn outcome_response_code(outcome: &VerificationOutcome) -> Result<String, GatewayError> {
    outcome
        .response_code
        .clone()
        .ok_or(GatewayError::MissingField("Ds_Response"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn envelope_fields_use_gateway_names() {
        let envelope = SignedEnvelope {
            signature_version: signature::SIGNATURE_VERSION.into(),
            merchant_parameters: "eyJ9".into(),
            signature: "c2ln".into(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["Ds_SignatureVersion"], "HMAC_SHA256_V1");
        assert_eq!(json["Ds_MerchantParameters"], "eyJ9");
        assert_eq!(json["Ds_Signature"], "c2ln");
    }

    #[test]
    fn record_row_order_matches_sheet_columns() {
        let record = PaymentRecord {
            date: "01/01/2024 12:34".into(),
            order: "240101123456".into(),
            amount: "1.00".into(),
            response_code: "0000".into(),
            authorized: true,
            card_brand: "1".into(),
            card_country: "724".into(),
            payment_method: "999008881".into(),
            merchant_data: "{}".into(),
            customer_name: "Ada".into(),
            customer_email: "ada@example.com".into(),
        };
        let row = record.into_row();
        assert_eq!(row.len(), 11);
        assert_eq!(row[1], "240101123456");
        assert_eq!(row[4], "yes");
    }
}
