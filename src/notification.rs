//! Inbound notification webhook: the gateway POSTs the signed envelope as
//! `application/x-www-form-urlencoded`; we verify the signature, judge
//! authorization and append one row to the record sink.
//!
//! The body is read raw rather than through a framework form extractor:
//! verification must see `Ds_MerchantParameters` exactly as delivered, and
//! any re-encoding on the way in could alter it.

use std::sync::Arc;

use axum::extract::{Request, State};

use crate::error::GatewayError;
use crate::model::{self, PaymentRecord};
use crate::params;
use crate::signature;
use crate::AppState;

pub async fn notification(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(http::StatusCode, &'static str), (http::StatusCode, String)> {
    let (_, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            info!("Error parsing request body: {:?}", e);
            return Err((
                http::StatusCode::BAD_REQUEST,
                format!("Error parsing request body: {:?}", e),
            ));
        }
    };

    let mut params_b64 = String::new();
    let mut received_signature = String::new();
    for (key, value) in url::form_urlencoded::parse(&bytes) {
        match key.as_ref() {
            "Ds_MerchantParameters" => params_b64 = value.into_owned(),
            "Ds_Signature" => received_signature = value.into_owned(),
            _ => {}
        }
    }
    if params_b64.is_empty() {
        return Err((
            http::StatusCode::BAD_REQUEST,
            GatewayError::MissingField("Ds_MerchantParameters").to_string(),
        ));
    }

    let outcome = signature::verify(&params_b64, &received_signature, &state.config.secret_b64)
        .map_err(|e| match e {
            GatewayError::SignatureMismatch { ref order } => {
                error!("Invalid signature on gateway notification for order {}", order);
                (http::StatusCode::BAD_REQUEST, "bad signature".to_string())
            }
            other => {
                info!("Rejected notification: {}", other);
                (http::StatusCode::BAD_REQUEST, other.to_string())
            }
        })?;

    let response_code = model::outcome_response_code(&outcome).map_err(|e| {
        info!("Rejected notification: {}", e);
        (http::StatusCode::BAD_REQUEST, e.to_string())
    })?;
    let authorized = outcome.authorized();

    let fields = &outcome.fields;
    let merchant_data = params::decode_merchant_data(
        params::field_string(fields, params::MERCHANT_DATA_ALIASES).as_deref(),
    );

    // Date and hour arrive URL-encoded inside the JSON.
    let date = params::percent_decode_field(
        &params::field_string(fields, params::DATE_ALIASES).unwrap_or_default(),
    );
    let hour = params::percent_decode_field(
        &params::field_string(fields, params::HOUR_ALIASES).unwrap_or_default(),
    );
    let date = if hour.is_empty() {
        date
    } else {
        format!("{} {}", date, hour)
    };

    let amount = params::field_string(fields, params::AMOUNT_ALIASES)
        .map(|cents| params::amount_to_decimal(&cents))
        .unwrap_or_default();

    let record = PaymentRecord {
        date,
        order: outcome.order.clone(),
        amount,
        response_code: response_code.clone(),
        authorized,
        card_brand: params::field_string(fields, params::CARD_BRAND_ALIASES).unwrap_or_default(),
        card_country: params::field_string(fields, params::CARD_COUNTRY_ALIASES)
            .unwrap_or_default(),
        payment_method: params::field_string(fields, params::MERCHANT_CODE_ALIASES)
            .unwrap_or_default(),
        merchant_data: params::field_string(fields, params::MERCHANT_DATA_ALIASES)
            .unwrap_or_default(),
        customer_name: merchant_data.name,
        customer_email: merchant_data.email,
    };

    if state.sink.append(record.into_row()).await.is_err() {
        // Non-2xx makes the gateway redeliver the notification.
        return Err((
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "record sink failure".to_string(),
        ));
    }

    info!(
        "Processed notification for order {} (code {}, authorized: {})",
        outcome.order, response_code, authorized
    );

    Ok((http::StatusCode::OK, "OK"))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::State;
    use base64::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::sink::RecordSink;

    const SECRET: &str = "sq7HjrUOBfKmC576ILgskD5srU870gJ7";

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Config {
                secret_b64: SECRET.into(),
                merchant_code: "999008881".into(),
                terminal: "001".into(),
                live: false,
                frontend_base: "https://shop.example".into(),
                price_cents: "100".into(),
                sink_url: None,
                sink_token: None,
            },
            sink: RecordSink::Log,
        })
    }

    fn notification_body(params_b64: &str, signature: &str) -> Body {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("Ds_SignatureVersion", signature::SIGNATURE_VERSION)
            .append_pair("Ds_MerchantParameters", params_b64)
            .append_pair("Ds_Signature", signature)
            .finish();
        Body::from(encoded)
    }

    fn signed_notification(code: &str) -> (String, String) {
        let payload = json!({
            "Ds_Date": "01%2F01%2F2024",
            "Ds_Hour": "12%3A34",
            "Ds_Amount": "100",
            "Ds_Order": "240101123456",
            "Ds_MerchantCode": "999008881",
            "Ds_Response": code,
            "Ds_Card_Brand": "1",
            "Ds_Card_Country": "724",
            "Ds_MerchantData": "{\"name\":\"Ada\",\"email\":\"ada@example.com\"}",
        });
        let params_b64 = BASE64_STANDARD.encode(payload.to_string());
        let signature = signature::sign(&params_b64, "240101123456", SECRET).unwrap();
        (params_b64, signature)
    }

    fn request_with(body: Body) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/notification")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn authorized_notification_is_accepted() {
        let (params_b64, signature) = signed_notification("0000");
        let result = notification(
            State(test_state()),
            request_with(notification_body(&params_b64, &signature)),
        )
        .await;
        assert_eq!(result.unwrap(), (http::StatusCode::OK, "OK"));
    }

    #[tokio::test]
    async fn url_safe_signature_is_accepted() {
        let (params_b64, signature) = signed_notification("33");
        let url_safe = signature
            .replace('+', "-")
            .replace('/', "_")
            .trim_end_matches('=')
            .to_string();
        let result = notification(
            State(test_state()),
            request_with(notification_body(&params_b64, &url_safe)),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (params_b64, _) = signed_notification("0000");
        let wrong = signature::sign(&params_b64, "999999999999", SECRET).unwrap();
        let result = notification(
            State(test_state()),
            request_with(notification_body(&params_b64, &wrong)),
        )
        .await;
        let (status, body) = result.unwrap_err();
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body, "bad signature");
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected() {
        let result = notification(
            State(test_state()),
            request_with(notification_body("not-base64!!", "whatever")),
        )
        .await;
        let (status, _) = result.unwrap_err();
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let result = notification(State(test_state()), request_with(Body::from(""))).await;
        let (status, _) = result.unwrap_err();
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_response_code_is_rejected() {
        let payload = json!({ "Ds_Order": "240101123456" });
        let params_b64 = BASE64_STANDARD.encode(payload.to_string());
        let signature = signature::sign(&params_b64, "240101123456", SECRET).unwrap();
        let result = notification(
            State(test_state()),
            request_with(notification_body(&params_b64, &signature)),
        )
        .await;
        let (status, body) = result.unwrap_err();
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert!(body.contains("Ds_Response"));
    }
}
