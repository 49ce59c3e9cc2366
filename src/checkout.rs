//! Outbound operation creation: build and sign the parameter set, answer
//! with the HTML form that auto-submits the envelope to the gateway.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::response::Html;

use crate::model::SignedEnvelope;
use crate::params::{
    self, MerchantData, MerchantParams, CURRENCY_EUR, TRANSACTION_AUTHORIZATION,
};
use crate::AppState;

pub async fn create_operation(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Html<String>, (http::StatusCode, String)> {
    let config = &state.config;

    // The notification URL must point back at this deployment, which may
    // sit behind a proxy.
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let base = format!("{}://{}", proto, host);

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

    // Customer context from the storefront form, if it sent any. Carried
    // opaquely through the gateway and reported back on notification.
    let mut name = String::new();
    let mut email = String::new();
    let mut raw_order = String::new();
    for (key, value) in url::form_urlencoded::parse(&bytes) {
        match key.as_ref() {
            "name" | "data-name" if name.is_empty() => name = value.into_owned(),
            "email" | "data-email" if email.is_empty() => email = value.into_owned(),
            "order" | "data-order" if raw_order.is_empty() => raw_order = value.into_owned(),
            _ => {}
        }
    }

    // The gateway only accepts 4-12 digit orders; anything the storefront
    // sends is clamped into shape, and absence means we mint one.
    let order = if raw_order.is_empty() {
        params::generate_order_id()
    } else {
        params::normalize_order_id(&raw_order)
    };
    let merchant_data = MerchantData {
        name,
        email: email.clone(),
    };

    let merchant_params = MerchantParams {
        amount: config.price_cents.clone(),
        order: order.clone(),
        merchant_code: config.merchant_code.clone(),
        currency: CURRENCY_EUR.into(),
        transaction_type: TRANSACTION_AUTHORIZATION.into(),
        terminal: config.terminal.clone(),
        merchant_url: format!("{}/api/notification", base),
        url_ok: format!("{}/checkout/thanks", config.frontend_base),
        url_ko: format!("{}/checkout/error", config.frontend_base),
        merchant_data: params::encode_merchant_data(&merchant_data),
    };

    let envelope = SignedEnvelope::seal(&merchant_params, &order, &config.secret_b64)
        .map_err(|e| {
            info!("Error sealing envelope: {}", e);
            (
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "Error sealing envelope".to_string(),
            )
        })?;

    info!(
        "Created operation {} for {} cents (customer email: {:?})",
        order, config.price_cents, email
    );

    Ok(Html(payment_form(config.gateway_url(), &envelope)))
}

/// Auto-submitting POST form. Envelope values are base64 text and need no
/// HTML escaping.
fn payment_form(gateway_url: &str, envelope: &SignedEnvelope) -> String {
    format!(
        r#"<!doctype html>
<html><body onload="document.forms[0].submit()">
  <form action="{}" method="POST">
    <input type="hidden" name="Ds_SignatureVersion" value="{}" />
    <input type="hidden" name="Ds_MerchantParameters" value="{}" />
    <input type="hidden" name="Ds_Signature" value="{}" />
    <noscript><button>Pay</button></noscript>
  </form>
</body></html>"#,
        gateway_url,
        envelope.signature_version,
        envelope.merchant_parameters,
        envelope.signature,
    )
}
