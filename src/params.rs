//! Parameter-set codec: the outbound merchant parameter family, inbound
//! field-alias resolution across the gateway's casing variants, order-id
//! normalization and the opaque merchant-data pass-through.

use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::percent_decode_str;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ISO 4217 numeric code for EUR, the only currency this merchant charges.
pub const CURRENCY_EUR: &str = "978";

/// Redsys transaction type for a standard authorization.
pub const TRANSACTION_AUTHORIZATION: &str = "0";

/// Decoded parameter set of a gateway message. JSON object keyed by the
/// gateway's field names, in whichever casing family it chose.
pub type ParameterMap = serde_json::Map<String, Value>;

/// Outbound request parameters, serialized in declaration order with the
/// all-caps field family. The JSON text this produces is base64-encoded
/// once and signed as opaque text; it is never re-serialized.
#[derive(Debug, Clone, Serialize)]
pub struct MerchantParams {
    #[serde(rename = "DS_MERCHANT_AMOUNT")]
    pub amount: String,
    #[serde(rename = "DS_MERCHANT_ORDER")]
    pub order: String,
    #[serde(rename = "DS_MERCHANT_MERCHANTCODE")]
    pub merchant_code: String,
    #[serde(rename = "DS_MERCHANT_CURRENCY")]
    pub currency: String,
    #[serde(rename = "DS_MERCHANT_TRANSACTIONTYPE")]
    pub transaction_type: String,
    #[serde(rename = "DS_MERCHANT_TERMINAL")]
    pub terminal: String,
    #[serde(rename = "DS_MERCHANT_MERCHANTURL")]
    pub merchant_url: String,
    #[serde(rename = "DS_MERCHANT_URLOK")]
    pub url_ok: String,
    #[serde(rename = "DS_MERCHANT_URLKO")]
    pub url_ko: String,
    #[serde(rename = "DS_MERCHANT_MERCHANTDATA")]
    pub merchant_data: String,
}

// The gateway is inconsistent about field casing across integrations, and
// the request family (`DS_MERCHANT_*`) differs from the notification
// family (`Ds_*`). Each logical field resolves through an ordered alias
// list; the first present wins.
pub const ORDER_ALIASES: &[&str] = &[
    "Ds_Order",
    "DS_ORDER",
    "DS_Order",
    "ds_order",
    "Ds_Merchant_Order",
    "DS_MERCHANT_ORDER",
];
pub const RESPONSE_ALIASES: &[&str] = &["Ds_Response", "DS_RESPONSE"];
pub const AMOUNT_ALIASES: &[&str] = &[
    "Ds_Amount",
    "DS_AMOUNT",
    "Ds_Merchant_Amount",
    "DS_MERCHANT_AMOUNT",
];
pub const DATE_ALIASES: &[&str] = &["Ds_Date", "DS_DATE"];
pub const HOUR_ALIASES: &[&str] = &["Ds_Hour", "DS_HOUR"];
// Some gateway variants omit the card brand and only report the
// secure-payment flag; the sheet column falls back to it.
pub const CARD_BRAND_ALIASES: &[&str] = &[
    "Ds_Card_Brand",
    "DS_CARD_BRAND",
    "Ds_SecurePayment",
    "DS_SECUREPAYMENT",
];
pub const CARD_COUNTRY_ALIASES: &[&str] = &["Ds_Card_Country", "DS_CARD_COUNTRY"];
pub const MERCHANT_CODE_ALIASES: &[&str] = &["Ds_MerchantCode", "DS_MERCHANTCODE"];
pub const MERCHANT_DATA_ALIASES: &[&str] = &[
    "Ds_MerchantData",
    "DS_MERCHANTDATA",
    "DS_MERCHANT_MERCHANTDATA",
];

/// Resolve a logical field through its alias list. String values are
/// returned as-is; numeric values (some variants send the amount as a JSON
/// number) are rendered as their decimal text. Null falls through to the
/// next alias.
pub fn field_string(fields: &ParameterMap, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|name| match fields.get(*name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Strip non-digits and clamp to the gateway's 4-12 digit order shape.
/// Inputs that leave fewer than 4 digits fall back to a timestamp-derived
/// id. Idempotent on its own output.
pub fn normalize_order_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return generate_order_id();
    }
    digits.chars().take(12).collect()
}

/// Synthesize a 12-digit order id: low-order 9 digits of the millisecond
/// timestamp plus a 3-digit random suffix. Collision window is roughly
/// 1/1000 per colliding millisecond, acceptable at this merchant's volume.
pub fn generate_order_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .to_string();
    let tail = &millis[millis.len().saturating_sub(9)..];
    let mut id = format!("{}{:03}", tail, rand::thread_rng().gen_range(0..1000u32));
    id.truncate(12);
    id
}

/// Caller-supplied context carried opaquely through the gateway in
/// `DS_MERCHANT_MERCHANTDATA` and returned unmodified in notifications.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MerchantData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

pub fn encode_merchant_data(data: &MerchantData) -> String {
    serde_json::to_string(data).unwrap_or_default()
}

/// Decode the merchant-data field, tolerating absence, percent-encoded
/// JSON and plain garbage. Anything unreadable degrades to the empty
/// value rather than failing the notification.
pub fn decode_merchant_data(raw: Option<&str>) -> MerchantData {
    let Some(raw) = raw else {
        return MerchantData::default();
    };
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string());
    serde_json::from_str(&decoded).unwrap_or_else(|_| {
        warn!("merchant data is not valid JSON, dropping it");
        MerchantData::default()
    })
}

/// Percent-decode a field the gateway URL-encodes inside the JSON
/// (date and hour); invalid sequences leave the text untouched.
pub fn percent_decode_field(raw: &str) -> String {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Render integer cents as decimal currency units with two places.
pub fn amount_to_decimal(cents: &str) -> String {
    match cents.parse::<i64>() {
        Ok(n) => format!("{}.{:02}", n / 100, (n % 100).abs()),
        Err(_) => String::new(),
    }
}
