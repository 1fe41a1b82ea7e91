use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use rifa_types::INSTANT_TRANSFER_EXPIRY_SECS;
use rifa_types::payment::InstantTransferPayment;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PixPayload<'a> {
    pix_key: &'a str,
    amount: String,
    description: String,
    txid: String,
}

/// Transaction id the payer's bank echoes back; the payment id without hyphens.
pub fn txid(payment_id: Uuid) -> String {
    payment_id.simple().to_string()
}

/// Copy-and-paste payment code: base64 of the JSON payload.
pub fn pix_code(pix_key: &str, amount: f64, raffle_id: Uuid, payment_id: Uuid) -> String {
    let payload = PixPayload {
        pix_key,
        amount: format!("{:.2}", amount),
        description: format!("Sorteio {}", raffle_id),
        txid: txid(payment_id),
    };
    // Serializing a struct of strings cannot fail.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    B64.encode(json)
}

pub fn instructions(
    pix_key: &str,
    amount: f64,
    raffle_id: Uuid,
    payment_id: Uuid,
    now: DateTime<Utc>,
) -> InstantTransferPayment {
    InstantTransferPayment {
        pix_code: pix_code(pix_key, amount, raffle_id, payment_id),
        pix_key: pix_key.to_string(),
        amount,
        payment_id,
        expires_at: now + Duration::seconds(INSTANT_TRANSFER_EXPIRY_SECS),
    }
}
