pub mod api;
pub mod models;
pub mod payment;

/// How long a reservation hold lasts, both on the server and on the buyer's countdown.
pub const RESERVATION_HOLD_SECS: i64 = 15 * 60;

/// Lifetime of an instant-transfer payment code.
pub const INSTANT_TRANSFER_EXPIRY_SECS: i64 = 30 * 60;

/// Rounds a money amount to cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
