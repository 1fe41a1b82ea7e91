use uuid::Uuid;

use rifa_types::payment::BankTransferPayment;

/// `<PREFIX>-<first 8 hex chars of the payment id>`, upper-cased.
pub fn reference(prefix: &str, payment_id: Uuid) -> String {
    let simple = payment_id.simple().to_string();
    format!("{}-{}", prefix, &simple[..8]).to_uppercase()
}

pub fn instructions(
    email: &str,
    phone: &str,
    prefix: &str,
    amount: f64,
    payment_id: Uuid,
) -> BankTransferPayment {
    let reference = reference(prefix, payment_id);
    BankTransferPayment {
        zelle_email: email.to_string(),
        zelle_phone: phone.to_string(),
        amount,
        payment_id,
        instructions: vec![
            "Open your banking app".to_string(),
            "Select Zelle".to_string(),
            format!("Send ${:.2} to {}", amount, email),
            format!("Use reference: {}", reference),
            "Screenshot the confirmation and send to us".to_string(),
        ],
        reference,
    }
}
