//! The buyer's path from picked numbers to payment instructions.
//!
//! `Selecting -> CollectingContact -> ChoosingPayment -> Submitted | Failed`.
//! Submitting reserves the numbers first and only then asks the chosen rail
//! for instructions. A failed submission keeps the selection so the buyer can
//! retry; a hold that already succeeded is reused rather than re-reserved.

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use rifa_types::api::{InitiatePaymentRequest, ReserveNumbersRequest};
use rifa_types::models::{PaymentMethod, Raffle};
use rifa_types::payment::PaymentInstructions;

use crate::api::{ClientError, RaffleApi};
use crate::selection::NumberSelection;

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutStep {
    Selecting,
    CollectingContact,
    ChoosingPayment,
    Submitted(PaymentInstructions),
    Failed(String),
}

impl CheckoutStep {
    fn name(&self) -> &'static str {
        match self {
            Self::Selecting => "selecting",
            Self::CollectingContact => "contact",
            Self::ChoosingPayment => "payment",
            Self::Submitted(_) => "submitted",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("select at least one number")]
    EmptySelection,

    #[error("name and email are required")]
    MissingContact,

    #[error("choose a payment method")]
    NoMethod,

    #[error("cannot {action} during the {step} step")]
    WrongStep {
        action: &'static str,
        step: &'static str,
    },

    #[error("reservation failed: {0}")]
    Reservation(ClientError),

    #[error("payment failed: {0}")]
    Payment(ClientError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl ContactInfo {
    fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && self.email.contains('@')
    }
}

/// Totals shown next to the pay button.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub numbers: Vec<u32>,
    pub amount: f64,
    pub currency: String,
    pub formatted: String,
}

// A hold the server already granted for this exact selection.
#[derive(Debug, Clone)]
struct Hold {
    numbers: Vec<u32>,
    email: String,
    until: DateTime<Utc>,
}

pub struct Checkout {
    raffle: Raffle,
    selection: NumberSelection,
    step: CheckoutStep,
    contact: ContactInfo,
    method: Option<PaymentMethod>,
    card_currency: String,
    hold: Option<Hold>,
}

impl Checkout {
    pub fn new(raffle: Raffle, card_currency: impl Into<String>) -> Self {
        Self {
            selection: NumberSelection::new(raffle.total_numbers),
            raffle,
            step: CheckoutStep::Selecting,
            contact: ContactInfo::default(),
            method: None,
            card_currency: card_currency.into(),
            hold: None,
        }
    }

    pub fn raffle(&self) -> &Raffle {
        &self.raffle
    }

    pub fn step(&self) -> &CheckoutStep {
        &self.step
    }

    pub fn selection(&self) -> &NumberSelection {
        &self.selection
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    /// Pull the current sold and held numbers from the server.
    pub async fn refresh_board<A: RaffleApi + ?Sized>(&mut self, api: &A) -> Result<(), ClientError> {
        let board = api.fetch_numbers(self.raffle.id).await?;
        self.selection.refresh(&board);
        Ok(())
    }

    pub fn toggle(&mut self, number: u32) -> bool {
        self.step == CheckoutStep::Selecting && self.selection.toggle(number)
    }

    pub fn quick_pick<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) -> Vec<u32> {
        if self.step != CheckoutStep::Selecting {
            return Vec::new();
        }
        self.selection.quick_pick(count, rng)
    }

    /// Drop the selection and start over.
    pub fn clear(&mut self) {
        self.selection.clear();
        self.reset_progress();
    }

    pub fn proceed_to_contact(&mut self) -> Result<(), CheckoutError> {
        self.expect_step(&[CheckoutStep::Selecting], "enter contact details")?;
        if self.selection.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }
        self.step = CheckoutStep::CollectingContact;
        Ok(())
    }

    pub fn set_contact(&mut self, contact: ContactInfo) {
        self.contact = ContactInfo {
            name: contact.name.trim().to_string(),
            email: contact.email.trim().to_string(),
            phone: contact
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        };
    }

    pub fn proceed_to_payment(&mut self) -> Result<(), CheckoutError> {
        self.expect_step(&[CheckoutStep::CollectingContact], "choose a payment method")?;
        if !self.contact.is_complete() {
            return Err(CheckoutError::MissingContact);
        }
        self.step = CheckoutStep::ChoosingPayment;
        Ok(())
    }

    pub fn choose_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if !matches!(self.step, CheckoutStep::ChoosingPayment | CheckoutStep::Failed(_)) {
            return Err(self.wrong_step("choose a payment method"));
        }
        self.method = Some(method);
        Ok(())
    }

    /// Step back one screen. Submitted checkouts stay where they are.
    pub fn back(&mut self) {
        self.step = match &self.step {
            CheckoutStep::Selecting | CheckoutStep::CollectingContact => CheckoutStep::Selecting,
            CheckoutStep::ChoosingPayment => CheckoutStep::CollectingContact,
            CheckoutStep::Failed(_) => CheckoutStep::ChoosingPayment,
            CheckoutStep::Submitted(_) => return,
        };
    }

    /// Amount and currency for the current selection and method.
    pub fn summary(&self) -> OrderSummary {
        let amount = self.selection.total_amount(self.raffle.price_per_number);
        let currency = self.currency();
        OrderSummary {
            numbers: self.selection.selected(),
            amount,
            formatted: rifa_i18n::format_amount(amount, &currency),
            currency,
        }
    }

    /// Reserve the selection, then initiate payment with the chosen rail.
    pub async fn submit<A: RaffleApi + ?Sized>(
        &mut self,
        api: &A,
    ) -> Result<PaymentInstructions, CheckoutError> {
        if !matches!(self.step, CheckoutStep::ChoosingPayment | CheckoutStep::Failed(_)) {
            return Err(self.wrong_step("submit"));
        }
        let method = self.method.ok_or(CheckoutError::NoMethod)?;
        let numbers = self.selection.selected();
        if numbers.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        if !self.hold_covers(&numbers) {
            let req = ReserveNumbersRequest {
                numbers: numbers.clone(),
                user_email: self.contact.email.clone(),
                user_name: self.contact.name.clone(),
                user_whatsapp: self.contact.phone.clone(),
            };
            match api.reserve(self.raffle.id, &req).await {
                Ok(resp) => {
                    self.hold = Some(Hold {
                        numbers: numbers.clone(),
                        email: self.contact.email.clone(),
                        until: resp.reserved_until,
                    });
                }
                Err(e) => {
                    warn!("Reservation of {:?} failed: {}", numbers, e);
                    self.step = CheckoutStep::Failed(e.user_message());
                    return Err(CheckoutError::Reservation(e));
                }
            }
        }

        let req = InitiatePaymentRequest {
            raffle_id: self.raffle.id,
            numbers: numbers.clone(),
            amount: self.selection.total_amount(self.raffle.price_per_number),
            currency: Some(self.currency()),
            user_email: self.contact.email.clone(),
            user_name: self.contact.name.clone(),
            user_whatsapp: self.contact.phone.clone(),
        };
        match api.initiate_payment(method, &req).await {
            Ok(instructions) => {
                info!(
                    "Payment {} started via {} for {:?}",
                    instructions.payment_id(),
                    method,
                    numbers
                );
                self.step = CheckoutStep::Submitted(instructions.clone());
                Ok(instructions)
            }
            Err(e) => {
                warn!("Payment via {} failed: {}", method, e);
                self.step = CheckoutStep::Failed(e.user_message());
                Err(CheckoutError::Payment(e))
            }
        }
    }

    /// One second of the selection countdown. On expiry the selection is
    /// gone and the checkout is back at `Selecting`, whatever step it was in.
    pub fn tick(&mut self) -> bool {
        let expired = self.selection.tick();
        if expired {
            self.reset_progress();
        }
        expired
    }

    fn reset_progress(&mut self) {
        self.step = CheckoutStep::Selecting;
        self.method = None;
        self.hold = None;
    }

    fn currency(&self) -> String {
        match self.method.and_then(|m| m.fixed_currency()) {
            Some(code) => code.to_string(),
            None => self.card_currency.clone(),
        }
    }

    fn hold_covers(&self, numbers: &[u32]) -> bool {
        self.hold.as_ref().is_some_and(|h| {
            h.numbers == numbers
                && h.email.eq_ignore_ascii_case(&self.contact.email)
                && h.until > Utc::now()
        })
    }

    fn expect_step(&self, allowed: &[CheckoutStep], action: &'static str) -> Result<(), CheckoutError> {
        if allowed.contains(&self.step) {
            Ok(())
        } else {
            Err(self.wrong_step(action))
        }
    }

    fn wrong_step(&self, action: &'static str) -> CheckoutError {
        CheckoutError::WrongStep {
            action,
            step: self.step.name(),
        }
    }
}
