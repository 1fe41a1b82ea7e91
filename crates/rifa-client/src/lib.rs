//! Buyer-side engine for the storefront: picking numbers, walking the
//! checkout, and keeping the signed-in session.

pub mod api;
pub mod checkout;
pub mod config;
pub mod selection;
pub mod session;

pub use api::{ClientError, HttpApi, RaffleApi};
pub use checkout::{Checkout, CheckoutError, CheckoutStep, ContactInfo, OrderSummary};
pub use config::ClientConfig;
pub use selection::{NumberSelection, NumberState};
pub use session::{AuthEvent, Session, SessionContext, SessionState, Subscription};
