use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use rifa_types::api::{
    ErrorBody, InitiatePaymentRequest, NumberBoard, RaffleResponse, ReserveNumbersRequest,
    ReserveNumbersResponse,
};
use rifa_types::models::{PaymentMethod, Raffle};
use rifa_types::payment::PaymentInstructions;

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Message fit for showing to the buyer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            _ => "Could not reach the server, please try again".into(),
        }
    }
}

/// The storefront calls the buyer flow depends on.
#[async_trait]
pub trait RaffleApi: Send + Sync {
    async fn fetch_raffle(&self, raffle_id: Uuid) -> Result<Raffle, ClientError>;

    async fn fetch_numbers(&self, raffle_id: Uuid) -> Result<NumberBoard, ClientError>;

    async fn reserve(
        &self,
        raffle_id: Uuid,
        req: &ReserveNumbersRequest,
    ) -> Result<ReserveNumbersResponse, ClientError>;

    async fn initiate_payment(
        &self,
        method: PaymentMethod,
        req: &InitiatePaymentRequest,
    ) -> Result<PaymentInstructions, ClientError>;
}

/// [`RaffleApi`] over HTTP.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: String,
    locale: &'static str,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base: config.api_url.trim_end_matches('/').to_string(),
            locale: config.locale.code(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl RaffleApi for HttpApi {
    async fn fetch_raffle(&self, raffle_id: Uuid) -> Result<Raffle, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/raffles/{}", raffle_id)))
            .query(&[("locale", self.locale)])
            .send()
            .await?;
        let body: RaffleResponse = read_json(resp).await?;
        Ok(body.raffle)
    }

    async fn fetch_numbers(&self, raffle_id: Uuid) -> Result<NumberBoard, ClientError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/raffles/{}/numbers", raffle_id)))
            .send()
            .await?;
        read_json(resp).await
    }

    async fn reserve(
        &self,
        raffle_id: Uuid,
        req: &ReserveNumbersRequest,
    ) -> Result<ReserveNumbersResponse, ClientError> {
        debug!("Reserving {:?} on raffle {}", req.numbers, raffle_id);
        let resp = self
            .client
            .post(self.url(&format!("/api/raffles/{}/numbers", raffle_id)))
            .json(req)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn initiate_payment(
        &self,
        method: PaymentMethod,
        req: &InitiatePaymentRequest,
    ) -> Result<PaymentInstructions, ClientError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/payments/{}", method.as_str())))
            .json(req)
            .send()
            .await?;
        let body: serde_json::Value = read_json(resp).await?;
        Ok(PaymentInstructions::from_json(method, body)?)
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        return Err(http_error(status.as_u16(), &bytes));
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn http_error(status: u16, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
    ClientError::Http { status, message }
}
