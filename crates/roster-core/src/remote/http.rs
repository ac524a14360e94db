//! HTTP shadow client

use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, StatusCode};

use super::document::{parse_shadow_document, reported_state_payload};
use super::{RemoteStateDeleter, RemoteStateReader, RemoteStateReporter};
use crate::config::ShadowHttpConfig;
use crate::error::{Error, Result};
use crate::models::{RemoteState, ReservationId, Version};
use crate::util::compact_text;

/// Reads, acknowledges and deletes named shadows of one thing over HTTP.
#[derive(Debug, Clone)]
pub struct HttpShadowClient {
    config: ShadowHttpConfig,
    client: reqwest::Client,
}

impl HttpShadowClient {
    pub fn new(config: ShadowHttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn shadow_url(&self) -> String {
        format!(
            "{}/things/{}/shadow",
            self.config.endpoint.trim_end_matches('/'),
            urlencoding::encode(&self.config.thing_name)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteStateReader for HttpShadowClient {
    async fn fetch(&self, id: &ReservationId) -> Result<RemoteState> {
        tracing::debug!("Fetching shadow {} of {}", id.reservation_code(), self.config.thing_name);

        let request = self
            .client
            .get(self.shadow_url())
            .query(&[("name", id.reservation_code())])
            .header(ACCEPT, "application/json");
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::InvalidState(format!(
                "no shadow named '{}' exists for {}",
                id.reservation_code(),
                self.config.thing_name
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "shadow endpoint returned HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            )));
        }

        let body = response.bytes().await?;
        parse_shadow_document(&body)
    }
}

impl RemoteStateReporter for HttpShadowClient {
    async fn report_synced(&self, id: &ReservationId, version: &Version) -> Result<()> {
        let request = self
            .client
            .post(self.shadow_url())
            .query(&[("name", id.reservation_code())])
            .header(ACCEPT, "application/json")
            .json(&reported_state_payload(version));
        let response = self.authorize(request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "shadow update returned HTTP {status}: {}",
                compact_text(&body)
            )));
        }

        tracing::debug!("Reported synced version {version} for {id}");
        Ok(())
    }
}

impl RemoteStateDeleter for HttpShadowClient {
    async fn delete_remote(&self, id: &ReservationId) -> Result<bool> {
        let request = self
            .client
            .delete(self.shadow_url())
            .query(&[("name", id.reservation_code())])
            .header(ACCEPT, "application/json");
        let response = self.authorize(request).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "shadow delete returned HTTP {}: {}",
                status.as_u16(),
                compact_text(&body)
            )));
        }

        tracing::info!("Deleted shadow {} of {}", id.reservation_code(), self.config.thing_name);
        Ok(true)
    }
}
