use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::StatusCode;

use crate::config::{NetworkConfig, VenueConfig};
use crate::error::FetchError;
use crate::extract::is_session_expired;
use crate::traits::CalendarSource;

/// HTTP client for the venue's public calendar widget.
///
/// The widget only answers inside a session primed by visiting the public
/// booking page, so the client keeps a cookie jar and renews it (new jar,
/// fresh priming request) whenever the site reports the session as gone.
#[derive(Debug)]
pub struct CalendarClient {
    client: reqwest::Client,
    venue: VenueConfig,
    network: NetworkConfig,
    primed: bool,
}

impl CalendarClient {
    /// Create a new calendar client with configurable timeouts.
    pub fn new(venue: &VenueConfig, network: &NetworkConfig) -> Result<Self> {
        let client = build_http_client(venue, network).context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            venue: venue.clone(),
            network: network.clone(),
            primed: false,
        })
    }

    pub fn show_url(&self) -> String {
        format!("{}{}", self.venue.base_url, self.venue.show_path)
    }

    pub fn calendar_url(&self, date: NaiveDate) -> String {
        format!(
            "{}{}?date={}",
            self.venue.base_url,
            self.venue.calendar_path,
            date.format("%Y%m%d")
        )
    }

    /// Drop the current cookies and prime a new session.
    pub async fn renew_session(&mut self) -> Result<(), FetchError> {
        self.client = build_http_client(&self.venue, &self.network)?;
        self.primed = false;

        let response = self.client.get(self.show_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Session priming returned {}", status);
        }
        self.primed = true;
        Ok(())
    }

    fn session_expired(&self, body: &str) -> bool {
        is_session_expired(body, &self.venue.session_expired_marker)
    }

    async fn get_calendar(&self, date: NaiveDate) -> Result<(StatusCode, String), FetchError> {
        let response = self.client.get(self.calendar_url(date)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

impl CalendarSource for CalendarClient {
    async fn fetch_day(&mut self, date: NaiveDate) -> Result<String, FetchError> {
        if !self.primed {
            self.renew_session().await?;
        }

        let (status, body) = self.get_calendar(date).await?;
        if status.is_success() && !self.session_expired(&body) {
            return Ok(body);
        }

        tracing::debug!("Calendar for {} returned {}; renewing session and retrying", date, status);
        self.renew_session().await?;

        let (status, body) = self.get_calendar(date).await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                date,
                status: status.as_u16(),
            });
        }
        if self.session_expired(&body) {
            return Err(FetchError::SessionExpired { date });
        }
        Ok(body)
    }
}

fn build_http_client(
    venue: &VenueConfig,
    network: &NetworkConfig,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .cookie_store(true)
        .user_agent(venue.user_agent.clone())
        .timeout(Duration::from_secs(network.request_timeout_secs))
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .build()
}
