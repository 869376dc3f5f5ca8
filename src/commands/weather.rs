//! Current weather from `OpenWeatherMap`

use async_trait::async_trait;
use serde::Deserialize;

use super::{Command, CommandContext};
use crate::config::WeatherConfig;
use crate::{Error, Result};

const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    main: WeatherMain,
    #[serde(default)]
    weather: Vec<WeatherCondition>,
}

#[derive(Debug, Deserialize)]
struct WeatherMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct WeatherCondition {
    description: String,
}

/// Current conditions in one city
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: f64,
    pub description: String,
}

impl WeatherReport {
    /// Text shown in the transcript
    #[must_use]
    pub fn shown(&self) -> String {
        format!(
            "The current temperature in {} is {}°C with {}.",
            self.city, self.temperature, self.description
        )
    }

    /// Text read aloud
    #[must_use]
    pub fn spoken(&self) -> String {
        format!(
            "The current temperature in {} is {} degrees Celsius with {}.",
            self.city, self.temperature, self.description
        )
    }
}

/// "weather"
pub struct WeatherCommand {
    client: reqwest::Client,
    api_key: String,
    city: String,
}

impl WeatherCommand {
    #[must_use]
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            city: config.city.clone(),
        }
    }

    /// Fetch current conditions for the configured city
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects it
    pub async fn fetch(&self) -> Result<WeatherReport> {
        let response = self
            .client
            .get(OPENWEATHER_URL)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Command(format!("weather service returned {status}")));
        }

        let body: WeatherResponse = response.json().await?;
        Ok(report_from(&self.city, body))
    }
}

fn report_from(city: &str, body: WeatherResponse) -> WeatherReport {
    WeatherReport {
        city: city.to_string(),
        temperature: body.main.temp,
        description: body
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .unwrap_or_default(),
    }
}

#[async_trait]
impl Command for WeatherCommand {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn matches(&self, utterance: &str) -> bool {
        utterance.contains("weather")
    }

    async fn handle(&self, _utterance: &str, ctx: &CommandContext) -> Result<()> {
        match self.fetch().await {
            Ok(report) => ctx.announce(&report.shown(), &report.spoken()).await,
            Err(e) => {
                tracing::warn!(error = %e, city = %self.city, "weather lookup failed");
                ctx.announce(
                    "⚠️ Unable to fetch weather data.",
                    "Unable to fetch weather data.",
                )
                .await;
            }
        }
        Ok(())
    }
}
