//! Remote feature API client for the composite current-development layer.
//!
//! One blocking GET per run with basic auth. Any status other than 200 is
//! fatal. There is no retry and no client-side timeout.

use bevy::prelude::*;

use crate::config::ApiConfig;
use crate::error::{SetupError, SetupResult};
use crate::geometry::FeatureCollection;

const AREAS_ENDPOINT: &str = "data/mastermap/areas";

/// Parameters of a composite-layer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub area_codes: Vec<String>,
    pub year: Option<String>,
}

impl FeatureRequest {
    pub fn endpoint(base: &str) -> String {
        format!("{}/{AREAS_ENDPOINT}", base.trim_end_matches('/'))
    }

    /// Query parameters, unencoded, in request order.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("export_format", "geojson".to_string()),
            ("scale", "lad".to_string()),
            ("area_codes", self.area_codes.join(",")),
            ("classification_codes", "all".to_string()),
        ];
        if let Some(year) = &self.year {
            query.push(("year", year.clone()));
        }
        query
    }

    /// Readable form of the request for logs.
    pub fn url(&self, base: &str) -> String {
        let query: Vec<String> = self
            .query()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!("{}?{}", Self::endpoint(base), query.join("&"))
    }

    /// Short label for files derived from this request.
    pub fn label(&self) -> String {
        self.area_codes.join("_")
    }
}

/// Something that can answer a [`FeatureRequest`].
pub trait FeatureSource: Send + Sync {
    fn fetch(&self, request: &FeatureRequest) -> SetupResult<FeatureCollection>;
}

/// The feature source used by a run, replaceable before startup.
#[derive(Resource)]
pub struct FeatureSourceHandle(pub Box<dyn FeatureSource>);

pub struct HttpFeatureSource {
    client: reqwest::blocking::Client,
    api: ApiConfig,
}

impl HttpFeatureSource {
    pub fn new(api: ApiConfig) -> SetupResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()
            .map_err(|e| SetupError::ApiTransport(e.to_string()))?;
        Ok(Self { client, api })
    }
}

impl FeatureSource for HttpFeatureSource {
    fn fetch(&self, request: &FeatureRequest) -> SetupResult<FeatureCollection> {
        info!("Requesting {}", request.url(&self.api.url));
        let response = self
            .client
            .get(FeatureRequest::endpoint(&self.api.url))
            .query(&request.query())
            .basic_auth(&self.api.username, Some(&self.api.password))
            .send()
            .map_err(|e| SetupError::ApiTransport(e.to_string()))?;

        let url = response.url().to_string();
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(SetupError::Api {
                status: status.as_u16(),
                url,
            });
        }
        let body = response
            .text()
            .map_err(|e| SetupError::ApiTransport(e.to_string()))?;
        let features = FeatureCollection::from_json(&body)?;
        info!("Received {} features from {}", features.len(), url);
        Ok(features)
    }
}
