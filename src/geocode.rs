// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Place-name resolution through the OpenWeatherMap geocoding API.

use serde::Deserialize;

use crate::map::GeoPoint;

/// Why a place-name lookup failed.
///
/// A missing credential is a configuration problem and is not retried; the
/// other variants keep the previous map center and only surface a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    MissingApiKey,
    NotFound(String),
    Network(String),
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::MissingApiKey => {
                write!(f, "place search needs an OpenWeatherMap API key")
            }
            LookupError::NotFound(query) => write!(f, "no match for \"{}\"", query),
            LookupError::Network(e) => write!(f, "lookup failed: {}", e),
        }
    }
}

/// One match from the geocoding API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaceMatch {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
}

impl PlaceMatch {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }

    pub fn label(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {}", self.name, country),
            None => self.name.clone(),
        }
    }
}

const GEOCODE_ENDPOINT: &str = "https://api.openweathermap.org/geo/1.0/direct";

fn lookup_request(
    client: &reqwest::blocking::Client,
    query: &str,
    api_key: &str,
) -> reqwest::blocking::RequestBuilder {
    client
        .get(GEOCODE_ENDPOINT)
        .query(&[("q", query), ("limit", "1"), ("appid", api_key)])
}

/// Resolve a free-text place name to its best-match location.
///
/// Blocking; run on a background thread.
pub fn resolve_place(query: &str, api_key: Option<&str>) -> Result<PlaceMatch, LookupError> {
    let api_key = api_key.ok_or(LookupError::MissingApiKey)?;
    let query = query.trim();
    if query.is_empty() {
        return Err(LookupError::NotFound(query.to_owned()));
    }

    log::info!("Resolving place name: {}", query);

    let client = reqwest::blocking::Client::new();
    let response = lookup_request(&client, query, api_key)
        .send()
        .map_err(|e| LookupError::Network(e.to_string()))?;
    if !response.status().is_success() {
        return Err(LookupError::Network(format!("HTTP {}", response.status())));
    }

    let matches: Vec<PlaceMatch> = response
        .json()
        .map_err(|e| LookupError::Network(e.to_string()))?;

    matches
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(query.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_request_encodes_query() {
        let client = reqwest::blocking::Client::new();
        let request = lookup_request(&client, "San José, CR", "k").build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.openweathermap.org/geo/1.0/direct?q=San+Jos%C3%A9%2C+CR&limit=1&appid=k"
        );
    }

    #[test]
    fn test_missing_key_is_a_configuration_error() {
        assert_eq!(
            resolve_place("Tokyo", None),
            Err(LookupError::MissingApiKey)
        );
    }

    #[test]
    fn test_match_parsing_and_label() {
        let body = r#"[{"name":"New York","lat":40.7128,"lon":-74.006,"country":"US"}]"#;
        let matches: Vec<PlaceMatch> = serde_json::from_str(body).unwrap();
        let best = &matches[0];
        assert_eq!(best.label(), "New York, US");
        assert_eq!(best.point(), GeoPoint::new(40.7128, -74.006));
    }

    #[test]
    fn test_match_without_country() {
        let body = r#"[{"name":"Null Island","lat":0.0,"lon":0.0}]"#;
        let matches: Vec<PlaceMatch> = serde_json::from_str(body).unwrap();
        assert_eq!(matches[0].label(), "Null Island");
    }
}
