use super::{normalize, FieldSpec, Presence};
use crate::adapters::http::HttpSource;
use crate::config::toml_config::SourceDefinition;
use crate::domain::model::{LookupResult, Module};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::SourceClient;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const FIELDS: [FieldSpec; 7] = [
    FieldSpec::new("country", &["country.name", "country_name"], Presence::Required),
    FieldSpec::new("country_code", &["country.code", "country_code"], Presence::Expected),
    FieldSpec::new("region", &["location.region", "state"], Presence::Optional),
    FieldSpec::new("city", &["location.city", "location"], Presence::Optional),
    FieldSpec::new("timezone", &["location.timezone", "time_zone"], Presence::Optional),
    FieldSpec::new("latitude", &["location.latitude", "lat"], Presence::Optional),
    FieldSpec::new("longitude", &["location.longitude", "lon", "lng"], Presence::Optional),
];

#[derive(Debug, Clone)]
pub struct GeolocationClient {
    http: HttpSource,
}

impl GeolocationClient {
    pub fn from_definition(definition: &SourceDefinition, client: Client) -> Result<Self> {
        Ok(Self {
            http: HttpSource::from_definition(definition, client)?,
        })
    }
}

#[async_trait]
impl SourceClient for GeolocationClient {
    fn id(&self) -> &str {
        self.http.name()
    }

    fn module(&self) -> Module {
        Module::Geolocation
    }

    async fn lookup(&self, number: &PhoneNumber, timeout: Duration) -> Result<LookupResult> {
        let payload = self.http.fetch(number, timeout).await?;
        let (fields, status) = normalize(self.id(), &payload, &FIELDS)?;
        Ok(LookupResult::new(self.id(), Module::Geolocation, status, fields))
    }
}
