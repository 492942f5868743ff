// Adapters layer: concrete SourceClient implementations (HTTP providers and offline built-ins)

pub mod builtin;
pub mod http;
pub mod sources;

use crate::config::toml_config::{SourceDefinition, SourceKind};
use crate::core::registry::SourceRegistry;
use crate::domain::model::Module;
use crate::domain::ports::SourceClient;
use crate::utils::error::{Result, TracerError};
use builtin::{LocalValidator, SocialProbe};
use reqwest::Client;
use sources::{CarrierClient, GeolocationClient, SpamCheckClient, ValidatorClient};
use std::sync::Arc;

const USER_AGENT: &str = concat!("PhoneTracer/", env!("CARGO_PKG_VERSION"));

/// 依設定檔順序建立來源註冊表；停用的來源會被略過
pub fn build_registry(definitions: &[SourceDefinition]) -> Result<SourceRegistry> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let mut registry = SourceRegistry::new();

    for definition in definitions {
        if !definition.is_enabled() {
            tracing::debug!("⏭️ Skipping disabled source: {}", definition.name);
            continue;
        }
        if definition.uses_api_key() && !definition.has_api_key() {
            tracing::warn!(
                "⚠️ Source '{}' has no API key configured; its lookups will fail",
                definition.name
            );
        }

        registry.register(build_source(definition, client.clone())?);
        tracing::debug!("🔌 Registered source {} for {}", definition.name, definition.module);
    }

    Ok(registry)
}

pub fn build_source(definition: &SourceDefinition, client: Client) -> Result<Arc<dyn SourceClient>> {
    let module = definition.module()?;

    let source: Arc<dyn SourceClient> = match (definition.kind, module) {
        (SourceKind::Http, Module::Carrier) => Arc::new(CarrierClient::from_definition(definition, client)?),
        (SourceKind::Http, Module::Geolocation) => {
            Arc::new(GeolocationClient::from_definition(definition, client)?)
        }
        (SourceKind::Http, Module::Spam) => Arc::new(SpamCheckClient::from_definition(definition, client)?),
        (SourceKind::Http, Module::Validate) => Arc::new(ValidatorClient::from_definition(definition, client)?),
        (SourceKind::Builtin, Module::Validate) => Arc::new(LocalValidator::new(&definition.name)),
        (SourceKind::Builtin, Module::Social) => Arc::new(SocialProbe::new(&definition.name)),
        (SourceKind::Http, Module::Social) | (SourceKind::Builtin, _) => {
            return Err(TracerError::InvalidConfigValueError {
                field: format!("sources.{}.kind", definition.name),
                value: format!("{:?}", definition.kind).to_lowercase(),
                reason: format!("No {:?} source implementation for module '{}'", definition.kind, module),
            });
        }
    };

    Ok(source)
}
