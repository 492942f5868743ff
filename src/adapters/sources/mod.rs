pub mod carrier;
pub mod geolocation;
pub mod spam;
pub mod validator;

pub use carrier::CarrierClient;
pub use geolocation::GeolocationClient;
pub use spam::SpamCheckClient;
pub use validator::ValidatorClient;

use crate::domain::model::LookupStatus;
use crate::utils::error::{Result, TracerError};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// 缺少時整個回應視為 malformed
    Required,
    /// 缺少時結果降為 partial
    Expected,
    Optional,
}

/// 正規化後的欄位，以及供應商回應中可能出現的名稱（支援 `a.b` 巢狀路徑）。
/// 別名優先於欄位本身的名稱。
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub presence: Presence,
}

impl FieldSpec {
    pub const fn new(name: &'static str, aliases: &'static [&'static str], presence: Presence) -> Self {
        Self {
            name,
            aliases,
            presence,
        }
    }
}

/// 把供應商回應對應到固定欄位，回傳欄位與狀態
pub fn normalize(
    source: &str,
    payload: &Map<String, Value>,
    specs: &[FieldSpec],
) -> Result<(BTreeMap<String, Value>, LookupStatus)> {
    let mut fields = BTreeMap::new();
    let mut status = LookupStatus::Success;

    for spec in specs {
        let value = spec
            .aliases
            .iter()
            .copied()
            .chain(std::iter::once(spec.name))
            .find_map(|path| lookup_path(payload, path));

        match (value, spec.presence) {
            (Some(value), _) => {
                fields.insert(spec.name.to_string(), value.clone());
            }
            (None, Presence::Required) => {
                return Err(TracerError::MalformedResponse {
                    source_id: source.to_string(),
                    reason: format!("missing required field '{}'", spec.name),
                });
            }
            (None, Presence::Expected) => status = LookupStatus::Partial,
            (None, Presence::Optional) => {}
        }
    }

    Ok((fields, status))
}

fn lookup_path<'a>(payload: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let value = segments.try_fold(payload.get(first)?, |current, segment| current.get(segment))?;

    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(other),
    }
}
