//! Request body of a credential update

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use playdeck_core::PublishError;
use playdeck_publisher::{Credential, CredentialSource};
use serde_json::{Map, Value};

use crate::error::EndpointError;

const FIELDS: [&str; 3] = ["credentials", "credentials_base64", "credentials_path"];

/// The one credential source named in a request
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialPayload {
    /// `credentials`: a key object, or a key serialized as a JSON string
    Inline(Value),
    /// `credentials_base64`: base64 of the key JSON
    Base64(String),
    /// `credentials_path`: key file readable by the server
    Path(PathBuf),
}

impl CredentialPayload {
    /// Pick the credential field out of a raw request body
    pub fn from_body(body: &[u8]) -> Result<Self, EndpointError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| EndpointError::Malformed("Invalid JSON in request body".to_string()))?;
        let Value::Object(mut fields) = value else {
            return Err(EndpointError::Malformed(
                "Invalid JSON in request body".to_string(),
            ));
        };

        let present: Vec<&str> = FIELDS
            .into_iter()
            .filter(|name| fields.get(*name).is_some_and(is_provided))
            .collect();

        match present.as_slice() {
            [] => Err(EndpointError::Malformed(
                "Missing 'credentials', 'credentials_base64', or 'credentials_path' in request body"
                    .to_string(),
            )),
            [name] => Self::from_field(name, &mut fields),
            _ => Err(EndpointError::Malformed(
                "Provide exactly one of 'credentials', 'credentials_base64', or 'credentials_path'"
                    .to_string(),
            )),
        }
    }

    fn from_field(name: &str, fields: &mut Map<String, Value>) -> Result<Self, EndpointError> {
        let value = fields.remove(name).unwrap_or(Value::Null);
        match (name, value) {
            ("credentials", value @ (Value::Object(_) | Value::String(_))) => Ok(Self::Inline(value)),
            ("credentials", _) => Err(EndpointError::Decode(
                "credentials must be a string or object".to_string(),
            )),
            ("credentials_base64", Value::String(encoded)) => Ok(Self::Base64(encoded)),
            ("credentials_base64", _) => Err(EndpointError::Decode(
                "credentials_base64 must be a string".to_string(),
            )),
            (_, Value::String(path)) => Ok(Self::Path(PathBuf::from(path))),
            _ => Err(EndpointError::Decode(
                "credentials_path must be a string".to_string(),
            )),
        }
    }

    /// Decode into a candidate credential; it is not probed yet
    pub fn into_credential(self) -> Result<Credential, EndpointError> {
        let parsed = match self {
            Self::Inline(Value::String(text)) => {
                let value: Value = serde_json::from_str(&text).map_err(|_| {
                    EndpointError::Decode("Invalid JSON in credentials string".to_string())
                })?;
                Credential::from_json_value(value, CredentialSource::Endpoint)
            }
            Self::Inline(value) => Credential::from_json_value(value, CredentialSource::Endpoint),
            Self::Base64(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| EndpointError::Decode(format!("Invalid base64 encoding: {}", e)))?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| EndpointError::Decode(format!("Invalid base64 encoding: {}", e)))?;
                let value: Value = serde_json::from_str(&text).map_err(|_| {
                    EndpointError::Decode("Invalid JSON in base64-decoded credentials".to_string())
                })?;
                Credential::from_json_value(value, CredentialSource::Endpoint)
            }
            Self::Path(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    EndpointError::Decode(format!(
                        "Cannot read credentials_path {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let value: Value = serde_json::from_str(&text).map_err(|_| {
                    EndpointError::Decode(format!(
                        "Invalid JSON in credentials file {}",
                        path.display()
                    ))
                })?;
                Credential::from_json_value(value, CredentialSource::File(path))
            }
        };

        parsed.map_err(|e| match e {
            // Well-formed JSON that is not a usable key cannot authenticate
            PublishError::Credential(message) => EndpointError::Rejected(message),
            other => EndpointError::Internal(other.to_string()),
        })
    }
}

/// Null, empty strings and empty objects count as not provided
fn is_provided(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
