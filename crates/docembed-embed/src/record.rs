//! `{"type": ..., "init_parameters": {...}}` envelope for component configs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docembed_core::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct ComponentRecord<T> {
    #[serde(rename = "type")]
    type_name: String,
    init_parameters: T,
}

pub fn to_record<T: Serialize>(type_name: &str, init_parameters: &T) -> Result<Value> {
    let record = ComponentRecord { type_name: type_name.to_string(), init_parameters };
    Ok(serde_json::to_value(record)?)
}

pub fn from_record<T: DeserializeOwned>(type_name: &str, value: Value) -> Result<T> {
    let record: ComponentRecord<T> = serde_json::from_value(value)?;
    if record.type_name != type_name {
        return Err(Error::InvalidConfig(format!(
            "expected component type '{type_name}', got '{}'",
            record.type_name
        )));
    }
    Ok(record.init_parameters)
}
