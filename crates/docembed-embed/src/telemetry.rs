use serde_json::{Map, Value};

pub const TELEMETRY_TARGET: &str = "docembed::telemetry";

/// Usage data reported for an embedder: only the model identifier.
pub fn model_data(model: &str) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("model".to_string(), Value::String(model.to_string()));
    data
}

/// Fire-and-forget usage event.
pub fn emit(component: &str, data: &Map<String, Value>) {
    let payload = Value::Object(data.clone());
    tracing::info!(target: TELEMETRY_TARGET, component, data = %payload, "component warmed up");
}
