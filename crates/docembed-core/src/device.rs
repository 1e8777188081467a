//! Device descriptors for backend placement.
//!
//! Descriptors are plain data; turning them into an accelerator handle is the
//! backend's job. `ComponentDevice` serializes to a tagged mapping:
//! `{"type": "single", "device": "cuda:0"}` or
//! `{"type": "multiple", "device_map": {"encoder": "cuda:0", ...}}`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    Cuda(usize),
    /// Apple silicon GPU; backed by Metal.
    Mps(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{id}"),
            Device::Mps(0) => write!(f, "mps"),
            Device::Mps(id) => write!(f, "mps:{id}"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => {
                let id = id
                    .parse::<usize>()
                    .map_err(|_| Error::Device(format!("invalid device id in '{s}'")))?;
                (kind, Some(id))
            }
            None => (s, None),
        };
        match (kind.to_ascii_lowercase().as_str(), id) {
            ("cpu", None) => Ok(Device::Cpu),
            ("cuda", id) => Ok(Device::Cuda(id.unwrap_or(0))),
            ("mps", id) => Ok(Device::Mps(id.unwrap_or(0))),
            _ => Err(Error::Device(format!("unknown device '{s}'"))),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Layer name to device assignments for sharded models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceMap(pub BTreeMap<String, Device>);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentDevice {
    Single { device: Device },
    Multiple { device_map: DeviceMap },
}

impl ComponentDevice {
    pub fn from_single(device: Device) -> Self {
        Self::Single { device }
    }

    pub fn from_str_spec(spec: &str) -> crate::error::Result<Self> {
        Ok(Self::from_single(spec.parse()?))
    }

    /// Keep an explicit device, or fall back to `detect()`.
    pub fn resolve_with(device: Option<Self>, detect: impl FnOnce() -> Device) -> Self {
        device.unwrap_or_else(|| Self::from_single(detect()))
    }

    /// The single device, or an error for device maps.
    pub fn single(&self) -> crate::error::Result<Device> {
        match self {
            ComponentDevice::Single { device } => Ok(*device),
            ComponentDevice::Multiple { .. } => Err(Error::Device(
                "a device map cannot be converted to a single device".to_string(),
            )),
        }
    }

    pub fn has_multiple_devices(&self) -> bool {
        matches!(self, ComponentDevice::Multiple { device_map } if device_map.0.len() > 1)
    }
}

impl fmt::Display for ComponentDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentDevice::Single { device } => write!(f, "{device}"),
            ComponentDevice::Multiple { device_map } => {
                let parts: Vec<String> = device_map.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "map({})", parts.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_and_display() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("CUDA:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert_eq!("mps".parse::<Device>().unwrap().to_string(), "mps");
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
    }

    #[test]
    fn serializes_as_tagged_mapping() {
        let single = ComponentDevice::from_single(Device::Cuda(0));
        assert_eq!(serde_json::to_value(&single).unwrap(), json!({"type": "single", "device": "cuda:0"}));

        let mut map = BTreeMap::new();
        map.insert("encoder".to_string(), Device::Cuda(0));
        map.insert("pooler".to_string(), Device::Cpu);
        let multi = ComponentDevice::Multiple { device_map: DeviceMap(map) };
        let value = serde_json::to_value(&multi).unwrap();
        assert_eq!(value, json!({"type": "multiple", "device_map": {"encoder": "cuda:0", "pooler": "cpu"}}));
        let back: ComponentDevice = serde_json::from_value(value).unwrap();
        assert_eq!(back, multi);
        assert!(back.has_multiple_devices());
        assert!(back.single().is_err());
    }

    #[test]
    fn resolve_keeps_explicit_device() {
        let explicit = ComponentDevice::from_single(Device::Mps(0));
        let resolved = ComponentDevice::resolve_with(Some(explicit.clone()), || Device::Cpu);
        assert_eq!(resolved, explicit);
        let detected = ComponentDevice::resolve_with(None, || Device::Cuda(0));
        assert_eq!(detected.single().unwrap(), Device::Cuda(0));
    }
}
