use anyhow::{anyhow, Result};
use docembed_core::{ComponentDevice, Device};

/// Best device candle was compiled for: CUDA, then Metal, then CPU.
pub fn default_device() -> Device {
    if candle_core::utils::cuda_is_available() {
        tracing::debug!("auto-selected device cuda:0");
        return Device::Cuda(0);
    }
    if candle_core::utils::metal_is_available() {
        tracing::debug!("auto-selected device mps");
        return Device::Mps(0);
    }
    Device::Cpu
}

pub fn resolve_device(device: Option<ComponentDevice>) -> ComponentDevice {
    ComponentDevice::resolve_with(device, default_device)
}

/// Open the candle device for a descriptor. Device maps are not supported.
pub fn select_device(device: &ComponentDevice) -> Result<candle_core::Device> {
    let single = device
        .single()
        .map_err(|_| anyhow!("the candle backend cannot shard a model across a device map ({device})"))?;
    let dev = match single {
        Device::Cpu => candle_core::Device::Cpu,
        Device::Cuda(ordinal) => candle_core::Device::new_cuda(ordinal)
            .map_err(|e| anyhow!("Failed to initialize CUDA device {ordinal}: {e}"))?,
        Device::Mps(ordinal) => candle_core::Device::new_metal(ordinal)
            .map_err(|e| anyhow!("Failed to initialize Metal device {ordinal}: {e}"))?,
    };
    tracing::info!(device = %single, "selected device");
    Ok(dev)
}
