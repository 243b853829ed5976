use candle_core::Device;
use pdfrag_core::config::DeviceKind;

pub fn select_device(kind: DeviceKind) -> Device {
    match kind {
        DeviceKind::Cpu => {}
        DeviceKind::Metal => {
            #[cfg(feature = "metal")]
            {
                if let Ok(dev) = Device::new_metal(0) { tracing::info!("device: Metal (MPS)"); return dev; }
            }
            tracing::warn!("Metal requested but unavailable in this build, falling back to CPU");
        }
    }
    tracing::info!("device: CPU");
    Device::Cpu
}
