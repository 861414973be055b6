//! Detect-once accelerator inventory and hardware codec selection.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::probe::{AcceleratorProbe, FfmpegEncoderProbe};
use super::types::GpuAccelerator;
use crate::capability::{
    hardware_codec, lookup_codec, software_codec, AcceleratorFamily, CapabilityError,
    CapabilityReport, CodecDescriptor, CodecFamily,
};
use crate::config::{FfmpegConfig, HardwareConfig};

/// Long-lived accelerator inventory shared by reference.
///
/// The probe runs at most once, on the first call that needs the inventory.
/// Concurrent first callers wait on the same probe. A failing probe yields an
/// empty inventory, which selects the software path everywhere.
pub struct HardwareAcceleratorService {
    probe: Option<Arc<dyn AcceleratorProbe>>,
    inventory: OnceCell<Vec<GpuAccelerator>>,
}

impl HardwareAcceleratorService {
    pub fn new(probe: Arc<dyn AcceleratorProbe>) -> Self {
        Self {
            probe: Some(probe),
            inventory: OnceCell::new(),
        }
    }

    /// A service that never detects anything.
    pub fn disabled() -> Self {
        Self {
            probe: None,
            inventory: OnceCell::new(),
        }
    }

    pub fn from_config(ffmpeg: &FfmpegConfig, hardware: &HardwareConfig) -> Self {
        if !hardware.enabled {
            return Self::disabled();
        }
        let mut probe = FfmpegEncoderProbe::new(ffmpeg.ffmpeg_path.clone())
            .with_timeout(hardware.probe_timeout_secs);
        if let Some(ref device) = hardware.vaapi_device {
            probe = probe.with_vaapi_device(device.clone());
        }
        Self::new(Arc::new(probe))
    }

    /// Cached accelerator list. Empty means software only.
    pub async fn list_accelerators(&self) -> &[GpuAccelerator] {
        self.inventory
            .get_or_init(|| async {
                let Some(ref probe) = self.probe else {
                    info!("Hardware detection disabled");
                    return Vec::new();
                };
                match probe.detect().await {
                    Ok(found) => {
                        info!(
                            probe = probe.name(),
                            count = found.len(),
                            vendors = ?found.iter().map(|g| g.vendor.to_string()).collect::<Vec<_>>(),
                            "Hardware detection finished"
                        );
                        found
                    }
                    Err(e) => {
                        warn!(probe = probe.name(), error = %e, "Hardware detection failed, using software encoders");
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Accelerator families present in the inventory.
    pub async fn available_families(&self) -> Vec<AcceleratorFamily> {
        let mut families: Vec<AcceleratorFamily> = Vec::new();
        for family in self.list_accelerators().await.iter().map(|g| g.family()) {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }

    /// Best accelerator able to encode `family`, by fixed vendor priority.
    pub async fn best_accelerator_for(&self, family: CodecFamily) -> Option<GpuAccelerator> {
        self.list_accelerators()
            .await
            .iter()
            .filter(|gpu| {
                hardware_codec(family, gpu.family())
                    .is_some_and(|codec| gpu.supports(family, Some(codec.encoder())))
            })
            .min_by_key(|gpu| gpu.vendor.priority())
            .cloned()
    }

    /// Accelerator backing a hardware codec, if one is installed.
    pub async fn accelerator_for(&self, codec: &CodecDescriptor) -> Option<GpuAccelerator> {
        let accel = codec.accelerator()?;
        self.list_accelerators()
            .await
            .iter()
            .find(|gpu| gpu.family() == accel && gpu.supports(codec.family(), Some(codec.encoder())))
            .cloned()
    }

    /// Resolves a requested codec name to the codec that will actually run.
    ///
    /// A hardware codec is returned only when an installed accelerator can
    /// run it; otherwise the canonical software codec of the same family.
    /// An explicitly requested hardware id is kept if its accelerator is
    /// present. With `allow_hardware` false the result is always software.
    pub async fn recommended_codec(
        &self,
        requested: &str,
        allow_hardware: bool,
    ) -> Result<CodecDescriptor, CapabilityError> {
        let codec = lookup_codec(requested).ok_or_else(|| CapabilityError::unknown_codec(requested))?;
        let family = codec.family();

        if !family.is_hardware_capable() {
            return Ok(codec);
        }
        if !allow_hardware {
            return Ok(software_codec(family));
        }

        if codec.is_hardware() {
            if self.accelerator_for(&codec).await.is_some() {
                return Ok(codec);
            }
            debug!(requested, "Requested hardware encoder unavailable, falling back");
        }

        let chosen = match self.best_accelerator_for(family).await {
            Some(gpu) => hardware_codec(family, gpu.family()).unwrap_or_else(|| software_codec(family)),
            None => software_codec(family),
        };
        debug!(requested, chosen = chosen.encoder(), "Codec recommendation");
        Ok(chosen)
    }

    /// Capability report for the installed hardware.
    pub async fn capability_report(&self) -> CapabilityReport {
        CapabilityReport::build(&self.available_families().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::GpuVendor;
    use crate::testing::StaticAcceleratorProbe;

    fn service(gpus: Vec<GpuAccelerator>) -> (HardwareAcceleratorService, Arc<StaticAcceleratorProbe>) {
        let probe = Arc::new(StaticAcceleratorProbe::new(gpus));
        (HardwareAcceleratorService::new(probe.clone()), probe)
    }

    #[tokio::test]
    async fn test_no_accelerators_never_yields_hardware() {
        let (svc, _) = service(Vec::new());
        for name in ["h264", "hevc", "h264_nvenc", "hevc_qsv", "av1_amf", "vp9"] {
            let codec = svc.recommended_codec(name, true).await.unwrap();
            assert!(!codec.is_hardware(), "{} resolved to {}", name, codec.encoder());
        }
        assert!(svc.list_accelerators().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_probe_degrades_to_software() {
        let probe = Arc::new(StaticAcceleratorProbe::failing("driver exploded"));
        let svc = HardwareAcceleratorService::new(probe);
        assert!(svc.list_accelerators().await.is_empty());
        let codec = svc.recommended_codec("h265", true).await.unwrap();
        assert_eq!(codec.encoder(), "libx265");
    }

    #[tokio::test]
    async fn test_vendor_priority() {
        let (svc, _) = service(vec![
            GpuAccelerator::new(GpuVendor::Amd, "amf"),
            GpuAccelerator::new(GpuVendor::Intel, "qsv"),
            GpuAccelerator::new(GpuVendor::Nvidia, "nvenc"),
        ]);
        let best = svc.best_accelerator_for(CodecFamily::H265).await.unwrap();
        assert_eq!(best.vendor, GpuVendor::Nvidia);

        // only Intel encodes VP9
        let vp9 = svc.best_accelerator_for(CodecFamily::Vp9).await.unwrap();
        assert_eq!(vp9.vendor, GpuVendor::Intel);

        assert!(svc.best_accelerator_for(CodecFamily::Aac).await.is_none());
        assert_eq!(svc.recommended_codec("hevc", true).await.unwrap().encoder(), "hevc_nvenc");
    }

    #[tokio::test]
    async fn test_explicit_hardware_request() {
        let (svc, _) = service(vec![
            GpuAccelerator::new(GpuVendor::Nvidia, "nvenc"),
            GpuAccelerator::new(GpuVendor::Intel, "qsv"),
        ]);
        assert_eq!(svc.recommended_codec("h264_qsv", true).await.unwrap().encoder(), "h264_qsv");
        // AMD absent: best available instead
        assert_eq!(svc.recommended_codec("h264_amf", true).await.unwrap().encoder(), "h264_nvenc");
        assert_eq!(svc.recommended_codec("h264_qsv", false).await.unwrap().encoder(), "libx264");
    }

    #[tokio::test]
    async fn test_unknown_codec() {
        let (svc, _) = service(Vec::new());
        let err = svc.recommended_codec("cinepak", true).await.unwrap_err();
        assert_eq!(err, CapabilityError::unknown_codec("cinepak"));
    }

    #[tokio::test]
    async fn test_probe_runs_once_under_concurrency() {
        let (svc, probe) = service(vec![GpuAccelerator::new(GpuVendor::Apple, "vt")]);
        let svc = Arc::new(svc);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.list_accelerators().await.len() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_available_families_unique_across_interleaved_vendors() {
        let (svc, _) = service(vec![
            GpuAccelerator::new(GpuVendor::Nvidia, "nvenc"),
            GpuAccelerator::new(GpuVendor::Intel, "qsv"),
            GpuAccelerator::new(GpuVendor::Nvidia, "nvenc"),
        ]);
        assert_eq!(
            svc.available_families().await,
            vec![AcceleratorFamily::Nvenc, AcceleratorFamily::Qsv]
        );
    }

    #[tokio::test]
    async fn test_disabled_service() {
        let svc = HardwareAcceleratorService::disabled();
        assert!(svc.available_families().await.is_empty());
        let report = svc.capability_report().await;
        assert!(report.video_encoders.iter().all(|e| !e.hardware));
    }
}
