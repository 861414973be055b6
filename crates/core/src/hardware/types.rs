//! Accelerator inventory types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capability::{AcceleratorFamily, CodecFamily, OptionMap};

/// GPU vendor, ordered by selection priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuVendor {
    Nvidia,
    Intel,
    Amd,
    Apple,
    /// Vendor could not be identified; driven through generic VA-API.
    Unknown,
}

impl GpuVendor {
    /// Lower is preferred.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Nvidia => 0,
            Self::Intel => 1,
            Self::Amd => 2,
            Self::Apple => 3,
            Self::Unknown => 4,
        }
    }

    /// Encode API used for this vendor.
    pub fn accelerator_family(&self) -> AcceleratorFamily {
        match self {
            Self::Nvidia => AcceleratorFamily::Nvenc,
            Self::Intel => AcceleratorFamily::Qsv,
            Self::Amd => AcceleratorFamily::Amf,
            Self::Apple => AcceleratorFamily::VideoToolbox,
            Self::Unknown => AcceleratorFamily::Vaapi,
        }
    }

    /// Fixed vendor x codec compatibility table.
    pub fn supports(&self, family: CodecFamily) -> bool {
        use CodecFamily::*;
        match self {
            Self::Nvidia => matches!(family, H264 | H265 | Av1),
            Self::Intel => matches!(family, H264 | H265 | Av1 | Vp9),
            Self::Amd => matches!(family, H264 | H265 | Av1),
            Self::Apple | Self::Unknown => matches!(family, H264 | H265),
        }
    }

    pub fn from_accelerator_family(family: AcceleratorFamily) -> Self {
        match family {
            AcceleratorFamily::Nvenc => Self::Nvidia,
            AcceleratorFamily::Qsv => Self::Intel,
            AcceleratorFamily::Amf => Self::Amd,
            AcceleratorFamily::VideoToolbox => Self::Apple,
            AcceleratorFamily::Vaapi => Self::Unknown,
        }
    }
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nvidia => "nvidia",
            Self::Intel => "intel",
            Self::Amd => "amd",
            Self::Apple => "apple",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A detected hardware encoder device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuAccelerator {
    pub vendor: GpuVendor,
    pub name: String,
    /// Render node or device handle (e.g. `/dev/dri/renderD128`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Hardware encoder ids reported by the encoder binary. Empty means
    /// "not enumerated"; the vendor table alone then decides support.
    #[serde(default)]
    pub encoders: Vec<String>,
}

impl GpuAccelerator {
    pub fn new(vendor: GpuVendor, name: impl Into<String>) -> Self {
        Self {
            vendor,
            name: name.into(),
            device: None,
            encoders: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_encoders<I, S>(mut self, encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoders = encoders.into_iter().map(Into::into).collect();
        self
    }

    pub fn family(&self) -> AcceleratorFamily {
        self.vendor.accelerator_family()
    }

    /// Whether this device can encode `family`.
    pub fn supports(&self, family: CodecFamily, encoder: Option<&str>) -> bool {
        if !self.vendor.supports(family) {
            return false;
        }
        match encoder {
            Some(id) if !self.encoders.is_empty() => self.encoders.iter().any(|e| e == id),
            _ => true,
        }
    }

    /// Options that must precede `-i` to initialise the device.
    pub fn device_init_options(&self) -> OptionMap {
        let device = self.device.as_deref().unwrap_or("/dev/dri/renderD128");
        let mut opts = OptionMap::new();
        match self.vendor {
            GpuVendor::Nvidia => {
                opts.insert("-hwaccel", "cuda");
            }
            GpuVendor::Intel => {
                opts.insert(
                    "-init_hw_device",
                    vec![format!("vaapi=va:{}", device), "qsv=hw@va".to_string()],
                );
                opts.insert("-filter_hw_device", "hw");
            }
            GpuVendor::Amd => {
                opts.insert("-hwaccel", "auto");
            }
            GpuVendor::Apple => {
                opts.insert("-hwaccel", "videotoolbox");
            }
            GpuVendor::Unknown => {
                opts.insert("-vaapi_device", device);
            }
        }
        opts
    }

    /// Filter that uploads software frames to the device, if the encoder
    /// needs one.
    pub fn upload_filter(&self) -> Option<&'static str> {
        match self.vendor {
            GpuVendor::Intel => Some("hwupload=extra_hw_frames=64,format=qsv"),
            GpuVendor::Unknown => Some("format=nv12,hwupload"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::OptionValue;

    #[test]
    fn test_vendor_table() {
        assert!(GpuVendor::Intel.supports(CodecFamily::Vp9));
        assert!(!GpuVendor::Nvidia.supports(CodecFamily::Vp9));
        assert!(!GpuVendor::Apple.supports(CodecFamily::Av1));
        assert!(!GpuVendor::Amd.supports(CodecFamily::Aac));
    }

    #[test]
    fn test_priority_order() {
        let mut vendors = vec![
            GpuVendor::Unknown,
            GpuVendor::Amd,
            GpuVendor::Nvidia,
            GpuVendor::Apple,
            GpuVendor::Intel,
        ];
        vendors.sort_by_key(|v| v.priority());
        assert_eq!(
            vendors,
            vec![
                GpuVendor::Nvidia,
                GpuVendor::Intel,
                GpuVendor::Amd,
                GpuVendor::Apple,
                GpuVendor::Unknown
            ]
        );
    }

    #[test]
    fn test_supports_respects_enumerated_encoders() {
        let gpu = GpuAccelerator::new(GpuVendor::Nvidia, "nvenc").with_encoders(["h264_nvenc"]);
        assert!(gpu.supports(CodecFamily::H264, Some("h264_nvenc")));
        assert!(!gpu.supports(CodecFamily::Av1, Some("av1_nvenc")));

        let unlisted = GpuAccelerator::new(GpuVendor::Nvidia, "nvenc");
        assert!(unlisted.supports(CodecFamily::Av1, Some("av1_nvenc")));
    }

    #[test]
    fn test_qsv_device_init_is_repeated() {
        let gpu = GpuAccelerator::new(GpuVendor::Intel, "qsv").with_device("/dev/dri/renderD129");
        let opts = gpu.device_init_options();
        let keys: Vec<&str> = opts.keys().collect();
        assert_eq!(keys, vec!["-init_hw_device", "-filter_hw_device"]);
        assert_eq!(
            opts.get("-init_hw_device"),
            Some(&OptionValue::Repeated(vec![
                "vaapi=va:/dev/dri/renderD129".to_string(),
                "qsv=hw@va".to_string()
            ]))
        );
    }
}
