//! Video filter chain assembly.

use crate::hardware::GpuAccelerator;

/// HDR (PQ/HLG) to BT.709 SDR via a linear-light Hable tonemap.
pub(crate) const TONEMAP_CHAIN: &str = "zscale=t=linear:npl=100,format=gbrpf32le,zscale=p=bt709,\
tonemap=tonemap=hable:desat=0,zscale=t=bt709:m=bt709:r=tv,format=yuv420p";

/// Builds the `-vf` value for one rendition: tonemap, then scale, then the
/// device upload. `None` when no filter applies.
pub(crate) fn video_filter_chain(
    tonemap: bool,
    width: Option<u32>,
    height: u32,
    scale: bool,
    accelerator: Option<&GpuAccelerator>,
) -> Option<String> {
    let mut filters: Vec<String> = Vec::new();
    if tonemap {
        filters.push(TONEMAP_CHAIN.to_string());
    }
    if scale {
        let w = width.map(|w| w.to_string()).unwrap_or_else(|| "-2".to_string());
        filters.push(format!("scale={}:{}", w, height));
    }
    if let Some(upload) = accelerator.and_then(GpuAccelerator::upload_filter) {
        filters.push(upload.to_string());
    }
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

/// Output width for `height` keeping the source aspect ratio, rounded to
/// an even number.
pub(crate) fn scaled_width(source_width: u32, source_height: u32, height: u32) -> Option<u32> {
    if source_width == 0 || source_height == 0 {
        return None;
    }
    let exact = height as f64 * source_width as f64 / source_height as f64;
    let even = ((exact / 2.0).round() * 2.0) as u32;
    Some(even.max(2))
}
