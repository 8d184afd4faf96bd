//! YUV to RGB conversion (BT.601, full range)

/// Convert one pixel using 16.16 fixed point coefficients
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    let r = y + ((91_881 * v) >> 16);
    let g = y - ((22_554 * u + 46_802 * v) >> 16);
    let b = y + ((116_130 * u) >> 16);

    [r.clamp(0, 255) as u8, g.clamp(0, 255) as u8, b.clamp(0, 255) as u8]
}

/// Convert an NV21 buffer (Y plane, then interleaved V/U) to packed RGB.
///
/// The caller guarantees `data` has the NV21 length for `width` x `height`.
pub(crate) fn nv21_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let chroma_width = w.div_ceil(2);
    let (luma, chroma) = data.split_at(w * h);

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let chroma_row = (row / 2) * chroma_width * 2;
        for col in 0..w {
            let pair = chroma_row + (col / 2) * 2;
            let (v, u) = (chroma[pair], chroma[pair + 1]);
            rgb.extend_from_slice(&yuv_to_rgb(luma[row * w + col], u, v));
        }
    }
    rgb
}

/// Convert an I420 buffer (Y, U, V planes) to packed RGB.
pub(crate) fn i420_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let chroma_width = w.div_ceil(2);
    let chroma_len = chroma_width * h.div_ceil(2);
    let (luma, chroma) = data.split_at(w * h);
    let (u_plane, v_plane) = chroma.split_at(chroma_len);

    let mut rgb = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        for col in 0..w {
            let c = (row / 2) * chroma_width + col / 2;
            rgb.extend_from_slice(&yuv_to_rgb(luma[row * w + col], u_plane[c], v_plane[c]));
        }
    }
    rgb
}
