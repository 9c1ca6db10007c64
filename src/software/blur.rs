//! Gaussian blur approximated by three box blurs, on premultiplied RGBA.

/// Box size used for each of the three passes for a blur with standard
/// deviation `sigma`.
pub(crate) fn box_size(sigma: f32) -> usize {
    let factor = 3.0 * (2.0 * std::f32::consts::PI).sqrt() / 4.0;
    (sigma * factor + 0.5).floor().max(0.0) as usize
}

/// Blur `data` (`width` x `height` RGBA8 pixels, tightly packed) in place.
pub(crate) fn blur_rgba(data: &mut [u8], width: usize, height: usize, sigma: f32) {
    let size = box_size(sigma);
    if size <= 1 || width == 0 || height == 0 {
        return;
    }

    let mut scratch = vec![0u8; data.len()];
    // An even box is run off-center twice and once widened, which keeps
    // the result centered
    let passes: [(usize, usize); 3] = if size % 2 == 1 {
        let half = size / 2;
        [(half, half); 3]
    } else {
        let half = size / 2;
        [(half, half - 1), (half - 1, half), (half, half)]
    };

    for (left, right) in passes {
        box_blur_rows(data, &mut scratch, width, height, left, right);
        data.copy_from_slice(&scratch);
    }
    transpose(data, &mut scratch, width, height);
    for (left, right) in passes {
        box_blur_rows(&scratch, data, height, width, left, right);
        scratch.copy_from_slice(data);
    }
    transpose(&scratch, data, height, width);
}

/// Horizontal box blur covering `left` pixels before and `right` after
/// each pixel. Pixels outside the buffer count as transparent.
fn box_blur_rows(src: &[u8], dst: &mut [u8], width: usize, height: usize, left: usize, right: usize) {
    let window = (left + right + 1) as u32;
    for y in 0..height {
        let row = &src[y * width * 4..(y + 1) * width * 4];
        let out = &mut dst[y * width * 4..(y + 1) * width * 4];
        let mut sum = [0u32; 4];
        for x in 0..right.min(width) {
            for c in 0..4 {
                sum[c] += row[x * 4 + c] as u32;
            }
        }
        for x in 0..width {
            let incoming = x + right;
            if incoming < width {
                for c in 0..4 {
                    sum[c] += row[incoming * 4 + c] as u32;
                }
            }
            for c in 0..4 {
                out[x * 4 + c] = ((sum[c] + window / 2) / window) as u8;
            }
            if x >= left {
                let outgoing = x - left;
                for c in 0..4 {
                    sum[c] -= row[outgoing * 4 + c] as u32;
                }
            }
        }
    }
}

fn transpose(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let s = (y * width + x) * 4;
            let d = (x * height + y) * 4;
            dst[d..d + 4].copy_from_slice(&src[s..s + 4]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_size() {
        assert_eq!(box_size(0.0), 0);
        assert_eq!(box_size(1.0), 2);
        assert_eq!(box_size(5.0), 9);
    }

    #[test]
    fn test_uniform_image_unchanged_in_center() {
        let (w, h) = (32, 32);
        let mut data = [10u8, 20, 30, 255].repeat(w * h);
        blur_rgba(&mut data, w, h, 2.0);
        let center = (16 * w + 16) * 4;
        assert_eq!(&data[center..center + 4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_single_pixel_spreads() {
        let (w, h) = (21, 21);
        let mut data = vec![0u8; w * h * 4];
        let center = (10 * w + 10) * 4;
        data[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);
        blur_rgba(&mut data, w, h, 1.0);
        assert!(data[center + 3] < 255);
        let neighbour = (10 * w + 11) * 4;
        assert!(data[neighbour + 3] > 0);
    }
}
