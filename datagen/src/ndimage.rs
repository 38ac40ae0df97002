//! Array operations on `height × width × channels` float images valued 0 to 255.

use crate::common::*;
use image::{
    imageops::{self, FilterType},
    ImageBuffer, Luma, Pixel, Rgb,
};

/// The way padded pixels are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingMode {
    /// Replicate the edge pixels.
    Same,
    Zero,
    /// Mirror without repeating the edge pixels.
    Reflect,
    /// Uniform random integers in `[0, 255)`.
    Rand,
}

impl PaddingMode {
    pub const ALL: [PaddingMode; 4] = [Self::Same, Self::Zero, Self::Reflect, Self::Rand];
}

/// Decode an image file into RGB, or into a single channel if `grayscale` is set.
pub fn load(path: &Path, grayscale: bool) -> Result<Array3<f32>> {
    let image = image::open(path)
        .with_context(|| format!("failed to load image '{}'", path.display()))?;

    let (height, width, channels, raw) = if grayscale {
        let image = image.to_luma8();
        let (width, height) = image.dimensions();
        (height, width, 1, image.into_raw())
    } else {
        let image = image.to_rgb8();
        let (width, height) = image.dimensions();
        (height, width, 3, image.into_raw())
    };

    let array = Array3::from_shape_vec(
        (height as usize, width as usize, channels),
        raw.into_iter().map(f32::from).collect(),
    )?;
    Ok(array)
}

type FloatImage<P> = ImageBuffer<P, Vec<f32>>;

/// The `(offset, scale)` mapping the image values into `[0, 1]`, the range
/// `imageops` clamps float pixels to.
fn unit_range(image: &Array3<f32>) -> (f32, f32) {
    let (min, max) = image
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &value| {
            (min.min(value), max.max(value))
        });
    if max > min {
        (min, max - min)
    } else if min.is_finite() {
        (min, 1.0)
    } else {
        (0.0, 1.0)
    }
}

/// Run `op` on the image viewed as a float pixel buffer of `P`.
fn with_float_buffer<P, F>(image: &Array3<f32>, range: (f32, f32), op: F) -> Result<Array3<f32>>
where
    P: Pixel<Subpixel = f32> + 'static,
    F: FnOnce(&FloatImage<P>) -> FloatImage<P>,
{
    let (height, width, channels) = image.dim();
    let (offset, scale) = range;
    let raw: Vec<f32> = image.iter().map(|&value| (value - offset) / scale).collect();
    let buffer = FloatImage::<P>::from_raw(width as u32, height as u32, raw).ok_or_else(|| {
        format_err!(
            "cannot view an image of shape {:?} as {} channel pixels",
            image.dim(),
            P::CHANNEL_COUNT
        )
    })?;

    let output = op(&buffer);
    let (out_w, out_h) = output.dimensions();
    let array = Array3::from_shape_vec(
        (out_h as usize, out_w as usize, channels),
        output.into_raw(),
    )?
    .mapv_into(|value| value * scale + offset);
    Ok(array)
}

/// Dispatch a float buffer operation on gray or RGB images.
macro_rules! with_pixels {
    ($image:expr, $range:expr, |$buffer:ident| $op:expr) => {{
        let image: &Array3<f32> = $image;
        match image.dim().2 {
            1 => with_float_buffer::<Luma<f32>, _>(image, $range, |$buffer| $op),
            3 => with_float_buffer::<Rgb<f32>, _>(image, $range, |$buffer| $op),
            channels => Err(format_err!("expect 1 or 3 channels, but get {}", channels)),
        }
    }};
}

fn replicate_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

fn reflect_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let index = index.rem_euclid(period);
    if index < len as isize {
        index as usize
    } else {
        (period - index) as usize
    }
}

/// Pad the image by `[left, top, right, bottom]` pixels.
pub fn pad_ltrb<R>(
    image: &Array3<f32>,
    ltrb: [usize; 4],
    mode: PaddingMode,
    rng: &mut R,
) -> Result<Array3<f32>>
where
    R: Rng + ?Sized,
{
    let [left, top, right, bottom] = ltrb;
    let (height, width, channels) = image.dim();
    ensure!(
        height > 0 && width > 0,
        "cannot pad an empty image of shape {:?}",
        image.dim()
    );

    let mut output = Array3::zeros((height + top + bottom, width + left + right, channels));
    output
        .indexed_iter_mut()
        .for_each(|((y, x, channel), value)| {
            let src_y = y as isize - top as isize;
            let src_x = x as isize - left as isize;
            let inside = (0..height as isize).contains(&src_y) && (0..width as isize).contains(&src_x);

            *value = if inside {
                image[[src_y as usize, src_x as usize, channel]]
            } else {
                match mode {
                    PaddingMode::Same => image[[
                        replicate_index(src_y, height),
                        replicate_index(src_x, width),
                        channel,
                    ]],
                    PaddingMode::Reflect => image[[
                        reflect_index(src_y, height),
                        reflect_index(src_x, width),
                        channel,
                    ]],
                    PaddingMode::Zero => 0.0,
                    PaddingMode::Rand => rng.gen_range(0..255) as f32,
                }
            };
        });

    Ok(output)
}

/// Pad the image to `height × width`, centered, with the odd pixel on the right and bottom.
pub fn pad<R>(
    image: &Array3<f32>,
    height: usize,
    width: usize,
    mode: PaddingMode,
    rng: &mut R,
) -> Result<Array3<f32>>
where
    R: Rng + ?Sized,
{
    let (orig_h, orig_w, _) = image.dim();
    ensure!(
        height >= orig_h && width >= orig_w,
        "cannot pad an image of size {}x{} to a smaller size {}x{}",
        orig_h,
        orig_w,
        height,
        width
    );

    let left = (width - orig_w) / 2;
    let top = (height - orig_h) / 2;
    let right = width - orig_w - left;
    let bottom = height - orig_h - top;
    pad_ltrb(image, [left, top, right, bottom], mode, rng)
}

pub fn crop(
    image: &Array3<f32>,
    top: usize,
    left: usize,
    height: usize,
    width: usize,
) -> Result<Array3<f32>> {
    let (orig_h, orig_w, _) = image.dim();
    ensure!(
        top + height <= orig_h && left + width <= orig_w,
        "the crop (t={}, l={}, h={}, w={}) exceeds the image size {}x{}",
        top,
        left,
        height,
        width,
        orig_h,
        orig_w
    );
    Ok(image
        .slice(s![top..(top + height), left..(left + width), ..])
        .to_owned())
}

pub fn flip_lr(image: &Array3<f32>) -> Array3<f32> {
    image.slice(s![.., ..;-1, ..]).to_owned()
}

pub fn flip_tb(image: &Array3<f32>) -> Array3<f32> {
    image.slice(s![..;-1, .., ..]).to_owned()
}

/// Rotate counter-clockwise by `k` quarter turns.
pub fn rot90(image: &Array3<f32>, k: usize) -> Array3<f32> {
    let mut view = image.view();
    match k % 4 {
        0 => {}
        1 => {
            view.swap_axes(0, 1);
            view.invert_axis(Axis(0));
        }
        2 => {
            view.invert_axis(Axis(0));
            view.invert_axis(Axis(1));
        }
        _ => {
            view.swap_axes(0, 1);
            view.invert_axis(Axis(1));
        }
    }
    view.as_standard_layout().into_owned()
}

/// Bilinear resize to `height × width`.
pub fn resize(image: &Array3<f32>, height: usize, width: usize) -> Result<Array3<f32>> {
    ensure!(
        height > 0 && width > 0,
        "the target size {}x{} must be positive",
        height,
        width
    );
    let (orig_h, orig_w, _) = image.dim();
    ensure!(orig_h > 0 && orig_w > 0, "cannot resize an empty image");

    if (orig_h, orig_w) == (height, width) {
        return Ok(image.clone());
    }

    with_pixels!(image, unit_range(image), |buffer| imageops::resize(
        buffer,
        width as u32,
        height as u32,
        FilterType::Triangle
    ))
}

/// Resize keeping the aspect ratio, then pad to `height × width`.
pub fn resize_letterbox<R>(
    image: &Array3<f32>,
    height: usize,
    width: usize,
    mode: PaddingMode,
    rng: &mut R,
) -> Result<Array3<f32>>
where
    R: Rng + ?Sized,
{
    let (orig_h, orig_w, _) = image.dim();
    ensure!(orig_h > 0 && orig_w > 0, "cannot resize an empty image");
    ensure!(
        height > 0 && width > 0,
        "the target size {}x{} must be positive",
        height,
        width
    );

    let [_, _, resized_h, resized_w] = letterbox_layout([orig_h, orig_w], [height, width]);
    let resized = resize(image, resized_h, resized_w)?;
    pad(&resized, height, width, mode, rng)
}

/// The `[top, left, height, width]` of the resized content within a letterboxed image.
pub fn letterbox_layout(orig_hw: [usize; 2], target_hw: [usize; 2]) -> [usize; 4] {
    let [orig_h, orig_w] = orig_hw;
    let [height, width] = target_hw;

    let rate = (height as f64 / orig_h as f64).min(width as f64 / orig_w as f64);
    let resized_h = ((orig_h as f64 * rate) as usize).clamp(1, height);
    let resized_w = ((orig_w as f64 * rate) as usize).clamp(1, width);
    let top = (height - resized_h) / 2;
    let left = (width - resized_w) / 2;

    [top, left, resized_h, resized_w]
}

/// Rotate counter-clockwise by `degrees` about the center. Uncovered pixels are zero.
pub fn rotate(image: &Array3<f32>, degrees: f64) -> Result<Array3<f32>> {
    let (height, width, _) = image.dim();
    let center_y = (height / 2) as f32;
    let center_x = (width / 2) as f32;
    let (sin, cos) = {
        let (sin, cos) = degrees.to_radians().sin_cos();
        (sin as f32, cos as f32)
    };

    with_pixels!(image, (0.0, 1.0), |buffer| {
        let mut output = ImageBuffer::new(buffer.width(), buffer.height());
        output.enumerate_pixels_mut().for_each(|(x, y, pixel)| {
            let dy = y as f32 - center_y;
            let dx = x as f32 - center_x;
            let src_x = cos * dx - sin * dy + center_x;
            let src_y = sin * dx + cos * dy + center_y;
            if let Some(value) = imageops::interpolate_bilinear(buffer, src_x, src_y) {
                *pixel = value;
            }
        });
        output
    })
}

/// Gaussian blur. A non-positive `sigma` falls back to 1.1.
pub fn gaussian_blur(image: &Array3<f32>, sigma: f64) -> Result<Array3<f32>> {
    let sigma = if sigma > 0.0 { sigma as f32 } else { 1.1 };
    with_pixels!(image, unit_range(image), |buffer| imageops::blur(
        buffer, sigma
    ))
}

pub fn unsharp_mask(image: &Array3<f32>, sigma: f64, alpha: f64) -> Result<Array3<f32>> {
    let blurred = gaussian_blur(image, sigma)?;
    let detail = image - &blurred;
    Ok(image + &(detail * alpha as f32))
}

/// Median filter over a `size × size` window of 8-bit values.
pub fn median(image: &Array3<f32>, size: usize) -> Result<Array3<f32>> {
    ensure!(
        size % 2 == 1,
        "the median window size must be odd, but get {}",
        size
    );
    let radius = (size / 2) as u32;
    match image.dim().2 {
        1 => median_by::<Luma<u8>>(image, radius),
        3 => median_by::<Rgb<u8>>(image, radius),
        channels => bail!("expect 1 or 3 channels, but get {}", channels),
    }
}

fn median_by<P>(image: &Array3<f32>, radius: u32) -> Result<Array3<f32>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (height, width, channels) = image.dim();
    let raw: Vec<u8> = image
        .iter()
        .map(|&value| value.round().clamp(0.0, 255.0) as u8)
        .collect();
    let buffer = ImageBuffer::<P, Vec<u8>>::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| format_err!("cannot view an image of shape {:?}", image.dim()))?;

    let filtered = imageproc::filter::median_filter(&buffer, radius, radius);
    let array = Array3::from_shape_vec(
        (height, width, channels),
        filtered.into_raw().into_iter().map(f32::from).collect(),
    )?;
    Ok(array)
}

/// Add zero-mean Gaussian noise with standard deviation `scale`.
pub fn gaussian_noise<R>(image: &Array3<f32>, rng: &mut R, scale: f64) -> Result<Array3<f32>>
where
    R: Rng + ?Sized,
{
    let normal = Normal::new(0.0, scale)?;
    Ok(image.mapv(|value| value + normal.sample(rng) as f32))
}

pub fn brightness(image: &Array3<f32>, beta: f64) -> Array3<f32> {
    let beta = beta as f32;
    image.mapv(|value| value + beta)
}

pub fn contrast(image: &Array3<f32>, alpha: f64) -> Array3<f32> {
    let alpha = alpha as f32;
    image.mapv(|value| value * alpha)
}

/// Blend each pixel with its gray level.
pub fn saturation(image: &Array3<f32>, alpha: f64) -> Result<Array3<f32>> {
    let gray = to_grayscale(image)?;
    let alpha = alpha as f32;
    let output = Array3::from_shape_fn(image.dim(), |(y, x, channel)| {
        image[[y, x, channel]] * alpha + (1.0 - alpha) * gray[[y, x]]
    });
    Ok(output)
}

/// A light hue change, scaling and shifting each RGB channel.
///
/// The scales are normalized by their harmonic mean and the shifts by their mean.
pub fn hue_lite(image: &Array3<f32>, alpha: [f64; 3], beta: [f64; 3]) -> Result<Array3<f32>> {
    ensure!(
        image.dim().2 == 3,
        "expect an RGB image, but get {} channels",
        image.dim().2
    );
    ensure!(
        alpha.iter().all(|&scale| scale > 0.0),
        "channel scales must be positive, but get {:?}",
        alpha
    );

    let harmonic_mean = 3.0 / alpha.iter().map(|scale| 1.0 / scale).sum::<f64>();
    let beta_mean = beta.iter().sum::<f64>() / 3.0;
    let scales = alpha.map(|scale| (scale / harmonic_mean) as f32);
    let shifts = beta.map(|shift| (shift - beta_mean) as f32);

    let output = Array3::from_shape_fn(image.dim(), |(y, x, channel)| {
        image[[y, x, channel]] * scales[channel] + shifts[channel]
    });
    Ok(output)
}

/// The gray level of each pixel, using the ITU-R 601 luma weights.
pub fn to_grayscale(image: &Array3<f32>) -> Result<Array2<f32>> {
    match image.dim().2 {
        3 => {
            let weights = [0.299, 0.587, 0.114];
            Ok(Array2::from_shape_fn(
                (image.dim().0, image.dim().1),
                |(y, x)| {
                    izip!(0..3, weights)
                        .map(|(channel, weight)| image[[y, x, channel]] * weight)
                        .sum()
                },
            ))
        }
        1 => Ok(image.index_axis(Axis(2), 0).to_owned()),
        channels => bail!("expect 1 or 3 channels, but get {}", channels),
    }
}

/// Standardize by the sample statistics, then map into the 0 to 255 range.
pub fn standardize(image: &Array3<f32>) -> Array3<f32> {
    let mean = image.mean().unwrap_or(0.0);
    let std = image.std(0.0).max(1e-5);
    image.mapv(|value| ((value - mean) / std * 64.0 + 127.5).clamp(0.0, 255.0))
}

/// Map values `>= threshold` to 255 and the others to 0.
pub fn binarize(image: &Array3<f32>, threshold: f64) -> Array3<f32> {
    let threshold = threshold as f32;
    image.mapv(|value| if value >= threshold { 255.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ramp(height: usize, width: usize) -> Array3<f32> {
        Array3::from_shape_fn((height, width, 1), |(y, x, _)| (y * width + x) as f32)
    }

    #[test]
    fn flip_and_rot90() {
        let image = ramp(2, 3);
        assert_eq!(flip_lr(&image)[[0, 0, 0]], 2.0);
        assert_eq!(flip_tb(&image)[[0, 0, 0]], 3.0);

        // counter-clockwise: the top right corner moves to the top left
        let rotated = rot90(&image, 1);
        assert_eq!(rotated.dim(), (3, 2, 1));
        assert_eq!(rotated[[0, 0, 0]], 2.0);
        assert_eq!(rotated[[2, 1, 0]], 3.0);

        assert_eq!(rot90(&image, 2), flip_lr(&flip_tb(&image)));
        assert_eq!(rot90(&rot90(&image, 1), 3), image);
    }

    #[test]
    fn pad_modes() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = Array3::from_shape_vec((1, 3, 1), vec![1.0, 2.0, 3.0]).unwrap();

        let same = pad_ltrb(&image, [2, 0, 2, 0], PaddingMode::Same, &mut rng).unwrap();
        assert_eq!(same.iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);

        let reflect = pad_ltrb(&image, [2, 0, 2, 0], PaddingMode::Reflect, &mut rng).unwrap();
        assert_eq!(
            reflect.iter().copied().collect::<Vec<_>>(),
            vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]
        );

        let zero = pad(&image, 2, 4, PaddingMode::Zero, &mut rng).unwrap();
        assert_eq!(zero.dim(), (2, 4, 1));
        assert_eq!(zero.slice(s![0, .., 0]).to_vec(), vec![1.0, 2.0, 3.0, 0.0]);
        assert!(zero.slice(s![1, .., 0]).iter().all(|&val| val == 0.0));

        let rand = pad(&image, 3, 5, PaddingMode::Rand, &mut rng).unwrap();
        assert!(rand.iter().all(|&val| (0.0..255.0).contains(&val)));

        assert!(pad(&image, 1, 2, PaddingMode::Zero, &mut rng).is_err());
    }

    #[test]
    fn crop_bounds() {
        let image = ramp(4, 4);
        let cropped = crop(&image, 1, 2, 2, 2).unwrap();
        assert_eq!(cropped[[0, 0, 0]], 6.0);
        assert!(crop(&image, 3, 0, 2, 2).is_err());
    }

    #[test]
    fn resize_constant_and_identity() {
        let image = Array3::from_elem((3, 5, 3), 42.0);
        let resized = resize(&image, 7, 2).unwrap();
        assert_eq!(resized.dim(), (7, 2, 3));
        resized
            .iter()
            .for_each(|&val| assert_abs_diff_eq!(val, 42.0, epsilon = 1e-4));

        let image = ramp(4, 4);
        assert_eq!(resize(&image, 4, 4).unwrap(), image);
    }

    #[test]
    fn resize_keeps_value_range() {
        let image = ramp(4, 4).mapv(|val| val * 10.0 - 20.0);
        let resized = resize(&image, 2, 2).unwrap();
        assert_eq!(resized.dim(), (2, 2, 1));
        assert!(resized.iter().all(|&val| (-20.0..=130.0).contains(&val)));
        assert_abs_diff_eq!(resized.mean().unwrap(), image.mean().unwrap(), epsilon = 1e-2);
        assert!(resize(&Array3::zeros((2, 2, 4)), 4, 4).is_err());
    }

    #[test]
    fn resize_letterbox_pads() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = Array3::from_elem((2, 4, 1), 9.0);
        let boxed = resize_letterbox(&image, 8, 8, PaddingMode::Zero, &mut rng).unwrap();
        assert_eq!(boxed.dim(), (8, 8, 1));
        assert_eq!(boxed[[0, 0, 0]], 0.0);
        assert_abs_diff_eq!(boxed[[4, 4, 0]], 9.0, epsilon = 1e-4);
    }

    #[test]
    fn rotate_zero_is_identity() {
        let image = ramp(5, 4);
        assert_eq!(rotate(&image, 0.0).unwrap(), image);
    }

    #[test]
    fn rotate_quarter_turn_matches_rot90() {
        let image = ramp(5, 5);
        let rotated = rotate(&image, 90.0).unwrap();
        let expect = rot90(&image, 1);
        izip!(
            rotated.slice(s![1..4, 1..4, ..]).iter(),
            expect.slice(s![1..4, 1..4, ..]).iter()
        )
        .for_each(|(&lhs, &rhs)| assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-3));
    }

    #[test]
    fn filters_on_constant_image() {
        let image = Array3::from_elem((6, 6, 3), 100.0);
        gaussian_blur(&image, 0.0)
            .unwrap()
            .iter()
            .for_each(|&val| assert_abs_diff_eq!(val, 100.0, epsilon = 1e-3));
        unsharp_mask(&image, 0.5, 2.0)
            .unwrap()
            .iter()
            .for_each(|&val| assert_abs_diff_eq!(val, 100.0, epsilon = 1e-3));
    }

    #[test]
    fn median_removes_spike() {
        let mut image = Array3::zeros((5, 5, 1));
        image[[2, 2, 0]] = 255.0;
        let filtered = median(&image, 3).unwrap();
        assert!(filtered.iter().all(|&val| val == 0.0));
        assert!(median(&image, 2).is_err());
    }

    #[test]
    fn color_operations() {
        let image = Array3::from_shape_vec((1, 1, 3), vec![10.0, 20.0, 30.0]).unwrap();

        let gray = to_grayscale(&image).unwrap();
        assert_abs_diff_eq!(gray[[0, 0]], 10.0 * 0.299 + 20.0 * 0.587 + 30.0 * 0.114, epsilon = 1e-4);

        let desaturated = saturation(&image, 0.0).unwrap();
        desaturated
            .iter()
            .for_each(|&val| assert_abs_diff_eq!(val, gray[[0, 0]], epsilon = 1e-4));

        let same = hue_lite(&image, [1.0; 3], [5.0; 3]).unwrap();
        assert_eq!(same, image);

        let binary = binarize(&image, 20.0);
        assert_eq!(binary.iter().copied().collect::<Vec<_>>(), vec![0.0, 255.0, 255.0]);
    }

    #[test]
    fn standardize_range() {
        let image = ramp(8, 8);
        let standardized = standardize(&image);
        assert!(standardized.iter().all(|&val| (0.0..=255.0).contains(&val)));
        assert_abs_diff_eq!(standardized.mean().unwrap(), 127.5, epsilon = 1e-3);

        let flat = standardize(&Array3::from_elem((2, 2, 1), 7.0));
        assert!(flat.iter().all(|&val| val == 127.5));
    }
}
