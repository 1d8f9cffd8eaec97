//! Image-to-tensor preprocessing
//!
//! Converts a decoded image into the fixed-size f32 tensor a detection model
//! expects, recording the resize and padding metadata the decoder needs to
//! map box coordinates back into original-image space. The input image is
//! never mutated; a private resized copy is made.

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;

use crate::error::ScanError;

/// How the image is fitted into the model's input resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Non-uniform scale to exactly fill the target dimensions.
    Stretch,
    /// Uniform scale preserving aspect ratio, remainder filled with padding.
    Letterbox { anchor: PadAnchor },
}

/// Where the image content sits inside a letterboxed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadAnchor {
    /// Content at the top-left, padding on the right/bottom. Keeps the
    /// decoder's `(original + pad) / resized` inverse mapping exact.
    TopLeft,
    /// Content centered, padding split evenly on both sides.
    Center,
}

/// Per-channel value transform applied to each pixel component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PixelTransform {
    Identity,
    /// Map `[0, 255]` to `[0, 1]`.
    Div255,
    /// `(x - mean) / std`.
    MeanStd { mean: f32, std: f32 },
}

impl PixelTransform {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            PixelTransform::Identity => x,
            PixelTransform::Div255 => x / 255.0,
            PixelTransform::MeanStd { mean, std } => (x - mean) / std,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Memory ordering of the color-channel axis in the output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// Channel-last `[1, H, W, 3]`.
    Nhwc,
    /// Channel-first `[1, 3, H, W]`.
    Nchw,
}

/// Preprocessing options for one model.
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub target_width: u32,
    pub target_height: u32,
    pub resize_mode: ResizeMode,
    /// Shared transform, used for any channel without an override.
    pub transform: PixelTransform,
    /// Optional `[R, G, B]` overrides.
    pub channel_transforms: [Option<PixelTransform>; 3],
    pub channel_order: ChannelOrder,
    pub layout: TensorLayout,
    /// Letterbox fill color.
    pub pad_fill: [u8; 3],
}

/// Resize/padding metadata. Must travel with the tensor it was derived from;
/// the decoder relies on the pair being consistent.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessMeta {
    /// Effective per-axis scale from original to resized content.
    pub scale_x: f32,
    pub scale_y: f32,
    /// Total letterbox padding per axis, expressed in original-image pixel
    /// units so that `(original + pad) / resized` inverts the resize exactly.
    pub pad_x: f32,
    pub pad_y: f32,
    pub original_width: u32,
    pub original_height: u32,
    pub resized_width: u32,
    pub resized_height: u32,
}

/// A model-ready input tensor plus the metadata needed to decode outputs.
pub struct PreprocessedImage {
    pub tensor: Array4<f32>,
    pub meta: PreprocessMeta,
}

/// Convert a decoded image into a model input tensor.
pub fn preprocess(
    image: &DynamicImage,
    opts: &PreprocessOptions,
) -> Result<PreprocessedImage, ScanError> {
    let (orig_w, orig_h) = image.dimensions();
    if orig_w == 0 || orig_h == 0 {
        return Err(ScanError::EmptyImage {
            width: orig_w,
            height: orig_h,
        });
    }

    let (tw, th) = (opts.target_width, opts.target_height);
    let (canvas, meta) = match opts.resize_mode {
        ResizeMode::Stretch => {
            let canvas = image.resize_exact(tw, th, FilterType::CatmullRom).to_rgb8();
            let meta = PreprocessMeta {
                scale_x: tw as f32 / orig_w as f32,
                scale_y: th as f32 / orig_h as f32,
                pad_x: 0.0,
                pad_y: 0.0,
                original_width: orig_w,
                original_height: orig_h,
                resized_width: tw,
                resized_height: th,
            };
            (canvas, meta)
        }
        ResizeMode::Letterbox { anchor } => {
            let scale = f32::min(tw as f32 / orig_w as f32, th as f32 / orig_h as f32);
            let new_w = ((orig_w as f32 * scale) as u32).clamp(1, tw);
            let new_h = ((orig_h as f32 * scale) as u32).clamp(1, th);
            let resized = image.resize_exact(new_w, new_h, FilterType::CatmullRom).to_rgb8();

            let mut canvas = ImageBuffer::from_pixel(tw, th, Rgb(opts.pad_fill));
            let (off_x, off_y) = match anchor {
                PadAnchor::TopLeft => (0, 0),
                PadAnchor::Center => ((tw - new_w) / 2, (th - new_h) / 2),
            };
            for (x, y, px) in resized.enumerate_pixels() {
                canvas.put_pixel(x + off_x, y + off_y, *px);
            }

            let meta = PreprocessMeta {
                scale_x: scale,
                scale_y: scale,
                pad_x: tw as f32 / scale - orig_w as f32,
                pad_y: th as f32 / scale - orig_h as f32,
                original_width: orig_w,
                original_height: orig_h,
                resized_width: tw,
                resized_height: th,
            };
            (canvas, meta)
        }
    };

    Ok(PreprocessedImage {
        tensor: to_tensor(&canvas, opts),
        meta,
    })
}

/// Scatter each pixel's channel values to their flattened offsets for the
/// chosen layout and channel order.
fn to_tensor(canvas: &ImageBuffer<Rgb<u8>, Vec<u8>>, opts: &PreprocessOptions) -> Array4<f32> {
    let (w, h) = canvas.dimensions();
    let (w, h) = (w as usize, h as usize);
    let mut tensor = match opts.layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
    };

    let transform = |channel: usize, value: f32| {
        opts.channel_transforms[channel]
            .unwrap_or(opts.transform)
            .apply(value)
    };

    for (x, y, px) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let r = transform(0, px[0] as f32);
        let g = transform(1, px[1] as f32);
        let b = transform(2, px[2] as f32);
        let (c0, c2) = match opts.channel_order {
            ChannelOrder::Rgb => (r, b),
            ChannelOrder::Bgr => (b, r),
        };
        match opts.layout {
            TensorLayout::Nhwc => {
                tensor[[0, y, x, 0]] = c0;
                tensor[[0, y, x, 1]] = g;
                tensor[[0, y, x, 2]] = c2;
            }
            TensorLayout::Nchw => {
                tensor[[0, 0, y, x]] = c0;
                tensor[[0, 1, y, x]] = g;
                tensor[[0, 2, y, x]] = c2;
            }
        }
    }

    tensor
}
