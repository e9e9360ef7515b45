//! Photo-frame compositing.
//!
//! A [`FrameTemplate`] is a decoded-on-demand image asset whose natural size
//! becomes the output canvas. The photo is fitted into the template's
//! placement area, scaled and offset per [`CompositeParameters`], clipped to
//! the area, optionally mirrored, and drawn over the template.
//!
//! Two call sites exist in the kiosk and they deliberately do not share
//! constants; see [`FramePreset`].

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::encode::{self, OutputFormat};
use crate::error::ImagingError;
use crate::geometry::{self, Rect};

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Region of the template that receives the photo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementArea {
    /// Margins and size as fractions of the template's width/height.
    Fractional {
        left: f64,
        top: f64,
        width: f64,
        height: f64,
    },
    /// Equal border on every side, sized as a fraction of the template's
    /// shorter side.
    UniformBorder { fraction_of_short_side: f64 },
}

impl PlacementArea {
    /// Practically the whole template (0.01% margin).
    pub const NEAR_FULL_BLEED: Self = Self::Fractional {
        left: 0.0001,
        top: 0.0001,
        width: 0.9999,
        height: 0.9999,
    };

    /// 2% border of the short side.
    pub const PORTRAIT_BORDER: Self = Self::UniformBorder {
        fraction_of_short_side: 0.02,
    };

    /// Resolve to pixels for a canvas of the given size.
    pub fn resolve(&self, canvas_width: f64, canvas_height: f64) -> Rect {
        match *self {
            Self::Fractional {
                left,
                top,
                width,
                height,
            } => Rect::new(
                canvas_width * left,
                canvas_height * top,
                canvas_width * width,
                canvas_height * height,
            ),
            Self::UniformBorder {
                fraction_of_short_side,
            } => {
                let border = canvas_width.min(canvas_height) * fraction_of_short_side;
                Rect::new(
                    border,
                    border,
                    canvas_width - border * 2.0,
                    canvas_height - border * 2.0,
                )
            }
        }
    }
}

/// Encoded frame asset plus its placement area. Read-only once built.
#[derive(Debug, Clone)]
pub struct FrameTemplate {
    bytes: Vec<u8>,
    area: PlacementArea,
}

impl FrameTemplate {
    pub fn new(bytes: Vec<u8>, area: PlacementArea) -> Self {
        Self { bytes, area }
    }

    /// Read the asset from disk. Decoding is deferred to [`compose`].
    pub fn from_path(path: impl AsRef<Path>, area: PlacementArea) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?, area))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn area(&self) -> PlacementArea {
        self.area
    }

    /// Same asset, different placement area.
    pub fn with_area(&self, area: PlacementArea) -> Self {
        Self {
            bytes: self.bytes.clone(),
            area,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How the photo's aspect ratio is reconciled with the placement area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Fit entirely inside the area; margins on one axis.
    #[default]
    Contain,
    /// Fill the area; overflow on one axis is clipped.
    Cover,
}

/// Per-call compositing options.
///
/// `x_axis_scale` multiplies the fitted box's *height* and `y_axis_scale`
/// its *width*. The naming is inherited from the kiosk's tuning values and
/// the mapping is kept so those values keep producing the same layout.
/// Scales apply to the fitted box, can exceed the area, and are not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParameters {
    pub x_axis_scale: f64,
    pub y_axis_scale: f64,
    /// Pixels, applied after re-centring.
    pub x_offset: f64,
    pub y_offset: f64,
    /// Mirror the photo inside its placed rectangle.
    pub flip_horizontal: bool,
    /// Encoder quality in `[0.1, 1.0]`.
    pub quality: f32,
    pub format: OutputFormat,
    pub fit: FitMode,
}

impl Default for CompositeParameters {
    fn default() -> Self {
        Self {
            x_axis_scale: 1.0,
            y_axis_scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
            flip_horizontal: false,
            quality: 0.85,
            format: OutputFormat::Jpeg,
            fit: FitMode::Contain,
        }
    }
}

impl CompositeParameters {
    /// Framing applied to a captured model photo before try-on submission.
    pub fn try_on_capture() -> Self {
        Self {
            x_axis_scale: 2.5,
            y_axis_scale: 2.8,
            flip_horizontal: true,
            quality: 0.9,
            ..Self::default()
        }
    }

    /// Framing used for portrait prints of an uploaded photo.
    pub fn portrait_frame() -> Self {
        Self {
            x_axis_scale: 0.7,
            y_axis_scale: 0.7,
            fit: FitMode::Cover,
            quality: 0.85,
            ..Self::default()
        }
    }
}

/// The two framing configurations used by the kiosk, each pairing its own
/// parameters with its own placement area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePreset {
    TryOnCapture,
    Portrait,
}

impl FramePreset {
    pub fn parameters(self) -> CompositeParameters {
        match self {
            Self::TryOnCapture => CompositeParameters::try_on_capture(),
            Self::Portrait => CompositeParameters::portrait_frame(),
        }
    }

    pub fn area(self) -> PlacementArea {
        match self {
            Self::TryOnCapture => PlacementArea::NEAR_FULL_BLEED,
            Self::Portrait => PlacementArea::PORTRAIT_BORDER,
        }
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Where the photo lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Clip region (the resolved placement area).
    pub clip: Rect,
    /// Destination of the whole photo; may extend past `clip`.
    pub draw: Rect,
}

/// Pure layout step: fit, scale about the area's centre, then offset.
pub fn place(
    canvas_width: u32,
    canvas_height: u32,
    area: &PlacementArea,
    src_width: u32,
    src_height: u32,
    params: &CompositeParameters,
) -> Placement {
    let clip = area.resolve(canvas_width as f64, canvas_height as f64);
    let fitted = match params.fit {
        FitMode::Contain => geometry::contain(&clip, src_width as f64, src_height as f64),
        FitMode::Cover => geometry::cover(&clip, src_width as f64, src_height as f64),
    };

    let width = fitted.width * params.y_axis_scale;
    let height = fitted.height * params.x_axis_scale;
    let draw = Rect::new(
        clip.x + (clip.width - width) / 2.0 + params.x_offset,
        clip.y + (clip.height - height) / 2.0 + params.y_offset,
        width,
        height,
    );

    Placement { clip, draw }
}

// ---------------------------------------------------------------------------
// Compose
// ---------------------------------------------------------------------------

/// Draw `source` into `template` and encode the canvas.
///
/// Fails with [`ImagingError::Load`] if either input does not decode; no
/// partial output is produced.
pub fn compose(
    template: &FrameTemplate,
    source: &[u8],
    params: &CompositeParameters,
) -> Result<Vec<u8>, ImagingError> {
    let mut canvas = image::load_from_memory(template.bytes())
        .map_err(|source| ImagingError::Load {
            what: "photo frame",
            source,
        })?
        .to_rgba8();
    let photo = image::load_from_memory(source)
        .map_err(|source| ImagingError::Load {
            what: "captured image",
            source,
        })?
        .to_rgba8();

    if photo.width() == 0 || photo.height() == 0 {
        return Err(ImagingError::Empty {
            width: photo.width(),
            height: photo.height(),
        });
    }

    let placement = place(
        canvas.width(),
        canvas.height(),
        &template.area(),
        photo.width(),
        photo.height(),
        params,
    );
    tracing::debug!(
        canvas_width = canvas.width(),
        canvas_height = canvas.height(),
        draw_x = placement.draw.x,
        draw_y = placement.draw.y,
        draw_width = placement.draw.width,
        draw_height = placement.draw.height,
        flip = params.flip_horizontal,
        "Compositing photo into frame"
    );

    draw_clipped(&mut canvas, &photo, &placement, params.flip_horizontal);
    encode::encode(&canvas, params.format, params.quality)
}

/// Resample `photo` into `placement.draw`, writing only pixels whose centre
/// lies inside both the clip and the canvas.
fn draw_clipped(canvas: &mut RgbaImage, photo: &RgbaImage, placement: &Placement, flip: bool) {
    let bounds = Rect::new(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
    let visible = placement.draw.intersect(&placement.clip).intersect(&bounds);
    if visible.is_empty() || placement.draw.is_empty() {
        return;
    }

    // Bilinear sampling aliases badly on large reductions; shrink first.
    let draw = placement.draw;
    let target_w = (draw.width.ceil() as u32).clamp(1, photo.width());
    let target_h = (draw.height.ceil() as u32).clamp(1, photo.height());
    let reduced;
    let src = if target_w < photo.width() || target_h < photo.height() {
        reduced = imageops::resize(photo, target_w, target_h, FilterType::Triangle);
        &reduced
    } else {
        photo
    };
    let (sw, sh) = (src.width() as f64, src.height() as f64);

    let x0 = visible.x.floor() as u32;
    let y0 = visible.y.floor() as u32;
    let x1 = (visible.right().ceil() as u32).min(canvas.width());
    let y1 = (visible.bottom().ceil() as u32).min(canvas.height());

    for y in y0..y1 {
        let cy = y as f64 + 0.5;
        for x in x0..x1 {
            let cx = x as f64 + 0.5;
            if !visible.contains(cx, cy) {
                continue;
            }
            let mut u = (cx - draw.x) / draw.width;
            let v = (cy - draw.y) / draw.height;
            if flip {
                u = 1.0 - u;
            }
            let sample = sample_bilinear(src, u * sw - 0.5, v * sh - 0.5);
            blend_over(canvas.get_pixel_mut(x, y), sample);
        }
    }
}

fn sample_bilinear(src: &RgbaImage, fx: f64, fy: f64) -> [f64; 4] {
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let x0f = fx.floor();
    let y0f = fy.floor();
    let tx = fx - x0f;
    let ty = fy - y0f;
    let clamp_x = |v: i64| v.clamp(0, max_x) as u32;
    let clamp_y = |v: i64| v.clamp(0, max_y) as u32;
    let (xa, xb) = (clamp_x(x0f as i64), clamp_x(x0f as i64 + 1));
    let (ya, yb) = (clamp_y(y0f as i64), clamp_y(y0f as i64 + 1));

    let p00 = src.get_pixel(xa, ya).0;
    let p10 = src.get_pixel(xb, ya).0;
    let p01 = src.get_pixel(xa, yb).0;
    let p11 = src.get_pixel(xb, yb).0;

    let mut out = [0.0; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - tx) + p10[c] as f64 * tx;
        let bottom = p01[c] as f64 * (1.0 - tx) + p11[c] as f64 * tx;
        out[c] = top * (1.0 - ty) + bottom * ty;
    }
    out
}

/// Source-over alpha blending on straight (non-premultiplied) RGBA.
fn blend_over(dst: &mut image::Rgba<u8>, src: [f64; 4]) {
    let sa = src[3] / 255.0;
    if sa >= 1.0 {
        for c in 0..3 {
            dst.0[c] = src[c].round().clamp(0.0, 255.0) as u8;
        }
        dst.0[3] = 255;
        return;
    }
    let da = dst.0[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        dst.0 = [0, 0, 0, 0];
        return;
    }
    for c in 0..3 {
        let value = (src[c] * sa + dst.0[c] as f64 * da * (1.0 - sa)) / out_a;
        dst.0[c] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use image::{ImageFormat, Rgba};

    use super::*;

    const EPS: f64 = 1e-6;

    fn png(img: &RgbaImage) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn full_area() -> PlacementArea {
        PlacementArea::Fractional {
            left: 0.0,
            top: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }

    fn approx(a: Rect, b: Rect) {
        assert!((a.x - b.x).abs() < EPS, "x {} != {}", a.x, b.x);
        assert!((a.y - b.y).abs() < EPS, "y {} != {}", a.y, b.y);
        assert!((a.width - b.width).abs() < EPS, "w {} != {}", a.width, b.width);
        assert!((a.height - b.height).abs() < EPS, "h {} != {}", a.height, b.height);
    }

    #[test]
    fn uniform_border_uses_short_side() {
        let area = PlacementArea::PORTRAIT_BORDER.resolve(1000.0, 2000.0);
        approx(area, Rect::new(20.0, 20.0, 960.0, 1960.0));
    }

    #[test]
    fn contain_fits_wide_photo_by_width() {
        let params = CompositeParameters::default();
        let p = place(100, 200, &full_area(), 200, 100, &params);
        approx(p.draw, Rect::new(0.0, 75.0, 100.0, 50.0));
    }

    #[test]
    fn scale_is_applied_to_fitted_box_with_swapped_axes() {
        let params = CompositeParameters {
            x_axis_scale: 2.0,
            y_axis_scale: 3.0,
            ..CompositeParameters::default()
        };
        // Fitted box is 100x50 centred at (50, 100).
        let p = place(100, 200, &full_area(), 200, 100, &params);
        approx(p.draw, Rect::new(-100.0, 50.0, 300.0, 100.0));
    }

    #[test]
    fn offsets_are_added_after_recentring_without_clamping() {
        let params = CompositeParameters {
            x_offset: 500.0,
            y_offset: -10.0,
            ..CompositeParameters::default()
        };
        let p = place(100, 100, &full_area(), 100, 100, &params);
        approx(p.draw, Rect::new(500.0, -10.0, 100.0, 100.0));
    }

    #[test]
    fn portrait_preset_covers_then_shrinks() {
        let params = CompositeParameters::portrait_frame();
        let p = place(1000, 1000, &PlacementArea::PORTRAIT_BORDER, 100, 200, &params);
        // Cover of 960x960 by a 1:2 photo is 960x1920, then 70%.
        approx(p.draw, Rect::new(20.0 + (960.0 - 672.0) / 2.0, 20.0 + (960.0 - 1344.0) / 2.0, 672.0, 1344.0));
    }

    #[test]
    fn presets_keep_their_own_constants() {
        let try_on = FramePreset::TryOnCapture.parameters();
        assert_eq!(try_on.x_axis_scale, 2.5);
        assert_eq!(try_on.y_axis_scale, 2.8);
        assert!(try_on.flip_horizontal);
        assert_eq!(FramePreset::TryOnCapture.area(), PlacementArea::NEAR_FULL_BLEED);

        let portrait = FramePreset::Portrait.parameters();
        assert_eq!(portrait.fit, FitMode::Cover);
        assert!(!portrait.flip_horizontal);
        assert_eq!(FramePreset::Portrait.area(), PlacementArea::PORTRAIT_BORDER);
    }

    #[test]
    fn bad_template_is_a_load_error() {
        let template = FrameTemplate::new(b"not an image".to_vec(), full_area());
        let photo = png(&RgbaImage::new(4, 4));
        let err = compose(&template, &photo, &CompositeParameters::default()).unwrap_err();
        assert_matches!(err, ImagingError::Load { what: "photo frame", .. });
    }

    #[test]
    fn bad_photo_is_a_load_error() {
        let template = FrameTemplate::new(png(&RgbaImage::new(4, 4)), full_area());
        let err = compose(&template, b"garbage", &CompositeParameters::default()).unwrap_err();
        assert_matches!(err, ImagingError::Load { what: "captured image", .. });
    }

    #[test]
    fn output_matches_template_size() {
        let template = FrameTemplate::new(png(&RgbaImage::new(60, 90)), PlacementArea::NEAR_FULL_BLEED);
        let photo = png(&RgbaImage::from_pixel(40, 30, Rgba([0, 255, 0, 255])));
        let bytes = compose(&template, &photo, &CompositeParameters::try_on_capture()).unwrap();
        let out = image::load_from_memory(&bytes).unwrap();
        assert_eq!((out.width(), out.height()), (60, 90));
    }

    #[test]
    fn photo_is_clipped_to_area() {
        let template = FrameTemplate::new(
            png(&RgbaImage::from_pixel(20, 20, Rgba([0, 0, 255, 255]))),
            PlacementArea::Fractional {
                left: 0.25,
                top: 0.25,
                width: 0.5,
                height: 0.5,
            },
        );
        let photo = png(&RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let params = CompositeParameters {
            x_axis_scale: 4.0,
            y_axis_scale: 4.0,
            format: OutputFormat::Png,
            ..CompositeParameters::default()
        };
        let bytes = compose(&template, &photo, &params).unwrap();
        let out = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 1), &Rgba([0, 0, 255, 255]));
        assert_eq!(out.get_pixel(4, 10), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn flip_mirrors_inside_the_placed_rect() {
        // Left half red, right half green.
        let photo = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 255, 0, 255])
            }
        });
        let template = FrameTemplate::new(png(&RgbaImage::new(10, 10)), full_area());
        let params = CompositeParameters {
            flip_horizontal: true,
            format: OutputFormat::Png,
            ..CompositeParameters::default()
        };
        let bytes = compose(&template, &png(&photo), &params).unwrap();
        let out = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 5), &Rgba([0, 255, 0, 255]));
        assert_eq!(out.get_pixel(9, 5), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn transparent_photo_keeps_template() {
        let template = FrameTemplate::new(
            png(&RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]))),
            full_area(),
        );
        let photo = png(&RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0])));
        let params = CompositeParameters {
            format: OutputFormat::Png,
            ..CompositeParameters::default()
        };
        let bytes = compose(&template, &photo, &params).unwrap();
        let out = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(3, 3), &Rgba([10, 20, 30, 255]));
    }
}
