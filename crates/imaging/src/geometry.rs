//! Floating-point rectangles and the aspect-ratio fitting rules shared by
//! the compositor and the capture step.

/// Axis-aligned rectangle in pixel space. Edges are fractional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Overlap of two rectangles; empty (zero-sized) when disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Rect::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0))
    }

    /// Half-open containment test: left/top edges inclusive.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }
}

/// Source rectangle that crops a `width` x `height` frame to `aspect`
/// (width / height), removing the longer axis symmetrically about the
/// centre.
pub fn crop_to_aspect(width: f64, height: f64, aspect: f64) -> Rect {
    if width / height > aspect {
        let w = height * aspect;
        Rect::new((width - w) / 2.0, 0.0, w, height)
    } else {
        let h = width / aspect;
        Rect::new(0.0, (height - h) / 2.0, width, h)
    }
}

/// Largest box with the source's aspect ratio that fits entirely inside
/// `area`, centred on the axis with slack.
pub fn contain(area: &Rect, src_width: f64, src_height: f64) -> Rect {
    let image_aspect = src_width / src_height;
    if image_aspect > area.aspect() {
        let h = area.width / image_aspect;
        Rect::new(area.x, area.y + (area.height - h) / 2.0, area.width, h)
    } else {
        let w = area.height * image_aspect;
        Rect::new(area.x + (area.width - w) / 2.0, area.y, w, area.height)
    }
}

/// Smallest box with the source's aspect ratio that fully covers `area`,
/// centred (overflows on one axis).
pub fn cover(area: &Rect, src_width: f64, src_height: f64) -> Rect {
    let scale = (area.width / src_width).max(area.height / src_height);
    let w = src_width * scale;
    let h = src_height * scale;
    Rect::new(
        area.x + (area.width - w) / 2.0,
        area.y + (area.height - h) / 2.0,
        w,
        h,
    )
}
