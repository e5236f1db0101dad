//! Mapping between real display space and the layout canvas.
//!
//! Real coordinates are integral and unbounded (negative origins are common
//! when a display sits left of or above the main one). Canvas coordinates
//! are `f64` in whatever unit the front-end draws in.

use crate::display::{DeviceSet, Display};

/// Box used when there is nothing to lay out.
const DEFAULT_BOX: (i64, i64, i64, i64) = (0, 0, 1920, 1080);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasBounds {
    pub max_width: f64,
    pub max_height: f64,
    /// Upper bound on canvas units per real pixel.
    pub scale_cap: f64,
    pub margin: f64,
}

impl Default for CanvasBounds {
    fn default() -> Self {
        CanvasBounds {
            max_width: 800.0,
            max_height: 400.0,
            scale_cap: 0.25,
            margin: 20.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasTransform {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
    pub scale: f64,
    pub margin: f64,
}

impl CanvasTransform {
    pub fn fit(devices: &DeviceSet, bounds: CanvasBounds) -> Self {
        Self::fit_displays(devices.displays(), bounds)
    }

    pub fn fit_displays(displays: &[Display], bounds: CanvasBounds) -> Self {
        let (min_x, min_y, max_x, max_y) = bounding_box(displays);
        let box_w = (max_x - min_x) as f64;
        let box_h = (max_y - min_y) as f64;

        let scale = (bounds.max_width / box_w)
            .min(bounds.max_height / box_h)
            .min(bounds.scale_cap);
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else if bounds.scale_cap.is_finite() && bounds.scale_cap > 0.0 {
            bounds.scale_cap
        } else {
            1.0
        };

        CanvasTransform { min_x, min_y, max_x, max_y, scale, margin: bounds.margin }
    }

    pub fn to_canvas(&self, x: i32, y: i32) -> (f64, f64) {
        (
            (x as i64 - self.min_x) as f64 * self.scale + self.margin,
            (y as i64 - self.min_y) as f64 * self.scale + self.margin,
        )
    }

    /// Inverse of [`to_canvas`](Self::to_canvas), rounded to the nearest
    /// real pixel.
    pub fn to_real(&self, cx: f64, cy: f64) -> (i32, i32) {
        let x = (cx - self.margin) / self.scale + self.min_x as f64;
        let y = (cy - self.margin) / self.scale + self.min_y as f64;
        (clamp_i32(x.round()), clamp_i32(y.round()))
    }

    pub fn length(&self, real: u32) -> f64 {
        real as f64 * self.scale
    }

    /// Canvas rectangle `(x, y, w, h)` covered by a display.
    pub fn rect(&self, d: &Display) -> (f64, f64, f64, f64) {
        let (x, y) = self.to_canvas(d.x, d.y);
        (x, y, self.length(d.width), self.length(d.height))
    }
}

fn bounding_box(displays: &[Display]) -> (i64, i64, i64, i64) {
    let displays: Vec<&Display> = displays.iter().filter(|d| d.has_geometry()).collect();
    if displays.is_empty() {
        return DEFAULT_BOX;
    }
    let min_x = displays.iter().map(|d| d.x as i64).min().unwrap_or(DEFAULT_BOX.0);
    let min_y = displays.iter().map(|d| d.y as i64).min().unwrap_or(DEFAULT_BOX.1);
    let max_x = displays.iter().map(|d| d.right()).max().unwrap_or(DEFAULT_BOX.2);
    let max_y = displays.iter().map(|d| d.bottom()).max().unwrap_or(DEFAULT_BOX.3);
    if max_x <= min_x || max_y <= min_y {
        return DEFAULT_BOX;
    }
    (min_x, min_y, max_x, max_y)
}

fn clamp_i32(v: f64) -> i32 {
    v.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

/// Topmost display under a canvas point. Later displays are drawn over
/// earlier ones, so search from the back.
pub fn hit_test<'a>(transform: &CanvasTransform, displays: &'a [Display], cx: f64, cy: f64) -> Option<&'a Display> {
    displays.iter().rev().find(|d| {
        let (x, y, w, h) = transform.rect(d);
        cx >= x && cx < x + w && cy >= y && cy < y + h
    })
}

/// An in-progress drag of one display card.
///
/// The transform is captured at pointer-down so the mapping stays fixed
/// while the bounding box changes under the pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct DragState {
    pub display_id: String,
    transform: CanvasTransform,
    offset_x: f64,
    offset_y: f64,
    pub orig_x: i32,
    pub orig_y: i32,
}

impl DragState {
    pub fn begin(transform: CanvasTransform, display: &Display, cx: f64, cy: f64) -> Self {
        let (card_x, card_y) = transform.to_canvas(display.x, display.y);
        DragState {
            display_id: display.id.clone(),
            transform,
            offset_x: cx - card_x,
            offset_y: cy - card_y,
            orig_x: display.x,
            orig_y: display.y,
        }
    }

    /// Real origin the dragged display should take with the pointer at
    /// `(cx, cy)`.
    pub fn origin_at(&self, cx: f64, cy: f64) -> (i32, i32) {
        self.transform.to_real(cx - self.offset_x, cy - self.offset_y)
    }

    pub fn transform(&self) -> &CanvasTransform {
        &self.transform
    }
}
