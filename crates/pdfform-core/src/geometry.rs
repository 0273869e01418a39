//! Page-relative geometry for overlay fields
//!
//! All rectangles are in screen pixels relative to the top-left corner of
//! the page overlay container. The container origin is captured once per
//! page when editing begins; rectangles are plain data afterwards and are
//! never re-measured from the live layout.

use pdf_flatten::text_width;
use serde::{Deserialize, Serialize};

/// Horizontal padding between a field's border and its first option.
pub const OPTION_PADDING_X: f64 = 8.0;
/// Vertical padding between a field's border and its first row.
pub const OPTION_PADDING_Y: f64 = 4.0;
/// Space between neighbouring options, both across and down.
pub const OPTION_GAP: f64 = 8.0;
/// Space between an option's marker and its label.
pub const LABEL_GAP: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Top-center point, where the inspector balloon is anchored.
    pub fn top_center(&self) -> Point {
        Point::new(self.left + self.width / 2.0, self.top)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn move_to(&mut self, left: f64, top: f64) {
        self.left = left;
        self.top = top;
    }

    /// Resize in place; negative sizes clamp to zero.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width.max(0.0);
        self.height = height.max(0.0);
    }
}

/// Viewport position and size of a page overlay container.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ContainerRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Convert a viewport point to container-relative coordinates.
    pub fn to_local(&self, point: Point) -> Point {
        Point::new(point.x - self.left, point.y - self.top)
    }
}

/// Rectangle spanned by a pointer drag, relative to the captured container.
///
/// `anchor` and `current` are viewport coordinates. The drag may go in any
/// direction; the result always has a non-negative size.
pub fn rect_from_drag(anchor: Point, current: Point, container: &ContainerRect) -> Rect {
    Rect {
        width: (current.x - anchor.x).abs(),
        height: (current.y - anchor.y).abs(),
        left: anchor.x.min(current.x) - container.left,
        top: anchor.y.min(current.y) - container.top,
    }
}

/// Direction options flow inside a radio or checkbox field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Vertical,
    Horizontal,
}

/// Placement of one option (marker plus label) inside a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSlot {
    pub index: usize,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl OptionSlot {
    /// Left edge of the label text.
    pub fn label_left(&self) -> f64 {
        self.left + self.height + LABEL_GAP
    }
}

/// Lay out option markers and labels inside a field rectangle.
///
/// Each option occupies one row of `font_size` height: a square marker of
/// side `font_size` followed by its label. Vertical layouts put one option
/// per row. Horizontal layouts fill left to right and wrap to a new row when
/// the next option would cross the inner right edge; the first option in a
/// row is never wrapped, so an over-wide label simply overflows.
///
/// Slots are in the same page-relative coordinates as `rect`.
pub fn layout_options(
    rect: &Rect,
    font_size: f64,
    layout: Layout,
    labels: &[String],
) -> Vec<OptionSlot> {
    let inner_left = rect.left + OPTION_PADDING_X;
    let inner_right = rect.right() - OPTION_PADDING_X;
    let row_step = font_size + OPTION_GAP;

    let mut slots = Vec::with_capacity(labels.len());
    let mut x = inner_left;
    let mut y = rect.top + OPTION_PADDING_Y;

    for (index, label) in labels.iter().enumerate() {
        let width = font_size + LABEL_GAP + text_width(label, font_size);

        match layout {
            Layout::Vertical => {
                if index > 0 {
                    y += row_step;
                }
                x = inner_left;
            }
            Layout::Horizontal => {
                if x > inner_left && x + width > inner_right {
                    x = inner_left;
                    y += row_step;
                }
            }
        }

        slots.push(OptionSlot {
            index,
            left: x,
            top: y,
            width,
            height: font_size,
        });

        if layout == Layout::Horizontal {
            x += width + OPTION_GAP;
        }
    }

    slots
}
