//! Inspector balloon state
//!
//! The balloon is described by plain data: whether it is shown, which field
//! it targets and what its controls display. The rendering layer reads this
//! after every overlay event instead of wiring handlers per field.

use crate::fields::{Field, FieldId, FieldType};
use crate::geometry::{Layout, Point};
use serde::{Deserialize, Serialize};

/// Vertical gap between the balloon and the top of its field.
pub const BALLOON_OFFSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InspectorMode {
    /// Opened on a field that was just drawn.
    Create,
    /// Re-opened on an existing field by secondary click.
    Reopen,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectorState {
    pub visible: bool,
    pub target: Option<FieldId>,
    pub mode: Option<InspectorMode>,
    /// Top-center of the target field, page-relative.
    pub anchor: Option<Point>,
    pub field_type: Option<FieldType>,
    pub font_size: Option<f64>,
    pub layout: Option<Layout>,
    pub show_layout_controls: bool,
}

impl InspectorState {
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn for_field(field: &Field, mode: InspectorMode) -> Self {
        let field_type = field.field_type();
        Self {
            visible: true,
            target: Some(field.id.clone()),
            mode: Some(mode),
            anchor: Some(field.rect.top_center()),
            field_type: Some(field_type),
            font_size: Some(field.font_size),
            layout: field.layout(),
            show_layout_controls: field_type.supports_layout(),
        }
    }

    pub fn targets(&self, id: &str) -> bool {
        self.target.as_deref() == Some(id)
    }

    /// Top-left corner for a balloon of the given size: centred over the
    /// anchor, sitting just above the field, kept off the left and top
    /// edges.
    pub fn balloon_position(&self, balloon_width: f64, balloon_height: f64) -> Option<Point> {
        let anchor = self.anchor.filter(|_| self.visible)?;
        Some(Point::new(
            (anchor.x - balloon_width / 2.0).max(0.0),
            (anchor.y - BALLOON_OFFSET - balloon_height).max(0.0),
        ))
    }
}
