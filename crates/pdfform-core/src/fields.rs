//! Field variants and their render, fill and edit behavior
//!
//! A [`Field`] is the common part (id, rect, font size) plus a [`FieldKind`]
//! carrying the variant state. Each variant implements [`FieldBehavior`];
//! the rest of the crate talks to variants only through that trait.

use crate::answers::{toggle_checkbox, AnswerValue};
use crate::canvas::STROKE_WIDTH;
use crate::error::FormError;
use crate::geometry::{layout_options, Layout, OptionSlot, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type FieldId = String;

pub const DEFAULT_FONT_SIZE: f64 = 20.0;
pub const DEFAULT_PLACEHOLDER: &str = "Enter text";
pub const DEFAULT_OPTION_COUNT: usize = 3;

/// Rect assumed for stored records that carry none.
pub const FALLBACK_RECT: Rect = Rect {
    top: 50.0,
    left: 50.0,
    width: 200.0,
    height: 50.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Radio,
    Checkbox,
    Dropdown,
    #[serde(alias = "free-hand")]
    Canvas,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::Text,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Dropdown,
        FieldType::Canvas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Dropdown => "dropdown",
            FieldType::Canvas => "canvas",
        }
    }

    /// Whether the inspector shows the vertical/horizontal layout toggle.
    pub fn supports_layout(&self) -> bool {
        matches!(self, FieldType::Radio | FieldType::Checkbox)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "radio" => Ok(FieldType::Radio),
            "checkbox" => Ok(FieldType::Checkbox),
            "dropdown" => Ok(FieldType::Dropdown),
            "canvas" | "free-hand" => Ok(FieldType::Canvas),
            other => Err(FormError::Validation(format!("Unknown field type: {}", other))),
        }
    }
}

/// Fresh field id, prefixed with the type it was created as.
pub fn new_field_id(field_type: FieldType) -> FieldId {
    format!("{}-{}", field_type.as_str(), Uuid::new_v4())
}

fn default_options() -> Vec<String> {
    (1..=DEFAULT_OPTION_COUNT)
        .map(|n| format!("Option {}", n))
        .collect()
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn fallback_rect() -> Rect {
    FALLBACK_RECT
}

/// Persisted shape of one field inside a page's `elements` map.
///
/// The field id is the map key and is not repeated here. `value` is only
/// present in configurations hydrated with answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRecord {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "fallback_rect")]
    pub rect: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AnswerValue>,
}

impl FieldRecord {
    fn bare(field_type: FieldType, rect: Rect, font_size: f64) -> Self {
        Self {
            field_type,
            font_size,
            rect,
            placeholder: None,
            layout: None,
            options: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderMode {
    Edit,
    Fill,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub label: String,
    pub checked: bool,
    pub slot: OptionSlot,
}

/// What the browser layer draws inside a field's rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "widget", rename_all = "camelCase")]
pub enum Widget {
    /// In edit mode `authoring` is set and edits change the placeholder.
    #[serde(rename_all = "camelCase")]
    TextInput {
        value: String,
        placeholder: String,
        authoring: bool,
    },
    #[serde(rename_all = "camelCase")]
    OptionGroup {
        multiple: bool,
        layout: Layout,
        options: Vec<OptionView>,
        editable_labels: bool,
        can_add_option: bool,
    },
    #[serde(rename_all = "camelCase")]
    Select {
        options: Vec<String>,
        selected: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Canvas {
        image: Option<String>,
        stroke_width: f64,
    },
}

/// Declarative view of one field for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: RenderMode,
    pub interactive: bool,
    pub rect: Rect,
    pub font_size: f64,
    #[serde(flatten)]
    pub widget: Widget,
}

/// A value change reported by a fillable widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FillEvent {
    Text {
        value: String,
    },
    Select {
        option: String,
    },
    Toggle {
        option: String,
        checked: bool,
    },
    #[serde(rename_all = "camelCase")]
    Canvas {
        data_uri: String,
    },
}

/// An edit-mode change to a field's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldEdit {
    SetPlaceholder {
        placeholder: String,
    },
    SetOptionLabel {
        index: usize,
        label: String,
    },
    AddOption,
    SetLayout {
        layout: Layout,
    },
    #[serde(rename_all = "camelCase")]
    SetFontSize {
        font_size: f64,
    },
    Move {
        left: f64,
        top: f64,
    },
    Resize {
        width: f64,
        height: f64,
    },
}

pub struct RenderContext<'a> {
    pub mode: RenderMode,
    pub rect: &'a Rect,
    pub font_size: f64,
    pub value: Option<&'a AnswerValue>,
}

pub trait FieldBehavior {
    fn field_type(&self) -> FieldType;

    /// Write variant attributes into a persisted record.
    fn write_record(&self, record: &mut FieldRecord);

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget;

    /// New answer after a fill event. The field itself is not changed.
    fn fill(&self, current: Option<&AnswerValue>, event: &FillEvent)
        -> Result<AnswerValue, FormError>;

    /// Apply a variant-specific edit.
    fn edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        Err(unsupported_edit(self.field_type(), edit))
    }
}

fn unsupported_edit(field_type: FieldType, edit: &FieldEdit) -> FormError {
    FormError::Validation(format!("{:?} does not apply to {} fields", edit, field_type))
}

fn unsupported_fill(field_type: FieldType, event: &FillEvent) -> FormError {
    FormError::Validation(format!("{:?} does not apply to {} fields", event, field_type))
}

/// Label edits and appends shared by every option-list variant.
fn edit_options(options: &mut Vec<String>, edit: &FieldEdit) -> Option<Result<(), FormError>> {
    match edit {
        FieldEdit::SetOptionLabel { index, label } => Some(match options.get_mut(*index) {
            Some(slot) => {
                *slot = label.clone();
                Ok(())
            }
            None => Err(FormError::Validation(format!(
                "Option index {} out of range",
                index
            ))),
        }),
        FieldEdit::AddOption => {
            options.push(format!("Option {}", options.len() + 1));
            Some(Ok(()))
        }
        _ => None,
    }
}

fn option_group(
    ctx: &RenderContext<'_>,
    layout: Layout,
    options: &[String],
    multiple: bool,
) -> Widget {
    let slots = layout_options(ctx.rect, ctx.font_size, layout, options);
    let editing = ctx.mode == RenderMode::Edit;
    let options = options
        .iter()
        .zip(slots)
        .map(|(label, slot)| OptionView {
            label: label.clone(),
            checked: !editing && ctx.value.map(|v| v.contains(label)).unwrap_or(false),
            slot,
        })
        .collect();
    Widget::OptionGroup {
        multiple,
        layout,
        options,
        editable_labels: editing,
        can_add_option: editing,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextField {
    pub placeholder: String,
}

impl FieldBehavior for TextField {
    fn field_type(&self) -> FieldType {
        FieldType::Text
    }

    fn write_record(&self, record: &mut FieldRecord) {
        record.placeholder = Some(self.placeholder.clone());
    }

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget {
        let authoring = ctx.mode == RenderMode::Edit;
        let value = if authoring {
            String::new()
        } else {
            ctx.value
                .and_then(AnswerValue::as_single)
                .unwrap_or_default()
                .to_string()
        };
        Widget::TextInput {
            value,
            placeholder: self.placeholder.clone(),
            authoring,
        }
    }

    fn fill(
        &self,
        _current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        match event {
            FillEvent::Text { value } => Ok(AnswerValue::Single(value.clone())),
            other => Err(unsupported_fill(self.field_type(), other)),
        }
    }

    fn edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        match edit {
            FieldEdit::SetPlaceholder { placeholder } => {
                self.placeholder = placeholder.clone();
                Ok(())
            }
            other => Err(unsupported_edit(self.field_type(), other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadioField {
    pub layout: Layout,
    pub options: Vec<String>,
}

impl FieldBehavior for RadioField {
    fn field_type(&self) -> FieldType {
        FieldType::Radio
    }

    fn write_record(&self, record: &mut FieldRecord) {
        record.layout = Some(self.layout);
        record.options = Some(self.options.clone());
    }

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget {
        option_group(ctx, self.layout, &self.options, false)
    }

    fn fill(
        &self,
        _current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        match event {
            FillEvent::Select { option } => Ok(AnswerValue::Single(option.clone())),
            other => Err(unsupported_fill(self.field_type(), other)),
        }
    }

    fn edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        if let FieldEdit::SetLayout { layout } = edit {
            self.layout = *layout;
            return Ok(());
        }
        edit_options(&mut self.options, edit)
            .unwrap_or_else(|| Err(unsupported_edit(FieldType::Radio, edit)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckboxField {
    pub layout: Layout,
    pub options: Vec<String>,
}

impl FieldBehavior for CheckboxField {
    fn field_type(&self) -> FieldType {
        FieldType::Checkbox
    }

    fn write_record(&self, record: &mut FieldRecord) {
        record.layout = Some(self.layout);
        record.options = Some(self.options.clone());
    }

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget {
        option_group(ctx, self.layout, &self.options, true)
    }

    fn fill(
        &self,
        current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        match event {
            FillEvent::Toggle { option, checked } => {
                Ok(toggle_checkbox(current, option, *checked))
            }
            other => Err(unsupported_fill(self.field_type(), other)),
        }
    }

    fn edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        if let FieldEdit::SetLayout { layout } = edit {
            self.layout = *layout;
            return Ok(());
        }
        edit_options(&mut self.options, edit)
            .unwrap_or_else(|| Err(unsupported_edit(FieldType::Checkbox, edit)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropdownField {
    pub options: Vec<String>,
}

impl FieldBehavior for DropdownField {
    fn field_type(&self) -> FieldType {
        FieldType::Dropdown
    }

    fn write_record(&self, record: &mut FieldRecord) {
        record.options = Some(self.options.clone());
    }

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget {
        let selected = match ctx.mode {
            RenderMode::Edit => None,
            _ => ctx
                .value
                .and_then(AnswerValue::as_single)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        Widget::Select {
            options: self.options.clone(),
            selected,
        }
    }

    fn fill(
        &self,
        _current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        match event {
            FillEvent::Select { option } => Ok(AnswerValue::Single(option.clone())),
            other => Err(unsupported_fill(self.field_type(), other)),
        }
    }

    fn edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        edit_options(&mut self.options, edit)
            .unwrap_or_else(|| Err(unsupported_edit(FieldType::Dropdown, edit)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasField;

impl FieldBehavior for CanvasField {
    fn field_type(&self) -> FieldType {
        FieldType::Canvas
    }

    fn write_record(&self, _record: &mut FieldRecord) {}

    fn widget(&self, ctx: &RenderContext<'_>) -> Widget {
        let image = match ctx.mode {
            RenderMode::Edit => None,
            _ => ctx
                .value
                .and_then(AnswerValue::as_single)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        Widget::Canvas {
            image,
            stroke_width: STROKE_WIDTH,
        }
    }

    fn fill(
        &self,
        _current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        match event {
            FillEvent::Canvas { data_uri } => Ok(AnswerValue::Single(data_uri.clone())),
            other => Err(unsupported_fill(self.field_type(), other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text(TextField),
    Radio(RadioField),
    Checkbox(CheckboxField),
    Dropdown(DropdownField),
    Canvas(CanvasField),
}

impl FieldKind {
    /// Variant state a newly created or re-typed field starts with.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Text => FieldKind::Text(TextField {
                placeholder: DEFAULT_PLACEHOLDER.to_string(),
            }),
            FieldType::Radio => FieldKind::Radio(RadioField {
                layout: Layout::Vertical,
                options: default_options(),
            }),
            FieldType::Checkbox => FieldKind::Checkbox(CheckboxField {
                layout: Layout::Vertical,
                options: default_options(),
            }),
            FieldType::Dropdown => FieldKind::Dropdown(DropdownField {
                options: default_options(),
            }),
            FieldType::Canvas => FieldKind::Canvas(CanvasField),
        }
    }

    fn from_record(record: &FieldRecord) -> Self {
        let options = || record.options.clone().unwrap_or_default();
        let layout = record.layout.unwrap_or_default();
        match record.field_type {
            FieldType::Text => FieldKind::Text(TextField {
                placeholder: record.placeholder.clone().unwrap_or_default(),
            }),
            FieldType::Radio => FieldKind::Radio(RadioField {
                layout,
                options: options(),
            }),
            FieldType::Checkbox => FieldKind::Checkbox(CheckboxField {
                layout,
                options: options(),
            }),
            FieldType::Dropdown => FieldKind::Dropdown(DropdownField { options: options() }),
            FieldType::Canvas => FieldKind::Canvas(CanvasField),
        }
    }

    pub fn behavior(&self) -> &dyn FieldBehavior {
        match self {
            FieldKind::Text(f) => f,
            FieldKind::Radio(f) => f,
            FieldKind::Checkbox(f) => f,
            FieldKind::Dropdown(f) => f,
            FieldKind::Canvas(f) => f,
        }
    }

    pub fn behavior_mut(&mut self) -> &mut dyn FieldBehavior {
        match self {
            FieldKind::Text(f) => f,
            FieldKind::Radio(f) => f,
            FieldKind::Checkbox(f) => f,
            FieldKind::Dropdown(f) => f,
            FieldKind::Canvas(f) => f,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub id: FieldId,
    pub rect: Rect,
    pub font_size: f64,
    pub kind: FieldKind,
}

impl Field {
    /// Create a field with a fresh id and the type's default attributes.
    pub fn create(field_type: FieldType, rect: Rect, font_size: f64) -> Self {
        Self {
            id: new_field_id(field_type),
            rect,
            font_size,
            kind: FieldKind::default_for(field_type),
        }
    }

    /// Rebuild a field from its persisted record.
    pub fn from_record(id: impl Into<FieldId>, record: &FieldRecord) -> Self {
        Self {
            id: id.into(),
            rect: record.rect,
            font_size: record.font_size,
            kind: FieldKind::from_record(record),
        }
    }

    pub fn field_type(&self) -> FieldType {
        self.kind.behavior().field_type()
    }

    /// Persisted attribute set. Never includes a value.
    pub fn serialize(&self) -> FieldRecord {
        let mut record = FieldRecord::bare(self.field_type(), self.rect, self.font_size);
        self.kind.behavior().write_record(&mut record);
        record
    }

    /// Replace the variant, keeping only id, rect and font size.
    pub fn switch_type(&self, field_type: FieldType) -> Field {
        Field {
            id: self.id.clone(),
            rect: self.rect,
            font_size: self.font_size,
            kind: FieldKind::default_for(field_type),
        }
    }

    pub fn options(&self) -> Option<&[String]> {
        match &self.kind {
            FieldKind::Radio(f) => Some(&f.options),
            FieldKind::Checkbox(f) => Some(&f.options),
            FieldKind::Dropdown(f) => Some(&f.options),
            FieldKind::Text(_) | FieldKind::Canvas(_) => None,
        }
    }

    pub fn layout(&self) -> Option<Layout> {
        match &self.kind {
            FieldKind::Radio(f) => Some(f.layout),
            FieldKind::Checkbox(f) => Some(f.layout),
            _ => None,
        }
    }

    pub fn render_editable(&self) -> FieldView {
        self.render(RenderMode::Edit, None)
    }

    pub fn render_fillable(&self, value: Option<&AnswerValue>) -> FieldView {
        self.render(RenderMode::Fill, value)
    }

    pub fn render_readonly(&self, value: Option<&AnswerValue>) -> FieldView {
        self.render(RenderMode::ReadOnly, value)
    }

    pub fn render(&self, mode: RenderMode, value: Option<&AnswerValue>) -> FieldView {
        let ctx = RenderContext {
            mode,
            rect: &self.rect,
            font_size: self.font_size,
            value,
        };
        FieldView {
            id: self.id.clone(),
            field_type: self.field_type(),
            mode,
            interactive: mode != RenderMode::ReadOnly,
            rect: self.rect,
            font_size: self.font_size,
            widget: self.kind.behavior().widget(&ctx),
        }
    }

    pub fn apply_fill(
        &self,
        current: Option<&AnswerValue>,
        event: &FillEvent,
    ) -> Result<AnswerValue, FormError> {
        self.kind.behavior().fill(current, event)
    }

    pub fn apply_edit(&mut self, edit: &FieldEdit) -> Result<(), FormError> {
        match edit {
            FieldEdit::SetFontSize { font_size } => {
                if !font_size.is_finite() || *font_size <= 0.0 {
                    return Err(FormError::Validation(format!(
                        "Invalid font size: {}",
                        font_size
                    )));
                }
                self.font_size = *font_size;
                Ok(())
            }
            FieldEdit::Move { left, top } => {
                self.rect.move_to(*left, *top);
                Ok(())
            }
            FieldEdit::Resize { width, height } => {
                self.rect.resize(*width, *height);
                Ok(())
            }
            other => self.kind.behavior_mut().edit(other),
        }
    }
}
