//! Page overlay controller
//!
//! [`PageOverlay`] owns the fields of one page and turns pointer and key
//! events into field creation and inspector changes. [`OverlayEditor`]
//! keeps one overlay per visited page so unsaved edits survive page
//! navigation, and produces the configuration to save.

use crate::answers::AnswerMap;
use crate::config_store::{fields_for_page, serialize_for_save, PageConfiguration, PageFields};
use crate::error::FormError;
use crate::fields::{Field, FieldEdit, FieldId, FieldType, FieldView, RenderMode, DEFAULT_FONT_SIZE};
use crate::geometry::{rect_from_drag, ContainerRect, Layout, Point, Rect};
use crate::inspector::{InspectorMode, InspectorState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayMode {
    /// Teacher layout editing; the only mode that draws fields.
    Edit,
    Fill,
    ReadOnly,
}

impl OverlayMode {
    pub fn render_mode(&self) -> RenderMode {
        match self {
            OverlayMode::Edit => RenderMode::Edit,
            OverlayMode::Fill => RenderMode::Fill,
            OverlayMode::ReadOnly => RenderMode::ReadOnly,
        }
    }
}

/// What a pointer event landed on, as resolved by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum HitTarget {
    Empty,
    FieldMark(FieldId),
    /// An input, select, button or label inside the given field.
    FormControl(FieldId),
    Balloon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState {
    Idle,
    /// `anchor` and `current` are viewport coordinates.
    Drawing { anchor: Point, current: Point },
    Inspecting { target: FieldId },
}

/// A control in the inspector balloon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum InspectorCommand {
    #[serde(rename_all = "camelCase")]
    SetType { field_type: FieldType },
    #[serde(rename_all = "camelCase")]
    SetFontSize { font_size: f64 },
    SetLayout { layout: Layout },
    Delete,
    Close,
}

#[derive(Debug, Clone)]
pub struct PageOverlay {
    page: u32,
    mode: OverlayMode,
    container: Option<ContainerRect>,
    fields: PageFields,
    state: OverlayState,
    inspector: InspectorState,
}

impl PageOverlay {
    pub fn new(page: u32, mode: OverlayMode, fields: PageFields) -> Self {
        Self {
            page,
            mode,
            container: None,
            fields,
            state: OverlayState::Idle,
            inspector: InspectorState::hidden(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn inspector(&self) -> &InspectorState {
        &self.inspector
    }

    pub fn fields(&self) -> &PageFields {
        &self.fields
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.get(id)
    }

    pub fn container(&self) -> Option<ContainerRect> {
        self.container
    }

    /// Record the container's viewport origin. Only the first capture for
    /// a page is kept; later re-renders do not move existing rectangles.
    pub fn capture_container(&mut self, container: ContainerRect) {
        if self.container.is_none() {
            self.container = Some(container);
        }
    }

    /// Returns true when the overlay handled the event.
    pub fn pointer_down(&mut self, at: Point, button: PointerButton, hit: &HitTarget) -> bool {
        if self.mode != OverlayMode::Edit {
            return false;
        }

        if button == PointerButton::Secondary {
            return match hit {
                HitTarget::FieldMark(id) => self.open_inspector(id, InspectorMode::Reopen),
                _ => false,
            };
        }

        match &self.state {
            OverlayState::Inspecting { target } => {
                let inside = match hit {
                    HitTarget::Balloon => true,
                    HitTarget::FieldMark(id) | HitTarget::FormControl(id) => id == target,
                    HitTarget::Empty => false,
                };
                if !inside {
                    self.close_inspector();
                }
                true
            }
            OverlayState::Drawing { .. } => true,
            OverlayState::Idle => {
                if *hit != HitTarget::Empty {
                    return false;
                }
                if self.container.is_none() {
                    debug!(page = self.page, "Pointer down before container capture");
                    return false;
                }
                self.state = OverlayState::Drawing {
                    anchor: at,
                    current: at,
                };
                true
            }
        }
    }

    pub fn pointer_move(&mut self, at: Point) {
        if let OverlayState::Drawing { current, .. } = &mut self.state {
            *current = at;
        }
    }

    /// Rectangle being drawn, for the live preview.
    pub fn drawing_rect(&self) -> Option<Rect> {
        match (&self.state, &self.container) {
            (OverlayState::Drawing { anchor, current }, Some(container)) => {
                Some(rect_from_drag(*anchor, *current, container))
            }
            _ => None,
        }
    }

    /// Finish a drag: create a text field and open the inspector on it.
    pub fn pointer_up(&mut self, at: Point) -> Option<FieldId> {
        let OverlayState::Drawing { anchor, .. } = self.state else {
            return None;
        };
        let container = self.container?;
        if self.mode != OverlayMode::Edit {
            self.state = OverlayState::Idle;
            return None;
        }

        let rect = rect_from_drag(anchor, at, &container);
        let field = Field::create(FieldType::Text, rect, DEFAULT_FONT_SIZE);
        let id = field.id.clone();
        debug!(page = self.page, id = %id, ?rect, "Field drawn");
        self.fields.insert(id.clone(), field);
        self.open_inspector(&id, InspectorMode::Create);
        Some(id)
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        if key == "Escape" && self.inspector.visible {
            self.close_inspector();
            return true;
        }
        false
    }

    pub fn apply_command(&mut self, command: &InspectorCommand) -> Result<(), FormError> {
        let OverlayState::Inspecting { target } = &self.state else {
            return Err(FormError::Validation("Inspector is not open".to_string()));
        };
        let target = target.clone();

        match command {
            InspectorCommand::SetType { field_type } => {
                let field = self.field_entry(&target)?;
                if field.field_type() != *field_type {
                    *field = field.switch_type(*field_type);
                    debug!(id = %target, to = %field_type, "Field type switched");
                }
            }
            InspectorCommand::SetFontSize { font_size } => {
                self.field_entry(&target)?
                    .apply_edit(&FieldEdit::SetFontSize {
                        font_size: *font_size,
                    })?;
            }
            InspectorCommand::SetLayout { layout } => {
                self.field_entry(&target)?
                    .apply_edit(&FieldEdit::SetLayout { layout: *layout })?;
            }
            InspectorCommand::Delete => {
                self.fields.remove(&target);
                self.close_inspector();
                return Ok(());
            }
            InspectorCommand::Close => {
                self.close_inspector();
                return Ok(());
            }
        }

        self.refresh_inspector();
        Ok(())
    }

    /// Apply an edit made directly on a field (labels, placeholder, geometry).
    pub fn edit_field(&mut self, id: &str, edit: &FieldEdit) -> Result<(), FormError> {
        if self.mode != OverlayMode::Edit {
            return Err(FormError::Validation(
                "Fields can only be edited in edit mode".to_string(),
            ));
        }
        self.field_entry(id)?.apply_edit(edit)?;
        if self.inspector.targets(id) {
            self.refresh_inspector();
        }
        Ok(())
    }

    pub fn close_inspector(&mut self) {
        if let OverlayState::Inspecting { target } = &self.state {
            debug!(page = self.page, id = %target, "Inspector closed");
        }
        self.state = OverlayState::Idle;
        self.inspector = InspectorState::hidden();
    }

    /// Views of every field for the current mode.
    pub fn views(&self, answers: &AnswerMap) -> Vec<FieldView> {
        let mode = self.mode.render_mode();
        self.fields
            .values()
            .map(|field| {
                let value = match mode {
                    RenderMode::Edit => None,
                    _ => answers.get(&field.id),
                };
                field.render(mode, value)
            })
            .collect()
    }

    fn open_inspector(&mut self, id: &str, mode: InspectorMode) -> bool {
        let Some(field) = self.fields.get(id) else {
            return false;
        };
        self.inspector = InspectorState::for_field(field, mode);
        self.state = OverlayState::Inspecting {
            target: id.to_string(),
        };
        debug!(page = self.page, id, ?mode, "Inspector opened");
        true
    }

    fn refresh_inspector(&mut self) {
        let Some(mode) = self.inspector.mode else {
            return;
        };
        match self.inspector.target.as_ref().and_then(|id| self.fields.get(id)) {
            Some(field) => self.inspector = InspectorState::for_field(field, mode),
            None => self.close_inspector(),
        }
    }

    fn field_entry(&mut self, id: &str) -> Result<&mut Field, FormError> {
        self.fields
            .get_mut(id)
            .ok_or_else(|| FormError::NotFound(format!("Field {} on page {}", id, self.page)))
    }
}

/// Multi-page overlay session over one document.
#[derive(Debug, Clone)]
pub struct OverlayEditor {
    mode: OverlayMode,
    persisted: PageConfiguration,
    page_count: u32,
    current: u32,
    pages: BTreeMap<u32, PageOverlay>,
}

impl OverlayEditor {
    pub fn new(persisted: PageConfiguration, page_count: u32, mode: OverlayMode) -> Self {
        let mut editor = Self {
            mode,
            persisted,
            page_count: page_count.max(1),
            current: 1,
            pages: BTreeMap::new(),
        };
        editor.visit(1);
        editor
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Update the page count once the base document has been loaded.
    pub fn set_page_count(&mut self, page_count: u32) {
        self.page_count = page_count.max(1);
    }

    pub fn persisted(&self) -> &PageConfiguration {
        &self.persisted
    }

    pub fn overlay(&self) -> &PageOverlay {
        // The current page is always visited.
        &self.pages[&self.current]
    }

    pub fn overlay_mut(&mut self) -> &mut PageOverlay {
        self.visit(self.current)
    }

    pub fn visited_pages(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Switch to a page, closing the inspector on the page being left.
    ///
    /// Out-of-range pages are ignored and return false.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if page < 1 || page > self.page_count {
            return false;
        }
        if page != self.current {
            self.overlay_mut().close_inspector();
            self.current = page;
            self.visit(page);
            debug!(page, "Page changed");
        }
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.current > 1 && self.go_to_page(self.current - 1)
    }

    /// Escape closes the inspector; in fill and read-only sessions the
    /// up and down arrows move between pages.
    pub fn handle_key(&mut self, key: &str) -> bool {
        match key {
            "Escape" => self.overlay_mut().key_down(key),
            "ArrowDown" if self.mode != OverlayMode::Edit => self.next_page(),
            "ArrowUp" if self.mode != OverlayMode::Edit => self.previous_page(),
            _ => false,
        }
    }

    /// Configuration to persist: visited pages from memory, every other
    /// page carried over from the last save.
    pub fn serialize_for_save(&self) -> PageConfiguration {
        serialize_for_save(
            &self.persisted,
            self.pages.iter().map(|(page, overlay)| (*page, overlay.fields())),
        )
    }

    /// Adopt a configuration that was saved successfully.
    pub fn mark_saved(&mut self, config: PageConfiguration) {
        self.persisted = config;
    }

    /// Find a field on any visited page.
    pub fn find_field(&self, id: &str) -> Option<&Field> {
        self.pages.values().find_map(|overlay| overlay.field(id))
    }

    fn visit(&mut self, page: u32) -> &mut PageOverlay {
        let persisted = &self.persisted;
        let mode = self.mode;
        self.pages
            .entry(page)
            .or_insert_with(|| PageOverlay::new(page, mode, fields_for_page(persisted, page)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::serialize_page;
    use crate::answers::AnswerValue;
    use crate::fields::Widget;
    use pretty_assertions::assert_eq;

    fn container() -> ContainerRect {
        ContainerRect::new(100.0, 50.0, 612.0, 792.0)
    }

    fn edit_overlay() -> PageOverlay {
        let mut overlay = PageOverlay::new(1, OverlayMode::Edit, PageFields::new());
        overlay.capture_container(container());
        overlay
    }

    fn draw(overlay: &mut PageOverlay, from: Point, to: Point) -> Option<FieldId> {
        overlay.pointer_down(from, PointerButton::Primary, &HitTarget::Empty);
        overlay.pointer_move(to);
        overlay.pointer_up(to)
    }

    #[test]
    fn test_draw_creates_text_field_and_opens_inspector() {
        let mut overlay = edit_overlay();
        assert!(overlay.pointer_down(
            Point::new(150.0, 150.0),
            PointerButton::Primary,
            &HitTarget::Empty
        ));
        overlay.pointer_move(Point::new(350.0, 180.0));
        assert_eq!(
            overlay.drawing_rect(),
            Some(Rect::new(50.0, 100.0, 200.0, 30.0))
        );

        let id = overlay.pointer_up(Point::new(350.0, 180.0)).unwrap();
        let field = overlay.field(&id).unwrap();
        assert_eq!(field.field_type(), FieldType::Text);
        assert_eq!(field.font_size, DEFAULT_FONT_SIZE);
        assert_eq!(field.rect, Rect::new(50.0, 100.0, 200.0, 30.0));

        assert_eq!(
            overlay.state(),
            &OverlayState::Inspecting { target: id.clone() }
        );
        let inspector = overlay.inspector();
        assert!(inspector.visible);
        assert_eq!(inspector.mode, Some(InspectorMode::Create));
        assert_eq!(inspector.anchor, Some(Point::new(150.0, 100.0)));
        assert!(!inspector.show_layout_controls);
    }

    #[test]
    fn test_container_capture_is_sticky() {
        let mut overlay = edit_overlay();
        overlay.capture_container(ContainerRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(overlay.container(), Some(container()));
    }

    #[test]
    fn test_no_drawing_without_container() {
        let mut overlay = PageOverlay::new(1, OverlayMode::Edit, PageFields::new());
        assert!(!overlay.pointer_down(Point::new(1.0, 1.0), PointerButton::Primary, &HitTarget::Empty));
        assert_eq!(overlay.pointer_up(Point::new(9.0, 9.0)), None);
    }

    #[test]
    fn test_read_only_and_fill_never_draw() {
        for mode in [OverlayMode::Fill, OverlayMode::ReadOnly] {
            let mut overlay = PageOverlay::new(1, mode, PageFields::new());
            overlay.capture_container(container());
            assert!(!overlay.pointer_down(
                Point::new(150.0, 150.0),
                PointerButton::Primary,
                &HitTarget::Empty
            ));
            assert_eq!(overlay.state(), &OverlayState::Idle);
            assert_eq!(overlay.pointer_up(Point::new(300.0, 300.0)), None);
            assert!(overlay.fields().is_empty());
        }
    }

    #[test]
    fn test_pointer_down_on_marks_and_controls_does_not_draw() {
        let mut overlay = edit_overlay();
        let id = draw(&mut overlay, Point::new(120.0, 60.0), Point::new(200.0, 90.0)).unwrap();
        overlay.close_inspector();

        for hit in [HitTarget::FieldMark(id.clone()), HitTarget::FormControl(id)] {
            assert!(!overlay.pointer_down(Point::new(130.0, 70.0), PointerButton::Primary, &hit));
            assert_eq!(overlay.state(), &OverlayState::Idle);
        }
    }

    #[test]
    fn test_click_outside_closes_inspector_without_drawing() {
        let mut overlay = edit_overlay();
        let id = draw(&mut overlay, Point::new(120.0, 60.0), Point::new(200.0, 90.0)).unwrap();

        // Inside the balloon and on the target keep it open
        overlay.pointer_down(Point::new(0.0, 0.0), PointerButton::Primary, &HitTarget::Balloon);
        overlay.pointer_down(
            Point::new(130.0, 70.0),
            PointerButton::Primary,
            &HitTarget::FieldMark(id.clone()),
        );
        assert!(overlay.inspector().visible);

        overlay.pointer_down(Point::new(400.0, 400.0), PointerButton::Primary, &HitTarget::Empty);
        assert!(!overlay.inspector().visible);
        assert_eq!(overlay.state(), &OverlayState::Idle);
        assert_eq!(overlay.fields().len(), 1);
    }

    #[test]
    fn test_controls_of_target_field_keep_inspector_open() {
        let mut overlay = edit_overlay();
        let other = draw(&mut overlay, Point::new(120.0, 260.0), Point::new(200.0, 290.0)).unwrap();
        overlay.close_inspector();
        let id = draw(&mut overlay, Point::new(120.0, 60.0), Point::new(200.0, 90.0)).unwrap();

        overlay.pointer_down(
            Point::new(130.0, 70.0),
            PointerButton::Primary,
            &HitTarget::FormControl(id.clone()),
        );
        assert!(overlay.inspector().targets(&id));

        overlay.pointer_down(
            Point::new(130.0, 270.0),
            PointerButton::Primary,
            &HitTarget::FormControl(other),
        );
        assert!(!overlay.inspector().visible);
        assert_eq!(overlay.fields().len(), 2);
    }

    #[test]
    fn test_escape_closes_inspector() {
        let mut overlay = edit_overlay();
        draw(&mut overlay, Point::new(120.0, 60.0), Point::new(200.0, 90.0));
        assert!(overlay.key_down("Escape"));
        assert!(!overlay.inspector().visible);
        assert!(!overlay.key_down("Escape"));
    }

    #[test]
    fn test_secondary_click_reopens_existing_field() {
        let mut overlay = edit_overlay();
        let id = draw(&mut overlay, Point::new(120.0, 60.0), Point::new(200.0, 90.0)).unwrap();
        overlay.close_inspector();

        assert!(overlay.pointer_down(
            Point::new(130.0, 70.0),
            PointerButton::Secondary,
            &HitTarget::FieldMark(id.clone())
        ));
        assert_eq!(overlay.inspector().mode, Some(InspectorMode::Reopen));
        assert!(overlay.inspector().targets(&id));
        assert_eq!(overlay.fields().len(), 1);
    }

    #[test]
    fn test_inspector_commands() {
        let mut overlay = edit_overlay();
        let id = draw(&mut overlay, Point::new(120.0, 60.0), Point::new(300.0, 160.0)).unwrap();

        overlay
            .apply_command(&InspectorCommand::SetType {
                field_type: FieldType::Checkbox,
            })
            .unwrap();
        assert!(overlay.inspector().show_layout_controls);
        assert_eq!(overlay.field(&id).unwrap().field_type(), FieldType::Checkbox);

        overlay
            .apply_command(&InspectorCommand::SetLayout {
                layout: Layout::Horizontal,
            })
            .unwrap();
        assert_eq!(overlay.inspector().layout, Some(Layout::Horizontal));

        overlay
            .apply_command(&InspectorCommand::SetFontSize { font_size: 12.0 })
            .unwrap();
        assert_eq!(overlay.field(&id).unwrap().font_size, 12.0);
        assert_eq!(overlay.inspector().font_size, Some(12.0));

        overlay
            .apply_command(&InspectorCommand::SetType {
                field_type: FieldType::Dropdown,
            })
            .unwrap();
        assert!(!overlay.inspector().show_layout_controls);
        assert_eq!(overlay.field(&id).unwrap().font_size, 12.0);
        assert_eq!(overlay.field(&id).unwrap().id, id);

        overlay.apply_command(&InspectorCommand::Delete).unwrap();
        assert!(overlay.fields().is_empty());
        assert!(!overlay.inspector().visible);
        assert!(overlay.apply_command(&InspectorCommand::Close).is_err());
    }

    #[test]
    fn test_edit_field_requires_edit_mode() {
        let field = Field::create(FieldType::Radio, Rect::new(0.0, 0.0, 100.0, 100.0), 20.0);
        let id = field.id.clone();
        let mut fields = PageFields::new();
        fields.insert(id.clone(), field);
        let mut overlay = PageOverlay::new(1, OverlayMode::Fill, fields);
        assert!(overlay.edit_field(&id, &FieldEdit::AddOption).is_err());
    }

    #[test]
    fn test_fill_views_carry_answers() {
        let field = Field::create(FieldType::Text, Rect::new(0.0, 0.0, 100.0, 30.0), 20.0);
        let id = field.id.clone();
        let mut fields = PageFields::new();
        fields.insert(id.clone(), field);
        let overlay = PageOverlay::new(1, OverlayMode::Fill, fields);

        let mut answers = AnswerMap::new();
        answers.insert(id, AnswerValue::Single("Jane".to_string()));
        let views = overlay.views(&answers);
        assert_eq!(views.len(), 1);
        match &views[0].widget {
            Widget::TextInput { value, authoring, .. } => {
                assert_eq!(value, "Jane");
                assert!(!authoring);
            }
            other => panic!("unexpected widget {:?}", other),
        }
    }

    fn persisted_pages(pages: &[u32]) -> PageConfiguration {
        pages
            .iter()
            .map(|page| {
                let field = Field::create(FieldType::Text, Rect::new(1.0, 2.0, 3.0, 4.0), 20.0);
                let mut fields = PageFields::new();
                fields.insert(field.id.clone(), field);
                (*page, serialize_page(&fields))
            })
            .collect()
    }

    #[test]
    fn test_edits_survive_page_navigation() {
        let mut editor = OverlayEditor::new(PageConfiguration::new(), 3, OverlayMode::Edit);
        editor.overlay_mut().capture_container(container());
        let id = draw(
            editor.overlay_mut(),
            Point::new(120.0, 60.0),
            Point::new(200.0, 90.0),
        )
        .unwrap();

        assert!(editor.go_to_page(2));
        assert!(editor.overlay().fields().is_empty());
        assert!(editor.go_to_page(1));
        assert!(editor.overlay().field(&id).is_some());
        // Leaving the page closed its inspector
        assert!(!editor.overlay().inspector().visible);
    }

    #[test]
    fn test_first_visit_merges_persisted_page() {
        let persisted = persisted_pages(&[2]);
        let mut editor = OverlayEditor::new(persisted.clone(), 3, OverlayMode::Edit);
        editor.go_to_page(2);
        assert_eq!(editor.overlay().fields(), &fields_for_page(&persisted, 2));
    }

    #[test]
    fn test_save_preserves_unvisited_pages() {
        let persisted = persisted_pages(&[1, 3]);
        // The editor opens on page 1, so page 1 counts as visited
        let mut editor = OverlayEditor::new(persisted.clone(), 3, OverlayMode::Edit);
        editor.go_to_page(2);
        editor.overlay_mut().capture_container(container());
        draw(editor.overlay_mut(), Point::new(120.0, 60.0), Point::new(200.0, 90.0));

        let saved = editor.serialize_for_save();
        assert_eq!(saved.get(&1), persisted.get(&1));
        assert_eq!(saved.get(&3), persisted.get(&3));
        assert_eq!(saved[&2].elements.len(), 1);
        assert_eq!(editor.visited_pages(), vec![1, 2]);
    }

    #[test]
    fn test_out_of_range_navigation_is_ignored() {
        let mut editor = OverlayEditor::new(PageConfiguration::new(), 2, OverlayMode::Fill);
        assert!(!editor.go_to_page(0));
        assert!(!editor.go_to_page(3));
        assert!(!editor.handle_key("ArrowUp"));
        assert!(editor.handle_key("ArrowDown"));
        assert_eq!(editor.current_page(), 2);
        assert!(!editor.handle_key("ArrowDown"));
        assert!(editor.handle_key("ArrowUp"));
        assert_eq!(editor.current_page(), 1);
    }

    #[test]
    fn test_arrow_keys_do_not_navigate_in_edit_mode() {
        let mut editor = OverlayEditor::new(PageConfiguration::new(), 2, OverlayMode::Edit);
        assert!(!editor.handle_key("ArrowDown"));
        assert_eq!(editor.current_page(), 1);
    }

    #[test]
    fn test_inspector_command_json() {
        let cmd: InspectorCommand =
            serde_json::from_str(r#"{"command":"setType","fieldType":"radio"}"#).unwrap();
        assert_eq!(
            cmd,
            InspectorCommand::SetType {
                field_type: FieldType::Radio
            }
        );
        let hit: HitTarget = serde_json::from_str(r#"{"kind":"fieldMark","id":"text-1"}"#).unwrap();
        assert_eq!(hit, HitTarget::FieldMark("text-1".to_string()));
        let hit: HitTarget =
            serde_json::from_str(r#"{"kind":"formControl","id":"radio-1"}"#).unwrap();
        assert_eq!(hit, HitTarget::FormControl("radio-1".to_string()));
    }
}
