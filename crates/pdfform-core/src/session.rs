//! Edit, fill and review sessions over a [`FormBackend`]
//!
//! Sessions are the only place the core awaits the backend. A failed call
//! returns its error to the caller and leaves the session's in-memory
//! state as it was.

use crate::answers::{extract_inline_blobs, AnswerMap};
use crate::backend::{AccessMode, AnswerRecord, FileRef, FormBackend, PdfRecord, RecordKind, RecordScope};
use crate::config_store::{
    canvas_field_ids, fetch_configuration, hydrate_for_fill, parse_configuration, PageConfiguration,
};
use crate::error::FormError;
use crate::export::flatten;
use crate::fields::{FieldEdit, FieldView, FillEvent};
use crate::overlay::{OverlayEditor, OverlayMode};
use tracing::{info, warn};

/// Teacher session editing a PDF's field layout.
pub struct EditSession {
    pdf: PdfRecord,
    requester: String,
    editor: OverlayEditor,
}

impl EditSession {
    /// Open a PDF's layout for editing.
    ///
    /// Saving overwrites the whole stored configuration, so unlike the fill
    /// and review sessions this refuses to open when the stored
    /// configuration cannot be fetched or parsed.
    pub async fn open<B: FormBackend + ?Sized>(
        backend: &B,
        pdf_id: &str,
        requester: &str,
        page_count: u32,
    ) -> Result<Self, FormError> {
        let pdf = backend
            .fetch_pdf_record(pdf_id, AccessMode::Edit, requester)
            .await?;
        let config = load_configuration(backend, &pdf).await?;
        info!(pdf_id, pages = config.len(), "Opened edit session");
        Ok(Self {
            pdf,
            requester: requester.to_string(),
            editor: OverlayEditor::new(config, page_count, OverlayMode::Edit),
        })
    }

    pub fn pdf(&self) -> &PdfRecord {
        &self.pdf
    }

    pub fn editor(&self) -> &OverlayEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut OverlayEditor {
        &mut self.editor
    }

    /// Edit-mode views of the current page.
    pub fn current_views(&self) -> Vec<FieldView> {
        self.editor.overlay().views(&AnswerMap::new())
    }

    pub fn edit_field(&mut self, field_id: &str, edit: &FieldEdit) -> Result<(), FormError> {
        self.editor.overlay_mut().edit_field(field_id, edit)
    }

    /// Persist the whole configuration, overwriting the stored one.
    pub async fn save<B: FormBackend + ?Sized>(&mut self, backend: &B) -> Result<FileRef, FormError> {
        let config = self.editor.serialize_for_save();
        let file = backend
            .save_configuration(&self.pdf.id, &self.requester, &config)
            .await?;
        self.pdf.config = Some(file.clone());
        self.editor.mark_saved(config);
        Ok(file)
    }
}

/// Student session filling in a PDF.
pub struct FillSession {
    pdf: PdfRecord,
    requester: String,
    editor: OverlayEditor,
    answers: AnswerMap,
    resumed_from: Option<String>,
}

impl FillSession {
    /// Open a PDF for filling, resuming from the requester's latest draft.
    pub async fn open<B: FormBackend + ?Sized>(
        backend: &B,
        pdf_id: &str,
        requester: &str,
        page_count: u32,
    ) -> Result<Self, FormError> {
        let pdf = backend
            .fetch_pdf_record(pdf_id, AccessMode::View, requester)
            .await?;
        let config = fetch_configuration(backend, pdf.config_url()).await;

        let latest = match backend
            .list_answer_records(pdf_id, requester, RecordKind::Draft, RecordScope::Own)
            .await
        {
            Ok(drafts) => drafts.into_iter().next(),
            Err(e) => {
                warn!(pdf_id, error = %e, "Could not load drafts, starting empty");
                None
            }
        };
        let (answers, resumed_from) = match latest {
            Some(draft) => (draft.values, Some(draft.id)),
            None => (AnswerMap::new(), None),
        };

        info!(pdf_id, resumed = resumed_from.is_some(), "Opened fill session");
        Ok(Self {
            pdf,
            requester: requester.to_string(),
            editor: OverlayEditor::new(config, page_count, OverlayMode::Fill),
            answers,
            resumed_from,
        })
    }

    pub fn pdf(&self) -> &PdfRecord {
        &self.pdf
    }

    pub fn editor(&self) -> &OverlayEditor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut OverlayEditor {
        &mut self.editor
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    /// Id of the draft the session was restored from.
    pub fn resumed_from(&self) -> Option<&str> {
        self.resumed_from.as_deref()
    }

    pub fn current_views(&self) -> Vec<FieldView> {
        self.editor.overlay().views(&self.answers)
    }

    pub fn handle_key(&mut self, key: &str) -> bool {
        self.editor.handle_key(key)
    }

    /// Record a value change from a fillable widget.
    pub fn fill(&mut self, field_id: &str, event: &FillEvent) -> Result<(), FormError> {
        let field = self
            .editor
            .find_field(field_id)
            .ok_or_else(|| FormError::NotFound(format!("Field {}", field_id)))?;
        let value = field.apply_fill(self.answers.get(field_id), event)?;
        self.answers.insert(field_id.to_string(), value);
        Ok(())
    }

    /// Configuration with the current answers merged in.
    pub fn hydrated(&self) -> PageConfiguration {
        hydrate_for_fill(self.editor.persisted(), &self.answers)
    }

    pub async fn save_draft<B: FormBackend + ?Sized>(&self, backend: &B) -> Result<String, FormError> {
        self.store(backend, RecordKind::Draft).await
    }

    pub async fn submit<B: FormBackend + ?Sized>(&self, backend: &B) -> Result<String, FormError> {
        self.store(backend, RecordKind::Submission).await
    }

    async fn store<B: FormBackend + ?Sized>(
        &self,
        backend: &B,
        kind: RecordKind,
    ) -> Result<String, FormError> {
        let canvas = canvas_field_ids(self.editor.persisted());
        let (values, blobs) = extract_inline_blobs(&self.answers, &canvas)?;
        let id = backend
            .save_answer_record(&self.pdf.id, &self.requester, kind, values, blobs)
            .await?;
        info!(pdf_id = %self.pdf.id, kind = kind.as_str(), record = %id, "Stored answers");
        Ok(id)
    }
}

/// Read-only view of one submission.
pub struct ReviewSession {
    pdf: PdfRecord,
    requester: String,
    record: AnswerRecord,
    editor: OverlayEditor,
}

impl ReviewSession {
    /// Every submission for a PDF. Creator only.
    pub async fn list_submissions<B: FormBackend + ?Sized>(
        backend: &B,
        pdf_id: &str,
        requester: &str,
    ) -> Result<Vec<AnswerRecord>, FormError> {
        backend
            .list_answer_records(pdf_id, requester, RecordKind::Submission, RecordScope::All)
            .await
    }

    pub async fn open<B: FormBackend + ?Sized>(
        backend: &B,
        pdf_id: &str,
        requester: &str,
        submission_id: &str,
        page_count: u32,
    ) -> Result<Self, FormError> {
        let pdf = backend
            .fetch_pdf_record(pdf_id, AccessMode::View, requester)
            .await?;
        let record = backend
            .fetch_answer_record(pdf_id, requester, RecordKind::Submission, submission_id)
            .await?;
        let config = fetch_configuration(backend, pdf.config_url()).await;
        let hydrated = hydrate_for_fill(&config, &record.values);

        Ok(Self {
            pdf,
            requester: requester.to_string(),
            record,
            editor: OverlayEditor::new(hydrated, page_count, OverlayMode::ReadOnly),
        })
    }

    pub fn record(&self) -> &AnswerRecord {
        &self.record
    }

    pub fn editor(&self) -> &OverlayEditor {
        &self.editor
    }

    pub fn current_views(&self) -> Vec<FieldView> {
        self.editor.overlay().views(&self.record.values)
    }

    pub fn handle_key(&mut self, key: &str) -> bool {
        self.editor.handle_key(key)
    }

    /// Flattened PDF with this submission burned in. Creator only.
    pub async fn export<B: FormBackend + ?Sized>(&self, backend: &B) -> Result<Vec<u8>, FormError> {
        export_submission(backend, &self.pdf.id, &self.requester, &self.record.id).await
    }
}

/// Flatten a stored submission into its PDF.
///
/// Unlike rendering, export does not tolerate a missing or malformed
/// configuration: any failure aborts with no output.
pub async fn export_submission<B: FormBackend + ?Sized>(
    backend: &B,
    pdf_id: &str,
    requester: &str,
    submission_id: &str,
) -> Result<Vec<u8>, FormError> {
    let pdf = backend
        .fetch_pdf_record(pdf_id, AccessMode::Edit, requester)
        .await?;
    let record = backend
        .fetch_answer_record(pdf_id, requester, RecordKind::Submission, submission_id)
        .await?;
    let config = load_configuration(backend, &pdf).await?;
    let base = backend.fetch_pdf_bytes(&pdf).await?;
    flatten(&base, &config, &record.values)
}

/// Fetch and parse the stored configuration, failing on any error.
async fn load_configuration<B: FormBackend + ?Sized>(
    backend: &B,
    pdf: &PdfRecord,
) -> Result<PageConfiguration, FormError> {
    match pdf.config_url() {
        Some(url) => parse_configuration(&backend.fetch_configuration_json(url).await?),
        None => Ok(PageConfiguration::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use crate::backend::MemoryBackend;
    use crate::canvas::CanvasSurface;
    use crate::fields::{FieldType, Widget};
    use crate::geometry::{ContainerRect, Point};
    use crate::overlay::{HitTarget, InspectorCommand, PointerButton};
    use lopdf::{dictionary, Document, Object, Stream};

    const TEACHER: &str = "teacher@school";
    const STUDENT: &str = "student@school";

    fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..num_pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET\n".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn setup() -> (MemoryBackend, PdfRecord) {
        let backend = MemoryBackend::new();
        let pdf = backend
            .insert_pdf("Worksheet", TEACHER, &[STUDENT], create_test_pdf(3))
            .unwrap();
        (backend, pdf)
    }

    /// Draw a field on the current page and give it a type.
    fn draw_field(session: &mut EditSession, field_type: FieldType) -> String {
        let overlay = session.editor_mut().overlay_mut();
        overlay.capture_container(ContainerRect::new(0.0, 0.0, 612.0, 792.0));
        overlay.pointer_down(Point::new(50.0, 100.0), PointerButton::Primary, &HitTarget::Empty);
        let id = overlay.pointer_up(Point::new(250.0, 130.0)).unwrap();
        overlay
            .apply_command(&InspectorCommand::SetType { field_type })
            .unwrap();
        overlay.close_inspector();
        id
    }

    #[tokio::test]
    async fn test_edit_session_requires_creator() {
        let (backend, pdf) = setup();
        assert!(matches!(
            EditSession::open(&backend, &pdf.id, STUDENT, 3).await,
            Err(FormError::Forbidden(_))
        ));
        assert!(matches!(
            EditSession::open(&backend, "missing", TEACHER, 3).await,
            Err(FormError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_then_reopen_restores_fields() {
        let (backend, pdf) = setup();
        let mut session = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let id = draw_field(&mut session, FieldType::Radio);
        session.save(&backend).await.unwrap();
        assert!(session.pdf().config.is_some());

        let reopened = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let field = reopened.editor().overlay().field(&id).unwrap();
        assert_eq!(field.field_type(), FieldType::Radio);
        assert_eq!(field.options().map(|o| o.len()), Some(3));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_editor_state() {
        let (backend, pdf) = setup();
        let mut session = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let id = draw_field(&mut session, FieldType::Text);

        backend.set_offline(true).unwrap();
        assert!(matches!(
            session.save(&backend).await,
            Err(FormError::TransientIo(_))
        ));
        assert!(session.editor().overlay().field(&id).is_some());
        assert!(session.editor().persisted().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_configuration_renders_empty() {
        let (backend, pdf) = setup();
        backend.put_configuration_json(&pdf.id, "{oops").unwrap();
        let session = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        assert!(session.current_views().is_empty());
    }

    #[tokio::test]
    async fn test_edit_session_refuses_unreadable_configuration() {
        let (backend, pdf) = setup();
        let mut editing = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        draw_field(&mut editing, FieldType::Text);
        editing.editor_mut().go_to_page(2);
        draw_field(&mut editing, FieldType::Radio);
        editing.save(&backend).await.unwrap();
        let stored = backend.blob(&editing.pdf().config.clone().unwrap().path).unwrap();

        backend.put_configuration_json(&pdf.id, "{oops").unwrap();
        assert!(matches!(
            EditSession::open(&backend, &pdf.id, TEACHER, 3).await,
            Err(FormError::Serialization(_))
        ));

        // A failed fetch must not hand out an empty editor that would
        // overwrite the stored pages on save
        let json = String::from_utf8(stored.unwrap()).unwrap();
        backend.put_configuration_json(&pdf.id, &json).unwrap();
        backend.set_offline(true).unwrap();
        assert!(matches!(
            EditSession::open(&backend, &pdf.id, TEACHER, 3).await,
            Err(FormError::TransientIo(_))
        ));
        backend.set_offline(false).unwrap();

        let reopened = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        assert_eq!(reopened.editor().persisted().len(), 2);
    }

    #[tokio::test]
    async fn test_text_answers_that_look_like_files_are_saved_verbatim() {
        let (backend, pdf) = setup();
        let mut editing = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let text_id = draw_field(&mut editing, FieldType::Text);
        editing.save(&backend).await.unwrap();

        let mut filling = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        for text in ["hello", "blob:my answer", "data:science is fun", "blob:canvas-1"] {
            filling
                .fill(
                    &text_id,
                    &FillEvent::Text {
                        value: text.to_string(),
                    },
                )
                .unwrap();
            let id = filling.save_draft(&backend).await.unwrap();
            let stored = backend
                .fetch_answer_record(&pdf.id, STUDENT, RecordKind::Draft, &id)
                .await
                .unwrap();
            assert_eq!(stored.values[&text_id], AnswerValue::Single(text.to_string()));
        }
    }

    #[tokio::test]
    async fn test_fill_draft_resume_and_submit() {
        let (backend, pdf) = setup();
        let mut editing = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let text_id = draw_field(&mut editing, FieldType::Text);
        editing.save(&backend).await.unwrap();

        let mut filling = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        assert_eq!(filling.resumed_from(), None);
        filling
            .fill(
                &text_id,
                &FillEvent::Text {
                    value: "Jane Doe".to_string(),
                },
            )
            .unwrap();
        let draft_id = filling.save_draft(&backend).await.unwrap();

        let resumed = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        assert_eq!(resumed.resumed_from(), Some(draft_id.as_str()));
        assert_eq!(
            resumed.answers()[&text_id],
            AnswerValue::Single("Jane Doe".to_string())
        );
        match &resumed.current_views()[0].widget {
            Widget::TextInput { value, .. } => assert_eq!(value, "Jane Doe"),
            other => panic!("unexpected widget {:?}", other),
        }

        let submission_id = resumed.submit(&backend).await.unwrap();
        let submissions = ReviewSession::list_submissions(&backend, &pdf.id, TEACHER)
            .await
            .unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].id, submission_id);
        assert!(ReviewSession::list_submissions(&backend, &pdf.id, STUDENT)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_fill_unknown_field_is_rejected() {
        let (backend, pdf) = setup();
        let mut filling = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        assert!(matches!(
            filling.fill(
                "text-missing",
                &FillEvent::Text {
                    value: "x".to_string()
                }
            ),
            Err(FormError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_canvas_value_is_uploaded_as_blob() {
        let (backend, pdf) = setup();
        let mut editing = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let canvas_id = draw_field(&mut editing, FieldType::Canvas);
        editing.save(&backend).await.unwrap();

        let mut filling = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        let mut surface = CanvasSurface::new(200, 30);
        surface.begin_stroke(Point::new(5.0, 5.0));
        surface.extend_stroke(Point::new(100.0, 20.0));
        let data_uri = surface.end_stroke().unwrap();
        filling
            .fill(&canvas_id, &FillEvent::Canvas { data_uri })
            .unwrap();
        let id = filling.submit(&backend).await.unwrap();

        let stored = backend
            .fetch_answer_record(&pdf.id, STUDENT, RecordKind::Submission, &id)
            .await
            .unwrap();
        let url = stored.values[&canvas_id].as_single().unwrap();
        assert!(url.starts_with("memory://answers/"));
    }

    #[tokio::test]
    async fn test_review_and_export() {
        let (backend, pdf) = setup();
        let mut editing = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let text_id = draw_field(&mut editing, FieldType::Text);
        editing.save(&backend).await.unwrap();

        let mut filling = FillSession::open(&backend, &pdf.id, STUDENT, 3).await.unwrap();
        filling
            .fill(
                &text_id,
                &FillEvent::Text {
                    value: "Answer".to_string(),
                },
            )
            .unwrap();
        let submission_id = filling.submit(&backend).await.unwrap();

        // The author can review their own submission but not export it
        let own = ReviewSession::open(&backend, &pdf.id, STUDENT, &submission_id, 3)
            .await
            .unwrap();
        assert!(!own.current_views()[0].interactive);
        assert!(matches!(own.export(&backend).await, Err(FormError::Forbidden(_))));

        let review = ReviewSession::open(&backend, &pdf.id, TEACHER, &submission_id, 3)
            .await
            .unwrap();
        let bytes = review.export(&backend).await.unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[tokio::test]
    async fn test_export_fails_on_malformed_configuration() {
        let (backend, pdf) = setup();
        let id = backend
            .save_answer_record(&pdf.id, STUDENT, RecordKind::Submission, AnswerMap::new(), vec![])
            .await
            .unwrap();
        backend.put_configuration_json(&pdf.id, "[1, 2").unwrap();
        assert!(matches!(
            export_submission(&backend, &pdf.id, TEACHER, &id).await,
            Err(FormError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_unvisited_pages_survive_session_save() {
        let (backend, pdf) = setup();
        let mut first = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let page1 = draw_field(&mut first, FieldType::Text);
        first.editor_mut().go_to_page(3);
        let page3 = draw_field(&mut first, FieldType::Checkbox);
        first.save(&backend).await.unwrap();

        // Second session only edits page 2; the editor opens on page 1
        let mut second = EditSession::open(&backend, &pdf.id, TEACHER, 3).await.unwrap();
        let before = second.editor().persisted().clone();
        second.editor_mut().go_to_page(2);
        draw_field(&mut second, FieldType::Dropdown);
        second.save(&backend).await.unwrap();

        let after = second.editor().persisted();
        assert_eq!(after.get(&1), before.get(&1));
        assert_eq!(after.get(&3), before.get(&3));
        assert!(after[&1].elements.contains_key(&page1));
        assert!(after[&3].elements.contains_key(&page3));
        assert_eq!(after[&2].elements.len(), 1);
    }
}
