//! Flatten answers into the base PDF
//!
//! Every configured field is replayed as vector drawings using the same
//! rectangles, font sizes and option layout the overlay uses on screen.
//! Screen y (top-down) becomes PDF y (bottom-up) as `pageHeight - y`.

use crate::answers::{AnswerMap, AnswerValue};
use crate::config_store::PageConfiguration;
use crate::error::FormError;
use crate::fields::{Field, FieldKind, FieldRecord};
use crate::geometry::{layout_options, Layout, Rect, LABEL_GAP};
use pdf_flatten::{DrawOperation, OperationLog, OverlayWriter, PageBox, PdfRect};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Inner radio dot radius relative to the outer circle.
const RADIO_DOT_RATIO: f64 = 0.5;
/// Checkbox fill inset relative to the box side.
const CHECK_INSET_RATIO: f64 = 0.25;

/// PDF baseline for one line of text centred vertically in `rect`.
pub fn text_baseline(rect: &Rect, font_size: f64, page: &PageBox) -> f64 {
    page.to_pdf_y(rect.top + rect.height - (rect.height - font_size) / 2.0)
}

/// Produce a flattened copy of `base_pdf` with every answer drawn in.
///
/// Values stored on hydrated records are used when `answers` has no entry
/// for a field. Any failure aborts the whole export.
pub fn flatten(
    base_pdf: &[u8],
    config: &PageConfiguration,
    answers: &AnswerMap,
) -> Result<Vec<u8>, FormError> {
    let mut writer = OverlayWriter::load(base_pdf)?;
    let log = build_operations(&writer, config, answers)?;
    writer.apply(&log)?;
    let bytes = writer.save()?;
    info!(
        pages = config.len(),
        operations = log.len(),
        size = bytes.len(),
        "Flattened PDF"
    );
    Ok(bytes)
}

/// Drawing operations for every field in `config`.
pub fn build_operations(
    writer: &OverlayWriter,
    config: &PageConfiguration,
    answers: &AnswerMap,
) -> Result<OperationLog, FormError> {
    let mut log = OperationLog::new();

    for (page, page_config) in config {
        let page_box = writer.page_box(*page)?;
        for (id, record) in &page_config.elements {
            let value = answers.get(id).or(record.value.as_ref());
            draw_field(&mut log, *page, &page_box, &Field::from_record(id.clone(), record), value);
        }
    }

    Ok(log)
}

fn draw_field(
    log: &mut OperationLog,
    page: u32,
    page_box: &PageBox,
    field: &Field,
    value: Option<&AnswerValue>,
) {
    match &field.kind {
        FieldKind::Text(_) | FieldKind::Dropdown(_) => {
            let Some(text) = value.and_then(AnswerValue::as_single).filter(|s| !s.is_empty()) else {
                return;
            };
            log.add(DrawOperation::DrawText {
                id: 0,
                page,
                x: page_box.to_pdf_x(field.rect.left),
                y: text_baseline(&field.rect, field.font_size, page_box),
                text: text.to_string(),
                font_size: field.font_size,
            });
        }
        FieldKind::Radio(radio) => {
            draw_options(log, page, page_box, field, radio.layout, &radio.options, value, Marker::Circle);
        }
        FieldKind::Checkbox(checkbox) => {
            draw_options(
                log,
                page,
                page_box,
                field,
                checkbox.layout,
                &checkbox.options,
                value,
                Marker::Square,
            );
        }
        FieldKind::Canvas(_) => {
            debug!(id = %field.id, "Canvas fields are not flattened");
        }
    }
}

#[derive(Clone, Copy)]
enum Marker {
    Circle,
    Square,
}

#[allow(clippy::too_many_arguments)]
fn draw_options(
    log: &mut OperationLog,
    page: u32,
    page_box: &PageBox,
    field: &Field,
    layout: Layout,
    options: &[String],
    value: Option<&AnswerValue>,
    marker: Marker,
) {
    let fs = field.font_size;
    for slot in layout_options(&field.rect, fs, layout, options) {
        let label = &options[slot.index];
        let selected = value.map(|v| v.contains(label)).unwrap_or(false);

        match marker {
            Marker::Circle => {
                let radius = fs / 2.0;
                let center_x = page_box.to_pdf_x(slot.left + radius);
                let center_y = page_box.to_pdf_y(slot.top + radius);
                log.add(DrawOperation::DrawCircle {
                    id: 0,
                    page,
                    center_x,
                    center_y,
                    radius,
                    filled: false,
                });
                if selected {
                    log.add(DrawOperation::DrawCircle {
                        id: 0,
                        page,
                        center_x,
                        center_y,
                        radius: radius * RADIO_DOT_RATIO,
                        filled: true,
                    });
                }
            }
            Marker::Square => {
                let outer = PdfRect {
                    x: page_box.to_pdf_x(slot.left),
                    y: page_box.to_pdf_y(slot.top + fs),
                    width: fs,
                    height: fs,
                };
                log.add(DrawOperation::DrawSquare {
                    id: 0,
                    page,
                    rect: outer,
                    filled: false,
                });
                if selected {
                    let inset = fs * CHECK_INSET_RATIO;
                    log.add(DrawOperation::DrawSquare {
                        id: 0,
                        page,
                        rect: PdfRect {
                            x: outer.x + inset,
                            y: outer.y + inset,
                            width: fs - 2.0 * inset,
                            height: fs - 2.0 * inset,
                        },
                        filled: true,
                    });
                }
            }
        }

        if !label.is_empty() {
            log.add(DrawOperation::DrawText {
                id: 0,
                page,
                x: page_box.to_pdf_x(slot.left + fs + LABEL_GAP),
                y: page_box.to_pdf_y(slot.top + fs),
                text: label.clone(),
                font_size: fs,
            });
        }
    }
}

/// A non-blocking problem found before export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportWarning {
    pub page: u32,
    pub field_id: Option<String>,
    pub message: String,
}

/// Check a configuration against the base document.
///
/// Missing pages are reported here even though they make [`flatten`] fail.
/// Degenerate, off-page and option-less fields only produce warnings.
pub fn validate_for_export(
    base_pdf: &[u8],
    config: &PageConfiguration,
) -> Result<Vec<ExportWarning>, FormError> {
    let writer = OverlayWriter::load(base_pdf)?;
    let mut warnings = Vec::new();

    for (page, page_config) in config {
        let page_box = match writer.page_box(*page) {
            Ok(page_box) => page_box,
            Err(_) => {
                warnings.push(ExportWarning {
                    page: *page,
                    field_id: None,
                    message: format!(
                        "Page {} does not exist in a {}-page document",
                        page,
                        writer.page_count()
                    ),
                });
                continue;
            }
        };

        for (id, record) in &page_config.elements {
            for message in field_problems(record, &page_box) {
                warnings.push(ExportWarning {
                    page: *page,
                    field_id: Some(id.clone()),
                    message,
                });
            }
        }
    }

    Ok(warnings)
}

fn field_problems(record: &FieldRecord, page_box: &PageBox) -> Vec<String> {
    let mut problems = Vec::new();
    let rect = &record.rect;

    if rect.is_degenerate() {
        problems.push("Field has zero size".to_string());
    }
    if rect.left < 0.0
        || rect.top < 0.0
        || rect.right() > page_box.width
        || rect.bottom() > page_box.height
    {
        problems.push("Field extends past the page edge".to_string());
    }
    if let Some(options) = &record.options {
        if options.is_empty() {
            problems.push(format!("{} field has no options", record.field_type));
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_store::PageConfig;
    use crate::fields::{FieldType, DEFAULT_FONT_SIZE};
    use lopdf::content::Content;
    use lopdf::{dictionary, Document, Object, Stream};
    use pretty_assertions::assert_eq;

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

    fn config_with(page: u32, id: &str, record: FieldRecord) -> PageConfiguration {
        let mut page_config = PageConfig::default();
        page_config.elements.insert(id.to_string(), record);
        let mut config = PageConfiguration::new();
        config.insert(page, page_config);
        config
    }

    fn record(field_type: FieldType, rect: Rect) -> FieldRecord {
        let mut field = Field::create(field_type, rect, DEFAULT_FONT_SIZE);
        field.id = "f".to_string();
        field.serialize()
    }

    fn single(s: &str) -> AnswerValue {
        AnswerValue::Single(s.to_string())
    }

    fn ops_for(config: &PageConfiguration, answers: &AnswerMap) -> Vec<DrawOperation> {
        let pdf = create_test_pdf(3);
        let writer = OverlayWriter::load(&pdf).unwrap();
        build_operations(&writer, config, answers)
            .unwrap()
            .operations()
            .to_vec()
    }

    #[test]
    fn test_text_baseline_centres_line() {
        let page = PageBox {
            x: 0.0,
            y: 0.0,
            width: 612.0,
            height: 792.0,
        };
        let rect = Rect::new(50.0, 100.0, 200.0, 30.0);
        assert_eq!(text_baseline(&rect, 20.0, &page), 667.0);
    }

    #[test]
    fn test_text_answer_is_drawn_at_baseline() {
        let config = config_with(
            1,
            "text-1",
            record(FieldType::Text, Rect::new(50.0, 100.0, 200.0, 30.0)),
        );
        let mut answers = AnswerMap::new();
        answers.insert("text-1".to_string(), single("Jane Doe"));

        let ops = ops_for(&config, &answers);
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            DrawOperation::DrawText { x, y, text, font_size, page, .. } => {
                assert_eq!(*page, 1);
                assert_eq!(*x, 50.0);
                assert_eq!(*y, 667.0);
                assert_eq!(text, "Jane Doe");
                assert_eq!(*font_size, 20.0);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_unanswered_text_draws_nothing() {
        let config = config_with(1, "t", record(FieldType::Text, Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(ops_for(&config, &AnswerMap::new()).is_empty());
    }

    #[test]
    fn test_hydrated_value_is_used_without_answers() {
        let mut rec = record(FieldType::Dropdown, Rect::new(50.0, 100.0, 200.0, 30.0));
        rec.value = Some(single("Option 2"));
        let ops = ops_for(&config_with(2, "d", rec), &AnswerMap::new());
        assert!(matches!(&ops[..], [DrawOperation::DrawText { text, page: 2, .. }] if text == "Option 2"));
    }

    #[test]
    fn test_radio_draws_circles_and_one_dot() {
        let config = config_with(1, "r", record(FieldType::Radio, Rect::new(50.0, 100.0, 200.0, 120.0)));
        let mut answers = AnswerMap::new();
        answers.insert("r".to_string(), single("Option 2"));

        let ops = ops_for(&config, &answers);
        let circles: Vec<(f64, f64, f64, bool)> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOperation::DrawCircle {
                    center_x,
                    center_y,
                    radius,
                    filled,
                    ..
                } => Some((*center_x, *center_y, *radius, *filled)),
                _ => None,
            })
            .collect();
        assert_eq!(circles.len(), 4);
        assert_eq!(circles.iter().filter(|c| c.3).count(), 1);

        // First option: slot at (58, 104), radius 10
        assert_eq!(circles[0], (68.0, 792.0 - 114.0, 10.0, false));
        // Selected dot shares the second circle's centre
        assert_eq!(circles[2].0, circles[1].0);
        assert_eq!(circles[2].1, circles[1].1);
        assert_eq!(circles[2].2, 5.0);

        let labels = ops
            .iter()
            .filter(|op| matches!(op, DrawOperation::DrawText { .. }))
            .count();
        assert_eq!(labels, 3);
    }

    #[test]
    fn test_checkbox_fills_selected_boxes() {
        let config = config_with(
            1,
            "c",
            record(FieldType::Checkbox, Rect::new(50.0, 100.0, 200.0, 120.0)),
        );
        let mut answers = AnswerMap::new();
        answers.insert(
            "c".to_string(),
            AnswerValue::Multiple(vec!["Option 1".to_string(), "Option 3".to_string()]),
        );

        let ops = ops_for(&config, &answers);
        let squares: Vec<(PdfRect, bool)> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOperation::DrawSquare { rect, filled, .. } => Some((*rect, *filled)),
                _ => None,
            })
            .collect();
        assert_eq!(squares.len(), 5);
        assert_eq!(
            squares[0].0,
            PdfRect {
                x: 58.0,
                y: 792.0 - 124.0,
                width: 20.0,
                height: 20.0
            }
        );
        assert_eq!(
            squares[1],
            (
                PdfRect {
                    x: 63.0,
                    y: 792.0 - 119.0,
                    width: 10.0,
                    height: 10.0
                },
                true
            )
        );
    }

    #[test]
    fn test_canvas_is_not_flattened() {
        let config = config_with(1, "s", record(FieldType::Canvas, Rect::new(0.0, 0.0, 50.0, 50.0)));
        let mut answers = AnswerMap::new();
        answers.insert("s".to_string(), single("data:image/png;base64,AAAA"));
        assert!(ops_for(&config, &answers).is_empty());
    }

    #[test]
    fn test_missing_page_aborts_export() {
        let config = config_with(9, "t", record(FieldType::Text, Rect::new(0.0, 0.0, 10.0, 10.0)));
        let result = flatten(&create_test_pdf(2), &config, &AnswerMap::new());
        assert!(matches!(
            result,
            Err(FormError::Export(pdf_flatten::FlattenError::PageNotFound(9)))
        ));
    }

    #[test]
    fn test_bad_base_pdf_aborts_export() {
        let result = flatten(b"not a pdf", &PageConfiguration::new(), &AnswerMap::new());
        assert!(matches!(result, Err(FormError::Export(_))));
    }

    #[test]
    fn test_flatten_appends_to_page_content() {
        let config = config_with(
            1,
            "text-1",
            record(FieldType::Text, Rect::new(50.0, 100.0, 200.0, 30.0)),
        );
        let mut answers = AnswerMap::new();
        answers.insert("text-1".to_string(), single("Jane Doe"));

        let out = flatten(&create_test_pdf(1), &config, &answers).unwrap();
        let doc = Document::load_mem(&out).unwrap();
        let page_id = doc.get_pages()[&1];
        let contents = doc.get_page_contents(page_id);
        let overlay = doc
            .get_object(*contents.last().unwrap())
            .unwrap()
            .as_stream()
            .unwrap();
        let ops = Content::decode(&overlay.content).unwrap().operations;
        let td = ops.iter().find(|op| op.operator == "Td").unwrap();
        assert_eq!(td.operands[1].as_float().unwrap(), 667.0);
    }

    #[test]
    fn test_validate_reports_warnings() {
        let mut config = config_with(1, "zero", record(FieldType::Text, Rect::new(10.0, 10.0, 0.0, 0.0)));
        let mut empty_radio = record(FieldType::Radio, Rect::new(600.0, 10.0, 50.0, 50.0));
        empty_radio.options = Some(Vec::new());
        config.get_mut(&1).unwrap().elements.insert("radio".to_string(), empty_radio);
        config.insert(5, PageConfig::default());

        let warnings = validate_for_export(&create_test_pdf(2), &config).unwrap();
        let messages: Vec<(u32, Option<&str>, &str)> = warnings
            .iter()
            .map(|w| (w.page, w.field_id.as_deref(), w.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (1, Some("radio"), "Field extends past the page edge"),
                (1, Some("radio"), "radio field has no options"),
                (1, Some("zero"), "Field has zero size"),
                (5, None, "Page 5 does not exist in a 2-page document"),
            ]
        );
    }
}
