use crate::error::IngestError;
use lopdf::Document;
use tracing::warn;

/// Pulls the text layer out of a PDF, page by page.
///
/// Pages that fail to decode are skipped so one bad page does not sink the
/// whole document. A parseable PDF with no text layer yields an empty string.
pub fn extract_text(content: &[u8], filename: &str) -> Result<String, IngestError> {
    let document = Document::load_mem(content).map_err(|error| IngestError::Extraction {
        filename: filename.to_string(),
        details: error.to_string(),
    })?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = match document.extract_text(&[page_no]) {
            Ok(text) => text,
            Err(error) => {
                warn!(filename, page = page_no, error = %error, "skipping unreadable pdf page");
                continue;
            }
        };

        let text = text.trim();
        if !text.is_empty() {
            pages.push(text.to_string());
        }
    }

    Ok(pages.join("\n\n"))
}

/// Builds a minimal single-font PDF with one page per entry, for tests in
/// this crate that need parseable PDF bytes.
#[cfg(test)]
pub(crate) fn pdf_with_page_text(page_texts: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in page_texts {
        let mut operations = Vec::new();
        if !text.is_empty() {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content stream should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = page_texts.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("pdf should serialize");
    buffer
}

#[cfg(test)]
mod tests {
    use super::{extract_text, pdf_with_page_text};
    use crate::error::IngestError;

    #[test]
    fn corrupt_bytes_name_the_file_in_the_error() {
        let error = extract_text(b"%PDF-not really a pdf", "broken.pdf")
            .expect_err("garbage bytes should not parse");

        match error {
            IngestError::Extraction { filename, .. } => assert_eq!(filename, "broken.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn page_text_is_extracted_and_joined() {
        let pdf = pdf_with_page_text(&["First page body", "Second page body"]);

        let text = extract_text(&pdf, "two-pages.pdf").expect("pdf should parse");

        assert!(text.contains("First page body"));
        assert!(text.contains("Second page body"));
        let first = text.find("First page body").expect("first page present");
        let second = text.find("Second page body").expect("second page present");
        assert!(first < second, "pages should stay in document order");
    }

    #[test]
    fn pdf_without_text_layer_yields_empty_string() {
        let pdf = pdf_with_page_text(&[""]);

        let text = extract_text(&pdf, "scanned.pdf").expect("pdf should parse");

        assert!(text.is_empty());
    }
}
