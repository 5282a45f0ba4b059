//! PDF page reading built on `lopdf`.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use super::layout::{
    PageFonts, collect_fragments, detect_tables, has_stray_controls, layout_text, strip_stray_controls,
};
use super::{PageContent, PageSource};
use crate::error::{RagError, Result};

/// A [`PageSource`] that reads PDF files with `lopdf`.
///
/// Page text comes from the positioned layout of the page's content stream,
/// one line per baseline, with strings decoded through each font's encoding
/// or `ToUnicode` map. When the layout pass finds no text, or decoding left
/// control characters behind, `lopdf`'s own text extraction is tried
/// instead. Tables are detected from the same layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl PdfReader {
    /// Create a new PDF reader.
    pub fn new() -> Self {
        Self
    }

    /// Read the pages of an already-loaded document.
    pub fn read_document(&self, doc: &Document, path: &Path) -> Result<Vec<PageContent>> {
        let mut pages = Vec::new();

        for (number, page_id) in doc.get_pages() {
            let content = doc.get_and_decode_page_content(page_id).map_err(|e| {
                RagError::Extraction {
                    path: path.to_path_buf(),
                    message: format!("failed to decode page {number}: {e}"),
                }
            })?;

            let fonts = PageFonts::load(doc, page_id);
            let mut fragments = collect_fragments(&content.operations, &fonts);
            let garbled = fragments.iter().any(|f| has_stray_controls(&f.text));
            if garbled {
                warn!(path = %path.display(), page = number, "undecodable text on page");
                for fragment in &mut fragments {
                    fragment.text = strip_stray_controls(&fragment.text);
                }
                fragments.retain(|f| !f.text.trim().is_empty());
            }
            let tables = detect_tables(&fragments);

            let mut text = layout_text(&fragments);
            if garbled || text.trim().is_empty() {
                match doc.extract_text(&[number]) {
                    Ok(extracted)
                        if !extracted.trim().is_empty() && !has_stray_controls(&extracted) =>
                    {
                        text = extracted;
                    }
                    Ok(_) => {}
                    Err(e) => debug!(page = number, error = %e, "no extractable text on page"),
                }
            }

            pages.push(PageContent { number, text, tables });
        }

        Ok(pages)
    }
}

impl PageSource for PdfReader {
    fn read_pages(&self, path: &Path) -> Result<Vec<PageContent>> {
        let doc = Document::load(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to open PDF");
            RagError::Extraction { path: path.to_path_buf(), message: format!("failed to open PDF: {e}") }
        })?;

        self.read_document(&doc, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    /// Write a PDF whose pages each hold the given positioned strings.
    fn write_pdf(path: &Path, pages: &[Vec<(i64, i64, &str)>]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for strings in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
            ];
            for &(x, y, text) in strings {
                operations.push(Operation::new(
                    "Tm",
                    vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), y.into()],
                ));
                operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn reads_text_and_tables_per_page() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("riviera.pdf");
        write_pdf(
            &path,
            &[
                vec![(72, 700, "Nice is a coastal city.")],
                vec![(72, 700, "City"), (222, 700, "Feature"), (72, 680, "Cannes"), (222, 680, "Film Festival")],
            ],
        );

        let pages = PdfReader::new().read_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);

        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "Nice is a coastal city.");
        assert!(pages[0].tables.is_empty());

        assert_eq!(pages[1].text, "City Feature\nCannes Film Festival");
        assert_eq!(
            pages[1].tables,
            vec![vec![
                vec![Some("City".to_string()), Some("Feature".to_string())],
                vec![Some("Cannes".to_string()), Some("Film Festival".to_string())],
            ]]
        );
    }

    /// Write a one-page PDF showing `text` as two-byte codes in a Type0
    /// font with `Identity-H` encoding, optionally with a `ToUnicode` map.
    fn write_type0_pdf(path: &Path, text: &str, to_unicode: bool) {
        const IDENTITY_UCS: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CMapType 2 def
/CMapName/R1 def
1 begincodespacerange
<0000><ffff>
endcodespacerange
1 beginbfrange
<0000><00ff><0000>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end end
";
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "ArialMT",
            "Encoding" => "Identity-H",
        };
        if to_unicode {
            let cmap_id =
                doc.add_object(Stream::new(dictionary! {}, IDENTITY_UCS.as_bytes().to_vec()));
            font.set("ToUnicode", cmap_id);
        }
        let font_id = doc.add_object(font);
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let codes: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
        let operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::String(codes, lopdf::StringFormat::Hexadecimal)]),
            Operation::new("ET", vec![]),
        ];
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn type0_font_decodes_through_to_unicode_map() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("identity.pdf");
        write_type0_pdf(&path, "Cannes Film Festival", true);

        let pages = PdfReader::new().read_pages(&path).unwrap();
        assert_eq!(pages[0].text, "Cannes Film Festival");
    }

    #[test]
    fn type0_font_without_map_never_yields_control_characters() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("identity.pdf");
        write_type0_pdf(&path, "Cannes Film Festival", false);

        let pages = PdfReader::new().read_pages(&path).unwrap();
        assert!(!pages[0].text.contains('\0'));
        assert_eq!(pages[0].text, "Cannes Film Festival");
    }

    #[test]
    fn garbage_file_is_an_extraction_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = PdfReader::new().read_pages(&path).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
