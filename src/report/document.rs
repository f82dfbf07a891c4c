//! Page decoding and multi-page PDF output.

use crate::error::{DocumentError, Error, Result};
use crate::types::PageImage;
use crate::utils::{create_unique_file, unix_timestamp, write_claimed};
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use std::path::{Path, PathBuf};

/// Output extension
pub const REPORT_EXTENSION: &str = "pdf";

/// A document written to disk
#[derive(Clone, Debug)]
pub struct WrittenDocument {
    /// Full path
    pub path: PathBuf,
    /// File name component of `path`
    pub filename: String,
    /// Pages in the document
    pub page_count: u32,
    /// Size in bytes
    pub size: u64,
}

/// Decode raw page bytes and normalize to 8-bit RGB
pub fn decode_page(index: u32, bytes: &[u8]) -> std::result::Result<PageImage, DocumentError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| DocumentError::CorruptPage {
        index,
        reason: e.to_string(),
    })?;
    Ok(PageImage {
        index,
        image: decoded.to_rgb8(),
    })
}

/// `{display_name}_{timestamp}.pdf`
pub fn report_filename(display_name: &str, timestamp: i64) -> String {
    format!("{}_{}.{}", display_name, timestamp, REPORT_EXTENSION)
}

/// Encode pages, in slice order, into one PDF
///
/// Each page is embedded as a JPEG and its MediaBox is the pixel size at `dpi`.
pub fn encode_pdf(
    pages: &[PageImage],
    dpi: f32,
    jpeg_quality: u8,
) -> std::result::Result<Vec<u8>, DocumentError> {
    if pages.is_empty() {
        return Err(DocumentError::Empty);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for page in pages {
        kids.push(Object::Reference(add_page(
            &mut doc,
            pages_id,
            page,
            dpi,
            jpeg_quality,
        )?));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| DocumentError::EncodeFailed(e.to_string()))?;
    Ok(out)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    page: &PageImage,
    dpi: f32,
    jpeg_quality: u8,
) -> std::result::Result<ObjectId, DocumentError> {
    let (width_px, height_px) = page.image.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
        .encode_image(&page.image)
        .map_err(|e| DocumentError::EncodeFailed(format!("page {}: {}", page.index, e)))?;

    let image_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(i64::from(width_px)),
                "Height" => Object::Integer(i64::from(height_px)),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false),
    );

    let width_pt = points(width_px, dpi);
    let height_pt = points(height_px, dpi);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(width_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(height_pt),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_bytes = content
        .encode()
        .map_err(|e| DocumentError::EncodeFailed(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width_pt),
            Object::Integer(height_pt),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    }))
}

/// Pixels to PDF points (1/72 in) at `dpi`, at least 1
fn points(pixels: u32, dpi: f32) -> i64 {
    ((f64::from(pixels) * 72.0 / f64::from(dpi)).round() as i64).max(1)
}

/// Encode `pages` off the async runtime and write them to a fresh file in `dir`
pub async fn write_report(
    dir: &Path,
    display_name: &str,
    pages: Vec<PageImage>,
    dpi: f32,
    jpeg_quality: u8,
) -> Result<WrittenDocument> {
    let page_count = pages.len() as u32;
    let bytes = tokio::task::spawn_blocking(move || encode_pdf(&pages, dpi, jpeg_quality))
        .await
        .map_err(|e| Error::Other(format!("encoder task failed: {}", e)))??;

    tokio::fs::create_dir_all(dir).await?;
    let desired = dir.join(report_filename(display_name, unix_timestamp()));
    let (path, file) = create_unique_file(&desired).await?;
    write_claimed(&path, file, &bytes).await?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(WrittenDocument {
        path,
        filename,
        page_count,
        size: bytes.len() as u64,
    })
}
