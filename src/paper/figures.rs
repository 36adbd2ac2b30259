//! Figure export.
//!
//! Embedded image XObjects are pulled out of the PDF with lopdf. JPEG and
//! JPEG 2000 streams are written as they are; 8-bit RGB and grayscale
//! bitmaps (raw or Flate-compressed) are re-encoded as PNG.

use crate::models::Figure;
use anyhow::{Context, Result};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::filters::png;
use lopdf::xobject::PdfImage;
use lopdf::{Document, Object};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Size thresholds below which an image is treated as decoration.
#[derive(Debug, Clone, Copy)]
pub struct FigureFilter {
    pub min_bytes: usize,
    pub min_side: i64,
}

impl Default for FigureFilter {
    fn default() -> Self {
        Self {
            min_bytes: 10 * 1024,
            min_side: 100,
        }
    }
}

impl FigureFilter {
    pub fn accepts(&self, byte_len: usize, width: i64, height: i64) -> bool {
        byte_len >= self.min_bytes && width >= self.min_side && height >= self.min_side
    }
}

/// How an image stream ends up on disk.
enum Export {
    /// Stream bytes are already a viewable file with this extension.
    Raw(&'static str),
    /// Decoded samples, written as PNG.
    Png(DynamicImage),
}

/// Export embedded images to `output_dir` as `<pdf-stem>_fig<N>.<ext>`.
pub fn extract_figures(pdf_path: &Path, output_dir: &Path, filter: &FigureFilter) -> Result<Vec<Figure>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let document = Document::load(pdf_path)
        .with_context(|| format!("Failed to load PDF with lopdf: {}", pdf_path.display()))?;
    let paper_id = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "paper".to_string());

    let mut figures = Vec::new();
    let mut seen = HashSet::new();
    let mut counter = 0;

    for (page_num, page_id) in document.get_pages() {
        let images = match document.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                debug!("No images readable on page {}: {}", page_num, e);
                continue;
            }
        };

        // Computed on first use; most pages carry no figure
        let mut page_caption: Option<Option<String>> = None;

        for image in images {
            // Same XObject referenced from several pages
            if !seen.insert(image.id) {
                continue;
            }
            if !filter.accepts(image.content.len(), image.width, image.height) {
                continue;
            }
            let Some(export) = prepare_export(&image) else {
                debug!(
                    "Skipping image {:?} on page {}: unsupported encoding {:?} / {:?}",
                    image.id, page_num, image.filters, image.color_space
                );
                continue;
            };

            counter += 1;
            let filename = match export {
                Export::Raw(ext) => {
                    let filename = format!("{}_fig{}.{}", paper_id, counter, ext);
                    let path = output_dir.join(&filename);
                    fs::write(&path, image.content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    filename
                }
                Export::Png(bitmap) => {
                    let filename = format!("{}_fig{}.png", paper_id, counter);
                    let path = output_dir.join(&filename);
                    bitmap
                        .save_with_format(&path, ImageFormat::Png)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    filename
                }
            };

            let caption = page_caption
                .get_or_insert_with(|| {
                    document
                        .extract_text(&[page_num])
                        .ok()
                        .and_then(|text| find_caption(&text))
                })
                .clone();

            info!(
                "Saved {} ({}x{}) from page {}",
                filename, image.width, image.height, page_num
            );
            figures.push(Figure {
                path: output_dir.join(filename),
                caption,
                page_number: page_num as usize,
            });
        }
    }

    Ok(figures)
}

fn prepare_export(image: &PdfImage) -> Option<Export> {
    match image.filters.as_deref() {
        Some([only]) if only == "DCTDecode" => Some(Export::Raw("jpg")),
        Some([only]) if only == "JPXDecode" => Some(Export::Raw("jp2")),
        Some([only]) if only == "FlateDecode" => {
            let samples = inflate(image.content)?;
            decode_bitmap(image, samples).map(Export::Png)
        }
        None | Some([]) => decode_bitmap(image, image.content.to_vec()).map(Export::Png),
        _ => None,
    }
}

fn inflate(content: &[u8]) -> Option<Vec<u8>> {
    let mut samples = Vec::with_capacity(content.len() * 2);
    if let Err(e) = ZlibDecoder::new(content).read_to_end(&mut samples) {
        // Truncated streams still yield usable rows
        debug!("Inflate stopped early after {} bytes: {}", samples.len(), e);
        if samples.is_empty() {
            return None;
        }
    }
    Some(samples)
}

/// Build a bitmap from 8-bit DeviceRGB or DeviceGray samples.
fn decode_bitmap(image: &PdfImage, mut samples: Vec<u8>) -> Option<DynamicImage> {
    if image.bits_per_component != Some(8) {
        return None;
    }
    let channels = match image.color_space.as_deref() {
        Some("DeviceRGB") => 3,
        Some("DeviceGray") => 1,
        _ => return None,
    };
    let width = u32::try_from(image.width).ok()?;
    let height = u32::try_from(image.height).ok()?;

    let predictor = image
        .origin_dict
        .get(b"DecodeParms")
        .and_then(Object::as_dict)
        .and_then(|params| params.get(b"Predictor"))
        .and_then(Object::as_i64)
        .unwrap_or(1);
    match predictor {
        1 => {}
        10..=15 => samples = png::decode_frame(&samples, channels, width as usize).ok()?,
        _ => return None,
    }

    let expected = width as usize * height as usize * channels;
    if samples.len() < expected {
        return None;
    }
    samples.truncate(expected);

    match channels {
        3 => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        _ => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
    }
}

/// First line of page text that reads like a figure caption.
pub fn find_caption(page_text: &str) -> Option<String> {
    page_text
        .lines()
        .map(str::trim)
        .find(|line| {
            let lower = line.to_lowercase();
            lower.starts_with("figure") || lower.starts_with("fig.")
        })
        .map(String::from)
}
