//! Slides and batches.
//!
//! Document extraction is a collaborator boundary: whatever reads the PDF
//! hands this crate an ordered sequence of per-page text (and optionally a
//! rendered raster). [`slides_from_pages`] adapts that sequence into
//! [`Slide`]s, and [`batch_slides`] partitions them into the fixed-size
//! groups the summarization loop walks.

use image::DynamicImage;

/// One page of the source deck with its extracted text and optional render.
///
/// Immutable once extracted; owned by the pipeline for the duration of one
/// evaluation.
#[derive(Debug, Clone)]
pub struct Slide {
    /// Ordinal position in the deck, 0-based.
    pub index: usize,
    /// Extracted plain text.
    pub text: String,
    /// Rendered raster, present only when the extractor produced one.
    pub image: Option<DynamicImage>,
}

impl Slide {
    pub fn text_only(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(index: usize, text: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            index,
            text: text.into(),
            image: Some(image),
        }
    }
}

/// An ordered, contiguous group of slides summarized in one call.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Position of this batch in the deck, 0-based.
    pub index: usize,
    pub slides: Vec<Slide>,
}

impl Batch {
    /// All slide text, in slide order, blank-line separated.
    pub fn text(&self) -> String {
        self.slides
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// First and last slide index covered by this batch.
    pub fn slide_range(&self) -> (usize, usize) {
        let first = self.slides.first().map(|s| s.index).unwrap_or(0);
        let last = self.slides.last().map(|s| s.index).unwrap_or(first);
        (first, last)
    }

    /// Rendered rasters of the slides that have one, in slide order.
    pub fn images(&self) -> impl Iterator<Item = (usize, &DynamicImage)> {
        self.slides
            .iter()
            .filter_map(|s| s.image.as_ref().map(|img| (s.index, img)))
    }
}

/// Adapt an extractor's ordered (text, image) pairs into slides.
///
/// Page order is preserved exactly; indices are assigned by position.
pub fn slides_from_pages<I>(pages: I) -> Vec<Slide>
where
    I: IntoIterator<Item = (String, Option<DynamicImage>)>,
{
    pages
        .into_iter()
        .enumerate()
        .map(|(index, (text, image))| Slide { index, text, image })
        .collect()
}

/// Parse pre-extracted deck text into slides, one per form-feed-separated
/// page (the `pdftotext` page-break convention).
pub fn slides_from_extracted_text(text: &str) -> Vec<Slide> {
    text.split('\u{0C}')
        .enumerate()
        .map(|(index, page)| Slide::text_only(index, page.trim()))
        .collect()
}

/// Partition slides into contiguous batches of `batch_size`, preserving
/// order. The last batch may be smaller; together the batches cover every
/// slide exactly once.
///
/// # Panics
/// Panics if `batch_size == 0`; [`crate::config::EvalConfig`] rejects that
/// at build time.
pub fn batch_slides(slides: Vec<Slide>, batch_size: usize) -> Vec<Batch> {
    assert!(batch_size >= 1, "batch_size must be >= 1");
    let mut batches = Vec::with_capacity(slides.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for slide in slides {
        current.push(slide);
        if current.len() == batch_size {
            batches.push(Batch {
                index: batches.len(),
                slides: std::mem::replace(&mut current, Vec::with_capacity(batch_size)),
            });
        }
    }
    if !current.is_empty() {
        batches.push(Batch {
            index: batches.len(),
            slides: current,
        });
    }
    batches
}
