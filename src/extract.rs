//! Item extraction from rendered listing HTML.

use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::download::WorkItem;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("valid selector"));

/// Pulls `(title, url)` items for cover images out of listing HTML.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    base: Url,
    folder_marker: String,
}

impl ImageExtractor {
    /// Creates an extractor resolving relative URLs against `base` and
    /// keeping only images whose source contains `folder_marker`.
    #[must_use]
    pub fn new(base: Url, folder_marker: impl Into<String>) -> Self {
        Self {
            base,
            folder_marker: folder_marker.into(),
        }
    }

    /// Returns the matching images in document order, deduplicated by URL.
    #[must_use]
    pub fn extract(&self, html: &str) -> Vec<WorkItem> {
        let document = Html::parse_document(html);
        let images: Vec<_> = document.select(&IMG_SELECTOR).collect();
        log::info!("Found {} total images on page", images.len());

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut matching = 0;

        for img in images {
            let Some(src) = image_source(img) else {
                continue;
            };
            if !src.contains(&self.folder_marker) {
                continue;
            }
            matching += 1;

            let title = img
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map_or_else(|| title_from_file_name(src), ToString::to_string);
            if title.is_empty() {
                continue;
            }

            let Ok(url) = self.base.join(src) else {
                log::debug!("Skipping unresolvable image source {src}");
                continue;
            };
            let url = url.to_string();
            if seen.insert(url.clone()) {
                items.push(WorkItem::new(title, url));
            }
        }

        log::info!("Found {matching} cover images ({} unique)", items.len());
        items
    }
}

/// Returns the `src` of an `<img>`, falling back to `data-src`.
fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    let element = img.value();
    element
        .attr("src")
        .filter(|s| !s.is_empty())
        .or_else(|| element.attr("data-src"))
        .filter(|s| !s.is_empty())
}

/// Derives a title from an image file name, e.g. `Contra-USA.png` -> `Contra`.
fn title_from_file_name(src: &str) -> String {
    let name = src.rsplit('/').next().unwrap_or(src);
    name.replace(".png", "")
        .replace(".jpg", "")
        .replace("-USA", "")
        .replace('-', " ")
}
