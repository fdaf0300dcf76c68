//! Page capture: turns each [`PageFragment`] into an opaque bitmap.
//!
//! Fragments are laid out as SVG by [`layout`] and rasterized with `resvg` at the
//! viewport density. Captures are independent and CPU-bound, so [`capture_all`] runs
//! them as blocking tasks and waits for every one of them to settle.

pub mod layout;

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use image::{Rgb, RgbImage};
use log::{debug, warn};
use resvg::tiny_skia;
use resvg::usvg::{fontdb::Database, Options, Tree};

use crate::error::{ReportError, ReportResult};
use crate::fonts::{font_database, DEFAULT_FONT_FAMILY_NAME};
use crate::fragment::{PageFragment, PageKind};

pub use layout::{to_svg, PageLayout, Viewport};

/// A rasterized report page.
#[derive(Clone, Debug)]
pub struct CapturedPage {
    pub kind: PageKind,
    pub image: RgbImage,
}

impl CapturedPage {
    pub fn new(kind: PageKind, image: RgbImage) -> Self {
        Self { kind, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Produces a bitmap for one page.
///
/// Implementations report failure as `None` and log the cause; callers only need to know
/// whether a page exists.
pub trait PageRasterizer: Send + Sync {
    fn capture(&self, fragment: &PageFragment) -> Option<CapturedPage>;
}

/// `resvg` backed rasterizer.
#[derive(Clone)]
pub struct PageCapture {
    fonts: Arc<Database>,
    viewport: Viewport,
}

impl PageCapture {
    pub fn new(fonts: Database, viewport: Viewport) -> Self {
        Self {
            fonts: Arc::new(fonts),
            viewport,
        }
    }

    /// Loads fonts through [`font_database`] and uses the A4 viewport.
    pub fn with_font_directory(directory: Option<&Path>) -> Self {
        Self::new(font_database(directory), Viewport::A4)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Lays the fragment out and rasterizes it onto a white RGB bitmap.
    pub fn rasterize(&self, fragment: &PageFragment) -> ReportResult<RgbImage> {
        let page = layout::layout(fragment, self.viewport);
        if page.overflows(self.viewport) {
            debug!(
                "{:?} page content is {:.0}px tall and will be clipped",
                fragment.kind(),
                page.content_height
            );
        }

        let mut options = Options::default();
        options.font_family = DEFAULT_FONT_FAMILY_NAME.to_string();
        options.fontdb = Arc::clone(&self.fonts);

        let tree = Tree::from_str(&page.svg, &options)
            .map_err(|err| ReportError::Capture(format!("invalid page markup: {err}")))?;

        let (width, height) = self.viewport.pixel_size();
        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            ReportError::Capture(format!("cannot allocate a {width}x{height} bitmap"))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);

        let density = self.viewport.density;
        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(density, density),
            &mut pixmap.as_mut(),
        );

        Ok(to_rgb(&pixmap))
    }
}

impl PageRasterizer for PageCapture {
    fn capture(&self, fragment: &PageFragment) -> Option<CapturedPage> {
        match self.rasterize(fragment) {
            Ok(image) => Some(CapturedPage::new(fragment.kind(), image)),
            Err(err) => {
                warn!("Failed to capture {:?} page: {err}", fragment.kind());
                None
            }
        }
    }
}

fn to_rgb(pixmap: &tiny_skia::Pixmap) -> RgbImage {
    let width = pixmap.width();
    let pixels = pixmap.pixels();
    RgbImage::from_fn(width, pixmap.height(), |x, y| {
        let pixel = pixels[(y * width + x) as usize].demultiply();
        Rgb([pixel.red(), pixel.green(), pixel.blue()])
    })
}

/// Captures every fragment concurrently and keeps the input order.
///
/// A capture that fails or panics yields `None` at its position; the others are unaffected.
pub async fn capture_all(
    rasterizer: Arc<dyn PageRasterizer>,
    fragments: Vec<PageFragment>,
) -> Vec<Option<CapturedPage>> {
    let tasks = fragments.into_iter().map(|fragment| {
        let rasterizer = Arc::clone(&rasterizer);
        let kind = fragment.kind();
        async move {
            match tokio::task::spawn_blocking(move || rasterizer.capture(&fragment)).await {
                Ok(page) => page,
                Err(err) => {
                    warn!("Capture task for {kind:?} page did not complete: {err}");
                    None
                }
            }
        }
    });

    join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Block;

    struct Flaky;

    impl PageRasterizer for Flaky {
        fn capture(&self, fragment: &PageFragment) -> Option<CapturedPage> {
            match fragment.kind() {
                PageKind::Profile => Some(CapturedPage::new(PageKind::Profile, RgbImage::new(4, 6))),
                PageKind::Scores => panic!("rasterizer crashed"),
                PageKind::Feedback => None,
            }
        }
    }

    fn fragments() -> Vec<PageFragment> {
        PageKind::ORDER.iter().map(|kind| PageFragment::new(*kind)).collect()
    }

    #[tokio::test]
    async fn capture_all_settles_every_page() {
        let pages = capture_all(Arc::new(Flaky), fragments()).await;
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].as_ref().map(|page| page.kind), Some(PageKind::Profile));
        assert!(pages[1].is_none());
        assert!(pages[2].is_none());
    }

    #[test]
    fn rasterized_page_is_white_and_viewport_sized() {
        let capture = PageCapture::new(Database::new(), Viewport::A4);
        let page = PageFragment::new(PageKind::Profile).with_block(Block::no_data());
        let image = capture.rasterize(&page).expect("rasterize");

        assert_eq!(image.dimensions(), Viewport::A4.pixel_size());
        assert_eq!(image.get_pixel(2, 2), &Rgb([255, 255, 255]));
    }

    #[test]
    fn small_viewport_scales_with_density() {
        let viewport = Viewport {
            width: 100,
            height: 50,
            density: 1.5,
        };
        let capture = PageCapture::new(Database::new(), viewport);
        let page = capture
            .capture(&PageFragment::new(PageKind::Feedback))
            .expect("captured page");
        assert_eq!((page.width(), page.height()), (150, 75));
        assert_eq!(page.kind, PageKind::Feedback);
    }
}
