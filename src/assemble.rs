//! Assembles captured page bitmaps into a multi-page A4 PDF.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::{info, warn};
use printpdf::{Image, Mm, PdfDocument};

use crate::capture::CapturedPage;
use crate::error::{ReportError, ReportResult};
use crate::fragment::PageKind;

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;

const MM_PER_INCH: f64 = 25.4;
const LAYER_NAME: &str = "Page";
const FILE_NAME_SUFFIX: &str = "_종합보고서.pdf";
const DEFAULT_FILE_STEM: &str = "학생";

/// Where a page image lands on its A4 sheet, in millimetres from the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PagePlacement {
    /// Fits an image to the page width, shrinking to the page height when it is too tall.
    ///
    /// Narrower results are centered horizontally. The image is always top aligned.
    pub fn fit(width_px: u32, height_px: u32) -> ReportResult<Self> {
        if width_px == 0 || height_px == 0 {
            return Err(ReportError::Pdf(format!(
                "cannot place an empty {width_px}x{height_px} image"
            )));
        }

        let aspect = f64::from(height_px) / f64::from(width_px);
        let mut width = PAGE_WIDTH_MM;
        let mut height = width * aspect;
        if height > PAGE_HEIGHT_MM {
            height = PAGE_HEIGHT_MM;
            width = height / aspect;
        }

        let x = if width < PAGE_WIDTH_MM {
            (PAGE_WIDTH_MM - width) / 2.0
        } else {
            0.0
        };

        Ok(Self {
            x,
            y: 0.0,
            width,
            height,
        })
    }

    /// Resolution at which `width_px` pixels span the placement width.
    fn dpi(&self, width_px: u32) -> f64 {
        f64::from(width_px) * MM_PER_INCH / self.width
    }
}

/// A finished PDF held in memory.
#[derive(Clone, Debug)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    pub placements: Vec<PagePlacement>,
    pub kinds: Vec<PageKind>,
}

impl ReportDocument {
    pub fn page_count(&self) -> usize {
        self.placements.len()
    }
}

/// Builds one PDF page per captured bitmap, skipping pages that failed to capture.
///
/// Returns [`ReportError::NoPages`] when nothing is left to assemble.
pub fn assemble(pages: Vec<Option<CapturedPage>>, title: &str) -> ReportResult<ReportDocument> {
    let requested = pages.len();
    let pages: Vec<CapturedPage> = pages.into_iter().flatten().collect();
    if pages.is_empty() {
        return Err(ReportError::NoPages);
    }
    if pages.len() < requested {
        warn!(
            "Assembling {} of {} pages; missing pages were skipped",
            pages.len(),
            requested
        );
    }

    let (document, first_page, first_layer) = PdfDocument::new(
        title,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        LAYER_NAME,
    );

    let mut placements = Vec::with_capacity(pages.len());
    let mut kinds = Vec::with_capacity(pages.len());

    for (index, page) in pages.into_iter().enumerate() {
        let placement = PagePlacement::fit(page.width(), page.height())?;
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            document.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), LAYER_NAME)
        };
        let layer = document.get_page(page_index).get_layer(layer_index);

        let dpi = placement.dpi(page.width());
        let kind = page.kind;
        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(page.image));
        image.add_to_layer(
            layer,
            Some(Mm(placement.x)),
            Some(Mm(PAGE_HEIGHT_MM - placement.y - placement.height)),
            None,
            None,
            None,
            Some(dpi),
        );

        placements.push(placement);
        kinds.push(kind);
    }

    let mut bytes = Vec::new();
    {
        let mut writer = BufWriter::new(&mut bytes);
        document
            .save(&mut writer)
            .map_err(|err| ReportError::Pdf(err.to_string()))?;
        writer.flush()?;
    }

    Ok(ReportDocument {
        bytes,
        placements,
        kinds,
    })
}

/// `"<name>_종합보고서.pdf"`, with path separators and control characters removed.
pub fn report_file_name(student_name: &str) -> String {
    let sanitized: String = student_name
        .chars()
        .filter(|ch| !ch.is_control())
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();
    let sanitized = sanitized.trim().trim_matches('.');

    let stem = if sanitized.is_empty() {
        DEFAULT_FILE_STEM
    } else {
        sanitized
    };
    format!("{stem}{FILE_NAME_SUFFIX}")
}

/// What to do with a finished document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Write the file into `directory`.
    Download { directory: PathBuf },
    /// Hand the bytes to a [`DocumentViewer`] without keeping a copy.
    Preview,
}

/// Displays a document that is not saved by the library.
pub trait DocumentViewer: Send + Sync {
    fn show(&self, file_name: &str, bytes: &[u8]) -> ReportResult<()>;
}

/// Outcome of [`deliver`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Saved(PathBuf),
    Previewed,
}

pub fn deliver(
    document: &ReportDocument,
    file_name: &str,
    mode: &OutputMode,
    viewer: &dyn DocumentViewer,
) -> ReportResult<Delivery> {
    match mode {
        OutputMode::Download { directory } => {
            let path = save_to_directory(&document.bytes, directory, file_name)?;
            info!("Saved report to {}", path.display());
            Ok(Delivery::Saved(path))
        }
        OutputMode::Preview => {
            viewer.show(file_name, &document.bytes)?;
            Ok(Delivery::Previewed)
        }
    }
}

fn save_to_directory(bytes: &[u8], directory: &Path, file_name: &str) -> ReportResult<PathBuf> {
    fs::create_dir_all(directory)?;
    let path = directory.join(file_name);
    fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn a4_capture_fills_the_page() {
        let placement = PagePlacement::fit(1588, 2246).expect("placement");
        assert!((placement.width - PAGE_WIDTH_MM).abs() < 0.1);
        assert!(placement.height <= PAGE_HEIGHT_MM + 1e-6);
        assert!(placement.x < 0.1);
        assert!(approx(placement.y, 0.0));
    }

    #[test]
    fn tall_capture_is_shrunk_and_centered() {
        let placement = PagePlacement::fit(1000, 2000).expect("placement");
        assert!(approx(placement.height, PAGE_HEIGHT_MM));
        assert!(approx(placement.width, 148.5));
        assert!(approx(placement.x, (PAGE_WIDTH_MM - 148.5) / 2.0));
    }

    #[test]
    fn wide_capture_keeps_full_width() {
        let placement = PagePlacement::fit(2000, 1000).expect("placement");
        assert!(approx(placement.width, PAGE_WIDTH_MM));
        assert!(approx(placement.height, 105.0));
    }

    #[test]
    fn empty_image_cannot_be_placed() {
        assert!(PagePlacement::fit(0, 10).is_err());
    }

    #[test]
    fn no_pages_is_an_error() {
        let result = assemble(vec![None, None, None], "report");
        assert!(matches!(result, Err(ReportError::NoPages)));
    }

    #[test]
    fn missing_pages_are_skipped() {
        let page = |kind| Some(CapturedPage::new(kind, RgbImage::new(20, 28)));
        let document = assemble(
            vec![page(PageKind::Profile), None, page(PageKind::Feedback)],
            "report",
        )
        .expect("assemble");

        assert_eq!(document.page_count(), 2);
        assert_eq!(document.kinds, vec![PageKind::Profile, PageKind::Feedback]);
        assert!(document.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(report_file_name("김민수"), "김민수_종합보고서.pdf");
        assert_eq!(report_file_name("a/b\\c"), "a_b_c_종합보고서.pdf");
        assert_eq!(report_file_name("   "), "학생_종합보고서.pdf");
        assert_eq!(report_file_name(".."), "학생_종합보고서.pdf");
    }

    struct Refusing;

    impl DocumentViewer for Refusing {
        fn show(&self, _: &str, _: &[u8]) -> ReportResult<()> {
            Err(ReportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no viewer",
            )))
        }
    }

    #[test]
    fn download_writes_into_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let document = ReportDocument {
            bytes: b"%PDF-1.3".to_vec(),
            placements: Vec::new(),
            kinds: Vec::new(),
        };
        let target = dir.path().join("reports");
        let delivery = deliver(
            &document,
            "x.pdf",
            &OutputMode::Download {
                directory: target.clone(),
            },
            &Refusing,
        )
        .expect("deliver");

        assert_eq!(delivery, Delivery::Saved(target.join("x.pdf")));
        assert_eq!(fs::read(target.join("x.pdf")).expect("read"), b"%PDF-1.3");
        assert!(deliver(&document, "x.pdf", &OutputMode::Preview, &Refusing).is_err());
    }
}
