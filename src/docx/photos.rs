//! Photo overlay: table cells whose text names an image file get that image
//! embedded in place of the text.

use super::document::{cell_text, clear_cell};
use super::package::DocxPackage;
use super::xml::{parse_fragment, Element};
use crate::error::{ReportError, Result};
use image::{GenericImageView, ImageFormat, ImageReader};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".jpeg", ".png"];
/// Rendered picture width: 5 cm in EMU.
pub const PHOTO_WIDTH_EMU: u64 = 1_800_000;
/// Sub-directory of the asset root that receives re-encoded copies.
pub const CONVERTED_DIR: &str = "_converted";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    pub candidates: usize,
    pub embedded: usize,
    pub converted: usize,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
}

/// Whether trimmed cell text looks like an image file name.
pub fn is_image_name(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// File names under the asset root, keyed by lower-cased name. When a name
/// occurs more than once the shallowest, then alphabetically first, wins.
#[derive(Debug, Default)]
pub struct AssetIndex {
    files: HashMap<String, PathBuf>,
}

impl AssetIndex {
    pub fn build(root: &Path) -> Self {
        let mut index = AssetIndex::default();
        let mut pending = vec![root.to_path_buf()];
        while !pending.is_empty() {
            let mut next_level = Vec::new();
            for dir in pending {
                let entries = match fs::read_dir(&dir) {
                    Ok(e) => e,
                    Err(e) => {
                        warn!(dir = %dir.display(), error = %e, "cannot read asset directory");
                        continue;
                    }
                };
                let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
                paths.sort();
                for path in paths {
                    if path.is_dir() {
                        next_level.push(path);
                    } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        index.files.entry(name.to_lowercase()).or_insert(path);
                    }
                }
            }
            pending = next_level;
        }
        debug!(root = %root.display(), files = index.files.len(), "indexed asset root");
        index
    }

    pub fn find(&self, name: &str) -> Option<&Path> {
        self.files.get(&name.trim().to_lowercase()).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone)]
struct PreparedImage {
    bytes: Vec<u8>,
    ext: &'static str,
    width: u32,
    height: u32,
    converted: bool,
}

/// Use the file as is when it is a JPEG or PNG with readable dimensions.
fn load_direct(path: &Path) -> Result<PreparedImage> {
    let bytes = fs::read(path)?;
    let ext = match image::guess_format(&bytes)? {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        other => {
            return Err(ReportError::MalformedPackage(format!(
                "{}: {:?} is not embeddable as is",
                path.display(),
                other
            )))
        }
    };
    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(ReportError::MalformedPackage(format!(
            "{}: zero-sized image",
            path.display()
        )));
    }
    Ok(PreparedImage {
        bytes,
        ext,
        width,
        height,
        converted: false,
    })
}

/// Decode whatever the file holds and re-encode it as RGB JPEG under
/// `scratch`.
fn convert_to_jpeg(path: &Path, scratch: &Path) -> Result<PreparedImage> {
    let decoded = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let (width, height) = decoded.dimensions();
    let rgb = decoded.to_rgb8();
    fs::create_dir_all(scratch)?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("photo");
    let out = scratch.join(format!("{stem}.jpg"));
    rgb.save_with_format(&out, ImageFormat::Jpeg)?;
    Ok(PreparedImage {
        bytes: fs::read(&out)?,
        ext: "jpg",
        width,
        height,
        converted: true,
    })
}

fn prepare_image(path: &Path, scratch: &Path) -> Option<PreparedImage> {
    match load_direct(path) {
        Ok(img) => return Some(img),
        Err(e) => debug!(path = %path.display(), error = %e, "direct embed not possible; converting"),
    }
    match convert_to_jpeg(path, scratch) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "photo could not be converted");
            None
        }
    }
}

const PICTURE_RUN: &str = r#"<w:r><w:drawing><wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="Picture {id}"/><wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:nvPicPr><pic:cNvPr id="{id}" name=""/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r>"#;

/// An inline picture run `cx` x `cy` EMU referencing relationship `rel_id`.
fn picture_run(rel_id: &str, id: u32, name: &str, cx: u64, cy: u64) -> Result<Element> {
    let markup = PICTURE_RUN
        .replace("{cx}", &cx.to_string())
        .replace("{cy}", &cy.to_string())
        .replace("{id}", &id.to_string())
        .replace("{rel}", rel_id);
    let mut run = parse_fragment(&markup)?
        .into_iter()
        .next()
        .ok_or_else(|| ReportError::MalformedPackage("empty picture markup".into()))?;
    let mut props = Vec::new();
    run.find_all_mut("wp:docPr", &mut props);
    for p in props {
        p.set_attr("descr", name);
    }
    let mut props = Vec::new();
    run.find_all_mut("pic:cNvPr", &mut props);
    for p in props {
        p.set_attr("name", name);
    }
    Ok(run)
}

/// Embed photos into every table cell whose text is an image file name found
/// under `asset_root`. Cells without a match keep their text. Nothing here
/// fails the run; problems are logged and listed in the report.
pub fn overlay_photos(pkg: &mut DocxPackage, asset_root: &Path) -> OverlayReport {
    let index = AssetIndex::build(asset_root);
    let scratch = asset_root.join(CONVERTED_DIR);
    let mut report = OverlayReport::default();

    let candidates: Vec<(usize, String)> = pkg
        .document
        .table_cells()
        .iter()
        .enumerate()
        .filter_map(|(i, tc)| {
            let text = cell_text(tc).trim().to_string();
            is_image_name(&text).then_some((i, text))
        })
        .collect();

    // path -> (relationship id, cx, cy)
    let mut embedded: HashMap<PathBuf, (String, u64, u64)> = HashMap::new();
    let mut next_id = pkg.document.next_drawing_id();
    let mut placements: Vec<(usize, Element)> = Vec::new();
    for (cell_idx, name) in candidates {
        report.candidates += 1;
        let Some(path) = index.find(&name) else {
            info!(photo = %name, "photo not found under asset root; cell text kept");
            report.missing.push(name);
            continue;
        };

        let (rel_id, cx, cy) = match embedded.get(path) {
            Some(found) => found.clone(),
            None => {
                let Some(img) = prepare_image(path, &scratch) else {
                    report.failed.push(name);
                    continue;
                };
                let cy = PHOTO_WIDTH_EMU * u64::from(img.height) / u64::from(img.width);
                let converted = img.converted;
                let rel_id = match pkg.add_image(img.bytes, img.ext) {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(photo = %name, error = %e, "could not add image part");
                        report.failed.push(name);
                        continue;
                    }
                };
                if converted {
                    report.converted += 1;
                }
                let entry = (rel_id, PHOTO_WIDTH_EMU, cy);
                embedded.insert(path.to_path_buf(), entry.clone());
                entry
            }
        };

        match picture_run(&rel_id, next_id, &name, cx, cy) {
            Ok(run) => {
                placements.push((cell_idx, run));
                next_id += 1;
                report.embedded += 1;
            }
            Err(e) => {
                warn!(photo = %name, error = %e, "could not build picture markup");
                report.failed.push(name);
            }
        }
    }

    let mut cells = pkg.document.table_cells_mut();
    for (idx, run) in placements {
        if let Some(tc) = cells.get_mut(idx) {
            clear_cell(tc).push(run);
        }
    }
    info!(
        candidates = report.candidates,
        embedded = report.embedded,
        converted = report.converted,
        missing = report.missing.len(),
        failed = report.failed.len(),
        "photo overlay finished"
    );
    report
}
