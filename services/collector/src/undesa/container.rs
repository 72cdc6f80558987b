//! Unwraps a downloaded blob into a workbook or a CSV payload.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::PipelineError;

const SNIFF_BYTES: usize = 4096;

/// Compound File Binary header of legacy `.xls` workbooks.
const CFB_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    Workbook(Vec<u8>),
    Csv(Vec<u8>),
}

impl Container {
    pub fn kind(&self) -> &'static str {
        match self {
            Container::Workbook(_) => "workbook",
            Container::Csv(_) => "csv",
        }
    }
}

enum ZipContent {
    /// The archive is itself an OOXML workbook.
    Workbook,
    Inner(Container),
}

fn zip_error(e: zip::result::ZipError) -> PipelineError {
    PipelineError::UnreadableContainer(e.to_string())
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, PipelineError> {
    let mut entry = archive.by_name(name).map_err(zip_error)?;
    let mut buf = Vec::new();
    entry
        .read_to_end(&mut buf)
        .map_err(|e| PipelineError::UnreadableContainer(format!("{}: {}", name, e)))?;
    Ok(buf)
}

fn inspect_zip<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>) -> Result<ZipContent, PipelineError> {
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    if names
        .iter()
        .any(|n| n.starts_with("xl/") || n == "[Content_Types].xml")
    {
        return Ok(ZipContent::Workbook);
    }

    let lower = |n: &String| n.to_lowercase();
    if let Some(name) = names
        .iter()
        .find(|n| lower(n).ends_with(".xlsx") || lower(n).ends_with(".xls"))
    {
        return Ok(ZipContent::Inner(Container::Workbook(read_entry(archive, name)?)));
    }
    if let Some(name) = names.iter().find(|n| lower(n).ends_with(".csv")) {
        return Ok(ZipContent::Inner(Container::Csv(read_entry(archive, name)?)));
    }
    Err(PipelineError::UnreadableContainer(format!(
        "zip holds no workbook or csv ({} entries)",
        names.len()
    )))
}

/// Classify a downloaded blob.
///
/// A ZIP is either an xlsx itself or a wrapper around one workbook or CSV.
/// Anything else is sniffed: text with commas and newlines is CSV, the rest
/// is handed to the workbook reader.
pub fn unwrap_container(blob: Vec<u8>) -> Result<Container, PipelineError> {
    let inspected = match ZipArchive::new(Cursor::new(blob.as_slice())) {
        Ok(mut archive) => Some(inspect_zip(&mut archive)?),
        Err(_) => None,
    };
    match inspected {
        Some(ZipContent::Workbook) => return Ok(Container::Workbook(blob)),
        Some(ZipContent::Inner(inner)) => return Ok(inner),
        None => {}
    }

    if blob.starts_with(&CFB_MAGIC) {
        return Ok(Container::Workbook(blob));
    }
    let head = String::from_utf8_lossy(&blob[..blob.len().min(SNIFF_BYTES)]);
    if head.contains(',') && head.contains('\n') {
        Ok(Container::Csv(blob))
    } else {
        Ok(Container::Workbook(blob))
    }
}
