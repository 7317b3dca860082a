use std::path::Path;

use crate::error::{ApiError, Result};

/// Largest script the backend accepts.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFormat {
    Pdf,
    Docx,
    Doc,
}

impl ScriptFormat {
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(ScriptFormat::Pdf),
            "docx" => Some(ScriptFormat::Docx),
            "doc" => Some(ScriptFormat::Doc),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            ScriptFormat::Pdf => "application/pdf",
            ScriptFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ScriptFormat::Doc => "application/msword",
        }
    }
}

/// A script file that passed the client-side type and size checks.
#[derive(Debug, Clone)]
pub struct ScriptFile {
    pub file_name: String,
    pub format: ScriptFormat,
    pub bytes: Vec<u8>,
}

impl ScriptFile {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let file_name = file_name.into();
        let format = ScriptFormat::from_file_name(&file_name).ok_or_else(|| {
            ApiError::InvalidUpload("Пожалуйста, загрузите файл в формате PDF или DOCX".into())
        })?;
        check_size(bytes.len() as u64)?;
        Ok(Self {
            file_name,
            format,
            bytes,
        })
    }

    /// Checks the name and size from metadata before reading the file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::InvalidUpload(format!("not a file: {}", path.display())))?;
        if ScriptFormat::from_file_name(&file_name).is_none() {
            return Err(ApiError::InvalidUpload(
                "Пожалуйста, загрузите файл в формате PDF или DOCX".into(),
            ));
        }
        check_size(tokio::fs::metadata(path).await?.len())?;

        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(file_name, bytes)
    }

    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn check_size(len: u64) -> Result<()> {
    if len > MAX_UPLOAD_BYTES {
        return Err(ApiError::InvalidUpload(
            "Размер файла не должен превышать 50MB".into(),
        ));
    }
    Ok(())
}
