//! Input checks applied to uploads before anything touches storage.

/// Characters replaced in display names. Path separators and shell/markup
/// metacharacters never survive sanitisation.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|', ';', '\''];

/// Maximum length of a sanitized display name in bytes
const MAX_FILENAME_LEN: usize = 255;

/// Readers accept a PDF header anywhere in the first KiB
const PDF_HEADER_WINDOW: usize = 1024;
const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Returns the lowercase extension of `filename`, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Case-insensitive extension allow-list check.
pub fn has_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    file_extension(filename).is_some_and(|ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
}

pub fn validate_extension(filename: &str, allowed: &[String]) -> Result<(), ValidationError> {
    if has_allowed_extension(filename, allowed) {
        return Ok(());
    }

    let listed = allowed
        .iter()
        .map(|ext| ext.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ValidationError::new(
        "BLOCKED_EXTENSION",
        format!("Only {} files are allowed", listed),
    ))
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::new(
            "FILE_TOO_LARGE",
            format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        ));
    }
    Ok(())
}

/// Checks that the content looks like a PDF document.
pub fn verify_pdf_header(content: &[u8]) -> Result<(), ValidationError> {
    if content.is_empty() {
        return Err(ValidationError::new("EMPTY_FILE", "File appears to be empty"));
    }

    let window = &content[..content.len().min(PDF_HEADER_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        return Ok(());
    }

    Err(ValidationError::new(
        "INVALID_CONTENT",
        "File content is not a PDF document",
    ))
}

/// Produces a display-safe file name: directory components are dropped,
/// control and unsafe characters replaced, leading dots and surrounding
/// whitespace stripped, and the result capped at 255 bytes.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Browsers on Windows may send full paths with either separator.
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("");

    if base.len() != filename.len() {
        tracing::warn!("Directory components stripped from upload name: {:?}", filename);
    }

    let sanitized: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let sanitized = sanitized.trim().trim_start_matches('.').trim_start();

    if sanitized.is_empty() {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "Filename cannot be empty",
        ));
    }

    // Limit length safely for UTF-8
    let mut end = sanitized.len().min(MAX_FILENAME_LEN);
    while !sanitized.is_char_boundary(end) {
        end -= 1;
    }

    Ok(sanitized[..end].to_string())
}
