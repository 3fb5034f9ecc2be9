use replicate_client::OutputFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

/// Longest prompt prefix kept in a file name, in characters.
pub const MAX_STEM_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to create output folder {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write image {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Keeps letters, digits, `-` and `_`; everything else becomes `_`.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .take(MAX_STEM_CHARS)
        .collect()
}

pub fn image_file_name(prompt: &str, format: OutputFormat, unix_seconds: i64) -> String {
    let stem = sanitize_prompt(prompt);
    let stem = if stem.is_empty() { "image".to_string() } else { stem };
    format!("{stem}_{unix_seconds}.{}", format.extension())
}

/// Writes the image into `dir` (the working directory when `None`),
/// creating the folder first.
pub fn save_image(
    dir: Option<&Path>,
    prompt: &str,
    format: OutputFormat,
    bytes: &[u8],
) -> Result<PathBuf, SaveError> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let name = image_file_name(prompt, format, now);
    let path = match dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|source| SaveError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
            dir.join(name)
        }
        None => PathBuf::from(name),
    };
    fs::write(&path, bytes).map_err(|source| SaveError::Write {
        path: path.clone(),
        source,
    })?;
    info!(target: "fluxy::save", path = %path.display(), bytes = bytes.len(), "image saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_punctuation_and_spaces() {
        assert_eq!(sanitize_prompt("a red fox, at dawn!"), "a_red_fox__at_dawn_");
        assert_eq!(sanitize_prompt("über-cool_cat"), "über-cool_cat");
    }

    #[test]
    fn truncates_to_fifty_chars() {
        let long = "x".repeat(80);
        assert_eq!(sanitize_prompt(&long).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn file_name_carries_timestamp_and_extension() {
        assert_eq!(
            image_file_name("a red fox", OutputFormat::Webp, 1_700_000_000),
            "a_red_fox_1700000000.webp"
        );
        assert_eq!(
            image_file_name("", OutputFormat::Jpg, 1),
            "image_1.jpg"
        );
    }

    #[test]
    fn creates_missing_output_folder() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("renders").join("foxes");
        let path = save_image(Some(&dir), "a red fox", OutputFormat::Png, b"png-bytes").unwrap();

        assert!(path.starts_with(&dir));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("a_red_fox_"));
        assert!(name.ends_with(".png"));
        assert_eq!(fs::read(&path).unwrap(), b"png-bytes");
    }

    #[test]
    fn unwritable_folder_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let err = save_image(Some(&blocker.join("sub")), "x", OutputFormat::Png, b"").unwrap_err();
        assert!(matches!(err, SaveError::CreateDir { .. }));
    }
}
