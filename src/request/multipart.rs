//! Multipart form bodies with text fields and file parts.
//!
//! Files are read into the form as soon as they are added, so a missing or
//! unreadable file surfaces at build time, before any network I/O.

use std::path::Path;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::HttpError;

#[derive(Debug, Clone)]
enum Part {
    Field {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content: Vec<u8>,
    },
}

/// A `multipart/form-data` request body.
#[derive(Debug, Clone, Default)]
pub struct MultipartForm {
    parts: Vec<Part>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field part.
    pub fn write_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(Part::Field {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Adds a file part, reading the file immediately. The part's filename is
    /// the final path component.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Multipart`] when the file cannot be read.
    pub fn write_file(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<(), HttpError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| HttpError::multipart(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.parts.push(Part::File {
            name: name.into(),
            file_name,
            content,
        });
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Serializes the form, returning the `Content-Type` (with boundary) and
    /// the encoded body.
    pub(crate) fn encode(&self) -> (String, Vec<u8>) {
        let boundary: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(30)
            .map(char::from)
            .collect();
        let boundary = format!("husky-{boundary}");

        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part {
                Part::Field { name, value } => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(content);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}
