//! Byte-exact multipart bodies for the topic endpoints.
//!
//! Topic creation wants `multipart/mixed` (JSON metadata, then the file); a
//! topic file replacement wants `multipart/form-data` with a single `file`
//! field. The boundary is chosen by the caller.

use lms_sync_core::contract::SourceFile;

struct Part {
    headers: Vec<String>,
    body: Vec<u8>,
}

pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn json_part(mut self, json: Vec<u8>) -> Self {
        self.parts.push(Part {
            headers: vec!["Content-Type: application/json".to_string()],
            body: json,
        });
        self
    }

    /// A file part under the form field `name` (empty for the mixed topic body).
    pub fn file_part(mut self, name: &str, file: &SourceFile) -> Self {
        self.parts.push(Part {
            headers: vec![
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                    name, file.file_name
                ),
                format!("Content-Type: {}", file.mime_type),
            ],
            body: file.bytes.clone(),
        });
        self
    }

    /// `Content-Type` header value, e.g. `multipart/mixed; boundary=...`.
    pub fn content_type(&self, subtype: &str) -> String {
        format!("multipart/{subtype}; boundary={}", self.boundary)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            for header in &part.headers {
                out.extend_from_slice(header.as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}
