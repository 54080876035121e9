//! Common API utilities and shared types
//!
//! Pagination parameters and the multipart form reader used by every
//! endpoint that accepts image uploads.

use axum::extract::Multipart;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::api::middleware::ApiError;
use crate::models::{ImageUpload, ListParams};

// ============================================================================
// Pagination
// ============================================================================

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

/// Default page size
pub fn default_per_page() -> u32 {
    20
}

/// Basic pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

// ============================================================================
// Multipart forms
// ============================================================================

/// A multipart body split into text fields and file parts
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: Vec<(String, ImageUpload)>,
}

impl FormData {
    /// Drain a multipart stream. Parts with a filename are files.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::validation_error(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
                    if bytes.is_empty() {
                        continue;
                    }
                    form.files.push((
                        name,
                        ImageUpload {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    ));
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::validation_error(format!("Failed to read field: {}", e)))?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Non-empty text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Field as sent, so an explicitly empty value can clear it
    pub fn raw_text(&self, name: &str) -> Option<String> {
        self.fields.get(name).map(|v| v.trim().to_string())
    }

    pub fn required(&self, name: &str) -> Result<String, ApiError> {
        self.text(name)
            .ok_or_else(|| ApiError::validation_error(format!("Field '{}' is required", name)))
    }

    /// Parse an optional field, rejecting values that do not parse
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ApiError> {
        match self.text(name) {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| ApiError::validation_error(format!("Field '{}' is invalid", name))),
            None => Ok(None),
        }
    }

    /// Remove and return every file uploaded under `name`, in upload order
    pub fn take_files(&mut self, name: &str) -> Vec<ImageUpload> {
        let (taken, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }

    pub fn take_file(&mut self, name: &str) -> Option<ImageUpload> {
        self.take_files(name).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> ImageUpload {
        ImageUpload {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1],
        }
    }

    #[test]
    fn test_form_accessors() {
        let mut form = FormData::default();
        form.fields.insert("content".to_string(), "  hello ".to_string());
        form.fields.insert("blank".to_string(), "   ".to_string());
        form.fields.insert("rent_cost".to_string(), "abc".to_string());
        form.files.push(("image".to_string(), upload("a.png")));
        form.files.push(("avatar".to_string(), upload("me.png")));
        form.files.push(("image".to_string(), upload("b.png")));

        assert_eq!(form.text("content").as_deref(), Some("hello"));
        assert!(form.text("blank").is_none());
        assert!(form.required("blank").is_err());
        assert!(form.parse::<i64>("rent_cost").is_err());
        assert_eq!(form.parse::<i64>("missing").unwrap(), None);

        let images = form.take_files("image");
        let names: Vec<_> = images.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert!(form.take_files("image").is_empty());
        assert_eq!(form.take_file("avatar").unwrap().filename, "me.png");
    }

    #[test]
    fn test_pagination_query_clamps() {
        let query = PaginationQuery { page: 0, per_page: 500 };
        assert_eq!(query.params(), ListParams::new(1, 100));
    }
}
