//! Field-level validation for the submitted HTML forms.
//!
//! Each form keeps the raw submitted values so a failed submission can be
//! re-rendered with the user's input, and produces either a validated value
//! or a [`FormErrors`] map.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::Deserialize;

use crate::domain::entities::GroupRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::normalize_text;
use crate::domain::users::{
    MAX_NAME_LEN, validate_email, validate_password, validate_username,
};
use crate::infra::uploads::raster_extension;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let messages = self
            .fields
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| (Some(*field), m)))
            .chain(self.non_field.iter().map(|m| (None, m)));
        for (field, message) in messages {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            match field {
                Some(field) => write!(f, "{field}: {message}")?,
                None => f.write_str(message)?,
            }
        }
        Ok(())
    }
}

/// An uploaded file as received from a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
}

/// Raw post form submission.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    /// Selected group id as submitted; blank means "no group".
    pub group: String,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

impl PostInput {
    pub fn validate(&self, groups: &[GroupRecord]) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::default();

        let text = normalize_text(&self.text);
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|group| group.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        if let Some(image) = self.image.as_ref()
            && (raster_extension(&image.data).is_none()
                || imagesize::blob_size(&image.data).is_err())
        {
            errors.add("image", INVALID_IMAGE);
        }

        errors.into_result(|| ValidPost {
            text,
            group_id,
            image: self.image.clone(),
            clear_image: self.clear_image,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub text: String,
}

impl CommentInput {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let text = normalize_text(&self.text);
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result(|| text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupInput {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupInput {
    pub fn validate(&self) -> Result<ValidSignup, FormErrors> {
        let mut errors = FormErrors::default();

        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        for (field, value) in [("first_name", &first_name), ("last_name", &last_name)] {
            if value.chars().count() > MAX_NAME_LEN {
                errors.add(
                    field,
                    format!("Ensure this value has at most {MAX_NAME_LEN} characters."),
                );
            }
        }

        let username = self.username.trim().to_string();
        if let Err(err) = validate_username(&username) {
            push_domain_error(&mut errors, err);
        }

        let email = self.email.trim().to_string();
        if let Err(err) = validate_email(&email) {
            push_domain_error(&mut errors, err);
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }
        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else if let Err(err) = validate_password(&self.password1) {
                push_domain_error(&mut errors, err);
            }
        }

        errors.into_result(|| ValidSignup {
            first_name,
            last_name,
            username,
            email,
            password: self.password1.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
    pub next: String,
}

impl LoginInput {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::default();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(|| ())
    }
}

fn push_domain_error(errors: &mut FormErrors, err: DomainError) {
    match err {
        DomainError::Validation { field, message } => errors.add(field, message),
        other => errors.add_non_field(other.to_string()),
    }
}
