//! Request and response bodies exchanged with the translation service.
//!
//! The service reuses the field name `from`: in a translate request it is the
//! source language, in a translate response it carries the translated text.
//! Wire names are kept as-is; Rust field names say what the value means.

use serde::{Deserialize, Deserializer, Serialize};

/// Identifies the calling surface to the service.
pub const PLATFORM: &str = "api";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Language {
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_code: String,
    #[serde(rename = "englishName", default, deserialize_with = "null_as_default")]
    pub english_name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguagesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub result: Vec<Language>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranslateMode {
    /// Markup is preserved and only text nodes are translated.
    Html,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationRequest {
    #[serde(
        rename = "enableTransliteration",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub enable_transliteration: bool,
    #[serde(rename = "from", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "to")]
    pub target: String,
    #[serde(rename = "data")]
    pub text: String,
    #[serde(
        rename = "translateMode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<TranslateMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

impl TranslationRequest {
    /// An empty `source` leaves detection to the service.
    pub fn new<S: Into<String>>(text: S, source: &str, target: &str) -> Self {
        Self {
            enable_transliteration: false,
            source: non_empty(source),
            target: target.to_owned(),
            text: text.into(),
            mode: None,
            platform: Some(PLATFORM.to_owned()),
        }
    }

    pub fn with_transliteration(mut self, enable: bool) -> Self {
        self.enable_transliteration = enable;
        self
    }

    pub fn with_mode(mut self, mode: TranslateMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(rename = "from", default, deserialize_with = "null_as_default")]
    pub translated_text: String,
    #[serde(
        rename = "sourceTransliteration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub source_transliteration: Option<String>,
    #[serde(
        rename = "targetTransliteration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_transliteration: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranslationResult {
    pub translated_text: String,
    pub source_transliteration: Option<String>,
    pub target_transliteration: Option<String>,
}

impl From<TranslateResponse> for TranslationResult {
    fn from(resp: TranslateResponse) -> Self {
        Self {
            translated_text: resp.translated_text,
            source_transliteration: resp.source_transliteration.filter(|s| !s.is_empty()),
            target_transliteration: resp.target_transliteration.filter(|s| !s.is_empty()),
        }
    }
}

/// The service signals failure through a non-empty `err` field.
pub(crate) fn service_error(err: Option<String>) -> Option<String> {
    err.filter(|e| !e.is_empty())
}

/// `null` and a missing field both decode to the zero value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
