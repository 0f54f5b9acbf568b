use serde::{Deserialize, Serialize};

/// The URL Shortener `Url` resource.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ShortUrl {
    /// Always "urlshortener#url".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// The short URL, e.g. "http://goo.gl/fbsS".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_url: Option<String>,

    /// "OK", "MALWARE", "PHISHING" or "REMOVED".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    /// Click statistics, only present when requested with `projection`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<serde_json::Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InsertUrlRequest<'a> {
    pub(crate) kind: &'a str,
    pub(crate) long_url: &'a str,
}
