use serde::{Deserialize, Serialize};

/// Analytics for one Dynamic Link over the requested period.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicLinkStats {
    #[serde(default)]
    pub link_event_stats: Vec<DynamicLinkEventStat>,
}

/// Count of one event type on one platform.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DynamicLinkEventStat {
    /// Number of occurrences. The API encodes this int64 as a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,

    /// e.g. "CLICK", "REDIRECT", "APP_INSTALL", "APP_FIRST_OPEN", "APP_RE_OPEN".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// e.g. "ANDROID", "IOS", "DESKTOP".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}
