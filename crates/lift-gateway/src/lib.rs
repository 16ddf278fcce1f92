//! Typed HTTP client for the remote tracking API.
//!
//! This is a pure I/O boundary: every function maps one remote endpoint to
//! domain types from `lift-core`, preserving the server's exact JSON field
//! casing on the wire and coercing count fields that may arrive as numeric
//! strings. No business logic lives here beyond that normalization.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use lift_core::{
    AccountId, ActivityEvents, Conversion, Offer, OfferStat, Resource, ResourceCategory,
    YoutubeSession,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub const CRATE_NAME: &str = "lift-gateway";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    /// Signaled by the server answering an add-offer success response without
    /// an assigned identifier, not by an HTTP error. Preserved as-is for
    /// compatibility with the existing backend.
    #[error("offer \"{name}\" already exists")]
    DuplicateOffer { name: String },
    #[error("not a recognizable video link: {url}")]
    InvalidVideoLink { url: String },
    #[error("unexpected response payload from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("LIFT_API_BASE")
                .unwrap_or_else(|_| "http://localhost:8787".to_string()),
            timeout: Duration::from_secs(
                std::env::var("LIFT_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            ),
            user_agent: std::env::var("LIFT_USER_AGENT")
                .unwrap_or_else(|_| "lift-dashboard/0.1".to_string()),
        }
    }
}

/// Read and mutate operations against the remote API. The web layer and the
/// CLI depend on this trait rather than the concrete client so they can be
/// exercised against a stub.
#[async_trait]
pub trait SalesApi: Send + Sync {
    /// Full per-resource dataset. Failure propagates: callers must show an
    /// error state rather than rendering an empty table as valid data.
    async fn fetch_sales_data(&self, account: &AccountId) -> Result<Vec<Resource>, GatewayError>;

    /// Same shape as [`fetch_sales_data`](Self::fetch_sales_data), pre-filtered
    /// by the server to `[start, end)`. Bounds ordering is the caller's
    /// responsibility.
    async fn fetch_sales_data_by_date_range(
        &self,
        account: &AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Resource>, GatewayError>;

    async fn fetch_offers(&self, account: &AccountId) -> Result<Vec<Offer>, GatewayError>;

    async fn fetch_latest_conversions(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Conversion>, GatewayError>;

    async fn fetch_stats(&self, account: &AccountId) -> Result<ActivityEvents, GatewayError>;

    /// Returns the server-assigned offer id. A success response without one
    /// means the name is already taken.
    async fn add_offer(
        &self,
        account: &AccountId,
        name: &str,
        conversion_value: f64,
        call_booking_required: bool,
    ) -> Result<String, GatewayError>;

    /// Overwrites name and value. No optimistic concurrency: last writer wins.
    async fn edit_offer(
        &self,
        offer_id: &str,
        new_name: &str,
        new_conversion_value: f64,
    ) -> Result<(), GatewayError>;

    async fn check_yt_login(&self, account: &AccountId) -> Result<YoutubeSession, GatewayError>;

    async fn logout_youtube(&self, account: &AccountId) -> Result<bool, GatewayError>;

    async fn refresh_yt_data(&self, account: &AccountId) -> Result<String, GatewayError>;

    async fn update_video_description(
        &self,
        account: &AccountId,
        video_id: &str,
        url: &str,
    ) -> Result<String, GatewayError>;

    async fn add_tracking_to_videos(
        &self,
        account: &AccountId,
        url: &str,
    ) -> Result<String, GatewayError>;

    async fn replace_link_in_videos(
        &self,
        account: &AccountId,
        old_link: &str,
        new_link: &str,
    ) -> Result<String, GatewayError>;

    async fn clean_link_in_video(
        &self,
        account: &AccountId,
        video_id: &str,
        target_url: &str,
    ) -> Result<String, GatewayError>;

    async fn clean_link_in_all_videos(
        &self,
        account: &AccountId,
        target_url: &str,
    ) -> Result<String, GatewayError>;
}

/// Lenient wrapper preserving the observed contract for the offer dropdown:
/// a failed offer fetch degrades to an empty list instead of blocking the
/// page. Callers that need the strict contract use
/// [`SalesApi::fetch_offers`] directly.
pub async fn fetch_offers_or_empty(api: &dyn SalesApi, account: &AccountId) -> Vec<Offer> {
    match api.fetch_offers(account).await {
        Ok(offers) => offers,
        Err(err) => {
            warn!(account = %account, error = %err, "offer fetch failed; degrading to empty offer list");
            Vec::new()
        }
    }
}

/// reqwest-backed implementation of [`SalesApi`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(GatewayConfig::from_env())
    }

    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let request_id = Uuid::new_v4();
        let span = info_span!("api_request", %request_id, %url);

        async {
            let mut request = self.client.request(method, &url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;
            let status = response.status();
            let final_url = response.url().to_string();
            let text = response.text().await?;

            if !status.is_success() {
                return Err(GatewayError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            serde_json::from_str(&text).map_err(|source| GatewayError::Decode {
                url: final_url,
                source,
            })
        }
        .instrument(span)
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.send::<T, ()>(Method::GET, path, None).await
    }
}

#[async_trait]
impl SalesApi for HttpGateway {
    async fn fetch_sales_data(&self, account: &AccountId) -> Result<Vec<Resource>, GatewayError> {
        let wires: Vec<ResourceWire> = self.get_json(&format!("/api/sales/{account}")).await?;
        Ok(wires.into_iter().map(ResourceWire::into_domain).collect())
    }

    async fn fetch_sales_data_by_date_range(
        &self,
        account: &AccountId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Resource>, GatewayError> {
        let path = format!(
            "/api/sales-data-by-date?username={}&startDate={}&endDate={}",
            account,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        let wires: Vec<ResourceWire> = self.get_json(&path).await?;
        Ok(wires.into_iter().map(ResourceWire::into_domain).collect())
    }

    async fn fetch_offers(&self, account: &AccountId) -> Result<Vec<Offer>, GatewayError> {
        let wires: Vec<OfferWire> = self.get_json(&format!("/api/offers/{account}")).await?;
        Ok(wires.into_iter().map(OfferWire::into_domain).collect())
    }

    async fn fetch_latest_conversions(
        &self,
        account: &AccountId,
    ) -> Result<Vec<Conversion>, GatewayError> {
        let wires: Vec<ConversionWire> = self
            .get_json(&format!("/api/get-latest-conversions/{account}"))
            .await?;
        Ok(wires.into_iter().map(ConversionWire::into_domain).collect())
    }

    async fn fetch_stats(&self, account: &AccountId) -> Result<ActivityEvents, GatewayError> {
        let wire: StatsWire = self.get_json(&format!("/api/get-stats/{account}")).await?;
        Ok(ActivityEvents {
            clicks: wire.clicks,
            sales: wire.sales,
        })
    }

    async fn add_offer(
        &self,
        account: &AccountId,
        name: &str,
        conversion_value: f64,
        call_booking_required: bool,
    ) -> Result<String, GatewayError> {
        let body = AddOfferBody {
            username: account.as_str(),
            offer_name: name,
            conversion_value,
            call_booking_required,
        };
        let response: AddOfferResponse = self
            .send(Method::POST, "/api/add-offer", Some(&body))
            .await?;
        match response.offer_id.as_ref().and_then(id_to_string) {
            Some(id) => Ok(id),
            None => Err(GatewayError::DuplicateOffer {
                name: name.to_string(),
            }),
        }
    }

    async fn edit_offer(
        &self,
        offer_id: &str,
        new_name: &str,
        new_conversion_value: f64,
    ) -> Result<(), GatewayError> {
        let body = EditOfferBody {
            offer_id,
            new_name,
            new_conversion_value,
        };
        let _ack: JsonValue = self
            .send(Method::POST, "/api/edit-offer", Some(&body))
            .await?;
        Ok(())
    }

    async fn check_yt_login(&self, account: &AccountId) -> Result<YoutubeSession, GatewayError> {
        let body = UserIdBody {
            user_id: account.as_str(),
        };
        let response: YtLoginResponse = self
            .send(Method::POST, "/api/check-yt-login", Some(&body))
            .await?;
        Ok(YoutubeSession {
            logged_in: response.logged_in,
            youtube_name: response.youtube_name,
        })
    }

    async fn logout_youtube(&self, account: &AccountId) -> Result<bool, GatewayError> {
        let body = UserIdBody {
            user_id: account.as_str(),
        };
        let response: SuccessResponse = self
            .send(Method::POST, "/api/logout-youtube", Some(&body))
            .await?;
        Ok(response.success)
    }

    async fn refresh_yt_data(&self, account: &AccountId) -> Result<String, GatewayError> {
        let response: MessageResponse = self
            .send::<MessageResponse, ()>(
                Method::POST,
                &format!("/api/refresh-yt-data/{account}"),
                None,
            )
            .await?;
        Ok(response.message)
    }

    async fn update_video_description(
        &self,
        account: &AccountId,
        video_id: &str,
        url: &str,
    ) -> Result<String, GatewayError> {
        let body = VideoLinkBody {
            user_id: account.as_str(),
            url,
        };
        let response: MessageResponse = self
            .send(
                Method::PUT,
                &format!("/api/update-video-description/{video_id}"),
                Some(&body),
            )
            .await?;
        Ok(response.message)
    }

    async fn add_tracking_to_videos(
        &self,
        account: &AccountId,
        url: &str,
    ) -> Result<String, GatewayError> {
        let body = VideoLinkBody {
            user_id: account.as_str(),
            url,
        };
        let response: MessageResponse = self
            .send(Method::PUT, "/api/add-tracking-to-videos", Some(&body))
            .await?;
        Ok(response.message)
    }

    async fn replace_link_in_videos(
        &self,
        account: &AccountId,
        old_link: &str,
        new_link: &str,
    ) -> Result<String, GatewayError> {
        let body = ReplaceLinkBody {
            user_id: account.as_str(),
            old_link,
            new_link,
        };
        let response: MessageResponse = self
            .send(Method::PUT, "/api/replace-link-in-videos", Some(&body))
            .await?;
        Ok(response.message)
    }

    async fn clean_link_in_video(
        &self,
        account: &AccountId,
        video_id: &str,
        target_url: &str,
    ) -> Result<String, GatewayError> {
        let body = CleanLinkBody {
            user_id: account.as_str(),
            target_url,
        };
        let response: MessageResponse = self
            .send(
                Method::PUT,
                &format!("/api/clean-link-in-video/{video_id}"),
                Some(&body),
            )
            .await?;
        Ok(response.message)
    }

    async fn clean_link_in_all_videos(
        &self,
        account: &AccountId,
        target_url: &str,
    ) -> Result<String, GatewayError> {
        let body = CleanLinkBody {
            user_id: account.as_str(),
            target_url,
        };
        let response: MessageResponse = self
            .send(Method::PUT, "/api/clean-link-in-all-videos", Some(&body))
            .await?;
        Ok(response.message)
    }
}

/// Extracts the video id from the youtube.com / youtu.be URL shapes the
/// dashboard accepts (`watch?v=`, `embed/`, `v/`, short links, and any path
/// carrying a `v=` parameter).
pub fn extract_video_id(url: &str) -> Result<String, GatewayError> {
    fn id_segment(input: &str) -> Option<String> {
        let id: String = input
            .chars()
            .take_while(|c| !matches!(c, '&' | '?' | '#' | '/' | '\n'))
            .collect();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    let id = if let Some(after) = rest.strip_prefix("youtu.be/") {
        id_segment(after)
    } else if let Some(after) = rest.strip_prefix("youtube.com/") {
        if let Some(query) = after.strip_prefix("watch?") {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("v="))
                .and_then(id_segment)
        } else if let Some(path) = after
            .strip_prefix("embed/")
            .or_else(|| after.strip_prefix("v/"))
        {
            id_segment(path)
        } else if let Some(position) = after.find("v=") {
            id_segment(&after[position + 2..])
        } else {
            None
        }
    } else {
        None
    };

    id.ok_or_else(|| GatewayError::InvalidVideoLink {
        url: trimmed.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Wire shapes. Field names mirror the remote API exactly; count fields accept
// JSON numbers or numeric strings and degrade to zero on anything else.

fn coerce_count(value: &JsonValue) -> u64 {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .map(|f| f as u64)
                })
                .unwrap_or(0)
        }
        _ => 0,
    }
}

fn coerce_money(value: &JsonValue) -> f64 {
    match value {
        JsonValue::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}

fn de_opt_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().map(coerce_count))
}

fn de_money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    Ok(coerce_money(&value))
}

fn de_string_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    id_to_string(&value).ok_or_else(|| serde::de::Error::custom("id is neither string nor number"))
}

fn id_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct OfferStatWire {
    offer_name: String,
    #[serde(default, deserialize_with = "de_count")]
    click_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    sale_count: u64,
    #[serde(default, deserialize_with = "de_count")]
    call_booking_count: u64,
}

#[derive(Debug, Deserialize)]
struct ResourceWire {
    category: ResourceCategory,
    name: String,
    #[serde(default)]
    youtube_title: Option<String>,
    #[serde(default, deserialize_with = "de_opt_count")]
    views: Option<u64>,
    #[serde(default)]
    offers: Vec<OfferStatWire>,
}

impl ResourceWire {
    fn into_domain(self) -> Resource {
        Resource {
            category: self.category,
            name: self.name,
            youtube_title: self.youtube_title,
            views: self.views,
            offers: self
                .offers
                .into_iter()
                .map(|stat| OfferStat {
                    offer_name: stat.offer_name,
                    click_count: stat.click_count,
                    sale_count: stat.sale_count,
                    call_booking_count: stat.call_booking_count,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OfferWire {
    #[serde(deserialize_with = "de_string_id")]
    id: String,
    name: String,
    #[serde(default, deserialize_with = "de_money")]
    conversion_value: f64,
    #[serde(default)]
    call_booking_required: bool,
}

impl OfferWire {
    fn into_domain(self) -> Offer {
        Offer {
            id: self.id,
            name: self.name,
            conversion_value: self.conversion_value,
            call_booking_required: self.call_booking_required,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConversionWire {
    offer_name: String,
    resource_type: String,
    resource_name: String,
    #[serde(default)]
    youtube_title: Option<String>,
    timestamp: DateTime<Utc>,
}

impl ConversionWire {
    fn into_domain(self) -> Conversion {
        Conversion {
            offer_name: self.offer_name,
            resource_type: self.resource_type,
            resource_name: self.resource_name,
            youtube_title: self.youtube_title,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsWire {
    #[serde(default)]
    clicks: Vec<DateTime<Utc>>,
    #[serde(default)]
    sales: Vec<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct AddOfferBody<'a> {
    username: &'a str,
    #[serde(rename = "offerName")]
    offer_name: &'a str,
    #[serde(rename = "conversionValue")]
    conversion_value: f64,
    #[serde(rename = "callBookingRequired")]
    call_booking_required: bool,
}

#[derive(Debug, Deserialize)]
struct AddOfferResponse {
    #[serde(rename = "offerId", default)]
    offer_id: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct EditOfferBody<'a> {
    #[serde(rename = "offerId")]
    offer_id: &'a str,
    #[serde(rename = "newName")]
    new_name: &'a str,
    #[serde(rename = "newConversionValue")]
    new_conversion_value: f64,
}

#[derive(Debug, Serialize)]
struct UserIdBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct VideoLinkBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ReplaceLinkBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    #[serde(rename = "oldLink")]
    old_link: &'a str,
    #[serde(rename = "newLink")]
    new_link: &'a str,
}

#[derive(Debug, Serialize)]
struct CleanLinkBody<'a> {
    #[serde(rename = "userId")]
    user_id: &'a str,
    #[serde(rename = "targetUrl")]
    target_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct YtLoginResponse {
    #[serde(rename = "loggedIn", default)]
    logged_in: bool,
    #[serde(rename = "youtubeName", default)]
    youtube_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_wire_coerces_numeric_strings() {
        let json = r#"{
            "category": "video",
            "name": "launch",
            "youtube_title": "Launch day",
            "views": "1000",
            "offers": [
                {"offer_name": "course", "click_count": "50", "sale_count": 5, "call_booking_count": "2"}
            ]
        }"#;
        let resource = serde_json::from_str::<ResourceWire>(json)
            .unwrap()
            .into_domain();
        assert_eq!(resource.views, Some(1000));
        assert_eq!(resource.offers[0].click_count, 50);
        assert_eq!(resource.offers[0].sale_count, 5);
        assert_eq!(resource.offers[0].call_booking_count, 2);
    }

    #[test]
    fn malformed_counts_degrade_to_zero() {
        let json = r#"{
            "category": "email",
            "name": "newsletter",
            "offers": [
                {"offer_name": "course", "click_count": "n/a", "sale_count": null}
            ]
        }"#;
        let resource = serde_json::from_str::<ResourceWire>(json)
            .unwrap()
            .into_domain();
        assert_eq!(resource.views, None);
        assert_eq!(resource.offers[0].click_count, 0);
        assert_eq!(resource.offers[0].sale_count, 0);
        assert_eq!(resource.offers[0].call_booking_count, 0);
    }

    #[test]
    fn offer_wire_accepts_numeric_id_and_string_value() {
        let json = r#"{"id": 42, "name": "course", "conversion_value": "19.99"}"#;
        let offer = serde_json::from_str::<OfferWire>(json).unwrap().into_domain();
        assert_eq!(offer.id, "42");
        assert_eq!(offer.conversion_value, 19.99);
        assert!(!offer.call_booking_required);
    }

    #[test]
    fn add_offer_response_without_id_reads_as_duplicate() {
        let ok: AddOfferResponse = serde_json::from_str(r#"{"offerId": "abc"}"#).unwrap();
        assert_eq!(ok.offer_id.as_ref().and_then(id_to_string).as_deref(), Some("abc"));

        let duplicate: AddOfferResponse = serde_json::from_str("{}").unwrap();
        assert!(duplicate.offer_id.as_ref().and_then(id_to_string).is_none());

        let empty_id: AddOfferResponse = serde_json::from_str(r#"{"offerId": ""}"#).unwrap();
        assert!(empty_id.offer_id.as_ref().and_then(id_to_string).is_none());
    }

    #[test]
    fn extract_video_id_handles_common_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ&t=42",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=xyz",
            "www.youtube.com/embed/dQw4w9WgXcQ",
            "youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/playlist?list=a&v=dQw4w9WgXcQ",
        ] {
            assert_eq!(
                extract_video_id(url).unwrap(),
                "dQw4w9WgXcQ",
                "failed for {url}"
            );
        }
    }

    #[test]
    fn extract_video_id_rejects_non_video_links() {
        for url in ["https://example.com/watch?v=abc", "youtube.com/feed", "", "youtu.be/"] {
            assert!(extract_video_id(url).is_err(), "accepted {url}");
        }
    }

    #[test]
    fn stats_wire_defaults_missing_series() {
        let stats: StatsWire = serde_json::from_str(r#"{"clicks": []}"#).unwrap();
        assert!(stats.clicks.is_empty());
        assert!(stats.sales.is_empty());
    }

    #[tokio::test]
    async fn lenient_offer_fetch_degrades_to_empty() {
        struct FailingApi;

        #[async_trait]
        impl SalesApi for FailingApi {
            async fn fetch_sales_data(
                &self,
                _account: &AccountId,
            ) -> Result<Vec<Resource>, GatewayError> {
                unimplemented!()
            }
            async fn fetch_sales_data_by_date_range(
                &self,
                _account: &AccountId,
                _start: DateTime<Utc>,
                _end: DateTime<Utc>,
            ) -> Result<Vec<Resource>, GatewayError> {
                unimplemented!()
            }
            async fn fetch_offers(&self, _account: &AccountId) -> Result<Vec<Offer>, GatewayError> {
                Err(GatewayError::HttpStatus {
                    status: 503,
                    url: "http://test/api/offers/acct".to_string(),
                })
            }
            async fn fetch_latest_conversions(
                &self,
                _account: &AccountId,
            ) -> Result<Vec<Conversion>, GatewayError> {
                unimplemented!()
            }
            async fn fetch_stats(
                &self,
                _account: &AccountId,
            ) -> Result<ActivityEvents, GatewayError> {
                unimplemented!()
            }
            async fn add_offer(
                &self,
                _account: &AccountId,
                _name: &str,
                _conversion_value: f64,
                _call_booking_required: bool,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn edit_offer(
                &self,
                _offer_id: &str,
                _new_name: &str,
                _new_conversion_value: f64,
            ) -> Result<(), GatewayError> {
                unimplemented!()
            }
            async fn check_yt_login(
                &self,
                _account: &AccountId,
            ) -> Result<YoutubeSession, GatewayError> {
                unimplemented!()
            }
            async fn logout_youtube(&self, _account: &AccountId) -> Result<bool, GatewayError> {
                unimplemented!()
            }
            async fn refresh_yt_data(&self, _account: &AccountId) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn update_video_description(
                &self,
                _account: &AccountId,
                _video_id: &str,
                _url: &str,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn add_tracking_to_videos(
                &self,
                _account: &AccountId,
                _url: &str,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn replace_link_in_videos(
                &self,
                _account: &AccountId,
                _old_link: &str,
                _new_link: &str,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn clean_link_in_video(
                &self,
                _account: &AccountId,
                _video_id: &str,
                _target_url: &str,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
            async fn clean_link_in_all_videos(
                &self,
                _account: &AccountId,
                _target_url: &str,
            ) -> Result<String, GatewayError> {
                unimplemented!()
            }
        }

        let offers = fetch_offers_or_empty(&FailingApi, &AccountId::new("acct")).await;
        assert!(offers.is_empty());
    }
}
