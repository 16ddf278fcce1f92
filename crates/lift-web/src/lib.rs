//! Axum + askama presentation layer for the Lift dashboard.
//!
//! Every screen is server-rendered from data pulled through the gateway,
//! with the sales/offers datasets cached per account for five minutes. The
//! near-duplicate dashboard variants of the product's history collapse into
//! one table driven by query parameters (offer/category filters, sort key and
//! direction, free-text search, optional date range, row expansion).

pub mod snippets;

use std::sync::Arc;
use std::time::Instant;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use lift_cache::TtlCache;
use lift_core::{AccountId, Offer, Resource, ResourceCategory, YoutubeSession};
use lift_gateway::{extract_video_id, GatewayError, SalesApi};
use lift_pipeline::{
    format_percentage, has_call_bookings, ActivitySummary, CategoryFilter, OfferFilter, SalesQuery,
    SalesRow, SortDirection, SortKey, SortSpec,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::warn;

pub const CRATE_NAME: &str = "lift-web";

pub struct AppState {
    pub api: Arc<dyn SalesApi>,
    pub account: AccountId,
    sales_cache: Mutex<TtlCache<Vec<Resource>>>,
    offers_cache: Mutex<TtlCache<Vec<Offer>>>,
}

impl AppState {
    pub fn new(api: Arc<dyn SalesApi>, account: AccountId) -> Self {
        Self {
            api,
            account,
            sales_cache: Mutex::new(TtlCache::default()),
            offers_cache: Mutex::new(TtlCache::default()),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/dashboard", get(dashboard_page_handler))
        .route("/dashboard/table", get(dashboard_table_handler))
        .route("/offers", get(offers_handler))
        .route("/offers/add", post(add_offer_handler))
        .route("/offers/edit", post(edit_offer_handler))
        .route("/activity", get(activity_handler))
        .route("/code", get(code_handler))
        .route("/actions", get(actions_handler))
        .route("/actions/update-video", post(update_video_handler))
        .route("/actions/add-tracking", post(add_tracking_handler))
        .route("/actions/replace-links", post(replace_links_handler))
        .route("/actions/clean-video", post(clean_video_handler))
        .route("/actions/clean-all", post(clean_all_handler))
        .route("/actions/refresh", post(refresh_handler))
        .route("/actions/logout", post(logout_handler))
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cached data loading.

/// Cached sales fetch. Failure propagates: the dashboard must render an error
/// state, never an empty table standing in for real data.
async fn load_sales(state: &AppState) -> Result<Vec<Resource>, GatewayError> {
    {
        let cache = state.sales_cache.lock().await;
        if let Some(data) = cache.get(state.account.as_str(), Instant::now()) {
            return Ok(data.clone());
        }
    }
    let data = state.api.fetch_sales_data(&state.account).await?;
    state
        .sales_cache
        .lock()
        .await
        .put(state.account.as_str(), data.clone(), Instant::now());
    Ok(data)
}

/// Cached offers fetch with the lenient contract: a failure degrades the
/// offer dropdown to "All Offers" instead of blocking the page. Failures are
/// not cached.
async fn load_offers(state: &AppState) -> Vec<Offer> {
    {
        let cache = state.offers_cache.lock().await;
        if let Some(data) = cache.get(state.account.as_str(), Instant::now()) {
            return data.clone();
        }
    }
    match state.api.fetch_offers(&state.account).await {
        Ok(offers) => {
            state
                .offers_cache
                .lock()
                .await
                .put(state.account.as_str(), offers.clone(), Instant::now());
            offers
        }
        Err(err) => {
            warn!(account = %state.account, error = %err, "offer fetch failed; rendering without offer filter");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Dashboard query state and view models.

#[derive(Debug, Clone, Default, Deserialize)]
struct DashboardParams {
    offer: Option<String>,
    category: Option<String>,
    sort: Option<String>,
    dir: Option<String>,
    q: Option<String>,
    start: Option<String>,
    end: Option<String>,
    expand: Option<String>,
}

impl DashboardParams {
    fn sales_query(&self) -> SalesQuery {
        let key = self.sort.as_deref().and_then(|s| s.parse::<SortKey>().ok());
        let direction = match self.dir.as_deref() {
            Some("desc") => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        SalesQuery {
            offer: OfferFilter::from_param(self.offer.as_deref().unwrap_or("all")),
            category: CategoryFilter::from_param(self.category.as_deref().unwrap_or("all")),
            search: self.q.clone().unwrap_or_default(),
            sort: SortSpec { key, direction },
        }
    }

    /// Midnight-UTC instants for a complete `start`/`end` pair; anything less
    /// means no date filtering.
    fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.start.as_deref().filter(|s| !s.is_empty())?;
        let end = self.end.as_deref().filter(|s| !s.is_empty())?;
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
        Some((
            start.and_hms_opt(0, 0, 0)?.and_utc(),
            end.and_hms_opt(0, 0, 0)?.and_utc(),
        ))
    }

    /// The filter/sort/search state as query-string pairs, without `expand`.
    fn pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("offer", self.offer.clone().unwrap_or_default()),
            ("category", self.category.clone().unwrap_or_default()),
            ("sort", self.sort.clone().unwrap_or_default()),
            ("dir", self.dir.clone().unwrap_or_default()),
            ("q", self.q.clone().unwrap_or_default()),
            ("start", self.start.clone().unwrap_or_default()),
            ("end", self.end.clone().unwrap_or_default()),
        ]
    }
}

fn encode_pairs(pairs: &[(&'static str, String)]) -> String {
    pairs
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Clone)]
struct HeaderView {
    label: &'static str,
    href: String,
    arrow: &'static str,
}

#[derive(Debug, Clone)]
struct OfferStatView {
    name: String,
    clicks: u64,
    call_bookings: u64,
    sales: u64,
}

#[derive(Debug, Clone)]
struct RowView {
    category: String,
    title: String,
    clicks: u64,
    call_bookings: u64,
    sales: u64,
    views: String,
    click_pct: String,
    sales_pct: String,
    expandable: bool,
    expanded: bool,
    toggle_href: String,
    offers: Vec<OfferStatView>,
}

#[derive(Debug, Clone)]
struct TableView {
    headers: Vec<HeaderView>,
    rows: Vec<RowView>,
    show_call_bookings: bool,
    colspan: usize,
}

fn header_view(
    params: &DashboardParams,
    current: SortSpec,
    key: SortKey,
    label: &'static str,
) -> HeaderView {
    let toggled = current.toggled(key);
    let mut pairs = params.pairs();
    for (name, value) in pairs.iter_mut() {
        match *name {
            "sort" => *value = key.as_str().to_string(),
            "dir" => *value = toggled.direction.as_str().to_string(),
            _ => {}
        }
    }
    let arrow = if current.key == Some(key) {
        match current.direction {
            SortDirection::Ascending => " ↑",
            SortDirection::Descending => " ↓",
        }
    } else {
        ""
    };
    HeaderView {
        label,
        href: format!("/dashboard?{}", encode_pairs(&pairs)),
        arrow,
    }
}

fn build_table(rows: Vec<SalesRow>, params: &DashboardParams, query: &SalesQuery) -> TableView {
    let show_call_bookings = has_call_bookings(&rows);

    let mut headers = vec![header_view(params, query.sort, SortKey::TotalClicks, "Clicks")];
    if show_call_bookings {
        headers.push(header_view(
            params,
            query.sort,
            SortKey::TotalCallBookings,
            "Call Bookings",
        ));
    }
    headers.push(header_view(params, query.sort, SortKey::TotalSales, "Conversions"));
    headers.push(header_view(params, query.sort, SortKey::Views, "Views"));
    headers.push(header_view(
        params,
        query.sort,
        SortKey::ClickPercentage,
        "Clicks % of Views",
    ));
    headers.push(header_view(
        params,
        query.sort,
        SortKey::SalesPercentage,
        "Conversions % of Clicks",
    ));
    let colspan = headers.len() + 2;

    // Row expansion only makes sense when the per-offer breakdown differs
    // from the aggregate, i.e. under the all-offers filter.
    let expandable = query.offer.is_all();
    let expanded_name = params.expand.clone().unwrap_or_default();

    let rows = rows
        .into_iter()
        .map(|row| {
            let expanded = expandable && !expanded_name.is_empty() && row.resource.name == expanded_name;
            let mut pairs = params.pairs();
            if !expanded {
                pairs.push(("expand", row.resource.name.clone()));
            }
            let toggle_href = format!("/dashboard?{}", encode_pairs(&pairs));

            let views = match row.resource.views {
                Some(views) => views.to_string(),
                None => "n/a".to_string(),
            };
            let click_pct = match row.resource.views {
                Some(views) if views > 0 => format_percentage(row.click_percentage()),
                _ => "n/a".to_string(),
            };
            let sales_pct = if row.total_clicks > 0 {
                format_percentage(row.sales_percentage())
            } else {
                "n/a".to_string()
            };

            RowView {
                category: row.resource.category.to_string(),
                title: row.resource.display_title().to_string(),
                clicks: row.total_clicks,
                call_bookings: row.total_call_bookings,
                sales: row.total_sales,
                views,
                click_pct,
                sales_pct,
                expandable,
                expanded,
                toggle_href,
                offers: row
                    .resource
                    .offers
                    .iter()
                    .map(|stat| OfferStatView {
                        name: stat.offer_name.clone(),
                        clicks: stat.click_count,
                        call_bookings: stat.call_booking_count,
                        sales: stat.sale_count,
                    })
                    .collect(),
            }
        })
        .collect();

    TableView {
        headers,
        rows,
        show_call_bookings,
        colspan,
    }
}

#[derive(Debug, Clone)]
struct SelectOptionView {
    value: String,
    label: String,
    selected: bool,
}

// ---------------------------------------------------------------------------
// Templates.

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    total_resources: usize,
    active_resources: usize,
    total_offers: usize,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardPageTemplate {
    table: TableView,
    offer_options: Vec<SelectOptionView>,
    category_options: Vec<SelectOptionView>,
    q: String,
    start: String,
    end: String,
    date_filtered: bool,
    reset_href: String,
}

#[derive(Template)]
#[template(path = "dashboard_table.html")]
struct DashboardTableTemplate {
    table: TableView,
}

#[derive(Debug, Clone)]
struct OfferRowView {
    id: String,
    name: String,
    conversion_value: String,
    call_booking_required: bool,
}

#[derive(Template)]
#[template(path = "offers.html")]
struct OffersTemplate {
    offers: Vec<OfferRowView>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct ConversionView {
    offer: String,
    resource: String,
    kind: String,
    when: String,
}

#[derive(Template)]
#[template(path = "activity.html")]
struct ActivityTemplate {
    summary: ActivitySummary,
    conversions: Vec<ConversionView>,
}

#[derive(Debug, Clone)]
struct SnippetView {
    name: String,
    tracker: String,
    thank_you: String,
}

#[derive(Template)]
#[template(path = "code.html")]
struct CodeTemplate {
    generated: Option<SnippetView>,
    offers: Vec<SnippetView>,
}

#[derive(Template)]
#[template(path = "actions.html")]
struct ActionsTemplate {
    connected: bool,
    youtube_name: Option<String>,
    notice: Option<String>,
}

fn render_html<T: Template>(template: T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers.

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let sales = match load_sales(&state).await {
        Ok(sales) => sales,
        Err(err) => return server_error(err.into()),
    };
    let offers = load_offers(&state).await;
    let active = lift_pipeline::run(&sales, &SalesQuery::default()).len();
    render_html(IndexTemplate {
        total_resources: sales.len(),
        active_resources: active,
        total_offers: offers.len(),
    })
}

async fn load_dashboard_sales(
    state: &AppState,
    params: &DashboardParams,
) -> Result<(Vec<Resource>, bool), GatewayError> {
    // A date-ranged view is served fresh from the gateway; only the default
    // full dataset goes through the cache.
    match params.date_range() {
        Some((start, end)) => {
            let data = state
                .api
                .fetch_sales_data_by_date_range(&state.account, start, end)
                .await?;
            Ok((data, true))
        }
        None => Ok((load_sales(state).await?, false)),
    }
}

async fn dashboard_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let query = params.sales_query();
    let (sales, date_filtered) = match load_dashboard_sales(&state, &params).await {
        Ok(loaded) => loaded,
        Err(err) => return server_error(err.into()),
    };
    let offers = load_offers(&state).await;
    let rows = lift_pipeline::run(&sales, &query);
    let table = build_table(rows, &params, &query);

    let selected_offer = params.offer.clone().unwrap_or_else(|| "all".to_string());
    let mut offer_options = vec![SelectOptionView {
        value: "all".to_string(),
        label: "All Offers".to_string(),
        selected: selected_offer == "all",
    }];
    offer_options.extend(offers.iter().map(|offer| SelectOptionView {
        value: offer.name.clone(),
        label: offer.name.clone(),
        selected: selected_offer == offer.name,
    }));

    let selected_category = params.category.clone().unwrap_or_else(|| "all".to_string());
    let mut category_options = vec![SelectOptionView {
        value: "all".to_string(),
        label: "All".to_string(),
        selected: selected_category == "all",
    }];
    category_options.extend(ResourceCategory::ALL.iter().map(|category| SelectOptionView {
        value: category.as_str().to_string(),
        label: category.as_str().to_string(),
        selected: selected_category == category.as_str(),
    }));

    let reset_pairs: Vec<(&'static str, String)> = params
        .pairs()
        .into_iter()
        .filter(|(name, _)| *name != "start" && *name != "end")
        .collect();

    render_html(DashboardPageTemplate {
        table,
        offer_options,
        category_options,
        q: params.q.clone().unwrap_or_default(),
        start: params.start.clone().unwrap_or_default(),
        end: params.end.clone().unwrap_or_default(),
        date_filtered,
        reset_href: format!("/dashboard?{}", encode_pairs(&reset_pairs)),
    })
}

async fn dashboard_table_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let query = params.sales_query();
    let (sales, _date_filtered) = match load_dashboard_sales(&state, &params).await {
        Ok(loaded) => loaded,
        Err(err) => return server_error(err.into()),
    };
    let rows = lift_pipeline::run(&sales, &query);
    let table = build_table(rows, &params, &query);
    let mut response = render_html(DashboardTableTemplate { table });
    response.headers_mut().insert(
        header::HeaderName::from_static("hx-trigger"),
        header::HeaderValue::from_static("salesTableLoaded"),
    );
    response
}

fn offer_rows(offers: &[Offer]) -> Vec<OfferRowView> {
    offers
        .iter()
        .map(|offer| OfferRowView {
            id: offer.id.clone(),
            name: offer.name.clone(),
            conversion_value: format!("{:.2}", offer.conversion_value),
            call_booking_required: offer.call_booking_required,
        })
        .collect()
}

async fn offers_page(state: &AppState, error: Option<String>) -> Response {
    let offers = load_offers(state).await;
    render_html(OffersTemplate {
        offers: offer_rows(&offers),
        error,
    })
}

async fn offers_handler(State(state): State<Arc<AppState>>) -> Response {
    offers_page(&state, None).await
}

#[derive(Debug, Deserialize)]
struct AddOfferForm {
    name: String,
    conversion_value: Option<String>,
    call_booking_required: Option<String>,
}

async fn add_offer_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AddOfferForm>,
) -> Response {
    let name = form.name.trim();
    if name.is_empty() {
        return offers_page(&state, Some("Offer name is required".to_string())).await;
    }
    let conversion_value = form
        .conversion_value
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    let call_booking_required = form.call_booking_required.is_some();

    match state
        .api
        .add_offer(&state.account, name, conversion_value, call_booking_required)
        .await
    {
        Ok(_offer_id) => {
            state
                .offers_cache
                .lock()
                .await
                .invalidate(state.account.as_str());
            Redirect::to("/offers").into_response()
        }
        Err(err) => offers_page(&state, Some(err.to_string())).await,
    }
}

#[derive(Debug, Deserialize)]
struct EditOfferForm {
    offer_id: String,
    name: String,
    conversion_value: Option<String>,
}

async fn edit_offer_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EditOfferForm>,
) -> Response {
    let name = form.name.trim();
    if name.is_empty() {
        return offers_page(&state, Some("Offer name is required".to_string())).await;
    }
    let conversion_value = form
        .conversion_value
        .as_deref()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(0.0);

    match state
        .api
        .edit_offer(&form.offer_id, name, conversion_value)
        .await
    {
        Ok(()) => {
            state
                .offers_cache
                .lock()
                .await
                .invalidate(state.account.as_str());
            Redirect::to("/offers").into_response()
        }
        Err(err) => offers_page(&state, Some(err.to_string())).await,
    }
}

async fn activity_handler(State(state): State<Arc<AppState>>) -> Response {
    let events = match state.api.fetch_stats(&state.account).await {
        Ok(events) => events,
        Err(err) => return server_error(err.into()),
    };
    let conversions = match state.api.fetch_latest_conversions(&state.account).await {
        Ok(conversions) => conversions,
        Err(err) => return server_error(err.into()),
    };

    let summary = ActivitySummary::compute(&events, Utc::now());
    let conversions = conversions
        .iter()
        .map(|conversion| ConversionView {
            offer: conversion.offer_name.clone(),
            resource: conversion.display_resource().to_string(),
            kind: conversion.resource_type.clone(),
            when: conversion.timestamp.format("%Y-%m-%d %H:%M UTC").to_string(),
        })
        .collect();

    render_html(ActivityTemplate {
        summary,
        conversions,
    })
}

#[derive(Debug, Default, Deserialize)]
struct CodeParams {
    offer: Option<String>,
}

fn snippet_view(account: &AccountId, offer_name: &str) -> SnippetView {
    SnippetView {
        name: offer_name.to_string(),
        tracker: snippets::tracker_snippet(account, offer_name),
        thank_you: snippets::thank_you_snippet(offer_name),
    }
}

async fn code_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CodeParams>,
) -> Response {
    let offers = load_offers(&state).await;
    let generated = params
        .offer
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| snippet_view(&state.account, name));
    let offers = offers
        .iter()
        .map(|offer| snippet_view(&state.account, &offer.name))
        .collect();
    render_html(CodeTemplate { generated, offers })
}

async fn render_actions(state: &AppState, notice: Option<String>) -> Response {
    let session = match state.api.check_yt_login(&state.account).await {
        Ok(session) => session,
        Err(err) => {
            warn!(account = %state.account, error = %err, "youtube session check failed");
            YoutubeSession::default()
        }
    };
    render_html(ActionsTemplate {
        connected: session.logged_in,
        youtube_name: session.youtube_name,
        notice,
    })
}

async fn actions_handler(State(state): State<Arc<AppState>>) -> Response {
    render_actions(&state, None).await
}

#[derive(Debug, Deserialize)]
struct UpdateVideoForm {
    video_link: String,
    landing_page: String,
}

async fn update_video_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<UpdateVideoForm>,
) -> Response {
    let notice = match extract_video_id(&form.video_link) {
        Ok(video_id) => match state
            .api
            .update_video_description(&state.account, &video_id, form.landing_page.trim())
            .await
        {
            Ok(message) => message,
            Err(err) => err.to_string(),
        },
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

#[derive(Debug, Deserialize)]
struct AddTrackingForm {
    landing_page: String,
}

async fn add_tracking_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AddTrackingForm>,
) -> Response {
    let notice = match state
        .api
        .add_tracking_to_videos(&state.account, form.landing_page.trim())
        .await
    {
        Ok(message) => message,
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

#[derive(Debug, Deserialize)]
struct ReplaceLinksForm {
    old_link: String,
    new_link: String,
}

async fn replace_links_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ReplaceLinksForm>,
) -> Response {
    let notice = match state
        .api
        .replace_link_in_videos(&state.account, form.old_link.trim(), form.new_link.trim())
        .await
    {
        Ok(message) => message,
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

#[derive(Debug, Deserialize)]
struct CleanVideoForm {
    video_link: String,
    target_url: String,
}

async fn clean_video_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CleanVideoForm>,
) -> Response {
    let notice = match extract_video_id(&form.video_link) {
        Ok(video_id) => match state
            .api
            .clean_link_in_video(&state.account, &video_id, form.target_url.trim())
            .await
        {
            Ok(message) => message,
            Err(err) => err.to_string(),
        },
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

#[derive(Debug, Deserialize)]
struct CleanAllForm {
    target_url: String,
}

async fn clean_all_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CleanAllForm>,
) -> Response {
    let notice = match state
        .api
        .clean_link_in_all_videos(&state.account, form.target_url.trim())
        .await
    {
        Ok(message) => message,
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> Response {
    let notice = match state.api.refresh_yt_data(&state.account).await {
        Ok(message) => {
            state
                .sales_cache
                .lock()
                .await
                .invalidate(state.account.as_str());
            message
        }
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}

async fn logout_handler(State(state): State<Arc<AppState>>) -> Response {
    let notice = match state.api.logout_youtube(&state.account).await {
        Ok(true) => "Disconnected from YouTube".to_string(),
        Ok(false) => "YouTube logout was not confirmed".to_string(),
        Err(err) => err.to_string(),
    };
    render_actions(&state, Some(notice)).await
}
