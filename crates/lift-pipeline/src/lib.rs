//! Sales aggregation pipeline: pure, stateless transforms from the raw
//! per-resource/per-offer dataset to the exact row set the dashboard renders.
//!
//! Stage order is fixed: aggregate under the offer filter, drop zero-activity
//! rows and apply the category filter, apply the free-text search, then sort.
//! Every stage consumes the previous stage's output; nothing here performs
//! I/O or raises errors (malformed numerics were already coerced to zero by
//! the gateway).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use lift_core::{ActivityEvents, Resource, ResourceCategory};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "lift-pipeline";

/// Offer dimension of the dashboard filter: everything, or one offer matched
/// exactly by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferFilter {
    #[default]
    All,
    Named(String),
}

impl OfferFilter {
    /// Parses the query-string form: empty or `all` selects everything, any
    /// other value is an exact offer name.
    pub fn from_param(param: &str) -> Self {
        match param {
            "" | "all" => OfferFilter::All,
            name => OfferFilter::Named(name.to_string()),
        }
    }

    pub fn matches(&self, offer_name: &str) -> bool {
        match self {
            OfferFilter::All => true,
            OfferFilter::Named(name) => name == offer_name,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, OfferFilter::All)
    }

    pub fn as_param(&self) -> &str {
        match self {
            OfferFilter::All => "all",
            OfferFilter::Named(name) => name,
        }
    }
}

/// Category dimension of the dashboard filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    #[default]
    All,
    Category(ResourceCategory),
}

impl CategoryFilter {
    pub fn from_param(param: &str) -> Self {
        match param.parse::<ResourceCategory>() {
            Ok(category) => CategoryFilter::Category(category),
            Err(_) => CategoryFilter::All,
        }
    }

    pub fn matches(&self, category: ResourceCategory) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Category(wanted) => *wanted == category,
        }
    }

    pub fn as_param(&self) -> &str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Category(category) => category.as_str(),
        }
    }
}

/// Sortable columns. The percentage keys are virtual: computed at sort time
/// from the aggregated counts, never stored on the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    TotalClicks,
    TotalSales,
    TotalCallBookings,
    Views,
    ClickPercentage,
    SalesPercentage,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::TotalClicks => "clicks",
            SortKey::TotalSales => "sales",
            SortKey::TotalCallBookings => "call_bookings",
            SortKey::Views => "views",
            SortKey::ClickPercentage => "click_pct",
            SortKey::SalesPercentage => "sales_pct",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clicks" => Ok(SortKey::TotalClicks),
            "sales" => Ok(SortKey::TotalSales),
            "call_bookings" => Ok(SortKey::TotalCallBookings),
            "views" => Ok(SortKey::Views),
            "click_pct" => Ok(SortKey::ClickPercentage),
            "sales_pct" => Ok(SortKey::SalesPercentage),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Current sort state. Selecting the key already in effect flips the
/// direction; selecting a new key resets to ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: Option<SortKey>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self {
            key: Some(key),
            direction,
        }
    }

    /// The sort state that clicking `key`'s column header produces.
    pub fn toggled(&self, key: SortKey) -> SortSpec {
        let direction = if self.key == Some(key) && self.direction == SortDirection::Ascending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        SortSpec::new(key, direction)
    }
}

/// Full pipeline input state besides the dataset itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalesQuery {
    pub offer: OfferFilter,
    pub category: CategoryFilter,
    pub search: String,
    pub sort: SortSpec,
}

/// A resource augmented with counts aggregated under the active offer filter.
/// Derived on every query change, never cached or persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesRow {
    pub resource: Resource,
    pub total_clicks: u64,
    pub total_sales: u64,
    pub total_call_bookings: u64,
}

impl SalesRow {
    /// Clicks as a percentage of views; zero when the view count is absent or
    /// zero. May legitimately exceed 100.
    pub fn click_percentage(&self) -> f64 {
        match self.resource.views {
            Some(views) if views > 0 => (self.total_clicks as f64 / views as f64) * 100.0,
            _ => 0.0,
        }
    }

    /// Sales as a percentage of clicks; zero when there are no clicks. A value
    /// above 100 is valid output (sale counts are server-authoritative).
    pub fn sales_percentage(&self) -> f64 {
        if self.total_clicks > 0 {
            (self.total_sales as f64 / self.total_clicks as f64) * 100.0
        } else {
            0.0
        }
    }

    fn sort_value(&self, key: SortKey) -> f64 {
        match key {
            SortKey::TotalClicks => self.total_clicks as f64,
            SortKey::TotalSales => self.total_sales as f64,
            SortKey::TotalCallBookings => self.total_call_bookings as f64,
            SortKey::Views => self.resource.views.unwrap_or(0) as f64,
            SortKey::ClickPercentage => self.click_percentage(),
            SortKey::SalesPercentage => self.sales_percentage(),
        }
    }
}

/// Stage 1: sum click/sale/call-booking counts per resource across the offers
/// passing `offer`.
pub fn aggregate(resources: &[Resource], offer: &OfferFilter) -> Vec<SalesRow> {
    resources
        .iter()
        .map(|resource| {
            let mut total_clicks = 0u64;
            let mut total_sales = 0u64;
            let mut total_call_bookings = 0u64;
            for stat in &resource.offers {
                if offer.matches(&stat.offer_name) {
                    total_clicks += stat.click_count;
                    total_sales += stat.sale_count;
                    total_call_bookings += stat.call_booking_count;
                }
            }
            SalesRow {
                resource: resource.clone(),
                total_clicks,
                total_sales,
                total_call_bookings,
            }
        })
        .collect()
}

/// Runs the whole pipeline: aggregate, filter, search, sort.
pub fn run(resources: &[Resource], query: &SalesQuery) -> Vec<SalesRow> {
    let mut rows = aggregate(resources, &query.offer);

    // A resource with zero measured activity under the current offer filter
    // is noise, not data.
    rows.retain(|row| {
        (row.total_clicks > 0 || row.total_sales > 0)
            && query.category.matches(row.resource.category)
    });

    if !query.search.is_empty() {
        let needle = query.search.to_lowercase();
        rows.retain(|row| {
            row.resource.name.to_lowercase().contains(&needle)
                || row
                    .resource
                    .youtube_title
                    .as_deref()
                    .is_some_and(|title| title.to_lowercase().contains(&needle))
        });
    }

    if let Some(key) = query.sort.key {
        // Vec::sort_by is stable; equal keys keep their input order so the
        // rendered table is deterministic across re-renders.
        rows.sort_by(|a, b| {
            let ordering = a.sort_value(key).total_cmp(&b.sort_value(key));
            match query.sort.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }

    rows
}

/// Whether the call-bookings column should render at all.
pub fn has_call_bookings(rows: &[SalesRow]) -> bool {
    rows.iter().any(|row| row.total_call_bookings > 0)
}

/// Two-decimal percentage for table cells, e.g. `5.00%`.
pub fn format_percentage(value: f64) -> String {
    format!("{value:.2}%")
}

/// Period-over-period change, formatted for the activity summary. Division by
/// zero is special-cased instead of propagated: growth from nothing reads as
/// `+∞%`, and nothing-to-nothing reads as `0%`.
pub fn percentage_change(current: usize, previous: usize) -> String {
    if previous == 0 {
        if current > 0 {
            "+∞%".to_string()
        } else {
            "0%".to_string()
        }
    } else {
        let change = ((current as f64 - previous as f64) / previous as f64) * 100.0;
        format!("{change:.2}%")
    }
}

/// Events within the trailing window `[now - n days, ..]`. The upper bound is
/// open on purpose: "now" itself always counts.
pub fn count_last_n_days(events: &[DateTime<Utc>], now: DateTime<Utc>, n: i64) -> usize {
    let lower = now - Duration::days(n);
    events.iter().filter(|instant| **instant >= lower).count()
}

/// Events within the window immediately preceding [`count_last_n_days`]:
/// `[now - 2n days, now - n days)`, lower bound inclusive, upper exclusive.
pub fn count_previous_n_days(events: &[DateTime<Utc>], now: DateTime<Utc>, n: i64) -> usize {
    let lower = now - Duration::days(2 * n);
    let upper = now - Duration::days(n);
    events
        .iter()
        .filter(|instant| **instant >= lower && **instant < upper)
        .count()
}

/// Current/previous counts for one metric over one window size, with the
/// formatted change string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowCounts {
    pub current: usize,
    pub previous: usize,
    pub change: String,
}

impl WindowCounts {
    pub fn compute(events: &[DateTime<Utc>], now: DateTime<Utc>, days: i64) -> Self {
        let current = count_last_n_days(events, now, days);
        let previous = count_previous_n_days(events, now, days);
        WindowCounts {
            current,
            previous,
            change: percentage_change(current, previous),
        }
    }
}

/// 7- and 30-day click/sale activity derived from raw event instants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySummary {
    pub clicks_7d: WindowCounts,
    pub clicks_30d: WindowCounts,
    pub sales_7d: WindowCounts,
    pub sales_30d: WindowCounts,
}

impl ActivitySummary {
    pub fn compute(events: &ActivityEvents, now: DateTime<Utc>) -> Self {
        ActivitySummary {
            clicks_7d: WindowCounts::compute(&events.clicks, now, 7),
            clicks_30d: WindowCounts::compute(&events.clicks, now, 30),
            sales_7d: WindowCounts::compute(&events.sales, now, 7),
            sales_30d: WindowCounts::compute(&events.sales, now, 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lift_core::OfferStat;

    fn stat(offer: &str, clicks: u64, sales: u64, bookings: u64) -> OfferStat {
        OfferStat {
            offer_name: offer.to_string(),
            click_count: clicks,
            sale_count: sales,
            call_booking_count: bookings,
        }
    }

    fn resource(name: &str, category: ResourceCategory, views: Option<u64>, offers: Vec<OfferStat>) -> Resource {
        Resource {
            category,
            name: name.to_string(),
            youtube_title: None,
            views,
            offers,
        }
    }

    fn sample() -> Vec<Resource> {
        vec![
            resource(
                "A",
                ResourceCategory::Video,
                Some(1000),
                vec![stat("X", 50, 5, 0)],
            ),
            resource(
                "B",
                ResourceCategory::Email,
                None,
                vec![stat("X", 10, 1, 0), stat("Y", 30, 4, 2)],
            ),
            resource("C", ResourceCategory::Channel, Some(500), vec![stat("Y", 0, 0, 0)]),
        ]
    }

    #[test]
    fn aggregate_under_all_sums_every_offer() {
        let rows = aggregate(&sample(), &OfferFilter::All);
        let b = rows.iter().find(|r| r.resource.name == "B").unwrap();
        assert_eq!(b.total_clicks, 40);
        assert_eq!(b.total_sales, 5);
        assert_eq!(b.total_call_bookings, 2);
    }

    #[test]
    fn named_filter_includes_only_matching_offers() {
        let query = SalesQuery {
            offer: OfferFilter::Named("Y".to_string()),
            ..SalesQuery::default()
        };
        let rows = run(&sample(), &query);
        // A has no Y offer and C's Y counts are all zero, so only B survives.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource.name, "B");
        assert_eq!(rows[0].total_clicks, 30);
        assert_eq!(rows[0].total_sales, 4);
    }

    #[test]
    fn zero_activity_rows_are_dropped() {
        let rows = run(&sample(), &SalesQuery::default());
        assert!(rows.iter().all(|r| r.resource.name != "C"));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn category_filter_applies_after_aggregation() {
        let query = SalesQuery {
            category: CategoryFilter::Category(ResourceCategory::Email),
            ..SalesQuery::default()
        };
        let rows = run(&sample(), &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource.name, "B");
    }

    #[test]
    fn search_is_case_insensitive_and_checks_platform_title() {
        let mut data = sample();
        data[0].youtube_title = Some("Gear Review 2026".to_string());

        let query = SalesQuery {
            search: "gear review".to_string(),
            ..SalesQuery::default()
        };
        let rows = run(&data, &query);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].resource.name, "A");

        let upper = SalesQuery {
            search: "GEAR REVIEW".to_string(),
            ..SalesQuery::default()
        };
        assert_eq!(run(&data, &upper), rows);
    }

    #[test]
    fn empty_search_keeps_the_filtered_set() {
        let base = run(&sample(), &SalesQuery::default());
        let query = SalesQuery {
            search: String::new(),
            ..SalesQuery::default()
        };
        assert_eq!(run(&sample(), &query), base);
    }

    #[test]
    fn sort_is_stable_and_idempotent() {
        let data = vec![
            resource("first", ResourceCategory::Email, None, vec![stat("X", 10, 1, 0)]),
            resource("second", ResourceCategory::Email, None, vec![stat("X", 10, 2, 0)]),
            resource("third", ResourceCategory::Email, None, vec![stat("X", 5, 0, 0)]),
        ];
        let query = SalesQuery {
            sort: SortSpec::new(SortKey::TotalClicks, SortDirection::Ascending),
            ..SalesQuery::default()
        };
        let once = run(&data, &query);
        let names: Vec<_> = once.iter().map(|r| r.resource.name.as_str()).collect();
        // Equal click counts keep input order.
        assert_eq!(names, ["third", "first", "second"]);

        let twice = run(&once.iter().map(|r| r.resource.clone()).collect::<Vec<_>>(), &query);
        let names_twice: Vec<_> = twice.iter().map(|r| r.resource.name.as_str()).collect();
        assert_eq!(names, names_twice);
    }

    #[test]
    fn double_toggle_returns_to_original_order_for_distinct_keys() {
        let data = vec![
            resource("low", ResourceCategory::Email, None, vec![stat("X", 1, 1, 0)]),
            resource("high", ResourceCategory::Email, None, vec![stat("X", 9, 1, 0)]),
            resource("mid", ResourceCategory::Email, None, vec![stat("X", 5, 1, 0)]),
        ];
        let asc = SalesQuery {
            sort: SortSpec::new(SortKey::TotalClicks, SortDirection::Ascending),
            ..SalesQuery::default()
        };
        let desc = SalesQuery {
            sort: SortSpec::new(SortKey::TotalClicks, SortDirection::Descending),
            ..SalesQuery::default()
        };
        let ascending: Vec<_> = run(&data, &asc)
            .iter()
            .map(|r| r.resource.name.clone())
            .collect();
        let descending: Vec<_> = run(&data, &desc)
            .iter()
            .map(|r| r.resource.name.clone())
            .collect();
        let mut reversed = descending.clone();
        reversed.reverse();
        assert_eq!(ascending, reversed);
    }

    #[test]
    fn toggling_the_same_key_flips_direction() {
        let spec = SortSpec::default();
        let first = spec.toggled(SortKey::TotalSales);
        assert_eq!(first.key, Some(SortKey::TotalSales));
        assert_eq!(first.direction, SortDirection::Ascending);

        let second = first.toggled(SortKey::TotalSales);
        assert_eq!(second.direction, SortDirection::Descending);

        let third = second.toggled(SortKey::Views);
        assert_eq!(third.key, Some(SortKey::Views));
        assert_eq!(third.direction, SortDirection::Ascending);
    }

    #[test]
    fn virtual_sort_keys_use_derived_percentages() {
        let data = vec![
            // 10 clicks / 1000 views = 1%
            resource("a", ResourceCategory::Video, Some(1000), vec![stat("X", 10, 1, 0)]),
            // 10 clicks / 100 views = 10%
            resource("b", ResourceCategory::Video, Some(100), vec![stat("X", 10, 1, 0)]),
            // no views at all sorts as zero
            resource("c", ResourceCategory::Video, None, vec![stat("X", 10, 1, 0)]),
        ];
        let query = SalesQuery {
            sort: SortSpec::new(SortKey::ClickPercentage, SortDirection::Descending),
            ..SalesQuery::default()
        };
        let rows = run(&data, &query);
        let names: Vec<_> = rows.iter().map(|r| r.resource.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn sales_percentage_above_one_hundred_is_valid() {
        let row = SalesRow {
            resource: resource("r", ResourceCategory::Email, None, vec![]),
            total_clicks: 10,
            total_sales: 15,
            total_call_bookings: 0,
        };
        assert_eq!(format_percentage(row.sales_percentage()), "150.00%");
    }

    #[test]
    fn end_to_end_single_video_row() {
        let data = vec![resource(
            "A",
            ResourceCategory::Video,
            Some(1000),
            vec![stat("X", 50, 5, 0)],
        )];
        let rows = run(&data, &SalesQuery::default());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_clicks, 50);
        assert_eq!(row.total_sales, 5);
        assert_eq!(format_percentage(row.click_percentage()), "5.00%");
        assert_eq!(format_percentage(row.sales_percentage()), "10.00%");
    }

    #[test]
    fn percentage_change_edge_cases() {
        assert_eq!(percentage_change(0, 0), "0%");
        assert_eq!(percentage_change(5, 0), "+∞%");
        assert_eq!(percentage_change(100, 50), "100.00%");
        assert_eq!(percentage_change(50, 100), "-50.00%");
    }

    #[test]
    fn activity_window_boundaries() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).single().unwrap();
        let events = vec![
            now,                          // included in last-7
            now - Duration::days(7),      // exactly on the lower bound: last-7
            now - Duration::days(7) - Duration::seconds(1), // previous-7
            now - Duration::days(14),     // exactly on previous lower bound
            now - Duration::days(14) - Duration::seconds(1), // outside both
        ];
        assert_eq!(count_last_n_days(&events, now, 7), 2);
        assert_eq!(count_previous_n_days(&events, now, 7), 2);
    }

    #[test]
    fn activity_summary_composes_windows() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).single().unwrap();
        let events = ActivityEvents {
            clicks: vec![now, now - Duration::days(10)],
            sales: vec![now - Duration::days(40)],
        };
        let summary = ActivitySummary::compute(&events, now);
        assert_eq!(summary.clicks_7d.current, 1);
        assert_eq!(summary.clicks_7d.previous, 1);
        assert_eq!(summary.clicks_7d.change, "0.00%");
        assert_eq!(summary.clicks_30d.current, 2);
        assert_eq!(summary.sales_30d.current, 0);
        assert_eq!(summary.sales_30d.change, "0%");
    }
}
