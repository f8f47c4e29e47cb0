//! Query filter builder
//!
//! Turns the optional listing criteria of a request into a resolved, conjunctive
//! filter. Identity search terms and connection types are resolved against the
//! customer store here, so repositories only ever see concrete customer ids.

use crate::domain::auth::Caller;
use crate::domain::bill::{Bill, BillStatus};
use crate::domain::customer::{ConnectionType, CustomerService};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::shared::{Clock, CustomerId, DomainError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Defaults for criteria given with only one bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    pub earliest_date: NaiveDate,
    pub min_amount: f64,
    pub max_amount: f64,
    pub min_units: u32,
    pub max_units: u32,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            earliest_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            min_amount: 0.0,
            max_amount: 4000.0,
            min_units: 0,
            max_units: 500,
        }
    }
}

/// Bill listing criteria, every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillListRequest {
    #[serde(rename = "searchID", alias = "searchId")]
    pub search_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_unit: Option<u32>,
    pub max_unit: Option<u32>,
    pub payment_status: Option<String>,
    #[serde(rename = "connecType", alias = "connectionType")]
    pub connection_type: Option<String>,
    pub sort: Option<String>,
}

/// Payment listing criteria, every field optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentListRequest {
    #[serde(rename = "searchID", alias = "searchId")]
    pub search_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub min_unit: Option<u32>,
    pub max_unit: Option<u32>,
    pub payment_method: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey<F> {
    pub field: F,
    pub direction: SortDirection,
}

/// Sortable bill fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillSortField {
    Date,
    Units,
    Amount,
    Status,
    CreatedAt,
}

/// Sortable payment fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSortField {
    Amount,
    Method,
    CreatedAt,
}

impl BillSortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "date" => Some(BillSortField::Date),
            "units" => Some(BillSortField::Units),
            "amount" => Some(BillSortField::Amount),
            "status" => Some(BillSortField::Status),
            "createdAt" | "created_at" => Some(BillSortField::CreatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            BillSortField::Date => "issue_date",
            BillSortField::Units => "units",
            BillSortField::Amount => "amount",
            BillSortField::Status => "status",
            BillSortField::CreatedAt => "created_at",
        }
    }

    fn compare(&self, a: &Bill, b: &Bill) -> Ordering {
        match self {
            BillSortField::Date => a.date.cmp(&b.date),
            BillSortField::Units => a.units.cmp(&b.units),
            BillSortField::Amount => a.amount.total_cmp(&b.amount),
            BillSortField::Status => a.status.as_str().cmp(b.status.as_str()),
            BillSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

impl PaymentSortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "amount" => Some(PaymentSortField::Amount),
            "method" => Some(PaymentSortField::Method),
            "createdAt" | "created_at" => Some(PaymentSortField::CreatedAt),
            _ => None,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            PaymentSortField::Amount => "amount",
            PaymentSortField::Method => "method",
            PaymentSortField::CreatedAt => "created_at",
        }
    }

    fn compare(&self, a: &Payment, b: &Payment) -> Ordering {
        match self {
            PaymentSortField::Amount => a.amount.total_cmp(&b.amount),
            PaymentSortField::Method => a.method.as_str().cmp(b.method.as_str()),
            PaymentSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

/// Parse a sort specification such as `-amount,date` or `-amount date`.
/// A leading `-` sorts descending.
fn parse_sort<F>(raw: Option<&str>, parse_field: fn(&str) -> Option<F>) -> Result<Vec<SortKey<F>>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let (direction, name) = match token.strip_prefix('-') {
                Some(name) => (SortDirection::Descending, name),
                None => (SortDirection::Ascending, token.trim_start_matches('+')),
            };
            parse_field(name)
                .map(|field| SortKey { field, direction })
                .ok_or_else(|| DomainError::ValidationError(format!("cannot sort by '{}'", name)))
        })
        .collect()
}

fn chain_compare<T, F>(keys: &[SortKey<F>], a: &T, b: &T, compare: impl Fn(&F, &T, &T) -> Ordering) -> Ordering {
    for key in keys {
        let ordering = compare(&key.field, a, b);
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Inclusive numeric bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Always applied; each missing bound falls back to its default
fn bounded<T: Copy>(min: Option<T>, max: Option<T>, default_min: T, default_max: T) -> Range<T> {
    Range {
        min: min.unwrap_or(default_min),
        max: max.unwrap_or(default_max),
    }
}

/// Resolved bill filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillFilter {
    /// `None` means any customer; an empty set matches nothing
    pub customer_ids: Option<BTreeSet<CustomerId>>,
    /// Inclusive issue-date bounds
    pub date_range: Option<Range<NaiveDate>>,
    pub amount_range: Option<Range<f64>>,
    pub unit_range: Option<Range<u32>>,
    pub status: Option<BillStatus>,
    pub sort: Vec<SortKey<BillSortField>>,
}

impl BillFilter {
    pub fn matches(&self, bill: &Bill) -> bool {
        self.customer_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&bill.customer_id))
            && self.date_range.map_or(true, |r| r.contains(bill.date))
            && self.amount_range.map_or(true, |r| r.contains(bill.amount))
            && self.unit_range.map_or(true, |r| r.contains(bill.units))
            && self.status.map_or(true, |s| s == bill.status)
    }

    pub fn sort(&self, bills: &mut [Bill]) {
        if self.sort.is_empty() {
            return;
        }
        bills.sort_by(|a, b| chain_compare(&self.sort, a, b, |f, a, b| f.compare(a, b)));
    }
}

/// Resolved payment filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentFilter {
    pub customer_ids: Option<BTreeSet<CustomerId>>,
    /// Creation timestamp bounds, start inclusive, end exclusive
    pub created_from: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub amount_range: Option<Range<f64>>,
    /// Applied to the units of the settled bill
    pub unit_range: Option<Range<u32>>,
    pub method: Option<PaymentMethod>,
    pub sort: Vec<SortKey<PaymentSortField>>,
}

impl PaymentFilter {
    /// `bill_units` is the unit count of the referenced bill, when known
    pub fn matches(&self, payment: &Payment, bill_units: Option<u32>) -> bool {
        self.customer_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&payment.customer_id))
            && self.created_from.map_or(true, |t| payment.created_at >= t)
            && self.created_before.map_or(true, |t| payment.created_at < t)
            && self.amount_range.map_or(true, |r| r.contains(payment.amount))
            && self
                .unit_range
                .map_or(true, |r| bill_units.map_or(false, |u| r.contains(u)))
            && self.method.map_or(true, |m| m == payment.method)
    }

    pub fn sort(&self, payments: &mut [Payment]) {
        if self.sort.is_empty() {
            return;
        }
        payments.sort_by(|a, b| chain_compare(&self.sort, a, b, |f, a, b| f.compare(a, b)));
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        DomainError::ValidationError(format!("{} '{}' is not a YYYY-MM-DD date", field, raw))
    })
}

fn start_of_day(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| DomainError::ValidationError(format!("invalid date {}", date)))
}

fn intersect(
    scope: Option<BTreeSet<CustomerId>>,
    other: BTreeSet<CustomerId>,
) -> BTreeSet<CustomerId> {
    match scope {
        Some(current) => current.intersection(&other).copied().collect(),
        None => other,
    }
}

/// Builds resolved filters for bill and payment listings
#[derive(Clone)]
pub struct QueryFilterBuilder {
    customers: CustomerService,
    defaults: FilterDefaults,
    clock: Arc<dyn Clock>,
}

impl QueryFilterBuilder {
    pub fn new(customers: CustomerService, defaults: FilterDefaults, clock: Arc<dyn Clock>) -> Self {
        Self {
            customers,
            defaults,
            clock,
        }
    }

    /// Non-administrators are pinned to their own records and the search term
    /// is ignored. For administrators a search term must resolve.
    async fn customer_scope(
        &self,
        caller: &Caller,
        search_id: Option<&str>,
    ) -> Result<Option<BTreeSet<CustomerId>>> {
        if !caller.is_admin {
            return Ok(Some(BTreeSet::from([caller.customer_id])));
        }

        let Some(term) = search_id.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        match self.customers.resolve(term).await? {
            Some(customer) => Ok(Some(BTreeSet::from([customer.id]))),
            None => Err(DomainError::NotFound(format!("customer '{}' not found", term))),
        }
    }

    fn date_bounds(
        &self,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Option<(NaiveDate, NaiveDate)>> {
        if start.is_none() && end.is_none() {
            return Ok(None);
        }
        let start = match start {
            Some(raw) => parse_date("startDate", raw)?,
            None => self.defaults.earliest_date,
        };
        let end = match end {
            Some(raw) => parse_date("endDate", raw)?,
            None => self.clock.today(),
        };
        Ok(Some((start, end)))
    }

    pub async fn bill_filter(&self, caller: &Caller, request: &BillListRequest) -> Result<BillFilter> {
        let mut customer_ids = self
            .customer_scope(caller, request.search_id.as_deref())
            .await?;

        if let Some(raw) = request.connection_type.as_deref().filter(|s| !s.trim().is_empty()) {
            let connection_type = ConnectionType::parse(raw);
            let matching: BTreeSet<CustomerId> = self
                .customers
                .repository()
                .find_all_by_connection_type(&connection_type)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            debug!(
                "{} customers on connection type {}",
                matching.len(),
                connection_type
            );
            customer_ids = Some(intersect(customer_ids, matching));
        }

        let status = request
            .payment_status
            .as_deref()
            .map(|raw| raw.trim().parse::<BillStatus>())
            .transpose()?;

        let date_range = self
            .date_bounds(request.start_date.as_deref(), request.end_date.as_deref())?
            .map(|(min, max)| Range { min, max });

        Ok(BillFilter {
            customer_ids,
            date_range,
            amount_range: Some(bounded(
                request.min_value,
                request.max_value,
                self.defaults.min_amount,
                self.defaults.max_amount,
            )),
            unit_range: Some(bounded(
                request.min_unit,
                request.max_unit,
                self.defaults.min_units,
                self.defaults.max_units,
            )),
            status,
            sort: parse_sort(request.sort.as_deref(), BillSortField::parse)?,
        })
    }

    pub async fn payment_filter(
        &self,
        caller: &Caller,
        request: &PaymentListRequest,
    ) -> Result<PaymentFilter> {
        let customer_ids = self
            .customer_scope(caller, request.search_id.as_deref())
            .await?;

        let method = request
            .payment_method
            .as_deref()
            .map(|raw| raw.trim().parse::<PaymentMethod>())
            .transpose()?;

        let (created_from, created_before) = match self
            .date_bounds(request.start_date.as_deref(), request.end_date.as_deref())?
        {
            Some((start, end)) => {
                let day_after = end.checked_add_days(Days::new(1)).ok_or_else(|| {
                    DomainError::ValidationError(format!("endDate {} out of range", end))
                })?;
                (Some(start_of_day(start)?), Some(start_of_day(day_after)?))
            }
            None => (None, None),
        };

        Ok(PaymentFilter {
            customer_ids,
            created_from,
            created_before,
            amount_range: Some(bounded(
                request.min_value,
                request.max_value,
                self.defaults.min_amount,
                self.defaults.max_amount,
            )),
            unit_range: Some(bounded(
                request.min_unit,
                request.max_unit,
                self.defaults.min_units,
                self.defaults.max_units,
            )),
            method,
            sort: parse_sort(request.sort.as_deref(), PaymentSortField::parse)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::repository::MockCustomerRepository;
    use crate::domain::customer::{Customer, NewCustomer};
    use crate::domain::shared::FixedClock;
    use chrono::TimeZone;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 20, 8, 0, 0).unwrap()))
    }

    fn builder(repo: MockCustomerRepository) -> QueryFilterBuilder {
        let clock = clock();
        let customers = CustomerService::new(Arc::new(repo), clock.clone());
        QueryFilterBuilder::new(customers, FilterDefaults::default(), clock)
    }

    fn customer(name: &str, email: &str, ct: ConnectionType) -> Customer {
        Customer::register(NewCustomer::new(name, email).with_connection_type(ct), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_non_admin_is_self_scoped() {
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_by_email().never();
        repo.expect_find_by_id().never();

        let own = CustomerId::new();
        let request = BillListRequest {
            search_id: Some("someone.else@example.com".to_string()),
            ..Default::default()
        };

        let filter = builder(repo)
            .bill_filter(&Caller::customer(own), &request)
            .await
            .unwrap();
        assert_eq!(filter.customer_ids, Some(BTreeSet::from([own])));
    }

    #[tokio::test]
    async fn test_admin_search_by_email() {
        let target = customer("Lata", "lata@example.com", ConnectionType::Domestic);
        let target_id = target.id;
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_by_email()
            .returning(move |_| Ok(Some(target.clone())));

        let request = PaymentListRequest {
            search_id: Some("lata@example.com".to_string()),
            ..Default::default()
        };
        let filter = builder(repo)
            .payment_filter(&Caller::admin(CustomerId::new()), &request)
            .await
            .unwrap();
        assert_eq!(filter.customer_ids, Some(BTreeSet::from([target_id])));
    }

    #[tokio::test]
    async fn test_admin_unresolved_search_is_not_found() {
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let request = BillListRequest {
            search_id: Some(CustomerId::new().to_string()),
            ..Default::default()
        };
        let err = builder(repo)
            .bill_filter(&Caller::admin(CustomerId::new()), &request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_connection_type_narrows_identity() {
        let a = customer("A", "a@example.com", ConnectionType::Industrial);
        let b = customer("B", "b@example.com", ConnectionType::Industrial);
        let own = a.id;
        let everyone = vec![a, b];
        let mut repo = MockCustomerRepository::new();
        repo.expect_find_all_by_connection_type()
            .withf(|ct| *ct == ConnectionType::Industrial)
            .returning(move |_| Ok(everyone.clone()));

        let request = BillListRequest {
            connection_type: Some("INDUSTRIAL".to_string()),
            ..Default::default()
        };
        let filter = builder(repo)
            .bill_filter(&Caller::customer(own), &request)
            .await
            .unwrap();
        assert_eq!(filter.customer_ids, Some(BTreeSet::from([own])));
    }

    #[tokio::test]
    async fn test_range_defaults() {
        let request = BillListRequest {
            min_value: Some(100.0),
            max_unit: Some(50),
            start_date: Some("2024-02-01".to_string()),
            ..Default::default()
        };
        let filter = builder(MockCustomerRepository::new())
            .bill_filter(&Caller::admin(CustomerId::new()), &request)
            .await
            .unwrap();

        assert_eq!(filter.amount_range, Some(Range { min: 100.0, max: 4000.0 }));
        assert_eq!(filter.unit_range, Some(Range { min: 0, max: 50 }));
        assert_eq!(
            filter.date_range,
            Some(Range {
                min: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                max: NaiveDate::from_ymd_opt(2024, 6, 20).unwrap(),
            })
        );
        assert_eq!(filter.customer_ids, None);
    }

    #[tokio::test]
    async fn test_omitted_ranges_use_defaults() {
        let filter = builder(MockCustomerRepository::new())
            .bill_filter(&Caller::admin(CustomerId::new()), &BillListRequest::default())
            .await
            .unwrap();
        assert_eq!(filter.amount_range, Some(Range { min: 0.0, max: 4000.0 }));
        assert_eq!(filter.unit_range, Some(Range { min: 0, max: 500 }));
        assert_eq!(filter.date_range, None);
        assert_eq!(filter.customer_ids, None);

        let plant = customer("Plant", "plant@example.com", ConnectionType::Industrial);
        let tariff = crate::domain::tariff::TariffTable::default();
        let large = Bill::issue(&plant, 400, &tariff, Utc::now());
        assert_eq!(large.amount, 5600.0);
        assert!(!filter.matches(&large));
        assert!(filter.matches(&Bill::issue(&plant, 100, &tariff, Utc::now())));
    }

    #[tokio::test]
    async fn test_payment_end_date_covers_whole_day() {
        let request = PaymentListRequest {
            end_date: Some("2024-03-31".to_string()),
            ..Default::default()
        };
        let filter = builder(MockCustomerRepository::new())
            .payment_filter(&Caller::admin(CustomerId::new()), &request)
            .await
            .unwrap();

        assert_eq!(
            filter.created_from,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            filter.created_before,
            Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_malformed_input_is_rejected() {
        let b = builder(MockCustomerRepository::new());
        let admin = Caller::admin(CustomerId::new());

        let bad_date = BillListRequest {
            start_date: Some("01/02/2024".to_string()),
            ..Default::default()
        };
        assert_eq!(
            b.bill_filter(&admin, &bad_date).await.unwrap_err().kind(),
            "validation_error"
        );

        let bad_status = BillListRequest {
            payment_status: Some("Overdue".to_string()),
            ..Default::default()
        };
        assert!(b.bill_filter(&admin, &bad_status).await.is_err());

        let bad_sort = PaymentListRequest {
            sort: Some("-units".to_string()),
            ..Default::default()
        };
        assert!(b.payment_filter(&admin, &bad_sort).await.is_err());
    }

    #[test]
    fn test_parse_sort() {
        let keys = parse_sort(Some("-amount,date units"), BillSortField::parse).unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey { field: BillSortField::Amount, direction: SortDirection::Descending },
                SortKey { field: BillSortField::Date, direction: SortDirection::Ascending },
                SortKey { field: BillSortField::Units, direction: SortDirection::Ascending },
            ]
        );
        assert!(parse_sort(None, BillSortField::parse).unwrap().is_empty());
    }

    #[test]
    fn test_bill_filter_matches_and_sorts() {
        let c = customer("C", "c@example.com", ConnectionType::Domestic);
        let tariff = crate::domain::tariff::TariffTable::default();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let mut bills = vec![
            Bill::issue(&c, 10, &tariff, now),
            Bill::issue(&c, 20, &tariff, now),
            Bill::issue(&c, 30, &tariff, now),
        ];

        let filter = BillFilter {
            amount_range: Some(Range { min: 100.0, max: 200.0 }),
            ..Default::default()
        };
        let kept: Vec<u32> = bills.iter().filter(|b| filter.matches(b)).map(|b| b.units).collect();
        assert_eq!(kept, vec![20]);

        let sorted = BillFilter {
            sort: vec![SortKey { field: BillSortField::Amount, direction: SortDirection::Descending }],
            ..Default::default()
        };
        sorted.sort(&mut bills);
        let units: Vec<u32> = bills.iter().map(|b| b.units).collect();
        assert_eq!(units, vec![30, 20, 10]);
    }
}
