//! Rule-based ledger analysis.
//!
//! Everything here is deterministic aggregation over an in-memory slice of
//! records: group-bys per month, relation, event type and counterparty, a
//! month-over-month trend, and templated advice built from those numbers
//! (see [`insights`]).

pub mod insights;

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::constants::UNLABELED;
use crate::models::{Record, RecordType};

pub use insights::{Insight, InsightKind};

/// Movement of outgoing gifts counted as "flat" when within this percentage
const FLAT_TREND_PERCENT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LargestGift {
    pub amount: i64,
    pub related_person: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub event_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub record_count: usize,
    pub given_count: usize,
    pub received_count: usize,
    pub total_given: i64,
    pub total_received: i64,
    /// received - given
    pub net: i64,
    pub average_given: f64,
    pub average_received: f64,
    pub largest_gift: Option<LargestGift>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStat {
    /// `YYYY-MM`
    pub month: String,
    pub given: i64,
    pub received: i64,
    pub net: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStat {
    pub label: String,
    pub given: i64,
    pub received: i64,
    pub total: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Outgoing gifts of the latest month with data against the calendar month before it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub current_month: String,
    pub previous_month: String,
    pub current_given: i64,
    pub previous_given: i64,
    /// `None` when the previous month had no outgoing gifts
    pub change_percent: Option<f64>,
    pub direction: TrendDirection,
}

/// 人情债 with one counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonBalance {
    pub related_person: String,
    pub relation: String,
    pub given: i64,
    pub received: i64,
    /// received - given; positive means a return gift is owed
    pub balance: i64,
    pub last_event_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub summary: Summary,
    pub monthly: Vec<MonthlyStat>,
    pub by_relation: Vec<CategoryStat>,
    pub by_event_type: Vec<CategoryStat>,
    pub trend: Option<Trend>,
    pub balances: Vec<PersonBalance>,
    pub insights: Vec<Insight>,
}

pub struct AnalysisEngine<'a> {
    records: &'a [Record],
}

fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

fn previous_month_key(month: &str) -> Option<String> {
    let first = NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").ok()?;
    let (year, month) = if first.month() == 1 {
        (first.year() - 1, 12)
    } else {
        (first.year(), first.month() - 1)
    };
    Some(format!("{:04}-{:02}", year, month))
}

fn label_or_default(label: &str) -> String {
    let label = label.trim();
    if label.is_empty() {
        UNLABELED.to_string()
    } else {
        label.to_string()
    }
}

fn average(total: i64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        // Two decimals are plenty for display
        (total as f64 / count as f64 * 100.0).round() / 100.0
    }
}

impl<'a> AnalysisEngine<'a> {
    pub fn new(records: &'a [Record]) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            record_count: self.records.len(),
            given_count: 0,
            received_count: 0,
            total_given: 0,
            total_received: 0,
            net: 0,
            average_given: 0.0,
            average_received: 0.0,
            largest_gift: None,
        };

        for record in self.records {
            match record.record_type {
                RecordType::Given => {
                    summary.given_count += 1;
                    summary.total_given += record.amount;
                }
                RecordType::Received => {
                    summary.received_count += 1;
                    summary.total_received += record.amount;
                }
            }

            let is_larger = summary
                .largest_gift
                .as_ref()
                .map_or(true, |largest| record.amount > largest.amount);
            if is_larger {
                summary.largest_gift = Some(LargestGift {
                    amount: record.amount,
                    related_person: record.related_person.clone(),
                    record_type: record.record_type,
                    event_date: record.event_date,
                });
            }
        }

        summary.net = summary.total_received - summary.total_given;
        summary.average_given = average(summary.total_given, summary.given_count);
        summary.average_received = average(summary.total_received, summary.received_count);
        summary
    }

    /// Per-month totals in ascending month order
    pub fn monthly(&self) -> Vec<MonthlyStat> {
        let mut months: BTreeMap<String, MonthlyStat> = BTreeMap::new();
        for record in self.records {
            let key = month_key(record.event_date);
            let stat = months.entry(key.clone()).or_insert_with(|| MonthlyStat {
                month: key,
                given: 0,
                received: 0,
                net: 0,
                count: 0,
            });
            match record.record_type {
                RecordType::Given => stat.given += record.amount,
                RecordType::Received => stat.received += record.amount,
            }
            stat.net = stat.received - stat.given;
            stat.count += 1;
        }
        months.into_values().collect()
    }

    pub fn by_relation(&self) -> Vec<CategoryStat> {
        self.group_by(|record| &record.relation)
    }

    pub fn by_event_type(&self) -> Vec<CategoryStat> {
        self.group_by(|record| &record.event_type)
    }

    /// Totals per label, largest total first (ties broken by label)
    fn group_by<F>(&self, label_of: F) -> Vec<CategoryStat>
    where
        F: Fn(&Record) -> &String,
    {
        let mut groups: HashMap<String, CategoryStat> = HashMap::new();
        for record in self.records {
            let label = label_or_default(label_of(record));
            let stat = groups.entry(label.clone()).or_insert_with(|| CategoryStat {
                label,
                given: 0,
                received: 0,
                total: 0,
                count: 0,
            });
            match record.record_type {
                RecordType::Given => stat.given += record.amount,
                RecordType::Received => stat.received += record.amount,
            }
            stat.total += record.amount;
            stat.count += 1;
        }

        let mut stats: Vec<CategoryStat> = groups.into_values().collect();
        stats.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
        stats
    }

    pub fn trend(&self) -> Option<Trend> {
        let monthly = self.monthly();
        let current = monthly.last()?;
        let previous_month = previous_month_key(&current.month)?;
        let previous_given = monthly
            .iter()
            .find(|stat| stat.month == previous_month)
            .map_or(0, |stat| stat.given);

        let change_percent = if previous_given > 0 {
            let change = (current.given - previous_given) as f64 / previous_given as f64 * 100.0;
            Some((change * 10.0).round() / 10.0)
        } else {
            None
        };

        let direction = match change_percent {
            Some(change) if change > FLAT_TREND_PERCENT => TrendDirection::Up,
            Some(change) if change < -FLAT_TREND_PERCENT => TrendDirection::Down,
            Some(_) => TrendDirection::Flat,
            None if current.given > 0 => TrendDirection::Up,
            None => TrendDirection::Flat,
        };

        Some(Trend {
            current_month: current.month.clone(),
            previous_month,
            current_given: current.given,
            previous_given,
            change_percent,
            direction,
        })
    }

    /// Balance per counterparty, largest absolute balance first
    pub fn balances(&self) -> Vec<PersonBalance> {
        let mut people: HashMap<String, PersonBalance> = HashMap::new();
        for record in self.records {
            let name = record.related_person.trim().to_string();
            let entry = people.entry(name.clone()).or_insert_with(|| PersonBalance {
                related_person: name,
                relation: String::new(),
                given: 0,
                received: 0,
                balance: 0,
                last_event_date: record.event_date,
            });
            match record.record_type {
                RecordType::Given => entry.given += record.amount,
                RecordType::Received => entry.received += record.amount,
            }
            entry.balance = entry.received - entry.given;

            // Keep the most recent relation label
            if record.event_date >= entry.last_event_date {
                entry.last_event_date = record.event_date;
                if !record.relation.trim().is_empty() {
                    entry.relation = record.relation.trim().to_string();
                }
            } else if entry.relation.is_empty() {
                entry.relation = record.relation.trim().to_string();
            }
        }

        let mut balances: Vec<PersonBalance> = people.into_values().collect();
        balances.sort_by(|a, b| {
            b.balance
                .abs()
                .cmp(&a.balance.abs())
                .then_with(|| a.related_person.cmp(&b.related_person))
        });
        balances
    }

    pub fn insights(&self) -> Vec<Insight> {
        insights::generate(self)
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            summary: self.summary(),
            monthly: self.monthly(),
            by_relation: self.by_relation(),
            by_event_type: self.by_event_type(),
            trend: self.trend(),
            balances: self.balances(),
            insights: self.insights(),
        }
    }
}
