//! Templated advice strings built from the aggregates.

use serde::Serialize;

use super::{AnalysisEngine, TrendDirection};

/// How many outstanding return gifts get their own line
const MAX_DEBT_INSIGHTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Empty,
    Overview,
    Trend,
    Spending,
    Debt,
    Peak,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insight {
    pub kind: InsightKind,
    pub message: String,
}

impl Insight {
    fn new(kind: InsightKind, message: String) -> Self {
        Self { kind, message }
    }
}

fn signed_amount(amount: i64) -> String {
    if amount >= 0 {
        format!("+¥{}", amount)
    } else {
        format!("-¥{}", -amount)
    }
}

pub(super) fn generate(engine: &AnalysisEngine<'_>) -> Vec<Insight> {
    if engine.is_empty() {
        return vec![Insight::new(
            InsightKind::Empty,
            "暂无礼金记录，添加第一笔记录后即可获得分析建议。".to_string(),
        )];
    }

    let summary = engine.summary();
    let mut insights = vec![Insight::new(
        InsightKind::Overview,
        format!(
            "共记录 {} 笔往来，收礼 ¥{}，送礼 ¥{}，净额 {}。",
            summary.record_count,
            summary.total_received,
            summary.total_given,
            signed_amount(summary.net)
        ),
    )];

    if let Some(trend) = engine.trend() {
        let message = match (trend.direction, trend.change_percent) {
            (TrendDirection::Up, Some(change)) => Some(format!(
                "{} 送礼支出 ¥{}，较上月增长 {:.1}%，请注意控制人情开支。",
                trend.current_month, trend.current_given, change
            )),
            (TrendDirection::Down, Some(change)) => Some(format!(
                "{} 送礼支出 ¥{}，较上月下降 {:.1}%。",
                trend.current_month, trend.current_given, -change
            )),
            (TrendDirection::Flat, Some(_)) => Some(format!(
                "{} 送礼支出 ¥{}，与上月基本持平。",
                trend.current_month, trend.current_given
            )),
            (_, None) if trend.current_given > 0 => Some(format!(
                "{} 送礼支出 ¥{}，上月没有送礼记录。",
                trend.current_month, trend.current_given
            )),
            _ => None,
        };
        if let Some(message) = message {
            insights.push(Insight::new(InsightKind::Trend, message));
        }
    }

    if summary.total_given > 0 {
        let top_outgoing = engine
            .by_event_type()
            .into_iter()
            .filter(|stat| stat.given > 0)
            .max_by(|a, b| a.given.cmp(&b.given).then_with(|| b.label.cmp(&a.label)));
        if let Some(top) = top_outgoing {
            let share = top.given as f64 / summary.total_given as f64 * 100.0;
            insights.push(Insight::new(
                InsightKind::Spending,
                format!(
                    "送礼支出主要集中在「{}」，共 ¥{}，占全部送礼的 {:.1}%。",
                    top.label, top.given, share
                ),
            ));
        }
    }

    let debts = engine
        .balances()
        .into_iter()
        .filter(|balance| balance.balance > 0)
        .take(MAX_DEBT_INSIGHTS);
    for debt in debts {
        insights.push(Insight::new(
            InsightKind::Debt,
            format!(
                "收到 {} 的礼金比回礼多 ¥{}，日后有机会可适当回礼。",
                debt.related_person, debt.balance
            ),
        ));
    }

    let monthly = engine.monthly();
    if monthly.len() > 1 {
        // Earliest month wins ties
        let busiest = monthly
            .iter()
            .rev()
            .max_by_key(|stat| stat.count);
        if let Some(busiest) = busiest {
            insights.push(Insight::new(
                InsightKind::Peak,
                format!(
                    "{} 是人情往来最频繁的月份，共 {} 笔。",
                    busiest.month, busiest.count
                ),
            ));
        }
    }

    if summary.given_count > 0 {
        insights.push(Insight::new(
            InsightKind::Suggestion,
            format!(
                "平均每笔送礼 ¥{:.0}，可作为今后随礼金额的参考。",
                summary.average_given
            ),
        ));
    }

    insights
}
