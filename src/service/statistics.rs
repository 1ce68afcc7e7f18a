// service/statistics.rs
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ticketmodel::{Ticket, TicketStatus};

pub const TOP_ATTENDANTS: usize = 10;
pub const UNASSIGNED_LABEL: &str = "Unassigned";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Week,
    #[default]
    Month,
    Year,
}

impl TimeRange {
    /// Midnight (UTC) at the start of the current week (Sunday), month or year.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let start_date = match self {
            TimeRange::Week => {
                date - Duration::days(date.weekday().num_days_from_sunday() as i64)
            }
            TimeRange::Month => date.with_day(1).unwrap_or(date),
            TimeRange::Year => date.with_ordinal(1).unwrap_or(date),
        };
        Utc.from_utc_datetime(&start_date.and_time(NaiveTime::default()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttendantStat {
    pub name: String,
    pub tickets: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RatingBucket {
    pub rating: i16,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketStatistics {
    pub range: TimeRange,
    pub since: DateTime<Utc>,
    pub total_tickets: usize,
    pub resolved_tickets: usize,
    pub top_attendants: Vec<AttendantStat>,
    pub rating_distribution: Vec<RatingBucket>,
    pub average_resolution_hours: f64,
}

/// Aggregates the tickets created inside `range`. `tickets` may contain older
/// tickets; they are filtered out here.
pub fn compute_statistics(tickets: &[Ticket], range: TimeRange, now: DateTime<Utc>) -> TicketStatistics {
    let since = range.start(now);
    let in_range: Vec<&Ticket> = tickets.iter().filter(|t| t.created_at >= since).collect();
    let resolved: Vec<&Ticket> = in_range
        .iter()
        .copied()
        .filter(|t| t.status == TicketStatus::Resolved)
        .collect();

    TicketStatistics {
        range,
        since,
        total_tickets: in_range.len(),
        resolved_tickets: resolved.len(),
        top_attendants: top_attendants(&resolved),
        rating_distribution: rating_distribution(&resolved),
        average_resolution_hours: average_resolution_hours(&resolved),
    }
}

/// Resolved tickets per attendant, most first, capped at ten.
pub fn top_attendants(resolved: &[&Ticket]) -> Vec<AttendantStat> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for ticket in resolved {
        let name = ticket.assigned_user_name.as_deref().unwrap_or(UNASSIGNED_LABEL);
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut stats: Vec<AttendantStat> = counts
        .into_iter()
        .map(|(name, tickets)| AttendantStat { name: name.to_string(), tickets })
        .collect();
    // Name as tie-breaker keeps the ranking stable between calls.
    stats.sort_by(|a, b| b.tickets.cmp(&a.tickets).then_with(|| a.name.cmp(&b.name)));
    stats.truncate(TOP_ATTENDANTS);
    stats
}

pub fn rating_distribution(resolved: &[&Ticket]) -> Vec<RatingBucket> {
    let mut counts: HashMap<i16, usize> = HashMap::new();
    for rating in resolved.iter().filter_map(|t| t.rating).filter(|r| *r > 0) {
        *counts.entry(rating).or_insert(0) += 1;
    }

    let mut buckets: Vec<RatingBucket> = counts
        .into_iter()
        .map(|(rating, count)| RatingBucket { rating, count })
        .collect();
    buckets.sort_by_key(|b| b.rating);
    buckets
}

/// Mean of whole hours from creation to resolution, rounded to one decimal.
pub fn average_resolution_hours(resolved: &[&Ticket]) -> f64 {
    if resolved.is_empty() {
        return 0.0;
    }

    let total_hours: i64 = resolved
        .iter()
        .map(|t| {
            let finished = t.resolved_at.unwrap_or(t.updated_at);
            (finished - t.created_at).num_hours()
        })
        .sum();

    let average = total_hours as f64 / resolved.len() as f64;
    (average * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usermodel::UserRole;
    use crate::service::access::fixtures;

    fn now() -> DateTime<Utc> {
        // A Wednesday.
        Utc.with_ymd_and_hms(2025, 6, 18, 15, 30, 0).unwrap()
    }

    fn resolved_ticket(assignee: Option<&str>, rating: Option<i16>, hours: i64) -> Ticket {
        let owner = fixtures::user(UserRole::User);
        let mut t = fixtures::ticket(&owner, TicketStatus::Resolved);
        t.created_at = now() - Duration::hours(48);
        t.resolved_at = Some(t.created_at + Duration::hours(hours));
        t.updated_at = t.resolved_at.unwrap();
        t.assigned_user_name = assignee.map(str::to_string);
        t.rating = rating;
        t
    }

    #[test]
    fn range_starts() {
        assert_eq!(TimeRange::Week.start(now()), Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap());
        assert_eq!(TimeRange::Month.start(now()), Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(TimeRange::Year.start(now()), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn attendants_are_ranked_and_capped() {
        let mut tickets = Vec::new();
        for i in 0..12 {
            for _ in 0..=i {
                tickets.push(resolved_ticket(Some(&format!("agent-{:02}", i)), None, 1));
            }
        }
        tickets.push(resolved_ticket(None, None, 1));
        let refs: Vec<&Ticket> = tickets.iter().collect();

        let ranking = top_attendants(&refs);
        assert_eq!(ranking.len(), TOP_ATTENDANTS);
        assert_eq!(ranking[0], AttendantStat { name: "agent-11".to_string(), tickets: 12 });
        assert!(ranking.windows(2).all(|w| w[0].tickets >= w[1].tickets));
        assert!(ranking.iter().all(|s| s.name != UNASSIGNED_LABEL));
    }

    #[test]
    fn unassigned_tickets_are_grouped() {
        let tickets = vec![resolved_ticket(None, None, 1), resolved_ticket(None, None, 2)];
        let refs: Vec<&Ticket> = tickets.iter().collect();
        assert_eq!(
            top_attendants(&refs),
            vec![AttendantStat { name: UNASSIGNED_LABEL.to_string(), tickets: 2 }]
        );
    }

    #[test]
    fn ratings_are_bucketed_in_ascending_order() {
        let tickets = vec![
            resolved_ticket(None, Some(5), 1),
            resolved_ticket(None, Some(2), 1),
            resolved_ticket(None, Some(5), 1),
            resolved_ticket(None, None, 1),
        ];
        let refs: Vec<&Ticket> = tickets.iter().collect();
        assert_eq!(
            rating_distribution(&refs),
            vec![RatingBucket { rating: 2, count: 1 }, RatingBucket { rating: 5, count: 2 }]
        );
    }

    #[test]
    fn average_resolution_uses_whole_hours() {
        let tickets = vec![resolved_ticket(None, None, 3), resolved_ticket(None, None, 4)];
        let refs: Vec<&Ticket> = tickets.iter().collect();
        assert_eq!(average_resolution_hours(&refs), 3.5);
        assert_eq!(average_resolution_hours(&[]), 0.0);
    }

    #[test]
    fn statistics_only_cover_the_selected_range() {
        let owner = fixtures::user(UserRole::User);
        let mut old = fixtures::ticket(&owner, TicketStatus::Resolved);
        old.created_at = Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap();
        let mut open = fixtures::ticket(&owner, TicketStatus::Open);
        open.created_at = now() - Duration::hours(1);

        let tickets = vec![old, open, resolved_ticket(Some("Ana"), Some(4), 6)];
        let stats = compute_statistics(&tickets, TimeRange::Month, now());

        assert_eq!(stats.total_tickets, 2);
        assert_eq!(stats.resolved_tickets, 1);
        assert_eq!(stats.top_attendants, vec![AttendantStat { name: "Ana".to_string(), tickets: 1 }]);
        assert_eq!(stats.rating_distribution, vec![RatingBucket { rating: 4, count: 1 }]);
        assert_eq!(stats.average_resolution_hours, 6.0);

        let yearly = compute_statistics(&tickets, TimeRange::Year, now());
        assert_eq!(yearly.total_tickets, 3);
    }
}
