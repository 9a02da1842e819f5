//! Day-bucket projection of the buffer for rendering.

use chrono::{DateTime, TimeZone};
use tideline_types::{DayBucket, Event, EventGroup};

/// Classify `timestamp` relative to `now`, in `now`'s time zone.
pub fn day_bucket<Tz: TimeZone>(timestamp: &DateTime<chrono::Utc>, now: &DateTime<Tz>) -> DayBucket {
    let today = now.date_naive();
    let date = timestamp.with_timezone(&now.timezone()).date_naive();
    if date == today {
        DayBucket::Today
    } else if today.pred_opt() == Some(date) {
        DayBucket::Yesterday
    } else {
        DayBucket::Date(date)
    }
}

/// Partition `events` into runs of consecutive events sharing a day bucket.
///
/// Order is preserved, so a newest-first buffer yields newest-first groups.
/// Buckets are computed against `now` at call time; nothing is cached.
pub fn group_by_relative_day<'a, Tz: TimeZone>(
    events: impl IntoIterator<Item = &'a Event>,
    now: &DateTime<Tz>,
) -> Vec<EventGroup> {
    let mut groups: Vec<EventGroup> = Vec::new();
    for event in events {
        let bucket = day_bucket(&event.timestamp, now);
        match groups.last_mut() {
            Some(group) if group.bucket == bucket => group.events.push(event.clone()),
            _ => groups.push(EventGroup {
                bucket,
                label: bucket.label(),
                events: vec![event.clone()],
            }),
        }
    }
    groups
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, Utc};

    use super::*;

    fn event(id: &str, rfc3339: &str) -> Event {
        Event {
            id: id.to_owned(),
            title: String::from("note"),
            timestamp: DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc),
            person: None,
            data: None,
        }
    }

    #[test]
    fn groups_today_yesterday_and_older_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let events = [
            event("a", "2024-03-10T14:00:00Z"),
            event("b", "2024-03-10T01:00:00Z"),
            event("c", "2024-03-09T23:59:59Z"),
            event("d", "2024-03-01T12:00:00Z"),
        ];

        let groups = group_by_relative_day(events.iter(), &now);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Today", "Yesterday", "Friday, March 1, 2024"]);
        assert_eq!(groups.first().map(|g| g.events.len()), Some(2));
        assert_eq!(
            groups.last().map(|g| g.bucket),
            Some(DayBucket::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
        );
    }

    #[test]
    fn buckets_follow_the_time_zone_of_now() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2.
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = plus_two.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let late = event("late", "2024-03-09T23:30:00Z");
        assert_eq!(day_bucket(&late.timestamp, &now), DayBucket::Today);

        let now_utc = now.with_timezone(&Utc);
        assert_eq!(day_bucket(&late.timestamp, &now_utc), DayBucket::Yesterday);

        let earlier = event("earlier", "2024-03-09T08:00:00Z");
        assert_eq!(day_bucket(&earlier.timestamp, &now), DayBucket::Yesterday);
    }

    #[test]
    fn interleaved_days_produce_separate_runs() {
        // Grouping preserves order rather than merging non-adjacent runs.
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();
        let events = [
            event("a", "2024-03-10T14:00:00Z"),
            event("b", "2024-03-09T14:00:00Z"),
            event("c", "2024-03-10T13:00:00Z"),
        ];
        assert_eq!(group_by_relative_day(events.iter(), &now).len(), 3);
    }

    #[test]
    fn empty_input_has_no_groups() {
        let now = Utc::now();
        assert!(group_by_relative_day(std::iter::empty(), &now).is_empty());
    }
}
