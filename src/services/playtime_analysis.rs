//! Reconstructs playtime segments from a playtime log.

use chrono::{DateTime, Duration, FixedOffset};
use std::fmt;
use tracing::warn;

use crate::error::{Result, WrapperError};
use crate::events::LifecycleEvent;
use crate::services::playtime_log::LogEntry;

/// Lifecycle events as seen by the analysis. "wrapper died" counts as a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Start,
    Stop,
    Leave,
    Return,
}

impl From<LifecycleEvent> for EventType {
    fn from(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Start => EventType::Start,
            LifecycleEvent::Stop { .. } => EventType::Stop,
            LifecycleEvent::Unfocus => EventType::Leave,
            LifecycleEvent::Focus => EventType::Return,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairAction {
    /// The interval between the two events is playtime
    Keep,
    /// Valid transition, not playtime
    Discard,
    /// Transition that cannot happen in a well-formed log
    Invalid,
}

pub fn classify(prev: EventType, next: EventType) -> PairAction {
    use EventType::*;

    match (prev, next) {
        (Start, Stop) | (Start, Leave) | (Return, Stop) | (Return, Leave) => PairAction::Keep,
        (Start, Return) | (Stop, Start) | (Leave, Stop) | (Leave, Return) => PairAction::Discard,
        _ => PairAction::Invalid,
    }
}

/// A typed event, or an annotation when `event` is `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    pub event: Option<EventType>,
    pub at: DateTime<FixedOffset>,
    pub line: usize,
}

impl From<&LogEntry> for TimedEvent {
    fn from(entry: &LogEntry) -> Self {
        Self {
            event: (!entry.annotation).then(|| entry.event.into()),
            at: entry.at,
            line: entry.line,
        }
    }
}

/// A kept pair: time counted towards a total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPair {
    pub prev: EventType,
    pub next: EventType,
    pub prev_line: usize,
    pub next_line: usize,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub segments: Vec<Segment>,
    pub invalid: Vec<InvalidPair>,
}

impl Reconstruction {
    pub fn total(&self) -> Duration {
        self.segments
            .iter()
            .fold(Duration::zero(), |total, segment| total + segment.duration)
    }
}

/// Walk consecutive pairs of `events` (already in time order).
///
/// Annotations are skipped when they come next, and replaced by the
/// following event when they are the current one. Invalid pairs are
/// collected, and warned about when `report_invalid` is set.
pub fn reconstruct(events: &[TimedEvent], report_invalid: bool) -> Result<Reconstruction> {
    let Some((first, rest)) = events.split_first() else {
        return Err(not_enough_data());
    };
    if rest.is_empty() {
        return Err(not_enough_data());
    }

    let mut result = Reconstruction::default();
    let mut current = *first;

    for next in rest {
        let Some(next_type) = next.event else {
            continue;
        };
        let Some(current_type) = current.event else {
            current = *next;
            continue;
        };

        let duration = next.at.signed_duration_since(current.at);
        match classify(current_type, next_type) {
            PairAction::Keep => result.segments.push(Segment { duration }),
            PairAction::Discard => {}
            PairAction::Invalid => {
                let pair = InvalidPair {
                    prev: current_type,
                    next: next_type,
                    prev_line: current.line,
                    next_line: next.line,
                    duration,
                };
                if report_invalid {
                    warn!(
                        "Invalid event combination: {:?}, {:?} at lines {}/+{} duration {:.3}s",
                        pair.prev,
                        pair.next,
                        pair.prev_line,
                        pair.next_line.saturating_sub(pair.prev_line),
                        duration.num_milliseconds() as f64 / 1000.0
                    );
                }
                result.invalid.push(pair);
            }
        }
        current = *next;
    }

    Ok(result)
}

fn not_enough_data() -> WrapperError {
    WrapperError::Internal("Not enough data points".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaytimeReport {
    /// Built from start/stop events only
    pub run: Reconstruction,
    /// Built from every event, so time spent in the background is excluded
    pub active: Reconstruction,
    pub has_focus_events: bool,
}

impl PlaytimeReport {
    pub fn from_entries(entries: &[LogEntry], report_invalid: bool) -> Result<Self> {
        let mut events: Vec<TimedEvent> = entries.iter().map(TimedEvent::from).collect();
        // stable, so equal timestamps keep file order
        events.sort_by_key(|event| event.at);

        let run_events: Vec<TimedEvent> = events
            .iter()
            .copied()
            .filter(|event| matches!(event.event, Some(EventType::Start | EventType::Stop)))
            .collect();

        let run = reconstruct(&run_events, report_invalid)?;
        let active = reconstruct(&events, report_invalid)?;
        let has_focus_events = events
            .iter()
            .any(|event| matches!(event.event, Some(EventType::Leave | EventType::Return)));

        Ok(Self {
            run,
            active,
            has_focus_events,
        })
    }
}

impl fmt::Display for PlaytimeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = self.run.total();
        let active = self.active.total();
        writeln!(f, "Total run time:    {} ({:.2} hours)", format_duration(run), hours(run))?;
        let label = if self.has_focus_events { "active" } else { "run" };
        write!(
            f,
            "Total {} time: {} ({:.2} hours)",
            label,
            format_duration(active),
            hours(active)
        )
    }
}

fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}

/// `H:MM:SS`, hours unbounded
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds();
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}
