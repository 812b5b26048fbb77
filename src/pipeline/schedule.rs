//! Day-of-week workflow selection.
//!
//! The `schedule` config section maps day names to workflow kinds. Both
//! sides are closed sets: an unknown day or workflow name is rejected when
//! the config loads, and a day without an entry is reported as
//! [`ScheduleEntry::NotConfigured`] rather than falling back to a default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Local, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workflows a day can be scheduled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// Daily AI news digest
    Article,

    /// Model benchmark roundup
    Aibench,

    /// Open-source project roundup
    HelloGithub,

    /// Paper digest
    Paper,

    /// Hugging Face daily papers
    HfPaper,

    /// Hugging Face weekly papers
    HfPaperWeekly,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 6] = [
        WorkflowKind::Article,
        WorkflowKind::Aibench,
        WorkflowKind::HelloGithub,
        WorkflowKind::Paper,
        WorkflowKind::HfPaper,
        WorkflowKind::HfPaperWeekly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Article => "article",
            WorkflowKind::Aibench => "aibench",
            WorkflowKind::HelloGithub => "hello-github",
            WorkflowKind::Paper => "paper",
            WorkflowKind::HfPaper => "hf-paper",
            WorkflowKind::HfPaperWeekly => "hf-paper-weekly",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        let name = name.strip_suffix("-workflow").unwrap_or(&name);

        WorkflowKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| ScheduleError::UnknownWorkflow(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Unknown day of week '{0}' (use monday..sunday or 1..7)")]
    UnknownDay(String),

    #[error("Unknown workflow '{0}' (expected one of: article, aibench, hello-github, paper, hf-paper, hf-paper-weekly)")]
    UnknownWorkflow(String),
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// What to run on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEntry {
    Run(WorkflowKind),
    NotConfigured,
}

/// Parse a day name (`mon`, `Monday`) or ISO number (`1` = Monday .. `7` = Sunday)
pub fn parse_weekday(s: &str) -> Result<Weekday, ScheduleError> {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        return match n {
            1..=7 => Ok(WEEK[n - 1]),
            _ => Err(ScheduleError::UnknownDay(s.to_string())),
        };
    }
    trimmed
        .parse::<Weekday>()
        .map_err(|_| ScheduleError::UnknownDay(s.to_string()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: BTreeMap<u32, WorkflowKind>,
}

impl WeeklySchedule {
    /// Build from raw `day -> workflow` config entries
    pub fn from_config(entries: &BTreeMap<String, String>) -> Result<Self, ScheduleError> {
        let mut schedule = Self::default();
        for (day, workflow) in entries {
            schedule.set(parse_weekday(day)?, workflow.parse()?);
        }
        Ok(schedule)
    }

    pub fn set(&mut self, day: Weekday, kind: WorkflowKind) {
        self.days.insert(day.num_days_from_monday(), kind);
    }

    pub fn entry(&self, day: Weekday) -> ScheduleEntry {
        match self.days.get(&day.num_days_from_monday()) {
            Some(kind) => ScheduleEntry::Run(*kind),
            None => ScheduleEntry::NotConfigured,
        }
    }

    /// Entry for the current local day
    pub fn today(&self) -> (Weekday, ScheduleEntry) {
        let day = Local::now().weekday();
        (day, self.entry(day))
    }

    /// All seven days, Monday first
    pub fn week(&self) -> Vec<(Weekday, ScheduleEntry)> {
        WEEK.iter().map(|day| (*day, self.entry(*day))).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
