#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use ultimate_portfolio::model::{Issue, Priority, Tag};

/// Fixed base time so fixtures are deterministic.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_735_689_600, 0).unwrap() // 2025-01-01 00:00:00 UTC
}

pub fn issue(title: &str) -> Issue {
    Issue::new_at(title, base_time())
}

pub fn tag(name: &str) -> Tag {
    Tag::new(name)
}

pub struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            issue: issue(title),
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.issue.content = content.to_string();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.issue.priority = priority;
        self
    }

    pub fn completed(mut self) -> Self {
        self.issue.completed = true;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.issue.created_at = at;
        self.issue.modified_at = at;
        self
    }

    pub fn modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.issue.modified_at = at;
        self
    }

    /// Last modified `days` before now.
    pub fn modified_days_ago(self, days: i64) -> Self {
        self.modified_at(Utc::now() - Duration::days(days))
    }

    pub fn build(self) -> Issue {
        self.issue
    }
}
