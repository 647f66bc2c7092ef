use groupwatch_client::StopReason;
use groupwatch_core::{GroupInfo, GroupRole, Identity, ScanResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// Who or what a scan started from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanSubject {
    User(Identity),
    Group {
        group: GroupInfo,
        /// Roles whose members were scanned, lowest rank first
        roles: Vec<GroupRole>,
    },
}

/// A listing that ended before the server ran out of pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TruncatedList {
    pub list: String,
    pub items: usize,
    pub reason: String,
}

/// Outcome of one traversal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// `None` when the scan target could not be resolved
    pub subject: Option<ScanSubject>,
    /// Results in traversal order
    pub results: Vec<ScanResult>,
    /// Identities whose memberships were evaluated
    pub scanned: usize,
    /// Identities dropped because their memberships could not be fetched
    pub skipped: usize,
    /// Identities examined per relation kind or role name
    pub relation_counts: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub truncated: Vec<TruncatedList>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub found: bool,
    pub scanned: usize,
    pub flagged: usize,
    pub safe: usize,
    pub skipped: usize,
    pub flagged_ratio: f64,
}

impl ScanReport {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn for_subject(subject: ScanSubject) -> Self {
        Self {
            subject: Some(subject),
            ..Self::default()
        }
    }

    pub fn found(&self) -> bool {
        self.subject.is_some()
    }

    /// Results for identities in a watch-list group.
    pub fn alerts(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(|result| result.is_alert())
    }

    pub fn flagged(&self) -> usize {
        self.alerts().count()
    }

    pub fn safe(&self) -> usize {
        self.scanned.saturating_sub(self.flagged())
    }

    pub fn flagged_ratio(&self) -> f64 {
        if self.scanned == 0 {
            0.0
        } else {
            self.flagged() as f64 / self.scanned as f64
        }
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            found: self.found(),
            scanned: self.scanned,
            flagged: self.flagged(),
            safe: self.safe(),
            skipped: self.skipped,
            flagged_ratio: self.flagged_ratio(),
        }
    }

    pub(crate) fn count_examined(&mut self, label: &str) {
        *self.relation_counts.entry(label.to_string()).or_default() += 1;
    }

    pub(crate) fn note_truncated(&mut self, list: String, items: usize, stop: &StopReason) {
        let reason = match stop {
            StopReason::Exhausted => return,
            StopReason::CapReached => "cap reached".to_string(),
            StopReason::PageLimit => "page limit reached".to_string(),
            StopReason::Failed(e) => e.to_string(),
        };
        self.truncated.push(TruncatedList {
            list,
            items,
            reason,
        });
    }
}
