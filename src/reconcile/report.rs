use std::fmt;

use crate::{catalog::TranslationWarning, policy::Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// A whole domain, e.g. when its document section is malformed
    Domain,
    Set,
    Stack,
    Rule,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Domain => "domain",
            Level::Set => "set",
            Level::Stack => "stack",
            Level::Rule => "rule",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Default-flagged object left in place
    Protected,
    Failed(String),
    /// Not attempted because the owning Set could not be written or read
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => f.write_str("created"),
            Outcome::Updated => f.write_str("updated"),
            Outcome::Unchanged => f.write_str("unchanged"),
            Outcome::Deleted => f.write_str("deleted"),
            Outcome::Protected => f.write_str("protected (default)"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
            Outcome::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub domain: Domain,
    pub level: Level,
    pub name: String,
    /// Owning Set of a Rule
    pub parent: Option<String>,
    pub outcome: Outcome,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.domain.descriptor().label;
        match &self.parent {
            Some(parent) => write!(
                f,
                "{} {} '{}' in '{}': {}",
                label, self.level, self.name, parent, self.outcome
            ),
            None => write!(f, "{} {} '{}': {}", label, self.level, self.name, self.outcome),
        }
    }
}

/// Counts per outcome
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub protected: usize,
    pub failed: usize,
    pub warnings: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} unchanged, {} deleted, {} protected, {} failed, {} warning(s)",
            self.created,
            self.updated,
            self.unchanged,
            self.deleted,
            self.protected,
            self.failed,
            self.warnings
        )
    }
}

/// Per-object record of one reconciliation run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
    pub warnings: Vec<(Domain, String, TranslationWarning)>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        domain: Domain,
        level: Level,
        name: &str,
        parent: Option<&str>,
        outcome: Outcome,
    ) {
        let entry = ReportEntry {
            domain,
            level,
            name: name.to_string(),
            parent: parent.map(str::to_string),
            outcome,
        };
        match &entry.outcome {
            Outcome::Failed(_) => log::error!("{}", entry),
            Outcome::Unchanged | Outcome::Protected | Outcome::Skipped => log::debug!("{}", entry),
            _ => log::info!("{}", entry),
        }
        self.entries.push(entry);
    }

    /// Keep the unresolved references met while translating `object`
    pub fn warn(&mut self, domain: Domain, object: &str, warnings: Vec<TranslationWarning>) {
        self.warnings
            .extend(warnings.into_iter().map(|w| (domain, object.to_string(), w)));
    }

    pub fn merge(&mut self, other: Report) {
        self.entries.extend(other.entries);
        self.warnings.extend(other.warnings);
    }

    pub fn has_failures(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry.outcome, Outcome::Failed(_)))
    }

    pub fn outcome_of(&self, level: Level, name: &str) -> Option<&Outcome> {
        self.entries
            .iter()
            .find(|entry| entry.level == level && entry.name == name)
            .map(|entry| &entry.outcome)
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            warnings: self.warnings.len(),
            ..Summary::default()
        };
        for entry in &self.entries {
            match entry.outcome {
                Outcome::Created => summary.created += 1,
                Outcome::Updated => summary.updated += 1,
                Outcome::Unchanged => summary.unchanged += 1,
                Outcome::Deleted => summary.deleted += 1,
                Outcome::Protected => summary.protected += 1,
                Outcome::Failed(_) => summary.failed += 1,
                Outcome::Skipped => {}
            }
        }
        summary
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        for (domain, object, warning) in &self.warnings {
            writeln!(
                f,
                "{} warning: '{}': {}",
                domain.descriptor().label,
                object,
                warning
            )?;
        }
        write!(f, "{}", self.summary())
    }
}
