// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Reason taxonomies for Accept and Reject labels.
//!
//! A taxonomy is built once from configuration and then only queried. It
//! mirrors what a reviewer is offered when labelling: plain checkable
//! reasons, and named groups whose options are either multi-select,
//! single-choice, or purely descriptive (in which case the group name itself
//! is the reason).

use super::clip::Label;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// How the options of a reason group are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupMode {
    /// Any number of options may be chosen.
    #[default]
    CheckBox,
    /// At most one option may be chosen.
    RadioButton,
    /// The group name is the reason; options only describe it.
    Label,
}

/// A named group of reasons as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonGroup {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mode: GroupMode,
    pub options: Vec<String>,
}

/// One category table (`accept_reasons` or `reject_reasons`) as written in
/// the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonsConfig {
    #[serde(rename = "_simple", default)]
    pub simple: Vec<String>,
    #[serde(flatten)]
    pub groups: IndexMap<String, ReasonGroup>,
}

/// An entry of a resolved taxonomy, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonEntry {
    Simple(String),
    Group(ReasonGroup),
}

/// Resolved, ordered reason taxonomy for one label kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonTaxonomy {
    entries: Vec<ReasonEntry>,
}

impl ReasonTaxonomy {
    /// Resolve a category table: simple reasons keep their order, a group
    /// whose name matches a simple reason takes its place, and remaining
    /// groups are appended in declaration order.
    pub fn from_config(config: &ReasonsConfig) -> Self {
        let mut entries: Vec<ReasonEntry> = config
            .simple
            .iter()
            .cloned()
            .map(ReasonEntry::Simple)
            .collect();

        for group in config.groups.values() {
            let slot = entries
                .iter()
                .position(|e| matches!(e, ReasonEntry::Simple(name) if *name == group.name));
            match slot {
                Some(idx) => entries[idx] = ReasonEntry::Group(group.clone()),
                None => entries.push(ReasonEntry::Group(group.clone())),
            }
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[ReasonEntry] {
        &self.entries
    }

    /// All strings that may be stored as a reason, in display order.
    pub fn selectable(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                ReasonEntry::Simple(name) => out.push(name.as_str()),
                ReasonEntry::Group(group) if group.mode == GroupMode::Label => {
                    out.push(group.name.as_str())
                }
                ReasonEntry::Group(group) => out.extend(group.options.iter().map(String::as_str)),
            }
        }
        out
    }

    pub fn contains(&self, reason: &str) -> bool {
        self.selectable().contains(&reason)
    }

    /// Check a reason selection, returning the first offending reason.
    ///
    /// A selection is invalid if it names a reason outside the taxonomy or
    /// picks more than one option of a single-choice group.
    pub fn validate<'a>(&self, reasons: &'a [String]) -> Result<(), &'a str> {
        if let Some(unknown) = reasons.iter().find(|r| !self.contains(r)) {
            return Err(unknown.as_str());
        }

        for entry in &self.entries {
            let ReasonEntry::Group(group) = entry else {
                continue;
            };
            if group.mode != GroupMode::RadioButton {
                continue;
            }
            let mut chosen = reasons.iter().filter(|r| group.options.contains(*r));
            chosen.next();
            if let Some(extra) = chosen.next() {
                return Err(extra.as_str());
            }
        }

        Ok(())
    }
}

/// Accept and reject taxonomies together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReasonCatalog {
    pub accept: ReasonTaxonomy,
    pub reject: ReasonTaxonomy,
}

impl ReasonCatalog {
    pub fn new(accept: &ReasonsConfig, reject: &ReasonsConfig) -> Self {
        Self {
            accept: ReasonTaxonomy::from_config(accept),
            reject: ReasonTaxonomy::from_config(reject),
        }
    }

    pub fn for_label(&self, label: Label) -> &ReasonTaxonomy {
        match label {
            Label::Accept => &self.accept,
            Label::Reject => &self.reject,
        }
    }
}
