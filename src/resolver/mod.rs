//! Requirement resolver: merges the integration schema, the scanner's
//! usage index and the vault contents into one per-(app, key) ledger.
//!
//! Requirements are per app; presence is global.  The vault is one flat
//! namespace, so a key with a non-empty value is `present` for every app
//! that requires it.  Keys no app requires never appear, even when the
//! vault holds them.

pub mod schema;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::config::Settings;
use crate::scanner::{normalize_rel, path_under, UsageIndex};
use crate::sync::queue::PendingSync;
use crate::vault::SecretSummary;

pub use schema::{IntegrationGroup, IntegrationSchema, IntegrationSecret};

/// Most source paths reported per item.
pub const FOUND_IN_SAMPLE: usize = 5;

/// Why an (app, key) pair is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequirementReason {
    /// Declared by an integration group.
    Integration { group: String, description: String },
    /// Referenced in the app's source `count` times.
    Scan { count: usize },
    /// Marked required in the vault outside the internal group.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretStatus {
    Present,
    Missing,
}

/// One row of the requirement ledger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSecretItem {
    pub key: String,
    pub app: String,
    pub status: SecretStatus,
    pub reasons: Vec<RequirementReason>,
    pub found_in: Vec<String>,
    pub has_secret: bool,
    pub has_value: bool,
    pub required: bool,
    pub pending_sync: bool,
}

impl RequiredSecretItem {
    pub fn is_missing(&self) -> bool {
        self.status == SecretStatus::Missing
    }
}

/// The resolved ledger plus the pending-sync queue it was computed with.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSecrets {
    pub items: Vec<RequiredSecretItem>,
    pub pending: Vec<PendingSync>,
}

impl RequiredSecrets {
    /// Items required by `app`, in key order.
    pub fn for_app<'a>(&'a self, app: &'a str) -> impl Iterator<Item = &'a RequiredSecretItem> {
        self.items.iter().filter(move |i| i.app == app)
    }

    /// Number of (app, key) items whose key has no value.
    pub fn missing_count(&self) -> usize {
        self.items.iter().filter(|i| i.is_missing()).count()
    }
}

/// Ledger builder bound to a schema and an app list.
pub struct Resolver {
    schema: IntegrationSchema,
    internal_group: String,
    /// (app name, source root) in display order.
    apps: Vec<(String, String)>,
}

impl Resolver {
    pub fn new(
        schema: IntegrationSchema,
        internal_group: impl Into<String>,
        apps: Vec<(String, String)>,
    ) -> Self {
        Self {
            schema,
            internal_group: internal_group.into(),
            apps,
        }
    }

    /// Roots are normalized the way the scanner normalizes them, so
    /// `./backend/` and `backend` name the same tree.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.integration_schema(),
            settings.internal_group.clone(),
            settings
                .services
                .iter()
                .map(|s| (s.name.clone(), normalize_rel(&s.root)))
                .collect(),
        )
    }

    pub fn schema(&self) -> &IntegrationSchema {
        &self.schema
    }

    /// Build the ledger.
    pub fn resolve(
        &self,
        usage: &UsageIndex,
        vault: &[SecretSummary],
        pending: &[PendingSync],
    ) -> RequiredSecrets {
        let vault: HashMap<&str, &SecretSummary> =
            vault.iter().map(|s| (s.key.as_str(), s)).collect();

        let mut ledger: BTreeMap<(String, String), Draft> = BTreeMap::new();

        // 1. Declared integrations.
        for (group, secret) in self.schema.entries() {
            for app in &secret.apps {
                ledger
                    .entry((app.clone(), secret.key.clone()))
                    .or_default()
                    .reasons
                    .push(RequirementReason::Integration {
                        group: group.name.clone(),
                        description: secret.description.clone(),
                    });
            }
        }

        // 2. Scanned references, restricted to known apps and to paths
        //    under that app's root.
        for entry in usage.iter() {
            for module in &entry.modules {
                let Some(root) = self.root_of(module) else {
                    continue;
                };
                let paths: Vec<&String> = entry
                    .found_in
                    .iter()
                    .filter(|p| path_under(p, root))
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                let count = entry
                    .locations
                    .iter()
                    .filter(|l| path_under(&l.path, root))
                    .count();

                let draft = ledger
                    .entry((module.clone(), entry.key.clone()))
                    .or_default();
                draft.reasons.push(RequirementReason::Scan { count });
                draft.found_in.extend(paths.into_iter().cloned());

                let flagged = vault.get(entry.key.as_str()).is_some_and(|s| s.required);
                if flagged && !self.is_internal(&draft.reasons) && !draft.has_flag() {
                    draft.reasons.push(RequirementReason::Flag);
                }
            }
        }

        // 3. Presence and queue state.
        let mut items: Vec<RequiredSecretItem> = ledger
            .into_iter()
            .map(|((app, key), draft)| {
                let record = vault.get(key.as_str());
                let has_value = record.is_some_and(|s| s.has_value);
                let mut found_in = draft.found_in;
                found_in.sort();
                found_in.dedup();
                found_in.truncate(FOUND_IN_SAMPLE);

                RequiredSecretItem {
                    status: if has_value {
                        SecretStatus::Present
                    } else {
                        SecretStatus::Missing
                    },
                    reasons: draft.reasons,
                    found_in,
                    has_secret: record.is_some(),
                    has_value,
                    required: record.is_some_and(|s| s.required),
                    pending_sync: pending.iter().any(|p| p.key == key),
                    key,
                    app,
                }
            })
            .collect();

        // 4. App display order, then key.
        items.sort_by(|a, b| {
            self.app_rank(&a.app)
                .cmp(&self.app_rank(&b.app))
                .then_with(|| a.app.cmp(&b.app))
                .then_with(|| a.key.cmp(&b.key))
        });

        RequiredSecrets {
            items,
            pending: pending.to_vec(),
        }
    }

    fn root_of(&self, app: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(name, _)| name == app)
            .map(|(_, root)| root.as_str())
    }

    fn app_rank(&self, app: &str) -> usize {
        self.apps
            .iter()
            .position(|(name, _)| name == app)
            .unwrap_or(self.apps.len())
    }

    fn is_internal(&self, reasons: &[RequirementReason]) -> bool {
        reasons.iter().any(|r| {
            matches!(r, RequirementReason::Integration { group, .. } if *group == self.internal_group)
        })
    }
}

#[derive(Default)]
struct Draft {
    reasons: Vec<RequirementReason>,
    found_in: Vec<String>,
}

impl Draft {
    fn has_flag(&self) -> bool {
        self.reasons.contains(&RequirementReason::Flag)
    }
}
