//! Integration schema: the hand-maintained table of secrets that known
//! external integrations need, and which apps need them.

use serde::{Deserialize, Serialize};

/// One secret an integration requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationSecret {
    pub key: String,
    pub apps: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// A named group of secrets, e.g. one external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationGroup {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub secrets: Vec<IntegrationSecret>,
}

/// The full schema, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationSchema {
    groups: Vec<IntegrationGroup>,
}

/// (group, key, apps, description)
const BUILTIN: &[(&str, &str, &[&str], &str)] = &[
    (
        "firebase",
        "FIREBASE_API_KEY",
        &["frontend"],
        "Web API key for the auth client",
    ),
    (
        "firebase",
        "FIREBASE_AUTH_DOMAIN",
        &["frontend"],
        "Auth domain used by the sign-in flow",
    ),
    (
        "firebase",
        "FIREBASE_PROJECT_ID",
        &["frontend", "backend"],
        "Project identifier shared by client and server",
    ),
    (
        "firebase",
        "FIREBASE_SERVICE_ACCOUNT",
        &["backend"],
        "Admin SDK service account JSON",
    ),
    (
        "openai",
        "OPENAI_API_KEY",
        &["ai-service"],
        "Model provider API key",
    ),
    (
        "github",
        "GITHUB_TOKEN",
        &["backend"],
        "Token for repository automation",
    ),
    (
        "internal",
        "INTERNAL_API_TOKEN",
        &["backend", "ai-service"],
        "Shared token for service-to-service calls",
    ),
    (
        "internal",
        "SESSION_SECRET",
        &["backend"],
        "Cookie signing secret",
    ),
];

const GROUP_DESCRIPTIONS: &[(&str, &str)] = &[
    ("firebase", "Cloud authentication provider"),
    ("openai", "AI model provider"),
    ("github", "Source hosting automation"),
    ("internal", "Secrets owned by the platform itself"),
];

impl IntegrationSchema {
    pub fn new(groups: Vec<IntegrationGroup>) -> Self {
        Self { groups }
    }

    /// The schema shipped with the crate.
    pub fn builtin() -> Self {
        let mut groups: Vec<IntegrationGroup> = GROUP_DESCRIPTIONS
            .iter()
            .map(|(name, description)| IntegrationGroup {
                name: (*name).to_string(),
                description: (*description).to_string(),
                secrets: Vec::new(),
            })
            .collect();

        for (group, key, apps, description) in BUILTIN {
            if let Some(g) = groups.iter_mut().find(|g| g.name == *group) {
                g.secrets.push(IntegrationSecret {
                    key: (*key).to_string(),
                    apps: apps.iter().map(|a| (*a).to_string()).collect(),
                    description: (*description).to_string(),
                });
            }
        }

        Self { groups }
    }

    pub fn groups(&self) -> &[IntegrationGroup] {
        &self.groups
    }

    /// Every (group, secret) pair in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&IntegrationGroup, &IntegrationSecret)> {
        self.groups
            .iter()
            .flat_map(|g| g.secrets.iter().map(move |s| (g, s)))
    }

    /// Keys declared by the named group.
    pub fn keys_in_group(&self, group: &str) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.name == group)
            .flat_map(|g| g.secrets.iter().map(|s| s.key.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_schema_groups_keys() {
        let schema = IntegrationSchema::builtin();
        assert_eq!(schema.groups().len(), 4);
        assert_eq!(
            schema.keys_in_group("internal"),
            vec!["INTERNAL_API_TOKEN", "SESSION_SECRET"]
        );
        assert!(schema
            .entries()
            .all(|(_, s)| crate::vault::is_valid_key(&s.key) && !s.apps.is_empty()));
    }

    #[test]
    fn entries_follow_declaration_order() {
        let schema = IntegrationSchema::builtin();
        let first = schema.entries().next().unwrap();
        assert_eq!(first.0.name, "firebase");
        assert_eq!(first.1.key, "FIREBASE_API_KEY");
    }
}
