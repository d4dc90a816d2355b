//! Versioned partition naming

use serde::Serialize;

use crate::domain::DomainError;

/// The three logical partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    Static,
    Dynamic,
    Api,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [Self::Static, Self::Dynamic, Self::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Api => "api",
        }
    }
}

impl std::fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Names of the live partitions for one worker version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionNames {
    pub static_assets: String,
    pub dynamic: String,
    pub api: String,
}

impl PartitionNames {
    /// Builds `<prefix>-<kind>-<version>` names
    pub fn versioned(prefix: &str, version: &str) -> Result<Self, DomainError> {
        validate_segment("cache prefix", prefix)?;
        validate_segment("version", version)?;

        let name = |kind: PartitionKind| format!("{}-{}-{}", prefix, kind, version);

        Ok(Self {
            static_assets: name(PartitionKind::Static),
            dynamic: name(PartitionKind::Dynamic),
            api: name(PartitionKind::Api),
        })
    }

    pub fn get(&self, kind: PartitionKind) -> &str {
        match kind {
            PartitionKind::Static => &self.static_assets,
            PartitionKind::Dynamic => &self.dynamic,
            PartitionKind::Api => &self.api,
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.static_assets, &self.dynamic, &self.api]
    }

    /// True when `name` belongs to this version
    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

fn validate_segment(label: &str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::validation(format!("{} cannot be empty", label)));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(DomainError::validation(format!(
            "{} '{}' can only contain alphanumeric characters, dots, hyphens, and underscores",
            label, value
        )));
    }

    Ok(())
}
