use std::{fmt, str::FromStr, sync::Arc};

use serde::Serialize;

use crate::{
    error::{MigrateError, Result},
    step::Step,
};

/// A migration version. Versions are totally ordered and applied ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A step together with the version and description it was registered under.
#[derive(Clone)]
pub struct RegisteredStep {
    pub version: Version,
    pub description: String,
    pub step: Arc<dyn Step>,
}

impl fmt::Debug for RegisteredStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The statically declared, ordered list of migration steps.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    steps: Vec<RegisteredStep>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn steps(&self) -> &[RegisteredStep] {
        &self.steps
    }

    pub fn get(&self, version: Version) -> Option<&RegisteredStep> {
        self.steps
            .binary_search_by_key(&version, |s| s.version)
            .ok()
            .map(|idx| &self.steps[idx])
    }

    pub fn contains(&self, version: Version) -> bool {
        self.get(version).is_some()
    }

    pub fn latest(&self) -> Option<Version> {
        self.steps.last().map(|s| s.version)
    }

    pub fn versions(&self) -> impl Iterator<Item = Version> + '_ {
        self.steps.iter().map(|s| s.version)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    steps: Vec<RegisteredStep>,
    error: Option<MigrateError>,
}

impl RegistryBuilder {
    /// Declares the next step. Versions must be added in strictly ascending
    /// order; the first violation is reported by [`RegistryBuilder::build`].
    pub fn add<S>(mut self, version: u64, description: impl Into<String>, step: S) -> Self
    where
        S: Step + 'static,
    {
        if self.error.is_some() {
            return self;
        }

        let version = Version::new(version);
        let description = description.into();

        if description.trim().is_empty() {
            self.error = Some(MigrateError::InvalidRegistry(format!(
                "version {version} has an empty description"
            )));
            return self;
        }

        if let Some(last) = self.steps.last() {
            if version == last.version {
                self.error = Some(MigrateError::InvalidRegistry(format!(
                    "version {version} is declared twice"
                )));
                return self;
            }

            if version < last.version {
                self.error = Some(MigrateError::InvalidRegistry(format!(
                    "version {version} is declared after {}",
                    last.version
                )));
                return self;
            }
        }

        self.steps.push(RegisteredStep {
            version,
            description,
            step: Arc::new(step),
        });

        self
    }

    pub fn build(self) -> Result<Registry> {
        if let Some(err) = self.error {
            return Err(err);
        }

        Ok(Registry { steps: self.steps })
    }
}
