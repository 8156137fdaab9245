//! Registry entity types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use confreg_common::{ConfregError, Result, validate_identifier};

use crate::keys::{GROUP_PREFIX, LABELED_CONFIG_PREFIX, PLAIN_CONFIG_PREFIX};

/// Parameter mapping carried by every configuration
pub type Parameters = BTreeMap<String, String>;

/// Label mapping of a labeled configuration.
///
/// Two label sets match only when they are structurally equal: same key set
/// and the same value for every key. There is no subset matching.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn matches_exactly(&self, filter: &Labels) -> bool {
        self == filter
    }
}

impl From<BTreeMap<String, String>> for Labels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Labels(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Labels(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl std::str::FromStr for Labels {
    type Err = ConfregError;

    /// Parse the `k=v,k2=v2` filter notation used in request paths.
    fn from_str(s: &str) -> Result<Self> {
        confreg_common::parse_label_filter(s).map(Labels)
    }
}

/// An entity identified by a unique `(name, version)` pair and stored under
/// its own key family.
pub trait Versioned: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human readable kind used in error messages and logs
    const KIND: &'static str;
    /// Storage key family, ending in `/`
    const KEY_PREFIX: &'static str;

    fn name(&self) -> &str;
    fn version(&self) -> u32;

    /// Checks run before the entity reaches storage
    fn validate(&self) -> Result<()> {
        validate_identifier("name", self.name())
    }

    fn describe(&self) -> String {
        describe::<Self>(self.name(), self.version())
    }
}

/// `configuration 'db/3'` style description for messages
pub fn describe<T: Versioned>(name: &str, version: u32) -> String {
    format!("{} '{}/{}'", T::KIND, name, version)
}

// ============================================================================
// Configuration
// ============================================================================

/// A named, versioned set of parameters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Version")]
    pub version: u32,
    #[serde(alias = "Parameters", default)]
    pub parameters: Parameters,
}

impl Configuration {
    pub fn new(name: impl Into<String>, version: u32, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            version,
            parameters,
        }
    }
}

impl Versioned for Configuration {
    const KIND: &'static str = "configuration";
    const KEY_PREFIX: &'static str = PLAIN_CONFIG_PREFIX;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }
}

// ============================================================================
// LabeledConfiguration
// ============================================================================

/// A configuration that also carries labels used for group filtering.
/// Labels never take part in identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledConfiguration {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub labels: Labels,
}

impl LabeledConfiguration {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        parameters: Parameters,
        labels: Labels,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            parameters,
            labels,
        }
    }

    pub fn same_identity(&self, name: &str, version: u32) -> bool {
        self.name == name && self.version == version
    }
}

impl Versioned for LabeledConfiguration {
    const KIND: &'static str = "labeled configuration";
    const KEY_PREFIX: &'static str = LABELED_CONFIG_PREFIX;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }
}

// ============================================================================
// ConfigurationGroup
// ============================================================================

/// An ordered collection of labeled configurations, held by value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationGroup {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub configuration: Vec<LabeledConfiguration>,
}

impl ConfigurationGroup {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        configuration: Vec<LabeledConfiguration>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            configuration,
        }
    }

    pub fn contains_member(&self, name: &str, version: u32) -> bool {
        self.configuration
            .iter()
            .any(|member| member.same_identity(name, version))
    }

    /// Members whose labels exactly equal `filter`, in group order
    pub fn filtered(&self, filter: &Labels) -> Vec<LabeledConfiguration> {
        self.configuration
            .iter()
            .filter(|member| member.labels.matches_exactly(filter))
            .cloned()
            .collect()
    }
}

impl Versioned for ConfigurationGroup {
    const KIND: &'static str = "configuration group";
    const KEY_PREFIX: &'static str = GROUP_PREFIX;

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn validate(&self) -> Result<()> {
        validate_identifier("group name", &self.name)?;
        for (i, member) in self.configuration.iter().enumerate() {
            member.validate()?;
            let duplicated = self.configuration[..i]
                .iter()
                .any(|earlier| earlier.same_identity(&member.name, member.version));
            if duplicated {
                return Err(ConfregError::validation(format!(
                    "group '{}/{}' lists member '{}/{}' more than once",
                    self.name, self.version, member.name, member.version
                )));
            }
        }
        Ok(())
    }
}
