//! Typed dispatcher configuration tree.
//!
//! Scalars keep the source of the line that declared them. List-valued
//! properties carry the source of their label line.
//!
//! String values are stored unquoted: `/url "*"`, `/url '*'` and `/url *`
//! all decode to `*`, and rule conditions compare against that form.

use crate::source::{ConfigurationSource, ConfigurationValue};
use crate::types::FarmType;

/// Root of a parsed `dispatcher.any`.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfiguration {
    /// `/name`.
    pub name: Option<ConfigurationValue<String>>,
    /// `/ignoreEINTR`.
    pub ignore_eintr: Option<ConfigurationValue<bool>>,
    /// Farms in declaration order.
    pub farms: Vec<Farm>,
}

impl DispatcherConfiguration {
    /// Returns the farms of the given type.
    pub fn farms_of_type(&self, farm_type: FarmType) -> impl Iterator<Item = &Farm> {
        self.farms.iter().filter(move |f| f.farm_type() == farm_type)
    }
}

/// One `/farms` entry.
#[derive(Debug, Clone)]
pub struct Farm {
    /// The farm's label, with the source of its opening line.
    pub label: ConfigurationValue<String>,
    /// `/clientheaders`.
    pub client_headers: Option<ConfigurationValue<Vec<String>>>,
    /// `/virtualhosts`.
    pub virtual_hosts: Option<ConfigurationValue<Vec<String>>>,
    /// `/renders`.
    pub renders: Option<ConfigurationValue<Vec<Render>>>,
    /// `/filter`.
    pub filter: Option<ConfigurationValue<Vec<Filter>>>,
    /// `/cache`.
    pub cache: Option<Cache>,
    /// `/retryDelay`.
    pub retry_delay: Option<ConfigurationValue<i64>>,
    /// `/numberOfRetries`.
    pub number_of_retries: Option<ConfigurationValue<i64>>,
    /// `/unavailablePenalty`.
    pub unavailable_penalty: Option<ConfigurationValue<i64>>,
    /// `/failover`.
    pub failover: Option<ConfigurationValue<bool>>,
    /// `/stickyConnectionsFor`.
    pub sticky_connections_for: Option<ConfigurationValue<String>>,
    /// `/health_check { /url }`.
    pub health_check_url: Option<ConfigurationValue<String>>,
    /// `/propagateSyndPost`.
    pub propagate_synd_post: Option<ConfigurationValue<bool>>,
}

impl Farm {
    /// Creates a farm with nothing configured.
    #[must_use]
    pub fn new(label: ConfigurationValue<String>) -> Self {
        Self {
            label,
            client_headers: None,
            virtual_hosts: None,
            renders: None,
            filter: None,
            cache: None,
            retry_delay: None,
            number_of_retries: None,
            unavailable_penalty: None,
            failover: None,
            sticky_connections_for: None,
            health_check_url: None,
            propagate_synd_post: None,
        }
    }

    /// Farms whose label mentions `author` front an author instance.
    #[must_use]
    pub fn farm_type(&self) -> FarmType {
        if self.label.value().to_ascii_lowercase().contains("author") {
            FarmType::Author
        } else {
            FarmType::Publish
        }
    }

    /// Returns where the farm was declared.
    #[must_use]
    pub fn source(&self) -> &ConfigurationSource {
        self.label.source()
    }
}

/// `/cache` section of a farm.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct Cache {
    pub source: ConfigurationSource,
    pub docroot: Option<ConfigurationValue<String>>,
    pub statfile: Option<ConfigurationValue<String>>,
    pub statfileslevel: Option<ConfigurationValue<i64>>,
    pub serve_stale_on_error: Option<ConfigurationValue<bool>>,
    pub allow_authorized: Option<ConfigurationValue<bool>>,
    pub grace_period: Option<ConfigurationValue<i64>>,
    pub enable_ttl: Option<ConfigurationValue<bool>>,
    pub rules: Option<ConfigurationValue<Vec<Rule>>>,
    pub invalidate: Option<ConfigurationValue<Vec<Rule>>>,
    pub allowed_clients: Option<ConfigurationValue<Vec<Rule>>>,
    pub ignore_url_params: Option<ConfigurationValue<Vec<Rule>>>,
    pub headers: Option<ConfigurationValue<Vec<String>>>,
    pub mode: Option<ConfigurationValue<String>>,
}

/// One `/filter` entry. Field values are unquoted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Filter {
    pub label: String,
    pub filter_type: Option<String>,
    pub glob: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub query: Option<String>,
    pub protocol: Option<String>,
    pub path: Option<String>,
    pub selectors: Option<String>,
    pub extension: Option<String>,
    pub suffix: Option<String>,
    pub source: ConfigurationSource,
}

impl Filter {
    /// Returns a field by its label name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "type" => self.filter_type.as_deref(),
            "glob" => self.glob.as_deref(),
            "url" => self.url.as_deref(),
            "method" => self.method.as_deref(),
            "query" => self.query.as_deref(),
            "protocol" => self.protocol.as_deref(),
            "path" => self.path.as_deref(),
            "selectors" => self.selectors.as_deref(),
            "extension" => self.extension.as_deref(),
            "suffix" => self.suffix.as_deref(),
            _ => None,
        }
    }
}

/// One entry of a cache rule list (`/rules`, `/invalidate`, ...). Field
/// values are unquoted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Rule {
    pub label: String,
    pub rule_type: Option<String>,
    pub glob: Option<String>,
    pub source: ConfigurationSource,
}

/// One `/renders` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Render {
    pub label: String,
    pub hostname: Option<String>,
    pub port: Option<String>,
    pub timeout: Option<i64>,
    pub source: ConfigurationSource,
}
