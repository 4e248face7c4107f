//! Maps the untyped block tree onto [`DispatcherConfiguration`].
//!
//! Unknown labels, malformed values and deprecated properties are recorded
//! as violations; decoding always produces a tree.

use super::model::{Cache, DispatcherConfiguration, Farm, Filter, Render, Rule};
use super::reader::{unquote, Block, Item, Node};
use crate::source::{ConfigurationSource, ConfigurationValue};
use crate::violations::{ConfigurationViolations, SyntaxFault};
use tracing::debug;

const IGNORED_FARM_LABELS: &[&str] = &[
    "sessionmanagement",
    "statistics",
    "stickyConnections",
    "auth_checker",
    "vanity_urls",
    "info",
];

const IGNORED_RENDER_LABELS: &[&str] = &["receiveTimeout", "ipv4", "secure", "always-resolve"];

const IGNORED_CACHE_LABELS: &[&str] = &["invalidateHandler"];

pub(crate) struct Decoder<'v> {
    violations: &'v mut ConfigurationViolations,
}

impl<'v> Decoder<'v> {
    pub(crate) fn new(violations: &'v mut ConfigurationViolations) -> Self {
        Self { violations }
    }

    pub(crate) fn configuration(&mut self, root: &Block) -> DispatcherConfiguration {
        let mut config = DispatcherConfiguration::default();
        for item in &root.items {
            let Some((label, source, node)) = self.property(item, "dispatcher") else {
                continue;
            };
            match label {
                "name" => config.name = self.text(label, source, node),
                "ignoreEINTR" => config.ignore_eintr = self.boolean(label, source, node),
                "farms" => {
                    if let Some(block) = self.block(label, source, node) {
                        config.farms = self.farms(block);
                    }
                }
                _ => self.unknown(label, "dispatcher", source),
            }
        }
        config
    }

    fn farms(&mut self, block: &Block) -> Vec<Farm> {
        let mut farms = Vec::new();
        for (label, source, body) in self.entries(block, "farms") {
            farms.push(self.farm(label, source, body));
        }
        farms
    }

    fn farm(&mut self, label: &str, source: &ConfigurationSource, block: &Block) -> Farm {
        let mut farm = Farm::new(ConfigurationValue::new(label.to_string(), source.clone()));
        for item in &block.items {
            let Some((label, source, node)) = self.property(item, "farm") else {
                continue;
            };
            match label {
                "clientheaders" => farm.client_headers = self.strings(label, source, node),
                "virtualhosts" => farm.virtual_hosts = self.strings(label, source, node),
                "renders" => {
                    farm.renders = self
                        .block(label, source, node)
                        .map(|b| ConfigurationValue::new(self.renders(b), source.clone()));
                }
                "filter" => {
                    farm.filter = self
                        .block(label, source, node)
                        .map(|b| ConfigurationValue::new(self.filters(b), source.clone()));
                }
                "cache" => farm.cache = self.block(label, source, node).map(|b| self.cache(b, source)),
                "retryDelay" => farm.retry_delay = self.integer(label, source, node),
                "numberOfRetries" => farm.number_of_retries = self.integer(label, source, node),
                "unavailablePenalty" => farm.unavailable_penalty = self.integer(label, source, node),
                "failover" => farm.failover = self.boolean(label, source, node),
                "propagateSyndPost" => farm.propagate_synd_post = self.boolean(label, source, node),
                "stickyConnectionsFor" => {
                    farm.sticky_connections_for = self.text(label, source, node);
                }
                "health_check" => {
                    if let Some(b) = self.block(label, source, node) {
                        farm.health_check_url = self.health_check(b);
                    }
                }
                "homepage" => self.deprecated(label, "farm", source),
                _ if IGNORED_FARM_LABELS.contains(&label) => {
                    debug!("{}: /{} is not analyzed", source, label);
                }
                _ => self.unknown(label, "farm", source),
            }
        }
        farm
    }

    fn health_check(&mut self, block: &Block) -> Option<ConfigurationValue<String>> {
        let mut url = None;
        for item in &block.items {
            let Some((label, source, node)) = self.property(item, "health_check") else {
                continue;
            };
            match label {
                "url" => url = self.text(label, source, node),
                _ => self.unknown(label, "health_check", source),
            }
        }
        url
    }

    fn renders(&mut self, block: &Block) -> Vec<Render> {
        let mut renders = Vec::new();
        for (label, source, body) in self.entries(block, "renders") {
            let mut render = Render {
                label: label.to_string(),
                source: source.clone(),
                ..Render::default()
            };
            for item in &body.items {
                let Some((label, source, node)) = self.property(item, "render") else {
                    continue;
                };
                match label {
                    "hostname" => render.hostname = self.text(label, source, node).map(ConfigurationValue::into_value),
                    "port" => render.port = self.text(label, source, node).map(ConfigurationValue::into_value),
                    "timeout" => render.timeout = self.integer(label, source, node).map(ConfigurationValue::into_value),
                    _ if IGNORED_RENDER_LABELS.contains(&label) => {
                        debug!("{}: /{} is not analyzed", source, label);
                    }
                    _ => self.unknown(label, "render", source),
                }
            }
            renders.push(render);
        }
        renders
    }

    fn filters(&mut self, block: &Block) -> Vec<Filter> {
        let mut filters = Vec::new();
        for (label, source, body) in self.entries(block, "filter") {
            let mut filter = Filter {
                label: label.to_string(),
                source: source.clone(),
                ..Filter::default()
            };
            for item in &body.items {
                let Some((label, source, node)) = self.property(item, "filter") else {
                    continue;
                };
                let slot = match label {
                    "type" => &mut filter.filter_type,
                    "glob" => {
                        self.deprecated(label, "filter", source);
                        &mut filter.glob
                    }
                    "url" => &mut filter.url,
                    "method" => &mut filter.method,
                    "query" => &mut filter.query,
                    "protocol" => &mut filter.protocol,
                    "path" => &mut filter.path,
                    "selectors" => &mut filter.selectors,
                    "extension" => &mut filter.extension,
                    "suffix" => &mut filter.suffix,
                    _ => {
                        self.unknown(label, "filter", source);
                        continue;
                    }
                };
                *slot = self.text(label, source, node).map(ConfigurationValue::into_value);
            }
            filters.push(filter);
        }
        filters
    }

    fn rules(&mut self, scope: &str, block: &Block) -> Vec<Rule> {
        let mut rules = Vec::new();
        for (label, source, body) in self.entries(block, scope) {
            let mut rule = Rule {
                label: label.to_string(),
                source: source.clone(),
                ..Rule::default()
            };
            for item in &body.items {
                let Some((label, source, node)) = self.property(item, scope) else {
                    continue;
                };
                match label {
                    "type" => rule.rule_type = self.text(label, source, node).map(ConfigurationValue::into_value),
                    "glob" => rule.glob = self.text(label, source, node).map(ConfigurationValue::into_value),
                    _ => self.unknown(label, scope, source),
                }
            }
            rules.push(rule);
        }
        rules
    }

    fn rule_list(
        &mut self,
        label: &str,
        source: &ConfigurationSource,
        node: &Node,
    ) -> Option<ConfigurationValue<Vec<Rule>>> {
        let block = self.block(label, source, node)?;
        Some(ConfigurationValue::new(self.rules(label, block), source.clone()))
    }

    fn cache(&mut self, block: &Block, cache_source: &ConfigurationSource) -> Cache {
        let mut cache = Cache {
            source: cache_source.clone(),
            ..Cache::default()
        };
        for item in &block.items {
            let Some((label, source, node)) = self.property(item, "cache") else {
                continue;
            };
            match label {
                "docroot" => cache.docroot = self.text(label, source, node),
                "statfile" => cache.statfile = self.text(label, source, node),
                "mode" => cache.mode = self.text(label, source, node),
                "statfileslevel" => cache.statfileslevel = self.integer(label, source, node),
                "gracePeriod" => cache.grace_period = self.integer(label, source, node),
                "serveStaleOnError" => cache.serve_stale_on_error = self.boolean(label, source, node),
                "allowAuthorized" => cache.allow_authorized = self.boolean(label, source, node),
                "enableTTL" => cache.enable_ttl = self.boolean(label, source, node),
                "rules" => cache.rules = self.rule_list(label, source, node),
                "invalidate" => cache.invalidate = self.rule_list(label, source, node),
                "allowedClients" => cache.allowed_clients = self.rule_list(label, source, node),
                "ignoreUrlParams" => cache.ignore_url_params = self.rule_list(label, source, node),
                "headers" => cache.headers = self.strings(label, source, node),
                _ if IGNORED_CACHE_LABELS.contains(&label) => {
                    debug!("{}: /{} is not analyzed", source, label);
                }
                _ => self.unknown(label, "cache", source),
            }
        }
        cache
    }

    // ────────────────────────────────────────────
    // Shape helpers
    // ────────────────────────────────────────────

    /// Returns the parts of a labeled property, reporting anything else.
    fn property<'b>(&mut self, item: &'b Item, scope: &str) -> Option<(&'b str, &'b ConfigurationSource, &'b Node)> {
        match item {
            Item::Property { label, source, value } => Some((label.as_str(), source, value)),
            Item::Value(value) => {
                self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("unexpected value {} in {scope}", value.value()),
                    value.source(),
                );
                None
            }
            Item::Block(block) => {
                self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("unlabeled block in {scope}"),
                    &block.source,
                );
                None
            }
        }
    }

    /// Labeled (or anonymous) blocks of a list such as `/filter` or `/rules`.
    fn entries<'b>(&mut self, block: &'b Block, scope: &str) -> Vec<(&'b str, &'b ConfigurationSource, &'b Block)> {
        let mut entries = Vec::new();
        for item in &block.items {
            match item {
                Item::Property {
                    label,
                    source,
                    value: Node::Block(body),
                } => entries.push((label.as_str(), source, body)),
                Item::Block(body) => entries.push(("", &body.source, body)),
                Item::Property {
                    label,
                    value: Node::Value(value),
                    ..
                } => self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} in {scope} must be a block, found {}", value.value()),
                    value.source(),
                ),
                Item::Value(value) => self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("unexpected value {} in {scope}", value.value()),
                    value.source(),
                ),
            }
        }
        entries
    }

    fn block<'b>(&mut self, label: &str, source: &ConfigurationSource, node: &'b Node) -> Option<&'b Block> {
        match node {
            Node::Block(block) => Some(block),
            Node::Value(value) => {
                self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} expects a block, found {}", value.value()),
                    source,
                );
                None
            }
        }
    }

    fn text(&mut self, label: &str, source: &ConfigurationSource, node: &Node) -> Option<ConfigurationValue<String>> {
        match node {
            Node::Value(value) => Some(ConfigurationValue::new(
                unquote(value.value()).to_string(),
                value.source().clone(),
            )),
            Node::Block(_) => {
                self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} expects a value, found a block"),
                    source,
                );
                None
            }
        }
    }

    fn integer(&mut self, label: &str, source: &ConfigurationSource, node: &Node) -> Option<ConfigurationValue<i64>> {
        let text = self.text(label, source, node)?;
        let parsed = text.value().trim().parse::<i64>();
        Some(match parsed {
            Ok(number) => ConfigurationValue::new(number, text.source().clone()),
            Err(_) => {
                self.violations.add(
                    SyntaxFault::AnyInvalidInteger,
                    format!("/{label} expects an integer, found \"{}\"", text.value()),
                    text.source(),
                );
                ConfigurationValue::new(0, text.source().clone())
            }
        })
    }

    fn boolean(&mut self, label: &str, source: &ConfigurationSource, node: &Node) -> Option<ConfigurationValue<bool>> {
        let text = self.text(label, source, node)?;
        let value = match text.value().trim().to_ascii_lowercase().as_str() {
            "1" | "true" => true,
            "0" | "false" => false,
            other => {
                self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} expects \"0\" or \"1\", found \"{other}\""),
                    text.source(),
                );
                false
            }
        };
        Some(ConfigurationValue::new(value, text.source().clone()))
    }

    fn strings(&mut self, label: &str, source: &ConfigurationSource, node: &Node) -> Option<ConfigurationValue<Vec<String>>> {
        let block = self.block(label, source, node)?;
        let mut values = Vec::new();
        for item in &block.items {
            match item {
                Item::Value(value) => values.push(unquote(value.value()).to_string()),
                Item::Property { label: inner, source, .. } => self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} expects plain values, found /{inner}"),
                    source,
                ),
                Item::Block(inner) => self.violations.add(
                    SyntaxFault::AnyUnexpectedValue,
                    format!("/{label} expects plain values, found a block"),
                    &inner.source,
                ),
            }
        }
        Some(ConfigurationValue::new(values, source.clone()))
    }

    fn unknown(&mut self, label: &str, scope: &str, source: &ConfigurationSource) {
        self.violations.add(
            SyntaxFault::AnyUnknownLabel,
            format!("unknown property /{label} in {scope}"),
            source,
        );
    }

    fn deprecated(&mut self, label: &str, scope: &str, source: &ConfigurationSource) {
        self.violations.add(
            SyntaxFault::AnyDeprecatedProperty,
            format!("/{label} in {scope} is deprecated"),
            source,
        );
    }
}
