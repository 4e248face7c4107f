//! Locating check targets inside configuration trees.

use super::EvaluationErrorKind;
use crate::dispatcher::{Farm, Filter, Rule};
use crate::httpd::{HttpdConfiguration, SectionId, SectionKind};
use crate::source::{ConfigurationSource, ConfigurationValue};
use std::collections::BTreeSet;
use tracing::debug;

/// What a check looks at.
#[derive(Debug, Clone)]
pub enum CheckTarget<'a> {
    /// The property is not configured.
    Missing,
    /// A structural element that exists, such as a farm or its cache.
    Present(&'a ConfigurationSource),
    /// A boolean property.
    Boolean(&'a ConfigurationValue<bool>),
    /// An integer property.
    Integer(&'a ConfigurationValue<i64>),
    /// A string property.
    Text(&'a ConfigurationValue<String>),
    /// A list of plain strings.
    TextList(&'a ConfigurationValue<Vec<String>>),
    /// A `/filter` list.
    Filters(&'a ConfigurationValue<Vec<Filter>>),
    /// A cache rule list.
    Rules(&'a ConfigurationValue<Vec<Rule>>),
    /// The whole qualifying farm collection.
    Farms(Vec<&'a Farm>),
    /// An HTTPD section.
    Section(crate::httpd::SectionRef<'a>),
}

impl CheckTarget<'_> {
    /// Short name used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Missing => "missing value",
            Self::Present(_) => "element",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Text(_) => "string",
            Self::TextList(_) => "string list",
            Self::Filters(_) => "filter list",
            Self::Rules(_) => "rule list",
            Self::Farms(_) => "farm collection",
            Self::Section(_) => "section",
        }
    }

    /// Where the target was declared, if it exists.
    #[must_use]
    pub fn source(&self) -> Option<&ConfigurationSource> {
        match self {
            Self::Missing | Self::Farms(_) => None,
            Self::Present(source) => Some(source),
            Self::Boolean(v) => Some(v.source()),
            Self::Integer(v) => Some(v.source()),
            Self::Text(v) => Some(v.source()),
            Self::TextList(v) => Some(v.source()),
            Self::Filters(v) => Some(v.source()),
            Self::Rules(v) => Some(v.source()),
            Self::Section(s) => Some(s.source()),
        }
    }
}

fn or_missing<'a, T>(value: Option<&'a T>, wrap: fn(&'a T) -> CheckTarget<'a>) -> CheckTarget<'a> {
    value.map_or(CheckTarget::Missing, wrap)
}

/// Finds the property addressed by `element` inside one farm.
///
/// # Errors
///
/// Returns [`EvaluationErrorKind::UnknownElement`] for paths that do not
/// name a dispatcher property.
pub fn locate_in_farm<'a>(farm: &'a Farm, element: &str) -> Result<CheckTarget<'a>, EvaluationErrorKind> {
    let cache = farm.cache.as_ref();
    let target = match element {
        "farm" => CheckTarget::Present(farm.source()),
        "farm.label" => CheckTarget::Text(&farm.label),
        "farm.clientheaders" => or_missing(farm.client_headers.as_ref(), CheckTarget::TextList),
        "farm.virtualhosts" => or_missing(farm.virtual_hosts.as_ref(), CheckTarget::TextList),
        "farm.renders" => farm
            .renders
            .as_ref()
            .map_or(CheckTarget::Missing, |r| CheckTarget::Present(r.source())),
        "farm.filter" => or_missing(farm.filter.as_ref(), CheckTarget::Filters),
        "farm.retryDelay" => or_missing(farm.retry_delay.as_ref(), CheckTarget::Integer),
        "farm.numberOfRetries" => or_missing(farm.number_of_retries.as_ref(), CheckTarget::Integer),
        "farm.unavailablePenalty" => or_missing(farm.unavailable_penalty.as_ref(), CheckTarget::Integer),
        "farm.failover" => or_missing(farm.failover.as_ref(), CheckTarget::Boolean),
        "farm.propagateSyndPost" => or_missing(farm.propagate_synd_post.as_ref(), CheckTarget::Boolean),
        "farm.stickyConnectionsFor" => or_missing(farm.sticky_connections_for.as_ref(), CheckTarget::Text),
        "farm.health_check.url" => or_missing(farm.health_check_url.as_ref(), CheckTarget::Text),
        "farm.cache" => cache.map_or(CheckTarget::Missing, |c| CheckTarget::Present(&c.source)),
        "farm.cache.docroot" => or_missing(cache.and_then(|c| c.docroot.as_ref()), CheckTarget::Text),
        "farm.cache.statfile" => or_missing(cache.and_then(|c| c.statfile.as_ref()), CheckTarget::Text),
        "farm.cache.mode" => or_missing(cache.and_then(|c| c.mode.as_ref()), CheckTarget::Text),
        "farm.cache.statfileslevel" => {
            or_missing(cache.and_then(|c| c.statfileslevel.as_ref()), CheckTarget::Integer)
        }
        "farm.cache.gracePeriod" => or_missing(cache.and_then(|c| c.grace_period.as_ref()), CheckTarget::Integer),
        "farm.cache.serveStaleOnError" => {
            or_missing(cache.and_then(|c| c.serve_stale_on_error.as_ref()), CheckTarget::Boolean)
        }
        "farm.cache.allowAuthorized" => {
            or_missing(cache.and_then(|c| c.allow_authorized.as_ref()), CheckTarget::Boolean)
        }
        "farm.cache.enableTTL" => or_missing(cache.and_then(|c| c.enable_ttl.as_ref()), CheckTarget::Boolean),
        "farm.cache.rules" => or_missing(cache.and_then(|c| c.rules.as_ref()), CheckTarget::Rules),
        "farm.cache.invalidate" => or_missing(cache.and_then(|c| c.invalidate.as_ref()), CheckTarget::Rules),
        "farm.cache.allowedClients" => {
            or_missing(cache.and_then(|c| c.allowed_clients.as_ref()), CheckTarget::Rules)
        }
        "farm.cache.ignoreUrlParams" => {
            or_missing(cache.and_then(|c| c.ignore_url_params.as_ref()), CheckTarget::Rules)
        }
        "farm.cache.headers" => or_missing(cache.and_then(|c| c.headers.as_ref()), CheckTarget::TextList),
        _ => return Err(EvaluationErrorKind::UnknownElement),
    };
    Ok(target)
}

// ────────────────────────────────────────────
// HTTPD path expressions
// ────────────────────────────────────────────

struct PathStep {
    token: &'static str,
    apply: fn(&HttpdConfiguration, &[SectionId]) -> Vec<SectionId>,
}

const PATH_STEPS: &[PathStep] = &[
    PathStep {
        token: "vhost",
        apply: |config, current| descendants_of_kind(config, current, SectionKind::VirtualHost),
    },
    PathStep {
        token: "directory",
        apply: |config, current| descendants_of_kind(config, current, SectionKind::Directory),
    },
    PathStep {
        token: "location",
        apply: |config, current| descendants_of_kind(config, current, SectionKind::Location),
    },
    PathStep {
        token: "files",
        apply: |config, current| descendants_of_kind(config, current, SectionKind::Files),
    },
    PathStep {
        token: "ifmodule",
        apply: |config, current| descendants_of_kind(config, current, SectionKind::IfModule),
    },
    PathStep {
        token: "root",
        apply: |config, current| {
            current
                .iter()
                .copied()
                .filter(|&id| config.section(id).arguments() == ["/"])
                .collect()
        },
    },
];

fn descendants_of_kind(config: &HttpdConfiguration, current: &[SectionId], kind: SectionKind) -> Vec<SectionId> {
    let found: BTreeSet<SectionId> = current
        .iter()
        .flat_map(|&id| config.section(id).descendants())
        .filter(|s| s.kind() == kind)
        .map(|s| s.id())
        .collect();
    found.into_iter().collect()
}

/// Evaluates a dotted HTTPD path such as `httpd.vhost.directory.root`.
///
/// Paths with fewer than two tokens, or an unknown second token, select
/// nothing. The sections come back in document order.
///
/// # Errors
///
/// Fails when the first token is not `httpd` or a later token is unknown.
pub fn select_sections(config: &HttpdConfiguration, element: &str) -> Result<Vec<SectionId>, EvaluationErrorKind> {
    let tokens: Vec<&str> = element.split('.').collect();
    if tokens[0] != "httpd" {
        return Err(EvaluationErrorKind::WrongRoot { expected: "httpd" });
    }
    if tokens.len() < 2 {
        return Ok(Vec::new());
    }

    let mut current = vec![SectionId::ROOT];
    for (position, token) in tokens.iter().enumerate().skip(1) {
        let Some(step) = PATH_STEPS.iter().find(|s| s.token.eq_ignore_ascii_case(token)) else {
            if position == 1 {
                debug!("Path {} starts with unknown token '{}', no targets", element, token);
                return Ok(Vec::new());
            }
            return Err(EvaluationErrorKind::UnknownPathToken {
                token: (*token).to_string(),
            });
        };
        current = (step.apply)(config, &current);
    }
    Ok(current)
}
