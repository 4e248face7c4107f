//! Violation reduction by verbosity.

use crate::types::{Violation, ViolationVerbosity};
use std::collections::HashMap;
use std::num::NonZeroUsize;

#[derive(Hash, PartialEq, Eq)]
enum GroupKey {
    Identical {
        rule: String,
        context: String,
        file: Option<String>,
        line: Option<usize>,
    },
    Rule(String),
}

fn key_of(violation: &Violation, verbosity: ViolationVerbosity) -> Option<GroupKey> {
    let rule = violation.analyzer_rule().id().to_string();
    match verbosity {
        ViolationVerbosity::Full => None,
        ViolationVerbosity::Partial => {
            let source = violation.configuration_source();
            Some(GroupKey::Identical {
                rule,
                context: violation.context().to_string(),
                file: source.and_then(|s| s.file_name()).map(str::to_string),
                line: source.and_then(|s| s.line_number()),
            })
        }
        ViolationVerbosity::Minimized => Some(GroupKey::Rule(rule)),
    }
}

/// Collapses violations according to `verbosity`.
///
/// `Full` returns the input unchanged. `Partial` merges violations with the
/// same rule, context, file and line. `Minimized` keeps one violation per
/// rule. Each group is represented by its first member, stamped with the
/// summed occurrence count, and groups keep first-occurrence order.
#[must_use]
pub fn reduce(violations: Vec<Violation>, verbosity: ViolationVerbosity) -> Vec<Violation> {
    if verbosity == ViolationVerbosity::Full {
        return violations;
    }

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut groups: Vec<(Violation, usize)> = Vec::new();

    for violation in violations {
        let Some(key) = key_of(&violation, verbosity) else {
            continue;
        };
        let occurrences = violation.occurrences();
        if let Some(&slot) = index.get(&key) {
            groups[slot].1 += occurrences;
        } else {
            index.insert(key, groups.len());
            groups.push((violation, occurrences));
        }
    }

    groups
        .into_iter()
        .map(|(first, total)| match NonZeroUsize::new(total) {
            Some(count) => first.counted(count),
            None => first,
        })
        .collect()
}
