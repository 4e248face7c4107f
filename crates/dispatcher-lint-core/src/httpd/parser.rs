//! Section/directive state machine over resolved HTTPD lines.

use super::model::{Directive, HttpdConfiguration, SectionId};
use crate::source::{ConfigurationLine, ConfigurationSource};
use crate::violations::{ConfigurationViolations, SyntaxFault};

struct OpenSection {
    id: SectionId,
    tag: String,
    source: ConfigurationSource,
}

/// Builds the section tree. Never fails; faults become violations.
pub(crate) fn parse(lines: &[ConfigurationLine], violations: &mut ConfigurationViolations) -> HttpdConfiguration {
    let root_source = lines
        .first()
        .map(|l| ConfigurationSource::new(l.file_name().unwrap_or_default(), 0))
        .unwrap_or_default();
    let mut config = HttpdConfiguration::new(root_source);
    let mut stack: Vec<OpenSection> = Vec::new();

    for line in lines {
        let text = line.content();
        let source = line.source();
        let current = stack.last().map_or(SectionId::ROOT, |s| s.id);

        if let Some(rest) = text.strip_prefix("</") {
            close_section(rest, source, &mut stack, violations);
        } else if let Some(rest) = text.strip_prefix('<') {
            let Some(inner) = rest.trim_end().strip_suffix('>') else {
                violations.add(
                    SyntaxFault::HttpdMalformedSection,
                    format!("section opener without '>': {text}"),
                    source,
                );
                continue;
            };
            let words = split_arguments(inner, source, violations);
            let Some((tag, arguments)) = words.split_first() else {
                violations.add(SyntaxFault::HttpdMalformedSection, "empty section tag", source);
                continue;
            };
            let id = config.add_section(current, tag, arguments.to_vec(), source.clone());
            stack.push(OpenSection {
                id,
                tag: tag.clone(),
                source: source.clone(),
            });
        } else {
            let words = split_arguments(text, source, violations);
            if let Some((name, arguments)) = words.split_first() {
                config.add_directive(current, Directive::new(name.clone(), arguments.to_vec(), source.clone()));
            }
        }
    }

    while let Some(open) = stack.pop() {
        violations.add(
            SyntaxFault::HttpdUnclosedSection,
            format!("<{}> is never closed", open.tag),
            &open.source,
        );
    }
    config
}

fn close_section(
    rest: &str,
    source: &ConfigurationSource,
    stack: &mut Vec<OpenSection>,
    violations: &mut ConfigurationViolations,
) {
    let tag = rest.trim_end().trim_end_matches('>').trim();
    let Some(position) = stack.iter().rposition(|s| s.tag.eq_ignore_ascii_case(tag)) else {
        violations.add(
            SyntaxFault::HttpdUnexpectedSectionClose,
            format!("</{tag}> does not close an open section"),
            source,
        );
        return;
    };
    for skipped in stack.drain(position + 1..).rev() {
        violations.add(
            SyntaxFault::HttpdUnclosedSection,
            format!("<{}> is not closed before </{tag}>", skipped.tag),
            &skipped.source,
        );
    }
    stack.pop();
}

/// Splits on whitespace, keeping quoted runs together and removing the quotes.
fn split_arguments(text: &str, source: &ConfigurationSource, violations: &mut ConfigurationViolations) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == '\\' && chars.peek() == Some(&q) => {
                current.push(q);
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if (c == '"' || c == '\'') && !in_word => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        violations.add(
            SyntaxFault::HttpdUnmatchedQuote,
            format!("missing closing quote in {text}"),
            source,
        );
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> (Vec<String>, usize) {
        let mut sink = ConfigurationViolations::new();
        let words = split_arguments(text, &ConfigurationSource::new("h.conf", 1), &mut sink);
        (words, sink.len())
    }

    #[test]
    fn splits_quoted_arguments() {
        assert_eq!(
            split("Header set X-Frame \"SAMEORIGIN deny\""),
            (vec!["Header".into(), "set".into(), "X-Frame".into(), "SAMEORIGIN deny".into()], 0)
        );
        assert_eq!(split("Alias \"\" x"), (vec!["Alias".into(), String::new(), "x".into()], 0));
    }

    #[test]
    fn apostrophe_inside_word_is_literal() {
        assert_eq!(split("ServerAdmin o'brien@x"), (vec!["ServerAdmin".into(), "o'brien@x".into()], 0));
    }

    #[test]
    fn escaped_quotes_stay_inside_argument() {
        assert_eq!(
            split(r#"LogFormat "%h \"%r\"" common"#),
            (vec!["LogFormat".into(), "%h \"%r\"".into(), "common".into()], 0)
        );
    }

    #[test]
    fn unmatched_quote_keeps_rest() {
        assert_eq!(split("Header set \"broken value"), (vec!["Header".into(), "set".into(), "broken value".into()], 1));
    }
}
