//! Tokenizer and untyped block tree for the ANY format.

use crate::source::{ConfigurationLine, ConfigurationSource, ConfigurationValue};
use crate::violations::{ConfigurationViolations, SyntaxFault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// `/name`, stored without the slash.
    Label(String),
    /// A bare word or a quoted string, stored as written.
    Value(String),
    OpenBrace,
    CloseBrace,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub source: ConfigurationSource,
}

/// Splits resolved lines into tokens.
pub(crate) fn tokenize(lines: &[ConfigurationLine], violations: &mut ConfigurationViolations) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in lines {
        tokenize_line(line.content(), line.source(), &mut tokens, violations);
    }
    tokens
}

fn tokenize_line(
    text: &str,
    source: &ConfigurationSource,
    tokens: &mut Vec<Token>,
    violations: &mut ConfigurationViolations,
) {
    let mut push = |kind| {
        tokens.push(Token {
            kind,
            source: source.clone(),
        });
    };
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = rest.trim_start();
            continue;
        }
        match c {
            '#' => break,
            '{' => {
                push(TokenKind::OpenBrace);
                rest = &rest[1..];
            }
            '}' => {
                push(TokenKind::CloseBrace);
                rest = &rest[1..];
            }
            '"' | '\'' => {
                if let Some(end) = rest[1..].find(c) {
                    push(TokenKind::Value(rest[..end + 2].to_string()));
                    rest = &rest[end + 2..];
                } else {
                    violations.add(
                        SyntaxFault::AnyUnmatchedQuote,
                        format!("missing closing quote in {rest}"),
                        source,
                    );
                    push(TokenKind::Value(rest.trim_end().to_string()));
                    break;
                }
            }
            '/' => {
                let end = word_end(&rest[1..]) + 1;
                push(TokenKind::Label(rest[1..end].to_string()));
                rest = &rest[end..];
            }
            _ => {
                let end = word_end(rest);
                push(TokenKind::Value(rest[..end].to_string()));
                rest = &rest[end..];
            }
        }
    }
}

/// Byte length of the word at the start of `text`. `${VAR}` references
/// are kept whole.
fn word_end(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = text[i..].find('}').map_or(bytes.len(), |end| i + end + 1);
            }
            b'{' | b'}' | b'"' | b'\'' | b'#' => break,
            b if b.is_ascii_whitespace() => break,
            _ => i += 1,
        }
    }
    i
}

/// Removes one pair of matching surrounding quotes.
pub(crate) fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed.strip_prefix(quote) {
            return inner.strip_suffix(quote).unwrap_or(inner);
        }
    }
    trimmed
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Value(ConfigurationValue<String>),
    Block(Block),
}

#[derive(Debug, Clone)]
pub(crate) enum Item {
    Property {
        label: String,
        source: ConfigurationSource,
        value: Node,
    },
    Value(ConfigurationValue<String>),
    Block(Block),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Block {
    pub items: Vec<Item>,
    pub source: ConfigurationSource,
}

impl Block {
    fn new(source: ConfigurationSource) -> Self {
        Self {
            items: Vec::new(),
            source,
        }
    }
}

/// Where a block sits in the dispatcher layout. Farm and cache bodies have
/// a closed set of block-valued properties, which lets an unknown block
/// label there be recognised as the next farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Root,
    Farms,
    Farm,
    Cache,
    Other,
}

const FARM_BLOCKS: &[&str] = &[
    "clientheaders",
    "virtualhosts",
    "renders",
    "filter",
    "cache",
    "health_check",
    "sessionmanagement",
    "statistics",
    "stickyConnections",
    "auth_checker",
    "vanity_urls",
];

const CACHE_BLOCKS: &[&str] = &[
    "rules",
    "invalidate",
    "allowedClients",
    "ignoreUrlParams",
    "headers",
    "invalidateHandler",
];

impl Role {
    fn child(self, label: Option<&str>) -> Self {
        match (self, label) {
            (Self::Root, Some("farms")) => Self::Farms,
            (Self::Farms, Some(_)) => Self::Farm,
            (Self::Farm, Some("cache")) => Self::Cache,
            _ => Self::Other,
        }
    }

    fn accepts_block(self, label: &str) -> bool {
        match self {
            Self::Root => label == "farms",
            Self::Farm => FARM_BLOCKS.contains(&label),
            Self::Cache => CACHE_BLOCKS.contains(&label),
            Self::Farms | Self::Other => true,
        }
    }
}

struct Frame {
    label: Option<(String, ConfigurationSource)>,
    role: Role,
    block: Block,
}

impl Frame {
    fn close_into(self, parent: &mut Block) {
        let item = match self.label {
            Some((label, source)) => Item::Property {
                label,
                source,
                value: Node::Block(self.block),
            },
            None => Item::Block(self.block),
        };
        parent.items.push(item);
    }
}

fn label_without_value(
    pending: Option<(String, ConfigurationSource)>,
    violations: &mut ConfigurationViolations,
) {
    if let Some((label, source)) = pending {
        violations.add(
            SyntaxFault::AnyBraceMissing,
            format!("/{label} has no value or block"),
            &source,
        );
    }
}

fn close_unclosed(frame: Frame, parent: &mut Block, violations: &mut ConfigurationViolations) {
    let context = match &frame.label {
        Some((label, _)) => format!("block /{label} is never closed"),
        None => "block is never closed".to_string(),
    };
    violations.add(SyntaxFault::AnyBraceUnclosed, context, &frame.block.source);
    frame.close_into(parent);
}

/// Pops open blocks that cannot hold `/label { .. }` when an enclosing
/// block can, e.g. the next farm after a farm missing its `}`.
fn recover_sibling(stack: &mut Vec<Frame>, label: &str, violations: &mut ConfigurationViolations) {
    let Some(top) = stack.last() else { return };
    if top.role.accepts_block(label) {
        return;
    }
    let Some(target) = stack.iter().rposition(|f| f.role.accepts_block(label)) else {
        return;
    };
    while stack.len() > target + 1 {
        if let Some(frame) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                close_unclosed(frame, &mut parent.block, violations);
            }
        }
    }
}

/// Builds the block tree.
///
/// Never fails: stray closers are reported and dropped. A block still open
/// when a sibling of one of its ancestors starts, or at the end of input,
/// is reported and closed there.
pub(crate) fn build_tree(tokens: Vec<Token>, violations: &mut ConfigurationViolations) -> Block {
    let root_source = tokens
        .first()
        .map(|t| t.source.clone())
        .unwrap_or_default();
    let mut stack = vec![Frame {
        label: None,
        role: Role::Root,
        block: Block::new(root_source),
    }];
    let mut pending: Option<(String, ConfigurationSource)> = None;

    for token in tokens {
        let Token { kind, source } = token;
        match kind {
            TokenKind::Label(label) => {
                label_without_value(pending.take(), violations);
                pending = Some((label, source));
            }
            TokenKind::Value(raw) => {
                let value = ConfigurationValue::new(raw, source);
                let Some(top) = stack.last_mut() else { break };
                match pending.take() {
                    Some((label, label_source)) => top.block.items.push(Item::Property {
                        label,
                        source: label_source,
                        value: Node::Value(value),
                    }),
                    None => top.block.items.push(Item::Value(value)),
                }
            }
            TokenKind::OpenBrace => {
                let label = pending.take();
                if let Some((name, _)) = &label {
                    recover_sibling(&mut stack, name, violations);
                }
                let role = stack
                    .last()
                    .map_or(Role::Other, |top| top.role.child(label.as_ref().map(|(l, _)| l.as_str())));
                stack.push(Frame {
                    label,
                    role,
                    block: Block::new(source),
                });
            }
            TokenKind::CloseBrace => {
                label_without_value(pending.take(), violations);
                if stack.len() > 1 {
                    if let (Some(frame), Some(parent)) = (stack.pop(), stack.last_mut()) {
                        frame.close_into(&mut parent.block);
                    }
                } else {
                    violations.add(SyntaxFault::AnyBraceMissing, "unexpected '}'", &source);
                }
            }
        }
    }

    label_without_value(pending.take(), violations);
    while stack.len() > 1 {
        if let Some(frame) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                close_unclosed(frame, &mut parent.block, violations);
            }
        }
    }

    stack.pop().map(|frame| frame.block).unwrap_or_default()
}
