//! Text-to-text transforms over a single create-statement.
//!
//! Each transform is independent and can be applied on its own. The
//! [`Pipeline`] composes them; [`Pipeline::for_destination`] builds the
//! fixed order used when replaying statements on another server:
//!
//! 1. [`StripDefiner`]
//! 2. [`StripVersionedComments`]
//! 3. [`RenameSchema`] (only when a rename is requested)
//! 4. [`EnsureLeadingKeyword`] with `CREATE`

use std::borrow::Cow;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ident::quote_ident;

/// A pure rewrite of one statement.
pub trait Transform {
    fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str>;
}

// An account part: `quoted`, 'quoted', "quoted" or a bare word such as CURRENT_USER().
const ACCOUNT_PART: &str = r#"(?:`(?:[^`]|``)*`|'(?:[^']|'')*'|"(?:[^"]|"")*"|[\w$.%-]+(?:\(\))?)"#;

// `DEFINER = <account>` inside the statement header, between `CREATE` and
// the object keyword. Bodies are never searched.
static DEFINER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\A(\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:ALGORITHM\s*=\s*\w+\s+)?)DEFINER\s*=\s*{ACCOUNT_PART}(?:\s*@\s*{ACCOUNT_PART})?\s*"
    ))
    .expect("definer pattern is valid")
});

// An identifier, bare or backtick-quoted.
const IDENT: &str = r"(?:`(?:[^`]|``)*`|[\w$]+)";

// The rest of a three-part name: `<table>.` follows the qualifier.
static NAME_CONTINUES: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\A\s*{IDENT}\s*\.")).expect("name pattern is valid"));

static TABLE_POSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN|INTO|UPDATE|TABLE)\s+\z").expect("table position pattern is valid")
});

static VERSIONED_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\s*/\*!\d*.*?\*/").expect("versioned comment pattern is valid"));

/// Removes the `DEFINER = <account>` clause from the statement header.
///
/// `SQL SECURITY DEFINER` is left alone: it carries no account. Anything
/// after the object keyword, such as a body assigning `NEW.definer`, is
/// untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripDefiner;

impl Transform for StripDefiner {
    fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        DEFINER.replace(sql, |caps: &Captures| caps[1].to_string())
    }
}

/// Removes versioned conditional comments (`/*!50017 ... */`) entirely,
/// together with the whitespace in front of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripVersionedComments;

impl Transform for StripVersionedComments {
    fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        VERSIONED_COMMENT.replace_all(sql, "")
    }
}

/// Rewrites schema qualifiers `from.` / `` `from`. `` into `` `to`. ``.
///
/// The match is case-insensitive and exact: `shop` does not match inside
/// `shop_archive` or `old.shop`. Identical names (ignoring case) make this a
/// no-op. Quoted string literals are never rewritten.
///
/// When the statement declares an alias spelled like the schema,
/// `shop.id` may name a column of that alias, so only qualifiers in a table
/// position (after `FROM`, `JOIN`, `INTO`, `UPDATE`, `TABLE`) or at the head
/// of a three-part name are rewritten.
#[derive(Debug, Clone)]
pub struct RenameSchema {
    patterns: Option<SchemaPatterns>,
    replacement: String,
}

#[derive(Debug, Clone)]
struct SchemaPatterns {
    qualifier: Regex,
    alias: Regex,
}

impl RenameSchema {
    pub fn new(from: &str, to: &str) -> Self {
        if from.is_empty() || from.eq_ignore_ascii_case(to) {
            return Self {
                patterns: None,
                replacement: String::new(),
            };
        }

        let quoted = regex::escape(&quote_ident(from));
        let bare = regex::escape(from);
        let qualifier = Regex::new(&format!(r"(?i)(^|[^\w.`$])(?:{quoted}|{bare})(\s*\.)"));
        let alias = Regex::new(&format!(
            r"(?i)(?:\bAS|\b(?:FROM|JOIN)\s+{IDENT}(?:\s*\.\s*{IDENT})?)\s+(?:{quoted}|{bare}\b)(?:[^\w$.`]|\z)"
        ));
        let patterns = match (qualifier, alias) {
            (Ok(qualifier), Ok(alias)) => Some(SchemaPatterns { qualifier, alias }),
            _ => None,
        };

        Self {
            patterns,
            replacement: quote_ident(to),
        }
    }
}

impl Transform for RenameSchema {
    fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let Some(patterns) = &self.patterns else {
            return Cow::Borrowed(sql);
        };

        let literals = literal_spans(sql);
        let in_literal = |pos: usize| literals.iter().any(|span| span.contains(&pos));
        let aliased = patterns
            .alias
            .find_iter(sql)
            .any(|m| !in_literal(m.start()));

        let mut rewritten = String::with_capacity(sql.len());
        let mut last = 0;
        for caps in patterns.qualifier.captures_iter(sql) {
            let Some(whole) = caps.get(0) else { continue };
            let name_start = whole.start() + caps[1].len();
            if in_literal(name_start) {
                continue;
            }
            if aliased
                && !TABLE_POSITION.is_match(&sql[..name_start])
                && !NAME_CONTINUES.is_match(&sql[whole.end()..])
            {
                continue;
            }
            rewritten.push_str(&sql[last..name_start]);
            rewritten.push_str(&self.replacement);
            rewritten.push_str(&caps[2]);
            last = whole.end();
        }

        if last == 0 {
            return Cow::Borrowed(sql);
        }
        rewritten.push_str(&sql[last..]);
        Cow::Owned(rewritten)
    }
}

/// Byte ranges of `'...'` and `"..."` literals, quotes included.
/// Backtick identifiers are skipped so a quote inside one opens nothing.
fn literal_spans(sql: &str) -> Vec<Range<usize>> {
    let bytes = sql.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'`' => i = quoted_end(bytes, i, b'`', false),
            quote @ (b'\'' | b'"') => {
                let end = quoted_end(bytes, i, quote, true);
                spans.push(i..end);
                i = end;
            }
            _ => i += 1,
        }
    }
    spans
}

fn quoted_end(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if backslash_escapes && bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
            } else {
                return i + 1;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

/// Makes sure the statement starts with `keyword`, re-prefixing it when an
/// earlier transform removed it. Leading whitespace is dropped.
#[derive(Debug, Clone, Copy)]
pub struct EnsureLeadingKeyword(pub &'static str);

impl Transform for EnsureLeadingKeyword {
    fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let trimmed = sql.trim_start();
        let keyword = self.0;

        let starts_with_keyword = trimmed
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
            && trimmed[keyword.len()..]
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'));

        if starts_with_keyword {
            Cow::Borrowed(trimmed)
        } else if trimmed.is_empty() {
            Cow::Owned(keyword.to_string())
        } else {
            Cow::Owned(format!("{keyword} {trimmed}"))
        }
    }
}

/// An ordered list of transforms.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transform + Send + Sync>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform to the end of the pipeline.
    pub fn then<T>(mut self, step: T) -> Self
    where
        T: Transform + Send + Sync + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// The pipeline used before replaying a create-statement on the
    /// destination. `rename` is `(source_schema, destination_schema)`.
    pub fn for_destination(rename: Option<(&str, &str)>) -> Self {
        let mut pipeline = Pipeline::new()
            .then(StripDefiner)
            .then(StripVersionedComments);
        if let Some((from, to)) = rename {
            pipeline = pipeline.then(RenameSchema::new(from, to));
        }
        pipeline.then(EnsureLeadingKeyword("CREATE"))
    }

    pub fn apply(&self, sql: &str) -> String {
        let mut current = sql.to_string();
        for step in &self.steps {
            if let Cow::Owned(next) = step.apply(&current) {
                current = next;
            }
        }
        current
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.len())
            .finish()
    }
}
