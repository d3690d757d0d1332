//! Selector-driven page parser
//!
//! Site-specific crawlers differ only in CSS selectors, field label maps and
//! pagination style, so instead of one parser type per shop the selectors are
//! data: each crawler's `options` table compiles into `SelectorRules` and a
//! single `SelectorParser` interprets them. Adding a shop is a config change.
//!
//! Recognized options:
//!
//! | key            | value                                              |
//! |----------------|----------------------------------------------------|
//! | `item`         | CSS selector for one product element (required)    |
//! | `link`         | selector for the item URL anchor (default `a`)     |
//! | `next`         | selector for the next-page link                    |
//! | `page-param`   | query parameter to increment when there is no link |
//! | `require`      | comma-separated field names that must be present   |
//! | `field:<name>` | `css [@attr] [\| text\|int\|float\|cpu]`           |
//!
//! A `cpu` field additionally emits `<name>_cores` and `<name>_ghz` derived
//! from the same cell.

use crate::model::{Page, PaginationCursor, Record, IDENTITY_FIELD};
use crate::parse::text::{parse_float, parse_int, parse_processor_text};
use crate::parse::{PageParser, ParseError, Parsed};
use crate::urlutil::{next_page_by_query, normalize_url, resolve_href};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// How a field's raw text is converted into a record value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Int,
    Float,
    Cpu,
}

/// One extraction rule: where a field comes from and how to parse it
#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    selector: Selector,
    attr: Option<String>,
    kind: ValueKind,
}

/// Compiled selector rules for one site
#[derive(Debug, Clone)]
pub struct SelectorRules {
    item: Selector,
    link: Selector,
    next: Option<Selector>,
    page_param: Option<String>,
    required: Vec<String>,
    fields: Vec<FieldRule>,
}

impl SelectorRules {
    /// Compiles selector rules from a crawler's site-specific options
    ///
    /// Fails early on any malformed selector or rule so configuration
    /// problems surface at load time instead of mid-crawl.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let item_css = options
            .get("item")
            .ok_or_else(|| ConfigError::InvalidSelector("missing 'item' option".to_string()))?;
        let item = compile(item_css)?;

        let link = compile(options.get("link").map(String::as_str).unwrap_or("a"))?;

        let next = options.get("next").map(|css| compile(css)).transpose()?;

        let page_param = options.get("page-param").cloned();

        let required = options
            .get("require")
            .map(|list| {
                list.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut fields = Vec::new();
        for (key, rule) in options {
            if let Some(name) = key.strip_prefix("field:") {
                fields.push(parse_field_rule(name, rule)?);
            }
        }
        // HashMap iteration order is arbitrary; keep extraction deterministic
        fields.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            item,
            link,
            next,
            page_param,
            required,
            fields,
        })
    }
}

fn compile(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css)
        .map_err(|_| ConfigError::InvalidSelector(format!("invalid CSS selector '{}'", css)))
}

/// Parses a `css [@attr] [| kind]` field rule
fn parse_field_rule(name: &str, rule: &str) -> Result<FieldRule, ConfigError> {
    let (selector_part, kind_part) = match rule.rsplit_once('|') {
        Some((left, right)) => (left.trim(), Some(right.trim())),
        None => (rule.trim(), None),
    };

    let kind = match kind_part {
        None | Some("text") => ValueKind::Text,
        Some("int") => ValueKind::Int,
        Some("float") => ValueKind::Float,
        Some("cpu") => ValueKind::Cpu,
        Some(other) => {
            return Err(ConfigError::InvalidSelector(format!(
                "unknown value kind '{}' for field '{}'",
                other, name
            )))
        }
    };

    let (css, attr) = match selector_part.rsplit_once('@') {
        Some((css, attr)) => (css.trim(), Some(attr.trim().to_string())),
        None => (selector_part, None),
    };

    Ok(FieldRule {
        name: name.to_string(),
        selector: compile(css)?,
        attr,
        kind,
    })
}

/// Page parser that interprets compiled selector rules
pub struct SelectorParser {
    rules: SelectorRules,
}

impl SelectorParser {
    pub fn new(rules: SelectorRules) -> Self {
        Self { rules }
    }

    fn extract_record(&self, item: ElementRef<'_>, page: &Page) -> Result<Option<Record>, ParseError> {
        // The item link is the canonical identity; an item without one is
        // navigation chrome, not a product.
        let href = item
            .select(&self.rules.link)
            .find_map(|a| a.value().attr("href"));
        let href = match href {
            Some(h) => h,
            None => return Ok(None),
        };
        let item_url = match resolve_href(&page.url, href) {
            Some(u) => u,
            None => return Ok(None),
        };

        let mut record = Record::new();
        record.insert(IDENTITY_FIELD, normalize_url(&item_url));

        for rule in &self.rules.fields {
            apply_field_rule(&mut record, rule, item);
        }

        for name in &self.rules.required {
            if record.get(name).is_none() {
                return Err(ParseError::MissingField {
                    url: page.url.to_string(),
                    field: name.clone(),
                });
            }
        }

        Ok(Some(record))
    }

    fn next_cursor(
        &self,
        document: &Html,
        page: &Page,
        records_found: bool,
    ) -> Option<PaginationCursor> {
        if let Some(next_selector) = &self.rules.next {
            // Link-style pagination: absence of the link is end of listing
            return document
                .select(next_selector)
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| resolve_href(&page.url, href))
                .map(PaginationCursor::new);
        }

        if let Some(param) = &self.rules.page_param {
            // Query-increment pagination: an empty page is end of listing
            if records_found {
                return Some(PaginationCursor::new(next_page_by_query(&page.url, param)));
            }
        }

        None
    }
}

impl PageParser for SelectorParser {
    fn parse(&self, page: &Page) -> Result<Parsed, ParseError> {
        let document = Html::parse_document(&page.body);

        let mut records = Vec::new();
        for item in document.select(&self.rules.item) {
            if let Some(record) = self.extract_record(item, page)? {
                records.push(record);
            }
        }

        // A listing page that matches no items means the site's markup moved
        // out from under our selectors. With query-increment pagination an
        // empty page is the normal terminator instead.
        if records.is_empty() && self.rules.page_param.is_none() {
            return Err(ParseError::StructureChanged {
                url: page.url.to_string(),
                detail: "no listing items matched the item selector".to_string(),
            });
        }

        let next = self.next_cursor(&document, page, !records.is_empty());

        Ok(Parsed { records, next })
    }
}

/// Extracts one field value into the record, leaving it absent when the
/// selector finds nothing
fn apply_field_rule(record: &mut Record, rule: &FieldRule, item: ElementRef<'_>) {
    let element = match item.select(&rule.selector).next() {
        Some(el) => el,
        None => return,
    };

    let raw = match &rule.attr {
        Some(attr) => match element.value().attr(attr) {
            Some(value) => value.to_string(),
            None => return,
        },
        None => element.text().collect::<String>(),
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return;
    }

    match rule.kind {
        ValueKind::Text => record.insert(&rule.name, raw),
        ValueKind::Int => {
            if let Some(value) = parse_int(raw) {
                record.insert(&rule.name, value);
            }
        }
        ValueKind::Float => {
            if let Some(value) = parse_float(raw) {
                record.insert(&rule.name, value);
            }
        }
        ValueKind::Cpu => {
            let info = parse_processor_text(raw);
            if let Some(model) = info.model {
                record.insert(&rule.name, model);
            }
            if let Some(cores) = info.cores {
                record.insert(format!("{}_cores", rule.name), cores);
            }
            if let Some(ghz) = info.frequency_ghz {
                record.insert(format!("{}_ghz", rule.name), ghz);
            }
        }
    }
}
