//! The per-build orchestrator.
//!
//! A builder owns every piece of mutable build state: the header/column
//! mapping, the per-pass property cache, and the extended-replace staging
//! for the row in flight. A new build requires a fresh builder.

use crate::resolve::{PropertyCache, Resolved, RuleProcessor, ValueResolver};
use crate::sink::{HeaderStyle, TabularSink};
use crate::template::SheetTemplate;
use crate::value::CellValue;
use crate::error::ExportError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Extended-replace staging for the row in flight.
///
/// Once a trigger column matches, later columns whose paths were staged are
/// forced to the staged value instead of being resolved. Fully reset at the
/// start of every row.
#[derive(Debug, Default)]
struct RowOverrides {
    active: bool,
    staged: HashMap<String, String>,
}

impl RowOverrides {
    fn reset(&mut self) {
        self.active = false;
        self.staged.clear();
    }

    fn lookup(&self, path: &str) -> Option<&str> {
        if self.active {
            self.staged.get(path).map(String::as_str)
        } else {
            None
        }
    }
}

/// Builds the output table for one record list against one template.
pub struct TableBuilder<'a, S: TabularSink> {
    template: &'a SheetTemplate,
    rules: RuleProcessor<'a>,
    resolver: ValueResolver<'a>,
    sink: &'a mut S,
    headers: Vec<String>,
    header_index: HashMap<String, usize>,
}

impl<'a, S: TabularSink> TableBuilder<'a, S> {
    pub fn new(template: &'a SheetTemplate, sink: &'a mut S) -> Self {
        let rules = RuleProcessor::new(template);
        TableBuilder {
            template,
            rules,
            resolver: ValueResolver::new(rules),
            sink,
            headers: Vec::new(),
            header_index: HashMap::new(),
        }
    }

    /// Run the full build: header row, then one primary row per record plus
    /// overflow rows for multi-valued columns.
    ///
    /// The property cache lives exactly as long as this call; a second call
    /// starts from an empty cache.
    pub fn process(&mut self, records: &[Value]) -> Result<(), ExportError> {
        self.emit_headers()?;
        self.register_summations()?;

        let mut cache = PropertyCache::new();
        let mut overrides = RowOverrides::default();

        for (index, record) in records.iter().enumerate() {
            let ordinal = index as i64 + 1;
            overrides.reset();
            self.sink.new_row()?;

            let mut cursor = 0usize;
            let mut overflow: BTreeMap<usize, Vec<String>> = BTreeMap::new();

            for raw_path in &self.template.properties {
                let path = raw_path.trim();
                if path.is_empty() {
                    continue;
                }
                if path.eq_ignore_ascii_case("count") {
                    self.sink.write_cell(cursor, &CellValue::Integer(ordinal))?;
                    cursor += 1;
                    continue;
                }

                let resolved = match overrides.lookup(path) {
                    Some(forced) => Resolved::Scalar(CellValue::Text(forced.to_string())),
                    None => {
                        let resolved = self.resolver.resolve(&mut cache, path, record)?;
                        self.stage_overrides(path, &resolved, &mut overrides);
                        resolved
                    }
                };

                match resolved {
                    Resolved::Scalar(value) => self.sink.write_cell(cursor, &value)?,
                    Resolved::Multi(values) => {
                        if let Some(first) = values.first() {
                            self.sink.write_cell(cursor, &CellValue::Text(first.clone()))?;
                        }
                        overflow.insert(cursor, values);
                    }
                }
                cursor += 1;
            }

            self.expand_rows(&overflow)?;
        }

        Ok(())
    }

    /// Emit the header row once, de-duplicating names into stable column
    /// indexes, and hand each header its presentation metadata.
    fn emit_headers(&mut self) -> Result<(), ExportError> {
        if !self.headers.is_empty() {
            return Ok(());
        }
        for raw_name in &self.template.header {
            let name = raw_name.trim();
            if self.header_index.contains_key(name) {
                continue;
            }
            let column = self.headers.len();
            self.headers.push(name.to_string());
            self.header_index.insert(name.to_string(), column);

            let style = HeaderStyle {
                text_color: self.template.header_text_color.get(name).cloned(),
                background_color: self.template.header_background_color.get(name).cloned(),
                wrap_text: self.template.wrap_text_headers.iter().any(|h| h == name),
                comment: self.template.header_comments.get(name).cloned(),
            };
            self.sink.add_header(column, name, &style)?;
        }
        Ok(())
    }

    fn register_summations(&mut self) -> Result<(), ExportError> {
        for name in &self.template.summation_headers {
            if let Some(&column) = self.header_index.get(name.trim()) {
                self.sink.add_summation(column)?;
            }
        }
        Ok(())
    }

    /// If `path` carries an extended-replace rule and the resolved value
    /// matches its trigger, stage the rule's overrides for the rest of the
    /// row.
    fn stage_overrides(&self, path: &str, resolved: &Resolved, overrides: &mut RowOverrides) {
        let Some(rule) = self.rules.extended_rule(path) else {
            return;
        };
        let Resolved::Scalar(value) = resolved else {
            return;
        };
        if rule.value == value.to_string() {
            overrides.active = true;
            for (override_path, forced) in rule.overrides() {
                overrides.staged.insert(override_path.clone(), forced.clone());
            }
        }
    }

    /// Emit overflow rows for every column that resolved multi-valued.
    ///
    /// The first element of each multi value already sits in the primary
    /// row; overflow row `i` carries element `i + 1` of every retained
    /// column, skipping blanks, with all other cells left unset.
    fn expand_rows(&mut self, overflow: &BTreeMap<usize, Vec<String>>) -> Result<(), ExportError> {
        let extra = overflow
            .values()
            .map(|values| values.len().saturating_sub(1))
            .max()
            .unwrap_or(0);

        for i in 0..extra {
            self.sink.new_row()?;
            for (&column, values) in overflow {
                if let Some(value) = values.get(i + 1) {
                    if !value.trim().is_empty() {
                        self.sink
                            .write_cell(column, &CellValue::Text(value.clone()))?;
                    }
                }
            }
        }
        Ok(())
    }
}
