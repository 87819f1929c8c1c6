//! Structural rewriting of expression records
//!
//! Drives the per-formula pipeline (classify, disambiguate, inject) over
//! every textual field of a record, prefixes identifiers with the namespace,
//! and rewrites numeric assignments to namespaced variables into `${param}`
//! placeholder markers for the default extractor to harvest.

use crate::differential::Disambiguator;
use crate::error::{Result, TemplateError};
use crate::lexer::{render_tokens, DifferentialContext, Lexer};
use crate::namespace::NamespaceInjector;
use crate::types::{ExpressionRecord, NamespaceToken};
use crate::CompileOptions;
use regex::Regex;
use serde_json::Map;
use std::collections::HashSet;

/// Counters accumulated while rewriting, folded into the compilation stats.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteStats {
    pub formula_count: usize,
    pub derivative_count: usize,
    pub integral_count: usize,
    pub false_positive_count: usize,
    pub parameter_count: usize,
}

pub struct StructuralRewriter<'a> {
    namespace: &'a NamespaceToken,
    recursion_limit: usize,
    assignment_regex: Regex,
    label_regex: Regex,
    stats: RewriteStats,
}

impl<'a> StructuralRewriter<'a> {
    pub fn new(namespace: &'a NamespaceToken, options: &CompileOptions) -> Self {
        let escaped = regex::escape(namespace.as_str());
        // A namespaced left-hand side followed by a bare numeric literal is a
        // parameter assignment earmarked for runtime defaults.
        let assignment_regex =
            Regex::new(&format!(r"^(?P<head>.*{escaped}.*)=(?P<value>-?[0-9.]+)$")).unwrap();
        // Labels interpolate single Latin letters with `${x}` / `${x_{sub}}`.
        let label_regex =
            Regex::new(r"\$\{(?P<letter>[a-zA-Z])(?:_\{(?P<sub>[a-zA-Z0-9]*)\})?\}").unwrap();
        Self {
            namespace,
            recursion_limit: options.recursion_limit,
            assignment_regex,
            label_regex,
            stats: RewriteStats::default(),
        }
    }

    pub fn stats(&self) -> RewriteStats {
        self.stats
    }

    /// Rewrite every record, then check that namespaced identifiers are still
    /// unique. Input records are never mutated.
    pub fn rewrite_records(&mut self, records: &[ExpressionRecord]) -> Result<Vec<ExpressionRecord>> {
        let rewritten = records
            .iter()
            .map(|record| self.rewrite_record(record))
            .collect::<Result<Vec<_>>>()?;
        self.check_identifier_uniqueness(&rewritten)?;
        Ok(rewritten)
    }

    fn rewrite_record(&mut self, record: &ExpressionRecord) -> Result<ExpressionRecord> {
        log::debug!("rewriting record '{}'", record.id);
        let mut out = record.clone();

        out.id = self.prefix_identifier(&record.id);
        out.folder_id = record
            .folder_id
            .as_deref()
            .map(|id| self.prefix_identifier(id));

        if let Some(latex) = record.latex.as_deref() {
            out.latex = Some(self.rewrite_latex(latex, &record.id)?);
        }
        if let Some(label) = record.label.as_deref() {
            out.label = Some(self.rewrite_label(label));
        }
        if let Some(values) = record.values.as_deref() {
            out.values = Some(
                values
                    .iter()
                    .map(|line| self.rewrite_formula(line, &record.id))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        if let Some(columns) = record.columns.as_deref() {
            out.columns = Some(
                columns
                    .iter()
                    .map(|column| self.rewrite_record(column))
                    .collect::<Result<Vec<_>>>()?,
            );
        }
        if let Some(parameters) = record.regression_parameters.as_ref() {
            let mut rewritten = Map::new();
            for (key, value) in parameters {
                let key = self.rewrite_formula(key, &record.id)?;
                rewritten.insert(key, value.clone());
            }
            out.regression_parameters = Some(rewritten);
        }

        Ok(out)
    }

    fn prefix_identifier(&self, id: &str) -> String {
        format!("{} {}", self.namespace, id)
    }

    /// The core per-line transform: classify, disambiguate, inject, render.
    pub fn rewrite_formula(&mut self, formula: &str, record: &str) -> Result<String> {
        if formula.is_empty() {
            return Ok(String::new());
        }
        let tokens = Lexer::new(formula, record).tokenize()?;
        let disambiguator = Disambiguator::new(record, self.recursion_limit);
        let (mut tokens, uses) = disambiguator.disambiguate(tokens)?;

        for usage in &uses {
            match usage.context {
                DifferentialContext::DerivativeNumerator => self.stats.derivative_count += 1,
                DifferentialContext::IntegralTrailing => self.stats.integral_count += 1,
                DifferentialContext::FalsePositive => self.stats.false_positive_count += 1,
                DifferentialContext::DerivativeDenominator => {}
            }
        }

        NamespaceInjector::new(self.namespace).inject(&mut tokens);
        self.stats.formula_count += 1;
        Ok(render_tokens(&tokens))
    }

    /// Formula transform plus assignment parameterization, applied to `latex`
    /// fields only.
    fn rewrite_latex(&mut self, formula: &str, record: &str) -> Result<String> {
        let line = self.rewrite_formula(formula, record)?;
        Ok(self.parameterize_assignment(&line))
    }

    /// Turn `lhs=<number>` into `lhs=${param}` when the left-hand side has
    /// been namespaced. The parameter name is the left-hand side with the
    /// final namespace occurrence removed, so defaults are keyed by the
    /// template's own variable names.
    fn parameterize_assignment(&mut self, line: &str) -> String {
        let Some(captures) = self.assignment_regex.captures(line) else {
            return line.to_string();
        };
        let head = &captures["head"];
        let mut parameter = head.to_string();
        if let Some(at) = parameter.rfind(self.namespace.as_str()) {
            parameter.replace_range(at..at + self.namespace.as_str().len(), "");
        }
        self.stats.parameter_count += 1;
        format!("{head}=${{{parameter}}}")
    }

    /// Labels are plain text apart from `${letter}` interpolations; those
    /// gain a subscript (empty if missing) plus the namespace suffix.
    fn rewrite_label(&self, label: &str) -> String {
        self.label_regex
            .replace_all(label, |captures: &regex::Captures<'_>| {
                let letter = &captures["letter"];
                let sub = captures.name("sub").map_or("", |m| m.as_str());
                format!("${{{letter}_{{{sub}{}}}}}", self.namespace)
            })
            .into_owned()
    }

    fn check_identifier_uniqueness(&self, records: &[ExpressionRecord]) -> Result<()> {
        fn collect<'r>(records: &'r [ExpressionRecord], seen: &mut HashSet<&'r str>) -> Result<()> {
            for record in records {
                if !seen.insert(&record.id) {
                    return Err(TemplateError::duplicate_identifier(&record.id));
                }
                if let Some(columns) = record.columns.as_deref() {
                    collect(columns, seen)?;
                }
            }
            Ok(())
        }
        let mut seen = HashSet::new();
        collect(records, &mut seen)
    }
}
