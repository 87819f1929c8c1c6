//! Desmos expression-template compiler
//!
//! Takes a list of expression records (LaTeX-bearing graph-state values) and
//! rewrites them into a namespaced, parameterized template module, so the
//! same template can be instantiated multiple times inside one document
//! without identifier or variable collisions.
//!
//! # Basic Usage
//!
//! ```rust
//! use desmod::{compile_template, ExpressionRecord, Result};
//!
//! fn main() -> Result<()> {
//!     let records = vec![ExpressionRecord::new("slider", "s_{peed}=1")];
//!     let template = compile_template(&records, "bar1")?;
//!     assert_eq!(template.expressions[0].id, "bar1 slider");
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Token Classifier**: lex each formula into letters, reserved
//!    keyword/operator-name spans, integration bounds, and structural
//!    characters.
//! 2. **Differential Disambiguator**: resolve every literal "d" as derivative
//!    numerator/denominator, integral trailing differential, or a false
//!    positive spelled inside a reserved name.
//! 3. **Namespace Injector**: give every free letter an empty subscript,
//!    then append the namespace token to every subscript.
//! 4. **Structural Rewriter**: apply the passes to every textual field of a
//!    record, prefix identifiers, and turn numeric assignments into
//!    `${param}` placeholder markers.
//! 5. **Default Extractor**: harvest the markers into a default-value
//!    table, seeded with `1` per parameter, in first-occurrence order.

pub mod defaults;
pub mod differential;
pub mod error;
pub mod lexer;
pub mod namespace;
pub mod rewriter;
pub mod types;

use serde::Serialize;

// Re-export commonly used types and functions
pub use defaults::{DefaultExtractor, DEFAULT_SEED_VALUE};
pub use differential::{Disambiguator, DifferentialUse};
pub use error::{Result, TemplateError};
pub use lexer::{DifferentialContext, Lexer, Token};
pub use namespace::NamespaceInjector;
pub use rewriter::StructuralRewriter;
pub use types::{CompiledTemplate, DefaultValueTable, ExpressionRecord, NamespaceToken};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Cap on disambiguation recursion (nested bounds) and on the integral
/// fixpoint loop, as a safety bound against pathological nesting.
pub const DEFAULT_RECURSION_LIMIT: usize = 64;

/// Compilation options and settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Enable extra per-phase logging
    pub debug_mode: bool,

    /// Recursion/fixpoint cap; exceeding it raises
    /// [`TemplateError::RecursionLimitExceeded`]
    pub recursion_limit: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Number of records compiled (top level, excluding table columns)
    pub record_count: usize,

    /// Number of formula lines rewritten
    pub formula_count: usize,

    /// Derivatives recognized
    pub derivative_count: usize,

    /// Integral trailing differentials recognized
    pub integral_count: usize,

    /// "d" occurrences inside reserved names
    pub false_positive_count: usize,

    /// Parameters rewritten into `${param}` placeholders
    pub parameter_count: usize,
}

/// Compile a template with default options.
pub fn compile_template(records: &[ExpressionRecord], namespace: &str) -> Result<CompiledTemplate> {
    let (template, _stats) =
        compile_template_with_options(records, namespace, CompileOptions::default())?;
    Ok(template)
}

/// Compile a template with custom options.
///
/// Pure function: the input records are never mutated, and the same inputs
/// always produce byte-identical output.
pub fn compile_template_with_options(
    records: &[ExpressionRecord],
    namespace: &str,
    options: CompileOptions,
) -> Result<(CompiledTemplate, CompilationStats)> {
    let namespace = NamespaceToken::new(namespace)?;

    if options.debug_mode {
        log::debug!(
            "compiling {} record(s) under namespace '{}'",
            records.len(),
            namespace
        );
    }

    let mut rewriter = StructuralRewriter::new(&namespace, &options);
    let expressions = rewriter.rewrite_records(records)?;
    let rewrite_stats = rewriter.stats();

    let default_values = DefaultExtractor::extract(&expressions);

    let stats = CompilationStats {
        record_count: records.len(),
        formula_count: rewrite_stats.formula_count,
        derivative_count: rewrite_stats.derivative_count,
        integral_count: rewrite_stats.integral_count,
        false_positive_count: rewrite_stats.false_positive_count,
        parameter_count: rewrite_stats.parameter_count,
    };

    if options.debug_mode {
        log::debug!(
            "compiled: {} formula(s), {} derivative(s), {} integral(s), {} parameter(s)",
            stats.formula_count,
            stats.derivative_count,
            stats.integral_count,
            stats.parameter_count
        );
    }

    Ok((
        CompiledTemplate {
            expressions,
            default_values,
        },
        stats,
    ))
}
