//! Differential disambiguation
//!
//! Assigns a context to every literal "d" in a formula: derivative numerator
//! or denominator, the trailing differential of a definite integral, or a
//! false positive spelled inside a reserved name. The passes run in a fixed
//! order over the token stream; once a "d" is reclassified as a
//! [`Token::Differential`] it can no longer match a later pass, which is the
//! token-stream equivalent of the destructive sentinel substitution the
//! notation's reference tooling performs on raw text.

use crate::error::{Result, TemplateError};
use crate::lexer::{DifferentialContext, Lexer, Token};

/// One resolved "d" occurrence, reported as a side channel alongside the
/// rewritten token stream. False positives never split their reserved span;
/// they exist only in this report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferentialUse {
    pub context: DifferentialContext,
    pub offset: usize,
}

pub struct Disambiguator {
    record: String,
    recursion_limit: usize,
}

impl Disambiguator {
    pub fn new(record: impl Into<String>, recursion_limit: usize) -> Self {
        Self {
            record: record.into(),
            recursion_limit,
        }
    }

    /// Run all passes. Returns the token stream with differential "d"s
    /// reclassified plus the occurrence report.
    pub fn disambiguate(&self, tokens: Vec<Token>) -> Result<(Vec<Token>, Vec<DifferentialUse>)> {
        self.disambiguate_at_depth(tokens, 0)
    }

    fn disambiguate_at_depth(
        &self,
        mut tokens: Vec<Token>,
        depth: usize,
    ) -> Result<(Vec<Token>, Vec<DifferentialUse>)> {
        if depth >= self.recursion_limit {
            return Err(TemplateError::recursion_limit(
                &self.record,
                tokens.first().map_or(0, Token::offset),
                self.recursion_limit,
            ));
        }

        let mut uses = Vec::new();
        self.derivative_pass(&mut tokens, &mut uses);
        self.false_positive_pass(&tokens, &mut uses);
        self.integral_pass(&mut tokens, &mut uses)?;
        self.check_bounds(&tokens, depth)?;
        Ok((tokens, uses))
    }

    /// Match `\frac{d}{d<var>}` and reclassify both "d"s. Runs before the
    /// integral pass: a derivative denominator inside an integrand must not
    /// be taken as that integral's trailing differential.
    fn derivative_pass(&self, tokens: &mut [Token], uses: &mut Vec<DifferentialUse>) {
        let mut i = 0;
        while i + 7 < tokens.len() {
            let is_frac = matches!(
                &tokens[i],
                Token::Reserved { text, .. } if text.trim_start_matches('\\') == "frac"
            );
            if is_frac
                && is_other(&tokens[i + 1], "{")
                && tokens[i + 2].is_candidate_d()
                && is_other(&tokens[i + 3], "}")
                && is_other(&tokens[i + 4], "{")
                && tokens[i + 5].is_candidate_d()
                && matches!(tokens[i + 6], Token::Letter { .. })
                && is_other(&tokens[i + 7], "}")
            {
                for (slot, context) in [
                    (i + 2, DifferentialContext::DerivativeNumerator),
                    (i + 5, DifferentialContext::DerivativeDenominator),
                ] {
                    let offset = tokens[slot].offset();
                    tokens[slot] = Token::Differential { context, offset };
                    uses.push(DifferentialUse { context, offset });
                }
                log::debug!(
                    "record '{}': derivative at offset {}",
                    self.record,
                    tokens[i].offset()
                );
                i += 7;
            }
            i += 1;
        }
    }

    /// Record every "d" spelled inside a reserved span. Reserved tokens are
    /// atomic, so one scan finds all occurrences; no fixpoint is needed.
    fn false_positive_pass(&self, tokens: &[Token], uses: &mut Vec<DifferentialUse>) {
        for token in tokens {
            if let Token::Reserved { text, offset } = token {
                for (i, ch) in text.chars().enumerate() {
                    if ch == 'd' {
                        uses.push(DifferentialUse {
                            context: DifferentialContext::FalsePositive,
                            offset: offset + i,
                        });
                    }
                }
            }
        }
    }

    /// Fixpoint loop: from the first integral's bounds, lazily take the first
    /// unclassified `d` followed by a differentiation variable and mark it as
    /// the trailing differential, until every integral on the line has one.
    /// Handles consecutive and nested integrals alike.
    fn integral_pass(&self, tokens: &mut [Token], uses: &mut Vec<DifferentialUse>) -> Result<()> {
        // Bounds token positions and their source offsets, in line order.
        let bounds: Vec<(usize, usize)> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Token::Bounds { .. }))
            .map(|(position, t)| (position, t.offset()))
            .collect();
        if bounds.is_empty() {
            return Ok(());
        }
        let first_bounds = bounds[0].0;

        let mut marked_at = Vec::new();
        let mut iterations = 0;
        while marked_at.len() < bounds.len() {
            iterations += 1;
            if iterations > self.recursion_limit {
                return Err(TemplateError::recursion_limit(
                    &self.record,
                    bounds[0].1,
                    self.recursion_limit,
                ));
            }

            let mut found = None;
            for j in first_bounds + 1..tokens.len().saturating_sub(1) {
                if tokens[j].is_candidate_d() && matches!(tokens[j + 1], Token::Letter { .. }) {
                    found = Some(j);
                    break;
                }
            }
            match found {
                Some(j) => {
                    let offset = tokens[j].offset();
                    tokens[j] = Token::Differential {
                        context: DifferentialContext::IntegralTrailing,
                        offset,
                    };
                    uses.push(DifferentialUse {
                        context: DifferentialContext::IntegralTrailing,
                        offset,
                    });
                    marked_at.push(j);
                }
                None => break,
            }
        }

        if marked_at.len() < bounds.len() {
            return Err(self.unsatisfied_integral(&bounds, &marked_at));
        }
        Ok(())
    }

    /// Name the integral whose differential was not found. Differentials are
    /// paired with bounds right to left, so a differential trailing a later
    /// sibling integral is attributed to that sibling and the diagnostic
    /// points at the integral that is actually missing one.
    fn unsatisfied_integral(
        &self,
        bounds: &[(usize, usize)],
        marked_at: &[usize],
    ) -> TemplateError {
        let mut remaining = marked_at.to_vec();
        for &(position, offset) in bounds.iter().rev() {
            match remaining.last() {
                Some(&differential) if differential > position => {
                    remaining.pop();
                }
                _ => return TemplateError::unterminated_integral(&self.record, offset),
            }
        }
        // Unreachable when called with fewer differentials than bounds; fall
        // back to the first integral.
        TemplateError::unterminated_integral(&self.record, bounds[0].1)
    }

    /// Bound texts are opaque to rewriting but still must hold well-formed
    /// notation; classify them recursively so a nested integral or
    /// derivative inside a bound is validated.
    fn check_bounds(&self, tokens: &[Token], depth: usize) -> Result<()> {
        for token in tokens {
            if let Token::Bounds {
                lower,
                upper,
                offset,
            } = token
            {
                // "_{" before the lower text, "}^{" between the limits.
                let lower_base = offset + 2;
                let upper_base = lower_base + lower.chars().count() + 3;
                for (text, base) in [(lower, lower_base), (upper, upper_base)] {
                    let inner = Lexer::new(text, &self.record)
                        .tokenize()
                        .map_err(|e| rebase(e, base))?;
                    self.disambiguate_at_depth(inner, depth + 1)
                        .map_err(|e| rebase(e, base))?;
                }
            }
        }
        Ok(())
    }
}

fn is_other(token: &Token, expected: &str) -> bool {
    matches!(token, Token::Other { text, .. } if text == expected)
}

/// Shift a nested diagnostic's offset from bound-local to formula-global.
fn rebase(err: TemplateError, base: usize) -> TemplateError {
    match err {
        TemplateError::MalformedNotation {
            record,
            offset,
            message,
        } => TemplateError::MalformedNotation {
            record,
            offset: base + offset,
            message,
        },
        TemplateError::UnterminatedIntegral { record, offset } => {
            TemplateError::UnterminatedIntegral {
                record,
                offset: base + offset,
            }
        }
        TemplateError::RecursionLimitExceeded {
            record,
            offset,
            limit,
        } => TemplateError::RecursionLimitExceeded {
            record,
            offset: base + offset,
            limit,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::render_tokens;

    const LIMIT: usize = 64;

    fn run(input: &str) -> (Vec<Token>, Vec<DifferentialUse>) {
        let tokens = Lexer::new(input, "test").tokenize().unwrap();
        Disambiguator::new("test", LIMIT).disambiguate(tokens).unwrap()
    }

    fn contexts(uses: &[DifferentialUse]) -> Vec<DifferentialContext> {
        uses.iter().map(|u| u.context).collect()
    }

    #[test]
    fn derivative_ds_are_both_classified() {
        let (tokens, uses) = run("\\frac{d}{dx}f");
        assert_eq!(
            contexts(&uses),
            vec![
                DifferentialContext::DerivativeNumerator,
                DifferentialContext::DerivativeDenominator,
            ]
        );
        // Rendering is unchanged; classification lives in the tokens.
        assert_eq!(render_tokens(&tokens), "\\frac{d}{dx}f");
    }

    #[test]
    fn derivative_with_subscripted_variable() {
        let (_, uses) = run("\\frac{d}{da_{1}}g");
        assert_eq!(uses.len(), 2);
    }

    #[test]
    fn reserved_names_yield_false_positives_only() {
        let (tokens, uses) = run("\\operatorname{stddev}\\left(x\\right)");
        let false_positives = uses
            .iter()
            .filter(|u| u.context == DifferentialContext::FalsePositive)
            .count();
        // "stddev" spells two "d"s; neither is a differential.
        assert_eq!(false_positives, 2);
        assert!(!tokens.iter().any(|t| matches!(
            t,
            Token::Differential { context, .. } if *context != DifferentialContext::FalsePositive
        )));
    }

    #[test]
    fn integral_consumes_exactly_one_trailing_differential() {
        let (tokens, uses) = run("\\int_{0}^{1}f\\left(u\\right)du");
        assert_eq!(
            contexts(&uses),
            vec![DifferentialContext::IntegralTrailing]
        );
        assert_eq!(render_tokens(&tokens), "\\int_{0}^{1}f\\left(u\\right)du");
    }

    #[test]
    fn nested_integrals_resolve_both_differentials() {
        let (tokens, uses) = run("\\int_{0}^{1}\\int_{0}^{x}g\\left(u,v\\right)dvdu");
        let trailing: Vec<_> = uses
            .iter()
            .filter(|u| u.context == DifferentialContext::IntegralTrailing)
            .collect();
        assert_eq!(trailing.len(), 2);
        // Every candidate "d" has been consumed.
        assert!(!tokens.iter().any(Token::is_candidate_d));
    }

    #[test]
    fn derivative_inside_integrand_is_not_the_trailing_differential() {
        let (_, uses) = run("\\int_{0}^{1}\\frac{d}{du}h\\left(u\\right)du");
        assert_eq!(
            contexts(&uses),
            vec![
                DifferentialContext::DerivativeNumerator,
                DifferentialContext::DerivativeDenominator,
                DifferentialContext::IntegralTrailing,
            ]
        );
    }

    #[test]
    fn integral_without_differential_is_fatal() {
        let tokens = Lexer::new("\\int_{0}^{1}f\\left(u\\right)", "plot 4")
            .tokenize()
            .unwrap();
        let err = Disambiguator::new("plot 4", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedIntegral { .. }));
        assert!(err.to_string().contains("plot 4"));
    }

    #[test]
    fn second_sibling_integral_without_differential_is_fatal() {
        let tokens = Lexer::new("\\int_{0}^{1}fdu+\\int_{0}^{1}g", "test")
            .tokenize()
            .unwrap();
        let err = Disambiguator::new("test", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        match err {
            // The second integral's bounds start at the `_` after its `\int`.
            TemplateError::UnterminatedIntegral { offset, .. } => assert_eq!(offset, 20),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_sibling_integral_without_differential_is_blamed() {
        // The only differential trails the second integrand and belongs to
        // the second integral; the diagnostic must point at the first.
        let tokens = Lexer::new("\\int_{0}^{1}f+\\int_{0}^{1}gdx", "test")
            .tokenize()
            .unwrap();
        let err = Disambiguator::new("test", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        match err {
            TemplateError::UnterminatedIntegral { offset, .. } => assert_eq!(offset, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn deeply_nested_bounds_hit_the_recursion_limit() {
        let mut formula = String::from("\\int_{0}^{1}gdu");
        for _ in 0..LIMIT + 4 {
            formula = format!("\\int_{{0}}^{{{formula}}}fdu");
        }
        let tokens = Lexer::new(&formula, "test").tokenize().unwrap();
        let err = Disambiguator::new("test", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        assert!(matches!(err, TemplateError::RecursionLimitExceeded { .. }));
        assert!(err.to_string().contains(&LIMIT.to_string()));
    }

    #[test]
    fn integral_fixpoint_iteration_cap_is_enforced() {
        let formula = "\\int_{0}^{1}fdu+".repeat(LIMIT + 4);
        let tokens = Lexer::new(&formula, "test").tokenize().unwrap();
        let err = Disambiguator::new("test", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        assert!(matches!(err, TemplateError::RecursionLimitExceeded { .. }));
    }

    #[test]
    fn integral_nested_in_bounds_is_validated() {
        // Upper bound holds a complete inner integral; the outer line still
        // needs its own differential.
        let (_, uses) = run("\\int_{0}^{\\int_{0}^{1}gdu}fdv");
        assert_eq!(
            contexts(&uses),
            vec![DifferentialContext::IntegralTrailing]
        );

        let tokens = Lexer::new("\\int_{0}^{\\int_{0}^{1}g}fdv", "test")
            .tokenize()
            .unwrap();
        let err = Disambiguator::new("test", LIMIT)
            .disambiguate(tokens)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedIntegral { .. }));
    }

    #[test]
    fn free_d_without_following_variable_is_left_alone() {
        let (tokens, uses) = run("\\int_{0}^{1}d+fdu");
        // The lone "d+..." cannot be a differential; "du" is taken instead.
        assert_eq!(
            contexts(&uses),
            vec![DifferentialContext::IntegralTrailing]
        );
        assert!(tokens.iter().any(Token::is_candidate_d));
    }
}
