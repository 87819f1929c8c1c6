//! Namespace injection
//!
//! Token-level rewrites that scope a formula to one template instance:
//! subscript normalization (every free letter gains an empty subscript) and
//! namespace suffixing (every subscript gains the namespace token). Reserved
//! spans, integration bounds and differential "d"s are skipped automatically
//! because they are distinct token kinds.

use crate::lexer::Token;
use crate::types::NamespaceToken;

/// Latin letters the notation uses bare (built-in axes and parameters); they
/// never receive a synthesized empty subscript. Capitals are all replaceable.
pub const RESERVED_LATIN_LETTERS: &[char] = &['e', 'r', 't', 'x', 'y'];

/// Greek spellings the notation uses unsubscripted idiomatically; they never
/// receive a synthesized empty subscript either.
pub const IRREPLACEABLE_GREEK: &[&str] = &["pi", "tau", "theta"];

/// True when a letter must keep its bare, unsubscripted form. A reserved
/// letter that already carries a subscript is still suffixed like any other.
pub fn is_reserved_letter(base: &str) -> bool {
    let name = base.trim_start_matches('\\');
    if name == base {
        let mut chars = base.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => RESERVED_LATIN_LETTERS.contains(&ch),
            _ => false,
        }
    } else {
        IRREPLACEABLE_GREEK.contains(&name)
    }
}

pub struct NamespaceInjector<'a> {
    namespace: &'a NamespaceToken,
}

impl<'a> NamespaceInjector<'a> {
    pub fn new(namespace: &'a NamespaceToken) -> Self {
        Self { namespace }
    }

    /// Apply both rewrites in order. Normalization must run first so
    /// suffixing always has a subscript span to append into.
    pub fn inject(&self, tokens: &mut [Token]) {
        self.normalize_subscripts(tokens);
        self.suffix_subscripts(tokens);
    }

    /// Give every bare free letter an empty subscript.
    fn normalize_subscripts(&self, tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            if let Token::Letter {
                base,
                subscript: subscript @ None,
                ..
            } = token
            {
                if !is_reserved_letter(base) {
                    *subscript = Some(String::new());
                }
            }
        }
    }

    /// Append the namespace token to every subscript's content.
    fn suffix_subscripts(&self, tokens: &mut [Token]) {
        for token in tokens.iter_mut() {
            if let Token::Letter {
                subscript: Some(content),
                ..
            } = token
            {
                content.push_str(self.namespace.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differential::Disambiguator;
    use crate::lexer::{render_tokens, Lexer};

    fn inject(input: &str, namespace: &str) -> String {
        let tokens = Lexer::new(input, "test").tokenize().unwrap();
        let (mut tokens, _) = Disambiguator::new("test", 64).disambiguate(tokens).unwrap();
        let ns = NamespaceToken::new(namespace).unwrap();
        NamespaceInjector::new(&ns).inject(&mut tokens);
        render_tokens(&tokens)
    }

    #[test]
    fn free_letters_gain_namespaced_subscripts() {
        assert_eq!(inject("a+b", "bar1"), "a_{bar1}+b_{bar1}");
    }

    #[test]
    fn existing_subscripts_are_suffixed_not_replaced() {
        assert_eq!(inject("s_{howx}=1", "bar1"), "s_{howxbar1}=1");
    }

    #[test]
    fn reserved_letters_stay_bare_but_subscripted_ones_are_suffixed() {
        assert_eq!(inject("y=mx+c", "q"), "y=m_{q}x+c_{q}");
        assert_eq!(inject("x_{1}", "q"), "x_{1q}");
        // Capitals are ordinary variables.
        assert_eq!(inject("X", "q"), "X_{q}");
    }

    #[test]
    fn irreplaceable_greek_stays_bare() {
        assert_eq!(inject("\\pi\\tau\\theta", "q"), "\\pi\\tau\\theta");
        assert_eq!(inject("\\alpha", "q"), "\\alpha_{q}");
        assert_eq!(inject("\\theta_{0}", "q"), "\\theta_{0q}");
    }

    #[test]
    fn reserved_names_and_bounds_are_untouched() {
        assert_eq!(
            inject("\\operatorname{median}\\left(a\\right)", "q"),
            "\\operatorname{median}\\left(a_{q}\\right)"
        );
        assert_eq!(
            inject("\\int_{a}^{b}u_{1}du", "q"),
            "\\int_{a}^{b}u_{1q}du_{q}"
        );
    }
}
