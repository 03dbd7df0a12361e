//! The abstract grammar model the generator walks.
//!
//! A grammar is a set of named productions, each defined by a [`Term`]. The
//! model derives serde so that grammars can be stored as json; parsing any
//! concrete grammar notation into this model is left to other tools.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::characters::{self, WellKnown};
use crate::error::{Error, Result};

/// One node of the abstract grammar.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// Literal text, emitted verbatim.
    Literal(String),

    /// Terms that are generated in order.
    Sequence(Vec<Term>),

    /// A weighted choice among several terms.
    Alternatives(Alternatives),

    /// A reference to a named production.
    NonTerminal(String),

    /// A term that is included with some probability.
    Optional(Optional),

    /// A term that is repeated a number of times.
    Repetition(Repetition),

    /// A single character from a well-known set.
    Characters(CharacterSet),

    /// Produces nothing.
    Epsilon,
}

/// An alternative together with its bias weight.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Biased {
    pub term: Term,
    #[serde(default = "default_bias")]
    pub bias: f64,
}

fn default_bias() -> f64 {
    1.0
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(transparent)]
pub struct Alternatives {
    options: Vec<Biased>,
}

impl Alternatives {
    pub fn options(&self) -> &[Biased] {
        &self.options
    }

    /// The alternatives that may be picked when generating.
    ///
    /// Options without a positive bias and options that stand for the end of
    /// input can never be generated and are left out.
    pub fn eligible_for_generation(&self) -> BiasedTerms<'_> {
        let mut bound = 0.0;
        let terms = self
            .options
            .iter()
            .filter(|option| option.bias > 0.0 && option.term.is_eligible_for_generation())
            .inspect(|option| bound += option.bias)
            .collect();
        BiasedTerms { terms, bound }
    }
}

/// A view of the alternatives eligible for generation.
#[derive(Clone, Debug)]
pub struct BiasedTerms<'g> {
    terms: Vec<&'g Biased>,
    bound: f64,
}

impl<'g> BiasedTerms<'g> {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term(&self, index: usize) -> Option<&'g Term> {
        self.terms.get(index).map(|option| &option.term)
    }

    /// Sum of the bias of all terms.
    pub fn bound(&self) -> f64 {
        self.bound
    }

    /// Select the term covering `weight` when the terms are laid out one
    /// after another, each as wide as its bias.
    pub fn term_at(&self, weight: f64) -> Option<&'g Term> {
        let mut remaining = weight;
        for option in self.terms.iter() {
            remaining -= option.bias;
            if remaining < 0.0 {
                return Some(&option.term);
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &'g Term> + '_ {
        self.terms.iter().map(|option| &option.term)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Optional {
    pub term: Box<Term>,
    #[serde(default = "default_probability")]
    pub probability: f64,
}

fn default_probability() -> f64 {
    0.5
}

impl Optional {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Repetition {
    pub term: Box<Term>,
    #[serde(default)]
    pub min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norm: Option<u32>,
}

impl Repetition {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn min_times(&self) -> u32 {
        self.min
    }

    pub fn max_times(&self) -> Option<u32> {
        self.max
    }

    pub fn limited(&self) -> bool {
        self.max.is_some()
    }

    /// The typical number of repetitions, defaults to the minimum.
    pub fn norm(&self) -> u32 {
        self.norm.unwrap_or(self.min)
    }

    /// Builder style setter for the typical number of repetitions.
    pub fn with_norm(mut self, norm: u32) -> Self {
        self.norm = Some(norm);
        self
    }

    fn verify(&self) -> Result<()> {
        let norm = self.norm();
        let valid = match self.max {
            Some(max) => self.min <= max && self.min <= norm && norm <= max,
            None => self.min <= norm,
        };
        if valid {
            Ok(())
        } else {
            Err(Error::InvalidRepetition {
                min: self.min,
                max: self.max,
                norm,
            })
        }
    }
}

/// A character from a well-known set, minus a list of excluded characters.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CharacterSet {
    pub set: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusions: Vec<char>,
}

impl CharacterSet {
    pub fn name(&self) -> &str {
        &self.set
    }

    pub fn exclusions(&self) -> &[char] {
        &self.exclusions
    }

    pub fn has_exclusions(&self) -> bool {
        !self.exclusions.is_empty()
    }

    pub fn is_excluded(&self, c: char) -> bool {
        self.exclusions.contains(&c)
    }

    /// Whether `c` is a member of this set; unknown sets contain nothing.
    pub fn contains(&self, c: char) -> bool {
        if self.is_excluded(c) {
            return false;
        }
        match characters::resolve(&self.set) {
            Ok(WellKnown::Single(single)) => single == c,
            Ok(WellKnown::Any) => true,
            Ok(WellKnown::EndOfInput) | Err(_) => false,
        }
    }

    pub fn is_end_of_input(&self) -> bool {
        matches!(characters::resolve(&self.set), Ok(WellKnown::EndOfInput))
    }
}

impl Term {
    fn is_eligible_for_generation(&self) -> bool {
        match self {
            Term::Characters(characters) => !characters.is_end_of_input(),
            _ => true,
        }
    }

    /// Visit this term and all terms nested in it, without following
    /// non-terminal references.
    fn walk(&self, visit: &mut dyn FnMut(&Term) -> Result<()>) -> Result<()> {
        let mut pending = vec![self];
        while let Some(term) = pending.pop() {
            visit(term)?;
            match term {
                Term::Sequence(terms) => pending.extend(terms.iter().rev()),
                Term::Alternatives(alternatives) => {
                    pending.extend(alternatives.options.iter().rev().map(|option| &option.term))
                }
                Term::Optional(optional) => pending.push(&optional.term),
                Term::Repetition(repetition) => pending.push(&repetition.term),
                Term::Literal(_) | Term::NonTerminal(_) | Term::Characters(_) | Term::Epsilon => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(text) => {
                if text.contains('"') {
                    write!(f, "'{}'", text)
                } else {
                    write!(f, "\"{}\"", text)
                }
            }
            Term::Sequence(terms) => {
                for (idx, term) in terms.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", term)?;
                }
                Ok(())
            }
            Term::Alternatives(alternatives) => {
                f.write_str("(")?;
                for (idx, option) in alternatives.options.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", option.term)?;
                }
                f.write_str(")")
            }
            Term::NonTerminal(name) => f.write_str(name),
            Term::Optional(optional) => write!(f, "[ {} ]", optional.term),
            Term::Repetition(repetition) => {
                write!(f, "{{ {} }}", repetition.term)?;
                match (repetition.min, repetition.max) {
                    (0, None) => Ok(()),
                    (min, None) => write!(f, "{}..", min),
                    (min, Some(max)) => write!(f, "{}..{}", min, max),
                }
            }
            Term::Characters(characters) => {
                write!(f, "${}", characters.set)?;
                for excluded in characters.exclusions.iter() {
                    write!(f, " - {:?}", excluded)?;
                }
                Ok(())
            }
            Term::Epsilon => f.write_str("()"),
        }
    }
}

/// A complete grammar: the language name, which doubles as the name of the
/// root production, and all production definitions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Grammar {
    language: String,
    productions: BTreeMap<String, Term>,
}

impl Grammar {
    /// Start building a grammar whose root production is `language`.
    pub fn builder(language: &str) -> GrammarBuilder {
        GrammarBuilder::new(language)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn has_production(&self, name: &str) -> bool {
        self.productions.contains_key(name)
    }

    /// The definition of the production with the given name.
    pub fn production(&self, name: &str) -> Option<&Term> {
        self.productions.get(name)
    }

    /// The definition of the production with the given name, or an error
    /// naming the missing production.
    pub fn definition(&self, name: &str) -> Result<&Term> {
        self.productions
            .get(name)
            .ok_or_else(|| self.unknown_production(name))
    }

    pub fn productions(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.productions
            .iter()
            .map(|(name, term)| (name.as_str(), term))
    }

    pub(crate) fn unknown_production(&self, name: &str) -> Error {
        Error::UnknownProduction {
            language: self.language.clone(),
            production: name.to_string(),
        }
    }

    /// Load a grammar from its json representation.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let grammar: Grammar = serde_json::from_slice(bytes)?;
        grammar.verify()?;
        Ok(grammar)
    }

    /// Load a grammar from a json file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let grammar = Self::from_json(&std::fs::read(path.as_ref())?)?;
        log::debug!(
            "loaded grammar for {} with {} productions from {}",
            grammar.language,
            grammar.productions.len(),
            path.as_ref().display()
        );
        Ok(grammar)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that the grammar is complete and that all terms are sane.
    pub fn verify(&self) -> Result<()> {
        if !self.has_production(&self.language) {
            return Err(self.unknown_production(&self.language));
        }
        for (name, definition) in self.productions.iter() {
            definition.walk(&mut |term| {
                match term {
                    Term::NonTerminal(reference) if !self.has_production(reference) => {
                        return Err(self.unknown_production(reference));
                    }
                    Term::Repetition(repetition) => repetition.verify()?,
                    Term::Optional(optional) if !(0.0..=1.0).contains(&optional.probability) => {
                        return Err(Error::InvalidProbability(optional.probability));
                    }
                    Term::Literal(text) if text.starts_with('<') && text.ends_with('>') => {
                        log::warn!(
                            "production {} uses a literal that looks like a rule identifier ({:?}); check whether your grammar is correct!",
                            name,
                            text
                        );
                    }
                    _ => {}
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

/// Facilitate incremental building of a grammar.
#[derive(Clone, Debug)]
pub struct GrammarBuilder {
    language: String,
    productions: Vec<(String, Term)>,
}

impl GrammarBuilder {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            productions: Vec::new(),
        }
    }

    /// Add a production rule.
    ///
    /// ```ignore
    /// A → B C | 'c'
    /// ```
    pub fn add_production(&mut self, name: &str, definition: Term) {
        self.productions.push((name.to_string(), definition));
    }

    /// Builder pattern of [`Self::add_production`].
    pub fn with_production(mut self, name: &str, definition: Term) -> Self {
        self.add_production(name, definition);
        self
    }

    /// Construct and verify the [`Grammar`].
    pub fn build(&self) -> Result<Grammar> {
        let mut productions = BTreeMap::new();
        for (name, definition) in self.productions.iter() {
            if productions
                .insert(name.clone(), definition.clone())
                .is_some()
            {
                return Err(Error::DuplicateProduction(name.clone()));
            }
        }
        let grammar = Grammar {
            language: self.language.clone(),
            productions,
        };
        grammar.verify()?;
        Ok(grammar)
    }
}

pub fn literal(text: &str) -> Term {
    Term::Literal(text.to_string())
}

pub fn epsilon() -> Term {
    Term::Epsilon
}

pub fn sequence(terms: impl IntoIterator<Item = Term>) -> Term {
    Term::Sequence(terms.into_iter().collect())
}

/// Alternatives with equal bias.
pub fn one_of(terms: impl IntoIterator<Item = Term>) -> Term {
    biased(terms.into_iter().map(|term| (term, default_bias())))
}

/// Alternatives with explicit bias weights.
pub fn biased(terms: impl IntoIterator<Item = (Term, f64)>) -> Term {
    Term::Alternatives(Alternatives {
        options: terms
            .into_iter()
            .map(|(term, bias)| Biased { term, bias })
            .collect(),
    })
}

pub fn non_terminal(name: &str) -> Term {
    Term::NonTerminal(name.to_string())
}

pub fn optional(term: Term) -> Term {
    optional_with_probability(term, default_probability())
}

pub fn optional_with_probability(term: Term, probability: f64) -> Term {
    Term::Optional(Optional {
        term: Box::new(term),
        probability,
    })
}

pub fn zero_or_more(term: Term) -> Term {
    repeat(term, 0, None)
}

pub fn one_or_more(term: Term) -> Term {
    repeat(term, 1, None)
}

pub fn repeat(term: Term, min: u32, max: Option<u32>) -> Term {
    Term::Repetition(Repetition {
        term: Box::new(term),
        min,
        max,
        norm: None,
    })
}

/// A repetition with an explicit typical count.
pub fn repeat_around(term: Term, min: u32, max: Option<u32>, norm: u32) -> Term {
    Term::Repetition(Repetition {
        term: Box::new(term),
        min,
        max,
        norm: Some(norm),
    })
}

pub fn characters_of_set(name: &str) -> Term {
    Term::Characters(CharacterSet {
        set: name.to_string(),
        exclusions: Vec::new(),
    })
}

pub fn any_character_except(exclusions: &[char]) -> Term {
    Term::Characters(CharacterSet {
        set: characters::ANY.to_string(),
        exclusions: exclusions.to_vec(),
    })
}
