//! A decision policy that makes exactly the decisions it was told to make.
//!
//! Useful for writing tests that need a specific output from a grammar: every
//! decision must be anticipated, and a decision that cannot be matched to
//! exactly one anticipated outcome aborts generation.

use hashbrown::HashMap;

use crate::choices::{location_path, Choices};
use crate::error::{Error, Result};
use crate::grammar::{self, BiasedTerms, CharacterSet, Optional, Repetition, Term};
use crate::node::Node;

/// Identifies the repetitions a count applies to, by their bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Invocation {
    min: u32,
    max: Option<u32>,
}

const OPTIONAL: Invocation = Invocation {
    min: 0,
    max: Some(1),
};

/// Applies to repetitions of `min` up to `max` (unlimited when `None`).
pub fn on_repetition(min: u32, max: Option<u32>) -> Invocation {
    Invocation { min, max }
}

#[derive(Clone, Debug, Default)]
pub struct PredictableChoices {
    picks: Vec<Term>,
    code_points: Vec<char>,
    repetitions: HashMap<Invocation, u32>,
}

impl PredictableChoices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose `term` whenever it is among the alternatives.
    pub fn pick(mut self, term: Term) -> Self {
        self.picks.push(term);
        self
    }

    pub fn pick_literal(self, text: &str) -> Self {
        self.pick(grammar::literal(text))
    }

    /// Emit `c` whenever a character set containing it is generated.
    pub fn pick_char(mut self, c: char) -> Self {
        self.code_points.push(c);
        self
    }

    /// Whether optional terms are included.
    pub fn pick_optional(self, include: bool) -> Self {
        self.repeat(u32::from(include), OPTIONAL)
    }

    /// Repeat the matching repetitions `times` times.
    pub fn repeat(mut self, times: u32, invocation: Invocation) -> Self {
        self.repetitions.insert(invocation, times);
        self
    }

    fn repetitions(&self, location: &Node, invocation: Invocation) -> Result<u32> {
        self.repetitions
            .get(&invocation)
            .copied()
            .ok_or_else(|| unpredicted(location, format!("repetition of {:?}", invocation)))
    }
}

fn unpredicted(location: &Node, message: String) -> Error {
    Error::Unpredicted {
        location: location_path(location),
        message,
    }
}

impl Choices for PredictableChoices {
    fn choose<'g>(&mut self, location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term> {
        let mut chosen = None;
        for alternative in alternatives.iter() {
            if self.picks.contains(alternative) {
                if chosen.is_some() {
                    return Err(unpredicted(
                        location,
                        "more than one alternative was picked".to_string(),
                    ));
                }
                chosen = Some(alternative);
            }
        }
        chosen.ok_or_else(|| unpredicted(location, "none of the alternatives was picked".to_string()))
    }

    fn repetition(&mut self, location: &Node, repetition: &Repetition) -> Result<u32> {
        self.repetitions(
            location,
            on_repetition(repetition.min_times(), repetition.max_times()),
        )
    }

    fn include_optional(&mut self, location: &Node, _optional: &Optional) -> Result<bool> {
        Ok(self.repetitions(location, OPTIONAL)? > 0)
    }

    fn any_char(&mut self, location: &Node, characters: &CharacterSet) -> Result<char> {
        let mut candidates = self
            .code_points
            .iter()
            .filter(|c| characters.contains(**c));
        match (candidates.next(), candidates.next()) {
            (Some(c), None) => Ok(*c),
            (None, _) => Err(unpredicted(
                location,
                format!("no character was picked from ${}", characters.name()),
            )),
            (Some(_), Some(_)) => Err(unpredicted(
                location,
                format!("more than one character was picked from ${}", characters.name()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{any_character_except, literal, one_of, repeat};
    use crate::node::Tree;

    fn eligible(term: &Term) -> BiasedTerms<'_> {
        let Term::Alternatives(alternatives) = term else {
            panic!("not alternatives: {:?}", term);
        };
        alternatives.eligible_for_generation()
    }

    #[test]
    fn picks_the_anticipated_alternative() {
        let location = Tree::root("root");
        let term = one_of([literal("Hello"), literal("World")]);
        let mut choices = PredictableChoices::new().pick_literal("World");
        assert_eq!(choices.choose(&location, &eligible(&term)).unwrap(), &literal("World"));
    }

    #[test]
    fn ambiguous_or_missing_picks_fail() {
        let location = Tree::root("root");
        let term = one_of([literal("Hello"), literal("World")]);
        let mut both = PredictableChoices::new()
            .pick_literal("Hello")
            .pick_literal("World");
        assert!(matches!(
            both.choose(&location, &eligible(&term)),
            Err(Error::Unpredicted { .. })
        ));
        let mut neither = PredictableChoices::new().pick_literal("Bye");
        assert!(matches!(
            neither.choose(&location, &eligible(&term)),
            Err(Error::Unpredicted { location, .. }) if location == "root"
        ));
    }

    #[test]
    fn repetitions_are_keyed_by_bounds() {
        let location = Tree::root("root");
        let mut choices = PredictableChoices::new()
            .repeat(3, on_repetition(0, None))
            .repeat(2, on_repetition(1, Some(4)));
        let Term::Repetition(unlimited) = repeat(literal("x"), 0, None) else {
            unreachable!()
        };
        let Term::Repetition(limited) = repeat(literal("x"), 1, Some(4)) else {
            unreachable!()
        };
        let Term::Repetition(other) = repeat(literal("x"), 1, None) else {
            unreachable!()
        };
        assert_eq!(choices.repetition(&location, &unlimited).unwrap(), 3);
        assert_eq!(choices.repetition(&location, &limited).unwrap(), 2);
        assert!(choices.repetition(&location, &other).is_err());
    }

    #[test]
    fn optionals_follow_the_pick() {
        let location = Tree::root("root");
        let Term::Optional(optional) = grammar::optional(literal("x")) else {
            unreachable!()
        };
        let mut included = PredictableChoices::new().pick_optional(true);
        assert!(included.include_optional(&location, &optional).unwrap());
        let mut excluded = PredictableChoices::new().pick_optional(false);
        assert!(!excluded.include_optional(&location, &optional).unwrap());
        let mut unknown = PredictableChoices::new();
        assert!(unknown.include_optional(&location, &optional).is_err());
    }

    #[test]
    fn characters_must_match_exactly_one_pick() {
        let location = Tree::root("root");
        let Term::Characters(set) = any_character_except(&['a']) else {
            unreachable!()
        };
        let mut choices = PredictableChoices::new().pick_char('a').pick_char('b');
        assert_eq!(choices.any_char(&location, &set).unwrap(), 'b');
        let mut ambiguous = PredictableChoices::new().pick_char('b').pick_char('c');
        assert!(ambiguous.any_char(&location, &set).is_err());
    }
}
