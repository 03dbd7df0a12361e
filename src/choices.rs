//! Decision policies consulted at every nondeterministic point of generation.

use crate::error::{Error, Result};
use crate::grammar::{BiasedTerms, CharacterSet, Optional, Repetition, Term};
use crate::node::Node;
use crate::output::Output;
use crate::randomisation::{Randomisation, SimpleRandomisation};

/// Makes the decisions of a generation run.
///
/// Every method receives the tree that is currently being generated, which
/// policies may use for diagnostics or to make decisions depending on where
/// in the output they are.
pub trait Choices {
    /// Pick one of the alternatives eligible for generation.
    fn choose<'g>(&mut self, location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term>;

    /// How many times to repeat the term of `repetition`.
    fn repetition(&mut self, location: &Node, repetition: &Repetition) -> Result<u32>;

    fn include_optional(&mut self, location: &Node, optional: &Optional) -> Result<bool>;

    /// A character from `characters`, never one of its exclusions.
    fn any_char(&mut self, location: &Node, characters: &CharacterSet) -> Result<char>;
}

impl<C: Choices + ?Sized> Choices for Box<C> {
    fn choose<'g>(&mut self, location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term> {
        (**self).choose(location, alternatives)
    }

    fn repetition(&mut self, location: &Node, repetition: &Repetition) -> Result<u32> {
        (**self).repetition(location, repetition)
    }

    fn include_optional(&mut self, location: &Node, optional: &Optional) -> Result<bool> {
        (**self).include_optional(location, optional)
    }

    fn any_char(&mut self, location: &Node, characters: &CharacterSet) -> Result<char> {
        (**self).any_char(location, characters)
    }
}

/// The default policy: every decision is drawn from a [`Randomisation`].
///
/// The default instance is `Send`, so every thread can own one; a
/// [`Generator`](crate::Generator) itself stays on the thread that built it.
#[derive(Clone, Debug, Default)]
pub struct SimpleChoices<R: Randomisation = SimpleRandomisation> {
    random: R,
}

impl<R: Randomisation> SimpleChoices<R> {
    pub fn new(random: R) -> Self {
        Self { random }
    }
}

impl SimpleChoices {
    pub fn seeded(seed: u64) -> Self {
        Self::new(SimpleRandomisation::seeded(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(SimpleRandomisation::from_entropy())
    }
}

impl<R: Randomisation> Choices for SimpleChoices<R> {
    fn choose<'g>(&mut self, _location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term> {
        self.random.biased(alternatives).ok_or(Error::NoAlternatives)
    }

    fn repetition(&mut self, _location: &Node, repetition: &Repetition) -> Result<u32> {
        Ok(self.random.times(repetition))
    }

    fn include_optional(&mut self, _location: &Node, optional: &Optional) -> Result<bool> {
        Ok(self.random.random() < optional.probability())
    }

    fn any_char(&mut self, _location: &Node, characters: &CharacterSet) -> Result<char> {
        loop {
            let c = self.random.any_char();
            if !characters.is_excluded(c) {
                return Ok(c);
            }
        }
    }
}

/// The names of the trees from the root down to `location`, e.g. `a -> b`.
pub fn location_path(location: &Node) -> String {
    let mut names = vec![location.name().unwrap_or_default().to_string()];
    let mut current = location.parent();
    while let Some(node) = current {
        names.push(node.name().unwrap_or_default().to_string());
        current = node.parent();
    }
    names.reverse();
    names.join(" -> ")
}

/// Describes every decision of the wrapped policy on an [`Output`].
pub struct TracingChoices<C, O> {
    choices: C,
    output: O,
}

impl<C: Choices, O: Output> TracingChoices<C, O> {
    pub fn new(choices: C, output: O) -> Self {
        Self { choices, output }
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_inner(self) -> (C, O) {
        (self.choices, self.output)
    }

    fn trace(&mut self, location: &Node, what: &str) -> Result<()> {
        self.output
            .println(&format!("At {}{}", location_path(location), what))?;
        self.output.flush()
    }
}

impl<C: Choices, O: Output> Choices for TracingChoices<C, O> {
    fn choose<'g>(&mut self, location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term> {
        let term = self.choices.choose(location, alternatives)?;
        self.trace(location, &format!(" choose: {}", term))?;
        Ok(term)
    }

    fn repetition(&mut self, location: &Node, repetition: &Repetition) -> Result<u32> {
        let times = self.choices.repetition(location, repetition)?;
        self.trace(
            location,
            &format!(" repeat {} {} times", repetition.term(), times),
        )?;
        Ok(times)
    }

    fn include_optional(&mut self, location: &Node, optional: &Optional) -> Result<bool> {
        let include = self.choices.include_optional(location, optional)?;
        let verb = if include { "include" } else { "exclude" };
        self.trace(location, &format!(" {} optional {}.", verb, optional.term()))?;
        Ok(include)
    }

    fn any_char(&mut self, location: &Node, characters: &CharacterSet) -> Result<char> {
        let c = self.choices.any_char(location, characters)?;
        self.trace(location, &format!(" emit char {:?}.", c))?;
        Ok(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{any_character_except, biased, literal, one_of, optional_with_probability, repeat};
    use crate::node::Tree;

    /// Replays a fixed sequence of characters.
    struct Scripted(Vec<char>);

    impl Randomisation for Scripted {
        fn random(&mut self) -> f64 {
            0.0
        }

        fn index(&mut self, _bound: usize) -> usize {
            0
        }

        fn repetition(&mut self, min: u32, _max: u32) -> u32 {
            min
        }

        fn any_char(&mut self) -> char {
            self.0.remove(0)
        }
    }

    fn alternatives(term: &Term) -> BiasedTerms<'_> {
        match term {
            Term::Alternatives(alternatives) => alternatives.eligible_for_generation(),
            other => panic!("not alternatives: {:?}", other),
        }
    }

    #[test]
    fn chooses_among_eligible_alternatives() {
        let location = Tree::root("root");
        let term = biased([(literal("a"), 1.0), (literal("b"), 0.0), (literal("c"), 2.0)]);
        let eligible = alternatives(&term);
        let mut choices = SimpleChoices::seeded(1);
        for _ in 0..1_000 {
            let picked = choices.choose(&location, &eligible).unwrap();
            assert_ne!(picked, &literal("b"));
        }
    }

    #[test]
    fn no_eligible_alternative_is_an_error() {
        let location = Tree::root("root");
        let term = one_of(std::iter::empty::<Term>());
        let mut choices = SimpleChoices::seeded(1);
        assert!(matches!(
            choices.choose(&location, &alternatives(&term)),
            Err(Error::NoAlternatives)
        ));
    }

    #[test]
    fn optional_probability_is_honored() {
        let location = Tree::root("root");
        let mut choices = SimpleChoices::seeded(2);
        let Term::Optional(never) = optional_with_probability(literal("x"), 0.0) else {
            unreachable!()
        };
        let Term::Optional(always) = optional_with_probability(literal("x"), 1.0) else {
            unreachable!()
        };
        for _ in 0..1_000 {
            assert!(!choices.include_optional(&location, &never).unwrap());
            assert!(choices.include_optional(&location, &always).unwrap());
        }
    }

    #[test]
    fn excluded_characters_are_redrawn() {
        let location = Tree::root("root");
        let Term::Characters(set) = any_character_except(&['a', 'b']) else {
            unreachable!()
        };
        let mut choices = SimpleChoices::new(Scripted(vec!['a', 'b', 'a', 'z']));
        assert_eq!(choices.any_char(&location, &set).unwrap(), 'z');
    }

    #[test]
    fn default_choices_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SimpleChoices>();
    }

    #[test]
    fn location_path_lists_enclosing_trees() {
        let root = Tree::root("a");
        let inner = root.child("b").child("c");
        assert_eq!(location_path(&inner), "a -> b -> c");
        assert_eq!(location_path(&root), "a");
    }

    #[test]
    fn tracing_describes_decisions() {
        let root = Tree::root("a");
        let location = root.child("b");
        let mut choices = TracingChoices::new(SimpleChoices::new(Scripted(vec!['q'])), String::new());

        let term = one_of([literal("x")]);
        choices.choose(&location, &alternatives(&term)).unwrap();
        let Term::Repetition(rep) = repeat(literal("y"), 2, Some(2)) else {
            unreachable!()
        };
        choices.repetition(&location, &rep).unwrap();
        let Term::Optional(opt) = optional_with_probability(literal("z"), 1.0) else {
            unreachable!()
        };
        choices.include_optional(&location, &opt).unwrap();
        let Term::Characters(set) = any_character_except(&[]) else {
            unreachable!()
        };
        choices.any_char(&location, &set).unwrap();

        assert_eq!(
            choices.output(),
            "At a -> b choose: \"x\"\n\
             At a -> b repeat \"y\" 2 times\n\
             At a -> b include optional \"z\".\n\
             At a -> b emit char 'q'.\n"
        );
    }
}
