//! Generating sentences of a grammar.

use hashbrown::HashMap;
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use crate::choices::{Choices, SimpleChoices};
use crate::error::{Error, Result};
use crate::grammar::Grammar;
use crate::node::Tree;
use crate::output::Output;
use crate::replacement::{self, Context, ProductionReplacement};
use crate::tree_builder::TreeBuilder;

/// Generates random sentences of a grammar, with some productions optionally
/// replaced by custom code.
///
/// `T` is the type of the context value that replacements can access. A new
/// context is created for every generated sentence.
pub struct Generator<T = ()> {
    builder: TreeBuilder<T>,
}

impl Generator<()> {
    /// Start configuring a generator for `grammar`.
    pub fn builder(grammar: impl Into<Arc<Grammar>>) -> GeneratorBuilder<()> {
        Self::builder_with_context(grammar, || ())
    }

    /// A generator making random decisions.
    pub fn new(grammar: impl Into<Arc<Grammar>>) -> Result<Self> {
        Self::builder(grammar).build()
    }
}

impl<T: PartialEq + Hash + 'static> Generator<T> {
    /// Start configuring a generator whose replacements see a context value
    /// created by `context` for every run.
    pub fn builder_with_context<F>(grammar: impl Into<Arc<Grammar>>, context: F) -> GeneratorBuilder<T>
    where
        F: Fn() -> T + 'static,
    {
        GeneratorBuilder {
            grammar: grammar.into(),
            choices: None,
            seed: None,
            replacements: Vec::new(),
            context: Rc::new(context),
        }
    }

    pub fn grammar(&self) -> &Grammar {
        self.builder.grammar()
    }

    /// Name of the root production.
    pub fn language(&self) -> &str {
        self.grammar().language()
    }

    /// The replacement registered for `production`, if any.
    pub fn replacement(&self, production: &str) -> Option<&dyn ProductionReplacement<T>> {
        self.builder
            .replacements()
            .get(production)
            .map(|replacement| &**replacement)
    }

    /// Generate a sentence of the root production.
    pub fn generate(&self, output: &mut dyn Output) -> Result<()> {
        self.generate_from(self.language(), output)
    }

    /// Generate a sentence of the production `start`.
    pub fn generate_from(&self, start: &str, output: &mut dyn Output) -> Result<()> {
        let tree = self.generate_tree(start)?;
        tree.write(output)?;
        output.flush()
    }

    /// Generate the tree for the production `start` without writing it.
    ///
    /// Replacements in the tree run every time it is written.
    pub fn generate_tree(&self, start: &str) -> Result<Tree> {
        log::debug!("generating {} from {}", self.language(), start);
        let tree = self.builder.tree(start)?;
        log::debug!("generated tree with {} top level nodes", tree.child_count());
        Ok(tree)
    }

    /// Generate a sentence of the root production as a string.
    pub fn generate_string(&self) -> Result<String> {
        let mut out = String::new();
        self.generate(&mut out)?;
        Ok(out)
    }
}

/// Facilitate incremental configuration of a [`Generator`].
pub struct GeneratorBuilder<T> {
    grammar: Arc<Grammar>,
    choices: Option<Rc<RefCell<dyn Choices>>>,
    seed: Option<u64>,
    replacements: Vec<Rc<dyn ProductionReplacement<T>>>,
    context: Rc<dyn Fn() -> T>,
}

impl<T: PartialEq + Hash + 'static> GeneratorBuilder<T> {
    /// Make decisions with `choices` instead of at random.
    pub fn choices<C: Choices + 'static>(mut self, choices: C) -> Self {
        self.choices = Some(Rc::new(RefCell::new(choices)));
        self
    }

    /// Make random decisions reproducible. Ignored when custom choices are
    /// configured.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Replace `production` with the output of `f`.
    pub fn replace<F>(self, production: &str, f: F) -> Self
    where
        F: Fn(&mut Context<'_, T>) -> Result<()> + 'static,
    {
        self.replacement(replacement::replace(production, f))
    }

    pub fn replacement<R: ProductionReplacement<T> + 'static>(mut self, replacement: R) -> Self {
        self.replacements.push(Rc::new(replacement));
        self
    }

    /// Check the replacements against the grammar and construct the
    /// [`Generator`].
    pub fn build(self) -> Result<Generator<T>> {
        let mut replacements = HashMap::new();
        for replacement in self.replacements {
            let production = replacement.production().to_string();
            if !self.grammar.has_production(&production) {
                return Err(self.grammar.unknown_production(&production));
            }
            if replacements.contains_key(&production) {
                return Err(Error::DuplicateReplacement(production));
            }
            replacements.insert(production, replacement);
        }

        let choices = match (self.choices, self.seed) {
            (Some(choices), _) => choices,
            (None, Some(seed)) => Rc::new(RefCell::new(SimpleChoices::seeded(seed))) as Rc<RefCell<dyn Choices>>,
            (None, None) => Rc::new(RefCell::new(SimpleChoices::from_entropy())) as Rc<RefCell<dyn Choices>>,
        };

        log::debug!(
            "built generator for {} with {} replacements",
            self.grammar.language(),
            replacements.len()
        );
        Ok(Generator {
            builder: TreeBuilder::new(self.grammar, choices, Rc::new(replacements), self.context),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{literal, non_terminal, one_of, sequence};

    fn grammar() -> Grammar {
        Grammar::builder("foo")
            .with_production("foo", sequence([non_terminal("bar"), literal("!")]))
            .with_production("bar", one_of([literal("a"), literal("b")]))
            .build()
            .unwrap()
    }

    #[test]
    fn seeded_generators_are_reproducible() {
        let grammar = Arc::new(grammar());
        let first = Generator::builder(Arc::clone(&grammar)).seed(42).build().unwrap();
        let second = Generator::builder(grammar).seed(42).build().unwrap();
        for _ in 0..20 {
            assert_eq!(first.generate_string().unwrap(), second.generate_string().unwrap());
        }
    }

    #[test]
    fn generates_from_any_production() {
        let generator = Generator::new(grammar()).unwrap();
        let mut out = String::new();
        generator.generate_from("bar", &mut out).unwrap();
        assert!(out == "a" || out == "b", "{}", out);
        assert!(matches!(
            generator.generate_from("baz", &mut out),
            Err(Error::UnknownProduction { production, .. }) if production == "baz"
        ));
    }

    #[test]
    fn replacements_are_registered_by_production() {
        let generator = Generator::builder(grammar())
            .replace("bar", |bar| bar.write("c"))
            .build()
            .unwrap();
        assert_eq!(generator.language(), "foo");
        assert_eq!(generator.replacement("bar").unwrap().production(), "bar");
        assert!(generator.replacement("foo").is_none());
        assert_eq!(generator.generate_string().unwrap(), "c!");
    }

    #[test]
    fn duplicate_replacements_are_rejected() {
        let result = Generator::builder(grammar())
            .replace("bar", |bar| bar.write("c"))
            .replace("bar", |bar| bar.write("d"))
            .build();
        assert!(matches!(result, Err(Error::DuplicateReplacement(name)) if name == "bar"));
    }

    #[test]
    fn every_run_gets_a_fresh_context() {
        let counter = Rc::new(RefCell::new(0u32));
        let runs = Rc::clone(&counter);
        let generator = Generator::builder_with_context(grammar(), move || {
            *runs.borrow_mut() += 1;
            *runs.borrow()
        })
        .replace("bar", |bar| {
            let run = bar.context().to_string();
            bar.write(&run)
        })
        .build()
        .unwrap();
        assert_eq!(generator.generate_string().unwrap(), "1!");
        assert_eq!(generator.generate_string().unwrap(), "2!");
        assert_eq!(*counter.borrow(), 2);
    }
}
