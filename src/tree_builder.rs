//! Turns grammar terms into a [`Tree`] without recursing.
//!
//! Every term is transformed into the [`State`] that follows it; the driving
//! loop in [`TreeBuilder::build_tree`] keeps asking for the next state until
//! there is none. Sequences and repetitions hand out their elements one at a
//! time from a single continuation they own, so neither long sequences nor
//! many repetitions grow the native stack.

use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use crate::characters::{self, WellKnown};
use crate::choices::Choices;
use crate::error::{Error, Result};
use crate::grammar::{Grammar, Term};
use crate::node::Tree;
use crate::replacement::ProductionReplacement;

pub(crate) type Replacements<T> = HashMap<String, Rc<dyn ProductionReplacement<T>>>;

/// Builds trees for the productions of a grammar.
pub struct TreeBuilder<T> {
    grammar: Arc<Grammar>,
    choices: Rc<RefCell<dyn Choices>>,
    replacements: Rc<Replacements<T>>,
    context: Rc<dyn Fn() -> T>,
}

impl<T> Clone for TreeBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            grammar: Arc::clone(&self.grammar),
            choices: Rc::clone(&self.choices),
            replacements: Rc::clone(&self.replacements),
            context: Rc::clone(&self.context),
        }
    }
}

/// One step of generation: the term to generate into a tree, and what to do
/// after that.
pub struct State<'g, T> {
    node: Tree,
    term: &'g Term,
    context: Rc<T>,
    next: Next<'g, T>,
}

enum Next<'g, T> {
    End,
    Pending(Box<Steps<'g, T>>),
}

/// The rest of a sequence or repetition, followed by whatever comes after it.
struct Steps<'g, T> {
    node: Tree,
    context: Rc<T>,
    remaining: Remaining<'g>,
    next: Next<'g, T>,
}

enum Remaining<'g> {
    Sequence(std::slice::Iter<'g, Term>),
    Repeat { term: &'g Term, count: u32 },
}

impl<'g> Remaining<'g> {
    fn advance(&mut self) -> Option<&'g Term> {
        match self {
            Remaining::Sequence(terms) => terms.next(),
            Remaining::Repeat { term, count } => {
                if *count == 0 {
                    return None;
                }
                *count -= 1;
                Some(*term)
            }
        }
    }
}

impl<'g, T> Next<'g, T> {
    /// The state that comes next, if any.
    ///
    /// Exhausted continuations are unwound in a loop, so finishing deeply
    /// nested sequences at once does not recurse.
    fn resolve(self) -> Option<State<'g, T>> {
        let mut next = self;
        loop {
            let mut steps = match next {
                Next::End => return None,
                Next::Pending(steps) => steps,
            };
            if let Some(term) = steps.remaining.advance() {
                return Some(State {
                    node: steps.node.clone(),
                    term,
                    context: Rc::clone(&steps.context),
                    next: Next::Pending(steps),
                });
            }
            next = std::mem::replace(&mut steps.next, Next::End);
        }
    }
}

impl<'g, T> Drop for Steps<'g, T> {
    fn drop(&mut self) {
        // unlink the chain iteratively instead of dropping it recursively
        let mut next = std::mem::replace(&mut self.next, Next::End);
        while let Next::Pending(mut steps) = next {
            next = std::mem::replace(&mut steps.next, Next::End);
        }
    }
}

impl<'g, T> State<'g, T> {
    /// Generate `term` into `node`, with nothing to follow.
    pub fn new(node: Tree, term: &'g Term, context: Rc<T>) -> Self {
        Self {
            node,
            term,
            context,
            next: Next::End,
        }
    }

    /// The tree this state generates into.
    pub fn node(&self) -> &Tree {
        &self.node
    }

    pub fn term(&self) -> &'g Term {
        self.term
    }

    pub fn context(&self) -> &T {
        &self.context
    }

    fn schedule(self, remaining: Remaining<'g>) -> Option<State<'g, T>> {
        Next::Pending(Box::new(Steps {
            node: self.node,
            context: self.context,
            remaining,
            next: self.next,
        }))
        .resolve()
    }

    /// Continue with `term` in `node`, followed by what would have followed
    /// this state.
    fn then(self, node: Tree, term: &'g Term) -> State<'g, T> {
        State {
            node,
            term,
            context: self.context,
            next: self.next,
        }
    }
}

impl<'g, T> fmt::Display for State<'g, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State{{{} @ {}}}", self.node, self.term)
    }
}

impl<'g, T> fmt::Debug for State<'g, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<T: PartialEq + Hash + 'static> TreeBuilder<T> {
    pub fn new(
        grammar: Arc<Grammar>,
        choices: Rc<RefCell<dyn Choices>>,
        replacements: Rc<Replacements<T>>,
        context: Rc<dyn Fn() -> T>,
    ) -> Self {
        Self {
            grammar,
            choices,
            replacements,
            context,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub(crate) fn replacements(&self) -> &Replacements<T> {
        &self.replacements
    }

    /// The first state of generating `production` into a new root tree, with
    /// a fresh context.
    pub fn root_state(&self, production: &str) -> Result<State<'_, T>> {
        let definition = self.grammar.definition(production)?;
        Ok(State::new(
            Tree::root(production),
            definition,
            Rc::new((self.context)()),
        ))
    }

    /// Generate the complete tree for `production`.
    pub fn tree(&self, production: &str) -> Result<Tree> {
        self.build_tree(self.root_state(production)?)
    }

    /// Run `root` and all states following it to completion.
    pub fn build_tree<'g>(&'g self, root: State<'g, T>) -> Result<Tree> {
        let tree = root.node.clone();
        let mut state = Some(root);
        while let Some(current) = state {
            state = self.generate(current)?;
        }
        Ok(tree)
    }

    /// Perform a single step of generation.
    pub fn generate<'g>(&'g self, state: State<'g, T>) -> Result<Option<State<'g, T>>> {
        log::trace!("{}", state);
        let term = state.term;
        match term {
            Term::Literal(text) => {
                state.node.literal(text);
                Ok(state.next.resolve())
            }
            Term::Epsilon => Ok(state.next.resolve()),
            Term::Sequence(terms) => Ok(state.schedule(Remaining::Sequence(terms.iter()))),
            Term::Alternatives(alternatives) => {
                let chosen = self
                    .choices
                    .borrow_mut()
                    .choose(&state.node, &alternatives.eligible_for_generation())?;
                let node = state.node.clone();
                Ok(Some(state.then(node, chosen)))
            }
            Term::Optional(optional) => {
                let include = self
                    .choices
                    .borrow_mut()
                    .include_optional(&state.node, optional)?;
                Ok(state.schedule(Remaining::Repeat {
                    term: optional.term(),
                    count: u32::from(include),
                }))
            }
            Term::Repetition(repetition) => {
                let count = self
                    .choices
                    .borrow_mut()
                    .repetition(&state.node, repetition)?;
                Ok(state.schedule(Remaining::Repeat {
                    term: repetition.term(),
                    count,
                }))
            }
            Term::NonTerminal(name) => self.non_terminal(state, name),
            Term::Characters(characters) => {
                let c = match characters::resolve(characters.name())? {
                    WellKnown::Single(c) => c,
                    WellKnown::Any => self
                        .choices
                        .borrow_mut()
                        .any_char(&state.node, characters)?,
                    WellKnown::EndOfInput => return Err(Error::EndOfInput),
                };
                state.node.code_point(c);
                Ok(state.next.resolve())
            }
        }
    }

    fn non_terminal<'g>(&'g self, state: State<'g, T>, name: &'g str) -> Result<Option<State<'g, T>>> {
        if let Some(replacement) = self.replacements.get(name) {
            let builder = self.clone();
            let production = name.to_string();
            let context = Rc::clone(&state.context);
            state.node.production(
                name,
                Rc::clone(replacement),
                Rc::clone(&state.context),
                move |defaults: &Tree| builder.expand(defaults, &production, Rc::clone(&context)),
            );
            return Ok(state.next.resolve());
        }
        let definition = self.grammar.definition(name)?;
        let child = state.node.child(name);
        Ok(Some(state.then(child, definition)))
    }

    /// Generate the definition of `production` into `tree`.
    fn expand(&self, tree: &Tree, production: &str, context: Rc<T>) -> Result<()> {
        let definition = self.grammar.definition(production)?;
        self.build_tree(State::new(tree.clone(), definition, context))?;
        Ok(())
    }
}
