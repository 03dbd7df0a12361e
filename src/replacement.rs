//! Overriding the output of individual productions.
//!
//! A replacement is consulted lazily: generation only records a replacement
//! node, and the replacement runs when the tree is written.

use std::any::Any;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::node::{Node, Substitution, Tree};
use crate::output::Output;

/// Produces the output of a production in place of what the grammar would
/// generate.
pub trait ProductionReplacement<T> {
    /// Name of the production this replacement stands in for.
    fn production(&self) -> &str;

    fn replace(&self, ctx: &mut Context<'_, T>) -> Result<()>;
}

/// A [`ProductionReplacement`] backed by a closure.
pub struct FnReplacement<T, F> {
    production: String,
    f: F,
    _context: PhantomData<fn(&T)>,
}

impl<T, F> ProductionReplacement<T> for FnReplacement<T, F>
where
    F: Fn(&mut Context<'_, T>) -> Result<()>,
{
    fn production(&self) -> &str {
        &self.production
    }

    fn replace(&self, ctx: &mut Context<'_, T>) -> Result<()> {
        (self.f)(ctx)
    }
}

/// Replace the production `production` with the output of `f`.
pub fn replace<T, F>(production: &str, f: F) -> FnReplacement<T, F>
where
    F: Fn(&mut Context<'_, T>) -> Result<()>,
{
    FnReplacement {
        production: production.to_string(),
        f,
        _context: PhantomData,
    }
}

/// What a replacement sees when it is invoked.
pub struct Context<'a, T> {
    node: &'a Rc<Node>,
    binding: &'a Binding<T>,
    output: &'a mut dyn Output,
}

impl<'a, T> Context<'a, T> {
    /// The replacement node, which knows where in the tree it sits.
    pub fn node(&self) -> &Rc<Node> {
        self.node
    }

    /// The value the generation run was started with.
    pub fn context(&self) -> &T {
        &self.binding.context
    }

    pub fn production(&self) -> &str {
        self.binding.replacement.production()
    }

    /// Generate and write what the grammar would have produced for this
    /// production.
    pub fn generate_default(&mut self) -> Result<()> {
        let parent = self
            .node
            .parent()
            .map(|parent| Rc::downgrade(&parent))
            .unwrap_or_else(Weak::new);
        let tree = Tree::detached(parent, self.binding.replacement.production());
        (self.binding.defaults)(&tree)?;
        tree.write(self.output)
    }

    pub fn write(&mut self, text: &str) -> Result<()> {
        self.output.append(text)
    }

    pub fn write_char(&mut self, c: char) -> Result<()> {
        self.output.append_char(c)
    }

    pub fn write_code_point(&mut self, code_point: u32) -> Result<()> {
        self.output.append_code_point(code_point)
    }

    /// Direct access to the sink the tree is written to.
    pub fn output(&mut self) -> &mut dyn Output {
        self.output
    }
}

/// A replacement together with the context it was scheduled with.
pub(crate) struct Binding<T> {
    replacement: Rc<dyn ProductionReplacement<T>>,
    context: Rc<T>,
    defaults: Rc<dyn Fn(&Tree) -> Result<()>>,
}

impl<T> Binding<T> {
    pub(crate) fn new(
        replacement: Rc<dyn ProductionReplacement<T>>,
        context: Rc<T>,
        defaults: Rc<dyn Fn(&Tree) -> Result<()>>,
    ) -> Self {
        Self {
            replacement,
            context,
            defaults,
        }
    }

    fn identity(&self) -> *const () {
        Rc::as_ptr(&self.replacement) as *const ()
    }
}

impl<T: PartialEq + Hash + 'static> Substitution for Binding<T> {
    fn substitute(&self, node: &Rc<Node>, output: &mut dyn Output) -> Result<()> {
        let mut ctx = Context {
            node,
            binding: self,
            output,
        };
        self.replacement.replace(&mut ctx)
    }

    fn same_as(&self, other: &dyn Substitution) -> bool {
        other
            .as_any()
            .downcast_ref::<Binding<T>>()
            .map_or(false, |other| {
                self.identity() == other.identity() && *self.context == *other.context
            })
    }

    fn digest(&self, mut state: &mut dyn Hasher) {
        self.identity().hash(&mut state);
        self.context.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
