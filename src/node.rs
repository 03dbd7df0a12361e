//! The tree of generated output.
//!
//! Trees own their children; every node refers back to its parent through a
//! weak reference so that replacements can inspect where they were invoked
//! from without creating ownership cycles.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::output::Output;
use crate::replacement::{Binding, ProductionReplacement};

/// Deferred output of a replacement node, with the type of its context
/// erased.
pub(crate) trait Substitution {
    fn substitute(&self, node: &Rc<Node>, output: &mut dyn Output) -> Result<()>;

    fn same_as(&self, other: &dyn Substitution) -> bool;

    fn digest(&self, state: &mut dyn Hasher);

    fn as_any(&self) -> &dyn Any;
}

enum Kind {
    Tree {
        name: String,
        children: RefCell<Vec<Rc<Node>>>,
    },
    Literal(RefCell<String>),
    Replacement {
        name: String,
        substitution: Box<dyn Substitution>,
    },
}

/// A node in the generated tree: a named tree, a literal, or a replacement
/// whose output is produced when the tree is written.
pub struct Node {
    parent: Weak<Node>,
    kind: Kind,
}

impl Node {
    /// The enclosing tree; `None` for the root.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.upgrade()
    }

    /// The production name of trees and replacements; literals are nameless.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            Kind::Tree { name, .. } | Kind::Replacement { name, .. } => Some(name),
            Kind::Literal(_) => None,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.kind, Kind::Tree { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, Kind::Literal(_))
    }

    pub fn is_replacement(&self) -> bool {
        matches!(self.kind, Kind::Replacement { .. })
    }

    /// The text of a literal node.
    pub fn text(&self) -> Option<String> {
        match &self.kind {
            Kind::Literal(buffer) => Some(buffer.borrow().clone()),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<Rc<Node>> {
        match &self.kind {
            Kind::Tree { children, .. } => children.borrow().clone(),
            _ => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.kind {
            Kind::Tree { children, .. } => children.borrow().len(),
            _ => 0,
        }
    }

    fn child_at(&self, idx: usize) -> Option<Rc<Node>> {
        match &self.kind {
            Kind::Tree { children, .. } => children.borrow().get(idx).cloned(),
            _ => None,
        }
    }

    /// Write the text this node stands for, invoking replacements on the way.
    pub fn write(self: &Rc<Self>, output: &mut dyn Output) -> Result<()> {
        // (node, index of the next child to write)
        let mut stack = vec![(Rc::clone(self), 0)];
        while let Some((node, next)) = stack.pop() {
            let child = match &node.kind {
                Kind::Tree { .. } => node.child_at(next),
                Kind::Literal(buffer) => {
                    output.append(&buffer.borrow())?;
                    None
                }
                Kind::Replacement { substitution, .. } => {
                    substitution.substitute(&node, output)?;
                    None
                }
            };
            if let Some(child) = child {
                stack.push((node, next + 1));
                stack.push((child, 0));
            }
        }
        Ok(())
    }

    /// Write the tree in parenthesized form, for debugging.
    pub fn s_expression(self: &Rc<Self>, output: &mut dyn Output) -> Result<()> {
        let mut stack = vec![(Rc::clone(self), 0, 0)];
        while let Some((node, next, indent)) = stack.pop() {
            let name = match &node.kind {
                Kind::Literal(buffer) => {
                    output.append(&quoted(&buffer.borrow()))?;
                    continue;
                }
                Kind::Tree { name, .. } | Kind::Replacement { name, .. } => name,
            };
            if next == 0 {
                output.append_char('(')?;
                output.append(name)?;
            }
            let Some(child) = node.child_at(next) else {
                output.append_char(')')?;
                continue;
            };
            if node.child_count() == 1 {
                output.append_char(' ')?;
            } else {
                output.append_char('\n')?;
                output.append(&" ".repeat(indent + 2))?;
            }
            stack.push((node, next + 1, indent));
            stack.push((child, 0, indent + 2));
        }
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let Kind::Tree { children, .. } = &mut self.kind else {
            return;
        };
        // Detach grandchildren before their parent goes, so deep trees do not
        // drop recursively.
        let mut pending = std::mem::take(children.get_mut());
        while let Some(child) = pending.pop() {
            if let Ok(mut node) = Rc::try_unwrap(child) {
                if let Kind::Tree { children, .. } = &mut node.kind {
                    pending.append(children.get_mut());
                }
            }
        }
    }
}

fn quoted(text: &str) -> String {
    format!(
        "'{}'",
        text.replace('\r', "\\r")
            .replace('\n', "\\n")
            .replace('\t', "\\t")
    )
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (
                Kind::Tree { name, children },
                Kind::Tree {
                    name: other_name,
                    children: other_children,
                },
            ) => name == other_name && *children.borrow() == *other_children.borrow(),
            (Kind::Literal(text), Kind::Literal(other_text)) => *text.borrow() == *other_text.borrow(),
            (
                Kind::Replacement { name, substitution },
                Kind::Replacement {
                    name: other_name,
                    substitution: other_substitution,
                },
            ) => name == other_name && substitution.same_as(other_substitution.as_ref()),
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.kind {
            Kind::Tree { name, children } => {
                name.hash(state);
                for child in children.borrow().iter() {
                    child.hash(state);
                }
            }
            Kind::Literal(text) => text.borrow().hash(state),
            Kind::Replacement { name, substitution } => {
                name.hash(state);
                substitution.digest(state);
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Literal(buffer) => f.write_str(&quoted(&buffer.borrow())),
            Kind::Tree { name, children } => {
                write!(f, "Tree{{{}", name)?;
                let mut sep = ": ";
                for child in children.borrow().iter() {
                    write!(f, "{}{}", sep, child)?;
                    sep = ", ";
                }
                f.write_str("}")
            }
            Kind::Replacement { name, .. } => write!(f, "Replacement{{{}}}", name),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Handle to a tree node that generation appends to.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tree {
    node: Rc<Node>,
}

impl Tree {
    /// A new tree without a parent.
    pub fn root(name: &str) -> Self {
        Self::detached(Weak::new(), name)
    }

    /// A tree that refers to `parent` without being one of its children.
    pub(crate) fn detached(parent: Weak<Node>, name: &str) -> Self {
        Self {
            node: Rc::new(Node {
                parent,
                kind: Kind::Tree {
                    name: name.to_string(),
                    children: RefCell::new(Vec::new()),
                },
            }),
        }
    }

    pub fn node(&self) -> &Rc<Node> {
        &self.node
    }

    pub fn name(&self) -> &str {
        match &self.node.kind {
            Kind::Tree { name, .. } => name,
            _ => unreachable!("tree handle on a non-tree node"),
        }
    }

    fn entries(&self) -> &RefCell<Vec<Rc<Node>>> {
        match &self.node.kind {
            Kind::Tree { children, .. } => children,
            _ => unreachable!("tree handle on a non-tree node"),
        }
    }

    fn add(&self, kind: Kind) -> Rc<Node> {
        let child = Rc::new(Node {
            parent: Rc::downgrade(&self.node),
            kind,
        });
        self.entries().borrow_mut().push(Rc::clone(&child));
        child
    }

    /// Append a new, empty tree and return it.
    pub fn child(&self, name: &str) -> Tree {
        Tree {
            node: self.add(Kind::Tree {
                name: name.to_string(),
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Append text, extending the last child if it is a literal.
    pub fn literal(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut children = self.entries().borrow_mut();
        if let Some(Kind::Literal(buffer)) = children.last().map(|last| &last.kind) {
            buffer.borrow_mut().push_str(text);
            return;
        }
        children.push(Rc::new(Node {
            parent: Rc::downgrade(&self.node),
            kind: Kind::Literal(RefCell::new(text.to_string())),
        }));
    }

    pub fn code_point(&self, c: char) {
        let mut buf = [0u8; 4];
        self.literal(c.encode_utf8(&mut buf));
    }

    /// Append a replacement node for the production `name`.
    ///
    /// `defaults` fills a tree with what the grammar would have generated for
    /// the production; it only runs if the replacement asks for it.
    pub fn production<T, F>(
        &self,
        name: &str,
        replacement: Rc<dyn ProductionReplacement<T>>,
        context: Rc<T>,
        defaults: F,
    ) where
        T: PartialEq + Hash + 'static,
        F: Fn(&Tree) -> Result<()> + 'static,
    {
        self.add(Kind::Replacement {
            name: name.to_string(),
            substitution: Box::new(Binding::new(replacement, context, Rc::new(defaults))),
        });
    }

    pub fn write(&self, output: &mut dyn Output) -> Result<()> {
        self.node.write(output)
    }

    pub fn s_expression(&self, output: &mut dyn Output) -> Result<()> {
        self.node.s_expression(output)
    }

    /// The written text of the tree.
    pub fn text(&self) -> Result<String> {
        let mut out = String::new();
        self.write(&mut out)?;
        Ok(out)
    }
}

impl std::ops::Deref for Tree {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.node, f)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.node, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::replacement::{replace, Context};
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(tree: &Tree) -> u64 {
        let mut hasher = DefaultHasher::new();
        tree.hash(&mut hasher);
        hasher.finish()
    }

    fn written(tree: &Tree) -> String {
        tree.text().unwrap()
    }

    fn no_default(tree: &Tree) -> Result<()> {
        Err(Error::Replacement {
            production: tree.name().to_string(),
            message: "no default value".to_string(),
        })
    }

    #[test]
    fn writes_literals() {
        let tree = Tree::root("writes_literals");
        tree.literal("a");
        tree.literal("b");
        tree.literal("c");
        assert_eq!(written(&tree), "abc");
    }

    #[test]
    fn adjacent_literals_coalesce() {
        let tree = Tree::root("coalesce");
        tree.literal("Hello");
        tree.code_point(' ');
        tree.literal("World");
        assert_eq!(tree.child_count(), 1);
        assert_eq!(tree.children()[0].text().as_deref(), Some("Hello World"));
    }

    #[test]
    fn writes_tree() {
        let tree = Tree::root("writes_tree");
        let one = tree.child("one");
        one.literal("a");
        one.literal("1");
        tree.literal(",");
        let two = tree.child("two");
        two.literal("b");
        two.literal("2");
        assert_eq!(written(&tree), "a1,b2");
    }

    #[test]
    fn empty_nodes_are_not_written() {
        let tree = Tree::root("empty");
        tree.child("ignored");
        tree.literal("hello");
        assert_eq!(written(&tree), "hello");
    }

    #[test]
    fn writes_replacement() {
        let tree = Tree::root("replacement");
        tree.literal("!");
        tree.production(
            "foo",
            Rc::new(replace("foo", |foo: &mut Context<'_, ()>| foo.write("bar"))),
            Rc::new(()),
            no_default,
        );
        assert_eq!(written(&tree), "!bar");
    }

    #[test]
    fn writes_default_value_for_replacement() {
        let tree = Tree::root("default");
        tree.literal("!");
        tree.production(
            "foo",
            Rc::new(replace("foo", |foo: &mut Context<'_, ()>| foo.generate_default())),
            Rc::new(()),
            |defaults: &Tree| {
                defaults.literal("foo");
                Ok(())
            },
        );
        assert_eq!(written(&tree), "!foo");
    }

    #[test]
    fn replacements_see_the_surrounding_tree() {
        let tree = Tree::root("surrounding");
        let alpha = tree.child("alpha");
        alpha.literal("a");
        alpha.production(
            "beta",
            Rc::new(replace("beta", |beta: &mut Context<'_, ()>| {
                let parent = beta.node().parent().expect("replacement has a parent");
                beta.write(parent.name().unwrap_or_default())
            })),
            Rc::new(()),
            no_default,
        );
        assert_eq!(written(&tree), "aalpha");
    }

    #[test]
    fn replacement_errors_propagate() {
        let tree = Tree::root("failing");
        tree.production(
            "foo",
            Rc::new(replace("foo", |foo: &mut Context<'_, ()>| foo.generate_default())),
            Rc::new(()),
            no_default,
        );
        assert!(matches!(tree.text(), Err(Error::Replacement { production, .. }) if production == "foo"));
    }

    #[test]
    fn structurally_equal_trees() {
        let replacement: Rc<dyn ProductionReplacement<u32>> =
            Rc::new(replace("r", |r: &mut Context<'_, u32>| r.write("r")));
        let build = |text: &str, context: u32| {
            let tree = Tree::root("root");
            tree.child("a").literal(text);
            tree.literal("b");
            tree.production("r", Rc::clone(&replacement), Rc::new(context), no_default);
            tree
        };
        assert_eq!(build("x", 1), build("x", 1));
        assert_eq!(hash_of(&build("x", 1)), hash_of(&build("x", 1)));
        assert_ne!(build("x", 1), build("y", 1));
        assert_ne!(build("x", 1), build("x", 2));

        let other: Rc<dyn ProductionReplacement<u32>> =
            Rc::new(replace("r", |r: &mut Context<'_, u32>| r.write("r")));
        let tree = Tree::root("root");
        tree.child("a").literal("x");
        tree.literal("b");
        tree.production("r", other, Rc::new(1), no_default);
        assert_ne!(build("x", 1), tree);
    }

    #[test]
    fn hashing_does_not_expand_replacements() {
        let tree = Tree::root("lazy");
        tree.production(
            "foo",
            Rc::new(replace("foo", |_: &mut Context<'_, ()>| -> Result<()> {
                panic!("replacement invoked while hashing")
            })),
            Rc::new(()),
            |_: &Tree| -> Result<()> { panic!("default invoked while hashing") },
        );
        hash_of(&tree);
        assert_eq!(tree, tree.clone());
    }

    #[test]
    fn s_expression_form() {
        let tree = Tree::root("root");
        tree.child("one").literal("a\n");
        let two = tree.child("two");
        two.literal("b");
        two.child("three");
        let mut out = String::new();
        tree.s_expression(&mut out).unwrap();
        assert_eq!(out, "(root\n  (one 'a\\n')\n  (two\n    'b'\n    (three)))");
    }

    #[test]
    fn deep_trees_write_and_drop_iteratively() {
        let tree = Tree::root("list");
        let mut current = tree.clone();
        for _ in 0..100_000 {
            current.literal("x");
            current = current.child("list");
        }
        drop(current);
        assert_eq!(written(&tree).len(), 100_000);
    }

    #[test]
    fn display_form() {
        let tree = Tree::root("root");
        tree.literal("x\t");
        tree.child("c").literal("y");
        assert_eq!(tree.to_string(), "Tree{root: 'x\\t', Tree{c: 'y'}}");
    }

    #[test]
    fn children_know_their_parent() {
        let tree = Tree::root("root");
        let child = tree.child("child");
        assert_eq!(child.parent().unwrap().name(), Some("root"));
        assert!(tree.parent().is_none());
    }
}
