//! Random generation of sentences from an abstract grammar.
//!
//! A [`Generator`] walks a [`Grammar`] and asks a [`Choices`] policy at every
//! point where the grammar allows more than one outcome. The result is a
//! [`Tree`] that is written to an [`Output`]; productions can be overridden
//! with [`ProductionReplacement`]s that run when the tree is written.

pub mod characters;
pub mod choices;
mod error;
pub mod generator;
pub mod grammar;
pub mod interactive;
pub mod node;
pub mod output;
pub mod predictable;
pub mod randomisation;
pub mod replacement;
pub mod tree_builder;

pub use choices::{Choices, SimpleChoices, TracingChoices};
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorBuilder};
pub use grammar::{Grammar, GrammarBuilder, Term};
pub use interactive::InteractiveChoices;
pub use node::{Node, Tree};
pub use output::{IoOutput, LogOutput, Output};
pub use predictable::PredictableChoices;
pub use randomisation::{Randomisation, SimpleRandomisation};
pub use replacement::{replace, Context, ProductionReplacement};
