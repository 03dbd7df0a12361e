//! A decision policy that asks a human.

use std::io::BufRead;

use crate::choices::{location_path, Choices};
use crate::error::{Error, Result};
use crate::grammar::{BiasedTerms, CharacterSet, Optional, Repetition, Term};
use crate::node::Node;
use crate::output::Output;

/// Prompts for every decision on `output` and reads the answer as one line of
/// `input`.
///
/// When a default policy is configured its decision is offered as the answer
/// to an empty line. Invalid answers are reported and the question repeats.
pub struct InteractiveChoices<I, O> {
    input: I,
    output: O,
    defaults: Option<Box<dyn Choices>>,
}

impl<I: BufRead, O: Output> InteractiveChoices<I, O> {
    pub fn new(input: I, output: O) -> Self {
        Self {
            input,
            output,
            defaults: None,
        }
    }

    /// Offer the decisions of `defaults` as the answer to an empty line.
    pub fn with_defaults(mut self, defaults: Box<dyn Choices>) -> Self {
        self.defaults = Some(defaults);
        self
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    fn eval<T>(
        &mut self,
        location: &Node,
        mut default: Option<T>,
        body: impl Fn(&mut dyn Output, Option<&T>) -> Result<()>,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Result<T> {
        loop {
            self.output.append("At ")?;
            self.output.append(&location_path(location))?;
            body(&mut self.output, default.as_ref())?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(Error::InputClosed);
            }
            let line = line.trim();
            if line.is_empty() {
                match default.take() {
                    Some(choice) => return Ok(choice),
                    None => self
                        .output
                        .append("Invalid input, no default choices available.")?,
                }
            } else {
                match parse(line) {
                    Ok(choice) => return Ok(choice),
                    Err(message) => {
                        log::debug!("rejected input {:?}: {}", line, message);
                        self.output.append("Invalid input: ")?;
                        self.output.append(&message)?;
                    }
                }
            }
            self.output.println("")?;
        }
    }
}

fn parse_unsigned(input: &str) -> Result<u32, String> {
    input.parse::<u32>().map_err(|err| err.to_string())
}

fn parse_yes_no(input: &str) -> Result<bool, String> {
    match input.to_lowercase().as_str() {
        "y" | "yes" => Ok(true),
        "n" | "no" => Ok(false),
        _ => Err("expected yes or no".to_string()),
    }
}

fn parse_char(input: &str, characters: &CharacterSet) -> Result<char, String> {
    let mut chars = input.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            let code_point = match input.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16).map_err(|err| err.to_string())?,
                None => parse_unsigned(input)?,
            };
            char::from_u32(code_point)
                .ok_or_else(|| format!("{:#x} is not a valid code point", code_point))?
        }
    };
    if characters.contains(c) {
        Ok(c)
    } else {
        Err(format!("{:?} is not in ${}", c, characters.name()))
    }
}

impl<I: BufRead, O: Output> Choices for InteractiveChoices<I, O> {
    fn choose<'g>(&mut self, location: &Node, alternatives: &BiasedTerms<'g>) -> Result<&'g Term> {
        let default = match self.defaults.as_mut() {
            Some(defaults) => Some(defaults.choose(location, alternatives)?),
            None => None,
        };
        self.eval(
            location,
            default,
            |output, default| {
                output.println(", choose one of:")?;
                for (idx, term) in alternatives.iter().enumerate() {
                    output.append(&format!("{}. {}", idx, term))?;
                    if default.map_or(false, |default| std::ptr::eq(*default, term)) {
                        output.append(" [default]")?;
                    }
                    output.println("")?;
                }
                output.append(&format!(
                    "Choose an alternative [0-{}]: ",
                    alternatives.len().saturating_sub(1)
                ))
            },
            |input| {
                let idx = parse_unsigned(input)? as usize;
                alternatives
                    .term(idx)
                    .ok_or_else(|| format!("no alternative {}", idx))
            },
        )
    }

    fn repetition(&mut self, location: &Node, repetition: &Repetition) -> Result<u32> {
        let default = match self.defaults.as_mut() {
            Some(defaults) => Some(defaults.repetition(location, repetition)?),
            None => None,
        };
        let min = repetition.min_times();
        let max = repetition.max_times();
        self.eval(
            location,
            default,
            |output, default| {
                output.append(&format!(
                    ", how many times should {} be repeated? ",
                    repetition.term()
                ))?;
                match max {
                    Some(max) => output.append(&format!("[{}..{}]", min, max))?,
                    None => output.append(&format!("[min {}]", min))?,
                }
                if let Some(default) = default {
                    output.append(&format!(" [default={}]", default))?;
                }
                output.append(": ")
            },
            |input| {
                let times = parse_unsigned(input)?;
                if times < min || max.map_or(false, |max| times > max) {
                    Err(format!("{} is out of range", times))
                } else {
                    Ok(times)
                }
            },
        )
    }

    fn include_optional(&mut self, location: &Node, optional: &Optional) -> Result<bool> {
        let default = match self.defaults.as_mut() {
            Some(defaults) => Some(defaults.include_optional(location, optional)?),
            None => None,
        };
        self.eval(
            location,
            default,
            |output, default| {
                output.append(&format!(
                    ", should optional {} be included? ",
                    optional.term()
                ))?;
                output.append(match default {
                    None => "[yn]: ",
                    Some(true) => "[Yn]: ",
                    Some(false) => "[yN]: ",
                })
            },
            parse_yes_no,
        )
    }

    fn any_char(&mut self, location: &Node, characters: &CharacterSet) -> Result<char> {
        let default = match self.defaults.as_mut() {
            Some(defaults) => Some(defaults.any_char(location, characters)?),
            None => None,
        };
        self.eval(
            location,
            default,
            |output, default| {
                output.append(", emit character")?;
                if let Some(default) = default {
                    output.append(&format!(" [default: {:#x}]", u32::from(*default)))?;
                }
                output.append(": ")
            },
            |input| parse_char(input, characters),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{any_character_except, characters_of_set, literal, one_of, optional, repeat};
    use crate::node::Tree;
    use crate::predictable::PredictableChoices;

    fn interactive(input: &str) -> InteractiveChoices<&[u8], String> {
        InteractiveChoices::new(input.as_bytes(), String::new())
    }

    fn greeting() -> Term {
        one_of([literal("Hello"), literal("World")])
    }

    fn eligible(term: &Term) -> BiasedTerms<'_> {
        let Term::Alternatives(alternatives) = term else {
            panic!("not alternatives: {:?}", term);
        };
        alternatives.eligible_for_generation()
    }

    #[test]
    fn chooses_alternative_by_index() {
        let location = Tree::root("foo");
        let term = greeting();
        let mut choices = interactive("1\n");
        assert_eq!(choices.choose(&location, &eligible(&term)).unwrap(), &literal("World"));
        assert!(choices.output().starts_with("At foo, choose one of:\n0. \"Hello\"\n1. \"World\"\n"));
    }

    #[test]
    fn invalid_input_reprompts() {
        let location = Tree::root("foo");
        let term = greeting();
        let mut choices = interactive("9\nabc\n\n0\n");
        assert_eq!(choices.choose(&location, &eligible(&term)).unwrap(), &literal("Hello"));
        let output = choices.output();
        assert_eq!(output.matches("At foo").count(), 4);
        assert!(output.contains("Invalid input: no alternative 9"));
        assert!(output.contains("Invalid input, no default choices available."));
    }

    #[test]
    fn empty_line_accepts_the_default() {
        let location = Tree::root("foo");
        let term = greeting();
        let mut choices = interactive("\n")
            .with_defaults(Box::new(PredictableChoices::new().pick_literal("World")));
        assert_eq!(choices.choose(&location, &eligible(&term)).unwrap(), &literal("World"));
        assert!(choices.output().contains("1. \"World\" [default]"));
    }

    #[test]
    fn repetition_is_bounds_checked() {
        let location = Tree::root("foo");
        let Term::Repetition(rep) = repeat(literal("x"), 1, Some(3)) else {
            unreachable!()
        };
        let mut choices = interactive("0\n7\n2\n");
        assert_eq!(choices.repetition(&location, &rep).unwrap(), 2);
        assert_eq!(choices.output().matches("Invalid input").count(), 2);
        assert!(choices.output().contains("[1..3]"));
    }

    #[test]
    fn optional_accepts_yes_and_no() {
        let location = Tree::root("foo");
        let Term::Optional(opt) = optional(literal("x")) else {
            unreachable!()
        };
        let mut choices = interactive("maybe\nYes\nn\n");
        assert!(choices.include_optional(&location, &opt).unwrap());
        assert!(!choices.include_optional(&location, &opt).unwrap());
    }

    #[test]
    fn characters_in_several_notations() {
        let location = Tree::root("foo");
        let Term::Characters(set) = any_character_except(&['x']) else {
            unreachable!()
        };
        let mut choices = interactive("x\ny\n0x41\n66\n");
        assert_eq!(choices.any_char(&location, &set).unwrap(), 'y');
        assert_eq!(choices.any_char(&location, &set).unwrap(), 'A');
        assert_eq!(choices.any_char(&location, &set).unwrap(), 'B');
        assert!(choices.output().contains("Invalid input: 'x' is not in $ANY"));

        let Term::Characters(tab) = characters_of_set("TAB") else {
            unreachable!()
        };
        let mut choices = interactive("a\n0x9\n");
        assert_eq!(choices.any_char(&location, &tab).unwrap(), '\t');
    }

    #[test]
    fn closed_input_aborts() {
        let location = Tree::root("foo");
        let term = greeting();
        let mut choices = interactive("");
        assert!(matches!(
            choices.choose(&location, &eligible(&term)),
            Err(Error::InputClosed)
        ));
    }
}
