//! Conditional bean registration support.
//!
//! Candidates can be limited to specific configurations with `conditional_on_property`
//! expressions:
//!
//! ```text
//! expr    := and ('||' and)*
//! and     := unary ('&&' unary)*
//! unary   := '!' unary | primary
//! primary := '(' expr ')'
//!          | 'isEnabled(' identifier ')'
//!          | 'isNotEmpty(' identifier ')'
//!          | identifier ('=' | '!=') value
//!          | identifier
//! ```
//!
//! A bare identifier is a shorthand for `isEnabled(identifier)`. Values can be quoted with `'` or
//! `"` when they contain whitespace or operator characters. Identifiers follow the property
//! identifier syntax from [crate::property].
//!
//! Custom conditions are plain functions receiving a [Context] with the configuration and a
//! read-only view of registered definitions.

use crate::annotation::BeanAnnotationRegistry;
use crate::bean::Injectable;
use crate::instance_provider::BeanType;
use crate::property::ConfigurationFiles;
use crate::scanner::{BeanCandidate, ScanResult};
use config::ValueKind;
use derivative::Derivative;
use fxhash::FxHashSet;
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use std::any::TypeId;
use std::iter::Peekable;
use std::str::Chars;

/// A read-only facade of a [ScanResult] safe to use in registration conditions.
#[cfg_attr(test, automock)]
pub trait BeanDefinitionRegistryFacade {
    /// Checks if given type has a bean definition, implementation or provider.
    fn is_registered(&self, target: TypeId) -> bool;
}

/// Context information for use by condition implementations.
pub trait Context {
    /// Returns configuration available during evaluation. Empty before configuration is loaded.
    fn configuration(&self) -> &ConfigurationFiles;

    /// Returns the registry for which the conditional evaluation is taking place.
    fn registry(&self) -> &dyn BeanDefinitionRegistryFacade;
}

/// Custom registration condition which should pass to let a candidate become a valid bean.
pub type BeanCondition = fn(context: &dyn Context) -> bool;

/// Conditions attached to a bean definition.
#[derive(Derivative, Clone, Copy, Default)]
#[derivative(Debug)]
pub struct BeanConditions {
    /// Property expression, parsed when scanning.
    pub on_property: Option<&'static str>,

    /// Use this bean only when no other implementation of its interfaces is available.
    pub on_missing_bean: bool,

    #[derivative(Debug = "ignore")]
    pub custom: Option<BeanCondition>,
}

pub struct SimpleContext<'a> {
    configuration: &'a ConfigurationFiles,
    registry: &'a dyn BeanDefinitionRegistryFacade,
}

impl<'a> SimpleContext<'a> {
    pub fn new(
        configuration: &'a ConfigurationFiles,
        registry: &'a dyn BeanDefinitionRegistryFacade,
    ) -> Self {
        Self {
            configuration,
            registry,
        }
    }
}

impl Context for SimpleContext<'_> {
    fn configuration(&self) -> &ConfigurationFiles {
        self.configuration
    }

    fn registry(&self) -> &dyn BeanDefinitionRegistryFacade {
        self.registry
    }
}

/// Simple condition returning true if the given type is registered.
pub fn registered_bean<T: Injectable + ?Sized>(context: &dyn Context) -> bool {
    context.registry().is_registered(TypeId::of::<T>())
}

/// Simple condition returning true if the given type is not registered.
pub fn unregistered_bean<T: Injectable + ?Sized>(context: &dyn Context) -> bool {
    !registered_bean::<T>(context)
}

/// Parsed `conditional_on_property` expression.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum PropertyCondition {
    Enabled(String),
    NotEmpty(String),
    Equals(String, String),
    NotEquals(String, String),
    Not(Box<PropertyCondition>),
    All(Vec<PropertyCondition>),
    Any(Vec<PropertyCondition>),
}

impl PropertyCondition {
    pub fn parse(expression: &str) -> Result<Self, String> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err("empty expression".to_string());
        }

        let mut parser = Parser {
            tokens: &tokens,
            position: 0,
        };
        let condition = parser.or()?;

        match parser.peek() {
            None => Ok(condition),
            Some(token) => Err(format!("unexpected {token:?} after expression")),
        }
    }

    pub fn evaluate(&self, configuration: &ConfigurationFiles) -> bool {
        match self {
            PropertyCondition::Enabled(identifier) => configuration
                .value(identifier)
                .and_then(|value| value.into_bool().ok())
                .unwrap_or(false),
            PropertyCondition::NotEmpty(identifier) => configuration
                .value(identifier)
                .map(|value| match value.kind {
                    ValueKind::Nil => false,
                    ValueKind::String(value) => !value.is_empty(),
                    ValueKind::Array(values) => !values.is_empty(),
                    ValueKind::Table(values) => !values.is_empty(),
                    _ => true,
                })
                .unwrap_or(false),
            PropertyCondition::Equals(identifier, expected) => {
                configuration.string_value(identifier).as_ref() == Some(expected)
            }
            PropertyCondition::NotEquals(identifier, expected) => {
                configuration.string_value(identifier).as_ref() != Some(expected)
            }
            PropertyCondition::Not(condition) => !condition.evaluate(configuration),
            PropertyCondition::All(conditions) => conditions
                .iter()
                .all(|condition| condition.evaluate(configuration)),
            PropertyCondition::Any(conditions) => conditions
                .iter()
                .any(|condition| condition.evaluate(configuration)),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
enum Token {
    Word(String),
    Quoted(String),
    OpenParen,
    CloseParen,
    Not,
    And,
    Or,
    Equals,
    NotEquals,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '%')
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = vec![];
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            '!' if chars.next_if_eq(&'=').is_some() => Token::NotEquals,
            '!' => Token::Not,
            '=' => {
                chars.next_if_eq(&'=');
                Token::Equals
            }
            '&' if chars.next_if_eq(&'&').is_some() => Token::And,
            '|' if chars.next_if_eq(&'|').is_some() => Token::Or,
            '\'' | '"' => Token::Quoted(quoted(&mut chars, c)?),
            c if is_word_char(c) => {
                let mut word = c.to_string();
                while let Some(c) = chars.next_if(|c| is_word_char(*c)) {
                    word.push(c);
                }

                Token::Word(word)
            }
            c => return Err(format!("unexpected character '{c}'")),
        };

        tokens.push(token);
    }

    Ok(tokens)
}

fn quoted(chars: &mut Peekable<Chars>, quote: char) -> Result<String, String> {
    let mut value = String::new();
    for c in chars.by_ref() {
        if c == quote {
            return Ok(value);
        }

        value.push(c);
    }

    Err("unterminated quoted value".to_string())
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        self.position += 1;
        token
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        if self.accept(token) {
            Ok(())
        } else {
            Err(format!("expected {token:?}, found {:?}", self.peek()))
        }
    }

    fn or(&mut self) -> Result<PropertyCondition, String> {
        let mut conditions = vec![self.and()?];
        while self.accept(&Token::Or) {
            conditions.push(self.and()?);
        }

        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            PropertyCondition::Any(conditions)
        })
    }

    fn and(&mut self) -> Result<PropertyCondition, String> {
        let mut conditions = vec![self.unary()?];
        while self.accept(&Token::And) {
            conditions.push(self.unary()?);
        }

        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            PropertyCondition::All(conditions)
        })
    }

    fn unary(&mut self) -> Result<PropertyCondition, String> {
        if self.accept(&Token::Not) {
            return self
                .unary()
                .map(|condition| PropertyCondition::Not(Box::new(condition)));
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<PropertyCondition, String> {
        match self.next().cloned() {
            Some(Token::OpenParen) => {
                let condition = self.or()?;
                self.expect(&Token::CloseParen)?;
                Ok(condition)
            }
            Some(Token::Word(function))
                if (function == "isEnabled" || function == "isNotEmpty")
                    && self.peek() == Some(&Token::OpenParen) =>
            {
                self.expect(&Token::OpenParen)?;
                let identifier = self.value()?;
                self.expect(&Token::CloseParen)?;

                Ok(if function == "isEnabled" {
                    PropertyCondition::Enabled(identifier)
                } else {
                    PropertyCondition::NotEmpty(identifier)
                })
            }
            Some(Token::Word(identifier)) => {
                if self.accept(&Token::Equals) {
                    Ok(PropertyCondition::Equals(identifier, self.value()?))
                } else if self.accept(&Token::NotEquals) {
                    Ok(PropertyCondition::NotEquals(identifier, self.value()?))
                } else {
                    Ok(PropertyCondition::Enabled(identifier))
                }
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn value(&mut self) -> Result<String, String> {
        match self.next().cloned() {
            Some(Token::Word(value)) | Some(Token::Quoted(value)) => Ok(value),
            Some(token) => Err(format!("expected value, found {token:?}")),
            None => Err("expected value, found end of expression".to_string()),
        }
    }
}

/// Checks if a candidate can become a valid bean: its annotation must be known and all of its
/// conditions must pass.
pub fn is_valid(
    annotations: &BeanAnnotationRegistry,
    candidate: &BeanCandidate,
    context: &dyn Context,
) -> bool {
    annotations.is_bean_annotation(candidate.definition.annotation)
        && candidate
            .property_condition
            .as_ref()
            .map_or(true, |condition| condition.evaluate(context.configuration()))
        && candidate
            .definition
            .conditions
            .custom
            .map_or(true, |condition| (condition)(context))
}

/// Set of bean types which passed conditional evaluation, along with all provider outputs.
#[derive(Clone, Debug, Default)]
pub struct ValidBeanSet {
    types: FxHashSet<TypeId>,
    ordered: Vec<BeanType>,
}

impl ValidBeanSet {
    /// Creates a set without evaluating conditions. Used before configuration is available.
    pub fn unfiltered(scan: &ScanResult, annotations: &BeanAnnotationRegistry) -> Self {
        Self::build(scan, annotations, |candidate| {
            annotations.is_bean_annotation(candidate.definition.annotation)
        })
    }

    /// Creates a set of candidates passing all conditions for given configuration.
    pub fn filtered(
        scan: &ScanResult,
        annotations: &BeanAnnotationRegistry,
        configuration: &ConfigurationFiles,
    ) -> Self {
        let context = SimpleContext::new(configuration, scan);
        Self::build(scan, annotations, |candidate| {
            is_valid(annotations, candidate, &context)
        })
    }

    fn build<F: Fn(&BeanCandidate) -> bool>(
        scan: &ScanResult,
        annotations: &BeanAnnotationRegistry,
        filter: F,
    ) -> Self {
        let valid = scan
            .candidates()
            .into_iter()
            .filter(|candidate| filter(*candidate))
            .collect_vec();

        let unconditional: FxHashSet<TypeId> = valid
            .iter()
            .filter(|candidate| !candidate.definition.conditions.on_missing_bean)
            .map(|candidate| candidate.definition.bean_type.id)
            .collect();

        // an on-missing-bean candidate is redundant when each of its interfaces is already
        // covered by an unconditional bean or a provider
        let is_redundant = |candidate: &BeanCandidate| {
            let bean_type = candidate.definition.bean_type;
            let interfaces = scan.interfaces_of(bean_type.id);
            !interfaces.is_empty()
                && interfaces.iter().all(|interface| {
                    !scan.providers_for(interface.id).is_empty()
                        || scan.implementations(interface.id).iter().any(|alias| {
                            alias.target.id != bean_type.id
                                && unconditional.contains(&alias.target.id)
                        })
                })
        };

        let beans = valid
            .into_iter()
            .filter(|candidate| {
                !candidate.definition.conditions.on_missing_bean || !is_redundant(*candidate)
            })
            .map(|candidate| {
                let priority = candidate.definition.priority
                    || annotations
                        .get(candidate.definition.annotation)
                        .map(|annotation| annotation.priority)
                        .unwrap_or(false);
                (candidate.definition.bean_type, priority)
            })
            .sorted_by_key(|(bean_type, priority)| (!*priority, bean_type.name))
            .map(|(bean_type, _)| bean_type)
            .unique()
            .collect_vec();

        let mut types: FxHashSet<TypeId> = beans.iter().map(|bean_type| bean_type.id).collect();
        let mut ordered = beans;
        for output in scan.provider_outputs() {
            if types.insert(output.id) {
                ordered.push(output);
            }
        }

        Self { types, ordered }
    }

    #[inline]
    pub fn contains(&self, id: TypeId) -> bool {
        self.types.contains(&id)
    }

    /// Iterates over valid types: priority beans first, then other beans by name, then provider
    /// outputs.
    pub fn iter(&self) -> impl Iterator<Item = &BeanType> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}
