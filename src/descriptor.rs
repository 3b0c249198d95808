use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use anyhow::{Context, Result};

use crate::opcodes;

/// A field type as it appears in field and method descriptors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FieldType {
    /// Primitive type identified by its descriptor character (`I`, `J`, ...).
    Base(char),
    Object(String),
    Array(Box<FieldType>),
}

impl FieldType {
    pub(crate) fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = Parser::new(descriptor);
        let field_type = parser.field_type()?;
        parser.expect_end()?;
        Ok(field_type)
    }

    /// Number of local-variable / operand-stack slots the value takes.
    pub(crate) fn slots(&self) -> u16 {
        match self {
            FieldType::Base('J') | FieldType::Base('D') => 2,
            _ => 1,
        }
    }

    pub(crate) fn load_opcode(&self) -> u8 {
        match self {
            FieldType::Base('J') => opcodes::LLOAD,
            FieldType::Base('F') => opcodes::FLOAD,
            FieldType::Base('D') => opcodes::DLOAD,
            FieldType::Base(_) => opcodes::ILOAD,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ALOAD,
        }
    }

    pub(crate) fn return_opcode(&self) -> u8 {
        match self {
            FieldType::Base('J') => opcodes::LRETURN,
            FieldType::Base('F') => opcodes::FRETURN,
            FieldType::Base('D') => opcodes::DRETURN,
            FieldType::Base(_) => opcodes::IRETURN,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ARETURN,
        }
    }

    /// Pushes the zero value of this type.
    pub(crate) fn default_value_opcode(&self) -> u8 {
        match self {
            FieldType::Base('J') => opcodes::LCONST_0,
            FieldType::Base('F') => opcodes::FCONST_0,
            FieldType::Base('D') => opcodes::DCONST_0,
            FieldType::Base(_) => opcodes::ICONST_0,
            FieldType::Object(_) | FieldType::Array(_) => opcodes::ACONST_NULL,
        }
    }

    /// Rewrites the class named by this type through `map`. Returns whether
    /// it changed.
    fn map_class<F>(&mut self, map: &mut F) -> bool
    where
        F: FnMut(&str) -> Option<String>,
    {
        match self {
            FieldType::Object(name) => match map(name) {
                Some(renamed) => {
                    *name = renamed;
                    true
                }
                None => false,
            },
            FieldType::Array(element) => element.map_class(map),
            FieldType::Base(_) => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(c) => write!(f, "{c}"),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(element) => write!(f, "[{element}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MethodDescriptor {
    pub(crate) parameters: Vec<FieldType>,
    /// `None` for `void`.
    pub(crate) return_type: Option<FieldType>,
}

impl MethodDescriptor {
    pub(crate) fn parse(descriptor: &str) -> Result<Self> {
        let mut parser = Parser::new(descriptor);
        parser.expect('(')?;
        let mut parameters = Vec::new();
        while parser.peek()? != ')' {
            parameters.push(parser.field_type()?);
        }
        parser.expect(')')?;
        let return_type = if parser.peek()? == 'V' {
            parser.next()?;
            None
        } else {
            Some(parser.field_type()?)
        };
        parser.expect_end()?;
        Ok(Self {
            parameters,
            return_type,
        })
    }

    pub(crate) fn parameter_slots(&self) -> u16 {
        self.parameters.iter().map(FieldType::slots).sum()
    }

    pub(crate) fn return_slots(&self) -> u16 {
        self.return_type.as_ref().map(FieldType::slots).unwrap_or(0)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for parameter in &self.parameters {
            write!(f, "{parameter}")?;
        }
        f.write_str(")")?;
        match &self.return_type {
            Some(return_type) => write!(f, "{return_type}"),
            None => f.write_str("V"),
        }
    }
}

/// Rewrites the classes of a field or method descriptor through `map`.
/// `None` when nothing changed. A bare `V` (the `void` class literal of an
/// annotation) names no class.
pub(crate) fn map_descriptor<F>(descriptor: &str, mut map: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> Option<String>,
{
    if descriptor == "V" {
        return Ok(None);
    }
    if descriptor.starts_with('(') {
        let mut method = MethodDescriptor::parse(descriptor)?;
        let mut changed = false;
        for field_type in method.parameters.iter_mut().chain(method.return_type.as_mut()) {
            changed |= field_type.map_class(&mut map);
        }
        return Ok(changed.then(|| method.to_string()));
    }
    let mut field_type = FieldType::parse(descriptor)?;
    Ok(field_type
        .map_class(&mut map)
        .then(|| field_type.to_string()))
}

/// Prepends a receiver parameter of type `owner` to a method descriptor.
pub(crate) fn with_receiver(owner: &str, descriptor: &str) -> Result<String> {
    let rest = descriptor
        .strip_prefix('(')
        .with_context(|| format!("invalid method descriptor {descriptor}"))?;
    Ok(format!("(L{owner};{rest}"))
}

/// Converts an internal name (`a/b/C$D`) to its binary name (`a.b.C$D`).
pub(crate) fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Converts a binary name (`a.b.C$D`) to its internal form (`a/b/C$D`).
pub(crate) fn internal_name(binary: &str) -> String {
    binary.replace('.', "/")
}

struct Parser<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
        }
    }

    fn field_type(&mut self) -> Result<FieldType> {
        match self.next()? {
            c @ ('B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z') => Ok(FieldType::Base(c)),
            'L' => {
                let mut name = String::new();
                loop {
                    match self.next()? {
                        ';' => break,
                        c => name.push(c),
                    }
                }
                if name.is_empty() {
                    anyhow::bail!("empty class name in descriptor {}", self.source);
                }
                Ok(FieldType::Object(name))
            }
            '[' => Ok(FieldType::Array(Box::new(self.field_type()?))),
            c => anyhow::bail!("unexpected '{c}' in descriptor {}", self.source),
        }
    }

    fn next(&mut self) -> Result<char> {
        self.chars
            .next()
            .with_context(|| format!("truncated descriptor {}", self.source))
    }

    fn peek(&mut self) -> Result<char> {
        self.chars
            .peek()
            .copied()
            .with_context(|| format!("truncated descriptor {}", self.source))
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        let next = self.next()?;
        if next != expected {
            anyhow::bail!(
                "expected '{expected}' but found '{next}' in descriptor {}",
                self.source
            );
        }
        Ok(())
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.chars.peek().is_some() {
            anyhow::bail!("trailing characters in descriptor {}", self.source);
        }
        Ok(())
    }
}
