//! Deterministic rendering of option maps into encoder command lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::error::CommandError;
use crate::capability::{OptionMap, OptionValue};

/// A fully assembled external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Escaped single-string form, for logs and remote nodes.
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(escape_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Builds `<program> <global> <pre-input> -i <input> <options> <output>`.
///
/// Pure: no filesystem access and no process side effects.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    global_args: Vec<String>,
}

impl CommandBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            global_args: Vec::new(),
        }
    }

    /// Arguments emitted before any pre-input option.
    pub fn with_global_args(mut self, args: Vec<String>) -> Self {
        self.global_args = args;
        self
    }

    pub fn build(
        &self,
        input: &Path,
        output: &Path,
        pre_input: &OptionMap,
        options: &OptionMap,
    ) -> CommandLine {
        let mut args = self.global_args.clone();
        args.extend(render_options(pre_input));
        args.push("-i".to_string());
        args.push(input.to_string_lossy().into_owned());
        args.extend(render_options(options));
        args.push(output.to_string_lossy().into_owned());
        CommandLine {
            program: self.program.clone(),
            args,
        }
    }

    /// Escaped single-string form of [`build`](Self::build).
    pub fn build_string(
        &self,
        input: &Path,
        output: &Path,
        pre_input: &OptionMap,
        options: &OptionMap,
    ) -> String {
        self.build(input, output, pre_input, options).render()
    }
}

/// Flattens an option map into an argument list, preserving map order.
pub fn render_options(options: &OptionMap) -> Vec<String> {
    let mut args = Vec::new();
    for (flag, value) in options.iter() {
        match value {
            OptionValue::Flag(true) => args.push(flag.to_string()),
            OptionValue::Flag(false) => {}
            OptionValue::Value(v) if v.is_empty() => args.push(flag.to_string()),
            OptionValue::Value(v) => {
                args.push(flag.to_string());
                args.push(v.clone());
            }
            OptionValue::Repeated(values) => {
                for v in values {
                    args.push(flag.to_string());
                    args.push(v.clone());
                }
            }
        }
    }
    args
}

/// Quotes `arg` if it contains whitespace or a double quote.
pub fn escape_arg(arg: &str) -> String {
    if !arg.chars().any(|c| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Inverse of [`escape_arg`] for a single quoted or bare segment.
pub fn unescape_arg(arg: &str) -> String {
    let Some(inner) = arg.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return arg.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parses a free-form argument string (`-tag:v hvc1 -movflags +faststart`)
/// into an option map.
///
/// A token starting with `-` opens a flag; a following token that does not
/// start with `-` (or is a negative number) is its value. Repeated flags
/// collect their values in order. A value with no preceding flag, or an
/// unterminated quote, is an error.
pub fn parse_option_args(input: &str) -> Result<OptionMap, CommandError> {
    fn is_flag(token: &str) -> bool {
        token.starts_with('-') && token.len() > 1 && token.parse::<f64>().is_err()
    }

    let tokens = shell_words::split(input)?;
    let mut map = OptionMap::new();
    let mut i = 0;
    while i < tokens.len() {
        let flag = &tokens[i];
        if !is_flag(flag) {
            return Err(CommandError::DanglingValue { value: flag.clone() });
        }
        let value = match tokens.get(i + 1) {
            Some(next) if !is_flag(next) => {
                i += 1;
                Some(next.clone())
            }
            _ => None,
        };
        i += 1;

        let merged = match (map.get(flag).cloned(), value) {
            (None, None) => OptionValue::Flag(true),
            (None, Some(v)) => OptionValue::Value(v),
            (Some(OptionValue::Value(old)), Some(v)) => OptionValue::Repeated(vec![old, v]),
            (Some(OptionValue::Repeated(mut values)), Some(v)) => {
                values.push(v);
                OptionValue::Repeated(values)
            }
            (Some(existing), None) => existing,
            (Some(OptionValue::Flag(_)), Some(v)) => OptionValue::Value(v),
        };
        map.insert(flag, merged);
    }
    Ok(map)
}
