//! TOML dashboard description.
//!
//! Every top-level table is a named section. `[main]` is the entry point;
//! panels and commands refer to other sections by name through `panels` and
//! `rules`. Keys missing from a section fall back to `[default]`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::layout::{CommandNode, Element, LayoutTree, PanelNode};
use crate::rules::{RegexFlags, Rule, RuleError};
use crate::style::{StyleError, StyleSpec, parse_color};

const MAIN: &str = "main";
const DEFAULT: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing section [{0}]")]
    MissingSection(String),
    #[error("[{0}] must define either `command` or `panels`")]
    NoContent(String),
    #[error("[{0}] is used as a rule but defines neither `regex` nor `literal`")]
    NotARule(String),
    #[error("[{section}] has invalid weight {value}; weights must be between 1 and 65535")]
    InvalidWeight { section: String, value: i64 },
    #[error("[{0}] contains itself")]
    Cycle(String),
    #[error("[{section}] {source}")]
    Style {
        section: String,
        #[source]
        source: StyleError,
    },
    #[error("[{section}] {source}")]
    Rule {
        section: String,
        #[source]
        source: RuleError,
    },
    #[error("[{0}] has an empty command")]
    EmptyCommand(String),
    #[error("[{0}] cannot split command: unbalanced quote or trailing backslash")]
    Command(String),
}

/// Section names, either as a TOML array or a comma separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NameList {
    List(Vec<String>),
    Csv(String),
}

impl NameList {
    fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            NameList::List(items) => items.iter().map(String::as_str).collect(),
            NameList::Csv(text) => text.split(',').collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CommandLine {
    Argv(Vec<String>),
    Line(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ColorValue {
    Index(i64),
    Name(String),
}

impl ColorValue {
    fn parse(&self) -> Result<crossterm::style::Color, StyleError> {
        match self {
            ColorValue::Index(index) => parse_color(&index.to_string()),
            ColorValue::Name(name) => parse_color(name),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawSection {
    title: Option<String>,
    panels: Option<NameList>,
    command: Option<CommandLine>,
    vertical: Option<bool>,
    weight: Option<i64>,
    rules: Option<NameList>,
    regex: Option<String>,
    literal: Option<String>,
    ascii: Option<bool>,
    ignorecase: Option<bool>,
    locale: Option<bool>,
    multiline: Option<bool>,
    dotall: Option<bool>,
    verbose: Option<bool>,
    fg: Option<ColorValue>,
    bg: Option<ColorValue>,
    blink: Option<bool>,
    bold: Option<bool>,
    dim: Option<bool>,
    reverse: Option<bool>,
    standout: Option<bool>,
    underline: Option<bool>,
}

macro_rules! fall_back {
    ($section:expr, $default:expr, $($field:ident),+ $(,)?) => {
        RawSection {
            $($field: $section.$field.clone().or_else(|| $default.$field.clone()),)+
        }
    };
}

impl RawSection {
    fn with_defaults(&self, default: &RawSection) -> RawSection {
        fall_back!(
            self, default, title, panels, command, vertical, weight, rules, regex, literal, ascii,
            ignorecase, locale, multiline, dotall, verbose, fg, bg, blink, bold, dim, reverse,
            standout, underline,
        )
    }
}

/// Parsed configuration document, resolved lazily section by section.
pub struct ConfigDocument {
    sections: BTreeMap<String, RawSection>,
    default: RawSection,
}

impl ConfigDocument {
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let sections: BTreeMap<String, RawSection> = toml::from_str(text)?;
        let default = sections.get(DEFAULT).cloned().unwrap_or_default();
        Ok(Self { sections, default })
    }

    fn section(&self, name: &str) -> Result<RawSection, ConfigError> {
        self.sections
            .get(name)
            .map(|raw| raw.with_defaults(&self.default))
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))
    }

    /// Build the dashboard rooted at `[main]`.
    pub fn into_layout(self) -> Result<LayoutTree, ConfigError> {
        let mut main = self.section(MAIN)?;
        let title = main.title.take();
        let mut visiting = Vec::new();
        let root = self.element(MAIN, &main, &StyleSpec::default(), &mut visiting)?;

        let base = style_of(MAIN, &main)?;
        let separator_style = match ["separator", "seperator"]
            .into_iter()
            .find(|name| self.sections.contains_key(*name))
        {
            Some(name) => base.merge(&style_of(name, &self.section(name)?)?),
            None => base,
        };
        let title_style = if self.sections.contains_key("title") {
            base.merge(&style_of("title", &self.section("title")?)?)
        } else {
            base
        };

        Ok(LayoutTree {
            title,
            root,
            title_style,
            separator_style,
        })
    }

    fn element(
        &self,
        name: &str,
        raw: &RawSection,
        parent: &StyleSpec,
        visiting: &mut Vec<String>,
    ) -> Result<Element, ConfigError> {
        if visiting.iter().any(|seen| seen == name) {
            return Err(ConfigError::Cycle(name.to_string()));
        }
        visiting.push(name.to_string());

        let style = parent.merge(&style_of(name, raw)?);
        let weight = weight_of(name, raw)?;

        let element = if let Some(command) = raw.command.as_ref() {
            let mut node = CommandNode::new(argv_of(name, command)?)
                .with_weight(weight)
                .with_style(style);
            node.title = raw.title.clone();
            for rule_name in raw.rules.as_ref().map(NameList::names).unwrap_or_default() {
                let (rule, rule_style) = self.rule(&rule_name, &style)?;
                match node.rules.iter_mut().find(|(existing, _)| *existing == rule) {
                    Some(entry) => entry.1 = rule_style,
                    None => node.rules.push((rule, rule_style)),
                }
            }
            Element::Command(node)
        } else if let Some(panels) = raw.panels.as_ref() {
            let mut children = Vec::new();
            for child_name in panels.names() {
                let child = self.section(&child_name)?;
                children.push(self.element(&child_name, &child, &style, visiting)?);
            }
            let mut panel = PanelNode::new(raw.vertical.unwrap_or(false), children)
                .with_weight(weight);
            panel.style = style;
            Element::Panel(panel)
        } else {
            return Err(ConfigError::NoContent(name.to_string()));
        };

        visiting.pop();
        Ok(element)
    }

    fn rule(&self, name: &str, owner: &StyleSpec) -> Result<(Rule, StyleSpec), ConfigError> {
        let raw = self.section(name)?;
        let rule = if let Some(pattern) = raw.regex.as_ref() {
            let flags = RegexFlags {
                ascii: raw.ascii.unwrap_or(false),
                ignore_case: raw.ignorecase.unwrap_or(false),
                multiline: raw.multiline.unwrap_or(false),
                dot_all: raw.dotall.unwrap_or(false),
                verbose: raw.verbose.unwrap_or(false),
                locale: raw.locale.unwrap_or(false),
            };
            Rule::regex(pattern.clone(), flags).map_err(|source| ConfigError::Rule {
                section: name.to_string(),
                source,
            })?
        } else if let Some(pattern) = raw.literal.as_ref() {
            Rule::literal(pattern.clone(), raw.ignorecase.unwrap_or(false))
        } else {
            return Err(ConfigError::NotARule(name.to_string()));
        };
        Ok((rule, owner.merge(&style_of(name, &raw)?)))
    }
}

fn style_of(section: &str, raw: &RawSection) -> Result<StyleSpec, ConfigError> {
    let color = |value: Option<&ColorValue>| {
        value
            .map(ColorValue::parse)
            .transpose()
            .map_err(|source| ConfigError::Style {
                section: section.to_string(),
                source,
            })
    };
    Ok(StyleSpec {
        fg: color(raw.fg.as_ref())?,
        bg: color(raw.bg.as_ref())?,
        blink: raw.blink,
        bold: raw.bold,
        dim: raw.dim,
        reverse: raw.reverse,
        standout: raw.standout,
        underline: raw.underline,
    })
}

fn weight_of(section: &str, raw: &RawSection) -> Result<u16, ConfigError> {
    let value = raw.weight.unwrap_or(1);
    match u16::try_from(value) {
        Ok(weight) if weight > 0 => Ok(weight),
        _ => Err(ConfigError::InvalidWeight {
            section: section.to_string(),
            value,
        }),
    }
}

fn argv_of(section: &str, command: &CommandLine) -> Result<Vec<String>, ConfigError> {
    let argv = match command {
        CommandLine::Argv(argv) => argv.clone(),
        CommandLine::Line(line) => {
            shlex::split(line).ok_or_else(|| ConfigError::Command(section.to_string()))?
        }
    };
    if argv.is_empty() {
        return Err(ConfigError::EmptyCommand(section.to_string()));
    }
    Ok(argv)
}

/// Parse a configuration document held in memory.
pub fn load_str(text: &str) -> Result<LayoutTree, ConfigError> {
    ConfigDocument::parse(text)?.into_layout()
}

/// Read and parse the configuration file at `path`.
pub fn load_file(path: impl AsRef<Path>) -> Result<LayoutTree, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text)
}
