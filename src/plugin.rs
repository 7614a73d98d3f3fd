// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

//! Parsers registered by file extension.

use std::collections::BTreeMap;
use std::path::Path;
use land_core::log::BufLog;
use crate::markup::context::ParsedFile;
use crate::parser::{ParseOutput, Parser};

pub(crate) mod tests;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("no parser registered for the file '{0}'")]
    NoPlugin(String),
    #[error("the file '{0}' can't be preprocessed:\n{1}")]
    Preprocess(String, BufLog),
}

/// Parser of one language.
pub trait ParserPlugin {
    fn parse(&mut self, text: &str) -> ParseOutput;

    /// Returns the text to parse.
    fn preprocess(&mut self, text: &str) -> Result<String, BufLog> {
        Ok(text.to_string())
    }
}

impl<P: Parser> ParserPlugin for P {
    fn parse(&mut self, text: &str) -> ParseOutput {
        Parser::parse(self, text)
    }
}

/// Plugins by lower-case file extension.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn ParserPlugin>>,
    extensions: BTreeMap<String, usize>,
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistry { plugins: Vec::new(), extensions: BTreeMap::new() }
    }

    /// Registers `plugin` for the files with the given extensions, replacing the plugins
    /// previously registered for them.
    pub fn register(&mut self, extensions: &[&str], plugin: Box<dyn ParserPlugin>) {
        let index = self.plugins.len();
        self.plugins.push(plugin);
        for extension in extensions {
            self.extensions.insert(normalize_extension(extension), index);
        }
    }

    pub fn extensions(&self) -> impl Iterator<Item = &String> {
        self.extensions.keys()
    }

    pub fn is_supported(&self, file_name: &str) -> bool {
        self.index(file_name).is_some()
    }

    fn index(&self, file_name: &str) -> Option<usize> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        self.extensions.get(&normalize_extension(extension)).copied()
    }

    pub fn plugin_mut(&mut self, file_name: &str) -> Option<&mut dyn ParserPlugin> {
        match self.index(file_name) {
            Some(index) => Some(self.plugins[index].as_mut()),
            None => None,
        }
    }

    /// Preprocesses and parses `text` with the plugin of the file `name`. The parsed file holds
    /// the preprocessed text, to which the locations of the tree refer.
    pub fn parse_file(&mut self, name: &str, text: &str) -> Result<(ParsedFile, BufLog), PluginError> {
        let plugin = self.plugin_mut(name).ok_or_else(|| PluginError::NoPlugin(name.to_string()))?;
        let text = plugin.preprocess(text).map_err(|log| PluginError::Preprocess(name.to_string(), log))?;
        let mut output = plugin.parse(&text);
        let log = std::mem::replace(&mut output.log, BufLog::new());
        Ok((ParsedFile::from_output(name, text, output), log))
    }
}
