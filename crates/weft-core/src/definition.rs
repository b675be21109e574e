//! Single-file component definitions.
//!
//! A definition bundles a `<template>` block, an optional `<style>` block and
//! an optional `<script>` block. Only the template is required. Style and
//! script are looked up outside the template, so a `<style>` written inside
//! the template stays part of the rendered markup.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<template>(.*?)</template>").expect("template block pattern is valid")
});

static STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<style[^>]*>(.*?)</style>").expect("style block pattern is valid")
});

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("script block pattern is valid")
});

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Definition {
    pub template: String,
    pub style: String,
    /// Kept verbatim; nothing here interprets it.
    pub script: Option<String>,
}

impl Definition {
    pub fn parse(text: &str) -> Result<Self> {
        let block = TEMPLATE
            .captures(text)
            .ok_or_else(|| Error::Loader("definition has no <template> block".into()))?;
        let template = block[1].to_string();
        let range = block.get(0).map_or(0..0, |m| m.range());
        let outside = format!("{}{}", &text[..range.start], &text[range.end..]);

        let style = STYLE
            .captures(&outside)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let script = SCRIPT.captures(&outside).map(|c| c[1].to_string());
        Ok(Self {
            template,
            style,
            script,
        })
    }

    /// Reads and parses a definition file. Failures are logged and give
    /// `None`; the component is then simply never built.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                log::error!("failed to read component {}: {err}", path.display());
                return None;
            }
        };
        match Self::parse(&text) {
            Ok(def) => {
                log::debug!("loaded component definition {}", path.display());
                Some(def)
            }
            Err(err) => {
                log::error!("failed to load component {}: {err}", path.display());
                None
            }
        }
    }
}
