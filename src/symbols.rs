//! Symbol encoding.
//!
//! The label encoder maps symbols to the integer codes the regressor was
//! trained on. Codes are positions in the fitted class list, so a dump of a
//! fitted encoder's classes loads back with identical codes.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Integer code of a symbol in the fitted encoder.
pub type EncodedSymbol = i64;

#[derive(Deserialize)]
#[serde(untagged)]
enum EncoderFile {
    Wrapped { classes: Vec<String> },
    Bare(Vec<String>),
}

/// Fitted label encoder. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, EncodedSymbol>,
}

impl LabelEncoder {
    /// Build an encoder from its class list. Duplicate classes are rejected
    /// because they would break the bijection.
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if index.insert(class.clone(), code as EncodedSymbol).is_some() {
                return Err(Error::encoder_not_found(format!(
                    "duplicate class {class:?} in label encoder"
                )));
            }
        }
        Ok(Self { classes, index })
    }

    /// Load an encoder artifact: `{"classes": [...]}` or a bare JSON array.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::encoder_not_found(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::encoder_not_found(format!("{}: {e}", path.display())))?;
        let file: EncoderFile = serde_json::from_str(&text)
            .map_err(|e| Error::encoder_not_found(format!("{}: {e}", path.display())))?;
        let classes = match file {
            EncoderFile::Wrapped { classes } => classes,
            EncoderFile::Bare(classes) => classes,
        };

        let encoder = Self::from_classes(classes)?;
        info!(
            path = %path.display(),
            classes = encoder.len(),
            "label encoder loaded"
        );
        Ok(encoder)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Code for a symbol; literal, case-sensitive match.
    pub fn transform(&self, symbol: &str) -> Option<EncodedSymbol> {
        self.index.get(symbol).copied()
    }

    /// Symbol for a code.
    pub fn inverse_transform(&self, code: EncodedSymbol) -> Option<&str> {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.classes.get(i))
            .map(String::as_str)
    }
}

/// Read-only facade over a fitted [`LabelEncoder`].
#[derive(Debug, Clone, Copy)]
pub struct SymbolResolver<'a> {
    encoder: &'a LabelEncoder,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(encoder: &'a LabelEncoder) -> Self {
        Self { encoder }
    }

    /// Fails with `UnknownSymbol` if the encoder was not fitted on `symbol`.
    pub fn encode(&self, symbol: &str) -> Result<EncodedSymbol> {
        self.encoder
            .transform(symbol)
            .ok_or_else(|| Error::UnknownSymbol(symbol.to_string()))
    }

    pub fn decode(&self, code: EncodedSymbol) -> Result<String> {
        self.encoder
            .inverse_transform(code)
            .map(String::from)
            .ok_or_else(|| Error::UnknownSymbol(format!("no symbol for encoded value {code}")))
    }

    pub fn known_symbols(&self) -> &'a [String] {
        self.encoder.classes()
    }
}
