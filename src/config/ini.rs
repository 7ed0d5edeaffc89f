//! INI Reader
//!
//! Reads the sectioned `key = value` files used for production
//! configuration. Keys are case-sensitive and keep their insertion order.
//!
//! Supported syntax:
//! - `[section]` headers
//! - `key = value` and `key: value` options
//! - full-line comments starting with `;` or `#`
//! - inline comments introduced by a `;` that follows whitespace
//! - indented continuation lines, appended to the previous value with `\n`

use crate::error::ConfigError;

/// A parsed INI document.
#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

/// One `[name]` section with its options in file order.
#[derive(Debug, Clone)]
pub struct IniSection {
    pub name: String,
    pub options: Vec<(String, String)>,
}

impl IniSection {
    fn set(&mut self, key: &str, value: String) {
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.options.push((key.to_string(), value)),
        }
    }

    fn append(&mut self, key: &str, line: &str) {
        if let Some(entry) = self.options.iter_mut().find(|(k, _)| k == key) {
            entry.1.push('\n');
            entry.1.push_str(line);
        }
    }
}

impl IniDocument {
    /// Parses INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut doc = IniDocument::default();
        let mut current: Option<usize> = None;
        let mut last_key: Option<String> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim_end();

            if line.trim().is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let starts_indented = line.starts_with(|c: char| c.is_whitespace());

            // Continuation of the previous option
            if starts_indented {
                if let (Some(section), Some(key)) = (current, last_key.as_deref()) {
                    let value = line.trim();
                    if !value.is_empty() {
                        doc.sections[section].append(key, value);
                    }
                    continue;
                }
            }

            let trimmed = line.trim();

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| ConfigError::Syntax {
                    line: line_no,
                    message: format!("unterminated section header '{}'", trimmed),
                })?;
                current = Some(doc.section_index_or_insert(name.trim()));
                last_key = None;
                continue;
            }

            let section = current.ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: "option found before any section header".to_string(),
            })?;

            let (key, value) = split_option(trimmed).ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: format!("expected 'key = value', found '{}'", trimmed),
            })?;

            doc.sections[section].set(&key, value);
            last_key = Some(key);
        }

        Ok(doc)
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        if let Some(pos) = self.sections.iter().position(|s| s.name == name) {
            return pos;
        }
        self.sections.push(IniSection {
            name: name.to_string(),
            options: Vec::new(),
        });
        self.sections.len() - 1
    }

    /// Returns the named section, if present.
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns all section names in file order.
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Splits `key = value` / `key: value`, whichever separator comes first.
fn split_option(line: &str) -> Option<(String, String)> {
    let sep = line.find(['=', ':'])?;
    let key = line[..sep].trim_end();
    if key.is_empty() {
        return None;
    }

    let mut value = line[sep + 1..].trim();

    // Inline comment: ';' preceded by whitespace
    if let Some(pos) = value
        .char_indices()
        .find(|&(i, c)| c == ';' && i > 0 && value[..i].ends_with(char::is_whitespace))
        .map(|(i, _)| i)
    {
        value = value[..pos].trim_end();
    }

    let value = if value == "\"\"" { "" } else { value };
    Some((key.to_string(), value.to_string()))
}
