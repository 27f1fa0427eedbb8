//! Minimal INI reader for AWS shared credential files
//!
//! Supports the subset the AWS CLI writes: `[section]` headers,
//! `key = value` or `key: value` entries, `#`/`;` comment lines and
//! indented continuation lines. Blank lines inside a continued value are
//! kept; trailing ones are dropped. Keys are case-insensitive; section names
//! are not. Values from a `[DEFAULT]` section are visible from every section.

use std::collections::HashMap;
use std::fmt;

const DEFAULT_SECTION: &str = "DEFAULT";

/// A parse failure with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for IniError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for IniError {}

/// Parsed INI document
#[derive(Debug, Clone, Default)]
pub struct IniDocument {
    sections: HashMap<String, HashMap<String, String>>,
    order: Vec<String>,
}

impl IniDocument {
    pub fn parse(content: &str) -> Result<Self, IniError> {
        let mut document = Self::default();
        let mut current_section: Option<String> = None;
        let mut current_key: Option<String> = None;
        let mut blank_lines = 0;

        for (index, raw_line) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();

            if line.is_empty() {
                if current_key.is_some() {
                    blank_lines += 1;
                }
                continue;
            }
            if line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let indented = raw_line.starts_with(' ') || raw_line.starts_with('\t');
            if indented {
                if let (Some(section), Some(key)) = (&current_section, &current_key) {
                    if let Some(value) = document
                        .sections
                        .get_mut(section)
                        .and_then(|entries| entries.get_mut(key))
                    {
                        value.push_str(&"\n".repeat(blank_lines + 1));
                        value.push_str(line);
                    }
                    blank_lines = 0;
                    continue;
                }
            }
            blank_lines = 0;

            if line.starts_with('[') {
                let name = line
                    .strip_suffix(']')
                    .map(|l| l[1..].trim())
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| IniError {
                        line: line_no,
                        message: format!("invalid section header '{}'", line),
                    })?;

                if document.sections.contains_key(name) {
                    return Err(IniError {
                        line: line_no,
                        message: format!("section [{}] already exists", name),
                    });
                }

                document.sections.insert(name.to_string(), HashMap::new());
                document.order.push(name.to_string());
                current_section = Some(name.to_string());
                current_key = None;
                continue;
            }

            let Some(section) = &current_section else {
                return Err(IniError {
                    line: line_no,
                    message: "entry appears before any [section] header".to_string(),
                });
            };

            let delimiter = line.find(['=', ':']).ok_or_else(|| IniError {
                line: line_no,
                message: format!("missing '=' delimiter in '{}'", line),
            })?;

            let key = line[..delimiter].trim().to_lowercase();
            let value = line[delimiter + 1..].trim().to_string();

            if key.is_empty() {
                return Err(IniError {
                    line: line_no,
                    message: "empty key".to_string(),
                });
            }

            let entries = document.sections.entry(section.clone()).or_default();
            if entries.contains_key(&key) {
                return Err(IniError {
                    line: line_no,
                    message: format!("key '{}' repeated in section [{}]", key, section),
                });
            }
            entries.insert(key.clone(), value);
            current_key = Some(key);
        }

        Ok(document)
    }

    /// Look up `key` in `section`, falling back to `[DEFAULT]`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.sections
            .get(section)
            .and_then(|entries| entries.get(&key))
            .or_else(|| {
                self.sections
                    .get(DEFAULT_SECTION)
                    .and_then(|entries| entries.get(&key))
            })
            .map(String::as_str)
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Section names in file order
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
