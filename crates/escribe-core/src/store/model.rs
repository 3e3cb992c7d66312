use crate::error::{EscribeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named chapter inside a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    /// Editor document tree, kept opaque.
    #[serde(
        rename = "jsonContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub json_content: Option<Value>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            content: String::new(),
            json_content: None,
        }
    }

    /// `Chapter: <name>` block used when a whole project is sent as context.
    pub fn render_chapter(&self) -> String {
        format!("Chapter: {}\n\n{}\n\n---\n\n", self.name, self.content)
    }
}

/// A writing project row. Sections live inline in the `sections` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Row ids may come back as numbers or strings depending on the column type.
fn id_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Section>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Section>>::deserialize(deserializer)?.unwrap_or_default())
}

fn require_name(kind: &str, name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EscribeError::Validation(format!("{} name cannot be empty", kind)));
    }
    Ok(trimmed.to_string())
}

impl Project {
    pub fn new(user_id: impl Into<String>, name: &str) -> Result<Self> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            name: require_name("Project", name)?,
            sections: Vec::new(),
            created_at: None,
        })
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Append an empty section and return its id.
    pub fn add_section(&mut self, name: &str) -> Result<String> {
        let section = Section::new(require_name("Section", name)?);
        let id = section.id.clone();
        self.sections.push(section);
        Ok(id)
    }

    /// Blank names are ignored. Returns whether a section was renamed.
    pub fn rename_section(&mut self, id: &str, name: &str) -> bool {
        let Ok(name) = require_name("Section", name) else {
            return false;
        };
        match self.sections.iter_mut().find(|s| s.id == id) {
            Some(section) => {
                section.name = name;
                true
            }
            None => false,
        }
    }

    pub fn remove_section(&mut self, id: &str) -> Option<Section> {
        let index = self.sections.iter().position(|s| s.id == id)?;
        Some(self.sections.remove(index))
    }

    pub fn set_section_content(
        &mut self,
        id: &str,
        content: impl Into<String>,
        json_content: Option<Value>,
    ) -> Result<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| EscribeError::Validation(format!("No section with id {}", id)))?;
        section.content = content.into();
        section.json_content = json_content;
        Ok(())
    }

    /// Every section rendered as a chapter, in order.
    pub fn sections_context(&self) -> String {
        self.sections.iter().map(Section::render_chapter).collect()
    }
}

pub(crate) fn validate_project_name(name: &str) -> Result<String> {
    require_name("Project", name)
}

pub const MIN_USERNAME_LEN: usize = 3;

/// Row of the `profiles` table, keyed by auth user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

pub(crate) fn validate_username(username: &str) -> Result<String> {
    let trimmed = username.trim();
    if trimmed.chars().count() < MIN_USERNAME_LEN {
        return Err(EscribeError::Validation(format!(
            "Username must be at least {} characters long",
            MIN_USERNAME_LEN
        )));
    }
    Ok(trimmed.to_string())
}
