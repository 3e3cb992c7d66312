use super::model::Project;
use crate::error::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "text/markdown",
            ExportFormat::Text => "text/plain",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "md" | "markdown" => Some(ExportFormat::Markdown),
            "txt" | "text" => Some(ExportFormat::Text),
            _ => None,
        }
    }
}

/// `<name>.<ext>`, with `untitled` standing in for a blank name.
pub fn export_file_name(name: &str, format: ExportFormat) -> String {
    let name = name.trim();
    let stem = if name.is_empty() { "untitled" } else { name };
    format!("{}.{}", stem, format.extension())
}

pub fn export_section(
    dir: &Path,
    name: &str,
    content: &str,
    format: ExportFormat,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(name, format));
    std::fs::write(&path, content)?;
    tracing::debug!("Exported {}", path.display());
    Ok(path)
}

/// Write every section of a project into one file, chapter by chapter.
pub fn export_project(dir: &Path, project: &Project, format: ExportFormat) -> Result<PathBuf> {
    let body = match format {
        ExportFormat::Markdown => project
            .sections
            .iter()
            .map(|s| format!("## {}\n\n{}\n\n", s.name, s.content))
            .collect::<String>(),
        ExportFormat::Text => project.sections_context(),
    };
    let content = match format {
        ExportFormat::Markdown => format!("# {}\n\n{}", project.name, body),
        ExportFormat::Text => body,
    };
    export_section(dir, &project.name, &content, format)
}
