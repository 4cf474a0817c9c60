use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::docx::PlaceholderMap;

/// Everything the user supplies for one report.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReportFields {
    pub college_name: String,
    pub affiliation: String,
    pub department: String,
    pub year: String,
    /// One student per line.
    pub students: String,
    pub project_title: String,
    pub professor_name: String,
    pub professor_designation: String,
    pub project_description: String,
}

impl Default for ReportFields {
    fn default() -> Self {
        Self {
            college_name: "ANJUMAN INSTITUTE OF TECHNOLOGY AND MANAGEMENT, BHATKAL".to_string(),
            affiliation: "Affiliated to Visvesvaraya Technological University, Belagavi"
                .to_string(),
            department: "Department of Computer Science and Engineering".to_string(),
            year: "2025 – 2026".to_string(),
            students: "ARZISH (2AB23CS013)\nNAJMA LANKA (2AB23CS055)\nSHURA SHIPAI (2AB23CS070)\nZUHA RUKNUDDIN (2AB23CS083)".to_string(),
            project_title: "MINI PROJECT (BCS586)".to_string(),
            professor_name: "Prof. Syed Nooreain".to_string(),
            professor_designation: "Assistant Professor".to_string(),
            project_description: "A database management system to manage student records, including CRUD, search, and reporting features.".to_string(),
        }
    }
}

impl ReportFields {
    /// Reads a TOML fields file; keys it omits keep their defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read fields: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse fields toml: {}", path.display()))
    }

    pub fn placeholder_map(&self) -> PlaceholderMap {
        [
            ("{COLLEGE_NAME}", self.college_name.clone()),
            ("{AFFILIATION}", self.affiliation.clone()),
            ("{YEAR}", self.year.clone()),
            ("{DEPARTMENT}", self.department.clone()),
            ("{STUDENTS}", normalize_students(&self.students)),
            ("{PROJECT_TITLE}", self.project_title.clone()),
            ("{PROFESSOR_NAME}", self.professor_name.clone()),
            ("{PROFESSOR_DESIGNATION}", self.professor_designation.clone()),
        ]
        .into_iter()
        .collect()
    }
}

pub fn normalize_students(students: &str) -> String {
    students
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn students_are_trimmed_and_blank_lines_dropped() {
        assert_eq!(
            normalize_students("  ARZISH (2AB23CS013) \r\n\n\t\nNAJMA LANKA\n"),
            "ARZISH (2AB23CS013)\nNAJMA LANKA"
        );
        assert_eq!(normalize_students(" \n "), "");
    }

    #[test]
    fn map_covers_all_template_tokens() {
        let map = ReportFields::default().placeholder_map();
        assert_eq!(map.len(), 8);
        assert_eq!(map.get("{PROJECT_TITLE}"), Some("MINI PROJECT (BCS586)"));
        assert_eq!(map.get("{STUDENTS}").map(|s| s.lines().count()), Some(4));
    }

    #[test]
    fn partial_fields_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.toml");
        std::fs::write(
            &path,
            "project_title = \"Smart Parking\"\nstudents = \"\"\"\nA\n\nB\n\"\"\"\n",
        )
        .unwrap();
        let fields = ReportFields::load(&path).unwrap();
        assert_eq!(fields.project_title, "Smart Parking");
        assert_eq!(fields.professor_name, "Prof. Syed Nooreain");
        assert_eq!(fields.placeholder_map().get("{STUDENTS}"), Some("A\nB"));
    }
}
