//! Spreadsheet-friendly CSV exports and the JSON backup document.
//!
//! CSV output is what Excel in a pt-BR locale opens cleanly: UTF-8 with a
//! byte-order mark, `;` separators, CRLF line ends, every cell quoted.

use anyhow::Context;
use std::path::Path;

use crate::backup::RegistryDocument;
use crate::model::{same_school, Student};
use crate::stats::{class_key, ClassGroup};

const BOM: &str = "\u{feff}";
const SEP: &str = ";";
const EOL: &str = "\r\n";

pub const STUDENT_HEADERS: [&str; 13] = [
    "ID",
    "Nome",
    "CPF",
    "Data de Nascimento",
    "Status",
    "Escola",
    "Turma",
    "Etapa",
    "Turno",
    "Protocolo",
    "Transporte",
    "Deficiência",
    "Histórico",
];

pub const ROSTER_HEADERS: [&str; 7] = [
    "Nome do Aluno",
    "Matrícula",
    "Data de Nascimento",
    "CPF",
    "Status",
    "Transporte",
    "Deficiência",
];

pub const SUMMARY_HEADERS: [&str; 5] = ["Escola", "Turma", "Etapa", "Turno", "Alunos"];

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "Sim"
    } else {
        "Não"
    }
}

/// Header row plus data rows, quoted and joined.
pub fn write_csv<I, R>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut lines: Vec<String> = vec![headers.iter().map(|h| quote(h)).collect::<Vec<_>>().join(SEP)];
    for row in rows {
        lines.push(row.into_iter().map(|c| quote(&c)).collect::<Vec<_>>().join(SEP));
    }
    format!("{BOM}{}", lines.join(EOL))
}

fn history_cell(s: &Student) -> String {
    s.history
        .iter()
        .map(|h| format!("{} - {} ({})", h.date, h.action, h.user))
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn students_csv<'a>(students: impl IntoIterator<Item = &'a Student>) -> String {
    let rows = students.into_iter().map(|s| {
        vec![
            s.id.clone(),
            s.name.clone(),
            s.cpf.clone(),
            s.birth_date.clone(),
            s.status.to_string(),
            class_key(s).0,
            s.class_name.clone(),
            s.grade.clone(),
            s.shift.to_string(),
            s.enrollment_id.clone(),
            yes_no(s.transport_request).to_string(),
            yes_no(s.special_needs).to_string(),
            history_cell(s),
        ]
    });
    write_csv(&STUDENT_HEADERS, rows)
}

/// Roster of one (school, class) pair as shown in class groups. `None`
/// when the class has no students.
pub fn class_roster_csv(students: &[Student], school: &str, class_name: &str) -> Option<String> {
    let mut members: Vec<&Student> = students
        .iter()
        .filter(|s| {
            let (sc, cl) = class_key(s);
            same_school(&sc, school) && cl == class_name
        })
        .collect();
    if members.is_empty() {
        return None;
    }
    members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    let rows = members.into_iter().map(|s| {
        vec![
            s.name.clone(),
            s.enrollment_id.clone(),
            s.birth_date.clone(),
            s.cpf.clone(),
            s.status.to_string(),
            yes_no(s.transport_request).to_string(),
            yes_no(s.special_needs).to_string(),
        ]
    });
    Some(write_csv(&ROSTER_HEADERS, rows))
}

pub fn class_summary_csv(groups: &[ClassGroup]) -> String {
    let rows = groups.iter().map(|g| {
        vec![
            g.school.clone(),
            g.class_name.clone(),
            g.grade.clone(),
            g.shift.clone(),
            g.count.to_string(),
        ]
    });
    write_csv(&SUMMARY_HEADERS, rows)
}

/// Download-style file name for a class roster.
pub fn roster_file_name(class_name: &str) -> String {
    let safe: String = class_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("Lista_{safe}.csv")
}

pub fn backup_json(doc: &RegistryDocument) -> anyhow::Result<String> {
    serde_json::to_string_pretty(doc).context("failed to serialize backup")
}

pub fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{demo_students, DEMO_CRECHE};
    use crate::import::delimited::parse_delimited;
    use crate::import::mapper::map_student;
    use crate::model::HistoryEntry;
    use crate::stats::class_groups;

    #[test]
    fn csv_shape() {
        let out = write_csv(&["A", "B"], vec![vec!["x;y".to_string(), "diz \"oi\"".to_string()]]);
        assert_eq!(out, "\u{feff}\"A\";\"B\"\r\n\"x;y\";\"diz \"\"oi\"\"\"");
    }

    #[test]
    fn student_export_reimports() {
        let mut students = demo_students();
        students[0].history.push(HistoryEntry {
            date: "01/02/2024 09:00".into(),
            action: "Cadastro".into(),
            user: "admin".into(),
        });
        students[1].name = "MARIA\nOLIVEIRA".into();
        let csv = students_csv(&students);
        assert!(csv.contains("01/02/2024 09:00 - Cadastro (admin)"));

        let rows = parse_delimited(csv.trim_start_matches('\u{feff}'));
        assert_eq!(rows.len(), students.len());
        for (row, original) in rows.iter().zip(&students) {
            let back = map_student(row);
            assert_eq!(back.id, original.id);
            assert_eq!(back.name, original.name);
            assert_eq!(back.cpf, original.cpf_digits());
            assert_eq!(back.status, original.status);
            assert_eq!(back.school, original.school);
            assert_eq!(back.class_name, original.class_name);
            assert_eq!(back.shift, original.shift);
            assert_eq!(back.enrollment_id, original.enrollment_id);
            assert_eq!(back.transport_request, original.transport_request);
            assert_eq!(back.special_needs, original.special_needs);
        }
    }

    #[test]
    fn roster_is_sorted_by_name() {
        let students = demo_students();
        let csv = class_roster_csv(&students, DEMO_CRECHE, "GRUPO 3 B").expect("roster");
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("\"BEATRIZ ROCHA\""));
        assert!(lines[3].starts_with("\"JULIA LIMA\""));
        assert!(class_roster_csv(&students, DEMO_CRECHE, "NADA").is_none());
        assert_eq!(
            class_roster_csv(&students, "creche paraiso da crianca ", "GRUPO 3 B").as_deref(),
            Some(csv.as_str())
        );
        assert_eq!(roster_file_name("1º ANO A"), "Lista_1__ANO_A.csv");
    }

    #[test]
    fn summary_lists_groups() {
        let students = demo_students();
        let csv = class_summary_csv(&class_groups(&students));
        assert_eq!(csv.split("\r\n").count(), 6);
        assert!(csv.contains("\"Não alocada\";\"Sem Turma\""));
    }
}
