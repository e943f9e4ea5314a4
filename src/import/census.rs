//! Educacenso student listing ("Relação de alunos") exported as `;` text.
//!
//! The export starts with free-form metadata lines (`Nome da escola:;X`),
//! then a header row, then one positional row per student.

use crate::model::{EnrollmentStatus, Shift, Student};

const MINISTRY_MARKER: &str = "Ministério da Educação";
const CENSUS_MARKER: &str = "Educacenso";
const HEADER_ID: &str = "Identificação única";
const HEADER_NAME: &str = "Nome";

const LABEL_SCHOOL_NAME: &str = "Nome da escola";
const LABEL_SCHOOL_CODE: &str = "Código da escola";
const LABEL_MUNICIPALITY: &str = "Município";

const COL_ID: usize = 2;
const COL_NAME: usize = 4;
const COL_BIRTH_DATE: usize = 7;
const COL_CPF: usize = 9;
const COL_SPECIAL_NEEDS: usize = 15;
const COL_TRANSPORT: usize = 22;
const COL_ENROLLMENT_ID: usize = 26;
const COL_CLASS_ID: usize = 27;
const COL_CLASS_NAME: usize = 28;
const COL_GRADE_ALT: usize = 30;
const COL_GRADE: usize = 31;
const COL_SCHEDULE: usize = 34;

pub const DEFAULT_SCHOOL_NAME: &str = "Escola Municipal";
pub const CENSUS_TRANSPORT_TYPE: &str = "Vans/Kombis";

#[derive(Debug, Clone)]
pub struct CensusExport {
    pub school_name: String,
    pub school_code: String,
    pub municipality: Option<String>,
    pub students: Vec<Student>,
    pub skipped_rows: usize,
}

fn is_header(line: &str) -> bool {
    line.contains(HEADER_ID) && line.contains(HEADER_NAME)
}

pub fn looks_like_census(text: &str) -> bool {
    text.contains(MINISTRY_MARKER)
        || text.contains(CENSUS_MARKER)
        || text.lines().any(is_header)
}

/// Value of a `Label:;;value` metadata line: the first non-empty cell that
/// is not the label itself.
fn metadata_value(line: &str, label: &str) -> Option<String> {
    line.split(';')
        .map(str::trim)
        .find(|p| !p.is_empty() && !p.contains(label))
        .map(str::to_string)
}

pub fn infer_shift(schedule: &str, class_name: &str) -> Shift {
    let schedule = schedule.to_lowercase();
    if schedule.contains("13:00") || class_name.contains("VESPERTINO") {
        Shift::Afternoon
    } else if (schedule.contains("08:00") && !schedule.contains("17:00"))
        || class_name.contains("MATUTINO")
    {
        Shift::Morning
    } else {
        Shift::FullDay
    }
}

pub fn parse_census(text: &str) -> CensusExport {
    let mut export = CensusExport {
        school_name: DEFAULT_SCHOOL_NAME.to_string(),
        school_code: String::new(),
        municipality: None,
        students: Vec::new(),
        skipped_rows: 0,
    };
    let mut in_body = false;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if !in_body {
            if line.contains(&format!("{LABEL_SCHOOL_NAME}:")) {
                if let Some(v) = metadata_value(line, LABEL_SCHOOL_NAME) {
                    export.school_name = v;
                }
            }
            if line.contains(&format!("{LABEL_SCHOOL_CODE}:")) {
                if let Some(v) = metadata_value(line, LABEL_SCHOOL_CODE) {
                    export.school_code = v;
                }
            }
            if line.contains(&format!("{LABEL_MUNICIPALITY}:")) {
                if let Some(v) = metadata_value(line, LABEL_MUNICIPALITY) {
                    export.municipality = Some(v);
                }
            }
            if is_header(line) {
                in_body = true;
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = line.split(';').map(str::trim).collect();
        let col = |i: usize| cols.get(i).copied().unwrap_or("");
        let id = col(COL_ID);
        let name = col(COL_NAME);
        if id.is_empty() || name.is_empty() {
            export.skipped_rows += 1;
            continue;
        }

        let class_name = col(COL_CLASS_NAME);
        let transport = col(COL_TRANSPORT).to_lowercase() == "sim";
        let special = col(COL_SPECIAL_NEEDS);
        let grade = if col(COL_GRADE).is_empty() {
            col(COL_GRADE_ALT)
        } else {
            col(COL_GRADE)
        };

        export.students.push(Student {
            id: id.to_string(),
            enrollment_id: col(COL_ENROLLMENT_ID).to_string(),
            name: name.to_uppercase(),
            birth_date: col(COL_BIRTH_DATE).to_string(),
            cpf: col(COL_CPF).to_string(),
            status: EnrollmentStatus::Enrolled,
            school: export.school_name.clone(),
            class_name: class_name.to_string(),
            class_id: col(COL_CLASS_ID).to_string(),
            grade: grade.to_string(),
            shift: infer_shift(col(COL_SCHEDULE), class_name),
            transport_request: transport,
            transport_type: transport.then(|| CENSUS_TRANSPORT_TYPE.to_string()),
            special_needs: !special.is_empty() && special != "--",
            ..Default::default()
        });
    }
    export
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a census data row with the given cells at their column index.
    pub(crate) fn census_row(cells: &[(usize, &str)]) -> String {
        let mut cols = vec![String::new(); 36];
        for (i, v) in cells {
            cols[*i] = v.to_string();
        }
        cols.join(";")
    }

    pub(crate) fn census_header() -> String {
        census_row(&[(2, "Identificação única"), (4, "Nome")])
    }

    #[test]
    fn minimal_excerpt_yields_one_student_at_named_school() {
        let text = format!(
            "Nome da escola:;ESCOLA TESTE\n{}\n{}\n",
            census_header(),
            census_row(&[(2, "123"), (4, "Ana Souza")])
        );
        assert!(looks_like_census(&text));
        let export = parse_census(&text);
        assert_eq!(export.students.len(), 1);
        assert_eq!(export.students[0].school, "ESCOLA TESTE");
        assert_eq!(export.students[0].name, "ANA SOUZA");
        assert_eq!(export.students[0].status, EnrollmentStatus::Enrolled);
    }

    #[test]
    fn metadata_and_full_row() {
        let text = format!(
            "Ministério da Educação;;\nEducacenso 2024\nNome da escola:;;CRECHE SOL;\nCódigo da escola:;29000001\nMunicípio:;Itaberaba\n{}\n{}\n{}\n\n",
            census_header(),
            census_row(&[
                (2, "555"),
                (4, "Bruno Lima"),
                (7, "01/02/2020"),
                (9, "123.456.789-09"),
                (15, "Autismo"),
                (22, "Sim"),
                (26, "M-1"),
                (27, "T9"),
                (28, "GRUPO 4 VESPERTINO"),
                (30, "Pré-escola"),
                (34, "13:00 - 17:00"),
            ]),
            census_row(&[(2, ""), (4, "Sem Id")]),
        );
        let export = parse_census(&text);
        assert_eq!(export.school_name, "CRECHE SOL");
        assert_eq!(export.school_code, "29000001");
        assert_eq!(export.municipality.as_deref(), Some("Itaberaba"));
        assert_eq!(export.skipped_rows, 1);
        let s = &export.students[0];
        assert_eq!(s.birth_date, "01/02/2020");
        assert!(s.special_needs);
        assert!(s.transport_request);
        assert_eq!(s.transport_type.as_deref(), Some(CENSUS_TRANSPORT_TYPE));
        assert_eq!(s.grade, "Pré-escola");
        assert_eq!(s.shift, Shift::Afternoon);
        assert_eq!(s.class_id, "T9");
        assert_eq!(s.enrollment_id, "M-1");
    }

    #[test]
    fn shift_inference() {
        assert_eq!(infer_shift("07:30 - 08:00 - 11:30", "1 ANO"), Shift::Morning);
        assert_eq!(infer_shift("08:00 - 17:00", "GRUPO 3"), Shift::FullDay);
        assert_eq!(infer_shift("", "GRUPO 3 MATUTINO"), Shift::Morning);
        assert_eq!(infer_shift("", ""), Shift::FullDay);
    }

    #[test]
    fn special_needs_placeholder_is_no() {
        let text = format!("{}\n{}\n", census_header(), census_row(&[(2, "1"), (4, "X"), (15, "--")]));
        let export = parse_census(&text);
        assert!(!export.students[0].special_needs);
        assert_eq!(export.school_name, DEFAULT_SCHOOL_NAME);
    }
}
