//! Raw rows to typed records. Every field resolves from an ordered list of
//! normalized header synonyms; the first one carrying a value wins.

use uuid::Uuid;

use super::census::CensusExport;
use super::{ImportContext, RawRow};
use crate::config::MunicipalitySetup;
use crate::model::{
    same_school, EnrollmentStatus, School, SchoolStage, Shift, Student, IMPORTED_SCHOOL_NAME,
};
use crate::text::{digits_only, normalize_key};

const SCHOOL_ID: &[&str] = &["id", "codigo"];
const SCHOOL_INEP: &[&str] = &["inep", "codigo", "codinep"];
const SCHOOL_NAME: &[&str] = &["nome", "name", "escola", "unidade"];
const SCHOOL_ADDRESS: &[&str] = &["endereco", "address", "localizacao"];
const SCHOOL_TYPES: &[&str] = &["tipo", "types", "modalidade"];
const SCHOOL_IMAGE: &[&str] = &["image", "imagem"];
const SCHOOL_RATING: &[&str] = &["rating", "nota", "avaliacao"];
const SCHOOL_SLOTS: &[&str] = &["capacidade", "vagas", "availableslots"];
const LAT: &[&str] = &["lat", "latitude"];
const LNG: &[&str] = &["lng", "longitude"];

const STUDENT_ID: &[&str] = &["id", "matricula", "codigo", "ra"];
const STUDENT_ENROLLMENT_ID: &[&str] = &["enrollmentid", "protocolo", "matricula", "codigomatricula"];
const STUDENT_NAME: &[&str] = &["name", "nome", "nomedoaluno", "aluno"];
const STUDENT_CPF: &[&str] = &["cpf", "doc", "documento"];
const STUDENT_BIRTH: &[&str] = &["birthdate", "nascimento", "datadenascimento", "dtnasc"];
const STUDENT_STATUS: &[&str] = &["status", "situacao"];
const STUDENT_SCHOOL: &[&str] = &["school", "escola", "unidadeescolar", "creche"];
const STUDENT_GRADE: &[&str] = &["grade", "etapa", "serie", "ano"];
const STUDENT_SHIFT: &[&str] = &["shift", "turno", "periodo"];
const STUDENT_CLASS: &[&str] = &["classname", "turma", "nometurma"];
const STUDENT_CLASS_ID: &[&str] = &["classid", "codturma", "codigoturma"];
const STUDENT_TRANSPORT: &[&str] = &["transportrequest", "transport", "transporte", "utilizatransporte"];
const STUDENT_TRANSPORT_TYPE: &[&str] = &["transporttype", "tipotransporte", "veiculo"];
const STUDENT_SPECIAL: &[&str] = &["specialneeds", "deficiencia", "nee", "aee"];

pub const MISSING_ADDRESS: &str = "Endereço não informado";
pub const UNNAMED_STUDENT: &str = "ALUNO SEM NOME";
const DEFAULT_RATING: f64 = 4.5;
const CENSUS_RATING: f64 = 5.0;

/// Decimal with either `.` or `,` as separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `YYYY-MM-DD` becomes `DD/MM/YYYY`; anything else is kept.
pub fn format_date(raw: &str) -> String {
    let raw = raw.trim();
    let parts: Vec<&str> = raw.split('-').collect();
    let is_iso = parts.len() == 3
        && parts[0].len() == 4
        && parts[1].len() == 2
        && parts[2].len() == 2
        && parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()));
    if is_iso {
        format!("{}/{}/{}", parts[2], parts[1], parts[0])
    } else {
        raw.to_string()
    }
}

fn is_yes(raw: Option<&str>) -> bool {
    let Some(raw) = raw else {
        return false;
    };
    let n = normalize_key(raw);
    ["sim", "yes", "true"].iter().any(|k| n.contains(k))
}

fn owned(v: Option<&str>) -> String {
    v.unwrap_or_default().to_string()
}

pub fn map_school(row: &RawRow, setup: &MunicipalitySetup) -> School {
    let rating = row
        .first(SCHOOL_RATING)
        .and_then(parse_number)
        .filter(|r| *r != 0.0)
        .unwrap_or(DEFAULT_RATING);
    let slots = row
        .first(SCHOOL_SLOTS)
        .and_then(parse_number)
        .map(|v| v.trunc() as i64)
        .unwrap_or(0);

    School {
        id: row
            .first(SCHOOL_ID)
            .map(str::to_string)
            .unwrap_or_else(|| format!("school_{}", Uuid::new_v4().simple())),
        inep: owned(row.first(SCHOOL_INEP)),
        name: row.first(SCHOOL_NAME).unwrap_or(IMPORTED_SCHOOL_NAME).to_string(),
        address: row.first(SCHOOL_ADDRESS).unwrap_or(MISSING_ADDRESS).to_string(),
        types: SchoolStage::classify(row.first(SCHOOL_TYPES).unwrap_or_default()),
        image: row
            .first(SCHOOL_IMAGE)
            .map(str::to_string)
            .unwrap_or_else(|| setup.default_school_image.clone()),
        rating,
        available_slots: slots,
        lat: row.first(LAT).and_then(parse_number).unwrap_or(0.0),
        lng: row.first(LNG).and_then(parse_number).unwrap_or(0.0),
    }
}

fn generated_student_id() -> String {
    format!("student_{}", Uuid::new_v4().simple())
}

/// Fills the id and name a backup student record may lack.
pub fn complete_student(mut student: Student) -> Student {
    if student.id.trim().is_empty() {
        student.id = generated_student_id();
    }
    if student.name.trim().is_empty() {
        student.name = UNNAMED_STUDENT.to_string();
    }
    student
}

pub fn map_student(row: &RawRow) -> Student {
    let transport_request = is_yes(row.first(STUDENT_TRANSPORT));
    Student {
        id: row
            .first(STUDENT_ID)
            .map(str::to_string)
            .unwrap_or_else(generated_student_id),
        enrollment_id: owned(row.first(STUDENT_ENROLLMENT_ID)),
        name: row.first(STUDENT_NAME).unwrap_or(UNNAMED_STUDENT).to_uppercase(),
        birth_date: format_date(row.first(STUDENT_BIRTH).unwrap_or_default()),
        cpf: digits_only(row.first(STUDENT_CPF).unwrap_or_default()),
        status: row
            .first(STUDENT_STATUS)
            .map(EnrollmentStatus::parse_lenient)
            .unwrap_or_default(),
        school: owned(row.first(STUDENT_SCHOOL)),
        class_name: owned(row.first(STUDENT_CLASS)),
        class_id: owned(row.first(STUDENT_CLASS_ID)),
        grade: owned(row.first(STUDENT_GRADE)),
        shift: Shift::parse_lenient(row.first(STUDENT_SHIFT).unwrap_or_default()),
        transport_request,
        transport_type: row.first(STUDENT_TRANSPORT_TYPE).map(str::to_string),
        special_needs: is_yes(row.first(STUDENT_SPECIAL)),
        lat: row.first(LAT).and_then(parse_number),
        lng: row.first(LNG).and_then(parse_number),
        history: Vec::new(),
    }
}

/// School record proposed for a census export whose school is not yet
/// registered (neither by name nor by INEP code).
pub fn census_school(export: &CensusExport, ctx: &ImportContext<'_>) -> Option<School> {
    let code = export.school_code.trim();
    let known = ctx.existing_schools.iter().any(|s| {
        same_school(&s.name, &export.school_name)
            || (!code.is_empty() && !s.inep.trim().is_empty() && s.inep.trim() == code)
    });
    if known {
        return None;
    }

    let setup = ctx.setup;
    let municipality = export
        .municipality
        .as_deref()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(&setup.name);
    Some(School {
        id: if code.is_empty() {
            format!("school_{}", Uuid::new_v4().simple())
        } else {
            code.to_string()
        },
        inep: code.to_string(),
        name: export.school_name.clone(),
        address: format!("{} - {}", municipality, setup.state_code),
        types: vec![SchoolStage::EarlyChildhood, SchoolStage::Elementary1],
        image: setup.default_school_image.clone(),
        rating: CENSUS_RATING,
        available_slots: 0,
        lat: setup.center_lat,
        lng: setup.center_lng,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        let mut r = RawRow::default();
        for (k, v) in pairs {
            r.insert(k.to_string(), v.to_string());
        }
        r
    }

    #[test]
    fn school_defaults_fill_missing_fields() {
        let s = map_school(&row(&[("nome", "ESCOLA A"), ("nota", "0")]), &MunicipalitySetup::default());
        assert!(s.id.starts_with("school_"));
        assert_eq!(s.address, MISSING_ADDRESS);
        assert_eq!(s.rating, DEFAULT_RATING);
        assert_eq!(s.types, vec![SchoolStage::EarlyChildhood]);
        assert_eq!(s.available_slots, 0);
        assert_eq!((s.lat, s.lng), (0.0, 0.0));
    }

    #[test]
    fn school_numbers_accept_comma_decimals() {
        let s = map_school(
            &row(&[
                ("codigo", "2938"),
                ("latitude", "-12,5253"),
                ("longitude", "x"),
                ("avaliacao", "4,8"),
                ("vagas", "40"),
                ("modalidade", "Fundamental II"),
            ]),
            &MunicipalitySetup::default(),
        );
        assert_eq!(s.id, "2938");
        assert_eq!(s.inep, "2938");
        assert_eq!(s.lat, -12.5253);
        assert_eq!(s.lng, 0.0);
        assert_eq!(s.rating, 4.8);
        assert_eq!(s.available_slots, 40);
        assert_eq!(s.types, vec![SchoolStage::Elementary2]);
        assert_eq!(s.name, IMPORTED_SCHOOL_NAME);
    }

    #[test]
    fn student_synonyms_and_coercions() {
        let s = map_student(&row(&[
            ("nomedoaluno", "maria clara"),
            ("dtnasc", "2019-03-07"),
            ("documento", "123.456.789-09"),
            ("situacao", "Em análise"),
            ("transporte", "SIM"),
            ("nee", "não"),
            ("turno", "Tarde"),
            ("escola", "CRECHE X"),
            ("turma", "GRUPO 3"),
        ]));
        assert!(s.id.starts_with("student_"));
        assert_eq!(s.name, "MARIA CLARA");
        assert_eq!(s.birth_date, "07/03/2019");
        assert_eq!(s.cpf, "12345678909");
        assert_eq!(s.status, EnrollmentStatus::UnderReview);
        assert!(s.transport_request);
        assert!(!s.special_needs);
        assert_eq!(s.shift, Shift::Afternoon);
        assert_eq!(s.school, "CRECHE X");
        assert_eq!(s.class_name, "GRUPO 3");
    }

    #[test]
    fn student_without_name_gets_placeholder() {
        let s = map_student(&row(&[("matricula", "77"), ("nascimento", "01/02/2020")]));
        assert_eq!(s.id, "77");
        assert_eq!(s.enrollment_id, "77");
        assert_eq!(s.name, UNNAMED_STUDENT);
        assert_eq!(s.birth_date, "01/02/2020");
        assert_eq!(s.status, EnrollmentStatus::Enrolled);
    }

    #[test]
    fn census_school_proposed_only_when_unknown() {
        let setup = MunicipalitySetup::default();
        let export = CensusExport {
            school_name: "CRECHE NOVA".into(),
            school_code: "29001".into(),
            municipality: None,
            students: Vec::new(),
            skipped_rows: 0,
        };
        let ctx = ImportContext {
            existing_schools: &[],
            setup: &setup,
        };
        let s = census_school(&export, &ctx).expect("new school");
        assert_eq!(s.id, "29001");
        assert_eq!(s.address, "Itaberaba - BA");
        assert_eq!(s.rating, CENSUS_RATING);
        assert_eq!(s.types, vec![SchoolStage::EarlyChildhood, SchoolStage::Elementary1]);
        assert_eq!((s.lat, s.lng), (setup.center_lat, setup.center_lng));

        let mut by_code = s.clone();
        by_code.name = "OUTRO NOME".into();
        let known = [by_code];
        let ctx = ImportContext {
            existing_schools: &known,
            setup: &setup,
        };
        assert!(census_school(&export, &ctx).is_none());

        let mut by_name = s;
        by_name.inep = String::new();
        by_name.name = " creche nova ".into();
        let known = [by_name];
        let ctx = ImportContext {
            existing_schools: &known,
            setup: &setup,
        };
        assert!(census_school(&export, &ctx).is_none());
    }

    #[test]
    fn iso_dates_reorder() {
        assert_eq!(format_date("2020-12-31"), "31/12/2020");
        assert_eq!(format_date("31/12/2020"), "31/12/2020");
        assert_eq!(format_date("2020-1-3"), "2020-1-3");
    }
}
