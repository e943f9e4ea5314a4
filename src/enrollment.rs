//! Public enrollment wizard: field masks, CPF checksum, per-step validation,
//! distance ranking of schools and the final submission.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::MunicipalitySetup;
use crate::import::mapper::format_date;
use crate::model::{EnrollmentStatus, HistoryEntry, School, Shift, Student, UNALLOCATED_SCHOOL};
use crate::text::digits_only;

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = 4;
pub const PENDING_GRADE: &str = "Definição Pendente";
pub const DEFAULT_LOCATION_ADVISORY: &str = "Usando localização padrão aproximada.";
const EARTH_RADIUS_KM: f64 = 6371.0;

/// `true` when `raw` holds eleven digits (mask ignored) with both check
/// digits correct. Repeated-digit sequences are rejected.
pub fn is_valid_cpf(raw: &str) -> bool {
    let d: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if d.len() != 11 || d.iter().all(|x| *x == d[0]) {
        return false;
    }
    let check = |n: usize| -> u32 {
        let sum: u32 = (0..n).map(|i| d[i] * (n as u32 + 1 - i as u32)).sum();
        match 11 - sum % 11 {
            10 | 11 => 0,
            v => v,
        }
    };
    check(9) == d[9] && check(10) == d[10]
}

/// Progressive `000.000.000-00` mask over the digits typed so far.
pub fn format_cpf(raw: &str) -> String {
    let digits: Vec<char> = digits_only(raw).chars().take(11).collect();
    let mut out = String::with_capacity(14);
    for (i, c) in digits.iter().enumerate() {
        match i {
            3 | 6 => out.push('.'),
            9 => out.push('-'),
            _ => {}
        }
        out.push(*c);
    }
    out
}

/// Progressive `00000-000` mask.
pub fn format_cep(raw: &str) -> String {
    let digits: Vec<char> = digits_only(raw).chars().take(8).collect();
    let mut out = String::with_capacity(9);
    for (i, c) in digits.iter().enumerate() {
        if i == 5 {
            out.push('-');
        }
        out.push(*c);
    }
    out
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentForm {
    pub full_name: String,
    /// `YYYY-MM-DD` as produced by a date input.
    pub birth_date: String,
    pub cpf: String,
    pub needs_special_education: bool,
    pub special_education_details: String,
    pub needs_transport: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardianForm {
    pub full_name: String,
    pub cpf: String,
    pub email: String,
    pub phone: String,
    pub relationship: String,
}

impl Default for GuardianForm {
    fn default() -> Self {
        GuardianForm {
            full_name: String::new(),
            cpf: String::new(),
            email: String::new(),
            phone: String::new(),
            relationship: "Mãe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressForm {
    pub street: String,
    pub number: String,
    pub neighborhood: String,
    pub city: String,
    pub zip_code: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl AddressForm {
    /// Both coordinates, when set and non-zero.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat != 0.0 && lng != 0.0 => Some((lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrollmentForm {
    pub step: u8,
    pub student: StudentForm,
    pub guardian: GuardianForm,
    pub address: AddressForm,
    pub selected_school_id: Option<String>,
}

impl Default for EnrollmentForm {
    fn default() -> Self {
        EnrollmentForm {
            step: FIRST_STEP,
            student: StudentForm::default(),
            guardian: GuardianForm::default(),
            address: AddressForm::default(),
            selected_school_id: None,
        }
    }
}

impl EnrollmentForm {
    pub fn new(setup: &MunicipalitySetup) -> Self {
        let mut form = EnrollmentForm::default();
        form.address.city = setup.name.clone();
        form
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

fn field_error(field: &'static str, message: &str) -> FieldError {
    FieldError {
        field,
        message: message.to_string(),
    }
}

#[derive(Debug, Clone, Error)]
#[error("{}", .fields.iter().map(|f| f.message.as_str()).collect::<Vec<_>>().join("; "))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

fn student_cpf_errors(form: &EnrollmentForm, out: &mut Vec<FieldError>) {
    let cpf = form.student.cpf.trim();
    if !cpf.is_empty() && !is_valid_cpf(cpf) {
        out.push(field_error("studentCpf", "CPF do aluno inválido."));
    }
}

fn guardian_cpf_errors(form: &EnrollmentForm, out: &mut Vec<FieldError>) {
    if digits_only(&form.guardian.cpf).is_empty() {
        out.push(field_error("guardianCpf", "O CPF do responsável é obrigatório."));
    } else if !is_valid_cpf(&form.guardian.cpf) {
        out.push(field_error("guardianCpf", "CPF do responsável inválido."));
    }
}

/// Field errors blocking `step`. Step 3 never blocks; missing coordinates
/// are filled in by [`advance`].
pub fn validate_step(form: &EnrollmentForm, step: u8) -> Vec<FieldError> {
    let mut errors = Vec::new();
    match step {
        1 => {
            if form.student.full_name.trim().is_empty() {
                errors.push(field_error("studentName", "Informe o nome completo do aluno."));
            }
            if form.student.birth_date.trim().is_empty() {
                errors.push(field_error("studentBirthDate", "Informe a data de nascimento do aluno."));
            }
            student_cpf_errors(form, &mut errors);
        }
        2 => {
            guardian_cpf_errors(form, &mut errors);
            if form.guardian.full_name.trim().is_empty() {
                errors.push(field_error("guardianName", "O nome do responsável é obrigatório."));
            }
        }
        _ => {}
    }
    errors
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Advance {
    pub form: EnrollmentForm,
    pub advisories: Vec<String>,
}

/// Validates the current step and moves to the next one.
pub fn advance(mut form: EnrollmentForm, setup: &MunicipalitySetup) -> Result<Advance, ValidationError> {
    let fields = validate_step(&form, form.step);
    if !fields.is_empty() {
        return Err(ValidationError { fields });
    }
    let mut advisories = Vec::new();
    if form.step == 3 && form.address.coordinates().is_none() {
        form.address.lat = Some(setup.center_lat);
        form.address.lng = Some(setup.center_lng);
        advisories.push(DEFAULT_LOCATION_ADVISORY.to_string());
    }
    form.step = (form.step.max(FIRST_STEP) + 1).min(LAST_STEP);
    Ok(Advance { form, advisories })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSchool {
    #[serde(flatten)]
    pub school: School,
    pub distance_km: Option<f64>,
}

/// Schools nearest first. Without coordinates the registry order is kept
/// and no distance is reported.
pub fn rank_schools(schools: &[School], origin: Option<(f64, f64)>) -> Vec<RankedSchool> {
    let mut out: Vec<RankedSchool> = schools
        .iter()
        .map(|s| RankedSchool {
            school: s.clone(),
            distance_km: origin.map(|(lat, lng)| haversine_km(lat, lng, s.lat, s.lng)),
        })
        .collect();
    if origin.is_some() {
        out.sort_by(|a, b| {
            a.distance_km
                .unwrap_or(f64::MAX)
                .total_cmp(&b.distance_km.unwrap_or(f64::MAX))
        });
    }
    out
}

fn protocol_number() -> u32 {
    let bytes = Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) % 100_000
}

/// Re-validates both CPFs and builds the Under Review student the request
/// becomes. The caller stores it.
pub fn submit(form: &EnrollmentForm, schools: &[School]) -> Result<Student, ValidationError> {
    let mut fields = validate_step(form, 1);
    guardian_cpf_errors(form, &mut fields);
    if !fields.is_empty() {
        return Err(ValidationError { fields });
    }

    let school = form
        .selected_school_id
        .as_deref()
        .and_then(|id| schools.iter().find(|s| s.id == id));
    let (lat, lng) = match form.address.coordinates() {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };

    Ok(Student {
        id: format!("web_{}", Uuid::new_v4().simple()),
        enrollment_id: format!("PROT-{}", protocol_number()),
        name: form.student.full_name.trim().to_uppercase(),
        birth_date: format_date(&form.student.birth_date),
        cpf: form.student.cpf.trim().to_string(),
        status: EnrollmentStatus::UnderReview,
        school: school.map_or_else(|| UNALLOCATED_SCHOOL.to_string(), |s| s.name.clone()),
        grade: PENDING_GRADE.to_string(),
        shift: Shift::Pending,
        transport_request: form.student.needs_transport,
        special_needs: form.student.needs_special_education,
        lat,
        lng,
        history: vec![HistoryEntry::now(
            "Solicitação de matrícula enviada",
            form.guardian.full_name.trim(),
        )],
        ..Default::default()
    })
}
