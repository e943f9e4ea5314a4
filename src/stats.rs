//! Read-only views over the registry: dashboard counters, class groups, the
//! public school catalog and the per-school student panel.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::MunicipalitySetup;
use crate::enrollment::haversine_km;
use crate::model::{
    same_school, school_key, EnrollmentStatus, School, SchoolStage, Student, UNALLOCATED_SCHOOL,
};
use crate::text::digits_only;

pub const NO_CLASS: &str = "Sem Turma";
pub const NO_VALUE: &str = "-";
const TOP_SCHOOLS: usize = 5;
const BACKUP_MAX_AGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub enrolled: usize,
    pub pending: usize,
    pub under_review: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabeledCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub total_schools: usize,
    pub status: StatusCounts,
    pub schools_by_stage: Vec<LabeledCount>,
    pub special_needs: usize,
    pub transport: usize,
    pub top_schools: Vec<LabeledCount>,
    pub total_capacity: i64,
    pub occupancy_rate: f64,
    pub unallocated: usize,
    pub backup_needed: bool,
}

/// True when there never was a backup, the timestamp is unreadable, or it
/// is more than a day old.
pub fn backup_needed(last_backup: Option<&str>, now: chrono::DateTime<chrono::Utc>) -> bool {
    let Some(raw) = last_backup else {
        return true;
    };
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(t) => now.signed_duration_since(t.with_timezone(&chrono::Utc)).num_minutes()
            > BACKUP_MAX_AGE_HOURS * 60,
        Err(_) => true,
    }
}

pub fn dashboard(
    schools: &[School],
    students: &[Student],
    last_backup: Option<&str>,
    now: chrono::DateTime<chrono::Utc>,
) -> DashboardStats {
    let count_status = |st: EnrollmentStatus| students.iter().filter(|s| s.status == st).count();

    let mut per_stage: BTreeMap<SchoolStage, usize> = BTreeMap::new();
    for s in schools {
        for t in &s.types {
            *per_stage.entry(*t).or_default() += 1;
        }
    }

    // Insertion order breaks ties so the ranking is stable. The first
    // spelling seen labels the school.
    let mut per_school: Vec<(String, usize)> = Vec::new();
    for s in students.iter().filter(|s| !s.is_unallocated()) {
        match per_school.iter_mut().find(|(name, _)| same_school(name, &s.school)) {
            Some((_, n)) => *n += 1,
            None => per_school.push((s.school.trim().to_string(), 1)),
        }
    }
    per_school.sort_by(|a, b| b.1.cmp(&a.1));

    let total_capacity: i64 = schools.iter().map(|s| s.available_slots.max(0)).sum();
    let occupancy_rate = if total_capacity > 0 {
        students.len() as f64 / total_capacity as f64 * 100.0
    } else {
        0.0
    };

    DashboardStats {
        total_students: students.len(),
        total_schools: schools.len(),
        status: StatusCounts {
            enrolled: count_status(EnrollmentStatus::Enrolled),
            pending: count_status(EnrollmentStatus::Pending),
            under_review: count_status(EnrollmentStatus::UnderReview),
        },
        schools_by_stage: per_stage
            .into_iter()
            .map(|(stage, count)| LabeledCount {
                label: stage.as_str().to_string(),
                count,
            })
            .collect(),
        special_needs: students.iter().filter(|s| s.special_needs).count(),
        transport: students.iter().filter(|s| s.transport_request).count(),
        top_schools: per_school
            .into_iter()
            .take(TOP_SCHOOLS)
            .map(|(label, count)| LabeledCount { label, count })
            .collect(),
        total_capacity,
        occupancy_rate,
        unallocated: students.iter().filter(|s| s.is_unallocated()).count(),
        backup_needed: backup_needed(last_backup, now),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub school: String,
    pub class_name: String,
    pub grade: String,
    pub shift: String,
    pub count: usize,
}

fn or_default(v: &str, default: &str) -> String {
    if v.trim().is_empty() {
        default.to_string()
    } else {
        v.to_string()
    }
}

/// Display school and class of a student, with the placeholders used by
/// class groups and rosters.
pub fn class_key(s: &Student) -> (String, String) {
    (
        or_default(&s.school, UNALLOCATED_SCHOOL),
        or_default(&s.class_name, NO_CLASS),
    )
}

/// Students grouped by (school, class); school names compare as in
/// [`same_school`], and grade, shift and school spelling come from the first
/// member. Sorted by school, then class.
pub fn class_groups<'a>(students: impl IntoIterator<Item = &'a Student>) -> Vec<ClassGroup> {
    let mut groups: Vec<ClassGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    for s in students {
        let (school, class_name) = class_key(s);
        let key = (school_key(&school), class_name.clone());
        match index.get(&key) {
            Some(&i) => groups[i].count += 1,
            None => {
                index.insert(key, groups.len());
                groups.push(ClassGroup {
                    id: format!("{}_{}", s.school, s.class_name),
                    school: school.trim().to_string(),
                    class_name,
                    grade: or_default(&s.grade, NO_VALUE),
                    shift: or_default(s.shift.as_str(), NO_VALUE),
                    count: 1,
                });
            }
        }
    }
    groups.sort_by(|a, b| {
        a.school
            .to_lowercase()
            .cmp(&b.school.to_lowercase())
            .then_with(|| a.class_name.to_lowercase().cmp(&b.class_name.to_lowercase()))
    });
    groups
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogSort {
    Name,
    Rating,
    Distance,
}

impl CatalogSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "rating" => Some(Self::Rating),
            "distance" => Some(Self::Distance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub school: School,
    pub distance_km: f64,
    pub enrolled: usize,
}

pub fn school_catalog(
    schools: &[School],
    students: &[Student],
    setup: &MunicipalitySetup,
    text: &str,
    stage: Option<SchoolStage>,
    sort: CatalogSort,
) -> Vec<CatalogEntry> {
    let needle = text.trim().to_lowercase();
    let mut out: Vec<CatalogEntry> = schools
        .iter()
        .filter(|s| {
            needle.is_empty()
                || s.name.to_lowercase().contains(&needle)
                || s.address.to_lowercase().contains(&needle)
        })
        .filter(|s| stage.map_or(true, |st| s.types.contains(&st)))
        .map(|s| CatalogEntry {
            school: s.clone(),
            distance_km: haversine_km(setup.center_lat, setup.center_lng, s.lat, s.lng),
            enrolled: students.iter().filter(|st| same_school(&st.school, &s.name)).count(),
        })
        .collect();

    match sort {
        CatalogSort::Name => out.sort_by(|a, b| {
            a.school
                .name
                .to_lowercase()
                .cmp(&b.school.name.to_lowercase())
        }),
        CatalogSort::Rating => out.sort_by(|a, b| b.school.rating.total_cmp(&a.school.rating)),
        CatalogSort::Distance => out.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km)),
    }
    out
}

#[derive(Debug, Clone, Default)]
pub struct DetailFilter {
    /// Name or enrollment id substring, or CPF digits.
    pub text: String,
    pub cpf: String,
    pub status: Option<EnrollmentStatus>,
    pub class_name: Option<String>,
}

/// Digits of `term` when it reads as a CPF fragment (digits with mask
/// punctuation only).
fn cpf_term(term: &str) -> Option<String> {
    let masked = term
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | ' '));
    let digits = digits_only(term);
    (masked && !digits.is_empty()).then_some(digits)
}

impl DetailFilter {
    fn matches(&self, s: &Student) -> bool {
        let term = self.text.trim().to_lowercase();
        let cpf = s.cpf_digits();
        let text_ok = term.is_empty()
            || s.name.to_lowercase().contains(&term)
            || s.enrollment_id.to_lowercase().contains(&term)
            || cpf_term(&term).is_some_and(|d| cpf.contains(&d));
        let wanted_cpf = digits_only(&self.cpf);
        let cpf_ok = wanted_cpf.is_empty() || cpf.contains(&wanted_cpf);
        let status_ok = self.status.map_or(true, |st| s.status == st);
        let class_ok = self
            .class_name
            .as_deref()
            .map_or(true, |c| s.class_name == c);
        text_ok && cpf_ok && status_ok && class_ok
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolDetail {
    pub school: School,
    pub total_students: usize,
    pub classes: Vec<String>,
    pub students: Vec<Student>,
    pub class_groups: Vec<LabeledCount>,
}

pub fn school_detail(school: &School, students: &[Student], filter: &DetailFilter) -> SchoolDetail {
    let own: Vec<&Student> = students
        .iter()
        .filter(|s| same_school(&s.school, &school.name))
        .collect();

    let mut classes: Vec<String> = own
        .iter()
        .map(|s| s.class_name.clone())
        .filter(|c| !c.is_empty())
        .collect();
    classes.sort();
    classes.dedup();

    let mut per_class: BTreeMap<String, usize> = BTreeMap::new();
    for s in &own {
        *per_class
            .entry(or_default(&s.class_name, "Sem Turma Definida"))
            .or_default() += 1;
    }

    SchoolDetail {
        school: school.clone(),
        total_students: own.len(),
        classes,
        students: own
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| (*s).clone())
            .collect(),
        class_groups: per_class
            .into_iter()
            .map(|(label, count)| LabeledCount { label, count })
            .collect(),
    }
}
