//! Approximate name matching and the student search filter.

use crate::model::{same_school, EnrollmentStatus, Student};
use crate::text::{digits_only, normalize_for_fuzzy};

/// Minimum number of single-character insertions, deletions or
/// substitutions turning `a` into `b`.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Rows walk `b`, columns walk `a`; only the previous row is kept.
    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut cur: Vec<usize> = vec![0; a.len() + 1];
    for i in 1..=b.len() {
        cur[0] = i;
        for j in 1..=a.len() {
            cur[j] = if b[i - 1] == a[j - 1] {
                prev[j - 1]
            } else {
                1 + prev[j - 1].min(cur[j - 1]).min(prev[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[a.len()]
}

/// Errors tolerated for a whole-string match: one per four characters,
/// capped at three.
pub fn fuzzy_threshold(query_len: usize) -> usize {
    (query_len / 4 + 1).min(3)
}

/// Both inputs must already be in [`normalize_for_fuzzy`] form.
pub fn fuzzy_accepts(query: &str, candidate: &str) -> bool {
    let query_len = query.chars().count();
    if distance(query, candidate) <= fuzzy_threshold(query_len) {
        return true;
    }
    if query.split(' ').count() == 1 {
        return candidate.split(' ').any(|part| distance(query, part) <= 1);
    }
    false
}

/// Equality filter where `None` means "all".
pub type EqFilter = Option<String>;

/// Sentinel spellings accepted for "no filter".
pub fn parse_eq_filter(raw: Option<&str>) -> EqFilter {
    let t = raw?.trim();
    if t.is_empty()
        || t.eq_ignore_ascii_case("all")
        || t.eq_ignore_ascii_case("todas")
        || t.eq_ignore_ascii_case("todos")
    {
        None
    } else {
        Some(t.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentQuery {
    pub text: String,
    pub school: EqFilter,
    pub status: Option<EnrollmentStatus>,
    pub class_name: EqFilter,
}

impl StudentQuery {
    pub fn text(text: impl Into<String>) -> Self {
        StudentQuery {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn matches(&self, student: &Student) -> bool {
        let school_ok = self.school.as_deref().map_or(true, |s| same_school(&student.school, s));
        let status_ok = self.status.map_or(true, |s| student.status == s);
        let class_ok = self
            .class_name
            .as_deref()
            .map_or(true, |c| student.class_name == c);
        school_ok && status_ok && class_ok && self.matches_text(student)
    }

    fn matches_text(&self, student: &Student) -> bool {
        let query = normalize_for_fuzzy(&self.text);
        if query.is_empty() {
            return true;
        }
        let name = normalize_for_fuzzy(&student.name);
        if name.contains(&query) {
            return true;
        }
        let raw = self.text.trim();
        if raw.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | ' ')) {
            let wanted = digits_only(raw);
            if !wanted.is_empty() && student.cpf_digits().contains(&wanted) {
                return true;
            }
        }
        if normalize_for_fuzzy(&student.school).contains(&query) {
            return true;
        }
        query.chars().count() > 2
            && !query.chars().any(|c| c.is_ascii_digit())
            && fuzzy_accepts(&query, &name)
    }
}

/// Students satisfying every condition of `query`, in registry order.
pub fn filter_students<'a>(students: &'a [Student], query: &StudentQuery) -> Vec<&'a Student> {
    students.iter().filter(|s| query.matches(s)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Case-insensitive sort on a wire column name (`name`, `school`, ...).
/// Unknown columns leave the order untouched.
pub fn sort_students(students: &mut [&Student], column: &str, direction: SortDirection) {
    let key = |s: &Student| -> Option<String> {
        let v = match column {
            "id" => s.id.clone(),
            "name" => s.name.clone(),
            "cpf" => s.cpf.clone(),
            "birthDate" => s.birth_date.clone(),
            "status" => s.status.as_str().to_string(),
            "school" => s.school.clone(),
            "className" => s.class_name.clone(),
            "grade" => s.grade.clone(),
            "shift" => s.shift.as_str().to_string(),
            "enrollmentId" => s.enrollment_id.clone(),
            _ => return None,
        };
        Some(v.to_lowercase())
    };
    students.sort_by(|a, b| {
        let ord = key(a).cmp(&key(b));
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// One 1-based page of a result list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total: usize,
}

/// Out-of-range pages clamp to the nearest valid one.
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let page_count = total.div_ceil(page_size).max(1);
    let page = page.clamp(1, page_count);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(total);
    Page {
        items: items[start.min(total)..end].to_vec(),
        page,
        page_size,
        page_count,
        total,
    }
}
