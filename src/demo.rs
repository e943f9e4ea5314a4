//! Demonstration dataset loaded into empty or reset registries. Names and
//! CPFs are fictitious.

use crate::model::{EnrollmentStatus, School, SchoolStage, Shift, Student, UNALLOCATED_SCHOOL};

pub const DEMO_CRECHE: &str = "CRECHE PARAISO DA CRIANCA";
pub const DEMO_ESCOLA: &str = "ESCOLA MUNICIPAL FUTURO DO SABER";

pub fn demo_schools() -> Vec<School> {
    vec![
        School {
            id: "29383935".into(),
            inep: "29383935".into(),
            name: DEMO_CRECHE.into(),
            address: "Urbana - Centro - BA".into(),
            types: vec![SchoolStage::EarlyChildhood],
            image: "https://images.unsplash.com/photo-1588072432836-e10032774350?auto=format&fit=crop&q=80".into(),
            rating: 5.0,
            available_slots: 150,
            lat: -12.5253,
            lng: -40.2917,
        },
        School {
            id: "29383936".into(),
            inep: "29383936".into(),
            name: DEMO_ESCOLA.into(),
            address: "Bairro Jardim - BA".into(),
            types: vec![SchoolStage::Elementary1],
            image: "https://images.unsplash.com/photo-1503676260728-1c00da094a0b?auto=format&fit=crop&q=80".into(),
            rating: 4.8,
            available_slots: 200,
            lat: -12.5280,
            lng: -40.2950,
        },
    ]
}

struct Row {
    id: &'static str,
    name: &'static str,
    birth_date: &'static str,
    status: EnrollmentStatus,
    school: &'static str,
    class_name: &'static str,
    class_id: &'static str,
    shift: Shift,
    transport: bool,
    transport_type: Option<&'static str>,
    special_needs: bool,
}

#[allow(clippy::too_many_arguments)]
const fn row(
    id: &'static str,
    name: &'static str,
    birth_date: &'static str,
    status: EnrollmentStatus,
    school: &'static str,
    class: (&'static str, &'static str),
    shift: Shift,
    transport: bool,
) -> Row {
    Row {
        id,
        name,
        birth_date,
        status,
        school,
        class_name: class.0,
        class_id: class.1,
        shift,
        transport,
        transport_type: None,
        special_needs: false,
    }
}

pub fn demo_students() -> Vec<Student> {
    use EnrollmentStatus::{Enrolled, Pending, UnderReview};
    const G3C: (&str, &str) = ("GRUPO 3 C", "C1");
    const G2A: (&str, &str) = ("GRUPO 2 A", "C2");
    const G3B: (&str, &str) = ("GRUPO 3 B", "C3");

    let rows = [
        row("1001", "JOÃO SILVA SANTOS", "03/01/2022", Enrolled, DEMO_CRECHE, G3C, Shift::FullDay, false),
        row("1002", "MARIA OLIVEIRA", "02/09/2021", Enrolled, DEMO_CRECHE, G3C, Shift::FullDay, false),
        Row {
            transport_type: Some("Vans/Kombis"),
            ..row("1003", "PEDRO ALMEIDA", "19/04/2022", Pending, DEMO_CRECHE, G2A, Shift::FullDay, true)
        },
        row("1004", "ANA SOUZA", "03/07/2021", UnderReview, DEMO_CRECHE, G3C, Shift::FullDay, false),
        row("1005", "LUCAS PEREIRA", "10/03/2023", Enrolled, DEMO_CRECHE, G2A, Shift::FullDay, false),
        Row {
            special_needs: true,
            ..row("1006", "JULIA LIMA", "21/02/2022", Enrolled, DEMO_CRECHE, G3B, Shift::FullDay, false)
        },
        row("1007", "GABRIEL COSTA", "29/05/2022", Pending, DEMO_ESCOLA, ("1º ANO A", "E1"), Shift::Morning, true),
        row("1008", "BEATRIZ ROCHA", "15/10/2021", Enrolled, DEMO_CRECHE, G3B, Shift::FullDay, false),
        row("1009", "ENZO FERREIRA", "18/02/2022", Enrolled, DEMO_CRECHE, G3B, Shift::FullDay, false),
        row("1010", "LAURA GOMES", "08/08/2021", UnderReview, UNALLOCATED_SCHOOL, ("", ""), Shift::Pending, false),
    ];

    rows.iter()
        .enumerate()
        .map(|(i, r)| Student {
            id: r.id.into(),
            enrollment_id: format!("MAT-{:03}", i + 1),
            name: r.name.into(),
            birth_date: r.birth_date.into(),
            cpf: format!("000.000.000-{:02}", i + 1),
            status: r.status,
            school: r.school.into(),
            class_name: r.class_name.into(),
            class_id: r.class_id.into(),
            shift: r.shift,
            transport_request: r.transport,
            transport_type: r.transport_type.map(str::to_string),
            special_needs: r.special_needs,
            ..Default::default()
        })
        .collect()
}
