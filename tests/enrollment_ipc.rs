mod test_support;

use serde_json::{json, Value};
use test_support::spawn_sidecar;

const STUDENT_CPF: &str = "111.444.777-35";
const GUARDIAN_CPF: &str = "529.982.247-25";

fn advance(sidecar: &mut test_support::Sidecar, form: Value) -> Value {
    sidecar.request_ok("enrollment.advance", json!({ "form": form }))
}

#[test]
fn wizard_walks_four_steps_and_submits_under_review() {
    let mut sidecar = spawn_sidecar();

    let blank = sidecar.request_ok("enrollment.validateStep", json!({ "step": 1 }));
    assert_eq!(blank["valid"], false);
    let fields: Vec<&str> = blank["errors"]
        .as_array()
        .expect("errors")
        .iter()
        .filter_map(|e| e["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["studentName", "studentBirthDate"]);

    let form = json!({
        "step": 1,
        "student": {
            "fullName": "helena prado",
            "birthDate": "2021-03-09",
            "cpf": STUDENT_CPF,
            "needsTransport": true
        },
        "guardian": { "fullName": "Rosa Prado", "cpf": "111.111.111-11" }
    });
    let step2 = advance(&mut sidecar, form);
    assert_eq!(step2["form"]["step"], 2);

    // Repeated digits never pass the checksum.
    let mut form = step2["form"].clone();
    let code = sidecar.request_err("enrollment.advance", json!({ "form": form.clone() }));
    assert_eq!(code, "validation_failed");
    form["guardian"]["cpf"] = json!(GUARDIAN_CPF);

    let step3 = advance(&mut sidecar, form);
    assert_eq!(step3["form"]["step"], 3);
    assert_eq!(step3["advisories"].as_array().map(Vec::len), Some(0));

    let step4 = advance(&mut sidecar, step3["form"].clone());
    assert_eq!(step4["form"]["step"], 4);
    assert_eq!(step4["advisories"].as_array().map(Vec::len), Some(1));
    assert!(step4["form"]["address"]["lat"].as_f64().is_some());

    let ranked = sidecar.request_ok(
        "enrollment.rankSchools",
        json!({ "form": step4["form"].clone() }),
    );
    let nearest = ranked["schools"][0].clone();
    assert!(nearest["distanceKm"].as_f64().is_some());

    let mut form = step4["form"].clone();
    form["selectedSchoolId"] = nearest["id"].clone();
    let submitted = sidecar.request_ok("enrollment.submit", json!({ "form": form }));
    let protocol = submitted["protocol"].as_str().expect("protocol");
    assert!(protocol.starts_with("PROT-"));

    let student = &submitted["student"];
    assert_eq!(student["name"], "HELENA PRADO");
    assert_eq!(student["birthDate"], "09/03/2021");
    assert_eq!(student["status"], "Em Análise");
    assert_eq!(student["school"], nearest["name"]);
    assert_eq!(student["grade"], "Definição Pendente");
    assert_eq!(student["transportRequest"], true);
    assert_eq!(student["history"][0]["user"], "Rosa Prado");

    let stats = sidecar.request_ok("dashboard.stats", json!({}));
    assert_eq!(stats["stats"]["totalStudents"], 11);
    assert_eq!(stats["stats"]["status"]["underReview"], 3);
    sidecar.close();
}

#[test]
fn submit_without_school_is_unallocated() {
    let mut sidecar = spawn_sidecar();
    let form = json!({
        "step": 4,
        "student": { "fullName": "Igor Lima", "birthDate": "2020-12-01" },
        "guardian": { "fullName": "Paulo Lima", "cpf": GUARDIAN_CPF }
    });
    let submitted = sidecar.request_ok("enrollment.submit", json!({ "form": form }));
    assert_eq!(submitted["student"]["school"], "Não alocada");
    assert!(submitted["student"].get("lat").is_none());

    let bad = json!({
        "student": { "fullName": "Igor Lima", "birthDate": "2020-12-01", "cpf": "123" },
        "guardian": { "fullName": "Paulo Lima", "cpf": GUARDIAN_CPF }
    });
    let value = sidecar.request("enrollment.submit", json!({ "form": bad }));
    assert_eq!(value["error"]["code"], "validation_failed");
    assert_eq!(value["error"]["details"]["fields"][0]["field"], "studentCpf");
    sidecar.close();
}
