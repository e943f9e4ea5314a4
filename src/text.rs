//! Comparison keys for import headers, search queries and stored names.

use unicode_normalization::UnicodeNormalization;

/// Lowercase, strip accents, keep only `[a-z0-9]`.
///
/// "Nome do Aluno", "nome_do_aluno" and "NOMEDOALUNO" all map to `nomedoaluno`.
pub fn normalize_key(s: &str) -> String {
    fold(s).filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Like [`normalize_key`] but keeps single spaces between words, for
/// word-level fuzzy matching.
pub fn normalize_for_fuzzy(s: &str) -> String {
    let kept: String = fold(s)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn non_empty_trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn fold(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn is_combining_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{1AB0}'..='\u{1AFF}'
        | '\u{1DC0}'..='\u{1DFF}'
        | '\u{20D0}'..='\u{20FF}'
        | '\u{FE20}'..='\u{FE2F}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_variants_share_one_key() {
        assert_eq!(normalize_key("Nome do Aluno"), "nomedoaluno");
        assert_eq!(normalize_key("nome_do_aluno"), "nomedoaluno");
        assert_eq!(normalize_key("NOMEDOALUNO"), "nomedoaluno");
        assert_eq!(normalize_key("Identificação única"), "identificacaounica");
        assert_eq!(normalize_key("\u{feff}ID"), "id");
    }

    #[test]
    fn fuzzy_form_keeps_single_spaces() {
        assert_eq!(normalize_for_fuzzy("  JOÃO   Silva-Santos "), "joao silvasantos");
        assert_eq!(normalize_for_fuzzy("1º ANO\tA"), "1 ano a");
    }

    #[test]
    fn normalization_is_idempotent() {
        for s in [
            "JOÃO SILVA SANTOS",
            "Código da escola:",
            "  é  ü ñ  ç ",
            "Dt. Nasc.",
            "",
            "ﬁ ligature",
        ] {
            let k = normalize_key(s);
            assert_eq!(normalize_key(&k), k, "key of {s:?}");
            let f = normalize_for_fuzzy(s);
            assert_eq!(normalize_for_fuzzy(&f), f, "fuzzy of {s:?}");
        }
    }

    #[test]
    fn digits_only_strips_cpf_mask() {
        assert_eq!(digits_only("000.000.000-01"), "00000000001");
    }
}
