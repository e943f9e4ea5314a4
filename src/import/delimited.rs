use super::RawRow;
use crate::text::normalize_key;

/// `;` when the header line has one, otherwise `,`.
pub fn detect_separator(header_line: &str) -> char {
    if header_line.contains(';') {
        ';'
    } else {
        ','
    }
}

/// Splits one line on `sep`, honouring double-quoted fields and doubled
/// quotes inside them. Fields come back trimmed and unquoted.
pub fn split_record(line: &str, sep: char) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == sep && !in_quotes {
            out.push(buf.trim().to_string());
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf.trim().to_string());
    out
}

/// Breaks `text` into records at line ends outside double quotes, so a
/// quoted cell may span several lines. A trailing `\r` is dropped.
pub fn split_records(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    for ch in text.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                buf.push(ch);
            }
            '\n' if !in_quotes => {
                let end = buf.trim_end_matches('\r').len();
                buf.truncate(end);
                out.push(std::mem::take(&mut buf));
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() {
        let end = buf.trim_end_matches('\r').len();
        buf.truncate(end);
        out.push(buf);
    }
    out
}

/// Header row plus positional data rows. Blank lines and rows whose every
/// field is empty are dropped.
pub fn parse_delimited(text: &str) -> Vec<RawRow> {
    let records = split_records(text);
    let mut lines = records.iter().map(String::as_str);
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let sep = detect_separator(header_line);
    let headers: Vec<String> = split_record(header_line, sep)
        .iter()
        .map(|h| normalize_key(h))
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_record(line, sep);
        let mut row = RawRow::default();
        for (i, h) in headers.iter().enumerate() {
            if h.is_empty() {
                continue;
            }
            let v = fields.get(i).cloned().unwrap_or_default();
            row.insert(h.clone(), v);
        }
        if row.has_any_value() {
            rows.push(row);
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_follows_header_line() {
        assert_eq!(detect_separator("a;b,c"), ';');
        assert_eq!(detect_separator("a,b"), ',');
    }

    #[test]
    fn quoted_fields_keep_separators_and_quotes() {
        let f = split_record(r#""SILVA; ANA";"diz ""oi""";  x  "#, ';');
        assert_eq!(f, vec!["SILVA; ANA", "diz \"oi\"", "x"]);
    }

    #[test]
    fn rows_map_by_normalized_header() {
        let text = "Nome do Aluno;Data de Nascimento;Turma\r\n\"ANA\";01/02/2020;G3\r\n\r\n;;\r\nBIA;;\r\n";
        let rows = parse_delimited(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].first(&["nomedoaluno"]), Some("ANA"));
        assert_eq!(rows[0].first(&["datadenascimento"]), Some("01/02/2020"));
        assert_eq!(rows[1].first(&["turma"]), None);
    }

    #[test]
    fn quoted_line_breaks_stay_in_one_record() {
        let text = "\"Nome\";\"CPF\"\r\n\"ANA\nSOUZA\";\"1\"\r\n\"BIA\";\"2\"\r\n";
        let rows = parse_delimited(text);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].first(&["nome"]), Some("ANA\nSOUZA"));
        assert_eq!(rows[1].first(&["cpf"]), Some("2"));
    }

    #[test]
    fn short_rows_fill_missing_columns() {
        let rows = parse_delimited("a,b,c\n1\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].first(&["a"]), Some("1"));
        assert_eq!(rows[0].first(&["c"]), None);
    }
}
