use std::path::Path;

use chrono::NaiveDate;
use serde_json::Value;

use crate::categorizer::categorize_batch;
use crate::error::{KopilkaError, Result};
use crate::models::{normalize_category, ParsedTransaction, TransactionType};
use crate::validation::{parse_amount, validate_parsed};

// ---------------------------------------------------------------------------
// Formats: picked by key or by file extension
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchFormat {
    /// The upload extractor's response: one object or an array of them.
    Json,
    /// `date,description,amount,category,type,raw_text`
    Csv,
}

const ALL_FORMATS: &[BatchFormat] = &[BatchFormat::Json, BatchFormat::Csv];

impl BatchFormat {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    fn parse(&self, file_path: &Path) -> Result<Vec<std::result::Result<ParsedTransaction, String>>> {
        match self {
            Self::Json => parse_json(file_path),
            Self::Csv => parse_csv(file_path),
        }
    }
}

pub fn get_by_key(key: &str) -> Option<BatchFormat> {
    ALL_FORMATS.iter().find(|f| f.key() == key.to_lowercase()).copied()
}

pub fn get_for_file(file_path: &Path) -> Option<BatchFormat> {
    let ext = file_path.extension()?.to_str()?;
    get_by_key(ext)
}

// ---------------------------------------------------------------------------
// read_batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based position in the source file's records.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Accepted candidates, in file order.
    pub candidates: Vec<ParsedTransaction>,
    pub rejected: Vec<RejectedRow>,
    /// Candidates whose category came from the keyword rules.
    pub categorized: usize,
}

pub fn read_batch(file_path: &Path, format_key: Option<&str>) -> Result<Batch> {
    let format = match format_key {
        Some(key) => get_by_key(key).ok_or_else(|| KopilkaError::UnknownFormat(key.to_string()))?,
        None => get_for_file(file_path).ok_or_else(|| {
            KopilkaError::UnknownFormat(file_path.display().to_string())
        })?,
    };

    let mut batch = Batch::default();
    for (i, row) in format.parse(file_path)?.into_iter().enumerate() {
        let position = i + 1;
        let candidate = match row {
            Ok(candidate) => candidate,
            Err(reason) => {
                batch.rejected.push(RejectedRow { position, reason });
                continue;
            }
        };
        let errors = validate_parsed(&candidate);
        if errors.has_errors() {
            let reason = errors
                .iter()
                .map(|(field, msg)| format!("{field}: {msg}"))
                .collect::<Vec<_>>()
                .join("; ");
            batch.rejected.push(RejectedRow { position, reason });
            continue;
        }
        batch.candidates.push(candidate);
    }
    let categories = categorize_batch(&mut batch.candidates);
    batch.categorized = categories.categorized;
    tracing::debug!(
        format = format.key(),
        accepted = batch.candidates.len(),
        categorized = categories.categorized,
        uncategorized = categories.still_uncategorized,
        rejected = batch.rejected.len(),
        "batch read"
    );
    Ok(batch)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Each element is decoded on its own so one malformed row does not sink the batch.
fn parse_json(file_path: &Path) -> Result<Vec<std::result::Result<ParsedTransaction, String>>> {
    let content = std::fs::read_to_string(file_path)?;
    let rows = match serde_json::from_str::<Value>(&content)? {
        Value::Array(rows) => rows,
        row @ Value::Object(_) => vec![row],
        other => {
            return Err(KopilkaError::Invalid(format!(
                "expected a transaction object or an array of them, got {}",
                json_kind(&other)
            )))
        }
    };
    Ok(rows
        .into_iter()
        .map(|row| serde_json::from_value::<ParsedTransaction>(row).map_err(|e| e.to_string()))
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// ISO first, then the dd.mm.yyyy form Russian bank exports use.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .ok()
}

struct CsvColumns {
    date: usize,
    description: usize,
    amount: usize,
    category: Option<usize>,
    kind: Option<usize>,
    raw_text: Option<usize>,
}

impl CsvColumns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let required = |name: &str| {
            column(name).ok_or_else(|| KopilkaError::Invalid(format!("CSV has no '{name}' column")))
        };
        Ok(Self {
            date: required("date")?,
            description: required("description")?,
            amount: required("amount")?,
            category: column("category"),
            kind: column("type").or_else(|| column("transaction_type")),
            raw_text: column("raw_text"),
        })
    }
}

fn parse_record(record: &csv::StringRecord, cols: &CsvColumns) -> std::result::Result<ParsedTransaction, String> {
    let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

    let raw_date = field(Some(cols.date));
    let date = parse_date(raw_date).ok_or_else(|| format!("bad date '{raw_date}'"))?;
    let raw_amount = field(Some(cols.amount));
    let amount = parse_amount(raw_amount).ok_or_else(|| format!("bad amount '{raw_amount}'"))?;
    let transaction_type = field(cols.kind)
        .parse::<TransactionType>()
        .map_err(|e| e.to_string())?;

    Ok(ParsedTransaction {
        amount,
        description: field(Some(cols.description)).to_string(),
        category: normalize_category(Some(field(cols.category))),
        transaction_type,
        date,
        raw_text: field(cols.raw_text).to_string(),
    })
}

fn parse_csv(file_path: &Path) -> Result<Vec<std::result::Result<ParsedTransaction, String>>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let cols = CsvColumns::from_headers(rdr.headers()?)?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        rows.push(parse_record(&result?, &cols));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_format_lookup() {
        assert_eq!(get_by_key("JSON"), Some(BatchFormat::Json));
        assert_eq!(get_for_file(Path::new("batch.csv")), Some(BatchFormat::Csv));
        assert_eq!(get_for_file(Path::new("scan.png")), None);
    }

    #[test]
    fn test_read_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "upload.json", r#"[
            {"amount": 540.00, "description": "Магнит, продукты", "category": "Еда", "date": "2024-05-01", "raw_text": "МАГНИТ 540,00"},
            {"amount": 0, "description": "Пусто", "date": "2024-05-01", "raw_text": ""},
            {"amount": 120000, "description": "Зарплата", "transaction_type": "income", "date": "2024-05-05", "raw_text": "ЗП"}
        ]"#);
        let batch = read_batch(&path, None).unwrap();
        assert_eq!(batch.candidates.len(), 2);
        assert_eq!(batch.candidates[1].transaction_type, TransactionType::Income);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].position, 2);
    }

    #[test]
    fn test_read_json_rejects_malformed_row_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "upload.json", r#"[
            {"amount": "540.00", "description": "Магнит", "date": "2024-05-01"},
            {"amount": "99.90", "description": "Аптека", "date": "01.05.2024"}
        ]"#);
        let batch = read_batch(&path, None).unwrap();
        assert_eq!(batch.candidates.len(), 1);
        assert_eq!(batch.candidates[0].description, "Магнит");
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].position, 2);
        assert!(!batch.rejected[0].reason.is_empty());
    }

    #[test]
    fn test_read_json_single_object_reports_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "one.json", r#"{"amount": "99.90", "date": "2024-05-03"}"#);
        let batch = read_batch(&path, None).unwrap();
        assert!(batch.candidates.is_empty());
        assert_eq!(batch.rejected.len(), 1);
        assert!(batch.rejected[0].reason.contains("missing field `description`"));
    }

    #[test]
    fn test_read_json_scalar_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "scalar.json", "42");
        assert!(matches!(read_batch(&path, None), Err(KopilkaError::Invalid(_))));
    }

    #[test]
    fn test_read_json_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "one.json", r#"{"amount": "99.90", "description": "Аптека", "date": "2024-05-03", "raw_text": "АПТЕКА"}"#);
        let batch = read_batch(&path, None).unwrap();
        assert_eq!(batch.candidates.len(), 1);
        assert_eq!(batch.candidates[0].amount, Decimal::new(9990, 2));
        assert_eq!(batch.candidates[0].category.as_deref(), Some("Здоровье"));
        assert_eq!(batch.categorized, 1);
    }

    #[test]
    fn test_read_csv_with_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "batch.csv", "\
date,description,amount,category,type,raw_text
01.05.2024,Магнит,\"540,00\",Еда,expense,МАГНИТ 540
2024-05-02,Кэшбэк,150,,income,
2024-13-01,Ошибка,10,,,
2024-05-03,Такси,abc,,,
");
        let batch = read_batch(&path, Some("csv")).unwrap();
        assert_eq!(batch.candidates.len(), 2);
        assert_eq!(batch.candidates[0].amount, Decimal::new(54000, 2));
        assert_eq!(batch.candidates[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(batch.candidates[1].category, None);
        assert_eq!(batch.categorized, 0);
        let positions: Vec<usize> = batch.rejected.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![3, 4]);
        assert!(batch.rejected[1].reason.contains("bad amount"));
    }

    #[test]
    fn test_csv_without_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "when,what\n2024-05-01,x\n");
        assert!(read_batch(&path, None).is_err());
    }

    #[test]
    fn test_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "scan.png", "");
        assert!(matches!(read_batch(&path, None), Err(KopilkaError::UnknownFormat(_))));
        assert!(matches!(read_batch(&path, Some("xlsx")), Err(KopilkaError::UnknownFormat(_))));
    }
}
