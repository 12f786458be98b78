use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PassageRecord {
    pub passage_id: String,
    pub document_id: String,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub jurisdiction: Option<String>,
    pub doc_type: Option<String>,
    pub year: Option<u16>,
}

/// Read-only passage store shared by every index built over it.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    passages: Vec<PassageRecord>,
    by_id: FxHashMap<String, usize>,
}

impl Corpus {
    pub fn from_records(records: Vec<PassageRecord>) -> Result<Self> {
        let mut by_id = FxHashMap::default();
        for (idx, record) in records.iter().enumerate() {
            if record.passage_id.trim().is_empty() {
                return Err(anyhow!("passage at line {} has an empty passage_id", idx + 1));
            }
            if by_id.insert(record.passage_id.clone(), idx).is_some() {
                return Err(anyhow!("duplicate passage_id {}", record.passage_id));
            }
        }
        Ok(Self {
            passages: records,
            by_id,
        })
    }

    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open corpus {}", path.display()))?;
        let mut reader = JsonlReader::new(BufReader::new(file));
        let mut records = Vec::new();
        while let Some(record) = reader.next_record::<PassageRecord>()? {
            records.push(record);
        }
        Self::from_records(records)
    }

    pub fn get(&self, passage_id: &str) -> Option<&PassageRecord> {
        self.by_id.get(passage_id).map(|idx| &self.passages[*idx])
    }

    pub fn passages(&self) -> &[PassageRecord] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

pub struct JsonlReader<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Next non-blank record, `None` at end of input.
    pub fn next_record<T: for<'de> Deserialize<'de>>(&mut self) -> Result<Option<T>> {
        loop {
            self.buf.clear();
            self.line += 1;
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            let trimmed = self.buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record = serde_json::from_str(trimmed)
                .with_context(|| format!("invalid record on line {}", self.line))?;
            return Ok(Some(record));
        }
    }
}
