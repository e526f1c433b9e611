use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};

/// One row of a ranking: an image and its distance to the query.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedEntry {
    /// The image identifier.
    pub image: PathBuf,
    /// Distance to the query; 0 for the query itself.
    pub distance: f64,
}

impl RankedEntry {
    /// Creates an entry.
    pub fn new(image: impl Into<PathBuf>, distance: f64) -> Self {
        Self {
            image: image.into(),
            distance,
        }
    }
}

/// Query image followed by its nearest neighbours, closest first.
///
/// The first entry is always the query at distance 0. The remaining entries
/// are ordered by ascending distance, ties keeping candidate order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(try_from = "Vec<RankedEntry>", into = "Vec<RankedEntry>")]
pub struct RankedResult {
    entries: Vec<RankedEntry>,
}

impl TryFrom<Vec<RankedEntry>> for RankedResult {
    type Error = String;

    fn try_from(entries: Vec<RankedEntry>) -> std::result::Result<Self, Self::Error> {
        match entries.first() {
            None => Err("a ranking needs at least the query entry".to_string()),
            Some(first) if first.distance != 0.0 => Err(format!(
                "query entry {} has distance {}, expected 0",
                first.image.display(),
                first.distance
            )),
            Some(_) => Ok(Self { entries }),
        }
    }
}

impl From<RankedResult> for Vec<RankedEntry> {
    fn from(result: RankedResult) -> Self {
        result.entries
    }
}

impl RankedResult {
    /// Sorts `scored` by distance (stable), keeps the first `k` and puts the
    /// query in front.
    pub fn from_scored(query: impl Into<PathBuf>, mut scored: Vec<RankedEntry>, k: usize) -> Self {
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);

        let mut entries = Vec::with_capacity(scored.len() + 1);
        entries.push(RankedEntry::new(query, 0.0));
        entries.extend(scored);

        Self { entries }
    }

    /// The query entry.
    pub fn query(&self) -> &RankedEntry {
        &self.entries[0]
    }

    /// Neighbours without the query.
    pub fn neighbours(&self) -> &[RankedEntry] {
        &self.entries[1..]
    }

    /// All entries, query first.
    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    /// Number of entries including the query.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a ranking holds at least the query.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries, query first.
    pub fn iter(&self) -> std::slice::Iter<'_, RankedEntry> {
        self.entries.iter()
    }

    /// Serializes the ranking to a pretty-printed JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes a ranking from a JSON string.
    pub fn from_json(json_str: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Writes `image,distance` rows, header first.
    pub fn write_csv<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "image,distance")?;
        for entry in &self.entries {
            let image = entry.image.display().to_string();
            writeln!(out, "{},{}", csv_field(&image), entry.distance)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Writes the CSV rows to a file at `path`.
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}

impl<'a> IntoIterator for &'a RankedResult {
    type Item = &'a RankedEntry;
    type IntoIter = std::slice::Iter<'a, RankedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
