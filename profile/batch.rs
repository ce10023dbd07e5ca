// ========================================================================================
//
//                  Batch scoring: many respondents, one shared dataset
//
// ========================================================================================
//
// Every respondent is independent, so the batch is a plain data-parallel map over a
// shared, read-only `Profiler`. Rayon's indexed `collect` keeps the input order.

use crate::answers::Respondent;
use crate::dataset::Dataset;
use crate::report::{Profile, Profiler};
use ahash::AHashMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(
        "Output file '{}' already exists. Dossier will not overwrite it. Please remove it or choose another path.",
        .0.display()
    )]
    OutputExists(PathBuf),

    #[error("I/O error while writing '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One scored respondent.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRow {
    pub id: String,
    pub profile: Profile,
}

/// Scores every respondent in parallel. Rows come back in input order.
pub fn score_respondents(profiler: &Profiler, respondents: &[Respondent]) -> Vec<BatchRow> {
    respondents
        .par_iter()
        .map(|respondent| BatchRow {
            id: respondent.id.clone(),
            profile: profiler.profile(&respondent.answers),
        })
        .collect()
}

/// Writes rows as a tab-separated table.
///
/// Columns are `id`, `answered`, `any_drug`, `verdict`, then one rate column per
/// drug in dataset order, so every row lines up regardless of its own ranking.
pub fn write_table<W: Write>(writer: &mut W, dataset: &Dataset, rows: &[BatchRow]) -> io::Result<()> {
    let drug_names = dataset.drugs().iter().map(|d| d.name.as_str());
    writeln!(
        writer,
        "id\tanswered\tany_drug\tverdict\t{}",
        drug_names.clone().join("\t")
    )?;

    for row in rows {
        let rates: AHashMap<&str, f64> = row
            .profile
            .results
            .iter()
            .map(|r| (r.drug.as_str(), r.rate))
            .collect();
        let cells = drug_names
            .clone()
            .map(|name| format!("{:.2}", rates.get(name).copied().unwrap_or(0.0)))
            .join("\t");
        writeln!(
            writer,
            "{}\t{}\t{:.2}\t{}\t{}",
            escape_cell(&row.id),
            row.profile.answered,
            row.profile.any_drug,
            row.profile.verdict,
            cells
        )?;
    }
    writer.flush()
}

// Keeps a cell on one line and in one column.
fn escape_cell(cell: &str) -> Cow<'_, str> {
    if !cell.contains(['\\', '\t', '\r', '\n']) {
        return Cow::Borrowed(cell);
    }
    let mut escaped = String::with_capacity(cell.len() + 2);
    for c in cell.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Writes the table to a file that must not exist yet.
///
/// A file left incomplete by a failed write is removed, so the same path can be
/// used again.
pub fn write_table_to_path(path: &Path, dataset: &Dataset, rows: &[BatchRow]) -> Result<(), BatchError> {
    write_new_file(path, |writer| write_table(writer, dataset, rows))?;
    log::info!("Wrote {} rows to '{}'", rows.len(), path.display());
    Ok(())
}

fn write_new_file<F>(path: &Path, write: F) -> Result<(), BatchError>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => BatchError::OutputExists(path.to_path_buf()),
            _ => BatchError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
    let mut writer = BufWriter::new(file);
    if let Err(source) = write(&mut writer) {
        drop(writer);
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Could not remove incomplete output '{}': {e}", path.display());
        }
        return Err(BatchError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}
