//! On-disk representation of equivalence stores
//!
//! One text line per class: `ram_csv;offsets_csv:payload`. Per-block
//! files carry the `.curve_count` extension and double as the done
//! markers of the idempotent restart; merged artifacts use
//! `.curve_count_total`. Files are written to a scratch name and
//! renamed into place, so an existing result file is always complete.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Aggregate, CurveInvariant, EquivalenceStore, StoreError};

/// Extension of unmerged per-block result files.
pub const UNMERGED_EXTENSION: &str = "curve_count";

/// Extension of merged final artifacts.
pub const MERGED_EXTENSION: &str = "curve_count_total";

/// Name of the periodically flushed master file.
pub const MASTER_FILE: &str = "census.curve_count_total";

/// File name encoding a block's coefficient bounds.
pub fn block_file_name(bounds: &[(usize, usize)]) -> String {
    let mut name = String::from("coeff_bounds");
    for (lower, upper) in bounds {
        name.push_str(&format!("__{lower}_{upper}"));
    }
    name.push('.');
    name.push_str(UNMERGED_EXTENSION);
    name
}

/// Full path of a block's result file inside the result directory.
pub fn block_file_path(result_dir: &Path, bounds: &[(usize, usize)]) -> PathBuf {
    result_dir.join(block_file_name(bounds))
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn render_key(key: &CurveInvariant) -> String {
    let ram = key
        .ramification
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let offsets = key
        .hasse_weil
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{ram};{offsets}")
}

fn parse_csv<T: std::str::FromStr>(text: &str) -> Result<Vec<T>, String> {
    text.split(',')
        .map(|item| {
            item.trim()
                .parse()
                .map_err(|_| format!("invalid entry {item:?}"))
        })
        .collect()
}

fn parse_line(line: &str) -> Result<(CurveInvariant, &str), String> {
    let (key, payload) = line
        .split_once(':')
        .ok_or_else(|| "missing ':' separator".to_string())?;
    let (ram, offsets) = key
        .split_once(';')
        .ok_or_else(|| "missing ';' separator".to_string())?;
    Ok((
        CurveInvariant {
            ramification: parse_csv(ram)?,
            hasse_weil: parse_csv(offsets)?,
        },
        payload,
    ))
}

/// Writes a store, sorted by key, atomically renaming into place.
pub fn write_store<A: Aggregate>(
    path: &Path,
    store: &EquivalenceStore<A>,
) -> Result<(), StoreError> {
    let mut scratch = path.as_os_str().to_owned();
    scratch.push(".partial");
    let scratch = PathBuf::from(scratch);

    let file = File::create(&scratch).map_err(|e| io_error(&scratch, e))?;
    let mut writer = BufWriter::new(file);
    for (key, aggregate) in store.iter() {
        writeln!(writer, "{}:{}", render_key(key), aggregate.render())
            .map_err(|e| io_error(&scratch, e))?;
    }
    writer.flush().map_err(|e| io_error(&scratch, e))?;
    drop(writer);
    fs::rename(&scratch, path).map_err(|e| io_error(path, e))
}

/// Reads a store back; any malformed line is fatal.
pub fn read_store<A: Aggregate>(path: &Path) -> Result<EquivalenceStore<A>, StoreError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let reader = BufReader::new(file);
    let mut store = EquivalenceStore::new(false);
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let (key, payload) = parse_line(&line).map_err(|reason| StoreError::MalformedLine {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        })?;
        let aggregate = A::parse(payload).map_err(|reason| StoreError::MalformedLine {
            path: path.to_path_buf(),
            line: index + 1,
            reason,
        })?;
        store.absorb_class(key, aggregate);
    }
    Ok(store)
}

/// Folds every unmerged result file under `result_dir` into one store.
/// Returns the store and the number of files merged.
pub fn merge_directory<A: Aggregate>(
    result_dir: &Path,
) -> Result<(EquivalenceStore<A>, usize), StoreError> {
    let entries = fs::read_dir(result_dir).map_err(|e| io_error(result_dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map(|ext| ext == UNMERGED_EXTENSION)
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut merged = EquivalenceStore::new(false);
    for path in &paths {
        merged.merge(read_store(path)?);
    }
    Ok((merged, paths.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ClassCount;

    fn sample_store() -> EquivalenceStore<ClassCount> {
        let mut store = EquivalenceStore::new(false);
        store.absorb_class(
            CurveInvariant {
                ramification: vec![1, 1, 2],
                hasse_weil: vec![0, -16],
            },
            ClassCount(12),
        );
        store.absorb_class(
            CurveInvariant {
                ramification: vec![5],
                hasse_weil: vec![2, 8],
            },
            ClassCount(3),
        );
        store
    }

    #[test]
    fn block_file_names_encode_bounds() {
        assert_eq!(
            block_file_name(&[(0, 5), (2, 3)]),
            "coeff_bounds__0_5__2_3.curve_count"
        );
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.curve_count");
        let store = sample_store();
        write_store(&path, &store).unwrap();
        let back: EquivalenceStore<ClassCount> = read_store(&path).unwrap();
        assert_eq!(back, store);
        // no scratch file left behind
        assert!(!path.with_extension("curve_count.partial").exists());
    }

    #[test]
    fn malformed_lines_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.curve_count");
        std::fs::write(&path, "1,1;0,-16 12\n").unwrap();
        let result: Result<EquivalenceStore<ClassCount>, _> = read_store(&path);
        assert!(matches!(result, Err(StoreError::MalformedLine { line: 1, .. })));
    }

    #[test]
    fn merge_directory_folds_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut half_a = EquivalenceStore::new(false);
        half_a.absorb_class(
            CurveInvariant {
                ramification: vec![1, 1],
                hasse_weil: vec![1],
            },
            ClassCount(2),
        );
        let mut half_b = EquivalenceStore::new(false);
        half_b.absorb_class(
            CurveInvariant {
                ramification: vec![1, 1],
                hasse_weil: vec![1],
            },
            ClassCount(5),
        );
        write_store(&dir.path().join("coeff_bounds__0_2.curve_count"), &half_a).unwrap();
        write_store(&dir.path().join("coeff_bounds__2_4.curve_count"), &half_b).unwrap();
        // a merged artifact in the same directory must be ignored
        write_store(&dir.path().join("census.curve_count_total"), &half_a).unwrap();

        let (merged, files): (EquivalenceStore<ClassCount>, usize) =
            merge_directory(dir.path()).unwrap();
        assert_eq!(files, 2);
        assert_eq!(merged.total_count(), 7);
        assert_eq!(merged.len(), 1);
    }
}
