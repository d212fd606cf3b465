//! Parsing of the multistream offset index.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::types::IngestError;

/// Loads block offsets from a bzip2-compressed index file.
///
/// Each line has the form `<offset>:<secondary-id>:<title>`. Several titles
/// share one block, so offsets repeat; the result is de-duplicated and sorted
/// ascending. The index is the sole source of block boundaries; nothing is
/// inferred from dump content.
pub fn load_stream_offsets(path: impl AsRef<Path>) -> Result<Vec<u64>, IngestError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(BzDecoder::new(file));

    let mut offsets = BTreeSet::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let offset = parse_line(&line, i + 1)?;
        offsets.insert(offset);
    }

    Ok(offsets.into_iter().collect())
}

fn parse_line(line: &str, number: usize) -> Result<u64, IngestError> {
    let mut fields = line.splitn(3, ':');
    let offset = fields.next().unwrap_or_default();
    if fields.next().is_none() || fields.next().is_none() {
        return Err(IngestError::MalformedIndex {
            line: number,
            reason: format!("expected <offset>:<id>:<title>, got '{line}'"),
        });
    }
    offset.parse::<u64>().map_err(|_| IngestError::MalformedIndex {
        line: number,
        reason: format!("offset '{offset}' is not a non-negative integer"),
    })
}
