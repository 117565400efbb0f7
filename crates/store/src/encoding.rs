use std::path::Path;

use tally_rollup::StoreError;

/// Read a file as text. Spreadsheet exports are often Windows-1252, so
/// invalid UTF-8 falls back to that instead of failing the read.
pub fn read_file_as_utf8(path: &Path) -> Result<String, StoreError> {
    let bytes = std::fs::read(path)
        .map_err(|e| StoreError::permanent(format!("cannot read {}: {e}", path.display())))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{} is not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Guess the CSV delimiter from the first lines of an export.
///
/// A candidate must split the header into more than one field. Among those,
/// the one giving the most lines with the header's field count wins, with
/// wider rows breaking ties. Defaults to comma.
pub fn sniff_delimiter(content: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

    let sample: Vec<&str> = content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(10)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for delim in CANDIDATES {
        let widths: Vec<usize> = sample
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&header_width) = widths.first() else {
            break;
        };
        if header_width <= 1 {
            continue;
        }

        let consistent = widths.iter().filter(|&&w| w == header_width).count();
        let score = consistent * header_width;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}
