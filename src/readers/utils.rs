use super::types::{FileType, ReadError};
use std::path::{Path, PathBuf};

pub fn reader_from_filetype(path: &Path) -> Result<FileType, ReadError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("tif") | Some("tiff") => Ok(FileType::GeoTiff),
        Some("nc") | Some("nc4") => Ok(FileType::NetCDF),
        _ => Err(ReadError::UnsupportedFileType(path.to_path_buf())),
    }
}

/// Resolves a configured product path. A plain path is returned as is (it may
/// not exist yet, the reader reports that); a glob pattern resolves to its
/// first match in lexical order.
pub fn resolve_path(pattern: &str) -> Result<PathBuf, ReadError> {
    if !pattern.contains(['*', '?', '[']) {
        return Ok(PathBuf::from(pattern));
    }

    let mut matches: Vec<PathBuf> = glob::glob(pattern)
        .map_err(|source| ReadError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?
        .filter_map(Result::ok)
        .collect();
    matches.sort();

    matches
        .into_iter()
        .next()
        .ok_or_else(|| ReadError::NoMatchingFile(pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_reader_from_filetype() {
        assert_eq!(
            reader_from_filetype(Path::new("AQUA_MODIS.20190621T180500.L2.OC.nc")).unwrap(),
            FileType::NetCDF
        );
        assert_eq!(
            reader_from_filetype(Path::new("chl.TIF")).unwrap(),
            FileType::GeoTiff
        );
        assert!(matches!(
            reader_from_filetype(Path::new("chl.zarr")),
            Err(ReadError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_resolve_glob_picks_first_match() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("b_chl.nc")).unwrap();
        File::create(dir.path().join("a_chl.nc")).unwrap();

        let pattern = format!("{}/*_chl.nc", dir.path().display());
        let resolved = resolve_path(&pattern).unwrap();
        assert_eq!(resolved, dir.path().join("a_chl.nc"));

        let missing = format!("{}/*.tif", dir.path().display());
        assert!(matches!(
            resolve_path(&missing),
            Err(ReadError::NoMatchingFile(_))
        ));
    }

    #[test]
    fn test_plain_path_is_passed_through() {
        let resolved = resolve_path("/data/missing.nc").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/missing.nc"));
    }
}
