pub mod filename;
pub mod geotiff;
pub mod nc;
pub mod types;
pub mod utils;

pub use filename::{
    FilenameError, ProcessingLevel, ProductFilename, ProductIdentity, parse_product_filename,
};
pub use geotiff::GeoTiffReader;
pub use nc::NcReader;
pub use types::{Data, DataReader, FileType, GroupLayout, ProductRequest, ReadError};
pub use utils::{reader_from_filetype, resolve_path};

use std::path::PathBuf;

pub fn create_reader(path: PathBuf) -> Result<Box<dyn DataReader>, ReadError> {
    match reader_from_filetype(&path)? {
        FileType::GeoTiff => Ok(Box::new(GeoTiffReader { path })),
        FileType::NetCDF => Ok(Box::new(NcReader { path })),
    }
}

/// Opens, reads and closes one product file.
pub fn read_product(path: PathBuf, request: &ProductRequest) -> Result<Data, ReadError> {
    create_reader(path)?.read_data(request)
}
