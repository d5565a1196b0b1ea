//! File names inside a saved dataset package.

use vds_dataset::DataFormat;
use vds_types::Address;

/// The top-level document.
pub const DATASET_FILE: &str = "dataset.json";
pub const STRUCTURE_FILE: &str = "structure.json";
pub const META_FILE: &str = "meta.json";
pub const COMMIT_FILE: &str = "commit.json";
pub const TRANSFORM_FILE: &str = "transform.json";
pub const VIZ_FILE: &str = "viz.json";
pub const TRANSFORM_SCRIPT_FILE: &str = "transform_script";
pub const VIZ_SCRIPT_FILE: &str = "viz_script";

/// Name of the body file, e.g. `body.csv`.
pub fn body_file_name(format: Option<DataFormat>) -> String {
    match format {
        Some(format) => format!("body.{format}"),
        None => "body".to_string(),
    }
}

/// The key of the top-level document for a package address.
///
/// A bare directory address gets [`DATASET_FILE`] appended; an address
/// that already names a file is returned unchanged.
pub fn package_keypath(address: &Address) -> Address {
    match address.file_name() {
        Some(_) => address.clone(),
        None => address.join(DATASET_FILE),
    }
}
