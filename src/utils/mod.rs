pub mod artifact_file;
pub mod package_name;
pub mod path_validator;

pub use package_name::PackageName;
pub use path_validator::PathValidator;
