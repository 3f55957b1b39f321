pub mod data_uri;
pub mod deepface;

pub use data_uri::DataUriImage;
