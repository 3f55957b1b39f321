pub mod deepface_api;

pub use deepface_api::DeepFaceClient;
