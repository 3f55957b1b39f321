pub mod attendance;
pub mod auth;
pub mod image_store;
pub mod pdf;
pub mod period;
pub mod recognizer;
pub mod reporting;

pub use attendance::{AttendanceRange, AttendanceService, BulkOutcome, RangeRecord, RecognitionMatch};
pub use auth::{AdminAuth, Authenticator, PasswordAuthenticator};
pub use image_store::ImageStore;
pub use recognizer::{FaceRecognizer, Verification};
pub use reporting::{DailyCount, Dashboard, ReportingService};
