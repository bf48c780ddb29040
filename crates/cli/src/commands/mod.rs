pub mod ask;
pub mod courses;
pub mod doctor;
pub mod ingest;
pub mod onboard;
