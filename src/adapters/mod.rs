// Adapters layer: concrete implementations of the domain ports for LINE,
// OpenAI and Google Cloud.

pub mod firestore;
pub mod gcs;
pub mod google_auth;
pub mod line;
pub mod openai;

pub use firestore::FirestoreStore;
pub use gcs::GcsStorage;
pub use line::LineClient;
pub use openai::OpenAiClient;
