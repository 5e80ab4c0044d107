pub mod participant_records;
pub mod quiz_sessions;
pub mod users;

pub use participant_records::Entity as ParticipantRecords;
pub use participant_records::Model as ParticipantRecord;
pub use quiz_sessions::Entity as QuizSessions;
pub use quiz_sessions::Model as QuizSession;
pub use users::Entity as Users;
pub use users::Model as User;
