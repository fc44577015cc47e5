pub mod booking;
pub mod conflict;
pub mod directory;
pub mod matching;
pub mod notify;
pub mod timeslot;
