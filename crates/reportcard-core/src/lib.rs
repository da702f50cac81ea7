// Roster, notes, configuration, and persistence shared by the report
// pipeline and the command-line front end.

pub mod athlete;
pub mod config;
pub mod db;
pub mod notes;
pub mod roster;
